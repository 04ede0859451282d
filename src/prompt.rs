//! Modal in-place prompts on the status row.
//!
//! A prompt takes over the event loop until Enter or Escape: characters and
//! backspace edit the input, Up/Down walk the shared history (restoring each
//! entry's modifiers), Ctrl+R toggles regex and Ctrl+I toggles
//! case-insensitive matching, with `[regex]` / `[nocase]` indicators shown
//! inline. Resizes redraw in place.

use crate::app::App;
use crate::history::QueryRecord;
use crate::ui;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{backend::Backend, Terminal};

/// Live editor state rendered by the status bar.
pub struct PromptState {
    pub label: String,
    pub input: String,
    pub is_regex: bool,
    pub ignore_case: bool,
    /// Whether this prompt supports modifier toggles and history.
    pub with_modifiers: bool,
}

impl PromptState {
    fn record(&self) -> QueryRecord {
        QueryRecord::new(self.input.clone(), self.is_regex, self.ignore_case)
    }

    fn load(&mut self, record: QueryRecord) {
        self.input = record.query;
        self.is_regex = record.is_regex;
        self.ignore_case = record.ignore_case;
    }

    /// Label, mode indicators, and the input, as shown on the status row.
    pub fn display_line(&self) -> String {
        let mut indicators = String::new();
        if self.with_modifiers {
            if self.is_regex {
                indicators.push_str("[regex]");
            }
            if self.ignore_case {
                if !indicators.is_empty() {
                    indicators.push(' ');
                }
                indicators.push_str("[nocase]");
            }
            if !indicators.is_empty() {
                indicators.push(' ');
            }
        }
        format!("{}{}{}", self.label, indicators, self.input)
    }
}

/// Prompt for a query with regex/case toggles and history. `None` on Escape.
pub fn prompt_query<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    label: &str,
) -> Result<Option<QueryRecord>> {
    run_prompt(terminal, app, label, true)
}

/// Prompt for plain text (line numbers, filenames). `None` on Escape.
pub fn prompt_text<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    label: &str,
) -> Result<Option<String>> {
    Ok(run_prompt(terminal, app, label, false)?.map(|r| r.query))
}

fn run_prompt<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    label: &str,
    with_modifiers: bool,
) -> Result<Option<QueryRecord>> {
    app.history.reset();
    let mut state = PromptState {
        label: label.to_string(),
        input: String::new(),
        is_regex: false,
        ignore_case: false,
        with_modifiers,
    };

    loop {
        terminal.draw(|f| ui::render_with_prompt(f, app, &state))?;

        match event::read()? {
            Event::Key(key) if key.kind != KeyEventKind::Release => match key.code {
                KeyCode::Enter => {
                    if with_modifiers && !state.input.is_empty() {
                        app.history.add(&state.record());
                    }
                    return Ok(Some(state.record()));
                }
                KeyCode::Esc => return Ok(None),
                KeyCode::Backspace => {
                    state.input.pop();
                }
                KeyCode::Up if with_modifiers => {
                    let record = app.history.up(&state.record());
                    state.load(record);
                }
                KeyCode::Down if with_modifiers => {
                    let record = app.history.down(&state.record());
                    state.load(record);
                }
                // Terminals deliver Ctrl+I as Tab
                KeyCode::Tab if with_modifiers => {
                    state.ignore_case = !state.ignore_case;
                }
                KeyCode::Char('r') if with_modifiers && key.modifiers.contains(KeyModifiers::CONTROL) => {
                    state.is_regex = !state.is_regex;
                }
                KeyCode::Char('i') if with_modifiers && key.modifiers.contains(KeyModifiers::CONTROL) => {
                    state.ignore_case = !state.ignore_case;
                }
                KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                    state.input.push(c);
                }
                _ => {}
            },
            // Redraw on the next loop turn with the new size
            Event::Resize(..) => {}
            _ => {}
        }
    }
}
