//! Application state and command handlers.
//!
//! All display state lives here and is mutated only on the event-loop
//! thread. Background work (filters, readers, the follow tailer) touches
//! nothing but its own line buffer and the interrupt flag; anything it
//! wants the UI to do (cursor seeding, tail advance) is picked up in
//! `pre_render` on the next frame.

use crate::ansi::strip_ansi;
use crate::clipboard;
use crate::event::Interrupt;
use crate::filter::{self, Matcher};
use crate::history::{History, QueryRecord};
use crate::ingest;
use crate::prompt::{prompt_query, prompt_text};
use crate::search::SearchState;
use crate::stack::ViewerStack;
use crate::timestamp::{detect_format, extract_timestamp};
use crate::ui;
use crate::viewer::Viewer;
use anyhow::Result;
use chrono::{Local, NaiveDate, NaiveDateTime};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{backend::Backend, Terminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

const MESSAGE_TTL: Duration = Duration::from_secs(3);
const HORIZONTAL_STEP: usize = 15;

/// Visual line-selection state: the anchor set on entry and the moving
/// cursor.
struct Visual {
    anchor: usize,
    cursor: usize,
}

pub struct App {
    pub stack: ViewerStack,
    pub search: SearchState,
    pub history: History,
    pub interrupt: Interrupt,
    /// strftime format for the `b` jump; `None` means auto-detect.
    pub timestamp_format: Option<String>,
    /// Root source path, needed by the follow tailer. `None` for stdin
    /// and merged views.
    follow_path: Option<PathBuf>,
    status: Option<(String, Instant)>,
    visual: Option<Visual>,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        root: Viewer,
        follow_path: Option<PathBuf>,
        history: History,
        interrupt: Interrupt,
    ) -> Self {
        Self {
            stack: ViewerStack::new(root),
            search: SearchState::default(),
            history,
            interrupt,
            timestamp_format: None,
            follow_path,
            status: None,
            visual: None,
            should_quit: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_test(root: Viewer) -> Self {
        Self::new(root, None, History::load(None), Interrupt::new())
    }

    pub fn current(&self) -> &Viewer {
        self.stack.current()
    }

    pub fn current_mut(&mut self) -> &mut Viewer {
        self.stack.current_mut()
    }

    // --- Status messages ---

    pub fn show_message(&mut self, message: impl Into<String>) {
        self.status = Some((message.into(), Instant::now()));
    }

    pub fn clear_message(&mut self) {
        self.status = None;
    }

    /// The banner text, while within its 3-second lifetime.
    pub fn active_message(&self) -> Option<&str> {
        self.status
            .as_ref()
            .filter(|(_, shown)| shown.elapsed() < MESSAGE_TTL)
            .map(|(m, _)| m.as_str())
    }

    /// Whether a banner is pending (possibly awaiting expiry redraw).
    pub fn message_pending(&self) -> bool {
        self.status.is_some()
    }

    // --- Per-frame maintenance (event-loop thread only) ---

    pub fn pre_render(&mut self) {
        self.stack.current_mut().apply_cursor_hint();
        self.stack.root_mut().sync_follow();
        let expired = self
            .status
            .as_ref()
            .is_some_and(|(_, shown)| shown.elapsed() >= MESSAGE_TTL);
        if expired {
            self.status = None;
        }
    }

    // --- Visual mode ---

    pub fn in_visual(&self) -> bool {
        self.visual.is_some()
    }

    pub fn enter_visual_mode(&mut self) {
        let top = self.current().top_line;
        self.visual = Some(Visual {
            anchor: top,
            cursor: top,
        });
    }

    pub fn exit_visual_mode(&mut self) {
        self.visual = None;
    }

    /// Inclusive selected line range, ordered.
    pub fn visual_range(&self) -> Option<(usize, usize)> {
        self.visual.as_ref().map(|v| {
            if v.anchor <= v.cursor {
                (v.anchor, v.cursor)
            } else {
                (v.cursor, v.anchor)
            }
        })
    }

    /// `(start, end, cursor)` for the visual-mode status bar.
    pub fn visual_status(&self) -> Option<(usize, usize, usize)> {
        let cursor = self.visual.as_ref()?.cursor;
        let (start, end) = self.visual_range()?;
        Some((start, end, cursor))
    }

    pub fn visual_cursor_down(&mut self) {
        let count = self.current().line_count();
        let height = self.current().height;
        if let Some(v) = self.visual.as_mut() {
            if v.cursor + 1 < count {
                v.cursor += 1;
                let viewer = self.stack.current_mut();
                if v.cursor >= viewer.top_line + height {
                    viewer.top_line += 1;
                }
            }
        }
    }

    pub fn visual_cursor_up(&mut self) {
        if let Some(v) = self.visual.as_mut() {
            if v.cursor > 0 {
                v.cursor -= 1;
                let viewer = self.stack.current_mut();
                if v.cursor < viewer.top_line {
                    viewer.top_line = viewer.top_line.saturating_sub(1);
                }
            }
        }
    }

    pub fn visual_page_down(&mut self) {
        let count = self.current().line_count();
        let height = self.current().height;
        if let Some(v) = self.visual.as_mut() {
            v.cursor = (v.cursor + height).min(count.saturating_sub(1));
            let viewer = self.stack.current_mut();
            if v.cursor >= viewer.top_line + height {
                viewer.top_line = (v.cursor + 1).saturating_sub(height);
            }
        }
    }

    pub fn visual_page_up(&mut self) {
        let height = self.current().height;
        if let Some(v) = self.visual.as_mut() {
            v.cursor = v.cursor.saturating_sub(height);
            let viewer = self.stack.current_mut();
            if v.cursor < viewer.top_line {
                viewer.top_line = v.cursor;
            }
        }
    }

    pub fn visual_go_to_start(&mut self) {
        if let Some(v) = self.visual.as_mut() {
            v.cursor = 0;
            self.stack.current_mut().top_line = 0;
        }
    }

    pub fn visual_go_to_end(&mut self) {
        let count = self.current().line_count();
        let height = self.current().height;
        if let Some(v) = self.visual.as_mut() {
            v.cursor = count.saturating_sub(1);
            let viewer = self.stack.current_mut();
            if v.cursor >= viewer.top_line + height {
                viewer.top_line = (v.cursor + 1).saturating_sub(height);
            }
        }
    }

    /// Copy the selection (ANSI-stripped) to the clipboard and leave
    /// visual mode.
    pub fn yank_visual(&mut self) {
        let Some((start, end)) = self.visual_range() else {
            return;
        };
        let buf = self.current().buffer().clone();
        let lines: Vec<String> = (start..=end).map(|i| strip_ansi(&buf.line(i))).collect();
        self.visual = None;

        match clipboard::copy_to_clipboard(&lines.join("\n")) {
            Ok(()) => self.show_message(format!("Yanked {} line(s)", end - start + 1)),
            Err(e) => self.show_message(format!("Clipboard error: {e}")),
        }
    }

    // --- Filters ---

    /// Push a keep/exclude filter viewer; populates in the background.
    pub fn apply_filter(&mut self, record: &QueryRecord, keep: bool) {
        let matcher = match Matcher::new(&record.query, record.is_regex, record.ignore_case) {
            Ok(m) => m,
            Err(e) => {
                self.show_message(e.to_string());
                return;
            }
        };

        let current = self.stack.current();
        let parent_top = current.top_line;
        let snapshot = Arc::new(current.buffer().snapshot());
        let label = current.label.clone();

        let buf = filter::spawn_filter(snapshot, matcher, keep, parent_top, self.interrupt.clone());
        self.stack.push(Viewer::new(buf, label));
        self.search.clear();
    }

    /// Push an append-from-origin viewer (`+`): the current view widened
    /// with root lines matching the pattern, in root order.
    pub fn apply_append_filter(&mut self, record: &QueryRecord) {
        let matcher = match Matcher::new(&record.query, record.is_regex, record.ignore_case) {
            Ok(m) => m,
            Err(e) => {
                self.show_message(e.to_string());
                return;
            }
        };

        let current = self.stack.current();
        let top_text = current.buffer().line(current.top_line);
        let parent = Arc::new(current.buffer().snapshot());
        let root = Arc::new(self.stack.root().buffer().snapshot());
        let label = current.label.clone();

        let buf =
            filter::spawn_append_filter(root, parent, matcher, top_text, self.interrupt.clone());
        self.stack.push(Viewer::new(buf, label));
        self.search.clear();
    }

    /// Pop (`U`) or reset (`=`) the stack; search results die with it.
    pub fn stack_nav(&mut self, reset: bool) {
        if reset {
            self.stack.reset();
        } else {
            self.stack.pop();
        }
        self.search.clear();
    }

    // --- Search ---

    pub fn apply_search(&mut self, record: &QueryRecord, backward: bool) {
        if record.query.is_empty() {
            return;
        }
        let snapshot = self.stack.current().buffer().snapshot();
        let start = self.stack.current().top_line;
        let hit = self.search.search(
            &snapshot,
            &record.query,
            start,
            backward,
            record.is_regex,
            record.ignore_case,
        );
        match hit {
            Some(idx) => {
                let viewer = self.stack.current_mut();
                viewer.top_line = idx;
                viewer.top_line_offset = 0;
            }
            None if self.search.has_results() => {
                self.show_message(if backward {
                    "BOF - no more matches"
                } else {
                    "EOF - no more matches"
                });
            }
            None => {}
        }
    }

    /// `n` continues in the recorded direction, `N` inverts it. At the
    /// boundary the cursor stays and a BOF/EOF banner appears.
    pub fn search_nav(&mut self, reverse: bool) {
        if !self.search.has_results() {
            return;
        }
        let top = self.stack.current().top_line;
        let going_up = self.search.backward != reverse;
        let hit = if going_up {
            self.search.last_before(top)
        } else {
            self.search.first_after(top)
        };
        match hit {
            Some(idx) => {
                let viewer = self.stack.current_mut();
                viewer.top_line = idx;
                viewer.top_line_offset = 0;
            }
            None => self.show_message(if going_up { "BOF" } else { "EOF" }),
        }
    }

    // --- Simple prompt-backed commands ---

    pub fn apply_goto(&mut self, input: &str) {
        match input.parse::<i64>() {
            Ok(n) => {
                let idx = n.saturating_sub(1).max(0) as usize;
                self.stack.current_mut().go_to_line(idx);
            }
            Err(_) => self.show_message("Invalid line number"),
        }
    }

    pub fn export_to(&mut self, path: &str) {
        let lines = self.stack.current().buffer().snapshot().lines;
        match std::fs::write(path, lines.join("\n")) {
            Ok(()) => self.show_message(format!("Saved {} lines to {}", lines.len(), path)),
            Err(e) => self.show_message(format!("Error: {e}")),
        }
    }

    pub fn apply_sticky(&mut self, input: &str) {
        if input.is_empty() {
            self.stack.current_mut().sticky_left = 0;
            self.show_message("Sticky left disabled");
            return;
        }
        match input.parse::<usize>() {
            Ok(0) => {
                self.stack.current_mut().sticky_left = 0;
                self.show_message("Sticky left disabled");
            }
            Ok(n) => {
                self.stack.current_mut().sticky_left = n;
                self.show_message(format!("Sticky left: {n} chars"));
            }
            Err(_) => self.show_message("Invalid number"),
        }
    }

    pub fn set_timestamp_format(&mut self, input: &str) {
        if input.is_empty() {
            self.timestamp_format = None;
            self.show_message("Timestamp format cleared");
        } else {
            self.timestamp_format = Some(input.to_string());
            self.show_message(format!("Format set: {input}"));
        }
    }

    /// Follow is a root-viewer mode; toggling on spawns the tailer and
    /// jumps to the tail.
    pub fn toggle_follow(&mut self) {
        let Some(path) = self.follow_path.clone() else {
            self.show_message("Follow mode requires a file source");
            return;
        };

        let enabled = {
            let interrupt = self.interrupt.clone();
            let root = self.stack.root_mut();
            if root.follow_enabled() {
                root.set_follow(false);
                false
            } else {
                root.set_follow(true);
                ingest::start_follow_tailer(
                    path,
                    root.buffer().clone(),
                    root.follow_flag(),
                    interrupt,
                );
                root.go_to_end();
                true
            }
        };
        self.show_message(if enabled {
            "Follow mode ON"
        } else {
            "Follow mode OFF"
        });
    }

    /// `b`: jump forward to the first line whose timestamp is at or past
    /// the target given as `hhmmss` or `yymmddhhmmss`.
    pub fn jump_to_timestamp(&mut self, input: &str) {
        if input.len() != 6 && input.len() != 12 {
            self.show_message("Enter 6 (hhmmss) or 12 (yymmddhhmmss) digits");
            return;
        }
        if !input.bytes().all(|b| b.is_ascii_digit()) {
            self.show_message("Enter digits only");
            return;
        }

        let field = |range: std::ops::Range<usize>| -> u32 {
            input[range].parse().unwrap_or(0)
        };
        let today = Local::now().date_naive();
        let time_only = input.len() == 6;
        let target = if time_only {
            today.and_hms_opt(field(0..2), field(2..4), field(4..6))
        } else {
            let yy = field(0..2) as i32;
            let year = if yy > 50 { 1900 + yy } else { 2000 + yy };
            NaiveDate::from_ymd_opt(year, field(2..4), field(4..6))
                .and_then(|d| d.and_hms_opt(field(6..8), field(8..10), field(10..12)))
        };
        let Some(target) = target else {
            self.show_message("Invalid timestamp");
            return;
        };

        let format = match &self.timestamp_format {
            Some(f) => f.clone(),
            None => {
                let viewer = self.stack.current();
                let line = viewer.buffer().line(viewer.top_line);
                match detect_format(&line) {
                    Some(f) => f.to_string(),
                    None => {
                        self.show_message("Couldn't detect timestamp format. Use 't' to set.");
                        return;
                    }
                }
            }
        };

        let snapshot = self.stack.current().buffer().snapshot();
        let start = self.stack.current().top_line;
        for (i, line) in snapshot.lines.iter().enumerate().skip(start) {
            if let Some(mut ts) = extract_timestamp(line, &format) {
                if time_only {
                    // Compare on today's date when only a time was given
                    ts = NaiveDateTime::new(today, ts.time());
                }
                if ts >= target {
                    self.stack.current_mut().go_to_line(i);
                    self.show_message(format!("Found at line {}", i + 1));
                    return;
                }
            }
        }
        self.show_message("No matching timestamp found");
    }
}

/// Block on the help overlay until any key press.
fn show_help<B: Backend>(terminal: &mut Terminal<B>) -> Result<()> {
    loop {
        terminal.draw(|f| ui::render_help(f))?;
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Release {
                return Ok(());
            }
        }
    }
}

/// Route one key press to its command. Prompting commands run their modal
/// editor inline, which is why the terminal comes along.
pub fn dispatch_key<B: Backend>(
    app: &mut App,
    terminal: &mut Terminal<B>,
    key: KeyEvent,
) -> Result<()> {
    if key.kind == KeyEventKind::Release {
        return Ok(());
    }
    app.clear_message();

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => app.should_quit = true,
        KeyCode::Char('d') if ctrl => {
            if app.in_visual() {
                app.visual_page_down();
            } else {
                app.current_mut().page_down();
            }
        }
        KeyCode::Char('u') if ctrl => {
            if app.in_visual() {
                app.visual_page_up();
            } else {
                app.current_mut().page_up();
            }
        }

        KeyCode::Char('q') => {
            if app.in_visual() {
                app.exit_visual_mode();
            } else {
                app.should_quit = true;
            }
        }
        KeyCode::Char('j') | KeyCode::Down => {
            if app.in_visual() {
                app.visual_cursor_down();
            } else {
                app.current_mut().navigate_down();
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            if app.in_visual() {
                app.visual_cursor_up();
            } else {
                app.current_mut().navigate_up();
            }
        }
        KeyCode::Char(' ') | KeyCode::PageDown => {
            if app.in_visual() {
                app.visual_page_down();
            } else {
                app.current_mut().page_down();
            }
        }
        KeyCode::PageUp => {
            if app.in_visual() {
                app.visual_page_up();
            } else {
                app.current_mut().page_up();
            }
        }
        KeyCode::Char('g') | KeyCode::Home => {
            if app.in_visual() {
                app.visual_go_to_start();
            } else {
                app.current_mut().go_to_start();
            }
        }
        KeyCode::Char('G') | KeyCode::End => {
            if app.in_visual() {
                app.visual_go_to_end();
            } else {
                app.current_mut().go_to_end();
            }
        }

        KeyCode::Char('h') | KeyCode::Left => app.current_mut().scroll_left(HORIZONTAL_STEP),
        KeyCode::Char('l') | KeyCode::Right => app.current_mut().scroll_right(HORIZONTAL_STEP),
        KeyCode::Char('<') => app.current_mut().scroll_left(1),
        KeyCode::Char('>') => app.current_mut().scroll_right(1),

        KeyCode::Char('w') => app.current_mut().toggle_word_wrap(),
        KeyCode::Char('f') => app.current_mut().toggle_json_pretty(),
        KeyCode::Char('F') => app.toggle_follow(),

        KeyCode::Char('&') => {
            if let Some(record) = prompt_query(terminal, app, "&")? {
                if !record.query.is_empty() {
                    app.apply_filter(&record, true);
                }
            }
        }
        KeyCode::Char('-') => {
            if let Some(record) = prompt_query(terminal, app, "-")? {
                if !record.query.is_empty() {
                    app.apply_filter(&record, false);
                }
            }
        }
        KeyCode::Char('+') => {
            if let Some(record) = prompt_query(terminal, app, "+")? {
                if !record.query.is_empty() {
                    app.apply_append_filter(&record);
                }
            }
        }
        KeyCode::Char('=') => app.stack_nav(true),
        KeyCode::Char('U') => app.stack_nav(false),

        KeyCode::Char('/') => {
            if let Some(record) = prompt_query(terminal, app, "/")? {
                app.apply_search(&record, false);
            }
        }
        KeyCode::Char('?') => {
            if let Some(record) = prompt_query(terminal, app, "?")? {
                app.apply_search(&record, true);
            }
        }
        KeyCode::Char('n') => app.search_nav(false),
        KeyCode::Char('N') => app.search_nav(true),

        KeyCode::Char(':') => {
            if let Some(input) = prompt_text(terminal, app, ":")? {
                if !input.is_empty() {
                    app.apply_goto(&input);
                }
            }
        }
        KeyCode::Char(';') => {
            if let Some(path) = prompt_text(terminal, app, ";")? {
                if !path.is_empty() {
                    app.export_to(&path);
                }
            }
        }
        KeyCode::Char('K') => {
            if let Some(input) = prompt_text(terminal, app, "K (sticky cols): ")? {
                app.apply_sticky(&input);
            }
        }
        KeyCode::Char('t') => {
            if let Some(input) = prompt_text(terminal, app, "t (timestamp format): ")? {
                app.set_timestamp_format(&input);
            }
        }
        KeyCode::Char('b') => {
            if let Some(input) = prompt_text(terminal, app, "b (timestamp [yymmdd]hhmmss): ")? {
                if !input.is_empty() {
                    app.jump_to_timestamp(&input);
                }
            }
        }

        KeyCode::Char('v') => {
            if !app.in_visual() {
                app.enter_visual_mode();
            }
        }
        KeyCode::Char('y') => {
            if app.in_visual() {
                app.yank_visual();
            }
        }
        KeyCode::Esc => {
            if app.in_visual() {
                app.exit_visual_mode();
            }
        }

        KeyCode::Char('H') | KeyCode::F(1) => show_help(terminal)?,
        _ => {}
    }
    Ok(())
}
