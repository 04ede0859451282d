//! The inverse-video status row: position, modes, stack depth, source
//! label, transient messages, and the prompt editor line.

use crate::app::App;
use crate::prompt::PromptState;
use ratatui::{
    layout::{Position, Rect},
    style::{Color, Style},
    text::Line,
    widgets::Paragraph,
    Frame,
};
use unicode_width::UnicodeWidthStr;

fn bar_style() -> Style {
    Style::default().fg(Color::Black).bg(Color::White)
}

fn status_rect(f: &Frame) -> Option<Rect> {
    let area = f.area();
    if area.height == 0 {
        return None;
    }
    Some(Rect::new(area.x, area.bottom() - 1, area.width, 1))
}

pub(super) fn render_status(f: &mut Frame, app: &App) {
    let Some(rect) = status_rect(f) else {
        return;
    };
    let width = rect.width as usize;

    let text = if let Some((start, end, cursor)) = app.visual_status() {
        format!(
            " VISUAL: Line {}/{} | Marked {}-{} ",
            cursor + 1,
            app.current().line_count(),
            start + 1,
            end + 1
        )
    } else if let Some(message) = app.active_message() {
        message.to_string()
    } else {
        normal_status(app)
    };

    let row = padded_row(&text, &app.current().label, width);
    f.render_widget(Paragraph::new(Line::styled(row, bar_style())), rect);
}

fn normal_status(app: &App) -> String {
    let viewer = app.current();
    let line_count = viewer.line_count();
    let depth = app.stack.depth();

    let mut modes = String::new();
    if viewer.follow_enabled() {
        modes.push_str(" [follow]");
    }
    if viewer.word_wrap {
        modes.push_str(" [wrap]");
    }
    if viewer.json_pretty {
        modes.push_str(" [json]");
    }
    if viewer.sticky_left > 0 {
        modes.push_str(&format!(" [K:{}]", viewer.sticky_left));
    }
    if viewer.is_loading() {
        modes.push_str(" [loading...]");
    }

    if depth > 1 {
        let orig_line = app.stack.trace_to_root(viewer.top_line);
        let orig_total = app.stack.root().line_count();
        format!(
            " Line {}/{} | Original {}/{} | Col {}{} | Depth {} | q:quit ",
            viewer.top_line + 1,
            line_count,
            orig_line + 1,
            orig_total,
            viewer.left_col,
            modes,
            depth
        )
    } else {
        format!(
            " Line {}/{} | Col {}{} | Depth {} | q:quit ",
            viewer.top_line + 1,
            line_count,
            viewer.left_col,
            modes,
            depth
        )
    }
}

/// Pad/truncate the status text to the full width, splicing in the
/// right-aligned source label when there is room for it.
fn padded_row(status: &str, label: &str, width: usize) -> String {
    let mut chars: Vec<char> = status.chars().take(width).collect();
    while chars.len() < width {
        chars.push(' ');
    }

    if !label.is_empty() {
        let display = format!(" {label} ");
        let label_width = display.width();
        if label_width < width {
            let start = width - label_width;
            if start > status.chars().count() {
                chars.truncate(start);
                chars.extend(display.chars());
                chars.truncate(width);
            }
        }
    }
    chars.into_iter().collect()
}

/// The in-place prompt editor occupying the status row.
pub(super) fn render_prompt(f: &mut Frame, prompt: &PromptState) {
    let Some(rect) = status_rect(f) else {
        return;
    };
    let width = rect.width as usize;
    let text = prompt.display_line();
    let row = padded_row(&text, "", width);
    f.render_widget(Paragraph::new(Line::styled(row, bar_style())), rect);

    let cursor = text.chars().count();
    if cursor < width {
        f.set_cursor_position(Position::new(rect.x + cursor as u16, rect.y));
    }
}
