//! Full-screen key-binding reference, dismissed by any key.

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

struct Section {
    title: &'static str,
    entries: &'static [(&'static str, &'static str)],
}

const SECTIONS: &[Section] = &[
    Section {
        title: "Navigation",
        entries: &[
            ("j / ↓", "Move down one line"),
            ("k / ↑", "Move up one line"),
            ("h / ←", "Scroll left"),
            ("l / →", "Scroll right"),
            ("< / >", "Scroll left/right by 1 char"),
            ("g / Home", "Go to first line"),
            ("G / End", "Go to last line"),
            ("Ctrl+D/Space/PgDn", "Page down"),
            ("Ctrl+U/PgUp", "Page up"),
            (":<number>", "Go to specific line number"),
        ],
    },
    Section {
        title: "Search",
        entries: &[
            ("/", "Search forward"),
            ("?", "Search backward"),
            ("n", "Next match"),
            ("N", "Previous match"),
            ("Ctrl+R", "Toggle regex mode (in prompt)"),
            ("Ctrl+I", "Toggle case-insensitive (in prompt)"),
        ],
    },
    Section {
        title: "Timestamp",
        entries: &[
            ("t", "Set timestamp format (strftime)"),
            ("b", "Jump to timestamp ([yymmdd]hhmmss)"),
        ],
    },
    Section {
        title: "Filters",
        entries: &[
            ("&", "Keep lines matching pattern"),
            ("-", "Exclude lines matching pattern"),
            ("+", "Add matching from original file"),
            ("=", "Reset to original file"),
            ("U", "Pop last filter (go back one level)"),
        ],
    },
    Section {
        title: "Display",
        entries: &[
            ("w", "Toggle word wrap"),
            ("f", "Toggle JSON pretty-print"),
            ("F", "Toggle follow mode (tail -f)"),
            ("K", "Set sticky left columns"),
        ],
    },
    Section {
        title: "Selection & Export",
        entries: &[
            ("v", "Enter visual selection mode"),
            ("y", "Yank (copy) selected lines"),
            (";", "Export filtered view to file"),
            ("Esc", "Exit visual mode"),
        ],
    },
    Section {
        title: "Help",
        entries: &[("H / F1", "Show this help screen"), ("q", "Quit")],
    },
];

pub fn render_help(f: &mut Frame) {
    let area = f.area();
    let margin = 2u16;
    let mut width = area.width.saturating_sub(margin * 2);
    if width < 40 {
        width = area.width;
    }
    let mut height = area.height.saturating_sub(margin * 2);
    if height < 20 {
        height = area.height;
    }
    let popup = Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    );

    let mut lines: Vec<Line> = Vec::new();
    for section in SECTIONS {
        lines.push(Line::from(Span::styled(
            section.title,
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )));
        for (key, desc) in section.entries {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("  {key:<18}"),
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(*desc),
            ]));
        }
        lines.push(Line::from(""));
    }
    lines.push(Line::from(Span::styled(
        "Press any key to close",
        Style::default().fg(Color::DarkGray),
    )));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            format!(" sift v{} - Keybindings ", env!("CARGO_PKG_VERSION")),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));

    f.render_widget(Clear, popup);
    f.render_widget(Paragraph::new(lines).block(block), popup);
}
