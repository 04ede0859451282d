//! Body rendering: projecting the current viewer onto screen rows.
//!
//! Both draw paths walk logical lines from `(top_line, top_line_offset)`,
//! expand each into physical lines (JSON mode), and layer the overlays:
//! sticky-left columns, search-match highlight, visual-selection background.

use crate::ansi::{Attr, Cell};
use crate::app::App;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

/// Pastel blue for pinned sticky-left columns.
const STICKY_FG: u8 = 117;
/// Dim gray background for visual selection.
const VISUAL_BG: u8 = 238;

pub(super) fn render_body(f: &mut Frame, app: &mut App) {
    let area = f.area();
    if area.height <= 1 {
        return;
    }
    let body = Rect::new(area.x, area.y, area.width, area.height - 1);
    let rows = build_rows(app);
    f.render_widget(Paragraph::new(rows), body);
}

/// Produce the visible rows for the current viewer state.
pub(crate) fn build_rows(app: &App) -> Vec<Line<'static>> {
    if app.current().word_wrap {
        build_wrapped_rows(app)
    } else {
        build_normal_rows(app)
    }
}

fn style_of(fg: Attr, bg: Attr) -> Style {
    let mut style = Style::default();
    if let Some(c) = fg.color {
        style = style.fg(Color::Indexed(c));
    }
    if let Some(c) = bg.color {
        style = style.bg(Color::Indexed(c));
    }
    if fg.bold {
        style = style.add_modifier(Modifier::BOLD);
    }
    if fg.underline {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    if fg.reverse {
        style = style.add_modifier(Modifier::REVERSED);
    }
    style
}

/// Overlay precedence: search highlight beats selection beats base style.
fn cell_style(cell: &Cell, matched: bool, in_selection: bool, sticky: bool) -> Style {
    if matched {
        return Style::default().fg(Color::Black).bg(Color::Yellow);
    }
    let mut style = if sticky {
        Style::default().fg(Color::Indexed(STICKY_FG))
    } else {
        style_of(cell.fg, cell.bg)
    };
    if in_selection {
        style = style.bg(Color::Indexed(VISUAL_BG));
    }
    style
}

/// Accumulates cells into style-merged spans.
struct RowBuilder {
    spans: Vec<Span<'static>>,
    run: String,
    run_style: Style,
}

impl RowBuilder {
    fn new() -> Self {
        Self {
            spans: Vec::new(),
            run: String::new(),
            run_style: Style::default(),
        }
    }

    fn push(&mut self, ch: char, style: Style) {
        if style != self.run_style && !self.run.is_empty() {
            let text = std::mem::take(&mut self.run);
            self.spans.push(Span::styled(text, self.run_style));
        }
        self.run_style = style;
        self.run.push(ch);
    }

    fn finish(mut self) -> Line<'static> {
        if !self.run.is_empty() {
            self.spans.push(Span::styled(self.run, self.run_style));
        }
        Line::from(self.spans)
    }
}

fn build_normal_rows(app: &App) -> Vec<Line<'static>> {
    let viewer = app.current();
    let buf = viewer.buffer();
    let line_count = buf.len();
    let width = viewer.width;
    let height = viewer.height;
    let visual = app.visual_range();

    let sticky_width = if viewer.sticky_left > 0 {
        viewer.sticky_left.min(width / 2)
    } else {
        0
    };

    let mut rows = Vec::with_capacity(height);
    let mut line_index = viewer.top_line;
    let mut skip_rows = viewer.top_line_offset;

    while rows.len() < height && line_index < line_count {
        let line = buf.line(line_index);
        let in_selection = visual.is_some_and(|(s, e)| line_index >= s && line_index <= e);

        for render_line in viewer.physical_lines(&line) {
            if skip_rows > 0 {
                skip_rows -= 1;
                continue;
            }
            if rows.len() >= height {
                break;
            }

            let cells = crate::ansi::parse_cells(&render_line);
            let mask = app.search.match_positions(&cells);
            let matched = |i: usize| mask.as_ref().is_some_and(|m| m.get(i).copied().unwrap_or(false));

            let mut builder = RowBuilder::new();
            let mut screen_x = 0;

            if sticky_width > 0 {
                // Pinned leading columns, immune to horizontal scroll
                for (i, cell) in cells.iter().enumerate().take(sticky_width) {
                    if screen_x >= width {
                        break;
                    }
                    builder.push(cell.ch, cell_style(cell, matched(i), in_selection, true));
                    screen_x += 1;
                }
                let start_col = viewer.left_col.max(sticky_width);
                for (i, cell) in cells.iter().enumerate().skip(start_col) {
                    if screen_x >= width {
                        break;
                    }
                    builder.push(cell.ch, cell_style(cell, matched(i), in_selection, false));
                    screen_x += 1;
                }
            } else {
                for (i, cell) in cells.iter().enumerate().skip(viewer.left_col) {
                    if screen_x >= width {
                        break;
                    }
                    builder.push(cell.ch, cell_style(cell, matched(i), in_selection, false));
                    screen_x += 1;
                }
            }

            if in_selection {
                let pad = Style::default().bg(Color::Indexed(VISUAL_BG));
                while screen_x < width {
                    builder.push(' ', pad);
                    screen_x += 1;
                }
            }
            rows.push(builder.finish());
        }
        line_index += 1;
    }
    rows
}

fn build_wrapped_rows(app: &App) -> Vec<Line<'static>> {
    let viewer = app.current();
    let buf = viewer.buffer();
    let line_count = buf.len();
    let width = viewer.width;
    let height = viewer.height;
    if width == 0 {
        return Vec::new();
    }

    let mut rows = Vec::with_capacity(height);
    let mut line_index = viewer.top_line;
    let mut skip_rows = viewer.top_line_offset;

    while rows.len() < height && line_index < line_count {
        let line = buf.line(line_index);

        for render_line in viewer.physical_lines(&line) {
            let cells = crate::ansi::parse_cells(&render_line);
            let mask = app.search.match_positions(&cells);
            let matched = |i: usize| mask.as_ref().is_some_and(|m| m.get(i).copied().unwrap_or(false));

            if cells.is_empty() {
                if skip_rows > 0 {
                    skip_rows -= 1;
                } else if rows.len() < height {
                    rows.push(Line::default());
                }
                continue;
            }

            let mut cell_idx = 0;
            while cell_idx < cells.len() {
                if skip_rows > 0 {
                    skip_rows -= 1;
                    cell_idx += width;
                    continue;
                }
                if rows.len() >= height {
                    break;
                }

                let mut builder = RowBuilder::new();
                let end = (cell_idx + width).min(cells.len());
                for (i, cell) in cells.iter().enumerate().take(end).skip(cell_idx) {
                    builder.push(cell.ch, cell_style(cell, matched(i), false, false));
                }
                rows.push(builder.finish());
                cell_idx = end;
            }
        }
        line_index += 1;
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::App;
    use crate::viewer::Viewer;

    fn test_app(lines: &[&str], width: usize, height: usize) -> App {
        let mut app = App::for_test(Viewer::from_lines(lines.iter().copied()));
        // resize() reserves one row for the status bar
        app.current_mut().resize(width, height + 1);
        app
    }

    fn row_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_normal_rows_basic() {
        let app = test_app(&["alpha", "beta", "gamma"], 20, 2);
        let rows = build_rows(&app);
        assert_eq!(rows.len(), 2);
        assert_eq!(row_text(&rows[0]), "alpha");
        assert_eq!(row_text(&rows[1]), "beta");
    }

    #[test]
    fn test_normal_rows_start_at_top_line() {
        let mut app = test_app(&["alpha", "beta", "gamma"], 20, 2);
        app.current_mut().top_line = 2;
        let rows = build_rows(&app);
        assert_eq!(rows.len(), 1);
        assert_eq!(row_text(&rows[0]), "gamma");
    }

    #[test]
    fn test_normal_rows_horizontal_scroll() {
        let mut app = test_app(&["0123456789"], 4, 1);
        app.current_mut().left_col = 3;
        let rows = build_rows(&app);
        assert_eq!(row_text(&rows[0]), "3456");
    }

    #[test]
    fn test_wrapped_rows_chunking() {
        let mut app = test_app(&["abcdefghij"], 4, 5);
        app.current_mut().word_wrap = true;
        let rows = build_rows(&app);
        assert_eq!(rows.len(), 3);
        assert_eq!(row_text(&rows[0]), "abcd");
        assert_eq!(row_text(&rows[1]), "efgh");
        assert_eq!(row_text(&rows[2]), "ij");
    }

    #[test]
    fn test_wrapped_rows_respect_offset() {
        let mut app = test_app(&["abcdefghij", "next"], 4, 5);
        app.current_mut().word_wrap = true;
        app.current_mut().top_line_offset = 2;
        let rows = build_rows(&app);
        assert_eq!(row_text(&rows[0]), "ij");
        assert_eq!(row_text(&rows[1]), "next");
    }

    #[test]
    fn test_wrapped_empty_line_gets_a_row() {
        let mut app = test_app(&["", "after"], 4, 5);
        app.current_mut().word_wrap = true;
        let rows = build_rows(&app);
        assert_eq!(rows.len(), 2);
        assert_eq!(row_text(&rows[0]), "");
        assert_eq!(row_text(&rows[1]), "after");
    }

    #[test]
    fn test_search_match_highlight_style() {
        let mut app = test_app(&["say hit now"], 20, 1);
        let snapshot = app.current().buffer().snapshot();
        app.search.search(&snapshot, "hit", 0, false, false, false);
        let rows = build_rows(&app);
        let hit_span = rows[0]
            .spans
            .iter()
            .find(|s| s.content.as_ref() == "hit")
            .expect("match must be its own span");
        assert_eq!(hit_span.style.fg, Some(Color::Black));
        assert_eq!(hit_span.style.bg, Some(Color::Yellow));
    }

    #[test]
    fn test_visual_selection_pads_row() {
        let mut app = test_app(&["sel", "not"], 10, 2);
        app.enter_visual_mode();
        let rows = build_rows(&app);
        assert_eq!(row_text(&rows[0]).len(), 10);
        assert_eq!(row_text(&rows[1]), "not");
        let pad_span = rows[0].spans.last().unwrap();
        assert_eq!(pad_span.style.bg, Some(Color::Indexed(VISUAL_BG)));
    }

    #[test]
    fn test_sticky_left_pins_prefix_under_scroll() {
        let mut app = test_app(&["PIN|abcdefghij"], 20, 1);
        app.current_mut().sticky_left = 4;
        app.current_mut().left_col = 8;
        let rows = build_rows(&app);
        // First 4 columns come from the line start, rest from left_col
        assert_eq!(row_text(&rows[0]), "PIN|efghij");
        let first = &rows[0].spans[0];
        assert_eq!(first.style.fg, Some(Color::Indexed(STICKY_FG)));
    }

    #[test]
    fn test_sticky_capped_at_half_width() {
        let mut app = test_app(&["abcdefghijkl"], 8, 1);
        app.current_mut().sticky_left = 100;
        let rows = build_rows(&app);
        // Cap is width/2 = 4 sticky cells, remainder continues from there
        assert_eq!(row_text(&rows[0]), "abcdefgh");
    }

    #[test]
    fn test_json_mode_expands_physical_lines() {
        let mut app = test_app(&[r#"log: {"a":1}"#], 40, 5);
        app.current_mut().json_pretty = true;
        let rows = build_rows(&app);
        assert_eq!(row_text(&rows[0]), "log: ");
        assert_eq!(row_text(&rows[1]), "{");
        assert!(row_text(&rows[2]).contains("\"a\": 1"));
        assert_eq!(row_text(&rows[3]), "}");
    }

    #[test]
    fn test_ansi_styles_reach_spans() {
        let app = test_app(&["\x1b[31mred\x1b[0m rest"], 20, 1);
        let rows = build_rows(&app);
        let red = &rows[0].spans[0];
        assert_eq!(red.content.as_ref(), "red");
        assert_eq!(red.style.fg, Some(Color::Indexed(1)));
    }
}
