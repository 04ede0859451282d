//! Viewer: a line buffer plus everything about how it is currently shown.
//!
//! Navigation is offset-aware: in wrap or JSON mode one logical line spans
//! several screen rows, and `top_line_offset` addresses the sub-row at the
//! top of the screen. The expanded-row memo caches per-line row counts and
//! is keyed by `(word_wrap, json_pretty, width)` so any mode or width change
//! invalidates it wholesale.

use crate::ansi::parse_cells;
use crate::buffer::SharedBuffer;
use crate::json::{format_json, is_json};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const EXPANDED_CACHE_CAPACITY: usize = 4096;

pub struct Viewer {
    buf: SharedBuffer,
    /// Display-only source label (filename, `<stdin>`, or merge legend).
    pub label: String,
    pub top_line: usize,
    pub top_line_offset: usize,
    pub left_col: usize,
    pub width: usize,
    /// Body height: terminal rows minus the status row.
    pub height: usize,
    pub word_wrap: bool,
    pub json_pretty: bool,
    /// Leading columns pinned under horizontal scroll; 0 disables.
    pub sticky_left: usize,
    /// Shared with the follow tailer thread.
    follow: Arc<AtomicBool>,
    /// Line count as of the last frame, for tail-follow detection.
    known_lines: usize,
    expanded_cache: LruCache<usize, usize>,
    cache_key: (bool, bool, usize),
}

impl Viewer {
    pub fn new(buf: SharedBuffer, label: impl Into<String>) -> Self {
        Self {
            buf,
            label: label.into(),
            top_line: 0,
            top_line_offset: 0,
            left_col: 0,
            width: 0,
            height: 0,
            word_wrap: false,
            json_pretty: false,
            sticky_left: 0,
            follow: Arc::new(AtomicBool::new(false)),
            known_lines: 0,
            expanded_cache: LruCache::new(
                NonZeroUsize::new(EXPANDED_CACHE_CAPACITY).expect("nonzero capacity"),
            ),
            cache_key: (false, false, 0),
        }
    }

    /// Convenience for tests and filters over in-memory lines.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(SharedBuffer::from_lines(lines), "")
    }

    pub fn buffer(&self) -> &SharedBuffer {
        &self.buf
    }

    pub fn line_count(&self) -> usize {
        self.buf.len()
    }

    pub fn is_loading(&self) -> bool {
        self.buf.is_loading()
    }

    /// Terminal resized: body keeps all rows but the status one.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height.saturating_sub(1);
    }

    // --- Modes ---

    pub fn toggle_word_wrap(&mut self) {
        self.word_wrap = !self.word_wrap;
        self.left_col = 0;
        self.top_line_offset = 0;
    }

    pub fn toggle_json_pretty(&mut self) {
        self.json_pretty = !self.json_pretty;
        self.top_line_offset = 0;
    }

    pub fn follow_enabled(&self) -> bool {
        self.follow.load(Ordering::Relaxed)
    }

    pub fn set_follow(&mut self, on: bool) {
        self.follow.store(on, Ordering::Relaxed);
    }

    /// Handle for the tailer thread to observe toggles.
    pub fn follow_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.follow)
    }

    // --- Expansion ---

    /// Physical lines for one logical line under the current JSON mode.
    pub fn physical_lines(&self, line: &str) -> Vec<String> {
        if self.json_pretty && is_json(line) {
            format_json(line)
        } else {
            vec![line.to_string()]
        }
    }

    /// Screen rows a logical line occupies under the current modes.
    pub fn expanded_rows(&mut self, idx: usize) -> usize {
        if idx >= self.line_count() || self.width == 0 {
            return 1;
        }

        let key = (self.word_wrap, self.json_pretty, self.width);
        if key != self.cache_key {
            self.expanded_cache.clear();
            self.cache_key = key;
        }
        if let Some(&rows) = self.expanded_cache.get(&idx) {
            return rows;
        }

        let line = self.buf.line(idx);
        let physical = self.physical_lines(&line);
        let rows = if self.word_wrap {
            physical
                .iter()
                .map(|l| {
                    let cells = parse_cells(l).len();
                    if cells == 0 {
                        1
                    } else {
                        cells.div_ceil(self.width)
                    }
                })
                .sum()
        } else {
            physical.len()
        };
        let rows = std::cmp::max(rows, 1);

        self.expanded_cache.put(idx, rows);
        rows
    }

    fn offset_aware(&self) -> bool {
        self.word_wrap || self.json_pretty
    }

    // --- Navigation ---

    pub fn navigate_down(&mut self) {
        let max_top = self.line_count().saturating_sub(1);
        if self.offset_aware() {
            let expanded = self.expanded_rows(self.top_line);
            if self.top_line_offset + 1 < expanded {
                self.top_line_offset += 1;
            } else if self.top_line < max_top {
                self.top_line += 1;
                self.top_line_offset = 0;
            }
        } else if self.top_line < max_top {
            self.top_line += 1;
        }
    }

    pub fn navigate_up(&mut self) {
        if self.offset_aware() {
            if self.top_line_offset > 0 {
                self.top_line_offset -= 1;
            } else if self.top_line > 0 {
                self.top_line -= 1;
                self.top_line_offset = self.expanded_rows(self.top_line) - 1;
            }
        } else if self.top_line > 0 {
            self.top_line -= 1;
        }
    }

    pub fn page_down(&mut self) {
        if self.offset_aware() {
            for _ in 0..self.height {
                self.navigate_down();
            }
        } else {
            let max_top = self.line_count().saturating_sub(1);
            self.top_line = (self.top_line + self.height).min(max_top);
        }
    }

    pub fn page_up(&mut self) {
        if self.offset_aware() {
            for _ in 0..self.height {
                self.navigate_up();
            }
        } else {
            self.top_line = self.top_line.saturating_sub(self.height);
        }
    }

    pub fn go_to_start(&mut self) {
        self.top_line = 0;
        self.top_line_offset = 0;
    }

    pub fn go_to_end(&mut self) {
        self.top_line_offset = 0;
        self.top_line = self.line_count().saturating_sub(1);
    }

    /// Jump to a 0-based line index, clamped to the buffer.
    pub fn go_to_line(&mut self, idx: usize) {
        self.top_line = idx.min(self.line_count().saturating_sub(1));
        self.top_line_offset = 0;
    }

    /// Left is clamped at zero; right is unbounded (lines can be any length).
    pub fn scroll_left(&mut self, amount: usize) {
        self.left_col = self.left_col.saturating_sub(amount);
    }

    pub fn scroll_right(&mut self, amount: usize) {
        self.left_col += amount;
    }

    // --- Background-producer integration ---

    /// Apply a filter worker's top-line suggestion, if one arrived.
    pub fn apply_cursor_hint(&mut self) {
        if let Some(hint) = self.buf.take_cursor_hint() {
            self.top_line = hint;
            self.top_line_offset = 0;
        }
    }

    /// Keep the tail visible while following. Call once per frame: compares
    /// the buffer against the line count last shown, and advances `top_line`
    /// only if the view was already at the bottom.
    pub fn sync_follow(&mut self) {
        let len = self.line_count();
        if self.follow_enabled() && len > self.known_lines {
            let at_bottom = self.top_line + self.height >= self.known_lines;
            if at_bottom {
                self.top_line = len.saturating_sub(self.height);
                self.top_line_offset = 0;
            }
        }
        self.known_lines = len;
    }
}
