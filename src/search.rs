//! Search over a viewer snapshot with directional navigation and
//! renderer-facing match highlighting.

use crate::ansi::{strip_ansi, Cell};
use crate::buffer::Snapshot;
use regex::Regex;
use std::borrow::Cow;

/// Current search results and the parameters that produced them.
///
/// Cleared on every viewer-stack mutation; line indices are only meaningful
/// against the viewer that was searched.
#[derive(Debug, Default)]
pub struct SearchState {
    pub query: String,
    regex: Option<Regex>,
    pub is_regex: bool,
    pub ignore_case: bool,
    /// Matching line indices, strictly ascending.
    pub matches: Vec<usize>,
    /// Position within `matches`.
    pub current: Option<usize>,
    /// True when the producing command searched backward (`?`).
    pub backward: bool,
}

impl SearchState {
    pub fn clear(&mut self) {
        *self = SearchState::default();
    }

    pub fn has_results(&self) -> bool {
        !self.matches.is_empty()
    }

    /// Run a search and pick the starting match relative to `start`.
    ///
    /// Returns the selected line index, or `None` when there is no match on
    /// the requested side (the full match list is still recorded). Invalid
    /// regex patterns degrade to a literal search for the same text.
    pub fn search(
        &mut self,
        snapshot: &Snapshot,
        query: &str,
        start: usize,
        backward: bool,
        is_regex: bool,
        ignore_case: bool,
    ) -> Option<usize> {
        self.query = query.to_string();
        self.is_regex = is_regex;
        self.ignore_case = ignore_case;
        self.backward = backward;
        self.matches.clear();
        self.current = None;
        self.regex = None;

        fn plain<'a>(snapshot: &Snapshot, idx: usize, line: &'a str) -> Cow<'a, str> {
            if snapshot.flag(idx) {
                Cow::Owned(strip_ansi(line))
            } else {
                Cow::Borrowed(line)
            }
        }

        if is_regex {
            let pattern = if ignore_case {
                format!("(?i){query}")
            } else {
                query.to_string()
            };
            let re = Regex::new(&pattern)
                .unwrap_or_else(|_| Regex::new(&regex::escape(query)).expect("escaped literal"));
            for (i, line) in snapshot.lines.iter().enumerate() {
                if re.is_match(&plain(snapshot, i, line)) {
                    self.matches.push(i);
                }
            }
            self.regex = Some(re);
        } else if ignore_case {
            let needle = query.to_lowercase();
            for (i, line) in snapshot.lines.iter().enumerate() {
                if plain(snapshot, i, line).to_lowercase().contains(&needle) {
                    self.matches.push(i);
                }
            }
        } else {
            for (i, line) in snapshot.lines.iter().enumerate() {
                if plain(snapshot, i, line).contains(query) {
                    self.matches.push(i);
                }
            }
        }

        if self.matches.is_empty() {
            return None;
        }

        if backward {
            // Last match at or before the start line
            if let Some(pos) = self.matches.iter().rposition(|&m| m <= start) {
                self.current = Some(pos);
                return Some(self.matches[pos]);
            }
            self.current = Some(0);
        } else {
            // First match at or after the start line
            if let Some(pos) = self.matches.iter().position(|&m| m >= start) {
                self.current = Some(pos);
                return Some(self.matches[pos]);
            }
            self.current = Some(self.matches.len() - 1);
        }
        None
    }

    /// Advance to the next match; `None` at the end without moving.
    pub fn next(&mut self) -> Option<usize> {
        let cur = self.current?;
        if cur + 1 >= self.matches.len() {
            return None;
        }
        self.current = Some(cur + 1);
        Some(self.matches[cur + 1])
    }

    /// Step to the previous match; `None` at the start without moving.
    pub fn prev(&mut self) -> Option<usize> {
        let cur = self.current?;
        if cur == 0 {
            return None;
        }
        self.current = Some(cur - 1);
        Some(self.matches[cur - 1])
    }

    /// First match strictly after `top_line`, recording the new position.
    pub fn first_after(&mut self, top_line: usize) -> Option<usize> {
        let pos = self.matches.iter().position(|&m| m > top_line)?;
        self.current = Some(pos);
        Some(self.matches[pos])
    }

    /// Last match strictly before `top_line`, recording the new position.
    pub fn last_before(&mut self, top_line: usize) -> Option<usize> {
        let pos = self.matches.iter().rposition(|&m| m < top_line)?;
        self.current = Some(pos);
        Some(self.matches[pos])
    }

    /// Per-cell highlight mask for one rendered line.
    ///
    /// `None` when no search is active; otherwise a vector the same length
    /// as `cells` with `true` on every matched position.
    pub fn match_positions(&self, cells: &[Cell]) -> Option<Vec<bool>> {
        if self.query.is_empty() {
            return None;
        }

        let plain: String = cells.iter().map(|c| c.ch).collect();
        let mut mask = vec![false; cells.len()];

        if let Some(ref re) = self.regex {
            for m in re.find_iter(&plain) {
                let start = plain[..m.start()].chars().count();
                let end = plain[..m.end()].chars().count();
                for flag in mask.iter_mut().take(end.min(cells.len())).skip(start) {
                    *flag = true;
                }
            }
        } else {
            let (haystack, needle) = if self.ignore_case {
                (plain.to_lowercase(), self.query.to_lowercase())
            } else {
                (plain.clone(), self.query.clone())
            };
            if needle.is_empty() {
                return Some(mask);
            }
            let needle_chars = needle.chars().count();
            let mut at = 0;
            while let Some(pos) = haystack[at..].find(&needle) {
                let char_pos = haystack[..at + pos].chars().count();
                for flag in mask
                    .iter_mut()
                    .take((char_pos + needle_chars).min(cells.len()))
                    .skip(char_pos)
                {
                    *flag = true;
                }
                at += pos + 1;
                while at < haystack.len() && !haystack.is_char_boundary(at) {
                    at += 1;
                }
                if at >= haystack.len() {
                    break;
                }
            }
        }
        Some(mask)
    }
}
