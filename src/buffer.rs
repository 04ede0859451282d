//! Concurrent append-only line storage shared between producers and the UI.
//!
//! Producers (file readers, the merger, the follow tailer, filter workers)
//! extend the buffer under the write lock; the event loop takes consistent
//! read-lock snapshots. The three parallel vectors (`lines`, `has_ansi`,
//! `origin`) only ever grow together, so any read sees equal lengths.

use crate::ansi::has_escape;
use std::sync::{Arc, RwLock};

/// An owned copy of the buffer's contents, safe to hand to worker threads.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub lines: Vec<String>,
    pub has_ansi: Vec<bool>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// ANSI flag for a line, false when out of range.
    pub fn flag(&self, idx: usize) -> bool {
        self.has_ansi.get(idx).copied().unwrap_or(false)
    }
}

#[derive(Debug, Default)]
struct Inner {
    lines: Vec<String>,
    has_ansi: Vec<bool>,
    /// Parent line index per line; empty for root buffers.
    origin: Vec<usize>,
    loading: bool,
    /// One-shot top-line suggestion from a background filter, consumed by
    /// the event loop on the next frame.
    cursor_hint: Option<usize>,
}

/// Handle to a lock-guarded line buffer. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<RwLock<Inner>>,
}

impl SharedBuffer {
    /// An empty buffer; `loading` marks whether a producer will populate it.
    pub fn new(loading: bool) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                loading,
                ..Inner::default()
            })),
        }
    }

    /// Build a completed root buffer from plain lines (tests, small inputs).
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let buf = Self::new(false);
        let lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        let flags: Vec<bool> = lines.iter().map(|l| has_escape(l)).collect();
        buf.extend(lines, flags);
        buf
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().expect("line buffer lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().expect("line buffer lock poisoned")
    }

    pub fn len(&self) -> usize {
        self.read().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().lines.is_empty()
    }

    /// A line by index, empty when out of range.
    pub fn line(&self, idx: usize) -> String {
        self.read().lines.get(idx).cloned().unwrap_or_default()
    }

    /// Copy lines and ANSI flags under one read lock.
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.read();
        Snapshot {
            lines: inner.lines.clone(),
            has_ansi: inner.has_ansi.clone(),
        }
    }

    /// Append a batch of lines with precomputed ANSI flags.
    pub fn extend(&self, lines: Vec<String>, has_ansi: Vec<bool>) {
        debug_assert_eq!(lines.len(), has_ansi.len());
        let mut inner = self.write();
        inner.lines.extend(lines);
        inner.has_ansi.extend(has_ansi);
    }

    /// Append a filtered batch carrying parent-line back-references.
    pub fn extend_filtered(&self, lines: Vec<String>, has_ansi: Vec<bool>, origin: Vec<usize>) {
        debug_assert_eq!(lines.len(), has_ansi.len());
        debug_assert_eq!(lines.len(), origin.len());
        let mut inner = self.write();
        inner.lines.extend(lines);
        inner.has_ansi.extend(has_ansi);
        inner.origin.extend(origin);
    }

    pub fn is_loading(&self) -> bool {
        self.read().loading
    }

    pub fn set_loading(&self, loading: bool) {
        self.write().loading = loading;
    }

    /// Whether this buffer carries origin back-references (filtered view).
    pub fn has_origin(&self) -> bool {
        !self.read().origin.is_empty()
    }

    /// Parent index of a line, `None` for root buffers or out of range.
    pub fn origin_at(&self, idx: usize) -> Option<usize> {
        self.read().origin.get(idx).copied()
    }

    /// Parent index of the last line, for clamping out-of-range cursors.
    pub fn origin_last(&self) -> Option<usize> {
        self.read().origin.last().copied()
    }

    /// Least index whose origin is >= `target`, clamped to the last entry.
    /// `None` when no origin vector is present.
    pub fn origin_lower_bound(&self, target: usize) -> Option<usize> {
        let inner = self.read();
        if inner.origin.is_empty() {
            return None;
        }
        let idx = inner.origin.partition_point(|&o| o < target);
        Some(idx.min(inner.origin.len() - 1))
    }

    /// Record a suggested top line; only the first suggestion sticks.
    pub fn suggest_cursor(&self, top_line: usize) {
        let mut inner = self.write();
        if inner.cursor_hint.is_none() {
            inner.cursor_hint = Some(top_line);
        }
    }

    pub fn take_cursor_hint(&self) -> Option<usize> {
        self.write().cursor_hint.take()
    }

    /// Equal-length check across the parallel vectors, for assertions.
    pub fn vectors_consistent(&self) -> bool {
        let inner = self.read();
        inner.lines.len() == inner.has_ansi.len()
            && (inner.origin.is_empty() || inner.origin.len() == inner.lines.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_from_lines_sets_flags() {
        let buf = SharedBuffer::from_lines(["plain", "\x1b[31mred\x1b[0m"]);
        let snap = buf.snapshot();
        assert_eq!(snap.len(), 2);
        assert!(!snap.flag(0));
        assert!(snap.flag(1));
    }

    #[test]
    fn test_line_out_of_range_is_empty() {
        let buf = SharedBuffer::from_lines(["a"]);
        assert_eq!(buf.line(0), "a");
        assert_eq!(buf.line(5), "");
    }

    #[test]
    fn test_extend_keeps_vectors_equal() {
        let buf = SharedBuffer::new(true);
        buf.extend(vec!["a".into(), "b".into()], vec![false, false]);
        buf.extend_filtered(vec![], vec![], vec![]);
        assert!(buf.vectors_consistent());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_filtered_origin_queries() {
        let buf = SharedBuffer::new(false);
        buf.extend_filtered(
            vec!["x".into(), "y".into(), "z".into()],
            vec![false, false, false],
            vec![2, 5, 9],
        );
        assert!(buf.has_origin());
        assert_eq!(buf.origin_at(1), Some(5));
        assert_eq!(buf.origin_last(), Some(9));
        assert_eq!(buf.origin_lower_bound(5), Some(1));
        assert_eq!(buf.origin_lower_bound(6), Some(2));
        // Past the end clamps to the last entry
        assert_eq!(buf.origin_lower_bound(100), Some(2));
        assert_eq!(buf.origin_lower_bound(0), Some(0));
    }

    #[test]
    fn test_root_buffer_has_no_origin() {
        let buf = SharedBuffer::from_lines(["a", "b"]);
        assert!(!buf.has_origin());
        assert_eq!(buf.origin_lower_bound(1), None);
    }

    #[test]
    fn test_cursor_hint_first_wins() {
        let buf = SharedBuffer::new(true);
        buf.suggest_cursor(7);
        buf.suggest_cursor(9);
        assert_eq!(buf.take_cursor_hint(), Some(7));
        assert_eq!(buf.take_cursor_hint(), None);
    }

    #[test]
    fn test_concurrent_appends_observe_equal_lengths() {
        let buf = SharedBuffer::new(true);
        let writer = {
            let buf = buf.clone();
            thread::spawn(move || {
                for batch in 0..50 {
                    let lines: Vec<String> =
                        (0..100).map(|i| format!("line {batch}:{i}")).collect();
                    let flags = vec![false; lines.len()];
                    buf.extend(lines, flags);
                }
                buf.set_loading(false);
            })
        };

        while buf.is_loading() {
            assert!(buf.vectors_consistent());
            let snap = buf.snapshot();
            assert_eq!(snap.lines.len(), snap.has_ansi.len());
        }
        writer.join().unwrap();
        assert_eq!(buf.len(), 5000);
    }
}
