//! The filter pipeline: parallel chunked matching that populates a new
//! viewer's buffer progressively while the UI keeps running.
//!
//! A snapshot of the parent is split into worker chunks dispatched on the
//! rayon pool; results fan in over a channel tagged with chunk indices and
//! are appended strictly in chunk order, so output order always matches
//! parent order no matter how workers finish.

use crate::ansi::strip_ansi;
use crate::buffer::{SharedBuffer, Snapshot};
use crate::event::Interrupt;
use anyhow::{anyhow, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

const FILTER_WORKERS: usize = 8;
/// Sub-batch size for progressive reveal of results.
const REVEAL_BATCH: usize = 1000;

/// A compiled match predicate shared by filters.
///
/// Lines flagged as carrying ANSI escapes are stripped before matching so
/// patterns never have to account for color codes.
#[derive(Debug)]
pub enum Matcher {
    Literal(String),
    /// Stores the lowercased needle.
    LiteralNoCase(String),
    Regex(Regex),
}

impl Matcher {
    pub fn new(query: &str, is_regex: bool, ignore_case: bool) -> Result<Matcher> {
        if is_regex {
            let pattern = if ignore_case {
                format!("(?i){query}")
            } else {
                query.to_string()
            };
            let re = Regex::new(&pattern).map_err(|e| anyhow!("Invalid regex: {e}"))?;
            Ok(Matcher::Regex(re))
        } else if ignore_case {
            Ok(Matcher::LiteralNoCase(query.to_lowercase()))
        } else {
            Ok(Matcher::Literal(query.to_string()))
        }
    }

    pub fn matches(&self, line: &str, has_ansi: bool) -> bool {
        if has_ansi {
            self.matches_plain(&strip_ansi(line))
        } else {
            self.matches_plain(line)
        }
    }

    fn matches_plain(&self, plain: &str) -> bool {
        match self {
            Matcher::Literal(needle) => plain.contains(needle),
            Matcher::LiteralNoCase(needle) => plain.to_lowercase().contains(needle),
            Matcher::Regex(re) => re.is_match(plain),
        }
    }
}

/// How the new viewer's top line gets seeded as results stream in.
enum CursorSeed {
    /// First retained line whose origin index is >= the parent's top line.
    Origin(usize),
    /// First retained line whose text equals the parent's top-line text.
    LineText(String),
    Done,
}

struct ChunkResult {
    idx: usize,
    lines: Vec<String>,
    flags: Vec<bool>,
    origins: Vec<usize>,
}

/// Keep or exclude lines of `parent` matching `matcher`.
///
/// Returns the new viewer's buffer immediately (`loading = true`); a
/// background task fills it and clears the flag when done. `parent_top`
/// is the parent's top line at the moment the filter was requested.
pub fn spawn_filter(
    parent: Arc<Snapshot>,
    matcher: Matcher,
    keep: bool,
    parent_top: usize,
    interrupt: Interrupt,
) -> SharedBuffer {
    let out = SharedBuffer::new(true);
    let result = out.clone();
    let matcher = Arc::new(matcher);

    thread::spawn(move || {
        let pred = Arc::new(move |_idx: usize, line: &str, has_ansi: bool| {
            matcher.matches(line, has_ansi) == keep
        });
        run_chunked(parent, pred, out, CursorSeed::Origin(parent_top), interrupt);
    });
    result
}

/// Widen the current view: walk the root, retaining lines already present
/// in `parent` (multiset semantics) or matching `matcher`, in root order.
pub fn spawn_append_filter(
    root: Arc<Snapshot>,
    parent: Arc<Snapshot>,
    matcher: Matcher,
    parent_top_text: String,
    interrupt: Interrupt,
) -> SharedBuffer {
    let out = SharedBuffer::new(true);
    let result = out.clone();
    let matcher = Arc::new(matcher);

    thread::spawn(move || {
        // Multiset membership: each parent occurrence claims one root
        // occurrence, in order, so duplicates stay balanced.
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for line in &parent.lines {
            *counts.entry(line.as_str()).or_insert(0) += 1;
        }
        let mut in_current = vec![false; root.len()];
        for (i, line) in root.lines.iter().enumerate() {
            if let Some(c) = counts.get_mut(line.as_str()) {
                if *c > 0 {
                    in_current[i] = true;
                    *c -= 1;
                }
            }
        }

        let in_current = Arc::new(in_current);
        let pred = Arc::new(move |idx: usize, line: &str, has_ansi: bool| {
            in_current[idx] || matcher.matches(line, has_ansi)
        });
        run_chunked(
            root,
            pred,
            out,
            CursorSeed::LineText(parent_top_text),
            interrupt,
        );
    });
    result
}

/// Fan-out over the rayon pool, fan-in in chunk order, progressive append.
fn run_chunked<F>(
    snapshot: Arc<Snapshot>,
    pred: Arc<F>,
    out: SharedBuffer,
    mut seed: CursorSeed,
    interrupt: Interrupt,
) where
    F: Fn(usize, &str, bool) -> bool + Send + Sync + 'static,
{
    let total = snapshot.len();
    let workers = if total < FILTER_WORKERS {
        1
    } else {
        FILTER_WORKERS
    };
    let chunk_size = std::cmp::max(total.div_ceil(workers), 1);

    let (tx, rx) = mpsc::channel::<ChunkResult>();
    let mut spawned = 0;
    for w in 0..workers {
        let start = w * chunk_size;
        if start >= total {
            break;
        }
        let end = (start + chunk_size).min(total);
        spawned += 1;

        let tx = tx.clone();
        let snapshot = Arc::clone(&snapshot);
        let pred = Arc::clone(&pred);
        rayon::spawn(move || {
            let mut lines = Vec::new();
            let mut flags = Vec::new();
            let mut origins = Vec::new();
            for i in start..end {
                let has_ansi = snapshot.flag(i);
                if pred(i, &snapshot.lines[i], has_ansi) {
                    lines.push(snapshot.lines[i].clone());
                    flags.push(has_ansi);
                    origins.push(i);
                }
            }
            let _ = tx.send(ChunkResult {
                idx: w,
                lines,
                flags,
                origins,
            });
        });
    }
    drop(tx);

    let mut pending: Vec<Option<ChunkResult>> = (0..workers).map(|_| None).collect();
    let mut next = 0;
    let mut emitted = 0usize;
    let mut received = 0;
    while received < spawned {
        let Ok(chunk) = rx.recv() else {
            break;
        };
        received += 1;
        let slot = chunk.idx;
        pending[slot] = Some(chunk);
        // Append every chunk that is now contiguous with what was emitted
        while next < workers {
            let Some(ready) = pending[next].take() else {
                break;
            };
            append_chunk(&out, ready, &mut emitted, &mut seed, &interrupt);
            next += 1;
        }
    }

    out.set_loading(false);
    interrupt.wake();
}

fn append_chunk(
    out: &SharedBuffer,
    chunk: ChunkResult,
    emitted: &mut usize,
    seed: &mut CursorSeed,
    interrupt: &Interrupt,
) {
    // Seed the cursor before appending so positions are output-relative.
    match seed {
        CursorSeed::Origin(target) => {
            if let Some(j) = chunk.origins.iter().position(|&o| o >= *target) {
                out.suggest_cursor(*emitted + j);
                *seed = CursorSeed::Done;
            }
        }
        CursorSeed::LineText(text) => {
            if let Some(j) = chunk.lines.iter().position(|l| *l == *text) {
                out.suggest_cursor(*emitted + j);
                *seed = CursorSeed::Done;
            }
        }
        CursorSeed::Done => {}
    }

    let ChunkResult {
        mut lines,
        mut flags,
        mut origins,
        ..
    } = chunk;
    while !lines.is_empty() {
        let take = lines.len().min(REVEAL_BATCH);
        let batch_lines: Vec<String> = lines.drain(..take).collect();
        let batch_flags: Vec<bool> = flags.drain(..take).collect();
        let batch_origins: Vec<usize> = origins.drain(..take).collect();
        *emitted += batch_lines.len();
        out.extend_filtered(batch_lines, batch_flags, batch_origins);
        interrupt.wake();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SharedBuffer;
    use std::time::{Duration, Instant};

    fn snap(lines: &[&str]) -> Arc<Snapshot> {
        Arc::new(SharedBuffer::from_lines(lines.iter().copied()).snapshot())
    }

    fn wait_complete(buf: &SharedBuffer) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while buf.is_loading() {
            assert!(Instant::now() < deadline, "filter did not complete");
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn origins_of(buf: &SharedBuffer) -> Vec<usize> {
        (0..buf.len()).filter_map(|i| buf.origin_at(i)).collect()
    }

    #[test]
    fn test_keep_filter_case_insensitive() {
        let parent = snap(&["Apple", "BANANA", "cherry", "apple pie"]);
        let matcher = Matcher::new("apple", false, true).unwrap();
        let out = spawn_filter(parent, matcher, true, 0, Interrupt::new());
        wait_complete(&out);

        let result = out.snapshot();
        assert_eq!(result.lines, vec!["Apple", "apple pie"]);
        assert_eq!(origins_of(&out), vec![0, 3]);
        assert_eq!(out.take_cursor_hint(), Some(0));
    }

    #[test]
    fn test_exclude_filter() {
        let parent = snap(&["keep", "drop it", "keep too", "drop"]);
        let matcher = Matcher::new("drop", false, false).unwrap();
        let out = spawn_filter(parent, matcher, false, 0, Interrupt::new());
        wait_complete(&out);

        assert_eq!(out.snapshot().lines, vec!["keep", "keep too"]);
        assert_eq!(origins_of(&out), vec![0, 2]);
    }

    #[test]
    fn test_regex_filter() {
        let parent = snap(&["err 404", "ok", "err 500", "warn"]);
        let matcher = Matcher::new(r"err \d+", true, false).unwrap();
        let out = spawn_filter(parent, matcher, true, 0, Interrupt::new());
        wait_complete(&out);

        assert_eq!(out.snapshot().lines, vec!["err 404", "err 500"]);
    }

    #[test]
    fn test_invalid_regex_is_an_error() {
        let err = Matcher::new("[unclosed", true, false).unwrap_err();
        assert!(err.to_string().contains("Invalid regex"));
    }

    #[test]
    fn test_matcher_strips_ansi_when_flagged() {
        let matcher = Matcher::new("error", false, false).unwrap();
        assert!(matcher.matches("\x1b[31merror\x1b[0m", true));
        // Escape bytes are not matchable once stripped
        let raw = Matcher::new("[31m", false, false).unwrap();
        assert!(!raw.matches("\x1b[31merror\x1b[0m", true));
    }

    #[test]
    fn test_cursor_seeded_at_first_origin_past_parent_top() {
        let parent = snap(&["x", "apple", "x", "apple", "x"]);
        let matcher = Matcher::new("apple", false, false).unwrap();
        let out = spawn_filter(parent, matcher, true, 2, Interrupt::new());
        wait_complete(&out);

        // Matches at origins 1 and 3; the first >= 2 sits at output index 1
        assert_eq!(out.take_cursor_hint(), Some(1));
    }

    #[test]
    fn test_no_cursor_hint_when_no_match_past_top() {
        let parent = snap(&["apple", "x", "x"]);
        let matcher = Matcher::new("apple", false, false).unwrap();
        let out = spawn_filter(parent, matcher, true, 2, Interrupt::new());
        wait_complete(&out);
        assert_eq!(out.take_cursor_hint(), None);
    }

    #[test]
    fn test_append_filter_restores_root_order() {
        let root = snap(&["err1", "info", "err2", "debug", "err3"]);
        let parent = snap(&["err1", "err2", "err3"]);
        let matcher = Matcher::new("debug", false, false).unwrap();
        let out = spawn_append_filter(
            root,
            parent,
            matcher,
            "err1".to_string(),
            Interrupt::new(),
        );
        wait_complete(&out);

        let result = out.snapshot();
        assert_eq!(result.lines, vec!["err1", "info", "err2", "debug", "err3"]);
        assert_eq!(origins_of(&out), vec![0, 1, 2, 3, 4]);
        assert_eq!(out.take_cursor_hint(), Some(0));
    }

    #[test]
    fn test_append_filter_multiset_duplicates() {
        // Only one "a" is in the parent; the second root "a" must not ride
        // along unless it matches the query.
        let root = snap(&["a", "a", "b"]);
        let parent = snap(&["a"]);
        let matcher = Matcher::new("b", false, false).unwrap();
        let out = spawn_append_filter(root, parent, matcher, "a".to_string(), Interrupt::new());
        wait_complete(&out);

        assert_eq!(out.snapshot().lines, vec!["a", "b"]);
        assert_eq!(origins_of(&out), vec![0, 2]);
    }

    #[test]
    fn test_empty_parent_completes_empty() {
        let parent = snap(&[]);
        let matcher = Matcher::new("x", false, false).unwrap();
        let out = spawn_filter(parent, matcher, true, 0, Interrupt::new());
        wait_complete(&out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_chunked_filter_preserves_order_and_ascending_origins() {
        let lines: Vec<String> = (0..5000).map(|i| format!("line {i}")).collect();
        let parent = Arc::new(
            SharedBuffer::from_lines(lines.iter().map(String::as_str)).snapshot(),
        );
        let matcher = Matcher::new("7", false, false).unwrap();
        let out = spawn_filter(parent.clone(), matcher, true, 0, Interrupt::new());
        wait_complete(&out);

        let origins = origins_of(&out);
        assert!(!origins.is_empty());
        assert!(origins.windows(2).all(|w| w[0] < w[1]));
        assert!(origins.iter().all(|&o| o < parent.len()));
        let result = out.snapshot();
        for (line, &origin) in result.lines.iter().zip(origins.iter()) {
            assert_eq!(line, &parent.lines[origin]);
        }
    }

    #[test]
    fn test_filter_is_deterministic_across_runs() {
        let lines: Vec<String> = (0..2000).map(|i| format!("entry {i}")).collect();
        let parent = Arc::new(
            SharedBuffer::from_lines(lines.iter().map(String::as_str)).snapshot(),
        );

        let run = || {
            let matcher = Matcher::new("3", false, false).unwrap();
            let out = spawn_filter(Arc::clone(&parent), matcher, true, 0, Interrupt::new());
            wait_complete(&out);
            (out.snapshot().lines, origins_of(&out))
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_interrupt_raised_on_completion() {
        let interrupt = Interrupt::new();
        let parent = snap(&["only line"]);
        let matcher = Matcher::new("only", false, false).unwrap();
        let out = spawn_filter(parent, matcher, true, 0, interrupt.clone());
        wait_complete(&out);
        assert!(interrupt.take());
    }
}
