//! Multi-file ingestion: a k-way merge ordered by parsed timestamps.
//!
//! Each file becomes a stream with a one-line look-ahead. Lines without a
//! recognizable timestamp are emitted immediately so they stay adjacent to
//! the timestamped line they followed in their own file; otherwise the
//! stream with the smallest timestamp goes first, ties broken by file
//! order. Every emitted line is tagged with its file's `N> ` prefix.

use crate::ansi::has_escape;
use crate::buffer::SharedBuffer;
use crate::event::Interrupt;
use crate::ingest::BATCH_SIZE;
use crate::timestamp::{detect_format, extract_timestamp};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::thread;

const WAKE_EVERY_LINES: usize = 100_000;

struct Pending {
    /// Prefixed text ready for the buffer.
    text: String,
    timestamp: Option<NaiveDateTime>,
}

struct FileStream {
    reader: BufReader<File>,
    prefix: String,
    current: Option<Pending>,
}

impl FileStream {
    fn open(idx: usize, path: &PathBuf) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
        Ok(Self {
            reader: BufReader::new(file),
            prefix: format!("{idx}> "),
            current: None,
        })
    }

    /// Read the next line into the look-ahead slot; `None` marks exhaustion.
    /// While no format is known yet, each new line gets a detection attempt.
    fn advance(&mut self, detected: &mut Option<&'static str>) {
        let mut raw = Vec::new();
        self.current = match self.reader.read_until(b'\n', &mut raw) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                let mut end = raw.len();
                if end > 0 && raw[end - 1] == b'\n' {
                    end -= 1;
                }
                if end > 0 && raw[end - 1] == b'\r' {
                    end -= 1;
                }
                let line = String::from_utf8_lossy(&raw[..end]).into_owned();

                if detected.is_none() {
                    *detected = detect_format(&line);
                }
                let timestamp = detected.and_then(|fmt| extract_timestamp(&line, fmt));
                Some(Pending {
                    text: format!("{}{}", self.prefix, line),
                    timestamp,
                })
            }
        };
    }
}

/// Build the status-bar legend: `0> a.log 1> b.log ...`.
pub fn legend(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{i}> {}", p.display()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Open every file eagerly, then merge them into one buffer on a
/// background thread.
pub fn start_merge(paths: &[PathBuf], interrupt: &Interrupt) -> Result<SharedBuffer> {
    let mut streams = Vec::with_capacity(paths.len());
    for (idx, path) in paths.iter().enumerate() {
        streams.push(FileStream::open(idx, path)?);
    }

    let buf = SharedBuffer::new(true);
    let out = buf.clone();
    let interrupt = interrupt.clone();
    thread::spawn(move || {
        merge_streams(streams, &out, &interrupt);
    });
    Ok(buf)
}

fn merge_streams(mut streams: Vec<FileStream>, out: &SharedBuffer, interrupt: &Interrupt) {
    let mut detected: Option<&'static str> = None;
    for stream in &mut streams {
        stream.advance(&mut detected);
    }

    let mut batch: Vec<String> = Vec::with_capacity(BATCH_SIZE);
    let mut flags: Vec<bool> = Vec::with_capacity(BATCH_SIZE);
    let mut total = 0usize;

    loop {
        // Pick: untimestamped lines first, then the oldest timestamp,
        // ties resolved by stream index.
        let mut pick: Option<usize> = None;
        for i in 0..streams.len() {
            let Some(cur) = streams[i].current.as_ref() else {
                continue;
            };
            match pick {
                None => pick = Some(i),
                Some(p) => {
                    let best = streams[p].current.as_ref().expect("picked stream is live");
                    let wins = match (cur.timestamp, best.timestamp) {
                        (None, Some(_)) => true,
                        (Some(a), Some(b)) => a < b,
                        _ => false,
                    };
                    if wins {
                        pick = Some(i);
                    }
                }
            }
        }
        let Some(p) = pick else {
            break;
        };

        let pending = streams[p].current.take().expect("picked stream is live");
        flags.push(has_escape(&pending.text));
        batch.push(pending.text);
        streams[p].advance(&mut detected);

        if batch.len() >= BATCH_SIZE {
            total += batch.len();
            let full_batch = std::mem::replace(&mut batch, Vec::with_capacity(BATCH_SIZE));
            let full_flags = std::mem::replace(&mut flags, Vec::with_capacity(BATCH_SIZE));
            out.extend(full_batch, full_flags);
            if total == BATCH_SIZE || total % WAKE_EVERY_LINES == 0 {
                interrupt.wake();
            }
        }
    }

    if !batch.is_empty() {
        out.extend(batch, flags);
    }
    out.set_loading(false);
    interrupt.wake();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        path
    }

    fn merged_lines(paths: &[PathBuf]) -> Vec<String> {
        let buf = start_merge(paths, &Interrupt::new()).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while buf.is_loading() {
            assert!(Instant::now() < deadline, "merge did not complete");
            thread::sleep(Duration::from_millis(1));
        }
        buf.snapshot().lines
    }

    #[test]
    fn test_merge_orders_by_timestamp() {
        let dir = TempDir::new().unwrap();
        let a = write_file(
            &dir,
            "a.log",
            &["2026-01-06 10:00:00 a1", "2026-01-06 10:00:04 a2"],
        );
        let b = write_file(
            &dir,
            "b.log",
            &["2026-01-06 10:00:02 b1", "2026-01-06 10:00:03 b2"],
        );

        assert_eq!(
            merged_lines(&[a, b]),
            vec![
                "0> 2026-01-06 10:00:00 a1",
                "1> 2026-01-06 10:00:02 b1",
                "1> 2026-01-06 10:00:03 b2",
                "0> 2026-01-06 10:00:04 a2",
            ]
        );
    }

    #[test]
    fn test_merge_tie_prefers_lower_stream_index() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.log", &["2026-01-06 10:00:00 from a"]);
        let b = write_file(&dir, "b.log", &["2026-01-06 10:00:00 from b"]);

        assert_eq!(
            merged_lines(&[a, b]),
            vec!["0> 2026-01-06 10:00:00 from a", "1> 2026-01-06 10:00:00 from b"]
        );
    }

    #[test]
    fn test_merge_untimestamped_line_stays_adjacent() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.log", &["2026-01-06 10:00:01 only a"]);
        let b = write_file(
            &dir,
            "b.log",
            &[
                "2026-01-06 10:00:00 b starts",
                "  continuation without stamp",
                "2026-01-06 10:00:02 b ends",
            ],
        );

        assert_eq!(
            merged_lines(&[a, b]),
            vec![
                "1> 2026-01-06 10:00:00 b starts",
                "1>   continuation without stamp",
                "0> 2026-01-06 10:00:01 only a",
                "1> 2026-01-06 10:00:02 b ends",
            ]
        );
    }

    #[test]
    fn test_merge_without_any_timestamps_keeps_file_order() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.log", &["a1", "a2"]);
        let b = write_file(&dir, "b.log", &["b1"]);

        // No stream ever carries a timestamp, so the first live stream
        // wins every round until it is exhausted.
        assert_eq!(merged_lines(&[a, b]), vec!["0> a1", "0> a2", "1> b1"]);
    }

    #[test]
    fn test_merge_empty_file() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.log", &[]);
        let b = write_file(&dir, "b.log", &["2026-01-06 10:00:00 b"]);

        assert_eq!(merged_lines(&[a, b]), vec!["1> 2026-01-06 10:00:00 b"]);
    }

    #[test]
    fn test_merge_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.log", &["x"]);
        let missing = dir.path().join("nope.log");
        assert!(start_merge(&[a, missing], &Interrupt::new()).is_err());
    }

    #[test]
    fn test_legend() {
        let paths = vec![PathBuf::from("api.log"), PathBuf::from("web.log")];
        assert_eq!(legend(&paths), "0> api.log 1> web.log");
    }
}
