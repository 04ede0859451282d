//! Background producers feeding line buffers: file reader, stdin reader,
//! and the follow-mode tailer.
//!
//! Producers own their file handles, append in large batches under the
//! buffer's write lock, and signal the event loop through the interrupt.
//! Read failures after a successful open simply end the stream; the
//! loading flag clears either way.

use crate::ansi::has_escape;
use crate::buffer::SharedBuffer;
use crate::event::Interrupt;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const BATCH_SIZE: usize = 10_000;
const WAKE_EVERY_LINES: usize = 100_000;
/// Reader buffer sized for very long log lines.
const READER_CAPACITY: usize = 10 * 1024 * 1024;
const FOLLOW_POLL: Duration = Duration::from_millis(100);

/// Decode one raw record: drop the trailing newline, keep invalid UTF-8
/// readable via lossy conversion.
fn decode_line(raw: &[u8]) -> String {
    let mut end = raw.len();
    if end > 0 && raw[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && raw[end - 1] == b'\r' {
        end -= 1;
    }
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// Drain a reader into the buffer in batches, then clear the loading flag.
pub fn read_into<R: BufRead>(mut reader: R, buf: &SharedBuffer, interrupt: &Interrupt) {
    let mut batch: Vec<String> = Vec::with_capacity(BATCH_SIZE);
    let mut flags: Vec<bool> = Vec::with_capacity(BATCH_SIZE);
    let mut total = 0usize;
    let mut raw = Vec::new();

    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw) {
            Ok(0) => break,
            Ok(_) => {
                let line = decode_line(&raw);
                flags.push(has_escape(&line));
                batch.push(line);

                if batch.len() >= BATCH_SIZE {
                    total += batch.len();
                    let full_batch = std::mem::replace(&mut batch, Vec::with_capacity(BATCH_SIZE));
                    let full_flags = std::mem::replace(&mut flags, Vec::with_capacity(BATCH_SIZE));
                    buf.extend(full_batch, full_flags);

                    // First batch shows content quickly; later wakes are sparse
                    if total == BATCH_SIZE || total % WAKE_EVERY_LINES == 0 {
                        interrupt.wake();
                    }
                }
            }
            Err(_) => break,
        }
    }

    if !batch.is_empty() {
        buf.extend(batch, flags);
    }
    buf.set_loading(false);
    interrupt.wake();
}

/// Open a file eagerly (missing files are a startup error) and stream it
/// from a background thread.
pub fn start_file(path: &Path, interrupt: &Interrupt) -> Result<SharedBuffer> {
    let file =
        File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let buf = SharedBuffer::new(true);

    let out = buf.clone();
    let interrupt = interrupt.clone();
    thread::spawn(move || {
        read_into(BufReader::with_capacity(READER_CAPACITY, file), &out, &interrupt);
    });
    Ok(buf)
}

/// Stream piped standard input from a background thread.
pub fn start_stdin(interrupt: &Interrupt) -> SharedBuffer {
    let buf = SharedBuffer::new(true);
    let out = buf.clone();
    let interrupt = interrupt.clone();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        read_into(stdin.lock(), &out, &interrupt);
    });
    buf
}

/// Poll a file for growth while `follow` stays set, appending new lines.
///
/// The tailer re-opens and re-scans on every tick; the buffer's line count
/// tells it where the previous scan stopped.
pub fn start_follow_tailer(
    path: PathBuf,
    buf: SharedBuffer,
    follow: Arc<AtomicBool>,
    interrupt: Interrupt,
) {
    thread::spawn(move || {
        while follow.load(Ordering::Relaxed) {
            thread::sleep(FOLLOW_POLL);
            let Ok(file) = File::open(&path) else {
                continue;
            };
            let known = buf.len();
            let mut reader = BufReader::with_capacity(READER_CAPACITY, file);

            let mut batch: Vec<String> = Vec::new();
            let mut flags: Vec<bool> = Vec::new();
            let mut line_no = 0usize;
            let mut raw = Vec::new();
            loop {
                raw.clear();
                match reader.read_until(b'\n', &mut raw) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        line_no += 1;
                        if line_no > known {
                            let line = decode_line(&raw);
                            flags.push(has_escape(&line));
                            batch.push(line);
                        }
                    }
                }
            }

            if !batch.is_empty() {
                buf.extend(batch, flags);
                interrupt.wake();
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use std::time::Instant;
    use tempfile::NamedTempFile;

    fn wait_complete(buf: &SharedBuffer) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while buf.is_loading() {
            assert!(Instant::now() < deadline, "reader did not complete");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_read_into_basic() {
        let buf = SharedBuffer::new(true);
        read_into(
            Cursor::new("one\ntwo\n\x1b[31mthree\x1b[0m\n"),
            &buf,
            &Interrupt::new(),
        );
        let snap = buf.snapshot();
        assert_eq!(snap.lines, vec!["one", "two", "\x1b[31mthree\x1b[0m"]);
        assert_eq!(snap.has_ansi, vec![false, false, true]);
        assert!(!buf.is_loading());
    }

    #[test]
    fn test_read_into_no_trailing_newline() {
        let buf = SharedBuffer::new(true);
        read_into(Cursor::new("a\nb"), &buf, &Interrupt::new());
        assert_eq!(buf.snapshot().lines, vec!["a", "b"]);
    }

    #[test]
    fn test_read_into_crlf() {
        let buf = SharedBuffer::new(true);
        read_into(Cursor::new("a\r\nb\r\n"), &buf, &Interrupt::new());
        assert_eq!(buf.snapshot().lines, vec!["a", "b"]);
    }

    #[test]
    fn test_read_into_invalid_utf8_is_lossy() {
        let buf = SharedBuffer::new(true);
        read_into(Cursor::new(&b"ok\nbad \xff byte\n"[..]), &buf, &Interrupt::new());
        let snap = buf.snapshot();
        assert_eq!(snap.len(), 2);
        assert!(snap.lines[1].contains('\u{FFFD}'));
    }

    #[test]
    fn test_read_into_empty_input() {
        let buf = SharedBuffer::new(true);
        read_into(Cursor::new(""), &buf, &Interrupt::new());
        assert!(buf.is_empty());
        assert!(!buf.is_loading());
    }

    #[test]
    fn test_start_file_streams_in_background() {
        let mut file = NamedTempFile::new().unwrap();
        for i in 0..100 {
            writeln!(file, "line {i}").unwrap();
        }
        file.flush().unwrap();

        let interrupt = Interrupt::new();
        let buf = start_file(file.path(), &interrupt).unwrap();
        wait_complete(&buf);
        assert_eq!(buf.len(), 100);
        assert_eq!(buf.line(42), "line 42");
        assert!(interrupt.take());
    }

    #[test]
    fn test_start_file_missing_is_error() {
        let err = start_file(Path::new("/no/such/file.log"), &Interrupt::new());
        assert!(err.is_err());
    }

    #[test]
    fn test_follow_tailer_appends_new_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "first").unwrap();
        file.flush().unwrap();

        let interrupt = Interrupt::new();
        let buf = start_file(file.path(), &interrupt).unwrap();
        wait_complete(&buf);
        assert_eq!(buf.len(), 1);

        let follow = Arc::new(AtomicBool::new(true));
        start_follow_tailer(
            file.path().to_path_buf(),
            buf.clone(),
            Arc::clone(&follow),
            interrupt.clone(),
        );

        writeln!(file, "second").unwrap();
        writeln!(file, "third").unwrap();
        file.flush().unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while buf.len() < 3 {
            assert!(Instant::now() < deadline, "tailer never picked up new lines");
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(buf.line(1), "second");
        assert_eq!(buf.line(2), "third");

        follow.store(false, Ordering::Relaxed);
    }
}
