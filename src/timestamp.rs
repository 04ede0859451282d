//! Timestamp detection and extraction from log lines.
//!
//! Formats are strftime patterns as users write them (`t` command); a small
//! translation layer maps the dialect onto chrono before parsing. Extraction
//! slides a fixed-width window across the line, so the timestamp does not
//! have to sit at column zero.

use chrono::{NaiveDateTime, NaiveTime};

/// Known formats, most specific first, tried during auto-detection.
pub const COMMON_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S.%f",
    "%Y-%m-%dT%H:%M:%S.%f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%H:%M:%S",
    "%Y%m%d%H%M%S",
    "[%Y-%m-%d %H:%M:%S]",
    "%d-%b-%Y %H:%M:%S",
    // syslog: "Jan  4 00:00:01" (space-padded day) and zero-padded variant
    "%b %_d %H:%M:%S",
    "%b %d %H:%M:%S",
];

const DETECT_SCAN_LIMIT: usize = 50;
const EXTRACT_SCAN_LIMIT: usize = 100;

/// Map the user-facing strftime dialect onto chrono's.
fn to_chrono_format(fmt: &str) -> String {
    fmt.replace("%_d", "%e").replace(".%f", "%.f")
}

/// Rendered width of a format, used to size the scan window.
fn format_width(fmt: &str) -> usize {
    let mut width = 0;
    let mut chars = fmt.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            width += 1;
            continue;
        }
        match chars.next() {
            Some('Y') => width += 4,
            Some('f') => width += 6,
            Some('b' | 'a' | 'j') => width += 3,
            Some('z') => width += 5,
            Some('_' | '-') => {
                chars.next();
                width += 2;
            }
            _ => width += 2,
        }
    }
    width
}

fn has_year(fmt: &str) -> bool {
    fmt.contains("%Y") || fmt.contains("%y")
}

fn has_date(fmt: &str) -> bool {
    ["%m", "%d", "%_d", "%-d", "%e", "%b", "%j"]
        .iter()
        .any(|spec| fmt.contains(spec))
}

/// Parse a candidate window as a whole against one format.
fn parse_exact(s: &str, fmt: &str) -> Option<NaiveDateTime> {
    let cfmt = to_chrono_format(fmt);
    if has_year(fmt) {
        NaiveDateTime::parse_from_str(s, &cfmt).ok()
    } else if has_date(fmt) {
        // Month/day but no year (syslog): parse with an epoch year so the
        // values still order correctly within one capture.
        NaiveDateTime::parse_from_str(&format!("1970 {s}"), &format!("%Y {cfmt}")).ok()
    } else {
        NaiveTime::parse_from_str(s, &cfmt)
            .ok()
            .map(|t| NaiveDateTime::UNIX_EPOCH.date().and_time(t))
    }
}

fn scan(line: &str, fmt: &str, offset_limit: usize) -> Option<NaiveDateTime> {
    let width = format_width(fmt);
    if width == 0 || line.len() < width {
        return None;
    }
    for i in 0..=line.len() - width {
        if i >= offset_limit {
            break;
        }
        if !line.is_char_boundary(i) || !line.is_char_boundary(i + width) {
            continue;
        }
        if let Some(ts) = parse_exact(&line[i..i + width], fmt) {
            return Some(ts);
        }
    }
    None
}

/// Try every known format against a line; first hit wins.
pub fn detect_format(line: &str) -> Option<&'static str> {
    COMMON_FORMATS
        .iter()
        .find(|fmt| scan(line, fmt, DETECT_SCAN_LIMIT).is_some())
        .copied()
}

/// Extract the first timestamp matching `fmt` anywhere in the line's head.
pub fn extract_timestamp(line: &str, fmt: &str) -> Option<NaiveDateTime> {
    scan(line, fmt, EXTRACT_SCAN_LIMIT)
}
