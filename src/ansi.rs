//! ANSI escape parsing: turning a raw log line into styled cells.
//!
//! Only SGR (`ESC [ ... m`) sequences carry styling; everything else the
//! stripper removes and the parser passes through as literal text.

use memchr::memchr;
use regex::Regex;
use std::sync::LazyLock;

/// Regex matching `ESC [`-led sequences terminated by any letter, with
/// truncated sequences running to end of line. Broader than the SGR-only
/// parser on purpose: cursor movement and other non-SGR sequences must not
/// leak into plain text used for matching.
static CSI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[^A-Za-z]*(?:[A-Za-z]|$)").expect("CSI regex must compile")
});

/// Display attributes for one side (foreground or background) of a cell.
///
/// `color: None` is the terminal default, distinct from every palette index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attr {
    pub color: Option<u8>,
    pub bold: bool,
    pub underline: bool,
    pub reverse: bool,
}

impl Attr {
    pub const DEFAULT: Attr = Attr {
        color: None,
        bold: false,
        underline: false,
        reverse: false,
    };

    fn colored(color: u8) -> Attr {
        Attr {
            color: Some(color),
            ..Attr::DEFAULT
        }
    }
}

/// One visible character with its resolved colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub fg: Attr,
    pub bg: Attr,
}

/// Fast probe for the ESC byte.
pub fn has_escape(line: &str) -> bool {
    memchr(0x1b, line.as_bytes()).is_some()
}

/// Parse a line into cells, folding SGR sequences into per-cell attributes.
///
/// Sequences not terminated by `m` before end of line are emitted as
/// literal characters so malformed input stays visible.
pub fn parse_cells(line: &str) -> Vec<Cell> {
    if !has_escape(line) {
        return line
            .chars()
            .map(|ch| Cell {
                ch,
                fg: Attr::DEFAULT,
                bg: Attr::DEFAULT,
            })
            .collect();
    }

    let runes: Vec<char> = line.chars().collect();
    let mut cells = Vec::with_capacity(runes.len());
    let mut fg = Attr::DEFAULT;
    let mut bg = Attr::DEFAULT;

    let mut i = 0;
    while i < runes.len() {
        if runes[i] == '\x1b' && i + 1 < runes.len() && runes[i + 1] == '[' {
            let mut end = i + 2;
            while end < runes.len() && runes[end] != 'm' {
                end += 1;
            }
            if end < runes.len() {
                let seq: String = runes[i + 2..end].iter().collect();
                (fg, bg) = apply_sgr(&seq, fg, bg);
                i = end + 1;
                continue;
            }
        }
        cells.push(Cell {
            ch: runes[i],
            fg,
            bg,
        });
        i += 1;
    }
    cells
}

/// Apply one SGR parameter string to the current colors.
fn apply_sgr(seq: &str, mut fg: Attr, mut bg: Attr) -> (Attr, Attr) {
    if seq.is_empty() || seq == "0" {
        return (Attr::DEFAULT, Attr::DEFAULT);
    }

    let parts: Vec<&str> = seq.split(';').collect();
    let mut i = 0;
    while i < parts.len() {
        let Ok(code) = parts[i].parse::<u16>() else {
            i += 1;
            continue;
        };

        match code {
            0 => {
                fg = Attr::DEFAULT;
                bg = Attr::DEFAULT;
            }
            1 => fg.bold = true,
            4 => fg.underline = true,
            7 => fg.reverse = true,
            30..=37 => fg.color = Some((code - 30) as u8),
            39 => fg.color = None,
            40..=47 => bg = Attr::colored((code - 40) as u8),
            49 => bg = Attr::DEFAULT,
            90..=97 => fg.color = Some((code - 90 + 8) as u8),
            100..=107 => bg = Attr::colored((code - 100 + 8) as u8),
            // 256-color: 38;5;N foreground, 48;5;N background
            38 if i + 2 < parts.len() && parts[i + 1] == "5" => {
                if let Ok(n) = parts[i + 2].parse::<u8>() {
                    fg.color = Some(n);
                }
                i += 2;
            }
            48 if i + 2 < parts.len() && parts[i + 1] == "5" => {
                if let Ok(n) = parts[i + 2].parse::<u8>() {
                    bg = Attr::colored(n);
                }
                i += 2;
            }
            _ => {}
        }
        i += 1;
    }
    (fg, bg)
}

/// Strip every `ESC [`-led sequence, whatever its terminator letter.
pub fn strip_ansi(line: &str) -> String {
    if !has_escape(line) {
        return line.to_string();
    }
    CSI_RE.replace_all(line, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(cells: &[Cell]) -> String {
        cells.iter().map(|c| c.ch).collect()
    }

    #[test]
    fn test_parse_plain_line() {
        let cells = parse_cells("hello");
        assert_eq!(cells.len(), 5);
        assert_eq!(text_of(&cells), "hello");
        assert!(cells
            .iter()
            .all(|c| c.fg == Attr::DEFAULT && c.bg == Attr::DEFAULT));
    }

    #[test]
    fn test_parse_basic_color() {
        let cells = parse_cells("\x1b[31mred\x1b[0m plain");
        assert_eq!(text_of(&cells), "red plain");
        assert_eq!(cells[0].fg.color, Some(1));
        assert_eq!(cells[2].fg.color, Some(1));
        assert_eq!(cells[3].fg, Attr::DEFAULT);
    }

    #[test]
    fn test_parse_bold_preserved_across_color_change() {
        let cells = parse_cells("\x1b[1;32mok\x1b[34mgo");
        assert_eq!(cells[0].fg.color, Some(2));
        assert!(cells[0].fg.bold);
        // 34 changes the color but keeps the bold modifier
        assert_eq!(cells[2].fg.color, Some(4));
        assert!(cells[2].fg.bold);
    }

    #[test]
    fn test_parse_default_fg_keeps_modifiers() {
        let cells = parse_cells("\x1b[1;31ma\x1b[39mb");
        assert_eq!(cells[1].fg.color, None);
        assert!(cells[1].fg.bold);
    }

    #[test]
    fn test_parse_bright_and_background() {
        let cells = parse_cells("\x1b[91;44mX");
        assert_eq!(cells[0].fg.color, Some(9));
        assert_eq!(cells[0].bg.color, Some(4));
    }

    #[test]
    fn test_parse_256_color() {
        let cells = parse_cells("\x1b[38;5;117m~\x1b[48;5;239m!");
        assert_eq!(cells[0].fg.color, Some(117));
        assert_eq!(cells[0].bg, Attr::DEFAULT);
        assert_eq!(cells[1].bg.color, Some(239));
    }

    #[test]
    fn test_parse_underline_reverse() {
        let cells = parse_cells("\x1b[4;7mu");
        assert!(cells[0].fg.underline);
        assert!(cells[0].fg.reverse);
    }

    #[test]
    fn test_unterminated_escape_is_literal() {
        let cells = parse_cells("abc\x1b[31");
        // No 'm' terminator, so the escape bytes render as-is
        assert_eq!(text_of(&cells), "abc\x1b[31");
    }

    #[test]
    fn test_malformed_params_skipped() {
        let cells = parse_cells("\x1b[31;zz;1mX");
        assert_eq!(cells[0].fg.color, Some(1));
        assert!(cells[0].fg.bold);
    }

    #[test]
    fn test_strip_removes_sgr() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
    }

    #[test]
    fn test_strip_removes_non_sgr_sequences() {
        // Cursor movement (H) and erase (K) are not SGR but must still go
        assert_eq!(strip_ansi("\x1b[2Ka\x1b[1;1Hb"), "ab");
    }

    #[test]
    fn test_strip_plain_passthrough() {
        assert_eq!(strip_ansi("no escapes here"), "no escapes here");
    }

    #[test]
    fn test_has_escape() {
        assert!(has_escape("\x1b[0m"));
        assert!(!has_escape("plain"));
    }

    #[test]
    fn test_parse_strip_roundtrip() {
        let line = "\x1b[1;31merror:\x1b[0m disk \x1b[38;5;208mfull\x1b[0m";
        assert_eq!(text_of(&parse_cells(line)), strip_ansi(line));
    }

    #[test]
    fn test_unicode_content() {
        let cells = parse_cells("\x1b[32mzażółć\x1b[0m");
        assert_eq!(text_of(&cells), "zażółć");
        assert_eq!(cells[0].fg.color, Some(2));
    }
}
