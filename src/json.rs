//! Embedded-JSON detection and pretty expansion.
//!
//! Log lines often carry a JSON (or Python dict) payload after a text
//! prefix. The locator finds the payload by bracket matching; the formatter
//! expands it into indented physical lines for the renderer.

use crate::ansi::strip_ansi;
use serde_json::Value;

/// Byte offset of the first `{` or `[`, or `None`.
pub fn find_json_start(line: &str) -> Option<usize> {
    line.bytes().position(|b| b == b'{' || b == b'[')
}

/// Byte offset of the bracket matching `start`, honoring quoted strings
/// and backslash escapes. `None` when unbalanced.
pub fn find_json_end(line: &str, start: usize) -> Option<usize> {
    let bytes = line.as_bytes();
    if start >= bytes.len() {
        return None;
    }

    let open = bytes[start];
    let close = match open {
        b'{' => b'}',
        b'[' => b']',
        _ => return None,
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in bytes.iter().enumerate().skip(start) {
        if escaped {
            escaped = false;
            continue;
        }
        if c == b'\\' && in_string {
            escaped = true;
            continue;
        }
        if c == b'"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// True when the line contains a balanced JSON payload.
pub fn is_json(line: &str) -> bool {
    match find_json_start(line) {
        Some(start) => find_json_end(line, start).is_some(),
        None => false,
    }
}

/// Rewrite Python literal tokens into their JSON spellings.
///
/// Token boundaries are approximated by the following character, which is
/// enough for dict reprs; single quotes become double quotes wholesale.
fn python_to_json(s: &str) -> String {
    const REPLACEMENTS: &[(&str, &str)] = &[
        ("True,", "true,"),
        ("True}", "true}"),
        ("True]", "true]"),
        ("True ", "true "),
        ("False,", "false,"),
        ("False}", "false}"),
        ("False]", "false]"),
        ("False ", "false "),
        ("None,", "null,"),
        ("None}", "null}"),
        ("None]", "null]"),
        ("None ", "null "),
    ];

    let mut out = s.to_string();
    for (from, to) in REPLACEMENTS {
        out = out.replace(from, to);
    }
    out.replace('\'', "\"")
}

fn indent_json(payload: &str) -> Option<String> {
    let value: Value = serde_json::from_str(payload).ok()?;
    serde_json::to_string_pretty(&value).ok()
}

/// Expand a line's JSON payload into physical lines.
///
/// Returns `[prefix, indented..., last + suffix]`; the line itself, as a
/// single element, when it holds no parseable payload.
pub fn format_json(line: &str) -> Vec<String> {
    let Some(start) = find_json_start(line) else {
        return vec![line.to_string()];
    };

    // Unbalanced payloads extend to end of line, with no suffix.
    let (payload, suffix) = match find_json_end(line, start) {
        Some(end) => (&line[start..=end], &line[end + 1..]),
        None => (&line[start..], ""),
    };
    let prefix = &line[..start];

    let plain = strip_ansi(payload);
    let formatted = match indent_json(&plain) {
        Some(f) => f,
        None => match indent_json(&python_to_json(&plain)) {
            Some(f) => f,
            None => return vec![line.to_string()],
        },
    };

    let json_lines: Vec<&str> = formatted.split('\n').collect();
    let mut result = Vec::with_capacity(json_lines.len() + 1);
    if !prefix.is_empty() {
        result.push(prefix.to_string());
    }
    for (i, jl) in json_lines.iter().enumerate() {
        if i == json_lines.len() - 1 && !suffix.is_empty() {
            result.push(format!("{jl}{suffix}"));
        } else {
            result.push((*jl).to_string());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_json_start() {
        assert_eq!(find_json_start("log: {\"a\":1}"), Some(5));
        assert_eq!(find_json_start("[1,2]"), Some(0));
        assert_eq!(find_json_start("no json"), None);
    }

    #[test]
    fn test_find_json_end_nested() {
        let line = r#"{"a":{"b":[1,2]},"c":3}"#;
        assert_eq!(find_json_end(line, 0), Some(line.len() - 1));
    }

    #[test]
    fn test_find_json_end_respects_strings() {
        let line = r#"{"brace":"}","esc":"\"}"}"#;
        assert_eq!(find_json_end(line, 0), Some(line.len() - 1));
    }

    #[test]
    fn test_find_json_end_unbalanced() {
        assert_eq!(find_json_end("{\"a\":1", 0), None);
    }

    #[test]
    fn test_is_json() {
        assert!(is_json(r#"msg {"k":"v"}"#));
        assert!(!is_json("msg {unclosed"));
        assert!(!is_json("plain"));
    }

    #[test]
    fn test_format_valid_json_with_prefix() {
        let out = format_json(r#"log: {"a":1,"b":2}"#);
        assert_eq!(out[0], "log: ");
        assert!(out[1..].iter().any(|l| l.contains("\"a\": 1")));
        // Two-space indentation
        assert!(out[1..].iter().any(|l| l.starts_with("  \"")));
        assert_eq!(out.last().unwrap(), "}");
    }

    #[test]
    fn test_format_suffix_appended_to_last_line() {
        let out = format_json(r#"pre {"a":1} post"#);
        assert_eq!(out.last().unwrap(), "} post");
    }

    #[test]
    fn test_format_python_dict() {
        let out = format_json("data: {'ok': True, 'err': None}");
        let joined = out.join("\n");
        assert!(joined.contains("\"ok\": true"));
        assert!(joined.contains("\"err\": null"));
    }

    #[test]
    fn test_format_invalid_returns_original() {
        let line = "stack trace { at foo.rs:10 }";
        assert_eq!(format_json(line), vec![line.to_string()]);
    }

    #[test]
    fn test_format_no_json_returns_original() {
        assert_eq!(format_json("hello"), vec!["hello".to_string()]);
    }

    #[test]
    fn test_format_strips_ansi_inside_payload() {
        let out = format_json("x: {\"a\":\x1b[31m1\x1b[0m}");
        assert!(out.iter().any(|l| l.contains("\"a\": 1")));
    }

    #[test]
    fn test_format_roundtrip_equivalent() {
        let out = format_json(r#"{"a":[1,2,{"b":null}],"c":true}"#);
        let rejoined = out.join("\n");
        let orig: Value = serde_json::from_str(r#"{"a":[1,2,{"b":null}],"c":true}"#).unwrap();
        let parsed: Value = serde_json::from_str(&rejoined).unwrap();
        assert_eq!(orig, parsed);
    }

    #[test]
    fn test_python_to_json_tokens() {
        assert_eq!(
            python_to_json("{'a': True, 'b': False, 'c': None}"),
            r#"{"a": true, "b": false, "c": null}"#
        );
    }
}
