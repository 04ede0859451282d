//! Persistent prompt history shared by filter and search prompts.
//!
//! Records are stored one per line as `XY|query`, where `X` is `r`/`-` for
//! regex mode and `Y` is `i`/`-` for case-insensitive mode. Lines without
//! that prefix are legacy entries: literal, case-sensitive queries.

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;

const MAX_ENTRIES: usize = 100;

/// A query together with its prompt modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryRecord {
    pub query: String,
    pub is_regex: bool,
    pub ignore_case: bool,
}

impl QueryRecord {
    pub fn new(query: impl Into<String>, is_regex: bool, ignore_case: bool) -> Self {
        Self {
            query: query.into(),
            is_regex,
            ignore_case,
        }
    }
}

/// Encode a record as `XY|query`.
fn encode(record: &QueryRecord) -> String {
    let r = if record.is_regex { 'r' } else { '-' };
    let i = if record.ignore_case { 'i' } else { '-' };
    format!("{r}{i}|{}", record.query)
}

/// Decode `XY|query`; anything else is a legacy literal entry.
fn decode(entry: &str) -> QueryRecord {
    let bytes = entry.as_bytes();
    if bytes.len() >= 3 && bytes[2] == b'|' {
        QueryRecord {
            query: entry[3..].to_string(),
            is_regex: bytes[0] == b'r',
            ignore_case: bytes[1] == b'i',
        }
    } else {
        QueryRecord {
            query: entry.to_string(),
            is_regex: false,
            ignore_case: false,
        }
    }
}

/// Bounded query history with prompt-style navigation.
///
/// Navigation keeps the in-progress input stashed so walking past the oldest
/// entry and back restores what the user was typing.
#[derive(Debug)]
pub struct History {
    entries: VecDeque<String>,
    /// Current position while navigating; `None` means live input.
    index: Option<usize>,
    stash: String,
    path: Option<PathBuf>,
}

impl History {
    /// Default location under the user config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("sift").join("history"))
    }

    /// Load history from `path`; missing or unreadable files yield an empty
    /// history (persistence is best-effort by design).
    pub fn load(path: Option<PathBuf>) -> Self {
        let mut entries = VecDeque::new();
        if let Some(ref p) = path {
            if let Ok(content) = fs::read_to_string(p) {
                for line in content.lines() {
                    if !line.is_empty() {
                        entries.push_back(line.to_string());
                    }
                }
            }
        }
        while entries.len() > MAX_ENTRIES {
            entries.pop_front();
        }
        Self {
            entries,
            index: None,
            stash: String::new(),
            path,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a record (skipping empty queries and immediate duplicates)
    /// and persist.
    pub fn add(&mut self, record: &QueryRecord) {
        if record.query.is_empty() {
            return;
        }
        let encoded = encode(record);
        if self.entries.back() == Some(&encoded) {
            return;
        }
        self.entries.push_back(encoded);
        while self.entries.len() > MAX_ENTRIES {
            self.entries.pop_front();
        }
        self.save();
    }

    fn save(&self) {
        let Some(ref path) = self.path else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let data: Vec<&str> = self.entries.iter().map(String::as_str).collect();
        let _ = fs::write(path, data.join("\n"));
    }

    /// Forget the navigation position (call when a prompt opens).
    pub fn reset(&mut self) {
        self.index = None;
        self.stash.clear();
    }

    /// Step to an older entry, stashing the live input on first use.
    pub fn up(&mut self, current: &QueryRecord) -> QueryRecord {
        if self.entries.is_empty() {
            return current.clone();
        }
        match self.index {
            None => {
                self.stash = encode(current);
                self.index = Some(self.entries.len() - 1);
            }
            Some(i) if i > 0 => self.index = Some(i - 1),
            Some(_) => {}
        }
        decode(&self.entries[self.index.unwrap_or(0)])
    }

    /// Step to a newer entry; past the newest restores the stashed input.
    pub fn down(&mut self, current: &QueryRecord) -> QueryRecord {
        let Some(i) = self.index else {
            return current.clone();
        };
        if i + 1 >= self.entries.len() {
            self.index = None;
            return decode(&self.stash);
        }
        self.index = Some(i + 1);
        decode(&self.entries[i + 1])
    }
}
