//! Shell-style glob patterns over `/`-separated paths and object keys.

use regex::Regex;

use crate::error::{StorageError, StorageResult};

const WILDCARDS: [char; 3] = ['*', '?', '['];

/// A compiled glob.
///
/// `*` and `?` never match `/`; `**` matches across directories, and `**/`
/// also matches zero directories. `[abc]` / `[!abc]` are character classes.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: String,
    regex: Regex,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> StorageResult<Self> {
        let regex = Regex::new(&translate(pattern)?).map_err(|e| StorageError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Whether `s` contains glob metacharacters.
    pub fn is_glob(s: &str) -> bool {
        s.contains(WILDCARDS)
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Directory part before the first wildcard, including the trailing `/`.
    ///
    /// `data/*/tas_*.nc` has prefix `data/`; `*.nc` has an empty prefix.
    pub fn literal_prefix(&self) -> &str {
        let first_wildcard = self.pattern.find(WILDCARDS).unwrap_or(self.pattern.len());
        match self.pattern[..first_wildcard].rfind('/') {
            Some(slash) => &self.pattern[..=slash],
            None => "",
        }
    }
}

fn translate(pattern: &str) -> StorageResult<String> {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            '[' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|p| p + i + 1)
                    .ok_or_else(|| StorageError::InvalidPattern {
                        pattern: pattern.to_string(),
                        message: "unclosed '['".to_string(),
                    })?;
                out.push('[');
                let mut body = &chars[i + 1..close];
                if body.first() == Some(&'!') {
                    out.push('^');
                    body = &body[1..];
                }
                for c in body {
                    if matches!(c, '\\' | '[' | ']' | '^') {
                        out.push('\\');
                    }
                    out.push(*c);
                }
                out.push(']');
                i = close + 1;
            }
            c => {
                out.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }

    out.push('$');
    Ok(out)
}
