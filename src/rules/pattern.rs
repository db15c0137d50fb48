//! Rule path pattern compilation.
//!
//! # Grammar
//! - Literal characters match verbatim
//! - `:name` matches one non-empty path segment, captured under `name`
//! - A trailing `*` matches the rest of the path (slashes included)
//!
//! # Design Decisions
//! - Patterns are anchored at both ends
//! - Compilation happens once per configuration version, never per request
//! - A compiled pattern cannot fail at match time

use regex::Regex;
use thiserror::Error;

/// Name under which the trailing wildcard capture is exposed.
pub const SPLAT: &str = "splat";

/// Errors raised while compiling a rule's `from` pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,

    #[error("pattern '{0}' must start with '/'")]
    MissingLeadingSlash(String),

    #[error("pattern '{pattern}' has a ':' without a parameter name at byte {offset}")]
    MissingParamName { pattern: String, offset: usize },

    #[error("pattern '{pattern}' declares parameter ':{name}' more than once")]
    DuplicateParam { pattern: String, name: String },

    #[error("pattern '{0}' may only use '*' as its final character")]
    MisplacedWildcard(String),

    #[error("pattern '{pattern}' produced an invalid matcher: {reason}")]
    InvalidRegex { pattern: String, reason: String },
}

/// An anchored matcher compiled from a rule's `from` pattern.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: String,
    regex: Regex,
    params: Vec<String>,
    wildcard: bool,
}

/// Values captured by a successful pattern match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
    /// Named parameters in declaration order.
    pub params: Vec<(String, String)>,
    /// Trailing wildcard capture, if the pattern ends in `*`.
    pub splat: Option<String>,
}

impl Captures {
    /// Look up a captured value by name. `splat` resolves to the wildcard.
    pub fn get(&self, name: &str) -> Option<&str> {
        if let Some((_, value)) = self.params.iter().find(|(n, _)| n == name) {
            return Some(value);
        }
        if name == SPLAT {
            self.splat.as_deref()
        } else {
            None
        }
    }
}

/// Compile a `from` pattern into an anchored matcher.
pub fn compile(from: &str) -> Result<CompiledPattern, PatternError> {
    if from.is_empty() {
        return Err(PatternError::Empty);
    }
    if !from.starts_with('/') {
        return Err(PatternError::MissingLeadingSlash(from.to_string()));
    }

    let mut out = String::with_capacity(from.len() + 8);
    out.push('^');
    let mut params: Vec<String> = Vec::new();
    let mut wildcard = false;

    let bytes = from.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b':' => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && is_name_byte(bytes[end], end == start) {
                    end += 1;
                }
                if end == start {
                    return Err(PatternError::MissingParamName {
                        pattern: from.to_string(),
                        offset: i,
                    });
                }
                let name = &from[start..end];
                if params.iter().any(|p| p == name) || (name == SPLAT && from.ends_with('*')) {
                    return Err(PatternError::DuplicateParam {
                        pattern: from.to_string(),
                        name: name.to_string(),
                    });
                }
                params.push(name.to_string());
                out.push_str("([^/]+)");
                i = end;
            }
            b'*' => {
                if i != bytes.len() - 1 {
                    return Err(PatternError::MisplacedWildcard(from.to_string()));
                }
                wildcard = true;
                out.push_str("(.*)");
                i += 1;
            }
            _ => {
                // Advance by a whole char so multi-byte literals stay intact.
                let ch = from[i..].chars().next().unwrap_or('\u{fffd}');
                push_escaped(&mut out, ch);
                i += ch.len_utf8();
            }
        }
    }
    out.push('$');

    let regex = Regex::new(&out).map_err(|e| PatternError::InvalidRegex {
        pattern: from.to_string(),
        reason: e.to_string(),
    })?;

    Ok(CompiledPattern {
        source: from.to_string(),
        regex,
        params,
        wildcard,
    })
}

impl CompiledPattern {
    /// The `from` pattern this matcher was built from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The anchored regular expression, as shown in diagnostics.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Parameter names in declaration order.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn has_wildcard(&self) -> bool {
        self.wildcard
    }

    /// The literal text before the first dynamic token.
    pub fn static_prefix(&self) -> &str {
        let end = self
            .source
            .find(&[':', '*'][..])
            .unwrap_or(self.source.len());
        &self.source[..end]
    }

    /// Match a request path, returning the captured values.
    pub fn captures(&self, path: &str) -> Option<Captures> {
        let caps = self.regex.captures(path)?;
        let params = self
            .params
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let value = caps.get(i + 1).map(|m| m.as_str()).unwrap_or_default();
                (name.clone(), value.to_string())
            })
            .collect();
        let splat = if self.wildcard {
            caps.get(self.params.len() + 1)
                .map(|m| m.as_str().to_string())
        } else {
            None
        };
        Some(Captures { params, splat })
    }
}

fn is_name_byte(b: u8, first: bool) -> bool {
    if first {
        b.is_ascii_alphabetic() || b == b'_'
    } else {
        b.is_ascii_alphanumeric() || b == b'_'
    }
}

/// Escape only the characters that carry meaning in a regex outside a class.
fn push_escaped(out: &mut String, ch: char) {
    if matches!(
        ch,
        '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$'
    ) {
        out.push('\\');
    }
    out.push(ch);
}
