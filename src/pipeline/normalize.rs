//! Identifier validation and order-preserving deduplication.
//!
//! The search reports the same document more than once when it appears in
//! several databases. Deduplication keeps the first occurrence so the
//! processing order matches the upstream sort order.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;

/// Opaque token naming one upstream document.
///
/// Used verbatim as a URL path segment and as a file-name stem, so it must be
/// non-empty and free of characters that would need escaping in either place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Validate a raw token. Returns `None` for tokens unsafe as a file name
    /// or URL segment.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let token = raw.trim();
        if token.is_empty() || token == "." || token == ".." {
            return None;
        }
        let unsafe_char = |c: char| {
            c.is_whitespace()
                || c.is_control()
                || matches!(c, '/' | '\\' | '?' | '#' | '%' | ':' | '*' | '"' | '<' | '>' | '|')
        };
        if token.chars().any(unsafe_char) {
            return None;
        }
        Some(Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Drop repeated items, keeping the first occurrence of each in input order.
pub fn dedupe<T>(items: impl IntoIterator<Item = T>) -> Vec<T>
where
    T: Eq + Hash + Clone,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
