//! Canonical drug pairs.
//!
//! A pair is stored with its two names in byte-lexicographic order so the
//! key is independent of argument order. Changing the ordering invalidates
//! every existing cache key.

/// Separator between the two names in a pair key.
pub const KEY_SEPARATOR: char = '|';
const ESCAPE: char = '\\';

/// An unordered pair of two distinct drug names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrugPair {
    low: String,
    high: String,
}

impl DrugPair {
    /// Build the canonical pair. Returns `None` for a self-pair or a blank
    /// name; neither is ever audited.
    pub fn new(a: &str, b: &str) -> Option<Self> {
        if a.trim().is_empty() || b.trim().is_empty() || a == b {
            return None;
        }
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Some(Self {
            low: low.to_string(),
            high: high.to_string(),
        })
    }

    pub fn low(&self) -> &str {
        &self.low
    }

    pub fn high(&self) -> &str {
        &self.high
    }

    pub fn contains(&self, drug: &str) -> bool {
        self.low == drug || self.high == drug
    }

    /// Cache key `"{low}|{high}"`.
    ///
    /// `|` and `\` inside a name are backslash-escaped so two different
    /// pairs can never share a key.
    pub fn key(&self) -> String {
        let mut key = String::with_capacity(self.low.len() + self.high.len() + 1);
        push_escaped(&mut key, &self.low);
        key.push(KEY_SEPARATOR);
        push_escaped(&mut key, &self.high);
        key
    }

    /// Parse a key produced by [`DrugPair::key`]. Keys that are not in
    /// canonical order are rejected.
    pub fn from_key(key: &str) -> Option<Self> {
        let mut parts: Vec<String> = vec![String::new()];
        let mut chars = key.chars();
        while let Some(c) = chars.next() {
            match c {
                ESCAPE => parts.last_mut()?.push(chars.next()?),
                KEY_SEPARATOR => parts.push(String::new()),
                other => parts.last_mut()?.push(other),
            }
        }
        if parts.len() != 2 {
            return None;
        }
        let pair = Self::new(&parts[0], &parts[1])?;
        (pair.low == parts[0]).then_some(pair)
    }
}

impl std::fmt::Display for DrugPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} + {}", self.low, self.high)
    }
}

fn push_escaped(out: &mut String, name: &str) {
    for c in name.chars() {
        if c == KEY_SEPARATOR || c == ESCAPE {
            out.push(ESCAPE);
        }
        out.push(c);
    }
}

/// Canonicalize two drug names into `(low, high, key)` form.
pub fn canonicalize(a: &str, b: &str) -> Option<DrugPair> {
    DrugPair::new(a, b)
}
