//! Message filtering applied before a message is recorded or delivered.
//!
//! A filter is a pure text transform. It never sees the sender or the
//! membership, so the censorship rule can be audited on its own.

use crate::error::{HubError, Result};
use std::collections::{BTreeMap, HashSet};

/// Term masked by the default denylist.
pub const DEFAULT_BANNED_TERM: &str = "badword";

/// Character used by [`Denylist::masking`].
pub const MASK_CHAR: char = '*';

/// A deterministic, stateless text transform.
pub trait MessageFilter: Send + Sync {
    fn apply(&self, text: &str) -> String;
}

impl<F> MessageFilter for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn apply(&self, text: &str) -> String {
        self(text)
    }
}

/// Filter that returns the text untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassThrough;

impl MessageFilter for PassThrough {
    fn apply(&self, text: &str) -> String {
        text.to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct DenyEntry {
    term: String,
    replacement: String,
}

/// Replaces every occurrence of each banned term with its replacement.
///
/// Longer terms are applied first so that `"badwords"` wins over
/// `"badword"` when both are listed. Construction rejects replacements that
/// are empty or share a character with any banned term; with that rule a
/// single pass leaves nothing for a second pass to change. A term listed
/// twice must map to the same replacement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Denylist {
    entries: Vec<DenyEntry>,
}

impl Denylist {
    /// Build from `(term, replacement)` pairs.
    pub fn new<I, T, R>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (T, R)>,
        T: Into<String>,
        R: Into<String>,
    {
        let mut entries: Vec<DenyEntry> = entries
            .into_iter()
            .map(|(term, replacement)| DenyEntry {
                term: term.into(),
                replacement: replacement.into(),
            })
            .collect();

        if let Some(empty) = entries.iter().find(|e| e.term.is_empty()) {
            return Err(HubError::InvalidFilter(format!(
                "empty banned term (replacement {:?})",
                empty.replacement
            )));
        }

        // Erasing a term outright could splice its neighbours into a new one.
        if let Some(erased) = entries.iter().find(|e| e.replacement.is_empty()) {
            return Err(HubError::InvalidFilter(format!(
                "empty replacement for {:?}",
                erased.term
            )));
        }

        let term_chars: HashSet<char> = entries.iter().flat_map(|e| e.term.chars()).collect();
        for entry in &entries {
            if let Some(c) = entry.replacement.chars().find(|c| term_chars.contains(c)) {
                return Err(HubError::InvalidFilter(format!(
                    "replacement {:?} for {:?} contains {:?}, which appears in a banned term",
                    entry.replacement, entry.term, c
                )));
            }
        }

        entries.sort_by(|a, b| {
            b.term
                .chars()
                .count()
                .cmp(&a.term.chars().count())
                .then_with(|| a.term.cmp(&b.term))
        });
        if let Some(pair) = entries
            .windows(2)
            .find(|w| w[0].term == w[1].term && w[0].replacement != w[1].replacement)
        {
            return Err(HubError::InvalidFilter(format!(
                "conflicting replacements for {:?}: {:?} and {:?}",
                pair[0].term, pair[0].replacement, pair[1].replacement
            )));
        }
        entries.dedup_by(|a, b| a.term == b.term);

        Ok(Self { entries })
    }

    /// Mask each term with `*` of the same character width.
    pub fn masking<I, T>(terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::new(terms.into_iter().map(|t| {
            let term = t.into();
            let mask: String = std::iter::repeat(MASK_CHAR)
                .take(term.chars().count())
                .collect();
            (term, mask)
        }))
    }

    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self> {
        Self::new(map.iter().map(|(t, r)| (t.clone(), r.clone())))
    }

    /// A denylist that bans nothing.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Banned terms in application order.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.term.as_str())
    }
}

impl Default for Denylist {
    fn default() -> Self {
        Self {
            entries: vec![DenyEntry {
                term: DEFAULT_BANNED_TERM.to_string(),
                replacement: "*****".to_string(),
            }],
        }
    }
}

impl MessageFilter for Denylist {
    fn apply(&self, text: &str) -> String {
        let mut filtered = text.to_string();
        for entry in &self.entries {
            if filtered.contains(&entry.term) {
                filtered = filtered.replace(&entry.term, &entry.replacement);
            }
        }
        filtered
    }
}
