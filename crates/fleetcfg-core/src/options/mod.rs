//! Option mapping shared by the northbound and southbound records.
//!
//! [`OptionMap`] is an order-irrelevant string→string mapping with the
//! lookup semantics the reconciler depends on (missing keys fall back to
//! caller defaults, boolean options tolerate operator spellings).
//!
//! [`is_out_of_sync`] is the key-sync comparator used by every
//! classification pass: it decides whether a single key diverges between
//! the live record and the cached mirror under a presence policy.
//!
//! # Invariants
//!
//! - `is_out_of_sync` is a total pure function; it never fails and has no
//!   side effects.
//! - The key catalogues in [`keys`] are closed sets. Adding a key there is
//!   a behavioral change to classification and must be deliberate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod keys;

/// Order-irrelevant string→string option mapping.
///
/// Backed by a `BTreeMap` so equality and serialization are independent of
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionMap(BTreeMap<String, String>);

impl OptionMap {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns the value for `key`, or `default` if absent.
    #[must_use]
    pub fn get_def<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Reads a boolean option.
    ///
    /// Recognizes `true`/`false` case-insensitively; any other spelling
    /// (and absence) yields `default`.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(v) if v.eq_ignore_ascii_case("true") => true,
            Some(v) if v.eq_ignore_ascii_case("false") => false,
            _ => default,
        }
    }

    /// Sets `key` to `value`, overwriting any previous value.
    pub fn replace(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Removes `key` if present.
    pub fn remove(&mut self, key: &str) {
        self.0.remove(key);
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the mapping is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OptionMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a OptionMap {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Key-sync comparator: does `key` diverge between `live` and `cached`?
///
/// Policy:
/// - `must_be_present` and the key is absent from either mapping → out of
///   sync.
/// - Absent from both → in sync.
/// - Absent from exactly one → out of sync.
/// - Otherwise → out of sync iff the string values differ.
#[must_use]
pub fn is_out_of_sync(
    live: &OptionMap,
    cached: &OptionMap,
    key: &str,
    must_be_present: bool,
) -> bool {
    let value = live.get(key);
    if value.is_none() && must_be_present {
        return true;
    }

    let cached_value = cached.get(key);
    if cached_value.is_none() && must_be_present {
        return true;
    }

    match (value, cached_value) {
        (None, None) => false,
        (Some(v), Some(c)) => v != c,
        _ => true,
    }
}
