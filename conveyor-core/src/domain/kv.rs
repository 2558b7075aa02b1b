//! Key/value lists
//!
//! Used for pipeline variables and stage environment entries. Rows may be
//! incomplete while the user is typing; they are kept in the list and only
//! dropped when the list is collapsed into a mapping.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ModelError;

/// One row of a key/value list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Trimmed pair, or `None` if either side is blank
    pub fn complete(&self) -> Option<(&str, &str)> {
        let key = self.key.trim();
        let value = self.value.trim();
        if key.is_empty() || value.is_empty() {
            None
        } else {
            Some((key, value))
        }
    }

    /// Parse a raw `KEY=VALUE` string
    ///
    /// Splits on the first `=`. A string without `=` becomes a key with an
    /// empty value, which is incomplete.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('=') {
            Some((key, value)) => Self::new(key, value),
            None => Self::new(raw, ""),
        }
    }
}

/// Which side of a row an update targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    Key,
    Value,
}

/// Ordered list of key/value rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyValueList {
    entries: Vec<KeyValue>,
}

impl KeyValueList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[KeyValue] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an empty row
    pub fn push_empty(&self) -> Self {
        self.with_entry(KeyValue::default())
    }

    /// Append a row
    pub fn with_entry(&self, entry: KeyValue) -> Self {
        let mut entries = self.entries.clone();
        entries.push(entry);
        Self { entries }
    }

    /// Replace the key or the value of row `index`
    pub fn update(
        &self,
        index: usize,
        part: Part,
        value: impl Into<String>,
    ) -> Result<Self, ModelError> {
        let mut entries = self.entries.clone();
        let len = entries.len();
        let entry = entries.get_mut(index).ok_or(ModelError::EntryOutOfRange {
            list: "key/value list",
            index,
            len,
        })?;
        match part {
            Part::Key => entry.key = value.into(),
            Part::Value => entry.value = value.into(),
        }
        Ok(Self { entries })
    }

    /// Replace row `index` wholesale
    pub fn replace(&self, index: usize, entry: KeyValue) -> Result<Self, ModelError> {
        let mut entries = self.entries.clone();
        let len = entries.len();
        let slot = entries.get_mut(index).ok_or(ModelError::EntryOutOfRange {
            list: "key/value list",
            index,
            len,
        })?;
        *slot = entry;
        Ok(Self { entries })
    }

    /// Remove row `index`
    pub fn remove(&self, index: usize) -> Result<Self, ModelError> {
        if index >= self.entries.len() {
            return Err(ModelError::EntryOutOfRange {
                list: "key/value list",
                index,
                len: self.entries.len(),
            });
        }
        let mut entries = self.entries.clone();
        entries.remove(index);
        Ok(Self { entries })
    }

    /// Trimmed complete rows, in list order
    pub fn complete_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(KeyValue::complete)
    }

    /// Collapse into a mapping, dropping incomplete rows
    ///
    /// When a key repeats, the later row wins.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.complete_entries()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Build from a mapping, in the mapping's iteration order
    pub fn from_map<'a, I>(map: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        map.into_iter()
            .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
            .collect()
    }

    /// Complete rows rendered as `KEY=VALUE` strings
    pub fn to_assignments(&self) -> Vec<String> {
        self.complete_entries()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect()
    }
}

impl FromIterator<KeyValue> for KeyValueList {
    fn from_iter<T: IntoIterator<Item = KeyValue>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
