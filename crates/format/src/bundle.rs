//! In-memory bundle model.

use crate::codec::{self, FormatError};
use crate::{Entry, EntryStore, DEFAULT_MODE};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Header fields carried through a transform untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleMetadata {
    pub id: Value,
    pub main: Value,
    pub imports: Value,
    pub resolutions: Value,
    pub addons: Value,
    pub assets: Value,
    /// Unrecognized header keys, in the order they were read.
    pub extra: Map<String, Value>,
}

impl Default for BundleMetadata {
    fn default() -> Self {
        Self {
            id: Value::Null,
            main: Value::Null,
            imports: Value::Object(Default::default()),
            resolutions: Value::Object(Default::default()),
            addons: Value::Array(Vec::new()),
            assets: Value::Array(Vec::new()),
            extra: Map::new(),
        }
    }
}

/// An ordered container of uniquely named entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bundle {
    metadata: BundleMetadata,
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl Bundle {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty bundle with the given header metadata.
    pub fn with_metadata(metadata: BundleMetadata) -> Self {
        Self {
            metadata,
            ..Self::default()
        }
    }

    /// Parse a bundle from its canonical byte encoding.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, FormatError> {
        codec::decode(buf)
    }

    /// Serialize the bundle to its canonical byte encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        codec::encode(self)
    }

    pub fn metadata(&self) -> &BundleMetadata {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    /// Insert an entry, replacing any entry of the same name in place.
    pub fn insert(&mut self, entry: Entry) {
        match self.index.get(&entry.name) {
            Some(&i) => self.entries[i] = entry,
            None => {
                self.index.insert(entry.name.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }
}

impl<'a> IntoIterator for &'a Bundle {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl EntryStore for Bundle {
    fn read(&self, name: &str) -> Option<Entry> {
        self.get(name).cloned()
    }

    fn write(&mut self, name: &str, data: Vec<u8>, mode: Option<u32>) {
        let mode = mode
            .or_else(|| self.get(name).map(|e| e.mode))
            .unwrap_or(DEFAULT_MODE);
        self.insert(Entry {
            name: name.to_string(),
            data,
            mode,
        });
    }

    fn snapshot_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }
}
