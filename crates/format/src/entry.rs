//! Bundle entries.

use serde::{Deserialize, Serialize};

/// Mode given to entries written without an explicit mode (`0o644`).
pub const DEFAULT_MODE: u32 = 0o644;

/// One `(name, data, mode)` record inside a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Path-like identifier, unique within a bundle.
    pub name: String,
    /// Raw entry contents.
    pub data: Vec<u8>,
    /// Permission bits.
    pub mode: u32,
}

impl Entry {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>, mode: u32) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            mode,
        }
    }

    /// Size of the entry contents in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
