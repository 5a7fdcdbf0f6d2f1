//! The mutation contract plugins see.

use crate::Entry;

/// Named read/write access to the entries of a bundle.
///
/// `snapshot_names` captures the entry names present at the time of the call.
/// Writes made afterwards are visible through `read` right away but never
/// change a snapshot that was already taken.
pub trait EntryStore {
    /// Current state of the named entry.
    fn read(&self, name: &str) -> Option<Entry>;

    /// Insert or overwrite an entry.
    ///
    /// With `mode == None` an existing entry keeps its mode and a new entry
    /// gets [`crate::DEFAULT_MODE`].
    fn write(&mut self, name: &str, data: Vec<u8>, mode: Option<u32>);

    /// Entry names in iteration order.
    fn snapshot_names(&self) -> Vec<String>;
}
