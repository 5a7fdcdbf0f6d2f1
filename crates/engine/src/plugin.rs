//! The transform plugin contract.

use rebundle_format::{Entry, EntryStore};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Deferred outcome of an asynchronous plugin invocation.
///
/// Async work never touches the bundle directly. It resolves to the writes
/// it wants to make, and the engine applies them once every pending result
/// has settled.
pub type PendingResult = Pin<Box<dyn Future<Output = anyhow::Result<Vec<EntryWrite>>> + Send>>;

/// What a plugin invocation returned.
pub enum PluginOutcome {
    /// All work happened synchronously.
    Done,
    /// Work continues in the background.
    Pending(PendingResult),
}

impl PluginOutcome {
    /// Wrap a future as a pending outcome.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = anyhow::Result<Vec<EntryWrite>>> + Send + 'static,
    {
        PluginOutcome::Pending(Box::pin(future))
    }
}

impl fmt::Debug for PluginOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginOutcome::Done => f.write_str("Done"),
            PluginOutcome::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// A write produced by an asynchronous plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryWrite {
    pub name: String,
    pub data: Vec<u8>,
    pub mode: Option<u32>,
}

impl EntryWrite {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            mode: None,
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Apply the write to a store.
    pub fn apply(self, store: &mut dyn EntryStore) {
        store.write(&self.name, self.data, self.mode);
    }
}

/// A transform applied to every entry of a bundle.
///
/// `apply` runs once per entry. It may write to the store directly; such
/// writes are visible to every later invocation in the run. Returning
/// [`PluginOutcome::Pending`] defers the rest of the work until the engine's
/// final join.
pub trait Plugin: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    fn apply(&self, store: &mut dyn EntryStore, entry: &Entry) -> anyhow::Result<PluginOutcome>;
}

/// A plugin backed by a closure.
pub struct FnPlugin<F> {
    name: String,
    f: F,
}

impl<F> Plugin for FnPlugin<F>
where
    F: Fn(&mut dyn EntryStore, &Entry) -> anyhow::Result<PluginOutcome> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, store: &mut dyn EntryStore, entry: &Entry) -> anyhow::Result<PluginOutcome> {
        (self.f)(store, entry)
    }
}

/// Build a plugin from a closure.
pub fn plugin_fn<F>(name: impl Into<String>, f: F) -> FnPlugin<F>
where
    F: Fn(&mut dyn EntryStore, &Entry) -> anyhow::Result<PluginOutcome> + Send + Sync,
{
    FnPlugin {
        name: name.into(),
        f,
    }
}
