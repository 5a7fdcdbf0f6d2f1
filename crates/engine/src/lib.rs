//! Rebundle engine - apply transform plugins to a bundle and encode the result.

pub mod encoding;
pub mod exec;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod plugin;
pub mod transform;

pub use encoding::TextEncoding;
pub use exec::ExecPlugin;
pub use loader::{ExecPluginLoader, PluginLoader, StaticPluginLoader};
pub use output::{decode_output, encode_output, OutputFormat};
pub use pipeline::{Pipeline, PipelineConfig, RunSummary};
pub use plugin::{plugin_fn, EntryWrite, FnPlugin, Plugin, PluginOutcome, PendingResult};
pub use transform::{TransformEngine, TransformReport};
