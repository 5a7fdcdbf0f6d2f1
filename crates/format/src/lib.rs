//! Bundle container format for rebundle.
//!
//! A bundle packages named, moded byte entries into one buffer. This crate
//! owns the in-memory model, the byte codec and the `EntryStore` contract
//! that transform plugins mutate bundles through.

pub mod bundle;
pub mod codec;
pub mod entry;
pub mod store;
pub mod validation;

pub use bundle::{Bundle, BundleMetadata};
pub use codec::FormatError;
pub use entry::{Entry, DEFAULT_MODE};
pub use store::EntryStore;
pub use validation::{validate_layout, ValidationResult};
