//! Common utilities and types shared across rebundle crates.

pub mod error;
pub mod hash;

pub use error::{Error, Result};
