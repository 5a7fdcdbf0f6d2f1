//! Byte encoding of bundles.
//!
//! Layout:
//!
//! ```text
//! <N>\n<header json>\n<entry data...>
//! ```
//!
//! `N` is the decimal length of the header JSON including its trailing
//! newline. The header lists every entry under `files` with an offset and
//! length relative to the start of the data section. Entries are written
//! back to back in bundle order, so encoding a decoded canonical bundle
//! reproduces the input exactly.
//!
//! Unrecognized top-level header keys are kept and written after the known
//! ones. Unrecognized fields inside a file record are dropped.

use crate::{Bundle, BundleMetadata, Entry, DEFAULT_MODE};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::debug;

/// Longest accepted length prefix, in digits.
const MAX_LENGTH_DIGITS: usize = 20;

/// Supported header version.
pub const FORMAT_VERSION: u64 = 0;

/// Errors raised while decoding or encoding a bundle.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("missing header length prefix")]
    MissingLength,

    #[error("invalid header length prefix '{0}'")]
    InvalidLength(String),

    #[error("header truncated: expected {expected} bytes, {available} available")]
    TruncatedHeader { expected: usize, available: usize },

    #[error("header is not newline terminated")]
    UnterminatedHeader,

    #[error("malformed header: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported bundle version {0}")]
    UnsupportedVersion(u64),

    #[error("entry '{name}' spans {offset}..{end} but the data section holds {available} bytes")]
    EntryOutOfBounds {
        name: String,
        offset: u64,
        end: u64,
        available: usize,
    },
}

impl From<FormatError> for rebundle_common::Error {
    fn from(e: FormatError) -> Self {
        rebundle_common::Error::InvalidBundle(e.to_string())
    }
}

/// The JSON header at the start of every bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Header {
    pub version: u64,
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub main: Value,
    #[serde(default = "empty_object")]
    pub imports: Value,
    #[serde(default = "empty_object")]
    pub resolutions: Value,
    #[serde(default = "empty_array")]
    pub addons: Value,
    #[serde(default = "empty_array")]
    pub assets: Value,
    #[serde(default)]
    pub files: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Location of one entry inside the data section.
#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct FileRecord {
    pub offset: u64,
    pub length: u64,
    #[serde(default = "default_mode")]
    pub mode: u32,
}

impl FileRecord {
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn empty_array() -> Value {
    Value::Array(Vec::new())
}

fn default_mode() -> u32 {
    DEFAULT_MODE
}

/// A parsed header together with the position of the data section.
pub(crate) struct Layout {
    pub header: Header,
    pub data_start: usize,
}

impl Layout {
    /// File records in header order.
    pub fn records(&self) -> Result<Vec<(String, FileRecord)>, FormatError> {
        self.header
            .files
            .iter()
            .map(|(name, value)| -> Result<_, FormatError> {
                Ok((name.clone(), FileRecord::deserialize(value)?))
            })
            .collect()
    }
}

/// Split a buffer into header and data section.
pub(crate) fn parse_layout(buf: &[u8]) -> Result<Layout, FormatError> {
    let newline = buf
        .iter()
        .take(MAX_LENGTH_DIGITS + 1)
        .position(|&b| b == b'\n')
        .ok_or(FormatError::MissingLength)?;

    let digits = &buf[..newline];
    let invalid = || FormatError::InvalidLength(String::from_utf8_lossy(digits).into_owned());
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }
    let header_len: usize = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(invalid)?;

    let header_start = newline + 1;
    let available = buf.len() - header_start;
    if header_len > available {
        return Err(FormatError::TruncatedHeader {
            expected: header_len,
            available,
        });
    }
    let data_start = header_start + header_len;

    let json = match buf[header_start..data_start].split_last() {
        Some((b'\n', json)) => json,
        _ => return Err(FormatError::UnterminatedHeader),
    };

    let header: Header = serde_json::from_slice(json)?;
    if header.version != FORMAT_VERSION {
        return Err(FormatError::UnsupportedVersion(header.version));
    }

    Ok(Layout { header, data_start })
}

/// Decode a bundle buffer.
pub fn decode(buf: &[u8]) -> Result<Bundle, FormatError> {
    let layout = parse_layout(buf)?;
    let data = &buf[layout.data_start..];
    let records = layout.records()?;

    let Header {
        id,
        main,
        imports,
        resolutions,
        addons,
        assets,
        extra,
        ..
    } = layout.header;
    let mut bundle = Bundle::with_metadata(BundleMetadata {
        id,
        main,
        imports,
        resolutions,
        addons,
        assets,
        extra,
    });

    for (name, record) in records {
        let end = record.end();
        if end > data.len() as u64 {
            return Err(FormatError::EntryOutOfBounds {
                name,
                offset: record.offset,
                end,
                available: data.len(),
            });
        }
        let contents = data[record.offset as usize..end as usize].to_vec();
        bundle.insert(Entry::new(name, contents, record.mode));
    }

    debug!(
        "Decoded bundle: {} entries, {} data bytes",
        bundle.len(),
        data.len()
    );
    Ok(bundle)
}

/// Encode a bundle into its canonical buffer.
pub fn encode(bundle: &Bundle) -> Result<Vec<u8>, FormatError> {
    let mut files = Map::new();
    let mut offset: u64 = 0;
    for entry in bundle {
        let length = entry.len() as u64;
        files.insert(
            entry.name.clone(),
            json!({ "offset": offset, "length": length, "mode": entry.mode }),
        );
        offset += length;
    }

    let metadata = bundle.metadata().clone();
    let header = Header {
        version: FORMAT_VERSION,
        id: metadata.id,
        main: metadata.main,
        imports: metadata.imports,
        resolutions: metadata.resolutions,
        addons: metadata.addons,
        assets: metadata.assets,
        files,
        extra: metadata.extra,
    };

    let mut json = serde_json::to_vec(&header)?;
    json.push(b'\n');

    let prefix = format!("{}\n", json.len());
    let mut buf = Vec::with_capacity(prefix.len() + json.len() + offset as usize);
    buf.extend_from_slice(prefix.as_bytes());
    buf.extend_from_slice(&json);
    for entry in bundle {
        buf.extend_from_slice(&entry.data);
    }
    Ok(buf)
}
