//! Output formats for the transformed bundle.

use crate::encoding::TextEncoding;
use rebundle_common::{Error, Result};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Encoding of the bytes a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// The raw bundle buffer.
    #[default]
    Bundle,
    /// `module.exports = "<bundle>"`
    Cjs,
    /// `export default "<bundle>"`
    Esm,
    /// `"<bundle>"`
    Json,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Bundle,
        OutputFormat::Cjs,
        OutputFormat::Esm,
        OutputFormat::Json,
    ];

    /// Name accepted by `--format`.
    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Bundle => "bundle",
            OutputFormat::Cjs => "bundle.cjs",
            OutputFormat::Esm => "bundle.mjs",
            OutputFormat::Json => "bundle.json",
        }
    }

    /// Pick a format from the output path's suffix.
    pub fn infer(out: Option<&Path>) -> Self {
        let Some(out) = out else {
            return OutputFormat::Bundle;
        };
        let out = out.to_string_lossy();
        if out.ends_with(".bundle.js") || out.ends_with(".bundle.cjs") {
            OutputFormat::Cjs
        } else if out.ends_with(".bundle.mjs") {
            OutputFormat::Esm
        } else if out.ends_with(".bundle.json") {
            OutputFormat::Json
        } else {
            OutputFormat::Bundle
        }
    }

    /// Use the explicit format if one was given, otherwise infer it.
    pub fn resolve(explicit: Option<&str>, out: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(name) => name.parse(),
            None => Ok(Self::infer(out)),
        }
    }

    /// Whether the bundle is embedded as a string literal.
    pub fn is_wrapped(&self) -> bool {
        !matches!(self, OutputFormat::Bundle)
    }

    fn prefix(&self) -> &'static str {
        match self {
            OutputFormat::Cjs => "module.exports = ",
            OutputFormat::Esm => "export default ",
            OutputFormat::Bundle | OutputFormat::Json => "",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.name() == s)
            .ok_or_else(|| Error::Config(format!("Unknown format '{}'", s)))
    }
}

/// Produce the output bytes for a serialized bundle.
pub fn encode_output(buf: &[u8], format: OutputFormat, encoding: TextEncoding) -> Result<Vec<u8>> {
    if !format.is_wrapped() {
        return Ok(buf.to_vec());
    }

    let text = encoding.decode(buf)?;
    let literal = serde_json::to_string(&text)?;

    let prefix = format.prefix();
    let mut out = Vec::with_capacity(prefix.len() + literal.len() + 1);
    out.extend_from_slice(prefix.as_bytes());
    out.extend_from_slice(literal.as_bytes());
    out.push(b'\n');
    Ok(out)
}

/// Recover the serialized bundle from output bytes. Inverse of [`encode_output`].
pub fn decode_output(
    output: &[u8],
    format: OutputFormat,
    encoding: TextEncoding,
) -> Result<Vec<u8>> {
    if !format.is_wrapped() {
        return Ok(output.to_vec());
    }

    let malformed = || Error::InvalidBundle(format!("not a {} document", format));
    let text = std::str::from_utf8(output).map_err(|_| malformed())?;
    let literal = text
        .strip_prefix(format.prefix())
        .and_then(|rest| rest.strip_suffix('\n'))
        .ok_or_else(malformed)?;

    let embedded: String = serde_json::from_str(literal)?;
    encoding.encode(&embedded)
}
