//! Text encodings used to embed a bundle buffer in a string.
//!
//! Every encoding here is lossless: `decode` fails rather than substituting
//! characters, so `encode(decode(buf)) == buf` whenever `decode` succeeds.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use rebundle_common::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Encoding selected with `--encoding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Latin1,
    Ascii,
    Base64,
    Base64Url,
    Hex,
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TextEncoding::Utf8 => "utf8",
            TextEncoding::Utf16Le => "utf16le",
            TextEncoding::Latin1 => "latin1",
            TextEncoding::Ascii => "ascii",
            TextEncoding::Base64 => "base64",
            TextEncoding::Base64Url => "base64url",
            TextEncoding::Hex => "hex",
        };
        f.write_str(name)
    }
}

impl FromStr for TextEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(TextEncoding::Utf8),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Ok(TextEncoding::Utf16Le),
            "latin1" | "binary" => Ok(TextEncoding::Latin1),
            "ascii" => Ok(TextEncoding::Ascii),
            "base64" => Ok(TextEncoding::Base64),
            "base64url" => Ok(TextEncoding::Base64Url),
            "hex" => Ok(TextEncoding::Hex),
            _ => Err(Error::Config(format!("Unknown encoding '{}'", s))),
        }
    }
}

impl TextEncoding {
    fn error(&self, reason: impl Into<String>) -> Error {
        Error::Encoding {
            encoding: self.to_string(),
            reason: reason.into(),
        }
    }

    /// Decode bytes into a string.
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        match self {
            TextEncoding::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| {
                self.error(format!(
                    "invalid UTF-8 at byte {}",
                    e.utf8_error().valid_up_to()
                ))
            }),
            TextEncoding::Utf16Le => {
                if bytes.len() % 2 != 0 {
                    return Err(self.error(format!("odd byte length {}", bytes.len())));
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16(&units).map_err(|_| self.error("unpaired surrogate"))
            }
            TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            TextEncoding::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(pos) => Err(self.error(format!("non-ASCII byte at {}", pos))),
                None => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            },
            TextEncoding::Base64 => Ok(STANDARD.encode(bytes)),
            TextEncoding::Base64Url => Ok(URL_SAFE_NO_PAD.encode(bytes)),
            TextEncoding::Hex => Ok(hex::encode(bytes)),
        }
    }

    /// Encode a string back into bytes. Inverse of [`TextEncoding::decode`].
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        match self {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Utf16Le => Ok(text
                .encode_utf16()
                .flat_map(|unit| unit.to_le_bytes())
                .collect()),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| {
                    u8::try_from(u32::from(c))
                        .map_err(|_| self.error(format!("'{}' is outside latin1", c)))
                })
                .collect(),
            TextEncoding::Ascii => {
                if text.is_ascii() {
                    Ok(text.as_bytes().to_vec())
                } else {
                    Err(self.error("text is not ASCII"))
                }
            }
            TextEncoding::Base64 => STANDARD.decode(text).map_err(|e| self.error(e.to_string())),
            TextEncoding::Base64Url => URL_SAFE_NO_PAD
                .decode(text)
                .map_err(|e| self.error(e.to_string())),
            TextEncoding::Hex => hex::decode(text).map_err(|e| self.error(e.to_string())),
        }
    }
}
