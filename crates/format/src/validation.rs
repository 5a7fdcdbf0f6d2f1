//! Layout checks that go beyond what decoding requires.

use crate::codec::{parse_layout, FormatError};

/// Result of inspecting a bundle buffer.
#[derive(Debug)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<FormatError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: FormatError) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Inspect the layout of a bundle buffer.
///
/// Out-of-range entries are errors. Overlapping entries and data bytes no
/// entry refers to are warnings, since such a bundle still decodes but will
/// not be reproduced byte for byte when re-encoded.
pub fn validate_layout(buf: &[u8]) -> Result<ValidationResult, FormatError> {
    let layout = parse_layout(buf)?;
    let available = buf.len() - layout.data_start;
    let mut result = ValidationResult::new();

    let mut ranges = Vec::new();
    for (name, record) in layout.records()? {
        if record.end() > available as u64 {
            result.add_error(FormatError::EntryOutOfBounds {
                name,
                offset: record.offset,
                end: record.end(),
                available,
            });
        } else {
            ranges.push((record.offset, record.end(), name));
        }
    }

    ranges.sort();
    let mut covered: u64 = 0;
    let mut previous: Option<&str> = None;
    for (start, end, name) in &ranges {
        if *start < covered {
            result.add_warning(format!(
                "entry '{}' overlaps entry '{}'",
                name,
                previous.unwrap_or_default()
            ));
        } else if *start > covered {
            result.add_warning(format!(
                "{} unreferenced bytes before entry '{}'",
                start - covered,
                name
            ));
        }
        if *end >= covered {
            covered = *end;
            previous = Some(name);
        }
    }

    if covered < available as u64 {
        result.add_warning(format!(
            "{} unreferenced bytes after the last entry",
            available as u64 - covered
        ));
    }

    Ok(result)
}
