//! Declarative fixed-width record layouts.
//!
//! Offsets and lengths are **bytes** in the Shift_JIS record, not characters.

use std::collections::HashSet;
use std::fmt;

use crate::convert::Conversion;

/// Prefix marking filler / bookkeeping fields. They are decoded but never stored.
pub const INTERNAL_PREFIX: char = '_';

/// One field of a record layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub offset: usize,
    pub length: usize,
    pub conversion: Option<Conversion>,
}

impl FieldSpec {
    /// Field kept as trimmed text.
    pub fn text(name: impl Into<String>, offset: usize, length: usize) -> Self {
        Self {
            name: name.into(),
            offset,
            length,
            conversion: None,
        }
    }

    pub fn typed(name: impl Into<String>, offset: usize, length: usize, conversion: Conversion) -> Self {
        Self {
            name: name.into(),
            offset,
            length,
            conversion: Some(conversion),
        }
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    pub fn is_internal(&self) -> bool {
        self.name.starts_with(INTERNAL_PREFIX)
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// Record type tags are exactly two ASCII alphanumerics.
    InvalidTag(String),
    Empty { record_type: String },
    ZeroLength { record_type: String, field: String },
    DuplicateField { record_type: String, field: String },
    /// A layout was registered under a tag other than its own.
    TagMismatch { tag: String, layout: String },
    /// A field starts before the previous one ends.
    Overlap {
        record_type: String,
        field: String,
        offset: usize,
        previous_end: usize,
    },
    /// The last field does not end exactly at the declared record length.
    LengthMismatch {
        record_type: String,
        declared: usize,
        last_end: usize,
    },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::InvalidTag(tag) => {
                write!(f, "invalid record type tag '{tag}' (expected two ASCII characters)")
            }
            LayoutError::Empty { record_type } => {
                write!(f, "layout {record_type} has no fields")
            }
            LayoutError::ZeroLength { record_type, field } => {
                write!(f, "layout {record_type}: field '{field}' has zero length")
            }
            LayoutError::DuplicateField { record_type, field } => {
                write!(f, "layout {record_type}: duplicate field '{field}'")
            }
            LayoutError::TagMismatch { tag, layout } => {
                write!(f, "cannot register layout {layout} under tag {tag}")
            }
            LayoutError::Overlap {
                record_type,
                field,
                offset,
                previous_end,
            } => write!(
                f,
                "layout {record_type}: field '{field}' at offset {offset} overlaps previous field ending at {previous_end}"
            ),
            LayoutError::LengthMismatch {
                record_type,
                declared,
                last_end,
            } => write!(
                f,
                "layout {record_type}: last field ends at {last_end}, declared length is {declared}"
            ),
        }
    }
}

impl std::error::Error for LayoutError {}

// ---------------------------------------------------------------------------
// RecordLayout
// ---------------------------------------------------------------------------

/// Ordered, non-overlapping field list for one record type. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    record_type: String,
    length: usize,
    fields: Vec<FieldSpec>,
}

pub fn is_valid_tag(tag: &str) -> bool {
    tag.len() == 2 && tag.bytes().all(|b| b.is_ascii_alphanumeric())
}

impl RecordLayout {
    pub fn new(
        record_type: impl Into<String>,
        length: usize,
        fields: Vec<FieldSpec>,
    ) -> Result<Self, LayoutError> {
        let record_type = record_type.into();
        if !is_valid_tag(&record_type) {
            return Err(LayoutError::InvalidTag(record_type));
        }
        if fields.is_empty() {
            return Err(LayoutError::Empty { record_type });
        }

        let mut seen: HashSet<&str> = HashSet::new();
        let mut previous_end = 0usize;
        for f in &fields {
            if f.length == 0 {
                return Err(LayoutError::ZeroLength {
                    record_type,
                    field: f.name.clone(),
                });
            }
            if !seen.insert(f.name.as_str()) {
                return Err(LayoutError::DuplicateField {
                    record_type,
                    field: f.name.clone(),
                });
            }
            if f.offset < previous_end {
                return Err(LayoutError::Overlap {
                    record_type,
                    field: f.name.clone(),
                    offset: f.offset,
                    previous_end,
                });
            }
            previous_end = f.end();
        }

        if previous_end != length {
            return Err(LayoutError::LengthMismatch {
                record_type,
                declared: length,
                last_end: previous_end,
            });
        }

        Ok(Self {
            record_type,
            length,
            fields,
        })
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// Declared total length in bytes, record delimiter included.
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields that end up as storage columns.
    pub fn columns(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| !f.is_internal())
    }
}
