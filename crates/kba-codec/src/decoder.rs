//! Field decoder: raw record bytes + layout -> [`DecodedRecord`].

use std::fmt;

use serde::Serialize;

use crate::convert::ConversionError;
use crate::layout::{RecordLayout, INTERNAL_PREFIX};
use crate::recover::decode_sjis_lossy;
use crate::value::Value;

/// Byte offset of the change-kind flag (directly after the two-byte tag).
pub const CHANGE_KIND_OFFSET: usize = 2;

/// Change kind carried in every record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    New,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'1' => Some(ChangeKind::New),
            b'2' => Some(ChangeKind::Update),
            b'3' => Some(ChangeKind::Delete),
            _ => None,
        }
    }

    pub fn code(&self) -> char {
        match self {
            ChangeKind::New => '1',
            ChangeKind::Update => '2',
            ChangeKind::Delete => '3',
        }
    }
}

// ---------------------------------------------------------------------------
// DecodedRecord
// ---------------------------------------------------------------------------

/// One fully decoded record. Field order follows the layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedRecord {
    record_type: String,
    change_kind: ChangeKind,
    fields: Vec<(String, Value)>,
}

impl DecodedRecord {
    /// Assemble a record from already typed values.
    pub fn new(
        record_type: impl Into<String>,
        change_kind: ChangeKind,
        fields: Vec<(String, Value)>,
    ) -> Self {
        Self {
            record_type: record_type.into(),
            change_kind,
            fields,
        }
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub fn change_kind(&self) -> ChangeKind {
        self.change_kind
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// Fields without internal bookkeeping entries (names starting with `_`).
    pub fn storable_fields(&self) -> Vec<(String, Value)> {
        self.fields
            .iter()
            .filter(|(k, _)| !k.starts_with(INTERNAL_PREFIX))
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordDecodeError {
    /// The buffer is shorter than the layout's declared length.
    Truncated {
        record_type: String,
        expected: usize,
        actual: usize,
    },
    /// The header change-kind byte is not `1`, `2` or `3`.
    UnknownChangeKind { record_type: String, raw: String },
    /// A field failed its conversion; the whole record is rejected.
    Conversion {
        record_type: String,
        field: String,
        raw: String,
        source: ConversionError,
    },
}

impl fmt::Display for RecordDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordDecodeError::Truncated {
                record_type,
                expected,
                actual,
            } => write!(
                f,
                "record {record_type}: buffer has {actual} bytes, layout needs {expected}"
            ),
            RecordDecodeError::UnknownChangeKind { record_type, raw } => {
                write!(f, "record {record_type}: unknown change kind '{raw}'")
            }
            RecordDecodeError::Conversion {
                record_type,
                field,
                raw,
                source,
            } => write!(
                f,
                "record {record_type}: field '{field}' raw '{raw}': {source}"
            ),
        }
    }
}

impl std::error::Error for RecordDecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecordDecodeError::Conversion { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn trim_field(s: &str) -> &str {
    // Full-width padding (U+3000) counts as whitespace in Shift_JIS text fields.
    s.trim_matches(|c: char| c.is_whitespace() || c == '\u{3000}')
}

/// Decode `raw` (already recovered Shift_JIS bytes) with `layout`.
///
/// Fails fast on short buffers; any field conversion failure rejects the
/// whole record.
pub fn decode(layout: &RecordLayout, raw: &[u8]) -> Result<DecodedRecord, RecordDecodeError> {
    let record_type = layout.record_type();
    if raw.len() < layout.length() {
        return Err(RecordDecodeError::Truncated {
            record_type: record_type.to_string(),
            expected: layout.length(),
            actual: raw.len(),
        });
    }

    let kind_byte = raw[CHANGE_KIND_OFFSET];
    let change_kind =
        ChangeKind::from_code(kind_byte).ok_or_else(|| RecordDecodeError::UnknownChangeKind {
            record_type: record_type.to_string(),
            raw: decode_sjis_lossy(&[kind_byte]),
        })?;

    let mut fields = Vec::with_capacity(layout.fields().len());
    for spec in layout.fields() {
        let text = decode_sjis_lossy(&raw[spec.offset..spec.end()]);
        let trimmed = trim_field(&text);

        let value = match spec.conversion {
            Some(conv) => conv
                .apply(trimmed)
                .map_err(|source| RecordDecodeError::Conversion {
                    record_type: record_type.to_string(),
                    field: spec.name.clone(),
                    raw: text.clone(),
                    source,
                })?,
            None => Value::Text(trimmed.to_string()),
        };
        fields.push((spec.name.clone(), value));
    }

    Ok(DecodedRecord {
        record_type: record_type.to_string(),
        change_kind,
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::Conversion;
    use crate::layout::FieldSpec;
    use crate::recover::encode_sjis;
    use chrono::NaiveDate;

    fn layout() -> RecordLayout {
        RecordLayout::new(
            "ZZ",
            27,
            vec![
                FieldSpec::text("RecordSpec", 0, 2),
                FieldSpec::text("DataKubun", 2, 1),
                FieldSpec::typed("MakeDate", 3, 8, Conversion::Date),
                FieldSpec::text("Name", 11, 10),
                FieldSpec::typed("Odds", 21, 4, Conversion::Odds),
                FieldSpec::text("_Delimiter", 25, 2),
            ],
        )
        .unwrap()
    }

    fn raw(kind: &str, date: &str, name: &str, odds: &str) -> Vec<u8> {
        let mut out = b"ZZ".to_vec();
        out.extend(kind.as_bytes());
        out.extend(date.as_bytes());
        let mut n = encode_sjis(name);
        n.resize(10, b' ');
        out.extend(n);
        out.extend(odds.as_bytes());
        out.extend(b"\r\n");
        out
    }

    #[test]
    fn decodes_all_fields_in_order() {
        let rec = decode(&layout(), &raw("1", "20240101", "ダービー", "0123")).unwrap();
        assert_eq!(rec.record_type(), "ZZ");
        assert_eq!(rec.change_kind(), ChangeKind::New);
        assert_eq!(rec.get("RecordSpec"), Some(&Value::Text("ZZ".into())));
        assert_eq!(
            rec.get("MakeDate"),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()))
        );
        assert_eq!(rec.get("Name"), Some(&Value::Text("ダービー".into())));
        assert_eq!(rec.get("Odds").and_then(Value::as_decimal).unwrap().to_string(), "12.3");

        let names: Vec<&str> = rec.fields().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["RecordSpec", "DataKubun", "MakeDate", "Name", "Odds", "_Delimiter"]);
    }

    #[test]
    fn storable_fields_drop_internal_entries() {
        let rec = decode(&layout(), &raw("2", "20240101", "A", "0010")).unwrap();
        assert!(rec.storable_fields().iter().all(|(k, _)| !k.starts_with('_')));
        assert_eq!(rec.storable_fields().len(), 5);
    }

    #[test]
    fn full_width_padding_is_trimmed() {
        let rec = decode(&layout(), &raw("1", "20240101", "馬\u{3000}\u{3000}", "0010")).unwrap();
        assert_eq!(rec.get("Name"), Some(&Value::Text("馬".into())));
    }

    #[test]
    fn short_buffer_fails() {
        let mut bytes = raw("1", "20240101", "A", "0010");
        bytes.truncate(20);
        assert_eq!(
            decode(&layout(), &bytes).unwrap_err(),
            RecordDecodeError::Truncated {
                record_type: "ZZ".into(),
                expected: 27,
                actual: 20
            }
        );
    }

    #[test]
    fn conversion_failure_rejects_whole_record() {
        let err = decode(&layout(), &raw("1", "20231301", "A", "0010")).unwrap_err();
        match err {
            RecordDecodeError::Conversion {
                record_type,
                field,
                raw,
                ..
            } => {
                assert_eq!(record_type, "ZZ");
                assert_eq!(field, "MakeDate");
                assert_eq!(raw, "20231301");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_change_kind_is_an_error() {
        let err = decode(&layout(), &raw("9", "20240101", "A", "0010")).unwrap_err();
        assert!(matches!(err, RecordDecodeError::UnknownChangeKind { .. }));
        assert!(err.to_string().contains("'9'"));
    }

    #[test]
    fn delete_and_update_kinds() {
        assert_eq!(
            decode(&layout(), &raw("3", "20240101", "A", "0010")).unwrap().change_kind(),
            ChangeKind::Delete
        );
        assert_eq!(
            decode(&layout(), &raw("2", "20240101", "A", "0010")).unwrap().change_kind(),
            ChangeKind::Update
        );
    }
}
