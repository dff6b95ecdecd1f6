//! Raw record builder driven by the registered layouts.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use kba_codec::recover::encode_sjis;
use kba_codec::{marshal, ChangeKind, ParserRegistry, RecordLayout};

/// Blank (space-filled, CRLF-terminated) record of the layout's length, with
/// tag and change kind in place. Fields are written left-aligned by name.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    layout: Arc<RecordLayout>,
    buf: Vec<u8>,
}

impl RecordBuilder {
    pub fn new(registry: &ParserRegistry, record_type: &str, kind: ChangeKind) -> Result<Self> {
        let layout = registry
            .resolve(record_type)
            .with_context(|| format!("no layout for {record_type}"))?;
        let mut buf = vec![b' '; layout.length()];
        buf[..2].copy_from_slice(record_type.as_bytes());
        buf[2] = kind.code() as u8;
        let len = buf.len();
        buf[len - 2..].copy_from_slice(b"\r\n");
        Ok(Self { layout, buf })
    }

    /// Write `text` (Shift_JIS) into the named field.
    pub fn set(&mut self, field: &str, text: &str) -> Result<&mut Self> {
        let spec = self
            .layout
            .field(field)
            .with_context(|| format!("{} has no field {field}", self.layout.record_type()))?;
        let bytes = encode_sjis(text);
        if bytes.len() > spec.length {
            bail!("{field}: {} bytes do not fit in {}", bytes.len(), spec.length);
        }
        self.buf[spec.offset..spec.offset + bytes.len()].copy_from_slice(&bytes);
        Ok(self)
    }

    /// Full race key `YYYYMMDDJJKKNNRR` (year, month-day, course, meeting,
    /// day, race), as in bytes 11..27 of race-level records.
    pub fn race_key(&mut self, key: &str) -> Result<&mut Self> {
        if key.len() != 16 || !key.is_ascii() {
            bail!("race key must be 16 ASCII characters: {key:?}");
        }
        self.set("Year", &key[0..4])?
            .set("MonthDay", &key[4..8])?
            .set("JyoCD", &key[8..10])?
            .set("Kaiji", &key[10..12])?
            .set("Nichiji", &key[12..14])?
            .set("RaceNum", &key[14..16])
    }

    pub fn build(&self) -> Vec<u8> {
        self.buf.clone()
    }

    /// As the feed boundary hands it over.
    pub fn marshalled(&self) -> String {
        marshal(&self.buf)
    }
}
