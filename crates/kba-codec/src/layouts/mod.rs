//! Built-in record layouts.
//!
//! Pure data: byte positions from the vendor record format reference,
//! zero-based. Repeating groups are expanded into numbered fields
//! (`TanOdds1`, `TanOdds2`, ...). Every record ends with a two-byte CRLF
//! delimiter kept as the internal field `_Delimiter`.

mod changes;
mod mining;
mod odds;
mod race;
mod schedule;

use crate::convert::Conversion;
use crate::layout::{FieldSpec, LayoutError, RecordLayout};

pub type LayoutFn = fn() -> Result<RecordLayout, LayoutError>;

/// Initialization list for the parser registry: tag -> layout builder.
pub const BUILTIN: &[(&str, LayoutFn)] = &[
    ("RA", race::ra),
    ("SE", race::se),
    ("HR", race::hr),
    ("RC", race::rc),
    ("O1", odds::o1),
    ("WE", changes::we),
    ("WH", changes::wh),
    ("AV", changes::av),
    ("JC", changes::jc),
    ("TC", changes::tc),
    ("CC", changes::cc),
    ("DM", mining::dm),
    ("TM", mining::tm),
    ("YS", schedule::ys),
];

// ---------------------------------------------------------------------------
// Builder helpers
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Fields(Vec<FieldSpec>);

impl Fields {
    fn text(mut self, name: &str, offset: usize, length: usize) -> Self {
        self.0.push(FieldSpec::text(name, offset, length));
        self
    }

    fn typed(mut self, name: &str, offset: usize, length: usize, conv: Conversion) -> Self {
        self.0.push(FieldSpec::typed(name, offset, length, conv));
        self
    }

    /// `count` back-to-back copies of a group starting at `offset`.
    /// Each part is (name, width, conversion); names get a 1-based suffix.
    fn blocks<S: AsRef<str>>(
        mut self,
        offset: usize,
        count: usize,
        parts: &[(S, usize, Option<Conversion>)],
    ) -> Self {
        let mut at = offset;
        for i in 1..=count {
            for (name, width, conv) in parts {
                self.0.push(FieldSpec {
                    name: format!("{}{i}", name.as_ref()),
                    offset: at,
                    length: *width,
                    conversion: *conv,
                });
                at += width;
            }
        }
        self
    }

    fn repeat(
        self,
        name: &str,
        offset: usize,
        width: usize,
        count: usize,
        conv: Option<Conversion>,
    ) -> Self {
        self.blocks(offset, count, &[(name, width, conv)])
    }

    /// Append the CRLF delimiter and validate.
    fn build(self, record_type: &str, length: usize) -> Result<RecordLayout, LayoutError> {
        let fields = self.text("_Delimiter", length.saturating_sub(2), 2).0;
        RecordLayout::new(record_type, length, fields)
    }
}

/// Record header shared by every type: tag, change kind, creation date.
fn record_head() -> Fields {
    Fields::default()
        .text("RecordSpec", 0, 2)
        .text("DataKubun", 2, 1)
        .typed("MakeDate", 3, 8, Conversion::Date)
}

/// Header + meeting key (year, month-day, course, meeting, day), bytes 0..25.
fn meet_head() -> Fields {
    record_head()
        .typed("Year", 11, 4, Conversion::Int)
        .typed("MonthDay", 15, 4, Conversion::MonthDay)
        .text("JyoCD", 19, 2)
        .typed("Kaiji", 21, 2, Conversion::Int)
        .typed("Nichiji", 23, 2, Conversion::Int)
}

/// Header + full race key, bytes 0..27.
fn race_head() -> Fields {
    meet_head().typed("RaceNum", 25, 2, Conversion::Int)
}
