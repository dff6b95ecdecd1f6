//! kba-codec
//!
//! Fixed-width feed record decoding.
//!
//! Pipeline for one raw record (leaves first):
//! - `recover`: repair the marshalled string handed over by the feed boundary
//!   back into the original Shift_JIS bytes
//! - `convert`: text token -> typed [`Value`]
//! - `decoder`: slice a byte buffer by a [`RecordLayout`] and convert each field
//! - `registry`: two-character tag -> layout, with lazy caching and overrides
//!
//! This crate performs no I/O. Callers (feed readers, importers, CLI) own
//! fetching and storage.

pub mod convert;
pub mod decoder;
pub mod layout;
pub mod layouts;
pub mod recover;
pub mod registry;
pub mod value;

pub use convert::{convert_value, Conversion, ConversionError};
pub use decoder::{decode, ChangeKind, DecodedRecord, RecordDecodeError};
pub use layout::{FieldSpec, LayoutError, RecordLayout};
pub use recover::{marshal, recover_bytes};
pub use registry::{record_tag, ParserRegistry};
pub use value::Value;
