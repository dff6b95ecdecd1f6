//! Parser registry: two-character tag -> record layout.
//!
//! Built from an initialization list of layout builders. Layouts are built on
//! first use and cached; `register` adds or overrides a layout at runtime and
//! replaces whatever was cached for that tag. One registry instance is built
//! at startup and shared (`Arc<ParserRegistry>`) by everything that decodes.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::decoder::{decode, DecodedRecord, RecordDecodeError};
use crate::layout::{is_valid_tag, LayoutError, RecordLayout};
use crate::layouts::{LayoutFn, BUILTIN};

pub struct ParserRegistry {
    catalog: HashMap<String, LayoutFn>,
    cache: RwLock<HashMap<String, Arc<RecordLayout>>>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserRegistry {
    /// Registry over the built-in layouts.
    pub fn new() -> Self {
        Self::with_catalog(BUILTIN)
    }

    /// Registry over a custom initialization list.
    pub fn with_catalog(catalog: &[(&str, LayoutFn)]) -> Self {
        Self {
            catalog: catalog
                .iter()
                .map(|(tag, f)| (tag.to_string(), *f))
                .collect(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Registry with no layouts at all; populate it with [`Self::register`].
    pub fn empty() -> Self {
        Self::with_catalog(&[])
    }

    /// Layout for `record_type`, or `None` when the type is not supported.
    pub fn resolve(&self, record_type: &str) -> Option<Arc<RecordLayout>> {
        if let Some(layout) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(record_type)
        {
            return Some(Arc::clone(layout));
        }

        let build = self.catalog.get(record_type)?;
        let layout = match build() {
            Ok(l) => Arc::new(l),
            Err(e) => {
                warn!(record_type, error = %e, "built-in layout is invalid");
                return None;
            }
        };

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        // A concurrent `register` wins over the lazily built default.
        let entry = cache
            .entry(record_type.to_string())
            .or_insert_with(|| Arc::clone(&layout));
        Some(Arc::clone(entry))
    }

    /// Add or override the layout for `record_type`.
    pub fn register(&self, record_type: &str, layout: RecordLayout) -> Result<(), LayoutError> {
        if !is_valid_tag(record_type) {
            return Err(LayoutError::InvalidTag(record_type.to_string()));
        }
        if layout.record_type() != record_type {
            return Err(LayoutError::TagMismatch {
                tag: record_type.to_string(),
                layout: layout.record_type().to_string(),
            });
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if cache.insert(record_type.to_string(), Arc::new(layout)).is_some() {
            debug!(record_type, "replaced cached layout");
        }
        Ok(())
    }

    /// Every tag the registry can decode, sorted.
    pub fn supported_types(&self) -> Vec<String> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        let tags: BTreeSet<String> = self
            .catalog
            .keys()
            .chain(cache.keys())
            .cloned()
            .collect();
        tags.into_iter().collect()
    }

    /// Decode one recovered raw record, routing by its leading tag.
    ///
    /// `Ok(None)` covers the routine skips: buffer too small to hold a tag,
    /// non-ASCII tag, unsupported type. Genuine decode faults are `Err`.
    pub fn dispatch(&self, raw: &[u8]) -> Result<Option<DecodedRecord>, RecordDecodeError> {
        let Some(tag) = record_tag(raw) else {
            debug!(len = raw.len(), "no readable record type tag");
            return Ok(None);
        };
        let Some(layout) = self.resolve(tag) else {
            debug!(record_type = tag, "unsupported record type");
            return Ok(None);
        };
        decode(&layout, raw).map(Some)
    }
}

/// The two-character type tag at the start of `raw`, if readable.
pub fn record_tag(raw: &[u8]) -> Option<&str> {
    let head = raw.get(..2)?;
    let tag = std::str::from_utf8(head).ok()?;
    is_valid_tag(tag).then_some(tag)
}
