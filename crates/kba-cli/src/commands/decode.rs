use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use kba_codec::{record_tag, ParserRegistry};
use serde_json::{json, Map, Value as JsonValue};

/// Decode every CRLF record in `file` and print one JSON object per line.
///
/// Unknown tags and decode errors are reported inline; only unreadable
/// input fails the command.
pub fn run(file: &Path, limit: Option<usize>) -> Result<()> {
    let bytes =
        std::fs::read(file).with_context(|| format!("read dump failed: {}", file.display()))?;
    let registry = ParserRegistry::new();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let (mut decoded, mut skipped, mut failed) = (0u64, 0u64, 0u64);

    let records = kba_feed::replay::split_records(&bytes);
    for (idx, raw) in records.iter().take(limit.unwrap_or(usize::MAX)).enumerate() {
        let line = idx + 1;
        let obj = match registry.dispatch(raw) {
            Ok(Some(rec)) => {
                decoded += 1;
                let mut fields = Map::new();
                for (name, value) in rec.fields() {
                    fields.insert(name.clone(), serde_json::to_value(value)?);
                }
                json!({
                    "line": line,
                    "record_type": rec.record_type(),
                    "change_kind": rec.change_kind().code().to_string(),
                    "fields": JsonValue::Object(fields),
                })
            }
            Ok(None) => {
                skipped += 1;
                json!({ "line": line, "skipped": record_tag(raw).unwrap_or("") })
            }
            Err(e) => {
                failed += 1;
                json!({ "line": line, "error": e.to_string() })
            }
        };
        writeln!(out, "{obj}")?;
    }

    eprintln!("decoded={decoded} skipped={skipped} failed={failed}");
    Ok(())
}
