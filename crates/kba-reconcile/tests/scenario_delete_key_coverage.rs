//! Scenario: keyed deletes against real decoded layouts.
//!
//! GREEN when:
//! - An SE delete builds a WHERE clause over the seven runner key fields.
//! - An O1 delete reports "missing key value": the runner key names
//!   `Umaban`, which the odds layout only carries as numbered block fields.
//! - A WH delete reports "no primary key".
//! - A YS record is skipped on the real-time route and keyed on the
//!   historical one.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kba_codec::recover::encode_sjis;
use kba_codec::{ParserRegistry, Value};
use kba_db::{Row, Storage, StorageError};
use kba_reconcile::{
    ImportOutcome, Importer, Reconciler, TableRoute, ERR_MISSING_KEY_VALUE, ERR_NO_PRIMARY_KEY,
};

#[derive(Default)]
struct Executed(Mutex<Vec<(String, Vec<Value>)>>);

#[async_trait]
impl Storage for Executed {
    async fn insert(&self, _: &str, _: &[(String, Value)]) -> Result<(), StorageError> {
        Ok(())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, StorageError> {
        self.0.lock().unwrap().push((sql.to_string(), params.to_vec()));
        Ok(1)
    }

    async fn query(&self, _: &str, _: &[Value]) -> Result<Vec<Row>, StorageError> {
        Ok(Vec::new())
    }

    async fn replace(
        &self,
        _: &str,
        sql: &str,
        params: &[Value],
        _: &[(String, Value)],
    ) -> Result<u64, StorageError> {
        self.execute(sql, params).await
    }
}

/// Blank record of `len` bytes with a race header and CRLF.
fn race_record(tag: &str, kind: u8, len: usize) -> Vec<u8> {
    let mut buf = vec![b' '; len];
    buf[..2].copy_from_slice(tag.as_bytes());
    buf[2] = kind;
    buf[3..11].copy_from_slice(b"20240526");
    buf[11..27].copy_from_slice(b"2024052605021211");
    buf[len - 2..].copy_from_slice(b"\r\n");
    buf
}

fn importer(storage: Arc<Executed>, route: TableRoute) -> Importer {
    Importer::new(Arc::new(ParserRegistry::new()), Reconciler::new(storage, route))
}

#[tokio::test]
async fn runner_delete_covers_full_key() {
    let storage = Arc::new(Executed::default());
    let mut raw = race_record("SE", b'3', 555);
    raw[27] = b'3';
    raw[28..30].copy_from_slice(b"07");
    let name = encode_sjis("ドウデュース");
    raw[40..40 + name.len()].copy_from_slice(&name);

    let out = importer(storage.clone(), TableRoute::realtime())
        .import(&raw)
        .await;
    assert!(out.is_applied(), "{out:?}");

    let executed = storage.0.lock().unwrap();
    assert_eq!(executed.len(), 1);
    let (sql, params) = &executed[0];
    assert!(sql.starts_with("DELETE FROM \"RT_SE\" WHERE \"Year\" = ?"));
    assert!(sql.ends_with("\"Umaban\" = ?"));
    assert_eq!(params.len(), 7);
    assert_eq!(params[6], Value::Int(7));
}

#[tokio::test]
async fn odds_delete_lacks_runner_number() {
    let storage = Arc::new(Executed::default());
    let raw = race_record("O1", b'3', 962);
    let out = importer(storage.clone(), TableRoute::realtime())
        .import(&raw)
        .await;
    match out {
        ImportOutcome::Failed { error, record_type } => {
            assert_eq!(error, ERR_MISSING_KEY_VALUE);
            assert_eq!(record_type.as_deref(), Some("O1"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(storage.0.lock().unwrap().is_empty());
}

#[tokio::test]
async fn keyless_table_delete_is_refused() {
    let storage = Arc::new(Executed::default());
    let raw = race_record("WH", b'3', 847);
    let out = importer(storage.clone(), TableRoute::realtime())
        .import(&raw)
        .await;
    assert!(
        matches!(&out, ImportOutcome::Failed { error, .. } if error == ERR_NO_PRIMARY_KEY),
        "{out:?}"
    );
    assert!(storage.0.lock().unwrap().is_empty());
}

#[tokio::test]
async fn schedule_records_route_by_load_kind() {
    let storage = Arc::new(Executed::default());
    let mut raw = vec![b' '; 382];
    raw[..3].copy_from_slice(b"YS3");
    raw[3..11].copy_from_slice(b"20240101");
    raw[11..25].copy_from_slice(b"20240526050212");
    raw[380..].copy_from_slice(b"\r\n");

    let live = importer(storage.clone(), TableRoute::realtime())
        .import(&raw)
        .await;
    assert_eq!(
        live,
        ImportOutcome::Skipped {
            record_type: Some("YS".into())
        }
    );

    let hist = importer(storage.clone(), TableRoute::historical())
        .import(&raw)
        .await;
    assert!(hist.is_applied(), "{hist:?}");
    let executed = storage.0.lock().unwrap();
    assert_eq!(executed.len(), 1);
    assert!(executed[0].0.starts_with("DELETE FROM \"NL_YS\""));
    assert_eq!(executed[0].1.len(), 5);
}

#[tokio::test]
async fn unknown_and_undecodable_records() {
    let storage = Arc::new(Executed::default());
    let imp = importer(storage, TableRoute::realtime());

    assert_eq!(
        imp.import(b"ZZ1whatever").await,
        ImportOutcome::Skipped {
            record_type: Some("ZZ".into())
        }
    );
    assert_eq!(
        imp.import(b"").await,
        ImportOutcome::Skipped { record_type: None }
    );

    let short = imp.import(b"RA1202401").await;
    assert!(short.is_failed());
}
