//! Scenario: a synthetic RA record goes dispatch -> decode -> reconcile.
//!
//! GREEN when:
//! - A New RA record yields exactly one insert into the real-time race table
//!   with `RecordSpec = "RA"` and `MakeDate = 2024-01-01`.
//! - An Update under the default policy is a second plain insert.
//! - An Update under the replace policy is one keyed delete followed by one
//!   insert, the delete binding the six race key values in key order.
//! - A storage rejection surfaces as a failed outcome, not a panic.
//! - A replacement whose insert is rejected commits neither the delete nor
//!   the insert.

use std::sync::Arc;

use chrono::NaiveDate;
use kba_codec::{ChangeKind, ParserRegistry, Value};
use kba_reconcile::{ImportOutcome, Importer, Operation, Reconciler, TableRoute, UpdatePolicy};
use kba_testkit::{MemoryStorage, RecordBuilder, StorageCall};

fn derby(registry: &ParserRegistry, kind: ChangeKind) -> Vec<u8> {
    let mut b = RecordBuilder::new(registry, "RA", kind).unwrap();
    b.set("MakeDate", "20240101")
        .unwrap()
        .race_key("2024052605021211")
        .unwrap()
        .set("Hondai", "東京優駿")
        .unwrap()
        .set("Kyori", "2400")
        .unwrap();
    b.build()
}

fn field<'a>(fields: &'a [(String, Value)], name: &str) -> Option<&'a Value> {
    fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
}

#[tokio::test]
async fn new_race_record_becomes_one_insert() {
    let registry = Arc::new(ParserRegistry::new());
    let storage = Arc::new(MemoryStorage::new());
    let importer = Importer::new(
        registry.clone(),
        Reconciler::new(storage.clone(), TableRoute::realtime()),
    );

    let out = importer.import(&derby(&registry, ChangeKind::New)).await;
    match &out {
        ImportOutcome::Applied(r) => {
            assert_eq!(r.operation, Operation::Insert);
            assert_eq!(r.table.as_deref(), Some("RT_RA"));
        }
        other => panic!("unexpected {other:?}"),
    }

    let inserts = storage.inserts();
    assert_eq!(inserts.len(), 1);
    let (table, fields) = &inserts[0];
    assert_eq!(table, "RT_RA");
    assert_eq!(field(fields, "RecordSpec"), Some(&Value::Text("RA".into())));
    assert_eq!(
        field(fields, "MakeDate"),
        Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()))
    );
    assert_eq!(field(fields, "Kyori"), Some(&Value::Int(2400)));
    assert_eq!(field(fields, "Hondai"), Some(&Value::Text("東京優駿".into())));
    assert!(field(fields, "_Delimiter").is_none());
    assert!(storage.executed().is_empty());
}

#[tokio::test]
async fn update_policies() {
    let registry = Arc::new(ParserRegistry::new());
    let raw = derby(&registry, ChangeKind::Update);

    let plain = Arc::new(MemoryStorage::new());
    let importer = Importer::new(
        registry.clone(),
        Reconciler::new(plain.clone(), TableRoute::realtime()),
    );
    assert!(importer.import(&raw).await.is_applied());
    assert_eq!(plain.inserts().len(), 1);
    assert!(plain.executed().is_empty());

    let replacing = Arc::new(MemoryStorage::new());
    let importer = Importer::new(
        registry.clone(),
        Reconciler::new(replacing.clone(), TableRoute::realtime())
            .with_update_policy(UpdatePolicy::Replace),
    );
    assert!(importer.import(&raw).await.is_applied());

    let calls = replacing.calls();
    assert_eq!(calls.len(), 2);
    match &calls[0] {
        StorageCall::Execute { sql, params } => {
            assert!(sql.starts_with("DELETE FROM \"RT_RA\" WHERE \"Year\" = ?"));
            assert_eq!(
                params,
                &vec![
                    Value::Int(2024),
                    Value::Int(526),
                    Value::Text("05".into()),
                    Value::Int(2),
                    Value::Int(12),
                    Value::Int(11),
                ]
            );
        }
        other => panic!("expected delete first, got {other:?}"),
    }
    assert!(matches!(&calls[1], StorageCall::Insert { table, .. } if table == "RT_RA"));
}

#[tokio::test]
async fn storage_rejection_is_a_failed_outcome() {
    let registry = Arc::new(ParserRegistry::new());
    let storage = Arc::new(MemoryStorage::new());
    storage.fail_inserts_into("RT_RA");
    let importer = Importer::new(
        registry.clone(),
        Reconciler::new(storage.clone(), TableRoute::realtime()),
    );

    let out = importer.import(&derby(&registry, ChangeKind::New)).await;
    match out {
        ImportOutcome::Failed { record_type, error } => {
            assert_eq!(record_type.as_deref(), Some("RA"));
            assert!(error.contains("RT_RA"), "{error}");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn rejected_replacement_leaves_nothing_behind() {
    let registry = Arc::new(ParserRegistry::new());
    let storage = Arc::new(MemoryStorage::new());
    storage.fail_inserts_into("RT_RA");
    let importer = Importer::new(
        registry.clone(),
        Reconciler::new(storage.clone(), TableRoute::realtime())
            .with_update_policy(UpdatePolicy::Replace),
    );

    let out = importer.import(&derby(&registry, ChangeKind::Update)).await;
    assert!(matches!(out, ImportOutcome::Failed { .. }), "{out:?}");
    assert!(storage.executed().is_empty());
    assert!(storage.inserts().is_empty());
}
