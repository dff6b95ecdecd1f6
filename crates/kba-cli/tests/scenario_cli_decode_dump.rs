//! Scenario: `kba decode` turns a raw dump into one JSON line per record.
//!
//! GREEN when:
//! - A well-formed RA record prints its record type, change kind and typed
//!   fields.
//! - An unknown tag is reported as skipped and a truncated record as an error,
//!   without failing the command.
//! - `--limit` stops early.
//! - A missing file fails the command.

use assert_cmd::Command;
use kba_codec::{ChangeKind, ParserRegistry};
use kba_testkit::RecordBuilder;
use predicates::prelude::*;

fn dump() -> Vec<u8> {
    let registry = ParserRegistry::new();
    let mut ra = RecordBuilder::new(&registry, "RA", ChangeKind::New).unwrap();
    ra.set("MakeDate", "20240101")
        .unwrap()
        .race_key("2024052605021211")
        .unwrap();

    let mut bytes = ra.build();
    bytes.extend_from_slice(b"ZZ1 unknown payload\r\n");
    bytes.extend_from_slice(b"RA1 short\r\n");
    bytes
}

#[test]
fn decode_prints_one_line_per_record() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("RA.dat");
    std::fs::write(&file, dump()).unwrap();

    let out = Command::cargo_bin("kba")
        .unwrap()
        .args(["decode", "--file", file.to_str().unwrap()])
        .assert()
        .success()
        .stderr(predicate::str::contains("decoded=1 skipped=1 failed=1"))
        .get_output()
        .stdout
        .clone();

    let lines: Vec<serde_json::Value> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);

    assert_eq!(lines[0]["line"], 1);
    assert_eq!(lines[0]["record_type"], "RA");
    assert_eq!(lines[0]["change_kind"], "1");
    assert_eq!(lines[0]["fields"]["MakeDate"], "2024-01-01");
    assert_eq!(lines[0]["fields"]["JyoCD"], "05");

    assert_eq!(lines[1]["skipped"], "ZZ");
    assert!(lines[2]["error"].is_string());
}

#[test]
fn decode_honors_limit() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("RA.dat");
    std::fs::write(&file, dump()).unwrap();

    Command::cargo_bin("kba")
        .unwrap()
        .args(["decode", "--file", file.to_str().unwrap(), "--limit", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"record_type\":\"RA\""))
        .stdout(predicate::str::contains("skipped").not());
}

#[test]
fn decode_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("kba")
        .unwrap()
        .args(["decode", "--file"])
        .arg(dir.path().join("nope.dat"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("read dump failed"));
}
