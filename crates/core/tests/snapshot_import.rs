use tempfile::tempdir;

use panic_sites_core::db::{AnalysisDb, ImportSummary, ModelSnapshot, SnapshotError};
use panic_sites_core::services::panic_locations::{run, PipelineOptions};
use panic_sites_core::services::{AnalysisModel, PipelineLog};

const SNAPSHOT_JSON: &str = r#"{
  "target": { "arch": "x86_64", "platform": "linux-x86_64" },
  "segments": [
    { "start": 4096, "name": ".data.rel.ro",
      "hex": "0030000000000000 1900000000000000 2a000000 09000000" },
    { "start": 12288, "name": ".rodata", "text": "library/core/src/panic.rs" }
  ],
  "data_objects": [
    { "address": 4096, "name": "str.0", "type": { "kind": "named", "name": "&str" } },
    { "address": 12288, "type": { "kind": "utf8", "len": 25 } }
  ],
  "code_refs": [ { "from": 8192, "to": 4096 } ]
}"#;

const SNAPSHOT_YAML: &str = r#"
target:
  arch: aarch64
  platform: linux-aarch64
types:
  - name: RustStr
    definition:
      kind: string_view
segments:
  - start: 0x1000
    hex: "0030000000000000 0a00000000000000 07000000 03000000"
  - start: 0x3000
    text: src/lib.rs
data_objects:
  - address: 0x1000
    type: { kind: named, name: RustStr }
  - address: 0x3000
    type: { kind: bytes, len: 10 }
code_refs:
  - { from: 0x2000, to: 0x1000 }
  - { from: 0x2040, to: 0x1000 }
"#;

#[test]
fn json_snapshot_imports_and_feeds_the_pipeline() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("model.json");
    std::fs::write(&path, SNAPSHOT_JSON).expect("write snapshot");

    let snapshot = ModelSnapshot::from_path(&path).expect("parse snapshot");
    let mut db = AnalysisDb::open_in_memory().expect("db");
    let summary = snapshot.import_into(&mut db).expect("import");

    assert_eq!(summary, ImportSummary { segments: 2, types: 0, data_objects: 2, code_refs: 1 });
    assert_eq!(db.target().unwrap().arch.as_deref(), Some("x86_64"));
    assert_eq!(db.code_references_to(0x1000).unwrap(), vec![0x2000]);

    let summary =
        run(&mut db, &PipelineOptions::default(), &mut PipelineLog::new()).expect("pipeline");
    assert_eq!(summary.tags_added, 1);
    let tags = db.tags_at(0x2000).unwrap();
    assert_eq!(tags[0].data, "library/core/src/panic.rs: line 42, col 9");

    let record = db.data_object_at(0x1000).unwrap().expect("record");
    assert_eq!(record.name.as_deref(), Some("panic_location_str.0"));
}

#[test]
fn yaml_snapshot_with_custom_string_view_type() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("model.yaml");
    std::fs::write(&path, SNAPSHOT_YAML).expect("write snapshot");

    let snapshot = ModelSnapshot::from_path(&path).expect("parse snapshot");
    let mut db = AnalysisDb::open_in_memory().expect("db");
    snapshot.import_into(&mut db).expect("import");

    let options =
        PipelineOptions { string_view_type: "RustStr".into(), ..PipelineOptions::default() };
    let summary = run(&mut db, &options, &mut PipelineLog::new()).expect("pipeline");

    assert_eq!(summary.records, 1);
    assert_eq!(summary.tags_added, 2);
    assert_eq!(db.tags_at(0x2040).unwrap()[0].data, "src/lib.rs: line 7, col 3");
}

#[test]
fn invalid_segment_rolls_back_the_whole_import() {
    let snapshot: ModelSnapshot = serde_json::from_str(
        r#"{
          "target": { "arch": "x86_64", "platform": "linux-x86_64" },
          "segments": [ { "start": 16, "hex": "00", "text": "both" } ]
        }"#,
    )
    .expect("parse");
    let mut db = AnalysisDb::open_in_memory().expect("db");

    let err = snapshot.import_into(&mut db).expect_err("must fail");

    assert!(matches!(err, SnapshotError::SegmentContents { start: 16 }));
    assert_eq!(db.target().unwrap().platform, "unknown");
}

#[test]
fn bad_hex_is_reported() {
    let snapshot: ModelSnapshot =
        serde_json::from_str(r#"{ "segments": [ { "start": 32, "hex": "zz" } ] }"#).unwrap();
    let mut db = AnalysisDb::open_in_memory().expect("db");

    let err = snapshot.import_into(&mut db).expect_err("must fail");
    assert!(matches!(err, SnapshotError::Hex { start: 32, .. }));
}

#[test]
fn missing_snapshot_file_is_an_io_error() {
    let dir = tempdir().expect("tempdir");
    let err = ModelSnapshot::from_path(&dir.path().join("absent.json")).expect_err("missing");
    assert!(matches!(err, SnapshotError::Io { .. }));
}
