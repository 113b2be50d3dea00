use rusqlite::Connection;
use tempfile::tempdir;

use panic_sites_core::db::{
    AnalysisDb, DbError, PipelineRunRecord, PipelineRunStatus, CURRENT_SCHEMA_VERSION,
};
use panic_sites_core::model::{Endianness, Tag, TargetInfo, TypeDef};
use panic_sites_core::services::panic_locations::{panic_location_type, PANIC_LOCATION_TYPE_NAME};
use panic_sites_core::services::{AnalysisModel, ModelError};

fn user_version(conn: &Connection) -> i32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0)).expect("user_version")
}

#[test]
fn fresh_database_is_at_current_schema_with_string_view_seeded() {
    let dir = tempdir().expect("tempdir");
    let db = AnalysisDb::open(&dir.path().join("analysis.db")).expect("open db");

    assert_eq!(user_version(db.connection()), CURRENT_SCHEMA_VERSION);
    assert_eq!(db.type_by_name("&str").unwrap(), Some(TypeDef::StringView));
    assert_eq!(db.target().unwrap(), TargetInfo::default());
    assert_eq!(db.analysis_generation().unwrap(), 0);
}

#[test]
fn newer_schema_versions_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("analysis.db");
    {
        let conn = Connection::open(&db_path).expect("open raw");
        conn.execute_batch("PRAGMA user_version = 99;").expect("bump version");
    }

    let err = AnalysisDb::open(&db_path).expect_err("should reject");
    match err {
        DbError::UnsupportedSchemaVersion { found, max_supported, .. } => {
            assert_eq!(found, 99);
            assert_eq!(max_supported, CURRENT_SCHEMA_VERSION);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn version_one_databases_gain_the_runs_table() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("analysis.db");
    {
        let db = AnalysisDb::open(&db_path).expect("open db");
        db.connection()
            .execute_batch("DROP TABLE pipeline_runs; PRAGMA user_version = 1;")
            .expect("downgrade");
    }

    let db = AnalysisDb::open(&db_path).expect("reopen");
    assert_eq!(user_version(db.connection()), CURRENT_SCHEMA_VERSION);
    assert!(db.list_pipeline_runs().expect("list runs").is_empty());
}

#[test]
fn state_persists_across_reopen() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("analysis.db");
    {
        let mut db = AnalysisDb::open(&db_path).expect("open db");
        let target = TargetInfo {
            arch: Some("aarch64".into()),
            platform: "mac-aarch64".into(),
            endianness: Endianness::Little,
            address_size: 8,
        };
        db.set_target(&target).unwrap();
        db.set_binary_hash(Some("abc123")).unwrap();
        db.define_type(PANIC_LOCATION_TYPE_NAME, &panic_location_type("&str")).unwrap();
    }

    let db = AnalysisDb::open(&db_path).expect("reopen");
    assert_eq!(db.target().unwrap().platform, "mac-aarch64");
    assert_eq!(db.binary_hash().unwrap().as_deref(), Some("abc123"));
    assert_eq!(
        db.type_by_name(PANIC_LOCATION_TYPE_NAME).unwrap(),
        Some(panic_location_type("&str"))
    );
}

#[test]
fn reads_must_fit_in_one_segment() {
    let db = AnalysisDb::open_in_memory().unwrap();
    db.add_segment(0x1000, Some(".rodata"), b"abcdef").unwrap();
    db.add_segment(0x1006, Some(".data"), b"ghij").unwrap();

    assert_eq!(db.read_bytes(0x1002, 3).unwrap(), Some(b"cde".to_vec()));
    assert_eq!(db.read_bytes(0x1004, 4).unwrap(), None);
    assert_eq!(db.read_bytes(0x0fff, 1).unwrap(), None);
    assert_eq!(db.read_bytes(0x1006, 4).unwrap(), Some(b"ghij".to_vec()));
}

#[test]
fn savepoints_roll_back_model_mutations() {
    let mut db = AnalysisDb::open_in_memory().unwrap();

    db.begin_transaction().unwrap();
    db.define_type("Scratch", &TypeDef::uint(2)).unwrap();
    db.create_tag_type("Scratch tags", "*").unwrap();
    db.rollback_transaction().unwrap();

    assert!(!db.type_exists("Scratch").unwrap());
    assert!(!db.tag_type_exists("Scratch tags").unwrap());

    db.begin_transaction().unwrap();
    db.define_type("Kept", &TypeDef::uint(2)).unwrap();
    db.commit_transaction().unwrap();
    assert!(db.type_exists("Kept").unwrap());

    assert!(matches!(db.commit_transaction(), Err(ModelError::NoTransaction)));
    assert!(matches!(db.rollback_transaction(), Err(ModelError::NoTransaction)));
}

#[test]
fn define_data_object_enforces_the_overlay_rules() {
    let mut db = AnalysisDb::open_in_memory().unwrap();
    db.set_target(&TargetInfo::new(Some("x86_64".into()), "linux-x86_64")).unwrap();
    db.define_type(PANIC_LOCATION_TYPE_NAME, &panic_location_type("&str")).unwrap();
    db.add_segment(0x4000, None, &[0u8; 64]).unwrap();

    // Empty space.
    let object = db.define_data_object(0x4000, PANIC_LOCATION_TYPE_NAME, "a").expect("empty");
    assert!(object.user);
    assert_eq!(object.name.as_deref(), Some("a"));

    // Same type again.
    db.define_data_object(0x4000, PANIC_LOCATION_TYPE_NAME, "a2").expect("same type");

    // Incompatible type at the address.
    db.insert_data_object(0x4020, None, &TypeDef::uint(8)).unwrap();
    let err = db.define_data_object(0x4020, PANIC_LOCATION_TYPE_NAME, "b").expect_err("conflict");
    assert!(matches!(err, ModelError::Conflict { address: 0x4020, .. }));
    assert!(err.is_recoverable());

    // Unknown types are recoverable too.
    let err = db.define_data_object(0x4000, "Nope", "c").expect_err("unknown type");
    assert!(matches!(err, ModelError::UnknownType(ref name) if name == "Nope"));
    assert!(err.is_recoverable());
}

#[test]
fn tags_require_an_existing_tag_type() {
    let mut db = AnalysisDb::open_in_memory().unwrap();
    let tag = Tag::user(0x10, "Missing", "payload");

    let err = db.add_tag(&tag).expect_err("unknown tag type");
    assert!(matches!(err, ModelError::UnknownTagType(_)));

    db.create_tag_type("Missing", "!").unwrap();
    db.create_tag_type("Missing", "?").unwrap();
    db.add_tag(&tag).unwrap();
    db.add_tag(&tag).unwrap();

    assert_eq!(db.tags_at(0x10).unwrap(), vec![tag.clone(), tag]);
    let types = db.list_tag_types().unwrap();
    assert_eq!(types.len(), 1);
    assert_eq!(types[0].icon, "!");
}

#[test]
fn pipeline_runs_round_trip() {
    let db = AnalysisDb::open_in_memory().unwrap();
    let ok = PipelineRunRecord {
        started_at: "2024-01-01T00:00:00Z".into(),
        finished_at: "2024-01-01T00:00:01Z".into(),
        status: PipelineRunStatus::Succeeded,
        candidates: 3,
        records: 2,
        tags_added: 5,
        message: None,
    };
    let failed = PipelineRunRecord {
        status: PipelineRunStatus::Failed,
        message: Some("disk full".into()),
        ..ok.clone()
    };

    let first = db.insert_pipeline_run(&ok).unwrap();
    let second = db.insert_pipeline_run(&failed).unwrap();
    assert!(second > first);

    assert_eq!(db.list_pipeline_runs().unwrap(), vec![ok, failed]);
}

#[test]
fn reanalysis_bumps_the_generation() {
    let mut db = AnalysisDb::open_in_memory().unwrap();
    db.trigger_reanalysis().unwrap();
    db.trigger_reanalysis().unwrap();
    assert_eq!(db.analysis_generation().unwrap(), 2);
}

#[test]
fn high_half_segments_do_not_cover_low_addresses() {
    let db = AnalysisDb::open_in_memory().unwrap();
    db.add_segment(0xffff_ffff_8100_0000, Some(".text"), b"kernel").unwrap();
    db.insert_data_object(0x1000, None, &TypeDef::named("&str")).unwrap();

    assert_eq!(db.read_bytes(0x1000, 1).unwrap(), None);
    assert_eq!(db.read_bytes(0xffff_ffff_8100_0002, 3).unwrap(), Some(b"rne".to_vec()));
    let view = db.data_object_at(0x1000).unwrap().expect("view object");
    assert_eq!(view.value, None);

    // A low segment is picked for high addresses below the kernel mapping.
    db.add_segment(0x1000, None, b"abcd").unwrap();
    assert_eq!(db.read_bytes(0x1001, 2).unwrap(), Some(b"bc".to_vec()));
    assert_eq!(db.read_bytes(0xffff_ffff_8000_0000, 1).unwrap(), None);
}

#[test]
fn overlap_checks_span_the_sign_boundary() {
    let mut db = AnalysisDb::open_in_memory().unwrap();
    db.set_target(&TargetInfo::new(Some("x86_64".into()), "linux-x86_64")).unwrap();
    db.define_type(PANIC_LOCATION_TYPE_NAME, &panic_location_type("&str")).unwrap();
    db.insert_data_object(0x8000_0000_0000_0000, None, &TypeDef::uint(8)).unwrap();
    db.insert_data_object(0x10, None, &TypeDef::uint(8)).unwrap();

    let err = db
        .define_data_object(0x7fff_ffff_ffff_fff8, PANIC_LOCATION_TYPE_NAME, "straddle")
        .expect_err("overlaps the object at 2^63");
    assert!(matches!(err, ModelError::Conflict { address: 0x7fff_ffff_ffff_fff8, .. }));

    db.define_data_object(0x8000_0000_0000_0100, PANIC_LOCATION_TYPE_NAME, "high")
        .expect("empty high-half space");

    let addresses: Vec<_> =
        db.list_data_objects().unwrap().into_iter().map(|object| object.address).collect();
    assert_eq!(addresses, vec![0x10, 0x8000_0000_0000_0000, 0x8000_0000_0000_0100]);
}
