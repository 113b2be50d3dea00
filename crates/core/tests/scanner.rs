mod common;

use common::{add_site, empty_db, panic_site_db, Site, PANIC_PATH, RECORD_ADDR};
use panic_sites_core::model::TypeDef;
use panic_sites_core::services::panic_locations::{scan, PathClassifier, STRING_VIEW_TYPE_NAME};
use panic_sites_core::services::PipelineLog;

#[test]
fn finds_string_views_over_source_paths() {
    let db = panic_site_db();
    let mut log = PipelineLog::new();

    let candidates =
        scan(&db, &PathClassifier::default(), STRING_VIEW_TYPE_NAME, &mut log).expect("scan");

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].address, RECORD_ADDR);
    assert_eq!(candidates[0].path, PANIC_PATH);
    assert!(log.contains("Found 1 string views referring to source file paths"));
}

#[test]
fn non_source_strings_are_ignored() {
    let db = empty_db("linux-x86_64");
    add_site(&db, &Site::new(0x1000, 0x3000, "hello, world", 1, 1));
    add_site(&db, &Site::new(0x1100, 0x3100, "src/lib.rs", 7, 3));
    let mut log = PipelineLog::new();

    let candidates =
        scan(&db, &PathClassifier::default(), STRING_VIEW_TYPE_NAME, &mut log).expect("scan");

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].address, 0x1100);
    assert_eq!(candidates[0].path, "src/lib.rs");
}

#[test]
fn unresolved_and_undecodable_views_are_skipped() {
    let db = empty_db("linux-x86_64");

    // View whose backing address holds no data object.
    db.add_segment(0x1000, None, &common::location_bytes(0x9000, 10, 1, 1)).unwrap();
    db.insert_data_object(0x1000, None, &TypeDef::named("&str")).unwrap();

    // View over bytes that are not UTF-8.
    let invalid = [b'a', 0xfe, b'.', b'r', b's'];
    db.add_segment(0x1100, None, &common::location_bytes(0x3100, 5, 1, 1)).unwrap();
    db.add_segment(0x3100, None, &invalid).unwrap();
    db.insert_data_object(0x1100, None, &TypeDef::named("&str")).unwrap();
    db.insert_data_object(0x3100, None, &TypeDef::Bytes { len: 5 }).unwrap();

    // View with no mapped bytes at all.
    db.insert_data_object(0x7000, None, &TypeDef::named("&str")).unwrap();

    // One good view so the scan has something to return.
    add_site(&db, &Site::new(0x1200, 0x3200, "src/ok.rs", 1, 1));

    let mut log = PipelineLog::new();
    let candidates =
        scan(&db, &PathClassifier::default(), STRING_VIEW_TYPE_NAME, &mut log).expect("scan");

    let addresses: Vec<u64> = candidates.iter().map(|c| c.address).collect();
    assert_eq!(addresses, vec![0x1200]);
    assert_eq!(log.errors().count(), 0);
}

#[test]
fn backing_data_is_cut_to_the_view_length() {
    let db = empty_db("linux-x86_64");
    let mut site = Site::new(0x1000, 0x3000, "src/main.rsand more pooled text", 3, 4);
    site.view_len = Some("src/main.rs".len() as u64);
    add_site(&db, &site);

    let mut log = PipelineLog::new();
    let candidates =
        scan(&db, &PathClassifier::default(), STRING_VIEW_TYPE_NAME, &mut log).expect("scan");

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].path, "src/main.rs");
}

#[test]
fn windows_targets_use_windows_path_rules() {
    let db = empty_db("windows-x86_64");
    add_site(&db, &Site::new(0x1000, 0x3000, "C:\\proj\\src\\lib.rs", 1, 1));
    add_site(&db, &Site::new(0x1100, 0x3100, "C:\\proj.rs\\README", 1, 1));

    let mut log = PipelineLog::new();
    let candidates =
        scan(&db, &PathClassifier::default(), STRING_VIEW_TYPE_NAME, &mut log).expect("scan");

    let paths: Vec<&str> = candidates.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(paths, vec!["C:\\proj\\src\\lib.rs"]);
}

#[test]
fn scan_order_is_stable() {
    let db = empty_db("linux-x86_64");
    add_site(&db, &Site::new(0x1200, 0x3200, "src/c.rs", 1, 1));
    add_site(&db, &Site::new(0x1000, 0x3000, "src/a.rs", 1, 1));
    add_site(&db, &Site::new(0x1100, 0x3100, "src/b.rs", 1, 1));

    let classifier = PathClassifier::default();
    let first = scan(&db, &classifier, STRING_VIEW_TYPE_NAME, &mut PipelineLog::new()).unwrap();
    let second = scan(&db, &classifier, STRING_VIEW_TYPE_NAME, &mut PipelineLog::new()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}
