#![allow(dead_code)]

use panic_sites_core::db::AnalysisDb;
use panic_sites_core::model::{Address, TargetInfo, TypeDef};

pub const RECORD_ADDR: Address = 0x1000;
pub const STRING_ADDR: Address = 0x3000;
pub const CODE_REF_ADDR: Address = 0x2000;
pub const PANIC_PATH: &str = "library/core/src/panic.rs";

/// One panic site: a `&str` view over `text`, followed by line/col, plus the
/// instructions that reference it.
pub struct Site<'a> {
    pub record: Address,
    pub string: Address,
    pub text: &'a [u8],
    /// Length stored in the view; defaults to `text.len()`.
    pub view_len: Option<u64>,
    pub line: u32,
    pub col: u32,
    pub refs: Vec<Address>,
}

impl<'a> Site<'a> {
    pub fn new(record: Address, string: Address, text: &'a str, line: u32, col: u32) -> Self {
        Self { record, string, text: text.as_bytes(), view_len: None, line, col, refs: Vec::new() }
    }

    pub fn referenced_from(mut self, refs: &[Address]) -> Self {
        self.refs.extend_from_slice(refs);
        self
    }
}

/// Bytes of a packed `core::panic::Location` on a 64-bit little-endian target.
pub fn location_bytes(string: Address, len: u64, line: u32, col: u32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(24);
    bytes.extend_from_slice(&string.to_le_bytes());
    bytes.extend_from_slice(&len.to_le_bytes());
    bytes.extend_from_slice(&line.to_le_bytes());
    bytes.extend_from_slice(&col.to_le_bytes());
    bytes
}

pub fn empty_db(platform: &str) -> AnalysisDb {
    let db = AnalysisDb::open_in_memory().expect("open in-memory db");
    let arch = platform.rsplit('-').next().map(str::to_string);
    db.set_target(&TargetInfo::new(arch, platform)).expect("set target");
    db
}

pub fn add_site(db: &AnalysisDb, site: &Site<'_>) {
    let view_len = site.view_len.unwrap_or(site.text.len() as u64);
    let record_bytes = location_bytes(site.string, view_len, site.line, site.col);
    db.add_segment(site.record, Some(".data.rel.ro"), &record_bytes).expect("record segment");
    db.add_segment(site.string, Some(".rodata"), site.text).expect("string segment");
    db.insert_data_object(site.record, None, &TypeDef::named("&str")).expect("view object");
    db.insert_data_object(site.string, None, &TypeDef::Utf8 { len: site.text.len() as u64 })
        .expect("string object");
    for from in &site.refs {
        db.add_code_ref(*from, site.record).expect("code ref");
    }
}

/// The canonical single-site binary: `library/core/src/panic.rs:42:9`, referenced
/// from one instruction.
pub fn panic_site_db() -> AnalysisDb {
    let db = empty_db("linux-x86_64");
    let site =
        Site::new(RECORD_ADDR, STRING_ADDR, PANIC_PATH, 42, 9).referenced_from(&[CODE_REF_ADDR]);
    add_site(&db, &site);
    db
}
