use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::db::{PipelineRunRecord, PipelineRunStatus};
use crate::model::{Address, DataObject, Decoder, Endianness, Tag, TagType, TargetInfo, TypeDef};
use crate::services::analysis::{AnalysisModel, ModelError, ModelResult};

/// Minimum schema version we know how to handle.
///
/// `0` means "no schema yet" (fresh DB).
const MIN_SUPPORTED_SCHEMA_VERSION: i32 = 0;

/// Latest schema version this crate knows about.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

// Addresses are stored as the bit pattern of the `u64` in an INTEGER column.
// Range queries order them with `col < 0, col` so high-half addresses sort last.

/// Savepoint name used for model transactions.
const SAVEPOINT: &str = "panic_sites_tx";

/// Error type for analysis database operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// Underlying SQLite error.
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// A stored type definition could not be (de)serialized.
    #[error("type definition JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The database was created with a newer schema version than we support.
    #[error(
        "Unsupported schema version {found}; supported range is {min_supported}..={max_supported}"
    )]
    UnsupportedSchemaVersion { found: i32, min_supported: i32, max_supported: i32 },
}

/// Convenience result type for DB operations.
pub type DbResult<T> = Result<T, DbError>;

impl From<DbError> for ModelError {
    fn from(err: DbError) -> Self {
        ModelError::Storage(err.to_string())
    }
}

impl From<rusqlite::Error> for ModelError {
    fn from(err: rusqlite::Error) -> Self {
        DbError::from(err).into()
    }
}

/// SQLite-backed binary analysis database.
///
/// Holds the address space (segments), type registry, data objects, code
/// references and tags of one binary, and implements `AnalysisModel` on top of
/// them. Model transactions map to SQLite savepoints.
#[derive(Debug)]
pub struct AnalysisDb {
    conn: Connection,
    tx_depth: usize,
}

impl AnalysisDb {
    /// Open (or create) an analysis database at the given path and ensure the schema exists.
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        apply_migrations(&conn)?;
        Ok(Self { conn, tx_depth: 0 })
    }

    /// Open a throwaway database that lives only in memory.
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        apply_migrations(&conn)?;
        Ok(Self { conn, tx_depth: 0 })
    }

    /// Expose a reference to the underlying connection for advanced callers.
    /// For most code, prefer higher-level helpers.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Replace the stored target metadata.
    pub fn set_target(&self, target: &TargetInfo) -> DbResult<()> {
        self.conn.execute(
            r#"
            UPDATE target
            SET arch = ?1, platform = ?2, endianness = ?3, address_size = ?4
            WHERE id = 1
            "#,
            params![
                target.arch,
                target.platform,
                target.endianness.as_str(),
                i64::from(target.address_size)
            ],
        )?;
        Ok(())
    }

    /// Record the content hash of the binary the database describes.
    pub fn set_binary_hash(&self, hash: Option<&str>) -> DbResult<()> {
        self.conn.execute("UPDATE target SET binary_hash = ?1 WHERE id = 1", params![hash])?;
        Ok(())
    }

    pub fn binary_hash(&self) -> DbResult<Option<String>> {
        Ok(self.conn.query_row("SELECT binary_hash FROM target WHERE id = 1", [], |row| {
            row.get(0)
        })?)
    }

    /// Store (or replace) the bytes mapped at `start`.
    pub fn add_segment(&self, start: Address, name: Option<&str>, bytes: &[u8]) -> DbResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO segments (start, name, bytes) VALUES (?1, ?2, ?3)",
            params![start as i64, name, bytes],
        )?;
        Ok(())
    }

    /// Read `len` bytes at `address`; `None` unless one segment covers the whole range.
    pub fn read_bytes(&self, address: Address, len: u64) -> DbResult<Option<Vec<u8>>> {
        // Highest start at or below `address`, compared as unsigned.
        let segment: Option<(i64, Vec<u8>)> = self
            .conn
            .query_row(
                r#"
                SELECT start, bytes FROM segments
                WHERE CASE WHEN ?1 >= 0 THEN start BETWEEN 0 AND ?1
                           ELSE start >= 0 OR start <= ?1 END
                ORDER BY start < 0 DESC, start DESC
                LIMIT 1
                "#,
                params![address as i64],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(segment.and_then(|(start, bytes)| {
            let offset = usize::try_from(address.checked_sub(start as u64)?).ok()?;
            let end = offset.checked_add(usize::try_from(len).ok()?)?;
            bytes.get(offset..end).map(<[u8]>::to_vec)
        }))
    }

    /// Insert a data object produced by automated analysis (not a user action).
    ///
    /// Unlike `define_data_object` this performs no overlap checks; it is how
    /// imports seed the database.
    pub fn insert_data_object(
        &self,
        address: Address,
        name: Option<&str>,
        ty: &TypeDef,
    ) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO data_objects (address, name, type, user)
            VALUES (?1, ?2, ?3, 0)
            "#,
            params![address as i64, name, serde_json::to_string(ty)?],
        )?;
        Ok(())
    }

    pub fn add_code_ref(&self, from: Address, to: Address) -> DbResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO code_refs (from_addr, to_addr) VALUES (?1, ?2)",
            params![from as i64, to as i64],
        )?;
        Ok(())
    }

    /// All registered types keyed by name.
    pub fn types(&self) -> DbResult<HashMap<String, TypeDef>> {
        let mut stmt = self.conn.prepare("SELECT name, definition FROM types")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut out = HashMap::new();
        for row in rows {
            let (name, definition) = row?;
            out.insert(name, serde_json::from_str(&definition)?);
        }
        Ok(out)
    }

    /// List every data object (ordered by address), values decoded.
    pub fn list_data_objects(&self) -> DbResult<Vec<DataObject>> {
        let mut stmt =
            self.conn.prepare("SELECT address FROM data_objects ORDER BY address < 0, address")?;
        let addresses: Vec<i64> =
            stmt.query_map([], |row| row.get(0))?.collect::<Result<_, _>>()?;

        let mut out = Vec::with_capacity(addresses.len());
        for address in addresses {
            if let Some(object) = self.load_data_object(address as u64)? {
                out.push(object);
            }
        }
        Ok(out)
    }

    pub fn list_tag_types(&self) -> DbResult<Vec<TagType>> {
        let mut stmt = self.conn.prepare("SELECT name, icon FROM tag_types ORDER BY name")?;
        let rows = stmt.query_map([], |row| Ok(TagType { name: row.get(0)?, icon: row.get(1)? }))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// List all tags (ordered by address, then insertion).
    pub fn list_tags(&self) -> DbResult<Vec<Tag>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT address, tag_type, data, user
            FROM tags
            ORDER BY address < 0, address, id
            "#,
        )?;
        let rows = stmt.query_map([], map_tag)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Number of times re-analysis has been requested.
    pub fn analysis_generation(&self) -> DbResult<i64> {
        Ok(self.conn.query_row("SELECT generation FROM analysis_state WHERE id = 1", [], |row| {
            row.get(0)
        })?)
    }

    /// Insert a pipeline run record and return its row id.
    pub fn insert_pipeline_run(&self, record: &PipelineRunRecord) -> DbResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO pipeline_runs (started_at, finished_at, status, candidates, records, tags_added, message)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                record.started_at,
                record.finished_at,
                record.status.as_str(),
                record.candidates as i64,
                record.records as i64,
                record.tags_added as i64,
                record.message
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// List pipeline runs (oldest first).
    pub fn list_pipeline_runs(&self) -> DbResult<Vec<PipelineRunRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT started_at, finished_at, status, candidates, records, tags_added, message
            FROM pipeline_runs
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(PipelineRunRecord {
                started_at: row.get(0)?,
                finished_at: row.get(1)?,
                status: PipelineRunStatus::from_str_lossy(&row.get::<_, String>(2)?),
                candidates: row.get::<_, i64>(3)? as usize,
                records: row.get::<_, i64>(4)? as usize,
                tags_added: row.get::<_, i64>(5)? as usize,
                message: row.get(6)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn load_target(&self) -> DbResult<TargetInfo> {
        Ok(self.conn.query_row(
            "SELECT arch, platform, endianness, address_size FROM target WHERE id = 1",
            [],
            |row| {
                Ok(TargetInfo {
                    arch: row.get(0)?,
                    platform: row.get(1)?,
                    endianness: Endianness::from_str_lossy(&row.get::<_, String>(2)?),
                    address_size: row.get::<_, i64>(3)? as u8,
                })
            },
        )?)
    }

    fn object_row(&self, address: Address) -> DbResult<Option<(Option<String>, TypeDef, bool)>> {
        let row: Option<(Option<String>, String, bool)> = self
            .conn
            .query_row(
                "SELECT name, type, user FROM data_objects WHERE address = ?1",
                params![address as i64],
                |row| Ok((row.get(0)?, row.get(1)?, row.get::<_, i64>(2)? != 0)),
            )
            .optional()?;
        match row {
            Some((name, ty, user)) => Ok(Some((name, serde_json::from_str(&ty)?, user))),
            None => Ok(None),
        }
    }

    fn load_data_object(&self, address: Address) -> DbResult<Option<DataObject>> {
        let Some((name, ty, user)) = self.object_row(address)? else { return Ok(None) };

        let types = self.types()?;
        let target = self.load_target()?;
        let decoder = Decoder::new(&types, &target);
        let value = match decoder.size_of(&ty) {
            Ok(size) => self
                .read_bytes(address, size)?
                .and_then(|bytes| match decoder.decode(&ty, &bytes) {
                    Ok(value) => Some(value),
                    Err(err) => {
                        tracing::debug!("cannot decode object at {address:#x}: {err}");
                        None
                    }
                }),
            Err(err) => {
                tracing::debug!("cannot size object at {address:#x}: {err}");
                None
            }
        };
        Ok(Some(DataObject { address, name, ty, value, user }))
    }

    /// Check whether `type_name` may be placed at `address`.
    ///
    /// Allowed over empty space, over an object of the same type, or over an
    /// object whose type is the first field of the new type (a prefix overlay).
    /// Any other object starting inside the new object's extent is a conflict.
    fn check_overlay(&self, address: Address, type_name: &str, ty: &TypeDef) -> ModelResult<()> {
        let requested = TypeDef::named(type_name);
        let types = self.types()?;
        let target = self.load_target()?;
        let size = Decoder::new(&types, &target)
            .size_of(ty)
            .map_err(|_| ModelError::UnknownType(type_name.to_string()))?;

        if let Some((_, existing, _)) = self.object_row(address)? {
            let prefix = match ty {
                TypeDef::Struct(s) => s.first_field().map(|f| &f.ty),
                _ => None,
            };
            if existing != requested && Some(&existing) != prefix {
                return Err(ModelError::Conflict {
                    address,
                    existing: existing.describe(),
                    requested: type_name.to_string(),
                });
            }
        }

        let end = address.saturating_add(size);
        let overlapping: Option<(i64, String)> = self
            .conn
            .query_row(
                r#"
                SELECT address, type FROM data_objects
                WHERE CASE WHEN ?1 <= ?2 THEN address > ?1 AND address < ?2
                           ELSE address > ?1 OR address < ?2 END
                ORDER BY address < 0, address
                LIMIT 1
                "#,
                params![address as i64, end as i64],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        if let Some((other, other_ty)) = overlapping {
            let existing = serde_json::from_str::<TypeDef>(&other_ty)
                .map(|t| t.describe())
                .unwrap_or(other_ty);
            return Err(ModelError::Conflict {
                address,
                existing: format!("{existing} at {:#x}", other as u64),
                requested: type_name.to_string(),
            });
        }
        Ok(())
    }
}

impl AnalysisModel for AnalysisDb {
    fn target(&self) -> ModelResult<TargetInfo> {
        Ok(self.load_target()?)
    }

    fn type_by_name(&self, name: &str) -> ModelResult<Option<TypeDef>> {
        let definition: Option<String> = self
            .conn
            .query_row("SELECT definition FROM types WHERE name = ?1", params![name], |row| {
                row.get(0)
            })
            .optional()?;
        match definition {
            Some(json) => Ok(Some(serde_json::from_str(&json).map_err(DbError::from)?)),
            None => Ok(None),
        }
    }

    fn define_type(&mut self, name: &str, ty: &TypeDef) -> ModelResult<()> {
        let definition = serde_json::to_string(ty).map_err(DbError::from)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO types (name, definition, user) VALUES (?1, ?2, 1)",
            params![name, definition],
        )?;
        Ok(())
    }

    fn data_objects_of_type(&self, type_name: &str) -> ModelResult<Vec<Address>> {
        let wanted = serde_json::to_string(&TypeDef::named(type_name)).map_err(DbError::from)?;
        let mut stmt =
            self.conn.prepare(
                "SELECT address FROM data_objects WHERE type = ?1 ORDER BY address < 0, address",
            )?;
        let rows = stmt.query_map(params![wanted], |row| row.get::<_, i64>(0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row? as u64);
        }
        Ok(out)
    }

    fn data_object_at(&self, address: Address) -> ModelResult<Option<DataObject>> {
        Ok(self.load_data_object(address)?)
    }

    fn define_data_object(
        &mut self,
        address: Address,
        type_name: &str,
        name: &str,
    ) -> ModelResult<DataObject> {
        let ty = self
            .type_by_name(type_name)?
            .ok_or_else(|| ModelError::UnknownType(type_name.to_string()))?;
        self.check_overlay(address, type_name, &ty)?;

        let stored = serde_json::to_string(&TypeDef::named(type_name)).map_err(DbError::from)?;
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO data_objects (address, name, type, user)
            VALUES (?1, ?2, ?3, 1)
            "#,
            params![address as i64, name, stored],
        )?;
        self.load_data_object(address)?.ok_or_else(|| {
            ModelError::Storage(format!("data object at {address:#x} vanished after insert"))
        })
    }

    fn code_references_to(&self, address: Address) -> ModelResult<Vec<Address>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT from_addr FROM code_refs WHERE to_addr = ?1 \
                 ORDER BY from_addr < 0, from_addr",
            )?;
        let rows = stmt.query_map(params![address as i64], |row| row.get::<_, i64>(0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row? as u64);
        }
        Ok(out)
    }

    fn tag_type_exists(&self, name: &str) -> ModelResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM tag_types WHERE name = ?1", params![name], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    fn create_tag_type(&mut self, name: &str, icon: &str) -> ModelResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO tag_types (name, icon) VALUES (?1, ?2)",
            params![name, icon],
        )?;
        Ok(())
    }

    fn add_tag(&mut self, tag: &Tag) -> ModelResult<()> {
        if !self.tag_type_exists(&tag.tag_type)? {
            return Err(ModelError::UnknownTagType(tag.tag_type.clone()));
        }
        self.conn.execute(
            "INSERT INTO tags (address, tag_type, data, user) VALUES (?1, ?2, ?3, ?4)",
            params![tag.address as i64, tag.tag_type, tag.data, i64::from(tag.user)],
        )?;
        Ok(())
    }

    fn tags_at(&self, address: Address) -> ModelResult<Vec<Tag>> {
        let mut stmt = self.conn.prepare(
            "SELECT address, tag_type, data, user FROM tags WHERE address = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![address as i64], map_tag)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn begin_transaction(&mut self) -> ModelResult<()> {
        self.conn.execute_batch(&format!("SAVEPOINT {SAVEPOINT};"))?;
        self.tx_depth += 1;
        Ok(())
    }

    fn commit_transaction(&mut self) -> ModelResult<()> {
        if self.tx_depth == 0 {
            return Err(ModelError::NoTransaction);
        }
        self.conn.execute_batch(&format!("RELEASE {SAVEPOINT};"))?;
        self.tx_depth -= 1;
        Ok(())
    }

    fn rollback_transaction(&mut self) -> ModelResult<()> {
        if self.tx_depth == 0 {
            return Err(ModelError::NoTransaction);
        }
        self.conn.execute_batch(&format!("ROLLBACK TO {SAVEPOINT}; RELEASE {SAVEPOINT};"))?;
        self.tx_depth -= 1;
        Ok(())
    }

    fn trigger_reanalysis(&mut self) -> ModelResult<()> {
        self.conn
            .execute("UPDATE analysis_state SET generation = generation + 1 WHERE id = 1", [])?;
        tracing::debug!("re-analysis requested");
        Ok(())
    }
}

fn map_tag(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        address: row.get::<_, i64>(0)? as u64,
        tag_type: row.get(1)?,
        data: row.get(2)?,
        user: row.get::<_, i64>(3)? != 0,
    })
}

/// Apply schema migrations to bring the database to the latest version.
///
/// We use `PRAGMA user_version` as the schema version indicator.
///
/// Version map:
/// - 0: no schema
/// - 1: analysis model (target, segments, types, data objects, code refs, tags)
/// - 2: add pipeline_runs table
fn apply_migrations(conn: &Connection) -> DbResult<()> {
    let mut current_version = current_schema_version(conn)?;

    // Reject DBs created with a newer schema than we support.
    if current_version > CURRENT_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            found: current_version,
            min_supported: MIN_SUPPORTED_SCHEMA_VERSION,
            max_supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if current_version == 0 {
        // Initial schema. The string-view type is seeded as a builtin.
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS target (
                id           INTEGER PRIMARY KEY CHECK (id = 1),
                arch         TEXT,
                platform     TEXT NOT NULL,
                endianness   TEXT NOT NULL,
                address_size INTEGER NOT NULL,
                binary_hash  TEXT
            );
            INSERT OR IGNORE INTO target (id, arch, platform, endianness, address_size)
            VALUES (1, NULL, 'unknown', 'little', 8);

            CREATE TABLE IF NOT EXISTS segments (
                start INTEGER PRIMARY KEY,
                name  TEXT,
                bytes BLOB NOT NULL
            );

            CREATE TABLE IF NOT EXISTS types (
                name       TEXT PRIMARY KEY,
                definition TEXT NOT NULL,
                user       INTEGER NOT NULL DEFAULT 0
            );
            INSERT OR IGNORE INTO types (name, definition, user)
            VALUES ('&str', '{"kind":"string_view"}', 0);

            CREATE TABLE IF NOT EXISTS data_objects (
                address INTEGER PRIMARY KEY,
                name    TEXT,
                type    TEXT NOT NULL,
                user    INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS data_objects_type ON data_objects(type);

            CREATE TABLE IF NOT EXISTS code_refs (
                from_addr INTEGER NOT NULL,
                to_addr   INTEGER NOT NULL,
                PRIMARY KEY(from_addr, to_addr)
            );
            CREATE INDEX IF NOT EXISTS code_refs_to ON code_refs(to_addr);

            CREATE TABLE IF NOT EXISTS tag_types (
                name TEXT PRIMARY KEY,
                icon TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tags (
                id       INTEGER PRIMARY KEY AUTOINCREMENT,
                address  INTEGER NOT NULL,
                tag_type TEXT NOT NULL,
                data     TEXT NOT NULL,
                user     INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS tags_address ON tags(address);

            CREATE TABLE IF NOT EXISTS analysis_state (
                id         INTEGER PRIMARY KEY CHECK (id = 1),
                generation INTEGER NOT NULL
            );
            INSERT OR IGNORE INTO analysis_state (id, generation) VALUES (1, 0);

            PRAGMA user_version = 1;
            COMMIT;
            "#,
        )?;
        current_version = 1;
    }

    if current_version < 2 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS pipeline_runs (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at  TEXT NOT NULL,
                finished_at TEXT NOT NULL,
                status      TEXT NOT NULL,
                candidates  INTEGER NOT NULL DEFAULT 0,
                records     INTEGER NOT NULL DEFAULT 0,
                tags_added  INTEGER NOT NULL DEFAULT 0,
                message     TEXT
            );

            PRAGMA user_version = 2;
            COMMIT;
            "#,
        )?;
    }

    Ok(())
}

/// Read the SQLite schema version from `PRAGMA user_version`.
fn current_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(version)
}
