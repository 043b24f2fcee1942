//! SQLite persistence for the catalog index.
//!
//! Embeddings are stored as little-endian f32 blobs so a saved index
//! reloads bit-for-bit.

use std::path::Path;

use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::catalog::CatalogRecord;
use crate::error::{ArError, Result};
use crate::search::{CatalogIndex, IndexMetadata};
use crate::storage::migrations;

const META_KEY: &str = "metadata";

/// SQLite database holding one persisted catalog index.
pub struct Database {
    conn: Connection,
    schema_version: u32,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("schema_version", &self.schema_version)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Open (creating if needed) the database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        Self::configure_pragmas(&conn)?;
        let schema_version = migrations::run_migrations(&conn)?;

        Ok(Self {
            conn,
            schema_version,
        })
    }

    /// Open a database that must already exist.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ArError::IndexNotLoaded(format!(
                "no index at {}",
                path.display()
            )));
        }
        Self::open(path)
    }

    /// Current schema version after migrations.
    #[must_use]
    pub const fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Replace whatever index is stored with `index`, atomically.
    pub fn save_index(&mut self, index: &CatalogIndex) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM record_embeddings", [])?;
        tx.execute("DELETE FROM catalog_records", [])?;
        tx.execute("DELETE FROM index_meta", [])?;

        tx.execute(
            "INSERT INTO index_meta (key, value) VALUES (?, ?)",
            params![META_KEY, serde_json::to_string(index.metadata())?],
        )?;

        {
            let mut insert_record = tx.prepare(
                "INSERT INTO catalog_records (position, id, record_json) VALUES (?, ?, ?)",
            )?;
            let mut insert_embedding = tx.prepare(
                "INSERT INTO record_embeddings (record_id, dims, embedding) VALUES (?, ?, ?)",
            )?;
            for (position, (record, vector)) in
                index.records().iter().zip(index.vectors()).enumerate()
            {
                insert_record.execute(params![
                    to_i64(position)?,
                    record.id,
                    serde_json::to_string(record)?
                ])?;
                insert_embedding.execute(params![
                    record.id,
                    to_i64(vector.len())?,
                    encode_embedding(vector)
                ])?;
            }
        }

        tx.commit()?;
        info!(records = index.len(), "saved index");
        Ok(())
    }

    /// Load the stored index, or [`ArError::IndexNotLoaded`] if none was saved.
    pub fn load_index(&self) -> Result<CatalogIndex> {
        let meta_json: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?",
                [META_KEY],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        let Some(meta_json) = meta_json else {
            return Err(ArError::IndexNotLoaded(
                "index database is empty; run `arec build`".to_string(),
            ));
        };
        let metadata: IndexMetadata = serde_json::from_str(&meta_json)?;

        let mut stmt = self.conn.prepare(
            "SELECT r.id, r.record_json, e.dims, e.embedding \
             FROM catalog_records r \
             LEFT JOIN record_embeddings e ON e.record_id = r.id \
             ORDER BY r.position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<i64>>(2)?,
                row.get::<_, Option<Vec<u8>>>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        let mut vectors = Vec::new();
        for row in rows {
            let (id, record_json, dims, blob) = row?;
            let record: CatalogRecord = serde_json::from_str(&record_json)?;
            let (Some(dims), Some(blob)) = (dims, blob) else {
                return Err(ArError::IndexCorrupted(format!(
                    "record '{id}' has no embedding"
                )));
            };
            let dims = usize::try_from(dims)
                .map_err(|_| ArError::IndexCorrupted(format!("record '{id}' has dims {dims}")))?;
            vectors.push(decode_embedding(&blob, dims)?);
            records.push(record);
        }

        debug!(records = records.len(), "loaded index rows");
        CatalogIndex::from_parts(records, vectors, metadata)
    }

    /// Stored metadata without loading records, if an index was saved.
    pub fn metadata(&self) -> Result<Option<IndexMetadata>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM index_meta WHERE key = ?")?;
        let mut rows = stmt.query([META_KEY])?;
        if let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            return Ok(Some(serde_json::from_str(&value)?));
        }
        Ok(None)
    }

    fn configure_pragmas(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;",
        )?;
        Ok(())
    }
}

fn to_i64(value: usize) -> Result<i64> {
    i64::try_from(value).map_err(|_| ArError::IndexCorrupted(format!("{value} out of range")))
}

fn encode_embedding(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

fn decode_embedding(bytes: &[u8], dims: usize) -> Result<Vec<f32>> {
    let expected = dims.saturating_mul(4);
    if bytes.len() != expected {
        return Err(ArError::IndexCorrupted(format!(
            "embedding blob length mismatch: expected {}, got {}",
            expected,
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
