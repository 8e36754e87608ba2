//! Per-block key/value metadata storage.
//!
//! # Invariants
//! - One value per `(block_id, key)`; writes are last-write-wins upserts.
//! - Rows cascade away with their block.

use crate::repo::block_repo::RepoResult;
use crate::repo::ensure_connection_ready;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;

/// Repository interface for block metadata.
pub trait MetadataRepository {
    fn set_value(&self, block_id: &str, key: &str, value: &str) -> RepoResult<()>;
    fn get_value(&self, block_id: &str, key: &str) -> RepoResult<Option<String>>;
    fn list_values(&self, block_id: &str) -> RepoResult<BTreeMap<String, String>>;
    fn delete_value(&self, block_id: &str, key: &str) -> RepoResult<bool>;
}

/// SQLite-backed metadata repository.
pub struct SqliteMetadataRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMetadataRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["blocks", "metadata"])?;
        Ok(Self { conn })
    }
}

impl MetadataRepository for SqliteMetadataRepository<'_> {
    fn set_value(&self, block_id: &str, key: &str, value: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO metadata (block_id, key, value)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(block_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![block_id, key, value],
        )?;
        Ok(())
    }

    fn get_value(&self, block_id: &str, key: &str) -> RepoResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM metadata WHERE block_id = ?1 AND key = ?2;",
                params![block_id, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn list_values(&self, block_id: &str) -> RepoResult<BTreeMap<String, String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM metadata WHERE block_id = ?1;")?;
        let mut rows = stmt.query([block_id])?;
        let mut values = BTreeMap::new();
        while let Some(row) = rows.next()? {
            values.insert(row.get(0)?, row.get(1)?);
        }
        Ok(values)
    }

    fn delete_value(&self, block_id: &str, key: &str) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM metadata WHERE block_id = ?1 AND key = ?2;",
            params![block_id, key],
        )?;
        Ok(changed > 0)
    }
}
