//! Reference repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist content-derived mention edges (`block_references`).
//! - Serve outgoing references and backlinks.
//!
//! # Invariants
//! - At most one row per `(source_id, target_id, context)`.
//! - Rows cascade away with either endpoint block.

use crate::model::block::{Backlink, BlockId, Reference};
use crate::repo::block_repo::{parse_block_row, RepoResult, JOINED_BLOCK_COLUMNS};
use crate::repo::ensure_connection_ready;
use rusqlite::{params, Connection, Row};

/// Repository interface for block references.
pub trait ReferenceRepository {
    /// Inserts one reference. Returns `false` for an exact duplicate.
    fn insert_reference(&self, source_id: &str, target_id: &str, context: &str)
        -> RepoResult<bool>;
    /// Removes all references originating at `source_id`.
    fn delete_outgoing(&self, source_id: &str) -> RepoResult<usize>;
    /// Removes all references where `id` is source or target.
    fn delete_touching(&self, id: &str) -> RepoResult<usize>;
    fn outgoing(&self, source_id: &str) -> RepoResult<Vec<Reference>>;
    fn backlinks(&self, target_id: &str) -> RepoResult<Vec<Backlink>>;
    /// Distinct ids referenced from `source_id`.
    fn referenced_ids(&self, source_id: &str) -> RepoResult<Vec<BlockId>>;
    /// Distinct ids referencing `target_id`.
    fn referencing_ids(&self, target_id: &str) -> RepoResult<Vec<BlockId>>;
    fn list_references(&self) -> RepoResult<Vec<Reference>>;
}

/// SQLite-backed reference repository.
pub struct SqliteReferenceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReferenceRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["blocks", "block_references"])?;
        Ok(Self { conn })
    }

    fn query_references(&self, sql: &str, id: Option<&str>) -> RepoResult<Vec<Reference>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = match id {
            Some(id) => stmt.query([id])?,
            None => stmt.query([])?,
        };
        let mut references = Vec::new();
        while let Some(row) = rows.next()? {
            references.push(parse_reference_row(row)?);
        }
        Ok(references)
    }

    fn query_ids(&self, sql: &str, id: &str) -> RepoResult<Vec<BlockId>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([id])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }
}

impl ReferenceRepository for SqliteReferenceRepository<'_> {
    fn insert_reference(
        &self,
        source_id: &str,
        target_id: &str,
        context: &str,
    ) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO block_references (source_id, target_id, context)
             VALUES (?1, ?2, ?3);",
            params![source_id, target_id, context],
        )?;
        Ok(changed > 0)
    }

    fn delete_outgoing(&self, source_id: &str) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "DELETE FROM block_references WHERE source_id = ?1;",
            [source_id],
        )?;
        Ok(changed)
    }

    fn delete_touching(&self, id: &str) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "DELETE FROM block_references WHERE source_id = ?1 OR target_id = ?1;",
            [id],
        )?;
        Ok(changed)
    }

    fn outgoing(&self, source_id: &str) -> RepoResult<Vec<Reference>> {
        self.query_references(
            "SELECT source_id, target_id, context, created_at
             FROM block_references
             WHERE source_id = ?1
             ORDER BY rowid ASC;",
            Some(source_id),
        )
    }

    fn backlinks(&self, target_id: &str) -> RepoResult<Vec<Backlink>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {JOINED_BLOCK_COLUMNS},
                r.context AS context
             FROM block_references r
             JOIN blocks b ON b.id = r.source_id
             WHERE r.target_id = ?1
             ORDER BY r.rowid ASC;"
        ))?;
        let mut rows = stmt.query([target_id])?;
        let mut backlinks = Vec::new();
        while let Some(row) = rows.next()? {
            backlinks.push(Backlink {
                block: parse_block_row(row)?,
                context: row.get("context")?,
            });
        }
        Ok(backlinks)
    }

    fn referenced_ids(&self, source_id: &str) -> RepoResult<Vec<BlockId>> {
        self.query_ids(
            "SELECT target_id
             FROM block_references
             WHERE source_id = ?1
             GROUP BY target_id
             ORDER BY MIN(rowid) ASC;",
            source_id,
        )
    }

    fn referencing_ids(&self, target_id: &str) -> RepoResult<Vec<BlockId>> {
        self.query_ids(
            "SELECT source_id
             FROM block_references
             WHERE target_id = ?1
             GROUP BY source_id
             ORDER BY MIN(rowid) ASC;",
            target_id,
        )
    }

    fn list_references(&self) -> RepoResult<Vec<Reference>> {
        self.query_references(
            "SELECT source_id, target_id, context, created_at
             FROM block_references
             ORDER BY rowid ASC;",
            None,
        )
    }
}

fn parse_reference_row(row: &Row<'_>) -> RepoResult<Reference> {
    Ok(Reference {
        source_id: row.get("source_id")?,
        target_id: row.get("target_id")?,
        context: row.get("context")?,
        created_at: row.get("created_at")?,
    })
}
