//! Block repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD APIs over canonical `blocks` storage.
//! - Own the shared repository error type and block row decoding.
//!
//! # Invariants
//! - Inserts never overwrite an existing id; collisions surface as
//!   `RepoError::DuplicateId`.
//! - Every content/type write refreshes `updated_at`.

use crate::db::DbError;
use crate::model::block::{Block, BlockId};
use crate::repo::{ensure_connection_ready, placeholders};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const BLOCK_SELECT_SQL: &str = "SELECT
    id,
    content,
    type,
    created_at,
    updated_at
FROM blocks";

/// Block columns aliased from a `blocks b` join.
pub(crate) const JOINED_BLOCK_COLUMNS: &str = "b.id AS id,
    b.content AS content,
    b.type AS type,
    b.created_at AS created_at,
    b.updated_at AS updated_at";

const IN_LIST_CHUNK: usize = 500;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by block, link, reference and metadata storage.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Insert hit an existing primary key.
    DuplicateId(BlockId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::DuplicateId(id) => write!(f, "block id already exists: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "journal repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "journal repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted journal data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Filter options for listing blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockListQuery {
    /// Exact type label match.
    pub kind: Option<String>,
    /// Only blocks with `updated_at >= since` (epoch ms).
    pub since: Option<i64>,
}

impl BlockListQuery {
    /// Returns whether an already-loaded block passes this filter.
    pub fn matches(&self, block: &Block) -> bool {
        if let Some(kind) = &self.kind {
            if block.kind != *kind {
                return false;
            }
        }
        if let Some(since) = self.since {
            if block.updated_at < since {
                return false;
            }
        }
        true
    }
}

/// Repository interface for block persistence.
pub trait BlockRepository {
    /// Inserts a new block row and returns the stored record.
    fn insert_block(&self, id: &str, content: &str, kind: &str) -> RepoResult<Block>;
    fn get_block(&self, id: &str) -> RepoResult<Option<Block>>;
    fn block_exists(&self, id: &str) -> RepoResult<bool>;
    /// Loads blocks for the given ids, skipping ids that do not exist.
    fn get_blocks(&self, ids: &[BlockId]) -> RepoResult<Vec<Block>>;
    fn update_content(&self, id: &str, content: &str) -> RepoResult<bool>;
    fn update_type(&self, id: &str, kind: &str) -> RepoResult<bool>;
    fn delete_block(&self, id: &str) -> RepoResult<bool>;
    fn list_blocks(&self, query: &BlockListQuery) -> RepoResult<Vec<Block>>;
    /// Ids of blocks whose content contains `needle` (case-sensitive), except
    /// `exclude_id`.
    fn find_ids_containing(&self, needle: &str, exclude_id: &str) -> RepoResult<Vec<BlockId>>;
}

/// SQLite-backed block repository.
pub struct SqliteBlockRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBlockRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["blocks"])?;
        Ok(Self { conn })
    }
}

impl BlockRepository for SqliteBlockRepository<'_> {
    fn insert_block(&self, id: &str, content: &str, kind: &str) -> RepoResult<Block> {
        let inserted = self.conn.execute(
            "INSERT INTO blocks (id, content, type) VALUES (?1, ?2, ?3);",
            params![id, content, kind],
        );

        match inserted {
            Ok(_) => {}
            Err(err) if is_primary_key_violation(&err) => {
                return Err(RepoError::DuplicateId(id.to_string()));
            }
            Err(err) => return Err(err.into()),
        }

        self.get_block(id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("inserted block `{id}` not found in read-back"))
        })
    }

    fn get_block(&self, id: &str) -> RepoResult<Option<Block>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BLOCK_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_block_row(row)?));
        }
        Ok(None)
    }

    fn block_exists(&self, id: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM blocks WHERE id = ?1);",
            [id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn get_blocks(&self, ids: &[BlockId]) -> RepoResult<Vec<Block>> {
        let mut blocks = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(IN_LIST_CHUNK) {
            let sql = format!(
                "{BLOCK_SELECT_SQL} WHERE id IN ({}) ORDER BY created_at ASC, id ASC;",
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(chunk.iter()))?;
            while let Some(row) = rows.next()? {
                blocks.push(parse_block_row(row)?);
            }
        }
        Ok(blocks)
    }

    fn update_content(&self, id: &str, content: &str) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE blocks
             SET content = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, content],
        )?;
        Ok(changed > 0)
    }

    fn update_type(&self, id: &str, kind: &str) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE blocks
             SET type = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, kind],
        )?;
        Ok(changed > 0)
    }

    fn delete_block(&self, id: &str) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM blocks WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }

    fn list_blocks(&self, query: &BlockListQuery) -> RepoResult<Vec<Block>> {
        let mut sql = format!("{BLOCK_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(kind) = &query.kind {
            sql.push_str(" AND type = ?");
            bind_values.push(Value::Text(kind.clone()));
        }
        if let Some(since) = query.since {
            sql.push_str(" AND updated_at >= ?");
            bind_values.push(Value::Integer(since));
        }
        sql.push_str(" ORDER BY created_at ASC, id ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut blocks = Vec::new();
        while let Some(row) = rows.next()? {
            blocks.push(parse_block_row(row)?);
        }
        Ok(blocks)
    }

    fn find_ids_containing(&self, needle: &str, exclude_id: &str) -> RepoResult<Vec<BlockId>> {
        let mut stmt = self.conn.prepare(
            "SELECT id
             FROM blocks
             WHERE instr(content, ?1) > 0
               AND id <> ?2
             ORDER BY created_at ASC, id ASC;",
        )?;
        let mut rows = stmt.query(params![needle, exclude_id])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }
}

/// Decodes one row selected with [`BLOCK_SELECT_SQL`] or
/// [`JOINED_BLOCK_COLUMNS`].
pub(crate) fn parse_block_row(row: &Row<'_>) -> RepoResult<Block> {
    let id: String = row.get("id")?;
    if id.is_empty() {
        return Err(RepoError::InvalidData(
            "empty id value in blocks.id".to_string(),
        ));
    }

    Ok(Block {
        id,
        content: row.get("content")?,
        kind: row.get("type")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn is_primary_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}
