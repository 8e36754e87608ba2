//! Journal facade: block store, metadata and shared error type.
//!
//! # Responsibility
//! - Compose block/link/reference/metadata repositories over one connection.
//! - Keep block rows, derived references and search entries in step.
//!
//! # Invariants
//! - Multi-step writes run inside one immediate transaction.
//! - An id collision is retried once with a fresh id; a second collision is
//!   an error.
//! - Missing blocks are reported as `false`/`None`, never as errors.
//!
//! Tree operations live in `service::tree`, reference extraction in
//! `service::references` and graph traversal in `graph`.

use crate::db::DbError;
use crate::graph::render::RenderError;
use crate::model::block::{generate_block_id, Block, BlockId};
use crate::repo::block_repo::{BlockListQuery, BlockRepository, RepoError, SqliteBlockRepository};
use crate::repo::link_repo::{LinkRepository, SqliteLinkRepository};
use crate::repo::metadata_repo::{MetadataRepository, SqliteMetadataRepository};
use crate::repo::reference_repo::{ReferenceRepository, SqliteReferenceRepository};
use crate::search::fts::{index_block, remove_block, search_all, SearchError, SearchQuery};
use log::{error, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Default number of nodes one cycle check may visit before refusing a link.
pub const DEFAULT_CYCLE_CHECK_BUDGET: usize = 100_000;

pub type JournalResult<T> = Result<T, JournalError>;

/// Errors from journal operations.
#[derive(Debug)]
pub enum JournalError {
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Full-text index failure.
    Search(SearchError),
    /// Both the requested id and its regenerated replacement already exist.
    IdCollision(BlockId),
    /// Graph export failed in the external renderer.
    Render(RenderError),
}

impl Display for JournalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Search(err) => write!(f, "{err}"),
            Self::IdCollision(id) => {
                write!(f, "block id collision persisted after regeneration: {id}")
            }
            Self::Render(err) => write!(f, "{err}"),
        }
    }
}

impl Error for JournalError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Search(err) => Some(err),
            Self::IdCollision(_) => None,
            Self::Render(err) => Some(err),
        }
    }
}

impl From<RepoError> for JournalError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<SearchError> for JournalError {
    fn from(value: SearchError) -> Self {
        Self::Search(value)
    }
}

impl From<RenderError> for JournalError {
    fn from(value: RenderError) -> Self {
        Self::Render(value)
    }
}

impl From<rusqlite::Error> for JournalError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::Db(DbError::Sqlite(value)))
    }
}

/// Linked-block graph store over one migrated SQLite connection.
pub struct Journal<'conn> {
    pub(crate) conn: &'conn Connection,
    pub(crate) blocks: SqliteBlockRepository<'conn>,
    pub(crate) links: SqliteLinkRepository<'conn>,
    pub(crate) references: SqliteReferenceRepository<'conn>,
    pub(crate) metadata: SqliteMetadataRepository<'conn>,
    id_generator: fn() -> BlockId,
    pub(crate) cycle_check_budget: usize,
}

impl<'conn> Journal<'conn> {
    /// Creates the facade from a connection returned by `open_db*`.
    pub fn try_new(conn: &'conn Connection) -> JournalResult<Self> {
        Ok(Self {
            conn,
            blocks: SqliteBlockRepository::try_new(conn)?,
            links: SqliteLinkRepository::try_new(conn)?,
            references: SqliteReferenceRepository::try_new(conn)?,
            metadata: SqliteMetadataRepository::try_new(conn)?,
            id_generator: generate_block_id,
            cycle_check_budget: DEFAULT_CYCLE_CHECK_BUDGET,
        })
    }

    /// Replaces the id source used for generated and regenerated ids.
    pub fn with_id_generator(mut self, generator: fn() -> BlockId) -> Self {
        self.id_generator = generator;
        self
    }

    /// Caps how many nodes one cycle check may visit. Exhausting the budget
    /// refuses the link.
    pub fn with_cycle_check_budget(mut self, budget: usize) -> Self {
        self.cycle_check_budget = budget.max(1);
        self
    }

    pub(crate) fn begin_write(&self) -> JournalResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    /// Creates a block and returns its id.
    ///
    /// Uses `id` when provided and non-empty, otherwise a generated id. The
    /// type label is stored exactly as given. Outgoing references are derived
    /// from `content` and the search entry is written.
    ///
    /// # Errors
    /// - `IdCollision` when the regenerated id collides again.
    /// - `Repo`/`Search` for storage failures.
    pub fn create_block(
        &self,
        content: &str,
        kind: &str,
        id: Option<&str>,
    ) -> JournalResult<BlockId> {
        let tx = self.begin_write()?;
        let block = self.insert_new_block(content, kind, id)?;
        tx.commit()?;
        Ok(block.id)
    }

    /// Inserts one block plus its derived rows. Caller owns the transaction.
    pub(crate) fn insert_new_block(
        &self,
        content: &str,
        kind: &str,
        id: Option<&str>,
    ) -> JournalResult<Block> {
        let requested = match id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => (self.id_generator)(),
        };
        let block = match self.blocks.insert_block(&requested, content, kind) {
            Ok(block) => block,
            Err(RepoError::DuplicateId(_)) => {
                let regenerated = (self.id_generator)();
                warn!(
                    "event=block_create module=journal status=retry reason=id_collision"
                );
                match self.blocks.insert_block(&regenerated, content, kind) {
                    Ok(block) => block,
                    Err(RepoError::DuplicateId(id)) => {
                        error!(
                            "event=block_create module=journal status=error error_code=id_collision"
                        );
                        return Err(JournalError::IdCollision(id));
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            Err(err) => return Err(err.into()),
        };

        let reference_count = self.derive_references(&block)?;
        index_block(self.conn, &block)?;
        info!(
            "event=block_create module=journal status=ok block_id={} references={}",
            block.id, reference_count
        );
        Ok(block)
    }

    /// Loads one block by id.
    pub fn get_block(&self, id: &str) -> JournalResult<Option<Block>> {
        Ok(self.blocks.get_block(id)?)
    }

    /// Replaces block content.
    ///
    /// Refreshes `updated_at`, re-derives outgoing references and rewrites the
    /// search entry. Returns `false` when the block does not exist.
    pub fn edit_block(&self, id: &str, content: &str) -> JournalResult<bool> {
        let tx = self.begin_write()?;
        if !self.blocks.update_content(id, content)? {
            return Ok(false);
        }
        let block = self.require_block(id)?;

        let removed = self.references.delete_outgoing(id)?;
        let derived = self.derive_references(&block)?;
        index_block(self.conn, &block)?;
        tx.commit()?;

        info!(
            "event=block_edit module=journal status=ok block_id={} references_removed={} references_derived={}",
            id, removed, derived
        );
        Ok(true)
    }

    /// Changes the block type label. Returns `false` when the block does not
    /// exist.
    pub fn set_block_type(&self, id: &str, kind: &str) -> JournalResult<bool> {
        let tx = self.begin_write()?;
        if !self.blocks.update_type(id, kind)? {
            return Ok(false);
        }
        let block = self.require_block(id)?;
        index_block(self.conn, &block)?;
        tx.commit()?;
        Ok(true)
    }

    /// Deletes a block with its links, references, metadata and search entry.
    ///
    /// Children are not deleted; they become parentless. Returns `false` when
    /// the block does not exist.
    pub fn delete_block(&self, id: &str) -> JournalResult<bool> {
        let tx = self.begin_write()?;
        if !self.blocks.block_exists(id)? {
            return Ok(false);
        }

        let links_removed = self.links.delete_touching(id)?;
        let references_removed = self.references.delete_touching(id)?;
        remove_block(self.conn, id)?;
        self.blocks.delete_block(id)?;
        tx.commit()?;

        info!(
            "event=block_delete module=journal status=ok block_id={} links_removed={} references_removed={}",
            id, links_removed, references_removed
        );
        Ok(true)
    }

    /// Lists blocks matching optional type/recency filters, oldest first.
    pub fn list_blocks(&self, query: &BlockListQuery) -> JournalResult<Vec<Block>> {
        Ok(self.blocks.list_blocks(query)?)
    }

    /// Full-text search over block content ranked by relevance.
    pub fn search_blocks(&self, query: &SearchQuery) -> JournalResult<Vec<Block>> {
        let hits = search_all(self.conn, query)?;
        Ok(hits.into_iter().map(|hit| hit.block).collect())
    }

    /// Sets one metadata value (last write wins). Returns `false` when the
    /// block does not exist.
    pub fn set_metadata(&self, id: &str, key: &str, value: &str) -> JournalResult<bool> {
        if !self.blocks.block_exists(id)? {
            return Ok(false);
        }
        self.metadata.set_value(id, key, value)?;
        Ok(true)
    }

    pub fn get_metadata(&self, id: &str, key: &str) -> JournalResult<Option<String>> {
        Ok(self.metadata.get_value(id, key)?)
    }

    pub fn list_metadata(&self, id: &str) -> JournalResult<BTreeMap<String, String>> {
        Ok(self.metadata.list_values(id)?)
    }

    pub fn delete_metadata(&self, id: &str, key: &str) -> JournalResult<bool> {
        Ok(self.metadata.delete_value(id, key)?)
    }

    pub(crate) fn block_exists(&self, id: &str) -> JournalResult<bool> {
        Ok(self.blocks.block_exists(id)?)
    }

    fn require_block(&self, id: &str) -> JournalResult<Block> {
        self.blocks.get_block(id)?.ok_or_else(|| {
            JournalError::Repo(RepoError::InvalidData(format!(
                "block `{id}` vanished during write"
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Journal, JournalError};
    use crate::db::open_db_in_memory;

    fn fixed_id() -> String {
        "fixed".to_string()
    }

    #[test]
    fn collision_regenerates_once_then_fails() {
        let conn = open_db_in_memory().unwrap();
        let journal = Journal::try_new(&conn).unwrap().with_id_generator(fixed_id);

        let first = journal.create_block("one", "note", None).unwrap();
        assert_eq!(first, "fixed");

        let err = journal
            .create_block("two", "note", Some("fixed"))
            .unwrap_err();
        assert!(matches!(err, JournalError::IdCollision(id) if id == "fixed"));
        assert_eq!(journal.list_blocks(&Default::default()).unwrap().len(), 1);
    }

    #[test]
    fn empty_caller_id_falls_back_to_generator() {
        let conn = open_db_in_memory().unwrap();
        let journal = Journal::try_new(&conn).unwrap().with_id_generator(fixed_id);

        let id = journal.create_block("body", "note", Some("")).unwrap();

        assert_eq!(id, "fixed");
        assert!(journal.get_block("fixed").unwrap().is_some());
    }
}
