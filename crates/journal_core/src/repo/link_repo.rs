//! Link repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist directed parent -> child tree edges.
//! - Answer adjacency queries used by tree navigation and traversal.
//!
//! # Invariants
//! - At most one link row per `(source_id, target_id)`.
//! - Adjacency lists are ordered by insertion (`links.rowid`).
//! - Cycle checks live above this layer; inserts here are unconditional.

use crate::model::block::{Block, BlockId, Link, LinkType};
use crate::repo::block_repo::{parse_block_row, RepoError, RepoResult, JOINED_BLOCK_COLUMNS};
use crate::repo::ensure_connection_ready;
use rusqlite::{params, Connection, Row};

/// Repository interface for tree links.
pub trait LinkRepository {
    /// Inserts one link. Returns `false` when the pair was already linked.
    fn insert_link(&self, source_id: &str, target_id: &str) -> RepoResult<bool>;
    fn delete_link(&self, source_id: &str, target_id: &str) -> RepoResult<bool>;
    /// Deletes every link pointing at `target_id`.
    fn delete_incoming(&self, target_id: &str) -> RepoResult<usize>;
    /// Deletes every link where `id` is source or target.
    fn delete_touching(&self, id: &str) -> RepoResult<usize>;
    fn child_ids(&self, id: &str) -> RepoResult<Vec<BlockId>>;
    fn parent_ids(&self, id: &str) -> RepoResult<Vec<BlockId>>;
    fn children(&self, id: &str) -> RepoResult<Vec<Block>>;
    fn parents(&self, id: &str) -> RepoResult<Vec<Block>>;
    fn list_links(&self) -> RepoResult<Vec<Link>>;
}

/// SQLite-backed link repository.
pub struct SqliteLinkRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLinkRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["blocks", "links"])?;
        Ok(Self { conn })
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

    fn query_blocks(&self, sql: &str, id: &str) -> RepoResult<Vec<Block>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([id])?;
        let mut blocks = Vec::new();
        while let Some(row) = rows.next()? {
            blocks.push(parse_block_row(row)?);
        }
        Ok(blocks)
    }
}

impl LinkRepository for SqliteLinkRepository<'_> {
    fn insert_link(&self, source_id: &str, target_id: &str) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO links (source_id, target_id, type) VALUES (?1, ?2, ?3);",
            params![source_id, target_id, LinkType::Direct.as_str()],
        )?;
        Ok(changed > 0)
    }

    fn delete_link(&self, source_id: &str, target_id: &str) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM links WHERE source_id = ?1 AND target_id = ?2;",
            params![source_id, target_id],
        )?;
        Ok(changed > 0)
    }

    fn delete_incoming(&self, target_id: &str) -> RepoResult<usize> {
        let changed = self
            .conn
            .execute("DELETE FROM links WHERE target_id = ?1;", [target_id])?;
        Ok(changed)
    }

    fn delete_touching(&self, id: &str) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "DELETE FROM links WHERE source_id = ?1 OR target_id = ?1;",
            [id],
        )?;
        Ok(changed)
    }

    fn child_ids(&self, id: &str) -> RepoResult<Vec<BlockId>> {
        self.query_ids(
            "SELECT target_id FROM links WHERE source_id = ?1 ORDER BY rowid ASC;",
            id,
        )
    }

    fn parent_ids(&self, id: &str) -> RepoResult<Vec<BlockId>> {
        self.query_ids(
            "SELECT source_id FROM links WHERE target_id = ?1 ORDER BY rowid ASC;",
            id,
        )
    }

    fn children(&self, id: &str) -> RepoResult<Vec<Block>> {
        self.query_blocks(
            &format!(
                "SELECT {JOINED_BLOCK_COLUMNS}
                 FROM links l
                 JOIN blocks b ON b.id = l.target_id
                 WHERE l.source_id = ?1
                 ORDER BY l.rowid ASC;"
            ),
            id,
        )
    }

    fn parents(&self, id: &str) -> RepoResult<Vec<Block>> {
        self.query_blocks(
            &format!(
                "SELECT {JOINED_BLOCK_COLUMNS}
                 FROM links l
                 JOIN blocks b ON b.id = l.source_id
                 WHERE l.target_id = ?1
                 ORDER BY l.rowid ASC;"
            ),
            id,
        )
    }

    fn list_links(&self) -> RepoResult<Vec<Link>> {
        let mut stmt = self.conn.prepare(
            "SELECT source_id, target_id, type, created_at
             FROM links
             ORDER BY rowid ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut links = Vec::new();
        while let Some(row) = rows.next()? {
            links.push(parse_link_row(row)?);
        }
        Ok(links)
    }
}

fn parse_link_row(row: &Row<'_>) -> RepoResult<Link> {
    let type_text: String = row.get("type")?;
    let kind = LinkType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid link type `{type_text}` in links.type"))
    })?;

    Ok(Link {
        source_id: row.get("source_id")?,
        target_id: row.get("target_id")?,
        kind,
        created_at: row.get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::{LinkRepository, SqliteLinkRepository};
    use crate::db::open_db_in_memory;
    use crate::repo::block_repo::{BlockRepository, SqliteBlockRepository};

    #[test]
    fn insert_is_idempotent_and_children_keep_insertion_order() {
        let conn = open_db_in_memory().unwrap();
        let blocks = SqliteBlockRepository::try_new(&conn).unwrap();
        let links = SqliteLinkRepository::try_new(&conn).unwrap();
        for id in ["p", "z", "a"] {
            blocks.insert_block(id, id, "note").unwrap();
        }

        assert!(links.insert_link("p", "z").unwrap());
        assert!(links.insert_link("p", "a").unwrap());
        assert!(!links.insert_link("p", "z").unwrap());

        assert_eq!(links.child_ids("p").unwrap(), vec!["z", "a"]);
        assert_eq!(links.parent_ids("a").unwrap(), vec!["p"]);
        assert_eq!(links.list_links().unwrap().len(), 2);
    }

    #[test]
    fn delete_touching_removes_both_directions() {
        let conn = open_db_in_memory().unwrap();
        let blocks = SqliteBlockRepository::try_new(&conn).unwrap();
        let links = SqliteLinkRepository::try_new(&conn).unwrap();
        for id in ["a", "b", "c"] {
            blocks.insert_block(id, id, "note").unwrap();
        }
        links.insert_link("a", "b").unwrap();
        links.insert_link("b", "c").unwrap();

        assert_eq!(links.delete_touching("b").unwrap(), 2);
        assert!(links.list_links().unwrap().is_empty());
    }
}
