//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for blocks, links,
//!   references and metadata.
//! - Isolate SQLite query details from the journal facade.
//!
//! # Invariants
//! - Repositories only accept connections migrated to the latest schema.
//! - Repositories never enforce graph rules (cycles, single parent); the
//!   journal facade owns those.

pub mod block_repo;
pub mod link_repo;
pub mod metadata_repo;
pub mod reference_repo;

use crate::db::migrations::{current_user_version, latest_version};
use block_repo::{RepoError, RepoResult};
use rusqlite::Connection;

pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    required_tables: &[&'static str],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in required_tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE name = ?1 AND type IN ('table', 'view')
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
