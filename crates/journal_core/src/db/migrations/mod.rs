//! Journal schema steps.
//!
//! 1. `blocks` and the `links` tree table.
//! 2. `block_references` and per-block `metadata`, both cascading on delete.
//! 3. The `blocks_fts` index, kept in step by store code.
//!
//! Steps run in one transaction; `PRAGMA user_version` records the last step
//! applied.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::{Connection, Transaction};

#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "blocks_links",
        sql: include_str!("0001_blocks_links.sql"),
    },
    SchemaStep {
        version: 2,
        name: "references_metadata",
        sql: include_str!("0002_references_metadata.sql"),
    },
    SchemaStep {
        version: 3,
        name: "blocks_fts",
        sql: include_str!("0003_blocks_fts.sql"),
    },
];

/// Schema version a fully upgraded journal file carries.
pub fn latest_version() -> u32 {
    latest_of(SCHEMA_STEPS)
}

/// Brings `conn` up to [`latest_version`].
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    upgrade(conn, SCHEMA_STEPS)
}

/// Reads `PRAGMA user_version`.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

fn latest_of(steps: &[SchemaStep]) -> u32 {
    steps.last().map_or(0, |step| step.version)
}

fn upgrade(conn: &mut Connection, steps: &[SchemaStep]) -> DbResult<()> {
    let from = current_user_version(conn)?;
    let latest = latest_of(steps);
    if from > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: latest,
        });
    }

    let pending: Vec<&SchemaStep> = steps.iter().filter(|step| step.version > from).collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in pending {
        run_step(&tx, step)?;
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={}",
        from, latest
    );
    Ok(())
}

fn run_step(tx: &Transaction<'_>, step: &SchemaStep) -> DbResult<()> {
    tx.execute_batch(step.sql)
        .and_then(|()| tx.pragma_update(None, "user_version", step.version))
        .map_err(|source| {
            error!(
                "event=db_migrate module=db status=error version={} step={}",
                step.version, step.name
            );
            DbError::Migration {
                version: step.version,
                name: step.name,
                source,
            }
        })
}
