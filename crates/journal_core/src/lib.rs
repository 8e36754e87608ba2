//! Core of the block journal: a SQLite-backed store of blocks linked into an
//! acyclic hierarchy, with derived references, metadata, full-text search and
//! graph export.

pub mod config;
pub mod db;
pub mod graph;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use config::{ConfigError, JournalConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use graph::render::{
    DotRenderer, GraphRenderer, GraphvizRenderer, RenderEdge, RenderError, RenderGraph, RenderNode,
};
pub use graph::{
    EdgeDirection, EdgeKind, Graph, GraphEdge, GraphQuery, MaxDistance, RichEdge, RichGraph,
    RichNode, TraversalQuery,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::block::{Backlink, Block, BlockId, Link, LinkType, Reference};
pub use repo::block_repo::{BlockListQuery, RepoError, RepoResult};
pub use search::fts::{search_all, SearchError, SearchHit, SearchQuery, SearchResult};
pub use service::journal::{Journal, JournalError, JournalResult, DEFAULT_CYCLE_CHECK_BUDGET};
pub use service::references::extract_reference_names;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
