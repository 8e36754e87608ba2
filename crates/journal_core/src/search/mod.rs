//! Full-text search entry points.
//!
//! # Responsibility
//! - Keep the denormalized `blocks_fts` copy in step with block writes.
//! - Expose ranked query APIs backed by the SQLite FTS5 index.

pub mod fts;
