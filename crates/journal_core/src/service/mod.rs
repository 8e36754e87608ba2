//! Journal use-case layer.
//!
//! # Responsibility
//! - Orchestrate repository calls into block store, tree and reference
//!   operations.
//! - Keep callers decoupled from SQL and transaction details.

pub mod journal;
pub mod references;
pub mod tree;
