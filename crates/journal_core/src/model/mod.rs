//! Journal domain model.
//!
//! # Responsibility
//! - Define the block/link/reference records shared by store and graph code.
//!
//! # Invariants
//! - Every block is identified by an opaque, immutable `BlockId`.
//! - Links describe tree structure; references are content-derived and
//!   independent from the tree.

pub mod block;
