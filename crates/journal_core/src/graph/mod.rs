//! Graph traversal and export.
//!
//! # Responsibility
//! - Breadth-first connectivity queries over links and references.
//! - Assemble node/edge sets for export and hand them to a renderer.
//!
//! # Invariants
//! - Every returned edge has both endpoints in the returned node set.
//! - Traversals never revisit a block.

pub mod render;
pub mod traversal;

use crate::model::block::{Block, BlockId};
use crate::repo::block_repo::BlockListQuery;
use serde::{Deserialize, Serialize};

/// Hop limit for traversals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxDistance {
    #[default]
    Unbounded,
    Hops(u32),
}

impl MaxDistance {
    /// Whether a node found at `depth` may be expanded further.
    pub fn can_expand(self, depth: u32) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Hops(limit) => depth < limit,
        }
    }
}

/// Negative values mean unbounded, matching the `-1` convention of callers.
impl From<i64> for MaxDistance {
    fn from(value: i64) -> Self {
        if value < 0 {
            Self::Unbounded
        } else {
            Self::Hops(u32::try_from(value).unwrap_or(u32::MAX))
        }
    }
}

/// Options for [`crate::Journal::get_connected_blocks`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalQuery {
    pub max_distance: MaxDistance,
    /// Only return blocks of this type.
    pub kind: Option<String>,
    /// Only return blocks updated at or after this epoch ms.
    pub since: Option<i64>,
    /// Also walk reference edges in both directions.
    pub include_references: bool,
}

impl TraversalQuery {
    pub(crate) fn filter(&self) -> BlockListQuery {
        BlockListQuery {
            kind: self.kind.clone(),
            since: self.since,
        }
    }
}

/// Options for [`crate::Journal::get_graph`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphQuery {
    pub max_distance: MaxDistance,
    pub kind: Option<String>,
    pub since: Option<i64>,
}

impl GraphQuery {
    pub(crate) fn filter(&self) -> BlockListQuery {
        BlockListQuery {
            kind: self.kind.clone(),
            since: self.since,
        }
    }
}

/// Edge family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Link,
    Reference,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: BlockId,
    pub target: BlockId,
    pub kind: EdgeKind,
}

/// Node set plus deduplicated edges among those nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Block>,
    pub edges: Vec<GraphEdge>,
}

/// Edge direction relative to the node being expanded when it was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeDirection {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichNode {
    pub block: Block,
    /// Shallowest hop count from any start block.
    pub depth: u32,
    pub child_count: usize,
    pub parent_count: usize,
    /// Outgoing references.
    pub reference_count: usize,
    /// Incoming references.
    pub backlink_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichEdge {
    pub source: BlockId,
    pub target: BlockId,
    pub kind: EdgeKind,
    pub direction: EdgeDirection,
}

/// Multi-start traversal result with per-node annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichGraph {
    /// Start ids that exist, in request order.
    pub start_ids: Vec<BlockId>,
    /// Ordered by depth, then discovery.
    pub nodes: Vec<RichNode>,
    pub edges: Vec<RichEdge>,
}

impl RichGraph {
    pub fn node(&self, id: &str) -> Option<&RichNode> {
        self.nodes.iter().find(|node| node.block.id == id)
    }
}
