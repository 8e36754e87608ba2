//! Block, link and reference records.
//!
//! # Invariants
//! - `id` never changes after creation.
//! - `created_at` is fixed at insertion; `updated_at` moves on every edit.
//! - Block type labels are stored exactly as given.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque block identifier. Generated ids are UUID v4 text, caller ids are
/// accepted verbatim.
pub type BlockId = String;

/// Content-bearing node in the graph store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub content: String,
    /// Free-form category label, serialized as `type`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

/// Generates a fresh block id.
pub fn generate_block_id() -> BlockId {
    Uuid::new_v4().to_string()
}

/// Link kind. Only tree links exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Direct,
}

impl LinkType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "direct" => Some(Self::Direct),
            _ => None,
        }
    }
}

/// Directed parent -> child tree edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub source_id: BlockId,
    pub target_id: BlockId,
    #[serde(rename = "type")]
    pub kind: LinkType,
    pub created_at: i64,
}

/// Directed mention edge extracted from `[[name]]` markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub source_id: BlockId,
    pub target_id: BlockId,
    /// Marker text that produced this reference.
    pub context: String,
    pub created_at: i64,
}

/// A reference seen from its target: the referencing block plus marker text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backlink {
    pub block: Block,
    pub context: String,
}

#[cfg(test)]
mod tests {
    use super::{generate_block_id, LinkType};

    #[test]
    fn generated_ids_are_unique_uuids() {
        let first = generate_block_id();
        let second = generate_block_id();
        assert_ne!(first, second);
        assert!(uuid::Uuid::parse_str(&first).is_ok());
    }

    #[test]
    fn link_type_parses_its_own_label() {
        assert_eq!(LinkType::parse(LinkType::Direct.as_str()), Some(LinkType::Direct));
        assert_eq!(LinkType::parse("weak"), None);
    }
}
