//! Reference extraction and backlinks.
//!
//! # Responsibility
//! - Parse `[[name]]` markers out of block content.
//! - Resolve markers to blocks by content substring and persist the edges.
//!
//! # Invariants
//! - Resolution is best-effort: every block whose content contains the
//!   marker name is a target, except the referencing block itself.
//! - Markers with no match yield no rows and no error.

use crate::model::block::{Backlink, Block, Reference};
use crate::repo::block_repo::BlockRepository;
use crate::repo::reference_repo::ReferenceRepository;
use crate::service::journal::{Journal, JournalResult};
use once_cell::sync::Lazy;
use regex::Regex;

static REFERENCE_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\[\]]+)\]\]").expect("valid reference marker regex"));

/// Returns distinct, trimmed marker names in first-seen order.
pub fn extract_reference_names(content: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for capture in REFERENCE_MARKER_RE.captures_iter(content) {
        let name = capture[1].trim();
        if name.is_empty() || names.iter().any(|seen| seen == name) {
            continue;
        }
        names.push(name.to_string());
    }
    names
}

impl Journal<'_> {
    /// Derives and stores outgoing references for `block`. Returns the number
    /// of rows created.
    pub(crate) fn derive_references(&self, block: &Block) -> JournalResult<usize> {
        let mut created = 0;
        for name in extract_reference_names(&block.content) {
            for target_id in self.blocks.find_ids_containing(&name, &block.id)? {
                if self
                    .references
                    .insert_reference(&block.id, &target_id, &name)?
                {
                    created += 1;
                }
            }
        }
        Ok(created)
    }

    /// Blocks referencing `id`, each with the marker text that matched.
    pub fn get_backlinks(&self, id: &str) -> JournalResult<Vec<Backlink>> {
        Ok(self.references.backlinks(id)?)
    }

    /// References originating at `id`.
    pub fn get_references(&self, id: &str) -> JournalResult<Vec<Reference>> {
        Ok(self.references.outgoing(id)?)
    }
}
