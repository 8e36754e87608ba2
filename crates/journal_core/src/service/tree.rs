//! Tree operations over direct links.
//!
//! # Responsibility
//! - Link, unlink and move blocks while keeping the link graph acyclic.
//! - Navigate parents, children, siblings and ancestors.
//!
//! # Invariants
//! - A link `parent -> child` is only inserted when `parent` is not reachable
//!   from `child`.
//! - Navigation treats the first parent (by link insertion) as the parent.
//! - Rejected links and moves leave the graph unchanged.

use crate::model::block::{Block, BlockId};
use crate::repo::link_repo::LinkRepository;
use crate::service::journal::{Journal, JournalResult};
use log::{debug, info, warn};
use std::collections::HashSet;

impl Journal<'_> {
    /// Links `child` under `parent`.
    ///
    /// Returns `false` without writing when either block is missing or the
    /// link would close a cycle. Linking an already-linked pair returns
    /// `true`.
    pub fn link_blocks(&self, parent_id: &str, child_id: &str) -> JournalResult<bool> {
        let tx = self.begin_write()?;
        if !self.link_allowed(parent_id, child_id)? {
            return Ok(false);
        }
        self.links.insert_link(parent_id, child_id)?;
        tx.commit()?;
        Ok(true)
    }

    /// Removes one link. Returns `false` when it did not exist.
    pub fn unlink_blocks(&self, parent_id: &str, child_id: &str) -> JournalResult<bool> {
        Ok(self.links.delete_link(parent_id, child_id)?)
    }

    /// Direct children in link insertion order.
    pub fn get_children(&self, id: &str) -> JournalResult<Vec<Block>> {
        Ok(self.links.children(id)?)
    }

    /// First parent of `id`, if any.
    pub fn get_parent(&self, id: &str) -> JournalResult<Option<Block>> {
        Ok(self.links.parents(id)?.into_iter().next())
    }

    /// Other children of the parent of `id`. Empty for parentless blocks.
    pub fn get_siblings(&self, id: &str) -> JournalResult<Vec<Block>> {
        let Some(parent) = self.get_parent(id)? else {
            return Ok(Vec::new());
        };
        let mut siblings = self.links.children(&parent.id)?;
        siblings.retain(|block| block.id != id);
        Ok(siblings)
    }

    /// Ancestors of `id` ordered root first. The block itself is excluded.
    pub fn get_ancestors(&self, id: &str) -> JournalResult<Vec<Block>> {
        let mut ancestors = Vec::new();
        let mut visited = HashSet::from([id.to_string()]);
        let mut cursor = self.get_parent(id)?;

        while let Some(parent) = cursor {
            if !visited.insert(parent.id.clone()) {
                warn!("event=ancestors module=tree status=stopped reason=revisit");
                break;
            }
            cursor = self.get_parent(&parent.id)?;
            ancestors.push(parent);
        }

        ancestors.reverse();
        Ok(ancestors)
    }

    /// Re-parents `id` under `new_parent_id`.
    ///
    /// All existing incoming links of `id` are replaced by one link from
    /// `new_parent_id`. Returns `false` and leaves the graph unchanged when a
    /// block is missing or the move would create a cycle.
    pub fn move_block(&self, id: &str, new_parent_id: &str) -> JournalResult<bool> {
        let tx = self.begin_write()?;
        if !self.link_allowed(new_parent_id, id)? {
            return Ok(false);
        }

        let detached = self.links.delete_incoming(id)?;
        self.links.insert_link(new_parent_id, id)?;
        tx.commit()?;

        info!(
            "event=block_move module=tree status=ok block_id={} new_parent_id={} detached={}",
            id, new_parent_id, detached
        );
        Ok(true)
    }

    /// Creates a block linked under `parent_id`. Returns `None` when the
    /// parent does not exist.
    pub fn create_child_block(
        &self,
        parent_id: &str,
        content: &str,
        kind: &str,
        id: Option<&str>,
    ) -> JournalResult<Option<BlockId>> {
        let tx = self.begin_write()?;
        if !self.block_exists(parent_id)? {
            return Ok(None);
        }
        let child = self.insert_new_block(content, kind, id)?;
        self.links.insert_link(parent_id, &child.id)?;
        tx.commit()?;
        Ok(Some(child.id))
    }

    /// Creates a block under the parent of `sibling_id`. Returns `None` when
    /// `sibling_id` has no parent.
    pub fn create_sibling_block(
        &self,
        sibling_id: &str,
        content: &str,
        kind: &str,
        id: Option<&str>,
    ) -> JournalResult<Option<BlockId>> {
        let Some(parent) = self.get_parent(sibling_id)? else {
            return Ok(None);
        };
        self.create_child_block(&parent.id, content, kind, id)
    }

    fn link_allowed(&self, parent_id: &str, child_id: &str) -> JournalResult<bool> {
        if !self.block_exists(parent_id)? || !self.block_exists(child_id)? {
            debug!("event=link module=tree status=rejected reason=missing_block");
            return Ok(false);
        }
        if self.would_create_cycle(child_id, parent_id)? {
            info!(
                "event=link module=tree status=rejected reason=cycle parent_id={} child_id={}",
                parent_id, child_id
            );
            return Ok(false);
        }
        Ok(true)
    }

    /// Returns whether `end_id` is reachable from `start_id` over links.
    ///
    /// Exhausting the visit budget counts as reachable.
    pub(crate) fn would_create_cycle(&self, start_id: &str, end_id: &str) -> JournalResult<bool> {
        let mut visited: HashSet<BlockId> = HashSet::new();
        let mut stack = vec![start_id.to_string()];

        while let Some(current) = stack.pop() {
            if current == end_id {
                return Ok(true);
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            if visited.len() > self.cycle_check_budget {
                warn!(
                    "event=cycle_check module=tree status=aborted reason=budget_exhausted budget={}",
                    self.cycle_check_budget
                );
                return Ok(true);
            }

            for child in self.links.child_ids(&current)? {
                if !visited.contains(&child) {
                    stack.push(child);
                }
            }
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::open_db_in_memory;
    use crate::service::journal::Journal;

    #[test]
    fn self_link_is_a_cycle() {
        let conn = open_db_in_memory().unwrap();
        let journal = Journal::try_new(&conn).unwrap();
        let a = journal.create_block("a", "note", None).unwrap();

        assert!(!journal.link_blocks(&a, &a).unwrap());
        assert!(journal.get_children(&a).unwrap().is_empty());
    }

    #[test]
    fn exhausted_budget_refuses_link() {
        let conn = open_db_in_memory().unwrap();
        let journal = Journal::try_new(&conn)
            .unwrap()
            .with_cycle_check_budget(2);
        let ids: Vec<_> = (0..5)
            .map(|i| journal.create_block(&format!("n{i}"), "note", None).unwrap())
            .collect();
        for pair in ids.windows(2) {
            assert!(journal.link_blocks(&pair[0], &pair[1]).unwrap());
        }
        let outsider = journal.create_block("outsider", "note", None).unwrap();

        assert!(!journal.link_blocks(&outsider, &ids[0]).unwrap());
        assert!(journal.get_parent(&ids[0]).unwrap().is_none());
    }
}
