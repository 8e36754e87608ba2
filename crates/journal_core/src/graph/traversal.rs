//! Breadth-first traversal engine.

use crate::graph::{
    EdgeDirection, EdgeKind, Graph, GraphEdge, GraphQuery, MaxDistance, RichEdge, RichGraph,
    RichNode, TraversalQuery,
};
use crate::model::block::{Block, BlockId};
use crate::repo::block_repo::BlockRepository;
use crate::repo::link_repo::LinkRepository;
use crate::repo::reference_repo::ReferenceRepository;
use crate::service::journal::{Journal, JournalResult};
use log::debug;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

impl Journal<'_> {
    /// Blocks reachable from `start_id` over tree children and, optionally,
    /// references in both directions.
    ///
    /// Type/since filters select which discovered blocks are returned; the
    /// walk still passes through blocks that fail them. The start block is
    /// never part of the result.
    pub fn get_connected_blocks(
        &self,
        start_id: &str,
        query: &TraversalQuery,
    ) -> JournalResult<Vec<Block>> {
        if !self.block_exists(start_id)? {
            return Ok(Vec::new());
        }

        let include_references = query.include_references;
        let discovered = self.breadth_first(start_id, query.max_distance, |id| {
            let mut next = self.links.child_ids(id)?;
            if include_references {
                next.extend(self.references.referenced_ids(id)?);
                next.extend(self.references.referencing_ids(id)?);
            }
            Ok(next)
        })?;

        let filter = query.filter();
        let mut blocks = self.load_in_order(&discovered)?;
        blocks.retain(|block| filter.matches(block));
        Ok(blocks)
    }

    /// Node/edge export of the whole store (no root) or of the tree below
    /// `root_id`.
    ///
    /// Edges are links and references whose endpoints are both in the node
    /// set. Returns an empty graph for an unknown root.
    pub fn get_graph(&self, root_id: Option<&str>, query: &GraphQuery) -> JournalResult<Graph> {
        let filter = query.filter();
        let nodes = match root_id {
            None => self.blocks.list_blocks(&filter)?,
            Some(root_id) => {
                let Some(root) = self.blocks.get_block(root_id)? else {
                    return Ok(Graph::default());
                };
                let discovered = self.breadth_first(root_id, query.max_distance, |id| {
                    Ok(self.links.child_ids(id)?)
                })?;
                let mut nodes = vec![root];
                nodes.extend(
                    self.load_in_order(&discovered)?
                        .into_iter()
                        .filter(|block| filter.matches(block)),
                );
                nodes
            }
        };

        let node_ids: HashSet<&str> = nodes.iter().map(|block| block.id.as_str()).collect();
        let mut edges = BTreeSet::new();
        for link in self.links.list_links()? {
            if node_ids.contains(link.source_id.as_str())
                && node_ids.contains(link.target_id.as_str())
            {
                edges.insert(GraphEdge {
                    source: link.source_id,
                    target: link.target_id,
                    kind: EdgeKind::Link,
                });
            }
        }
        for reference in self.references.list_references()? {
            if node_ids.contains(reference.source_id.as_str())
                && node_ids.contains(reference.target_id.as_str())
            {
                edges.insert(GraphEdge {
                    source: reference.source_id,
                    target: reference.target_id,
                    kind: EdgeKind::Reference,
                });
            }
        }

        debug!(
            "event=graph_export module=graph status=ok nodes={} edges={}",
            nodes.len(),
            edges.len()
        );
        Ok(Graph {
            nodes,
            edges: edges.into_iter().collect(),
        })
    }

    /// Multi-start traversal over links in both directions and, optionally,
    /// references in both directions.
    ///
    /// Nodes reached from several starts keep the shallowest depth. Unknown
    /// start ids are skipped.
    pub fn get_rich_graph<I, S>(
        &self,
        start_ids: I,
        max_distance: MaxDistance,
        include_references: bool,
    ) -> JournalResult<RichGraph>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut starts: Vec<BlockId> = Vec::new();
        let mut depths: HashMap<BlockId, u32> = HashMap::new();
        let mut discovery: Vec<BlockId> = Vec::new();
        let mut edge_keys: HashSet<(BlockId, BlockId, EdgeKind)> = HashSet::new();
        let mut edges: Vec<RichEdge> = Vec::new();

        for start in start_ids {
            let start = start.as_ref();
            if starts.iter().any(|seen| seen == start) || !self.block_exists(start)? {
                continue;
            }
            starts.push(start.to_string());
            record_depth(&mut depths, &mut discovery, start, 0);

            let mut visited = HashSet::from([start.to_string()]);
            let mut queue = VecDeque::from([(start.to_string(), 0_u32)]);
            while let Some((current, depth)) = queue.pop_front() {
                if !max_distance.can_expand(depth) {
                    continue;
                }
                for (neighbor, edge) in self.rich_neighbors(&current, include_references)? {
                    if edge_keys.insert((edge.source.clone(), edge.target.clone(), edge.kind)) {
                        edges.push(edge);
                    }
                    if visited.insert(neighbor.clone()) {
                        record_depth(&mut depths, &mut discovery, &neighbor, depth + 1);
                        queue.push_back((neighbor, depth + 1));
                    }
                }
            }
        }

        let mut nodes = Vec::with_capacity(discovery.len());
        for block in self.load_in_order(&discovery)? {
            let depth = depths.get(&block.id).copied().unwrap_or_default();
            nodes.push(RichNode {
                child_count: self.links.child_ids(&block.id)?.len(),
                parent_count: self.links.parent_ids(&block.id)?.len(),
                reference_count: self.references.referenced_ids(&block.id)?.len(),
                backlink_count: self.references.referencing_ids(&block.id)?.len(),
                depth,
                block,
            });
        }
        // Stable sort keeps discovery order within one depth.
        nodes.sort_by_key(|node| node.depth);

        Ok(RichGraph {
            start_ids: starts,
            nodes,
            edges,
        })
    }

    fn rich_neighbors(
        &self,
        id: &str,
        include_references: bool,
    ) -> JournalResult<Vec<(BlockId, RichEdge)>> {
        let mut neighbors = Vec::new();
        for child in self.links.child_ids(id)? {
            neighbors.push(outgoing(id, child, EdgeKind::Link));
        }
        for parent in self.links.parent_ids(id)? {
            neighbors.push(incoming(parent, id, EdgeKind::Link));
        }
        if include_references {
            for target in self.references.referenced_ids(id)? {
                neighbors.push(outgoing(id, target, EdgeKind::Reference));
            }
            for source in self.references.referencing_ids(id)? {
                neighbors.push(incoming(source, id, EdgeKind::Reference));
            }
        }
        Ok(neighbors)
    }

    /// Ids discovered from `start_id` in BFS order, excluding the start.
    fn breadth_first<F>(
        &self,
        start_id: &str,
        max_distance: MaxDistance,
        expand: F,
    ) -> JournalResult<Vec<BlockId>>
    where
        F: Fn(&str) -> JournalResult<Vec<BlockId>>,
    {
        let mut visited = HashSet::from([start_id.to_string()]);
        let mut queue = VecDeque::from([(start_id.to_string(), 0_u32)]);
        let mut discovered = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if !max_distance.can_expand(depth) {
                continue;
            }
            for next in expand(&current)? {
                if visited.insert(next.clone()) {
                    discovered.push(next.clone());
                    queue.push_back((next, depth + 1));
                }
            }
        }

        Ok(discovered)
    }

    fn load_in_order(&self, ids: &[BlockId]) -> JournalResult<Vec<Block>> {
        let mut by_id: HashMap<BlockId, Block> = self
            .blocks
            .get_blocks(ids)?
            .into_iter()
            .map(|block| (block.id.clone(), block))
            .collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }
}

fn record_depth(
    depths: &mut HashMap<BlockId, u32>,
    discovery: &mut Vec<BlockId>,
    id: &str,
    depth: u32,
) {
    match depths.get_mut(id) {
        Some(current) => *current = (*current).min(depth),
        None => {
            depths.insert(id.to_string(), depth);
            discovery.push(id.to_string());
        }
    }
}

fn outgoing(from: &str, to: BlockId, kind: EdgeKind) -> (BlockId, RichEdge) {
    let edge = RichEdge {
        source: from.to_string(),
        target: to.clone(),
        kind,
        direction: EdgeDirection::Outgoing,
    };
    (to, edge)
}

fn incoming(from: BlockId, to: &str, kind: EdgeKind) -> (BlockId, RichEdge) {
    let edge = RichEdge {
        source: from.clone(),
        target: to.to_string(),
        kind,
        direction: EdgeDirection::Incoming,
    };
    (from, edge)
}
