//! Longest-path levelling of a node graph and the ordered result type.

use log::{debug, warn};
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::filter::{BubbleIds, FilterConfig};
use crate::graph::SequenceGraph;
use crate::node::GraphNode;
use crate::phylo::PhyloTree;
use crate::NodeId;

/// Position of every sequence node in a reference view, used to break level ties.
pub type LeafRank = FxHashMap<NodeId, usize>;

/// Assign every node reachable from the roots its level and return the nodes
/// sorted by `(level, id)`.
///
/// Roots start at level 0 and every other node sits at
/// `max(level(parent) + size(parent))` over its in-edges. A node is levelled
/// once all of its in-edges have been reached, so nodes on a cycle are never
/// levelled and are left out of the returned order.
pub fn assign_levels(graph: &mut SequenceGraph) -> Vec<NodeId> {
    assign_levels_ranked(graph, None)
}

/// Like [`assign_levels`], breaking level ties by the smallest rank of a
/// node's sequence nodes before falling back to the id.
pub fn assign_levels_ranked(graph: &mut SequenceGraph, rank: Option<&LeafRank>) -> Vec<NodeId> {
    let mut reached: FxHashMap<NodeId, usize> = FxHashMap::default();
    let mut levelled: Vec<NodeId> = Vec::with_capacity(graph.len());

    let mut frontier: Vec<NodeId> = graph.roots().iter().copied().collect();
    for &id in &frontier {
        if let Some(node) = graph.node_mut(id) {
            node.level = 0;
        }
    }

    while !frontier.is_empty() {
        let mut next = Vec::new();
        for &id in &frontier {
            levelled.push(id);
            let Some(node) = graph.node(id) else {
                continue;
            };
            for &child in &node.out_edges {
                let count = reached.entry(child).or_insert(0);
                *count += 1;
                let in_degree = graph.node(child).map_or(0, |c| c.in_edges.len());
                if *count == in_degree {
                    next.push(child);
                }
            }
        }

        for &id in &next {
            let level = graph.node(id).map_or(0, |node| {
                node.in_edges
                    .iter()
                    .filter_map(|p| graph.node(*p))
                    .map(|p| p.level + p.size())
                    .max()
                    .unwrap_or(0)
            });
            if let Some(node) = graph.node_mut(id) {
                node.level = level;
            }
        }
        frontier = next;
    }

    if levelled.len() < graph.len() {
        warn!(
            "{} of {} nodes never reached their full in-degree (cycle?) and were not ordered",
            graph.len() - levelled.len(),
            graph.len()
        );
    }

    sort_by_level(graph, &mut levelled, rank);
    debug!("Ordered {} nodes", levelled.len());
    levelled
}

fn sort_by_level(graph: &SequenceGraph, ids: &mut [NodeId], rank: Option<&LeafRank>) {
    let tie_break = |id: NodeId| -> usize {
        match (rank, graph.node(id)) {
            (Some(rank), Some(node)) => {
                let mut best = usize::MAX;
                node.for_each_leaf(&mut |leaf| {
                    if let Some(&r) = rank.get(&leaf.id) {
                        best = best.min(r);
                    }
                });
                best
            }
            _ => 0,
        }
    };
    ids.sort_by_cached_key(|&id| {
        let level = graph.node(id).map_or(0, |n| n.level);
        (level, tie_break(id), id)
    });
}

/// A simplified, levelled graph as handed to the rendering layer.
///
/// Besides the displayed top-level nodes it keeps the sequence-level graph the
/// simplification started from, so that zooming into a bubble can rebuild the
/// edges of the re-expanded nodes.
#[derive(Debug, Clone)]
pub struct OrderedGraph {
    pub graph: SequenceGraph,
    pub order: Vec<NodeId>,
    pub(crate) source: Arc<SequenceGraph>,
    pub(crate) tree: Option<Arc<PhyloTree>>,
    pub(crate) ids: BubbleIds,
    pub(crate) rank: Option<Arc<LeafRank>>,
    pub(crate) config: FilterConfig,
    /// Bubbles replaced by their interior, most recent last.
    pub(crate) popped: Vec<GraphNode>,
}

impl OrderedGraph {
    pub(crate) fn new(
        graph: SequenceGraph,
        source: Arc<SequenceGraph>,
        tree: Option<Arc<PhyloTree>>,
        ids: BubbleIds,
        rank: Option<Arc<LeafRank>>,
        config: FilterConfig,
    ) -> Self {
        let mut ordered = OrderedGraph {
            graph,
            order: Vec::new(),
            source,
            tree,
            ids,
            rank,
            config,
            popped: Vec::new(),
        };
        ordered.reorder();
        ordered
    }

    /// Recompute levels and the node order after the graph changed.
    pub fn reorder(&mut self) {
        self.order = assign_levels_ranked(&mut self.graph, self.rank.as_deref());
    }

    /// Nodes in display order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.order.iter().filter_map(|id| self.graph.node(*id))
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.graph.node(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The sequence-level graph this view was simplified from.
    pub fn source(&self) -> &SequenceGraph {
        &self.source
    }

    /// The pruned tree driving phylogenetic bubbles, if any.
    pub fn tree(&self) -> Option<&PhyloTree> {
        self.tree.as_deref()
    }

    /// Bubbles that were zoomed into and can be collapsed again.
    pub fn popped(&self) -> &[GraphNode] {
        &self.popped
    }

    /// Rank of every sequence node: the display position of the top-level
    /// node containing it.
    pub fn leaf_rank(&self) -> LeafRank {
        let mut rank = LeafRank::default();
        for (position, node) in self.nodes().enumerate() {
            node.for_each_leaf(&mut |leaf| {
                rank.insert(leaf.id, position);
            });
        }
        rank
    }
}
