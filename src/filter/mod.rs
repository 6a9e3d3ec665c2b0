//! Bubble filters: passes that collapse regions of a graph into bubble nodes.
//!
//! Every pass reads an input graph whose levels are current and builds a new
//! output graph; the input is never modified. The output keeps every node that
//! was not absorbed (same id, cloned) and adds one node per bubble. Its edges
//! are the input edges mapped onto the new nodes, so a neighbour that was
//! absorbed is reached through the bubble that absorbed it.

pub mod graph_bubble;
pub mod mutation;
pub mod phylo;

use log::{debug, info};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

use crate::graph::SequenceGraph;
use crate::node::{BubbleKind, GraphNode};
use crate::order::assign_levels;
use crate::phylo::{PhyloIdx, PhyloTree};
use crate::NodeId;

pub use graph_bubble::graph_bubbles;
pub use mutation::{indels, point_mutations, straight_sequences};
pub use phylo::{is_shared, phylo_bubbles};

/// Hands out bubble ids, counting down from below every id already in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BubbleIds {
    next: NodeId,
}

impl Default for BubbleIds {
    fn default() -> Self {
        BubbleIds { next: -1 }
    }
}

impl BubbleIds {
    pub fn new() -> Self {
        BubbleIds::default()
    }

    /// Counter whose ids cannot collide with any node of `graph`, nested ones included.
    pub fn below(graph: &SequenceGraph) -> Self {
        let min = graph.owner_index().keys().copied().min().unwrap_or(0);
        BubbleIds {
            next: min.min(0) - 1,
        }
    }

    pub fn next_id(&mut self) -> NodeId {
        let id = self.next;
        self.next -= 1;
        id
    }
}

/// Which passes run, and their parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterConfig {
    /// Shortest run of nodes collapsed into a straight-sequence bubble.
    pub min_straight_run: usize,
    pub point_mutations: bool,
    pub indels: bool,
    pub straight_sequences: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            min_straight_run: 3,
            point_mutations: true,
            indels: true,
            straight_sequences: true,
        }
    }
}

/// Input snapshot plus the bubbles built from it during one pass.
pub(crate) struct BubbleBuilder<'a> {
    input: &'a SequenceGraph,
    ids: &'a mut BubbleIds,
    absorbed: FxHashMap<NodeId, NodeId>,
    bubbles: Vec<GraphNode>,
}

impl<'a> BubbleBuilder<'a> {
    pub(crate) fn new(input: &'a SequenceGraph, ids: &'a mut BubbleIds) -> Self {
        BubbleBuilder {
            input,
            ids,
            absorbed: FxHashMap::default(),
            bubbles: Vec::new(),
        }
    }

    pub(crate) fn is_absorbed(&self, id: NodeId) -> bool {
        self.absorbed.contains_key(&id)
    }

    /// Wrap the input nodes `members` into a new bubble.
    pub(crate) fn wrap(&mut self, kind: BubbleKind, members: &[NodeId]) -> Option<NodeId> {
        let children = members
            .iter()
            .filter_map(|id| self.input.node(*id).cloned())
            .collect();
        self.wrap_with(kind, members, children)
    }

    /// Absorb the input nodes `members` into a new bubble holding `children`.
    /// An empty member list creates nothing.
    pub(crate) fn wrap_with(
        &mut self,
        kind: BubbleKind,
        members: &[NodeId],
        children: Vec<GraphNode>,
    ) -> Option<NodeId> {
        if members.is_empty() || children.is_empty() {
            debug!("Skipping empty {} bubble", kind.name());
            return None;
        }
        let id = self.ids.next_id();
        for &member in members {
            self.absorbed.insert(member, id);
        }
        self.bubbles.push(GraphNode::bubble(id, kind, children));
        Some(id)
    }

    pub(crate) fn bubble_count(&self) -> usize {
        self.bubbles.len()
    }

    /// Build the output graph: surviving input nodes, the new bubbles and the
    /// input edges mapped onto them.
    pub(crate) fn finish(self) -> SequenceGraph {
        let owner = |id: NodeId| self.absorbed.get(&id).copied().unwrap_or(id);

        let mut nodes: FxHashMap<NodeId, GraphNode> = FxHashMap::default();
        for node in self.input.nodes() {
            if !self.absorbed.contains_key(&node.id) {
                let mut copy = node.clone();
                copy.in_edges.clear();
                copy.out_edges.clear();
                nodes.insert(copy.id, copy);
            }
        }
        for bubble in self.bubbles {
            nodes.insert(bubble.id, bubble);
        }

        for node in self.input.nodes() {
            let from = owner(node.id);
            for &child in &node.out_edges {
                let to = owner(child);
                if from == to {
                    continue;
                }
                if let Some(n) = nodes.get_mut(&from) {
                    n.out_edges.insert(to);
                }
                if let Some(n) = nodes.get_mut(&to) {
                    n.in_edges.insert(from);
                }
            }
        }

        SequenceGraph::from_nodes(nodes.into_values().collect(), self.input.genomes().clone())
    }
}

/// Node ids sorted by `(level, id)`.
pub(crate) fn level_order(graph: &SequenceGraph) -> Vec<NodeId> {
    let mut ids: Vec<NodeId> = graph.ids();
    ids.sort_by_key(|id| (graph.node(*id).map_or(0, |n| n.level), *id));
    ids
}

/// Whether collapsing `members` into one node would close a cycle, i.e. some
/// node outside the group is both reachable from it and reaches back into it.
///
/// Levels must be current: nodes above the highest member level cannot lead
/// back into the group, which bounds the search.
pub(crate) fn closes_cycle(graph: &SequenceGraph, members: &FxHashSet<NodeId>) -> bool {
    let max_level = members
        .iter()
        .filter_map(|id| graph.node(*id))
        .map(|n| n.level)
        .max()
        .unwrap_or(0);

    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    let mut queue: VecDeque<NodeId> = VecDeque::new();
    for id in members {
        if let Some(node) = graph.node(*id) {
            for child in &node.out_edges {
                if !members.contains(child) && seen.insert(*child) {
                    queue.push_back(*child);
                }
            }
        }
    }

    while let Some(id) = queue.pop_front() {
        let Some(node) = graph.node(id) else {
            continue;
        };
        if node.level > max_level {
            continue;
        }
        for child in &node.out_edges {
            if members.contains(child) {
                return true;
            }
            if seen.insert(*child) {
                queue.push_back(*child);
            }
        }
    }
    false
}

/// Full simplification: the structural pass (phylogenetic when a tree clade is
/// given, graph bubbles otherwise) followed by the point mutation, indel and
/// straight-sequence passes. Levels are recomputed after every pass.
pub fn simplify(
    input: &SequenceGraph,
    tree: Option<(&PhyloTree, PhyloIdx)>,
    ids: &mut BubbleIds,
    config: &FilterConfig,
) -> SequenceGraph {
    let mut graph = input.clone();
    assign_levels(&mut graph);
    let before = graph.len();

    graph = match tree {
        Some((tree, clade)) => phylo_bubbles(&graph, tree, clade, ids),
        None => graph_bubbles(&graph, ids, None),
    };
    assign_levels(&mut graph);

    if config.point_mutations {
        graph = point_mutations(&graph, ids);
        assign_levels(&mut graph);
    }
    if config.indels {
        graph = indels(&graph, ids);
        assign_levels(&mut graph);
    }
    if config.straight_sequences {
        graph = straight_sequences(&graph, ids, config.min_straight_run);
        assign_levels(&mut graph);
    }

    info!("Simplified {} nodes into {}", before, graph.len());
    graph
}
