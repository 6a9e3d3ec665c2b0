//! Vertical layout of an ordered graph and overlap marking between two graphs.
//!
//! Heights are computed in fixed point: the full height is
//! [`VERTICAL_PRECISION`] units and every slot is an integer interval of it,
//! so repeated subdivision down long graphs does not drift.

use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::graph::SequenceGraph;
use crate::node::{ChildLayout, GraphNode, NodeKind};
use crate::NodeId;

pub const VERTICAL_PRECISION: u64 = 1_000_000_000;

type Slot = (u64, u64);

struct ScopeNode {
    id: NodeId,
    children: Vec<NodeId>,
    root: bool,
    genomes: usize,
}

/// Lay out the top-level nodes of `graph`, visited in `order`, over the full
/// height, then place the interior of every bubble inside its slot.
pub fn align(graph: &mut SequenceGraph, order: &[NodeId]) {
    let scope: Vec<ScopeNode> = order
        .iter()
        .filter_map(|id| graph.node(*id))
        .map(|node| ScopeNode {
            id: node.id,
            children: node.out_edges.iter().copied().collect(),
            root: node.in_edges.is_empty(),
            genomes: node.genomes.len(),
        })
        .collect();
    let slots = assign_slots(&scope, (0, VERTICAL_PRECISION));

    for node in graph.nodes_mut() {
        let slot = slots.get(&node.id).copied().unwrap_or((0, VERTICAL_PRECISION));
        set_slot(node, slot);
        layout_children(node);
    }
    debug!("Aligned {} nodes", slots.len());
}

fn set_slot(node: &mut GraphNode, (lo, hi): Slot) {
    let precision = VERTICAL_PRECISION as f64;
    node.layout.relative_y = (lo + hi) as f64 / 2.0 / precision;
    node.layout.max_height = (hi - lo).max(1) as f64 / precision;
}

fn slot_of(node: &GraphNode) -> Slot {
    let precision = VERTICAL_PRECISION as f64;
    let half = node.layout.max_height / 2.0;
    let lo = ((node.layout.relative_y - half).max(0.0) * precision).round() as u64;
    let hi = ((node.layout.relative_y + half).min(1.0) * precision).round() as u64;
    (lo.min(VERTICAL_PRECISION), hi.clamp(lo + 1, VERTICAL_PRECISION.max(lo + 1)))
}

/// Split `[lo, hi)` into `parts` consecutive integer intervals.
fn split((lo, hi): Slot, parts: usize) -> Vec<Slot> {
    let width = hi - lo;
    let parts = parts.max(1) as u64;
    (0..parts)
        .map(|i| (lo + width * i / parts, lo + width * (i + 1) / parts))
        .collect()
}

fn hull(a: Option<Slot>, b: Slot) -> Slot {
    match a {
        Some((lo, hi)) => (lo.min(b.0), hi.max(b.1)),
        None => b,
    }
}

/// Give every scope node an interval of `range`.
///
/// Roots share the range equally. Each node splits its own interval equally
/// among its children in scope order, with the child carrying the most
/// genomes moved to the middle when there are more than two. A node reached
/// from several parents gets the hull of the pieces it received.
fn assign_slots(scope: &[ScopeNode], range: Slot) -> FxHashMap<NodeId, Slot> {
    let position: FxHashMap<NodeId, usize> =
        scope.iter().enumerate().map(|(i, n)| (n.id, i)).collect();
    let genomes: FxHashMap<NodeId, usize> = scope.iter().map(|n| (n.id, n.genomes)).collect();

    let mut slots: FxHashMap<NodeId, Slot> = FxHashMap::default();
    let roots: Vec<NodeId> = scope.iter().filter(|n| n.root).map(|n| n.id).collect();
    for (id, piece) in roots.iter().zip(split(range, roots.len())) {
        slots.insert(*id, piece);
    }

    for node in scope {
        let slot = *slots.entry(node.id).or_insert(range);

        let mut children: Vec<NodeId> = node
            .children
            .iter()
            .copied()
            .filter(|c| position.contains_key(c))
            .collect();
        if children.is_empty() {
            continue;
        }
        children.sort_by_key(|c| position[c]);
        if children.len() > 2 {
            let mut widest = 0;
            for (i, c) in children.iter().enumerate() {
                if genomes[c] > genomes[&children[widest]] {
                    widest = i;
                }
            }
            let middle = children.len() / 2;
            children.swap(widest, middle);
        }

        for (child, piece) in children.iter().zip(split(slot, children.len())) {
            let merged = hull(slots.get(child).copied(), piece);
            slots.insert(*child, merged);
        }
    }
    slots
}

/// Place the children of a bubble inside the bubble's own slot, following the
/// layout recorded when the bubble was built.
fn layout_children(node: &mut GraphNode) {
    let (y, height) = (node.layout.relative_y, node.layout.max_height);
    let slot = slot_of(node);
    let NodeKind::Bubble(bubble) = &mut node.kind else {
        return;
    };
    let count = bubble.children.len().max(1) as f64;

    match bubble.layout {
        ChildLayout::Stacked => {
            let top = y - height / 2.0;
            for (i, child) in bubble.children.iter_mut().enumerate() {
                child.layout.relative_y = top + (i as f64 + 0.5) * height / count;
                child.layout.max_height = height / count;
            }
        }
        ChildLayout::Flattened => {
            for child in bubble.children.iter_mut() {
                child.layout.relative_y = y;
                child.layout.max_height = height / 2.0;
            }
        }
        ChildLayout::Centered => {
            for child in bubble.children.iter_mut() {
                child.layout.relative_y = y;
                child.layout.max_height = height;
            }
        }
        ChildLayout::Nested => {
            let inside: FxHashSet<NodeId> = bubble.children.iter().map(|c| c.id).collect();
            let mut scope: Vec<ScopeNode> = bubble
                .children
                .iter()
                .map(|c| ScopeNode {
                    id: c.id,
                    children: c.out_edges.iter().copied().filter(|o| inside.contains(o)).collect(),
                    root: !c.in_edges.iter().any(|i| inside.contains(i)),
                    genomes: c.genomes.len(),
                })
                .collect();
            let levels: FxHashMap<NodeId, u64> =
                bubble.children.iter().map(|c| (c.id, c.level)).collect();
            scope.sort_by_key(|n| (levels[&n.id], n.id));

            let slots = assign_slots(&scope, slot);
            for child in bubble.children.iter_mut() {
                if let Some(s) = slots.get(&child.id) {
                    set_slot(child, *s);
                }
            }
        }
    }

    for child in bubble.children.iter_mut() {
        layout_children(child);
    }
}

/// Owned copy of which sequence nodes every node of a graph covers, so that
/// overlap can be computed while the graph itself is being laid out.
#[derive(Debug, Clone, Default)]
pub struct LeafSnapshot {
    covers: Vec<(NodeId, Vec<NodeId>)>,
    leaves: FxHashSet<NodeId>,
}

impl LeafSnapshot {
    pub fn capture(graph: &SequenceGraph) -> Self {
        fn walk(node: &GraphNode, snapshot: &mut LeafSnapshot) {
            let leaves = node.leaf_ids();
            if !node.is_bubble() {
                snapshot.leaves.insert(node.id);
            }
            snapshot.covers.push((node.id, leaves));
            for child in node.children() {
                walk(child, snapshot);
            }
        }

        let mut snapshot = LeafSnapshot::default();
        for node in graph.nodes() {
            walk(node, &mut snapshot);
        }
        snapshot
    }

    /// Ids of the nodes (at any depth) with a sequence node that also appears in `other`.
    pub fn overlapping_with(&self, other: &LeafSnapshot) -> FxHashSet<NodeId> {
        self.covering(&other.leaves)
    }

    /// Ids of the nodes (at any depth) covering at least one of `leaves`.
    pub fn covering(&self, leaves: &FxHashSet<NodeId>) -> FxHashSet<NodeId> {
        self.covers
            .iter()
            .filter(|(_, covered)| covered.iter().any(|l| leaves.contains(l)))
            .map(|(id, _)| *id)
            .collect()
    }
}

/// Set the `overlapping` flag of every node, nested ones included, to whether
/// its id is in `overlapping`.
pub fn apply_overlap(graph: &mut SequenceGraph, overlapping: &FxHashSet<NodeId>) {
    fn mark(node: &mut GraphNode, overlapping: &FxHashSet<NodeId>) {
        node.layout.overlapping = overlapping.contains(&node.id);
        if let Some(bubble) = node.as_bubble_mut() {
            for child in bubble.children.iter_mut() {
                mark(child, overlapping);
            }
        }
    }

    for node in graph.nodes_mut() {
        mark(node, overlapping);
    }
}
