//! Structural bubbles: paths that split off from a node and rejoin at the next
//! node carrying the same genomes, with nothing but strictly smaller genome
//! sets in between.

use log::{debug, info};
use rustc_hash::FxHashSet;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

use super::{level_order, BubbleBuilder, BubbleIds};
use crate::graph::SequenceGraph;
use crate::node::BubbleKind;
use crate::NodeId;

/// Collapse every structural bubble of `input` into a [`BubbleKind::Graph`] node.
///
/// Nodes are visited in level order. A visited node that closes a bubble stays
/// in place, followed by the new bubble and then the closing node; otherwise
/// it is kept unbubbled. No bubble may extend past level `end`.
pub fn graph_bubbles(input: &SequenceGraph, ids: &mut BubbleIds, end: Option<u64>) -> SequenceGraph {
    let mut builder = BubbleBuilder::new(input, ids);

    for start in level_order(input) {
        if builder.is_absorbed(start) {
            continue;
        }
        if let Some(interior) = close_bubble(input, start, end) {
            debug!("Graph bubble after node {} holds {} nodes", start, interior.len());
            builder.wrap(BubbleKind::Graph, &interior);
        }
    }

    info!("Found {} graph bubbles", builder.bubble_count());
    builder.finish()
}

/// Walk forward from `start` in level order looking for the node where all of
/// its genomes meet again. Returns the nodes strictly in between, ordered by
/// level, or `None` when no well-formed bubble starts here.
fn close_bubble(graph: &SequenceGraph, start: NodeId, end: Option<u64>) -> Option<Vec<NodeId>> {
    let source = graph.node(start)?;
    let genomes = &source.genomes;

    let mut heap: BinaryHeap<Reverse<(u64, NodeId)>> = BinaryHeap::new();
    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    for &child in &source.out_edges {
        let node = graph.node(child)?;
        if seen.insert(child) {
            heap.push(Reverse((node.level, child)));
        }
    }

    let mut interior: Vec<NodeId> = Vec::new();
    let mut closed = false;
    while let Some(Reverse((level, id))) = heap.pop() {
        if end.is_some_and(|end| level > end) {
            return None;
        }
        let node = graph.node(id)?;

        if node.genomes == *genomes {
            // Paths still pending would bypass the closing node.
            if !heap.is_empty() {
                return None;
            }
            closed = true;
            break;
        }

        if node.genomes.len() >= genomes.len() || !node.genomes.is_subset(genomes) {
            return None;
        }

        interior.push(id);
        for &child in &node.out_edges {
            if seen.insert(child) {
                let next = graph.node(child)?;
                heap.push(Reverse((next.level, child)));
            }
        }
    }

    if !closed || interior.is_empty() {
        return None;
    }

    // Single entry: nothing may enter the interior except through `start`.
    let inside: BTreeSet<NodeId> = interior.iter().copied().collect();
    let single_entry = interior.iter().all(|id| {
        graph.node(*id).is_some_and(|n| {
            n.in_edges
                .iter()
                .all(|p| *p == start || inside.contains(p))
        })
    });
    single_entry.then_some(interior)
}
