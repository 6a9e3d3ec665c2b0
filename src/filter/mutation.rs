//! Mutation-pattern bubbles: point mutations, indels and straight runs.

use log::info;

use super::{level_order, BubbleBuilder, BubbleIds};
use crate::graph::SequenceGraph;
use crate::node::{BubbleKind, GraphNode};
use crate::NodeId;

fn only(ids: &std::collections::BTreeSet<NodeId>) -> Option<NodeId> {
    match ids.len() {
        1 => ids.first().copied(),
        _ => None,
    }
}

/// Collapse pairs of single-base alternatives into [`BubbleKind::PointMutation`] nodes.
///
/// A node with exactly two out-edges qualifies when both children are
/// sequence nodes of length 1 with a single in-edge and a single out-edge, and
/// both out-edges lead to the same node.
pub fn point_mutations(input: &SequenceGraph, ids: &mut BubbleIds) -> SequenceGraph {
    let mut builder = BubbleBuilder::new(input, ids);

    for parent in level_order(input) {
        let Some(node) = input.node(parent) else {
            continue;
        };
        if node.out_edges.len() != 2 {
            continue;
        }
        let pair: Vec<NodeId> = node.out_edges.iter().copied().collect();
        let single_base = |id: NodeId| {
            !builder.is_absorbed(id)
                && input.node(id).is_some_and(|c| {
                    c.length() == Some(1) && c.in_edges.len() == 1 && c.out_edges.len() == 1
                })
        };
        if !pair.iter().all(|&id| single_base(id)) {
            continue;
        }
        let successors: Vec<Option<NodeId>> = pair
            .iter()
            .map(|id| input.node(*id).and_then(|c| only(&c.out_edges)))
            .collect();
        if successors[0].is_some() && successors[0] == successors[1] {
            builder.wrap(BubbleKind::PointMutation, &pair);
        }
    }

    info!("Found {} point mutations", builder.bubble_count());
    builder.finish()
}

/// Collapse insertions into [`BubbleKind::Indel`] nodes.
///
/// A node with exactly two out-edges `a` and `t` qualifies when a chain of
/// nodes with one in-edge and one out-edge each leads from `a` to `t`. The
/// chain becomes the bubble; the direct edge to `t` stays.
pub fn indels(input: &SequenceGraph, ids: &mut BubbleIds) -> SequenceGraph {
    let mut builder = BubbleBuilder::new(input, ids);

    for parent in level_order(input) {
        let Some(node) = input.node(parent) else {
            continue;
        };
        if node.out_edges.len() != 2 || builder.is_absorbed(parent) {
            continue;
        }
        let pair: Vec<NodeId> = node.out_edges.iter().copied().collect();
        for (branch, target) in [(pair[0], pair[1]), (pair[1], pair[0])] {
            if let Some(chain) = linear_chain(input, &builder, branch, target) {
                builder.wrap(BubbleKind::Indel, &chain);
                break;
            }
        }
    }

    info!("Found {} indels", builder.bubble_count());
    builder.finish()
}

/// Nodes from `from` up to (excluding) `target`, when they form an unbranched chain.
fn linear_chain(
    graph: &SequenceGraph,
    builder: &BubbleBuilder<'_>,
    from: NodeId,
    target: NodeId,
) -> Option<Vec<NodeId>> {
    let mut chain = Vec::new();
    let mut current = from;
    while chain.len() < graph.len() {
        if current == target || builder.is_absorbed(current) {
            return None;
        }
        let node = graph.node(current)?;
        if node.in_edges.len() != 1 {
            return None;
        }
        let next = only(&node.out_edges)?;
        chain.push(current);
        if next == target {
            return Some(chain);
        }
        current = next;
    }
    None
}

/// Collapse maximal unbranched runs of at least `min_run` nodes into
/// [`BubbleKind::StraightSequence`] nodes.
///
/// Consecutive nodes belong to one run when the first has a single out-edge,
/// the second a single in-edge, and both agree on whether they overlap the
/// compared graph. A run never crosses an overlap boundary.
pub fn straight_sequences(input: &SequenceGraph, ids: &mut BubbleIds, min_run: usize) -> SequenceGraph {
    let mut builder = BubbleBuilder::new(input, ids);

    let continues = |node: &GraphNode| -> Option<NodeId> {
        let next = only(&node.out_edges)?;
        let successor = input.node(next)?;
        let linked = successor.in_edges.len() == 1
            && successor.layout.overlapping == node.layout.overlapping;
        linked.then_some(next)
    };
    let continued = |node: &GraphNode| -> bool {
        only(&node.in_edges)
            .and_then(|p| input.node(p))
            .and_then(continues)
            .is_some()
    };

    for start in level_order(input) {
        let Some(node) = input.node(start) else {
            continue;
        };
        if continued(node) {
            continue;
        }
        let mut run = vec![start];
        let mut current = node;
        while let Some(next) = continues(current) {
            if next == start || run.len() > input.len() {
                break;
            }
            run.push(next);
            match input.node(next) {
                Some(n) => current = n,
                None => break,
            }
        }
        if run.len() >= min_run.max(1) {
            builder.wrap(BubbleKind::StraightSequence, &run);
        }
    }

    info!("Found {} straight sequences", builder.bubble_count());
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::assign_levels;
    use std::collections::BTreeSet;

    fn graph_from(nodes: &[(NodeId, u32)], edges: &[(NodeId, NodeId)]) -> SequenceGraph {
        let mut graph = SequenceGraph::new();
        for &(id, length) in nodes {
            graph.add_node(GraphNode::sequence(id, length, [0]));
        }
        for &(from, to) in edges {
            graph.add_edge(from, to).unwrap();
        }
        assign_levels(&mut graph);
        graph
    }

    fn chain(n: NodeId) -> SequenceGraph {
        let nodes: Vec<(NodeId, u32)> = (1..=n).map(|id| (id, 5)).collect();
        let edges: Vec<(NodeId, NodeId)> = (1..n).map(|id| (id, id + 1)).collect();
        graph_from(&nodes, &edges)
    }

    #[test]
    fn snp_pair_becomes_point_mutation() {
        let graph = graph_from(
            &[(1, 4), (2, 1), (3, 1), (4, 4)],
            &[(1, 2), (1, 3), (2, 4), (3, 4)],
        );
        let mut ids = BubbleIds::new();
        let out = point_mutations(&graph, &mut ids);

        assert_eq!(out.ids(), vec![-1, 1, 4]);
        assert_eq!(out.node(1).unwrap().out_edges, BTreeSet::from([-1]));
        assert_eq!(out.node(4).unwrap().in_edges, BTreeSet::from([-1]));
        assert_eq!(out.node(-1).unwrap().leaf_ids(), vec![2, 3]);
    }

    #[test]
    fn long_alternative_is_not_a_point_mutation() {
        let graph = graph_from(
            &[(1, 4), (2, 1), (3, 2), (4, 4)],
            &[(1, 2), (1, 3), (2, 4), (3, 4)],
        );
        let mut ids = BubbleIds::new();
        assert_eq!(point_mutations(&graph, &mut ids).len(), 4);
    }

    #[test]
    fn insertion_chain_becomes_indel() {
        // 1 -> 4 directly, and 1 -> 2 -> 3 -> 4
        let graph = graph_from(
            &[(1, 4), (2, 3), (3, 3), (4, 4)],
            &[(1, 4), (1, 2), (2, 3), (3, 4)],
        );
        let mut ids = BubbleIds::new();
        let out = indels(&graph, &mut ids);

        assert_eq!(out.ids(), vec![-1, 1, 4]);
        assert_eq!(out.node(1).unwrap().out_edges, BTreeSet::from([-1, 4]));
        assert_eq!(out.node(-1).unwrap().out_edges, BTreeSet::from([4]));
        assert_eq!(out.node(-1).unwrap().leaf_ids(), vec![2, 3]);
    }

    #[test]
    fn straight_runs_need_three_nodes() {
        let mut ids = BubbleIds::new();
        assert_eq!(straight_sequences(&chain(2), &mut ids, 3).len(), 2);

        let out = straight_sequences(&chain(3), &mut ids, 3);
        assert_eq!(out.len(), 1);
        assert_eq!(out.nodes().next().unwrap().leaf_ids(), vec![1, 2, 3]);
    }

    #[test]
    fn straight_runs_stop_at_overlap_boundary() {
        let mut graph = chain(6);
        for id in 4..=6 {
            graph.layout_mut(id).unwrap().overlapping = true;
        }
        let mut ids = BubbleIds::new();
        let out = straight_sequences(&graph, &mut ids, 3);

        assert_eq!(out.len(), 2);
        assert_eq!(out.node(-1).unwrap().leaf_ids(), vec![1, 2, 3]);
        assert!(!out.node(-1).unwrap().layout.overlapping);
        assert_eq!(out.node(-2).unwrap().leaf_ids(), vec![4, 5, 6]);
        assert!(out.node(-2).unwrap().layout.overlapping);
        assert_eq!(out.node(-1).unwrap().out_edges, BTreeSet::from([-2]));
    }
}
