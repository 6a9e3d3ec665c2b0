//! Phylogenetic bubbles: variation private to one clade of the tree.

use log::{debug, info};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

use super::{closes_cycle, level_order, BubbleBuilder, BubbleIds};
use crate::graph::SequenceGraph;
use crate::node::{BubbleKind, GraphNode, NodeKind};
use crate::phylo::{PhyloIdx, PhyloTree};
use crate::{GenomeId, NodeId};

/// Whether `node` belongs to more than a strict part of the clade with the
/// sorted leaf genomes `leaves`: it carries all of them, or at least one genome
/// outside the clade.
pub fn is_shared(node: &GraphNode, leaves: &[GenomeId]) -> bool {
    if node.genomes.len() >= leaves.len() && leaves.iter().all(|g| node.genomes.contains(g)) {
        return true;
    }
    node.genomes.iter().any(|g| leaves.binary_search(g).is_err())
}

/// Collapse the variation below `clade` into [`BubbleKind::Phylo`] nodes.
///
/// A node is private to a child clade when it is not shared with respect to
/// that clade's leaves. Nodes private to the same child clade that are linked
/// by direct edges form one bubble tagged with that child clade; every other
/// node stays as it is. A leaf clade has nothing left to split.
pub fn phylo_bubbles(
    input: &SequenceGraph,
    tree: &PhyloTree,
    clade: PhyloIdx,
    ids: &mut BubbleIds,
) -> SequenceGraph {
    let mut builder = BubbleBuilder::new(input, ids);
    if tree.is_leaf(clade) {
        return builder.finish();
    }

    let clades: Vec<(PhyloIdx, Vec<GenomeId>)> = (0..tree.number_of_children(clade))
        .map(|i| {
            let child = tree.child(clade, i);
            (child, tree.sorted_leaves(child))
        })
        .collect();

    let private_to = |node: &GraphNode| -> Option<usize> {
        if node.genomes.is_empty() {
            return None;
        }
        clades.iter().position(|(_, leaves)| !is_shared(node, leaves))
    };

    let mut assigned: FxHashSet<NodeId> = FxHashSet::default();
    for start in level_order(input) {
        if assigned.contains(&start) {
            continue;
        }
        let Some(node) = input.node(start) else {
            continue;
        };
        let Some(side) = private_to(node) else {
            continue;
        };

        // Connected run of nodes private to the same clade.
        let mut run: Vec<NodeId> = Vec::new();
        let mut queue = VecDeque::from([start]);
        assigned.insert(start);
        while let Some(id) = queue.pop_front() {
            run.push(id);
            let Some(current) = input.node(id) else {
                continue;
            };
            for &next in current.in_edges.iter().chain(current.out_edges.iter()) {
                if assigned.contains(&next) {
                    continue;
                }
                if input.node(next).and_then(private_to) == Some(side) {
                    assigned.insert(next);
                    queue.push_back(next);
                }
            }
        }
        run.sort_by_key(|id| (input.node(*id).map_or(0, |n| n.level), *id));

        let members: FxHashSet<NodeId> = run.iter().copied().collect();
        if closes_cycle(input, &members) {
            debug!("Run of {} nodes at {} would close a cycle, left unbubbled", run.len(), start);
            continue;
        }

        let mut children = BubbleChildren::default();
        for id in &run {
            if let Some(member) = input.node(*id) {
                children.visit(member);
            }
        }
        let (tag, _) = clades[side];
        builder.wrap_with(BubbleKind::Phylo { clade: tag }, &run, children.into_nodes());
    }

    info!("Found {} phylogenetic bubbles", builder.bubble_count());
    builder.finish()
}

/// Collects the nodes a new bubble adopts. A candidate that is already a
/// bubble contributes its own children instead of being wrapped again.
#[derive(Default)]
struct BubbleChildren {
    nodes: Vec<GraphNode>,
}

impl BubbleChildren {
    fn visit(&mut self, node: &GraphNode) {
        match &node.kind {
            NodeKind::Sequence { .. } => self.nodes.push(node.clone()),
            NodeKind::Bubble(bubble) => self.nodes.extend(bubble.children.iter().cloned()),
        }
    }

    fn into_nodes(self) -> Vec<GraphNode> {
        self.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::GenomeRegistry;
    use crate::order::assign_levels;
    use std::collections::BTreeSet;

    /// ((0,1),(2,3))
    fn tree() -> PhyloTree {
        let mut registry = GenomeRegistry::new();
        let mut tree = PhyloTree::new();
        let leaves: Vec<PhyloIdx> = ["g0", "g1", "g2", "g3"]
            .iter()
            .map(|name| {
                registry.register(name);
                tree.add_leaf(name, 1.0)
            })
            .collect();
        let left = tree.add_internal(leaves[0], leaves[1], 1.0);
        let right = tree.add_internal(leaves[2], leaves[3], 1.0);
        tree.add_internal(left, right, 0.0);
        tree.resolve(&registry);
        tree
    }

    fn graph() -> SequenceGraph {
        // 1 (all) -> 2 {0} -> 3 {0} -> 6 (all)
        // 1 -> 4 {1} -> 6
        // 1 -> 5 {2,3} -> 6
        let mut graph = SequenceGraph::new();
        let nodes: [(NodeId, &[GenomeId]); 6] = [
            (1, &[0, 1, 2, 3]),
            (2, &[0]),
            (3, &[0]),
            (4, &[1]),
            (5, &[2, 3]),
            (6, &[0, 1, 2, 3]),
        ];
        for (id, genomes) in nodes {
            graph.add_node(GraphNode::sequence(id, 1, genomes.iter().copied()));
        }
        for (from, to) in [(1, 2), (2, 3), (3, 6), (1, 4), (4, 6), (1, 5), (5, 6)] {
            graph.add_edge(from, to).unwrap();
        }
        assign_levels(&mut graph);
        graph
    }

    #[test]
    fn shared_checks() {
        let node = GraphNode::sequence(1, 1, [0, 1]);
        assert!(is_shared(&node, &[0, 1]));
        assert!(is_shared(&node, &[0]));
        assert!(!is_shared(&node, &[0, 1, 2]));
        assert!(is_shared(&GraphNode::sequence(2, 1, [0, 5]), &[0, 1, 2]));
    }

    #[test]
    fn private_runs_become_one_bubble_per_clade_run() {
        let tree = tree();
        let graph = graph();
        let mut ids = BubbleIds::new();
        let out = phylo_bubbles(&graph, &tree, tree.root().unwrap(), &mut ids);

        // 2, 3 and 4 are private to clade (0,1) and connected through nothing
        // but 1 and 6, so 2-3 is one run and 4 another; 5 holds all of (2,3).
        assert_eq!(out.ids(), vec![-2, -1, 1, 5, 6]);
        let first = out.node(-1).unwrap();
        assert_eq!(first.leaf_ids(), vec![2, 3]);
        let left = tree.child(tree.root().unwrap(), 0);
        assert_eq!(first.bubble_kind(), Some(BubbleKind::Phylo { clade: left }));
        assert_eq!(out.node(-2).unwrap().leaf_ids(), vec![4]);
        assert_eq!(out.node(1).unwrap().out_edges, BTreeSet::from([-2, -1, 5]));
        assert!(out.edges_are_symmetric());
    }

    #[test]
    fn leaf_clade_changes_nothing() {
        let tree = tree();
        let graph = graph();
        let mut ids = BubbleIds::new();
        let out = phylo_bubbles(&graph, &tree, 0, &mut ids);
        assert_eq!(out.ids(), graph.ids());
    }

    #[test]
    fn existing_bubbles_are_flattened() {
        let tree = tree();
        let mut graph = SequenceGraph::new();
        graph.add_node(GraphNode::sequence(1, 1, [0, 1, 2, 3]));
        graph.add_node(GraphNode::bubble(
            -5,
            BubbleKind::PointMutation,
            vec![GraphNode::sequence(2, 1, [0]), GraphNode::sequence(3, 1, [0])],
        ));
        graph.add_node(GraphNode::sequence(4, 1, [0, 1, 2, 3]));
        graph.add_edge(1, -5).unwrap();
        graph.add_edge(-5, 4).unwrap();
        assign_levels(&mut graph);

        let mut ids = BubbleIds::below(&graph);
        let out = phylo_bubbles(&graph, &tree, tree.root().unwrap(), &mut ids);
        let bubble = out.node(-6).unwrap();
        let child_ids: Vec<NodeId> = bubble.children().iter().map(|c| c.id).collect();
        assert_eq!(child_ids, vec![2, 3]);
        assert!(!out.contains(-5));
    }
}
