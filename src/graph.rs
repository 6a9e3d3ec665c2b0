use log::debug;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::node::{GraphNode, Layout};
use crate::{GenomeId, NodeId};

/// Arena of graph nodes indexed by id. Edges are id sets on the nodes.
///
/// The root set is a cache that always equals the nodes without in-edges; all
/// edge changes go through [`SequenceGraph::add_edge`] and
/// [`SequenceGraph::remove_edge`] so it can be kept in sync.
#[derive(Debug, Clone, Default)]
pub struct SequenceGraph {
    nodes: FxHashMap<NodeId, GraphNode>,
    genomes: BTreeSet<GenomeId>,
    roots: BTreeSet<NodeId>,
}

impl SequenceGraph {
    pub fn new() -> Self {
        SequenceGraph::default()
    }

    /// Graph whose known genome set is `genomes`, even for genomes no node carries.
    pub fn with_genomes(genomes: BTreeSet<GenomeId>) -> Self {
        SequenceGraph {
            genomes,
            ..SequenceGraph::default()
        }
    }

    /// Build a graph from nodes whose edge sets are already filled in.
    /// Edges pointing at ids outside `nodes` are dropped.
    pub fn from_nodes(nodes: Vec<GraphNode>, genomes: BTreeSet<GenomeId>) -> Self {
        let mut graph = SequenceGraph::with_genomes(genomes);
        for node in nodes {
            graph.genomes.extend(node.genomes.iter().copied());
            graph.nodes.insert(node.id, node);
        }
        let ids: Vec<NodeId> = graph.nodes.keys().copied().collect();
        for id in ids {
            let known = |other: &NodeId| graph.nodes.contains_key(other);
            let node = &graph.nodes[&id];
            let in_edges: BTreeSet<NodeId> = node.in_edges.iter().copied().filter(known).collect();
            let out_edges: BTreeSet<NodeId> = node.out_edges.iter().copied().filter(known).collect();
            if let Some(node) = graph.nodes.get_mut(&id) {
                node.in_edges = in_edges;
                node.out_edges = out_edges;
            }
        }
        graph.symmetrize();
        graph.refresh_roots();
        graph
    }

    /// Insert a node, replacing any node with the same id. The node's edges are
    /// cleared; link it with [`SequenceGraph::add_edge`].
    pub fn add_node(&mut self, mut node: GraphNode) {
        node.in_edges.clear();
        node.out_edges.clear();
        self.genomes.extend(node.genomes.iter().copied());
        self.roots.insert(node.id);
        if let Some(old) = self.nodes.insert(node.id, node) {
            self.detach(&old);
        }
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        if !self.nodes.contains_key(&to) {
            return Err(Error::UnknownNode(to));
        }
        match self.nodes.get_mut(&from) {
            Some(node) => {
                node.out_edges.insert(to);
            }
            None => return Err(Error::UnknownNode(from)),
        }
        if let Some(node) = self.nodes.get_mut(&to) {
            node.in_edges.insert(from);
        }
        self.roots.remove(&to);
        Ok(())
    }

    pub fn remove_edge(&mut self, from: NodeId, to: NodeId) {
        if let Some(node) = self.nodes.get_mut(&from) {
            node.out_edges.remove(&to);
        }
        if let Some(node) = self.nodes.get_mut(&to) {
            node.in_edges.remove(&from);
            if node.in_edges.is_empty() {
                self.roots.insert(to);
            }
        }
    }

    /// Remove a node together with every edge touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Option<GraphNode> {
        let node = self.nodes.remove(&id)?;
        self.roots.remove(&id);
        self.detach(&node);
        Some(node)
    }

    fn detach(&mut self, node: &GraphNode) {
        for parent in &node.in_edges {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.out_edges.remove(&node.id);
            }
        }
        for child in &node.out_edges {
            if let Some(c) = self.nodes.get_mut(child) {
                c.in_edges.remove(&node.id);
                if c.in_edges.is_empty() {
                    self.roots.insert(*child);
                }
            }
        }
    }

    fn symmetrize(&mut self) {
        let mut missing: Vec<(NodeId, NodeId)> = Vec::new();
        for node in self.nodes.values() {
            for child in &node.out_edges {
                if !self.nodes[child].in_edges.contains(&node.id) {
                    missing.push((node.id, *child));
                }
            }
            for parent in &node.in_edges {
                if !self.nodes[parent].out_edges.contains(&node.id) {
                    missing.push((*parent, node.id));
                }
            }
        }
        for (from, to) in missing {
            if let Some(n) = self.nodes.get_mut(&from) {
                n.out_edges.insert(to);
            }
            if let Some(n) = self.nodes.get_mut(&to) {
                n.in_edges.insert(from);
            }
        }
    }

    /// Recompute the root cache from the in-edge sets.
    pub fn refresh_roots(&mut self) {
        self.roots = self
            .nodes
            .values()
            .filter(|n| n.in_edges.is_empty())
            .map(|n| n.id)
            .collect();
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut GraphNode> {
        self.nodes.get_mut(&id)
    }

    pub fn layout_mut(&mut self, id: NodeId) -> Option<&mut Layout> {
        self.nodes.get_mut(&id).map(|n| &mut n.layout)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut GraphNode> {
        self.nodes.values_mut()
    }

    pub fn into_nodes(self) -> Vec<GraphNode> {
        self.nodes.into_values().collect()
    }

    /// Node ids in ascending order.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn roots(&self) -> &BTreeSet<NodeId> {
        &self.roots
    }

    pub fn genomes(&self) -> &BTreeSet<GenomeId> {
        &self.genomes
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.out_edges.len()).sum()
    }

    /// True when `b ∈ a.out_edges ⇔ a ∈ b.in_edges` holds for every node.
    pub fn edges_are_symmetric(&self) -> bool {
        self.nodes.values().all(|node| {
            node.out_edges.iter().all(|c| {
                self.nodes
                    .get(c)
                    .is_some_and(|child| child.in_edges.contains(&node.id))
            }) && node.in_edges.iter().all(|p| {
                self.nodes
                    .get(p)
                    .is_some_and(|parent| parent.out_edges.contains(&node.id))
            })
        })
    }

    /// Map every id nested at any depth (and every top-level id) to the
    /// top-level node that contains it.
    pub fn owner_index(&self) -> FxHashMap<NodeId, NodeId> {
        fn walk(node: &GraphNode, owner: NodeId, index: &mut FxHashMap<NodeId, NodeId>) {
            index.insert(node.id, owner);
            for child in node.children() {
                walk(child, owner, index);
            }
        }

        let mut index = FxHashMap::default();
        for node in self.nodes.values() {
            walk(node, node.id, &mut index);
        }
        index
    }

    /// Ids of every sequence node in the graph, nested ones included.
    pub fn leaf_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::with_capacity(self.nodes.len());
        for node in self.nodes.values() {
            node.for_each_leaf(&mut |leaf| ids.push(leaf.id));
        }
        ids
    }

    /// Rebuild every top-level edge from the sequence-level adjacency of
    /// `base`: each base edge `u -> v` becomes `owner(u) -> owner(v)` unless both
    /// ends live in the same node.
    pub fn relink_from(&mut self, base: &SequenceGraph) {
        let owner = self.owner_index();
        for node in self.nodes.values_mut() {
            node.in_edges.clear();
            node.out_edges.clear();
        }

        let mut links: Vec<(NodeId, NodeId)> = Vec::new();
        for leaf in base.nodes() {
            let Some(&from) = owner.get(&leaf.id) else {
                continue;
            };
            for child in &leaf.out_edges {
                match owner.get(child) {
                    Some(&to) if to != from => links.push((from, to)),
                    Some(_) => {}
                    None => debug!("Base edge {} -> {} leaves the displayed graph", leaf.id, child),
                }
            }
        }

        for (from, to) in links {
            if let Some(n) = self.nodes.get_mut(&from) {
                n.out_edges.insert(to);
            }
            if let Some(n) = self.nodes.get_mut(&to) {
                n.in_edges.insert(from);
            }
        }
        self.refresh_roots();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::BubbleKind;

    fn chain() -> SequenceGraph {
        let mut graph = SequenceGraph::new();
        for id in 1..=3 {
            graph.add_node(GraphNode::sequence(id, 4, [0]));
        }
        graph.add_edge(1, 2).unwrap();
        graph.add_edge(2, 3).unwrap();
        graph
    }

    #[test]
    fn roots_follow_edges() {
        let mut graph = chain();
        assert_eq!(graph.roots(), &BTreeSet::from([1]));

        graph.remove_edge(1, 2);
        assert_eq!(graph.roots(), &BTreeSet::from([1, 2]));

        graph.remove_node(2);
        assert_eq!(graph.roots(), &BTreeSet::from([1, 3]));
        assert!(graph.edges_are_symmetric());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn add_edge_to_unknown_node_fails() {
        let mut graph = chain();
        assert!(matches!(graph.add_edge(1, 9), Err(Error::UnknownNode(9))));
        assert!(matches!(graph.add_edge(9, 1), Err(Error::UnknownNode(9))));
    }

    #[test]
    fn from_nodes_repairs_half_edges() {
        let mut a = GraphNode::sequence(1, 1, [0]);
        let b = GraphNode::sequence(2, 1, [1]);
        a.out_edges.insert(2);
        a.out_edges.insert(77);
        let graph = SequenceGraph::from_nodes(vec![a, b], BTreeSet::new());

        assert!(graph.edges_are_symmetric());
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.roots(), &BTreeSet::from([1]));
        assert_eq!(graph.genomes(), &BTreeSet::from([0, 1]));
    }

    #[test]
    fn relink_maps_edges_onto_bubbles() {
        let base = chain();
        let bubble = GraphNode::bubble(
            -1,
            BubbleKind::StraightSequence,
            vec![base.node(2).unwrap().clone(), base.node(3).unwrap().clone()],
        );
        let mut shown = SequenceGraph::new();
        shown.add_node(base.node(1).unwrap().clone());
        shown.add_node(bubble);
        shown.relink_from(&base);

        assert_eq!(shown.node(1).unwrap().out_edges, BTreeSet::from([-1]));
        assert_eq!(shown.node(-1).unwrap().in_edges, BTreeSet::from([1]));
        assert!(shown.node(-1).unwrap().out_edges.is_empty());
        assert_eq!(shown.owner_index()[&3], -1);
    }
}
