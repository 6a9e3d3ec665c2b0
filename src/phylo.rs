//! Binary phylogenetic trees and pruning to a genome subset.
//!
//! Trees are stored in an arena of [`PhyloNode`]s addressed by [`PhyloIdx`].
//! Every node has either zero children (a leaf carrying a genome label) or
//! exactly two. Trees are built bottom-up by a loader through
//! [`PhyloTree::add_leaf`] and [`PhyloTree::add_internal`]; after construction
//! only the selection flags change.

use log::debug;
use std::collections::BTreeSet;

use crate::genome::GenomeRegistry;
use crate::GenomeId;

pub type PhyloIdx = usize;

#[derive(Debug, Clone)]
pub struct PhyloNode {
    pub label: Option<String>,
    pub genome: Option<GenomeId>,
    /// Length of the edge towards the parent.
    pub weight: f64,
    pub children: Vec<PhyloIdx>,
    pub parent: Option<PhyloIdx>,
    pub selected: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PhyloTree {
    nodes: Vec<PhyloNode>,
    root: Option<PhyloIdx>,
}

impl PhyloTree {
    pub fn new() -> Self {
        PhyloTree::default()
    }

    pub fn add_leaf(&mut self, label: &str, weight: f64) -> PhyloIdx {
        let idx = self.nodes.len();
        self.nodes.push(PhyloNode {
            label: Some(label.to_string()),
            genome: None,
            weight,
            children: Vec::new(),
            parent: None,
            selected: false,
        });
        if self.root.is_none() {
            self.root = Some(idx);
        }
        idx
    }

    /// Join two existing subtrees under a new node, which becomes the root.
    pub fn add_internal(&mut self, left: PhyloIdx, right: PhyloIdx, weight: f64) -> PhyloIdx {
        let idx = self.nodes.len();
        self.nodes.push(PhyloNode {
            label: None,
            genome: None,
            weight,
            children: vec![left, right],
            parent: None,
            selected: false,
        });
        self.nodes[left].parent = Some(idx);
        self.nodes[right].parent = Some(idx);
        self.root = Some(idx);
        idx
    }

    /// Attach genome ids to leaves by label. Returns the number of leaves whose
    /// label is not a registered genome; those leaves are ignored by pruning.
    pub fn resolve(&mut self, registry: &GenomeRegistry) -> usize {
        let mut unresolved = 0;
        for node in self.nodes.iter_mut().filter(|n| n.children.is_empty()) {
            node.genome = node.label.as_deref().and_then(|l| registry.id(l));
            if node.genome.is_none() {
                debug!("Tree leaf {:?} has no genome in the graph", node.label);
                unresolved += 1;
            }
        }
        unresolved
    }

    pub fn root(&self) -> Option<PhyloIdx> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: PhyloIdx) -> &PhyloNode {
        &self.nodes[idx]
    }

    pub fn number_of_children(&self, idx: PhyloIdx) -> usize {
        self.nodes[idx].children.len()
    }

    pub fn child(&self, idx: PhyloIdx, i: usize) -> PhyloIdx {
        self.nodes[idx].children[i]
    }

    pub fn is_leaf(&self, idx: PhyloIdx) -> bool {
        self.nodes[idx].children.is_empty()
    }

    /// Union of the genomes of every leaf below `idx`.
    pub fn genomes(&self, idx: PhyloIdx) -> BTreeSet<GenomeId> {
        let mut genomes = BTreeSet::new();
        let mut stack = vec![idx];
        while let Some(current) = stack.pop() {
            let node = &self.nodes[current];
            if let Some(g) = node.genome {
                genomes.insert(g);
            }
            stack.extend(node.children.iter().copied());
        }
        genomes
    }

    /// Leaf genomes below `idx` as a sorted list, for binary search.
    pub fn sorted_leaves(&self, idx: PhyloIdx) -> Vec<GenomeId> {
        self.genomes(idx).into_iter().collect()
    }

    /// Copy of the tree restricted to leaves whose genome is in `keep`.
    ///
    /// Internal nodes left with a single child are spliced out, adding their
    /// edge length to the surviving child. Returns `None` when no leaf survives.
    pub fn prune(&self, keep: &BTreeSet<GenomeId>) -> Option<PhyloTree> {
        let mut pruned = PhyloTree::new();
        let root = self.prune_into(self.root?, keep, &mut pruned)?;
        pruned.root = Some(root);
        pruned.nodes[root].parent = None;
        debug!(
            "Pruned tree from {} to {} nodes for {} genomes",
            self.nodes.len(),
            pruned.nodes.len(),
            keep.len()
        );
        Some(pruned)
    }

    fn prune_into(
        &self,
        idx: PhyloIdx,
        keep: &BTreeSet<GenomeId>,
        out: &mut PhyloTree,
    ) -> Option<PhyloIdx> {
        let node = &self.nodes[idx];
        if node.children.is_empty() {
            let genome = node.genome.filter(|g| keep.contains(g))?;
            let leaf = out.add_leaf(node.label.as_deref().unwrap_or_default(), node.weight);
            out.nodes[leaf].genome = Some(genome);
            out.nodes[leaf].selected = node.selected;
            return Some(leaf);
        }

        let left = self.prune_into(node.children[0], keep, out);
        let right = self.prune_into(node.children[1], keep, out);
        match (left, right) {
            (Some(l), Some(r)) => {
                let joined = out.add_internal(l, r, node.weight);
                out.nodes[joined].selected = node.selected;
                Some(joined)
            }
            (Some(only), None) | (None, Some(only)) => {
                out.nodes[only].weight += node.weight;
                Some(only)
            }
            (None, None) => None,
        }
    }

    pub fn set_selected(&mut self, idx: PhyloIdx, selected: bool) {
        self.nodes[idx].selected = selected;
    }

    /// Genomes below every selected node.
    pub fn selected_genomes(&self) -> BTreeSet<GenomeId> {
        let mut genomes = BTreeSet::new();
        for (idx, node) in self.nodes.iter().enumerate() {
            if node.selected {
                genomes.extend(self.genomes(idx));
            }
        }
        genomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ((a,b),(c,d)) with genome ids 0..4
    fn balanced() -> PhyloTree {
        let mut registry = GenomeRegistry::new();
        let mut tree = PhyloTree::new();
        let leaves: Vec<PhyloIdx> = ["a", "b", "c", "d"]
            .iter()
            .map(|name| {
                registry.register(name);
                tree.add_leaf(name, 1.0)
            })
            .collect();
        let ab = tree.add_internal(leaves[0], leaves[1], 0.5);
        let cd = tree.add_internal(leaves[2], leaves[3], 0.5);
        tree.add_internal(ab, cd, 0.0);
        assert_eq!(tree.resolve(&registry), 0);
        tree
    }

    #[test]
    fn genomes_of_subtrees() {
        let tree = balanced();
        let root = tree.root().unwrap();
        assert_eq!(tree.number_of_children(root), 2);
        assert_eq!(tree.genomes(root), BTreeSet::from([0, 1, 2, 3]));
        assert_eq!(tree.sorted_leaves(tree.child(root, 1)), vec![2, 3]);
    }

    #[test]
    fn prune_splices_unary_nodes() {
        let tree = balanced();
        let pruned = tree.prune(&BTreeSet::from([0, 1, 2])).unwrap();
        let root = pruned.root().unwrap();

        assert_eq!(pruned.genomes(root), BTreeSet::from([0, 1, 2]));
        // (a,b) stays internal, c replaces the (c,d) node and inherits its length
        let right = pruned.child(root, 1);
        assert!(pruned.is_leaf(right));
        assert_eq!(pruned.node(right).label.as_deref(), Some("c"));
        assert!((pruned.node(right).weight - 1.5).abs() < 1e-9);
        assert_eq!(pruned.len(), 5);
    }

    #[test]
    fn prune_to_nothing() {
        let tree = balanced();
        assert!(tree.prune(&BTreeSet::from([9])).is_none());
        assert!(PhyloTree::new().prune(&BTreeSet::from([0])).is_none());
    }

    #[test]
    fn unknown_labels_are_dropped() {
        let mut registry = GenomeRegistry::new();
        registry.register("a");
        let mut tree = PhyloTree::new();
        let a = tree.add_leaf("a", 1.0);
        let x = tree.add_leaf("x", 1.0);
        tree.add_internal(a, x, 0.0);
        assert_eq!(tree.resolve(&registry), 1);

        let pruned = tree.prune(&BTreeSet::from([0])).unwrap();
        assert_eq!(pruned.len(), 1);
        assert!(pruned.is_leaf(pruned.root().unwrap()));
    }

    #[test]
    fn selection_collects_genomes() {
        let mut tree = balanced();
        let root = tree.root().unwrap();
        let cd = tree.child(root, 1);
        tree.set_selected(cd, true);
        assert_eq!(tree.selected_genomes(), BTreeSet::from([2, 3]));
    }
}
