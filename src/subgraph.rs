use log::{debug, info};
use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::graph::SequenceGraph;
use crate::node::GraphNode;
use crate::GenomeId;

/// Check that `subset` is a nonempty subset of the genomes known to `graph`.
pub fn validate_subset(graph: &SequenceGraph, subset: &BTreeSet<GenomeId>) -> Result<()> {
    if subset.is_empty() {
        return Err(Error::EmptySubset);
    }
    match subset.iter().find(|g| !graph.genomes().contains(g)) {
        Some(&genome) => Err(Error::InvalidSubset { genome }),
        None => Ok(()),
    }
}

/// Project `graph` onto the genomes in `subset`.
///
/// Nodes sharing no genome with the subset are dropped, the genome sets of
/// the others are intersected with it, and an edge survives when both of its
/// endpoints do. Ids are preserved. Runs in one pass over the nodes and one over
/// the edges.
pub fn extract(graph: &SequenceGraph, subset: &BTreeSet<GenomeId>) -> Result<SequenceGraph> {
    validate_subset(graph, subset)?;

    // First pass: keep nodes touching the subset
    let mut kept: Vec<GraphNode> = Vec::new();
    for node in graph.nodes() {
        let genomes: BTreeSet<GenomeId> = node.genomes.intersection(subset).copied().collect();
        if genomes.is_empty() {
            continue;
        }
        let mut copy = node.clone();
        copy.genomes = genomes;
        copy.in_edges.clear();
        copy.out_edges.clear();
        kept.push(copy);
    }

    let mut sub = SequenceGraph::with_genomes(subset.clone());
    for node in kept {
        sub.add_node(node);
    }

    // Second pass: edges between surviving nodes
    let mut dropped = 0usize;
    for node in graph.nodes() {
        if !sub.contains(node.id) {
            continue;
        }
        for &child in &node.out_edges {
            if sub.contains(child) {
                sub.add_edge(node.id, child)?;
            } else {
                dropped += 1;
            }
        }
    }
    debug!("Dropped {} edges leaving the subset", dropped);

    info!(
        "Extracted {} of {} nodes for {} genomes",
        sub.len(),
        graph.len(),
        subset.len()
    );
    Ok(sub)
}
