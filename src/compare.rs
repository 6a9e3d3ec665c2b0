//! Entry points used by the rendering layer: simplify-and-order, zoom, and
//! the single and side-by-side subgraph views.

use log::{debug, info};
use rustc_hash::FxHashSet;
use std::any::Any;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::align::{align, apply_overlap, LeafSnapshot};
use crate::error::{Error, Result};
use crate::filter::{simplify, BubbleIds, FilterConfig};
use crate::genome::GenomeRegistry;
use crate::graph::SequenceGraph;
use crate::node::{BubbleKind, GraphNode};
use crate::order::{assign_levels, LeafRank, OrderedGraph};
use crate::phylo::PhyloTree;
use crate::subgraph::{extract, validate_subset};
use crate::{GenomeId, NodeId};

/// Run two closures in parallel and wait for both. A panicking worker fails
/// the whole request instead of unwinding through the caller.
pub(crate) fn fork_join<A, B, RA, RB>(a: A, b: B) -> Result<(RA, RB)>
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    panic::catch_unwind(AssertUnwindSafe(|| rayon::join(a, b)))
        .map_err(|payload| Error::Worker(panic_message(payload)))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

fn genome_names(registry: &GenomeRegistry, genomes: &BTreeSet<GenomeId>) -> String {
    genomes
        .iter()
        .map(|g| registry.name(*g).unwrap_or("?"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Simplify and order an already extracted subgraph.
fn build_view(
    mut source: SequenceGraph,
    tree: Option<&PhyloTree>,
    genomes: &BTreeSet<GenomeId>,
    rank: Option<Arc<LeafRank>>,
    config: &FilterConfig,
) -> OrderedGraph {
    assign_levels(&mut source);
    let pruned = tree.and_then(|t| t.prune(genomes)).map(Arc::new);
    let mut ids = BubbleIds::below(&source);
    let clade = pruned
        .as_deref()
        .and_then(|t| t.root().map(|root| (t, root)));
    let simplified = simplify(&source, clade, &mut ids, config);
    OrderedGraph::new(simplified, Arc::new(source), pruned, ids, rank, *config)
}

/// Simplify `graph` down to `genomes` and order it.
///
/// With a tree the phylogenetic filter collapses clade-private variation,
/// without one the structural filter collapses graph bubbles; the mutation
/// filters run afterwards in both cases.
pub fn filter(
    registry: &GenomeRegistry,
    graph: &SequenceGraph,
    tree: Option<&PhyloTree>,
    genomes: &BTreeSet<GenomeId>,
    config: &FilterConfig,
) -> Result<OrderedGraph> {
    info!("Filtering graph for genomes {}", genome_names(registry, genomes));
    let source = extract(graph, genomes)?;
    let mut view = build_view(source, tree, genomes, None, config);
    align(&mut view.graph, &view.order);
    Ok(view)
}

/// Re-expand the bubble `bubble_id` of `view` by one level of detail.
///
/// Phylogenetic bubbles are re-filtered one clade further down the tree and
/// graph bubbles with the structural filter, both restricted to the bubble's
/// interior; mutation bubbles are simply opened. The rest of the view is kept.
/// Returns the new display order. On error the view is unchanged.
pub fn zoom_in(view: &mut OrderedGraph, bubble_id: NodeId) -> Result<Vec<NodeId>> {
    let node = view.graph.node(bubble_id).ok_or(Error::UnknownNode(bubble_id))?;
    let bubble = node.as_bubble().ok_or(Error::NotABubble(bubble_id))?;

    let mut interior = SequenceGraph::with_genomes(view.graph.genomes().clone());
    for child in &bubble.children {
        interior.add_node(child.clone());
    }
    interior.relink_from(&view.source);
    assign_levels(&mut interior);

    let mut ids = view.ids;
    let expanded = match (bubble.kind, view.tree.as_deref()) {
        (BubbleKind::Phylo { clade }, Some(tree)) => {
            simplify(&interior, Some((tree, clade)), &mut ids, &view.config)
        }
        (BubbleKind::Graph, _) => simplify(&interior, None, &mut ids, &view.config),
        _ => interior,
    };
    debug!(
        "Zooming into {} bubble {} gives {} nodes",
        bubble.kind.name(),
        bubble_id,
        expanded.len()
    );

    if let Some(mut popped) = view.graph.remove_node(bubble_id) {
        if let Some(b) = popped.as_bubble_mut() {
            b.popped = true;
        }
        view.popped.push(popped);
    }
    for node in expanded.into_nodes() {
        view.graph.add_node(node);
    }
    view.graph.relink_from(&view.source);
    view.ids = ids;
    view.reorder();
    align(&mut view.graph, &view.order);
    Ok(view.order.clone())
}

/// Undo the expansion of a popped bubble, replacing whatever is currently shown
/// for its interior by the bubble itself.
pub fn zoom_out(view: &mut OrderedGraph, bubble_id: NodeId) -> Result<Vec<NodeId>> {
    let position = view
        .popped
        .iter()
        .position(|b| b.id == bubble_id)
        .ok_or(Error::UnknownNode(bubble_id))?;
    let mut bubble = view.popped.remove(position);
    if let Some(b) = bubble.as_bubble_mut() {
        b.popped = false;
    }

    let leaves: FxHashSet<NodeId> = bubble.leaf_ids().into_iter().collect();
    let covered = |node: &GraphNode| node.leaf_ids().iter().all(|id| leaves.contains(id));
    let shown: Vec<NodeId> = view
        .graph
        .nodes()
        .filter(|n| covered(*n))
        .map(|n| n.id)
        .collect();
    for id in shown {
        view.graph.remove_node(id);
    }
    view.popped.retain(|b| !covered(b));

    view.graph.add_node(bubble);
    view.graph.relink_from(&view.source);
    view.reorder();
    align(&mut view.graph, &view.order);
    Ok(view.order.clone())
}

/// Flag the nodes of `graph` whose id also exists in `other`.
fn mark_shared_nodes(graph: &mut SequenceGraph, other: &SequenceGraph) {
    for node in graph.nodes_mut() {
        node.layout.overlapping = other.contains(node.id);
    }
}

/// Build the two sides of a comparison: extract the `top` and `bottom`
/// subgraphs in parallel, simplify and order each (level ties follow `main`),
/// then align both in parallel with marking which nodes they share.
pub fn compare_two_graphs(
    registry: &GenomeRegistry,
    top: &BTreeSet<GenomeId>,
    bottom: &BTreeSet<GenomeId>,
    graph: &SequenceGraph,
    main: &OrderedGraph,
    tree: Option<&PhyloTree>,
    config: &FilterConfig,
) -> Result<(OrderedGraph, OrderedGraph)> {
    validate_subset(graph, top)?;
    validate_subset(graph, bottom)?;
    info!(
        "Comparing {} against {}",
        genome_names(registry, top),
        genome_names(registry, bottom)
    );

    let (top_sub, bottom_sub) = fork_join(|| extract(graph, top), || extract(graph, bottom))?;
    let mut top_sub = top_sub?;
    let mut bottom_sub = bottom_sub?;

    // Sequence-level overlap first, so straight runs stop at its boundaries.
    mark_shared_nodes(&mut top_sub, &bottom_sub);
    mark_shared_nodes(&mut bottom_sub, &top_sub);

    let rank = Arc::new(main.leaf_rank());
    let mut top_view = build_view(top_sub, tree, top, Some(rank.clone()), config);
    let mut bottom_view = build_view(bottom_sub, tree, bottom, Some(rank), config);

    let top_leaves = LeafSnapshot::capture(&top_view.graph);
    let bottom_leaves = LeafSnapshot::capture(&bottom_view.graph);
    let (_, (top_flags, bottom_flags)) = fork_join(
        || {
            rayon::join(
                || align(&mut top_view.graph, &top_view.order),
                || align(&mut bottom_view.graph, &bottom_view.order),
            )
        },
        || {
            (
                top_leaves.overlapping_with(&bottom_leaves),
                bottom_leaves.overlapping_with(&top_leaves),
            )
        },
    )?;
    apply_overlap(&mut top_view.graph, &top_flags);
    apply_overlap(&mut bottom_view.graph, &bottom_flags);

    info!(
        "Comparison ready: {} top nodes ({} shared), {} bottom nodes ({} shared)",
        top_view.len(),
        top_view.nodes().filter(|n| n.layout.overlapping).count(),
        bottom_view.len(),
        bottom_view.nodes().filter(|n| n.layout.overlapping).count()
    );
    Ok((top_view, bottom_view))
}

/// Build and align a single subgraph view. Overlap flags are carried over
/// from the sequence nodes flagged in `main`, which `Dataset::compare` sets
/// to the nodes shared by the last comparison.
pub fn align_one_graph(
    registry: &GenomeRegistry,
    genomes: &BTreeSet<GenomeId>,
    graph: &SequenceGraph,
    main: &OrderedGraph,
    tree: Option<&PhyloTree>,
    config: &FilterConfig,
) -> Result<OrderedGraph> {
    info!("Aligning genomes {}", genome_names(registry, genomes));
    let mut sub = extract(graph, genomes)?;

    let mut flagged: FxHashSet<NodeId> = FxHashSet::default();
    for node in main.graph.nodes() {
        node.for_each_leaf(&mut |leaf| {
            if leaf.layout.overlapping {
                flagged.insert(leaf.id);
            }
        });
    }
    for node in sub.nodes_mut() {
        node.layout.overlapping = flagged.contains(&node.id);
    }

    let rank = Arc::new(main.leaf_rank());
    let mut view = build_view(sub, tree, genomes, Some(rank), config);
    align(&mut view.graph, &view.order);
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_panic_becomes_error() {
        let result = fork_join(|| 1, || -> i32 { panic!("boom") });
        match result {
            Err(Error::Worker(message)) => assert_eq!(message, "boom"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn fork_join_returns_both_results() {
        assert_eq!(fork_join(|| 1, || "two").unwrap(), (1, "two"));
    }

    #[test]
    fn failed_extraction_worker_fails_the_request() {
        let mut graph = SequenceGraph::new();
        graph.add_node(GraphNode::sequence(1, 4, [0, 1]));
        graph.add_node(GraphNode::sequence(2, 4, [0]));
        graph.add_edge(1, 2).unwrap();
        let top = BTreeSet::from([0]);

        let result = fork_join(
            || extract(&graph, &top),
            || -> Result<SequenceGraph> { panic!("extraction of {} failed", "bottom") },
        );
        match result {
            Err(Error::Worker(message)) => assert_eq!(message, "extraction of bottom failed"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
        assert_eq!(graph.len(), 2, "source graph is untouched");
        assert!(graph.edges_are_symmetric());
    }
}
