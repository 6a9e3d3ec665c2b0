#![allow(dead_code)]

use gfabubble::*;
use std::collections::HashMap;

/// Every node is ordered once, and every edge goes forward in both level and order.
pub fn assert_well_ordered(view: &OrderedGraph) {
    let position: HashMap<NodeId, usize> =
        view.order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    assert_eq!(position.len(), view.graph.len(), "every node should be ordered once");
    for node in view.graph.nodes() {
        for child in &node.out_edges {
            let child_node = view.node(*child).unwrap();
            assert!(
                child_node.level >= node.level + node.size(),
                "edge {} -> {} violates levels",
                node.id,
                child
            );
            assert!(position[&node.id] < position[child], "edge {} -> {} out of order", node.id, child);
        }
    }
}

/// Zoom into bubbles until none is shown, checking the view after each step.
/// Returns the number of zoom steps.
pub fn zoom_until_flat(view: &mut OrderedGraph) -> usize {
    let mut steps = 0;
    while let Some(id) = {
        let next = view.nodes().find(|n| n.is_bubble()).map(|n| n.id);
        next
    } {
        zoom_in(view, id).expect("Failed to zoom into bubble");
        steps += 1;
        assert!(steps <= 20, "zooming does not terminate");
        assert!(!view.order.contains(&id), "zoomed bubble {} is still shown", id);
        assert!(view.graph.edges_are_symmetric(), "edges asymmetric after zooming into {}", id);
        assert_well_ordered(view);
    }
    steps
}
