//! Graph node model: sequence nodes and the bubble variants wrapping them.

use std::collections::BTreeSet;

use crate::phylo::PhyloIdx;
use crate::{GenomeId, NodeId};

/// Per-node annotations written by the aligner and overlap pass, read by renderers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    /// Vertical centre in `[0, 1]`.
    pub relative_y: f64,
    /// Height budget in `(0, 1]`.
    pub max_height: f64,
    pub overlapping: bool,
}

impl Default for Layout {
    fn default() -> Self {
        Layout {
            relative_y: 0.5,
            max_height: 1.0,
            overlapping: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleKind {
    /// Diverging paths of strictly smaller genome sets between two nodes.
    Graph,
    /// Variation private to one clade of the phylogenetic tree.
    Phylo { clade: PhyloIdx },
    PointMutation,
    Indel,
    StraightSequence,
}

impl BubbleKind {
    pub fn name(&self) -> &'static str {
        match self {
            BubbleKind::Graph => "graph",
            BubbleKind::Phylo { .. } => "phylo",
            BubbleKind::PointMutation => "point_mutation",
            BubbleKind::Indel => "indel",
            BubbleKind::StraightSequence => "straight",
        }
    }

    fn child_layout(&self) -> ChildLayout {
        match self {
            BubbleKind::Graph | BubbleKind::Phylo { .. } => ChildLayout::Nested,
            BubbleKind::PointMutation => ChildLayout::Stacked,
            BubbleKind::Indel => ChildLayout::Flattened,
            BubbleKind::StraightSequence => ChildLayout::Centered,
        }
    }
}

/// How the aligner places a bubble's children inside the bubble's own slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildLayout {
    /// Children share the slot evenly, one above the other.
    Stacked,
    /// Children sit at mid height with half the height budget.
    Flattened,
    /// Children sit at mid height with the full height budget.
    Centered,
    /// The interior is aligned like a graph of its own.
    Nested,
}

#[derive(Debug, Clone)]
pub struct Bubble {
    pub kind: BubbleKind,
    pub children: Vec<GraphNode>,
    pub popped: bool,
    pub layout: ChildLayout,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Sequence { length: u32 },
    Bubble(Bubble),
}

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub in_edges: BTreeSet<NodeId>,
    pub out_edges: BTreeSet<NodeId>,
    pub genomes: BTreeSet<GenomeId>,
    pub level: u64,
    pub layout: Layout,
}

impl GraphNode {
    pub fn sequence<I>(id: NodeId, length: u32, genomes: I) -> Self
    where
        I: IntoIterator<Item = GenomeId>,
    {
        GraphNode {
            id,
            kind: NodeKind::Sequence { length },
            in_edges: BTreeSet::new(),
            out_edges: BTreeSet::new(),
            genomes: genomes.into_iter().collect(),
            level: 0,
            layout: Layout::default(),
        }
    }

    /// Wrap `children` into a bubble. Genomes are the union of the children's
    /// genomes and the bubble overlaps when any child does.
    pub fn bubble(id: NodeId, kind: BubbleKind, children: Vec<GraphNode>) -> Self {
        let genomes = children
            .iter()
            .flat_map(|c| c.genomes.iter().copied())
            .collect();
        let overlapping = children.iter().any(|c| c.layout.overlapping);
        let level = children.iter().map(|c| c.level).min().unwrap_or(0);
        GraphNode {
            id,
            kind: NodeKind::Bubble(Bubble {
                kind,
                children,
                popped: false,
                layout: kind.child_layout(),
            }),
            in_edges: BTreeSet::new(),
            out_edges: BTreeSet::new(),
            genomes,
            level,
            layout: Layout {
                overlapping,
                ..Layout::default()
            },
        }
    }

    /// Length contribution to levelling: base pairs for sequence nodes, one
    /// unit step for bubbles.
    pub fn size(&self) -> u64 {
        match &self.kind {
            NodeKind::Sequence { length } => (*length).max(1) as u64,
            NodeKind::Bubble(_) => 1,
        }
    }

    pub fn length(&self) -> Option<u32> {
        match &self.kind {
            NodeKind::Sequence { length } => Some(*length),
            NodeKind::Bubble(_) => None,
        }
    }

    pub fn is_bubble(&self) -> bool {
        matches!(self.kind, NodeKind::Bubble(_))
    }

    pub fn as_bubble(&self) -> Option<&Bubble> {
        match &self.kind {
            NodeKind::Bubble(b) => Some(b),
            NodeKind::Sequence { .. } => None,
        }
    }

    pub fn as_bubble_mut(&mut self) -> Option<&mut Bubble> {
        match &mut self.kind {
            NodeKind::Bubble(b) => Some(b),
            NodeKind::Sequence { .. } => None,
        }
    }

    pub fn bubble_kind(&self) -> Option<BubbleKind> {
        self.as_bubble().map(|b| b.kind)
    }

    /// Nested nodes; empty for sequence nodes.
    pub fn children(&self) -> &[GraphNode] {
        match &self.kind {
            NodeKind::Bubble(b) => &b.children,
            NodeKind::Sequence { .. } => &[],
        }
    }

    /// Call `f` on every sequence node at or below this node.
    pub fn for_each_leaf<F: FnMut(&GraphNode)>(&self, f: &mut F) {
        match &self.kind {
            NodeKind::Sequence { .. } => f(self),
            NodeKind::Bubble(b) => {
                for child in &b.children {
                    child.for_each_leaf(f);
                }
            }
        }
    }

    /// Ids of every sequence node at or below this node.
    pub fn leaf_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        self.for_each_leaf(&mut |leaf| ids.push(leaf.id));
        ids
    }

    /// Total base pairs covered by the sequence nodes at or below this node.
    pub fn base_pairs(&self) -> u64 {
        let mut total = 0u64;
        self.for_each_leaf(&mut |leaf| total += leaf.length().unwrap_or(0) as u64);
        total
    }

    pub fn contains_genome(&self, genome: GenomeId) -> bool {
        self.genomes.contains(&genome)
    }
}
