//! # gfabubble
//!
//! Simplification and layout of pangenome variation graphs for interactive
//! viewing. Regions of the graph are collapsed into nested bubbles that can be
//! zoomed into one level at a time, and two genome subsets can be laid out
//! against each other for side-by-side comparison.
//!
//! ## Features
//!
//! - **Longest-path ordering**: every node gets a level (its start coordinate)
//!   and a stable display order
//! - **Graph bubbles**: superbubble-like regions where the genomes split and
//!   rejoin
//! - **Phylogenetic bubbles**: variation private to one clade of a tree
//! - **Mutation bubbles**: SNPs, indels and long unbranched runs
//! - **Comparison**: two subgraphs extracted, aligned and overlap-marked in parallel
//!
//! ## Quick Start
//!
//! ```rust
//! use gfabubble::{filter, FilterConfig, GenomeRegistry, GraphNode, SequenceGraph};
//!
//! let mut registry = GenomeRegistry::new();
//! let a = registry.register("a");
//! let b = registry.register("b");
//!
//! let mut graph = SequenceGraph::with_genomes(registry.all());
//! graph.add_node(GraphNode::sequence(1, 4, [a, b]));
//! graph.add_node(GraphNode::sequence(2, 1, [a]));
//! graph.add_node(GraphNode::sequence(3, 1, [b]));
//! graph.add_node(GraphNode::sequence(4, 4, [a, b]));
//! for (from, to) in [(1, 2), (1, 3), (2, 4), (3, 4)] {
//!     graph.add_edge(from, to).unwrap();
//! }
//!
//! let view = filter(&registry, &graph, None, &registry.all(), &FilterConfig::default()).unwrap();
//! assert!(view.len() < graph.len());
//! ```

/// Node id. Sequence nodes are positive, bubbles negative.
pub type NodeId = i64;
/// Index of a genome in its [`GenomeRegistry`].
pub type GenomeId = u32;

// Core model
pub mod error;
pub mod genome;
pub mod graph;
pub mod node;
pub mod phylo;

// Algorithms
pub mod align;
pub mod compare;
pub mod filter;
pub mod order;
pub mod subgraph;

// Input and context
pub mod annotation;
pub mod dataset;
pub mod gfa;

pub use error::{Error, Result};
pub use genome::{genome_color, GenomeRegistry};
pub use graph::SequenceGraph;
pub use node::{Bubble, BubbleKind, ChildLayout, GraphNode, Layout, NodeKind};
pub use phylo::{PhyloIdx, PhyloNode, PhyloTree};

pub use align::{align, VERTICAL_PRECISION};
pub use compare::{align_one_graph, compare_two_graphs, filter, zoom_in, zoom_out};
pub use filter::{simplify, BubbleIds, FilterConfig};
pub use order::{assign_levels, OrderedGraph};
pub use subgraph::extract;

pub use annotation::{base_position, map_annotations, Annotation, MappedAnnotation, MetadataTable};
pub use dataset::Dataset;
pub use gfa::{load_gfa, parse_gfa};
