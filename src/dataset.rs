//! A loaded dataset: genome registry, full graph, optional tree and metadata,
//! plus the simplified view of all genomes that subgraph views are ordered against.

use log::{debug, info, warn};
use rustc_hash::FxHashSet;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use crate::align::{apply_overlap, LeafSnapshot};
use crate::annotation::{map_annotations, Annotation, MappedAnnotation, MetadataTable};
use crate::compare::{align_one_graph, compare_two_graphs, filter, zoom_in};
use crate::error::{Error, Result};
use crate::filter::FilterConfig;
use crate::genome::GenomeRegistry;
use crate::gfa::load_gfa;
use crate::graph::SequenceGraph;
use crate::order::{assign_levels, OrderedGraph};
use crate::phylo::PhyloTree;
use crate::{GenomeId, NodeId};

pub struct Dataset {
    registry: GenomeRegistry,
    graph: Arc<SequenceGraph>,
    tree: Option<PhyloTree>,
    metadata: MetadataTable,
    config: FilterConfig,
    main: OrderedGraph,
}

impl Dataset {
    /// Level `graph` and build the main view over every genome.
    pub fn new(registry: GenomeRegistry, mut graph: SequenceGraph, config: FilterConfig) -> Result<Self> {
        if registry.is_empty() {
            return Err(Error::NoGenomes);
        }
        assign_levels(&mut graph);
        let all = registry.all();
        let main = filter(&registry, &graph, None, &all, &config)?;
        info!(
            "Main view: {} nodes for {} genomes",
            main.len(),
            registry.len()
        );
        Ok(Dataset {
            registry,
            graph: Arc::new(graph),
            tree: None,
            metadata: MetadataTable::new(),
            config,
            main,
        })
    }

    pub fn load_gfa(path: &Path, config: FilterConfig) -> Result<Self> {
        let mut registry = GenomeRegistry::new();
        let graph = load_gfa(path, &mut registry)?;
        Dataset::new(registry, graph, config)
    }

    /// Attach a tree, resolving its leaf labels, and rebuild the main view
    /// with phylogenetic bubbles.
    pub fn set_tree(&mut self, mut tree: PhyloTree) -> Result<()> {
        let unresolved = tree.resolve(&self.registry);
        if unresolved > 0 {
            warn!("{} tree leaves name no genome of the graph", unresolved);
        }
        let all = self.registry.all();
        self.main = filter(&self.registry, &self.graph, Some(&tree), &all, &self.config)?;
        self.tree = Some(tree);
        Ok(())
    }

    pub fn set_metadata(&mut self, metadata: MetadataTable) {
        self.metadata = metadata;
    }

    pub fn registry(&self) -> &GenomeRegistry {
        &self.registry
    }

    pub fn graph(&self) -> &SequenceGraph {
        &self.graph
    }

    pub fn tree(&self) -> Option<&PhyloTree> {
        self.tree.as_ref()
    }

    pub fn tree_mut(&mut self) -> Option<&mut PhyloTree> {
        self.tree.as_mut()
    }

    pub fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }

    pub fn main_view(&self) -> &OrderedGraph {
        &self.main
    }

    /// Genome ids for a list of names.
    pub fn genome_ids<'a, I>(&self, names: I) -> Result<BTreeSet<GenomeId>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.registry
            .resolve(names)
            .map_err(|name| Error::UnknownGenome(name.to_string()))
    }

    /// Genomes whose metadata `field` equals `value`.
    pub fn genomes_where(&self, field: &str, value: &str) -> BTreeSet<GenomeId> {
        self.metadata.genomes_where(field, value)
    }

    /// Genomes under the selected tree nodes.
    pub fn selected_genomes(&self) -> BTreeSet<GenomeId> {
        self.tree
            .as_ref()
            .map(PhyloTree::selected_genomes)
            .unwrap_or_default()
    }

    pub fn filter(&self, genomes: &BTreeSet<GenomeId>) -> Result<OrderedGraph> {
        filter(&self.registry, &self.graph, self.tree.as_ref(), genomes, &self.config)
    }

    /// Compare two genome subsets. The main view's overlap flags are replaced
    /// by the sequence nodes both sides share, so a following
    /// [`Dataset::align_one`] shows the same overlap.
    pub fn compare(
        &mut self,
        top: &BTreeSet<GenomeId>,
        bottom: &BTreeSet<GenomeId>,
    ) -> Result<(OrderedGraph, OrderedGraph)> {
        let (top_view, bottom_view) = compare_two_graphs(
            &self.registry,
            top,
            bottom,
            &self.graph,
            &self.main,
            self.tree.as_ref(),
            &self.config,
        )?;

        let shared: FxHashSet<NodeId> = top_view
            .source()
            .ids()
            .into_iter()
            .filter(|id| bottom_view.source().contains(*id))
            .collect();
        let flagged = LeafSnapshot::capture(&self.main.graph).covering(&shared);
        debug!("{} main view nodes overlap the comparison", flagged.len());
        apply_overlap(&mut self.main.graph, &flagged);
        Ok((top_view, bottom_view))
    }

    pub fn align_one(&self, genomes: &BTreeSet<GenomeId>) -> Result<OrderedGraph> {
        align_one_graph(
            &self.registry,
            genomes,
            &self.graph,
            &self.main,
            self.tree.as_ref(),
            &self.config,
        )
    }

    /// Zoom into a bubble of the main view.
    pub fn zoom_main(&mut self, bubble_id: NodeId) -> Result<Vec<NodeId>> {
        zoom_in(&mut self.main, bubble_id)
    }

    pub fn annotate(&self, view: &OrderedGraph, annotations: &[Annotation]) -> Vec<MappedAnnotation> {
        map_annotations(view, annotations)
    }
}
