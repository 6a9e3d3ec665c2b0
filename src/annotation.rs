//! Genome metadata records and placement of base-position annotations on nodes.

use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;

use crate::error::{Error, Result};
use crate::filter::level_order;
use crate::genome::GenomeRegistry;
use crate::graph::SequenceGraph;
use crate::order::OrderedGraph;
use crate::{GenomeId, NodeId};

/// Free-text attributes of one genome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenomeMetadata {
    pub fields: BTreeMap<String, String>,
}

impl GenomeMetadata {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

/// Genome id to at most one metadata record.
#[derive(Debug, Clone, Default)]
pub struct MetadataTable {
    records: BTreeMap<GenomeId, GenomeMetadata>,
}

impl MetadataTable {
    pub fn new() -> Self {
        MetadataTable::default()
    }

    /// Store the record of `genome`, replacing an earlier one.
    pub fn insert(&mut self, genome: GenomeId, record: GenomeMetadata) {
        self.records.insert(genome, record);
    }

    pub fn get(&self, genome: GenomeId) -> Option<&GenomeMetadata> {
        self.records.get(&genome)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Genomes whose `field` equals `value`.
    pub fn genomes_where(&self, field: &str, value: &str) -> BTreeSet<GenomeId> {
        self.records
            .iter()
            .filter(|(_, record)| record.get(field) == Some(value))
            .map(|(genome, _)| *genome)
            .collect()
    }

    /// Read a tab separated table whose header names the fields and whose
    /// first column is the genome name. Rows for unknown genomes are skipped.
    pub fn read_tsv<R: BufRead>(reader: R, registry: &GenomeRegistry) -> Result<Self> {
        let mut table = MetadataTable::new();
        let mut header: Vec<String> = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let columns: Vec<&str> = line.split('\t').collect();
            if header.is_empty() {
                header = columns.iter().map(|c| c.trim().to_string()).collect();
                continue;
            }
            if columns.len() != header.len() {
                return Err(Error::Parse {
                    line: index + 1,
                    message: format!("expected {} columns, found {}", header.len(), columns.len()),
                });
            }
            let Some(genome) = registry.id(columns[0].trim()) else {
                warn!("Metadata for unknown genome {} skipped", columns[0]);
                continue;
            };
            let fields = header
                .iter()
                .zip(&columns)
                .skip(1)
                .map(|(name, value)| (name.clone(), value.trim().to_string()))
                .collect();
            table.insert(genome, GenomeMetadata { fields });
        }

        info!("Loaded metadata for {} genomes", table.len());
        Ok(table)
    }
}

/// A labelled half-open base range `[start, end)` on one genome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub genome: GenomeId,
    pub start: u64,
    pub end: u64,
    pub label: String,
}

impl Annotation {
    /// Read `genome start end label` lines, tab separated.
    pub fn read_tsv<R: BufRead>(reader: R, registry: &GenomeRegistry) -> Result<Vec<Annotation>> {
        let mut annotations = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let parse_error = |message: String| Error::Parse {
                line: index + 1,
                message,
            };
            let columns: Vec<&str> = line.split('\t').collect();
            if columns.len() < 4 {
                return Err(parse_error("expected genome, start, end and label".to_string()));
            }
            let genome = registry
                .id(columns[0])
                .ok_or_else(|| Error::UnknownGenome(columns[0].to_string()))?;
            let start = columns[1]
                .parse::<u64>()
                .map_err(|e| parse_error(format!("bad start: {}", e)))?;
            let end = columns[2]
                .parse::<u64>()
                .map_err(|e| parse_error(format!("bad end: {}", e)))?;
            annotations.push(Annotation {
                genome,
                start,
                end: end.max(start.saturating_add(1)),
                label: columns[3].to_string(),
            });
        }
        Ok(annotations)
    }
}

/// An annotation together with the displayed nodes it covers, in path order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedAnnotation {
    pub annotation: Annotation,
    pub nodes: Vec<NodeId>,
}

/// The sequence nodes of one genome in level order with their start offsets.
#[derive(Debug, Clone, Default)]
pub struct GenomePath {
    pub nodes: Vec<NodeId>,
    pub offsets: Vec<u64>,
    pub length: u64,
}

impl GenomePath {
    /// Index into `nodes` of the node holding base `base`.
    pub fn locate(&self, base: u64) -> Option<usize> {
        if base >= self.length {
            return None;
        }
        match self.offsets.binary_search(&base) {
            Ok(i) => Some(i),
            Err(i) => i.checked_sub(1),
        }
    }
}

/// Walk the sequence nodes carrying `genome` by level. Levels must be current.
pub fn genome_path(graph: &SequenceGraph, genome: GenomeId) -> GenomePath {
    let mut path = GenomePath::default();
    for id in level_order(graph) {
        let Some(node) = graph.node(id) else {
            continue;
        };
        if node.is_bubble() || !node.contains_genome(genome) {
            continue;
        }
        path.nodes.push(id);
        path.offsets.push(path.length);
        path.length += node.size();
    }
    path
}

/// The sequence node holding base `base` of `genome`, or `None` when the
/// genome is shorter.
pub fn base_position(graph: &SequenceGraph, genome: GenomeId, base: u64) -> Option<NodeId> {
    let path = genome_path(graph, genome);
    path.locate(base).map(|i| path.nodes[i])
}

/// Place annotations on the displayed nodes of `view`. Annotations whose start
/// lies beyond their genome are logged and skipped; an end beyond the genome
/// is clipped.
pub fn map_annotations(view: &OrderedGraph, annotations: &[Annotation]) -> Vec<MappedAnnotation> {
    let owner = view.graph.owner_index();
    let mut paths: BTreeMap<GenomeId, GenomePath> = BTreeMap::new();
    let mut mapped = Vec::with_capacity(annotations.len());

    for annotation in annotations {
        let path = paths
            .entry(annotation.genome)
            .or_insert_with(|| genome_path(view.source(), annotation.genome));
        let Some(first) = path.locate(annotation.start) else {
            warn!(
                "Annotation {} starts at base {} past the end of genome {}",
                annotation.label, annotation.start, annotation.genome
            );
            continue;
        };
        let last = path
            .locate(annotation.end.saturating_sub(1))
            .unwrap_or(path.nodes.len() - 1);

        let mut nodes: Vec<NodeId> = Vec::new();
        for leaf in &path.nodes[first..=last.max(first)] {
            if let Some(&shown) = owner.get(leaf) {
                if nodes.last() != Some(&shown) {
                    nodes.push(shown);
                }
            }
        }
        debug!("Annotation {} covers {} nodes", annotation.label, nodes.len());
        mapped.push(MappedAnnotation {
            annotation: annotation.clone(),
            nodes,
        });
    }
    mapped
}
