//! GFA loading into a [`SequenceGraph`].
//!
//! Genome membership comes from `ORI:Z:` tags on the header and segments and
//! from `P`/`W` lines. Link orientation is ignored: every `L` line and every
//! pair of consecutive path steps becomes a forward edge.

use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Error, Result};
use crate::genome::GenomeRegistry;
use crate::graph::SequenceGraph;
use crate::node::GraphNode;
use crate::{GenomeId, NodeId};

struct Segment {
    name: String,
    length: u32,
    genomes: BTreeSet<GenomeId>,
}

/// Genome names listed in an `ORI:Z:` tag.
fn origin_tag<'a>(fields: &[&'a str]) -> Vec<&'a str> {
    fields
        .iter()
        .filter_map(|f| f.strip_prefix("ORI:Z:"))
        .flat_map(|list| list.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
}

fn segment_length(fields: &[&str], line: usize) -> Result<u32> {
    let length = if fields[2] == "*" {
        fields
            .iter()
            .find_map(|f| f.strip_prefix("LN:i:"))
            .ok_or_else(|| Error::Parse {
                line,
                message: format!("segment {} has no sequence and no LN tag", fields[1]),
            })?
            .parse::<u64>()
            .map_err(|e| Error::Parse {
                line,
                message: format!("bad LN tag: {}", e),
            })?
    } else {
        fields[2].len() as u64
    };
    Ok(length.min(u32::MAX as u64) as u32)
}

/// Split a `P` line segment list (`1+,2-,3+`) into segment names.
fn path_steps(list: &str) -> Vec<&str> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.strip_suffix(['+', '-']).unwrap_or(s))
        .collect()
}

/// Split a `W` line walk (`>1<2>3`) into segment names.
fn walk_steps(walk: &str) -> Vec<&str> {
    walk.split(['>', '<']).filter(|s| !s.is_empty()).collect()
}

/// Parse a GFA stream. Genomes are registered in `registry` in the order they
/// are first seen.
pub fn parse_gfa<R: BufRead>(reader: R, registry: &mut GenomeRegistry) -> Result<SequenceGraph> {
    info!("Loading GFA file...");

    let mut segments: Vec<Segment> = Vec::new();
    let mut links: Vec<(String, String, usize)> = Vec::new();
    let mut paths: Vec<(GenomeId, Vec<String>)> = Vec::new();

    // First pass: collect records
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let number = index + 1;
        let fields: Vec<&str> = line.split('\t').collect();
        match fields[0] {
            "H" => {
                for name in origin_tag(&fields) {
                    registry.register(name);
                }
            }
            "S" => {
                if fields.len() < 3 {
                    return Err(Error::Parse {
                        line: number,
                        message: "segment line needs a name and a sequence".to_string(),
                    });
                }
                let length = segment_length(&fields, number)?;
                let genomes = origin_tag(&fields)
                    .into_iter()
                    .map(|name| registry.register(name))
                    .collect();
                segments.push(Segment {
                    name: fields[1].to_string(),
                    length,
                    genomes,
                });
            }
            "L" if fields.len() >= 5 => {
                links.push((fields[1].to_string(), fields[3].to_string(), number));
            }
            "P" if fields.len() >= 3 => {
                let genome = registry.register(fields[1]);
                let steps = path_steps(fields[2]).into_iter().map(String::from).collect();
                paths.push((genome, steps));
            }
            "W" if fields.len() >= 7 => {
                let name = format!("{}#{}#{}", fields[1], fields[2], fields[3]);
                let genome = registry.register(&name);
                let steps = walk_steps(fields[6]).into_iter().map(String::from).collect();
                paths.push((genome, steps));
            }
            "L" | "P" | "W" => {
                warn!("Line {}: truncated {} record skipped", number, fields[0]);
            }
            _ => {}
        }
    }

    let numeric = segments
        .iter()
        .all(|s| s.name.parse::<NodeId>().is_ok_and(|id| id > 0));
    let mut ids: FxHashMap<String, NodeId> = FxHashMap::default();
    for (i, segment) in segments.iter().enumerate() {
        let id = if numeric {
            segment.name.parse::<NodeId>().unwrap_or(i as NodeId + 1)
        } else {
            i as NodeId + 1
        };
        ids.insert(segment.name.clone(), id);
    }
    if !numeric {
        debug!("Segment names are not all positive integers, numbering them sequentially");
    }
    info!("Found {} segments", segments.len());

    // Second pass: path membership and edges
    let mut memberships: FxHashMap<NodeId, BTreeSet<GenomeId>> = FxHashMap::default();
    let mut edges: BTreeSet<(NodeId, NodeId)> = BTreeSet::new();
    for (name, target, line) in &links {
        match (ids.get(name), ids.get(target)) {
            (Some(&from), Some(&to)) if from != to => {
                edges.insert((from, to));
            }
            (Some(_), Some(_)) => warn!("Line {}: self loop on {} skipped", line, name),
            _ => warn!("Line {}: link {} -> {} to unknown segment skipped", line, name, target),
        }
    }
    for (genome, steps) in &paths {
        let mut previous: Option<NodeId> = None;
        for step in steps {
            let Some(&id) = ids.get(step) else {
                warn!("Path step {} names an unknown segment", step);
                continue;
            };
            memberships.entry(id).or_default().insert(*genome);
            if let Some(prev) = previous.filter(|&p| p != id) {
                edges.insert((prev, id));
            }
            previous = Some(id);
        }
    }

    let mut graph = SequenceGraph::with_genomes(registry.all());
    for segment in segments {
        let id = ids[&segment.name];
        let mut genomes = segment.genomes;
        if let Some(extra) = memberships.remove(&id) {
            genomes.extend(extra);
        }
        if genomes.is_empty() {
            debug!("Segment {} belongs to no genome", segment.name);
        }
        graph.add_node(GraphNode::sequence(id, segment.length, genomes));
    }
    for &(from, to) in &edges {
        graph.add_edge(from, to)?;
    }

    info!(
        "Found {} genomes, {} paths, {} edges",
        registry.len(),
        paths.len(),
        graph.edge_count()
    );
    Ok(graph)
}

/// Load a GFA file from disk.
pub fn load_gfa(path: &Path, registry: &mut GenomeRegistry) -> Result<SequenceGraph> {
    let file = File::open(path)?;
    parse_gfa(BufReader::new(file), registry)
}
