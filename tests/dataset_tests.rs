mod common;

use common::{assert_well_ordered, zoom_until_flat};
use gfabubble::*;
use std::collections::BTreeSet;
use std::io::Write;

// a: 1 2 4 5, b: 1 3 4 5, c: 1 3 4
const THREE_GENOMES: &str = "H\tVN:Z:1.0\n\
S\t1\tAAAA\n\
S\t2\tC\n\
S\t3\tG\n\
S\t4\tTTTT\n\
S\t5\tACGTACGT\n\
L\t1\t+\t2\t+\t0M\n\
L\t1\t+\t3\t+\t0M\n\
L\t2\t+\t4\t+\t0M\n\
L\t3\t+\t4\t+\t0M\n\
L\t4\t+\t5\t+\t0M\n\
P\ta\t1+,2+,4+,5+\t*\n\
P\tb\t1+,3+,4+,5+\t*\n\
P\tc\t1+,3+,4+\t*\n";

fn write_gfa(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(text.as_bytes()).unwrap();
    file
}

fn load(config: FilterConfig) -> (tempfile::NamedTempFile, Dataset) {
    let file = write_gfa(THREE_GENOMES);
    let dataset = Dataset::load_gfa(file.path(), config).expect("Failed to load GFA");
    (file, dataset)
}

fn has_phylo_bubble(node: &GraphNode) -> bool {
    matches!(node.bubble_kind(), Some(BubbleKind::Phylo { .. }))
        || node.children().iter().any(has_phylo_bubble)
}

fn tree(dataset: &Dataset) -> PhyloTree {
    let mut tree = PhyloTree::new();
    let a = tree.add_leaf("a", 0.1);
    let b = tree.add_leaf("b", 0.2);
    let c = tree.add_leaf("c", 0.3);
    let ab = tree.add_internal(a, b, 0.05);
    tree.add_internal(ab, c, 0.0);
    assert_eq!(tree.resolve(dataset.registry()), 0);
    tree
}

#[test]
fn test_load_gfa_dataset() {
    let (_file, dataset) = load(FilterConfig::default());

    println!(
        "Loaded graph: {} nodes, {} edges, {} genomes",
        dataset.graph().len(),
        dataset.graph().edge_count(),
        dataset.registry().len()
    );
    assert_eq!(dataset.graph().len(), 5);
    assert_eq!(dataset.graph().edge_count(), 5);
    assert_eq!(dataset.registry().len(), 3);
    let c = dataset.genome_ids(["c"]).unwrap();
    assert!(!dataset.graph().node(5).unwrap().genomes.is_superset(&c));

    // the split at 1 is a graph bubble, then 1, bubble, 4, 5 form one run
    assert_eq!(dataset.main_view().len(), 1);
}

#[test]
fn test_gfa_without_genomes_is_rejected() {
    let file = write_gfa("H\tVN:Z:1.0\nS\t1\tAAAA\nS\t2\tCC\nL\t1\t+\t2\t+\t0M\n");
    let result = Dataset::load_gfa(file.path(), FilterConfig::default());
    assert!(matches!(result, Err(Error::NoGenomes)), "a graph without paths has no genomes");
}

#[test]
fn test_unknown_genome_name() {
    let (_file, dataset) = load(FilterConfig::default());
    assert!(matches!(
        dataset.genome_ids(["a", "zz"]),
        Err(Error::UnknownGenome(name)) if name == "zz"
    ));
}

#[test]
fn test_compare_and_annotate() {
    let (_file, mut dataset) = load(FilterConfig::default());
    let top = dataset.genome_ids(["a"]).unwrap();
    let bottom = dataset.genome_ids(["b"]).unwrap();
    let (top_view, bottom_view) = dataset.compare(&top, &bottom).unwrap();

    assert_eq!(top_view.order, vec![1, 2, 4, 5]);
    assert_eq!(bottom_view.order, vec![1, 3, 4, 5]);
    assert!(top_view.node(1).unwrap().layout.overlapping);
    assert!(!top_view.node(2).unwrap().layout.overlapping);
    assert!(!bottom_view.node(3).unwrap().layout.overlapping);

    let a = dataset.registry().id("a").unwrap();
    let annotations = vec![
        Annotation { genome: a, start: 4, end: 6, label: "snp".to_string() },
        Annotation { genome: a, start: 100, end: 120, label: "outside".to_string() },
    ];
    let mapped = dataset.annotate(&top_view, &annotations);
    assert_eq!(mapped.len(), 1, "annotation past the genome end is skipped");
    assert_eq!(mapped[0].nodes, vec![2, 4]);
    assert_eq!(base_position(top_view.source(), a, 4), Some(2));
}

#[test]
fn test_align_one_carries_comparison_overlap() {
    let (_file, mut dataset) = load(FilterConfig::default());
    let before = dataset.align_one(&dataset.genome_ids(["b"]).unwrap()).unwrap();
    assert!(before.nodes().all(|n| !n.layout.overlapping), "nothing overlaps before a comparison");

    let top = dataset.genome_ids(["a"]).unwrap();
    let bottom = dataset.genome_ids(["b"]).unwrap();
    dataset.compare(&top, &bottom).unwrap();
    assert!(dataset.main_view().nodes().any(|n| n.layout.overlapping));

    let view = dataset.align_one(&bottom).unwrap();
    println!(
        "Aligned view: {:?}, overlapping {:?}",
        view.order,
        view.nodes().filter(|n| n.layout.overlapping).map(|n| n.id).collect::<Vec<_>>()
    );
    assert_eq!(view.order, vec![1, 3, 4, 5]);
    for id in [1, 4, 5] {
        assert!(view.node(id).unwrap().layout.overlapping, "node {} is shared by a and b", id);
    }
    assert!(!view.node(3).unwrap().layout.overlapping, "node 3 is private to b");
    assert_well_ordered(&view);
}

#[test]
fn test_tree_comparison_zooms_into_phylo_bubbles() {
    let (_file, mut dataset) = load(FilterConfig::default());
    let tree = tree(&dataset);
    dataset.set_tree(tree).unwrap();

    // with only a and b below, no node is private to a clade of the pruned tree
    let top = dataset.genome_ids(["a", "b", "c"]).unwrap();
    let bottom = dataset.genome_ids(["a", "b"]).unwrap();
    let (mut top_view, mut bottom_view) = dataset.compare(&top, &bottom).unwrap();

    assert!(top_view.nodes().any(has_phylo_bubble), "node 2 is private to the (a, b) clade");
    for view in [&top_view, &bottom_view] {
        assert!(view.graph.edges_are_symmetric());
        assert_well_ordered(view);
    }

    let top_steps = zoom_until_flat(&mut top_view);
    let bottom_steps = zoom_until_flat(&mut bottom_view);
    println!("Flattened top in {} steps, bottom in {} steps", top_steps, bottom_steps);
    assert!(top_steps >= 1);

    let top_leaves: BTreeSet<NodeId> = top_view.order.iter().copied().collect();
    assert_eq!(top_leaves, BTreeSet::from([1, 2, 3, 4, 5]));
    let bottom_leaves: BTreeSet<NodeId> = bottom_view.order.iter().copied().collect();
    assert_eq!(bottom_leaves, BTreeSet::from([1, 2, 3, 4, 5]));
}

#[test]
fn test_annotation_on_bubble_maps_to_bubble() {
    let (_file, dataset) = load(FilterConfig::default());
    let a = dataset.registry().id("a").unwrap();
    let annotations = [Annotation { genome: a, start: 0, end: 17, label: "all".to_string() }];
    let mapped = dataset.annotate(dataset.main_view(), &annotations);

    let run = dataset.main_view().order[0];
    assert_eq!(mapped[0].nodes, vec![run]);
}

#[test]
fn test_tree_drives_phylo_bubbles() {
    let (_file, mut dataset) = load(FilterConfig::default());
    let tree = tree(&dataset);
    dataset.set_tree(tree).unwrap();

    // node 2 is private to the (a, b) clade
    let view = dataset.main_view();
    assert_eq!(view.len(), 5);
    let bubble = view.nodes().find(|n| n.is_bubble()).unwrap();
    assert!(matches!(bubble.bubble_kind(), Some(BubbleKind::Phylo { .. })));
    assert_eq!(bubble.leaf_ids(), vec![2]);

    let id = bubble.id;
    let order = dataset.zoom_main(id).unwrap();
    assert_eq!(order.len(), 5);
    assert!(order.contains(&2));
    assert!(!order.contains(&id));
}

#[test]
fn test_selected_clade_and_metadata_selection() {
    let (_file, mut dataset) = load(FilterConfig::default());
    let tree = tree(&dataset);
    dataset.set_tree(tree).unwrap();
    let root = dataset.tree().unwrap().root().unwrap();
    let ab = dataset.tree().unwrap().child(root, 0);
    dataset.tree_mut().unwrap().set_selected(ab, true);
    assert_eq!(dataset.selected_genomes(), dataset.genome_ids(["a", "b"]).unwrap());

    let metadata = "genome\tcountry\na\tPeru\nb\tChile\nc\tPeru\n";
    let table = MetadataTable::read_tsv(metadata.as_bytes(), dataset.registry()).unwrap();
    dataset.set_metadata(table);
    let peru = dataset.genomes_where("country", "Peru");
    assert_eq!(peru, dataset.genome_ids(["a", "c"]).unwrap());

    let view = dataset.align_one(&peru).unwrap();
    let leaves: BTreeSet<NodeId> = view.graph.leaf_ids().into_iter().collect();
    assert_eq!(leaves, BTreeSet::from([1, 2, 3, 4, 5]));
}

#[test]
fn test_genome_colors_are_stable() {
    let (_file, dataset) = load(FilterConfig::default());
    let a = dataset.registry().id("a").unwrap();
    assert_eq!(dataset.registry().color(a), Some(genome_color("a")));
    assert_eq!(dataset.registry().color(99), None);
}
