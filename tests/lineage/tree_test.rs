use proptest::prelude::*;
use serde_json::json;

use tributary::lineage::{PathBuilder, PathStep, TreeNode, DEFAULT_MAX_DEPTH};
use tributary::metadata::{DependencyRecord, MetadataStore, ProcedureMetadata, TableMasterRecord};

/// Procedures named `usp_<output>`, one per `(output, inputs)` pair.
fn fixture(producers: &[(&str, &[&str])]) -> (MetadataStore, Vec<DependencyRecord>) {
    let mut names: Vec<&str> = producers
        .iter()
        .flat_map(|(output, inputs)| std::iter::once(*output).chain(inputs.iter().copied()))
        .collect();
    names.sort();
    names.dedup();

    let master = names
        .iter()
        .map(|name| TableMasterRecord::new(format!("id_{}", name), *name))
        .collect();
    let procedures = producers
        .iter()
        .enumerate()
        .map(|(i, (output, inputs))| ProcedureMetadata {
            procedure_id: format!("SP_{:05}", i + 1),
            procedure_name: format!("usp_{}", output),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: vec![output.to_string()],
            ..Default::default()
        })
        .collect();
    let deps = producers
        .iter()
        .map(|(output, _)| DependencyRecord::new(format!("usp_{}", output), *output))
        .collect();

    (MetadataStore::new(master, procedures), deps)
}

#[test]
fn test_depth_bound_on_chain() {
    let (store, deps) = fixture(&[("t1", &["t0"]), ("t2", &["t1"]), ("t3", &["t2"])]);
    let tree = PathBuilder::new(&store, &deps).build_tree("t3", 2);

    assert_eq!(tree.levels.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(tree.max_depth_reached, 2);
    assert!(tree.truncated.contains("t0"));
    assert!(tree.all_origin_tables.is_empty());
    assert!(tree.nodes().all(|(_, node)| node.name() != "t0"));
}

#[test]
fn test_shared_table_expanded_once_at_shortest_level() {
    let (store, deps) = fixture(&[("r", &["x", "a"]), ("a", &["b"]), ("b", &["x"])]);
    let tree = PathBuilder::new(&store, &deps).build_tree("r", DEFAULT_MAX_DEPTH);

    let x_nodes: Vec<(usize, &TreeNode)> = tree
        .nodes()
        .filter(|(_, node)| matches!(node, TreeNode::Origin { table, .. } if table == "x"))
        .collect();
    assert_eq!(x_nodes.len(), 1);
    assert_eq!(x_nodes[0].0, 1);
    assert_eq!(tree.max_depth_reached, 2);
    assert_eq!(
        tree.all_procedures.iter().collect::<Vec<_>>(),
        vec!["usp_a", "usp_b", "usp_r"]
    );
}

#[test]
fn test_queued_table_at_bound_is_not_truncated() {
    let (store, deps) = fixture(&[("r", &["a", "b"]), ("a", &["b"])]);
    let tree = PathBuilder::new(&store, &deps).build_tree("r", 1);

    assert!(tree.truncated.is_empty());
    assert_eq!(tree.max_depth_reached, 1);
    assert_eq!(
        tree.all_origin_tables.iter().collect::<Vec<_>>(),
        vec!["b"]
    );
    let b_levels: Vec<usize> = tree
        .nodes()
        .filter(|(_, node)| node.name() == "b")
        .map(|(level, _)| level)
        .collect();
    assert_eq!(b_levels, vec![1]);
}

#[test]
fn test_cycle_terminates() {
    let (store, deps) = fixture(&[("a", &["b"]), ("b", &["a"])]);
    let tree = PathBuilder::new(&store, &deps).build_tree("a", DEFAULT_MAX_DEPTH);

    assert_eq!(tree.nodes().count(), 2);
    assert!(tree.truncated.is_empty());
    assert!(tree.all_origin_tables.is_empty());
}

#[test]
fn test_origin_root() {
    let (store, deps) = fixture(&[("derived", &["raw"])]);
    let tree = PathBuilder::new(&store, &deps).build_tree("raw", DEFAULT_MAX_DEPTH);

    assert_eq!(
        tree.levels[&0],
        vec![TreeNode::Origin {
            table: "raw".into(),
            path: vec![PathStep::Table("raw".into())],
        }]
    );
    assert_eq!(tree.max_depth_reached, 0);
}

#[test]
fn test_dependency_procedure_names_match_exactly() {
    let (store, _) = fixture(&[("derived", &["raw"])]);
    let deps = vec![DependencyRecord::new("USP_DERIVED", "derived")];
    let tree = PathBuilder::new(&store, &deps).build_tree("derived", DEFAULT_MAX_DEPTH);

    // Names are matched exactly; only ids are case-insensitive.
    assert!(matches!(
        tree.levels[&0][0],
        TreeNode::ProcedureUnresolved { .. }
    ));
}

#[test]
fn test_tree_render() {
    let (store, deps) = fixture(&[("derived", &["raw"])]);
    let tree = PathBuilder::new(&store, &deps).build_tree("derived", DEFAULT_MAX_DEPTH);

    insta::assert_snapshot!(tree.to_string(), @r"
    Lineage of derived
      max depth reached: 1
      procedures: 1
      origin tables: 1

    Level 0
      PROCEDURE usp_derived (SP_00001) -> derived
        inputs: raw
        external sources: false, creates tables: false
        path: T:derived → SP:usp_derived

    Level 1
      ORIGIN raw
        path: T:derived → SP:usp_derived → T:raw
    ");
}

#[test]
fn test_tree_json_shape() {
    let (store, deps) = fixture(&[("derived", &["raw"])]);
    let tree = PathBuilder::new(&store, &deps).build_tree("derived", DEFAULT_MAX_DEPTH);
    let value = serde_json::to_value(&tree).unwrap();

    assert_eq!(
        value["levels"]["1"][0],
        json!({
            "kind": "ORIGIN",
            "table": "raw",
            "path": ["T:derived", "SP:usp_derived", "T:raw"],
        })
    );
    assert_eq!(value["levels"]["0"][0]["kind"], "PROCEDURE");
    assert_eq!(value["truncated"], json!([]));
}

#[test]
fn test_critical_routes() {
    let store = MetadataStore::new(
        vec![
            TableMasterRecord::new("T1", "raw"),
            TableMasterRecord::new("T2", "stage"),
            TableMasterRecord::new("T3", "mart"),
        ],
        vec![
            ProcedureMetadata {
                procedure_id: "P1".into(),
                procedure_name: "usp_load".into(),
                inputs: vec!["T1".into()],
                outputs: vec!["T2".into()],
                external_sources: true,
                ..Default::default()
            },
            ProcedureMetadata {
                procedure_id: "P2".into(),
                procedure_name: "usp_build".into(),
                inputs: vec!["T2".into()],
                outputs: vec!["T3".into()],
                creates_tables: true,
                ..Default::default()
            },
        ],
    );
    let deps = vec![
        DependencyRecord::new("usp_load", "stage"),
        DependencyRecord::new("usp_build", "mart"),
    ];
    let tree = PathBuilder::new(&store, &deps).build_tree("mart", DEFAULT_MAX_DEPTH);

    let external: Vec<(usize, &str)> = tree
        .external_source_procedures()
        .into_iter()
        .map(|(level, node)| (level, node.name()))
        .collect();
    let creating: Vec<(usize, &str)> = tree
        .table_creating_procedures()
        .into_iter()
        .map(|(level, node)| (level, node.name()))
        .collect();

    assert_eq!(external, vec![(1, "usp_load")]);
    assert_eq!(creating, vec![(0, "usp_build")]);
}

proptest! {
    #[test]
    fn prop_levels_respect_bound(
        edges in prop::collection::vec((0usize..8, prop::collection::vec(0usize..8, 0..3)), 0..12),
        max_depth in 0usize..5,
    ) {
        let names: Vec<String> = (0..8).map(|i| format!("t{}", i)).collect();
        let input_names: Vec<Vec<&str>> = edges
            .iter()
            .map(|(_, inputs)| inputs.iter().map(|&i| names[i].as_str()).collect())
            .collect();
        let producers: Vec<(&str, &[&str])> = edges
            .iter()
            .zip(&input_names)
            .map(|((output, _), inputs)| (names[*output].as_str(), inputs.as_slice()))
            .collect();
        let (store, deps) = fixture(&producers);
        let tree = PathBuilder::new(&store, &deps).build_tree("t0", max_depth);

        prop_assert!(tree.max_depth_reached <= max_depth);
        prop_assert!(tree.levels.keys().all(|&level| level <= max_depth));

        let mut origins = std::collections::HashSet::new();
        for (level, node) in tree.nodes() {
            let path = node.path();
            prop_assert_eq!(&path[0], &PathStep::Table("t0".to_string()));
            match node {
                TreeNode::Origin { table, .. } => {
                    prop_assert_eq!(path.len(), 2 * level + 1);
                    prop_assert!(origins.insert(table.clone()), "{} expanded twice", table);
                    prop_assert!(!tree.truncated.contains(table));
                }
                TreeNode::Procedure { output, .. }
                | TreeNode::ProcedureUnresolved { output, .. } => {
                    prop_assert_eq!(path.len(), 2 * level + 2);
                    prop_assert!(!tree.truncated.contains(output));
                }
            }
        }
    }
}
