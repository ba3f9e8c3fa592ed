use std::collections::BTreeSet;

use proptest::prelude::*;

use tributary::index::LineageIndex;
use tributary::lineage::{
    compact_branches, GeneratingProcedure, IndexStats, ResolvedInput, TraceabilityRecord,
    TraceabilityResolver,
};
use tributary::metadata::{MetadataStore, ProcedureMetadata, TableMasterRecord};
use tributary::Diagnostic;

fn procedure(id: &str, inputs: &[&str], outputs: &[&str]) -> ProcedureMetadata {
    ProcedureMetadata {
        procedure_id: id.to_string(),
        procedure_name: format!("usp_{}", id.to_lowercase()),
        inputs: inputs.iter().map(|s| s.to_string()).collect(),
        outputs: outputs.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

fn master(pairs: &[(&str, &str)]) -> Vec<TableMasterRecord> {
    pairs
        .iter()
        .map(|(id, name)| TableMasterRecord::new(*id, *name))
        .collect()
}

fn cycle_store() -> MetadataStore {
    MetadataStore::new(
        master(&[("T1", "A"), ("T2", "B")]),
        vec![
            procedure("P1", &["T2"], &["T1"]),
            procedure("P2", &["T1"], &["T2"]),
        ],
    )
}

#[test]
fn test_end_to_end_example() {
    let store = MetadataStore::new(
        master(&[("T1", "raw"), ("T2", "derived")]),
        vec![procedure("P1", &["T1"], &["T2"])],
    );
    let mut resolver = TraceabilityResolver::new(&store);
    let all = resolver.resolve_all();

    assert_eq!(all.keys().collect::<Vec<_>>(), vec!["derived"]);
    assert_eq!(
        all["derived"],
        TraceabilityRecord {
            is_origin: false,
            origin_tables: BTreeSet::from(["raw".to_string()]),
            depth: 1,
            generating_procedures: vec![GeneratingProcedure {
                procedure_id: "P1".into(),
                procedure_name: "usp_p1".into(),
                inputs: vec!["raw".into()],
                inputs_resolved: vec![ResolvedInput {
                    table: "raw".into(),
                    depth: 0,
                    is_origin: true,
                    cycle_break: false,
                }],
                external_sources: false,
                creates_tables: false,
                depth_contribution: 1,
            }],
        }
    );
    assert!(resolver.diagnostics().is_empty());
}

#[test]
fn test_multiple_generators_take_deepest() {
    let store = MetadataStore::new(
        master(&[("T1", "raw"), ("T2", "mid"), ("T3", "top"), ("T4", "side")]),
        vec![
            procedure("P1", &["T1"], &["T2"]),
            procedure("P2", &["T2"], &["T3"]),
            procedure("P3", &["T4"], &["T3"]),
        ],
    );
    let mut resolver = TraceabilityResolver::new(&store);
    let top = resolver.resolve("top");

    assert_eq!(top.depth, 2);
    assert_eq!(
        top.origin_tables,
        BTreeSet::from(["raw".to_string(), "side".to_string()])
    );
    assert_eq!(
        top.generating_procedures
            .iter()
            .map(|g| g.depth_contribution)
            .collect::<Vec<_>>(),
        vec![2, 1]
    );
}

#[test]
fn test_two_table_cycle_terminates() {
    let mut resolver = TraceabilityResolver::new(&cycle_store());
    let a = resolver.resolve("A");

    assert!(!a.is_origin);
    assert!(a.origin_tables.contains("A"));
    assert_eq!(a.depth, 2);

    let b_input = &a.generating_procedures[0].inputs_resolved[0];
    assert_eq!(b_input.table, "B");
    assert!(!b_input.cycle_break);

    assert!(resolver.diagnostics().contains(&Diagnostic::CyclicDependency {
        entry: "A".into(),
        table: "A".into(),
    }));
    assert_eq!(
        resolver.cyclic_tables(),
        BTreeSet::from(["A".to_string(), "B".to_string()])
    );
}

#[test]
fn test_single_query_matches_full_index_under_cycles() {
    let store = cycle_store();

    let mut fresh = TraceabilityResolver::new(&store);
    let all = fresh.resolve_all();

    let mut b_first = TraceabilityResolver::new(&store);
    let b = b_first.resolve("B");
    let a = b_first.resolve("A");

    assert_eq!(b, all["B"]);
    assert_eq!(a, all["A"]);
    assert_eq!(b_first.resolve_all(), all);
}

#[test]
fn test_cycle_break_is_not_permanent() {
    let mut resolver = TraceabilityResolver::new(&cycle_store());
    resolver.resolve("A");
    // B was broken as an origin while resolving A; queried directly it is not.
    let b = resolver.resolve("B");
    assert!(!b.is_origin);
    assert!(b.origin_tables.contains("B"));
}

#[test]
fn test_unknown_reference_becomes_placeholder_origin() {
    let store = MetadataStore::new(
        master(&[("T2", "derived")]),
        vec![procedure("P1", &["T9"], &["T2"])],
    );
    let mut resolver = TraceabilityResolver::new(&store);
    let derived = resolver.resolve("derived");

    assert_eq!(derived.origin_tables, BTreeSet::from(["T9".to_string()]));
    assert_eq!(derived.depth, 1);
    assert_eq!(
        resolver.diagnostics(),
        vec![Diagnostic::UnknownTableReference {
            procedure: "P1".into(),
            reference: "T9".into(),
        }]
    );
}

#[test]
fn test_names_are_accepted_as_references() {
    let store = MetadataStore::new(
        master(&[("T1", "raw"), ("T2", "derived")]),
        vec![procedure("P1", &["raw"], &["derived"])],
    );
    let mut resolver = TraceabilityResolver::new(&store);
    assert_eq!(resolver.produced_tables(), vec!["derived"]);
    assert!(resolver.diagnostics().is_empty());
    assert_eq!(
        resolver.resolve("derived").origin_tables,
        BTreeSet::from(["raw".to_string()])
    );
}

#[test]
fn test_compact_branches_and_stats() {
    let store = MetadataStore::new(
        master(&[("T1", "raw"), ("T2", "mid"), ("T3", "top")]),
        vec![
            procedure("P1", &["T1"], &["T2"]),
            procedure("P2", &["T2", "T1"], &["T3"]),
        ],
    );
    let mut resolver = TraceabilityResolver::new(&store);
    let index = LineageIndex::from_records(resolver.resolve_all(), &store);

    assert_eq!(
        compact_branches(&index, "top", 20),
        vec!["SP:P2 → SP:P1 → T:raw", "SP:P2 → T:raw"]
    );
    assert_eq!(compact_branches(&index, "top", 1).len(), 1);
    assert_eq!(compact_branches(&index, "raw", 20), vec!["T:raw"]);

    let stats = IndexStats::compute(&index, 5);
    assert_eq!(stats.total_tables, 2);
    assert_eq!(stats.generated_tables, 2);
    assert_eq!(stats.generator_relations, 2);
    assert_eq!(stats.max_depth, 2);
    assert_eq!(stats.cyclic_tables, 0);
    assert_eq!(
        stats.most_complex,
        vec![("mid".to_string(), 1), ("top".to_string(), 1)]
    );
}

#[test]
fn test_branches_stop_at_cycles() {
    let store = cycle_store();
    let mut resolver = TraceabilityResolver::new(&store);
    let index = LineageIndex::from_records(resolver.resolve_all(), &store);

    insta::assert_snapshot!(compact_branches(&index, "A", 20).join(" | "), @"SP:P1 → SP:P2 → T:A");
    assert_eq!(IndexStats::compute(&index, 5).cyclic_tables, 2);
}

/// `(output, inputs)` pairs over tables `t0..t{n}`.
fn metadata_strategy(tables: usize) -> impl Strategy<Value = Vec<(usize, Vec<usize>)>> {
    prop::collection::vec(
        (0..tables, prop::collection::vec(0..tables, 0..4)),
        0..12,
    )
}

fn build_store(tables: usize, procs: &[(usize, Vec<usize>)], acyclic: bool) -> MetadataStore {
    let master = (0..tables)
        .map(|i| TableMasterRecord::new(format!("T{}", i), format!("t{}", i)))
        .collect();
    let procedures = procs
        .iter()
        .enumerate()
        .map(|(i, (output, inputs))| ProcedureMetadata {
            procedure_id: format!("P{}", i),
            procedure_name: format!("usp_{}", i),
            inputs: inputs
                .iter()
                .filter(|&&input| !acyclic || input < *output)
                .map(|input| format!("T{}", input))
                .collect(),
            outputs: vec![format!("T{}", output)],
            ..Default::default()
        })
        .collect();
    MetadataStore::new(master, procedures)
}

proptest! {
    #[test]
    fn prop_depth_recurrence_on_acyclic_metadata(procs in metadata_strategy(8)) {
        let store = build_store(8, &procs, true);
        let mut resolver = TraceabilityResolver::new(&store);
        let all = resolver.resolve_all();

        for (table, record) in &all {
            prop_assert!(!record.is_origin, "{} is produced", table);
            let expected = record
                .generating_procedures
                .iter()
                .map(|g| {
                    g.inputs
                        .iter()
                        .map(|input| resolver.resolve(input).depth + 1)
                        .max()
                        .unwrap_or(1)
                })
                .max()
                .unwrap_or(1);
            prop_assert_eq!(record.depth, expected);
        }
        for i in 0..8 {
            let name = format!("t{}", i);
            if !resolver.is_produced(&name) {
                let record = resolver.resolve(&name);
                prop_assert!(record.is_origin);
                prop_assert_eq!(record.depth, 0);
            }
        }
        prop_assert!(resolver.diagnostics().is_empty());
    }

    #[test]
    fn prop_resolve_agrees_with_resolve_all(procs in metadata_strategy(6)) {
        let store = build_store(6, &procs, false);
        let all = TraceabilityResolver::new(&store).resolve_all();

        let mut reversed = TraceabilityResolver::new(&store);
        for table in all.keys().rev() {
            prop_assert_eq!(&reversed.resolve(table), &all[table]);
        }
        for (table, record) in &all {
            prop_assert_eq!(&TraceabilityResolver::new(&store).resolve(table), record);
            prop_assert!(record.depth <= 6);
        }
    }
}
