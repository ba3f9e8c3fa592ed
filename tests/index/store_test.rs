use std::fs;

use tempfile::TempDir;

use tributary::index::{IndexStore, JsonIndexStore, LineageIndex, SqliteIndexStore};
use tributary::lineage::TraceabilityResolver;
use tributary::metadata::{MetadataStore, ProcedureMetadata, TableMasterRecord};

fn sample_index() -> LineageIndex {
    let store = MetadataStore::new(
        vec![
            TableMasterRecord::new("tb_00001", "raw"),
            TableMasterRecord::new("tb_00002", "derived"),
            TableMasterRecord::new("tb_00003", "mart"),
        ],
        vec![
            ProcedureMetadata {
                procedure_id: "SP_00001".into(),
                procedure_name: "usp_derive".into(),
                inputs: vec!["tb_00001".into()],
                outputs: vec!["tb_00002".into()],
                ..Default::default()
            },
            ProcedureMetadata {
                procedure_id: "SP_00002".into(),
                procedure_name: "usp_mart".into(),
                inputs: vec!["tb_00002".into(), "tb_00001".into()],
                outputs: vec!["tb_00003".into()],
                external_sources: true,
                ..Default::default()
            },
        ],
    );
    let records = TraceabilityResolver::new(&store).resolve_all();
    LineageIndex::from_records(records, &store)
}

#[test]
fn test_json_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = JsonIndexStore::new(dir.path().join("gold").join("index.json"));
    let index = sample_index();

    assert!(store.load("abc").unwrap().is_none());
    store.save("abc", &index).unwrap();

    assert!(store.exists());
    assert_eq!(store.load("abc").unwrap(), Some(index.clone()));
    assert_eq!(store.read().unwrap(), index);
}

#[test]
fn test_json_stale_fingerprint() {
    let dir = TempDir::new().unwrap();
    let store = JsonIndexStore::new(dir.path().join("index.json"));
    store.save("old", &sample_index()).unwrap();

    assert!(store.load("new").unwrap().is_none());
    // The document stays readable for reporting.
    assert_eq!(store.read().unwrap().len(), 2);
}

#[test]
fn test_json_save_leaves_no_temporary_files() {
    let dir = TempDir::new().unwrap();
    let store = JsonIndexStore::new(dir.path().join("index.json"));
    store.save("abc", &sample_index()).unwrap();
    store.save("def", &sample_index()).unwrap();

    let mut names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["index.json", "index.json.fingerprint"]);
}

#[test]
fn test_json_document_layout() {
    let dir = TempDir::new().unwrap();
    let store = JsonIndexStore::new(dir.path().join("index.json"));
    store.save("abc", &sample_index()).unwrap();

    let text = fs::read_to_string(store.path()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert_eq!(value["derived"]["table_id"], "tb_00002");
    assert_eq!(value["derived"]["traceability"]["depth"], 1);
    assert_eq!(
        value["mart"]["traceability"]["origin_tables"],
        serde_json::json!(["raw"])
    );
    assert_eq!(
        value["mart"]["traceability"]["generating_procedures"][0]["external_sources"],
        true
    );
    assert!(text.find("\"derived\"").unwrap() < text.find("\"mart\"").unwrap());
    assert!(text.ends_with('\n'));
}

#[test]
fn test_json_output_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let first = JsonIndexStore::new(dir.path().join("a.json"));
    let second = JsonIndexStore::new(dir.path().join("b.json"));
    first.save("abc", &sample_index()).unwrap();
    second.save("abc", &sample_index()).unwrap();

    assert_eq!(
        fs::read(first.path()).unwrap(),
        fs::read(second.path()).unwrap()
    );
}

#[test]
fn test_sqlite_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache").join("index.db");
    let index = sample_index();

    {
        let cache = SqliteIndexStore::open(&path).unwrap();
        cache.save("abc", &index).unwrap();
    }

    let cache = SqliteIndexStore::open(&path).unwrap();
    assert_eq!(cache.fingerprint().unwrap().as_deref(), Some("abc"));
    assert_eq!(cache.entry_count().unwrap(), 2);
    assert_eq!(cache.load("abc").unwrap(), Some(index));
}

#[test]
fn test_sqlite_fingerprint_invalidates() {
    let cache = SqliteIndexStore::open_in_memory().unwrap();
    cache.save("abc", &sample_index()).unwrap();

    assert!(cache.load("def").unwrap().is_none());

    cache.save("def", &LineageIndex::default()).unwrap();
    assert_eq!(cache.entry_count().unwrap(), 0);
    assert_eq!(cache.load("def").unwrap(), Some(LineageIndex::default()));
}
