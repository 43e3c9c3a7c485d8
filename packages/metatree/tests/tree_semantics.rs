use std::sync::Arc;

use metatree::metatree_backend::{Backend, InMemoryBackend};
use metatree::{Error, Query, QueryValue, Tree, TreeOptions};
use serde_json::json;

fn open(backend: &Arc<InMemoryBackend>) -> Tree {
    Tree::open_with_backend(
        backend.clone(),
        "/models",
        TreeOptions::new().keys(["model", "version", "stage"]),
    )
    .unwrap()
}

#[test]
fn key_order_in_structured_queries_does_not_matter() {
    let backend = Arc::new(InMemoryBackend::new());
    let tree = open(&backend);
    tree.resolve("m1/v1/train", true).unwrap();

    let forward = tree
        .search(json!({"model": "m1", "version": "v1", "stage": "train"}))
        .unwrap();
    let backward = tree
        .search(json!({"stage": "train", "version": "v1", "model": "m1"}))
        .unwrap();
    assert_eq!(forward, backward);
    assert_eq!(forward.path(), "/models/m1/v1/train");
}

#[test]
fn create_is_idempotent() {
    let backend = Arc::new(InMemoryBackend::new());
    let tree = open(&backend);

    let first = tree.resolve("m1/v1", true).unwrap();
    first.update([("owner", "alice")]).unwrap();
    let second = tree.resolve("m1/v1", true).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        second.metadata().unwrap().get_string("owner").as_deref(),
        Some("alice")
    );
    assert_eq!(
        tree.search("m1").unwrap().children().unwrap().into_iter().collect::<Vec<_>>(),
        vec!["v1".to_string()]
    );
}

#[test]
fn undeclared_children_are_unreachable() {
    let backend = Arc::new(InMemoryBackend::new());
    let tree = open(&backend);
    tree.resolve("m1", true).unwrap();
    backend.mkdir("/models/m1/rogue").unwrap();

    match tree.search("m1/rogue") {
        Err(Error::UnlinkedChild { child, parent }) => {
            assert_eq!(child, "rogue");
            assert_eq!(parent, "/models/m1");
        }
        other => panic!("expected UnlinkedChild, got {:?}", other),
    }
    // Creating goes through the same check once the directory exists.
    assert!(matches!(
        tree.resolve("m1/rogue", true),
        Err(Error::UnlinkedChild { .. })
    ));
}

#[test]
fn missing_nodes_are_not_created_by_search() {
    let backend = Arc::new(InMemoryBackend::new());
    let tree = open(&backend);

    assert!(matches!(
        tree.search("m1"),
        Err(Error::NodeNotFound { path }) if path == "/models/m1"
    ));
    assert!(!backend.exists("/models/m1").unwrap());
}

#[test]
fn gaps_and_unknown_keys_are_malformed() {
    let backend = Arc::new(InMemoryBackend::new());
    let tree = open(&backend);
    tree.resolve("m1/v1/train", true).unwrap();

    assert!(matches!(
        tree.search(json!({"model": "m1", "stage": "train"})),
        Err(Error::MalformedQuery { .. })
    ));
    assert!(matches!(
        tree.search(json!({"model": "m1", "flavor": "x"})),
        Err(Error::MalformedQuery { .. })
    ));
    assert!(matches!(
        tree.search("m1/v1/train/extra"),
        Err(Error::MalformedQuery { .. })
    ));
}

#[test]
fn update_rejects_children_and_keeps_them() {
    let backend = Arc::new(InMemoryBackend::new());
    let tree = open(&backend);
    tree.resolve("m1/v1", true).unwrap();
    let model = tree.search("m1").unwrap();

    assert!(matches!(
        model.update([("children", "oops"), ("owner", "bob")]),
        Err(Error::ReservedKeyViolation { .. })
    ));
    let metadata = model.metadata().unwrap();
    assert!(metadata.has_child("v1"));
    assert!(!metadata.contains_key("owner"));
}

#[test]
fn update_stringifies_and_round_trips() {
    let backend = Arc::new(InMemoryBackend::new());
    let tree = open(&backend);
    let node = tree.resolve("m1/v1/train", true).unwrap();

    let written = node.update([("epochs", 12.to_string()), ("lr", 0.5.to_string())]).unwrap();
    let read = node.metadata().unwrap();
    assert_eq!(written, read);
    assert_eq!(read.get("epochs"), Some(&json!("12")));
    assert_eq!(read.get_string("lr").as_deref(), Some("0.5"));
}

#[test]
fn model_version_stage_scenario() {
    let backend = Arc::new(InMemoryBackend::new());
    let tree = open(&backend);
    let source = tempfile::tempdir().unwrap();
    let artifact = source.path().join("artifact");
    std::fs::write(&artifact, b"weights").unwrap();

    let train = tree.put("m1/v1/train", &artifact).unwrap();
    assert_eq!(train.list().unwrap(), vec!["artifact".to_string()]);
    assert!(train.is_leaf());

    let version = tree.search("m1/v1").unwrap();
    assert_eq!(version.depth(), 2);
    assert_eq!(version.location().get("version"), Some("v1"));

    tree.search("m1").unwrap().update([("active", "v1")]).unwrap();
    assert_eq!(tree.search("m1/<active>/train").unwrap(), train);
    assert_eq!(
        tree.search(
            Query::new()
                .literal("model", "m1")
                .metadata("version", "active")
                .literal("stage", "train")
        )
        .unwrap(),
        train
    );

    let bytes = metatree::metatree_backend::collect_bytes(tree.get("m1/v1/train/artifact").unwrap())
        .unwrap();
    assert_eq!(&bytes[..], b"weights");
}

#[test]
fn indirection_without_metadata_key_fails() {
    let backend = Arc::new(InMemoryBackend::new());
    let tree = open(&backend);
    tree.resolve("m1/v1", true).unwrap();

    assert!(matches!(
        tree.search("m1/<active>"),
        Err(Error::MetadataKeyNotFound { key, .. }) if key == "active"
    ));
}

#[test]
fn absent_artifact_is_reported_before_reading() {
    let backend = Arc::new(InMemoryBackend::new());
    let tree = open(&backend);
    tree.resolve("m1/v1/train", true).unwrap();
    backend.write("/models/m1/v1/train/present.bin", b"x").unwrap();

    let before = backend.read_count();
    tree.get("m1/v1/train/present.bin").unwrap();
    let present_reads = backend.read_count() - before;

    let before = backend.read_count();
    assert!(matches!(
        tree.get("m1/v1/train/missing.bin"),
        Err(Error::ArtifactNotFound { name, .. }) if name == "missing.bin"
    ));
    let missing_reads = backend.read_count() - before;

    // Same metadata reads on the way down, minus the artifact itself.
    assert_eq!(missing_reads + 1, present_reads);
}

#[test]
fn root_listing_hides_bookkeeping_files() {
    let backend = Arc::new(InMemoryBackend::new());
    let tree = Tree::open_with_backend(
        backend.clone(),
        "/models",
        TreeOptions::new().keys(["model"]).locking(true),
    )
    .unwrap();
    tree.resolve("m1", true).unwrap();
    backend.touch("/models/.lock").unwrap();

    assert_eq!(tree.root().list().unwrap(), vec!["m1".to_string()]);
}

#[test]
fn query_values_resolve_against_parent_metadata() {
    let backend = Arc::new(InMemoryBackend::new());
    let tree = open(&backend);
    let model = tree.resolve("m1", true).unwrap();
    model.update([("active", "v2")]).unwrap();

    let value = QueryValue::metadata("active");
    assert_eq!(
        value.resolve(&model.metadata().unwrap(), &model.path()).unwrap(),
        "v2"
    );

    let created = model.resolve(json!({"version": {"metadata": "active"}}), true).unwrap();
    assert_eq!(created.path(), "/models/m1/v2");
}

#[test]
fn declared_child_without_directory_is_not_found() {
    let backend = Arc::new(InMemoryBackend::new());
    let tree = open(&backend);
    backend
        .write("/models/metadata.json", br#"{"children":["ghost"]}"#)
        .unwrap();

    assert!(matches!(
        tree.search("ghost"),
        Err(Error::NodeNotFound { path }) if path == "/models/ghost"
    ));
}

#[test]
fn artifacts_named_like_the_metadata_document_are_listed() {
    let backend = Arc::new(InMemoryBackend::new());
    let tree = open(&backend);
    let source = tempfile::tempdir().unwrap();
    let backup = source.path().join("metadata.json.bak");
    std::fs::write(&backup, b"old").unwrap();

    let node = tree.put("m1", &backup).unwrap();
    assert_eq!(node.list().unwrap(), vec!["metadata.json.bak".to_string()]);

    let bytes =
        metatree::metatree_backend::collect_bytes(tree.get("m1/metadata.json.bak").unwrap())
            .unwrap();
    assert_eq!(&bytes[..], b"old");
}

#[test]
fn null_metadata_fields_do_not_resolve() {
    let backend = Arc::new(InMemoryBackend::new());
    let tree = open(&backend);
    tree.resolve("m1", true).unwrap();
    backend
        .write("/models/m1/metadata.json", br#"{"active": null}"#)
        .unwrap();

    assert!(matches!(
        tree.search("m1/<active>"),
        Err(Error::MetadataKeyNotFound { key, .. }) if key == "active"
    ));
    assert!(matches!(
        tree.resolve("m1/<active>", true),
        Err(Error::MetadataKeyNotFound { .. })
    ));
    assert!(!backend.exists("/models/m1/null").unwrap());
}
