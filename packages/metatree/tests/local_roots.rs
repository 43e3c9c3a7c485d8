use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metatree::metatree_backend::{Backend, DocumentFormat, LocalBackend};
use metatree::{Error, Tree, TreeOptions};
use tempfile::TempDir;

fn root_in(dir: &TempDir) -> String {
    dir.path().join("tree").to_str().unwrap().to_string()
}

fn open(root: &str) -> Tree {
    Tree::open(root, TreeOptions::new().keys(["model", "version", "stage"])).unwrap()
}

#[test]
fn initializes_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let root = root_in(&dir);
    let tree = open(&root);

    assert_eq!(tree.root_path(), root);
    assert_eq!(tree.backend().name(), "local");
    let config = fs::read_to_string(dir.path().join("tree/.metatree")).unwrap();
    assert!(config.contains("\"keys\":[\"model\",\"version\",\"stage\"]"));
    assert!(dir.path().join("tree/metadata.json").exists());
}

#[test]
fn persisted_schema_wins_on_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let root = root_in(&dir);
    open(&root).resolve("m1/v1", true).unwrap();

    let reopened = Tree::open(
        &root,
        TreeOptions::new().keys(["project"]).locking(true),
    )
    .unwrap();
    assert_eq!(reopened.schema().keys(), ["model", "version", "stage"]);
    assert!(!reopened.lock().is_enabled());
    assert_eq!(reopened.search("m1/v1").unwrap().depth(), 2);

    // No keys needed once initialized.
    let bare = Tree::open(&root, TreeOptions::new()).unwrap();
    assert_eq!(bare.schema().len(), 3);
}

#[test]
fn existing_foreign_directory_is_in_use() {
    let dir = tempfile::tempdir().unwrap();
    let root = root_in(&dir);
    fs::create_dir_all(&root).unwrap();
    fs::write(dir.path().join("tree/notes.txt"), b"mine").unwrap();

    assert!(matches!(
        Tree::open(&root, TreeOptions::new().keys(["model"])),
        Err(Error::PathAlreadyInUse { .. })
    ));
}

#[test]
fn yaml_metadata_format() {
    let dir = tempfile::tempdir().unwrap();
    let root = root_in(&dir);
    let tree = Tree::open(
        &root,
        TreeOptions::new()
            .keys(["model", "version"])
            .metadata_format(DocumentFormat::Yaml),
    )
    .unwrap();

    let model = tree.resolve("m1/v1", true).unwrap();
    model.update([("owner", "alice")]).unwrap();

    let on_disk = fs::read_to_string(dir.path().join("tree/m1/v1/metadata.yml")).unwrap();
    assert!(on_disk.contains("owner: alice"));
    assert!(!dir.path().join("tree/m1/v1/metadata.json").exists());
    assert_eq!(model.list().unwrap(), Vec::<String>::new());

    let reopened = Tree::open(&root, TreeOptions::new()).unwrap();
    assert_eq!(reopened.config().metadata_format, DocumentFormat::Yaml);
    assert!(reopened.search("m1").unwrap().metadata().unwrap().has_child("v1"));
}

#[test]
fn put_copies_files_and_directories() {
    let dir = tempfile::tempdir().unwrap();
    let tree = open(&root_in(&dir));
    let sources = tempfile::tempdir().unwrap();
    let file = sources.path().join("model.bin");
    fs::write(&file, b"weights").unwrap();
    let folder = sources.path().join("assets");
    fs::create_dir_all(folder.join("nested")).unwrap();
    fs::write(folder.join("nested/vocab.txt"), b"a b c").unwrap();

    let node = tree.put("m1/v1/train", &file).unwrap();
    tree.put("m1/v1/train", &folder).unwrap();

    assert_eq!(
        node.list().unwrap(),
        vec!["assets".to_string(), "model.bin".to_string()]
    );
    assert_eq!(
        fs::read(dir.path().join("tree/m1/v1/train/assets/nested/vocab.txt")).unwrap(),
        b"a b c"
    );
}

#[test]
fn put_refuses_missing_sources_and_existing_destinations() {
    let dir = tempfile::tempdir().unwrap();
    let tree = open(&root_in(&dir));
    let sources = tempfile::tempdir().unwrap();
    let file = sources.path().join("model.bin");

    assert!(matches!(
        tree.put("m1/v1/train", &file),
        Err(Error::SourceNotFound { .. })
    ));

    fs::write(&file, b"first").unwrap();
    tree.put("m1/v1/train", &file).unwrap();
    fs::write(&file, b"second").unwrap();
    assert!(matches!(
        tree.put("m1/v1/train", &file),
        Err(Error::DestinationExists { .. })
    ));
    assert_eq!(
        fs::read(dir.path().join("tree/m1/v1/train/model.bin")).unwrap(),
        b"first"
    );

    assert!(matches!(
        tree.put_with("m2/v1/train", &file, false),
        Err(Error::NodeNotFound { .. })
    ));
}

#[test]
fn get_to_writes_local_copies() {
    let dir = tempfile::tempdir().unwrap();
    let tree = open(&root_in(&dir));
    let sources = tempfile::tempdir().unwrap();
    let file = sources.path().join("model.bin");
    fs::write(&file, b"weights").unwrap();
    tree.put("m1/v1/train", &file).unwrap();
    tree.search("m1/v1/train")
        .unwrap()
        .update([("best", "model.bin")])
        .unwrap();

    let out = tempfile::tempdir().unwrap();
    let named = tree
        .get_to("m1/v1/train/model.bin", out.path().join("copy.bin"))
        .unwrap();
    assert_eq!(fs::read(&named).unwrap(), b"weights");

    let into_dir = tree.get_to("m1/v1/train/<best>", out.path()).unwrap();
    assert_eq!(into_dir, out.path().join("model.bin"));
    assert_eq!(fs::read(into_dir).unwrap(), b"weights");

    assert!(matches!(
        tree.get_to("m1/v1/train/other.bin", out.path()),
        Err(Error::ArtifactNotFound { .. })
    ));
}

#[test]
fn held_lock_times_out_mutations() {
    let dir = tempfile::tempdir().unwrap();
    let root = root_in(&dir);
    let backoff = Duration::from_millis(10);
    let tree = Tree::open(
        &root,
        TreeOptions::new()
            .keys(["model"])
            .locking(true)
            .lock_attempts(3)
            .lock_backoff(backoff),
    )
    .unwrap();
    let node = tree.resolve("m1", true).unwrap();
    fs::write(dir.path().join("tree/.lock"), b"").unwrap();

    let started = Instant::now();
    assert!(matches!(
        node.update([("owner", "alice")]),
        Err(Error::LockTimeout { attempts: 3, .. })
    ));
    assert!(started.elapsed() >= backoff * 2);
    assert!(!node.metadata().unwrap().contains_key("owner"));

    fs::remove_file(dir.path().join("tree/.lock")).unwrap();
    node.update([("owner", "alice")]).unwrap();
    assert!(!dir.path().join("tree/.lock").exists());
}

#[test]
fn disabled_locking_ignores_the_marker() {
    let dir = tempfile::tempdir().unwrap();
    let tree = Tree::open(
        &root_in(&dir),
        TreeOptions::new()
            .keys(["model"])
            .lock_backoff(Duration::from_secs(60)),
    )
    .unwrap();
    fs::write(dir.path().join("tree/.lock"), b"").unwrap();

    let started = Instant::now();
    tree.resolve("m1", true).unwrap().update([("a", "1")]).unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn explicit_backend_matches_url_opening() {
    let dir = tempfile::tempdir().unwrap();
    let root = root_in(&dir);
    open(&root).resolve("m1", true).unwrap();

    let backend: Arc<dyn Backend> = Arc::new(LocalBackend::new());
    let tree = Tree::open_with_backend(backend, &root, TreeOptions::new()).unwrap();
    assert!(tree.search("m1").is_ok());

    let via_url = Tree::open(&format!("file://{}", root), TreeOptions::new()).unwrap();
    assert_eq!(via_url.root_path(), root);
}
