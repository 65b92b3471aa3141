//! Integration tests for the fetch engine
//!
//! Local-source fixtures exercise the full pipeline without touching
//! the network: seeding, batched fetching, reconciliation, lockfile
//! round-trips, clearing, and cache GC.

use pakt_engine::{Engine, CACHE_DIR, LOCKFILE};
use pakt_events::{Event, EventReceiver};
use pakt_manifest::{Project, MANIFEST_FILE};
use pakt_net::NetClient;
use pakt_types::Parent;
use std::path::Path;
use tempfile::TempDir;

/// Write a package manifest with local dependencies.
///
/// Local paths in fetched manifests resolve against the project root,
/// so fixtures declare them root-relative.
async fn write_manifest(dir: &Path, name: &str, deps: &[(&str, &str)], build_deps: &[(&str, &str)]) {
    let mut text = format!("[project]\nname = \"{name}\"\n");
    if !deps.is_empty() {
        text.push_str("\n[deps]\n");
        for (alias, path) in deps {
            text.push_str(&format!("{alias} = {{ local = \"{path}\" }}\n"));
        }
    }
    if !build_deps.is_empty() {
        text.push_str("\n[build_deps]\n");
        for (alias, path) in build_deps {
            text.push_str(&format!("{alias} = {{ local = \"{path}\" }}\n"));
        }
    }
    tokio::fs::create_dir_all(dir).await.unwrap();
    tokio::fs::write(dir.join(MANIFEST_FILE), text).await.unwrap();
}

async fn load_project(root: &Path) -> Project {
    Project::load(&root.join(MANIFEST_FILE)).await.unwrap()
}

fn engine(project: Project, lock: &str, root: &Path) -> (Engine, EventReceiver) {
    let (tx, rx) = pakt_events::channel();
    let engine = Engine::new(
        project,
        lock,
        NetClient::with_defaults().unwrap(),
        root,
        tx,
    )
    .unwrap();
    (engine, rx)
}

/// Every edge targets a live dep index, every child's parent edge
/// appears earlier in the list, and every path is non-empty.
fn assert_graph_invariants(engine: &Engine) {
    let edges = engine.edges();
    for (idx, edge) in edges.iter().enumerate() {
        assert!(edge.to < engine.dep_count(), "edge {idx} targets a dead dep");
        if let Parent::Dep(parent) = edge.parent {
            let parent_pos = edges.iter().position(|e| e.to == parent);
            assert!(
                parent_pos.is_some() && parent_pos.unwrap() < idx,
                "edge {idx} appears before its parent's edge"
            );
        }
    }
    for (dep_idx, path) in engine.paths() {
        assert!(*dep_idx < engine.dep_count());
        assert!(!path.as_os_str().is_empty());
    }
}

#[tokio::test]
async fn chain_fetch_builds_graph_lockfile_and_deps_file() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write_manifest(root, "app", &[("a", "libs/a")], &[]).await;
    write_manifest(&root.join("libs/a"), "a", &[("b", "libs/b")], &[]).await;
    write_manifest(&root.join("libs/b"), "b", &[], &[]).await;

    let (mut engine, _rx) = engine(load_project(root).await, "", root);
    engine.fetch().await.unwrap();

    // Edge list in breadth-first order: root -> a, a -> b.
    let edges = engine.edges();
    assert_eq!(edges.len(), 2);
    assert_eq!(edges[0].parent, Parent::RootNormal);
    assert_eq!(edges[0].to, 0);
    assert_eq!(edges[0].alias, "a");
    assert_eq!(edges[1].parent, Parent::Dep(0));
    assert_eq!(edges[1].to, 1);
    assert_eq!(edges[1].alias, "b");
    assert_eq!(engine.dep_count(), 2);
    assert_graph_invariants(&engine);

    assert_eq!(engine.paths()[&0], root.join("libs/a"));
    assert_eq!(engine.paths()[&1], root.join("libs/b"));

    // One validated lockfile entry per package, load order preserved.
    let lock = engine.lockfile();
    let expected = format!(
        "local {}\nlocal {}\n",
        root.join("libs/a").display(),
        root.join("libs/b").display()
    );
    assert_eq!(lock, expected);

    // b is nested under a in the generated file.
    let rendered = engine.render_deps_file();
    assert!(rendered.contains("pub const a = Pkg{"));
    assert!(rendered.contains(".dependencies = &[_]Pkg{"));
    assert!(rendered.contains("\"b\""));
    assert!(rendered.contains("artifact.addPackage(pkgs.a);"));
    assert!(engine.build_deps_graph().is_empty());
}

#[tokio::test]
async fn diamond_shares_one_resolution_across_two_edges() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write_manifest(root, "app", &[("a", "libs/a"), ("b", "libs/b")], &[]).await;
    write_manifest(&root.join("libs/a"), "a", &[("c", "libs/c")], &[]).await;
    write_manifest(&root.join("libs/b"), "b", &[("c", "libs/c")], &[]).await;
    write_manifest(&root.join("libs/c"), "c", &[], &[]).await;

    let (mut engine, _rx) = engine(load_project(root).await, "", root);
    engine.fetch().await.unwrap();

    // c is encountered twice, once per parent.
    assert_eq!(engine.dep_count(), 4);
    let edges = engine.edges();
    assert_eq!(edges.len(), 4);
    let c_edges: Vec<_> = edges.iter().filter(|e| e.alias == "c").collect();
    assert_eq!(c_edges.len(), 2);
    assert_ne!(c_edges[0].to, c_edges[1].to);
    assert_graph_invariants(&engine);

    // Both occurrences land on the same location.
    assert_eq!(engine.paths()[&c_edges[0].to], root.join("libs/c"));
    assert_eq!(engine.paths()[&c_edges[1].to], root.join("libs/c"));

    // But the lockfile carries c exactly once.
    let lock = engine.lockfile();
    let c_line = format!("local {}", root.join("libs/c").display());
    assert_eq!(lock.matches(&c_line).count(), 1);
    assert_eq!(lock.lines().count(), 3);
}

#[tokio::test]
async fn refetch_with_lockfile_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write_manifest(root, "app", &[("a", "libs/a")], &[]).await;
    write_manifest(&root.join("libs/a"), "a", &[("b", "libs/b")], &[]).await;
    write_manifest(&root.join("libs/b"), "b", &[], &[]).await;

    let (mut first, _rx1) = engine(load_project(root).await, "", root);
    first.fetch().await.unwrap();
    let lock = first.lockfile();

    let (mut second, _rx2) = engine(load_project(root).await, &lock, root);
    second.fetch().await.unwrap();

    assert_eq!(first.edges(), second.edges());
    assert_eq!(first.paths(), second.paths());
    assert_eq!(second.lockfile(), lock);
    assert_eq!(first.render_deps_file(), second.render_deps_file());
}

#[tokio::test]
async fn clear_resolution_forces_refetch_of_one_root() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write_manifest(root, "app", &[("a", "libs/a"), ("b", "libs/b")], &[]).await;
    write_manifest(&root.join("libs/a"), "a", &[], &[]).await;
    write_manifest(&root.join("libs/b"), "b", &[], &[]).await;

    let (mut first, _rx1) = engine(load_project(root).await, "", root);
    first.fetch().await.unwrap();
    let lock = first.lockfile();
    let a_line = format!("local {}", root.join("libs/a").display());
    assert!(lock.contains(&a_line));

    let (mut second, _rx2) = engine(load_project(root).await, &lock, root);
    second.clear_resolution("a");
    // Dropping a's entry does not disturb b's.
    assert!(second.lockfile().contains(&format!(
        "local {}",
        root.join("libs/b").display()
    )));
    assert!(!second.lockfile().contains(&a_line));

    second.fetch().await.unwrap();
    assert!(second.lockfile().contains(&a_line));
    assert_eq!(second.edges().len(), first.edges().len());
    assert_eq!(second.paths(), first.paths());
}

#[tokio::test]
async fn build_deps_come_back_as_records_not_text() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write_manifest(root, "app", &[], &[("gen", "libs/gen")]).await;
    write_manifest(&root.join("libs/gen"), "gen", &[("util", "libs/util")], &[]).await;
    write_manifest(&root.join("libs/util"), "util", &[], &[]).await;

    let (mut engine, _rx) = engine(load_project(root).await, "", root);
    engine.fetch().await.unwrap();

    let graph = engine.build_deps_graph();
    assert_eq!(graph.len(), 1);
    assert_eq!(graph[0].name, "gen");
    assert_eq!(graph[0].path, root.join("libs/gen"));
    assert_eq!(graph[0].dependencies.len(), 1);
    assert_eq!(graph[0].dependencies[0].name, "util");

    // Build deps never reach the textual pkgs block.
    let rendered = engine.render_deps_file();
    assert!(!rendered.contains("gen"));
    assert!(rendered.contains("void {\n    }"));
}

#[tokio::test]
async fn missing_local_dep_fails_explained_after_reporting() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write_manifest(root, "app", &[("ghost", "libs/ghost")], &[]).await;

    let (mut engine, mut rx) = engine(load_project(root).await, "", root);
    let err = engine.fetch().await.unwrap_err();
    assert!(err.is_explained());

    let mut saw_error = false;
    while let Ok(event) = rx.try_recv() {
        if let Event::Error { message, details } = event {
            assert!(message.contains("ghost"), "message: {message}");
            assert!(details.is_some());
            saw_error = true;
        }
    }
    assert!(saw_error, "fetch failure was never reported");
}

#[tokio::test]
async fn cache_gc_removes_unclaimed_directories_only() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write_manifest(root, "app", &[("a", "libs/a")], &[]).await;
    write_manifest(&root.join("libs/a"), "a", &[], &[]).await;

    let cache = root.join(CACHE_DIR);
    tokio::fs::create_dir_all(cache.join("orphan-1234567890"))
        .await
        .unwrap();
    tokio::fs::write(cache.join("keep.txt"), b"not a directory")
        .await
        .unwrap();

    let (mut engine, _rx) = engine(load_project(root).await, "", root);
    engine.fetch().await.unwrap();

    assert!(!cache.join("orphan-1234567890").exists());
    assert!(cache.join("keep.txt").exists());
}

#[tokio::test]
async fn lockfile_survives_a_full_write_read_cycle() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write_manifest(root, "app", &[("a", "libs/a")], &[]).await;
    write_manifest(&root.join("libs/a"), "a", &[], &[]).await;

    let (mut engine, _rx) = engine(load_project(root).await, "", root);
    engine.fetch().await.unwrap();

    let lock_path = root.join(LOCKFILE);
    engine.write_lockfile(&lock_path).await.unwrap();
    let reloaded = tokio::fs::read_to_string(&lock_path).await.unwrap();
    assert_eq!(reloaded, engine.lockfile());
}
