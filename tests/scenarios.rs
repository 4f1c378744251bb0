//! End-to-end scenarios for the directory diff core, seeded from the
//! documented S1-S5 behaviors: identical trees, one-sided entries, content
//! differences, on-demand deep expansion, and cancellation.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tfm_dirdiff::diff::DirectoryDiffViewer;
use tfm_dirdiff::input::{KeyCode, KeyEvent, ModifierSet};
use tfm_dirdiff::layer::{UILayer, UILayerStack};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

fn no_hidden() -> Arc<dyn Fn() -> bool + Send + Sync> {
    Arc::new(|| false)
}

fn write_file(path: &Path, contents: &[u8]) {
    fs::write(path, contents).unwrap();
}

/// Polls `status_counts` until no node is left `PENDING`, or panics once
/// `SETTLE_TIMEOUT` elapses (background workers never hang this long in a
/// fixture this small).
fn wait_for_settle(viewer: &DirectoryDiffViewer) {
    let start = Instant::now();
    loop {
        if viewer.status_counts().pending == 0 {
            return;
        }
        if start.elapsed() > SETTLE_TIMEOUT {
            panic!("scan did not settle within {SETTLE_TIMEOUT:?}");
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

fn shift_right(viewer: &mut DirectoryDiffViewer) {
    viewer.handle_key_event(&KeyEvent::new(KeyCode::Right, ModifierSet::SHIFT));
}

#[test]
fn s1_identical_trees_report_no_differences() {
    let left = tempfile::tempdir().unwrap();
    let right = tempfile::tempdir().unwrap();
    write_file(&left.path().join("a.txt"), b"x");
    write_file(&right.path().join("a.txt"), b"x");
    fs::create_dir(left.path().join("b")).unwrap();
    fs::create_dir(right.path().join("b")).unwrap();
    write_file(&left.path().join("b/c.txt"), b"y");
    write_file(&right.path().join("b/c.txt"), b"y");

    let viewer = DirectoryDiffViewer::new(left.path().to_path_buf(), right.path().to_path_buf(), no_hidden()).unwrap();
    wait_for_settle(&viewer);

    let counts = viewer.status_counts();
    assert_eq!(counts.pending, 0);
    assert_eq!(counts.different, 0);
    assert_eq!(counts.only_left, 0);
    assert_eq!(counts.only_right, 0);
    assert_eq!(counts.errors, 0);
    assert!(counts.identical > 0);
}

#[test]
fn s2_one_sided_file_does_not_open_a_diff_layer() {
    let left = tempfile::tempdir().unwrap();
    let right = tempfile::tempdir().unwrap();
    write_file(&left.path().join("only.txt"), b"z");

    let mut viewer = DirectoryDiffViewer::new(left.path().to_path_buf(), right.path().to_path_buf(), no_hidden()).unwrap();
    wait_for_settle(&viewer);

    let counts = viewer.status_counts();
    assert_eq!(counts.only_left, 1);

    viewer.handle_key_event(&KeyEvent::plain(KeyCode::Enter));
    assert!(viewer.take_pending_layer().is_none());
}

#[test]
fn s3_content_diff_opens_and_closes_a_diff_layer() {
    let left = tempfile::tempdir().unwrap();
    let right = tempfile::tempdir().unwrap();
    write_file(&left.path().join("x.txt"), b"left bytes");
    write_file(&right.path().join("x.txt"), b"right bytes");

    let viewer = DirectoryDiffViewer::new(left.path().to_path_buf(), right.path().to_path_buf(), no_hidden()).unwrap();
    wait_for_settle(&viewer);
    assert_eq!(viewer.status_counts().different, 1);

    let mut stack = UILayerStack::new();
    stack.push(Box::new(viewer));
    assert_eq!(stack.len(), 1);

    stack.dispatch_key_event(&KeyEvent::plain(KeyCode::Enter));
    stack.collect_pending_pushes();
    assert_eq!(stack.len(), 2);

    stack.dispatch_key_event(&KeyEvent::plain(KeyCode::Escape));
    stack.pop_closed_layers();
    assert_eq!(stack.len(), 1);
}

#[test]
fn s4_deep_tree_expands_on_demand_and_settles_identical() {
    let left = tempfile::tempdir().unwrap();
    let right = tempfile::tempdir().unwrap();
    fs::create_dir_all(left.path().join("a/b/c")).unwrap();
    fs::create_dir_all(right.path().join("a/b/c")).unwrap();
    write_file(&left.path().join("a/b/c/leaf.txt"), b"same");
    write_file(&right.path().join("a/b/c/leaf.txt"), b"same");

    let mut viewer = DirectoryDiffViewer::new(left.path().to_path_buf(), right.path().to_path_buf(), no_hidden()).unwrap();

    // a -> expand(a) reveals b; advance cursor onto b.
    shift_right(&mut viewer);
    shift_right(&mut viewer);
    // b -> expand(b) reveals c; advance cursor onto c.
    shift_right(&mut viewer);
    shift_right(&mut viewer);
    // c -> expand(c) reveals leaf.txt.
    shift_right(&mut viewer);

    wait_for_settle(&viewer);

    let counts = viewer.status_counts();
    assert_eq!(counts.pending, 0);
    assert_eq!(counts.different, 0);
    assert_eq!(counts.only_left, 0);
    assert_eq!(counts.only_right, 0);
    // a, b, c, leaf.txt all settle IDENTICAL.
    assert_eq!(counts.identical, 4);
}

#[test]
fn s5_cancellation_closes_within_the_shutdown_budget() {
    let left = tempfile::tempdir().unwrap();
    let right = tempfile::tempdir().unwrap();
    for i in 0..50 {
        let dir = format!("dir{i}");
        fs::create_dir(left.path().join(&dir)).unwrap();
        fs::create_dir(right.path().join(&dir)).unwrap();
        write_file(&left.path().join(format!("{dir}/f.txt")), b"content");
        write_file(&right.path().join(format!("{dir}/f.txt")), b"content");
    }

    let mut viewer = DirectoryDiffViewer::new(left.path().to_path_buf(), right.path().to_path_buf(), no_hidden()).unwrap();
    viewer.handle_key_event(&KeyEvent::plain(KeyCode::Escape));

    let start = Instant::now();
    loop {
        if viewer.should_close() {
            break;
        }
        if start.elapsed() > SETTLE_TIMEOUT {
            panic!("viewer did not close within the shutdown budget");
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}
