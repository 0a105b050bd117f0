//! Integration tests for TableWatch
//!
//! These tests drive a real StoreManager and FileWatcher against files in a
//! temp directory.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use tablewatch::{StoreError, StoreEvent, StoreManager, WatcherConfig};
use tempfile::TempDir;
use tokio::sync::broadcast;

/// Replace `path` with new content whose mtime is `secs` seconds ahead
///
/// Goes through a rename so a fast watcher never sees a half-written file,
/// and the pushed mtime makes the change visible regardless of timestamp
/// granularity.
fn rewrite_bytes(path: &Path, content: &[u8], secs: u64) {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content).expect("Failed to write file");
    let file = fs::File::options().write(true).open(&tmp).expect("Failed to open file");
    file.set_modified(SystemTime::now() + Duration::from_secs(secs))
        .expect("Failed to set mtime");
    drop(file);
    fs::rename(&tmp, path).expect("Failed to rename file");
}

fn rewrite(path: &Path, content: &str, secs: u64) {
    rewrite_bytes(path, content.as_bytes(), secs);
}

async fn next_event(events: &mut broadcast::Receiver<StoreEvent>) -> StoreEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("Timed out waiting for watcher")
        .expect("Event channel closed")
}

fn fast_store(interval_ms: u64) -> StoreManager {
    StoreManager::spawn(WatcherConfig::with_interval(Duration::from_millis(interval_ms)))
}

// =============================================================================
// Scenario
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_load_modify_reload_unload() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let path = temp.path().join("a.csv");
    fs::write(&path, "1,2,3\n4,5,6\n").unwrap();

    let store = fast_store(50);
    let mut events = store.subscribe_events();

    let summary = store.load(&path).await.unwrap();
    assert!(summary.watching);
    assert_eq!(
        store.snapshot().await.unwrap().to_vecs(),
        vec![vec!["1", "2", "3"], vec!["4", "5", "6"]]
    );

    rewrite(&path, "1,2,3\n7,8,9\n", 5);
    let event = next_event(&mut events).await;
    assert_eq!(
        event,
        StoreEvent::Reloaded {
            path: path.clone(),
            rows: 2
        }
    );
    assert_eq!(
        store.snapshot().await.unwrap().to_vecs(),
        vec![vec!["1", "2", "3"], vec!["7", "8", "9"]]
    );

    store.unload().await.unwrap();
    assert!(matches!(store.snapshot().await, Err(StoreError::NotLoaded)));

    store.shutdown().await.unwrap();
}

// =============================================================================
// Load / unload pairing
// =============================================================================

#[tokio::test]
async fn test_matched_load_unload_pairs_end_empty() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("a.csv");
    fs::write(&path, "x\n").unwrap();
    let store = fast_store(20);

    for _ in 0..5 {
        store.load(&path).await.unwrap();
        assert!(store.status().await.unwrap().is_some());
        store.unload().await.unwrap();
        assert!(store.status().await.unwrap().is_none());
    }

    // Extra unload is rejected and changes nothing
    assert!(matches!(store.unload().await, Err(StoreError::NotLoaded)));
    assert!(store.status().await.unwrap().is_none());
    store.load(&path).await.unwrap();
    assert_eq!(store.snapshot().await.unwrap().to_vecs(), vec![vec!["x"]]);

    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_generations_increase_across_loads() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("a.csv");
    fs::write(&path, "x\n").unwrap();
    let store = fast_store(1000);

    store.load(&path).await.unwrap();
    let first = store.status().await.unwrap().unwrap().generation;
    store.unload().await.unwrap();
    store.load(&path).await.unwrap();
    let second = store.status().await.unwrap().unwrap().generation;
    assert!(second > first);

    store.shutdown().await.unwrap();
}

// =============================================================================
// Snapshot consistency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_snapshots_never_mix_old_and_new_rows() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("big.csv");
    let old = "old,row\n".repeat(2000);
    let new = "new,row,extra\n".repeat(3000);
    fs::write(&path, &old).unwrap();

    let store = fast_store(5);
    let mut events = store.subscribe_events();
    store.load(&path).await.unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let mut readers = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        let done = Arc::clone(&done);
        readers.push(tokio::spawn(async move {
            let mut seen = 0usize;
            while !done.load(Ordering::SeqCst) {
                let snapshot = store.snapshot().await.unwrap();
                let first = snapshot[0].fields()[0].clone();
                let expected_len = if first == "old" { 2000 } else { 3000 };
                assert_eq!(snapshot.len(), expected_len);
                assert!(snapshot.iter().all(|row| row.fields()[0] == first));
                seen += 1;
                tokio::task::yield_now().await;
            }
            seen
        }));
    }

    for i in 1..=6u64 {
        let content = if i % 2 == 1 { &new } else { &old };
        rewrite(&path, content, i * 10);
        assert!(matches!(next_event(&mut events).await, StoreEvent::Reloaded { .. }));
    }

    done.store(true, Ordering::SeqCst);
    for reader in readers {
        assert!(reader.await.unwrap() > 0);
    }

    assert_eq!(store.status().await.unwrap().unwrap().reloads, 6);
    store.shutdown().await.unwrap();
}

// =============================================================================
// Watcher debounce
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_one_modification_one_reload() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("a.csv");
    fs::write(&path, "1\n").unwrap();

    let store = fast_store(20);
    let mut events = store.subscribe_events();
    store.load(&path).await.unwrap();

    rewrite(&path, "2\n", 5);
    assert!(matches!(next_event(&mut events).await, StoreEvent::Reloaded { rows: 1, .. }));

    // Many more intervals pass without another change
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(events.try_recv().is_err());
    assert_eq!(store.status().await.unwrap().unwrap().reloads, 1);

    store.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bad_reload_keeps_previous_data_and_watcher_survives() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("a.csv");
    fs::write(&path, "good\n").unwrap();

    let store = fast_store(20);
    let mut events = store.subscribe_events();
    store.load(&path).await.unwrap();

    rewrite_bytes(&path, &[0xff, 0xfe, b'\n'], 5);

    assert!(matches!(next_event(&mut events).await, StoreEvent::ReloadFailed { .. }));
    assert_eq!(store.snapshot().await.unwrap().to_vecs(), vec![vec!["good"]]);

    // Removing the file is a transient error, not the end of the watcher
    fs::remove_file(&path).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    rewrite(&path, "better\n", 10);
    assert!(matches!(next_event(&mut events).await, StoreEvent::Reloaded { .. }));
    assert_eq!(store.snapshot().await.unwrap().to_vecs(), vec![vec!["better"]]);

    store.shutdown().await.unwrap();
}

// =============================================================================
// Stop / unload ordering
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_reload_after_unload_returns() {
    let temp = TempDir::new().unwrap();
    let a = temp.path().join("a.csv");
    let b = temp.path().join("b.csv");
    fs::write(&a, "a\n").unwrap();
    fs::write(&b, "b\n").unwrap();

    let store = fast_store(5);
    let mut events = store.subscribe_events();

    for round in 1..=5u64 {
        store.load(&a).await.unwrap();

        // Race a pending change against the unload
        rewrite(&a, &"changed\n".repeat(20_000), round * 10);
        store.unload().await.unwrap();

        // Anything the old watcher produced has been sent by now
        while events.try_recv().is_ok() {}

        store.load(&b).await.unwrap();
        rewrite(&a, "late\n", round * 10 + 5);
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(events.try_recv().is_err(), "watcher for a.csv outlived unload");
        let status = store.status().await.unwrap().unwrap();
        assert_eq!(status.path, b);
        assert_eq!(status.reloads, 0);
        assert_eq!(store.snapshot().await.unwrap().to_vecs(), vec![vec!["b"]]);

        store.unload().await.unwrap();
    }

    store.shutdown().await.unwrap();
}

/// A load racing an unload must never leave a polling task behind once the
/// unload reports success
#[tokio::test]
async fn test_unload_racing_load_leaves_no_watcher_running() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("a.csv");
    fs::write(&path, "a\n").unwrap();

    let store = fast_store(5);
    let metrics = tokio::runtime::Handle::current().metrics();

    for _ in 0..300 {
        // Only the store actor is alive between rounds
        let idle = metrics.num_alive_tasks();

        let unload_until_ok = async {
            loop {
                match store.unload().await {
                    Ok(_) => return metrics.num_alive_tasks(),
                    Err(StoreError::NotLoaded) => tokio::task::yield_now().await,
                    Err(e) => panic!("unexpected unload error: {}", e),
                }
            }
        };
        let (loaded, alive_after_unload) = tokio::join!(store.load(&path), unload_until_ok);

        let summary = loaded.unwrap();
        assert!(summary.watching);
        assert_eq!(alive_after_unload, idle, "watcher task outlived unload");
        assert!(store.status().await.unwrap().is_none());
    }

    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unload_returns_promptly_with_long_interval() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("a.csv");
    fs::write(&path, "1\n").unwrap();

    let store = fast_store(60 * 60 * 1000);
    store.load(&path).await.unwrap();

    let unloaded = tokio::time::timeout(Duration::from_secs(5), store.unload()).await;
    assert!(unloaded.is_ok(), "unload should not wait out the polling interval");

    store.shutdown().await.unwrap();
}

// =============================================================================
// Save
// =============================================================================

#[tokio::test]
async fn test_save_then_load_reproduces_rows() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src.csv");
    let out = temp.path().join("out.csv");
    fs::write(&src, "h1,h2,h3\na,,c\nsingle\n,\n").unwrap();

    let store = fast_store(1000);
    store.load(&src).await.unwrap();
    let before = store.snapshot().await.unwrap();
    store.save(&out).await.unwrap();
    store.unload().await.unwrap();

    store.load(&out).await.unwrap();
    let after = store.snapshot().await.unwrap();
    assert_eq!(*before, *after);

    store.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_save_over_source_keeps_store_consistent() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("a.csv");
    fs::write(&path, "1,2\n3,4").unwrap();

    let store = fast_store(20);
    store.load(&path).await.unwrap();
    store.save(&path).await.unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "1,2\n3,4\n");

    // The watcher may reload our own write; the rows are the same either way
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(store.snapshot().await.unwrap().to_vecs(), vec![vec!["1", "2"], vec!["3", "4"]]);

    store.shutdown().await.unwrap();
}
