//! End-to-end watch scenarios against the real notification backend

use shuttersync_watcher::{DirWatcher, SyncFn, SyncOutcome, WatchConfig};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// 32 bytes with the Canon RAW brand at offset 4
fn cr3_bytes() -> Vec<u8> {
    let mut bytes = vec![0u8; 32];
    bytes[..4].copy_from_slice(&[0x00, 0x00, 0x00, 0x18]);
    bytes[4..12].copy_from_slice(b"ftypcrx ");
    bytes
}

fn counting_sync(calls: Arc<AtomicUsize>) -> SyncFn {
    Arc::new(move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(SyncOutcome {
            exit_code: 0,
            success: true,
            files_transferred: 0,
            files_failed: 0,
            duration_seconds: 0.0,
            output: String::new(),
        })
    })
}

fn fast_config() -> WatchConfig {
    WatchConfig {
        debounce: Duration::from_millis(300),
        max_latency: Duration::from_secs(10),
        sync_rate: Duration::ZERO,
        use_polling: false,
        process_renames: true,
    }
}

async fn wait_for(condition: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    condition()
}

#[tokio::test(flavor = "multi_thread")]
async fn watch_renames_misnamed_file_and_triggers_sync() {
    let temp_dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let watcher = DirWatcher::new(temp_dir.path(), fast_config(), counting_sync(Arc::clone(&calls)));
    watcher.start().unwrap();

    // Give the backend a moment to establish its watch
    tokio::time::sleep(Duration::from_millis(300)).await;

    let misnamed = temp_dir.path().join("IMG_0042.jpg");
    fs::write(&misnamed, cr3_bytes()).unwrap();

    let corrected = temp_dir.path().join("IMG_0042.cr3");
    assert!(
        wait_for(|| corrected.exists(), Duration::from_secs(5)).await,
        "misnamed file was not corrected"
    );
    assert!(!misnamed.exists());

    assert!(
        wait_for(
            || calls.load(Ordering::SeqCst) >= 1,
            Duration::from_secs(5)
        )
        .await,
        "sync never triggered"
    );

    watcher.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn watch_with_renames_disabled_leaves_files_alone() {
    let temp_dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let config = WatchConfig {
        process_renames: false,
        ..fast_config()
    };
    let watcher = DirWatcher::new(temp_dir.path(), config, counting_sync(Arc::clone(&calls)));
    watcher.start().unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;

    let misnamed = temp_dir.path().join("IMG_0099.jpg");
    fs::write(&misnamed, cr3_bytes()).unwrap();

    // The event still reaches the scheduler...
    assert!(
        wait_for(
            || calls.load(Ordering::SeqCst) >= 1,
            Duration::from_secs(5)
        )
        .await,
        "sync never triggered"
    );

    // ...but the file keeps its (wrong) name
    assert!(misnamed.exists());
    assert!(!temp_dir.path().join("IMG_0099.cr3").exists());

    watcher.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn force_sync_bypasses_pending_debounce() {
    let temp_dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let config = WatchConfig {
        debounce: Duration::from_secs(60),
        max_latency: Duration::ZERO,
        ..fast_config()
    };
    let watcher = DirWatcher::new(temp_dir.path(), config, counting_sync(Arc::clone(&calls)));
    watcher.start().unwrap();

    watcher.force_sync();

    assert!(
        wait_for(
            || calls.load(Ordering::SeqCst) >= 1,
            Duration::from_secs(2)
        )
        .await,
        "manual trigger did not reach the callback"
    );

    watcher.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn queue_drains_back_to_zero() {
    let temp_dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let watcher = DirWatcher::new(temp_dir.path(), fast_config(), counting_sync(calls));
    watcher.start().unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;

    for i in 0..5 {
        fs::write(temp_dir.path().join(format!("note_{i}.txt")), b"data").unwrap();
    }

    assert!(
        wait_for(|| watcher.queue_depth() == 0, Duration::from_secs(5)).await,
        "queue depth stuck at {}",
        watcher.queue_depth()
    );

    watcher.stop().await;
}
