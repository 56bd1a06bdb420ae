//! Directory watching and sync-trigger scheduling for shuttersync
//!
//! Consumes change notifications from a notify backend (native OS
//! events or fixed-interval polling), optionally corrects image
//! extensions on qualifying files, and decides when to invoke the
//! reconcile callback under three independent timing policies:
//! - Debounce: trigger after a quiet period with no new events
//! - Max latency: upper bound on trigger delay under continuous activity
//! - Periodic: unconditional fixed-rate trigger

mod coalesce;
mod notifier;

pub use coalesce::{SyncFn, SyncTrigger};
pub use shuttersync_reconcile::SyncOutcome;

use coalesce::Coalescer;
use notifier::Notifier;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Delay before inspecting a just-written file, so in-progress writes
/// can settle
const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Bound on waiting for the drain task during stop()
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Type of change reported by the notification backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Moved,
}

/// A single de-duplicated change notification.
///
/// Directory events never make it this far; the backend discards them
/// at ingestion.
#[derive(Debug, Clone)]
pub struct ChangeNotification {
    pub kind: ChangeKind,
    pub path: PathBuf,
    /// Destination path for move events
    pub dest_path: Option<PathBuf>,
}

impl ChangeNotification {
    /// The path worth inspecting: the destination of a move, otherwise
    /// the event path itself.
    pub fn target(&self) -> &Path {
        self.dest_path.as_deref().unwrap_or(&self.path)
    }
}

/// Timing policy and behavior toggles for a watch session
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Quiet period after the most recent event before a sync triggers
    pub debounce: Duration,
    /// Upper bound between the first event of a burst and its sync;
    /// zero disables the bound
    pub max_latency: Duration,
    /// Unconditional sync interval; zero disables periodic syncing
    pub sync_rate: Duration,
    /// Use the polling backend instead of native OS events
    pub use_polling: bool,
    /// Correct image extensions on qualifying files as they appear
    pub process_renames: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(3),
            max_latency: Duration::from_secs(20),
            sync_rate: Duration::ZERO,
            use_polling: false,
            process_renames: true,
        }
    }
}

/// Errors surfaced synchronously by [`DirWatcher::start`]
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("watcher already running")]
    AlreadyRunning,
    #[error("source directory not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("source is not a directory: {0}")]
    SourceNotADirectory(PathBuf),
    #[error("failed to start notification backend")]
    Backend(#[source] notify::Error),
}

/// Handles owned only while a watch session is live
struct Session {
    notifier: Notifier,
    drain: JoinHandle<()>,
}

/// Watches one directory tree and schedules reconcile invocations.
///
/// All methods must be called from within a tokio runtime; timer and
/// drain tasks are spawned onto it.
pub struct DirWatcher {
    source: PathBuf,
    config: WatchConfig,
    coalescer: Arc<Coalescer>,
    queue_depth: Arc<AtomicUsize>,
    session: Mutex<Option<Session>>,
}

impl DirWatcher {
    pub fn new(source: impl Into<PathBuf>, config: WatchConfig, sync_fn: SyncFn) -> Self {
        Self {
            source: source.into(),
            coalescer: Coalescer::new(config.clone(), sync_fn),
            config,
            queue_depth: Arc::new(AtomicUsize::new(0)),
            session: Mutex::new(None),
        }
    }

    /// Start watching the source directory.
    ///
    /// Fails if a session is already live or the source path is missing
    /// or not a directory; no partial state is left behind on failure.
    pub fn start(&self) -> Result<(), WatcherError> {
        let mut session = self.session.lock();
        if session.is_some() {
            return Err(WatcherError::AlreadyRunning);
        }
        if !self.source.exists() {
            return Err(WatcherError::SourceNotFound(self.source.clone()));
        }
        if !self.source.is_dir() {
            return Err(WatcherError::SourceNotADirectory(self.source.clone()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = Notifier::start(
            &self.source,
            self.config.use_polling,
            tx,
            Arc::clone(&self.queue_depth),
        )
        .map_err(WatcherError::Backend)?;

        self.coalescer.activate();

        let drain = tokio::spawn(drain_loop(
            rx,
            Arc::clone(&self.coalescer),
            Arc::clone(&self.queue_depth),
            self.config.process_renames,
        ));

        *session = Some(Session { notifier, drain });

        info!("Watching directory: {}", self.source.display());
        info!(
            "Debounce: {:?}, max latency: {:?}, periodic: {:?}",
            self.config.debounce, self.config.max_latency, self.config.sync_rate
        );
        Ok(())
    }

    /// Stop watching. Idempotent.
    ///
    /// Cancels all timers, shuts the backend down, and joins the drain
    /// task with a bounded timeout.
    pub async fn stop(&self) {
        let session = self.session.lock().take();
        let Some(Session { notifier, mut drain }) = session else {
            return;
        };

        info!("Stopping watcher...");
        self.coalescer.deactivate();

        // Dropping the backend closes the notification channel, which
        // lets the drain loop run dry and exit
        notifier.stop(&self.source);

        if tokio::time::timeout(STOP_TIMEOUT, &mut drain).await.is_err() {
            warn!("Drain task did not exit within {:?}, aborting it", STOP_TIMEOUT);
            drain.abort();
        }

        info!("Watcher stopped");
    }

    /// Reset trigger accounting and invoke the sync callback now,
    /// bypassing all timers.
    pub fn force_sync(&self) {
        self.coalescer.force_sync();
    }

    /// Notifications received but not yet drained. A liveness and
    /// backpressure signal for monitoring only.
    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.session.lock().is_some()
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

/// Pull notifications off the channel, run the rename engine on
/// qualifying files, and feed the coalescer's accounting.
async fn drain_loop(
    mut rx: mpsc::UnboundedReceiver<ChangeNotification>,
    coalescer: Arc<Coalescer>,
    queue_depth: Arc<AtomicUsize>,
    process_renames: bool,
) {
    while let Some(note) = rx.recv().await {
        queue_depth.fetch_sub(1, Ordering::SeqCst);

        debug!("{:?}: {}", note.kind, note.target().display());

        if process_renames && shuttersync_core::is_watched_extension(note.target()) {
            try_rename(note.target().to_path_buf()).await;
        }

        coalescer.on_event();
    }
}

/// Settle, then run the rename engine on the blocking pool. Failures
/// are logged and never stall the drain loop.
async fn try_rename(path: PathBuf) {
    tokio::time::sleep(SETTLE_DELAY).await;

    let original = path.clone();
    let renamed = tokio::task::spawn_blocking(move || shuttersync_core::rename::process(&path)).await;

    match renamed {
        Ok(Some(new_path)) => {
            info!(
                "Auto-renamed: {} -> {}",
                original.display(),
                new_path.display()
            );
        }
        Ok(None) => {}
        Err(e) => warn!("Rename task failed for {}: {}", original.display(), e),
    }
}
