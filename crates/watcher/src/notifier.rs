//! Notification backends over the notify crate
//!
//! Two interchangeable sources feed the same translation path: the
//! platform-native watcher, and a fixed-interval polling watcher for
//! network shares and other mounts where native events are unreliable.
//! Either way the rest of the system sees only a stream of
//! [`ChangeNotification`]s with directory events already discarded.

use crate::{ChangeKind, ChangeNotification};
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Scan interval for the polling backend
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// A running notification backend. Dropping it stops the underlying
/// watcher threads and closes the notification channel.
pub(crate) struct Notifier {
    watcher: Box<dyn Watcher + Send>,
}

impl Notifier {
    /// Start a backend delivering notifications for `path` into `tx`.
    ///
    /// The queue depth counter is incremented for every accepted
    /// notification; the drain side decrements it.
    pub(crate) fn start(
        path: &Path,
        use_polling: bool,
        tx: mpsc::UnboundedSender<ChangeNotification>,
        queue_depth: Arc<AtomicUsize>,
    ) -> Result<Self, notify::Error> {
        let mut watcher: Box<dyn Watcher + Send> = if use_polling {
            info!("Using polling backend");
            let config = Config::default().with_poll_interval(POLL_INTERVAL);
            Box::new(PollWatcher::new(make_handler(tx, queue_depth), config)?)
        } else {
            info!("Using native backend");
            Box::new(RecommendedWatcher::new(
                make_handler(tx, queue_depth),
                Config::default(),
            )?)
        };

        watcher.watch(path, RecursiveMode::Recursive)?;

        Ok(Self { watcher })
    }

    /// Unsubscribe and shut the backend down.
    pub(crate) fn stop(mut self, path: &Path) {
        let _ = self.watcher.unwatch(path);
        // Backend threads wind down when the watcher drops
    }
}

/// Event callback shared by both backends. Runs on the backend's own
/// thread, so it must stay cheap: translate, count, send.
fn make_handler(
    tx: mpsc::UnboundedSender<ChangeNotification>,
    queue_depth: Arc<AtomicUsize>,
) -> impl FnMut(notify::Result<Event>) + Send + 'static {
    move |res| match res {
        Ok(event) => {
            if let Some(note) = translate(event) {
                queue_depth.fetch_add(1, Ordering::SeqCst);
                // Send fails only when the drain side is gone, i.e. the
                // watcher is stopping
                let _ = tx.send(note);
            }
        }
        Err(e) => warn!("Watch backend error: {}", e),
    }
}

/// Map a notify event to a change notification.
///
/// Directory events and event kinds the scheduler does not account for
/// (deletes, metadata-only access events) are dropped here.
fn translate(event: Event) -> Option<ChangeNotification> {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => None,
        EventKind::Create(_) => {
            let path = event.paths.into_iter().next()?;
            if path.is_dir() {
                return None;
            }
            Some(ChangeNotification {
                kind: ChangeKind::Created,
                path,
                dest_path: None,
            })
        }
        EventKind::Modify(ModifyKind::Name(mode)) => {
            let mut paths = event.paths.into_iter();
            match mode {
                RenameMode::Both => {
                    let from = paths.next()?;
                    let to = paths.next()?;
                    if to.is_dir() {
                        return None;
                    }
                    Some(ChangeNotification {
                        kind: ChangeKind::Moved,
                        path: from,
                        dest_path: Some(to),
                    })
                }
                RenameMode::To | RenameMode::Any | RenameMode::Other => {
                    // Single-sided rename: only useful if something now
                    // lives at the reported path
                    let path = paths.next()?;
                    if !path.exists() || path.is_dir() {
                        return None;
                    }
                    Some(ChangeNotification {
                        kind: ChangeKind::Moved,
                        dest_path: Some(path.clone()),
                        path,
                    })
                }
                // Source side of a rename: the file is gone from here
                RenameMode::From => None,
            }
        }
        EventKind::Modify(_) => {
            let path = event.paths.into_iter().next()?;
            if path.is_dir() {
                return None;
            }
            Some(ChangeNotification {
                kind: ChangeKind::Modified,
                path,
                dest_path: None,
            })
        }
        _ => None,
    }
}
