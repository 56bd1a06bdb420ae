//! Sync-trigger scheduling over the change-notification stream
//!
//! Three independent timers may each decide that a sync is due:
//! - Debounce: fires after the most recent event once no further events
//!   arrive within the window
//! - Max latency: fires a fixed delay after the *first* event of a
//!   burst, bounding sync latency under continuous activity
//! - Periodic: fires unconditionally at a fixed rate, independent of
//!   notification activity
//!
//! All accounting lives behind one mutex, held only for state updates.
//! The reconcile callback runs on the blocking pool, outside the lock,
//! so a slow sync never blocks notification intake. Two invocations may
//! overlap when the callback is slower than the trigger cadence; mutual
//! exclusion of the sync itself is the callback owner's concern.

use crate::WatchConfig;
use parking_lot::Mutex;
use shuttersync_reconcile::SyncOutcome;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Reconcile callback, invoked on the blocking pool whenever a trigger
/// fires. The trigger tag is observability context only.
pub type SyncFn = Arc<dyn Fn(SyncTrigger) -> anyhow::Result<SyncOutcome> + Send + Sync>;

/// Why a sync invocation happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Debounce,
    MaxLatency,
    Periodic,
    Manual,
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncTrigger::Debounce => "debounce",
            SyncTrigger::MaxLatency => "max-latency",
            SyncTrigger::Periodic => "periodic",
            SyncTrigger::Manual => "manual",
        })
    }
}

/// Event accounting, guarded by a single mutex.
///
/// Lifecycle: zeroed on activate, mutated on every notification and
/// timer fire, fully reset after each triggered sync, torn down on
/// deactivate.
#[derive(Default)]
struct CoalescerState {
    running: bool,
    event_count: u64,
    first_event_time: Option<Instant>,
    last_event_time: Option<Instant>,
    debounce_timer: Option<JoinHandle<()>>,
    max_latency_timer: Option<JoinHandle<()>>,
    periodic_timer: Option<JoinHandle<()>>,
}

pub(crate) struct Coalescer {
    config: WatchConfig,
    sync_fn: SyncFn,
    state: Mutex<CoalescerState>,
}

impl Coalescer {
    pub(crate) fn new(config: WatchConfig, sync_fn: SyncFn) -> Arc<Self> {
        Arc::new(Self {
            config,
            sync_fn,
            state: Mutex::new(CoalescerState::default()),
        })
    }

    /// Mark the coalescer running and arm the periodic timer if
    /// configured.
    pub(crate) fn activate(self: &Arc<Self>) {
        let mut state = self.state.lock();
        state.running = true;
        if self.config.sync_rate > Duration::ZERO {
            state.periodic_timer = Some(self.spawn_periodic());
        }
    }

    /// Cancel all timers and clear accounting. Timers observed mid-fire
    /// re-check `running` under the mutex and bail out.
    pub(crate) fn deactivate(&self) {
        let mut state = self.state.lock();
        state.running = false;
        reset_accounting(&mut state);
        if let Some(timer) = state.periodic_timer.take() {
            timer.abort();
        }
    }

    /// Account for one drained notification and (re)arm timers.
    pub(crate) fn on_event(self: &Arc<Self>) {
        let now = Instant::now();
        let mut state = self.state.lock();
        if !state.running {
            return;
        }

        state.event_count += 1;
        state.last_event_time = Some(now);

        if state.first_event_time.is_none() {
            state.first_event_time = Some(now);
            // The burst's latency bound counts from its first event
            if self.config.max_latency > Duration::ZERO {
                if let Some(timer) = state.max_latency_timer.take() {
                    timer.abort();
                }
                state.max_latency_timer =
                    Some(self.spawn_fire_after(self.config.max_latency, SyncTrigger::MaxLatency));
            }
        }

        // Every event pushes the quiet-period deadline out
        if let Some(timer) = state.debounce_timer.take() {
            timer.abort();
        }
        state.debounce_timer =
            Some(self.spawn_fire_after(self.config.debounce, SyncTrigger::Debounce));
    }

    /// Reset accounting and invoke the callback immediately, bypassing
    /// all timers.
    pub(crate) fn force_sync(&self) {
        info!("Manual sync triggered");
        {
            let mut state = self.state.lock();
            reset_accounting(&mut state);
        }
        self.invoke(SyncTrigger::Manual);
    }

    /// A timer came due: serialize through the state mutex, then hand
    /// off to the callback outside the lock.
    fn fire(&self, trigger: SyncTrigger) {
        {
            let mut state = self.state.lock();
            if !state.running {
                return;
            }

            if trigger == SyncTrigger::Periodic {
                info!("Periodic sync triggered");
            } else {
                info!("{} sync triggered ({} events)", trigger, state.event_count);
                if let (Some(first), Some(last)) = (state.first_event_time, state.last_event_time)
                {
                    debug!("Burst spanned {:?}", last.duration_since(first));
                }
                reset_accounting(&mut state);
            }
        }

        self.invoke(trigger);
    }

    /// Run the reconcile callback on the blocking pool. Failures are
    /// caught and logged; accounting has already been reset, so the
    /// next burst of activity is never blocked by one failed sync.
    fn invoke(&self, trigger: SyncTrigger) {
        let sync_fn = Arc::clone(&self.sync_fn);
        tokio::task::spawn_blocking(move || match sync_fn(trigger) {
            Ok(outcome) => {
                debug!(
                    "Sync ({}) finished: exit code {}, {} files, {:.1}s",
                    trigger, outcome.exit_code, outcome.files_transferred, outcome.duration_seconds
                );
            }
            Err(e) => {
                error!("Sync callback failed ({}): {}", trigger, e);
            }
        });
    }

    fn spawn_fire_after(self: &Arc<Self>, delay: Duration, trigger: SyncTrigger) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.fire(trigger);
        })
    }

    /// Self-rearming periodic loop; stops once `running` clears.
    fn spawn_periodic(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let rate = self.config.sync_rate;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(rate);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; the periodic policy
            // starts counting from activation instead
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !this.state.lock().running {
                    break;
                }
                this.fire(SyncTrigger::Periodic);
            }
        })
    }
}

/// Zero counters and disarm the burst timers. The periodic timer is
/// deliberately left alone; it has its own lifecycle.
fn reset_accounting(state: &mut CoalescerState) {
    state.event_count = 0;
    state.first_event_time = None;
    state.last_event_time = None;
    if let Some(timer) = state.debounce_timer.take() {
        timer.abort();
    }
    if let Some(timer) = state.max_latency_timer.take() {
        timer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn outcome() -> SyncOutcome {
        SyncOutcome {
            exit_code: 0,
            success: true,
            files_transferred: 0,
            files_failed: 0,
            duration_seconds: 0.0,
            output: String::new(),
        }
    }

    fn counting(calls: Arc<AtomicUsize>) -> SyncFn {
        Arc::new(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(outcome())
        })
    }

    fn config(debounce_ms: u64, max_latency_ms: u64, sync_rate_ms: u64) -> WatchConfig {
        WatchConfig {
            debounce: Duration::from_millis(debounce_ms),
            max_latency: Duration::from_millis(max_latency_ms),
            sync_rate: Duration::from_millis(sync_rate_ms),
            use_polling: false,
            process_renames: false,
        }
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_debounce_fires_once_after_quiet_period() {
        let calls = Arc::new(AtomicUsize::new(0));
        let coalescer = Coalescer::new(config(500, 10_000, 0), counting(Arc::clone(&calls)));
        coalescer.activate();

        coalescer.on_event();

        sleep_ms(250).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0, "fired before the quiet period");

        sleep_ms(750).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        coalescer.deactivate();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_debounce_extends_while_events_arrive() {
        let calls = Arc::new(AtomicUsize::new(0));
        let coalescer = Coalescer::new(config(300, 10_000, 0), counting(Arc::clone(&calls)));
        coalescer.activate();

        for _ in 0..4 {
            coalescer.on_event();
            sleep_ms(150).await;
        }
        assert_eq!(
            calls.load(Ordering::SeqCst),
            0,
            "debounce fired although events kept arriving"
        );

        sleep_ms(500).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        coalescer.deactivate();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_max_latency_bounds_continuous_activity() {
        let calls = Arc::new(AtomicUsize::new(0));
        // Debounce alone would wait out the stream forever
        let coalescer = Coalescer::new(config(5_000, 1_000, 0), counting(Arc::clone(&calls)));
        coalescer.activate();

        for _ in 0..5 {
            coalescer.on_event();
            sleep_ms(300).await;
        }

        assert_eq!(
            calls.load(Ordering::SeqCst),
            1,
            "max latency did not bound the burst"
        );

        coalescer.deactivate();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_periodic_fires_without_activity() {
        let calls = Arc::new(AtomicUsize::new(0));
        let coalescer = Coalescer::new(config(10_000, 0, 500), counting(Arc::clone(&calls)));
        coalescer.activate();

        sleep_ms(1_800).await;
        let fired = calls.load(Ordering::SeqCst);
        assert!((2..=4).contains(&fired), "expected ~3 periodic fires, got {fired}");

        coalescer.deactivate();

        // No rearming after deactivation
        sleep_ms(700).await;
        assert_eq!(calls.load(Ordering::SeqCst), fired);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_periodic_leaves_burst_accounting_alone() {
        let calls = Arc::new(AtomicUsize::new(0));
        let coalescer = Coalescer::new(config(600, 0, 250), counting(Arc::clone(&calls)));
        coalescer.activate();

        coalescer.on_event();
        sleep_ms(400).await;

        // A periodic fire happened, but the burst is still pending
        assert!(calls.load(Ordering::SeqCst) >= 1);
        assert_eq!(coalescer.state.lock().event_count, 1);

        coalescer.deactivate();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_manual_trigger_is_immediate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let coalescer = Coalescer::new(config(60_000, 0, 0), counting(Arc::clone(&calls)));
        coalescer.activate();

        coalescer.on_event();
        coalescer.force_sync();

        sleep_ms(200).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coalescer.state.lock().event_count, 0, "accounting not reset");

        coalescer.deactivate();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_deactivate_cancels_pending_timers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let coalescer = Coalescer::new(config(200, 400, 0), counting(Arc::clone(&calls)));
        coalescer.activate();

        coalescer.on_event();
        coalescer.deactivate();

        sleep_ms(700).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_callback_error_does_not_wedge_scheduling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sync_fn: SyncFn = {
            let calls = Arc::clone(&calls);
            Arc::new(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("sync exploded")
            })
        };
        let coalescer = Coalescer::new(config(100, 0, 0), sync_fn);
        coalescer.activate();

        coalescer.on_event();
        sleep_ms(400).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The failure must not block the next burst
        coalescer.on_event();
        sleep_ms(400).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        coalescer.deactivate();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_trigger_tag_reaches_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sync_fn: SyncFn = {
            let seen = Arc::clone(&seen);
            Arc::new(move |trigger| {
                seen.lock().push(trigger);
                Ok(outcome())
            })
        };
        let coalescer = Coalescer::new(config(100, 0, 0), sync_fn);
        coalescer.activate();

        coalescer.force_sync();
        coalescer.on_event();
        sleep_ms(400).await;

        let seen = seen.lock();
        assert!(seen.contains(&SyncTrigger::Manual));
        assert!(seen.contains(&SyncTrigger::Debounce));

        coalescer.deactivate();
    }
}
