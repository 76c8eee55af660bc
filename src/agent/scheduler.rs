use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Produces one cycle future per tick
pub type CycleFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub started: u64,
    pub completed: u64,
    /// Ticks dropped because a cycle was still running
    pub skipped: u64,
    pub in_flight: bool,
}

#[derive(Default)]
struct Counters {
    ticks: AtomicU64,
    started: AtomicU64,
    completed: AtomicU64,
    skipped: AtomicU64,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the cycle task finishes or unwinds
struct InFlight(Arc<Counters>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.completed.fetch_add(1, Ordering::SeqCst);
        self.0.in_flight.store(false, Ordering::SeqCst);
    }
}

struct Running {
    stop_tx: watch::Sender<bool>,
    ticker: JoinHandle<()>,
}

/// Periodic driver that never runs two cycles at once.
///
/// A tick that lands while a cycle is in flight is dropped, not queued.
/// Stopping cancels the timer only; a cycle already running sees the epoch
/// move, makes no further sink attempts and discards its result.
#[derive(Default)]
pub struct Scheduler {
    running: Mutex<Option<Running>>,
    counters: Arc<Counters>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking every `interval`. The first tick fires immediately.
    pub async fn start(&self, interval: Duration, cycle_fn: CycleFn) {
        let mut running = self.running.lock().await;
        if let Some(previous) = running.take() {
            warn!("Scheduler already running, restarting");
            Self::halt(previous);
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let counters = self.counters.clone();
        let period = interval.max(Duration::from_millis(1));

        let ticker = tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let n = counters.ticks.fetch_add(1, Ordering::SeqCst) + 1;
                        if counters
                            .in_flight
                            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                            .is_err()
                        {
                            counters.skipped.fetch_add(1, Ordering::SeqCst);
                            warn!(tick = n, "Previous cycle still running, skipping tick");
                            continue;
                        }

                        counters.started.fetch_add(1, Ordering::SeqCst);
                        debug!(tick = n, "Starting cycle");
                        let guard = InFlight(counters.clone());
                        let cycle = cycle_fn();
                        tokio::spawn(async move {
                            let _guard = guard;
                            cycle.await;
                        });
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Scheduler ticker exited");
        });

        info!(interval_ms = period.as_millis() as u64, "Scheduler started");
        *running = Some(Running { stop_tx, ticker });
    }

    /// Cancel the timer. Returns false if it was not running.
    pub async fn stop(&self) -> bool {
        match self.running.lock().await.take() {
            Some(running) => {
                Self::halt(running);
                info!(
                    in_flight = self.counters.in_flight.load(Ordering::SeqCst),
                    "Scheduler stopped"
                );
                true
            }
            None => false,
        }
    }

    fn halt(running: Running) {
        let _ = running.stop_tx.send(true);
        running.ticker.abort();
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    pub fn stats(&self) -> SchedulerStats {
        let c = &self.counters;
        SchedulerStats {
            ticks: c.ticks.load(Ordering::SeqCst),
            started: c.started.load(Ordering::SeqCst),
            completed: c.completed.load(Ordering::SeqCst),
            skipped: c.skipped.load(Ordering::SeqCst),
            in_flight: c.in_flight.load(Ordering::SeqCst),
        }
    }
}
