//! Interval polling of the top-level collection.
//!
//! `start` fetches immediately and then on every tick; each tick launches its
//! fetch as a separate task, so a slow response never delays the schedule.
//! `refresh_now` launches an out-of-band fetch and leaves the tick phase
//! alone. A failed fetch keeps the previous snapshot and raises its error
//! flag; the next tick proceeds as usual.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::generation::{ApplyOutcome, Generation};
use super::snapshot::{SnapshotCell, SyncSnapshot};
use super::stats::{SyncCounters, SyncStats};
use crate::error::AppResult;

/// Read seam for the top-level collection.
pub trait CollectionSource: Send + Sync + 'static {
    type Item: Clone + Send + Sync + 'static;

    fn fetch_collection(&self) -> BoxFuture<'_, AppResult<Vec<Self::Item>>>;
}

struct ResourceInner<S: CollectionSource> {
    source: Arc<S>,
    cell: SnapshotCell<S::Item>,
    /// Held while a generation is issued, so `stop` either sees that
    /// generation and supersedes it or the issuer sees the stop.
    running: Mutex<bool>,
    counters: SyncCounters,
}

impl<S: CollectionSource> ResourceInner<S> {
    /// Issue and launch one fetch. `None` once polling is stopped.
    fn spawn_fetch(self: &Arc<Self>, reason: &'static str) -> Option<Generation> {
        let gen = {
            let running = self.running.lock();
            if !*running {
                return None;
            }
            self.cell.begin()
        };
        self.counters.inc_started();
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let res = inner.source.fetch_collection().await;
            inner.settle(gen, reason, res);
        });
        Some(gen)
    }

    fn settle(&self, gen: Generation, reason: &'static str, res: AppResult<Vec<S::Item>>) {
        match res {
            Ok(items) => {
                let count = items.len();
                match self.cell.apply(gen, items) {
                    ApplyOutcome::Applied => {
                        self.counters.inc_applied();
                        debug!(target: "projdash::sync", %gen, reason, count, outcome = "applied", "collection snapshot replaced");
                    }
                    ApplyOutcome::Stale => {
                        self.counters.inc_stale();
                        debug!(target: "projdash::sync", %gen, reason, outcome = "stale", "superseded collection response dropped");
                    }
                }
            }
            Err(e) => match self.cell.fail(gen, e.to_string()) {
                ApplyOutcome::Applied => {
                    self.counters.inc_failed();
                    warn!(target: "projdash::sync", %gen, reason, outcome = "failed", error = %e, "collection fetch failed; keeping previous snapshot");
                }
                ApplyOutcome::Stale => {
                    self.counters.inc_stale();
                    debug!(target: "projdash::sync", %gen, reason, outcome = "stale", error = %e, "superseded collection failure dropped");
                }
            },
        }
    }
}

/// Owner of the top-level collection snapshot.
pub struct ResourceSync<S: CollectionSource> {
    inner: Arc<ResourceInner<S>>,
    poll: Duration,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl<S: CollectionSource> ResourceSync<S> {
    pub fn new(source: Arc<S>, poll: Duration) -> Self {
        Self {
            inner: Arc::new(ResourceInner {
                source,
                cell: SnapshotCell::new(),
                running: Mutex::new(false),
                counters: SyncCounters::default(),
            }),
            poll,
            ticker: Mutex::new(None),
        }
    }

    /// Begin polling: one fetch now, then one per interval. No-op while running.
    pub fn start(&self) {
        let mut ticker = self.ticker.lock();
        if ticker.is_some() {
            return;
        }
        *self.inner.running.lock() = true;
        let inner = Arc::clone(&self.inner);
        let period = self.poll;
        debug!(target: "projdash::sync", poll_ms = period.as_millis() as u64, "collection polling started");
        *ticker = Some(tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                if inner.spawn_fetch("tick").is_none() {
                    break;
                }
            }
        }));
    }

    /// Halt the interval. A fetch already in flight runs to completion and
    /// is discarded when it lands.
    pub fn stop(&self) {
        let handle = self.ticker.lock().take();
        if let Some(handle) = handle {
            handle.abort();
            // abort does not preempt a tick already issuing; the flag does
            let mut running = self.inner.running.lock();
            *running = false;
            self.inner.cell.supersede();
            drop(running);
            debug!(target: "projdash::sync", "collection polling stopped");
        }
    }

    pub fn is_running(&self) -> bool { *self.inner.running.lock() }

    /// Out-of-band fetch that supersedes anything in flight. Ignored when stopped.
    pub fn refresh_now(&self) -> Option<Generation> {
        let gen = self.inner.spawn_fetch("refresh");
        if gen.is_none() {
            debug!(target: "projdash::sync", "refresh_now ignored: polling stopped");
        }
        gen
    }

    pub fn snapshot(&self) -> SyncSnapshot<S::Item> { self.inner.cell.snapshot() }

    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot<S::Item>> { self.inner.cell.subscribe() }

    pub fn stats(&self) -> SyncStats { self.inner.counters.snapshot() }

    pub fn source(&self) -> &Arc<S> { &self.inner.source }
}

impl<S: CollectionSource> Drop for ResourceSync<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.ticker.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod resource_tests;
