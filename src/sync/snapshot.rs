use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::generation::{ApplyOutcome, Generation, GenerationClock};

/// Last successfully fetched, currently displayed copy of a collection.
///
/// `items` is replaced wholesale on success and kept as-is on failure;
/// `error` is raised for the failed cycle and cleared by the next success.
#[derive(Debug, Clone)]
pub struct SyncSnapshot<T> {
    pub items: Arc<Vec<T>>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub generation: Generation,
    pub error: Option<String>,
}

impl<T> SyncSnapshot<T> {
    pub fn empty(generation: Generation) -> Self {
        Self { items: Arc::new(Vec::new()), fetched_at: None, generation, error: None }
    }

    /// Nothing has been fetched for the current key yet.
    pub fn is_pending(&self) -> bool { self.fetched_at.is_none() && self.error.is_none() }

    pub fn is_failed(&self) -> bool { self.error.is_some() }

    pub fn len(&self) -> usize { self.items.len() }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }
}

impl<T> Default for SyncSnapshot<T> {
    fn default() -> Self { Self::empty(Generation::default()) }
}

/// Single owner of one snapshot and its generation clock.
///
/// Readers subscribe to the watch channel; every write goes through
/// `apply`/`fail`, which drop anything not tagged with the latest generation.
pub struct SnapshotCell<T> {
    clock: GenerationClock,
    tx: watch::Sender<SyncSnapshot<T>>,
}

impl<T: Clone + Send + Sync + 'static> SnapshotCell<T> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SyncSnapshot::default());
        Self { clock: GenerationClock::new(), tx }
    }

    /// Issue the generation for a fetch that is about to start.
    pub fn begin(&self) -> Generation { self.clock.issue() }

    /// Issue a generation and clear the visible snapshot, for when the thing
    /// being displayed changed identity (a different selection).
    pub fn begin_reset(&self) -> Generation {
        self.clock.issue_with(|gen| {
            self.tx.send_replace(SyncSnapshot::empty(gen));
            gen
        })
    }

    /// Invalidate in-flight fetches without touching what is displayed.
    pub fn supersede(&self) -> Generation { self.clock.supersede() }

    pub fn is_current(&self, gen: Generation) -> bool { self.clock.is_current(gen) }

    pub fn apply(&self, gen: Generation, items: Vec<T>) -> ApplyOutcome {
        self.clock.apply_if_current(gen, || {
            self.tx.send_replace(SyncSnapshot {
                items: Arc::new(items),
                fetched_at: Some(Utc::now()),
                generation: gen,
                error: None,
            });
        })
    }

    pub fn fail(&self, gen: Generation, error: String) -> ApplyOutcome {
        self.clock.apply_if_current(gen, || {
            self.tx.send_modify(|snap| snap.error = Some(error));
        })
    }

    pub fn snapshot(&self) -> SyncSnapshot<T> { self.tx.borrow().clone() }

    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot<T>> { self.tx.subscribe() }
}

impl<T: Clone + Send + Sync + 'static> Default for SnapshotCell<T> {
    fn default() -> Self { Self::new() }
}
