//! Nested resource sets that follow the current selection.
//!
//! A `SelectionKey` is the (entity, view) pair the user is looking at. Which
//! nested kinds a view needs is a static table (`View::required_kinds`). On
//! every key change each kind's snapshot is cleared under a fresh generation
//! and the required kinds are fetched concurrently, one task per kind. A
//! response tagged with a superseded generation is dropped on arrival, so a
//! fetch for an old selection can never leak into the new one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::generation::{ApplyOutcome, Generation};
use super::snapshot::{SnapshotCell, SyncSnapshot};
use super::stats::{SyncCounters, SyncStats};
use crate::error::AppResult;

pub type EntityId = i64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    #[default]
    Dashboard,
    List,
    Detail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Checklist,
    Comments,
    Stakeholders,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [ResourceKind::Checklist, ResourceKind::Comments, ResourceKind::Stakeholders];

    fn index(&self) -> usize {
        match self {
            ResourceKind::Checklist => 0,
            ResourceKind::Comments => 1,
            ResourceKind::Stakeholders => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Checklist => "checklist",
            ResourceKind::Comments => "comments",
            ResourceKind::Stakeholders => "stakeholders",
        }
    }
}

impl View {
    /// Nested kinds a view keeps fresh for its selected entity.
    pub fn required_kinds(&self) -> &'static [ResourceKind] {
        match self {
            View::Detail => &ResourceKind::ALL,
            View::Dashboard | View::List => &[],
        }
    }
}

/// What is selected. Equality is structural: same entity and same view means
/// nothing to re-fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectionKey {
    pub entity_id: Option<EntityId>,
    pub view: View,
}

impl SelectionKey {
    pub fn dashboard() -> Self { Self { entity_id: None, view: View::Dashboard } }

    pub fn detail(entity_id: EntityId) -> Self { Self { entity_id: Some(entity_id), view: View::Detail } }

    /// Kinds to fetch for this key; empty when the view needs an entity and none is selected.
    pub fn fetch_plan(&self) -> &'static [ResourceKind] {
        match self.entity_id {
            Some(_) => self.view.required_kinds(),
            None => &[],
        }
    }
}

/// Read seam for nested resources keyed by parent entity.
pub trait NestedSource: Send + Sync + 'static {
    type Item: Clone + Send + Sync + 'static;

    fn fetch_nested(&self, kind: ResourceKind, parent: EntityId) -> BoxFuture<'_, AppResult<Vec<Self::Item>>>;
}

struct KindSlot<T> {
    kind: ResourceKind,
    cell: SnapshotCell<T>,
}

struct SelectionInner<S: NestedSource> {
    source: Arc<S>,
    key: Mutex<SelectionKey>,
    slots: Vec<KindSlot<S::Item>>,
    active: AtomicBool,
    counters: SyncCounters,
}

impl<S: NestedSource> SelectionInner<S> {
    fn slot(&self, kind: ResourceKind) -> &KindSlot<S::Item> {
        // slots are built in ResourceKind::ALL order
        &self.slots[kind.index()]
    }

    fn spawn_fetch(self: &Arc<Self>, kind: ResourceKind, parent: EntityId, gen: Generation) {
        self.counters.inc_started();
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let res = inner.source.fetch_nested(kind, parent).await;
            inner.settle(kind, parent, gen, res);
        });
    }

    fn settle(&self, kind: ResourceKind, parent: EntityId, gen: Generation, res: AppResult<Vec<S::Item>>) {
        let cell = &self.slot(kind).cell;
        let kind = kind.as_str();
        match res {
            Ok(items) => {
                let count = items.len();
                match cell.apply(gen, items) {
                    ApplyOutcome::Applied => {
                        self.counters.inc_applied();
                        debug!(target: "projdash::selection", kind, parent, %gen, count, outcome = "applied", "nested snapshot replaced");
                    }
                    ApplyOutcome::Stale => {
                        self.counters.inc_stale();
                        debug!(target: "projdash::selection", kind, parent, %gen, outcome = "stale", "response for superseded selection dropped");
                    }
                }
            }
            Err(e) => match cell.fail(gen, e.to_string()) {
                ApplyOutcome::Applied => {
                    self.counters.inc_failed();
                    warn!(target: "projdash::selection", kind, parent, %gen, outcome = "failed", error = %e, "nested fetch failed; keeping previous snapshot");
                }
                ApplyOutcome::Stale => {
                    self.counters.inc_stale();
                    debug!(target: "projdash::selection", kind, parent, %gen, outcome = "stale", error = %e, "failure for superseded selection dropped");
                }
            },
        }
    }

    /// Issue fresh generations for the key's required kinds and fetch them.
    /// `reset` clears every kind first (selection changed identity).
    fn issue(self: &Arc<Self>, key: &SelectionKey, reset: bool) -> usize {
        let plan = key.fetch_plan();
        let active = self.active.load(Ordering::SeqCst);
        let mut issued = 0;
        for slot in &self.slots {
            let needed = plan.contains(&slot.kind);
            let gen = if reset {
                slot.cell.begin_reset()
            } else if needed && active {
                slot.cell.begin()
            } else {
                continue;
            };
            match key.entity_id {
                Some(parent) if needed && active => {
                    self.spawn_fetch(slot.kind, parent, gen);
                    issued += 1;
                }
                _ => {}
            }
        }
        issued
    }
}

/// Owner of the nested snapshots for the current selection.
pub struct SelectionSync<S: NestedSource> {
    inner: Arc<SelectionInner<S>>,
}

impl<S: NestedSource> SelectionSync<S> {
    pub fn new(source: Arc<S>) -> Self {
        let slots = ResourceKind::ALL.iter().map(|&kind| KindSlot { kind, cell: SnapshotCell::new() }).collect();
        Self {
            inner: Arc::new(SelectionInner {
                source,
                key: Mutex::new(SelectionKey::default()),
                slots,
                active: AtomicBool::new(false),
                counters: SyncCounters::default(),
            }),
        }
    }

    /// Switch to `key`. Returns false (and does nothing) when the key is unchanged.
    /// While stopped the key is recorded and fetched once `start` is called.
    pub fn set_selection(&self, key: SelectionKey) -> bool {
        let mut cur = self.inner.key.lock();
        if *cur == key {
            return false;
        }
        info!(target: "projdash::selection", from = ?*cur, to = ?key, "selection changed");
        *cur = key;
        self.inner.issue(&key, true);
        true
    }

    /// Re-fetch the required kinds for the current key, keeping what is shown
    /// until the new data lands. Returns how many fetches were issued.
    pub fn refresh(&self) -> usize {
        let cur = self.inner.key.lock();
        self.inner.issue(&cur, false)
    }

    /// Allow fetching and bring the current key up to date.
    pub fn start(&self) -> usize {
        if self.inner.active.swap(true, Ordering::SeqCst) {
            return 0;
        }
        self.refresh()
    }

    /// Stop fetching; in-flight responses are dropped when they land.
    pub fn stop(&self) {
        if !self.inner.active.swap(false, Ordering::SeqCst) {
            return;
        }
        let _cur = self.inner.key.lock();
        for slot in &self.inner.slots {
            slot.cell.supersede();
        }
    }

    pub fn is_active(&self) -> bool { self.inner.active.load(Ordering::SeqCst) }

    pub fn current(&self) -> SelectionKey { *self.inner.key.lock() }

    pub fn snapshot(&self, kind: ResourceKind) -> SyncSnapshot<S::Item> { self.inner.slot(kind).cell.snapshot() }

    pub fn subscribe(&self, kind: ResourceKind) -> watch::Receiver<SyncSnapshot<S::Item>> { self.inner.slot(kind).cell.subscribe() }

    pub fn stats(&self) -> SyncStats { self.inner.counters.snapshot() }
}

#[cfg(test)]
#[path = "selection_tests.rs"]
mod selection_tests;
