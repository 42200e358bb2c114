use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::generation::Generation;
use super::resource::{CollectionSource, ResourceSync};
use super::selection::{NestedSource, SelectionSync};

/// Which displayed state a successful write may have changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationScope {
    Collection,
    Selection,
    Both,
}

impl MutationScope {
    pub fn touches_collection(&self) -> bool { matches!(self, MutationScope::Collection | MutationScope::Both) }

    pub fn touches_selection(&self) -> bool { matches!(self, MutationScope::Selection | MutationScope::Both) }
}

/// What a relay call kicked off. Refresh outcomes are reported by the sync
/// components themselves, never folded back into the write's result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReceipt {
    pub collection: Option<Generation>,
    pub nested: usize,
}

/// Post-write convergence: asks the sync components to refetch now instead
/// of waiting for the next tick.
pub struct MutationRelay<C: CollectionSource, N: NestedSource> {
    collection: Arc<ResourceSync<C>>,
    selection: Arc<SelectionSync<N>>,
}

impl<C: CollectionSource, N: NestedSource> Clone for MutationRelay<C, N> {
    fn clone(&self) -> Self {
        Self { collection: Arc::clone(&self.collection), selection: Arc::clone(&self.selection) }
    }
}

impl<C: CollectionSource, N: NestedSource> MutationRelay<C, N> {
    pub fn new(collection: Arc<ResourceSync<C>>, selection: Arc<SelectionSync<N>>) -> Self {
        Self { collection, selection }
    }

    /// Fire-and-forget; returns as soon as the refetches are issued.
    pub fn after_mutation(&self, scope: MutationScope) -> RelayReceipt {
        let mut receipt = RelayReceipt::default();
        if scope.touches_collection() {
            receipt.collection = self.collection.refresh_now();
        }
        if scope.touches_selection() {
            receipt.nested = self.selection.refresh();
        }
        debug!(target: "projdash::relay", ?scope, collection = ?receipt.collection, nested = receipt.nested, "post-write refresh issued");
        receipt
    }
}
