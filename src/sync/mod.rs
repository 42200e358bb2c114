//! Polling and selection-driven synchronisation.
//! Every component owns its snapshots; consumers only read or subscribe.

mod generation;
mod stats;
mod snapshot;
mod resource;
mod selection;
mod relay;

pub use generation::{ApplyOutcome, Generation, GenerationClock};
pub use stats::{SyncCounters, SyncStats};
pub use snapshot::{SnapshotCell, SyncSnapshot};
pub use resource::{CollectionSource, ResourceSync};
pub use selection::{EntityId, NestedSource, ResourceKind, SelectionKey, SelectionSync, View};
pub use relay::{MutationRelay, MutationScope, RelayReceipt};
