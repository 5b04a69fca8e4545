//! Strata Tracker -- mutation capture, batched events and rollback.
//!
//! This crate builds on [`strata_world`] and [`strata_provenance`] to wrap a
//! [`BlockStorage`](strata_world::storage::BlockStorage) in a
//! [`TrackedWorld`](world::TrackedWorld). Every block write goes through the
//! interceptor, which snapshots the cell, classifies the change and records
//! it in the [`CaptureLedger`](ledger::CaptureLedger). When a tick scope ends
//! the flush publishes one event per capture kind; listeners may cancel a
//! batch (every original is restored), invalidate single transactions, or
//! substitute custom replacements. Entity spawns made during a scope are
//! deferred and published in batches with a provenance-rich cause.
//!
//! # Quick Start
//!
//! ```
//! use strata_tracker::prelude::*;
//!
//! let pos = BlockPos::new(0, 64, 0);
//! let mut storage = MemoryStorage::new(WorldId(0));
//! storage.place(pos, BlockState::of(BlockType::STONE));
//!
//! let mut bus = ListenerBus::new();
//! bus.on(EventKind::ChangeBlock, Box::new(|_| EventResult::Cancelled));
//!
//! let mut world = TrackedWorld::new(storage, bus);
//! let report = world
//!     .tick_block(pos.up(), |w| {
//!         w.set_state(pos, BlockState::AIR, UpdateFlags::DEFAULT)?;
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! assert_eq!(report.cancelled, Some(CaptureKind::Break));
//! assert_eq!(world.storage().read(pos), BlockState::of(BlockType::STONE));
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod event;
pub mod flush;
pub mod guard;
pub mod intent;
pub mod interceptor;
pub mod ledger;
pub mod world;

use strata_world::block::BlockState;
use strata_world::entity::EntityId;
use strata_world::pos::{BlockPos, WorldId};
use strata_world::storage::StorageError;
use strata_world::WorldError;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the world crate for convenience.
pub use strata_world;

/// Re-export the provenance crate for convenience.
pub use strata_provenance;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the tracker.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// The storage backend refused a block write.
    #[error("setting {state} at {pos} in {world} failed")]
    MutationFailed {
        world: WorldId,
        pos: BlockPos,
        state: BlockState,
        #[source]
        source: StorageError,
    },

    /// An entity spawn was requested without any cause.
    #[error("spawn of entity {entity} requested with an empty cause")]
    EmptyCause { entity: EntityId },

    /// A restore was requested while another restore held the guard.
    #[error("restore already in progress in {world}")]
    NestedRestore { world: WorldId },

    #[error(transparent)]
    Snapshot(#[from] WorldError),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common tracker usage.
pub mod prelude {
    pub use strata_world::prelude::*;

    pub use crate::config::TrackerConfig;
    pub use crate::event::{
        ChangeBlockEvent, DestructEntityEvent, DropItemEvent, DropKind, EventBus, EventKind,
        EventResult, InteractInventoryEvent, InventoryInteraction, Listener, ListenerBus,
        PopulateChunkEvent, SpawnEntityEvent, SpawnKind, WorldEvent,
    };
    pub use crate::flush::FlushReport;
    pub use crate::guard::RestoreGuard;
    pub use crate::intent::{Intent, IntentActor, IntentContext};
    pub use crate::ledger::{CaptureLedger, PendingCapture, SpawnerKind, TickingSource};
    pub use crate::world::{PlacementHook, TrackedWorld};
    pub use crate::TrackerError;

    pub use strata_provenance::journal::{ActionJournal, BlockAction, SpawnAction, SpawnOrigin};
    pub use strata_provenance::table::{ProvenanceStore, TrackingRole};
}
