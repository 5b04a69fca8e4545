//! Strata World -- data model for captured world mutations.
//!
//! This crate defines the values the capture engine passes around: block
//! positions and states, immutable [`BlockSnapshot`](snapshot::BlockSnapshot)s
//! built through a reusable builder, [`Transaction`](transaction::Transaction)s
//! that listeners can invalidate or override, the [`CaptureKind`](capture::CaptureKind)
//! classification, ordered [`Cause`](cause::Cause) chains, entity handles with
//! capability traits, and the [`BlockStorage`](storage::BlockStorage)
//! boundary the engine writes through.
//!
//! # Quick Start
//!
//! ```
//! use strata_world::prelude::*;
//!
//! let mut storage = MemoryStorage::new(WorldId(0));
//! let pos = BlockPos::new(0, 64, 0);
//! storage.place(pos, BlockState::of(BlockType::STONE));
//!
//! let old = storage.read(pos);
//! let kind = CaptureKind::classify(None, false, &old, &BlockState::AIR);
//! assert_eq!(kind, CaptureKind::Break);
//!
//! let outcome = storage.write(pos, BlockState::AIR, old).unwrap();
//! assert_eq!(outcome, WriteOutcome::Written(old));
//! ```

#![deny(unsafe_code)]

pub mod block;
pub mod capture;
pub mod cause;
pub mod entity;
pub mod pos;
pub mod snapshot;
pub mod storage;
pub mod transaction;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while building world values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// A snapshot was built before a required field was set.
    #[error("snapshot is missing required field '{field}'")]
    IncompleteSnapshot { field: &'static str },

    /// An entity id was referenced that is not in the live index.
    #[error("entity {entity:?} is not in the world")]
    UnknownEntity { entity: entity::EntityId },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::block::{BlockState, BlockType, Fixture, Material, UpdateFlags};
    pub use crate::capture::{CaptureKind, ProcedureId};
    pub use crate::cause::{Actor, ActorId, Cause, CauseValue, CauseVariant, NamedCause};
    pub use crate::entity::{
        BasicEntity, EntityAllocator, EntityCategory, EntityId, EntityIndex, EntityRef,
        EntitySnapshot, HasIgniter, HasOwner, HasThrower, WorldEntity,
    };
    pub use crate::pos::{BlockPos, Direction, RegionPos, WorldId};
    pub use crate::snapshot::{BlockRestore, BlockSnapshot, SnapshotBuilder};
    pub use crate::storage::{BlockStorage, MemoryStorage, StorageError, WriteOutcome};
    pub use crate::transaction::{BlockTransaction, Transaction};
    pub use crate::WorldError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
