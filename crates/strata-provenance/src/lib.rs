//! Strata Provenance -- who is behind a change, and what changed this tick.
//!
//! The capture engine attributes mutations whose direct trigger is not a
//! user (a block tick, a piston, a falling entity) by consulting recorded
//! provenance. This crate holds those records and a journal of committed
//! changes.
//!
//! # Modules
//!
//! - [`table`]: owner/notifier tracking per block position and
//!   creator/notifier tracking per entity.
//! - [`journal`]: per-tick record of committed block actions and spawns,
//!   queryable by position, capture kind and actor.

#![deny(unsafe_code)]

pub mod journal;
pub mod table;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::journal::{ActionJournal, BlockAction, SpawnAction, SpawnOrigin};
    pub use crate::table::{EntityProvenance, PositionTable, ProvenanceStore, TrackingRole};
}
