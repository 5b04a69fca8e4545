//! Scoped restore flag.
//!
//! While a restore is running, block writes are not captured and item drops
//! are refused. [`RestoreGuard`] borrows the world mutably, raises the flag on
//! acquisition and lowers it on drop, so the flag is cleared on every exit
//! path including early returns through `?`.

use std::ops::{Deref, DerefMut};

use strata_world::storage::BlockStorage;

use crate::event::EventBus;
use crate::world::TrackedWorld;
use crate::TrackerError;

/// Exclusive access to a world with the restore flag raised.
pub struct RestoreGuard<'a, S: BlockStorage, B: EventBus> {
    world: &'a mut TrackedWorld<S, B>,
}

impl<'a, S: BlockStorage, B: EventBus> RestoreGuard<'a, S, B> {
    /// Raise the restore flag. Fails if a restore is already in progress.
    pub fn acquire(world: &'a mut TrackedWorld<S, B>) -> Result<Self, TrackerError> {
        if world.ledger.is_restoring() {
            return Err(TrackerError::NestedRestore {
                world: world.world_id(),
            });
        }
        world.ledger.set_restoring(true);
        Ok(Self { world })
    }
}

impl<S: BlockStorage, B: EventBus> Deref for RestoreGuard<'_, S, B> {
    type Target = TrackedWorld<S, B>;

    fn deref(&self) -> &Self::Target {
        self.world
    }
}

impl<S: BlockStorage, B: EventBus> DerefMut for RestoreGuard<'_, S, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.world
    }
}

impl<S: BlockStorage, B: EventBus> Drop for RestoreGuard<'_, S, B> {
    fn drop(&mut self) {
        self.world.ledger.set_restoring(false);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
