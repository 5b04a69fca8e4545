//! Immutable block captures and the resettable builder that produces them.
//!
//! A [`BlockSnapshot`] records everything needed to put a block cell back the
//! way it was: the world and position, the stored and extended (derived)
//! states, the serialized fixture payload if the block owns one, and the
//! update flags the original write was issued with.
//!
//! Snapshots are built through a [`SnapshotBuilder`]. The interceptor owns a
//! single builder per world and resets it for every capture, so capturing a
//! mutation does not allocate a new builder.
//!
//! # Example
//!
//! ```
//! use strata_world::prelude::*;
//!
//! let mut builder = SnapshotBuilder::new();
//! let snapshot = builder
//!     .world(WorldId(0))
//!     .position(BlockPos::new(1, 64, 1))
//!     .state(BlockState::of(BlockType::STONE))
//!     .build(UpdateFlags::DEFAULT)
//!     .unwrap();
//!
//! assert_eq!(snapshot.state, BlockState::of(BlockType::STONE));
//! assert_eq!(snapshot.extended_state, snapshot.state);
//!
//! let air = snapshot.with_state(BlockState::AIR);
//! assert_eq!(air.pos, snapshot.pos);
//! assert!(air.state.is_empty());
//! ```

use serde::{Deserialize, Serialize};

use crate::block::{BlockState, UpdateFlags};
use crate::pos::{BlockPos, WorldId};
use crate::WorldError;

// ---------------------------------------------------------------------------
// BlockSnapshot
// ---------------------------------------------------------------------------

/// An immutable capture of one block cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSnapshot {
    pub world_id: WorldId,
    pub pos: BlockPos,
    /// The stored state.
    pub state: BlockState,
    /// The state as rendered, derived from neighbors (fence connections,
    /// stair shapes). Equals `state` for blocks without derived properties.
    pub extended_state: BlockState,
    /// Serialized fixture payload, present only for fixture-bearing blocks.
    pub fixture: Option<serde_json::Value>,
    /// Flags of the write that produced this capture.
    pub update_flags: UpdateFlags,
}

impl BlockSnapshot {
    /// A sibling snapshot at the same position carrying `state`.
    ///
    /// The fixture payload is kept only when the new state still owns a
    /// fixture.
    pub fn with_state(&self, state: BlockState) -> BlockSnapshot {
        BlockSnapshot {
            world_id: self.world_id,
            pos: self.pos,
            state,
            extended_state: state,
            fixture: if state.has_fixture() {
                self.fixture.clone()
            } else {
                None
            },
            update_flags: self.update_flags,
        }
    }

    /// Put this capture back into `target`.
    ///
    /// When `force` is `false` the restore is refused (`Ok(false)`) if the
    /// block type currently at the position differs from the captured one.
    /// When `notify` is `false` neighbor physics and client updates are
    /// skipped.
    pub fn restore<R: BlockRestore + ?Sized>(
        &self,
        target: &mut R,
        force: bool,
        notify: bool,
    ) -> Result<bool, R::Error> {
        target.restore_block(self, force, notify)
    }
}

// ---------------------------------------------------------------------------
// BlockRestore
// ---------------------------------------------------------------------------

/// A world that can write a [`BlockSnapshot`] back into place.
pub trait BlockRestore {
    type Error;

    fn restore_block(
        &mut self,
        snapshot: &BlockSnapshot,
        force: bool,
        notify: bool,
    ) -> Result<bool, Self::Error>;
}

// ---------------------------------------------------------------------------
// SnapshotBuilder
// ---------------------------------------------------------------------------

/// Reusable builder for [`BlockSnapshot`]s.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    world_id: Option<WorldId>,
    pos: Option<BlockPos>,
    state: Option<BlockState>,
    extended_state: Option<BlockState>,
    fixture: Option<serde_json::Value>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn world(&mut self, world_id: WorldId) -> &mut Self {
        self.world_id = Some(world_id);
        self
    }

    pub fn position(&mut self, pos: BlockPos) -> &mut Self {
        self.pos = Some(pos);
        self
    }

    pub fn state(&mut self, state: BlockState) -> &mut Self {
        self.state = Some(state);
        self
    }

    pub fn extended_state(&mut self, state: BlockState) -> &mut Self {
        self.extended_state = Some(state);
        self
    }

    pub fn fixture(&mut self, payload: serde_json::Value) -> &mut Self {
        self.fixture = Some(payload);
        self
    }

    /// Clear every field so the builder can be reused.
    pub fn reset(&mut self) -> &mut Self {
        self.world_id = None;
        self.pos = None;
        self.state = None;
        self.extended_state = None;
        self.fixture = None;
        self
    }

    /// Produce a snapshot from the fields set so far.
    ///
    /// World, position and state are required. The extended state defaults
    /// to the stored state. The fixture payload is moved out of the builder;
    /// the other fields stay set until [`reset`](Self::reset).
    pub fn build(&mut self, update_flags: UpdateFlags) -> Result<BlockSnapshot, WorldError> {
        let world_id = self
            .world_id
            .ok_or(WorldError::IncompleteSnapshot { field: "world" })?;
        let pos = self
            .pos
            .ok_or(WorldError::IncompleteSnapshot { field: "position" })?;
        let state = self
            .state
            .ok_or(WorldError::IncompleteSnapshot { field: "state" })?;
        Ok(BlockSnapshot {
            world_id,
            pos,
            state,
            extended_state: self.extended_state.unwrap_or(state),
            fixture: self.fixture.take(),
            update_flags,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
