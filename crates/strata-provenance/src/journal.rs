//! Per-tick journal of committed block changes and entity spawns.
//!
//! The [`ActionJournal`] records every block change that survived its batch
//! event and every entity that entered the world through a spawn or drop
//! event, together with the actor the change was attributed to. It is
//! cleared at the start of each tick via [`ActionJournal::clear`].
//!
//! # Query API
//!
//! - **Position**: [`ActionJournal::actions_at`]
//! - **Capture kind**: [`ActionJournal::actions_of_kind`]
//! - **Actor**: [`ActionJournal::actions_by`], [`ActionJournal::spawns_by`]
//!
//! # Example
//!
//! ```
//! use strata_provenance::journal::{ActionJournal, BlockAction};
//! use strata_world::prelude::*;
//!
//! let mut journal = ActionJournal::new();
//! let alex = Actor::new(ActorId(1), "alex");
//!
//! journal.record_block(BlockAction {
//!     world_id: WorldId(0),
//!     pos: BlockPos::new(0, 64, 0),
//!     kind: CaptureKind::Break,
//!     old: BlockState::of(BlockType::STONE),
//!     new: BlockState::AIR,
//!     actor: Some(alex.clone()),
//!     tick: 1,
//! });
//!
//! assert_eq!(journal.len(), 1);
//! assert_eq!(journal.actions_by(alex.id).count(), 1);
//! ```

use serde::{Deserialize, Serialize};

use strata_world::block::BlockState;
use strata_world::capture::CaptureKind;
use strata_world::cause::{Actor, ActorId};
use strata_world::entity::EntitySnapshot;
use strata_world::pos::{BlockPos, WorldId};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A block change that was committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockAction {
    pub world_id: WorldId,
    pub pos: BlockPos,
    pub kind: CaptureKind,
    pub old: BlockState,
    /// The state after commit, including any listener override.
    pub new: BlockState,
    pub actor: Option<Actor>,
    pub tick: u64,
}

/// How an entity entered the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnOrigin {
    /// Spawned directly, outside any ticking scope.
    Custom,
    /// Spawned as a side effect of a tick and flushed in a batch.
    Batched,
    /// An item dropped as a side effect of a tick.
    Dropped,
}

/// An entity that entered the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnAction {
    pub world_id: WorldId,
    pub entity: EntitySnapshot,
    pub origin: SpawnOrigin,
    pub actor: Option<Actor>,
    pub tick: u64,
}

// ---------------------------------------------------------------------------
// ActionJournal
// ---------------------------------------------------------------------------

/// Accumulates [`BlockAction`]s and [`SpawnAction`]s during a tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionJournal {
    blocks: Vec<BlockAction>,
    spawns: Vec<SpawnAction>,
}

impl ActionJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_block(&mut self, action: BlockAction) {
        self.blocks.push(action);
    }

    pub fn record_spawn(&mut self, action: SpawnAction) {
        self.spawns.push(action);
    }

    /// Clear everything. Called at the start of each tick.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.spawns.clear();
    }

    /// Total number of recorded block actions and spawns.
    pub fn len(&self) -> usize {
        self.blocks.len() + self.spawns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.spawns.is_empty()
    }

    /// Block actions in commit order.
    pub fn block_actions(&self) -> &[BlockAction] {
        &self.blocks
    }

    /// Spawns in commit order.
    pub fn spawn_actions(&self) -> &[SpawnAction] {
        &self.spawns
    }

    pub fn actions_at(&self, pos: BlockPos) -> impl Iterator<Item = &BlockAction> {
        self.blocks.iter().filter(move |a| a.pos == pos)
    }

    pub fn actions_of_kind<'a>(
        &'a self,
        kind: &'a CaptureKind,
    ) -> impl Iterator<Item = &'a BlockAction> {
        self.blocks.iter().filter(move |a| &a.kind == kind)
    }

    pub fn actions_by(&self, actor: ActorId) -> impl Iterator<Item = &BlockAction> {
        self.blocks
            .iter()
            .filter(move |a| a.actor.as_ref().map(|x| x.id) == Some(actor))
    }

    pub fn spawns_by(&self, actor: ActorId) -> impl Iterator<Item = &SpawnAction> {
        self.spawns
            .iter()
            .filter(move |s| s.actor.as_ref().map(|x| x.id) == Some(actor))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
