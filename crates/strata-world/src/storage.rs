//! The block storage boundary and an in-memory implementation.
//!
//! [`BlockStorage`] is what the capture engine sits on top of: it reads and
//! writes block states, holds fixture payloads, and performs the follow-up
//! work of a write (light recalculation, neighbor physics, client updates).
//!
//! [`MemoryStorage`] keeps everything in hash maps and records every
//! follow-up request so callers can observe what a write triggered. Its
//! [`state_hash`](MemoryStorage::state_hash) gives a blake3 digest of the
//! block and fixture contents for exact before/after comparisons.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::block::BlockState;
use crate::pos::{BlockPos, Direction, WorldId};

// ---------------------------------------------------------------------------
// WriteOutcome / StorageError
// ---------------------------------------------------------------------------

/// Result of a storage write that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write happened; carries the state that was replaced.
    Written(BlockState),
    /// The stored state no longer matched the expected old state; nothing
    /// was written.
    Stale,
}

/// Failures raised by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("position {pos} is outside the loaded area")]
    OutOfBounds { pos: BlockPos },

    #[error("write to {pos} rejected: {reason}")]
    Rejected { pos: BlockPos, reason: String },
}

// ---------------------------------------------------------------------------
// BlockStorage
// ---------------------------------------------------------------------------

/// Low-level block storage of one world.
pub trait BlockStorage {
    fn world_id(&self) -> WorldId;

    /// `true` for a client-side mirror whose writes are never authoritative.
    fn is_remote(&self) -> bool;

    fn read(&self, pos: BlockPos) -> BlockState;

    /// The derived ("extended") state of `state` at `pos`.
    fn actual_state(&self, pos: BlockPos, state: BlockState) -> BlockState {
        let _ = pos;
        state
    }

    /// Replace `old` with `new` at `pos`.
    fn write(
        &mut self,
        pos: BlockPos,
        new: BlockState,
        old: BlockState,
    ) -> Result<WriteOutcome, StorageError>;

    /// Serialized fixture payload at `pos`, if any.
    fn fixture(&self, pos: BlockPos) -> Option<serde_json::Value>;

    fn set_fixture(&mut self, pos: BlockPos, payload: Option<serde_json::Value>);

    fn schedule_light_recalc(&mut self, pos: BlockPos);

    /// Run neighbor physics around `pos`, skipping the `except` face.
    fn notify_neighbors(&mut self, pos: BlockPos, source: BlockState, except: Option<Direction>);

    fn schedule_client_notify(&mut self, pos: BlockPos);
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// A neighbor-physics request recorded by [`MemoryStorage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborNotice {
    pub pos: BlockPos,
    pub source: BlockState,
    pub except: Option<Direction>,
}

/// Hash-map backed [`BlockStorage`]. Unset positions read as air.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    world_id: WorldId,
    remote: bool,
    blocks: HashMap<BlockPos, BlockState>,
    fixtures: HashMap<BlockPos, serde_json::Value>,
    rejected: HashSet<BlockPos>,
    stale_once: HashSet<BlockPos>,
    pub light_updates: Vec<BlockPos>,
    pub neighbor_notices: Vec<NeighborNotice>,
    pub client_updates: Vec<BlockPos>,
    writes: u64,
}

impl MemoryStorage {
    pub fn new(world_id: WorldId) -> Self {
        Self {
            world_id,
            ..Self::default()
        }
    }

    /// A client-side mirror.
    pub fn remote(world_id: WorldId) -> Self {
        Self {
            remote: true,
            ..Self::new(world_id)
        }
    }

    /// Set a block directly, bypassing all bookkeeping.
    pub fn place(&mut self, pos: BlockPos, state: BlockState) {
        if state.is_empty() {
            self.blocks.remove(&pos);
        } else {
            self.blocks.insert(pos, state);
        }
    }

    /// Make every later write to `pos` fail with [`StorageError::Rejected`].
    pub fn reject_writes_at(&mut self, pos: BlockPos) {
        self.rejected.insert(pos);
    }

    /// Make the next write to `pos` report [`WriteOutcome::Stale`], as if the
    /// backing section had been unloaded between read and write.
    pub fn expire_next_write_at(&mut self, pos: BlockPos) {
        self.stale_once.insert(pos);
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> u64 {
        self.writes
    }

    /// Forget every recorded follow-up request.
    pub fn clear_notices(&mut self) {
        self.light_updates.clear();
        self.neighbor_notices.clear();
        self.client_updates.clear();
    }

    /// blake3 digest of the block and fixture contents, independent of
    /// insertion order.
    pub fn state_hash(&self) -> String {
        #[derive(Serialize)]
        struct HashableState<'a> {
            world: WorldId,
            blocks: Vec<(&'a BlockPos, &'a BlockState)>,
            fixtures: Vec<(&'a BlockPos, &'a serde_json::Value)>,
        }

        let blocks: BTreeMap<_, _> = self.blocks.iter().collect();
        let fixtures: BTreeMap<_, _> = self.fixtures.iter().collect();
        let hashable = HashableState {
            world: self.world_id,
            blocks: blocks.into_iter().collect(),
            fixtures: fixtures.into_iter().collect(),
        };

        let mut hasher = blake3::Hasher::new();
        match serde_json::to_vec(&hashable) {
            Ok(bytes) => {
                hasher.update(&bytes);
            }
            Err(e) => {
                tracing::warn!(error = %e, "state_hash: failed to serialize storage contents");
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

impl BlockStorage for MemoryStorage {
    fn world_id(&self) -> WorldId {
        self.world_id
    }

    fn is_remote(&self) -> bool {
        self.remote
    }

    fn read(&self, pos: BlockPos) -> BlockState {
        self.blocks.get(&pos).copied().unwrap_or(BlockState::AIR)
    }

    fn write(
        &mut self,
        pos: BlockPos,
        new: BlockState,
        old: BlockState,
    ) -> Result<WriteOutcome, StorageError> {
        if self.rejected.contains(&pos) {
            return Err(StorageError::Rejected {
                pos,
                reason: "position is write-protected".to_owned(),
            });
        }
        let previous = self.read(pos);
        if self.stale_once.remove(&pos) || previous != old {
            return Ok(WriteOutcome::Stale);
        }
        self.place(pos, new);
        if !new.has_fixture() {
            self.fixtures.remove(&pos);
        }
        self.writes += 1;
        Ok(WriteOutcome::Written(previous))
    }

    fn fixture(&self, pos: BlockPos) -> Option<serde_json::Value> {
        self.fixtures.get(&pos).cloned()
    }

    fn set_fixture(&mut self, pos: BlockPos, payload: Option<serde_json::Value>) {
        match payload {
            Some(value) => {
                self.fixtures.insert(pos, value);
            }
            None => {
                self.fixtures.remove(&pos);
            }
        }
    }

    fn schedule_light_recalc(&mut self, pos: BlockPos) {
        self.light_updates.push(pos);
    }

    fn notify_neighbors(&mut self, pos: BlockPos, source: BlockState, except: Option<Direction>) {
        self.neighbor_notices.push(NeighborNotice {
            pos,
            source,
            except,
        });
    }

    fn schedule_client_notify(&mut self, pos: BlockPos) {
        self.client_updates.push(pos);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
