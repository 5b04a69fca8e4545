//! The tracked world and its capture scopes.
//!
//! A [`TrackedWorld`] owns one world's storage, event bus, capture ledger,
//! provenance tables and action journal. Hosts drive it through scopes:
//!
//! - [`tick_block`](TrackedWorld::tick_block),
//!   [`tick_fixture`](TrackedWorld::tick_fixture) and
//!   [`tick_entity`](TrackedWorld::tick_entity) run one update with that
//!   source in the ticking slot, then flush with the source as cause;
//! - [`process_intent`](TrackedWorld::process_intent) runs a player request
//!   and flushes with the player as cause;
//! - [`populate_region`](TrackedWorld::populate_region) with nested
//!   [`with_procedure`](TrackedWorld::with_procedure) captures world
//!   generation;
//! - [`with_decay`](TrackedWorld::with_decay) and
//!   [`with_spawner`](TrackedWorld::with_spawner) flip capture switches.
//!
//! Only one ticking source exists at a time. A scope opened while another is
//! running executes inline, so everything a tick triggers is attributed to
//! the outermost source and published in one batch per kind.
//!
//! # Example
//!
//! ```
//! use strata_tracker::prelude::*;
//!
//! let mut world = TrackedWorld::new(MemoryStorage::new(WorldId(0)), ListenerBus::new());
//! let alex = Actor::new(ActorId(1), "alex");
//! let pos = BlockPos::new(4, 64, 4);
//!
//! world.begin_tick();
//! world
//!     .process_intent(IntentContext::for_actor(alex.clone()).intent(Intent::PlaceBlock), |w| {
//!         w.set_state(pos, BlockState::of(BlockType::PLANKS), UpdateFlags::DEFAULT)?;
//!         Ok(())
//!     })
//!     .unwrap();
//! world.end_tick().unwrap();
//!
//! assert_eq!(world.provenance().owner_at(pos), Some(&alex));
//! ```

use std::sync::Arc;

use strata_provenance::journal::ActionJournal;
use strata_provenance::table::ProvenanceStore;
use strata_world::block::{BlockState, Fixture, UpdateFlags};
use strata_world::capture::ProcedureId;
use strata_world::cause::{Cause, NamedCause};
use strata_world::entity::{EntityAllocator, EntityId, EntityIndex, EntityRef, WorldEntity};
use strata_world::pos::{BlockPos, RegionPos, WorldId};
use strata_world::snapshot::{BlockSnapshot, SnapshotBuilder};
use strata_world::storage::BlockStorage;

use crate::config::TrackerConfig;
use crate::event::{EventBus, ListenerBus};
use crate::flush::FlushReport;
use crate::intent::IntentContext;
use crate::ledger::{CaptureLedger, SpawnerKind, TickingSource};
use crate::TrackerError;

/// Called when a non-fixture block placement is finalised during a flush.
///
/// Runs inside a placement scope: entities it spawns are attributed to the
/// placed block.
pub type PlacementHook<S, B> =
    fn(&mut TrackedWorld<S, B>, BlockPos, BlockState) -> Result<(), TrackerError>;

// ---------------------------------------------------------------------------
// TrackedWorld
// ---------------------------------------------------------------------------

/// One world with mutation capture.
pub struct TrackedWorld<S: BlockStorage, B: EventBus = ListenerBus> {
    pub(crate) storage: S,
    pub(crate) bus: B,
    pub(crate) config: TrackerConfig,
    pub(crate) ledger: CaptureLedger,
    pub(crate) builder: SnapshotBuilder,
    pub(crate) provenance: ProvenanceStore,
    pub(crate) journal: ActionJournal,
    pub(crate) entities: EntityIndex,
    pub(crate) allocator: EntityAllocator,
    pub(crate) intent: IntentContext,
    pub(crate) last_destroyed_entity: Option<EntityId>,
    pub(crate) placement_hook: Option<PlacementHook<S, B>>,
    pub(crate) tick: u64,
}

impl<S: BlockStorage, B: EventBus> TrackedWorld<S, B> {
    pub fn new(storage: S, bus: B) -> Self {
        Self::with_config(storage, bus, TrackerConfig::default())
    }

    pub fn with_config(storage: S, bus: B, config: TrackerConfig) -> Self {
        Self {
            storage,
            bus,
            config,
            ledger: CaptureLedger::new(),
            builder: SnapshotBuilder::new(),
            provenance: ProvenanceStore::new(),
            journal: ActionJournal::new(),
            entities: EntityIndex::new(),
            allocator: EntityAllocator::new(),
            intent: IntentContext::default(),
            last_destroyed_entity: None,
            placement_hook: None,
            tick: 0,
        }
    }

    /// Install the hook run when a block placement is finalised.
    pub fn set_placement_hook(&mut self, hook: PlacementHook<S, B>) {
        self.placement_hook = Some(hook);
    }

    // ----- accessors -----

    pub fn world_id(&self) -> WorldId {
        self.storage.world_id()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn ledger(&self) -> &CaptureLedger {
        &self.ledger
    }

    pub fn provenance(&self) -> &ProvenanceStore {
        &self.provenance
    }

    pub fn provenance_mut(&mut self) -> &mut ProvenanceStore {
        &mut self.provenance
    }

    pub fn journal(&self) -> &ActionJournal {
        &self.journal
    }

    pub fn entities(&self) -> &EntityIndex {
        &self.entities
    }

    pub fn entity(&self, id: EntityId) -> Option<&EntityRef> {
        self.entities.get(id)
    }

    /// Reserve a fresh entity id.
    pub fn allocate_entity_id(&mut self) -> EntityId {
        self.allocator.allocate()
    }

    /// Drop the deferred entity lists, handing their ids back to the
    /// allocator. Returns how many were dropped.
    pub(crate) fn discard_deferred(&mut self) -> usize {
        let dropped = self.ledger.drain_deferred();
        for entity in &dropped {
            self.allocator.release(entity.id());
        }
        dropped.len()
    }

    /// Current tick number.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Capture the cell at `pos` holding `state`, with its derived state
    /// and fixture payload.
    pub(crate) fn capture_snapshot(
        &mut self,
        pos: BlockPos,
        state: BlockState,
        flags: UpdateFlags,
    ) -> Result<BlockSnapshot, TrackerError> {
        let extended = self.storage.actual_state(pos, state);
        self.builder
            .reset()
            .world(self.storage.world_id())
            .position(pos)
            .state(state)
            .extended_state(extended);
        if state.has_fixture() {
            if let Some(payload) = self.storage.fixture(pos) {
                self.builder.fixture(payload);
            }
        }
        Ok(self.builder.build(flags)?)
    }

    // ----- tick bracket -----

    /// Start a new tick: advance the counter and clear the journal.
    pub fn begin_tick(&mut self) -> u64 {
        self.tick += 1;
        self.journal.clear();
        self.tick
    }

    /// End the tick. Captures still pending (cascades that outran the flush
    /// passes, populate batches with no region to publish under) are rolled
    /// back unpublished, newest first, and deferred entities are dropped.
    /// Returns how many captures were rolled back.
    pub fn end_tick(&mut self) -> Result<usize, TrackerError> {
        let leftovers = self.ledger.take_all();
        let mut scratch = FlushReport::default();
        self.roll_back(&leftovers, false, &mut scratch)?;
        let dropped_entities = self.discard_deferred();
        if !leftovers.is_empty() || dropped_entities > 0 {
            tracing::warn!(
                world = %self.storage.world_id(),
                tick = self.tick,
                captures = leftovers.len(),
                entities = dropped_entities,
                "rolling back captures left over at end of tick"
            );
        }
        Ok(leftovers.len())
    }

    // ----- ticking scopes -----

    /// Run `f` as the update of the block at `pos`.
    pub fn tick_block(
        &mut self,
        pos: BlockPos,
        f: impl FnOnce(&mut Self) -> Result<(), TrackerError>,
    ) -> Result<FlushReport, TrackerError> {
        if self.runs_inline() {
            f(self)?;
            return Ok(FlushReport::skipped());
        }
        let state = self.storage.read(pos);
        let snapshot = self.capture_snapshot(pos, state, UpdateFlags::NONE)?;
        self.run_ticking(TickingSource::Block(Arc::new(snapshot)), f)
    }

    /// Run `f` as the update of `fixture`.
    pub fn tick_fixture(
        &mut self,
        fixture: Arc<Fixture>,
        f: impl FnOnce(&mut Self) -> Result<(), TrackerError>,
    ) -> Result<FlushReport, TrackerError> {
        if self.runs_inline() {
            f(self)?;
            return Ok(FlushReport::skipped());
        }
        self.run_ticking(TickingSource::Fixture(fixture), f)
    }

    /// Run `f` as the update of `entity`.
    pub fn tick_entity(
        &mut self,
        entity: EntityRef,
        f: impl FnOnce(&mut Self) -> Result<(), TrackerError>,
    ) -> Result<FlushReport, TrackerError> {
        if self.runs_inline() {
            f(self)?;
            return Ok(FlushReport::skipped());
        }
        self.run_ticking(TickingSource::Entity(entity), f)
    }

    fn runs_inline(&self) -> bool {
        self.storage.is_remote() || self.ledger.is_ticking() || self.ledger.is_capturing_terrain()
    }

    fn run_ticking(
        &mut self,
        source: TickingSource,
        f: impl FnOnce(&mut Self) -> Result<(), TrackerError>,
    ) -> Result<FlushReport, TrackerError> {
        let cause = Cause::source(source.to_cause_value());
        self.ledger.begin_ticking(source);
        let ran = f(self);
        let flushed = self.flush(cause);
        self.ledger.end_ticking();
        ran?;
        flushed
    }

    // ----- other scopes -----

    /// Run `f` on behalf of the player request described by `context`, then
    /// flush with the player as cause.
    pub fn process_intent(
        &mut self,
        context: IntentContext,
        f: impl FnOnce(&mut Self) -> Result<(), TrackerError>,
    ) -> Result<FlushReport, TrackerError> {
        if self.storage.is_remote() {
            f(self)?;
            return Ok(FlushReport::skipped());
        }
        let previous = std::mem::replace(&mut self.intent, context);
        let was_capturing = self.ledger.set_capturing(true);
        let ran = f(self);
        let cause = match self.intent.actor() {
            Some(actor) => Cause::source(actor.clone()),
            None => Cause::empty(),
        };
        let flushed = self.flush(cause);
        self.ledger.set_capturing(was_capturing);
        self.intent = previous;
        ran?;
        flushed
    }

    /// Run world generation for `region`. Changes made inside
    /// [`with_procedure`](Self::with_procedure) are published as one
    /// populate event; entities spawned are published as chunk-load spawns.
    pub fn populate_region(
        &mut self,
        region: RegionPos,
        f: impl FnOnce(&mut Self) -> Result<(), TrackerError>,
    ) -> Result<FlushReport, TrackerError> {
        if self.storage.is_remote() {
            f(self)?;
            return Ok(FlushReport::skipped());
        }
        let was_terrain = self.ledger.set_capturing_terrain(true);
        let was_capturing = self.ledger.set_capturing(true);
        let previous_spawner = self.ledger.set_spawner(Some(SpawnerKind::Chunk));
        let ran = f(self);
        let cause = Cause::source(region).with(NamedCause::new("world", self.storage.world_id()));
        let flushed = self.flush(cause);
        self.ledger.set_spawner(previous_spawner);
        self.ledger.set_capturing(was_capturing);
        self.ledger.set_capturing_terrain(was_terrain);
        ran?;
        flushed
    }

    /// Attribute changes made by `f` to the generation procedure `id`.
    pub fn with_procedure(
        &mut self,
        id: ProcedureId,
        f: impl FnOnce(&mut Self) -> Result<(), TrackerError>,
    ) -> Result<(), TrackerError> {
        let previous = self.ledger.set_procedure(Some(id));
        let ran = f(self);
        self.ledger.set_procedure(previous);
        ran
    }

    /// Classify removals made by `f` as decay.
    pub fn with_decay(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<(), TrackerError>,
    ) -> Result<(), TrackerError> {
        let previous = self.ledger.set_capturing_decay(true);
        let ran = f(self);
        self.ledger.set_capturing_decay(previous);
        ran
    }

    /// Run a bulk spawning cycle. Entities spawned by `f` are deferred and
    /// published in one batch with the world as cause.
    pub fn with_spawner(
        &mut self,
        kind: SpawnerKind,
        f: impl FnOnce(&mut Self) -> Result<(), TrackerError>,
    ) -> Result<FlushReport, TrackerError> {
        if self.storage.is_remote() {
            f(self)?;
            return Ok(FlushReport::skipped());
        }
        let previous = self.ledger.set_spawner(Some(kind));
        let was_capturing = self.ledger.set_capturing(true);
        let ran = f(self);
        let flushed = self.flush(Cause::source(self.storage.world_id()));
        self.ledger.set_capturing(was_capturing);
        self.ledger.set_spawner(previous);
        ran?;
        flushed
    }
}

impl<S: BlockStorage + std::fmt::Debug, B: EventBus + std::fmt::Debug> std::fmt::Debug
    for TrackedWorld<S, B>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedWorld")
            .field("storage", &self.storage)
            .field("bus", &self.bus)
            .field("tick", &self.tick)
            .field("pending", &self.ledger.pending_count())
            .field("entities", &self.entities.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use strata_world::block::BlockType;
    use strata_world::capture::CaptureKind;
    use strata_world::entity::{BasicEntity, EntityCategory};
    use strata_world::storage::MemoryStorage;

    fn world() -> TrackedWorld<MemoryStorage> {
        TrackedWorld::new(MemoryStorage::new(WorldId(3)), ListenerBus::new())
    }

    // -- 1. Tick bracket ------------------------------------------------------

    #[test]
    fn begin_tick_advances_and_clears_journal() {
        let mut w = world();
        let pos = BlockPos::new(0, 64, 0);
        w.tick_block(pos, |w| {
            w.set_state(pos, BlockState::of(BlockType::DIRT), UpdateFlags::DEFAULT)?;
            Ok(())
        })
        .unwrap();
        assert_eq!(w.journal().block_actions().len(), 1);

        assert_eq!(w.begin_tick(), 1);
        assert!(w.journal().is_empty());
    }

    #[test]
    fn end_tick_rolls_back_leftovers() {
        let mut w = world();
        let pos = BlockPos::ORIGIN;
        w.ledger.set_capturing(true);
        w.set_state(pos, BlockState::of(BlockType::SAND), UpdateFlags::DEFAULT)
            .unwrap();
        w.set_state(pos, BlockState::of(BlockType::STONE), UpdateFlags::DEFAULT)
            .unwrap();
        assert_eq!(w.ledger().pending_count(), 2);

        assert_eq!(w.end_tick().unwrap(), 2);
        assert!(w.ledger().is_empty());
        assert!(w.storage().read(pos).is_empty());
        assert!(!w.ledger().is_restoring());
        assert_eq!(w.end_tick().unwrap(), 0);
    }

    // -- 2. Scope nesting -----------------------------------------------------

    #[test]
    fn nested_tick_runs_inline() {
        let mut w = world();
        let outer = BlockPos::new(0, 64, 0);
        let inner = BlockPos::new(1, 64, 0);
        let report = w
            .tick_block(outer, |w| {
                let nested = w.tick_block(inner, |w| {
                    w.set_state(inner, BlockState::of(BlockType::DIRT), UpdateFlags::DEFAULT)?;
                    Ok(())
                })?;
                assert!(nested.skipped);
                assert!(matches!(w.ledger().ticking(), Some(TickingSource::Block(s)) if s.pos == outer));
                Ok(())
            })
            .unwrap();
        assert_eq!(report.batches, vec![CaptureKind::Place]);
        assert!(!w.ledger().is_ticking());
    }

    #[test]
    fn slot_cleared_when_closure_fails() {
        let mut w = world();
        let pos = BlockPos::new(2, 64, 0);
        w.storage_mut().reject_writes_at(pos);
        let entity = BasicEntity::new(w.allocate_entity_id(), EntityCategory::Living, pos).into_ref();
        let err = w
            .tick_entity(entity, |w| {
                w.set_state(pos, BlockState::of(BlockType::DIRT), UpdateFlags::DEFAULT)?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, TrackerError::MutationFailed { .. }));
        assert!(!w.ledger().is_ticking());
    }

    #[test]
    fn scoped_switches_restore_previous_values() {
        let mut w = world();
        w.with_decay(|w| {
            assert!(w.ledger().is_capturing_decay());
            w.with_procedure(ProcedureId::new("ores"), |w| {
                assert_eq!(w.ledger().procedure(), Some(&ProcedureId::new("ores")));
                Ok(())
            })
        })
        .unwrap();
        assert!(!w.ledger().is_capturing_decay());
        assert!(w.ledger().procedure().is_none());
    }

    #[test]
    fn remote_world_runs_scopes_inline() {
        let mut w = TrackedWorld::new(MemoryStorage::remote(WorldId(1)), ListenerBus::new());
        let pos = BlockPos::new(0, 1, 0);
        let report = w
            .tick_block(pos, |w| {
                w.set_state(pos, BlockState::of(BlockType::STONE), UpdateFlags::DEFAULT)?;
                Ok(())
            })
            .unwrap();
        assert!(report.skipped);
        assert_eq!(w.storage().read(pos), BlockState::of(BlockType::STONE));
        assert_eq!(w.bus().published_count(), 0);
    }
}
