//! Per-world, per-tick capture state.
//!
//! The [`CaptureLedger`] holds everything the interceptor records between
//! two flushes:
//!
//! - pending block captures, one ordered list per [`CaptureKind`];
//! - the single *ticking source* (block, fixture or entity) whose update is
//!   running, so nested mutations fold into one batch;
//! - the *placement scope*: the block whose placement is being finalised
//!   during a flush, with its own deferred entity lists;
//! - entities and item drops deferred until the flush;
//! - scope switches (active procedure, terrain generation, decay, spawner,
//!   restore in progress).
//!
//! The ledger is plain bookkeeping. It performs no I/O and fires no events;
//! [`TrackedWorld`](crate::world::TrackedWorld) drives it.

use std::collections::BTreeMap;
use std::sync::Arc;

use strata_world::block::{BlockState, Fixture};
use strata_world::capture::{CaptureKind, ProcedureId};
use strata_world::cause::CauseValue;
use strata_world::entity::{EntityRef, WorldEntity};
use strata_world::pos::BlockPos;
use strata_world::snapshot::BlockSnapshot;

// ---------------------------------------------------------------------------
// PendingCapture
// ---------------------------------------------------------------------------

/// A block change recorded at mutation time.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCapture {
    /// The cell as it was before the write.
    pub original: Arc<BlockSnapshot>,
    /// The state the write asked for.
    pub proposed: BlockState,
    /// Capture order across every bucket of the ledger.
    pub seq: u64,
}

// ---------------------------------------------------------------------------
// TickingSource
// ---------------------------------------------------------------------------

/// The thing whose update is currently running.
#[derive(Debug, Clone)]
pub enum TickingSource {
    Block(Arc<BlockSnapshot>),
    Fixture(Arc<Fixture>),
    Entity(EntityRef),
}

impl TickingSource {
    pub fn to_cause_value(&self) -> CauseValue {
        match self {
            TickingSource::Block(snapshot) => CauseValue::Block(snapshot.clone()),
            TickingSource::Fixture(fixture) => CauseValue::Fixture(fixture.clone()),
            TickingSource::Entity(entity) => CauseValue::Entity(entity.clone()),
        }
    }

    /// Block position of a ticking block or fixture. `None` for entities.
    pub fn block_position(&self) -> Option<BlockPos> {
        match self {
            TickingSource::Block(snapshot) => Some(snapshot.pos),
            TickingSource::Fixture(fixture) => Some(fixture.pos),
            TickingSource::Entity(_) => None,
        }
    }
}

/// What is spawning entities in bulk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnerKind {
    /// Natural world spawning (mob cycles).
    World,
    /// Entities loaded or generated with a region.
    Chunk,
}

// ---------------------------------------------------------------------------
// DeferredEntities
// ---------------------------------------------------------------------------

/// Entities waiting for the flush, split into item drops and the rest.
#[derive(Debug, Default)]
pub struct DeferredEntities {
    pub items: Vec<EntityRef>,
    pub entities: Vec<EntityRef>,
}

impl DeferredEntities {
    pub fn push(&mut self, entity: EntityRef) {
        if entity.is_item() {
            self.items.push(entity);
        } else {
            self.entities.push(entity);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.entities.is_empty()
    }
}

// ---------------------------------------------------------------------------
// CaptureLedger
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct CaptureLedger {
    pending: BTreeMap<CaptureKind, Vec<PendingCapture>>,
    ticking: Option<TickingSource>,
    placement: Option<Arc<BlockSnapshot>>,
    procedure: Option<ProcedureId>,
    capturing_terrain: bool,
    capturing_decay: bool,
    spawner: Option<SpawnerKind>,
    capturing: bool,
    restoring: bool,
    next_seq: u64,
    deferred: DeferredEntities,
    placement_deferred: DeferredEntities,
}

impl CaptureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // ----- block captures -----

    /// Append a capture of `original` to the `kind` bucket.
    pub fn record(&mut self, kind: CaptureKind, original: Arc<BlockSnapshot>, proposed: BlockState) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.entry(kind).or_default().push(PendingCapture {
            original,
            proposed,
            seq,
        });
    }

    /// Remove the capture holding exactly `original` from the `kind` bucket.
    pub fn discard(&mut self, kind: &CaptureKind, original: &Arc<BlockSnapshot>) -> bool {
        let Some(bucket) = self.pending.get_mut(kind) else {
            return false;
        };
        let Some(index) = bucket
            .iter()
            .rposition(|c| Arc::ptr_eq(&c.original, original))
        else {
            return false;
        };
        bucket.remove(index);
        if bucket.is_empty() {
            self.pending.remove(kind);
        }
        true
    }

    pub fn pending(&self, kind: &CaptureKind) -> &[PendingCapture] {
        self.pending.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Drain the `kind` bucket.
    pub fn take(&mut self, kind: &CaptureKind) -> Vec<PendingCapture> {
        self.pending.remove(kind).unwrap_or_default()
    }

    /// Drain every populate bucket, keyed by procedure.
    pub fn take_populate(&mut self) -> BTreeMap<ProcedureId, Vec<PendingCapture>> {
        let kinds: Vec<CaptureKind> = self
            .pending
            .keys()
            .filter(|k| k.is_populate())
            .cloned()
            .collect();
        let mut out = BTreeMap::new();
        for kind in kinds {
            if let (CaptureKind::Populate(id), Some(captures)) = (&kind, self.pending.remove(&kind)) {
                out.insert(id.clone(), captures);
            }
        }
        out
    }

    pub fn has_populate(&self) -> bool {
        self.pending.keys().any(CaptureKind::is_populate)
    }

    /// Any capture outside the populate buckets.
    pub fn has_block_captures(&self) -> bool {
        self.pending.keys().any(|kind| !kind.is_populate())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Drain every bucket except populate, newest capture first.
    pub fn take_block_captures(&mut self) -> Vec<(CaptureKind, PendingCapture)> {
        self.take_newest_first(|kind| !kind.is_populate())
    }

    /// Drain every bucket, newest capture first.
    pub fn take_all(&mut self) -> Vec<(CaptureKind, PendingCapture)> {
        self.take_newest_first(|_| true)
    }

    fn take_newest_first(
        &mut self,
        mut keep: impl FnMut(&CaptureKind) -> bool,
    ) -> Vec<(CaptureKind, PendingCapture)> {
        let kinds: Vec<CaptureKind> = self.pending.keys().filter(|k| keep(k)).cloned().collect();
        let mut out = Vec::new();
        for kind in kinds {
            if let Some(captures) = self.pending.remove(&kind) {
                out.extend(captures.into_iter().map(|c| (kind.clone(), c)));
            }
        }
        out.sort_by(|a, b| b.1.seq.cmp(&a.1.seq));
        out
    }

    /// No block captures and no deferred entities.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.deferred.is_empty() && self.placement_deferred.is_empty()
    }

    // ----- ticking source -----

    /// Claim the ticking slot. Fails (returns `false`) if it is taken.
    pub fn begin_ticking(&mut self, source: TickingSource) -> bool {
        if self.ticking.is_some() {
            return false;
        }
        self.ticking = Some(source);
        true
    }

    pub fn end_ticking(&mut self) -> Option<TickingSource> {
        self.ticking.take()
    }

    pub fn ticking(&self) -> Option<&TickingSource> {
        self.ticking.as_ref()
    }

    pub fn is_ticking(&self) -> bool {
        self.ticking.is_some()
    }

    // ----- placement scope -----

    /// Enter the placement scope of `snapshot`, returning the scope it
    /// replaces so it can be put back.
    pub fn begin_placement(&mut self, snapshot: Arc<BlockSnapshot>) -> Option<Arc<BlockSnapshot>> {
        self.placement.replace(snapshot)
    }

    pub fn end_placement(&mut self, previous: Option<Arc<BlockSnapshot>>) {
        self.placement = previous;
    }

    pub fn placement(&self) -> Option<&Arc<BlockSnapshot>> {
        self.placement.as_ref()
    }

    // ----- deferred entities -----

    /// Queue `entity` for the flush, in the placement lists when a placement
    /// scope is active.
    pub fn defer(&mut self, entity: EntityRef) {
        if self.placement.is_some() {
            self.placement_deferred.push(entity);
        } else {
            self.deferred.push(entity);
        }
    }

    pub fn take_deferred_items(&mut self) -> Vec<EntityRef> {
        std::mem::take(&mut self.deferred.items)
    }

    pub fn take_deferred_entities(&mut self) -> Vec<EntityRef> {
        std::mem::take(&mut self.deferred.entities)
    }

    pub fn take_placement_items(&mut self) -> Vec<EntityRef> {
        std::mem::take(&mut self.placement_deferred.items)
    }

    pub fn take_placement_entities(&mut self) -> Vec<EntityRef> {
        std::mem::take(&mut self.placement_deferred.entities)
    }

    pub fn has_deferred_items(&self) -> bool {
        !self.deferred.items.is_empty()
    }

    pub fn deferred(&self) -> &DeferredEntities {
        &self.deferred
    }

    /// Drain both deferred lists, items first.
    pub fn drain_deferred(&mut self) -> Vec<EntityRef> {
        let mut drained = std::mem::take(&mut self.deferred.items);
        drained.append(&mut self.deferred.entities);
        drained
    }

    // ----- switches -----

    pub fn procedure(&self) -> Option<&ProcedureId> {
        self.procedure.as_ref()
    }

    /// Set the active procedure, returning the previous one.
    pub fn set_procedure(&mut self, procedure: Option<ProcedureId>) -> Option<ProcedureId> {
        std::mem::replace(&mut self.procedure, procedure)
    }

    pub fn is_capturing_terrain(&self) -> bool {
        self.capturing_terrain
    }

    pub fn set_capturing_terrain(&mut self, on: bool) -> bool {
        std::mem::replace(&mut self.capturing_terrain, on)
    }

    pub fn is_capturing_decay(&self) -> bool {
        self.capturing_decay
    }

    pub fn set_capturing_decay(&mut self, on: bool) -> bool {
        std::mem::replace(&mut self.capturing_decay, on)
    }

    pub fn spawner(&self) -> Option<SpawnerKind> {
        self.spawner
    }

    pub fn set_spawner(&mut self, spawner: Option<SpawnerKind>) -> Option<SpawnerKind> {
        std::mem::replace(&mut self.spawner, spawner)
    }

    /// Mark a non-ticking capture scope (player intent, spawner cycle,
    /// region population). Returns the previous value.
    pub fn set_capturing(&mut self, on: bool) -> bool {
        std::mem::replace(&mut self.capturing, on)
    }

    /// Whether spawns should be deferred rather than fired immediately.
    pub fn is_capture_scope(&self) -> bool {
        self.capturing || self.ticking.is_some() || self.placement.is_some()
    }

    pub fn is_restoring(&self) -> bool {
        self.restoring
    }

    pub(crate) fn set_restoring(&mut self, on: bool) {
        self.restoring = on;
    }

    /// Classify a change under the current switches.
    pub fn classify(&self, old: &BlockState, new: &BlockState) -> CaptureKind {
        CaptureKind::classify(self.procedure.as_ref(), self.capturing_decay, old, new)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use strata_world::block::{BlockType, UpdateFlags};
    use strata_world::entity::{BasicEntity, EntityCategory, EntityId};
    use strata_world::pos::WorldId;
    use strata_world::snapshot::SnapshotBuilder;

    fn snapshot(x: i32, state: BlockState) -> Arc<BlockSnapshot> {
        Arc::new(
            SnapshotBuilder::new()
                .world(WorldId(0))
                .position(BlockPos::new(x, 64, 0))
                .state(state)
                .build(UpdateFlags::DEFAULT)
                .unwrap(),
        )
    }

    // -- 1. Buckets -----------------------------------------------------------

    #[test]
    fn record_take_and_discard() {
        let mut ledger = CaptureLedger::new();
        let stone = BlockState::of(BlockType::STONE);
        let a = snapshot(0, stone);
        let b = snapshot(1, stone);
        ledger.record(CaptureKind::Break, a.clone(), BlockState::AIR);
        ledger.record(CaptureKind::Break, b.clone(), BlockState::AIR);
        assert_eq!(ledger.pending_count(), 2);

        assert!(ledger.discard(&CaptureKind::Break, &a));
        assert!(!ledger.discard(&CaptureKind::Break, &a));
        assert!(!ledger.discard(&CaptureKind::Place, &b));

        let drained = ledger.take(&CaptureKind::Break);
        assert_eq!(drained.len(), 1);
        assert!(Arc::ptr_eq(&drained[0].original, &b));
        assert_eq!(drained[0].seq, 1);
        assert!(ledger.is_empty());
        assert!(ledger.take(&CaptureKind::Break).is_empty());
    }

    #[test]
    fn discard_matches_identity_not_value() {
        let mut ledger = CaptureLedger::new();
        let a = snapshot(0, BlockState::AIR);
        let twin = snapshot(0, BlockState::AIR);
        ledger.record(CaptureKind::Place, a.clone(), BlockState::of(BlockType::DIRT));
        assert!(!ledger.discard(&CaptureKind::Place, &twin));
        assert!(ledger.discard(&CaptureKind::Place, &a));
    }

    #[test]
    fn populate_buckets_drain_by_procedure() {
        let mut ledger = CaptureLedger::new();
        let ores = ProcedureId::new("ores");
        let trees = ProcedureId::new("trees");
        ledger.record(CaptureKind::Populate(ores.clone()), snapshot(0, BlockState::AIR), BlockState::AIR);
        ledger.record(CaptureKind::Populate(trees.clone()), snapshot(1, BlockState::AIR), BlockState::AIR);
        ledger.record(CaptureKind::Place, snapshot(2, BlockState::AIR), BlockState::AIR);
        assert!(ledger.has_populate());

        assert!(ledger.has_block_captures());
        let populated = ledger.take_populate();
        assert_eq!(populated.keys().cloned().collect::<Vec<_>>(), vec![ores, trees]);
        assert!(!ledger.has_populate());
        assert_eq!(ledger.pending(&CaptureKind::Place).len(), 1);
    }

    #[test]
    fn drains_newest_capture_first_across_buckets() {
        let mut ledger = CaptureLedger::new();
        let stone = BlockState::of(BlockType::STONE);
        let dirt = BlockState::of(BlockType::DIRT);
        let ores = ProcedureId::new("ores");
        ledger.record(CaptureKind::Place, snapshot(0, BlockState::AIR), dirt);
        ledger.record(CaptureKind::Break, snapshot(0, dirt), BlockState::AIR);
        ledger.record(CaptureKind::Populate(ores.clone()), snapshot(1, BlockState::AIR), stone);
        ledger.record(CaptureKind::Place, snapshot(2, BlockState::AIR), stone);

        let blocks = ledger.take_block_captures();
        let order: Vec<(CaptureKind, u64)> = blocks.iter().map(|(k, c)| (k.clone(), c.seq)).collect();
        assert_eq!(
            order,
            vec![(CaptureKind::Place, 3), (CaptureKind::Break, 1), (CaptureKind::Place, 0)]
        );
        assert!(!ledger.has_block_captures());
        assert!(ledger.has_populate());

        let rest = ledger.take_all();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].0, CaptureKind::Populate(ores));
        assert_eq!(ledger.pending_count(), 0);
    }

    // -- 2. Ticking slot ------------------------------------------------------

    #[test]
    fn only_one_ticking_source() {
        let mut ledger = CaptureLedger::new();
        let fixture = Arc::new(Fixture::new(WorldId(0), BlockPos::ORIGIN, "furnace"));
        let entity = BasicEntity::new(EntityId::new(0, 0), EntityCategory::Living, BlockPos::ORIGIN)
            .into_ref();

        assert!(ledger.begin_ticking(TickingSource::Fixture(fixture)));
        assert!(!ledger.begin_ticking(TickingSource::Entity(entity.clone())));
        assert!(matches!(ledger.ticking(), Some(TickingSource::Fixture(_))));

        assert!(ledger.is_capture_scope());
        ledger.end_ticking();
        assert!(!ledger.is_capture_scope());
        assert!(ledger.begin_ticking(TickingSource::Entity(entity)));
        assert_eq!(ledger.ticking().and_then(TickingSource::block_position), None);
    }

    // -- 3. Deferred entities -------------------------------------------------

    #[test]
    fn defer_routes_by_kind_and_scope() {
        let mut ledger = CaptureLedger::new();
        let item = BasicEntity::item(EntityId::new(0, 0), BlockPos::ORIGIN).into_ref();
        let mob = BasicEntity::new(EntityId::new(1, 0), EntityCategory::Living, BlockPos::ORIGIN)
            .into_ref();
        ledger.defer(item.clone());
        ledger.defer(mob);
        assert!(ledger.has_deferred_items());

        let scope = snapshot(0, BlockState::AIR);
        let previous = ledger.begin_placement(scope);
        ledger.defer(item);
        ledger.end_placement(previous);

        assert_eq!(ledger.take_deferred_items().len(), 1);
        assert_eq!(ledger.take_deferred_entities().len(), 1);
        assert_eq!(ledger.take_placement_items().len(), 1);
        assert!(ledger.take_placement_entities().is_empty());
        assert!(ledger.is_empty());
    }

    // -- 4. Classification switches ------------------------------------------

    #[test]
    fn classify_honours_switches() {
        let mut ledger = CaptureLedger::new();
        let leaves = BlockState::of(BlockType::LEAVES);
        assert_eq!(ledger.classify(&leaves, &BlockState::AIR), CaptureKind::Break);

        ledger.set_capturing_decay(true);
        assert_eq!(ledger.classify(&leaves, &BlockState::AIR), CaptureKind::Decay);

        ledger.set_procedure(Some(ProcedureId::new("lakes")));
        assert!(ledger.classify(&leaves, &BlockState::AIR).is_populate());
    }
}
