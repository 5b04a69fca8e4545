//! End-of-scope flush: batched events, rollback and commit.
//!
//! The flush drains the [`CaptureLedger`](crate::ledger::CaptureLedger) in
//! a fixed order:
//!
//! 1. Block buckets, Break -> Decay -> Fluid -> Modify -> Place. Each bucket
//!    becomes one `ChangeBlock` event whose transactions carry the captured
//!    original and a final snapshot re-read from storage. A cancelled event
//!    restores its originals together with every later bucket, newest
//!    capture first, and stops the flush; otherwise invalidated
//!    transactions are restored and the rest are committed.
//! 2. Populate buckets, as one `PopulateChunk` event, when the cause names a
//!    region.
//! 3. Intent rules for the player request being processed.
//! 4. Deferred item drops and entity spawns, one event each.
//!
//! Changes made while committing (placement hooks) are captured again and
//! picked up by a further pass over the block buckets.

use std::collections::BTreeMap;
use std::sync::Arc;

use strata_provenance::journal::{BlockAction, SpawnOrigin};
use strata_provenance::table::TrackingRole;
use strata_world::block::{BlockState, Fixture, UpdateFlags};
use strata_world::capture::{CaptureKind, ProcedureId};
use strata_world::cause::{Actor, Cause, NamedCause};
use strata_world::entity::{EntityId, EntityRef, WorldEntity};
use strata_world::pos::{BlockPos, RegionPos};
use strata_world::snapshot::{BlockRestore, BlockSnapshot};
use strata_world::storage::BlockStorage;
use strata_world::transaction::{BlockTransaction, Transaction};

use crate::event::{
    ChangeBlockEvent, DestructEntityEvent, DropItemEvent, DropKind, EventBus, EventResult,
    InteractInventoryEvent, InventoryInteraction, PopulateChunkEvent, SpawnEntityEvent, SpawnKind,
    WorldEvent,
};
use crate::intent::Intent;
use crate::ledger::{PendingCapture, SpawnerKind};
use crate::world::TrackedWorld;
use crate::TrackerError;

/// Passes over the block buckets before remaining captures are left for
/// the next flush, or for `end_tick` to roll back.
const MAX_CASCADE_PASSES: usize = 8;

// ---------------------------------------------------------------------------
// FlushReport
// ---------------------------------------------------------------------------

/// What a flush did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushReport {
    /// Nothing was processed (remote view, restore running, empty cause or
    /// nothing captured).
    pub skipped: bool,
    /// Block batches published, in order.
    pub batches: Vec<CaptureKind>,
    /// The batch whose cancellation stopped the flush. Later block batches
    /// were rolled back unpublished.
    pub cancelled: Option<CaptureKind>,
    /// Positions restored because of a cancellation or invalidation.
    pub restored: Vec<BlockPos>,
    /// Transactions committed, populate included.
    pub committed: usize,
    /// Populate transactions committed.
    pub populated: usize,
    pub items_dropped: usize,
    pub entities_spawned: usize,
    /// Deferred entities that never entered the world.
    pub entities_discarded: usize,
    pub destructed_entities: usize,
    pub inventory_events: Vec<InventoryInteraction>,
    /// The acting player's held item must be resent (a placement was
    /// reverted).
    pub held_item_resync: bool,
}

impl FlushReport {
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled.is_some()
    }
}

// ---------------------------------------------------------------------------
// Flush
// ---------------------------------------------------------------------------

impl<S: BlockStorage, B: EventBus> TrackedWorld<S, B> {
    /// Publish and settle everything captured since the last flush, on
    /// behalf of `cause`.
    pub fn flush(&mut self, cause: Cause) -> Result<FlushReport, TrackerError> {
        if self.storage.is_remote() || self.ledger.is_restoring() || cause.is_empty() {
            return Ok(FlushReport::skipped());
        }
        if self.ledger.is_empty() && self.intent.actor.is_none() {
            return Ok(FlushReport::skipped());
        }

        let world = self.storage.world_id();
        let mut report = FlushReport::default();
        let mut cause = self.backfill_cause(cause);
        let actor = self.intent.actor().cloned();
        let mut destruct = false;
        let mut invalid_positions: Vec<BlockPos> = Vec::new();

        let mut passes = 0;
        while self.ledger.has_block_captures() {
            if passes == MAX_CASCADE_PASSES {
                tracing::warn!(
                    world = %world,
                    pending = self.ledger.pending_count(),
                    "block changes still cascading after flush passes; leaving them pending"
                );
                break;
            }
            passes += 1;

            for kind in CaptureKind::BLOCK_ORDER {
                let captures = self.ledger.take(&kind);
                if captures.is_empty() {
                    continue;
                }
                let transactions = self.build_transactions(&captures)?;
                if kind == CaptureKind::Break
                    && actor.is_some()
                    && self.intent.is(&Intent::StartDestroy)
                {
                    destruct = true;
                    if let Some(first) = transactions.first() {
                        cause.prepend(NamedCause::source(first.original().clone()));
                    }
                }

                let mut event = WorldEvent::ChangeBlock(ChangeBlockEvent {
                    kind: kind.clone(),
                    world_id: world,
                    cause: cause.clone(),
                    transactions,
                });
                let result = self.bus.publish(&mut event);
                report.batches.push(kind.clone());

                if result.is_cancelled() {
                    let count = captures.len();
                    let later = self.ledger.take_block_captures();
                    let later_count = later.len();
                    let mut rollback: Vec<(CaptureKind, PendingCapture)> =
                        captures.into_iter().map(|c| (kind.clone(), c)).collect();
                    rollback.extend(later);
                    rollback.sort_by(|a, b| b.1.seq.cmp(&a.1.seq));
                    self.roll_back(&rollback, actor.is_some(), &mut report)?;
                    self.discard_deferred();
                    tracing::debug!(
                        world = %world,
                        kind = ?kind,
                        count,
                        later = later_count,
                        "block batch cancelled; later batches rolled back"
                    );
                    report.cancelled = Some(kind);
                    return Ok(report);
                }

                let transactions = match event {
                    WorldEvent::ChangeBlock(event) => event.transactions,
                    other => {
                        tracing::warn!(world = %world, replaced_by = ?other.kind(), "listener replaced a block batch; committing captures as-is");
                        self.build_transactions(&captures)?
                    }
                };

                let mut invalid = Vec::new();
                for tx in transactions.iter().rev().filter(|tx| !tx.is_valid()) {
                    self.restore_block(tx.original(), true, false)?;
                    invalid.push(tx.original().pos);
                }
                if !invalid.is_empty() {
                    if actor.is_some() {
                        self.resync_actor(&kind, &invalid, &mut report);
                    }
                    tracing::debug!(world = %world, kind = ?kind, count = invalid.len(), "transactions invalidated by listener");
                }

                for tx in transactions.iter().filter(|tx| tx.is_valid()) {
                    let pos = tx.original().pos;
                    match kind {
                        CaptureKind::Break if cause.first::<Actor>().is_some() => {
                            self.detach_decorations(pos);
                        }
                        CaptureKind::Place if tx.original().state.is_empty() => {
                            let owner = actor.clone().or_else(|| cause.first::<Actor>().cloned());
                            if let Some(owner) = owner {
                                self.provenance.track(pos, &owner, TrackingRole::Owner);
                            }
                        }
                        _ => {}
                    }
                }

                report.restored.extend(invalid.iter().copied());
                invalid_positions.extend(invalid);

                if self.ledger.has_deferred_items() {
                    let items = self.ledger.take_deferred_items();
                    let destruct_drop = kind == CaptureKind::Break || destruct;
                    self.handle_dropped_items(&cause, items, &invalid_positions, destruct_drop, &mut report);
                }

                self.commit_transactions(&kind, &transactions, &cause, &mut report)?;
            }
        }

        if self.ledger.has_populate() {
            match cause.first::<RegionPos>().copied() {
                Some(region) => self.flush_populate(region, &cause, &mut report)?,
                None => tracing::debug!(world = %world, "populate captures held until a region flush"),
            }
        }

        if let Some(actor) = actor {
            match self.intent.intent.clone() {
                Some(Intent::DropItem) => destruct = false,
                Some(Intent::Chat(message)) if self.config.is_destruct_command(&message) => {
                    cause.push(NamedCause::new(NamedCause::PLAYER, actor.clone()));
                    destruct = true;
                }
                Some(Intent::AttackEntity(target)) => {
                    self.destruct_attacked(target, &cause, &mut report);
                }
                _ => {}
            }
            self.fire_inventory_event(&actor, &cause, &mut report);
        }

        if self.ledger.has_deferred_items() {
            let items = self.ledger.take_deferred_items();
            let drop_cause = match self.intent.drop_cause.take() {
                Some(override_cause) if !override_cause.is_empty() => {
                    destruct = true;
                    override_cause
                }
                _ => cause.clone(),
            };
            self.handle_dropped_items(&drop_cause, items, &invalid_positions, destruct, &mut report);
        }
        let entities = self.ledger.take_deferred_entities();
        if !entities.is_empty() {
            self.handle_entity_spawns(&cause, entities, &invalid_positions, &mut report);
        }

        tracing::debug!(
            world = %world,
            batches = report.batches.len(),
            committed = report.committed,
            restored = report.restored.len(),
            "flush complete"
        );
        Ok(report)
    }

    // ----- cause -----

    /// Add the provenance of the cause's root block, fixture or entity when
    /// the cause names no actor.
    fn backfill_cause(&self, mut cause: Cause) -> Cause {
        if cause.first::<Actor>().is_some() {
            return cause;
        }
        let pos = cause
            .first::<Arc<BlockSnapshot>>()
            .map(|snapshot| snapshot.pos)
            .or_else(|| cause.first::<Arc<Fixture>>().map(|fixture| fixture.pos));
        if let Some(pos) = pos {
            if let Some(owner) = self.provenance.owner_at(pos) {
                cause.push(NamedCause::owner(owner.clone()));
            }
            if let Some(notifier) = self.provenance.notifier_at(pos) {
                let notifier = NamedCause::notifier(notifier.clone());
                if !cause.contains(&notifier.value) {
                    cause.prepend(notifier);
                }
            }
        } else if let Some(entity) = cause.first::<EntityRef>().cloned() {
            let owner = entity
                .as_tameable()
                .and_then(|tameable| tameable.owner())
                .or_else(|| {
                    self.provenance
                        .tracked_creator(entity.id())
                        .cloned()
                        .map(Into::into)
                });
            if let Some(owner) = owner {
                cause.push(NamedCause::owner(owner));
            }
        }
        cause
    }

    // ----- block batches -----

    fn build_transactions(
        &mut self,
        captures: &[PendingCapture],
    ) -> Result<Vec<BlockTransaction>, TrackerError> {
        let mut transactions = Vec::with_capacity(captures.len());
        for capture in captures {
            let pos = capture.original.pos;
            let current = self.storage.read(pos);
            let final_snapshot = self.capture_snapshot(pos, current, UpdateFlags::NONE)?;
            transactions.push(Transaction::new(
                capture.original.clone(),
                Arc::new(final_snapshot),
            ));
        }
        Ok(transactions)
    }

    /// Resend what the acting player got wrong: broken blocks reappear,
    /// reverted placements give back the held item.
    /// Force-restore every capture in `captures`, which must be newest
    /// first, so a position written twice ends at its oldest original.
    pub(crate) fn roll_back(
        &mut self,
        captures: &[(CaptureKind, PendingCapture)],
        resync: bool,
        report: &mut FlushReport,
    ) -> Result<(), TrackerError> {
        let mut by_kind: BTreeMap<CaptureKind, Vec<BlockPos>> = BTreeMap::new();
        for (kind, capture) in captures {
            self.restore_block(&capture.original, true, false)?;
            report.restored.push(capture.original.pos);
            by_kind.entry(kind.clone()).or_default().push(capture.original.pos);
        }
        if resync {
            for (kind, positions) in &by_kind {
                self.resync_actor(kind, positions, report);
            }
        }
        Ok(())
    }

    fn resync_actor(&mut self, kind: &CaptureKind, positions: &[BlockPos], report: &mut FlushReport) {
        match kind {
            CaptureKind::Break => {
                for pos in positions {
                    self.storage.schedule_client_notify(*pos);
                }
            }
            CaptureKind::Place => report.held_item_resync = true,
            _ => {}
        }
    }

    fn commit_transactions(
        &mut self,
        kind: &CaptureKind,
        transactions: &[BlockTransaction],
        cause: &Cause,
        report: &mut FlushReport,
    ) -> Result<(), TrackerError> {
        for tx in transactions.iter().filter(|tx| tx.is_valid()) {
            let original = tx.original().clone();
            if let Some(custom) = tx.custom() {
                self.restore_block(custom, true, false)?;
            }
            let final_snapshot = tx.effective_final().clone();
            self.record_block_action(kind, &original, final_snapshot.state, cause);
            report.committed += 1;
            if !final_snapshot.state.is_empty() && !final_snapshot.state.has_fixture() {
                self.run_placement(final_snapshot.clone(), cause, report)?;
            }
            self.mark_and_notify(
                original.pos,
                original.state,
                final_snapshot.state,
                original.update_flags,
            );
        }
        Ok(())
    }

    fn record_block_action(
        &mut self,
        kind: &CaptureKind,
        original: &BlockSnapshot,
        new: BlockState,
        cause: &Cause,
    ) {
        let actor = cause.first::<Actor>().cloned();
        if self.config.log_block_actions {
            tracing::info!(
                world = %original.world_id,
                pos = %original.pos,
                kind = kind.name(),
                from = %original.state,
                to = %new,
                actor = ?actor.as_ref().map(|a| a.name.as_str()),
                "block changed"
            );
        }
        self.journal.record_block(BlockAction {
            world_id: original.world_id,
            pos: original.pos,
            kind: kind.clone(),
            old: original.state,
            new,
            actor,
            tick: self.tick,
        });
    }

    /// Run the placement hook for a committed block and publish what it
    /// spawned with the block as cause.
    fn run_placement(
        &mut self,
        snapshot: Arc<BlockSnapshot>,
        cause: &Cause,
        report: &mut FlushReport,
    ) -> Result<(), TrackerError> {
        let Some(hook) = self.placement_hook else {
            return Ok(());
        };
        let pos = snapshot.pos;
        let state = snapshot.state;
        let previous = self.ledger.begin_placement(snapshot.clone());
        let ran = hook(self, pos, state);
        let items = self.ledger.take_placement_items();
        let entities = self.ledger.take_placement_entities();
        self.ledger.end_placement(previous);
        ran?;

        if items.is_empty() && entities.is_empty() {
            return Ok(());
        }
        let mut placement_cause = Cause::source(snapshot);
        if self.ledger.is_capturing_terrain() {
            placement_cause = placement_cause.merge(cause);
        }
        let destruct = self.storage.read(pos) != state;
        self.handle_dropped_items(&placement_cause, items, &[], destruct, report);
        self.handle_entity_spawns(&placement_cause, entities, &[], report);
        Ok(())
    }

    /// Pop off decorations hanging on a broken block; their drops join the
    /// deferred items.
    fn detach_decorations(&mut self, pos: BlockPos) {
        for decoration in self.entities.attached_at(pos) {
            let drop_id = self.allocator.allocate();
            match decoration.detach(drop_id) {
                Some(drop) => self.ledger.defer(drop),
                None => {
                    self.allocator.release(drop_id);
                }
            }
            self.entities.remove(decoration.id());
            self.provenance.forget_entity(decoration.id());
            tracing::debug!(pos = %pos, entity = %decoration.id(), "decoration detached");
        }
    }

    // ----- populate -----

    fn flush_populate(
        &mut self,
        region: RegionPos,
        cause: &Cause,
        report: &mut FlushReport,
    ) -> Result<(), TrackerError> {
        let world = self.storage.world_id();
        let mut transactions: BTreeMap<ProcedureId, Vec<BlockTransaction>> = BTreeMap::new();
        for (procedure, captures) in self.ledger.take_populate() {
            let list = captures
                .into_iter()
                .map(|capture| {
                    let proposed = Arc::new(capture.original.with_state(capture.proposed));
                    Transaction::new(capture.original, proposed)
                })
                .collect();
            transactions.insert(procedure, list);
        }

        let mut event = WorldEvent::PopulateChunk(PopulateChunkEvent {
            world_id: world,
            region,
            cause: cause.clone(),
            transactions,
        });
        if self.bus.publish(&mut event).is_cancelled() {
            tracing::debug!(world = %world, region = ?region, "populate batches apply per transaction; ignoring cancellation");
        }
        let transactions = match event {
            WorldEvent::PopulateChunk(event) => event.transactions,
            other => {
                tracing::warn!(world = %world, replaced_by = ?other.kind(), "listener replaced a populate batch");
                return Ok(());
            }
        };

        for (procedure, list) in transactions {
            for tx in list.iter().rev().filter(|tx| !tx.is_valid()) {
                self.restore_block(tx.original(), true, false)?;
                report.restored.push(tx.original().pos);
            }
            report.populated += list.iter().filter(|tx| tx.is_valid()).count();
            self.commit_transactions(&CaptureKind::Populate(procedure), &list, cause, report)?;
        }
        Ok(())
    }

    // ----- intent rules -----

    fn destruct_attacked(&mut self, target: EntityId, cause: &Cause, report: &mut FlushReport) {
        let Some(entity) = self.entities.get(target).cloned() else {
            return;
        };
        if !entity.is_dead() || entity.is_living() || self.last_destroyed_entity == Some(target) {
            return;
        }
        self.last_destroyed_entity = Some(target);
        let mut event = WorldEvent::DestructEntity(DestructEntityEvent {
            world_id: self.storage.world_id(),
            cause: cause.clone(),
            entity,
        });
        let result = self.bus.publish(&mut event);
        tracing::debug!(entity = %target, cancelled = result.is_cancelled(), "entity destructed by attack");
        report.destructed_entities += 1;
    }

    fn fire_inventory_event(&mut self, actor: &Actor, cause: &Cause, report: &mut FlushReport) {
        let Some(state) = self.intent.actor.as_ref() else {
            return;
        };
        if state.health <= 0.0 || !state.container_open {
            return;
        }
        let interaction = match self.intent.intent {
            Some(Intent::CreativeInventory) if !self.intent.ignore_creative => {
                InventoryInteraction::Creative
            }
            Some(Intent::OpenContainer | Intent::CloseContainer) => InventoryInteraction::OpenClose,
            Some(Intent::ClickWindow) => InventoryInteraction::Click,
            _ => return,
        };
        let mut event = WorldEvent::InteractInventory(InteractInventoryEvent {
            interaction,
            world_id: self.storage.world_id(),
            cause: cause.clone(),
            actor: actor.clone(),
        });
        self.bus.publish(&mut event);
        report.inventory_events.push(interaction);
    }

    // ----- entity batches -----

    /// The actor behind a batch of deferred entities; recorded as each
    /// entity's creator.
    fn attribute_batch(&mut self, cause: &mut Cause, entities: &[EntityRef]) -> Option<Actor> {
        let actor = match cause.first::<Actor>() {
            Some(actor) => Some(actor.clone()),
            None => {
                let creator = cause
                    .first::<EntityRef>()
                    .and_then(|source| self.provenance.tracked_creator(source.id()))
                    .cloned();
                if let Some(creator) = &creator {
                    cause.push(NamedCause::owner(creator.clone()));
                }
                creator
            }
        };
        if let Some(actor) = &actor {
            for entity in entities {
                self.provenance.track_creator(entity.id(), actor);
            }
        }
        actor
    }

    fn handle_dropped_items(
        &mut self,
        cause: &Cause,
        items: Vec<EntityRef>,
        invalid: &[BlockPos],
        destruct: bool,
        report: &mut FlushReport,
    ) {
        if items.is_empty() {
            return;
        }
        let mut cause = cause.clone();
        let actor = self.attribute_batch(&mut cause, &items);
        let count = items.len();
        let snapshots = items.iter().map(|item| item.snapshot()).collect();
        let mut event = WorldEvent::DropItem(DropItemEvent {
            kind: if destruct {
                DropKind::Destruct
            } else {
                DropKind::Dispense
            },
            world_id: self.storage.world_id(),
            cause,
            entities: items,
            snapshots,
        });
        let result = self.bus.publish(&mut event);
        let items = match event {
            WorldEvent::DropItem(event) => event.entities,
            _ => Vec::new(),
        };
        self.admit_batch(items, count, actor, invalid, SpawnOrigin::Dropped, result, report);
    }

    fn handle_entity_spawns(
        &mut self,
        cause: &Cause,
        entities: Vec<EntityRef>,
        invalid: &[BlockPos],
        report: &mut FlushReport,
    ) {
        if entities.is_empty() {
            return;
        }
        let mut cause = cause.clone();
        let actor = self.attribute_batch(&mut cause, &entities);
        let count = entities.len();
        let snapshots = entities.iter().map(|entity| entity.snapshot()).collect();
        let kind = match self.ledger.spawner() {
            Some(SpawnerKind::World) => SpawnKind::Spawner,
            Some(SpawnerKind::Chunk) => SpawnKind::ChunkLoad,
            None => SpawnKind::Generic,
        };
        let mut event = WorldEvent::SpawnEntity(SpawnEntityEvent {
            kind,
            world_id: self.storage.world_id(),
            cause,
            entities,
            snapshots,
        });
        let result = self.bus.publish(&mut event);
        let entities = match event {
            WorldEvent::SpawnEntity(event) => event.entities,
            _ => Vec::new(),
        };
        self.admit_batch(entities, count, actor, invalid, SpawnOrigin::Batched, result, report);
    }

    #[allow(clippy::too_many_arguments)]
    fn admit_batch(
        &mut self,
        entities: Vec<EntityRef>,
        published: usize,
        actor: Option<Actor>,
        invalid: &[BlockPos],
        origin: SpawnOrigin,
        result: EventResult,
        report: &mut FlushReport,
    ) {
        if result.is_cancelled() {
            for entity in &entities {
                self.allocator.release(entity.id());
            }
            report.entities_discarded += published;
            tracing::debug!(count = published, origin = ?origin, "entity batch cancelled");
            return;
        }
        report.entities_discarded += published.saturating_sub(entities.len());
        for entity in entities {
            if invalid.contains(&entity.block_position()) {
                self.allocator.release(entity.id());
                report.entities_discarded += 1;
                continue;
            }
            match origin {
                SpawnOrigin::Dropped => report.items_dropped += 1,
                _ => report.entities_spawned += 1,
            }
            self.admit_entity(entity, actor.clone(), origin);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
