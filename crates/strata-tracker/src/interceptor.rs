//! Block mutation and entity spawn entry points.
//!
//! [`TrackedWorld::set_state`] is the only path through which block states
//! change. On an authoritative view outside a restore it snapshots the cell,
//! classifies the change and records it before delegating the write; the
//! follow-up client and neighbor notifications are then deferred to the
//! flush. Remote views and restores write and notify inline.
//!
//! [`TrackedWorld::spawn_entity`] is the spawn entry point. Inside a capture
//! scope entities are deferred to the flush; outside one, the spawn fires
//! its own event immediately.

use std::sync::Arc;

use strata_provenance::journal::{SpawnAction, SpawnOrigin};
use strata_provenance::table::TrackingRole;
use strata_world::block::{BlockState, UpdateFlags};
use strata_world::cause::{Actor, Cause, CauseValue, NamedCause};
use strata_world::entity::{EntityRef, WorldEntity};
use strata_world::pos::{BlockPos, Direction};
use strata_world::snapshot::{BlockRestore, BlockSnapshot};
use strata_world::storage::{BlockStorage, WriteOutcome};

use crate::event::{DropItemEvent, DropKind, EventBus, SpawnEntityEvent, SpawnKind, WorldEvent};
use crate::guard::RestoreGuard;
use crate::ledger::TickingSource;
use crate::world::TrackedWorld;
use crate::TrackerError;

impl<S: BlockStorage, B: EventBus> TrackedWorld<S, B> {
    // ----- block mutation -----

    /// Change the block at `pos` to `state`.
    ///
    /// Returns `Ok(false)` when nothing was written: the cell already holds
    /// `state`, or the storage reported the write as stale.
    pub fn set_state(
        &mut self,
        pos: BlockPos,
        state: BlockState,
        flags: UpdateFlags,
    ) -> Result<bool, TrackerError> {
        let old = self.storage.read(pos);
        if old == state {
            return Ok(false);
        }
        let world = self.storage.world_id();

        let captured = if !self.storage.is_remote() && !self.ledger.is_restoring() {
            let original = Arc::new(self.capture_snapshot(pos, old, flags)?);
            let kind = self.ledger.classify(&old, &state);
            tracing::trace!(world = %world, pos = %pos, kind = ?kind, from = %old, to = %state, "captured block change");
            self.ledger.record(kind.clone(), original.clone(), state);
            Some((kind, original))
        } else {
            None
        };

        let previous = match self.storage.write(pos, state, old) {
            Ok(WriteOutcome::Written(previous)) => previous,
            Ok(WriteOutcome::Stale) => {
                if let Some((kind, original)) = &captured {
                    self.ledger.discard(kind, original);
                }
                tracing::debug!(world = %world, pos = %pos, "stale block write dropped");
                return Ok(false);
            }
            Err(source) => {
                if let Some((kind, original)) = &captured {
                    self.ledger.discard(kind, original);
                }
                tracing::error!(world = %world, pos = %pos, state = %state, error = %source, "block write failed");
                return Err(TrackerError::MutationFailed {
                    world,
                    pos,
                    state,
                    source,
                });
            }
        };

        if previous.block.opacity != state.block.opacity
            || previous.block.light_emission != state.block.light_emission
        {
            self.storage.schedule_light_recalc(pos);
        }
        if captured.is_none() {
            self.mark_and_notify(pos, previous, state, flags);
        }
        Ok(true)
    }

    /// Send the client update and run neighbor physics for a change at
    /// `pos`, as selected by `flags`.
    pub fn mark_and_notify(
        &mut self,
        pos: BlockPos,
        old: BlockState,
        new: BlockState,
        flags: UpdateFlags,
    ) {
        let remote = self.storage.is_remote();
        if flags.contains(UpdateFlags::NOTIFY_CLIENTS)
            && (!remote || !flags.contains(UpdateFlags::NO_OBSERVERS))
        {
            self.storage.schedule_client_notify(pos);
        }
        if !remote && flags.contains(UpdateFlags::NOTIFY_NEIGHBORS) {
            tracing::trace!(pos = %pos, from = %old, to = %new, "notifying neighbors");
            self.notify_neighbors(pos, new, None);
        }
    }

    /// Run neighbor physics around `pos`, first copying the notifier of
    /// whatever is running onto each neighbor position.
    pub fn notify_neighbors(&mut self, pos: BlockPos, source: BlockState, except: Option<Direction>) {
        if !self.storage.is_remote() && self.config.track_notifiers {
            for neighbor in pos.neighbors(except) {
                self.track_notifier_at(neighbor);
            }
        }
        self.storage.notify_neighbors(pos, source, except);
    }

    fn track_notifier_at(&mut self, target: BlockPos) {
        if let Some(actor) = self.intent.actor().cloned() {
            self.provenance.track(target, &actor, TrackingRole::Notifier);
            return;
        }
        let source_pos = match self.ledger.ticking() {
            Some(TickingSource::Block(snapshot)) => Some(snapshot.pos),
            _ => self
                .ledger
                .placement()
                .map(|snapshot| snapshot.pos)
                .or_else(|| match self.ledger.ticking() {
                    Some(TickingSource::Fixture(fixture)) => Some(fixture.pos),
                    _ => None,
                }),
        };
        if let Some(from) = source_pos {
            self.provenance.propagate(from, target, TrackingRole::Notifier);
        } else if let Some(TickingSource::Entity(entity)) = self.ledger.ticking() {
            if let Some(actor) = self.provenance.entity_source(entity.id()).cloned() {
                self.provenance.track(target, &actor, TrackingRole::Notifier);
            }
        }
    }

    // ----- entity spawns -----

    /// Bring `entity` into the world on behalf of `cause`.
    ///
    /// Returns `Ok(true)` when the entity entered the world or was deferred
    /// to the flush, `Ok(false)` when it was refused or cancelled.
    pub fn spawn_entity(&mut self, entity: EntityRef, cause: Cause) -> Result<bool, TrackerError> {
        if cause.is_empty() {
            return Err(TrackerError::EmptyCause {
                entity: entity.id(),
            });
        }
        let remote = self.storage.is_remote();
        if !remote && entity.is_item() && self.ledger.is_restoring() {
            tracing::debug!(entity = %entity.id(), "item spawn refused during restore");
            return Ok(false);
        }
        if remote || entity.is_player() {
            self.entities.insert(entity);
            return Ok(true);
        }

        let mut cause = cause;
        self.add_origin_cause(&entity, &mut cause);

        if self.ledger.is_capture_scope() && self.config.capture_entity_spawns {
            self.inherit_spawn_provenance(&entity);
            tracing::trace!(entity = %entity.id(), category = ?entity.category(), "deferred entity spawn");
            self.ledger.defer(entity);
            return Ok(true);
        }

        let id = entity.id();
        let snapshots = vec![entity.snapshot()];
        let world_id = self.storage.world_id();
        let mut event = if entity.is_item() {
            WorldEvent::DropItem(DropItemEvent {
                kind: DropKind::Custom,
                world_id,
                cause: cause.clone(),
                entities: vec![entity.clone()],
                snapshots,
            })
        } else {
            WorldEvent::SpawnEntity(SpawnEntityEvent {
                kind: SpawnKind::Custom,
                world_id,
                cause: cause.clone(),
                entities: vec![entity.clone()],
                snapshots,
            })
        };
        let result = self.bus.publish(&mut event);
        let still_listed = match &event {
            WorldEvent::DropItem(e) => e.entities.iter().any(|x| x.id() == id),
            WorldEvent::SpawnEntity(e) => e.entities.iter().any(|x| x.id() == id),
            _ => false,
        };
        if result.is_cancelled() || !still_listed {
            tracing::debug!(entity = %id, cancelled = result.is_cancelled(), "entity spawn refused by listener");
            return Ok(false);
        }
        let actor = cause.first::<Actor>().cloned();
        self.admit_entity(entity, actor, SpawnOrigin::Custom);
        Ok(true)
    }

    /// Add the thrower, igniter or tamed owner of `entity` to `cause`.
    fn add_origin_cause(&mut self, entity: &EntityRef, cause: &mut Cause) {
        let origin = if let Some(throwable) = entity.as_throwable() {
            throwable.thrower().map(|v| (NamedCause::THROWER, v))
        } else if let Some(explosive) = entity.as_explosive() {
            explosive.igniter().map(|v| (NamedCause::IGNITER, v))
        } else if let Some(tameable) = entity.as_tameable() {
            tameable.owner().map(|v| (NamedCause::OWNER, v))
        } else {
            None
        };
        let Some((role, value)) = origin else {
            return;
        };
        if let CauseValue::Actor(actor) = &value {
            self.provenance.track_creator(entity.id(), actor);
        }
        cause.push(NamedCause::new(role, value));
    }

    /// Give a deferred entity the provenance of whatever spawned it.
    fn inherit_spawn_provenance(&mut self, entity: &EntityRef) {
        let block_pos = self
            .ledger
            .placement()
            .map(|snapshot| snapshot.pos)
            .or_else(|| self.ledger.ticking().and_then(TickingSource::block_position));
        if let Some(pos) = block_pos {
            let actor = self
                .provenance
                .notifier_at(pos)
                .or_else(|| self.provenance.owner_at(pos))
                .cloned();
            if let Some(actor) = actor {
                self.provenance.track_notifier(entity.id(), &actor);
            }
        } else if let Some(TickingSource::Entity(spawner)) = self.ledger.ticking() {
            if self.provenance.tracked_creator(entity.id()).is_some() {
                return;
            }
            if let Some(creator) = self.provenance.tracked_creator(spawner.id()).cloned() {
                self.provenance.track_creator(entity.id(), &creator);
            }
        }
    }

    /// Insert `entity` into the live index and record it.
    pub(crate) fn admit_entity(
        &mut self,
        entity: EntityRef,
        actor: Option<Actor>,
        origin: SpawnOrigin,
    ) {
        let world_id = self.storage.world_id();
        if self.config.log_entity_spawns {
            tracing::info!(
                world = %world_id,
                entity = %entity.id(),
                category = ?entity.category(),
                origin = ?origin,
                actor = ?actor.as_ref().map(|a| a.name.as_str()),
                "entity spawned"
            );
        }
        self.journal.record_spawn(SpawnAction {
            world_id,
            entity: entity.snapshot(),
            origin,
            actor,
            tick: self.tick,
        });
        self.entities.insert(entity);
    }
}

// ---------------------------------------------------------------------------
// Restore
// ---------------------------------------------------------------------------

impl<S: BlockStorage, B: EventBus> BlockRestore for TrackedWorld<S, B> {
    type Error = TrackerError;

    fn restore_block(
        &mut self,
        snapshot: &BlockSnapshot,
        force: bool,
        notify: bool,
    ) -> Result<bool, TrackerError> {
        let mut world = RestoreGuard::acquire(self)?;
        let current = world.storage.read(snapshot.pos);
        if !force && current.block != snapshot.state.block {
            return Ok(false);
        }
        let flags = if notify {
            UpdateFlags::DEFAULT
        } else {
            UpdateFlags::NOTIFY_CLIENTS
        };
        world.set_state(snapshot.pos, snapshot.state, flags)?;
        if let Some(payload) = &snapshot.fixture {
            world.storage.set_fixture(snapshot.pos, Some(payload.clone()));
        }
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
