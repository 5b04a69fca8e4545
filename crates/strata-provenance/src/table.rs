//! Positional and per-entity provenance tables.
//!
//! Provenance answers "which user is behind this?" for things that do not
//! carry a user themselves. Positions remember an *owner* (who placed the
//! block) and a *notifier* (who last triggered physics there). Entities
//! remember a *creator* (who spawned them) and a *notifier*.
//!
//! Missing provenance is normal and never an error: lookups return `None`.
//!
//! # Example
//!
//! ```
//! use strata_provenance::table::{ProvenanceStore, TrackingRole};
//! use strata_world::prelude::*;
//!
//! let mut store = ProvenanceStore::new();
//! let alex = Actor::new(ActorId(1), "alex");
//! let pos = BlockPos::new(0, 64, 0);
//!
//! store.track(pos, &alex, TrackingRole::Owner);
//! assert_eq!(store.owner_at(pos), Some(&alex));
//! assert_eq!(store.notifier_at(pos), None);
//!
//! // The notifier is preferred when propagating, the owner is the fallback.
//! let next = pos.up();
//! store.propagate(pos, next, TrackingRole::Notifier);
//! assert_eq!(store.notifier_at(next), Some(&alex));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use strata_world::cause::Actor;
use strata_world::entity::EntityId;
use strata_world::pos::BlockPos;

// ---------------------------------------------------------------------------
// TrackingRole
// ---------------------------------------------------------------------------

/// The relationship a tracked actor has with a position or entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackingRole {
    /// Placed the block, or created the entity.
    Owner,
    /// Last caused physics or an update to reach it.
    Notifier,
}

// ---------------------------------------------------------------------------
// PositionTable
// ---------------------------------------------------------------------------

/// Owner and notifier per block position.
#[derive(Debug, Clone, Default)]
pub struct PositionTable {
    owners: HashMap<BlockPos, Actor>,
    notifiers: HashMap<BlockPos, Actor>,
}

impl PositionTable {
    pub fn track(&mut self, pos: BlockPos, actor: &Actor, role: TrackingRole) {
        let table = match role {
            TrackingRole::Owner => &mut self.owners,
            TrackingRole::Notifier => &mut self.notifiers,
        };
        table.insert(pos, actor.clone());
    }

    pub fn get(&self, pos: BlockPos, role: TrackingRole) -> Option<&Actor> {
        match role {
            TrackingRole::Owner => self.owners.get(&pos),
            TrackingRole::Notifier => self.notifiers.get(&pos),
        }
    }

    /// Drop both entries for `pos`.
    pub fn forget(&mut self, pos: BlockPos) {
        self.owners.remove(&pos);
        self.notifiers.remove(&pos);
    }

    /// Number of positions with at least one entry.
    pub fn len(&self) -> usize {
        self.owners.len()
            + self
                .notifiers
                .keys()
                .filter(|pos| !self.owners.contains_key(pos))
                .count()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty() && self.notifiers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// EntityProvenance
// ---------------------------------------------------------------------------

/// Creator and notifier per entity.
#[derive(Debug, Clone, Default)]
pub struct EntityProvenance {
    creators: HashMap<EntityId, Actor>,
    notifiers: HashMap<EntityId, Actor>,
}

impl EntityProvenance {
    pub fn track(&mut self, entity: EntityId, actor: &Actor, role: TrackingRole) {
        let table = match role {
            TrackingRole::Owner => &mut self.creators,
            TrackingRole::Notifier => &mut self.notifiers,
        };
        table.insert(entity, actor.clone());
    }

    pub fn get(&self, entity: EntityId, role: TrackingRole) -> Option<&Actor> {
        match role {
            TrackingRole::Owner => self.creators.get(&entity),
            TrackingRole::Notifier => self.notifiers.get(&entity),
        }
    }

    pub fn forget(&mut self, entity: EntityId) {
        self.creators.remove(&entity);
        self.notifiers.remove(&entity);
    }
}

// ---------------------------------------------------------------------------
// ProvenanceStore
// ---------------------------------------------------------------------------

/// All provenance for one world.
#[derive(Debug, Clone, Default)]
pub struct ProvenanceStore {
    positions: PositionTable,
    entities: EntityProvenance,
}

impl ProvenanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ----- positions -----

    pub fn owner_at(&self, pos: BlockPos) -> Option<&Actor> {
        self.positions.get(pos, TrackingRole::Owner)
    }

    pub fn notifier_at(&self, pos: BlockPos) -> Option<&Actor> {
        self.positions.get(pos, TrackingRole::Notifier)
    }

    pub fn track(&mut self, pos: BlockPos, actor: &Actor, role: TrackingRole) {
        self.positions.track(pos, actor, role);
    }

    /// Copy `from`'s notifier (or, lacking one, its owner) onto `to` under
    /// `role`. Returns the propagated actor.
    pub fn propagate(&mut self, from: BlockPos, to: BlockPos, role: TrackingRole) -> Option<Actor> {
        let actor = self
            .notifier_at(from)
            .or_else(|| self.owner_at(from))
            .cloned()?;
        self.positions.track(to, &actor, role);
        Some(actor)
    }

    /// Drop owner and notifier at `pos`.
    pub fn forget_position(&mut self, pos: BlockPos) {
        self.positions.forget(pos);
    }

    pub fn positions(&self) -> &PositionTable {
        &self.positions
    }

    // ----- entities -----

    pub fn track_creator(&mut self, entity: EntityId, actor: &Actor) {
        self.entities.track(entity, actor, TrackingRole::Owner);
    }

    pub fn tracked_creator(&self, entity: EntityId) -> Option<&Actor> {
        self.entities.get(entity, TrackingRole::Owner)
    }

    pub fn track_notifier(&mut self, entity: EntityId, actor: &Actor) {
        self.entities.track(entity, actor, TrackingRole::Notifier);
    }

    pub fn tracked_notifier(&self, entity: EntityId) -> Option<&Actor> {
        self.entities.get(entity, TrackingRole::Notifier)
    }

    /// The actor most directly behind `entity`: its notifier, else creator.
    pub fn entity_source(&self, entity: EntityId) -> Option<&Actor> {
        self.tracked_notifier(entity)
            .or_else(|| self.tracked_creator(entity))
    }

    pub fn forget_entity(&mut self, entity: EntityId) {
        self.entities.forget(entity);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
