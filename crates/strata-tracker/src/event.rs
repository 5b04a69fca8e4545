//! Batched world events and the bus they are published on.
//!
//! One [`WorldEvent`] is published per capture-kind batch, per populate
//! flush, per entity batch and per player intent that needs one. Listeners
//! receive the event mutably: they may invalidate individual transactions,
//! attach custom replacements, or remove entities from a spawn list. The
//! [`EventResult`] they return decides whether the batch as a whole goes
//! through.
//!
//! [`ListenerBus`] is the provided [`EventBus`]: boxed `FnMut` listeners,
//! optionally filtered by [`EventKind`]. An event is cancelled if any
//! listener cancels it; every matching listener still sees it.
//!
//! # Example
//!
//! ```
//! use strata_tracker::event::{EventBus, EventKind, EventResult, ListenerBus, WorldEvent};
//!
//! let mut bus = ListenerBus::new();
//! bus.on(EventKind::ChangeBlock, Box::new(|event| match event {
//!     WorldEvent::ChangeBlock(change) if change.transactions.len() > 64 => EventResult::Cancelled,
//!     _ => EventResult::Accepted,
//! }));
//! assert_eq!(bus.listener_count(), 1);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use strata_world::capture::{CaptureKind, ProcedureId};
use strata_world::cause::{Actor, Cause};
use strata_world::entity::{EntityRef, EntitySnapshot};
use strata_world::pos::{RegionPos, WorldId};
use strata_world::transaction::BlockTransaction;

// ---------------------------------------------------------------------------
// EventResult
// ---------------------------------------------------------------------------

/// Outcome of publishing an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    Accepted,
    Cancelled,
}

impl EventResult {
    pub fn is_cancelled(self) -> bool {
        self == EventResult::Cancelled
    }

    /// Cancelled if either side is.
    pub fn and(self, other: EventResult) -> EventResult {
        if self.is_cancelled() || other.is_cancelled() {
            EventResult::Cancelled
        } else {
            EventResult::Accepted
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// One capture-kind batch of block changes.
#[derive(Debug, Clone)]
pub struct ChangeBlockEvent {
    pub kind: CaptureKind,
    pub world_id: WorldId,
    pub cause: Cause,
    pub transactions: Vec<BlockTransaction>,
}

/// All block changes made by world-generation procedures in one region.
#[derive(Debug, Clone)]
pub struct PopulateChunkEvent {
    pub world_id: WorldId,
    pub region: RegionPos,
    pub cause: Cause,
    pub transactions: BTreeMap<ProcedureId, Vec<BlockTransaction>>,
}

/// Why a batch of entities is spawning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnKind {
    /// A direct spawn outside any ticking scope.
    Custom,
    /// Natural world spawning.
    Spawner,
    /// Entities arriving with a generated or loaded region.
    ChunkLoad,
    /// Side effects of a tick.
    Generic,
}

#[derive(Debug, Clone)]
pub struct SpawnEntityEvent {
    pub kind: SpawnKind,
    pub world_id: WorldId,
    pub cause: Cause,
    /// Entities that will enter the world. Listeners may remove entries.
    pub entities: Vec<EntityRef>,
    pub snapshots: Vec<EntitySnapshot>,
}

/// Why a batch of items is dropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropKind {
    /// A direct drop outside any ticking scope.
    Custom,
    /// Items released by destroying something (a block, a container).
    Destruct,
    /// Items deliberately thrown out.
    Dispense,
}

#[derive(Debug, Clone)]
pub struct DropItemEvent {
    pub kind: DropKind,
    pub world_id: WorldId,
    pub cause: Cause,
    /// Item entities that will enter the world. Listeners may remove entries.
    pub entities: Vec<EntityRef>,
    pub snapshots: Vec<EntitySnapshot>,
}

/// A non-living entity destroyed by a player attack.
#[derive(Debug, Clone)]
pub struct DestructEntityEvent {
    pub world_id: WorldId,
    pub cause: Cause,
    pub entity: EntityRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryInteraction {
    Creative,
    OpenClose,
    Click,
}

#[derive(Debug, Clone)]
pub struct InteractInventoryEvent {
    pub interaction: InventoryInteraction,
    pub world_id: WorldId,
    pub cause: Cause,
    pub actor: Actor,
}

// ---------------------------------------------------------------------------
// WorldEvent
// ---------------------------------------------------------------------------

/// Discriminant of [`WorldEvent`], used to filter listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ChangeBlock,
    PopulateChunk,
    SpawnEntity,
    DropItem,
    DestructEntity,
    InteractInventory,
}

#[derive(Debug, Clone)]
pub enum WorldEvent {
    ChangeBlock(ChangeBlockEvent),
    PopulateChunk(PopulateChunkEvent),
    SpawnEntity(SpawnEntityEvent),
    DropItem(DropItemEvent),
    DestructEntity(DestructEntityEvent),
    InteractInventory(InteractInventoryEvent),
}

impl WorldEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            WorldEvent::ChangeBlock(_) => EventKind::ChangeBlock,
            WorldEvent::PopulateChunk(_) => EventKind::PopulateChunk,
            WorldEvent::SpawnEntity(_) => EventKind::SpawnEntity,
            WorldEvent::DropItem(_) => EventKind::DropItem,
            WorldEvent::DestructEntity(_) => EventKind::DestructEntity,
            WorldEvent::InteractInventory(_) => EventKind::InteractInventory,
        }
    }

    pub fn cause(&self) -> &Cause {
        match self {
            WorldEvent::ChangeBlock(e) => &e.cause,
            WorldEvent::PopulateChunk(e) => &e.cause,
            WorldEvent::SpawnEntity(e) => &e.cause,
            WorldEvent::DropItem(e) => &e.cause,
            WorldEvent::DestructEntity(e) => &e.cause,
            WorldEvent::InteractInventory(e) => &e.cause,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Where batched events are published.
pub trait EventBus {
    fn publish(&mut self, event: &mut WorldEvent) -> EventResult;
}

/// A listener registered on a [`ListenerBus`].
pub type Listener = Box<dyn FnMut(&mut WorldEvent) -> EventResult>;

/// An [`EventBus`] dispatching to boxed closures in registration order.
#[derive(Default)]
pub struct ListenerBus {
    listeners: Vec<(Option<EventKind>, Listener)>,
    published: u64,
}

impl ListenerBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen to events of one kind.
    pub fn on(&mut self, kind: EventKind, listener: Listener) {
        self.listeners.push((Some(kind), listener));
    }

    /// Listen to every event.
    pub fn on_any(&mut self, listener: Listener) {
        self.listeners.push((None, listener));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Number of events published so far.
    pub fn published_count(&self) -> u64 {
        self.published
    }
}

impl EventBus for ListenerBus {
    fn publish(&mut self, event: &mut WorldEvent) -> EventResult {
        self.published += 1;
        let kind = event.kind();
        let mut result = EventResult::Accepted;
        for (filter, listener) in &mut self.listeners {
            if filter.map_or(true, |f| f == kind) {
                result = result.and(listener(&mut *event));
            }
        }
        result
    }
}

impl fmt::Debug for ListenerBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerBus")
            .field("listeners", &self.listeners.len())
            .field("published", &self.published)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
