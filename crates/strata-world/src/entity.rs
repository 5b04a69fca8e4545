//! Entity identifiers, the live entity index, and entity capabilities.
//!
//! An [`EntityId`] is a 64-bit handle that packs a *generation* counter in the
//! high 32 bits and an *index* in the low 32 bits. The generation is bumped
//! every time an index is recycled, which allows immediate stale-ID detection.
//!
//! Concrete entity hierarchies live outside this crate. The engine sees
//! entities through the object-safe [`WorldEntity`] trait and asks for
//! optional capabilities ([`HasThrower`], [`HasIgniter`], [`HasOwner`])
//! instead of downcasting to concrete types.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cause::{Actor, CauseValue};
use crate::pos::BlockPos;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A generational entity identifier.
///
/// Layout: `[generation: u32 | index: u32]`
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Issues [`EntityId`]s for entities created during a tick.
///
/// An entity that never enters the world (a drop from a cancelled break, a
/// spawn refused by a listener) hands its id back with [`release`]. The
/// index is reissued under the next generation, oldest release first, so
/// an id kept by a stale reference never aliases the new entity.
///
/// [`release`]: EntityAllocator::release
#[derive(Debug, Default)]
pub struct EntityAllocator {
    slots: Vec<IdSlot>,
    released: VecDeque<u32>,
}

#[derive(Debug, Clone, Copy, Default)]
struct IdSlot {
    generation: u32,
    issued: bool,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> EntityId {
        match self.released.pop_front() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.issued = true;
                EntityId::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(IdSlot {
                    generation: 0,
                    issued: true,
                });
                EntityId::new(index, 0)
            }
        }
    }

    /// Take `id` back. Returns `false` for an id that is stale or was never
    /// issued here.
    pub fn release(&mut self, id: EntityId) -> bool {
        let Some(slot) = self.slots.get_mut(id.index() as usize) else {
            return false;
        };
        if !slot.issued || slot.generation != id.generation() {
            return false;
        }
        slot.issued = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.released.push_back(id.index());
        true
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Coarse entity classification used for routing spawns into events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityCategory {
    Player,
    /// A dropped item stack.
    Item,
    Living,
    Projectile,
    /// Primed explosive.
    Explosive,
    /// Hangs on a block face (frames, paintings).
    Decoration,
    Other,
}

/// Projectiles that remember who launched them.
pub trait HasThrower {
    fn thrower(&self) -> Option<CauseValue>;
}

/// Primed explosives that remember who lit them.
pub trait HasIgniter {
    fn igniter(&self) -> Option<CauseValue>;
}

/// Tamed creatures that remember their owner.
pub trait HasOwner {
    fn owner(&self) -> Option<CauseValue>;
}

// ---------------------------------------------------------------------------
// WorldEntity
// ---------------------------------------------------------------------------

/// Shared handle to an entity.
pub type EntityRef = Arc<dyn WorldEntity>;

/// An entity as the capture engine sees it.
pub trait WorldEntity: fmt::Debug + Send + Sync {
    fn id(&self) -> EntityId;

    fn category(&self) -> EntityCategory;

    fn block_position(&self) -> BlockPos;

    fn is_dead(&self) -> bool;

    /// Mark the entity dead. It is removed from the index by its owner.
    fn kill(&self);

    /// The controlling player, for player entities.
    fn as_actor(&self) -> Option<&Actor> {
        None
    }

    /// The block position this entity hangs on, for decorations.
    fn attached_to(&self) -> Option<BlockPos> {
        None
    }

    /// Detach from the supporting block: the entity dies and may hand back
    /// an item entity (with id `drop_id`) to be spawned in its place.
    fn detach(&self, drop_id: EntityId) -> Option<EntityRef> {
        let _ = drop_id;
        self.kill();
        None
    }

    fn as_throwable(&self) -> Option<&dyn HasThrower> {
        None
    }

    fn as_explosive(&self) -> Option<&dyn HasIgniter> {
        None
    }

    fn as_tameable(&self) -> Option<&dyn HasOwner> {
        None
    }

    fn is_item(&self) -> bool {
        self.category() == EntityCategory::Item
    }

    fn is_player(&self) -> bool {
        self.category() == EntityCategory::Player
    }

    fn is_living(&self) -> bool {
        matches!(
            self.category(),
            EntityCategory::Living | EntityCategory::Player
        )
    }

    fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            id: self.id(),
            category: self.category(),
            pos: self.block_position(),
        }
    }
}

/// Serializable capture of an entity handed to spawn and drop listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub category: EntityCategory,
    pub pos: BlockPos,
}

// ---------------------------------------------------------------------------
// EntityIndex
// ---------------------------------------------------------------------------

/// The live set of entities in a world, ordered by id.
#[derive(Debug, Default)]
pub struct EntityIndex {
    entities: BTreeMap<EntityId, EntityRef>,
}

impl EntityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `entity`. Returns the entity previously stored under its id.
    pub fn insert(&mut self, entity: EntityRef) -> Option<EntityRef> {
        self.entities.insert(entity.id(), entity)
    }

    pub fn remove(&mut self, id: EntityId) -> Option<EntityRef> {
        self.entities.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&EntityRef> {
        self.entities.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityRef> {
        self.entities.values()
    }

    /// Live entities hanging on the block at `pos`.
    pub fn attached_at(&self, pos: BlockPos) -> Vec<EntityRef> {
        self.entities
            .values()
            .filter(|e| !e.is_dead() && e.attached_to() == Some(pos))
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// BasicEntity
// ---------------------------------------------------------------------------

/// A plain [`WorldEntity`] whose capabilities follow its category:
/// projectiles report a thrower, explosives an igniter, living creatures an
/// owner, decorations an attachment.
#[derive(Debug)]
pub struct BasicEntity {
    id: EntityId,
    category: EntityCategory,
    pos: BlockPos,
    dead: AtomicBool,
    actor: Option<Actor>,
    origin: Option<CauseValue>,
    attached: Option<BlockPos>,
}

impl BasicEntity {
    pub fn new(id: EntityId, category: EntityCategory, pos: BlockPos) -> Self {
        Self {
            id,
            category,
            pos,
            dead: AtomicBool::new(false),
            actor: None,
            origin: None,
            attached: None,
        }
    }

    pub fn item(id: EntityId, pos: BlockPos) -> Self {
        Self::new(id, EntityCategory::Item, pos)
    }

    pub fn player(id: EntityId, actor: Actor, pos: BlockPos) -> Self {
        Self {
            actor: Some(actor),
            ..Self::new(id, EntityCategory::Player, pos)
        }
    }

    /// Thrower, igniter or owner, depending on the category.
    pub fn with_origin(mut self, origin: CauseValue) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn attached(mut self, support: BlockPos) -> Self {
        self.attached = Some(support);
        self
    }

    pub fn into_ref(self) -> EntityRef {
        Arc::new(self)
    }
}

impl WorldEntity for BasicEntity {
    fn id(&self) -> EntityId {
        self.id
    }

    fn category(&self) -> EntityCategory {
        self.category
    }

    fn block_position(&self) -> BlockPos {
        self.pos
    }

    fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Relaxed)
    }

    fn kill(&self) {
        self.dead.store(true, Ordering::Relaxed);
    }

    fn as_actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    fn attached_to(&self) -> Option<BlockPos> {
        self.attached
    }

    fn detach(&self, drop_id: EntityId) -> Option<EntityRef> {
        self.kill();
        self.attached
            .map(|_| BasicEntity::item(drop_id, self.pos).into_ref())
    }

    fn as_throwable(&self) -> Option<&dyn HasThrower> {
        (self.category == EntityCategory::Projectile).then_some(self as &dyn HasThrower)
    }

    fn as_explosive(&self) -> Option<&dyn HasIgniter> {
        (self.category == EntityCategory::Explosive).then_some(self as &dyn HasIgniter)
    }

    fn as_tameable(&self) -> Option<&dyn HasOwner> {
        (self.category == EntityCategory::Living).then_some(self as &dyn HasOwner)
    }
}

impl HasThrower for BasicEntity {
    fn thrower(&self) -> Option<CauseValue> {
        self.origin.clone()
    }
}

impl HasIgniter for BasicEntity {
    fn igniter(&self) -> Option<CauseValue> {
        self.origin.clone()
    }
}

impl HasOwner for BasicEntity {
    fn owner(&self) -> Option<CauseValue> {
        self.origin.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cause::ActorId;

    #[test]
    fn released_ids_come_back_oldest_first_with_new_generation() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        let c = alloc.allocate();
        assert_ne!(a.index(), b.index());

        assert!(alloc.release(b));
        assert!(alloc.release(a));
        assert_eq!(alloc.allocate(), EntityId::new(b.index(), 1));
        assert_eq!(alloc.allocate(), EntityId::new(a.index(), 1));
        assert_eq!(alloc.allocate().index(), 3);
        assert!(alloc.release(c));
    }

    #[test]
    fn release_rejects_stale_and_foreign_ids() {
        let mut alloc = EntityAllocator::new();
        let first = alloc.allocate();
        assert!(alloc.release(first));
        assert!(!alloc.release(first));

        let reissued = alloc.allocate();
        assert!(!alloc.release(first));
        assert!(!alloc.release(EntityId::new(40, 0)));
        assert!(alloc.release(reissued));
    }

    #[test]
    fn capabilities_follow_category() {
        let owner = CauseValue::Actor(Actor::new(ActorId(7), "alex"));
        let arrow = BasicEntity::new(EntityId::new(0, 0), EntityCategory::Projectile, BlockPos::ORIGIN)
            .with_origin(owner.clone());
        assert_eq!(arrow.as_throwable().and_then(|t| t.thrower()), Some(owner));
        assert!(arrow.as_explosive().is_none());
        assert!(arrow.as_tameable().is_none());

        let hook = BasicEntity::new(EntityId::new(1, 0), EntityCategory::Projectile, BlockPos::ORIGIN);
        assert!(hook.as_throwable().is_some());
        assert_eq!(hook.as_throwable().and_then(|t| t.thrower()), None);
    }

    #[test]
    fn detached_decoration_dies_and_drops() {
        let support = BlockPos::new(0, 64, 0);
        let frame = BasicEntity::new(EntityId::new(0, 0), EntityCategory::Decoration, support.up())
            .attached(support)
            .into_ref();
        let mut index = EntityIndex::new();
        index.insert(frame.clone());
        assert_eq!(index.attached_at(support).len(), 1);

        let drop = frame.detach(EntityId::new(1, 0)).expect("frame drops an item");
        assert!(frame.is_dead());
        assert!(drop.is_item());
        assert!(index.attached_at(support).is_empty());
    }

    #[test]
    fn players_are_living_actors() {
        let alex = Actor::new(ActorId(1), "alex");
        let player = BasicEntity::player(EntityId::new(0, 0), alex.clone(), BlockPos::ORIGIN);
        assert!(player.is_player());
        assert!(player.is_living());
        assert_eq!(player.as_actor(), Some(&alex));
        assert_eq!(player.snapshot().category, EntityCategory::Player);
    }
}
