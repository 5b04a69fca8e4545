//! Ordered provenance chains attached to every batched event.
//!
//! A [`Cause`] is an ordered list of [`NamedCause`] entries. The first entry
//! is the *root*: the most direct thing responsible for the change. Later
//! entries add context (the owner of the block that ticked, the player who
//! threw the projectile, ...). Adding a value the chain already holds is a
//! no-op, so helpers can enrich a cause without checking first.
//!
//! # Example
//!
//! ```
//! use strata_world::prelude::*;
//!
//! let alex = Actor::new(ActorId(1), "alex");
//! let cause = Cause::source(RegionPos::new(0, 0))
//!     .with(NamedCause::owner(alex.clone()))
//!     .with(NamedCause::notifier(alex.clone()));
//!
//! assert_eq!(cause.len(), 2);
//! assert_eq!(cause.first::<Actor>(), Some(&alex));
//! assert!(cause.has_role(NamedCause::OWNER));
//! assert!(!cause.has_role(NamedCause::NOTIFIER));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::block::Fixture;
use crate::entity::{EntityRef, WorldEntity};
use crate::pos::{RegionPos, WorldId};
use crate::snapshot::BlockSnapshot;

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Stable identifier of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(pub u64);

/// A user that can own, notify and cause changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
}

impl Actor {
    pub fn new(id: ActorId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id.0)
    }
}

// ---------------------------------------------------------------------------
// CauseValue
// ---------------------------------------------------------------------------

/// Anything that can appear in a cause chain.
#[derive(Debug, Clone)]
pub enum CauseValue {
    Actor(Actor),
    Entity(EntityRef),
    Block(Arc<BlockSnapshot>),
    Fixture(Arc<Fixture>),
    Region(RegionPos),
    World(WorldId),
    /// An extension or plugin acting on its own behalf.
    Plugin(String),
}

impl PartialEq for CauseValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CauseValue::Actor(a), CauseValue::Actor(b)) => a == b,
            (CauseValue::Entity(a), CauseValue::Entity(b)) => a.id() == b.id(),
            (CauseValue::Block(a), CauseValue::Block(b)) => Arc::ptr_eq(a, b) || a == b,
            (CauseValue::Fixture(a), CauseValue::Fixture(b)) => a == b,
            (CauseValue::Region(a), CauseValue::Region(b)) => a == b,
            (CauseValue::World(a), CauseValue::World(b)) => a == b,
            (CauseValue::Plugin(a), CauseValue::Plugin(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Actor> for CauseValue {
    fn from(actor: Actor) -> Self {
        CauseValue::Actor(actor)
    }
}

impl From<EntityRef> for CauseValue {
    fn from(entity: EntityRef) -> Self {
        CauseValue::Entity(entity)
    }
}

impl From<Arc<BlockSnapshot>> for CauseValue {
    fn from(snapshot: Arc<BlockSnapshot>) -> Self {
        CauseValue::Block(snapshot)
    }
}

impl From<Arc<Fixture>> for CauseValue {
    fn from(fixture: Arc<Fixture>) -> Self {
        CauseValue::Fixture(fixture)
    }
}

impl From<RegionPos> for CauseValue {
    fn from(region: RegionPos) -> Self {
        CauseValue::Region(region)
    }
}

impl From<WorldId> for CauseValue {
    fn from(world: WorldId) -> Self {
        CauseValue::World(world)
    }
}

/// Typed access to one variant of [`CauseValue`], used by
/// [`Cause::first`] and [`Cause::all_of`].
pub trait CauseVariant {
    fn from_value(value: &CauseValue) -> Option<&Self>;
}

impl CauseVariant for Actor {
    fn from_value(value: &CauseValue) -> Option<&Self> {
        match value {
            CauseValue::Actor(actor) => Some(actor),
            _ => None,
        }
    }
}

impl CauseVariant for Arc<dyn WorldEntity> {
    fn from_value(value: &CauseValue) -> Option<&Self> {
        match value {
            CauseValue::Entity(entity) => Some(entity),
            _ => None,
        }
    }
}

impl CauseVariant for Arc<BlockSnapshot> {
    fn from_value(value: &CauseValue) -> Option<&Self> {
        match value {
            CauseValue::Block(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

impl CauseVariant for Arc<Fixture> {
    fn from_value(value: &CauseValue) -> Option<&Self> {
        match value {
            CauseValue::Fixture(fixture) => Some(fixture),
            _ => None,
        }
    }
}

impl CauseVariant for RegionPos {
    fn from_value(value: &CauseValue) -> Option<&Self> {
        match value {
            CauseValue::Region(region) => Some(region),
            _ => None,
        }
    }
}

impl CauseVariant for WorldId {
    fn from_value(value: &CauseValue) -> Option<&Self> {
        match value {
            CauseValue::World(world) => Some(world),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// NamedCause
// ---------------------------------------------------------------------------

/// A cause value tagged with the role it plays.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedCause {
    pub role: String,
    pub value: CauseValue,
}

impl NamedCause {
    pub const SOURCE: &'static str = "source";
    pub const OWNER: &'static str = "owner";
    pub const NOTIFIER: &'static str = "notifier";
    pub const THROWER: &'static str = "thrower";
    pub const IGNITER: &'static str = "igniter";
    pub const PLAYER: &'static str = "player";

    pub fn new(role: impl Into<String>, value: impl Into<CauseValue>) -> Self {
        Self {
            role: role.into(),
            value: value.into(),
        }
    }

    pub fn source(value: impl Into<CauseValue>) -> Self {
        Self::new(Self::SOURCE, value)
    }

    pub fn owner(value: impl Into<CauseValue>) -> Self {
        Self::new(Self::OWNER, value)
    }

    pub fn notifier(value: impl Into<CauseValue>) -> Self {
        Self::new(Self::NOTIFIER, value)
    }
}

// ---------------------------------------------------------------------------
// Cause
// ---------------------------------------------------------------------------

/// An ordered, de-duplicated provenance chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cause {
    causes: Vec<NamedCause>,
}

impl Cause {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A single-entry cause with `value` as its source.
    pub fn source(value: impl Into<CauseValue>) -> Self {
        Self::of(NamedCause::source(value))
    }

    pub fn of(named: NamedCause) -> Self {
        Self {
            causes: vec![named],
        }
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, named: NamedCause) -> Self {
        self.push(named);
        self
    }

    /// Append every entry of `other` that is not already present.
    pub fn merge(mut self, other: &Cause) -> Self {
        for named in &other.causes {
            self.push(named.clone());
        }
        self
    }

    /// Append `named` unless its value is already in the chain.
    /// Returns whether the chain grew.
    pub fn push(&mut self, named: NamedCause) -> bool {
        if self.contains(&named.value) {
            return false;
        }
        self.causes.push(named);
        true
    }

    /// Make `named` the root. An existing entry with the same value is moved
    /// rather than duplicated.
    pub fn prepend(&mut self, named: NamedCause) {
        self.causes.retain(|c| c.value != named.value);
        self.causes.insert(0, named);
    }

    pub fn root(&self) -> Option<&CauseValue> {
        self.causes.first().map(|c| &c.value)
    }

    /// The first value of type `T` in chain order.
    pub fn first<T: CauseVariant>(&self) -> Option<&T> {
        self.causes.iter().find_map(|c| T::from_value(&c.value))
    }

    /// Every value of type `T` in chain order.
    pub fn all_of<T: CauseVariant>(&self) -> Vec<&T> {
        self.causes
            .iter()
            .filter_map(|c| T::from_value(&c.value))
            .collect()
    }

    pub fn contains(&self, value: &CauseValue) -> bool {
        self.causes.iter().any(|c| &c.value == value)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.causes.iter().any(|c| c.role == role)
    }

    /// The first value recorded under `role`.
    pub fn get(&self, role: &str) -> Option<&CauseValue> {
        self.causes.iter().find(|c| c.role == role).map(|c| &c.value)
    }

    pub fn len(&self) -> usize {
        self.causes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.causes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedCause> {
        self.causes.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
