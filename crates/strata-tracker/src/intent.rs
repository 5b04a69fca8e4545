//! The player action being processed while mutations happen.
//!
//! When a player's request is handled (digging, placing, dropping, chatting,
//! attacking, clicking an inventory), the host wraps the handling in
//! [`TrackedWorld::process_intent`](crate::world::TrackedWorld::process_intent)
//! with an [`IntentContext`]. The context makes the player the cause of every
//! captured change and drives the intent rules applied at flush time.

use strata_world::cause::{Actor, Cause};
use strata_world::entity::EntityId;

/// The high-level action a player is performing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Started digging a block.
    StartDestroy,
    /// Threw an item out of their hand.
    DropItem,
    PlaceBlock,
    /// A chat line or command.
    Chat(String),
    AttackEntity(EntityId),
    ClickWindow,
    CreativeInventory,
    OpenContainer,
    CloseContainer,
}

/// The acting player and the bits of their state the flush looks at.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentActor {
    pub actor: Actor,
    pub health: f32,
    pub container_open: bool,
}

/// Everything known about the request being processed.
#[derive(Debug, Clone, Default)]
pub struct IntentContext {
    pub actor: Option<IntentActor>,
    pub intent: Option<Intent>,
    /// Suppress the creative-inventory event for this request.
    pub ignore_creative: bool,
    /// One-shot override of the cause used for item drops; consumed by the
    /// next flush that drops items.
    pub drop_cause: Option<Cause>,
}

impl IntentContext {
    /// A context for `actor` at full health with no container open.
    pub fn for_actor(actor: Actor) -> Self {
        Self {
            actor: Some(IntentActor {
                actor,
                health: 20.0,
                container_open: false,
            }),
            ..Self::default()
        }
    }

    pub fn intent(mut self, intent: Intent) -> Self {
        self.intent = Some(intent);
        self
    }

    pub fn with_health(mut self, health: f32) -> Self {
        if let Some(actor) = self.actor.as_mut() {
            actor.health = health;
        }
        self
    }

    pub fn with_open_container(mut self) -> Self {
        if let Some(actor) = self.actor.as_mut() {
            actor.container_open = true;
        }
        self
    }

    pub fn ignoring_creative(mut self) -> Self {
        self.ignore_creative = true;
        self
    }

    pub fn with_drop_cause(mut self, cause: Cause) -> Self {
        self.drop_cause = Some(cause);
        self
    }

    pub fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref().map(|a| &a.actor)
    }

    pub fn is(&self, intent: &Intent) -> bool {
        self.intent.as_ref() == Some(intent)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
