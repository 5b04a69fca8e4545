//! Block types, block states, and mutation update flags.
//!
//! A [`BlockType`] is a small `Copy` descriptor carrying the properties the
//! capture engine needs to classify a change: its [`Material`], light
//! emission and opacity, and whether the block owns a fixture (a persistent
//! per-position payload such as a chest inventory or sign text).
//!
//! A [`BlockState`] pairs a type with its variant metadata.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

use crate::pos::{BlockPos, WorldId};

// ---------------------------------------------------------------------------
// Material
// ---------------------------------------------------------------------------

/// Coarse physical class of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Material {
    /// No block; the cell is empty.
    Air,
    Solid,
    Fluid,
    Plant,
}

// ---------------------------------------------------------------------------
// BlockType
// ---------------------------------------------------------------------------

/// Static properties of a block type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockType {
    pub id: u16,
    pub material: Material,
    /// Light level emitted by the block, 0..=15.
    pub light_emission: u8,
    /// How much light the block absorbs, 0..=255.
    pub opacity: u8,
    /// Whether the block carries a fixture payload.
    pub has_fixture: bool,
}

impl BlockType {
    pub const AIR: BlockType = BlockType::new(0, Material::Air, 0, 0, false);
    pub const STONE: BlockType = BlockType::new(1, Material::Solid, 0, 255, false);
    pub const GRASS: BlockType = BlockType::new(2, Material::Solid, 0, 255, false);
    pub const DIRT: BlockType = BlockType::new(3, Material::Solid, 0, 255, false);
    pub const PLANKS: BlockType = BlockType::new(5, Material::Solid, 0, 255, false);
    pub const WATER: BlockType = BlockType::new(9, Material::Fluid, 0, 3, false);
    pub const LAVA: BlockType = BlockType::new(11, Material::Fluid, 15, 0, false);
    pub const SAND: BlockType = BlockType::new(12, Material::Solid, 0, 255, false);
    pub const LOG: BlockType = BlockType::new(17, Material::Solid, 0, 255, false);
    pub const LEAVES: BlockType = BlockType::new(18, Material::Plant, 0, 1, false);
    pub const TNT: BlockType = BlockType::new(46, Material::Solid, 0, 255, false);
    pub const TORCH: BlockType = BlockType::new(50, Material::Solid, 14, 0, false);
    pub const CHEST: BlockType = BlockType::new(54, Material::Solid, 0, 0, true);
    pub const SIGN: BlockType = BlockType::new(63, Material::Solid, 0, 0, true);

    pub const fn new(
        id: u16,
        material: Material,
        light_emission: u8,
        opacity: u8,
        has_fixture: bool,
    ) -> Self {
        Self {
            id,
            material,
            light_emission,
            opacity,
            has_fixture,
        }
    }

    /// Human-readable name for the built-in types, `"unknown"` otherwise.
    pub fn name(&self) -> &'static str {
        match self.id {
            0 => "air",
            1 => "stone",
            2 => "grass",
            3 => "dirt",
            5 => "planks",
            9 => "water",
            11 => "lava",
            12 => "sand",
            17 => "log",
            18 => "leaves",
            46 => "tnt",
            50 => "torch",
            54 => "chest",
            63 => "sign",
            _ => "unknown",
        }
    }
}

// ---------------------------------------------------------------------------
// BlockState
// ---------------------------------------------------------------------------

/// A block type plus its variant metadata (orientation, growth stage, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockState {
    pub block: BlockType,
    pub meta: u8,
}

impl BlockState {
    pub const AIR: BlockState = BlockState::of(BlockType::AIR);

    pub const fn of(block: BlockType) -> Self {
        Self { block, meta: 0 }
    }

    pub const fn with_meta(block: BlockType, meta: u8) -> Self {
        Self { block, meta }
    }

    /// `true` for the empty (air) state.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.block.material == Material::Air
    }

    #[inline]
    pub fn is_fluid(&self) -> bool {
        self.block.material == Material::Fluid
    }

    #[inline]
    pub fn has_fixture(&self) -> bool {
        self.block.has_fixture
    }
}

impl Default for BlockState {
    fn default() -> Self {
        BlockState::AIR
    }
}

impl From<BlockType> for BlockState {
    fn from(block: BlockType) -> Self {
        BlockState::of(block)
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.meta == 0 {
            write!(f, "{}", self.block.name())
        } else {
            write!(f, "{}:{}", self.block.name(), self.meta)
        }
    }
}

// ---------------------------------------------------------------------------
// UpdateFlags
// ---------------------------------------------------------------------------

/// Bitmask controlling what follows a block write.
///
/// - [`NOTIFY_NEIGHBORS`](Self::NOTIFY_NEIGHBORS): run neighbor physics.
/// - [`NOTIFY_CLIENTS`](Self::NOTIFY_CLIENTS): send the change to clients.
/// - [`NO_OBSERVERS`](Self::NO_OBSERVERS): on a remote view, suppress the
///   client update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UpdateFlags(u8);

impl UpdateFlags {
    pub const NONE: UpdateFlags = UpdateFlags(0);
    pub const NOTIFY_NEIGHBORS: UpdateFlags = UpdateFlags(1);
    pub const NOTIFY_CLIENTS: UpdateFlags = UpdateFlags(2);
    pub const NO_OBSERVERS: UpdateFlags = UpdateFlags(4);
    pub const DEFAULT: UpdateFlags = UpdateFlags(3);

    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: UpdateFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for UpdateFlags {
    type Output = UpdateFlags;

    fn bitor(self, rhs: UpdateFlags) -> UpdateFlags {
        UpdateFlags(self.0 | rhs.0)
    }
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

/// A persistent object bound to a fixture-bearing block (chest inventory,
/// sign text, furnace progress). Its serialized payload is read from storage
/// when a snapshot is taken.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fixture {
    pub world_id: WorldId,
    pub pos: BlockPos,
    pub kind: String,
}

impl Fixture {
    pub fn new(world_id: WorldId, pos: BlockPos, kind: impl Into<String>) -> Self {
        Self {
            world_id,
            pos,
            kind: kind.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
