//! World coordinates: block positions, faces, and region (chunk) coordinates.
//!
//! A [`BlockPos`] addresses a single block cell. Regions group 16x16 columns
//! of blocks and are the unit at which world generation runs procedures.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// WorldId
// ---------------------------------------------------------------------------

/// Identifier of a loaded world (dimension).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorldId(pub u32);

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "world#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// One of the six faces of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Direction {
    /// All faces in neighbor-notification order.
    pub const ALL: [Direction; 6] = [
        Direction::West,
        Direction::East,
        Direction::Down,
        Direction::Up,
        Direction::North,
        Direction::South,
    ];

    /// Unit offset `(dx, dy, dz)` of this face.
    pub fn offset(self) -> (i32, i32, i32) {
        match self {
            Direction::Down => (0, -1, 0),
            Direction::Up => (0, 1, 0),
            Direction::North => (0, 0, -1),
            Direction::South => (0, 0, 1),
            Direction::West => (-1, 0, 0),
            Direction::East => (1, 0, 0),
        }
    }

    /// The face pointing the other way.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
        }
    }
}

// ---------------------------------------------------------------------------
// BlockPos
// ---------------------------------------------------------------------------

/// Integer coordinates of a block cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const ORIGIN: BlockPos = BlockPos { x: 0, y: 0, z: 0 };

    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The adjacent position across `face`.
    #[inline]
    pub fn offset(self, face: Direction) -> BlockPos {
        let (dx, dy, dz) = face.offset();
        BlockPos::new(self.x + dx, self.y + dy, self.z + dz)
    }

    #[inline]
    pub fn up(self) -> BlockPos {
        self.offset(Direction::Up)
    }

    #[inline]
    pub fn down(self) -> BlockPos {
        self.offset(Direction::Down)
    }

    /// Positions adjacent to this one, skipping `except` when given.
    pub fn neighbors(self, except: Option<Direction>) -> impl Iterator<Item = BlockPos> {
        Direction::ALL
            .into_iter()
            .filter(move |face| Some(*face) != except)
            .map(move |face| self.offset(face))
    }

    /// The region column containing this position.
    #[inline]
    pub fn region(self) -> RegionPos {
        RegionPos::new(self.x >> 4, self.z >> 4)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// RegionPos
// ---------------------------------------------------------------------------

/// Coordinates of a 16x16 column of blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionPos {
    pub x: i32,
    pub z: i32,
}

impl RegionPos {
    #[inline]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Whether `pos` lies inside this region.
    pub fn contains(self, pos: BlockPos) -> bool {
        pos.region() == self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_and_opposite_cancel() {
        let pos = BlockPos::new(3, 64, -7);
        for face in Direction::ALL {
            assert_eq!(pos.offset(face).offset(face.opposite()), pos);
        }
    }

    #[test]
    fn neighbors_skip_excluded_face() {
        let pos = BlockPos::ORIGIN;
        assert_eq!(pos.neighbors(None).count(), 6);
        let five: Vec<_> = pos.neighbors(Some(Direction::Up)).collect();
        assert_eq!(five.len(), 5);
        assert!(!five.contains(&pos.up()));
    }

    #[test]
    fn region_of_negative_coordinates() {
        assert_eq!(BlockPos::new(-1, 0, -17).region(), RegionPos::new(-1, -2));
        assert_eq!(BlockPos::new(15, 0, 16).region(), RegionPos::new(0, 1));
        assert!(RegionPos::new(0, 1).contains(BlockPos::new(15, 0, 16)));
    }
}
