//! Spatial addressing shared by every layer: positions, directions and direction sets.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Addressable position of a block in the world grid.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize, Deserialize)]
pub struct BlockPos {
    /// East-west coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
    /// North-south coordinate.
    pub z: i32,
}

impl BlockPos {
    /// The world origin.
    pub const ORIGIN: BlockPos = BlockPos::new(0, 0, 0);

    /// Builds a position from its coordinates.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns the position one step away in `direction`.
    pub fn relative(self, direction: Direction) -> Self {
        let (dx, dy, dz) = direction.offset();
        self.offset(dx, dy, dz)
    }

    /// Returns the position translated by the given deltas.
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x.wrapping_add(dx),
            y: self.y.wrapping_add(dy),
            z: self.z.wrapping_add(dz),
        }
    }

    /// Manhattan distance between two positions.
    pub fn manhattan(self, other: BlockPos) -> u64 {
        let dx = (i64::from(self.x) - i64::from(other.x)).unsigned_abs();
        let dy = (i64::from(self.y) - i64::from(other.y)).unsigned_abs();
        let dz = (i64::from(self.z) - i64::from(other.z)).unsigned_abs();
        dx + dy + dz
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// One of the six faces of a block.
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub enum Direction {
    /// Negative y.
    Down = 0,
    /// Positive y.
    Up = 1,
    /// Negative z.
    North = 2,
    /// Positive z.
    South = 3,
    /// Negative x.
    West = 4,
    /// Positive x.
    East = 5,
}

impl Direction {
    /// Every direction, in declaration order.
    pub const ALL: [Direction; 6] = [
        Direction::Down,
        Direction::Up,
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    /// Returns the direction pointing the other way.
    pub const fn opposite(self) -> Self {
        match self {
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
        }
    }

    /// Unit step `(dx, dy, dz)` for this direction.
    pub const fn offset(self) -> (i32, i32, i32) {
        match self {
            Direction::Down => (0, -1, 0),
            Direction::Up => (0, 1, 0),
            Direction::North => (0, 0, -1),
            Direction::South => (0, 0, 1),
            Direction::West => (-1, 0, 0),
            Direction::East => (1, 0, 0),
        }
    }

    /// Stable index in `0..6`.
    pub const fn index(self) -> usize {
        self as usize
    }

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Down => "down",
            Direction::Up => "up",
            Direction::North => "north",
            Direction::South => "south",
            Direction::West => "west",
            Direction::East => "east",
        };
        f.write_str(name)
    }
}

/// Compact set of directions backed by a bitmask.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct DirectionSet(u8);

impl DirectionSet {
    /// The empty set.
    pub const EMPTY: DirectionSet = DirectionSet(0);
    /// All six directions.
    pub const ALL: DirectionSet = DirectionSet(0b0011_1111);

    /// Builds a set from a slice of directions.
    pub fn of(directions: &[Direction]) -> Self {
        directions.iter().copied().collect()
    }

    /// Adds a direction, returning `true` when it was not present yet.
    pub fn insert(&mut self, direction: Direction) -> bool {
        let present = self.contains(direction);
        self.0 |= direction.bit();
        !present
    }

    /// Removes a direction, returning `true` when it was present.
    pub fn remove(&mut self, direction: Direction) -> bool {
        let present = self.contains(direction);
        self.0 &= !direction.bit();
        present
    }

    /// Returns a copy of the set without `direction`.
    pub fn without(mut self, direction: Direction) -> Self {
        self.remove(direction);
        self
    }

    /// Membership test.
    pub const fn contains(self, direction: Direction) -> bool {
        self.0 & direction.bit() != 0
    }

    /// Number of directions in the set.
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Returns `true` when the set holds no direction.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates the members in declaration order.
    pub fn iter(self) -> impl Iterator<Item = Direction> {
        Direction::ALL
            .into_iter()
            .filter(move |direction| self.contains(*direction))
    }
}

impl FromIterator<Direction> for DirectionSet {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        let mut set = DirectionSet::EMPTY;
        for direction in iter {
            set.insert(direction);
        }
        set
    }
}

impl fmt::Debug for DirectionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
