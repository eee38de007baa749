//! Tile coordinates, hex directions and area shapes.
//!
//! The map is a skewed-axial hex grid stored as a `width × height`
//! rectangle. Every tile has six neighbours, reached by the offsets in
//! [`Direction`]. Positions are signed so that relative offsets may leave
//! the grid; every layer validates bounds through [`GridDims`] before
//! touching its storage.

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};

/// A tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl TilePos {
    /// Create a new tile position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The tile one step away in `direction`.
    #[must_use]
    pub const fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self::new(self.x + dx, self.y + dy)
    }

    /// All six neighbours in [`Direction::ALL`] order. May be out of bounds.
    #[must_use]
    pub fn neighbours(self) -> [Self; 6] {
        Direction::ALL.map(|dir| self.step(dir))
    }

    /// Apply a relative offset.
    #[must_use]
    pub const fn offset(self, rel: RelativePoint) -> Self {
        Self::new(self.x + rel.dx, self.y + rel.dy)
    }

    /// Number of hex steps between two tiles.
    #[must_use]
    pub const fn hex_distance(self, other: Self) -> u32 {
        hex_distance(other.x - self.x, other.y - self.y)
    }
}

/// Hex step count for a relative offset on the skewed-axial grid.
///
/// Offsets whose components share a sign can use the diagonal
/// (SE/NW) step, so they cost `max(|dx|, |dy|)`; mixed signs cost the sum.
#[must_use]
pub const fn hex_distance(dx: i32, dy: i32) -> u32 {
    let adx = dx.unsigned_abs();
    let ady = dy.unsigned_abs();
    if (dx >= 0 && dy >= 0) || (dx <= 0 && dy <= 0) {
        if adx > ady {
            adx
        } else {
            ady
        }
    } else {
        adx + ady
    }
}

/// The six hex directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// (0, -1)
    NorthEast,
    /// (1, 0)
    East,
    /// (1, 1)
    SouthEast,
    /// (0, 1)
    SouthWest,
    /// (-1, 0)
    West,
    /// (-1, -1)
    NorthWest,
}

impl Direction {
    /// All directions in clockwise order. Every neighbour iteration uses
    /// this order, which keeps searches deterministic.
    pub const ALL: [Self; 6] = [
        Self::NorthEast,
        Self::East,
        Self::SouthEast,
        Self::SouthWest,
        Self::West,
        Self::NorthWest,
    ];

    /// Coordinate offset of one step in this direction.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::NorthEast => (0, -1),
            Self::East => (1, 0),
            Self::SouthEast => (1, 1),
            Self::SouthWest => (0, 1),
            Self::West => (-1, 0),
            Self::NorthWest => (-1, -1),
        }
    }

    /// The opposite direction.
    #[must_use]
    pub const fn inverse(self) -> Self {
        match self {
            Self::NorthEast => Self::SouthWest,
            Self::East => Self::West,
            Self::SouthEast => Self::NorthWest,
            Self::SouthWest => Self::NorthEast,
            Self::West => Self::East,
            Self::NorthWest => Self::SouthEast,
        }
    }
}

/// Offset relative to an anchor tile, used by building footprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelativePoint {
    /// Column offset.
    pub dx: i32,
    /// Row offset.
    pub dy: i32,
}

impl RelativePoint {
    /// Create a new relative point.
    #[must_use]
    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }
}

/// Grid dimensions plus the bounds check every layer goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDims {
    /// Grid width in tiles.
    pub width: u16,
    /// Grid height in tiles.
    pub height: u16,
}

impl GridDims {
    /// Create grid dimensions.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        assert!(width > 0, "grid width must be positive");
        assert!(height > 0, "grid height must be positive");
        Self { width, height }
    }

    /// Number of tiles.
    #[must_use]
    pub const fn tile_count(self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Check if a position is within grid bounds.
    #[must_use]
    pub const fn in_bounds(self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width as i32 && pos.y < self.height as i32
    }

    /// Row-major storage index of a position.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::OutOfBounds`] for positions outside the grid.
    #[inline]
    pub fn index(self, pos: TilePos) -> Result<usize> {
        if self.in_bounds(pos) {
            Ok(self.index_unchecked(pos))
        } else {
            Err(GridError::OutOfBounds {
                x: pos.x,
                y: pos.y,
                width: self.width,
                height: self.height,
            })
        }
    }

    /// Index without the bounds check. Callers must have validated `pos`.
    #[inline]
    pub(crate) const fn index_unchecked(self, pos: TilePos) -> usize {
        (pos.y as usize) * (self.width as usize) + (pos.x as usize)
    }

    /// Position of a storage index.
    #[inline]
    #[must_use]
    pub const fn pos_of(self, index: usize) -> TilePos {
        let w = self.width as usize;
        TilePos::new((index % w) as i32, (index / w) as i32)
    }

    /// Validate a position, returning it unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::OutOfBounds`] for positions outside the grid.
    pub fn check(self, pos: TilePos) -> Result<TilePos> {
        self.index(pos).map(|_| pos)
    }

    /// In-bounds neighbours of a position, in direction order.
    pub fn neighbours(self, pos: TilePos) -> impl Iterator<Item = TilePos> {
        pos.neighbours()
            .into_iter()
            .filter(move |&n| self.in_bounds(n))
    }

    /// All positions in row-major order.
    pub fn positions(self) -> impl Iterator<Item = TilePos> {
        (0..self.tile_count()).map(move |i| self.pos_of(i))
    }
}

/// Tiles at exactly `radius` hex steps from `center`, in row-major order.
///
/// Radius 0 yields the center itself. Positions may be out of bounds.
#[must_use]
pub fn hex_ring(center: TilePos, radius: u32) -> Vec<TilePos> {
    let r = radius as i32;
    let mut ring = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            if hex_distance(dx, dy) == radius {
                ring.push(TilePos::new(center.x + dx, center.y + dy));
            }
        }
    }
    ring
}

/// Tiles within `radius` hex steps from `center`, in row-major order.
#[must_use]
pub fn hex_circle(center: TilePos, radius: u32) -> Vec<TilePos> {
    let r = radius as i32;
    let mut tiles = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            if hex_distance(dx, dy) <= radius {
                tiles.push(TilePos::new(center.x + dx, center.y + dy));
            }
        }
    }
    tiles
}

/// An area relative to an anchor tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shape {
    /// Explicit list of offsets.
    Footprint(Vec<RelativePoint>),
    /// Every tile within `radius` hex steps.
    Circle {
        /// Hex radius.
        radius: u32,
    },
}

impl Shape {
    /// Absolute tiles of this shape around `anchor`. May be out of bounds.
    #[must_use]
    pub fn tiles(&self, anchor: TilePos) -> Vec<TilePos> {
        match self {
            Self::Footprint(points) => points.iter().map(|&p| anchor.offset(p)).collect(),
            Self::Circle { radius } => hex_circle(anchor, *radius),
        }
    }
}

/// Inclusive rectangle of tiles, e.g. the visible screen region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRect {
    /// Top-left corner.
    pub min: TilePos,
    /// Bottom-right corner (inclusive).
    pub max: TilePos,
}

impl TileRect {
    /// Rectangle from origin and size.
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            min: TilePos::new(x, y),
            max: TilePos::new(x + width - 1, y + height - 1),
        }
    }

    /// Check whether a position lies inside.
    #[must_use]
    pub const fn contains(&self, pos: TilePos) -> bool {
        pos.x >= self.min.x && pos.x <= self.max.x && pos.y >= self.min.y && pos.y <= self.max.y
    }

    /// Grow the rectangle by `margin` tiles on every side.
    #[must_use]
    pub const fn expanded(&self, margin: i32) -> Self {
        Self {
            min: TilePos::new(self.min.x - margin, self.min.y - margin),
            max: TilePos::new(self.max.x + margin, self.max.y + margin),
        }
    }

    /// All positions inside, row-major.
    pub fn positions(&self) -> impl Iterator<Item = TilePos> + '_ {
        (self.min.y..=self.max.y)
            .flat_map(move |y| (self.min.x..=self.max.x).map(move |x| TilePos::new(x, y)))
    }
}
