//! Blocked, protected and marked flags per tile.

use serde::{Deserialize, Serialize};

use crate::coords::{GridDims, TilePos};
use crate::error::Result;

/// Packed per-tile flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TileFlags(u8);

impl TileFlags {
    /// No unit may enter.
    pub const BLOCKED: Self = Self(1 << 0);
    /// Reserved around a building; no new construction.
    pub const PROTECTED: Self = Self(1 << 1);
    /// Claimed by a worker's pending job.
    pub const MARKED: Self = Self(1 << 2);

    /// No flags set.
    pub const EMPTY: Self = Self(0);

    /// Check if all bits of `other` are set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set or clear the bits of `other`.
    pub fn set(&mut self, other: Self, value: bool) {
        if value {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }
}

/// Occupancy flag layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyLayer {
    dims: GridDims,
    flags: Vec<TileFlags>,
}

impl OccupancyLayer {
    /// Create a layer with every flag cleared.
    #[must_use]
    pub fn new(dims: GridDims) -> Self {
        Self {
            dims,
            flags: vec![TileFlags::EMPTY; dims.tile_count()],
        }
    }

    /// Whether the storage matches `dims` (restored layers).
    pub(crate) fn fits(&self, dims: GridDims) -> bool {
        self.dims == dims && self.flags.len() == dims.tile_count()
    }

    /// All flags of a tile.
    pub fn flags(&self, pos: TilePos) -> Result<TileFlags> {
        Ok(self.flags[self.dims.index(pos)?])
    }

    fn set_flag(&mut self, pos: TilePos, flag: TileFlags, value: bool) -> Result<bool> {
        let i = self.dims.index(pos)?;
        let before = self.flags[i];
        self.flags[i].set(flag, value);
        Ok(before != self.flags[i])
    }

    /// Whether the tile is blocked.
    pub fn is_blocked(&self, pos: TilePos) -> Result<bool> {
        Ok(self.flags(pos)?.contains(TileFlags::BLOCKED))
    }

    /// Whether the tile is protected.
    pub fn is_protected(&self, pos: TilePos) -> Result<bool> {
        Ok(self.flags(pos)?.contains(TileFlags::PROTECTED))
    }

    /// Whether the tile is marked.
    pub fn is_marked(&self, pos: TilePos) -> Result<bool> {
        Ok(self.flags(pos)?.contains(TileFlags::MARKED))
    }

    /// Set the blocked flag. Returns whether the flag changed.
    pub fn set_blocked(&mut self, pos: TilePos, blocked: bool) -> Result<bool> {
        self.set_flag(pos, TileFlags::BLOCKED, blocked)
    }

    /// Set the protected flag. Returns whether the flag changed.
    pub fn set_protected(&mut self, pos: TilePos, protected: bool) -> Result<bool> {
        self.set_flag(pos, TileFlags::PROTECTED, protected)
    }

    /// Set the marked flag. Returns whether the flag changed.
    pub fn set_marked(&mut self, pos: TilePos, marked: bool) -> Result<bool> {
        self.set_flag(pos, TileFlags::MARKED, marked)
    }

    /// Set blocked and protected together, as building footprints do.
    pub fn set_blocked_and_protected(&mut self, pos: TilePos, value: bool) -> Result<bool> {
        let both = TileFlags(TileFlags::BLOCKED.0 | TileFlags::PROTECTED.0);
        self.set_flag(pos, both, value)
    }

    /// Whether any in-bounds neighbour is protected.
    pub fn has_protected_neighbour(&self, pos: TilePos) -> Result<bool> {
        self.dims.check(pos)?;
        Ok(self.dims.neighbours(pos).any(|n| {
            self.flags[self.dims.index_unchecked(n)].contains(TileFlags::PROTECTED)
        }))
    }

    /// Whether any neighbour is blocked. Off-grid neighbours count as blocked.
    pub fn has_blocked_neighbour(&self, pos: TilePos) -> Result<bool> {
        self.dims.check(pos)?;
        Ok(pos.neighbours().into_iter().any(|n| {
            !self.dims.in_bounds(n)
                || self.flags[self.dims.index_unchecked(n)].contains(TileFlags::BLOCKED)
        }))
    }
}
