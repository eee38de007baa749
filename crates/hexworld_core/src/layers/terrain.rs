//! Terrain type, elevation and natural resources per tile.

use serde::{Deserialize, Serialize};

use crate::coords::{GridDims, TilePos};
use crate::error::Result;

/// Landscape type of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Landscape {
    /// Default buildable ground.
    #[default]
    Grass,
    /// Farmland.
    Earth,
    /// Beach.
    Sand,
    /// Dry wasteland.
    Desert,
    /// Mountain; mines and resource signs.
    Mountain,
    /// Impassable snow.
    Snow,
    /// Impassable water.
    Water,
    /// Shallow river; passable.
    River,
}

impl Landscape {
    /// Terrain that no unit may enter regardless of flags.
    #[must_use]
    pub const fn is_blocking(self) -> bool {
        matches!(self, Self::Water | Self::Snow)
    }
}

/// Kind of natural deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Coal ore.
    Coal,
    /// Iron ore.
    Iron,
    /// Gold ore.
    Gold,
    /// Fish in water.
    Fish,
}

/// A deposit and its remaining amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDeposit {
    /// Deposit kind.
    pub kind: ResourceKind,
    /// Remaining amount.
    pub amount: u8,
}

/// Terrain layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainLayer {
    dims: GridDims,
    landscape: Vec<Landscape>,
    elevation: Vec<i8>,
    resources: Vec<Option<ResourceDeposit>>,
}

impl TerrainLayer {
    /// Create a flat grass layer.
    #[must_use]
    pub fn new(dims: GridDims) -> Self {
        let n = dims.tile_count();
        Self {
            dims,
            landscape: vec![Landscape::Grass; n],
            elevation: vec![0; n],
            resources: vec![None; n],
        }
    }

    /// Whether the storage matches `dims` (restored layers).
    pub(crate) fn fits(&self, dims: GridDims) -> bool {
        let n = dims.tile_count();
        self.dims == dims
            && self.landscape.len() == n
            && self.elevation.len() == n
            && self.resources.len() == n
    }

    /// Landscape at a tile.
    pub fn landscape(&self, pos: TilePos) -> Result<Landscape> {
        Ok(self.landscape[self.dims.index(pos)?])
    }

    /// Set the landscape at a tile.
    pub fn set_landscape(&mut self, pos: TilePos, landscape: Landscape) -> Result<()> {
        let i = self.dims.index(pos)?;
        self.landscape[i] = landscape;
        Ok(())
    }

    /// Elevation at a tile.
    pub fn elevation(&self, pos: TilePos) -> Result<i8> {
        Ok(self.elevation[self.dims.index(pos)?])
    }

    /// Set the elevation at a tile.
    pub fn set_elevation(&mut self, pos: TilePos, elevation: i8) -> Result<()> {
        let i = self.dims.index(pos)?;
        self.elevation[i] = elevation;
        Ok(())
    }

    /// Apply an elevation delta, saturating at the signed byte range.
    ///
    /// Returns the new elevation.
    pub fn change_elevation(&mut self, pos: TilePos, delta: i8) -> Result<i8> {
        let i = self.dims.index(pos)?;
        self.elevation[i] = self.elevation[i].saturating_add(delta);
        Ok(self.elevation[i])
    }

    /// Resource deposit at a tile.
    pub fn resource(&self, pos: TilePos) -> Result<Option<ResourceDeposit>> {
        Ok(self.resources[self.dims.index(pos)?])
    }

    /// Set or clear the resource deposit at a tile.
    pub fn set_resource(&mut self, pos: TilePos, deposit: Option<ResourceDeposit>) -> Result<()> {
        let i = self.dims.index(pos)?;
        self.resources[i] = deposit;
        Ok(())
    }

    /// Take up to `amount` from the deposit, returning what was taken.
    ///
    /// The deposit is cleared once exhausted.
    pub fn mine_resource(&mut self, pos: TilePos, amount: u8) -> Result<u8> {
        let i = self.dims.index(pos)?;
        let Some(deposit) = self.resources[i].as_mut() else {
            return Ok(0);
        };
        let taken = amount.min(deposit.amount);
        deposit.amount -= taken;
        if deposit.amount == 0 {
            self.resources[i] = None;
        }
        Ok(taken)
    }

    /// Whether any in-bounds neighbour has the given landscape.
    pub fn has_neighbour_landscape(&self, pos: TilePos, landscape: Landscape) -> Result<bool> {
        self.dims.check(pos)?;
        Ok(self
            .dims
            .neighbours(pos)
            .any(|n| self.landscape[self.dims.index_unchecked(n)] == landscape))
    }
}
