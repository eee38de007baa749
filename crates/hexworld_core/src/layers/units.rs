//! Per-tile occupancy by at most one mobile unit.

use serde::{Deserialize, Serialize};

use crate::components::UnitId;
use crate::coords::{GridDims, TilePos};
use crate::error::{GridError, Result};
use crate::unit_kind::UnitInfo;

/// Unit layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitLayer {
    dims: GridDims,
    occupants: Vec<Option<UnitInfo>>,
}

impl UnitLayer {
    /// Create an empty layer.
    #[must_use]
    pub fn new(dims: GridDims) -> Self {
        Self {
            dims,
            occupants: vec![None; dims.tile_count()],
        }
    }

    /// Whether the storage matches `dims` (restored layers).
    pub(crate) fn fits(&self, dims: GridDims) -> bool {
        self.dims == dims && self.occupants.len() == dims.tile_count()
    }

    /// Unit standing on a tile.
    pub fn unit_at(&self, pos: TilePos) -> Result<Option<&UnitInfo>> {
        Ok(self.occupants[self.dims.index(pos)?].as_ref())
    }

    /// Put a unit on a free tile.
    ///
    /// # Errors
    ///
    /// [`GridError::InvalidTransition`] if another unit stands there.
    pub fn enter(&mut self, pos: TilePos, unit: UnitInfo) -> Result<()> {
        let slot = &mut self.occupants[self.dims.index(pos)?];
        if let Some(current) = slot {
            return Err(GridError::invalid(format!(
                "unit {:?} cannot enter ({}, {}): occupied by {:?}",
                unit.id, pos.x, pos.y, current.id
            )));
        }
        *slot = Some(unit);
        Ok(())
    }

    /// Remove a unit from its tile, verifying it is the one standing there.
    pub fn leave(&mut self, pos: TilePos, unit: UnitId) -> Result<UnitInfo> {
        let slot = &mut self.occupants[self.dims.index(pos)?];
        match slot {
            Some(current) if current.id == unit => {
                let info = *current;
                *slot = None;
                Ok(info)
            }
            _ => Err(GridError::invalid(format!(
                "unit {unit:?} is not at ({}, {})",
                pos.x, pos.y
            ))),
        }
    }

    /// All occupied tiles, row-major.
    pub fn iter(&self) -> impl Iterator<Item = (TilePos, &UnitInfo)> + '_ {
        self.occupants
            .iter()
            .enumerate()
            .filter_map(move |(i, o)| o.as_ref().map(|u| (self.dims.pos_of(i), u)))
    }
}
