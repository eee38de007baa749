//! Read-only per-tile accessors for renderers.
//!
//! A [`GraphicsView`] borrows the world immutably and is seen through one
//! player's eyes: fog decides what it may report about other players.
//! There is no mutation path.

use serde::{Deserialize, Serialize};

use crate::components::PlayerId;
use crate::coords::{GridDims, TilePos};
use crate::correctors::Visibility;
use crate::error::Result;
use crate::layers::{Landscape, PlacedObject};
use crate::unit_kind::UnitInfo;
use crate::world::World;

/// Everything a renderer draws for one tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileView {
    /// Landscape.
    pub landscape: Landscape,
    /// Elevation.
    pub elevation: i8,
    /// Owner.
    pub owner: Option<PlayerId>,
    /// Whether the tile is on a territory border.
    pub border: bool,
    /// Fog state for the viewer.
    pub visibility: Visibility,
    /// Unit standing there, hidden outside vision.
    pub unit: Option<UnitInfo>,
    /// Objects lying there.
    pub objects: Vec<PlacedObject>,
    /// Construction mark.
    pub construction_mark: Option<u8>,
}

/// One player's read-only view of the world.
#[derive(Debug, Clone, Copy)]
pub struct GraphicsView<'a> {
    world: &'a World,
    viewer: PlayerId,
}

impl<'a> GraphicsView<'a> {
    /// View `world` as `viewer`.
    #[must_use]
    pub const fn new(world: &'a World, viewer: PlayerId) -> Self {
        Self { world, viewer }
    }

    /// Grid dimensions.
    #[must_use]
    pub const fn dims(&self) -> GridDims {
        self.world.dims()
    }

    /// The viewing player.
    #[must_use]
    pub const fn viewer(&self) -> PlayerId {
        self.viewer
    }

    /// Landscape of a tile.
    pub fn landscape(&self, pos: TilePos) -> Result<Landscape> {
        self.world.terrain().landscape(pos)
    }

    /// Elevation of a tile.
    pub fn elevation(&self, pos: TilePos) -> Result<i8> {
        self.world.terrain().elevation(pos)
    }

    /// Owner of a tile.
    pub fn owner(&self, pos: TilePos) -> Result<Option<PlayerId>> {
        self.world.partitions().player_at(pos)
    }

    /// Border flag of a tile.
    pub fn is_border(&self, pos: TilePos) -> Result<bool> {
        self.world.is_border(pos)
    }

    /// Fog state of a tile for the viewer.
    pub fn visibility(&self, pos: TilePos) -> Result<Visibility> {
        self.world.visibility(self.viewer, pos)
    }

    /// Unit on a tile. Foreign units are only reported while visible.
    pub fn unit_at(&self, pos: TilePos) -> Result<Option<UnitInfo>> {
        let Some(unit) = self.world.units().unit_at(pos)?.copied() else {
            return Ok(None);
        };
        if unit.player == self.viewer || self.visibility(pos)? == Visibility::Visible {
            Ok(Some(unit))
        } else {
            Ok(None)
        }
    }

    /// Objects on a tile.
    pub fn objects(&self, pos: TilePos) -> Result<&'a [PlacedObject]> {
        self.world.objects().objects(pos)
    }

    /// Construction mark of a tile.
    pub fn construction_mark(&self, pos: TilePos) -> Result<Option<u8>> {
        self.world.construction_mark(pos)
    }

    /// Everything about one tile.
    pub fn tile(&self, pos: TilePos) -> Result<TileView> {
        Ok(TileView {
            landscape: self.landscape(pos)?,
            elevation: self.elevation(pos)?,
            owner: self.owner(pos)?,
            border: self.is_border(pos)?,
            visibility: self.visibility(pos)?,
            unit: self.unit_at(pos)?,
            objects: self.objects(pos)?.to_vec(),
            construction_mark: self.construction_mark(pos)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::UnitId;
    use crate::config::WorldConfig;
    use crate::unit_kind::UnitKind;

    #[test]
    fn test_foreign_units_hidden_by_fog() {
        let mut world = World::new(GridDims::new(30, 10), WorldConfig::default());
        let enemy = UnitInfo::new(UnitId(2), PlayerId(1), UnitKind::Pioneer);
        world.enter_unit(TilePos::new(25, 5), enemy).unwrap();
        world
            .enter_unit(
                TilePos::new(2, 5),
                UnitInfo::new(UnitId(1), PlayerId(0), UnitKind::Worker),
            )
            .unwrap();
        world.run_correctors().unwrap();

        let view = GraphicsView::new(&world, PlayerId(0));
        assert_eq!(view.unit_at(TilePos::new(25, 5)).unwrap(), None);
        assert!(view.unit_at(TilePos::new(2, 5)).unwrap().is_some());
        assert_eq!(
            GraphicsView::new(&world, PlayerId(1))
                .unit_at(TilePos::new(25, 5))
                .unwrap(),
            Some(enemy)
        );
    }

    #[test]
    fn test_tile_view_collects_layers() {
        let mut world = World::new(GridDims::new(8, 8), WorldConfig::default());
        world.set_landscape(TilePos::new(3, 3), Landscape::Sand).unwrap();
        world.change_elevation(TilePos::new(3, 3), 4).unwrap();
        world.change_owner(TilePos::new(3, 3), Some(PlayerId(0))).unwrap();
        world.run_correctors().unwrap();

        let tile = GraphicsView::new(&world, PlayerId(0))
            .tile(TilePos::new(3, 3))
            .unwrap();
        assert_eq!(tile.landscape, Landscape::Sand);
        assert_eq!(tile.elevation, 4);
        assert_eq!(tile.owner, Some(PlayerId(0)));
        assert!(tile.border);
        assert_eq!(tile.visibility, Visibility::Unexplored);
        assert!(tile.objects.is_empty());
    }
}
