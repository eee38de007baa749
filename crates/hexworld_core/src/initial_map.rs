//! One-shot world construction from a loader's output.
//!
//! The loader hands over a rectangular array of tile seeds and a list of
//! placements. They are applied in two passes: terrain first, then
//! placements in list order, because placement rules depend on the
//! terrain and blocking already being set. Placements that break a rule
//! are logged and skipped whole; the rest of the map still loads.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::buildings::BuildingType;
use crate::components::{BuildingId, PlayerId};
use crate::config::WorldConfig;
use crate::coords::{GridDims, Shape, TilePos};
use crate::error::{GridError, Result};
use crate::layers::{CropStage, Landscape, MapObject, MaterialType, ResourceDeposit, TreeStage};
use crate::pathfinding::search_type;
use crate::unit_kind::UnitInfo;
use crate::world::World;

/// Terrain of one tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSeed {
    /// Landscape.
    pub landscape: Landscape,
    /// Elevation.
    pub elevation: i8,
    /// Natural deposit.
    pub resource: Option<ResourceDeposit>,
}

/// Something to put on the map after the terrain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    /// Territory claimed by `player` around `pos`.
    Territory {
        /// Center.
        pos: TilePos,
        /// Hex radius.
        radius: u32,
        /// Claiming player.
        player: PlayerId,
    },
    /// A tree; only planted where trees may grow.
    Tree {
        /// Position.
        pos: TilePos,
        /// Growth stage.
        stage: TreeStage,
    },
    /// A crop field.
    Corn {
        /// Position.
        pos: TilePos,
        /// Growth stage.
        stage: CropStage,
    },
    /// A stone.
    Stone {
        /// Position.
        pos: TilePos,
        /// Remaining cuts.
        capacity: u8,
    },
    /// A material pile.
    Stack {
        /// Position.
        pos: TilePos,
        /// Material.
        material: MaterialType,
        /// Pile height.
        count: u8,
    },
    /// A building. Military buildings first claim their own footprint.
    Building {
        /// Anchor.
        pos: TilePos,
        /// External id.
        id: BuildingId,
        /// Type.
        building_type: BuildingType,
        /// Owner.
        player: PlayerId,
    },
    /// A unit.
    Unit {
        /// Position.
        pos: TilePos,
        /// Unit record.
        unit: UnitInfo,
    },
}

/// Loader output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialMap {
    /// Width in tiles.
    pub width: u16,
    /// Height in tiles.
    pub height: u16,
    /// Row-major tile seeds, `width * height` of them.
    pub tiles: Vec<TileSeed>,
    /// Placements, applied in order.
    pub objects: Vec<Placement>,
}

impl InitialMap {
    /// A map of plain grass with no placements.
    #[must_use]
    pub fn flat(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            tiles: vec![TileSeed::default(); usize::from(width) * usize::from(height)],
            objects: Vec::new(),
        }
    }

    /// Mutable seed of a tile.
    pub fn tile_mut(&mut self, pos: TilePos) -> Result<&mut TileSeed> {
        let index = self.dims()?.index(pos)?;
        self.tiles
            .get_mut(index)
            .ok_or_else(|| GridError::Config(format!("no seed for tile ({}, {})", pos.x, pos.y)))
    }

    /// Parse a map from RON.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        ron::from_str(source).map_err(|e| GridError::Config(e.to_string()))
    }

    fn dims(&self) -> Result<GridDims> {
        if self.width == 0 || self.height == 0 {
            return Err(GridError::Config(format!(
                "map must not be empty, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(GridDims::new(self.width, self.height))
    }
}

impl World {
    /// Build a world from loader output.
    ///
    /// # Errors
    ///
    /// [`GridError::Config`] if the map is empty or its tile array does not
    /// match its size. Individual bad placements are skipped, not errors.
    pub fn from_initial_map(map: &InitialMap, config: WorldConfig) -> Result<Self> {
        let dims = map.dims()?;
        if map.tiles.len() != dims.tile_count() {
            return Err(GridError::Config(format!(
                "map has {} tiles, expected {}",
                map.tiles.len(),
                dims.tile_count()
            )));
        }

        let mut world = Self::new(dims, config);
        for (pos, seed) in dims.positions().zip(&map.tiles) {
            world.terrain.set_landscape(pos, seed.landscape)?;
            world.terrain.set_elevation(pos, seed.elevation)?;
            world.terrain.set_resource(pos, seed.resource)?;
        }

        let mut skipped = 0usize;
        for placement in &map.objects {
            if let Err(error) = world.apply_placement(placement) {
                warn!(?placement, %error, "Skipping invalid placement");
                skipped += 1;
            }
        }

        world.rebuild_derived()?;
        info!(
            width = dims.width,
            height = dims.height,
            placed = map.objects.len() - skipped,
            skipped,
            "Initial map loaded"
        );
        Ok(world)
    }

    fn apply_placement(&mut self, placement: &Placement) -> Result<()> {
        match *placement {
            Placement::Territory {
                pos,
                radius,
                player,
            } => {
                self.occupy_area(&Shape::Circle { radius }, pos, player)?;
            }
            Placement::Tree { pos, stage } => {
                if !search_type::is_tree_plantable(self, pos)? {
                    return Err(GridError::invalid("tree on unplantable ground"));
                }
                self.add_object(pos, MapObject::Tree(stage))?;
            }
            Placement::Corn { pos, stage } => {
                self.add_object(pos, MapObject::Corn(stage))?;
            }
            Placement::Stone { pos, capacity } => {
                self.add_object(pos, MapObject::Stone { capacity })?;
            }
            Placement::Stack {
                pos,
                material,
                count,
            } => {
                let max = self.config.max_stack_size;
                let height = self.objects.stack_size(pos, material)?;
                let fits = u16::from(height) + u16::from(count) <= u16::from(max);
                if count > 0 && !(fits && self.objects.can_push(pos, material, max)?) {
                    return Err(GridError::invalid(format!(
                        "{count} {material:?} do not fit at ({}, {})",
                        pos.x, pos.y
                    )));
                }
                for _ in 0..count {
                    self.push_material(pos, material)?;
                }
            }
            Placement::Building {
                pos,
                id,
                building_type,
                player,
            } => {
                let mut claimed = Vec::new();
                if building_type.occupation_radius().is_some() {
                    for tile in building_type.footprint().tiles(pos) {
                        if self.dims.in_bounds(tile)
                            && self.partitions.player_at(tile)?.is_none()
                        {
                            self.change_owner(tile, Some(player))?;
                            claimed.push(tile);
                        }
                    }
                }
                if let Err(error) = self.place_building(pos, id, building_type, player) {
                    for tile in claimed {
                        self.change_owner(tile, None)?;
                    }
                    return Err(error);
                }
            }
            Placement::Unit { pos, unit } => {
                self.enter_unit(pos, unit)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::UnitId;
    use crate::layers::ObjectKind;
    use crate::unit_kind::UnitKind;

    #[test]
    fn test_terrain_then_objects() {
        let mut map = InitialMap::flat(16, 16);
        map.tile_mut(TilePos::new(2, 2)).unwrap().landscape = Landscape::Water;
        map.objects = vec![
            Placement::Tree {
                pos: TilePos::new(2, 2),
                stage: TreeStage::Adult,
            },
            Placement::Tree {
                pos: TilePos::new(10, 10),
                stage: TreeStage::Adult,
            },
            Placement::Stone {
                pos: TilePos::new(5, 5),
                capacity: 3,
            },
        ];
        let world = World::from_initial_map(&map, WorldConfig::default()).unwrap();
        assert!(!world
            .objects()
            .has_kind(TilePos::new(2, 2), ObjectKind::Tree)
            .unwrap());
        assert!(world
            .objects()
            .has_kind(TilePos::new(10, 10), ObjectKind::Tree)
            .unwrap());
        assert!(world.occupancy().is_blocked(TilePos::new(5, 5)).unwrap());
    }

    #[test]
    fn test_tower_claims_its_ground() {
        let mut map = InitialMap::flat(30, 30);
        map.objects = vec![
            Placement::Building {
                pos: TilePos::new(15, 15),
                id: BuildingId(1),
                building_type: BuildingType::Tower,
                player: PlayerId(1),
            },
            Placement::Unit {
                pos: TilePos::new(15, 17),
                unit: UnitInfo::new(UnitId(1), PlayerId(1), UnitKind::Bearer),
            },
            Placement::Stack {
                pos: TilePos::new(14, 18),
                material: MaterialType::Plank,
                count: 3,
            },
        ];
        let world = World::from_initial_map(&map, WorldConfig::default()).unwrap();
        assert_eq!(
            world.partitions().player_at(TilePos::new(23, 15)).unwrap(),
            Some(PlayerId(1))
        );
        assert!(world.is_border(TilePos::new(23, 15)).unwrap());
        assert_eq!(
            world
                .objects()
                .stack_size(TilePos::new(14, 18), MaterialType::Plank)
                .unwrap(),
            3
        );
        world.partitions().verify_connectivity().unwrap();
    }

    #[test]
    fn test_oversized_stack_is_skipped_whole() {
        let mut map = InitialMap::flat(12, 12);
        map.objects = vec![
            Placement::Territory {
                pos: TilePos::new(6, 6),
                radius: 3,
                player: PlayerId(0),
            },
            Placement::Stack {
                pos: TilePos::new(6, 6),
                material: MaterialType::Plank,
                count: 200,
            },
            Placement::Stone {
                pos: TilePos::new(2, 2),
                capacity: 1,
            },
            Placement::Stack {
                pos: TilePos::new(2, 2),
                material: MaterialType::Plank,
                count: 1,
            },
        ];
        let world = World::from_initial_map(&map, WorldConfig::default()).unwrap();
        assert_eq!(
            world
                .objects()
                .stack_size(TilePos::new(6, 6), MaterialType::Plank)
                .unwrap(),
            0
        );
        assert_eq!(
            world
                .objects()
                .stack_size(TilePos::new(2, 2), MaterialType::Plank)
                .unwrap(),
            0
        );
        let offered = world
            .partition_handle(TilePos::new(6, 6))
            .unwrap()
            .with_board(|b| b.market.offered(TilePos::new(6, 6), MaterialType::Plank))
            .unwrap();
        assert_eq!(offered, 0);
    }

    #[test]
    fn test_skipped_tower_leaves_no_territory() {
        let mut map = InitialMap::flat(30, 30);
        map.objects = vec![
            Placement::Stone {
                pos: TilePos::new(15, 15),
                capacity: 2,
            },
            Placement::Building {
                pos: TilePos::new(15, 15),
                id: BuildingId(1),
                building_type: BuildingType::Tower,
                player: PlayerId(1),
            },
        ];
        let world = World::from_initial_map(&map, WorldConfig::default()).unwrap();
        let owned = world
            .dims()
            .positions()
            .filter(|&p| world.partitions().player_at(p).unwrap().is_some())
            .count();
        assert_eq!(owned, 0);
        assert_eq!(world.partitions().partitions().count(), 0);
        assert!(world.occupancy().is_blocked(TilePos::new(15, 15)).unwrap());
    }

    #[test]
    fn test_size_mismatch_is_config_error() {
        let mut map = InitialMap::flat(4, 4);
        map.tiles.pop();
        assert!(matches!(
            World::from_initial_map(&map, WorldConfig::default()),
            Err(GridError::Config(_))
        ));
        assert!(World::from_initial_map(&InitialMap::flat(0, 4), WorldConfig::default()).is_err());
    }

    #[test]
    fn test_ron_map() {
        let map = InitialMap::from_ron_str(
            "(width: 2, height: 1, tiles: [(landscape: Grass, elevation: 0, resource: None), \
             (landscape: Mountain, elevation: 3, resource: Some((kind: Coal, amount: 9)))], \
             objects: [])",
        )
        .unwrap();
        let world = World::from_initial_map(&map, WorldConfig::default()).unwrap();
        assert_eq!(
            world.terrain().landscape(TilePos::new(1, 0)).unwrap(),
            Landscape::Mountain
        );
        assert_eq!(world.terrain().elevation(TilePos::new(1, 0)).unwrap(), 3);
    }
}
