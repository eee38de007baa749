//! Territory reconciliation around changed tiles.
//!
//! Two things are detected near dirty tiles:
//!
//! - Landmark pockets: small neutral regions of blocked tiles (lakes,
//!   rocks, snow) completely enclosed by one player's territory. They are
//!   handed to that player so territory has no holes.
//! - Buildings whose owner no longer owns every tile of their protected
//!   footprint. They are reported for destruction.
//!
//! The corrector only reports; the world applies the actions.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Dirty, DirtyQueue, LayerRefs};
use crate::buildings::BuildingType;
use crate::components::{BuildingId, PlayerId};
use crate::coords::{hex_circle, GridDims, TilePos};
use crate::layers::{MapObject, ObjectKind};

/// A correction for the world to apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LandmarkAction {
    /// Give an enclosed neutral pocket to the surrounding player.
    AdoptPocket {
        /// Enclosing player.
        player: PlayerId,
        /// Pocket tiles in discovery order.
        tiles: Vec<TilePos>,
    },
    /// A building stands on ground its owner lost.
    DestroyBuilding {
        /// Anchor tile.
        pos: TilePos,
        /// Building id.
        id: BuildingId,
        /// Type, for freeing its footprint.
        building_type: BuildingType,
        /// Owner recorded on the building.
        owner: PlayerId,
    },
}

fn max_footprint_reach() -> u32 {
    BuildingType::ALL
        .iter()
        .map(|t| t.footprint_reach().unsigned_abs())
        .max()
        .unwrap_or(0)
}

/// Landmark corrector.
#[derive(Debug)]
pub struct LandmarkCorrector {
    dims: GridDims,
    max_pocket_size: usize,
    queue: DirtyQueue,
}

impl LandmarkCorrector {
    /// Create a corrector adopting pockets of at most `max_pocket_size` tiles.
    #[must_use]
    pub fn new(dims: GridDims, max_pocket_size: usize, queue_capacity: usize) -> Self {
        Self {
            dims,
            max_pocket_size,
            queue: DirtyQueue::new("landmarks", queue_capacity),
        }
    }

    /// Dirty-tile input.
    #[must_use]
    pub const fn queue(&self) -> &DirtyQueue {
        &self.queue
    }

    /// Process pending notifications and report the needed corrections.
    pub fn run(&self, layers: &LayerRefs<'_>) -> Vec<LandmarkAction> {
        let (candidates, anchors): (Vec<TilePos>, BTreeSet<TilePos>) = match self.queue.drain() {
            Dirty::Rescan => (
                self.dims.positions().collect(),
                self.dims.positions().collect(),
            ),
            Dirty::Tiles(tiles) => {
                let candidates: Vec<TilePos> = tiles
                    .into_iter()
                    .filter(|&p| self.dims.in_bounds(p))
                    .collect();
                let anchors = candidates
                    .iter()
                    .flat_map(|&p| hex_circle(p, max_footprint_reach()))
                    .filter(|&p| self.dims.in_bounds(p))
                    .collect();
                (candidates, anchors)
            }
        };
        if candidates.is_empty() {
            return Vec::new();
        }

        let mut actions = Vec::new();
        for anchor in anchors {
            if let Some(action) = self.check_building(layers, anchor) {
                actions.push(action);
            }
        }

        let mut examined = HashSet::new();
        let mut seeds = BTreeSet::new();
        for &pos in &candidates {
            seeds.insert(pos);
            seeds.extend(self.dims.neighbours(pos));
        }
        for seed in seeds {
            if let Some(action) = self.check_pocket(layers, seed, &mut examined) {
                actions.push(action);
            }
        }

        if !actions.is_empty() {
            debug!(actions = actions.len(), "Landmark pass");
        }
        actions
    }

    fn check_building(&self, layers: &LayerRefs<'_>, pos: TilePos) -> Option<LandmarkAction> {
        let placed = layers.objects.get(pos, ObjectKind::Building).ok()??;
        let MapObject::Building {
            id,
            building_type,
            owner,
        } = placed.object
        else {
            return None;
        };
        let lost = building_type.protected_tiles().into_iter().any(|rel| {
            let tile = pos.offset(rel);
            self.dims.in_bounds(tile)
                && layers.partitions.player_at(tile).ok().flatten() != Some(owner)
        });
        lost.then_some(LandmarkAction::DestroyBuilding {
            pos,
            id,
            building_type,
            owner,
        })
    }

    fn is_pocket_tile(&self, layers: &LayerRefs<'_>, pos: TilePos) -> bool {
        let index = self.dims.index_unchecked(pos);
        layers.partitions.player_at_index(index).is_none()
            && (layers.occupancy.is_blocked(pos).unwrap_or(false)
                || layers
                    .terrain
                    .landscape(pos)
                    .is_ok_and(|l| l.is_blocking()))
    }

    fn check_pocket(
        &self,
        layers: &LayerRefs<'_>,
        seed: TilePos,
        examined: &mut HashSet<TilePos>,
    ) -> Option<LandmarkAction> {
        if examined.contains(&seed) || !self.is_pocket_tile(layers, seed) {
            return None;
        }

        let mut region = vec![seed];
        examined.insert(seed);
        let mut enclosing: Option<PlayerId> = None;
        let mut valid = true;
        let mut head = 0;
        while head < region.len() {
            let pos = region[head];
            head += 1;
            for n in pos.neighbours() {
                if !self.dims.in_bounds(n) {
                    // Touches the map edge: not enclosed.
                    valid = false;
                    continue;
                }
                if self.is_pocket_tile(layers, n) {
                    if examined.insert(n) {
                        region.push(n);
                    }
                    continue;
                }
                match (layers.partitions.player_at_index(self.dims.index_unchecked(n)), enclosing) {
                    (None, _) => valid = false,
                    (Some(p), None) => enclosing = Some(p),
                    (Some(p), Some(e)) if p != e => valid = false,
                    _ => {}
                }
            }
            if region.len() > self.max_pocket_size {
                valid = false;
            }
            if !valid {
                // Keep flooding so the rest of the region is not re-examined,
                // but stop early on huge regions.
                if region.len() > self.max_pocket_size.saturating_mul(4) {
                    break;
                }
            }
        }

        let player = enclosing.filter(|_| valid)?;
        debug!(player = player.0, tiles = region.len(), "Adopting landmark pocket");
        Some(LandmarkAction::AdoptPocket {
            player,
            tiles: region,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildings::BuildingType;
    use crate::coords::Shape;
    use crate::correctors::fixture::Layers;
    use crate::layers::Landscape;

    #[test]
    fn test_enclosed_lake_is_adopted() {
        let mut f = Layers::new(GridDims::new(16, 16));
        let center = TilePos::new(8, 8);
        f.terrain.set_landscape(center, Landscape::Water).unwrap();
        f.terrain
            .set_landscape(TilePos::new(9, 8), Landscape::Water)
            .unwrap();
        for p in hex_circle(center, 4) {
            if f.terrain.landscape(p).unwrap() != Landscape::Water {
                f.partitions.change_owner(p, Some(PlayerId(2))).unwrap();
            }
        }

        let corrector = LandmarkCorrector::new(GridDims::new(16, 16), 64, 256);
        corrector.queue().notify(TilePos::new(7, 8));
        let actions = corrector.run(&f.refs());
        assert_eq!(
            actions,
            vec![LandmarkAction::AdoptPocket {
                player: PlayerId(2),
                tiles: vec![center, TilePos::new(9, 8)],
            }]
        );
    }

    #[test]
    fn test_pocket_on_border_of_two_players_is_left_alone() {
        let mut f = Layers::new(GridDims::new(16, 16));
        let lake = TilePos::new(8, 8);
        f.terrain.set_landscape(lake, Landscape::Water).unwrap();
        for n in lake.neighbours() {
            let player = if n.x < lake.x { PlayerId(0) } else { PlayerId(1) };
            f.partitions.change_owner(n, Some(player)).unwrap();
        }
        let corrector = LandmarkCorrector::new(GridDims::new(16, 16), 64, 256);
        corrector.queue().request_rescan();
        assert!(corrector.run(&f.refs()).is_empty());
    }

    #[test]
    fn test_oversized_pocket_is_left_alone() {
        let mut f = Layers::new(GridDims::new(16, 16));
        let center = TilePos::new(8, 8);
        for p in hex_circle(center, 2) {
            f.terrain.set_landscape(p, Landscape::Snow).unwrap();
        }
        f.partitions
            .occupy_area(&Shape::Circle { radius: 4 }, center, PlayerId(0))
            .unwrap();
        for p in hex_circle(center, 2) {
            f.partitions.change_owner(p, None).unwrap();
        }
        let corrector = LandmarkCorrector::new(GridDims::new(16, 16), 5, 256);
        corrector.queue().request_rescan();
        assert!(corrector.run(&f.refs()).is_empty());
    }

    #[test]
    fn test_building_on_lost_ground_is_reported() {
        let mut f = Layers::new(GridDims::new(16, 16));
        let anchor = TilePos::new(4, 4);
        f.partitions.change_owner(anchor, Some(PlayerId(1))).unwrap();
        f.objects
            .add(
                anchor,
                MapObject::Building {
                    id: BuildingId(7),
                    building_type: BuildingType::Lumberjack,
                    owner: PlayerId(0),
                },
            )
            .unwrap();
        let corrector = LandmarkCorrector::new(GridDims::new(16, 16), 64, 256);
        corrector.queue().notify(anchor);
        let actions = corrector.run(&f.refs());
        assert!(matches!(
            actions.as_slice(),
            [LandmarkAction::DestroyBuilding { id: BuildingId(7), .. }]
        ));
    }

    #[test]
    fn test_lost_footprint_tile_is_reported() {
        let mut f = Layers::new(GridDims::new(16, 16));
        let anchor = TilePos::new(4, 4);
        for p in hex_circle(anchor, 2) {
            f.partitions.change_owner(p, Some(PlayerId(0))).unwrap();
        }
        f.objects
            .add(
                anchor,
                MapObject::Building {
                    id: BuildingId(3),
                    building_type: BuildingType::Lumberjack,
                    owner: PlayerId(0),
                },
            )
            .unwrap();
        let corrector = LandmarkCorrector::new(GridDims::new(16, 16), 64, 256);
        corrector.queue().notify(TilePos::new(5, 4));
        assert!(corrector.run(&f.refs()).is_empty());

        let edge = TilePos::new(5, 4);
        f.partitions.change_owner(edge, Some(PlayerId(1))).unwrap();
        corrector.queue().notify(edge);
        let actions = corrector.run(&f.refs());
        assert!(matches!(
            actions.as_slice(),
            [LandmarkAction::DestroyBuilding { id: BuildingId(3), pos, .. }] if *pos == anchor
        ));
    }
}
