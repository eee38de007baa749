//! Path searches over the hex grid.
//!
//! Three algorithms share one blocking/cost oracle, the [`PathMap`] trait:
//!
//! - [`astar::find_path`]: single-target shortest path.
//! - [`dijkstra::find_nearest_target`] / [`dijkstra::find_nearest_matching`]:
//!   cheapest of several targets.
//! - [`area::find_in_area`]: nearest tile fitting a [`SearchType`] around a
//!   work center, without pathing.
//!
//! All costs are fixed-point and neighbours are expanded in
//! [`Direction::ALL`](crate::coords::Direction::ALL) order, so results are
//! identical on every client. Searches never error for "nothing found";
//! they return `Ok(None)`. Only out-of-bounds endpoints are errors.

pub mod area;
pub mod astar;
pub mod dijkstra;
pub(crate) mod search_type;

pub use search_type::SearchType;

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::components::PlayerId;
use crate::config::PathfindingConfig;
use crate::coords::{GridDims, TilePos};
use crate::math::{fixed_serde, Fixed};
use crate::unit_kind::UnitInfo;
use crate::world::World;

/// Who is asking: decides foreign-ground blocking and player predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    /// Requesting player.
    pub player: PlayerId,
    /// Only tiles owned by `player` are walkable.
    pub needs_players_ground: bool,
}

impl Requester {
    /// A requester allowed anywhere.
    #[must_use]
    pub const fn free(player: PlayerId) -> Self {
        Self {
            player,
            needs_players_ground: false,
        }
    }

    /// A requester restricted to its own territory.
    #[must_use]
    pub const fn grounded(player: PlayerId) -> Self {
        Self {
            player,
            needs_players_ground: true,
        }
    }
}

impl From<&UnitInfo> for Requester {
    fn from(unit: &UnitInfo) -> Self {
        Self {
            player: unit.player,
            needs_players_ground: unit.needs_players_ground,
        }
    }
}

/// Blocking and cost oracle shared by all searches.
///
/// Positions passed in are always in bounds; implementations may treat
/// anything else as blocked.
pub trait PathMap {
    /// Grid dimensions.
    fn dims(&self) -> GridDims;

    /// Cost constants.
    fn costs(&self) -> &PathfindingConfig;

    /// Whether `requester` may not enter `pos`.
    fn is_blocked(&self, requester: &Requester, pos: TilePos) -> bool;

    /// Whether `pos` is protected (slows movement off it).
    fn is_protected(&self, pos: TilePos) -> bool;

    /// Whether `pos` satisfies `search` for `requester`.
    fn fits_search_type(&self, requester: &Requester, pos: TilePos, search: SearchType) -> bool;

    /// Cost of one step from `from` to its neighbour `to`.
    fn cost(&self, from: TilePos, _to: TilePos) -> Fixed {
        let costs = self.costs();
        if self.is_protected(from) {
            costs.base_cost * costs.protected_penalty
        } else {
            costs.base_cost
        }
    }

    /// Lower bound on the cost from `from` to `to`.
    fn heuristic(&self, from: TilePos, to: TilePos) -> Fixed {
        let manhattan = (from.x - to.x).unsigned_abs() + (from.y - to.y).unsigned_abs();
        Fixed::from_num(manhattan) * self.costs().heuristic_weight
    }

    /// Like [`fits_search_type`](Self::fits_search_type) but from a raw tag.
    ///
    /// Unknown tags are logged and match nothing.
    fn fits_search_tag(&self, requester: &Requester, pos: TilePos, tag: u8) -> bool {
        match SearchType::from_tag(tag) {
            Some(search) => self.fits_search_type(requester, pos, search),
            None => {
                tracing::warn!(tag, x = pos.x, y = pos.y, "Unknown search type tag");
                false
            }
        }
    }
}

/// A found route, start first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    /// Tiles from start to goal, both included.
    pub tiles: Vec<TilePos>,
    /// Total step cost.
    #[serde(with = "fixed_serde")]
    pub cost: Fixed,
}

impl Path {
    /// Number of steps.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.tiles.len().saturating_sub(1)
    }

    /// Last tile.
    #[must_use]
    pub fn goal(&self) -> Option<TilePos> {
        self.tiles.last().copied()
    }
}

/// [`PathMap`] over the live world layers.
#[derive(Debug, Clone, Copy)]
pub struct WorldPathMap<'a> {
    world: &'a World,
}

impl<'a> WorldPathMap<'a> {
    /// Wrap a world.
    #[must_use]
    pub const fn new(world: &'a World) -> Self {
        Self { world }
    }
}

impl PathMap for WorldPathMap<'_> {
    fn dims(&self) -> GridDims {
        self.world.dims()
    }

    fn costs(&self) -> &PathfindingConfig {
        &self.world.config().pathfinding
    }

    fn is_blocked(&self, requester: &Requester, pos: TilePos) -> bool {
        search_type::is_blocked(self.world, requester, pos).unwrap_or(true)
    }

    fn is_protected(&self, pos: TilePos) -> bool {
        self.world.occupancy().is_protected(pos).unwrap_or(false)
    }

    fn fits_search_type(&self, requester: &Requester, pos: TilePos, search: SearchType) -> bool {
        search.fits(self.world, requester, pos).unwrap_or(false)
    }
}

// ============================================================================
// Shared frontier
// ============================================================================

/// Open-set entry. Lowest `priority` first; ties go to the earlier push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Node {
    priority: Fixed,
    cost: Fixed,
    seq: u64,
    index: usize,
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse for min-heap behaviour.
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Best known cost and predecessor per reached tile.
type Visited = HashMap<usize, (Fixed, Option<usize>)>;

fn reconstruct(dims: GridDims, visited: &Visited, goal: usize) -> Path {
    let cost = visited.get(&goal).map_or(Fixed::ZERO, |&(c, _)| c);
    let mut tiles = vec![dims.pos_of(goal)];
    let mut current = goal;
    while let Some(&(_, Some(prev))) = visited.get(&current) {
        tiles.push(dims.pos_of(prev));
        current = prev;
    }
    tiles.reverse();
    Path { tiles, cost }
}

#[cfg(test)]
pub(crate) mod test_map {
    //! Minimal in-memory [`PathMap`] for algorithm tests.

    use super::*;

    pub struct GridMap {
        pub dims: GridDims,
        pub blocked: Vec<bool>,
        pub protected: Vec<bool>,
        pub targets: Vec<bool>,
        pub costs: PathfindingConfig,
    }

    impl GridMap {
        pub fn open(width: u16, height: u16) -> Self {
            let dims = GridDims::new(width, height);
            let n = dims.tile_count();
            Self {
                dims,
                blocked: vec![false; n],
                protected: vec![false; n],
                targets: vec![false; n],
                costs: PathfindingConfig::default(),
            }
        }

        pub fn block(&mut self, x: i32, y: i32) {
            let i = self.dims.index_unchecked(TilePos::new(x, y));
            self.blocked[i] = true;
        }

        pub fn protect(&mut self, x: i32, y: i32) {
            let i = self.dims.index_unchecked(TilePos::new(x, y));
            self.protected[i] = true;
        }

        pub fn target(&mut self, x: i32, y: i32) {
            let i = self.dims.index_unchecked(TilePos::new(x, y));
            self.targets[i] = true;
        }
    }

    impl PathMap for GridMap {
        fn dims(&self) -> GridDims {
            self.dims
        }

        fn costs(&self) -> &PathfindingConfig {
            &self.costs
        }

        fn is_blocked(&self, _requester: &Requester, pos: TilePos) -> bool {
            self.dims
                .index(pos)
                .map_or(true, |i| self.blocked[i])
        }

        fn is_protected(&self, pos: TilePos) -> bool {
            self.dims.index(pos).is_ok_and(|i| self.protected[i])
        }

        fn fits_search_type(&self, _requester: &Requester, pos: TilePos, _search: SearchType) -> bool {
            self.dims.index(pos).is_ok_and(|i| self.targets[i])
        }
    }
}
