//! Brute-force reference implementations.
//!
//! Slow and obviously correct: full-grid relaxation instead of a priority
//! queue, full scans instead of incremental updates. Property tests compare
//! the engine's answers against these.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use hexworld_core::coords::{GridDims, TilePos};
use hexworld_core::math::Fixed;
use hexworld_core::partition::{PartitionEngine, PartitionId};
use hexworld_core::pathfinding::{Path, PathMap, Requester};
use hexworld_core::prelude::PlayerId;

/// Cheapest cost from `start` to every tile, passing only unblocked tiles.
///
/// The start tile itself may be blocked. Unreached tiles are `None`.
#[must_use]
pub fn reference_costs<M: PathMap>(map: &M, requester: &Requester, start: TilePos) -> Vec<Option<Fixed>> {
    let dims = map.dims();
    let mut best: Vec<Option<Fixed>> = vec![None; dims.tile_count()];
    let Ok(start_index) = dims.index(start) else {
        return best;
    };
    best[start_index] = Some(Fixed::ZERO);

    // Bellman-Ford style: relax every edge until nothing improves.
    let mut changed = true;
    while changed {
        changed = false;
        for pos in dims.positions() {
            let Some(here) = best[index(dims, pos)] else {
                continue;
            };
            if pos != start && map.is_blocked(requester, pos) {
                continue;
            }
            for next in dims.neighbours(pos) {
                if map.is_blocked(requester, next) {
                    continue;
                }
                let cost = here + map.cost(pos, next);
                let slot = &mut best[index(dims, next)];
                if slot.map_or(true, |c| cost < c) {
                    *slot = Some(cost);
                    changed = true;
                }
            }
        }
    }
    best
}

/// Reference single-target path cost.
#[must_use]
pub fn reference_path_cost<M: PathMap>(
    map: &M,
    requester: &Requester,
    start: TilePos,
    goal: TilePos,
) -> Option<Fixed> {
    if start == goal {
        return Some(Fixed::ZERO);
    }
    let dims = map.dims();
    let goal_index = dims.index(goal).ok()?;
    reference_costs(map, requester, start)[goal_index]
}

/// Reference multi-target cost. A blocked target may end a path but is
/// never passed through.
#[must_use]
pub fn reference_nearest_cost<M: PathMap>(
    map: &M,
    requester: &Requester,
    start: TilePos,
    targets: &[TilePos],
) -> Option<Fixed> {
    let dims = map.dims();
    let costs = reference_costs(map, requester, start);
    targets
        .iter()
        .filter_map(|&target| {
            if target == start {
                return Some(Fixed::ZERO);
            }
            if !map.is_blocked(requester, target) {
                return costs[dims.index(target).ok()?];
            }
            dims.neighbours(target)
                .filter(|&n| n == start || !map.is_blocked(requester, n))
                .filter_map(|n| costs[index(dims, n)].map(|c| c + map.cost(n, target)))
                .min()
        })
        .min()
}

/// Check that `path` is a connected walk from `start` whose stated cost
/// matches its steps, and that no intermediate tile is blocked.
///
/// # Errors
///
/// A description of the first problem found.
pub fn check_path<M: PathMap>(
    map: &M,
    requester: &Requester,
    start: TilePos,
    path: &Path,
) -> Result<(), String> {
    let Some(&first) = path.tiles.first() else {
        return Err("empty path".to_string());
    };
    if first != start {
        return Err(format!("path starts at {first:?}, expected {start:?}"));
    }
    let mut cost = Fixed::ZERO;
    for pair in path.tiles.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        if from.hex_distance(to) != 1 {
            return Err(format!("{from:?} -> {to:?} is not a single step"));
        }
        cost += map.cost(from, to);
    }
    let inner = path.tiles.len().saturating_sub(1);
    if let Some(blocked) = path.tiles[1..inner.max(1)]
        .iter()
        .find(|&&t| map.is_blocked(requester, t))
    {
        return Err(format!("path passes through blocked {blocked:?}"));
    }
    if cost != path.cost {
        return Err(format!("path states cost {}, steps sum to {cost}", path.cost));
    }
    Ok(())
}

/// Border flags recomputed from scratch.
#[must_use]
pub fn reference_borders(partitions: &PartitionEngine) -> Vec<bool> {
    let dims = partitions.dims();
    dims.positions()
        .map(|pos| {
            let mine = owner(partitions, pos);
            mine.is_some() && dims.neighbours(pos).any(|n| owner(partitions, n) != mine)
        })
        .collect()
}

/// Check that partitions are exactly the maximal connected regions of
/// each player: adjacent tiles of one player share an id and each id is
/// one connected region.
///
/// # Errors
///
/// A description of the first violation.
pub fn check_partitions(partitions: &PartitionEngine) -> Result<(), String> {
    let dims = partitions.dims();
    for pos in dims.positions() {
        let Some(player) = owner(partitions, pos) else {
            continue;
        };
        let id = partition(partitions, pos);
        for n in dims.neighbours(pos) {
            if owner(partitions, n) == Some(player) && partition(partitions, n) != id {
                return Err(format!(
                    "{pos:?} and {n:?} belong to player {} but sit in {id:?} and {:?}",
                    player.0,
                    partition(partitions, n)
                ));
            }
        }
    }

    let mut regions: BTreeMap<PartitionId, usize> = BTreeMap::new();
    let mut seen = BTreeSet::new();
    for pos in dims.positions() {
        let id = partition(partitions, pos);
        if id.is_neutral() || seen.contains(&pos) {
            continue;
        }
        flood(dims, partitions, pos, id, &mut seen);
        let count = regions.entry(id).or_default();
        *count += 1;
        if *count > 1 {
            return Err(format!("{id:?} is split into disconnected regions"));
        }
    }
    partitions.verify_connectivity().map_err(|e| e.to_string())
}

fn flood(
    dims: GridDims,
    partitions: &PartitionEngine,
    start: TilePos,
    id: PartitionId,
    seen: &mut BTreeSet<TilePos>,
) {
    let mut queue = VecDeque::from([start]);
    seen.insert(start);
    while let Some(pos) = queue.pop_front() {
        for n in dims.neighbours(pos) {
            if partition(partitions, n) == id && seen.insert(n) {
                queue.push_back(n);
            }
        }
    }
}

fn index(dims: GridDims, pos: TilePos) -> usize {
    dims.index(pos).unwrap_or_default()
}

fn owner(partitions: &PartitionEngine, pos: TilePos) -> Option<PlayerId> {
    partitions.player_at(pos).ok().flatten()
}

fn partition(partitions: &PartitionEngine, pos: TilePos) -> PartitionId {
    partitions.partition_at(pos).unwrap_or(PartitionId::NEUTRAL)
}
