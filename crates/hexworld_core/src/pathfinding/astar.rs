//! Single-target A*.
//!
//! With the default constants the heuristic is consistent, so the first
//! time the goal is popped its cost is optimal. Stale heap entries are
//! skipped lazily instead of being decreased in place.

use std::collections::BinaryHeap;

use tracing::trace;

use super::{reconstruct, Node, Path, PathMap, Requester, Visited};
use crate::coords::TilePos;
use crate::error::Result;
use crate::math::Fixed;

/// Cheapest path from `start` to `goal`.
///
/// The start tile may itself be blocked (a unit standing in a doorway);
/// a blocked goal is unreachable.
///
/// # Errors
///
/// [`GridError::OutOfBounds`](crate::error::GridError::OutOfBounds) if
/// either endpoint is outside the grid.
pub fn find_path<M: PathMap + ?Sized>(
    map: &M,
    requester: &Requester,
    start: TilePos,
    goal: TilePos,
) -> Result<Option<Path>> {
    search(map, requester, start, goal, None)
}

/// [`find_path`] giving up after expanding `node_limit` tiles.
pub fn find_path_with_limit<M: PathMap + ?Sized>(
    map: &M,
    requester: &Requester,
    start: TilePos,
    goal: TilePos,
    node_limit: usize,
) -> Result<Option<Path>> {
    search(map, requester, start, goal, Some(node_limit))
}

fn search<M: PathMap + ?Sized>(
    map: &M,
    requester: &Requester,
    start: TilePos,
    goal: TilePos,
    node_limit: Option<usize>,
) -> Result<Option<Path>> {
    let dims = map.dims();
    let start_index = dims.index(start)?;
    let goal_index = dims.index(goal)?;

    if start == goal {
        return Ok(Some(Path {
            tiles: vec![start],
            cost: Fixed::ZERO,
        }));
    }
    if map.is_blocked(requester, goal) {
        trace!(x = goal.x, y = goal.y, "A* goal is blocked");
        return Ok(None);
    }

    let mut open = BinaryHeap::new();
    let mut visited = Visited::new();
    let mut seq = 0u64;
    let mut expanded = 0usize;

    visited.insert(start_index, (Fixed::ZERO, None));
    open.push(Node {
        priority: map.heuristic(start, goal),
        cost: Fixed::ZERO,
        seq,
        index: start_index,
    });

    while let Some(current) = open.pop() {
        if visited
            .get(&current.index)
            .is_some_and(|&(best, _)| current.cost > best)
        {
            continue;
        }
        if current.index == goal_index {
            let path = reconstruct(dims, &visited, goal_index);
            trace!(expanded, steps = path.steps(), cost = %path.cost, "A* found path");
            return Ok(Some(path));
        }

        expanded += 1;
        if node_limit.is_some_and(|limit| expanded > limit) {
            trace!(expanded, "A* node limit reached");
            return Ok(None);
        }

        let pos = dims.pos_of(current.index);
        for next in dims.neighbours(pos) {
            if map.is_blocked(requester, next) {
                continue;
            }
            let next_index = dims.index_unchecked(next);
            let cost = current.cost + map.cost(pos, next);
            if visited
                .get(&next_index)
                .is_some_and(|&(best, _)| best <= cost)
            {
                continue;
            }
            visited.insert(next_index, (cost, Some(current.index)));
            seq += 1;
            open.push(Node {
                priority: cost + map.heuristic(next, goal),
                cost,
                seq,
                index: next_index,
            });
        }
    }

    trace!(expanded, "A* exhausted");
    Ok(None)
}
