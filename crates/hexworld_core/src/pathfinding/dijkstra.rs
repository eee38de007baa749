//! Multi-target Dijkstra.
//!
//! Expands by path cost from one start until the first target tile is
//! popped; that target is the cheapest one. A target may be blocked
//! itself (a stone to cut, a building door) and then ends the path, but
//! blocked tiles are never passed through.

use std::collections::{BTreeSet, BinaryHeap};

use tracing::trace;

use super::{reconstruct, Node, Path, PathMap, Requester, SearchType, Visited};
use crate::coords::TilePos;
use crate::error::Result;
use crate::math::Fixed;

/// Cheapest path from `start` to any tile of `targets`.
///
/// # Errors
///
/// [`GridError::OutOfBounds`](crate::error::GridError::OutOfBounds) if
/// `start` or any target is outside the grid.
pub fn find_nearest_target<M: PathMap + ?Sized>(
    map: &M,
    requester: &Requester,
    start: TilePos,
    targets: &[TilePos],
) -> Result<Option<Path>> {
    let dims = map.dims();
    let targets = targets
        .iter()
        .map(|&t| dims.index(t))
        .collect::<Result<BTreeSet<usize>>>()?;
    if targets.is_empty() {
        return Ok(None);
    }
    expand(map, requester, start, None, |_, i| targets.contains(&i))
}

/// Cheapest path from `start` to a tile fitting `search`, looking at most
/// `radius` hex steps away.
pub fn find_nearest_matching<M: PathMap + ?Sized>(
    map: &M,
    requester: &Requester,
    start: TilePos,
    search: SearchType,
    radius: u32,
) -> Result<Option<Path>> {
    expand(map, requester, start, Some(radius), |pos, _| {
        map.fits_search_type(requester, pos, search)
    })
}

fn expand<M: PathMap + ?Sized>(
    map: &M,
    requester: &Requester,
    start: TilePos,
    radius: Option<u32>,
    is_target: impl Fn(TilePos, usize) -> bool,
) -> Result<Option<Path>> {
    let dims = map.dims();
    let start_index = dims.index(start)?;

    let mut open = BinaryHeap::new();
    let mut visited = Visited::new();
    let mut seq = 0u64;
    let mut expanded = 0usize;

    visited.insert(start_index, (Fixed::ZERO, None));
    open.push(Node {
        priority: Fixed::ZERO,
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
        let pos = dims.pos_of(current.index);
        if is_target(pos, current.index) {
            let path = reconstruct(dims, &visited, current.index);
            trace!(expanded, steps = path.steps(), cost = %path.cost, "Dijkstra reached target");
            return Ok(Some(path));
        }
        if current.index != start_index && map.is_blocked(requester, pos) {
            // Reached only as a candidate target; do not pass through.
            continue;
        }

        expanded += 1;
        for next in dims.neighbours(pos) {
            if radius.is_some_and(|r| start.hex_distance(next) > r) {
                continue;
            }
            let next_index = dims.index_unchecked(next);
            if map.is_blocked(requester, next) && !is_target(next, next_index) {
                continue;
            }
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
                priority: cost,
                cost,
                seq,
                index: next_index,
            });
        }
    }

    trace!(expanded, "Dijkstra exhausted");
    Ok(None)
}
