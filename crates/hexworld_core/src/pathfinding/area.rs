//! Nearest-match search inside a hex area.
//!
//! Scans rings of growing radius around a work center and returns the
//! first tile fitting a [`SearchType`]. Reachability is not checked; the
//! caller paths to the result afterwards.

use tracing::trace;

use super::{PathMap, Requester, SearchType};
use crate::coords::{hex_ring, TilePos};
use crate::error::Result;

/// Nearest tile within `radius` of `center` fitting `search`.
///
/// Equally near tiles are tried in row-major order.
///
/// # Errors
///
/// [`GridError::OutOfBounds`](crate::error::GridError::OutOfBounds) if
/// `center` is outside the grid.
pub fn find_in_area<M: PathMap + ?Sized>(
    map: &M,
    requester: &Requester,
    center: TilePos,
    radius: u32,
    search: SearchType,
) -> Result<Option<TilePos>> {
    let dims = map.dims();
    dims.check(center)?;
    for r in 0..=radius {
        let found = hex_ring(center, r)
            .into_iter()
            .filter(|&p| dims.in_bounds(p))
            .find(|&p| map.fits_search_type(requester, p, search));
        if found.is_some() {
            trace!(?search, radius = r, "Area search matched");
            return Ok(found);
        }
    }
    trace!(?search, radius, "Area search exhausted");
    Ok(None)
}

/// Every tile within `radius` of `center` fitting `search`, nearest first.
pub fn all_in_area<M: PathMap + ?Sized>(
    map: &M,
    requester: &Requester,
    center: TilePos,
    radius: u32,
    search: SearchType,
) -> Result<Vec<TilePos>> {
    let dims = map.dims();
    dims.check(center)?;
    Ok((0..=radius)
        .flat_map(|r| hex_ring(center, r))
        .filter(|&p| dims.in_bounds(p) && map.fits_search_type(requester, p, search))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::PlayerId;
    use crate::pathfinding::test_map::GridMap;

    fn who() -> Requester {
        Requester::free(PlayerId(0))
    }

    #[test]
    fn test_nearest_ring_wins() {
        let mut map = GridMap::open(10, 10);
        map.target(9, 9);
        map.target(6, 4);
        let found = find_in_area(&map, &who(), TilePos::new(4, 4), 6, SearchType::River).unwrap();
        assert_eq!(found, Some(TilePos::new(6, 4)));
    }

    #[test]
    fn test_blocked_tiles_still_match() {
        let mut map = GridMap::open(5, 5);
        map.block(2, 3);
        map.target(2, 3);
        let found =
            find_in_area(&map, &who(), TilePos::new(2, 2), 1, SearchType::CuttableStone).unwrap();
        assert_eq!(found, Some(TilePos::new(2, 3)));
    }

    #[test]
    fn test_exhausted_area() {
        let map = GridMap::open(5, 5);
        assert_eq!(
            find_in_area(&map, &who(), TilePos::new(0, 0), 10, SearchType::Enemy).unwrap(),
            None
        );
    }

    #[test]
    fn test_all_in_area_is_nearest_first() {
        let mut map = GridMap::open(9, 9);
        map.target(8, 4);
        map.target(4, 5);
        let all = all_in_area(&map, &who(), TilePos::new(4, 4), 4, SearchType::Fishable).unwrap();
        assert_eq!(all, vec![TilePos::new(4, 5), TilePos::new(8, 4)]);
    }
}
