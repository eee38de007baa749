//! Test fixtures and helpers.
//!
//! Pre-built worlds and unit records for consistent testing.

use fixed::types::I32F32;
use hexworld_core::prelude::*;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: path costs never use floats. This is only for convenient test
/// setup with binary fractions such as 3.5.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// A neutral grass world with default configuration.
#[must_use]
pub fn flat_world(width: u16, height: u16) -> World {
    World::new(GridDims::new(width, height), WorldConfig::default())
}

/// Give every tile of `world` to `player`.
///
/// # Panics
///
/// Panics if an ownership change fails, which cannot happen for in-bounds
/// tiles.
pub fn claim_all(world: &mut World, player: PlayerId) {
    for pos in world.dims().positions() {
        world
            .change_owner(pos, Some(player))
            .expect("in-bounds ownership change");
    }
}

/// A flat world owned entirely by `player`.
#[must_use]
pub fn owned_world(width: u16, height: u16, player: PlayerId) -> World {
    let mut world = flat_world(width, height);
    claim_all(&mut world, player);
    world
}

/// The 10x10 two-player layout: player 0 owns the left half (`x < 5`),
/// player 1 the right half except the boundary tile (5, 5), which stays
/// neutral.
///
/// # Panics
///
/// Never for the fixed layout.
#[must_use]
pub fn two_player_world() -> World {
    let mut world = flat_world(10, 10);
    for pos in world.dims().positions() {
        let owner = match pos {
            p if p == TilePos::new(5, 5) => None,
            p if p.x < 5 => Some(PlayerId(0)),
            _ => Some(PlayerId(1)),
        };
        world.change_owner(pos, owner).expect("in-bounds ownership change");
    }
    world.run_correctors().expect("correctors on a fresh world");
    world
}

/// A world whose tiles are blocked where `blocked` is true (row-major).
///
/// # Panics
///
/// Panics if `blocked` does not hold `width * height` entries.
#[must_use]
pub fn world_with_blocking(width: u16, height: u16, blocked: &[bool]) -> World {
    let mut world = flat_world(width, height);
    let dims = world.dims();
    assert_eq!(blocked.len(), dims.tile_count(), "blocking mask size");
    for (pos, &b) in dims.positions().zip(blocked) {
        if b {
            world.set_blocked(pos, true).expect("unprotected tile");
        }
    }
    world
}

/// A unit record with the kind's default ground restriction.
#[must_use]
pub fn unit(id: u32, player: u8, kind: UnitKind) -> UnitInfo {
    UnitInfo::new(UnitId(id), PlayerId(player), kind)
}

/// A soldier of `class` at level 1.
#[must_use]
pub fn soldier(id: u32, player: u8, class: SoldierClass) -> UnitInfo {
    unit(id, player, UnitKind::Soldier(class, 1))
}
