//! The search-type predicate catalog.
//!
//! Every predicate is a pure function of the world layers and the
//! requester. Predicates test the tile itself; callers that need to stand
//! next to it derive the work position.

use serde::{Deserialize, Serialize};

use super::Requester;
use crate::coords::TilePos;
use crate::error::Result;
use crate::layers::{CropStage, Landscape, MapObject, ObjectKind, TreeStage};
use crate::unit_kind::SoldierClass;
use crate::world::World;

/// Situational tile predicate used by the area and Dijkstra searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SearchType {
    /// Unblocked, unmarked ground of another player (or neutral) not held by a tower.
    ForeignGround = 0,
    /// Own adult tree.
    CuttableTree = 1,
    /// Own free grass where a tree may grow.
    PlantableTree = 2,
    /// Own free field where corn may grow.
    PlantableCorn = 3,
    /// Own ripe corn.
    CuttableCorn = 4,
    /// Own stone with cuts left.
    CuttableStone = 5,
    /// A unit of another player.
    Enemy = 6,
    /// Own river tile.
    River = 7,
    /// Own tile next to water.
    Fishable = 8,
    /// Walkable, unprotected, unoccupied tile.
    NonBlockedOrProtected = 9,
    /// Own bowman.
    SoldierBowman = 10,
    /// Own swordsman.
    SoldierSwordsman = 11,
    /// Own pikeman.
    SoldierPikeman = 12,
    /// Mountain tile where a geologist may leave a sign.
    Mountain = 13,
    /// Stealable material on foreign ground.
    ForeignMaterial = 14,
}

impl SearchType {
    /// Every search type, in tag order.
    pub const ALL: [Self; 15] = [
        Self::ForeignGround,
        Self::CuttableTree,
        Self::PlantableTree,
        Self::PlantableCorn,
        Self::CuttableCorn,
        Self::CuttableStone,
        Self::Enemy,
        Self::River,
        Self::Fishable,
        Self::NonBlockedOrProtected,
        Self::SoldierBowman,
        Self::SoldierSwordsman,
        Self::SoldierPikeman,
        Self::Mountain,
        Self::ForeignMaterial,
    ];

    /// Look up a search type by its wire tag.
    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(usize::from(tag)).copied()
    }

    /// Wire tag of this search type.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Evaluate the predicate.
    ///
    /// # Errors
    ///
    /// [`GridError::OutOfBounds`](crate::error::GridError::OutOfBounds) if
    /// `pos` is outside the grid.
    pub fn fits(self, world: &World, requester: &Requester, pos: TilePos) -> Result<bool> {
        let flags = world.occupancy();
        let objects = world.objects();
        let own = world.partitions().player_at(pos)? == Some(requester.player);
        let marked = flags.is_marked(pos)?;

        Ok(match self {
            Self::ForeignGround => {
                !flags.is_blocked(pos)?
                    && !own
                    && !marked
                    && !world.partitions().is_enforced_by_tower(pos)?
            }
            Self::CuttableTree => own && !marked && objects.has_cuttable(pos, ObjectKind::Tree)?,
            Self::PlantableTree => {
                own && !marked
                    && !flags.is_protected(pos)?
                    && !flags.has_protected_neighbour(pos)?
                    && is_tree_plantable(world, pos)?
            }
            Self::PlantableCorn => own && !marked && is_corn_plantable(world, pos)?,
            Self::CuttableCorn => own && !marked && objects.has_cuttable(pos, ObjectKind::Corn)?,
            Self::CuttableStone => own && !marked && objects.has_cuttable(pos, ObjectKind::Stone)?,
            Self::Enemy => world
                .units()
                .unit_at(pos)?
                .is_some_and(|u| u.player != requester.player),
            Self::River => own && !marked && world.terrain().landscape(pos)? == Landscape::River,
            Self::Fishable => own && world.terrain().has_neighbour_landscape(pos, Landscape::Water)?,
            Self::NonBlockedOrProtected => {
                !flags.is_protected(pos)?
                    && !flags.is_blocked(pos)?
                    && !world.terrain().landscape(pos)?.is_blocking()
                    && (!requester.needs_players_ground || own)
                    && world.units().unit_at(pos)?.is_none()
            }
            Self::SoldierBowman => is_soldier_at(world, requester, pos, SoldierClass::Bowman)?,
            Self::SoldierSwordsman => is_soldier_at(world, requester, pos, SoldierClass::Swordsman)?,
            Self::SoldierPikeman => is_soldier_at(world, requester, pos, SoldierClass::Pikeman)?,
            Self::Mountain => !marked && can_add_resource_sign(world, pos)?,
            Self::ForeignMaterial => !own && objects.has_stealable_material(pos)?,
        })
    }
}

/// Blocking rule of the live world for `requester`.
pub(crate) fn is_blocked(world: &World, requester: &Requester, pos: TilePos) -> Result<bool> {
    Ok(world.occupancy().is_blocked(pos)?
        || world.terrain().landscape(pos)?.is_blocking()
        || (requester.needs_players_ground
            && world.partitions().player_at(pos)? != Some(requester.player)))
}

/// Grass that is free, unblocked and has no blocked neighbour.
pub(crate) fn is_tree_plantable(world: &World, pos: TilePos) -> Result<bool> {
    Ok(world.terrain().landscape(pos)? == Landscape::Grass
        && !world.occupancy().is_blocked(pos)?
        && !world.occupancy().has_blocked_neighbour(pos)?
        && world.objects().can_add(pos, &MapObject::Tree(TreeStage::Sapling))?)
}

/// Grass or earth away from buildings and other fields.
pub(crate) fn is_corn_plantable(world: &World, pos: TilePos) -> Result<bool> {
    let objects = world.objects();
    Ok(matches!(
        world.terrain().landscape(pos)?,
        Landscape::Grass | Landscape::Earth
    ) && !world.occupancy().is_protected(pos)?
        && !world.occupancy().has_protected_neighbour(pos)?
        && !objects.has_neighbour_kind(pos, ObjectKind::Corn)?
        && objects.can_add(pos, &MapObject::Corn(CropStage::Growing))?)
}

/// Even-coordinate mountain tile without a sign yet.
pub(crate) fn can_add_resource_sign(world: &World, pos: TilePos) -> Result<bool> {
    Ok(pos.x % 2 == 0
        && pos.y % 2 == 0
        && world.terrain().landscape(pos)? == Landscape::Mountain
        && !world.objects().has_kind(pos, ObjectKind::ResourceSign)?)
}

fn is_soldier_at(
    world: &World,
    requester: &Requester,
    pos: TilePos,
    class: SoldierClass,
) -> Result<bool> {
    Ok(world.units().unit_at(pos)?.is_some_and(|u| {
        u.player == requester.player
            && u.kind.can_occupy_building()
            && u.kind.soldier_class() == Some(class)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip() {
        for search in SearchType::ALL {
            assert_eq!(SearchType::from_tag(search.tag()), Some(search));
        }
        assert_eq!(SearchType::from_tag(15), None);
    }
}
