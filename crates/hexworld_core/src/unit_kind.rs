//! Unit kinds and the occupant record stored in the unit layer.

use serde::{Deserialize, Serialize};

use crate::components::{PlayerId, UnitId};

/// Troop class used by the soldier search predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoldierClass {
    /// Ranged soldiers.
    Bowman,
    /// Melee soldiers.
    Swordsman,
    /// Spear soldiers.
    Pikeman,
}

/// Role of a jobless worker waiting in a partition's pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WorkerRole {
    /// Carries materials between stacks.
    Bearer,
    /// Raises walls of construction sites.
    Bricklayer,
    /// Flattens construction sites.
    Digger,
    /// Generic building worker (lumberjack, miner, ...).
    Worker,
}

impl WorkerRole {
    /// Every role, in pool order.
    pub const ALL: [Self; 4] = [Self::Bearer, Self::Bricklayer, Self::Digger, Self::Worker];
}

/// Kind of a mobile unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    /// Material carrier.
    Bearer,
    /// Construction site flattener.
    Digger,
    /// Wall builder.
    Bricklayer,
    /// Building worker.
    Worker,
    /// Claims neutral ground.
    Pioneer,
    /// Searches mountains for ores.
    Geologist,
    /// Steals foreign materials.
    Thief,
    /// Soldier of a class, with level 1..=3.
    Soldier(SoldierClass, u8),
}

impl UnitKind {
    /// Troop class, for soldiers.
    #[must_use]
    pub const fn soldier_class(self) -> Option<SoldierClass> {
        match self {
            Self::Soldier(class, _) => Some(class),
            _ => None,
        }
    }

    /// Whether this kind may garrison a military building.
    #[must_use]
    pub const fn can_occupy_building(self) -> bool {
        matches!(self, Self::Soldier(..))
    }

    /// Whether pathfinding must keep this kind on its own player's ground.
    #[must_use]
    pub const fn needs_players_ground(self) -> bool {
        matches!(
            self,
            Self::Bearer | Self::Digger | Self::Bricklayer | Self::Worker | Self::Geologist
        )
    }

    /// Fog-of-war vision radius in hex steps.
    #[must_use]
    pub const fn vision_radius(self) -> u32 {
        match self {
            Self::Soldier(SoldierClass::Bowman, _) => 10,
            Self::Soldier(..) => 8,
            Self::Thief | Self::Pioneer => 6,
            _ => 4,
        }
    }
}

/// Description of the unit currently standing on a tile.
///
/// This is a non-owning record: the unit itself lives with its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitInfo {
    /// External unit id.
    pub id: UnitId,
    /// Owning player.
    pub player: PlayerId,
    /// Unit kind.
    pub kind: UnitKind,
    /// Restrict movement to the owner's territory.
    pub needs_players_ground: bool,
}

impl UnitInfo {
    /// Create a unit record using the kind's default ground restriction.
    #[must_use]
    pub const fn new(id: UnitId, player: PlayerId, kind: UnitKind) -> Self {
        Self {
            id,
            player,
            kind,
            needs_players_ground: kind.needs_players_ground(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soldier_classification() {
        let sword = UnitKind::Soldier(SoldierClass::Swordsman, 2);
        assert_eq!(sword.soldier_class(), Some(SoldierClass::Swordsman));
        assert!(sword.can_occupy_building());
        assert!(!sword.needs_players_ground());
        assert_eq!(UnitKind::Bearer.soldier_class(), None);
    }

    #[test]
    fn test_unit_info_defaults_ground_restriction() {
        let bearer = UnitInfo::new(UnitId(1), PlayerId(0), UnitKind::Bearer);
        assert!(bearer.needs_players_ground);
        let thief = UnitInfo::new(UnitId(2), PlayerId(0), UnitKind::Thief);
        assert!(!thief.needs_players_ground);
    }
}
