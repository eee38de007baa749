//! Building type catalog: footprints, allowed ground and territory radius.
//!
//! Footprints are relative to the building's anchor tile. The protected
//! footprint reserves space around the building; the blocked footprint is
//! the subset units cannot walk through. The door tile is protected but
//! never blocked so workers can reach it.

use serde::{Deserialize, Serialize};

use crate::coords::{hex_circle, RelativePoint, Shape, TilePos};
use crate::layers::Landscape;

/// Relative position of every building's door.
pub const DOOR: RelativePoint = RelativePoint::new(1, 1);

const NORMAL_GROUND: &[Landscape] = &[Landscape::Grass, Landscape::Earth];
const SHORE_GROUND: &[Landscape] = &[Landscape::Grass, Landscape::Earth, Landscape::Sand];
const MOUNTAIN_GROUND: &[Landscape] = &[Landscape::Mountain];

/// Size class shared by several building types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SizeClass {
    Small,
    Large,
}

/// Building type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildingType {
    /// Small military building.
    Tower,
    /// Large military building.
    Castle,
    /// Cuts adult trees.
    Lumberjack,
    /// Plants trees.
    Forester,
    /// Cuts stones.
    Stonecutter,
    /// Turns trunks into planks.
    Sawmill,
    /// Plants and harvests crops.
    Farm,
    /// Catches fish.
    Fisher,
    /// Mines coal.
    CoalMine,
    /// Mines iron.
    IronMine,
    /// Mines gold.
    GoldMine,
    /// Trains soldiers.
    Barrack,
    /// Stores materials.
    Warehouse,
}

impl BuildingType {
    /// Every building type.
    pub const ALL: [Self; 13] = [
        Self::Tower,
        Self::Castle,
        Self::Lumberjack,
        Self::Forester,
        Self::Stonecutter,
        Self::Sawmill,
        Self::Farm,
        Self::Fisher,
        Self::CoalMine,
        Self::IronMine,
        Self::GoldMine,
        Self::Barrack,
        Self::Warehouse,
    ];

    const fn size_class(self) -> SizeClass {
        match self {
            Self::Castle | Self::Farm | Self::Barrack | Self::Warehouse | Self::Sawmill => {
                SizeClass::Large
            }
            _ => SizeClass::Small,
        }
    }

    /// Landscapes every protected tile must have.
    #[must_use]
    pub const fn ground_types(self) -> &'static [Landscape] {
        match self {
            Self::Fisher => SHORE_GROUND,
            Self::CoalMine | Self::IronMine | Self::GoldMine => MOUNTAIN_GROUND,
            _ => NORMAL_GROUND,
        }
    }

    /// Whether `landscape` is allowed under this building.
    #[must_use]
    pub fn allows_ground(self, landscape: Landscape) -> bool {
        self.ground_types().contains(&landscape)
    }

    /// Territory radius claimed by military buildings.
    #[must_use]
    pub const fn occupation_radius(self) -> Option<u32> {
        match self {
            Self::Tower => Some(8),
            Self::Castle => Some(12),
            _ => None,
        }
    }

    /// Relative tiles reserved by the building.
    #[must_use]
    pub fn protected_tiles(self) -> Vec<RelativePoint> {
        let radius = match self.size_class() {
            SizeClass::Small => 1,
            SizeClass::Large => 2,
        };
        relative_circle(radius)
    }

    /// Relative tiles units cannot walk through.
    #[must_use]
    pub fn blocked_tiles(self) -> Vec<RelativePoint> {
        match self.size_class() {
            SizeClass::Small => vec![
                RelativePoint::new(0, 0),
                RelativePoint::new(-1, -1),
                RelativePoint::new(0, -1),
                RelativePoint::new(-1, 0),
            ],
            SizeClass::Large => relative_circle(1)
                .into_iter()
                .filter(|&p| p != DOOR)
                .collect(),
        }
    }

    /// The protected footprint as a [`Shape`].
    #[must_use]
    pub fn footprint(self) -> Shape {
        Shape::Footprint(self.protected_tiles())
    }

    /// Largest hex distance of any protected tile from the anchor.
    #[must_use]
    pub fn footprint_reach(self) -> i32 {
        match self.size_class() {
            SizeClass::Small => 1,
            SizeClass::Large => 2,
        }
    }
}

fn relative_circle(radius: u32) -> Vec<RelativePoint> {
    hex_circle(TilePos::new(0, 0), radius)
        .into_iter()
        .map(|p| RelativePoint::new(p.x, p.y))
        .collect()
}
