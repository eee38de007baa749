//! # Hexworld Core
//!
//! Authoritative world state for a hex-grid real-time strategy simulation.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO beyond (de)serialization of plain data
//! - No system randomness
//! - No floating-point math in path costs (uses fixed-point)
//!
//! ## Crate Structure
//!
//! - [`coords`] - Tile coordinates, hex directions, shapes
//! - [`layers`] - Terrain, flag, object and unit layers
//! - [`partition`] - Player territories, jobless pools, material markets
//! - [`pathfinding`] - A*, Dijkstra, area search and search-type predicates
//! - [`correctors`] - Border, landmark, construction-mark and fog upkeep
//! - [`world`] - The aggregate every caller goes through
//! - [`snapshot`] - Persistence and restore
//! - [`initial_map`] - Construction from loader output
//! - [`views`] - Read-only renderer access

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod buildings;
pub mod components;
pub mod config;
pub mod coords;
pub mod correctors;
pub mod error;
pub mod initial_map;
pub mod layers;
pub mod math;
pub mod partition;
pub mod pathfinding;
pub mod snapshot;
pub mod unit_kind;
pub mod views;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::buildings::BuildingType;
    pub use crate::components::*;
    pub use crate::config::{PathfindingConfig, WorldConfig};
    pub use crate::coords::{Direction, GridDims, RelativePoint, Shape, TilePos, TileRect};
    pub use crate::correctors::{ConstructionQuery, LandmarkAction, Visibility};
    pub use crate::error::{GridError, Result};
    pub use crate::initial_map::{InitialMap, Placement, TileSeed};
    pub use crate::layers::{
        CropStage, Landscape, MapObject, MaterialType, ObjectKind, PlacedObject, ResourceDeposit,
        ResourceKind, TreeStage,
    };
    pub use crate::math::Fixed;
    pub use crate::partition::{PartitionHandle, PartitionId};
    pub use crate::pathfinding::{Path, PathMap, Requester, SearchType};
    pub use crate::snapshot::WorldSnapshot;
    pub use crate::unit_kind::{SoldierClass, UnitInfo, UnitKind, WorkerRole};
    pub use crate::views::GraphicsView;
    pub use crate::world::{CorrectionReport, World};
}
