//! Per-tile data layers.
//!
//! Each layer owns one concern and is indexed through the same
//! [`GridDims`](crate::coords::GridDims), so every accessor validates
//! coordinates before touching storage.

mod objects;
mod occupancy;
mod terrain;
mod units;

pub use objects::{
    CropStage, MapObject, MaterialType, ObjectKind, ObjectLayer, PlacedObject, TreeStage,
};
pub use occupancy::{OccupancyLayer, TileFlags};
pub use terrain::{Landscape, ResourceDeposit, ResourceKind, TerrainLayer};
pub use units::UnitLayer;
