//! Whole-world persistence.
//!
//! A [`WorldSnapshot`] holds every persistent layer plus the partition
//! state. Restoring is two-phase: the layers are rebuilt from plain data,
//! then [`World::rebuild_derived`] regenerates border flags, queues,
//! construction caches and fog counters. None of the derived state is
//! stored.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::WorldConfig;
use crate::coords::GridDims;
use crate::error::{GridError, Result};
use crate::layers::{ObjectLayer, OccupancyLayer, TerrainLayer, UnitLayer};
use crate::partition::{PartitionEngine, PartitionState};
use crate::world::World;

/// Plain-data copy of the persistent world state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Grid size.
    pub dims: GridDims,
    /// Configuration in effect.
    pub config: WorldConfig,
    /// Terrain.
    pub terrain: TerrainLayer,
    /// Flags.
    pub occupancy: OccupancyLayer,
    /// Objects.
    pub objects: ObjectLayer,
    /// Units.
    pub units: UnitLayer,
    /// Ownership, markets and pools.
    pub partitions: PartitionState,
    /// Explored fog bits per player.
    pub explored: Vec<Vec<bool>>,
}

impl WorldSnapshot {
    /// Encode with bincode.
    ///
    /// # Errors
    ///
    /// [`GridError::Snapshot`] if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GridError::Snapshot(format!("Failed to serialize world: {e}")))
    }

    /// Decode from bincode.
    ///
    /// # Errors
    ///
    /// [`GridError::Snapshot`] if the bytes are not a snapshot.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| GridError::Snapshot(format!("Failed to deserialize world: {e}")))
    }
}

impl World {
    /// Copy the persistent state.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            dims: self.dims,
            config: self.config,
            terrain: self.terrain.clone(),
            occupancy: self.occupancy.clone(),
            objects: self.objects.clone(),
            units: self.units.clone(),
            partitions: self.partitions.to_state(),
            explored: self.fog.explored(),
        }
    }

    /// Build a world from a snapshot and regenerate its derived state.
    ///
    /// # Errors
    ///
    /// [`GridError::Snapshot`] if the parts disagree on the grid size.
    pub fn restore(snapshot: WorldSnapshot) -> Result<Self> {
        let dims = snapshot.dims;
        if !(snapshot.terrain.fits(dims)
            && snapshot.occupancy.fits(dims)
            && snapshot.objects.fits(dims)
            && snapshot.units.fits(dims))
        {
            return Err(GridError::Snapshot(format!(
                "layers do not fit a {}x{} grid",
                dims.width, dims.height
            )));
        }
        let partitions = PartitionEngine::from_state(dims, snapshot.partitions)?;
        let mut world = Self::from_layers(
            snapshot.config,
            snapshot.terrain,
            snapshot.occupancy,
            snapshot.objects,
            snapshot.units,
            partitions,
        );
        world.fog.restore_explored(snapshot.explored)?;
        world.rebuild_derived()?;
        info!(
            width = dims.width,
            height = dims.height,
            partitions = world.partitions.partitions().count(),
            "World restored"
        );
        Ok(world)
    }

    /// Encode the snapshot with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.snapshot().to_bytes()
    }

    /// Decode and restore a world.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::restore(WorldSnapshot::from_bytes(data)?)
    }

    /// Hash of the persistent state, for desync checks.
    ///
    /// Worlds with identical persistent state produce identical hashes.
    pub fn state_hash(&self) -> Result<u64> {
        let bytes = self.to_bytes()?;
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        Ok(hasher.finish())
    }
}
