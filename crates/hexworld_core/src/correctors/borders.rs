//! Border flags for rendering.
//!
//! A tile is a border tile when it is owned and at least one in-bounds
//! neighbour has a different owner (another player or neutral).

use tracing::debug;

use super::{Dirty, DirtyQueue, LayerRefs};
use crate::coords::{GridDims, TilePos};
use crate::error::Result;
use crate::partition::PartitionEngine;

/// Border corrector.
#[derive(Debug)]
pub struct BorderCorrector {
    dims: GridDims,
    borders: Vec<bool>,
    queue: DirtyQueue,
}

impl BorderCorrector {
    /// Create a corrector with no border tiles.
    #[must_use]
    pub fn new(dims: GridDims, queue_capacity: usize) -> Self {
        Self {
            dims,
            borders: vec![false; dims.tile_count()],
            queue: DirtyQueue::new("borders", queue_capacity),
        }
    }

    /// Dirty-tile input.
    #[must_use]
    pub const fn queue(&self) -> &DirtyQueue {
        &self.queue
    }

    /// Whether a tile is a border tile.
    pub fn is_border(&self, pos: TilePos) -> Result<bool> {
        Ok(self.borders[self.dims.index(pos)?])
    }

    /// Process pending notifications. Returns the number of flags flipped.
    pub fn run(&mut self, layers: &LayerRefs<'_>) -> usize {
        let flipped = match self.queue.drain() {
            Dirty::Rescan => self.rebuild(layers.partitions),
            Dirty::Tiles(tiles) => {
                let mut flipped = 0;
                for pos in tiles {
                    if !self.dims.in_bounds(pos) {
                        continue;
                    }
                    flipped += usize::from(self.update(layers.partitions, pos));
                    for n in self.dims.neighbours(pos) {
                        flipped += usize::from(self.update(layers.partitions, n));
                    }
                }
                flipped
            }
        };
        if flipped > 0 {
            debug!(flipped, "Border pass");
        }
        flipped
    }

    /// Recompute every tile. Returns the number of flags flipped.
    pub fn rebuild(&mut self, partitions: &PartitionEngine) -> usize {
        self.dims
            .positions()
            .map(|pos| usize::from(self.update(partitions, pos)))
            .sum()
    }

    fn update(&mut self, partitions: &PartitionEngine, pos: TilePos) -> bool {
        let index = self.dims.index_unchecked(pos);
        let border = compute_border(self.dims, partitions, pos);
        let changed = self.borders[index] != border;
        self.borders[index] = border;
        changed
    }
}

/// Border rule for one in-bounds tile.
#[must_use]
pub fn compute_border(dims: GridDims, partitions: &PartitionEngine, pos: TilePos) -> bool {
    let owner = partitions.player_at_index(dims.index_unchecked(pos));
    owner.is_some()
        && dims
            .neighbours(pos)
            .any(|n| partitions.player_at_index(dims.index_unchecked(n)) != owner)
}
