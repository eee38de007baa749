//! Construction eligibility and on-screen construction marks.
//!
//! [`can_construct_at`] is a pure function of the layers. The corrector
//! keeps one active query (building type, player, screen rectangle) and
//! lazily marks every eligible anchor inside the rectangle with its
//! flatness. Marks are recomputed only when a dirty tile lands close
//! enough to the rectangle to change an answer.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Dirty, DirtyQueue, LayerRefs};
use crate::buildings::BuildingType;
use crate::components::PlayerId;
use crate::coords::{GridDims, TilePos, TileRect};
use crate::error::Result;
use crate::layers::TileFlags;

/// What the player is currently trying to place, and where they look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionQuery {
    /// Building to place.
    pub building_type: BuildingType,
    /// Placing player.
    pub player: PlayerId,
    /// Visible region.
    pub rect: TileRect,
}

/// Whether `building_type` may be placed with its anchor at `pos`.
///
/// Every protected footprint tile must be in bounds, neither protected nor
/// blocked, owned by `player`, of an allowed landscape, and free of ground
/// cover (trees, crops, stones, stacks).
///
/// # Errors
///
/// [`GridError::OutOfBounds`](crate::error::GridError::OutOfBounds) if the
/// anchor is outside the grid.
pub fn can_construct_at(
    layers: &LayerRefs<'_>,
    pos: TilePos,
    building_type: BuildingType,
    player: PlayerId,
) -> Result<bool> {
    let dims = layers.partitions.dims();
    dims.check(pos)?;
    for rel in building_type.protected_tiles() {
        let tile = pos.offset(rel);
        if !dims.in_bounds(tile) {
            return Ok(false);
        }
        let flags = layers.occupancy.flags(tile)?;
        if flags.contains(TileFlags::PROTECTED)
            || flags.contains(TileFlags::BLOCKED)
            || layers.partitions.player_at(tile)? != Some(player)
            || !building_type.allows_ground(layers.terrain.landscape(tile)?)
            || layers
                .objects
                .objects(tile)?
                .iter()
                .any(|o| o.object.kind().is_ground_cover())
        {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Largest elevation difference over the in-bounds footprint tiles.
pub fn flatness(layers: &LayerRefs<'_>, pos: TilePos, building_type: BuildingType) -> Result<u8> {
    let dims = layers.partitions.dims();
    dims.check(pos)?;
    let mut low = i16::MAX;
    let mut high = i16::MIN;
    for rel in building_type.protected_tiles() {
        let tile = pos.offset(rel);
        if dims.in_bounds(tile) {
            let h = i16::from(layers.terrain.elevation(tile)?);
            low = low.min(h);
            high = high.max(h);
        }
    }
    Ok(u8::try_from((high - low).max(0)).unwrap_or(u8::MAX))
}

/// Construction-mark corrector.
#[derive(Debug)]
pub struct ConstructionCorrector {
    dims: GridDims,
    marks: Vec<Option<u8>>,
    marked: Vec<usize>,
    active: Option<ConstructionQuery>,
    queue: DirtyQueue,
}

impl ConstructionCorrector {
    /// Create a corrector with no marks.
    #[must_use]
    pub fn new(dims: GridDims, queue_capacity: usize) -> Self {
        Self {
            dims,
            marks: vec![None; dims.tile_count()],
            marked: Vec::new(),
            active: None,
            queue: DirtyQueue::new("construction", queue_capacity),
        }
    }

    /// Dirty-tile input.
    #[must_use]
    pub const fn queue(&self) -> &DirtyQueue {
        &self.queue
    }

    /// The active query, if any.
    #[must_use]
    pub const fn active(&self) -> Option<&ConstructionQuery> {
        self.active.as_ref()
    }

    /// Mark of a tile: `Some(flatness)` for eligible anchors.
    pub fn mark_at(&self, pos: TilePos) -> Result<Option<u8>> {
        Ok(self.marks[self.dims.index(pos)?])
    }

    /// Set one mark directly.
    pub fn mark(&mut self, pos: TilePos, value: Option<u8>) -> Result<()> {
        let index = self.dims.index(pos)?;
        self.marks[index] = value;
        if value.is_some() {
            self.marked.push(index);
        }
        Ok(())
    }

    /// Show marks for `query`, recomputing only when it changed.
    pub fn show(&mut self, layers: &LayerRefs<'_>, query: ConstructionQuery) -> Result<()> {
        if self.active != Some(query) {
            self.active = Some(query);
            self.refresh(layers)?;
        }
        Ok(())
    }

    /// Remove every mark and forget the query.
    pub fn hide(&mut self) {
        self.clear();
        self.active = None;
    }

    /// Process pending notifications. Returns whether marks were recomputed.
    pub fn run(&mut self, layers: &LayerRefs<'_>) -> Result<bool> {
        let dirty = self.queue.drain();
        let Some(query) = self.active else {
            return Ok(false);
        };
        let reach = BuildingType::ALL
            .iter()
            .map(|t| t.footprint_reach())
            .max()
            .unwrap_or(0);
        let watched = query.rect.expanded(reach + 1);
        let affected = match &dirty {
            Dirty::Rescan => true,
            Dirty::Tiles(tiles) => tiles.iter().any(|&p| watched.contains(p)),
        };
        if affected {
            self.refresh(layers)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn clear(&mut self) {
        for index in self.marked.drain(..) {
            self.marks[index] = None;
        }
    }

    fn refresh(&mut self, layers: &LayerRefs<'_>) -> Result<()> {
        self.clear();
        let Some(query) = self.active else {
            return Ok(());
        };
        let mut count = 0usize;
        for pos in query.rect.positions() {
            if !self.dims.in_bounds(pos) {
                continue;
            }
            if can_construct_at(layers, pos, query.building_type, query.player)? {
                let flat = flatness(layers, pos, query.building_type)?;
                let index = self.dims.index_unchecked(pos);
                self.marks[index] = Some(flat);
                self.marked.push(index);
                count += 1;
            }
        }
        debug!(
            building = ?query.building_type,
            player = query.player.0,
            marks = count,
            "Construction marks refreshed"
        );
        Ok(())
    }
}
