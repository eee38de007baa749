//! The world aggregate.
//!
//! [`World`] owns every layer, the partition engine and the correctors.
//! All mutations go through it so it can keep the cross-layer rules
//! (stones block, buildings protect and block their footprint, ownership
//! only changes through the partition engine) and notify the correctors
//! about every tile it touched.
//!
//! The world is single-writer: the simulation thread mutates it and runs
//! searches against it. Correctors run when the simulation thread calls
//! [`World::run_correctors`]; they only read the layers.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::buildings::BuildingType;
use crate::components::{BuildingId, ObjectId, PlayerId, RequestId, UnitId};
use crate::config::WorldConfig;
use crate::coords::{GridDims, Shape, TilePos};
use crate::correctors::construction::{can_construct_at, ConstructionQuery};
use crate::correctors::{
    BorderCorrector, ConstructionCorrector, FogCorrector, FogEvent, LandmarkAction,
    LandmarkCorrector, LayerRefs, Visibility,
};
use crate::error::{GridError, Result};
use crate::layers::{
    Landscape, MapObject, MaterialType, ObjectKind, ObjectLayer, OccupancyLayer, PlacedObject,
    ResourceDeposit, TerrainLayer, TreeStage, UnitLayer,
};
use crate::partition::{JoblessWorker, PartitionEngine, PartitionHandle};
use crate::pathfinding::{
    area, astar, dijkstra, search_type, Path, Requester, SearchType, WorldPathMap,
};
use crate::unit_kind::{UnitInfo, WorkerRole};

/// What one [`World::run_correctors`] call changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionReport {
    /// Border flags flipped.
    pub borders_flipped: usize,
    /// Whether construction marks were recomputed.
    pub marks_refreshed: bool,
    /// Fog observer events applied.
    pub fog_events: usize,
    /// Neutral pocket tiles handed to their enclosing player.
    pub adopted_tiles: usize,
    /// Buildings destroyed because their owner lost the ground.
    pub destroyed: Vec<BuildingId>,
}

/// Authoritative world state.
#[derive(Debug)]
pub struct World {
    pub(crate) dims: GridDims,
    pub(crate) config: WorldConfig,
    pub(crate) terrain: TerrainLayer,
    pub(crate) occupancy: OccupancyLayer,
    pub(crate) objects: ObjectLayer,
    pub(crate) units: UnitLayer,
    pub(crate) partitions: PartitionEngine,
    pub(crate) borders: BorderCorrector,
    pub(crate) landmarks: LandmarkCorrector,
    pub(crate) construction: ConstructionCorrector,
    pub(crate) fog: FogCorrector,
}

impl World {
    /// Create a flat, neutral grass world.
    #[must_use]
    pub fn new(dims: GridDims, config: WorldConfig) -> Self {
        Self::from_layers(
            config,
            TerrainLayer::new(dims),
            OccupancyLayer::new(dims),
            ObjectLayer::new(dims),
            UnitLayer::new(dims),
            PartitionEngine::new(dims),
        )
    }

    pub(crate) fn from_layers(
        config: WorldConfig,
        terrain: TerrainLayer,
        occupancy: OccupancyLayer,
        objects: ObjectLayer,
        units: UnitLayer,
        partitions: PartitionEngine,
    ) -> Self {
        let dims = partitions.dims();
        let capacity = config.corrector_queue_capacity;
        Self {
            dims,
            config,
            terrain,
            occupancy,
            objects,
            units,
            partitions,
            borders: BorderCorrector::new(dims, capacity),
            landmarks: LandmarkCorrector::new(dims, config.max_pocket_size, capacity),
            construction: ConstructionCorrector::new(dims, capacity),
            fog: FogCorrector::new(dims),
        }
    }

    // ========================================================================
    // Read access
    // ========================================================================

    /// Grid dimensions.
    #[must_use]
    pub const fn dims(&self) -> GridDims {
        self.dims
    }

    /// Configuration.
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Terrain layer.
    #[must_use]
    pub const fn terrain(&self) -> &TerrainLayer {
        &self.terrain
    }

    /// Flag layer.
    #[must_use]
    pub const fn occupancy(&self) -> &OccupancyLayer {
        &self.occupancy
    }

    /// Object layer.
    #[must_use]
    pub const fn objects(&self) -> &ObjectLayer {
        &self.objects
    }

    /// Unit layer.
    #[must_use]
    pub const fn units(&self) -> &UnitLayer {
        &self.units
    }

    /// Ownership.
    #[must_use]
    pub const fn partitions(&self) -> &PartitionEngine {
        &self.partitions
    }

    /// Border corrector, for its flags and its dirty queue.
    #[must_use]
    pub const fn borders(&self) -> &BorderCorrector {
        &self.borders
    }

    /// Landmark corrector, for its dirty queue.
    #[must_use]
    pub const fn landmarks(&self) -> &LandmarkCorrector {
        &self.landmarks
    }

    /// Construction-mark corrector.
    #[must_use]
    pub const fn construction(&self) -> &ConstructionCorrector {
        &self.construction
    }

    /// Fog corrector.
    #[must_use]
    pub const fn fog(&self) -> &FogCorrector {
        &self.fog
    }

    /// Borrowed view of the layers, as the correctors see them.
    #[must_use]
    pub const fn layers(&self) -> LayerRefs<'_> {
        LayerRefs {
            terrain: &self.terrain,
            occupancy: &self.occupancy,
            objects: &self.objects,
            units: &self.units,
            partitions: &self.partitions,
        }
    }

    /// Whether a tile sits on a territory border.
    pub fn is_border(&self, pos: TilePos) -> Result<bool> {
        self.borders.is_border(pos)
    }

    /// Fog state of a tile for `player`.
    pub fn visibility(&self, player: PlayerId, pos: TilePos) -> Result<Visibility> {
        self.fog.visibility(player, pos)
    }

    /// Partition handle of the tile's owner.
    pub fn partition_handle(&self, pos: TilePos) -> Result<PartitionHandle> {
        self.partitions.handle_at(pos)
    }

    fn board_at(&self, pos: TilePos) -> Result<Option<PartitionHandle>> {
        if self.partitions.partition_at(pos)?.is_neutral() {
            return Ok(None);
        }
        self.partitions.handle_at(pos).map(Some)
    }

    fn notify(&self, pos: TilePos) {
        self.borders.queue().notify(pos);
        self.landmarks.queue().notify(pos);
        self.construction.queue().notify(pos);
    }

    fn flush_ownership_changes(&mut self) -> Result<()> {
        for change in self.partitions.take_changed() {
            self.notify(change.pos);
            if change.previous.is_none() {
                self.offer_stack(change.pos)?;
            }
        }
        Ok(())
    }

    /// Offer whatever is stacked on a tile that was not offered yet.
    fn offer_stack(&self, pos: TilePos) -> Result<()> {
        let Some(material) = self.objects.material_at(pos)? else {
            return Ok(());
        };
        let Some(handle) = self.board_at(pos)? else {
            return Ok(());
        };
        let stacked = u32::from(self.objects.stack_size(pos, material)?);
        handle.with_board(|board| {
            let offered = board.market.offered(pos, material);
            if stacked > offered {
                board.market.offer(pos, material, stacked - offered);
            }
        })
    }

    // ========================================================================
    // Terrain and flags
    // ========================================================================

    /// Change a tile's landscape.
    pub fn set_landscape(&mut self, pos: TilePos, landscape: Landscape) -> Result<()> {
        self.terrain.set_landscape(pos, landscape)?;
        self.notify(pos);
        Ok(())
    }

    /// Raise or lower a tile, saturating. Returns the new elevation.
    pub fn change_elevation(&mut self, pos: TilePos, delta: i8) -> Result<i8> {
        let height = self.terrain.change_elevation(pos, delta)?;
        self.notify(pos);
        Ok(height)
    }

    /// Set or clear a tile's deposit.
    pub fn set_resource(&mut self, pos: TilePos, deposit: Option<ResourceDeposit>) -> Result<()> {
        self.terrain.set_resource(pos, deposit)
    }

    /// Take up to `amount` from a deposit. Returns what was mined.
    pub fn mine_resource(&mut self, pos: TilePos, amount: u8) -> Result<u8> {
        self.terrain.mine_resource(pos, amount)
    }

    /// Set the blocked flag of an unprotected tile.
    ///
    /// # Errors
    ///
    /// [`GridError::InvalidTransition`] if the tile is protected.
    pub fn set_blocked(&mut self, pos: TilePos, blocked: bool) -> Result<bool> {
        if self.occupancy.is_protected(pos)? {
            return Err(GridError::invalid(format!(
                "blocking of protected tile ({}, {}) is owned by its building",
                pos.x, pos.y
            )));
        }
        let changed = self.occupancy.set_blocked(pos, blocked)?;
        if changed {
            self.notify(pos);
        }
        Ok(changed)
    }

    /// Set the marked flag (a worker has claimed the tile).
    pub fn set_marked(&mut self, pos: TilePos, marked: bool) -> Result<bool> {
        self.occupancy.set_marked(pos, marked)
    }

    // ========================================================================
    // Objects
    // ========================================================================

    /// Place a non-building object. Stones block their tile.
    ///
    /// # Errors
    ///
    /// [`GridError::InvalidTransition`] for buildings (use
    /// [`place_building`](Self::place_building)) and for conflicting objects.
    pub fn add_object(&mut self, pos: TilePos, object: MapObject) -> Result<ObjectId> {
        if object.kind() == ObjectKind::Building {
            return Err(GridError::invalid("buildings are placed with place_building"));
        }
        let id = self.objects.add(pos, object)?;
        if object.is_blocking() {
            self.occupancy.set_blocked(pos, true)?;
            self.notify(pos);
        }
        Ok(id)
    }

    /// Remove the object of `kind`, if any. Unblocks tiles freed of stones.
    pub fn remove_object_kind(
        &mut self,
        pos: TilePos,
        kind: ObjectKind,
    ) -> Result<Option<PlacedObject>> {
        if kind == ObjectKind::Building {
            return Err(GridError::invalid("buildings are removed with remove_building"));
        }
        let removed = self.objects.remove_kind(pos, kind)?;
        if let Some(placed) = &removed {
            self.after_removal(pos, &placed.object)?;
        }
        Ok(removed)
    }

    /// Remove exactly `expected`, failing if the tile holds something else.
    pub fn remove_object(&mut self, pos: TilePos, expected: &PlacedObject) -> Result<()> {
        if expected.object.kind() == ObjectKind::Building {
            return Err(GridError::invalid("buildings are removed with remove_building"));
        }
        self.objects.remove_object(pos, expected)?;
        self.after_removal(pos, &expected.object)
    }

    fn after_removal(&mut self, pos: TilePos, object: &MapObject) -> Result<()> {
        if object.is_blocking() && !self.occupancy.is_protected(pos)? {
            self.occupancy.set_blocked(pos, false)?;
            self.notify(pos);
        }
        Ok(())
    }

    /// Replace an object in place (growth stage changes).
    pub fn replace_object(&mut self, pos: TilePos, id: ObjectId, object: MapObject) -> Result<()> {
        self.objects.replace(pos, id, object)
    }

    /// Plant a sapling where trees may grow.
    ///
    /// # Errors
    ///
    /// [`GridError::InvalidTransition`] if the tile is not plantable.
    pub fn plant_tree(&mut self, pos: TilePos) -> Result<ObjectId> {
        if !search_type::is_tree_plantable(self, pos)? {
            return Err(GridError::invalid(format!(
                "cannot plant a tree at ({}, {})",
                pos.x, pos.y
            )));
        }
        self.objects.add(pos, MapObject::Tree(TreeStage::Sapling))
    }

    /// Cut a stone once. Returns `true` when it was used up.
    pub fn cut_stone(&mut self, pos: TilePos) -> Result<bool> {
        let gone = self.objects.cut_stone(pos)?;
        if gone {
            self.after_removal(pos, &MapObject::Stone { capacity: 0 })?;
        }
        Ok(gone)
    }

    /// Place a resource sign on an eligible mountain tile.
    pub fn add_resource_sign(&mut self, pos: TilePos) -> Result<Option<ObjectId>> {
        if !search_type::can_add_resource_sign(self, pos)? {
            return Ok(None);
        }
        let Some(deposit) = self.terrain.resource(pos)? else {
            return Ok(None);
        };
        self.objects
            .add(pos, MapObject::ResourceSign(deposit.kind))
            .map(Some)
    }

    // ========================================================================
    // Material stacks and the market
    // ========================================================================

    /// Drop one `material` on a tile and offer it to the tile's partition.
    ///
    /// Returns the new stack height.
    pub fn push_material(&mut self, pos: TilePos, material: MaterialType) -> Result<u8> {
        let height = self
            .objects
            .push_material(pos, material, self.config.max_stack_size)?;
        if let Some(handle) = self.board_at(pos)? {
            handle.offer_material(pos, material, 1)?;
        }
        Ok(height)
    }

    /// Pick up one `material` whose offer was already matched by
    /// [`PartitionHandle::next_transfer`]. The market is left alone.
    ///
    /// Returns the remaining stack height.
    pub fn pop_material(&mut self, pos: TilePos, material: MaterialType) -> Result<u8> {
        self.objects.pop_material(pos, material)
    }

    /// Take one unmatched `material` from a tile, withdrawing one offer.
    ///
    /// Returns the remaining stack height.
    pub fn withdraw_material(&mut self, pos: TilePos, material: MaterialType) -> Result<u8> {
        let remaining = self.objects.pop_material(pos, material)?;
        if let Some(handle) = self.board_at(pos)? {
            handle.remove_offer(pos, material)?;
        }
        Ok(remaining)
    }

    /// Take one unit of whatever lies on a tile.
    pub fn steal_material(&mut self, pos: TilePos) -> Result<Option<MaterialType>> {
        let stolen = self.objects.steal_material(pos)?;
        if let (Some(material), Some(handle)) = (stolen, self.board_at(pos)?) {
            handle.remove_offer(pos, material)?;
        }
        Ok(stolen)
    }

    /// Drop every request for `material` at `pos` and offer what is still
    /// stacked there. Returns the number of requests dropped.
    pub fn release_requests_at(&mut self, pos: TilePos, material: MaterialType) -> Result<usize> {
        let stacked = u32::from(self.objects.stack_size(pos, material)?);
        let Some(handle) = self.board_at(pos)? else {
            return Ok(0);
        };
        handle.with_board(|board| {
            let dropped = board.market.release_requests_at(pos, material);
            let offered = board.market.offered(pos, material);
            if stacked > offered {
                board.market.offer(pos, material, stacked - offered);
            }
            dropped
        })
    }

    /// Ask the tile's partition for `amount` units of `material`.
    pub fn request_material(
        &self,
        pos: TilePos,
        material: MaterialType,
        priority: u8,
        amount: u32,
    ) -> Result<RequestId> {
        self.partitions
            .handle_at(pos)?
            .request_material(pos, material, priority, amount)
    }

    /// Put an idle worker into the pool of the partition it stands in.
    pub fn add_jobless(&self, pos: TilePos, role: WorkerRole, unit: UnitId) -> Result<()> {
        self.partitions
            .handle_at(pos)?
            .add_jobless(role, JoblessWorker { unit, pos })
    }

    // ========================================================================
    // Units
    // ========================================================================

    /// Put a unit on a free tile and start its vision.
    pub fn enter_unit(&mut self, pos: TilePos, unit: UnitInfo) -> Result<()> {
        self.units.enter(pos, unit)?;
        self.fog.send(FogEvent::Appear {
            player: unit.player,
            pos,
            radius: unit.kind.vision_radius(),
        });
        Ok(())
    }

    /// Take a unit off its tile and stop its vision.
    pub fn leave_unit(&mut self, pos: TilePos, unit: UnitId) -> Result<UnitInfo> {
        let info = self.units.leave(pos, unit)?;
        self.fog.send(FogEvent::Vanish {
            player: info.player,
            pos,
            radius: info.kind.vision_radius(),
        });
        Ok(info)
    }

    /// Move a unit one tile or more. Nothing changes when either end fails.
    pub fn move_unit(&mut self, from: TilePos, to: TilePos, unit: UnitId) -> Result<()> {
        match self.units.unit_at(from)? {
            Some(info) if info.id == unit => {}
            _ => {
                return Err(GridError::invalid(format!(
                    "unit {unit:?} is not at ({}, {})",
                    from.x, from.y
                )))
            }
        }
        if let Some(other) = self.units.unit_at(to)? {
            return Err(GridError::invalid(format!(
                "unit {unit:?} cannot enter ({}, {}): occupied by {:?}",
                to.x, to.y, other.id
            )));
        }
        let info = self.leave_unit(from, unit)?;
        self.enter_unit(to, info)
    }

    // ========================================================================
    // Ownership
    // ========================================================================

    /// Reassign one tile.
    pub fn change_owner(&mut self, pos: TilePos, owner: Option<PlayerId>) -> Result<bool> {
        let changed = self.partitions.change_owner(pos, owner)?;
        self.flush_ownership_changes()?;
        Ok(changed)
    }

    /// Claim an area for `player`. Returns the tiles that changed owner.
    pub fn occupy_area(
        &mut self,
        shape: &Shape,
        anchor: TilePos,
        player: PlayerId,
    ) -> Result<Vec<TilePos>> {
        let changed = self.partitions.occupy_area(shape, anchor, player)?;
        self.flush_ownership_changes()?;
        Ok(changed)
    }

    /// Release `player`'s claim on an area. Returns the tiles that became
    /// neutral.
    pub fn free_area(
        &mut self,
        shape: &Shape,
        anchor: TilePos,
        player: PlayerId,
    ) -> Result<Vec<TilePos>> {
        let freed = self.partitions.free_area(shape, anchor, player)?;
        self.flush_ownership_changes()?;
        Ok(freed)
    }

    // ========================================================================
    // Buildings
    // ========================================================================

    /// Whether `building_type` may be placed with its anchor at `pos`.
    pub fn can_construct_at(
        &self,
        pos: TilePos,
        building_type: BuildingType,
        player: PlayerId,
    ) -> Result<bool> {
        can_construct_at(&self.layers(), pos, building_type, player)
    }

    /// `pos` itself or the first neighbour where the building fits.
    pub fn get_constructable_position_around(
        &self,
        pos: TilePos,
        building_type: BuildingType,
        player: PlayerId,
    ) -> Result<Option<TilePos>> {
        if self.can_construct_at(pos, building_type, player)? {
            return Ok(Some(pos));
        }
        for n in self.dims.neighbours(pos) {
            if self.can_construct_at(n, building_type, player)? {
                return Ok(Some(n));
            }
        }
        Ok(None)
    }

    /// Place a building. The footprint becomes protected, its blocked part
    /// blocked, and military buildings claim their occupation radius.
    ///
    /// # Errors
    ///
    /// [`GridError::InvalidTransition`] if the building cannot be placed
    /// there; nothing changes in that case.
    pub fn place_building(
        &mut self,
        pos: TilePos,
        id: BuildingId,
        building_type: BuildingType,
        player: PlayerId,
    ) -> Result<ObjectId> {
        if !self.can_construct_at(pos, building_type, player)? {
            return Err(GridError::invalid(format!(
                "{building_type:?} cannot be placed at ({}, {}) for player {}",
                pos.x, pos.y, player.0
            )));
        }
        let object = self.objects.add(
            pos,
            MapObject::Building {
                id,
                building_type,
                owner: player,
            },
        )?;
        for tile in building_type.footprint().tiles(pos) {
            self.occupancy.set_protected(tile, true)?;
            self.notify(tile);
        }
        for rel in building_type.blocked_tiles() {
            self.occupancy.set_blocked(pos.offset(rel), true)?;
        }
        if let Some(radius) = building_type.occupation_radius() {
            self.occupy_area(&Shape::Circle { radius }, pos, player)?;
        }
        debug!(?building_type, x = pos.x, y = pos.y, player = player.0, "Building placed");
        Ok(object)
    }

    /// Remove the building anchored at `pos`, freeing its footprint and
    /// territory.
    ///
    /// # Errors
    ///
    /// [`GridError::InvalidTransition`] if no building is anchored there.
    pub fn remove_building(&mut self, pos: TilePos) -> Result<PlacedObject> {
        let placed = self
            .objects
            .remove_kind(pos, ObjectKind::Building)?
            .ok_or_else(|| {
                GridError::invalid(format!("no building at ({}, {})", pos.x, pos.y))
            })?;
        let MapObject::Building {
            building_type,
            owner,
            ..
        } = placed.object
        else {
            return Err(GridError::invalid("building slot held another object"));
        };
        for tile in building_type.footprint().tiles(pos) {
            if self.dims.in_bounds(tile) {
                self.occupancy.set_blocked_and_protected(tile, false)?;
                self.notify(tile);
            }
        }
        if let Some(radius) = building_type.occupation_radius() {
            self.free_area(&Shape::Circle { radius }, pos, owner)?;
        }
        debug!(?building_type, x = pos.x, y = pos.y, "Building removed");
        Ok(placed)
    }

    // ========================================================================
    // Construction marks
    // ========================================================================

    /// Show construction marks for a building type in a screen region.
    pub fn show_construction_marks(&mut self, query: ConstructionQuery) -> Result<()> {
        let layers = LayerRefs {
            terrain: &self.terrain,
            occupancy: &self.occupancy,
            objects: &self.objects,
            units: &self.units,
            partitions: &self.partitions,
        };
        self.construction.show(&layers, query)
    }

    /// Remove every construction mark.
    pub fn hide_construction_marks(&mut self) {
        self.construction.hide();
    }

    /// Set one construction mark directly.
    pub fn mark_construction(&mut self, pos: TilePos, value: Option<u8>) -> Result<()> {
        self.construction.mark(pos, value)
    }

    /// Construction mark of a tile.
    pub fn construction_mark(&self, pos: TilePos) -> Result<Option<u8>> {
        self.construction.mark_at(pos)
    }

    // ========================================================================
    // Searches
    // ========================================================================

    /// The live blocking/cost oracle.
    #[must_use]
    pub const fn path_map(&self) -> WorldPathMap<'_> {
        WorldPathMap::new(self)
    }

    /// Cheapest path from `start` to `goal`.
    pub fn find_path(
        &self,
        requester: &Requester,
        start: TilePos,
        goal: TilePos,
    ) -> Result<Option<Path>> {
        astar::find_path(&self.path_map(), requester, start, goal)
    }

    /// Cheapest path to any of `targets`.
    pub fn find_nearest_target(
        &self,
        requester: &Requester,
        start: TilePos,
        targets: &[TilePos],
    ) -> Result<Option<Path>> {
        dijkstra::find_nearest_target(&self.path_map(), requester, start, targets)
    }

    /// Cheapest path to a tile fitting `search` within `radius`.
    pub fn find_nearest_matching(
        &self,
        requester: &Requester,
        start: TilePos,
        search: SearchType,
        radius: u32,
    ) -> Result<Option<Path>> {
        dijkstra::find_nearest_matching(&self.path_map(), requester, start, search, radius)
    }

    /// Nearest tile fitting `search` around a work center.
    pub fn find_in_area(
        &self,
        requester: &Requester,
        center: TilePos,
        radius: u32,
        search: SearchType,
    ) -> Result<Option<TilePos>> {
        area::find_in_area(&self.path_map(), requester, center, radius, search)
    }

    /// Whether `pos` fits `search` for `requester`.
    pub fn fits_search_type(
        &self,
        requester: &Requester,
        pos: TilePos,
        search: SearchType,
    ) -> Result<bool> {
        search.fits(self, requester, pos)
    }

    // ========================================================================
    // Correctors
    // ========================================================================

    /// Run every corrector over its pending notifications and apply the
    /// landmark actions. Consequences of applied actions are picked up by
    /// the next call.
    pub fn run_correctors(&mut self) -> Result<CorrectionReport> {
        let layers = LayerRefs {
            terrain: &self.terrain,
            occupancy: &self.occupancy,
            objects: &self.objects,
            units: &self.units,
            partitions: &self.partitions,
        };
        let mut report = CorrectionReport {
            borders_flipped: self.borders.run(&layers),
            marks_refreshed: self.construction.run(&layers)?,
            fog_events: self.fog.run(),
            ..CorrectionReport::default()
        };
        let actions = self.landmarks.run(&layers);

        for action in actions {
            match action {
                LandmarkAction::AdoptPocket { player, tiles } => {
                    for pos in tiles {
                        if self.partitions.change_owner(pos, Some(player))? {
                            report.adopted_tiles += 1;
                        }
                    }
                }
                LandmarkAction::DestroyBuilding { pos, id, .. } => {
                    let still_there = self
                        .objects
                        .get(pos, ObjectKind::Building)?
                        .is_some_and(|o| matches!(o.object, MapObject::Building { id: b, .. } if b == id));
                    if still_there {
                        self.remove_building(pos)?;
                        report.destroyed.push(id);
                    } else {
                        warn!(x = pos.x, y = pos.y, ?id, "Building to destroy is gone");
                    }
                }
            }
        }
        self.flush_ownership_changes()?;
        Ok(report)
    }

    /// Regenerate every derived structure from the persistent layers:
    /// fresh queues, border flags, cleared construction marks, and fog
    /// counters re-announced from the units on the grid. Explored fog bits
    /// are kept.
    pub fn rebuild_derived(&mut self) -> Result<()> {
        let capacity = self.config.corrector_queue_capacity;
        self.borders = BorderCorrector::new(self.dims, capacity);
        self.landmarks = LandmarkCorrector::new(self.dims, self.config.max_pocket_size, capacity);
        self.construction = ConstructionCorrector::new(self.dims, capacity);
        self.borders.rebuild(&self.partitions);

        let explored = self.fog.explored();
        self.fog = FogCorrector::new(self.dims);
        self.fog.restore_explored(explored)?;
        for (pos, unit) in self.units.iter() {
            self.fog.send(FogEvent::Appear {
                player: unit.player,
                pos,
                radius: unit.kind.vision_radius(),
            });
        }
        self.fog.run();
        self.partitions.take_changed();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::CropStage;
    use crate::unit_kind::UnitKind;

    const P0: PlayerId = PlayerId(0);
    const P1: PlayerId = PlayerId(1);

    fn owned_world(player: PlayerId) -> World {
        let dims = GridDims::new(16, 16);
        let mut world = World::new(dims, WorldConfig::default());
        for pos in dims.positions() {
            world.change_owner(pos, Some(player)).unwrap();
        }
        world
    }

    #[test]
    fn test_stone_blocks_until_used_up() {
        let mut world = World::new(GridDims::new(8, 8), WorldConfig::default());
        let pos = TilePos::new(3, 3);
        world.add_object(pos, MapObject::Stone { capacity: 2 }).unwrap();
        assert!(world.occupancy().is_blocked(pos).unwrap());
        assert!(!world.cut_stone(pos).unwrap());
        assert!(world.cut_stone(pos).unwrap());
        assert!(!world.occupancy().is_blocked(pos).unwrap());
    }

    #[test]
    fn test_buildings_only_through_place_building() {
        let mut world = owned_world(P0);
        let building = MapObject::Building {
            id: BuildingId(1),
            building_type: BuildingType::Sawmill,
            owner: P0,
        };
        assert!(world.add_object(TilePos::new(5, 5), building).is_err());
    }

    #[test]
    fn test_place_and_remove_building() {
        let mut world = owned_world(P0);
        let pos = TilePos::new(6, 6);
        world
            .place_building(pos, BuildingId(3), BuildingType::Sawmill, P0)
            .unwrap();
        assert!(world.occupancy().is_blocked(pos).unwrap());
        assert!(world.occupancy().is_protected(TilePos::new(8, 6)).unwrap());
        // The door is protected but walkable.
        let door = pos.offset(crate::buildings::DOOR);
        assert!(world.occupancy().is_protected(door).unwrap());
        assert!(!world.occupancy().is_blocked(door).unwrap());
        assert!(!world
            .can_construct_at(TilePos::new(8, 6), BuildingType::Tower, P0)
            .unwrap());

        world.remove_building(pos).unwrap();
        assert!(!world.occupancy().is_blocked(pos).unwrap());
        assert!(!world.occupancy().is_protected(TilePos::new(8, 6)).unwrap());
        assert!(world.remove_building(pos).is_err());
    }

    #[test]
    fn test_tower_claims_and_releases_territory() {
        let mut world = World::new(GridDims::new(24, 24), WorldConfig::default());
        let pos = TilePos::new(12, 12);
        for tile in crate::coords::hex_circle(pos, 1) {
            world.change_owner(tile, Some(P1)).unwrap();
        }
        world
            .place_building(pos, BuildingId(1), BuildingType::Tower, P1)
            .unwrap();
        assert_eq!(world.partitions().player_at(TilePos::new(20, 12)).unwrap(), Some(P1));
        assert!(world.partitions().is_enforced_by_tower(TilePos::new(20, 12)).unwrap());

        world.remove_building(pos).unwrap();
        assert_eq!(world.partitions().player_at(TilePos::new(20, 12)).unwrap(), None);
    }

    #[test]
    fn test_constructable_position_around() {
        let mut world = owned_world(P0);
        let pos = TilePos::new(6, 6);
        world
            .add_object(pos, MapObject::Corn(CropStage::Growing))
            .unwrap();
        let found = world
            .get_constructable_position_around(pos, BuildingType::Lumberjack, P0)
            .unwrap();
        assert!(found.is_none());
        let found = world
            .get_constructable_position_around(TilePos::new(9, 9), BuildingType::Lumberjack, P0)
            .unwrap();
        assert_eq!(found, Some(TilePos::new(9, 9)));
    }

    #[test]
    fn test_stack_offers_follow_the_market() {
        let mut world = owned_world(P0);
        let pos = TilePos::new(4, 4);
        world.push_material(pos, MaterialType::Plank).unwrap();
        world.push_material(pos, MaterialType::Plank).unwrap();
        let handle = world.partition_handle(pos).unwrap();
        assert_eq!(
            handle.with_board(|b| b.market.offered(pos, MaterialType::Plank)).unwrap(),
            2
        );
        world.withdraw_material(pos, MaterialType::Plank).unwrap();
        assert_eq!(
            handle.with_board(|b| b.market.offered(pos, MaterialType::Plank)).unwrap(),
            1
        );
        assert!(world.pop_material(pos, MaterialType::Stone).is_err());
        assert!(world.withdraw_material(pos, MaterialType::Stone).is_err());
    }

    #[test]
    fn test_pickup_after_transfer_keeps_remaining_offer() {
        let mut world = owned_world(P0);
        let pile = TilePos::new(3, 3);
        world.push_material(pile, MaterialType::Plank).unwrap();
        world.push_material(pile, MaterialType::Plank).unwrap();
        world
            .request_material(TilePos::new(10, 10), MaterialType::Plank, 0, 1)
            .unwrap();

        let handle = world.partition_handle(pile).unwrap();
        let transfer = handle.next_transfer().unwrap().unwrap();
        assert_eq!(transfer.from, pile);
        assert_eq!(world.pop_material(pile, MaterialType::Plank).unwrap(), 1);

        let offered = handle
            .with_board(|b| b.market.offered(pile, MaterialType::Plank))
            .unwrap();
        let stacked = u32::from(world.objects().stack_size(pile, MaterialType::Plank).unwrap());
        assert_eq!(offered, stacked);
        assert_eq!(offered, 1);
    }

    #[test]
    fn test_claimed_tile_offers_its_stack() {
        let mut world = World::new(GridDims::new(8, 8), WorldConfig::default());
        let pile = TilePos::new(4, 4);
        world.push_material(pile, MaterialType::Stone).unwrap();
        world.push_material(pile, MaterialType::Stone).unwrap();

        world.change_owner(pile, Some(P0)).unwrap();
        let offered = world
            .partition_handle(pile)
            .unwrap()
            .with_board(|b| b.market.offered(pile, MaterialType::Stone))
            .unwrap();
        assert_eq!(offered, 2);

        // Moving to another player carries the offer instead of adding one.
        world.change_owner(pile, Some(P1)).unwrap();
        let offered = world
            .partition_handle(pile)
            .unwrap()
            .with_board(|b| b.market.offered(pile, MaterialType::Stone))
            .unwrap();
        assert_eq!(offered, 2);
    }

    #[test]
    fn test_release_requests_reoffers_delivered_material() {
        let mut world = owned_world(P0);
        let site = TilePos::new(8, 8);
        world
            .request_material(site, MaterialType::Stone, 1, 4)
            .unwrap();
        world.objects.push_material(site, MaterialType::Stone, 8).unwrap();
        world.objects.push_material(site, MaterialType::Stone, 8).unwrap();

        assert_eq!(world.release_requests_at(site, MaterialType::Stone).unwrap(), 1);
        let handle = world.partition_handle(site).unwrap();
        let (requests, offered) = handle
            .with_board(|b| (b.market.requests().count(), b.market.offered(site, MaterialType::Stone)))
            .unwrap();
        assert_eq!(requests, 0);
        assert_eq!(offered, 2);
    }

    #[test]
    fn test_move_unit_keeps_state_on_failure() {
        let mut world = World::new(GridDims::new(8, 8), WorldConfig::default());
        let a = UnitInfo::new(UnitId(1), P0, UnitKind::Pioneer);
        let b = UnitInfo::new(UnitId(2), P1, UnitKind::Pioneer);
        world.enter_unit(TilePos::new(1, 1), a).unwrap();
        world.enter_unit(TilePos::new(2, 1), b).unwrap();

        assert!(world
            .move_unit(TilePos::new(1, 1), TilePos::new(2, 1), UnitId(1))
            .is_err());
        assert_eq!(world.units().unit_at(TilePos::new(1, 1)).unwrap(), Some(&a));

        world
            .move_unit(TilePos::new(1, 1), TilePos::new(1, 2), UnitId(1))
            .unwrap();
        assert!(world.units().unit_at(TilePos::new(1, 1)).unwrap().is_none());
    }

    #[test]
    fn test_units_drive_fog() {
        let mut world = World::new(GridDims::new(20, 20), WorldConfig::default());
        let scout = UnitInfo::new(UnitId(1), P0, UnitKind::Thief);
        world.enter_unit(TilePos::new(5, 5), scout).unwrap();
        world.run_correctors().unwrap();
        assert_eq!(world.visibility(P0, TilePos::new(10, 5)).unwrap(), Visibility::Visible);

        world
            .move_unit(TilePos::new(5, 5), TilePos::new(15, 5), UnitId(1))
            .unwrap();
        world.run_correctors().unwrap();
        assert_eq!(world.visibility(P0, TilePos::new(5, 5)).unwrap(), Visibility::Explored);
        assert_eq!(world.visibility(P0, TilePos::new(15, 5)).unwrap(), Visibility::Visible);
    }

    #[test]
    fn test_lost_ground_destroys_building() {
        let mut world = owned_world(P0);
        let pos = TilePos::new(6, 6);
        world
            .place_building(pos, BuildingId(9), BuildingType::Lumberjack, P0)
            .unwrap();
        world.run_correctors().unwrap();

        world.change_owner(pos, Some(P1)).unwrap();
        let report = world.run_correctors().unwrap();
        assert_eq!(report.destroyed, vec![BuildingId(9)]);
        assert!(!world.occupancy().is_protected(pos).unwrap());
    }

    #[test]
    fn test_protected_tile_refuses_manual_blocking() {
        let mut world = owned_world(P0);
        world
            .place_building(TilePos::new(6, 6), BuildingId(1), BuildingType::Forester, P0)
            .unwrap();
        assert!(world.set_blocked(TilePos::new(7, 7), true).is_err());
        assert!(world.set_blocked(TilePos::new(12, 12), true).unwrap());
    }
}
