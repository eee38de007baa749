//! Player territories as connected partitions.
//!
//! Every owned tile belongs to exactly one partition: a maximal connected
//! (6-neighbour) set of tiles of one player. Neutral tiles share
//! [`PartitionId::NEUTRAL`]. Ownership changes go through
//! [`PartitionEngine::change_owner`], which repairs membership locally:
//!
//! - joining a tile merges every adjacent partition of the new owner into
//!   the largest one (flood-fill relabel of the smaller ones);
//! - leaving a tile runs a split check on the 6-ring around it and only
//!   floods when the ring shows more than one arc of the old partition.
//!
//! Each partition carries a [`PartitionBoard`] (jobless pools and material
//! market) behind its own mutex so completion callbacks on other threads
//! can enqueue through a [`PartitionHandle`]. Merged-away partitions are
//! retired and their handles answer [`GridError::StalePartition`].

mod jobless;
mod market;

pub use jobless::{JoblessPools, JoblessWorker};
pub use market::{MaterialMarket, MaterialRequest, MaterialTransfer};

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::components::{PlayerId, RequestId, UnitId};
use crate::coords::{GridDims, Shape, TilePos};
use crate::error::{GridError, Result};
use crate::layers::MaterialType;
use crate::unit_kind::WorkerRole;

/// Partition identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionId(pub u32);

impl PartitionId {
    /// Shared id of all unowned tiles.
    pub const NEUTRAL: Self = Self(0);

    /// Whether this is the neutral partition.
    #[must_use]
    pub const fn is_neutral(self) -> bool {
        self.0 == 0
    }
}

/// Jobless pools and material market of one partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionBoard {
    /// Idle workers by role.
    pub jobless: JoblessPools,
    /// Offers and requests.
    pub market: MaterialMarket,
}

impl PartitionBoard {
    fn extract_where(&mut self, mut pred: impl FnMut(TilePos) -> bool) -> Self {
        Self {
            jobless: self.jobless.extract_where(&mut pred),
            market: self.market.extract_where(&mut pred),
        }
    }

    fn absorb(&mut self, other: Self) {
        self.jobless.absorb(other.jobless);
        self.market.absorb(other.market);
    }

    fn is_empty(&self) -> bool {
        self.jobless.is_empty() && self.market.is_empty()
    }
}

fn lock(board: &Mutex<PartitionBoard>) -> MutexGuard<'_, PartitionBoard> {
    board.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Read-only summary of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionInfo {
    /// Partition id.
    pub id: PartitionId,
    /// Owning player.
    pub player: PlayerId,
    /// Number of tiles.
    pub size: u32,
}

#[derive(Debug)]
struct Partition {
    player: PlayerId,
    size: u32,
    board: Arc<Mutex<PartitionBoard>>,
    retired: Arc<AtomicBool>,
}

impl Partition {
    fn new(player: PlayerId, size: u32, board: PartitionBoard) -> Self {
        Self {
            player,
            size,
            board: Arc::new(Mutex::new(board)),
            retired: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// One tile's owner change, as reported by [`PartitionEngine::take_changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerChange {
    /// The tile.
    pub pos: TilePos,
    /// Owner before the change.
    pub previous: Option<PlayerId>,
}

/// Tower enforcement record of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enforcement {
    /// Player whose military buildings hold the tile.
    pub player: PlayerId,
    /// Number of overlapping occupation areas.
    pub count: u16,
}

// ============================================================================
// Handle
// ============================================================================

/// Shareable access to one partition's board.
///
/// Cloneable and `Send`; every operation fails with
/// [`GridError::StalePartition`] once the partition was merged away or
/// emptied, after which the caller must re-resolve ownership.
#[derive(Debug, Clone)]
pub struct PartitionHandle {
    id: PartitionId,
    board: Arc<Mutex<PartitionBoard>>,
    retired: Arc<AtomicBool>,
    sequence: Arc<AtomicU64>,
}

impl PartitionHandle {
    /// The partition this handle points to.
    #[must_use]
    pub const fn id(&self) -> PartitionId {
        self.id
    }

    /// Run `f` on the live board.
    pub fn with_board<R>(&self, f: impl FnOnce(&mut PartitionBoard) -> R) -> Result<R> {
        let mut board = lock(&self.board);
        // Checked under the lock; retirement happens while holding it too.
        if self.retired.load(Ordering::Acquire) {
            return Err(GridError::StalePartition(self.id));
        }
        Ok(f(&mut board))
    }

    /// Enqueue an idle worker.
    pub fn add_jobless(&self, role: WorkerRole, worker: JoblessWorker) -> Result<()> {
        self.with_board(|b| b.jobless.add(role, worker))
    }

    /// Pop the longest-waiting worker of `role`.
    pub fn take_jobless(&self, role: WorkerRole) -> Result<Option<JoblessWorker>> {
        self.with_board(|b| b.jobless.take(role))
    }

    /// Pop the worker of `role` closest to `target`.
    pub fn take_jobless_nearest(
        &self,
        role: WorkerRole,
        target: TilePos,
    ) -> Result<Option<JoblessWorker>> {
        self.with_board(|b| b.jobless.take_nearest(role, target))
    }

    /// Remove a worker from the pools.
    pub fn remove_jobless(&self, unit: UnitId) -> Result<bool> {
        self.with_board(|b| b.jobless.remove(unit))
    }

    /// Offer `amount` units of `material` lying at `pos`.
    pub fn offer_material(&self, pos: TilePos, material: MaterialType, amount: u32) -> Result<()> {
        self.with_board(|b| b.market.offer(pos, material, amount))
    }

    /// Withdraw one offered unit.
    pub fn remove_offer(&self, pos: TilePos, material: MaterialType) -> Result<bool> {
        self.with_board(|b| b.market.remove_offer(pos, material))
    }

    /// Request `amount` units of `material` delivered to `pos`.
    pub fn request_material(
        &self,
        pos: TilePos,
        material: MaterialType,
        priority: u8,
        amount: u32,
    ) -> Result<RequestId> {
        self.with_board(|b| {
            let id = RequestId(self.sequence.fetch_add(1, Ordering::Relaxed));
            b.market.request(MaterialRequest {
                id,
                pos,
                material,
                priority,
                remaining: amount,
            });
            id
        })
    }

    /// Cancel a request.
    pub fn cancel_request(&self, id: RequestId) -> Result<bool> {
        self.with_board(|b| b.market.cancel_request(id))
    }

    /// Drop every request for `material` at `pos`.
    pub fn release_requests_at(&self, pos: TilePos, material: MaterialType) -> Result<usize> {
        self.with_board(|b| b.market.release_requests_at(pos, material))
    }

    /// Match the next request with an offer.
    pub fn next_transfer(&self) -> Result<Option<MaterialTransfer>> {
        self.with_board(|b| b.market.next_transfer())
    }
}

// ============================================================================
// Persistent form
// ============================================================================

/// One partition in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRecord {
    /// Partition id.
    pub id: PartitionId,
    /// Owner.
    pub player: PlayerId,
    /// Tile count.
    pub size: u32,
    /// Board contents.
    pub board: PartitionBoard,
}

/// Plain-data form of the whole engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionState {
    /// Partition id per tile, row-major.
    pub tile_partition: Vec<PartitionId>,
    /// Live partitions in id order.
    pub partitions: Vec<PartitionRecord>,
    /// Next id to allocate.
    pub next_partition: u32,
    /// Tower enforcement per tile.
    pub enforcement: Vec<Option<Enforcement>>,
    /// Next request sequence number.
    pub sequence: u64,
}

// ============================================================================
// Engine
// ============================================================================

/// Ownership partitioning of the grid.
#[derive(Debug)]
pub struct PartitionEngine {
    dims: GridDims,
    tile_partition: Vec<PartitionId>,
    partitions: BTreeMap<PartitionId, Partition>,
    next_partition: u32,
    enforcement: Vec<Option<Enforcement>>,
    sequence: Arc<AtomicU64>,
    changed: Vec<OwnerChange>,
}

impl PartitionEngine {
    /// Create an engine with every tile neutral.
    #[must_use]
    pub fn new(dims: GridDims) -> Self {
        Self {
            dims,
            tile_partition: vec![PartitionId::NEUTRAL; dims.tile_count()],
            partitions: BTreeMap::new(),
            next_partition: 1,
            enforcement: vec![None; dims.tile_count()],
            sequence: Arc::new(AtomicU64::new(1)),
            changed: Vec::new(),
        }
    }

    /// Grid dimensions.
    #[must_use]
    pub const fn dims(&self) -> GridDims {
        self.dims
    }

    /// Partition of a tile.
    pub fn partition_at(&self, pos: TilePos) -> Result<PartitionId> {
        Ok(self.tile_partition[self.dims.index(pos)?])
    }

    /// Owner of a tile; `None` when neutral.
    pub fn player_at(&self, pos: TilePos) -> Result<Option<PlayerId>> {
        let id = self.partition_at(pos)?;
        Ok(self.owner_of(id))
    }

    /// Owner by storage index. The index must come from [`GridDims`].
    pub(crate) fn player_at_index(&self, index: usize) -> Option<PlayerId> {
        self.owner_of(self.tile_partition[index])
    }

    fn owner_of(&self, id: PartitionId) -> Option<PlayerId> {
        if id.is_neutral() {
            return None;
        }
        self.partitions.get(&id).map(|p| p.player)
    }

    /// Summary of a live partition.
    ///
    /// # Errors
    ///
    /// [`GridError::StalePartition`] for retired ids;
    /// [`GridError::InvalidTransition`] for the neutral partition.
    pub fn partition(&self, id: PartitionId) -> Result<PartitionInfo> {
        let partition = self.live(id)?;
        Ok(PartitionInfo {
            id,
            player: partition.player,
            size: partition.size,
        })
    }

    /// All live partitions in id order.
    pub fn partitions(&self) -> impl Iterator<Item = PartitionInfo> + '_ {
        self.partitions.iter().map(|(&id, p)| PartitionInfo {
            id,
            player: p.player,
            size: p.size,
        })
    }

    fn live(&self, id: PartitionId) -> Result<&Partition> {
        if id.is_neutral() {
            return Err(GridError::invalid("the neutral partition has no board"));
        }
        self.partitions
            .get(&id)
            .ok_or(GridError::StalePartition(id))
    }

    /// Handle to a partition's board.
    pub fn handle(&self, id: PartitionId) -> Result<PartitionHandle> {
        let partition = self.live(id)?;
        Ok(PartitionHandle {
            id,
            board: Arc::clone(&partition.board),
            retired: Arc::clone(&partition.retired),
            sequence: Arc::clone(&self.sequence),
        })
    }

    /// Handle to the board of the partition owning `pos`.
    ///
    /// # Errors
    ///
    /// [`GridError::InvalidTransition`] when the tile is neutral.
    pub fn handle_at(&self, pos: TilePos) -> Result<PartitionHandle> {
        self.handle(self.partition_at(pos)?)
    }

    /// Whether a military building of any player holds the tile.
    pub fn is_enforced_by_tower(&self, pos: TilePos) -> Result<bool> {
        Ok(self.enforcement[self.dims.index(pos)?].is_some())
    }

    /// Player whose military buildings hold the tile.
    pub fn enforcing_player(&self, pos: TilePos) -> Result<Option<PlayerId>> {
        Ok(self.enforcement[self.dims.index(pos)?].map(|e| e.player))
    }

    /// Tiles whose owner changed since the last call, in change order.
    pub fn take_changed(&mut self) -> Vec<OwnerChange> {
        std::mem::take(&mut self.changed)
    }

    // ------------------------------------------------------------------
    // Ownership changes
    // ------------------------------------------------------------------

    /// Reassign one tile. Returns whether the owner actually changed.
    ///
    /// Board entries located on the tile follow it into the new owner's
    /// partition, or are dropped when it becomes neutral.
    pub fn change_owner(&mut self, pos: TilePos, owner: Option<PlayerId>) -> Result<bool> {
        let index = self.dims.index(pos)?;
        let old_id = self.tile_partition[index];
        let previous = self.owner_of(old_id);
        if previous == owner {
            return Ok(false);
        }

        let carried = self.detach(index, old_id);
        match owner {
            Some(player) => {
                let new_id = self.attach(pos, index, player);
                if !carried.is_empty() {
                    if let Some(partition) = self.partitions.get(&new_id) {
                        lock(&partition.board).absorb(carried);
                    }
                }
            }
            None if !carried.is_empty() => {
                debug!(x = pos.x, y = pos.y, "Dropping board entries of neutralised tile");
            }
            None => {}
        }
        if !old_id.is_neutral() {
            self.split_check(pos, old_id);
        }
        self.changed.push(OwnerChange { pos, previous });

        #[cfg(feature = "debug-validation")]
        if let Err(e) = self.verify_connectivity() {
            panic!("partition invariant broken after change at ({}, {}): {e}", pos.x, pos.y);
        }
        Ok(true)
    }

    /// Claim every in-bounds tile of `shape` for `player`.
    ///
    /// Tiles held by another player's military buildings are skipped. The
    /// claim is reference-counted per tile. Returns the tiles whose owner
    /// changed.
    pub fn occupy_area(
        &mut self,
        shape: &Shape,
        anchor: TilePos,
        player: PlayerId,
    ) -> Result<Vec<TilePos>> {
        self.dims.check(anchor)?;
        let mut changed = Vec::new();
        for pos in shape.tiles(anchor) {
            let Ok(index) = self.dims.index(pos) else {
                continue;
            };
            match &mut self.enforcement[index] {
                Some(e) if e.player != player => continue,
                Some(e) => e.count = e.count.saturating_add(1),
                slot @ None => *slot = Some(Enforcement { player, count: 1 }),
            }
            if self.change_owner(pos, Some(player))? {
                changed.push(pos);
            }
        }
        debug!(
            x = anchor.x,
            y = anchor.y,
            player = player.0,
            changed = changed.len(),
            "Occupied area"
        );
        Ok(changed)
    }

    /// Release `player`'s claim on every in-bounds tile of `shape`.
    ///
    /// Tiles whose claim count drops to zero become neutral. Returns the
    /// tiles whose owner changed.
    pub fn free_area(
        &mut self,
        shape: &Shape,
        anchor: TilePos,
        player: PlayerId,
    ) -> Result<Vec<TilePos>> {
        self.dims.check(anchor)?;
        let mut freed = Vec::new();
        for pos in shape.tiles(anchor) {
            let Ok(index) = self.dims.index(pos) else {
                continue;
            };
            let released = match &mut self.enforcement[index] {
                Some(e) if e.player == player => {
                    e.count -= 1;
                    e.count == 0
                }
                _ => continue,
            };
            if released {
                self.enforcement[index] = None;
                if self.change_owner(pos, None)? {
                    freed.push(pos);
                }
            }
        }
        debug!(
            x = anchor.x,
            y = anchor.y,
            player = player.0,
            freed = freed.len(),
            "Freed area"
        );
        Ok(freed)
    }

    fn allocate(&mut self, player: PlayerId, size: u32) -> PartitionId {
        let id = PartitionId(self.next_partition);
        self.next_partition += 1;
        self.partitions
            .insert(id, Partition::new(player, size, PartitionBoard::default()));
        id
    }

    /// Remove a partition, marking its handles stale. Returns its board.
    fn retire(&mut self, id: PartitionId) -> PartitionBoard {
        let Some(partition) = self.partitions.remove(&id) else {
            return PartitionBoard::default();
        };
        let mut board = lock(&partition.board);
        partition.retired.store(true, Ordering::Release);
        std::mem::take(&mut *board)
    }

    /// Take the tile out of its partition, returning the entries on it.
    fn detach(&mut self, index: usize, old_id: PartitionId) -> PartitionBoard {
        self.tile_partition[index] = PartitionId::NEUTRAL;
        if old_id.is_neutral() {
            return PartitionBoard::default();
        }
        let pos = self.dims.pos_of(index);
        let Some(partition) = self.partitions.get_mut(&old_id) else {
            return PartitionBoard::default();
        };
        partition.size -= 1;
        let carried = lock(&partition.board).extract_where(|p| p == pos);
        if partition.size == 0 {
            let rest = self.retire(old_id);
            if !rest.is_empty() {
                debug!(id = old_id.0, "Dropping entries of emptied partition");
            }
        }
        carried
    }

    /// Put the tile into `player`'s territory, merging adjacent partitions.
    fn attach(&mut self, pos: TilePos, index: usize, player: PlayerId) -> PartitionId {
        let mut adjacent: Vec<(PartitionId, TilePos)> = Vec::with_capacity(6);
        for n in self.dims.neighbours(pos) {
            let id = self.tile_partition[self.dims.index_unchecked(n)];
            if self.owner_of(id) == Some(player) && !adjacent.iter().any(|(a, _)| *a == id) {
                adjacent.push((id, n));
            }
        }

        let target = adjacent
            .iter()
            .map(|&(id, _)| id)
            .max_by_key(|id| {
                let size = self.partitions.get(id).map_or(0, |p| p.size);
                (size, Reverse(*id))
            });
        let target = match target {
            Some(id) => id,
            None => self.allocate(player, 0),
        };

        for (id, seed) in adjacent {
            if id != target {
                self.merge_into(id, seed, target);
            }
        }
        self.tile_partition[index] = target;
        if let Some(partition) = self.partitions.get_mut(&target) {
            partition.size += 1;
        }
        target
    }

    fn merge_into(&mut self, from: PartitionId, seed: TilePos, into: PartitionId) {
        let start = self.dims.index_unchecked(seed);
        let mut queue = vec![start];
        self.tile_partition[start] = into;
        let mut head = 0;
        while head < queue.len() {
            let pos = self.dims.pos_of(queue[head]);
            head += 1;
            for n in self.dims.neighbours(pos) {
                let ni = self.dims.index_unchecked(n);
                if self.tile_partition[ni] == from {
                    self.tile_partition[ni] = into;
                    queue.push(ni);
                }
            }
        }

        let moved = self.retire(from);
        if let Some(target) = self.partitions.get_mut(&into) {
            target.size += queue.len() as u32;
            lock(&target.board).absorb(moved);
        }
        debug!(from = from.0, into = into.0, tiles = queue.len(), "Merged partitions");
    }

    /// Tiles of partition `id` connected to `seed`.
    fn component(&self, seed: usize, id: PartitionId, visited: &mut HashSet<usize>) -> Vec<usize> {
        let mut tiles = vec![seed];
        visited.insert(seed);
        let mut head = 0;
        while head < tiles.len() {
            let pos = self.dims.pos_of(tiles[head]);
            head += 1;
            for n in self.dims.neighbours(pos) {
                let ni = self.dims.index_unchecked(n);
                if self.tile_partition[ni] == id && visited.insert(ni) {
                    tiles.push(ni);
                }
            }
        }
        tiles
    }

    /// Split `id` if removing `pos` disconnected it.
    fn split_check(&mut self, pos: TilePos, id: PartitionId) {
        let Some(player) = self.owner_of(id) else {
            return;
        };
        let ring = pos.neighbours().map(|n| {
            self.dims.in_bounds(n) && self.tile_partition[self.dims.index_unchecked(n)] == id
        });
        // The 6-ring is a cycle, so one arc means the neighbours stay connected.
        let arcs = (0..6).filter(|&k| ring[k] && !ring[(k + 5) % 6]).count();
        if arcs <= 1 {
            return;
        }

        let mut visited = HashSet::new();
        let mut components = Vec::new();
        for (k, n) in pos.neighbours().into_iter().enumerate() {
            if ring[k] {
                let ni = self.dims.index_unchecked(n);
                if !visited.contains(&ni) {
                    components.push(self.component(ni, id, &mut visited));
                }
            }
        }
        if components.len() < 2 {
            return;
        }

        let keep = components
            .iter()
            .enumerate()
            .max_by_key(|(i, tiles)| (tiles.len(), Reverse(*i)))
            .map_or(0, |(i, _)| i);
        for (i, tiles) in components.into_iter().enumerate() {
            if i == keep {
                continue;
            }
            let new_id = self.allocate(player, tiles.len() as u32);
            for &t in &tiles {
                self.tile_partition[t] = new_id;
            }
            self.move_entries(id, new_id);
            if let Some(old) = self.partitions.get_mut(&id) {
                old.size -= tiles.len() as u32;
            }
            debug!(from = id.0, into = new_id.0, tiles = tiles.len(), "Split partition");
        }
    }

    /// Move board entries of `from` lying on tiles now labelled `to`.
    fn move_entries(&self, from: PartitionId, to: PartitionId) {
        let (Some(source), Some(target)) = (self.partitions.get(&from), self.partitions.get(&to))
        else {
            return;
        };
        let moved = lock(&source.board)
            .extract_where(|p| self.dims.index(p).is_ok_and(|i| self.tile_partition[i] == to));
        lock(&target.board).absorb(moved);
    }

    // ------------------------------------------------------------------
    // Validation and persistence
    // ------------------------------------------------------------------

    /// Check that every partition is one connected component of its size.
    ///
    /// # Errors
    ///
    /// [`GridError::InvalidTransition`] describing the first violation.
    pub fn verify_connectivity(&self) -> Result<()> {
        let mut seen: BTreeMap<PartitionId, usize> = BTreeMap::new();
        for (i, &id) in self.tile_partition.iter().enumerate() {
            if id.is_neutral() || seen.contains_key(&id) {
                continue;
            }
            let Some(partition) = self.partitions.get(&id) else {
                return Err(GridError::invalid(format!("tile {i} labelled with dead {id:?}")));
            };
            let reached = self.component(i, id, &mut HashSet::new()).len();
            let labelled = self.tile_partition.iter().filter(|&&t| t == id).count();
            if reached != labelled || labelled != partition.size as usize {
                return Err(GridError::invalid(format!(
                    "{id:?}: {reached} reachable, {labelled} labelled, size {}",
                    partition.size
                )));
            }
            seen.insert(id, reached);
        }
        if let Some((id, _)) = self.partitions.iter().find(|(id, _)| !seen.contains_key(id)) {
            return Err(GridError::invalid(format!("{id:?} owns no tiles")));
        }
        Ok(())
    }

    /// Plain-data copy of the engine.
    #[must_use]
    pub fn to_state(&self) -> PartitionState {
        PartitionState {
            tile_partition: self.tile_partition.clone(),
            partitions: self
                .partitions
                .iter()
                .map(|(&id, p)| PartitionRecord {
                    id,
                    player: p.player,
                    size: p.size,
                    board: lock(&p.board).clone(),
                })
                .collect(),
            next_partition: self.next_partition,
            enforcement: self.enforcement.clone(),
            sequence: self.sequence.load(Ordering::Relaxed),
        }
    }

    /// Rebuild an engine from its plain-data form.
    ///
    /// # Errors
    ///
    /// [`GridError::Snapshot`] when the per-tile vectors do not match `dims`.
    pub fn from_state(dims: GridDims, state: PartitionState) -> Result<Self> {
        if state.tile_partition.len() != dims.tile_count()
            || state.enforcement.len() != dims.tile_count()
        {
            return Err(GridError::Snapshot(format!(
                "partition state does not fit a {}x{} grid",
                dims.width, dims.height
            )));
        }
        let partitions = state
            .partitions
            .into_iter()
            .map(|r| (r.id, Partition::new(r.player, r.size, r.board)))
            .collect();
        Ok(Self {
            dims,
            tile_partition: state.tile_partition,
            partitions,
            next_partition: state.next_partition,
            enforcement: state.enforcement,
            sequence: Arc::new(AtomicU64::new(state.sequence)),
            changed: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P0: PlayerId = PlayerId(0);
    const P1: PlayerId = PlayerId(1);

    fn engine() -> PartitionEngine {
        PartitionEngine::new(GridDims::new(10, 10))
    }

    fn claim_row(engine: &mut PartitionEngine, y: i32, xs: std::ops::Range<i32>, p: PlayerId) {
        for x in xs {
            engine.change_owner(TilePos::new(x, y), Some(p)).unwrap();
        }
    }

    #[test]
    fn test_new_tiles_are_neutral() {
        let e = engine();
        assert_eq!(e.player_at(TilePos::new(3, 3)).unwrap(), None);
        assert_eq!(e.partition_at(TilePos::new(3, 3)).unwrap(), PartitionId::NEUTRAL);
        assert!(matches!(
            e.player_at(TilePos::new(10, 0)),
            Err(GridError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_adjacent_claims_share_partition() {
        let mut e = engine();
        claim_row(&mut e, 0, 0..5, P0);
        let id = e.partition_at(TilePos::new(0, 0)).unwrap();
        assert_eq!(e.partition_at(TilePos::new(4, 0)).unwrap(), id);
        assert_eq!(e.partition(id).unwrap().size, 5);
        assert!(!e.change_owner(TilePos::new(2, 0), Some(P0)).unwrap());
        e.verify_connectivity().unwrap();
    }

    #[test]
    fn test_bridge_tile_merges_into_larger() {
        let mut e = engine();
        claim_row(&mut e, 0, 0..2, P0);
        claim_row(&mut e, 0, 3..8, P0);
        let small = e.partition_at(TilePos::new(0, 0)).unwrap();
        let large = e.partition_at(TilePos::new(5, 0)).unwrap();
        assert_ne!(small, large);

        let stale = e.handle(small).unwrap();
        e.change_owner(TilePos::new(2, 0), Some(P0)).unwrap();
        assert_eq!(e.partition_at(TilePos::new(0, 0)).unwrap(), large);
        assert_eq!(e.partition(large).unwrap().size, 8);
        assert_eq!(e.partition(small), Err(GridError::StalePartition(small)));
        assert!(matches!(
            stale.take_jobless(WorkerRole::Bearer),
            Err(GridError::StalePartition(id)) if id == small
        ));
        e.verify_connectivity().unwrap();
    }

    #[test]
    fn test_removing_cut_tile_splits_and_moves_entries() {
        let mut e = engine();
        claim_row(&mut e, 4, 0..9, P0);
        let id = e.partition_at(TilePos::new(0, 4)).unwrap();
        let handle = e.handle(id).unwrap();
        handle
            .add_jobless(
                WorkerRole::Bearer,
                JoblessWorker {
                    unit: UnitId(1),
                    pos: TilePos::new(1, 4),
                },
            )
            .unwrap();
        handle
            .offer_material(TilePos::new(8, 4), MaterialType::Plank, 2)
            .unwrap();

        e.change_owner(TilePos::new(3, 4), None).unwrap();
        let left = e.partition_at(TilePos::new(1, 4)).unwrap();
        let right = e.partition_at(TilePos::new(7, 4)).unwrap();
        assert_ne!(left, right);
        // The larger side keeps the id.
        assert_eq!(right, id);
        assert_eq!(e.partition(left).unwrap().size, 3);
        assert_eq!(e.partition(right).unwrap().size, 5);

        let left_handle = e.handle(left).unwrap();
        assert_eq!(
            left_handle.take_jobless(WorkerRole::Bearer).unwrap().map(|w| w.unit),
            Some(UnitId(1))
        );
        assert_eq!(
            handle
                .with_board(|b| b.market.offered(TilePos::new(8, 4), MaterialType::Plank))
                .unwrap(),
            2
        );
        e.verify_connectivity().unwrap();
    }

    #[test]
    fn test_ring_with_single_arc_does_not_split() {
        let mut e = engine();
        // A filled hex of radius 1; removing the center leaves one ring.
        for p in crate::coords::hex_circle(TilePos::new(4, 4), 1) {
            e.change_owner(p, Some(P0)).unwrap();
        }
        e.change_owner(TilePos::new(4, 4), None).unwrap();
        assert_eq!(e.partitions().count(), 1);
        e.verify_connectivity().unwrap();
    }

    #[test]
    fn test_owner_change_carries_entries() {
        let mut e = engine();
        claim_row(&mut e, 0, 0..3, P0);
        claim_row(&mut e, 0, 4..6, P1);
        let pos = TilePos::new(2, 0);
        e.handle_at(pos)
            .unwrap()
            .offer_material(pos, MaterialType::Stone, 1)
            .unwrap();
        e.change_owner(pos, Some(P1)).unwrap();
        assert_eq!(e.player_at(pos).unwrap(), Some(P1));
        let offered = e
            .handle_at(pos)
            .unwrap()
            .with_board(|b| b.market.offered(pos, MaterialType::Stone))
            .unwrap();
        assert_eq!(offered, 1);
        let changes = e.take_changed();
        assert_eq!(changes.len(), 6);
        assert_eq!(changes[0].previous, None);
        assert_eq!(
            changes.last().copied(),
            Some(OwnerChange {
                pos,
                previous: Some(P0)
            })
        );
    }

    #[test]
    fn test_neutral_has_no_board() {
        let e = engine();
        assert!(matches!(
            e.handle_at(TilePos::new(0, 0)),
            Err(GridError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_tower_enforcement_blocks_other_players() {
        let mut e = engine();
        let tower = Shape::Circle { radius: 2 };
        let changed = e.occupy_area(&tower, TilePos::new(2, 2), P0).unwrap();
        assert_eq!(changed.len(), 19);
        assert!(e.is_enforced_by_tower(TilePos::new(2, 2)).unwrap());

        // Overlapping claim by P1 only takes unenforced tiles.
        let changed = e.occupy_area(&tower, TilePos::new(5, 2), P1).unwrap();
        assert!(changed.iter().all(|p| p.hex_distance(TilePos::new(2, 2)) > 2));
        assert_eq!(e.player_at(TilePos::new(4, 2)).unwrap(), Some(P0));

        let freed = e.free_area(&tower, TilePos::new(2, 2), P0).unwrap();
        assert_eq!(freed.len(), 19);
        assert_eq!(e.player_at(TilePos::new(4, 2)).unwrap(), None);
        e.verify_connectivity().unwrap();
    }

    #[test]
    fn test_overlapping_claims_are_counted() {
        let mut e = engine();
        let area = Shape::Circle { radius: 1 };
        e.occupy_area(&area, TilePos::new(3, 3), P0).unwrap();
        e.occupy_area(&area, TilePos::new(4, 3), P0).unwrap();
        let freed = e.free_area(&area, TilePos::new(3, 3), P0).unwrap();
        // Tiles shared with the second claim stay owned.
        assert!(!freed.contains(&TilePos::new(3, 3)));
        assert!(!freed.contains(&TilePos::new(4, 3)));
        assert!(freed.contains(&TilePos::new(2, 3)));
    }

    #[test]
    fn test_request_ids_are_sequential_across_partitions() {
        let mut e = engine();
        e.change_owner(TilePos::new(0, 0), Some(P0)).unwrap();
        e.change_owner(TilePos::new(9, 9), Some(P1)).unwrap();
        let a = e
            .handle_at(TilePos::new(0, 0))
            .unwrap()
            .request_material(TilePos::new(0, 0), MaterialType::Plank, 0, 1)
            .unwrap();
        let b = e
            .handle_at(TilePos::new(9, 9))
            .unwrap()
            .request_material(TilePos::new(9, 9), MaterialType::Plank, 0, 1)
            .unwrap();
        assert!(b.0 > a.0);
    }

    #[test]
    fn test_state_round_trip() {
        let mut e = engine();
        e.occupy_area(&Shape::Circle { radius: 2 }, TilePos::new(3, 3), P0)
            .unwrap();
        e.handle_at(TilePos::new(3, 3))
            .unwrap()
            .request_material(TilePos::new(3, 3), MaterialType::Coal, 2, 3)
            .unwrap();
        let state = e.to_state();
        let restored = PartitionEngine::from_state(e.dims(), state.clone()).unwrap();
        assert_eq!(restored.to_state(), state);
        restored.verify_connectivity().unwrap();
    }
}
