//! Stackable map objects per tile.
//!
//! A tile holds at most one object of each [`ObjectKind`], and at most one
//! "ground cover" object (tree, crop, stone, material stack or building).
//! Resource signs sit on top of anything.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::buildings::BuildingType;
use crate::components::{BuildingId, ObjectId, PlayerId};
use crate::coords::{GridDims, TilePos};
use crate::error::{GridError, Result};
use crate::layers::ResourceKind;

/// Growth stage of a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TreeStage {
    /// Freshly planted.
    Sapling,
    /// Grown; can be cut.
    Adult,
}

/// Growth stage of a crop field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CropStage {
    /// Still growing.
    Growing,
    /// Ready for harvest.
    Adult,
}

/// Transportable materials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MaterialType {
    /// Raw tree trunk.
    Trunk,
    /// Sawn plank.
    Plank,
    /// Cut stone.
    Stone,
    /// Coal.
    Coal,
    /// Iron ore.
    IronOre,
    /// Gold ore.
    Gold,
    /// Harvested crop.
    Crop,
    /// Caught fish.
    Fish,
    /// Baked bread.
    Bread,
    /// Tool: hammer.
    Hammer,
    /// Tool: axe.
    Axe,
    /// Tool: saw.
    Saw,
    /// Tool: pick.
    Pick,
    /// Weapon blade.
    Blade,
}

/// An object lying on a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapObject {
    /// A tree.
    Tree(TreeStage),
    /// A crop field.
    Corn(CropStage),
    /// A stone that can be cut `capacity` more times.
    Stone {
        /// Remaining cuts.
        capacity: u8,
    },
    /// A pile of one material.
    Stack {
        /// Stacked material.
        material: MaterialType,
        /// Pile height.
        count: u8,
    },
    /// A building anchored on this tile.
    Building {
        /// External building id.
        id: BuildingId,
        /// Building type, for footprint lookups.
        building_type: BuildingType,
        /// Owner at placement time.
        owner: PlayerId,
    },
    /// Marker left by a geologist.
    ResourceSign(ResourceKind),
}

/// Discriminant of [`MapObject`], used as the per-tile key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// [`MapObject::Tree`]
    Tree,
    /// [`MapObject::Corn`]
    Corn,
    /// [`MapObject::Stone`]
    Stone,
    /// [`MapObject::Stack`]
    Stack,
    /// [`MapObject::Building`]
    Building,
    /// [`MapObject::ResourceSign`]
    ResourceSign,
}

impl ObjectKind {
    /// Kinds that occupy the ground; at most one per tile.
    #[must_use]
    pub const fn is_ground_cover(self) -> bool {
        !matches!(self, Self::ResourceSign)
    }
}

impl MapObject {
    /// The kind key of this object.
    #[must_use]
    pub const fn kind(&self) -> ObjectKind {
        match self {
            Self::Tree(_) => ObjectKind::Tree,
            Self::Corn(_) => ObjectKind::Corn,
            Self::Stone { .. } => ObjectKind::Stone,
            Self::Stack { .. } => ObjectKind::Stack,
            Self::Building { .. } => ObjectKind::Building,
            Self::ResourceSign(_) => ObjectKind::ResourceSign,
        }
    }

    /// Whether a worker can harvest this object now.
    #[must_use]
    pub const fn is_cuttable(&self) -> bool {
        match self {
            Self::Tree(stage) => matches!(stage, TreeStage::Adult),
            Self::Corn(stage) => matches!(stage, CropStage::Adult),
            Self::Stone { capacity } => *capacity > 0,
            _ => false,
        }
    }

    /// Whether this object blocks movement while it exists.
    #[must_use]
    pub const fn is_blocking(&self) -> bool {
        matches!(self, Self::Stone { .. })
    }
}

/// An object together with its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedObject {
    /// Identity assigned on placement.
    pub id: ObjectId,
    /// The object.
    pub object: MapObject,
}

type TileObjects = SmallVec<[PlacedObject; 2]>;

/// Object layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectLayer {
    dims: GridDims,
    tiles: Vec<TileObjects>,
    next_id: u64,
}

impl ObjectLayer {
    /// Create an empty layer.
    #[must_use]
    pub fn new(dims: GridDims) -> Self {
        Self {
            dims,
            tiles: vec![TileObjects::new(); dims.tile_count()],
            next_id: 1,
        }
    }

    /// Whether the storage matches `dims` (restored layers).
    pub(crate) fn fits(&self, dims: GridDims) -> bool {
        self.dims == dims && self.tiles.len() == dims.tile_count()
    }

    /// Objects on a tile, in placement order.
    pub fn objects(&self, pos: TilePos) -> Result<&[PlacedObject]> {
        Ok(&self.tiles[self.dims.index(pos)?])
    }

    /// The object of `kind` on a tile, if any.
    pub fn get(&self, pos: TilePos, kind: ObjectKind) -> Result<Option<&PlacedObject>> {
        Ok(self.tiles[self.dims.index(pos)?]
            .iter()
            .find(|o| o.object.kind() == kind))
    }

    /// Whether a tile has an object of `kind`.
    pub fn has_kind(&self, pos: TilePos, kind: ObjectKind) -> Result<bool> {
        Ok(self.get(pos, kind)?.is_some())
    }

    /// Whether a tile has a cuttable object of `kind`.
    pub fn has_cuttable(&self, pos: TilePos, kind: ObjectKind) -> Result<bool> {
        Ok(self.get(pos, kind)?.is_some_and(|o| o.object.is_cuttable()))
    }

    /// Whether any in-bounds neighbour has an object of `kind`.
    pub fn has_neighbour_kind(&self, pos: TilePos, kind: ObjectKind) -> Result<bool> {
        self.dims.check(pos)?;
        Ok(self.dims.neighbours(pos).any(|n| {
            self.tiles[self.dims.index_unchecked(n)]
                .iter()
                .any(|o| o.object.kind() == kind)
        }))
    }

    /// Whether `object` could be added without breaking the per-tile rules.
    pub fn can_add(&self, pos: TilePos, object: &MapObject) -> Result<bool> {
        let kind = object.kind();
        let tile = &self.tiles[self.dims.index(pos)?];
        Ok(!tile.iter().any(|o| {
            let k = o.object.kind();
            k == kind || (k.is_ground_cover() && kind.is_ground_cover())
        }))
    }

    /// Place an object, returning its new identity.
    ///
    /// # Errors
    ///
    /// [`GridError::InvalidTransition`] if the tile already holds an object
    /// of the same kind or conflicting ground cover.
    pub fn add(&mut self, pos: TilePos, object: MapObject) -> Result<ObjectId> {
        if !self.can_add(pos, &object)? {
            return Err(GridError::invalid(format!(
                "cannot place {:?} at ({}, {}): tile already covered",
                object.kind(),
                pos.x,
                pos.y
            )));
        }
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        let i = self.dims.index_unchecked(pos);
        self.tiles[i].push(PlacedObject { id, object });
        Ok(id)
    }

    /// Remove the object of `kind`. Returns `None` when there was none.
    pub fn remove_kind(&mut self, pos: TilePos, kind: ObjectKind) -> Result<Option<PlacedObject>> {
        let tile = &mut self.tiles[self.dims.index(pos)?];
        Ok(tile
            .iter()
            .position(|o| o.object.kind() == kind)
            .map(|idx| tile.remove(idx)))
    }

    /// Remove exactly `expected`, verifying the stored object is still it.
    ///
    /// # Errors
    ///
    /// [`GridError::InvalidTransition`] if the tile no longer holds that
    /// object (it was removed or replaced since the reference was taken).
    pub fn remove_object(&mut self, pos: TilePos, expected: &PlacedObject) -> Result<()> {
        let tile = &mut self.tiles[self.dims.index(pos)?];
        match tile.iter().position(|o| o.id == expected.id) {
            Some(idx) if tile[idx].object.kind() == expected.object.kind() => {
                tile.remove(idx);
                Ok(())
            }
            _ => Err(GridError::invalid(format!(
                "object {:?} is not at ({}, {})",
                expected.id, pos.x, pos.y
            ))),
        }
    }

    /// Replace an object in place, keeping its identity and kind.
    pub fn replace(&mut self, pos: TilePos, id: ObjectId, object: MapObject) -> Result<()> {
        let tile = &mut self.tiles[self.dims.index(pos)?];
        match tile.iter_mut().find(|o| o.id == id) {
            Some(slot) if slot.object.kind() == object.kind() => {
                slot.object = object;
                Ok(())
            }
            _ => Err(GridError::invalid(format!(
                "object {id:?} of kind {:?} is not at ({}, {})",
                object.kind(),
                pos.x,
                pos.y
            ))),
        }
    }

    // ---------------------------------------------------------------------
    // Material stacks
    // ---------------------------------------------------------------------

    fn stack(&self, pos: TilePos) -> Result<Option<(MaterialType, u8)>> {
        Ok(self.get(pos, ObjectKind::Stack)?.and_then(|o| match o.object {
            MapObject::Stack { material, count } => Some((material, count)),
            _ => None,
        }))
    }

    /// Material stacked on a tile, if any.
    pub fn material_at(&self, pos: TilePos) -> Result<Option<MaterialType>> {
        Ok(self.stack(pos)?.map(|(m, _)| m))
    }

    /// Height of the `material` stack on a tile (0 if absent or different).
    pub fn stack_size(&self, pos: TilePos, material: MaterialType) -> Result<u8> {
        Ok(match self.stack(pos)? {
            Some((m, count)) if m == material => count,
            _ => 0,
        })
    }

    /// Whether one more `material` fits on the tile.
    pub fn can_push(&self, pos: TilePos, material: MaterialType, max_stack: u8) -> Result<bool> {
        match self.stack(pos)? {
            Some((m, count)) => Ok(m == material && count < max_stack),
            None => self.can_add(
                pos,
                &MapObject::Stack {
                    material,
                    count: 1,
                },
            ),
        }
    }

    /// Whether at least one `material` can be taken from the tile.
    pub fn can_pop(&self, pos: TilePos, material: MaterialType) -> Result<bool> {
        Ok(self.stack_size(pos, material)? > 0)
    }

    /// Add one `material` to the tile's stack, creating it if needed.
    ///
    /// Returns the new stack height.
    pub fn push_material(
        &mut self,
        pos: TilePos,
        material: MaterialType,
        max_stack: u8,
    ) -> Result<u8> {
        if !self.can_push(pos, material, max_stack)? {
            return Err(GridError::invalid(format!(
                "cannot stack {material:?} at ({}, {})",
                pos.x, pos.y
            )));
        }
        let i = self.dims.index_unchecked(pos);
        if let Some(slot) = self.tiles[i]
            .iter_mut()
            .find(|o| o.object.kind() == ObjectKind::Stack)
        {
            if let MapObject::Stack { count, .. } = &mut slot.object {
                *count += 1;
                return Ok(*count);
            }
        }
        self.add(pos, MapObject::Stack { material, count: 1 })?;
        Ok(1)
    }

    /// Take one `material` from the tile, removing the stack when empty.
    ///
    /// Returns the remaining stack height.
    ///
    /// # Errors
    ///
    /// [`GridError::InvalidTransition`] if no such material lies there.
    pub fn pop_material(&mut self, pos: TilePos, material: MaterialType) -> Result<u8> {
        if !self.can_pop(pos, material)? {
            return Err(GridError::invalid(format!(
                "no {material:?} to pop at ({}, {})",
                pos.x, pos.y
            )));
        }
        let i = self.dims.index_unchecked(pos);
        let idx = self.tiles[i]
            .iter()
            .position(|o| o.object.kind() == ObjectKind::Stack)
            .ok_or_else(|| GridError::invalid("stack vanished"))?;
        let remaining = match &mut self.tiles[i][idx].object {
            MapObject::Stack { count, .. } => {
                *count -= 1;
                *count
            }
            _ => 0,
        };
        if remaining == 0 {
            self.tiles[i].remove(idx);
        }
        Ok(remaining)
    }

    /// Whether the tile holds a material a thief could take.
    pub fn has_stealable_material(&self, pos: TilePos) -> Result<bool> {
        Ok(self.stack(pos)?.is_some_and(|(_, count)| count > 0))
    }

    /// Take one unit of whatever material lies on the tile.
    pub fn steal_material(&mut self, pos: TilePos) -> Result<Option<MaterialType>> {
        match self.material_at(pos)? {
            Some(material) => {
                self.pop_material(pos, material)?;
                Ok(Some(material))
            }
            None => Ok(None),
        }
    }

    /// Cut a stone once. Returns `true` when the stone was used up and removed.
    pub fn cut_stone(&mut self, pos: TilePos) -> Result<bool> {
        let tile = &mut self.tiles[self.dims.index(pos)?];
        let idx = tile
            .iter()
            .position(|o| o.object.kind() == ObjectKind::Stone)
            .ok_or_else(|| {
                GridError::invalid(format!("no stone at ({}, {})", pos.x, pos.y))
            })?;
        if let MapObject::Stone { capacity } = &mut tile[idx].object {
            *capacity = capacity.saturating_sub(1);
            if *capacity == 0 {
                tile.remove(idx);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Every building anchor on the layer, in row-major order.
    pub fn buildings(&self) -> impl Iterator<Item = (TilePos, &PlacedObject)> + '_ {
        self.tiles.iter().enumerate().flat_map(move |(i, tile)| {
            let pos = self.dims.pos_of(i);
            tile.iter()
                .filter(|o| o.object.kind() == ObjectKind::Building)
                .map(move |o| (pos, o))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: TilePos = TilePos::new(1, 1);

    fn layer() -> ObjectLayer {
        ObjectLayer::new(GridDims::new(4, 4))
    }

    #[test]
    fn test_ground_cover_is_exclusive() {
        let mut l = layer();
        l.add(P, MapObject::Tree(TreeStage::Sapling)).unwrap();
        let err = l.add(
            P,
            MapObject::Stack {
                material: MaterialType::Plank,
                count: 1,
            },
        );
        assert!(matches!(err, Err(GridError::InvalidTransition(_))));
        // Signs coexist with ground cover, but only one per tile.
        l.add(P, MapObject::ResourceSign(ResourceKind::Coal)).unwrap();
        assert!(l
            .add(P, MapObject::ResourceSign(ResourceKind::Gold))
            .is_err());
    }

    #[test]
    fn test_remove_by_identity_rejects_stale_reference() {
        let mut l = layer();
        l.add(P, MapObject::Tree(TreeStage::Adult)).unwrap();
        let stale = *l.get(P, ObjectKind::Tree).unwrap().unwrap();
        l.remove_kind(P, ObjectKind::Tree).unwrap();
        l.add(P, MapObject::Tree(TreeStage::Adult)).unwrap();

        assert!(l.remove_object(P, &stale).is_err());
        let current = *l.get(P, ObjectKind::Tree).unwrap().unwrap();
        assert!(l.remove_object(P, &current).is_ok());
        assert!(!l.has_kind(P, ObjectKind::Tree).unwrap());
    }

    #[test]
    fn test_remove_kind_reports_missing() {
        let mut l = layer();
        assert_eq!(l.remove_kind(P, ObjectKind::Stone).unwrap(), None);
    }

    #[test]
    fn test_stack_push_pop() {
        let mut l = layer();
        assert_eq!(l.push_material(P, MaterialType::Plank, 2).unwrap(), 1);
        assert_eq!(l.push_material(P, MaterialType::Plank, 2).unwrap(), 2);
        assert!(l.push_material(P, MaterialType::Plank, 2).is_err());
        assert!(l.push_material(P, MaterialType::Stone, 2).is_err());

        assert!(l.pop_material(P, MaterialType::Stone).is_err());
        assert_eq!(l.pop_material(P, MaterialType::Plank).unwrap(), 1);
        assert_eq!(l.pop_material(P, MaterialType::Plank).unwrap(), 0);
        assert!(!l.has_kind(P, ObjectKind::Stack).unwrap());
        assert!(l.pop_material(P, MaterialType::Plank).is_err());
    }

    #[test]
    fn test_steal_takes_one() {
        let mut l = layer();
        l.push_material(P, MaterialType::Gold, 8).unwrap();
        l.push_material(P, MaterialType::Gold, 8).unwrap();
        assert!(l.has_stealable_material(P).unwrap());
        assert_eq!(l.steal_material(P).unwrap(), Some(MaterialType::Gold));
        assert_eq!(l.stack_size(P, MaterialType::Gold).unwrap(), 1);
    }

    #[test]
    fn test_cut_stone_until_gone() {
        let mut l = layer();
        l.add(P, MapObject::Stone { capacity: 2 }).unwrap();
        assert!(l.has_cuttable(P, ObjectKind::Stone).unwrap());
        assert!(!l.cut_stone(P).unwrap());
        assert!(l.cut_stone(P).unwrap());
        assert!(!l.has_kind(P, ObjectKind::Stone).unwrap());
    }

    #[test]
    fn test_replace_keeps_identity() {
        let mut l = layer();
        let id = l.add(P, MapObject::Corn(CropStage::Growing)).unwrap();
        l.replace(P, id, MapObject::Corn(CropStage::Adult)).unwrap();
        let placed = l.get(P, ObjectKind::Corn).unwrap().unwrap();
        assert_eq!(placed.id, id);
        assert!(placed.object.is_cuttable());
        assert!(l.replace(P, id, MapObject::Tree(TreeStage::Adult)).is_err());
    }
}
