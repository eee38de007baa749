//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the world engine produces
//! identical state given identical operation sequences.
//!
//! # Testing Strategy
//!
//! Every client of a lockstep game applies the same world operations and
//! must end up with byte-identical state. Sources of non-determinism include:
//!
//! - **Floating-point math**: path costs use fixed-point arithmetic via
//!   [`hexworld_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Persistent maps are ordered and neighbours are expanded in
//!   [`Direction::ALL`](hexworld_core::coords::Direction::ALL) order.
//!
//! - **Thread scheduling**: corrector queues are drained in a fixed order
//!   by [`World::run_correctors`].
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual operations (ownership, objects, units)
//! 2. **Property tests**: random operation sequences replay identically
//! 3. **Parallel tests**: N worlds built on N threads all match
//! 4. **Persistence tests**: snapshot round-trips keep the state hash

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use hexworld_core::prelude::*;
use serde::{Deserialize, Serialize};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of operations applied per run.
    pub ops: usize,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic engine).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "World is non-deterministic!\n\
                 Runs: {}\n\
                 Operations: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ops,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// One scripted world mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorldOp {
    /// [`World::change_owner`].
    ChangeOwner {
        /// Tile.
        pos: TilePos,
        /// New owner.
        owner: Option<PlayerId>,
    },
    /// [`World::occupy_area`] with a circle.
    OccupyArea {
        /// Center.
        pos: TilePos,
        /// Circle radius.
        radius: u32,
        /// Claiming player.
        player: PlayerId,
    },
    /// [`World::free_area`] with a circle.
    FreeArea {
        /// Center.
        pos: TilePos,
        /// Circle radius.
        radius: u32,
        /// Releasing player.
        player: PlayerId,
    },
    /// [`World::set_blocked`].
    SetBlocked {
        /// Tile.
        pos: TilePos,
        /// Flag value.
        blocked: bool,
    },
    /// [`World::plant_tree`].
    PlantTree {
        /// Tile.
        pos: TilePos,
    },
    /// [`World::push_material`].
    PushMaterial {
        /// Tile.
        pos: TilePos,
        /// Material.
        material: MaterialType,
    },
    /// [`World::enter_unit`] with a pioneer.
    EnterUnit {
        /// Tile.
        pos: TilePos,
        /// Unit id.
        id: u32,
        /// Owner.
        player: PlayerId,
    },
    /// [`World::run_correctors`].
    RunCorrectors,
}

/// Apply one operation. Returns whether the world accepted it.
///
/// Rejections are part of the replayed behaviour: the same operation must
/// be rejected on every run.
pub fn apply_op(world: &mut World, op: &WorldOp) -> bool {
    match *op {
        WorldOp::ChangeOwner { pos, owner } => world.change_owner(pos, owner).is_ok(),
        WorldOp::OccupyArea {
            pos,
            radius,
            player,
        } => world
            .occupy_area(&Shape::Circle { radius }, pos, player)
            .is_ok(),
        WorldOp::FreeArea {
            pos,
            radius,
            player,
        } => world.free_area(&Shape::Circle { radius }, pos, player).is_ok(),
        WorldOp::SetBlocked { pos, blocked } => world.set_blocked(pos, blocked).is_ok(),
        WorldOp::PlantTree { pos } => world.plant_tree(pos).is_ok(),
        WorldOp::PushMaterial { pos, material } => world.push_material(pos, material).is_ok(),
        WorldOp::EnterUnit { pos, id, player } => world
            .enter_unit(pos, UnitInfo::new(UnitId(id), player, UnitKind::Pioneer))
            .is_ok(),
        WorldOp::RunCorrectors => world.run_correctors().is_ok(),
    }
}

/// Apply every operation in order. Returns how many were accepted.
pub fn apply_ops(world: &mut World, ops: &[WorldOp]) -> usize {
    ops.iter().filter(|op| apply_op(world, op)).count()
}

/// Hash of a world's persistent state.
///
/// # Panics
///
/// Panics if the world cannot be encoded, which means a snapshot bug.
#[must_use]
pub fn world_hash(world: &World) -> u64 {
    world.state_hash().expect("world snapshot encodes")
}

/// Run a scenario multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the scenario
/// * `steps` - Number of steps per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance state by one step
/// * `hash` - Function to compute state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    steps: usize,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S, usize),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for i in 0..steps {
            step(&mut state, i);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ops: steps,
    }
}

/// Replay `ops` on `runs` fresh worlds and compare final hashes.
///
/// # Example
///
/// ```
/// use hexworld_test_utils::determinism::{verify_world_determinism, WorldOp};
/// use hexworld_test_utils::fixtures::flat_world;
/// use hexworld_core::prelude::*;
///
/// let ops = vec![
///     WorldOp::ChangeOwner { pos: TilePos::new(1, 1), owner: Some(PlayerId(0)) },
///     WorldOp::RunCorrectors,
/// ];
/// verify_world_determinism(3, || flat_world(8, 8), &ops).assert_deterministic();
/// ```
pub fn verify_world_determinism<Setup>(runs: usize, setup: Setup, ops: &[WorldOp]) -> DeterminismResult
where
    Setup: Fn() -> World,
{
    verify_determinism(
        runs,
        ops.len(),
        setup,
        |world, i| {
            apply_op(world, &ops[i]);
        },
        world_hash,
    )
}

/// Result of parallel world runs.
#[derive(Debug, Clone)]
pub struct ParallelRunResult {
    /// Final state hash from each world.
    pub hashes: Vec<u64>,
    /// Number of operations applied per world.
    pub ops: usize,
}

impl ParallelRunResult {
    /// Check if all worlds produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all worlds matched.
    ///
    /// # Panics
    ///
    /// Panics if worlds produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel worlds diverged!\n\
                 Worlds: {}\n\
                 Operations: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ops,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Build and drive `num_worlds` worlds on scoped threads.
///
/// Catches non-determinism that only shows up under thread scheduling or
/// memory layout differences.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel_worlds<Setup>(setup: Setup, num_worlds: usize, ops: &[WorldOp]) -> ParallelRunResult
where
    Setup: Fn() -> World + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_worlds)
            .map(|_| {
                s.spawn(|| {
                    let mut world = setup();
                    apply_ops(&mut world, ops);
                    world_hash(&world)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("world thread panicked"))
            .collect()
    });

    ParallelRunResult {
        hashes,
        ops: ops.len(),
    }
}

/// Replay two worlds op by op and find the first divergence.
///
/// # Returns
///
/// `None` if the worlds stay identical, `Some(i)` if they differ after
/// `i` operations.
pub fn find_first_divergence<Setup>(setup: Setup, ops: &[WorldOp]) -> Option<usize>
where
    Setup: Fn() -> World,
{
    let mut a = setup();
    let mut b = setup();

    if world_hash(&a) != world_hash(&b) {
        return Some(0);
    }

    for (i, op) in ops.iter().enumerate() {
        apply_op(&mut a, op);
        apply_op(&mut b, op);

        if world_hash(&a) != world_hash(&b) {
            return Some(i + 1);
        }
    }

    None
}

/// Verify that a snapshot round-trip preserves world state exactly.
pub fn verify_serialization_determinism<Setup>(setup: Setup, ops: &[WorldOp]) -> bool
where
    Setup: Fn() -> World,
{
    let mut world = setup();
    apply_ops(&mut world, ops);

    let Ok(bytes) = world.to_bytes() else {
        return false;
    };
    let Ok(restored) = World::from_bytes(&bytes) else {
        return false;
    };

    world.state_hash().ok() == restored.state_hash().ok()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for world operations.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing.
pub mod strategies {
    use hexworld_core::prelude::*;
    use proptest::prelude::*;

    use super::WorldOp;

    /// A tile inside a `width x height` grid.
    pub fn arb_pos(width: u16, height: u16) -> impl Strategy<Value = TilePos> {
        (0..i32::from(width), 0..i32::from(height)).prop_map(|(x, y)| TilePos::new(x, y))
    }

    /// One of `players` players, or neutral.
    pub fn arb_owner(players: u8) -> impl Strategy<Value = Option<PlayerId>> {
        prop_oneof![
            1 => Just(None),
            3 => (0..players).prop_map(|p| Some(PlayerId(p))),
        ]
    }

    /// A stackable material.
    pub fn arb_material() -> impl Strategy<Value = MaterialType> {
        prop_oneof![
            Just(MaterialType::Plank),
            Just(MaterialType::Stone),
            Just(MaterialType::Trunk),
        ]
    }

    /// A random operation on a `width x height` world.
    pub fn arb_world_op(width: u16, height: u16) -> impl Strategy<Value = WorldOp> {
        prop_oneof![
            4 => (arb_pos(width, height), arb_owner(3))
                .prop_map(|(pos, owner)| WorldOp::ChangeOwner { pos, owner }),
            1 => (arb_pos(width, height), 0u32..3, 0u8..3).prop_map(|(pos, radius, p)| {
                WorldOp::OccupyArea { pos, radius, player: PlayerId(p) }
            }),
            1 => (arb_pos(width, height), 0u32..3, 0u8..3).prop_map(|(pos, radius, p)| {
                WorldOp::FreeArea { pos, radius, player: PlayerId(p) }
            }),
            1 => (arb_pos(width, height), any::<bool>())
                .prop_map(|(pos, blocked)| WorldOp::SetBlocked { pos, blocked }),
            1 => arb_pos(width, height).prop_map(|pos| WorldOp::PlantTree { pos }),
            1 => (arb_pos(width, height), arb_material())
                .prop_map(|(pos, material)| WorldOp::PushMaterial { pos, material }),
            1 => (arb_pos(width, height), 0u32..64, 0u8..3).prop_map(|(pos, id, p)| {
                WorldOp::EnterUnit { pos, id, player: PlayerId(p) }
            }),
            1 => Just(WorldOp::RunCorrectors),
        ]
    }

    /// A sequence of up to `max_len` operations.
    pub fn arb_op_sequence(
        width: u16,
        height: u16,
        max_len: usize,
    ) -> impl Strategy<Value = Vec<WorldOp>> {
        prop::collection::vec(arb_world_op(width, height), 0..max_len)
    }

    /// A row-major blocking mask with roughly one tile in `one_in` blocked.
    pub fn arb_blocking(width: u16, height: u16, one_in: u32) -> impl Strategy<Value = Vec<bool>> {
        let count = usize::from(width) * usize::from(height);
        prop::collection::vec((0..one_in).prop_map(|r| r == 0), count)
    }
}
