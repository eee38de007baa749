//! Snapshot round-trips, initial map loading and replay determinism.

use hexworld_core::prelude::{
    BuildingId, BuildingType, CropStage, InitialMap, Landscape, MapObject, MaterialType, Placement,
    PlayerId, Shape, SoldierClass, TilePos, UnitId, UnitKind, Visibility, World, WorldConfig,
    WorkerRole,
};
use hexworld_test_utils::determinism::{
    apply_ops, find_first_divergence, run_parallel_worlds, strategies,
    verify_serialization_determinism, verify_world_determinism, world_hash, WorldOp,
};
use hexworld_test_utils::fixtures::{flat_world, soldier, two_player_world, unit};
use hexworld_test_utils::init_tracing;
use proptest::prelude::{prop_assert, prop_assert_eq, proptest, ProptestConfig};

fn assert_same_tiles(a: &World, b: &World) {
    assert_eq!(a.dims(), b.dims());
    for pos in a.dims().positions() {
        assert_eq!(a.terrain().landscape(pos).unwrap(), b.terrain().landscape(pos).unwrap());
        assert_eq!(a.terrain().elevation(pos).unwrap(), b.terrain().elevation(pos).unwrap());
        assert_eq!(a.terrain().resource(pos).unwrap(), b.terrain().resource(pos).unwrap());
        assert_eq!(a.occupancy().flags(pos).unwrap(), b.occupancy().flags(pos).unwrap());
        assert_eq!(a.objects().objects(pos).unwrap(), b.objects().objects(pos).unwrap());
        assert_eq!(a.units().unit_at(pos).unwrap(), b.units().unit_at(pos).unwrap());
        assert_eq!(
            a.partitions().player_at(pos).unwrap(),
            b.partitions().player_at(pos).unwrap()
        );
        assert_eq!(a.is_border(pos).unwrap(), b.is_border(pos).unwrap());
    }
}

fn busy_world() -> World {
    let mut world = two_player_world();
    world
        .place_building(TilePos::new(2, 5), BuildingId(1), BuildingType::Lumberjack, PlayerId(0))
        .unwrap();
    world
        .add_object(TilePos::new(7, 2), MapObject::Stone { capacity: 4 })
        .unwrap();
    for _ in 0..3 {
        world.push_material(TilePos::new(1, 8), MaterialType::Plank).unwrap();
    }
    world
        .request_material(TilePos::new(3, 3), MaterialType::Plank, 2, 2)
        .unwrap();
    world
        .enter_unit(TilePos::new(8, 8), soldier(4, 1, SoldierClass::Bowman))
        .unwrap();
    world
        .enter_unit(TilePos::new(1, 1), unit(5, 0, UnitKind::Bearer))
        .unwrap();
    world
        .add_jobless(TilePos::new(1, 1), WorkerRole::Bearer, UnitId(5))
        .unwrap();
    world.run_correctors().unwrap();
    world
}

#[test]
fn test_snapshot_restores_every_tile() {
    init_tracing();
    let world = busy_world();
    let restored = World::from_bytes(&world.to_bytes().unwrap()).unwrap();
    assert_same_tiles(&world, &restored);
    assert_eq!(restored.snapshot(), world.snapshot());
    assert_eq!(world_hash(&restored), world_hash(&world));

    // Boards come back with the partitions.
    let handle = restored.partition_handle(TilePos::new(1, 1)).unwrap();
    let bearer = handle.take_jobless(WorkerRole::Bearer).unwrap();
    assert_eq!(bearer.map(|w| w.unit), Some(UnitId(5)));
    assert!(handle.next_transfer().unwrap().is_some());
}

#[test]
fn test_restored_fog_matches() {
    let world = busy_world();
    let restored = World::restore(world.snapshot()).unwrap();
    for player in [PlayerId(0), PlayerId(1)] {
        for pos in world.dims().positions() {
            assert_eq!(
                restored.visibility(player, pos).unwrap(),
                world.visibility(player, pos).unwrap()
            );
        }
    }
}

#[test]
fn test_restored_world_keeps_working() {
    let world = busy_world();
    let mut restored = World::restore(world.snapshot()).unwrap();
    restored
        .move_unit(TilePos::new(8, 8), TilePos::new(8, 7), UnitId(4))
        .unwrap();
    restored.change_owner(TilePos::new(5, 5), Some(PlayerId(1))).unwrap();
    restored.run_correctors().unwrap();
    restored.partitions().verify_connectivity().unwrap();
    assert_eq!(restored.pop_material(TilePos::new(1, 8), MaterialType::Plank).unwrap(), 2);
}

#[test]
fn test_initial_map_matches_hand_built_world() {
    let mut map = InitialMap::flat(12, 12);
    map.tile_mut(TilePos::new(9, 9)).unwrap().landscape = Landscape::Water;
    map.objects = vec![
        Placement::Territory {
            pos: TilePos::new(4, 4),
            radius: 3,
            player: PlayerId(0),
        },
        Placement::Stone {
            pos: TilePos::new(1, 1),
            capacity: 2,
        },
        Placement::Unit {
            pos: TilePos::new(4, 4),
            unit: unit(1, 0, UnitKind::Pioneer),
        },
        // Out of bounds: skipped, the rest still loads.
        Placement::Corn {
            pos: TilePos::new(40, 40),
            stage: CropStage::Adult,
        },
    ];
    let loaded = World::from_initial_map(&map, WorldConfig::default()).unwrap();

    let mut built = flat_world(12, 12);
    built.set_landscape(TilePos::new(9, 9), Landscape::Water).unwrap();
    built
        .occupy_area(&Shape::Circle { radius: 3 }, TilePos::new(4, 4), PlayerId(0))
        .unwrap();
    built
        .add_object(TilePos::new(1, 1), MapObject::Stone { capacity: 2 })
        .unwrap();
    built
        .enter_unit(TilePos::new(4, 4), unit(1, 0, UnitKind::Pioneer))
        .unwrap();
    built.run_correctors().unwrap();

    assert_same_tiles(&loaded, &built);
    assert_eq!(
        loaded.visibility(PlayerId(0), TilePos::new(4, 8)).unwrap(),
        Visibility::Visible
    );
}

#[test]
fn test_scripted_replay_is_deterministic() {
    let ops = vec![
        WorldOp::OccupyArea {
            pos: TilePos::new(2, 2),
            radius: 2,
            player: PlayerId(0),
        },
        WorldOp::SetBlocked {
            pos: TilePos::new(6, 6),
            blocked: true,
        },
        WorldOp::ChangeOwner {
            pos: TilePos::new(5, 5),
            owner: Some(PlayerId(1)),
        },
        WorldOp::RunCorrectors,
        WorldOp::FreeArea {
            pos: TilePos::new(2, 2),
            radius: 2,
            player: PlayerId(0),
        },
        WorldOp::RunCorrectors,
    ];
    verify_world_determinism(4, two_player_world, &ops).assert_deterministic();
    run_parallel_worlds(two_player_world, 4, &ops).assert_deterministic();
    assert_eq!(find_first_divergence(two_player_world, &ops), None);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_random_worlds_round_trip(ops in strategies::arb_op_sequence(10, 10, 50)) {
        let mut world = flat_world(10, 10);
        apply_ops(&mut world, &ops);
        let restored = World::from_bytes(&world.to_bytes().unwrap()).unwrap();
        prop_assert_eq!(restored.snapshot(), world.snapshot());
        for pos in world.dims().positions() {
            prop_assert_eq!(
                restored.partitions().player_at(pos).unwrap(),
                world.partitions().player_at(pos).unwrap()
            );
            prop_assert_eq!(
                restored.occupancy().flags(pos).unwrap(),
                world.occupancy().flags(pos).unwrap()
            );
        }
        prop_assert!(restored.partitions().verify_connectivity().is_ok());
    }

    #[test]
    fn test_random_replays_match(ops in strategies::arb_op_sequence(10, 10, 40)) {
        prop_assert!(verify_world_determinism(2, || flat_world(10, 10), &ops).is_deterministic);
        prop_assert!(verify_serialization_determinism(|| flat_world(10, 10), &ops));
    }
}
