//! Tile store save/load round trips and corruption handling.

mod common;

use std::sync::Arc;

use glam::Vec3;
use tilenav::{
    Aabb3d, MeshBuildKernel, NavMesh, NavMeshParams, NavigationError, NavigationParams,
    NavigationScene, PersistError, Tile, TileCoord, TileEncodeParams,
};

use common::{FakeCrowdBackend, FakeKernel, StaticGeometry};

fn test_params() -> NavigationParams {
    NavigationParams {
        tile_size: 16,
        ..Default::default()
    }
}

fn built_scene() -> NavigationScene {
    let mut scene = NavigationScene::with_params(
        Arc::new(FakeKernel::default()),
        Arc::new(FakeCrowdBackend),
        test_params(),
    );
    let geometry = StaticGeometry::quad(Vec3::ZERO, Vec3::new(9.5, 0.0, 9.5), 0.0);
    scene.generate_navmesh(&geometry).unwrap();
    scene
}

#[test]
fn round_trip_preserves_grid_params_and_tiles() {
    let scene = built_scene();
    let mut blob = Vec::new();
    scene.save_to(&mut blob).unwrap();

    let mut restored = NavigationScene::with_params(
        Arc::new(FakeKernel::default()),
        Arc::new(FakeCrowdBackend),
        test_params(),
    );
    restored.load_from(&mut blob.as_slice()).unwrap();

    assert!(restored.is_navmesh_ready());
    assert_eq!(restored.grid_size(), scene.grid_size());
    assert_eq!(restored.polygon_count(), scene.polygon_count());

    let original = scene.navmesh().read().unwrap();
    let loaded = restored.navmesh().read().unwrap();
    assert_eq!(loaded.params(), original.params());
    assert_eq!(loaded.tile_count(), original.tile_count());
    for z in 0..scene.grid_size().1 {
        for x in 0..scene.grid_size().0 {
            let coord = TileCoord::new(x, z);
            let a = original.tile_at(coord).unwrap();
            let b = loaded.tile_at(coord).unwrap();
            assert_eq!(a.polygon_count, b.polygon_count);
            assert_eq!(a.vertex_count, b.vertex_count);
            assert_eq!(a.data, b.data);
        }
    }
}

#[test]
fn unbuilt_coordinates_survive_as_gaps() {
    let scene = built_scene();
    {
        let mut navmesh = scene.navmesh().write().unwrap();
        navmesh.remove_tile(TileCoord::new(1, 0));
    }
    let mut blob = Vec::new();
    scene.save_to(&mut blob).unwrap();

    let mut restored = NavigationScene::new(Arc::new(FakeKernel::default()), Arc::new(FakeCrowdBackend));
    restored.load_from(&mut blob.as_slice()).unwrap();

    let navmesh = restored.navmesh().read().unwrap();
    assert!(navmesh.tile_at(TileCoord::new(1, 0)).is_none());
    assert!(navmesh.tile_at(TileCoord::new(0, 0)).is_some());
}

#[test]
fn truncated_stream_fails_and_leaves_store_cleared() {
    let scene = built_scene();
    let mut blob = Vec::new();
    scene.save_to(&mut blob).unwrap();
    blob.truncate(blob.len() - 3);

    let mut restored = built_scene();
    let err = restored.load_from(&mut blob.as_slice()).unwrap_err();
    assert!(matches!(err, NavigationError::Persist(PersistError::Io(_))));
    assert!(!restored.is_navmesh_ready());
    assert_eq!(restored.polygon_count(), 0);
}

#[test]
fn misplaced_tile_blob_is_rejected() {
    // Hand-assemble a store whose blob claims a different coordinate than the
    // slot it sits in.
    let kernel = FakeKernel::default();
    let blob = kernel
        .encode_tile(&TileEncodeParams {
            coord: TileCoord::new(1, 1),
            polygon_mesh: &Default::default(),
            detail_mesh: &Default::default(),
            walkable_height: 20,
            walkable_climb: 15,
            walkable_radius: 1,
        })
        .unwrap();

    let mut navmesh = NavMesh::new();
    navmesh
        .init(NavMeshParams::for_grid(Vec3::ZERO, 4.8, 4).unwrap())
        .unwrap();
    navmesh
        .add_tile(Tile {
            coord: TileCoord::new(0, 0),
            polygon_count: 0,
            vertex_count: 0,
            data: blob,
        })
        .unwrap();

    let mut stream = Vec::new();
    tilenav::save(&mut stream, &Aabb3d::default(), 2, 2, &navmesh).unwrap();

    let err = tilenav::load(&mut stream.as_slice(), &kernel).unwrap_err();
    match err {
        PersistError::TileMismatch { at, encoded } => {
            assert_eq!(at, TileCoord::new(0, 0));
            assert_eq!(encoded, TileCoord::new(1, 1));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn corrupt_blob_header_is_rejected() {
    let scene = built_scene();
    let mut blob = Vec::new();
    scene.save_to(&mut blob).unwrap();
    // First tile blob starts after AABB (24), grid (8), params (24) and its
    // length prefix (4); stomp the magic.
    blob[60] ^= 0xff;

    let err = tilenav::load(&mut blob.as_slice(), &FakeKernel::default()).unwrap_err();
    assert!(matches!(err, PersistError::CorruptTile(_)));
}
