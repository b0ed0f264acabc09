//! Integration tests for the extraction pipeline against `.usda` fixtures.

use std::path::PathBuf;

use voxscene::host::{self, InMemoryObjectStore, ObjectKind, ObjectStore};
use voxscene::{
    extract_scene, Method, Pipeline, PipelineConfig, PointAttributes, Point3, Strictness,
    VoxSceneError,
};
use voxscene_stage::{SdfPath, StageError};

fn fixture(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(relative)
}

fn world_fixture() -> PathBuf {
    fixture("My World/mood.usda")
}

fn block(segment: &str) -> SdfPath {
    SdfPath::parse(&format!("/My_World/VoxelMap/BlockLib/Blocks/{segment}")).unwrap()
}

fn strict_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.adjacency.strictness = Strictness::Strict;
    config
}

#[test]
fn test_world_and_chunks() {
    let model = extract_scene(world_fixture()).unwrap();

    let world = model.world();
    assert_eq!(world.name, "My World");
    assert_eq!(world.token, "My_World");
    assert_eq!(world.file_name, "mood");

    let names: Vec<&str> = model.chunks().keys().map(String::as_str).collect();
    assert_eq!(names, ["Chunk_0_0", "Chunk_0_1"]);

    let chunk = model.chunk("Chunk_0_0").unwrap();
    assert_eq!(chunk.points[2], Point3::new(0.0, 0.0, 1.0));
    assert_eq!(chunk.points[4], Point3::new(1.0, 0.0, 1.0));
    for chunk in model.chunks().values() {
        assert_eq!(chunk.points.len(), chunk.instance_indices.len());
        assert!(chunk
            .instance_indices
            .iter()
            .all(|&i| (i as usize) < chunk.prototypes.len()));
    }

    // positions authored only as time samples
    let sampled = model.chunk("Chunk_0_1").unwrap();
    assert_eq!(
        sampled.points,
        vec![Point3::new(16.0, 0.0, 0.0), Point3::new(17.0, 0.0, 0.0)]
    );
    assert_eq!(sampled.prototypes, vec![block("Block_1_0"), block("Block_2_0")]);
}

#[test]
fn test_block_catalog() {
    let (model, stats) = Pipeline::default().run_with_stats(world_fixture()).unwrap();
    let catalog = model.catalog();
    assert_eq!(catalog.len(), 3);
    // Block_1_0 and Block_2_0 are shared by both chunks but read once
    assert_eq!(stats.block_resolutions, 3);

    let stone = &catalog[&block("Block_1_0")];
    assert_eq!(stone.display_name, "stone");
    assert!(!stone.composite);

    let grass = &catalog[&block("Block_2_0")];
    assert_eq!(grass.display_name, "grass_block");
    assert_eq!(grass.meshes.len(), 3);
    assert!(grass.composite);

    let log = &catalog[&block("Block_12_3")];
    assert_eq!((log.category_id, log.variant_id), (12, 3));
    assert_eq!(log.display_name, "oak_log");
}

#[test]
fn test_materials() {
    let model = extract_scene(world_fixture()).unwrap();
    let textures: Vec<&str> = model.materials().iter().map(|m| m.texture.as_str()).collect();
    assert_eq!(
        textures,
        [
            "./textures/stone.png",
            "./textures/grass_top.png",
            "./textures/dirt.png",
            "./textures/oak_log.png",
        ]
    );
    // relative binding resolved against the mesh
    assert_eq!(
        model.materials()[0].material,
        block("Looks").child("stone")
    );

    let set = model.material_set();
    assert_eq!(set.instance("Block_1_0"), Some("stone"));
    assert_eq!(set.instance("Block_2_0"), Some("dirt"));
    assert_eq!(set.instance("Block_12_3"), Some("oak_log"));
    assert_eq!(set.instance("Looks"), None);
}

#[test]
fn test_loose_adjacency() {
    let model = extract_scene(world_fixture()).unwrap();
    let graph = model.graph("Chunk_0_0").unwrap();
    assert_eq!(
        graph.edges(),
        &[(0, 1), (0, 2), (0, 4), (1, 2), (1, 4), (2, 4)]
    );
    assert_eq!(graph.order(), &[0, 1, 2, 4, 3]);
    assert_eq!(graph.degree(3), 0);
    assert_eq!(model.graph("Chunk_0_1").unwrap().edges(), &[(0, 1)]);
}

#[test]
fn test_strict_adjacency_matches_spatial_hash() {
    let mut config = strict_config();
    config.adjacency.method = Method::AllPairs;
    let scanned = Pipeline::new(config.clone()).run(world_fixture()).unwrap();
    config.adjacency.method = Method::SpatialHash;
    let hashed = Pipeline::new(config).run(world_fixture()).unwrap();

    let graph = scanned.graph("Chunk_0_0").unwrap();
    assert_eq!(graph.edges(), &[(0, 1), (0, 2), (1, 4), (2, 4)]);
    assert_eq!(scanned.adjacency(), hashed.adjacency());
}

#[test]
fn test_point_views() {
    let model = extract_scene(world_fixture()).unwrap();
    let attributes = model.point_attributes("Chunk_0_0").unwrap();
    let triple = |instance_index, category_id, variant_id| PointAttributes {
        instance_index,
        category_id,
        variant_id,
    };
    assert_eq!(
        attributes,
        vec![
            triple(0, 1, 0),
            triple(0, 1, 0),
            triple(1, 2, 0),
            triple(2, 12, 3),
            triple(0, 1, 0),
        ]
    );
    let coordinates = model.coordinates("Chunk_0_0").unwrap();
    assert_eq!(coordinates.len(), 15);
    assert_eq!(&coordinates[6..9], &[0.0, 0.0, 1.0]);
}

#[test]
fn test_host_plan() {
    let model = extract_scene(world_fixture()).unwrap();
    let store = InMemoryObjectStore::new();
    store.create("stone", ObjectKind::Mesh);
    store.create("oak_log", ObjectKind::Mesh);
    store.create("dirt", ObjectKind::Mesh);

    let plan = host::plan(&model, &store);
    assert_eq!(plan.collection.name, "mood USD Collection");
    assert_eq!(plan.points_collection.name, "mood USD Points");
    assert_eq!(plan.block_lib_collection.name, "mood USD BlockLib");
    assert_eq!(plan.point_objects["Chunk_0_0"].name, "mood - PT_Chunk_0_0");

    let objects: Vec<&str> = plan.slots["Chunk_0_0"]
        .objects
        .iter()
        .map(|o| o.name.as_str())
        .collect();
    assert_eq!(objects, ["stone", host::EMPTY_OBJECT, "oak_log"]);
    assert_eq!(plan.broken(), ["Block_2_0_merge"]);

    // a second plan reuses every object
    let before = store.len();
    let again = host::plan(&model, &store);
    assert_eq!(again, plan);
    assert_eq!(store.len(), before);
}

#[test]
fn test_idempotent() {
    let first = extract_scene(world_fixture()).unwrap();
    let second = extract_scene(world_fixture()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_repeated_runs_with_deadline() {
    let mut config = PipelineConfig::default();
    config.adjacency.deadline_ms = 50;
    let pipeline = Pipeline::new(config);

    let first = pipeline.run(world_fixture()).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(120));
    let second = pipeline.run(world_fixture()).unwrap();

    assert_eq!(first, second);
    assert!(!pipeline.cancel_token().is_cancelled());
}

#[test]
fn test_config_file() {
    let path = std::env::temp_dir().join(format!("voxscene_config_{}.toml", std::process::id()));
    std::fs::write(
        &path,
        "[adjacency]\nstrictness = \"strict\"\nworkers = 2\n",
    )
    .unwrap();
    let config = PipelineConfig::from_file(&path);
    std::fs::remove_file(&path).ok();
    let config = config.unwrap();
    assert_eq!(config.adjacency.strictness, Strictness::Strict);

    let model = Pipeline::new(config).run(world_fixture()).unwrap();
    assert_eq!(model.graph("Chunk_0_0").unwrap().edge_count(), 4);
}

#[test]
fn test_malformed_block_path() {
    let err = extract_scene(fixture("broken/bad_block.usda")).unwrap_err();
    assert!(matches!(err, VoxSceneError::MalformedBlockPath(ref s) if s == "Block_x_3"));
}

#[test]
fn test_missing_positions() {
    let err = extract_scene(fixture("broken/no_positions.usda")).unwrap_err();
    assert!(matches!(
        err,
        VoxSceneError::MissingAttribute { ref attribute, .. } if attribute == "positions"
    ));
}

#[test]
fn test_open_errors() {
    assert!(matches!(
        extract_scene(""),
        Err(VoxSceneError::InvalidPath(_))
    ));
    assert!(matches!(
        extract_scene(fixture("missing/none.usda")),
        Err(VoxSceneError::DocumentOpen(StageError::Io { .. }))
    ));

    let path = std::env::temp_dir().join(format!("voxscene_plain_{}.usda", std::process::id()));
    std::fs::write(&path, "not a scene").unwrap();
    let result = extract_scene(&path);
    std::fs::remove_file(&path).ok();
    assert!(matches!(
        result,
        Err(VoxSceneError::DocumentOpen(StageError::UnsupportedFormat(_)))
    ));
}
