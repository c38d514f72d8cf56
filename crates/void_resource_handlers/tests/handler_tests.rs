//! End-to-end tests of the registry with the built-in handlers

use std::sync::atomic::{AtomicUsize, Ordering};

use void_resource::prelude::*;
use void_resource::{AssetError, ShaderStage, TextureOptions, TextureType};
use void_resource_handlers::{
    register_builtin_handlers, AudioClip, BitmapFont, HeightmapTerrain, Material, Scene, Shader, StaticMesh,
    Texture, TextResource, AO_DEFAULT, ROUGHNESS_DEFAULT,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct Fixture {
    source: Arc<MemoryAssetSource>,
    backend: HeadlessBackend,
    system: ResourceSystem,
}

fn fixture_with(source: MemoryAssetSource, config: ResourceSystemConfig) -> Fixture {
    init_logger();
    let source = Arc::new(source);
    let backend = HeadlessBackend::new();
    let mut system = ResourceSystem::new(config, source.clone(), Box::new(backend.clone())).unwrap();
    register_builtin_handlers(&mut system).unwrap();
    Fixture { source, backend, system }
}

fn fixture() -> Fixture {
    fixture_with(MemoryAssetSource::new(), ResourceSystemConfig::default())
}

fn no_reload() -> ResourceSystemConfig {
    ResourceSystemConfig::default().with_hot_reload(false)
}

fn texture_info(file: &str) -> RequestInfo {
    RequestInfo::new(ResourceKind::Texture).with_asset(AssetRequest::image(file, "core").watched())
}

fn loaded_names(events: &[ResourceEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ResourceEvent::Loaded { name, .. } => Some(name.to_string()),
            _ => None,
        })
        .collect()
}

const STEEL: &str = r#"{
    "metallic_map": "metal.png",
    "roughness_map": "rough.png",
    "ao_map": "ao.png"
}"#;

fn material_info(config: &str) -> RequestInfo {
    RequestInfo::new(ResourceKind::Material).with_source_text(config)
}

// ---- Scenarios ----

#[test]
fn test_sync_texture_loads_at_generation_zero() {
    let mut fx = fixture();
    let image = ImageAsset::filled(2, 2, &[10, 20, 30, 255]);
    fx.source.insert_image("core", "rock_albedo.png", image.clone());

    let handle = fx
        .system
        .request("rock_albedo", texture_info("rock_albedo.png").synchronous())
        .unwrap();

    let resource = fx.system.get(handle).unwrap();
    assert_eq!(resource.state(), ResourceState::Loaded);
    assert_eq!(resource.generation().value(), Some(0));
    let texture = resource.payload::<Texture>().unwrap();
    assert_eq!((texture.width, texture.height, texture.channel_count), (2, 2, 4));

    let uploaded = fx.backend.texture_named(&Name::new("rock_albedo")).unwrap();
    assert_eq!(uploaded.data, image.pixels);
    assert_eq!(loaded_names(&fx.system.drain_events()), vec!["rock_albedo"]);
}

#[test]
fn test_second_request_shares_the_resource() {
    let mut fx = fixture();
    fx.source.insert_image("core", "rock_albedo.png", ImageAsset::filled(1, 1, &[1, 2, 3, 4]));

    let first = fx
        .system
        .request("rock_albedo", texture_info("rock_albedo.png").synchronous())
        .unwrap();
    let second = fx
        .system
        .request("rock_albedo", texture_info("rock_albedo.png").synchronous())
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(fx.system.reference_count("rock_albedo"), Some(2));
    assert_eq!(fx.source.request_count(&Name::new("rock_albedo.png")), 1);
    assert_eq!(fx.backend.textures_acquired(), 1);
}

#[test]
fn test_release_twice_reclaims_then_warns() {
    let mut fx = fixture_with(MemoryAssetSource::new(), no_reload());
    fx.source.insert_image("core", "rock_albedo.png", ImageAsset::filled(1, 1, &[1, 2, 3, 4]));
    let handle = fx
        .system
        .request("rock_albedo", texture_info("rock_albedo.png").synchronous())
        .unwrap();

    assert!(fx.system.release("rock_albedo"));
    assert!(!fx.system.contains(handle));
    assert!(fx.system.find("rock_albedo").is_none());
    assert_eq!(fx.backend.texture_count(), 0);

    assert!(!fx.system.release("rock_albedo"));
    assert!(fx.system.is_empty());
}

#[test]
fn test_material_with_missing_channel_maps_uses_defaults() {
    let mut fx = fixture();
    fx.source.insert_image("", "metal.png", ImageAsset::filled(2, 2, &[200, 0, 0, 255]));

    let handle = fx.system.request("steel", material_info(STEEL).synchronous()).unwrap();

    let resource = fx.system.get(handle).unwrap();
    assert!(resource.is_loaded());
    assert!(resource.payload::<Material>().unwrap().packed_mra.is_some());

    let packed = fx.backend.texture_named(&Name::new("steel_mra")).unwrap();
    assert_eq!(packed.data.len(), 2 * 2 * 4);
    for pixel in packed.data.chunks(4) {
        assert_eq!(pixel, [200, ROUGHNESS_DEFAULT, AO_DEFAULT, 255]);
    }
}

#[test]
fn test_capacity_exhausted_is_fatal() {
    let mut fx = fixture_with(MemoryAssetSource::new(), ResourceSystemConfig::with_capacity(1));
    fx.source.insert_text("core", "a.txt", "a");
    fx.source.insert_text("core", "b.txt", "b");

    let info = |file: &str| {
        RequestInfo::new(ResourceKind::Text)
            .with_asset(AssetRequest::text(file, "core"))
            .synchronous()
    };
    fx.system.request("a", info("a.txt")).unwrap();
    let err = fx.system.request("b", info("b.txt")).unwrap_err();

    assert!(matches!(err, ResourceError::CapacityExhausted { capacity: 1 }));
    assert!(err.is_fatal());
    assert_eq!(fx.system.len(), 1);
    assert!(fx.system.find("b").is_none());
}

// ---- Properties ----

#[test]
fn test_reference_count_tracks_requests_minus_releases() {
    let mut fx = fixture();
    fx.source.insert_text("core", "notes.txt", "hello");
    let info = || {
        RequestInfo::new(ResourceKind::Text)
            .with_asset(AssetRequest::text("notes.txt", "core"))
            .synchronous()
    };

    for _ in 0..5 {
        fx.system.request("notes", info()).unwrap();
    }
    for _ in 0..3 {
        assert!(fx.system.release("notes"));
    }

    assert_eq!(fx.system.reference_count("notes"), Some(2));
    assert_eq!(fx.source.request_count(&Name::new("notes.txt")), 1);
    let text = fx.system.get_by_name("notes").unwrap().payload::<TextResource>().unwrap();
    assert_eq!(text.text, "hello");
}

#[test]
fn test_mra_join_fires_once_for_every_order() {
    let orders = [
        ["metal.png", "rough.png", "ao.png"],
        ["metal.png", "ao.png", "rough.png"],
        ["rough.png", "metal.png", "ao.png"],
        ["rough.png", "ao.png", "metal.png"],
        ["ao.png", "metal.png", "rough.png"],
        ["ao.png", "rough.png", "metal.png"],
    ];

    for order in orders {
        let mut fx = fixture_with(MemoryAssetSource::manual(), ResourceSystemConfig::default());
        fx.source.insert_image("", "metal.png", ImageAsset::filled(2, 1, &[90]));
        fx.source.insert_image("", "ao.png", ImageAsset::filled(2, 1, &[40]));
        // rough.png is missing and fails

        let callbacks = Arc::new(AtomicUsize::new(0));
        let counter = callbacks.clone();
        let handle = fx
            .system
            .request(
                "steel",
                material_info(STEEL).with_callback(move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        assert_eq!(fx.source.held_count(), 3);
        assert_eq!(fx.system.get(handle).unwrap().state(), ResourceState::Loading);

        let mut loaded = Vec::new();
        for (i, map) in order.iter().enumerate() {
            assert!(fx.source.complete_named(*map));
            fx.system.update();
            let events = fx.system.drain_events();
            loaded.extend(loaded_names(&events));
            if i < 2 {
                assert!(loaded.is_empty(), "fired early for order {:?}", order);
            }
        }

        assert_eq!(loaded, vec!["steel"], "order {:?}", order);
        assert_eq!(callbacks.load(Ordering::SeqCst), 1);
        assert_eq!(fx.backend.textures_acquired(), 1);
        assert_eq!(fx.system.pending_loads(), 0);

        let packed = fx.backend.texture_named(&Name::new("steel_mra")).unwrap();
        assert_eq!(&packed.data[..4], &[90, ROUGHNESS_DEFAULT, 40, 255]);
    }
}

#[test]
fn test_generation_increases_across_hot_reloads() {
    let mut fx = fixture();
    fx.source.insert_image("core", "grass.png", ImageAsset::filled(2, 2, &[0, 255, 0, 255]));
    let handle = fx.system.request("grass", texture_info("grass.png").synchronous()).unwrap();
    assert_eq!(fx.system.watch_count(), 1);
    assert_eq!(fx.system.is_auto_release("grass"), Some(false));
    fx.system.drain_events();

    let mut generations = vec![fx.system.get(handle).unwrap().generation()];
    for shade in [100u8, 200] {
        let image = ImageAsset::filled(2, 2, &[0, shade, 0, 255]);
        assert!(fx.source.modify("core", "grass.png", AssetData::Image(image)));
        fx.system.update();

        let events = fx.system.drain_events();
        assert!(matches!(&events[..], [ResourceEvent::Reloaded { .. }]));
        generations.push(fx.system.get(handle).unwrap().generation());
        let uploaded = fx.backend.texture_named(&Name::new("grass")).unwrap();
        assert_eq!(uploaded.data[1], shade);
    }

    assert!(generations.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(generations.last().unwrap().value(), Some(2));
    assert_eq!(fx.backend.texture_count(), 1);
}

struct Counting {
    kind: ResourceKind,
    released: Arc<AtomicUsize>,
}

impl ResourceHandler for Counting {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn request(&mut self, _system: &mut ResourceSystem, resource: &mut Resource, _info: RequestInfo) -> ResourceResult<()> {
        resource.mark_loaded();
        Ok(())
    }

    fn release(&mut self, _system: &mut ResourceSystem, _resource: &mut Resource) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_release_only_runs_the_owning_handler() {
    let mut fx = fixture();
    let (a, b) = (Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0)));
    let (kind_a, kind_b) = (ResourceKind::Custom(130), ResourceKind::Custom(131));
    fx.system
        .register_handler(Box::new(Counting { kind: kind_a, released: a.clone() }))
        .unwrap();
    fx.system
        .register_handler(Box::new(Counting { kind: kind_b, released: b.clone() }))
        .unwrap();

    fx.system.request("first", RequestInfo::new(kind_a)).unwrap();
    fx.system.request("second", RequestInfo::new(kind_b)).unwrap();
    assert!(fx.system.release("second"));

    assert_eq!(a.load(Ordering::SeqCst), 0);
    assert_eq!(b.load(Ordering::SeqCst), 1);
    assert!(fx.system.get_by_name("first").unwrap().is_loaded());
}

#[test]
fn test_shared_watch_reloads_every_owner() {
    let mut fx = fixture();
    fx.source.insert_text("core", "notes.txt", "v1");
    let info = || {
        RequestInfo::new(ResourceKind::Text)
            .with_asset(AssetRequest::text("notes.txt", "core").watched())
            .synchronous()
    };
    let a = fx.system.request("a", info()).unwrap();
    let b = fx.system.request("b", info()).unwrap();
    assert_eq!(fx.system.watch_count(), 2);

    assert!(fx.source.modify("core", "notes.txt", AssetData::Text("v2".into())));
    fx.system.update();

    for handle in [a, b] {
        let resource = fx.system.get(handle).unwrap();
        assert_eq!(resource.payload::<TextResource>().unwrap().text, "v2");
        assert_eq!(resource.generation().value(), Some(1));
    }
}

#[test]
fn test_failed_async_load_runs_the_handler_again() {
    let mut fx = fixture();
    let handle = fx.system.request("late", texture_info("late.png")).unwrap();
    fx.system.update();
    assert!(fx
        .system
        .drain_events()
        .iter()
        .any(|e| matches!(e, ResourceEvent::Failed { name, .. } if name.as_str() == "late")));
    assert!(!fx.system.get(handle).unwrap().is_loaded());

    fx.source.insert_image("core", "late.png", ImageAsset::filled(2, 2, &[9, 9, 9, 255]));
    let again = fx.system.request("late", texture_info("late.png")).unwrap();
    assert_eq!(again, handle);
    assert!(fx.system.wait_idle(std::time::Duration::from_secs(1)));

    assert!(fx.system.get(handle).unwrap().is_loaded());
    assert_eq!(fx.system.reference_count("late"), Some(2));
    assert_eq!(fx.source.request_count(&Name::new("late.png")), 2);
    assert_eq!(fx.backend.texture_count(), 1);
    assert_eq!(loaded_names(&fx.system.drain_events()), vec!["late".to_string()]);
}

#[test]
fn test_failed_pinned_resource_is_reclaimed_at_zero_references() {
    let mut fx = fixture();
    fx.system.request("late", texture_info("late.png")).unwrap();
    fx.system.update();
    assert_eq!(fx.system.is_auto_release("late"), Some(false));

    assert!(fx.system.release("late"));
    assert!(fx.system.find("late").is_none());

    fx.source.insert_image("core", "late.png", ImageAsset::filled(1, 1, &[1, 2, 3, 255]));
    let handle = fx.system.request("late", texture_info("late.png")).unwrap();
    assert!(fx.system.wait_idle(std::time::Duration::from_secs(1)));
    assert!(fx.system.get(handle).unwrap().is_loaded());
}

// ---- Textures ----

#[test]
fn test_async_texture_finishes_in_update() {
    let mut fx = fixture();
    fx.source.insert_image("core", "sky.png", ImageAsset::filled(4, 4, &[1, 2, 3]));

    let handle = fx.system.request("sky", texture_info("sky.png")).unwrap();
    assert_eq!(fx.system.get(handle).unwrap().state(), ResourceState::Loading);
    assert_eq!(fx.backend.texture_count(), 0);

    assert!(fx.system.wait_idle(std::time::Duration::from_secs(1)));
    assert!(fx.system.get(handle).unwrap().is_loaded());
    assert_eq!(fx.backend.texture_count(), 1);
}

fn cube_info(faces: &[&str]) -> RequestInfo {
    let mut info = RequestInfo::new(ResourceKind::Texture).with_texture(TextureOptions {
        texture_type: TextureType::Cube,
        ..Default::default()
    });
    for face in faces {
        info = info.with_asset(AssetRequest::image(*face, "sky"));
    }
    info
}

const FACES: [&str; 6] = ["px.png", "nx.png", "py.png", "ny.png", "pz.png", "nz.png"];

#[test]
fn test_cube_faces_join_in_any_order() {
    let mut fx = fixture_with(MemoryAssetSource::manual(), no_reload());
    for (i, face) in FACES.iter().enumerate() {
        fx.source.insert_image("sky", *face, ImageAsset::filled(2, 2, &[i as u8, 0, 0, 255]));
    }

    let handle = fx.system.request("skybox", cube_info(&FACES)).unwrap();
    for face in FACES.iter().rev() {
        assert!(fx.source.complete_named(*face));
        fx.system.update();
    }

    let texture = fx.system.get(handle).unwrap().payload::<Texture>().unwrap().clone();
    assert_eq!(texture.texture_type, TextureType::Cube);
    assert_eq!(texture.layers, 6);
    let uploaded = fx.backend.texture_named(&Name::new("skybox")).unwrap();
    // Faces land in request order regardless of completion order
    let layer = 2 * 2 * 4;
    for i in 0..6 {
        assert_eq!(uploaded.data[i * layer], i as u8);
    }
}

#[test]
fn test_cube_with_failed_face_reports_failure() {
    let mut fx = fixture_with(MemoryAssetSource::manual(), no_reload());
    for face in &FACES[..5] {
        fx.source.insert_image("sky", *face, ImageAsset::filled(1, 1, &[0, 0, 0, 255]));
    }

    let handle = fx.system.request("skybox", cube_info(&FACES)).unwrap();
    fx.source.complete_all();
    fx.system.update();

    let events = fx.system.drain_events();
    assert!(events.iter().any(|e| matches!(e, ResourceEvent::Failed { name, .. } if name.as_str() == "skybox")));
    assert!(!fx.system.get(handle).unwrap().is_loaded());
    assert_eq!(fx.backend.texture_count(), 0);
    assert!(fx.system.release("skybox"));
    assert!(fx.system.is_empty());
}

#[test]
fn test_cube_needs_six_faces() {
    let mut fx = fixture();
    let err = fx.system.request("skybox", cube_info(&FACES[..5])).unwrap_err();
    assert!(matches!(err, ResourceError::AssetCountMismatch { found: 5, .. }));
    assert!(fx.system.is_empty());
}

#[test]
fn test_release_mid_load_discards_completion() {
    let mut fx = fixture_with(MemoryAssetSource::manual(), no_reload());
    fx.source.insert_image("core", "late.png", ImageAsset::filled(1, 1, &[1, 1, 1, 1]));
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();

    fx.system
        .request(
            "late",
            texture_info("late.png").with_callback(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();
    assert!(fx.system.release("late"));
    assert!(fx.system.is_empty());

    fx.source.complete_all();
    fx.system.update();

    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert_eq!(fx.source.released_count(), 1);
    assert_eq!(fx.backend.texture_count(), 0);
    assert!(loaded_names(&fx.system.drain_events()).is_empty());
}

#[test]
fn test_inline_pixels() {
    let mut fx = fixture();
    let info = RequestInfo::new(ResourceKind::Texture).with_texture(TextureOptions {
        pixels: Some(ImageAsset::filled(1, 1, &[255, 255, 255, 255])),
        ..Default::default()
    });

    let handle = fx.system.request("texture_builtin_white", info).unwrap();
    assert!(fx.system.get(handle).unwrap().is_loaded());
    assert_eq!(fx.source.total_requests(), 0);
}

// ---- Materials ----

#[test]
fn test_materials_share_map_textures() {
    let mut fx = fixture_with(MemoryAssetSource::new(), no_reload());
    fx.source.insert_image("core", "brick.png", ImageAsset::filled(2, 2, &[180, 60, 40, 255]));
    let config = r#"{ "package": "core", "base_color_map": "brick.png" }"#;

    fx.system.request("wall", material_info(config).synchronous()).unwrap();
    fx.system.request("floor", material_info(config).synchronous()).unwrap();

    assert_eq!(fx.system.reference_count("brick.png"), Some(2));
    assert_eq!(fx.backend.instance_count(), 2);
    let wall = fx.system.get_by_name("wall").unwrap().payload::<Material>().unwrap();
    assert_eq!(wall.base_color_texture, Some(Name::new("brick.png")));
    assert!(wall.packed_mra.is_none());

    fx.system.release("wall");
    assert_eq!(fx.system.reference_count("brick.png"), Some(1));
    fx.system.release("floor");
    assert!(fx.system.find("brick.png").is_none());
    assert_eq!(fx.backend.texture_count(), 0);
    assert_eq!(fx.backend.instance_count(), 0);
}

#[test]
fn test_material_config_from_asset() {
    let mut fx = fixture();
    fx.source.insert_text("core", "plastic.json", r#"{ "roughness": 0.9, "double_sided": true }"#);

    let info = RequestInfo::new(ResourceKind::Material).with_asset(AssetRequest::text("plastic.json", "core"));
    let handle = fx.system.request("plastic", info).unwrap();
    fx.system.update();

    let material = fx.system.get(handle).unwrap().payload::<Material>().unwrap();
    assert_eq!(material.roughness, 0.9);
    assert!(material.double_sided);
    assert_eq!(material.shader, Name::new("shader_builtin_pbr"));
}

#[test]
fn test_material_with_bad_config_is_reclaimed() {
    let mut fx = fixture();
    let err = fx
        .system
        .request("broken", material_info("{ not json").synchronous())
        .unwrap_err();

    assert!(matches!(err, ResourceError::InvalidConfig { .. }));
    assert!(fx.system.is_empty());
    assert_eq!(fx.backend.instance_count(), 0);
}

// ---- Shaders ----

const BASIC_SHADER: &str = r#"{
    "package": "shaders",
    "stages": [
        { "stage": "vertex", "file": "basic.vert" },
        { "stage": "fragment", "source": "void main() {}" }
    ],
    "uniforms": ["view_projection"]
}"#;

#[test]
fn test_shader_stage_hot_reload() {
    let mut fx = fixture();
    fx.source.insert_text("shaders", "basic.vert", "// v1");

    let info = RequestInfo::new(ResourceKind::Shader).with_source_text(BASIC_SHADER);
    let handle = fx.system.request("basic", info).unwrap();
    fx.system.update();

    let shader = fx.system.get(handle).unwrap().payload::<Shader>().unwrap();
    assert_eq!(shader.stage_source(ShaderStage::Vertex), Some("// v1"));
    assert_eq!(fx.backend.shader_count(), 1);

    assert!(fx.source.modify("shaders", "basic.vert", AssetData::Text("// v2".into())));
    fx.system.update();

    let shader = fx.system.get(handle).unwrap().payload::<Shader>().unwrap();
    assert_eq!(shader.stage_source(ShaderStage::Vertex), Some("// v2"));
    let backend_desc = fx.backend.shader(shader.backend.unwrap()).unwrap();
    assert_eq!(backend_desc.stages[0].source, "// v2");
    assert_eq!(fx.backend.shader_reloads(), 1);
    assert_eq!(fx.system.get(handle).unwrap().generation().value(), Some(1));
}

#[test]
fn test_shader_missing_stage_file_fails() {
    let mut fx = fixture();
    let info = RequestInfo::new(ResourceKind::Shader)
        .with_source_text(BASIC_SHADER)
        .synchronous();

    let err = fx.system.request("basic", info).unwrap_err();
    assert!(matches!(err, ResourceError::Asset(AssetError::NotFound { .. })));
    assert_eq!(fx.system.watch_count(), 0);
    assert_eq!(fx.backend.shader_count(), 0);
}

// ---- Other kinds ----

#[test]
fn test_static_mesh_upload_and_release() {
    let mut fx = fixture();
    let config = r#"{ "geometries": [{
        "name": "tri",
        "vertices": [
            { "position": [0, 0, 0] },
            { "position": [1, 0, 0] },
            { "position": [0, 1, 0], "uv": [0, 1] }
        ],
        "indices": [0, 1, 2]
    }] }"#;

    let info = RequestInfo::new(ResourceKind::StaticMesh)
        .with_source_text(config)
        .synchronous();
    let handle = fx.system.request("tri_mesh", info).unwrap();

    let mesh = fx.system.get(handle).unwrap().payload::<StaticMesh>().unwrap();
    assert_eq!(mesh.geometries.len(), 1);
    assert_eq!(mesh.geometries[0].index_count, 3);
    assert_eq!(mesh.geometries[0].bounds.max, [1.0, 1.0, 0.0]);
    assert_eq!(fx.backend.geometry_count(), 1);

    fx.system.release("tri_mesh");
    assert_eq!(fx.backend.geometry_count(), 0);
}

#[test]
fn test_scene_hierarchy() {
    let mut fx = fixture();
    let config = r#"{ "nodes": [
        { "name": "root" },
        { "name": "sun", "parent": "root",
          "attachments": [{ "type": "directional_light", "direction": [0, -1, 0] }] }
    ] }"#;

    let handle = fx
        .system
        .request("level", RequestInfo::new(ResourceKind::Scene).with_source_text(config))
        .unwrap();

    let scene = fx.system.get(handle).unwrap().payload::<Scene>().unwrap();
    assert_eq!(scene.name, Name::new("level"));
    assert_eq!(scene.children(0).count(), 1);
}

#[test]
fn test_heightmap_terrain_chains_image_load() {
    let mut fx = fixture();
    fx.source.insert_text("core", "hills.json", r#"{ "heightmap": "hills.png", "package": "core", "height_scale": 5.0 }"#);
    fx.source.insert_image("core", "hills.png", ImageAsset::filled(4, 3, &[255]));

    let info = RequestInfo::new(ResourceKind::HeightmapTerrain).with_asset(AssetRequest::text("hills.json", "core"));
    let handle = fx.system.request("hills", info).unwrap();
    assert!(fx.system.wait_idle(std::time::Duration::from_secs(1)));

    let resource = fx.system.get(handle).unwrap();
    assert!(resource.is_loaded());
    let terrain = resource.payload::<HeightmapTerrain>().unwrap();
    assert_eq!((terrain.width, terrain.depth), (4, 3));
    assert_eq!(terrain.height_at(3, 2), Some(5.0));
    assert_eq!(fx.backend.geometry_count(), 1);
}

const MONO_FONT: &str = r#"{
    "face": "mono", "size": 16, "line_height": 18, "baseline": 13,
    "atlas_size": [64, 64], "package": "fonts",
    "pages": [{ "id": 0, "file": "mono_0.png" }, { "id": 1, "file": "mono_1.png" }],
    "glyphs": [{ "codepoint": 65, "x": 0, "y": 0, "width": 8, "height": 12, "x_advance": 9, "page": 1 }]
}"#;

#[test]
fn test_bitmap_font_holds_page_textures() {
    let mut fx = fixture_with(MemoryAssetSource::new(), no_reload());
    fx.source.insert_image("fonts", "mono_0.png", ImageAsset::filled(64, 64, &[0]));
    fx.source.insert_image("fonts", "mono_1.png", ImageAsset::filled(64, 64, &[0]));

    let info = RequestInfo::new(ResourceKind::BitmapFont)
        .with_source_text(MONO_FONT)
        .synchronous();
    let handle = fx.system.request("mono", info).unwrap();

    let font = fx.system.get(handle).unwrap().payload::<BitmapFont>().unwrap();
    assert_eq!(font.pages.len(), 2);
    assert_eq!(font.measure("AA"), 18);
    assert_eq!(fx.backend.texture_count(), 2);

    fx.system.release("mono");
    assert_eq!(fx.backend.texture_count(), 0);
    assert!(fx.system.is_empty());
}

#[test]
fn test_bitmap_font_missing_page_releases_earlier_pages() {
    let mut fx = fixture_with(MemoryAssetSource::new(), no_reload());
    fx.source.insert_image("fonts", "mono_0.png", ImageAsset::filled(64, 64, &[0]));

    let info = RequestInfo::new(ResourceKind::BitmapFont)
        .with_source_text(MONO_FONT)
        .synchronous();
    assert!(fx.system.request("mono", info).is_err());

    assert!(fx.system.is_empty());
    assert_eq!(fx.backend.texture_count(), 0);
}

fn wav(channels: u16, sample_rate: u32, samples: &[u8]) -> Vec<u8> {
    let block = channels * 2;
    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + samples.len() as u32).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * block as u32).to_le_bytes());
    out.extend_from_slice(&block.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&(samples.len() as u32).to_le_bytes());
    out.extend_from_slice(samples);
    out
}

#[test]
fn test_audio_clip() {
    let mut fx = fixture();
    fx.source.insert("sfx", "click.wav", AssetData::Binary(wav(1, 4000, &[0; 2000])));
    fx.source.insert("sfx", "noise.wav", AssetData::Binary(vec![7; 64]));

    let info = |file: &str| {
        RequestInfo::new(ResourceKind::Audio)
            .with_asset(AssetRequest::binary(file, "sfx"))
            .synchronous()
    };
    let handle = fx.system.request("click", info("click.wav")).unwrap();
    let clip = fx.system.get(handle).unwrap().payload::<AudioClip>().unwrap();
    assert_eq!(clip.sample_rate, 4000);
    assert!((clip.duration() - 0.25).abs() < 1e-6);

    let err = fx.system.request("noise", info("noise.wav")).unwrap_err();
    assert!(matches!(err, ResourceError::Asset(AssetError::Decode { .. })));
}

#[test]
fn test_shutdown_releases_pinned_resources() {
    let mut fx = fixture();
    fx.source.insert_image("core", "grass.png", ImageAsset::filled(1, 1, &[0, 0, 0, 0]));
    fx.system.request("grass", texture_info("grass.png").synchronous()).unwrap();
    fx.system.release("grass");

    // Hot-reloadable kinds stay resident at zero references
    assert!(fx.system.find("grass").is_some());

    fx.system.shutdown();
    assert!(fx.system.is_empty());
    assert_eq!(fx.system.watch_count(), 0);
    assert_eq!(fx.backend.texture_count(), 0);
}
