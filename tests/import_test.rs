mod common;

use std::cell::RefCell;

use nalgebra::Vector3;
use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;

use common::{BufferBuilder, TRIANGLE, base_url, init_tracing, offline, single_triangle};
use vrm_model_import::{
    BLENDSHAPE_NAMES, BlendshapeMapping, CullMode, ImportError, ImportOptions, ResourceFetcher,
    Strictness, import_model,
};

/// Serves one fixed buffer and remembers which URLs were asked for.
struct StaticFetcher {
    bytes: Vec<u8>,
    requested: RefCell<Vec<String>>,
}

impl ResourceFetcher for StaticFetcher {
    fn fetch(&self, url: &Url) -> anyhow::Result<Vec<u8>> {
        self.requested.borrow_mut().push(url.to_string());
        Ok(self.bytes.clone())
    }
}

fn near(a: Vector3<f32>, b: Vector3<f32>) -> bool {
    (a - b).norm() < 1e-5
}

// ─── Basic assets ─────────────────────────────────────────────────────────────

#[test]
fn given_single_triangle_when_importing_then_one_mesh_one_part_one_joint() {
    init_tracing();
    let mut builder = BufferBuilder::new();
    let document = single_triangle(&mut builder);
    let data = builder.into_gltf(document);

    let model = import_model(&data, &base_url(), &ImportOptions::default(), &offline)
        .expect("import");

    assert_eq!(model.meshes.len(), 1);
    assert_eq!(model.joints.len(), 1);
    assert_eq!(model.joints[0].name, "Body");
    assert!(!model.has_skeleton_joints);
    assert!(model.diagnostics.is_clean());

    let mesh = &model.meshes[0];
    assert_eq!(mesh.parts.len(), 1);
    assert_eq!(mesh.parts[0].triangle_indices, vec![0, 1, 2]);
    assert_eq!(mesh.vertex_count(), 3);
    assert_eq!(mesh.cluster_weights[..4].to_vec(), vec![u16::MAX, 0, 0, 0]);
    assert_eq!(mesh.clusters.len(), 2);
    assert_eq!(model.blendshape_channel_names.len(), BLENDSHAPE_NAMES.len());
    assert_eq!(model.original_url, "file:///models/avatar.gltf");
}

#[test]
fn given_glb_container_when_importing_then_binary_chunk_feeds_buffer_zero() {
    init_tracing();
    let mut builder = BufferBuilder::new();
    let document = single_triangle(&mut builder);
    let data = builder.into_glb(document);

    let model = import_model(&data, &base_url(), &ImportOptions::default(), &offline)
        .expect("import");

    let mesh = &model.meshes[0];
    assert_eq!(mesh.vertices, TRIANGLE.iter().map(|p| Vector3::from(*p)).collect::<Vec<_>>());
    assert!(near(model.mesh_extents.maximum, Vector3::new(1.0, 1.0, 0.0)));
    assert!(near(model.mesh_extents.minimum, Vector3::zeros()));
}

#[test]
fn given_vrm1_meta_when_importing_then_title_and_authors_are_set() {
    let mut builder = BufferBuilder::new();
    let mut document = single_triangle(&mut builder);
    document["extensionsUsed"] = json!(["VRMC_vrm"]);
    document["extensions"] = json!({
        "VRMC_vrm": { "meta": { "name": "Alicia", "authors": ["Dwango"] } }
    });
    let data = builder.into_gltf(document);

    let model = import_model(&data, &base_url(), &ImportOptions::default(), &offline)
        .expect("import");

    assert_eq!(model.title.as_deref(), Some("Alicia"));
    assert_eq!(model.authors, vec!["Dwango"]);
}

#[test]
fn given_scene_without_meshes_when_importing_then_empty_model_error() {
    let builder = BufferBuilder::new();
    let data = builder.into_gltf(json!({
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "name": "Root" }],
    }));

    let result = import_model(&data, &base_url(), &ImportOptions::default(), &offline);

    assert!(matches!(
        result,
        Err(ImportError::EmptyModel { meshes: 0, joints: 1 })
    ));
}

// ─── External resources ───────────────────────────────────────────────────────

#[test]
fn given_unfetchable_external_buffer_when_importing_then_import_fails() {
    let mut builder = BufferBuilder::new();
    let document = single_triangle(&mut builder);
    let (data, _) = builder.into_gltf_external(document, "avatar.bin");

    let result = import_model(&data, &base_url(), &ImportOptions::default(), &offline);

    assert!(matches!(
        result,
        Err(ImportError::MissingBuffer { index: 0, .. })
    ));
}

#[test]
fn given_external_buffer_when_importing_then_it_is_resolved_against_base_url() {
    let mut builder = BufferBuilder::new();
    let document = single_triangle(&mut builder);
    let (data, bytes) = builder.into_gltf_external(document, "buffers/avatar.bin");
    let fetcher = StaticFetcher {
        bytes,
        requested: RefCell::new(Vec::new()),
    };

    let model = import_model(&data, &base_url(), &ImportOptions::default(), &fetcher)
        .expect("import");

    assert_eq!(model.meshes.len(), 1);
    assert_eq!(
        fetcher.requested.into_inner(),
        vec!["file:///models/buffers/avatar.bin".to_string()]
    );
}

// ─── Partial failures ─────────────────────────────────────────────────────────

#[test]
fn given_out_of_range_index_in_one_primitive_when_importing_then_only_that_primitive_is_dropped() {
    init_tracing();
    let mut builder = BufferBuilder::new();
    let positions = builder.vec3(&TRIANGLE);
    let normals = builder.vec3(&[[0.0, 0.0, 1.0]; 3]);
    let good = builder.indices_u16(&[0, 1, 2]);
    let bad = builder.indices_u16(&[0, 1, 7]);
    let data = builder.into_gltf(json!({
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{
            "primitives": [
                { "attributes": { "POSITION": positions, "NORMAL": normals }, "indices": good },
                { "attributes": { "POSITION": positions, "NORMAL": normals }, "indices": bad },
            ],
        }],
    }));

    let model = import_model(&data, &base_url(), &ImportOptions::default(), &offline)
        .expect("import");

    assert_eq!(model.meshes[0].parts.len(), 1);
    assert_eq!(model.meshes[0].vertex_count(), 3);
    assert_eq!(model.diagnostics.error_count, 1);
    assert!(model.diagnostics.has_code("INDEX_OUT_OF_RANGE"));
    assert_eq!(model.joints[0].name, "node_0");
}

#[test]
fn given_index_count_beyond_view_when_importing_then_primitive_is_rejected_without_allocating() {
    let mut builder = BufferBuilder::new();
    let positions = builder.vec3(&TRIANGLE);
    let normals = builder.vec3(&[[0.0, 0.0, 1.0]; 3]);
    let good = builder.indices_u16(&[0, 1, 2]);
    let huge = builder.indices_u32(&[0, 1, 2]);
    builder.set_count(huge, 1 << 44);
    let data = builder.into_gltf(json!({
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{
            "primitives": [
                { "attributes": { "POSITION": positions, "NORMAL": normals }, "indices": good },
                { "attributes": { "POSITION": positions, "NORMAL": normals }, "indices": huge },
            ],
        }],
    }));

    let model = import_model(&data, &base_url(), &ImportOptions::default(), &offline)
        .expect("import");

    assert_eq!(model.meshes[0].parts.len(), 1);
    assert!(model.diagnostics.has_code("INVALID_PRIMITIVE"));
}

#[test]
fn given_missing_material_when_importing_then_part_has_no_material() {
    let mut builder = BufferBuilder::new();
    let mut document = single_triangle(&mut builder);
    document["meshes"][0]["primitives"][0]["material"] = json!(4);
    let data = builder.into_gltf(document);

    let model = import_model(&data, &base_url(), &ImportOptions::default(), &offline)
        .expect("import");

    assert_eq!(model.meshes[0].parts[0].material_id, None);
    assert!(model.diagnostics.has_code("INVALID_MATERIAL"));
}

#[test]
fn given_unknown_required_extension_when_strict_then_import_fails() {
    let mut builder = BufferBuilder::new();
    let mut document = single_triangle(&mut builder);
    document["extensionsRequired"] = json!(["EXT_made_up"]);
    let data = builder.into_gltf(document);

    let lenient = import_model(&data, &base_url(), &ImportOptions::default(), &offline)
        .expect("lenient import");
    let strict = ImportOptions {
        strictness: Strictness::Strict,
        ..ImportOptions::default()
    };

    assert!(lenient.diagnostics.has_code("UNSUPPORTED_EXTENSION"));
    assert!(matches!(
        import_model(&data, &base_url(), &strict, &offline),
        Err(ImportError::Parse(_))
    ));
}

// ─── Geometry and materials ──────────────────────────────────────────────────

#[test]
fn given_primitive_without_normals_when_importing_then_flat_normals_are_synthesized() {
    let mut builder = BufferBuilder::new();
    let positions = builder.vec3(&[
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [1.0, 1.0, 0.0],
    ]);
    let indices = builder.indices_u32(&[0, 1, 2, 2, 1, 3]);
    let data = builder.into_gltf(json!({
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "name": "Quad", "mesh": 0 }],
        "meshes": [{
            "primitives": [{ "attributes": { "POSITION": positions }, "indices": indices }],
        }],
    }));

    let model = import_model(&data, &base_url(), &ImportOptions::default(), &offline)
        .expect("import");

    let mesh = &model.meshes[0];
    assert_eq!(mesh.vertex_count(), 6);
    assert_eq!(mesh.parts[0].triangle_indices, vec![0, 1, 2, 3, 4, 5]);
    assert!(mesh.normals.iter().all(|normal| near(*normal, Vector3::z())));
}

#[test]
fn given_double_sided_material_when_importing_then_culling_is_disabled() {
    let mut builder = BufferBuilder::new();
    let mut document = single_triangle(&mut builder);
    document["materials"] = json!([{
        "name": "Skin",
        "doubleSided": true,
        "alphaMode": "MASK",
        "pbrMetallicRoughness": { "baseColorFactor": [1.0, 1.0, 1.0, 0.5] },
    }]);
    document["meshes"][0]["primitives"][0]["material"] = json!(0);
    let data = builder.into_gltf(document);

    let model = import_model(&data, &base_url(), &ImportOptions::default(), &offline)
        .expect("import");

    assert_eq!(model.meshes[0].parts[0].material_id.as_deref(), Some("Skin"));
    let material = &model.materials["Skin"];
    assert_eq!(material.cull_mode, CullMode::None);
    assert!((material.opacity - 0.5).abs() < 1e-6);
    assert!((material.opacity_cutoff - 0.5).abs() < 1e-6);
}

// ─── Blendshapes ──────────────────────────────────────────────────────────────

#[test]
fn given_two_targets_mapped_to_one_channel_when_importing_then_scaled_deltas_sum() {
    let mut builder = BufferBuilder::new();
    let positions = builder.vec3(&TRIANGLE);
    let normals = builder.vec3(&[[0.0, 0.0, 1.0]; 3]);
    let indices = builder.indices_u16(&[0, 1, 2]);
    let open = builder.vec3(&[[1.0, 0.0, 0.0]; 3]);
    let drop = builder.vec3(&[[0.0, 2.0, 0.0]; 3]);
    let data = builder.into_gltf(json!({
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "name": "Face", "mesh": 0 }],
        "meshes": [{
            "extras": { "targetNames": ["mouth_open", "jaw_drop"] },
            "primitives": [{
                "attributes": { "POSITION": positions, "NORMAL": normals },
                "indices": indices,
                "targets": [{ "POSITION": open }, { "POSITION": drop }],
            }],
        }],
    }));
    let options = ImportOptions {
        blendshapes: vec![
            BlendshapeMapping {
                channel: "JawOpen".to_string(),
                source: "mouth_open".to_string(),
                weight: 0.5,
            },
            BlendshapeMapping {
                channel: "JawOpen".to_string(),
                source: "jaw_drop".to_string(),
                weight: 0.5,
            },
        ],
        ..ImportOptions::default()
    };

    let model = import_model(&data, &base_url(), &options, &offline).expect("import");

    let channel = model.blendshape_channel("JawOpen").expect("JawOpen channel");
    let mesh = &model.meshes[0];
    assert_eq!(mesh.blendshapes.len(), BLENDSHAPE_NAMES.len());
    let shape = &mesh.blendshapes[channel];
    assert_eq!(shape.indices, vec![0, 1, 2]);
    assert!(shape.vertices.iter().all(|delta| near(*delta, Vector3::new(0.5, 1.0, 0.0))));
    assert!(mesh
        .blendshapes
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != channel)
        .all(|(_, shape)| shape.vertices.iter().all(|delta| *delta == Vector3::zeros())));
}

// ─── Skinning ─────────────────────────────────────────────────────────────────

#[test]
fn given_two_bone_skin_when_importing_then_joints_and_weights_follow_the_skin() {
    init_tracing();
    let mut builder = BufferBuilder::new();
    let positions = builder.vec3(&[[0.0, 0.0, 0.0], [0.2, 1.0, 0.0], [-0.2, 1.0, 0.0]]);
    let normals = builder.vec3(&[[0.0, 0.0, 1.0]; 3]);
    let indices = builder.indices_u16(&[0, 1, 2]);
    let joints = builder.joints(&[[0, 0, 0, 0], [1, 0, 0, 0], [0, 1, 0, 0]]);
    let weights = builder.vec4(&[
        [1.0, 0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0, 0.0],
        [0.5, 0.5, 0.0, 0.0],
    ]);
    #[rustfmt::skip]
    let spine_inverse_bind = [
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, -1.0, 0.0, 1.0,
    ];
    #[rustfmt::skip]
    let identity = [
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    ];
    let inverse_binds = builder.mat4(&[identity, spine_inverse_bind]);
    let data = builder.into_gltf(json!({
        "scenes": [{ "nodes": [0, 2] }],
        "nodes": [
            { "name": "Hips", "children": [1] },
            { "name": "Spine", "translation": [0.0, 1.0, 0.0] },
            { "name": "Body", "mesh": 0, "skin": 0 },
        ],
        "skins": [{ "joints": [0, 1], "inverseBindMatrices": inverse_binds }],
        "meshes": [{
            "primitives": [{
                "attributes": {
                    "POSITION": positions,
                    "NORMAL": normals,
                    "JOINTS_0": joints,
                    "WEIGHTS_0": weights,
                },
                "indices": indices,
            }],
        }],
    }));

    let model = import_model(&data, &base_url(), &ImportOptions::default(), &offline)
        .expect("import");

    assert!(model.has_skeleton_joints);
    assert_eq!(model.joints.len(), 3);
    let hips = model.joint_index("Hips").expect("hips");
    let spine = model.joint_index("Spine").expect("spine");
    assert_eq!(model.joints[spine].parent, Some(hips));
    assert!(near(model.joints[spine].translation, Vector3::new(0.0, 1.0, 0.0)));
    assert!(near(
        model.joints[spine].inverse_bind_matrix.column(3).xyz(),
        Vector3::new(0.0, -1.0, 0.0)
    ));

    let mesh = &model.meshes[0];
    assert_eq!(mesh.clusters.len(), 4);
    assert_eq!(mesh.cluster_indices[4], spine as u32);
    assert_eq!(mesh.cluster_weights[8] as u32 + mesh.cluster_weights[9] as u32, u16::MAX as u32);
    for vertex in mesh.cluster_weights.chunks_exact(4) {
        assert_eq!(vertex.iter().map(|w| *w as u32).sum::<u32>(), u16::MAX as u32);
    }
    assert!(!model.shape_vertices[spine].is_empty());
    assert!(!model.bind_extents.is_empty());
    assert_eq!(model.diagnostics.error_count, 0);
}

#[test]
fn given_skin_listing_joints_out_of_output_order_when_importing_then_cluster_indices_address_clusters() {
    let mut builder = BufferBuilder::new();
    let positions = builder.vec3(&TRIANGLE);
    let normals = builder.vec3(&[[0.0, 0.0, 1.0]; 3]);
    let indices = builder.indices_u16(&[0, 1, 2]);
    let joints = builder.joints(&[[0, 0, 0, 0]; 3]);
    let weights = builder.vec4(&[[1.0, 0.0, 0.0, 0.0]; 3]);
    #[rustfmt::skip]
    let hand_inverse_bind = [
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, -2.0, 0.0, 1.0,
    ];
    let inverse_binds = builder.mat4(&[hand_inverse_bind]);
    let data = builder.into_gltf(json!({
        "scenes": [{ "nodes": [0, 1] }],
        "nodes": [
            { "name": "Body", "mesh": 0, "skin": 0 },
            { "name": "Root", "children": [2] },
            { "name": "Hand", "translation": [0.0, 2.0, 0.0] },
        ],
        "skins": [{ "joints": [2], "inverseBindMatrices": inverse_binds }],
        "meshes": [{
            "primitives": [{
                "attributes": {
                    "POSITION": positions,
                    "NORMAL": normals,
                    "JOINTS_0": joints,
                    "WEIGHTS_0": weights,
                },
                "indices": indices,
            }],
        }],
    }));

    let model = import_model(&data, &base_url(), &ImportOptions::default(), &offline)
        .expect("import");

    let hand = model.joint_index("Hand").expect("hand");
    let mesh = &model.meshes[0];
    assert_eq!(mesh.clusters.len(), model.joints.len() + 1);
    assert_eq!(mesh.cluster_indices[0], hand as u32);
    for slot in &mesh.cluster_indices {
        let cluster = &mesh.clusters[*slot as usize];
        assert!((*slot as usize) < model.joints.len());
        assert_eq!(cluster.joint_index, *slot as usize);
    }
    assert!(near(
        mesh.clusters[hand].inverse_bind_matrix.column(3).xyz(),
        Vector3::new(0.0, -2.0, 0.0)
    ));
}
