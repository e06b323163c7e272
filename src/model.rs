//! Engine-ready model produced by the importer.
//!
//! Everything here is owned by [`Model`]; nothing references the source
//! document once the import has finished.

use std::collections::HashMap;

use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector2, Vector3};

use crate::diagnostic::ImportDiagnostics;

/// Axis-aligned bounding box. Starts empty (inverted) until a point is added.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extents {
    pub minimum: Vector3<f32>,
    pub maximum: Vector3<f32>,
}

impl Default for Extents {
    fn default() -> Self {
        Self {
            minimum: Vector3::repeat(f32::INFINITY),
            maximum: Vector3::repeat(f32::NEG_INFINITY),
        }
    }
}

impl Extents {
    pub fn is_empty(&self) -> bool {
        self.minimum.x > self.maximum.x
    }

    pub fn add_point(&mut self, point: &Vector3<f32>) {
        self.minimum = self.minimum.inf(point);
        self.maximum = self.maximum.sup(point);
    }

    pub fn add_extents(&mut self, other: &Extents) {
        if !other.is_empty() {
            self.add_point(&other.minimum);
            self.add_point(&other.maximum);
        }
    }

    pub fn size(&self) -> Vector3<f32> {
        if self.is_empty() {
            Vector3::zeros()
        } else {
            self.maximum - self.minimum
        }
    }

    /// Grows the box symmetrically so that no axis is thinner than `dimension`.
    pub fn pad_to_minimum(&mut self, dimension: f32) {
        if self.is_empty() {
            return;
        }
        let delta = (Vector3::repeat(dimension) - self.size()).sup(&Vector3::zeros()) / 2.0;
        self.minimum -= delta;
        self.maximum += delta;
    }
}

/// One node of the output skeleton, indexed by output (parent-first) order.
#[derive(Debug, Clone)]
pub struct Joint {
    pub name: String,
    /// Parent in output order; `None` for roots.
    pub parent: Option<usize>,
    /// Local transform relative to the parent.
    pub transform: Matrix4<f32>,
    pub translation: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    /// Scale that the translation/rotation pair cannot express.
    pub post_transform: Matrix4<f32>,
    pub inverse_bind_matrix: Matrix4<f32>,
    /// Listed by at least one skin.
    pub is_skeleton_joint: bool,
}

/// Binding of a mesh to one joint.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub joint_index: usize,
    pub inverse_bind_matrix: Matrix4<f32>,
}

/// A triangle list referencing one material.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshPart {
    /// Indices into the owning mesh's vertex streams, three per triangle.
    pub triangle_indices: Vec<u32>,
    pub material_id: Option<String>,
}

/// Per-vertex deformation channel of one mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Blendshape {
    /// Mesh vertex index each delta applies to.
    pub indices: Vec<u32>,
    pub vertices: Vec<Vector3<f32>>,
    pub normals: Vec<Vector3<f32>>,
}

impl Blendshape {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Makes room for deltas up to (excluding) `len`. New entries address
    /// their own vertex and carry zero deltas.
    pub(crate) fn ensure_len(&mut self, len: usize) {
        if self.indices.len() < len {
            let start = self.indices.len() as u32;
            self.indices.extend(start..len as u32);
            self.vertices.resize(len, Vector3::zeros());
            self.normals.resize(len, Vector3::zeros());
        }
    }
}

/// Mesh with all primitives merged into shared vertex streams.
///
/// `vertices` defines the vertex count; `normals` always matches it. The
/// other per-vertex streams are either empty or vertex-aligned.
#[derive(Debug, Clone)]
pub struct Mesh {
    /// Source node (document index) this mesh was instanced from.
    pub node_index: usize,
    pub name: Option<String>,
    pub vertices: Vec<Vector3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub tangents: Vec<Vector3<f32>>,
    pub tex_coords: Vec<Vector2<f32>>,
    pub tex_coords1: Vec<Vector2<f32>>,
    /// sRGB vertex colors.
    pub colors: Vec<Vector3<f32>>,
    /// Four positions in `clusters` per vertex.
    pub cluster_indices: Vec<u32>,
    /// Four fixed-point weights per vertex, summing to `u16::MAX`.
    pub cluster_weights: Vec<u16>,
    pub clusters: Vec<Cluster>,
    pub parts: Vec<MeshPart>,
    /// Indexed by blendshape channel; empty when the mesh has no mapped targets.
    pub blendshapes: Vec<Blendshape>,
    pub model_transform: Matrix4<f32>,
    pub extents: Extents,
}

impl Mesh {
    pub(crate) fn new(node_index: usize, name: Option<String>, model_transform: Matrix4<f32>) -> Self {
        Self {
            node_index,
            name,
            vertices: Vec::new(),
            normals: Vec::new(),
            tangents: Vec::new(),
            tex_coords: Vec::new(),
            tex_coords1: Vec::new(),
            colors: Vec::new(),
            cluster_indices: Vec::new(),
            cluster_weights: Vec::new(),
            clusters: Vec::new(),
            parts: Vec::new(),
            blendshapes: Vec::new(),
            model_transform,
            extents: Extents::default(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.parts
            .iter()
            .map(|part| part.triangle_indices.len() / 3)
            .sum()
    }
}

/// How alpha in the albedo is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OpacityMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CullMode {
    #[default]
    Back,
    None,
}

/// Image channel a texture slot samples from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorChannel {
    #[default]
    Rgba,
    Green,
    Blue,
}

/// Reference to an image, either embedded or by locator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Texture {
    /// File name component of the image URI.
    pub name: String,
    /// Resolved locator; for embedded images suffixed with the image index.
    pub filename: String,
    /// Raw encoded image bytes when embedded in the asset.
    pub content: Vec<u8>,
    pub texcoord_set: u32,
    pub source_channel: ColorChannel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutlineWidthMode {
    #[default]
    None,
    WorldCoordinates,
    ScreenCoordinates,
}

/// Stylized toon shading parameters (VRM MToon).
#[derive(Debug, Clone, PartialEq)]
pub struct MToon {
    pub shade: Vector3<f32>,
    pub shade_texture: Option<Texture>,
    pub shading_shift: f32,
    pub shading_shift_texture: Option<Texture>,
    pub shading_toony: f32,
    pub matcap: Vector3<f32>,
    pub matcap_texture: Option<Texture>,
    pub parametric_rim: Vector3<f32>,
    pub parametric_rim_fresnel_power: f32,
    pub parametric_rim_lift: f32,
    pub rim_texture: Option<Texture>,
    pub rim_lighting_mix: f32,
    pub outline_width_mode: OutlineWidthMode,
    pub outline_width: f32,
    pub outline: Vector3<f32>,
    pub uv_animation_texture: Option<Texture>,
    pub uv_animation_scroll_x_speed: f32,
    pub uv_animation_scroll_y_speed: f32,
    pub uv_animation_rotation_speed: f32,
}

impl Default for MToon {
    fn default() -> Self {
        Self {
            shade: Vector3::zeros(),
            shade_texture: None,
            shading_shift: 0.0,
            shading_shift_texture: None,
            shading_toony: 0.9,
            matcap: Vector3::zeros(),
            matcap_texture: None,
            parametric_rim: Vector3::zeros(),
            parametric_rim_fresnel_power: 5.0,
            parametric_rim_lift: 0.0,
            rim_texture: None,
            rim_lighting_mix: 1.0,
            outline_width_mode: OutlineWidthMode::None,
            outline_width: 0.0,
            outline: Vector3::zeros(),
            uv_animation_texture: None,
            uv_animation_scroll_x_speed: 0.0,
            uv_animation_scroll_y_speed: 0.0,
            uv_animation_rotation_speed: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub id: String,
    pub name: String,
    pub opacity_mode: OpacityMode,
    pub opacity_cutoff: f32,
    pub cull_mode: CullMode,
    pub unlit: bool,
    /// sRGB albedo.
    pub albedo: Vector3<f32>,
    pub opacity: f32,
    pub metallic: f32,
    pub roughness: f32,
    /// sRGB emissive color.
    pub emissive: Vector3<f32>,
    pub is_pbr: bool,
    pub albedo_texture: Option<Texture>,
    pub opacity_texture: Option<Texture>,
    pub metallic_texture: Option<Texture>,
    pub roughness_texture: Option<Texture>,
    pub normal_texture: Option<Texture>,
    pub occlusion_texture: Option<Texture>,
    pub emissive_texture: Option<Texture>,
    pub mtoon: Option<MToon>,
}

impl Material {
    pub(crate) fn new(id: String) -> Self {
        Self {
            name: id.clone(),
            id,
            opacity_mode: OpacityMode::Opaque,
            opacity_cutoff: 0.5,
            cull_mode: CullMode::Back,
            unlit: false,
            albedo: Vector3::repeat(1.0),
            opacity: 1.0,
            metallic: 0.0,
            roughness: 1.0,
            emissive: Vector3::zeros(),
            is_pbr: false,
            albedo_texture: None,
            opacity_texture: None,
            metallic_texture: None,
            roughness_texture: None,
            normal_texture: None,
            occlusion_texture: None,
            emissive_texture: None,
            mtoon: None,
        }
    }
}

/// Normalized model aggregate returned by [`crate::import_model`].
#[derive(Debug, Clone)]
pub struct Model {
    pub original_url: String,
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub joints: Vec<Joint>,
    /// True when the source declared at least one skin.
    pub has_skeleton_joints: bool,
    /// Per joint, vertices positioned in that joint's space.
    pub shape_vertices: Vec<Vec<Point3<f32>>>,
    pub meshes: Vec<Mesh>,
    pub materials: HashMap<String, Material>,
    /// Canonical channel names, indexing every mesh's `blendshapes`.
    pub blendshape_channel_names: Vec<String>,
    pub offset: Matrix4<f32>,
    pub bind_extents: Extents,
    pub mesh_extents: Extents,
    pub diagnostics: ImportDiagnostics,
}

impl Model {
    pub fn joint_index(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|joint| joint.name == name)
    }

    pub fn blendshape_channel(&self, name: &str) -> Option<usize> {
        self.blendshape_channel_names
            .iter()
            .position(|channel| channel == name)
    }
}
