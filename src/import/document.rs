//! Raw glTF document: the JSON scene description decoded into typed arrays,
//! plus the buffer bytes once they are loaded. No semantic interpretation
//! happens here beyond structural index checks.

use std::collections::HashMap;

use gltf::binary::Glb;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::diagnostic::ImportDiagnostics;
use crate::error::ImportError;
use crate::options::{ImportOptions, Strictness};

use super::types::{GLB_MAGIC, SUPPORTED_EXTENSIONS};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Asset {
    pub(crate) version: String,
    pub(crate) generator: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Scene {
    pub(crate) nodes: Vec<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Node {
    pub(crate) name: Option<String>,
    pub(crate) children: Vec<usize>,
    pub(crate) matrix: Option<[f32; 16]>,
    pub(crate) translation: Option<[f32; 3]>,
    pub(crate) rotation: Option<[f32; 4]>,
    pub(crate) scale: Option<[f32; 3]>,
    pub(crate) mesh: Option<usize>,
    pub(crate) skin: Option<usize>,
}

impl Node {
    pub(crate) fn has_trs(&self) -> bool {
        self.translation.is_some() || self.rotation.is_some() || self.scale.is_some()
    }
}

const TRIANGLES: u32 = 4;

fn default_mode() -> u32 {
    TRIANGLES
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Primitive {
    #[serde(default)]
    pub(crate) attributes: HashMap<String, usize>,
    #[serde(default)]
    pub(crate) indices: Option<usize>,
    #[serde(default)]
    pub(crate) material: Option<usize>,
    #[serde(default = "default_mode")]
    pub(crate) mode: u32,
    #[serde(default)]
    pub(crate) targets: Vec<HashMap<String, usize>>,
}

impl Primitive {
    pub(crate) fn is_triangle_list(&self) -> bool {
        self.mode == TRIANGLES
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Mesh {
    pub(crate) name: Option<String>,
    pub(crate) primitives: Vec<Primitive>,
    pub(crate) extras: Option<Value>,
}

impl Mesh {
    /// Morph target names, by the `extras.targetNames` convention.
    pub(crate) fn target_names(&self) -> Vec<String> {
        self.extras
            .as_ref()
            .and_then(|extras| extras.get("targetNames"))
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .map(|name| name.as_str().unwrap_or_default().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct SparseIndices {
    pub(crate) buffer_view: usize,
    pub(crate) byte_offset: usize,
    pub(crate) component_type: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct SparseValues {
    pub(crate) buffer_view: usize,
    pub(crate) byte_offset: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Sparse {
    pub(crate) count: usize,
    pub(crate) indices: SparseIndices,
    pub(crate) values: SparseValues,
}

/// Component type and element type are kept as raw codes; the unpacker
/// turns them into closed enums and rejects unknown values per accessor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct Accessor {
    pub(crate) buffer_view: Option<usize>,
    pub(crate) byte_offset: usize,
    pub(crate) component_type: u32,
    pub(crate) normalized: bool,
    pub(crate) count: usize,
    #[serde(rename = "type")]
    pub(crate) element_type: String,
    pub(crate) sparse: Option<Sparse>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct BufferView {
    pub(crate) buffer: usize,
    pub(crate) byte_offset: usize,
    pub(crate) byte_length: usize,
    pub(crate) byte_stride: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct Buffer {
    pub(crate) uri: Option<String>,
    pub(crate) byte_length: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct TextureInfo {
    pub(crate) index: usize,
    pub(crate) tex_coord: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct PbrMetallicRoughness {
    pub(crate) base_color_factor: Option<[f32; 4]>,
    pub(crate) base_color_texture: Option<TextureInfo>,
    pub(crate) metallic_factor: Option<f32>,
    pub(crate) roughness_factor: Option<f32>,
    pub(crate) metallic_roughness_texture: Option<TextureInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct Material {
    pub(crate) name: Option<String>,
    pub(crate) pbr_metallic_roughness: Option<PbrMetallicRoughness>,
    pub(crate) normal_texture: Option<TextureInfo>,
    pub(crate) occlusion_texture: Option<TextureInfo>,
    pub(crate) emissive_texture: Option<TextureInfo>,
    pub(crate) emissive_factor: Option<[f32; 3]>,
    pub(crate) alpha_mode: Option<String>,
    pub(crate) alpha_cutoff: Option<f32>,
    pub(crate) double_sided: bool,
    pub(crate) extensions: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Texture {
    pub(crate) source: Option<usize>,
    pub(crate) extensions: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct Image {
    pub(crate) name: Option<String>,
    pub(crate) uri: Option<String>,
    pub(crate) buffer_view: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct Skin {
    pub(crate) inverse_bind_matrices: Option<usize>,
    pub(crate) joints: Vec<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct Root {
    pub(crate) asset: Asset,
    pub(crate) scenes: Vec<Scene>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) meshes: Vec<Mesh>,
    pub(crate) accessors: Vec<Accessor>,
    pub(crate) buffer_views: Vec<BufferView>,
    pub(crate) buffers: Vec<Buffer>,
    pub(crate) materials: Vec<Material>,
    pub(crate) textures: Vec<Texture>,
    pub(crate) images: Vec<Image>,
    pub(crate) skins: Vec<Skin>,
    pub(crate) extensions: Map<String, Value>,
    pub(crate) extensions_used: Vec<String>,
    pub(crate) extensions_required: Vec<String>,
}

/// Parsed document plus loaded buffer data.
#[derive(Debug)]
pub(crate) struct Document {
    pub(crate) root: Root,
    /// BIN chunk of a GLB container, consumed when buffers are loaded.
    pub(crate) glb_bin: Option<Vec<u8>>,
    /// One entry per declared buffer; `None` until loaded.
    pub(crate) buffer_data: Vec<Option<Vec<u8>>>,
}

impl Document {
    pub(crate) fn nodes(&self) -> &[Node] {
        &self.root.nodes
    }

    pub(crate) fn buffer_bytes(&self, buffer: usize) -> Option<&[u8]> {
        self.buffer_data.get(buffer)?.as_deref()
    }

    /// Buffers that still need data from the resource loader.
    pub(crate) fn pending_buffers(&self) -> Vec<usize> {
        self.buffer_data
            .iter()
            .enumerate()
            .filter(|(_, data)| data.is_none())
            .map(|(index, _)| index)
            .collect()
    }
}

/// Decode a JSON glTF or GLB byte buffer into a [`Document`].
pub(crate) fn parse_document(
    data: &[u8],
    options: &ImportOptions,
    diagnostics: &mut ImportDiagnostics,
) -> Result<Document, ImportError> {
    let (root, glb_bin): (Root, Option<Vec<u8>>) = if data.starts_with(GLB_MAGIC) {
        let glb = Glb::from_slice(data)?;
        let root = serde_json::from_slice(glb.json.as_ref())?;
        (root, glb.bin.map(|bin| bin.into_owned()))
    } else {
        (serde_json::from_slice(data)?, None)
    };

    if !root.asset.version.starts_with("2.") {
        return Err(ImportError::Parse(format!(
            "unsupported asset version '{}'",
            root.asset.version
        )));
    }

    validate_structure(&root)?;
    check_required_extensions(&root, options.strictness, diagnostics)?;

    tracing::debug!(
        generator = root.asset.generator.as_deref().unwrap_or("unknown"),
        nodes = root.nodes.len(),
        meshes = root.meshes.len(),
        accessors = root.accessors.len(),
        buffers = root.buffers.len(),
        "parsed glTF document"
    );

    let buffer_data = vec![None; root.buffers.len()];
    Ok(Document {
        root,
        glb_bin,
        buffer_data,
    })
}

/// Reject index references that would leave the node graph inconsistent.
fn validate_structure(root: &Root) -> Result<(), ImportError> {
    let node_count = root.nodes.len();
    for (index, node) in root.nodes.iter().enumerate() {
        if let Some(child) = node.children.iter().find(|child| **child >= node_count) {
            return Err(ImportError::Parse(format!(
                "node {index} references missing child {child}"
            )));
        }
        if let Some(mesh) = node.mesh
            && mesh >= root.meshes.len()
        {
            return Err(ImportError::Parse(format!(
                "node {index} references missing mesh {mesh}"
            )));
        }
        if let Some(skin) = node.skin
            && skin >= root.skins.len()
        {
            return Err(ImportError::Parse(format!(
                "node {index} references missing skin {skin}"
            )));
        }
    }

    for (index, scene) in root.scenes.iter().enumerate() {
        if let Some(node) = scene.nodes.iter().find(|node| **node >= node_count) {
            return Err(ImportError::Parse(format!(
                "scene {index} references missing node {node}"
            )));
        }
    }

    for (index, view) in root.buffer_views.iter().enumerate() {
        if view.buffer >= root.buffers.len() {
            return Err(ImportError::Parse(format!(
                "buffer view {index} references missing buffer {}",
                view.buffer
            )));
        }
    }

    Ok(())
}

fn check_required_extensions(
    root: &Root,
    strictness: Strictness,
    diagnostics: &mut ImportDiagnostics,
) -> Result<(), ImportError> {
    for extension in &root.extensions_required {
        if SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            continue;
        }
        match strictness {
            Strictness::Strict => {
                return Err(ImportError::Parse(format!(
                    "required extension {extension} is not supported"
                )));
            }
            Strictness::Lenient => diagnostics.warn(
                "UNSUPPORTED_EXTENSION",
                format!("required extension {extension} is not supported; ignoring it"),
            ),
        }
    }

    for extension in &root.extensions_used {
        if !SUPPORTED_EXTENSIONS.contains(&extension.as_str())
            && !root.extensions_required.contains(extension)
        {
            tracing::debug!(extension = %extension, "ignoring optional extension");
        }
    }
    Ok(())
}
