use nalgebra::{Point3, Vector2, Vector3};

use crate::diagnostic::ImportDiagnostics;
use crate::error::{AccessorError, ImportError, PrimitiveError};
use crate::model::{Extents, Mesh, MeshPart};
use crate::options::ImportOptions;

use super::accessor::{ElementType, element_type, unpack_floats, unpack_uints};
use super::blendshape::{MorphTarget, map_targets, merge_targets, read_targets};
use super::document::{Document, Primitive};
use super::hierarchy::{NodeHierarchy, decompose};
use super::material::linear_to_srgb;
use super::skeleton::Skeleton;
use super::skinning::{bind_vertices, build_clusters, cluster_slots, collect_shape_vertices};
use super::types::{
    ATTR_COLOR_0, ATTR_JOINTS_0, ATTR_NORMAL, ATTR_POSITION, ATTR_TANGENT, ATTR_TEXCOORD_0,
    ATTR_TEXCOORD_1, ATTR_WEIGHTS_0, MIN_MESH_EXTENT, WEIGHTS_PER_VERTEX,
};

// ─── Primitive data ───────────────────────────────────────────────────────────

/// Vertex streams of one primitive in primitive-local numbering.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PrimitiveData {
    pub(crate) indices: Vec<u32>,
    pub(crate) positions: Vec<Vector3<f32>>,
    pub(crate) normals: Option<Vec<Vector3<f32>>>,
    pub(crate) tangents: Option<Vec<Vector3<f32>>>,
    pub(crate) tex_coords: Option<Vec<Vector2<f32>>>,
    pub(crate) tex_coords1: Option<Vec<Vector2<f32>>>,
    /// sRGB vertex colors.
    pub(crate) colors: Option<Vec<Vector3<f32>>>,
    /// Four joint slots per vertex.
    pub(crate) joints: Option<Vec<u32>>,
    /// Four weights per vertex.
    pub(crate) weights: Option<Vec<f32>>,
}

impl PrimitiveData {
    pub(crate) fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

fn attribute_error(attribute: &'static str) -> impl Fn(AccessorError) -> PrimitiveError {
    move |source| PrimitiveError::Attribute { attribute, source }
}

/// Element type of an attribute accessor, checked against the accepted set.
fn checked_element_type(
    document: &Document,
    attribute: &'static str,
    accessor: usize,
    accepted: &[ElementType],
) -> Result<ElementType, PrimitiveError> {
    let element = element_type(document, accessor).map_err(attribute_error(attribute))?;
    if accepted.contains(&element) {
        Ok(element)
    } else {
        Err(PrimitiveError::InvalidElementType {
            attribute,
            element_type: element.name(),
        })
    }
}

/// Reads an optional attribute. Invalid data is recorded and treated as
/// absent, as is data whose length does not match the vertex count.
fn read_optional<T>(
    document: &Document,
    primitive: &Primitive,
    attribute: &'static str,
    accepted: &[ElementType],
    vertex_count: usize,
    unpack: fn(&Document, usize) -> Result<Vec<T>, AccessorError>,
    diagnostics: &mut ImportDiagnostics,
) -> Option<(ElementType, Vec<T>)> {
    let accessor = *primitive.attributes.get(attribute)?;
    let result = checked_element_type(document, attribute, accessor, accepted).and_then(|element| {
        unpack(document, accessor)
            .map(|values| (element, values))
            .map_err(attribute_error(attribute))
    });

    match result {
        Ok((element, values)) if values.len() == vertex_count * element.components() => {
            Some((element, values))
        }
        Ok((_, values)) => {
            diagnostics.warn(
                "ATTRIBUTE_LENGTH_MISMATCH",
                format!("{attribute} has {} values for {vertex_count} vertices; ignoring it", values.len()),
            );
            None
        }
        Err(error) => {
            diagnostics.error("INVALID_ATTRIBUTE", error.to_string());
            None
        }
    }
}

fn to_vec3s(values: &[f32]) -> Vec<Vector3<f32>> {
    values
        .chunks_exact(3)
        .map(|value| Vector3::new(value[0], value[1], value[2]))
        .collect()
}

fn to_vec2s(values: &[f32]) -> Vec<Vector2<f32>> {
    values
        .chunks_exact(2)
        .map(|value| Vector2::new(value[0], value[1]))
        .collect()
}

/// Widens 1..=4 components per vertex to exactly four, zero-padded.
fn pad_to_four<T: Copy + Default>(values: &[T], components: usize) -> Vec<T> {
    values
        .chunks_exact(components)
        .flat_map(|lanes| {
            let mut padded = [T::default(); WEIGHTS_PER_VERTEX];
            padded[..components].copy_from_slice(lanes);
            padded
        })
        .collect()
}

const SCALAR_TO_VEC4: &[ElementType] = &[
    ElementType::Scalar,
    ElementType::Vec2,
    ElementType::Vec3,
    ElementType::Vec4,
];

/// Read and validate every stream of one primitive.
pub(crate) fn read_primitive(
    document: &Document,
    primitive: &Primitive,
    diagnostics: &mut ImportDiagnostics,
) -> Result<PrimitiveData, PrimitiveError> {
    if !primitive.is_triangle_list() {
        return Err(PrimitiveError::UnsupportedMode(primitive.mode));
    }

    let indices_accessor = primitive.indices.ok_or(PrimitiveError::MissingIndices)?;
    let mut indices = unpack_uints(document, indices_accessor).map_err(attribute_error("indices"))?;

    let position_accessor = *primitive
        .attributes
        .get(ATTR_POSITION)
        .ok_or(PrimitiveError::MissingPositions)?;
    checked_element_type(document, ATTR_POSITION, position_accessor, &[ElementType::Vec3])?;
    let positions = to_vec3s(
        &unpack_floats(document, position_accessor).map_err(attribute_error(ATTR_POSITION))?,
    );
    let vertex_count = positions.len();

    if let Some(index) = indices.iter().find(|index| **index as usize >= vertex_count) {
        return Err(PrimitiveError::IndexOutOfRange {
            index: *index,
            vertex_count,
        });
    }
    if indices.len() % 3 != 0 {
        diagnostics.warn(
            "INCOMPLETE_TRIANGLE",
            format!("{} indices do not form whole triangles; dropping the remainder", indices.len()),
        );
        indices.truncate(indices.len() - indices.len() % 3);
    }

    let mut read = |attribute, accepted: &[ElementType]| {
        read_optional(document, primitive, attribute, accepted, vertex_count, unpack_floats, diagnostics)
    };

    let normals = read(ATTR_NORMAL, &[ElementType::Vec3]).map(|(_, values)| to_vec3s(&values));
    let tangents = read(ATTR_TANGENT, &[ElementType::Vec3, ElementType::Vec4]).map(
        |(element, values)| {
            values
                .chunks_exact(element.components())
                .map(|tangent| {
                    let w = tangent.get(3).copied().unwrap_or(1.0);
                    Vector3::new(w * tangent[0], tangent[1], w * tangent[2])
                })
                .collect::<Vec<_>>()
        },
    );
    let tex_coords = read(ATTR_TEXCOORD_0, &[ElementType::Vec2]).map(|(_, values)| to_vec2s(&values));
    let tex_coords1 = read(ATTR_TEXCOORD_1, &[ElementType::Vec2]).map(|(_, values)| to_vec2s(&values));
    let colors = read(ATTR_COLOR_0, &[ElementType::Vec3, ElementType::Vec4]).map(
        |(element, values)| {
            values
                .chunks_exact(element.components())
                .map(|color| {
                    Vector3::new(
                        linear_to_srgb(color[0]),
                        linear_to_srgb(color[1]),
                        linear_to_srgb(color[2]),
                    )
                })
                .collect::<Vec<_>>()
        },
    );
    let weights = read(ATTR_WEIGHTS_0, SCALAR_TO_VEC4)
        .map(|(element, values)| pad_to_four(&values, element.components()));
    let joints = read_optional(
        document,
        primitive,
        ATTR_JOINTS_0,
        SCALAR_TO_VEC4,
        vertex_count,
        unpack_uints,
        diagnostics,
    )
    .map(|(element, values)| pad_to_four(&values, element.components()));

    Ok(PrimitiveData {
        indices,
        positions,
        normals,
        tangents,
        tex_coords,
        tex_coords1,
        colors,
        joints,
        weights,
    })
}

// ─── Normal synthesis ─────────────────────────────────────────────────────────

/// Re-read `stream` through `indices`, `width` entries per vertex.
fn expand<T: Clone>(stream: &[T], indices: &[u32], width: usize) -> Vec<T> {
    indices
        .iter()
        .flat_map(|index| {
            let start = *index as usize * width;
            stream[start..start + width].iter().cloned()
        })
        .collect()
}

/// Give every triangle three own vertices carrying its face normal.
///
/// All other streams and the morph targets follow the new numbering; the
/// tangents no longer match and are dropped.
pub(crate) fn synthesize_normals(data: &mut PrimitiveData, targets: &mut [MorphTarget]) {
    let indices = std::mem::take(&mut data.indices);

    let mut normals = Vec::with_capacity(indices.len());
    for triangle in indices.chunks_exact(3) {
        let v1 = data.positions[triangle[0] as usize];
        let v2 = data.positions[triangle[1] as usize];
        let v3 = data.positions[triangle[2] as usize];
        let normal = (v2 - v1)
            .cross(&(v3 - v1))
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::zeros);
        normals.extend([normal; 3]);
    }

    data.positions = expand(&data.positions, &indices, 1);
    data.normals = Some(normals);
    data.tangents = None;
    data.tex_coords = data.tex_coords.take().map(|stream| expand(&stream, &indices, 1));
    data.tex_coords1 = data.tex_coords1.take().map(|stream| expand(&stream, &indices, 1));
    data.colors = data.colors.take().map(|stream| expand(&stream, &indices, 1));
    data.joints = data
        .joints
        .take()
        .map(|stream| expand(&stream, &indices, WEIGHTS_PER_VERTEX));
    data.weights = data
        .weights
        .take()
        .map(|stream| expand(&stream, &indices, WEIGHTS_PER_VERTEX));

    for target in targets.iter_mut() {
        if !target.positions.is_empty() {
            target.positions = expand(&target.positions, &indices, 1);
        }
        target.normals = target.normals.take().map(|stream| expand(&stream, &indices, 1));
    }

    data.indices = (0..indices.len() as u32).collect();
}

// ─── Mesh assembly ────────────────────────────────────────────────────────────

/// Shared state the assembler reads from and writes into.
pub(crate) struct MeshContext<'a> {
    pub(crate) document: &'a Document,
    pub(crate) hierarchy: &'a NodeHierarchy,
    pub(crate) skeleton: &'a Skeleton,
    pub(crate) material_ids: &'a [String],
    pub(crate) options: &'a ImportOptions,
    pub(crate) shape_vertices: &'a mut Vec<Vec<Point3<f32>>>,
    pub(crate) mesh_extents: &'a mut Extents,
    pub(crate) diagnostics: &'a mut ImportDiagnostics,
}

struct LoadedPrimitive {
    data: PrimitiveData,
    targets: Vec<MorphTarget>,
    material_id: Option<String>,
}

/// Build the mesh instanced by document node `node_index`.
///
/// Returns `Ok(None)` when no primitive survived validation.
pub(crate) fn assemble_mesh(
    context: &mut MeshContext<'_>,
    node_index: usize,
    mesh_index: usize,
) -> Result<Option<Mesh>, ImportError> {
    let document = context.document;
    let skeleton = context.skeleton;
    let source = &document.root.meshes[mesh_index];
    let global = context.hierarchy.global_transforms[node_index];
    let node_joint = context.hierarchy.original_to_output[node_index];
    let skin = document.nodes()[node_index]
        .skin
        .and_then(|skin| skeleton.skins.get(skin));

    let target_names = source.target_names();
    let channels = map_targets(&target_names, context.options);

    let mut loaded = Vec::with_capacity(source.primitives.len());
    for (primitive_index, primitive) in source.primitives.iter().enumerate() {
        let mut data = match read_primitive(document, primitive, context.diagnostics) {
            Ok(data) => data,
            Err(error) => {
                let code = match error {
                    PrimitiveError::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
                    _ => "INVALID_PRIMITIVE",
                };
                context.diagnostics.error(
                    code,
                    format!("mesh {mesh_index} primitive {primitive_index} skipped: {error}"),
                );
                continue;
            }
        };

        let mut targets = read_targets(document, mesh_index, primitive, &channels, data.vertex_count())?;
        if data.normals.is_none() {
            synthesize_normals(&mut data, &mut targets);
        }

        let material_id = primitive.material.and_then(|material| {
            let id = context.material_ids.get(material).cloned();
            if id.is_none() {
                context.diagnostics.error(
                    "INVALID_MATERIAL",
                    format!("mesh {mesh_index} primitive {primitive_index} references missing material {material}"),
                );
            }
            id
        });

        loaded.push(LoadedPrimitive {
            data,
            targets,
            material_id,
        });
    }

    if loaded.is_empty() {
        context.diagnostics.warn(
            "EMPTY_MESH",
            format!("mesh {mesh_index} on node {node_index} has no usable primitives"),
        );
        return Ok(None);
    }

    let has_tangents = loaded.iter().any(|primitive| primitive.data.tangents.is_some());
    let has_tex_coords = loaded.iter().any(|primitive| primitive.data.tex_coords.is_some());
    let has_tex_coords1 = loaded.iter().any(|primitive| primitive.data.tex_coords1.is_some());
    let has_colors = loaded.iter().any(|primitive| primitive.data.colors.is_some());

    let mut mesh = Mesh::new(node_index, source.name.clone(), global);
    mesh.clusters = build_clusters(skeleton.has_skins(), node_joint, &skeleton.joints);
    let mesh_scale = decompose(&global).scale.abs();

    for LoadedPrimitive {
        data,
        targets,
        material_id,
    } in loaded
    {
        let base = mesh.vertices.len();
        let count = data.vertex_count();

        mesh.vertices.extend_from_slice(&data.positions);
        mesh.normals
            .extend(data.normals.unwrap_or_else(|| vec![Vector3::zeros(); count]));
        if has_tangents {
            mesh.tangents
                .extend(data.tangents.unwrap_or_else(|| vec![Vector3::zeros(); count]));
        }
        if has_tex_coords {
            mesh.tex_coords
                .extend(data.tex_coords.unwrap_or_else(|| vec![Vector2::zeros(); count]));
        }
        if has_tex_coords1 {
            mesh.tex_coords1
                .extend(data.tex_coords1.unwrap_or_else(|| vec![Vector2::zeros(); count]));
        }
        if has_colors {
            mesh.colors
                .extend(data.colors.unwrap_or_else(|| vec![Vector3::repeat(1.0); count]));
        }

        let binding = bind_vertices(
            count,
            data.joints.as_deref(),
            data.weights.as_deref(),
            skin,
            node_joint,
            context.diagnostics,
        );
        collect_shape_vertices(
            context.shape_vertices,
            &skeleton.joints,
            &data.positions,
            &binding,
            &mesh_scale,
        );
        mesh.cluster_indices
            .extend(cluster_slots(&mesh.clusters, &binding.joint_indices));
        mesh.cluster_weights.extend(binding.cluster_weights);

        merge_targets(&mut mesh, &channels, &targets, base);

        let base = base as u32;
        mesh.parts.push(MeshPart {
            triangle_indices: data.indices.iter().map(|index| index + base).collect(),
            material_id,
        });

        for position in &data.positions {
            let world = global.transform_point(&Point3::from(*position)).coords;
            mesh.extents.add_point(&world);
        }
    }

    context.mesh_extents.add_extents(&mesh.extents);
    mesh.extents.pad_to_minimum(MIN_MESH_EXTENT);

    tracing::debug!(
        mesh = mesh_index,
        node = node_index,
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "assembled mesh"
    );
    Ok(Some(mesh))
}

/// Meshes of every mesh node, in output order. A mesh referenced by
/// several nodes yields one mesh per node.
pub(crate) fn assemble_meshes(context: &mut MeshContext<'_>) -> Result<Vec<Mesh>, ImportError> {
    let document = context.document;
    let hierarchy = context.hierarchy;
    let mut meshes = Vec::new();

    for node_index in &hierarchy.order {
        let Some(mesh_index) = document.nodes()[*node_index].mesh else {
            continue;
        };
        if let Some(mesh) = assemble_mesh(context, *node_index, mesh_index)? {
            meshes.push(mesh);
        }
    }

    Ok(meshes)
}
