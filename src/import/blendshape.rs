//! Morph targets → canonical blendshape channels.
//!
//! Channel assignment works on target names: an explicit mapping table from
//! [`ImportOptions`] wins, otherwise targets named exactly like a channel map
//! with full weight. ARKit-style avatars additionally get a synonym table
//! when no mapping table was supplied.

use std::collections::HashSet;

use nalgebra::Vector3;

use crate::error::ImportError;
use crate::model::{Blendshape, Mesh};
use crate::options::ImportOptions;

use super::accessor::{ElementType, element_type, unpack_floats};
use super::document::{Document, Primitive};
use super::types::{ARKIT_SIGNATURE, ARKIT_SYNONYMS, ATTR_NORMAL, ATTR_POSITION, BLENDSHAPE_NAMES};

/// (channel index, weight) pairs, per morph target of one mesh.
pub(crate) type TargetChannels = Vec<Vec<(usize, f32)>>;

/// Position and normal deltas of one morph target, primitive-local.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct MorphTarget {
    pub(crate) positions: Vec<Vector3<f32>>,
    pub(crate) normals: Option<Vec<Vector3<f32>>>,
}

fn channel_index(name: &str) -> Option<usize> {
    BLENDSHAPE_NAMES.iter().position(|channel| *channel == name)
}

fn looks_like_arkit_avatar(target_names: &[String]) -> bool {
    let names: HashSet<&str> = target_names.iter().map(String::as_str).collect();
    ARKIT_SIGNATURE.iter().all(|name| names.contains(name))
}

/// Channel assignments for every morph target of a mesh.
pub(crate) fn map_targets(target_names: &[String], options: &ImportOptions) -> TargetChannels {
    let mut channels: TargetChannels = vec![Vec::new(); target_names.len()];
    let mut assign = |source: &str, channel: usize, weight: f32| {
        for (target, name) in target_names.iter().enumerate() {
            if name == source {
                channels[target].push((channel, weight));
            }
        }
    };

    for (channel, name) in BLENDSHAPE_NAMES.iter().enumerate() {
        let mut explicit = options.mappings_for(name).peekable();
        if explicit.peek().is_some() {
            for mapping in explicit {
                assign(&mapping.source, channel, mapping.weight);
            }
        } else {
            assign(name, channel, 1.0);
        }
    }

    if options.blendshapes.is_empty() && looks_like_arkit_avatar(target_names) {
        tracing::debug!("applying ARKit blendshape synonyms");
        for (source, channel_name, weight) in ARKIT_SYNONYMS {
            if let Some(channel) = channel_index(channel_name) {
                assign(source, channel, *weight);
            }
        }
    }

    channels
}

fn read_vec3s(document: &Document, accessor: usize) -> Result<Vec<Vector3<f32>>, String> {
    let element = element_type(document, accessor).map_err(|error| error.to_string())?;
    if element != ElementType::Vec3 {
        return Err(format!("delta accessor is {}, expected VEC3", element.name()));
    }
    let values = unpack_floats(document, accessor).map_err(|error| error.to_string())?;
    Ok(values
        .chunks_exact(3)
        .map(|delta| Vector3::new(delta[0], delta[1], delta[2]))
        .collect())
}

/// Read the targets of one primitive that feed at least one channel.
///
/// Unmapped targets are returned empty. Shorter targets are zero-padded;
/// a target longer than the primitive is fatal.
pub(crate) fn read_targets(
    document: &Document,
    mesh_index: usize,
    primitive: &Primitive,
    channels: &[Vec<(usize, f32)>],
    vertex_count: usize,
) -> Result<Vec<MorphTarget>, ImportError> {
    let mut targets = Vec::with_capacity(primitive.targets.len());

    for (target_index, attributes) in primitive.targets.iter().enumerate() {
        let mapped = channels
            .get(target_index)
            .is_some_and(|assignments| !assignments.is_empty());
        if !mapped {
            targets.push(MorphTarget::default());
            continue;
        }

        let blendshape_error = |reason: String| ImportError::Blendshape {
            mesh: mesh_index,
            target: target_index,
            reason,
        };
        let read = |attribute: &str| -> Result<Option<Vec<Vector3<f32>>>, ImportError> {
            let Some(accessor) = attributes.get(attribute) else {
                return Ok(None);
            };
            let mut deltas = read_vec3s(document, *accessor)
                .map_err(|reason| blendshape_error(format!("{attribute}: {reason}")))?;
            if deltas.len() > vertex_count {
                return Err(blendshape_error(format!(
                    "{attribute} has {} vertices, primitive has {vertex_count}",
                    deltas.len()
                )));
            }
            deltas.resize(vertex_count, Vector3::zeros());
            Ok(Some(deltas))
        };

        targets.push(MorphTarget {
            positions: read(ATTR_POSITION)?.unwrap_or_else(|| vec![Vector3::zeros(); vertex_count]),
            normals: read(ATTR_NORMAL)?,
        });
    }

    Ok(targets)
}

/// Accumulate a primitive's targets into the mesh blendshapes.
///
/// `base` is the mesh vertex index of the primitive's first vertex; the
/// mesh normals for that range must already be appended.
pub(crate) fn merge_targets(
    mesh: &mut Mesh,
    channels: &[Vec<(usize, f32)>],
    targets: &[MorphTarget],
    base: usize,
) {
    for (target, assignments) in targets.iter().zip(channels) {
        if assignments.is_empty() || target.positions.is_empty() {
            continue;
        }
        if mesh.blendshapes.is_empty() {
            mesh.blendshapes = vec![Blendshape::default(); BLENDSHAPE_NAMES.len()];
        }

        let count = target.positions.len();
        for (channel, weight) in assignments {
            let blendshape = &mut mesh.blendshapes[*channel];
            blendshape.ensure_len(base + count);
            for vertex in 0..count {
                let slot = base + vertex;
                blendshape.vertices[slot] += target.positions[vertex] * *weight;
                match &target.normals {
                    Some(normals) => blendshape.normals[slot] += normals[vertex] * *weight,
                    None => blendshape.normals[slot] = mesh.normals[slot],
                }
            }
        }
    }
}
