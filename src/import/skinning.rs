use std::collections::HashMap;

use nalgebra::{Matrix4, Point3, Vector3};

use crate::diagnostic::ImportDiagnostics;
use crate::model::{Cluster, Joint};

use super::skeleton::SkinBinding;
use super::types::{MAX_WEIGHT, SHAPE_VERTEX_WEIGHT_THRESHOLD, WEIGHTS_PER_VERTEX};

// ─── Weight quantization ─────────────────────────────────────────────────────

/// Normalize four weights to fixed point so they sum to [`MAX_WEIGHT`].
///
/// Non-finite and negative weights count as zero. An all-zero vertex is
/// pinned fully to its first slot.
pub(crate) fn quantize_weights(weights: [f32; WEIGHTS_PER_VERTEX]) -> [u16; WEIGHTS_PER_VERTEX] {
    let sanitized = weights.map(|weight| {
        if weight.is_finite() && weight > 0.0 {
            weight as f64
        } else {
            0.0
        }
    });
    let total: f64 = sanitized.iter().sum();

    let mut quantized = [0u16; WEIGHTS_PER_VERTEX];
    if total <= 0.0 {
        quantized[0] = MAX_WEIGHT;
        return quantized;
    }

    let scale = MAX_WEIGHT as f64 / total;
    for (slot, weight) in quantized.iter_mut().zip(sanitized) {
        *slot = (weight * scale + 0.5).min(MAX_WEIGHT as f64) as u16;
    }

    // Fold the rounding residual into the dominant slot.
    let sum: i64 = quantized.iter().map(|weight| *weight as i64).sum();
    let residual = MAX_WEIGHT as i64 - sum;
    if residual != 0 {
        let largest = (0..WEIGHTS_PER_VERTEX)
            .max_by_key(|slot| (quantized[*slot], std::cmp::Reverse(*slot)))
            .unwrap_or(0);
        quantized[largest] = (quantized[largest] as i64 + residual).clamp(0, MAX_WEIGHT as i64) as u16;
    }
    quantized
}

// ─── Per-primitive binding ───────────────────────────────────────────────────

/// Joint slots (output joint indices) and fixed-point weights for a run of
/// vertices, four per vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct VertexBinding {
    pub(crate) joint_indices: Vec<u32>,
    pub(crate) cluster_weights: Vec<u16>,
}

/// Bind `vertex_count` vertices of one primitive.
///
/// `joints` and `weights` hold four entries per vertex. Without a skin, or
/// without joint data, every vertex is bound rigidly to `node_joint`.
pub(crate) fn bind_vertices(
    vertex_count: usize,
    joints: Option<&[u32]>,
    weights: Option<&[f32]>,
    skin: Option<&SkinBinding>,
    node_joint: usize,
    diagnostics: &mut ImportDiagnostics,
) -> VertexBinding {
    let mut binding = VertexBinding {
        joint_indices: Vec::with_capacity(vertex_count * WEIGHTS_PER_VERTEX),
        cluster_weights: Vec::with_capacity(vertex_count * WEIGHTS_PER_VERTEX),
    };

    let (Some(skin), Some(joints)) = (skin, joints) else {
        for _ in 0..vertex_count {
            binding
                .joint_indices
                .extend([node_joint as u32; WEIGHTS_PER_VERTEX]);
            binding.cluster_weights.extend([MAX_WEIGHT, 0, 0, 0]);
        }
        return binding;
    };

    let mut invalid_slots = 0usize;
    for vertex in 0..vertex_count {
        let lanes = vertex * WEIGHTS_PER_VERTEX..(vertex + 1) * WEIGHTS_PER_VERTEX;

        for slot in &joints[lanes.clone()] {
            let joint = match skin.joints.get(*slot as usize) {
                Some(joint) => *joint,
                None => {
                    invalid_slots += 1;
                    node_joint
                }
            };
            binding.joint_indices.push(joint as u32);
        }

        let mut vertex_weights = [1.0, 0.0, 0.0, 0.0];
        if let Some(weights) = weights {
            vertex_weights.copy_from_slice(&weights[lanes]);
        }
        binding
            .cluster_weights
            .extend(quantize_weights(vertex_weights));
    }

    if invalid_slots > 0 {
        diagnostics.error(
            "JOINT_SLOT_OUT_OF_RANGE",
            format!(
                "{invalid_slots} joint slots exceed the skin's {} joints; bound to the mesh node instead",
                skin.joints.len()
            ),
        );
    }

    binding
}

// ─── Clusters and shape vertices ─────────────────────────────────────────────

/// Clusters of one mesh, root cluster last.
///
/// In a skinned model there is one cluster per output joint, so a joint
/// index is also its cluster position. Otherwise the mesh node gets the
/// only bound cluster.
pub(crate) fn build_clusters(skinned_model: bool, node_joint: usize, joints: &[Joint]) -> Vec<Cluster> {
    let inverse_bind = |joint: usize| {
        joints
            .get(joint)
            .map(|joint| joint.inverse_bind_matrix)
            .unwrap_or_else(Matrix4::identity)
    };

    let mut clusters: Vec<Cluster> = if skinned_model {
        (0..joints.len())
            .map(|joint_index| Cluster {
                joint_index,
                inverse_bind_matrix: inverse_bind(joint_index),
            })
            .collect()
    } else {
        vec![Cluster {
            joint_index: node_joint,
            inverse_bind_matrix: inverse_bind(node_joint),
        }]
    };
    clusters.push(Cluster {
        joint_index: 0,
        inverse_bind_matrix: inverse_bind(0),
    });
    clusters
}

/// Cluster positions for a run of joint indices. The first cluster bound to
/// a joint wins; joints without a cluster fall back to position 0.
pub(crate) fn cluster_slots(clusters: &[Cluster], joint_indices: &[u32]) -> Vec<u32> {
    let mut positions = HashMap::new();
    for (position, cluster) in clusters.iter().enumerate() {
        positions.entry(cluster.joint_index).or_insert(position as u32);
    }
    joint_indices
        .iter()
        .map(|joint| positions.get(&(*joint as usize)).copied().unwrap_or(0))
        .collect()
}

/// Add every vertex with a significant weight on a joint to that joint's
/// shape-vertex cache, in the joint's bind space.
pub(crate) fn collect_shape_vertices(
    shape_vertices: &mut [Vec<Point3<f32>>],
    joints: &[Joint],
    vertices: &[Vector3<f32>],
    binding: &VertexBinding,
    mesh_scale: &Vector3<f32>,
) {
    let scale = Matrix4::new_nonuniform_scaling(mesh_scale);
    for (vertex_index, vertex) in vertices.iter().enumerate() {
        let lanes = vertex_index * WEIGHTS_PER_VERTEX..(vertex_index + 1) * WEIGHTS_PER_VERTEX;
        let slots = binding.joint_indices[lanes.clone()]
            .iter()
            .zip(&binding.cluster_weights[lanes]);
        for (joint_index, weight) in slots {
            if *weight < SHAPE_VERTEX_WEIGHT_THRESHOLD {
                continue;
            }
            let joint_index = *joint_index as usize;
            let (Some(joint), Some(points)) =
                (joints.get(joint_index), shape_vertices.get_mut(joint_index))
            else {
                continue;
            };
            let mesh_to_joint = scale * joint.inverse_bind_matrix;
            points.push(mesh_to_joint.transform_point(&Point3::from(*vertex)));
        }
    }
}
