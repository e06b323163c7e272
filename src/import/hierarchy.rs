use nalgebra::{Matrix3, Matrix4, Quaternion, Translation3, UnitQuaternion, Vector3};

use crate::diagnostic::ImportDiagnostics;
use crate::error::ImportError;

use super::document::{Document, Node};

/// Node graph flattened into parent-first output order.
#[derive(Debug, Clone)]
pub(crate) struct NodeHierarchy {
    /// Output position → document node index.
    pub(crate) order: Vec<usize>,
    /// Document node index → output position.
    pub(crate) original_to_output: Vec<usize>,
    /// Parent per document node, in document indices.
    pub(crate) parents: Vec<Option<usize>>,
    /// Local transform per document node.
    pub(crate) local_transforms: Vec<Matrix4<f32>>,
    /// Global transform per document node.
    pub(crate) global_transforms: Vec<Matrix4<f32>>,
}

impl NodeHierarchy {
    /// Parent of the node at output position `output`, in output positions.
    pub(crate) fn output_parent(&self, output: usize) -> Option<usize> {
        let node = self.order[output];
        self.parents[node].map(|parent| self.original_to_output[parent])
    }
}

/// Build the parent map, ordering and transforms for every document node.
pub(crate) fn resolve_hierarchy(
    document: &Document,
    diagnostics: &mut ImportDiagnostics,
) -> Result<NodeHierarchy, ImportError> {
    let nodes = document.nodes();
    let parents = collect_parent_map(nodes);
    let order = topological_order(&parents)?;

    let mut original_to_output = vec![0; nodes.len()];
    for (output, node) in order.iter().enumerate() {
        original_to_output[*node] = output;
    }

    let local_transforms: Vec<Matrix4<f32>> = nodes
        .iter()
        .enumerate()
        .map(|(index, node)| {
            if node.matrix.is_some() && node.has_trs() {
                diagnostics.warn(
                    "NODE_MATRIX_AND_TRS",
                    format!("node {index} has both matrix and TRS; using the matrix"),
                );
            }
            node_to_local_matrix(node)
        })
        .collect();

    let mut global_transforms = vec![Matrix4::identity(); nodes.len()];
    for node in &order {
        global_transforms[*node] = match parents[*node] {
            Some(parent) => global_transforms[parent] * local_transforms[*node],
            None => local_transforms[*node],
        };
    }

    Ok(NodeHierarchy {
        order,
        original_to_output,
        parents,
        local_transforms,
        global_transforms,
    })
}

/// Child → parent map in document indices. When a node is listed as a child
/// of several parents the later declaration wins.
pub(crate) fn collect_parent_map(nodes: &[Node]) -> Vec<Option<usize>> {
    let mut parents = vec![None; nodes.len()];
    for (parent_index, node) in nodes.iter().enumerate() {
        for child in &node.children {
            if let Some(slot) = parents.get_mut(*child) {
                *slot = Some(parent_index);
            }
        }
    }
    parents
}

/// Stable parent-first ordering by repeated forward scans.
///
/// A scan that places nothing means the remaining nodes form a cycle.
pub(crate) fn topological_order(parents: &[Option<usize>]) -> Result<Vec<usize>, ImportError> {
    let mut order = Vec::with_capacity(parents.len());
    let mut placed = vec![false; parents.len()];

    while order.len() < parents.len() {
        let before = order.len();
        for (node, parent) in parents.iter().enumerate() {
            if placed[node] {
                continue;
            }
            let ready = match parent {
                None => true,
                Some(parent) => placed[*parent],
            };
            if ready {
                placed[node] = true;
                order.push(node);
            }
        }
        if order.len() == before {
            let stuck = placed.iter().position(|placed| !placed).unwrap_or_default();
            return Err(ImportError::Parse(format!(
                "node hierarchy contains a cycle through node {stuck}"
            )));
        }
    }

    Ok(order)
}

/// Local transform of a node: its matrix when present, otherwise `T * R * S`.
pub(crate) fn node_to_local_matrix(node: &Node) -> Matrix4<f32> {
    if let Some(matrix) = &node.matrix {
        return Matrix4::from_column_slice(matrix);
    }

    let translation = node.translation.map(Vector3::from).unwrap_or_else(Vector3::zeros);
    let rotation = node
        .rotation
        .map(|[x, y, z, w]| UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)))
        .unwrap_or_else(UnitQuaternion::identity);
    let scale = node
        .scale
        .map(Vector3::from)
        .unwrap_or_else(|| Vector3::new(1.0, 1.0, 1.0));

    let translation_matrix = Translation3::from(translation).to_homogeneous();
    let rotation_matrix = rotation.to_homogeneous();
    let scale_matrix = Matrix4::new_nonuniform_scaling(&scale);
    translation_matrix * rotation_matrix * scale_matrix
}

// ─── Decomposition ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Decomposed {
    pub(crate) translation: Vector3<f32>,
    pub(crate) rotation: UnitQuaternion<f32>,
    pub(crate) scale: Vector3<f32>,
}

/// Split an affine matrix into translation, rotation and scale. A mirrored
/// basis is expressed as a negative x scale.
pub(crate) fn decompose(matrix: &Matrix4<f32>) -> Decomposed {
    let translation = Vector3::new(matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)]);

    let basis_x = Vector3::new(matrix[(0, 0)], matrix[(1, 0)], matrix[(2, 0)]);
    let basis_y = Vector3::new(matrix[(0, 1)], matrix[(1, 1)], matrix[(2, 1)]);
    let basis_z = Vector3::new(matrix[(0, 2)], matrix[(1, 2)], matrix[(2, 2)]);

    let mut scale_x = basis_x.norm();
    let scale_y = basis_y.norm();
    let scale_z = basis_z.norm();

    let mut rot_x = if scale_x > 1e-8 {
        basis_x / scale_x
    } else {
        Vector3::x()
    };
    let rot_y = if scale_y > 1e-8 {
        basis_y / scale_y
    } else {
        Vector3::y()
    };
    let rot_z = if scale_z > 1e-8 {
        basis_z / scale_z
    } else {
        Vector3::z()
    };

    if rot_x.cross(&rot_y).dot(&rot_z) < 0.0 {
        scale_x = -scale_x;
        rot_x = -rot_x;
    }

    let rotation_matrix = Matrix3::from_columns(&[rot_x, rot_y, rot_z]);
    Decomposed {
        translation,
        rotation: UnitQuaternion::from_matrix(&rotation_matrix),
        scale: Vector3::new(scale_x, scale_y, scale_z),
    }
}
