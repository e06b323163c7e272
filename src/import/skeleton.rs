use nalgebra::Matrix4;

use crate::diagnostic::ImportDiagnostics;
use crate::error::ImportError;
use crate::model::{Extents, Joint};

use super::accessor::{ElementType, element_type, unpack_floats};
use super::document::Document;
use super::hierarchy::{NodeHierarchy, decompose};

/// One document skin, with joints expressed as output joint indices.
#[derive(Debug, Clone)]
pub(crate) struct SkinBinding {
    pub(crate) joints: Vec<usize>,
    pub(crate) inverse_binds: Vec<Matrix4<f32>>,
}

#[derive(Debug, Clone)]
pub(crate) struct Skeleton {
    pub(crate) joints: Vec<Joint>,
    pub(crate) skins: Vec<SkinBinding>,
    pub(crate) bind_extents: Extents,
}

impl Skeleton {
    pub(crate) fn has_skins(&self) -> bool {
        !self.skins.is_empty()
    }
}

/// Build one joint per node in output order, attach inverse-bind matrices
/// from the skins and accumulate bind extents.
pub(crate) fn build_skeleton(
    document: &Document,
    hierarchy: &NodeHierarchy,
    offset: &Matrix4<f32>,
    diagnostics: &mut ImportDiagnostics,
) -> Result<Skeleton, ImportError> {
    let nodes = document.nodes();
    let mut joints: Vec<Joint> = hierarchy
        .order
        .iter()
        .enumerate()
        .map(|(output, node_index)| {
            let local = hierarchy.local_transforms[*node_index];
            let parts = decompose(&local);
            Joint {
                name: nodes[*node_index]
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("node_{node_index}")),
                parent: hierarchy.output_parent(output),
                transform: local,
                translation: parts.translation,
                rotation: parts.rotation,
                post_transform: Matrix4::new_nonuniform_scaling(&parts.scale),
                inverse_bind_matrix: Matrix4::identity(),
                is_skeleton_joint: false,
            }
        })
        .collect();

    let skins = read_skins(document, hierarchy)?;

    // The first skin that lists a joint provides its inverse bind.
    for binding in &skins {
        for (slot, joint_index) in binding.joints.iter().enumerate() {
            let joint = &mut joints[*joint_index];
            if !joint.is_skeleton_joint {
                joint.is_skeleton_joint = true;
                joint.inverse_bind_matrix = binding.inverse_binds[slot];
            }
        }
    }

    let mut bind_extents = Extents::default();
    if !skins.is_empty() {
        for joint in &joints {
            let Some(bind) = joint.inverse_bind_matrix.try_inverse() else {
                diagnostics.warn(
                    "SINGULAR_INVERSE_BIND",
                    format!("joint '{}' has a non-invertible inverse bind matrix", joint.name),
                );
                continue;
            };
            let bind = offset * bind;
            bind_extents.add_point(&bind.fixed_view::<3, 1>(0, 3).into_owned());
        }
    }

    tracing::debug!(
        joints = joints.len(),
        skins = skins.len(),
        "built skeleton"
    );

    Ok(Skeleton {
        joints,
        skins,
        bind_extents,
    })
}

fn read_skins(document: &Document, hierarchy: &NodeHierarchy) -> Result<Vec<SkinBinding>, ImportError> {
    let node_count = document.nodes().len();

    document
        .root
        .skins
        .iter()
        .enumerate()
        .map(|(skin_index, skin)| {
            let skin_error = |reason: String| ImportError::SkinData {
                skin: skin_index,
                reason,
            };

            let joints = skin
                .joints
                .iter()
                .map(|node| {
                    if *node < node_count {
                        Ok(hierarchy.original_to_output[*node])
                    } else {
                        Err(skin_error(format!("joint node {node} does not exist")))
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;

            let accessor = skin
                .inverse_bind_matrices
                .ok_or_else(|| skin_error("missing inverse bind matrices".to_string()))?;
            let element = element_type(document, accessor)
                .map_err(|error| skin_error(error.to_string()))?;
            if element != ElementType::Mat4 {
                return Err(skin_error(format!(
                    "inverse bind accessor is {}, expected MAT4",
                    element.name()
                )));
            }
            let values =
                unpack_floats(document, accessor).map_err(|error| skin_error(error.to_string()))?;
            let inverse_binds: Vec<Matrix4<f32>> = values
                .chunks_exact(16)
                .map(Matrix4::from_column_slice)
                .collect();
            if inverse_binds.len() < joints.len() {
                return Err(skin_error(format!(
                    "{} inverse bind matrices for {} joints",
                    inverse_binds.len(),
                    joints.len()
                )));
            }

            Ok(SkinBinding {
                joints,
                inverse_binds,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector3;

    use super::*;
    use crate::import::document::parse_document;
    use crate::import::hierarchy::resolve_hierarchy;
    use crate::options::ImportOptions;

    fn matrix_bytes(matrices: &[Matrix4<f32>]) -> Vec<u8> {
        matrices
            .iter()
            .flat_map(|matrix| matrix.as_slice().iter().flat_map(|value| value.to_le_bytes()))
            .collect()
    }

    fn load(json: &str, buffer: Vec<u8>) -> (Document, NodeHierarchy) {
        let mut diagnostics = ImportDiagnostics::default();
        let mut document =
            parse_document(json.as_bytes(), &ImportOptions::default(), &mut diagnostics)
                .expect("document should parse");
        if !document.buffer_data.is_empty() {
            document.buffer_data[0] = Some(buffer);
        }
        let hierarchy = resolve_hierarchy(&document, &mut diagnostics).expect("hierarchy");
        (document, hierarchy)
    }

    const TWO_BONE_SKIN: &str = r#"{
        "asset": { "version": "2.0" },
        "nodes": [
            { "name": "hand", "translation": [0, 1, 0] },
            { "name": "arm", "translation": [1, 0, 0], "children": [0] },
            { "name": "prop" }
        ],
        "skins": [ { "joints": [1, 0], "inverseBindMatrices": 0 } ],
        "accessors": [ { "bufferView": 0, "componentType": 5126, "count": 2, "type": "MAT4" } ],
        "bufferViews": [ { "buffer": 0, "byteLength": 128 } ],
        "buffers": [ { "byteLength": 128 } ]
    }"#;

    #[test]
    fn given_skin_when_building_skeleton_then_joints_follow_output_order() {
        let arm_ibm = Matrix4::new_translation(&Vector3::new(-1.0, 0.0, 0.0));
        let hand_ibm = Matrix4::new_translation(&Vector3::new(-1.0, -1.0, 0.0));
        let (document, hierarchy) = load(TWO_BONE_SKIN, matrix_bytes(&[arm_ibm, hand_ibm]));
        let mut diagnostics = ImportDiagnostics::default();

        let skeleton =
            build_skeleton(&document, &hierarchy, &Matrix4::identity(), &mut diagnostics)
                .expect("skeleton");

        let names: Vec<&str> = skeleton.joints.iter().map(|joint| joint.name.as_str()).collect();
        assert_eq!(names, vec!["arm", "prop", "hand"]);
        assert_eq!(skeleton.joints[2].parent, Some(0));
        assert_eq!(skeleton.joints[2].inverse_bind_matrix, hand_ibm);
        assert!(skeleton.joints[0].is_skeleton_joint);
        assert!(!skeleton.joints[1].is_skeleton_joint);
        assert_eq!(skeleton.skins[0].joints, vec![0, 2]);
    }

    #[test]
    fn given_skin_when_building_skeleton_then_bind_extents_cover_bind_positions() {
        let arm_ibm = Matrix4::new_translation(&Vector3::new(-1.0, 0.0, 0.0));
        let hand_ibm = Matrix4::new_translation(&Vector3::new(-1.0, -1.0, 0.0));
        let (document, hierarchy) = load(TWO_BONE_SKIN, matrix_bytes(&[arm_ibm, hand_ibm]));

        let skeleton = build_skeleton(
            &document,
            &hierarchy,
            &Matrix4::new_scaling(2.0),
            &mut ImportDiagnostics::default(),
        )
        .expect("skeleton");

        assert!((skeleton.bind_extents.maximum - Vector3::new(2.0, 2.0, 0.0)).norm() < 1e-6);
        assert!((skeleton.bind_extents.minimum - Vector3::zeros()).norm() < 1e-6);
    }

    #[test]
    fn given_too_few_inverse_binds_when_building_skeleton_then_skin_data_error_is_returned() {
        let json = TWO_BONE_SKIN.replace(r#""count": 2"#, r#""count": 1"#);
        let (document, hierarchy) = load(&json, vec![0; 128]);

        let result = build_skeleton(
            &document,
            &hierarchy,
            &Matrix4::identity(),
            &mut ImportDiagnostics::default(),
        );

        assert!(matches!(result, Err(ImportError::SkinData { skin: 0, .. })));
    }

    #[test]
    fn given_skin_joint_outside_nodes_when_building_skeleton_then_skin_data_error_is_returned() {
        let json = TWO_BONE_SKIN.replace(r#""joints": [1, 0]"#, r#""joints": [1, 7]"#);
        let (document, hierarchy) = load(&json, vec![0; 128]);

        let result = build_skeleton(
            &document,
            &hierarchy,
            &Matrix4::identity(),
            &mut ImportDiagnostics::default(),
        );

        assert!(matches!(result, Err(ImportError::SkinData { .. })));
    }

    #[test]
    fn given_scaled_node_when_building_skeleton_then_scale_moves_to_post_transform() {
        let json = r#"{ "asset": { "version": "2.0" },
                        "nodes": [ { "name": "root", "scale": [1, 2, 3], "translation": [0, 0, 5] } ] }"#;
        let (document, hierarchy) = load(json, Vec::new());

        let skeleton = build_skeleton(
            &document,
            &hierarchy,
            &Matrix4::identity(),
            &mut ImportDiagnostics::default(),
        )
        .expect("skeleton");

        let root = &skeleton.joints[0];
        assert_eq!(root.translation, Vector3::new(0.0, 0.0, 5.0));
        assert_eq!(
            root.post_transform,
            Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 2.0, 3.0))
        );
        assert!(skeleton.bind_extents.is_empty());
    }
}
