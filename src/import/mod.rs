mod accessor;
mod blendshape;
mod document;
mod geometry;
mod hierarchy;
mod material;
mod resource;
mod skeleton;
mod skinning;
mod types;
mod vrm;

use std::{fs, path::Path};

use anyhow::{Context, anyhow};
use url::Url;

use crate::diagnostic::ImportDiagnostics;
use crate::error::ImportError;
use crate::model::{Extents, Model};
use crate::options::ImportOptions;

// Re-export public types for callers of this module.
pub use resource::{FileFetcher, ResourceFetcher};
pub use types::BLENDSHAPE_NAMES;

use document::parse_document;
use geometry::{MeshContext, assemble_meshes};
use hierarchy::resolve_hierarchy;
use material::translate_materials;
use resource::load_buffers;
use skeleton::build_skeleton;
use vrm::{extract_authors, extract_title};

// ─── Public API ───────────────────────────────────────────────────────────────

/// Import a glTF, GLB or VRM asset into a [`Model`].
///
/// `base_url` locates the asset itself; relative buffer and image URIs are
/// resolved against it. External buffers are loaded through `fetcher`.
/// Problems confined to one primitive, attribute or material are recorded
/// in [`Model::diagnostics`] and do not abort the import.
pub fn import_model(
    data: &[u8],
    base_url: &Url,
    options: &ImportOptions,
    fetcher: &dyn ResourceFetcher,
) -> Result<Model, ImportError> {
    tracing::info!(url = %base_url, bytes = data.len(), "importing model");
    let mut diagnostics = ImportDiagnostics::default();

    let mut document = parse_document(data, options, &mut diagnostics)?;
    load_buffers(&mut document, base_url, fetcher)?;

    let hierarchy = resolve_hierarchy(&document, &mut diagnostics)?;
    let offset = options.offset.to_matrix();
    let skeleton = build_skeleton(&document, &hierarchy, &offset, &mut diagnostics)?;
    let materials = translate_materials(&document, base_url, &mut diagnostics);

    let mut shape_vertices = vec![Vec::new(); skeleton.joints.len()];
    let mut mesh_extents = Extents::default();
    let meshes = assemble_meshes(&mut MeshContext {
        document: &document,
        hierarchy: &hierarchy,
        skeleton: &skeleton,
        material_ids: &materials.ids,
        options,
        shape_vertices: &mut shape_vertices,
        mesh_extents: &mut mesh_extents,
        diagnostics: &mut diagnostics,
    })?;

    if meshes.is_empty() || skeleton.joints.is_empty() {
        return Err(ImportError::EmptyModel {
            meshes: meshes.len(),
            joints: skeleton.joints.len(),
        });
    }

    tracing::info!(
        joints = skeleton.joints.len(),
        meshes = meshes.len(),
        materials = materials.materials.len(),
        warnings = diagnostics.warning_count,
        errors = diagnostics.error_count,
        "imported model"
    );

    let has_skeleton_joints = skeleton.has_skins();
    Ok(Model {
        original_url: base_url.to_string(),
        title: extract_title(&document.root.extensions),
        authors: extract_authors(&document.root.extensions),
        joints: skeleton.joints,
        has_skeleton_joints,
        shape_vertices,
        meshes,
        materials: materials.materials,
        blendshape_channel_names: BLENDSHAPE_NAMES.iter().map(|name| name.to_string()).collect(),
        offset,
        bind_extents: skeleton.bind_extents,
        mesh_extents,
        diagnostics,
    })
}

/// Import an asset from the local filesystem. External buffers are read
/// relative to the file.
pub fn import_model_file(path: &Path, options: &ImportOptions) -> anyhow::Result<Model> {
    let absolute = path
        .canonicalize()
        .with_context(|| format!("failed to resolve model path: {}", path.display()))?;
    let base_url = Url::from_file_path(&absolute)
        .map_err(|_| anyhow!("model path is not absolute: {}", absolute.display()))?;
    let data = fs::read(&absolute)
        .with_context(|| format!("failed to read model: {}", absolute.display()))?;

    let model = import_model(&data, &base_url, options, &FileFetcher)
        .with_context(|| format!("failed to import model: {}", absolute.display()))?;
    Ok(model)
}
