use std::{fs, path::Path};

use anyhow::{Context, Result};
use nalgebra::{Matrix4, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// How the document parser treats content it does not understand.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Unknown required extensions are recorded as warnings.
    #[default]
    Lenient,
    /// Unknown required extensions fail the import.
    Strict,
}

/// One explicit morph target → blendshape channel assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlendshapeMapping {
    /// Canonical channel name, see [`crate::BLENDSHAPE_NAMES`].
    pub channel: String,
    /// Morph target name as it appears in the source mesh.
    pub source: String,
    /// Scale applied to the target deltas before accumulation.
    pub weight: f32,
}

/// Model placement applied on top of the imported bind pose.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ModelOffset {
    pub scale: f32,
    /// Euler angles in degrees (x, y, z).
    pub rotation_degrees: [f32; 3],
    pub translation: [f32; 3],
}

impl Default for ModelOffset {
    fn default() -> Self {
        Self {
            scale: 1.0,
            rotation_degrees: [0.0; 3],
            translation: [0.0; 3],
        }
    }
}

impl ModelOffset {
    /// `translate * rotate * scale` as a single matrix.
    pub fn to_matrix(&self) -> Matrix4<f32> {
        let [rx, ry, rz] = self.rotation_degrees;
        let rotation =
            UnitQuaternion::from_euler_angles(rx.to_radians(), ry.to_radians(), rz.to_radians());
        let translation = Translation3::from(Vector3::from(self.translation));
        translation.to_homogeneous()
            * rotation.to_homogeneous()
            * Matrix4::new_scaling(self.scale)
    }
}

/// Options shared by every import entry point.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    pub strictness: Strictness,
    /// Explicit morph target mappings. Empty means "no mapping supplied",
    /// which enables the name-synonym heuristic.
    pub blendshapes: Vec<BlendshapeMapping>,
    pub offset: ModelOffset,
}

impl ImportOptions {
    /// Explicit mappings for a canonical channel, in declaration order.
    pub fn mappings_for<'a>(
        &'a self,
        channel: &'a str,
    ) -> impl Iterator<Item = &'a BlendshapeMapping> + 'a {
        self.blendshapes
            .iter()
            .filter(move |mapping| mapping.channel == channel)
    }
}

/// Save import options to a JSON file.
pub fn save_import_options(path: &Path, options: &ImportOptions) -> Result<()> {
    let content = serde_json::to_string_pretty(options)
        .context("failed to serialize import options as JSON")?;
    fs::write(path, content)
        .with_context(|| format!("failed to save import options: {}", path.display()))?;
    Ok(())
}

/// Load import options from a JSON file. Missing fields take their defaults.
pub fn load_import_options(path: &Path) -> Result<ImportOptions> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to load import options: {}", path.display()))?;
    let options: ImportOptions =
        serde_json::from_str(&content).context("failed to parse import options JSON")?;
    Ok(options)
}
