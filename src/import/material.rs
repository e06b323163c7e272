use std::collections::{HashMap, HashSet};

use nalgebra::Vector3;
use serde::Deserialize;
use url::Url;

use crate::diagnostic::ImportDiagnostics;
use crate::model::{ColorChannel, CullMode, MToon, Material, OpacityMode, OutlineWidthMode, Texture};

use super::document::{self, Document, TextureInfo};
use super::resource::{decode_data_uri, file_name, is_data_uri, resolve_locator};
use super::types::{EXT_MTOON, EXT_TEXTURE_WEBP, EXT_UNLIT};

// ─── Color space ──────────────────────────────────────────────────────────────

pub(crate) fn linear_to_srgb(value: f32) -> f32 {
    if value <= 0.003_130_8 {
        value * 12.92
    } else {
        1.055 * value.powf(1.0 / 2.4) - 0.055
    }
}

pub(crate) fn srgb_from_linear(color: [f32; 3]) -> Vector3<f32> {
    Vector3::from(color.map(linear_to_srgb))
}

// ─── Extensions ───────────────────────────────────────────────────────────────

/// `VRMC_materials_mtoon` payload. Absent fields keep the MToon defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct MToonExtension {
    shade_color_factor: Option<[f32; 3]>,
    shade_multiply_texture: Option<TextureInfo>,
    shading_shift_factor: Option<f32>,
    shading_shift_texture: Option<TextureInfo>,
    shading_toony_factor: Option<f32>,
    matcap_factor: Option<[f32; 3]>,
    matcap_texture: Option<TextureInfo>,
    parametric_rim_color_factor: Option<[f32; 3]>,
    parametric_rim_fresnel_power_factor: Option<f32>,
    parametric_rim_lift_factor: Option<f32>,
    rim_multiply_texture: Option<TextureInfo>,
    rim_lighting_mix_factor: Option<f32>,
    outline_width_mode: Option<String>,
    outline_width_factor: Option<f32>,
    outline_color_factor: Option<[f32; 3]>,
    uv_animation_mask_texture: Option<TextureInfo>,
    uv_animation_scroll_x_speed_factor: Option<f32>,
    uv_animation_scroll_y_speed_factor: Option<f32>,
    uv_animation_rotation_speed_factor: Option<f32>,
}

/// Material extensions the translator understands.
#[derive(Debug, Clone)]
pub(crate) enum MaterialExtension {
    MToon(Box<MToonExtension>),
    Unlit,
}

fn material_extensions(
    index: usize,
    material: &document::Material,
    diagnostics: &mut ImportDiagnostics,
) -> Vec<MaterialExtension> {
    let mut extensions = Vec::new();
    if let Some(payload) = material.extensions.get(EXT_MTOON) {
        match serde_json::from_value::<MToonExtension>(payload.clone()) {
            Ok(mtoon) => extensions.push(MaterialExtension::MToon(Box::new(mtoon))),
            Err(error) => diagnostics.warn(
                "INVALID_MTOON",
                format!("material {index}: ignoring malformed {EXT_MTOON}: {error}"),
            ),
        }
    }
    if material.extensions.contains_key(EXT_UNLIT) {
        extensions.push(MaterialExtension::Unlit);
    }
    extensions
}

// ─── Textures ─────────────────────────────────────────────────────────────────

/// Resolves texture references to image locators or embedded bytes.
pub(crate) struct TextureResolver<'a> {
    document: &'a Document,
    base_url: &'a Url,
}

impl<'a> TextureResolver<'a> {
    pub(crate) fn new(document: &'a Document, base_url: &'a Url) -> Self {
        Self { document, base_url }
    }

    /// Image index for a texture: the WebP source when it names a valid
    /// image, otherwise the core source.
    fn image_index(&self, texture: &document::Texture) -> Option<usize> {
        let image_count = self.document.root.images.len();
        let webp_source = texture
            .extensions
            .get(EXT_TEXTURE_WEBP)
            .and_then(|extension| extension.get("source"))
            .and_then(serde_json::Value::as_u64)
            .map(|source| source as usize)
            .filter(|source| *source < image_count);
        webp_source.or(texture.source.filter(|source| *source < image_count))
    }

    pub(crate) fn resolve(&self, info: &TextureInfo, channel: ColorChannel) -> Option<Texture> {
        let texture = self.document.root.textures.get(info.index)?;
        let image_index = self.image_index(texture)?;
        let image = &self.document.root.images[image_index];

        let mut resolved = Texture {
            name: image.name.clone().unwrap_or_default(),
            texcoord_set: info.tex_coord,
            source_channel: channel,
            ..Texture::default()
        };

        let embedded_filename = format!("{}{image_index}", self.base_url);
        match (image.buffer_view, image.uri.as_deref()) {
            (Some(view), _) => {
                resolved.filename = embedded_filename;
                resolved.content = self.buffer_view_bytes(view).unwrap_or_default();
            }
            (None, Some(uri)) if is_data_uri(uri) => {
                resolved.filename = embedded_filename;
                resolved.content = decode_data_uri(uri).unwrap_or_default();
            }
            (None, Some(uri)) => {
                resolved.name = file_name(uri);
                resolved.filename = resolve_locator(self.base_url, uri);
            }
            (None, None) => return None,
        }
        Some(resolved)
    }

    fn buffer_view_bytes(&self, view_index: usize) -> Option<Vec<u8>> {
        let view = self.document.root.buffer_views.get(view_index)?;
        let buffer = self.document.buffer_bytes(view.buffer)?;
        buffer
            .get(view.byte_offset..view.byte_offset.checked_add(view.byte_length)?)
            .map(<[u8]>::to_vec)
    }
}

// ─── Translation ──────────────────────────────────────────────────────────────

/// Translated materials plus the id assigned to each document material.
#[derive(Debug, Clone, Default)]
pub(crate) struct MaterialTable {
    pub(crate) ids: Vec<String>,
    pub(crate) materials: HashMap<String, Material>,
}

/// Translate every document material.
///
/// The id is the material name, or its index when unnamed. A name that
/// repeats gets its index appended so every id stays unique.
pub(crate) fn translate_materials(
    document: &Document,
    base_url: &Url,
    diagnostics: &mut ImportDiagnostics,
) -> MaterialTable {
    let resolver = TextureResolver::new(document, base_url);
    let mut table = MaterialTable::default();
    let mut seen = HashSet::new();

    for (index, source) in document.root.materials.iter().enumerate() {
        let mut id = source
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| index.to_string());
        if !seen.insert(id.clone()) {
            id = format!("{id}_{index}");
            seen.insert(id.clone());
        }

        let material = translate_material(index, source, id.clone(), &resolver, diagnostics);
        table.ids.push(id.clone());
        table.materials.insert(id, material);
    }

    tracing::debug!(materials = table.ids.len(), "translated materials");
    table
}

fn translate_material(
    index: usize,
    source: &document::Material,
    id: String,
    resolver: &TextureResolver<'_>,
    diagnostics: &mut ImportDiagnostics,
) -> Material {
    let mut material = Material::new(id);
    if let Some(name) = &source.name {
        material.name = name.clone();
    }

    let texture = |info: &Option<TextureInfo>, channel: ColorChannel| {
        info.as_ref().and_then(|info| resolver.resolve(info, channel))
    };

    let extensions = material_extensions(index, source, diagnostics);
    let mtoon = extensions.iter().find_map(|extension| match extension {
        MaterialExtension::MToon(mtoon) => Some(mtoon.as_ref()),
        MaterialExtension::Unlit => None,
    });
    if let Some(mtoon) = mtoon {
        material.mtoon = Some(translate_mtoon(mtoon, &texture));
    } else if extensions
        .iter()
        .any(|extension| matches!(extension, MaterialExtension::Unlit))
    {
        material.unlit = true;
    }

    material.opacity_mode = match source.alpha_mode.as_deref() {
        Some("MASK") => OpacityMode::Mask,
        Some("BLEND") => OpacityMode::Blend,
        _ => OpacityMode::Opaque,
    };
    material.opacity_cutoff = source.alpha_cutoff.unwrap_or(0.5);
    material.cull_mode = if source.double_sided {
        CullMode::None
    } else {
        CullMode::Back
    };

    material.emissive = srgb_from_linear(source.emissive_factor.unwrap_or([0.0; 3]));
    material.emissive_texture = texture(&source.emissive_texture, ColorChannel::Rgba);
    material.normal_texture = texture(&source.normal_texture, ColorChannel::Rgba);
    material.occlusion_texture = texture(&source.occlusion_texture, ColorChannel::Rgba);

    if let Some(pbr) = &source.pbr_metallic_roughness {
        material.is_pbr = true;
        material.metallic = pbr.metallic_factor.unwrap_or(1.0);
        material.roughness = pbr.roughness_factor.unwrap_or(1.0);

        let [r, g, b, a] = pbr.base_color_factor.unwrap_or([1.0; 4]);
        material.albedo = srgb_from_linear([r, g, b]);
        material.opacity = a;

        material.albedo_texture = texture(&pbr.base_color_texture, ColorChannel::Rgba);
        material.opacity_texture = material.albedo_texture.clone();
        material.roughness_texture = texture(&pbr.metallic_roughness_texture, ColorChannel::Green);
        material.metallic_texture = texture(&pbr.metallic_roughness_texture, ColorChannel::Blue);
    }

    material
}

fn translate_mtoon(
    source: &MToonExtension,
    texture: &impl Fn(&Option<TextureInfo>, ColorChannel) -> Option<Texture>,
) -> MToon {
    let defaults = MToon::default();
    let color = |value: Option<[f32; 3]>, fallback: Vector3<f32>| {
        value.map(srgb_from_linear).unwrap_or(fallback)
    };

    MToon {
        shade: color(source.shade_color_factor, defaults.shade),
        shade_texture: texture(&source.shade_multiply_texture, ColorChannel::Rgba),
        shading_shift: source.shading_shift_factor.unwrap_or(defaults.shading_shift),
        shading_shift_texture: texture(&source.shading_shift_texture, ColorChannel::Rgba),
        shading_toony: source.shading_toony_factor.unwrap_or(defaults.shading_toony),
        matcap: color(source.matcap_factor, defaults.matcap),
        matcap_texture: texture(&source.matcap_texture, ColorChannel::Rgba),
        parametric_rim: color(source.parametric_rim_color_factor, defaults.parametric_rim),
        parametric_rim_fresnel_power: source
            .parametric_rim_fresnel_power_factor
            .unwrap_or(defaults.parametric_rim_fresnel_power),
        parametric_rim_lift: source
            .parametric_rim_lift_factor
            .unwrap_or(defaults.parametric_rim_lift),
        rim_texture: texture(&source.rim_multiply_texture, ColorChannel::Rgba),
        rim_lighting_mix: source
            .rim_lighting_mix_factor
            .unwrap_or(defaults.rim_lighting_mix),
        outline_width_mode: match source.outline_width_mode.as_deref() {
            Some("worldCoordinates") => OutlineWidthMode::WorldCoordinates,
            Some("screenCoordinates") => OutlineWidthMode::ScreenCoordinates,
            _ => OutlineWidthMode::None,
        },
        outline_width: source.outline_width_factor.unwrap_or(defaults.outline_width),
        outline: color(source.outline_color_factor, defaults.outline),
        uv_animation_texture: texture(&source.uv_animation_mask_texture, ColorChannel::Rgba),
        uv_animation_scroll_x_speed: source
            .uv_animation_scroll_x_speed_factor
            .unwrap_or(defaults.uv_animation_scroll_x_speed),
        uv_animation_scroll_y_speed: source
            .uv_animation_scroll_y_speed_factor
            .unwrap_or(defaults.uv_animation_scroll_y_speed),
        uv_animation_rotation_speed: source
            .uv_animation_rotation_speed_factor
            .unwrap_or(defaults.uv_animation_rotation_speed),
    }
}
