// ─── Container / extensions ──────────────────────────────────────────────────

pub(crate) const GLB_MAGIC: &[u8; 4] = b"glTF";

pub(crate) const EXT_MTOON: &str = "VRMC_materials_mtoon";
pub(crate) const EXT_UNLIT: &str = "KHR_materials_unlit";
pub(crate) const EXT_TEXTURE_WEBP: &str = "EXT_texture_webp";
pub(crate) const EXT_VRM1: &str = "VRMC_vrm";
pub(crate) const EXT_VRM0: &str = "VRM";

/// Extensions that may appear in `extensionsRequired` without tripping
/// strict mode.
pub(crate) const SUPPORTED_EXTENSIONS: &[&str] = &[
    EXT_MTOON,
    EXT_UNLIT,
    EXT_TEXTURE_WEBP,
    EXT_VRM1,
    EXT_VRM0,
    "KHR_texture_transform",
    "KHR_materials_emissive_strength",
];

// ─── Vertex attributes ───────────────────────────────────────────────────────

pub(crate) const ATTR_POSITION: &str = "POSITION";
pub(crate) const ATTR_NORMAL: &str = "NORMAL";
pub(crate) const ATTR_TANGENT: &str = "TANGENT";
pub(crate) const ATTR_TEXCOORD_0: &str = "TEXCOORD_0";
pub(crate) const ATTR_TEXCOORD_1: &str = "TEXCOORD_1";
pub(crate) const ATTR_COLOR_0: &str = "COLOR_0";
pub(crate) const ATTR_JOINTS_0: &str = "JOINTS_0";
pub(crate) const ATTR_WEIGHTS_0: &str = "WEIGHTS_0";

// ─── Skinning ────────────────────────────────────────────────────────────────

pub(crate) const WEIGHTS_PER_VERTEX: usize = 4;

/// Fixed-point weight sum of one vertex.
pub(crate) const MAX_WEIGHT: u16 = u16::MAX;

/// Quantized weight at which a vertex joins its joint's shape-vertex cache.
pub(crate) const SHAPE_VERTEX_WEIGHT_THRESHOLD: u16 = u16::MAX / 4;

/// Smallest per-axis size of a mesh's extents.
pub(crate) const MIN_MESH_EXTENT: f32 = 0.001;

// ─── Blendshapes ─────────────────────────────────────────────────────────────

/// Canonical blendshape channels, in channel-index order.
pub const BLENDSHAPE_NAMES: &[&str] = &[
    "EyeBlink_L",
    "EyeBlink_R",
    "EyeSquint_L",
    "EyeSquint_R",
    "EyeDown_L",
    "EyeDown_R",
    "EyeIn_L",
    "EyeIn_R",
    "EyeOpen_L",
    "EyeOpen_R",
    "EyeOut_L",
    "EyeOut_R",
    "EyeUp_L",
    "EyeUp_R",
    "BrowsD_L",
    "BrowsD_R",
    "BrowsU_C",
    "BrowsU_L",
    "BrowsU_R",
    "JawFwd",
    "JawLeft",
    "JawOpen",
    "JawRight",
    "MouthLeft",
    "MouthRight",
    "MouthFrown_L",
    "MouthFrown_R",
    "MouthSmile_L",
    "MouthSmile_R",
    "MouthDimple_L",
    "MouthDimple_R",
    "LipsStretch_L",
    "LipsStretch_R",
    "LipsUpperClose",
    "LipsLowerClose",
    "LipsFunnel",
    "LipsPucker",
    "Puff",
    "CheekSquint_L",
    "CheekSquint_R",
    "MouthClose",
    "MouthUpperUp_L",
    "MouthUpperUp_R",
    "MouthLowerDown_L",
    "MouthLowerDown_R",
    "MouthPress_L",
    "MouthPress_R",
    "MouthShrugLower",
    "MouthShrugUpper",
    "NoseSneer_L",
    "NoseSneer_R",
    "TongueOut",
    "UserBlendshape0",
    "UserBlendshape1",
    "UserBlendshape2",
    "UserBlendshape3",
    "UserBlendshape4",
    "UserBlendshape5",
    "UserBlendshape6",
    "UserBlendshape7",
    "UserBlendshape8",
    "UserBlendshape9",
];

/// Target names that together identify an ARKit-style avatar export
/// (ReadyPlayerMe and similar).
pub(crate) const ARKIT_SIGNATURE: &[&str] = &[
    "browOuterUpLeft",
    "browInnerUp",
    "browDownLeft",
    "eyeBlinkLeft",
    "eyeWideLeft",
    "mouthLeft",
    "viseme_O",
    "mouthShrugLower",
];

/// (source target, canonical channel, weight) entries applied when an
/// ARKit-style avatar is recognized and no explicit mapping was supplied.
pub(crate) const ARKIT_SYNONYMS: &[(&str, &str, f32)] = &[
    ("eyeBlinkLeft", "EyeBlink_L", 1.0),
    ("eyeBlinkRight", "EyeBlink_R", 1.0),
    ("eyeSquintLeft", "EyeSquint_L", 1.0),
    ("eyeSquintRight", "EyeSquint_R", 1.0),
    ("eyeLookDownLeft", "EyeDown_L", 1.0),
    ("eyeLookDownRight", "EyeDown_R", 1.0),
    ("eyeLookInLeft", "EyeIn_L", 1.0),
    ("eyeLookInRight", "EyeIn_R", 1.0),
    ("eyeWideLeft", "EyeOpen_L", 1.0),
    ("eyeWideRight", "EyeOpen_R", 1.0),
    ("eyeLookOutLeft", "EyeOut_L", 1.0),
    ("eyeLookOutRight", "EyeOut_R", 1.0),
    ("eyeLookUpLeft", "EyeUp_L", 1.0),
    ("eyeLookUpRight", "EyeUp_R", 1.0),
    ("browDownLeft", "BrowsD_L", 1.0),
    ("browDownRight", "BrowsD_R", 1.0),
    ("browInnerUp", "BrowsU_C", 1.0),
    ("browOuterUpLeft", "BrowsU_L", 1.0),
    ("browOuterUpRight", "BrowsU_R", 1.0),
    ("jawForward", "JawFwd", 1.0),
    ("jawLeft", "JawLeft", 1.0),
    ("jawOpen", "JawOpen", 1.0),
    ("jawRight", "JawRight", 1.0),
    ("mouthLeft", "MouthLeft", 1.0),
    ("mouthRight", "MouthRight", 1.0),
    ("mouthFrownLeft", "MouthFrown_L", 1.0),
    ("mouthFrownRight", "MouthFrown_R", 1.0),
    ("mouthSmileLeft", "MouthSmile_L", 1.0),
    ("mouthSmileRight", "MouthSmile_R", 1.0),
    ("mouthDimpleLeft", "MouthDimple_L", 1.0),
    ("mouthDimpleRight", "MouthDimple_R", 1.0),
    ("mouthStretchLeft", "LipsStretch_L", 1.0),
    ("mouthStretchRight", "LipsStretch_R", 1.0),
    ("mouthRollUpper", "LipsUpperClose", 1.0),
    ("mouthRollLower", "LipsLowerClose", 1.0),
    ("mouthFunnel", "LipsFunnel", 1.0),
    ("mouthPucker", "LipsPucker", 1.0),
    ("cheekPuff", "Puff", 1.0),
    ("cheekSquintLeft", "CheekSquint_L", 1.0),
    ("cheekSquintRight", "CheekSquint_R", 1.0),
    ("mouthClose", "MouthClose", 1.0),
    ("mouthUpperUpLeft", "MouthUpperUp_L", 1.0),
    ("mouthUpperUpRight", "MouthUpperUp_R", 1.0),
    ("mouthLowerDownLeft", "MouthLowerDown_L", 1.0),
    ("mouthLowerDownRight", "MouthLowerDown_R", 1.0),
    ("mouthPressLeft", "MouthPress_L", 1.0),
    ("mouthPressRight", "MouthPress_R", 1.0),
    ("mouthShrugLower", "MouthShrugLower", 1.0),
    ("mouthShrugUpper", "MouthShrugUpper", 1.0),
    ("noseSneerLeft", "NoseSneer_L", 1.0),
    ("noseSneerRight", "NoseSneer_R", 1.0),
    ("tongueOut", "TongueOut", 1.0),
    // Visemes drive the mouth channels partially.
    ("viseme_aa", "JawOpen", 0.5),
    ("viseme_E", "MouthSmile_L", 0.3),
    ("viseme_E", "MouthSmile_R", 0.3),
    ("viseme_I", "LipsStretch_L", 0.4),
    ("viseme_I", "LipsStretch_R", 0.4),
    ("viseme_O", "LipsFunnel", 0.6),
    ("viseme_U", "LipsPucker", 0.6),
    ("viseme_PP", "MouthClose", 0.6),
];
