use thiserror::Error;

/// Fatal import failures. Any of these aborts the whole import and no model
/// is returned.
#[derive(Error, Debug)]
pub enum ImportError {
    /// The container or the scene description is not valid glTF content.
    #[error("failed to parse glTF content: {0}")]
    Parse(String),

    /// A declared buffer could not be loaded (fetch failed or size mismatch).
    #[error("buffer {index} is unavailable: {reason}")]
    MissingBuffer { index: usize, reason: String },

    /// The surrounding application requested shutdown while loading.
    #[error("import cancelled while fetching {0}")]
    Cancelled(String),

    /// Skin data is missing or inconsistent with the skin's joint list.
    #[error("invalid skin {skin}: {reason}")]
    SkinData { skin: usize, reason: String },

    /// Morph target data cannot be aligned with its base mesh.
    #[error("invalid morph target {target} on mesh {mesh}: {reason}")]
    Blendshape {
        mesh: usize,
        target: usize,
        reason: String,
    },

    /// The import produced nothing renderable.
    #[error("model has {meshes} meshes and {joints} joints")]
    EmptyModel { meshes: usize, joints: usize },
}

impl From<serde_json::Error> for ImportError {
    fn from(error: serde_json::Error) -> Self {
        ImportError::Parse(error.to_string())
    }
}

impl From<gltf::Error> for ImportError {
    fn from(error: gltf::Error) -> Self {
        ImportError::Parse(error.to_string())
    }
}

/// Failure to read an accessor as the requested numeric sequence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessorError {
    #[error("accessor {0} does not exist")]
    Missing(usize),

    #[error("accessor {accessor} references missing buffer view {view}")]
    MissingView { accessor: usize, view: usize },

    #[error("accessor {accessor}: buffer {buffer} has no data")]
    MissingData { accessor: usize, buffer: usize },

    #[error("accessor {accessor}: stride {stride} is smaller than element size {element_size}")]
    StrideTooSmall {
        accessor: usize,
        stride: usize,
        element_size: usize,
    },

    #[error("accessor {accessor}: reads {required} bytes but only {available} are available")]
    OutOfRange {
        accessor: usize,
        required: usize,
        available: usize,
    },

    #[error("accessor {accessor}: sparse index {index} exceeds count {count}")]
    SparseIndex {
        accessor: usize,
        index: u32,
        count: usize,
    },

    #[error("accessor {accessor}: {reason}")]
    UnsupportedType { accessor: usize, reason: String },
}

/// Failure localized to one primitive or one of its attributes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveError {
    #[error("primitive has no index accessor")]
    MissingIndices,

    #[error("primitive has no POSITION attribute")]
    MissingPositions,

    #[error("primitive mode {0} is not a triangle list")]
    UnsupportedMode(u32),

    #[error("{attribute}: {source}")]
    Attribute {
        attribute: &'static str,
        source: AccessorError,
    },

    #[error("{attribute}: invalid element type {element_type}")]
    InvalidElementType {
        attribute: &'static str,
        element_type: &'static str,
    },

    #[error("index {index} is out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },
}
