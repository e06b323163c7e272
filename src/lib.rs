//! glTF 2.0 / GLB / VRM importer.
//!
//! [`import_model`] turns an asset into a [`Model`]: a parent-first joint
//! list, skinned meshes with merged vertex streams, translated materials and
//! blendshape channels. Untrusted input is tolerated where possible; local
//! problems end up in [`Model::diagnostics`] instead of failing the import.

pub mod diagnostic;
pub mod error;
pub mod import;
pub mod model;
pub mod options;

pub use diagnostic::{ImportDiagnostics, ImportIssue, Severity};
pub use error::{AccessorError, ImportError, PrimitiveError};
pub use import::{BLENDSHAPE_NAMES, FileFetcher, ResourceFetcher, import_model, import_model_file};
pub use model::{
    Blendshape, Cluster, ColorChannel, CullMode, Extents, Joint, MToon, Material, Mesh, MeshPart,
    Model, OpacityMode, OutlineWidthMode, Texture,
};
pub use options::{
    BlendshapeMapping, ImportOptions, ModelOffset, Strictness, load_import_options,
    save_import_options,
};
