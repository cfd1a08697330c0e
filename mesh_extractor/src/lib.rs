//! Extract flat, renderer-ready vertex buffers from FBX scenes.
//!
//! ```no_run
//! let vertices = mesh_extractor::extract("assets/model.fbx")?;
//! println!("uploading {} vertices", vertices.len());
//! # Ok::<(), mesh_extractor::LoadError>(())
//! ```
//!
//! Extracted buffers can also be packed into compressed point-cloud assets, see [asset].

#![warn(
    anonymous_parameters,
    bare_trait_objects,
    clippy::branches_sharing_code,
    clippy::map_unwrap_or,
    clippy::match_wildcard_for_single_variants,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::needless_for_each,
    clippy::redundant_closure_for_method_calls,
    clippy::semicolon_if_nothing_returned,
    clippy::unreadable_literal,
    clippy::unwrap_used,
    clippy::expect_used,
    deprecated_in_future,
    ellipsis_inclusive_range_patterns,
    future_incompatible,
    missing_copy_implementations,
    missing_debug_implementations,
    nonstandard_style,
    rust_2018_compatibility,
    rust_2018_idioms,
    rust_2021_compatibility,
    rustdoc::bare_urls,
    rustdoc::broken_intra_doc_links,
    rustdoc::invalid_html_tags,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::private_intra_doc_links,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

use std::{io, path::Path};

pub mod asset;
pub mod fbx;
pub mod filesystem;
pub mod geometry;
pub mod scene;
pub mod vertex;

pub use asset::{convert_all, AssetMeta, CompressionLevel, PointCloudAsset};
pub use filesystem::DataSource;
pub use scene::{MeshRecord, SceneAsset};
pub use vertex::{Bounds, Vertex, VertexBuffer};

/// Results that can be returned from the asset layer of this library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can be returned when extracting vertices from a scene.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("failed to load scene: {description}")]
    ParseFailure { description: String },
    #[error("mesh `{mesh}` has no vertex position attribute")]
    MissingAttribute { mesh: String },
}

impl From<fbx::FormatError> for LoadError {
    fn from(err: fbx::FormatError) -> Self {
        Self::ParseFailure {
            description: err.to_string(),
        }
    }
}

/// Errors that can be returned from the asset layer of this library.
#[allow(variant_size_differences)]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("unsupported asset version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("asset data is packed and must be unpacked first")]
    Packed,
    #[error("failed to deserialize asset data")]
    DeserializeError(anyhow::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Create a profiling timer for a section of code.
#[macro_export]
macro_rules! time {
    ($label:ident) => {
        #[cfg(debug_assertions)]
        let mut $label = Some(::std::time::Instant::now());
    };
    (end: $label:ident) => {{
        #[cfg(debug_assertions)]
        match $label.take() {
            Some(label) => {
                ::tracing::debug!("{}: {}", stringify!($label), label.elapsed().as_secs_f32())
            }
            None => ::tracing::warn!("Timer `{}` has been terminated.", stringify!($label)),
        };
    }};
}

/// Extract every vertex position of the scene at `path`.
///
/// Meshes are visited in the order the file declares them and each mesh contributes its
/// vertices in index order, narrowed to `f32`. Coordinates are returned as authored, without unit
/// or axis conversion. The parsed scene is released before returning.
///
/// # Errors
///
/// Returns [LoadError::ParseFailure] if the file is missing, unreadable or not a valid scene, and
/// [LoadError::MissingAttribute] if a mesh has no vertex positions.
pub fn extract(path: impl AsRef<Path>) -> std::result::Result<VertexBuffer, LoadError> {
    extract_from(path.as_ref())
}

/// Extract every vertex position of a scene read from a path or an in-memory buffer.
///
/// # Errors
///
/// See [extract].
pub fn extract_from(
    source: impl Into<DataSource>,
) -> std::result::Result<VertexBuffer, LoadError> {
    let scene = SceneAsset::load(source)?;
    scene.vertex_buffer()
}
