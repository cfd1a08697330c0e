//! Packed point-cloud assets.
//!
//! A [PointCloudAsset] holds an extracted [VertexBuffer] in a serialized, optionally deflated form
//! so it can be cached on disk and loaded without reparsing the original scene.

use crate::{filesystem, time, Error, Result, Vertex, VertexBuffer};
use anyhow::Context;
use async_compression::{
    tokio::{bufread::DeflateDecoder, write::DeflateEncoder},
    Level,
};
use async_recursion::async_recursion;
use serde::{Deserialize, Serialize};
use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};
use tokio::{
    fs,
    io::{AsyncReadExt, AsyncWriteExt, BufReader},
    task,
};
use tokio_stream::{wrappers::ReadDirStream, StreamExt};

/// Current [PointCloudAsset] format version.
pub const ASSET_VERSION: u32 = 1;

/// File extension of packed point-cloud assets.
pub const ASSET_EXTENSION: &str = "points";

/// Level of compression for `deflate`.
// Mirrors async_compression::Level, which is #[non_exhaustive] and not Serialize.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub enum CompressionLevel {
    Fastest,
    Best,
    #[default]
    Default,
    Precise(u32),
}

impl From<CompressionLevel> for Level {
    fn from(level: CompressionLevel) -> Self {
        match level {
            CompressionLevel::Fastest => Self::Fastest,
            CompressionLevel::Best => Self::Best,
            CompressionLevel::Default => Self::Default,
            CompressionLevel::Precise(quality) => Self::Precise(quality),
        }
    }
}

/// [PointCloudAsset] metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct AssetMeta {
    pub version: u32,
    pub compression_level: Option<CompressionLevel>,
    pub original_file: PathBuf,
    pub unpacked_size: usize,
}

impl Default for AssetMeta {
    fn default() -> Self {
        Self {
            version: ASSET_VERSION,
            compression_level: Some(CompressionLevel::Default),
            original_file: PathBuf::new(),
            unpacked_size: 0,
        }
    }
}

/// A vertex buffer that can be packed, saved and loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct PointCloudAsset {
    pub meta: AssetMeta,
    pub num_vertices: usize,
    pub packed: bool,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

impl PointCloudAsset {
    /// Create an unpacked `PointCloudAsset` from an extracted vertex buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the vertices can not be serialized.
    pub fn from_vertices(original_file: impl Into<PathBuf>, vertices: &[Vertex]) -> Result<Self> {
        let data = bincode::serialize(vertices).context("failed to serialize vertex data")?;
        Ok(Self {
            meta: AssetMeta {
                original_file: original_file.into(),
                unpacked_size: data.len(),
                ..Default::default()
            },
            num_vertices: vertices.len(),
            packed: false,
            data,
        })
    }

    /// Extract a scene file into an unpacked `PointCloudAsset`.
    ///
    /// # Errors
    ///
    /// Returns [Error::Load] if the scene can not be extracted.
    pub async fn from_file(filename: impl AsRef<Path>) -> Result<Self> {
        let filename = filename.as_ref();
        tracing::debug!("loading scene {filename:?}");

        let scene_filename = filename.to_path_buf();
        let vertices = task::spawn_blocking(move || crate::extract(scene_filename))
            .await
            .with_context(|| format!("failed to join scene thread {filename:?}"))??;

        let asset = Self::from_vertices(filename, &vertices)?;
        tracing::debug!(
            "loaded scene {filename:?} successfully, vertices: {}, size: {}",
            asset.num_vertices,
            asset.data.len()
        );
        Ok(asset)
    }

    /// A name identifying the asset.
    #[must_use]
    pub fn name(&self) -> &str {
        self.meta
            .original_file
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or("unknown")
    }

    /// Unpacked size of the asset data.
    #[must_use]
    pub fn size(&self) -> usize {
        self.meta.unpacked_size
    }

    /// Deserialize the vertex buffer.
    ///
    /// # Errors
    ///
    /// Returns [Error::Packed] if the asset has not been unpacked, or [Error::DeserializeError] if
    /// the data is corrupt.
    pub fn vertices(&self) -> Result<VertexBuffer> {
        if self.packed {
            return Err(Error::Packed);
        }
        bincode::deserialize(&self.data)
            .context("failed to deserialize vertices")
            .map_err(Error::DeserializeError)
    }

    /// Compress the asset data for saving to disk. Does nothing when already packed.
    ///
    /// # Errors
    ///
    /// Returns an error if compression fails.
    pub async fn pack(&mut self) -> Result<()> {
        if self.packed {
            return Ok(());
        }
        if let Some(level) = self.meta.compression_level {
            let buffer = Vec::with_capacity(self.data.len());
            let mut encoder = DeflateEncoder::with_quality(buffer, level.into());
            encoder
                .write_all(&self.data)
                .await
                .context("failed to encode asset")?;
            encoder.shutdown().await.context("failed to write asset")?;
            self.data = encoder.into_inner();
        }
        self.packed = true;
        Ok(())
    }

    /// Decompress packed asset data. Does nothing when already unpacked.
    ///
    /// # Errors
    ///
    /// Returns an error if the data can not be decompressed to its recorded size.
    pub async fn unpack(&mut self) -> Result<()> {
        if !self.packed {
            return Ok(());
        }
        if self.meta.compression_level.is_some() {
            let mut destination = Vec::with_capacity(self.meta.unpacked_size);
            DeflateDecoder::new(BufReader::new(&self.data[..]))
                .read_to_end(&mut destination)
                .await
                .context("failed to decode asset")?;
            if destination.len() != self.meta.unpacked_size {
                return Err(anyhow::anyhow!(
                    "asset {} unpacked to {} bytes, expected {}",
                    self.name(),
                    destination.len(),
                    self.meta.unpacked_size
                )
                .into());
            }
            self.data = destination;
        }
        self.packed = false;
        Ok(())
    }

    /// Save asset data to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can not be created or written.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = filesystem::create_file(path).await?;
        let data = bincode::serialize(self).context("failed to serialize asset data")?;
        file.write_all(&data).await?;
        file.flush().await?;
        Ok(())
    }

    /// Load asset data from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can not be read, is not an asset, or was written by another
    /// format version.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = filesystem::open_file(path).await?;
        let mut bytes = vec![];
        file.read_to_end(&mut bytes).await?;
        let asset: Self = bincode::deserialize(&bytes)
            .context("failed to deserialize asset data")
            .map_err(Error::DeserializeError)?;
        if asset.meta.version != ASSET_VERSION {
            return Err(Error::UnsupportedVersion {
                found: asset.meta.version,
                expected: ASSET_VERSION,
            });
        }
        Ok(asset)
    }

    /// Extract a scene file, pack it, and save it to `destination`.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction, packing or saving fails.
    pub async fn convert(
        source: impl AsRef<Path>,
        destination: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        let (source, destination) = (source.as_ref(), destination.as_ref());
        tracing::info!("converting scene asset {source:?}");

        time!(read_scene);
        let mut asset = Self::from_file(source).await?;
        time!(end: read_scene);

        time!(pack_scene);
        asset.pack().await?;
        time!(end: pack_scene);

        asset.save(destination).await?;

        tracing::info!("converted scene asset {source:?} to {destination:?} successfully");

        Ok(destination.to_path_buf())
    }
}

fn is_scene(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map_or(false, |extension| extension.eq_ignore_ascii_case("fbx"))
}

#[async_recursion]
async fn find_scenes(directory: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(directory)
        .await
        .with_context(|| format!("failed to read directory {directory:?}"))?;
    let mut entries = ReadDirStream::new(entries);
    let mut scenes = vec![];
    while let Some(entry) = entries.next().await {
        let path = entry
            .with_context(|| format!("failed to read directory entry in {directory:?}"))?
            .path();
        if path.is_dir() {
            scenes.extend(find_scenes(&path).await?);
        } else if is_scene(&path) {
            scenes.push(path);
        }
    }
    Ok(scenes)
}

/// Convert a scene file, or every scene file under a directory, into packed assets.
///
/// Directories are searched recursively for `.fbx` files. Outputs keep the layout relative to
/// `input` under `output_dir`, with the [ASSET_EXTENSION] extension. Conversions run concurrently
/// and the written paths are returned in source path order.
///
/// # Errors
///
/// Returns the first error of any conversion.
pub async fn convert_all(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>> {
    let (input, output_dir) = (input.as_ref(), output_dir.as_ref());
    let metadata = fs::metadata(input)
        .await
        .with_context(|| format!("failed to read {input:?}"))?;

    let mut jobs = vec![];
    if metadata.is_dir() {
        let mut scenes = find_scenes(input).await?;
        scenes.sort();
        tracing::debug!("found {} scenes in {input:?}", scenes.len());
        for scene in scenes {
            let relative = scene
                .strip_prefix(input)
                .with_context(|| format!("{scene:?} is not within {input:?}"))?;
            let destination = output_dir.join(relative).with_extension(ASSET_EXTENSION);
            jobs.push((scene, destination));
        }
    } else {
        let filename = input
            .file_name()
            .with_context(|| format!("{input:?} has no file name"))?;
        let destination = output_dir.join(filename).with_extension(ASSET_EXTENSION);
        jobs.push((input.to_path_buf(), destination));
    }

    futures::future::try_join_all(
        jobs.iter()
            .map(|(source, destination)| PointCloudAsset::convert(source, destination)),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    /// A temporary directory, removed with its contents when dropped.
    #[derive(Debug)]
    struct ScratchDir(PathBuf);

    impl ScratchDir {
        fn new(name: &str) -> Self {
            let directory =
                env::temp_dir().join(format!("mesh_extractor-{}-{name}", std::process::id()));
            let _ = std::fs::remove_dir_all(&directory);
            Self(directory)
        }

        fn path(&self) -> &Path {
            &self.0
        }

        fn join(&self, path: impl AsRef<Path>) -> PathBuf {
            self.0.join(path)
        }
    }

    impl Drop for ScratchDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn vertices() -> Vec<Vertex> {
        (0..64)
            .map(|i| Vertex::new(i as f32, (i % 4) as f32, -0.5))
            .collect()
    }

    #[tokio::test]
    async fn scene_convert() {
        let filename = PathBuf::from("tests/two_meshes.fbx");
        let scratch = ScratchDir::new("convert");
        let destination = scratch.join("two_meshes.points");
        let expected = PointCloudAsset::from_file(&filename)
            .await
            .expect("valid scene file");
        let converted = PointCloudAsset::convert(&filename, &destination)
            .await
            .expect("valid scene conversion");
        assert_eq!(converted, destination);

        let mut asset = PointCloudAsset::load(&converted)
            .await
            .expect("valid asset load");
        assert_eq!(asset.meta.version, ASSET_VERSION);
        assert_eq!(asset.meta.original_file, filename);
        assert_eq!(asset.meta.compression_level, Some(CompressionLevel::Default));
        assert_eq!(asset.name(), "two_meshes.fbx");
        assert_eq!(asset.num_vertices, 5);
        assert!(asset.packed);
        assert!(matches!(asset.vertices(), Err(Error::Packed)));

        asset.unpack().await.expect("valid asset unpack");
        assert_eq!(asset, expected);
        assert_eq!(
            asset.vertices().expect("valid vertices"),
            crate::extract(&filename).expect("valid scene")
        );
    }

    #[tokio::test]
    async fn scene_convert_failure() {
        let result = PointCloudAsset::from_file("tests/missing_vertices.fbx").await;
        assert!(matches!(
            result,
            Err(Error::Load(crate::LoadError::MissingAttribute { .. }))
        ));
    }

    #[tokio::test]
    async fn pack_unpack() {
        let vertices = vertices();
        let mut asset =
            PointCloudAsset::from_vertices("cloud.fbx", &vertices).expect("valid asset");
        let expected = asset.clone();

        asset.pack().await.expect("valid asset pack");
        let packed = asset.clone();
        asset.pack().await.expect("valid asset pack");
        assert_eq!(asset, packed);
        assert!(asset.data.len() < expected.data.len());

        asset.unpack().await.expect("valid asset unpack");
        asset.unpack().await.expect("valid asset unpack");
        assert_eq!(asset, expected);
        assert_eq!(asset.vertices().expect("valid vertices"), vertices);
    }

    #[tokio::test]
    async fn uncompressed_pack() {
        let mut asset =
            PointCloudAsset::from_vertices("cloud.fbx", &vertices()).expect("valid asset");
        asset.meta.compression_level = None;
        let expected = asset.clone();
        asset.pack().await.expect("valid asset pack");
        assert_eq!(asset.data, expected.data);
        asset.unpack().await.expect("valid asset unpack");
        assert_eq!(asset, expected);
    }

    #[tokio::test]
    async fn load_rejects_other_versions() {
        let scratch = ScratchDir::new("version");
        let path = scratch.join("old.points");
        let mut asset =
            PointCloudAsset::from_vertices("old.fbx", &vertices()).expect("valid asset");
        asset.meta.version = ASSET_VERSION + 1;
        asset.save(&path).await.expect("valid asset save");

        let result = PointCloudAsset::load(&path).await;
        assert!(
            matches!(
                result,
                Err(Error::UnsupportedVersion { found, expected })
                    if found == ASSET_VERSION + 1 && expected == ASSET_VERSION
            ),
            "{result:?}"
        );
        assert!(matches!(
            PointCloudAsset::load(path.with_extension("missing")).await,
            Err(Error::Other(_))
        ));
    }

    #[tokio::test]
    async fn scratch_dir_cleanup() {
        let scratch = ScratchDir::new("cleanup");
        let path = scratch.join("nested/cloud.points");
        PointCloudAsset::from_vertices("cloud.fbx", &vertices())
            .expect("valid asset")
            .save(&path)
            .await
            .expect("valid asset save");
        assert!(path.exists());

        let root = scratch.path().to_path_buf();
        drop(scratch);
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn convert_directory() {
        let scratch = ScratchDir::new("convert_all");
        let root = scratch.path().to_path_buf();
        let input = root.join("scenes");
        let output = root.join("packed");
        std::fs::create_dir_all(input.join("nested")).expect("scratch directory");
        std::fs::copy("tests/triangle.fbx", input.join("triangle.fbx")).expect("fixture");
        std::fs::copy("tests/two_meshes.fbx", input.join("nested/Meshes.FBX")).expect("fixture");
        std::fs::write(input.join("notes.txt"), "not a scene").expect("scratch file");

        let converted = convert_all(&input, &output)
            .await
            .expect("valid conversions");
        assert_eq!(
            converted,
            [
                output.join("nested/Meshes.points"),
                output.join("triangle.points"),
            ]
        );

        let mut asset = PointCloudAsset::load(&converted[1])
            .await
            .expect("valid asset load");
        asset.unpack().await.expect("valid asset unpack");
        assert_eq!(asset.vertices().expect("valid vertices").len(), 3);

        let single = convert_all(input.join("triangle.fbx"), &root)
            .await
            .expect("valid conversion");
        assert_eq!(single, [root.join("triangle.points")]);

        std::fs::copy("tests/missing_vertices.fbx", input.join("hollow.fbx")).expect("fixture");
        assert!(convert_all(&input, &output).await.is_err());
    }
}
