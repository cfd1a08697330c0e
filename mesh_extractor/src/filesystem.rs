use anyhow::{Context, Result};
use bytes::{Bytes, BytesMut};
use derive_more::{From, TryInto};
use std::{
    borrow::Cow,
    fs,
    path::{Path, PathBuf},
};
use tokio::{
    fs::{create_dir_all, File},
    io::{BufReader, BufWriter},
};

/// Where scene data is read from.
#[derive(Debug, Clone, PartialEq, From, TryInto)]
#[must_use]
pub enum DataSource {
    Path(PathBuf),
    Bytes(Bytes),
}

impl DataSource {
    /// Read the full contents of this source.
    pub fn read(&self) -> Result<Cow<'_, [u8]>> {
        match self {
            Self::Path(path) => read_file_sync(path).map(Cow::Owned),
            Self::Bytes(bytes) => Ok(Cow::Borrowed(&bytes[..])),
        }
    }

    /// A name identifying this source in logs.
    #[must_use]
    pub fn name(&self) -> Cow<'_, str> {
        match self {
            Self::Path(path) => path.to_string_lossy(),
            Self::Bytes(bytes) => format!("<{} bytes>", bytes.len()).into(),
        }
    }
}

impl From<&str> for DataSource {
    fn from(path: &str) -> Self {
        Self::Path(path.into())
    }
}

impl From<String> for DataSource {
    fn from(path: String) -> Self {
        Self::Path(path.into())
    }
}

impl From<&Path> for DataSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<BytesMut> for DataSource {
    fn from(bytes: BytesMut) -> Self {
        Self::Bytes(bytes.into())
    }
}

impl From<Vec<u8>> for DataSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes.into())
    }
}

impl From<&'static [u8]> for DataSource {
    fn from(bytes: &'static [u8]) -> Self {
        Self::Bytes(bytes.into())
    }
}

#[inline]
pub async fn create_file(path: impl AsRef<Path>) -> Result<BufWriter<File>> {
    let path = path.as_ref();
    let directory = path.parent().context("can not create file at root path")?;
    create_dirs(directory).await?;
    Ok(BufWriter::new(File::create(path).await.with_context(
        || format!("failed to create file for writing: {path:?}"),
    )?))
}

#[inline]
pub async fn open_file(path: impl AsRef<Path>) -> Result<BufReader<File>> {
    let path = path.as_ref();
    Ok(BufReader::new(File::open(path).await.with_context(
        || format!("failed to open file for reading: {path:?}"),
    )?))
}

#[inline]
pub fn read_file_sync(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    fs::read(path).with_context(|| format!("failed to open file for reading: {path:?}"))
}

#[inline]
pub async fn create_dirs(directory: impl AsRef<Path>) -> Result<()> {
    let directory = directory.as_ref();
    if !directory.as_os_str().is_empty() && !directory.exists() {
        create_dir_all(directory)
            .await
            .with_context(|| format!("failed to create directory {directory:?}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_source_conversions() {
        assert_eq!(
            DataSource::from("model.fbx"),
            DataSource::Path(PathBuf::from("model.fbx"))
        );
        assert_eq!(
            DataSource::from(Path::new("model.fbx")),
            DataSource::from(String::from("model.fbx"))
        );

        let source = DataSource::from(vec![1, 2, 3]);
        assert_eq!(source.name(), "<3 bytes>");
        assert_eq!(source.read().expect("in-memory read").as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn missing_file() {
        let source = DataSource::from("does/not/exist.fbx");
        let err = source.read().expect_err("missing file");
        assert!(format!("{err:#}").contains("failed to open file for reading"));
    }
}
