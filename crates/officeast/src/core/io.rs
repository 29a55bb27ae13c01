//! Input normalisation.
//!
//! [`OfficeInput`] accepts a filesystem path or an in-memory buffer; [`load`]
//! turns either into bytes plus the detected [`FileType`].

use std::path::{Path, PathBuf};

use crate::core::mime;
use crate::types::FileType;
use crate::{OfficeError, Result};

/// A document to parse: a path on disk or bytes already in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfficeInput {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl OfficeInput {
    /// Short description for logs: the path, or the buffer length.
    pub fn describe(&self) -> String {
        match self {
            OfficeInput::Path(path) => path.display().to_string(),
            OfficeInput::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        }
    }
}

impl From<&Path> for OfficeInput {
    fn from(path: &Path) -> Self {
        OfficeInput::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for OfficeInput {
    fn from(path: PathBuf) -> Self {
        OfficeInput::Path(path)
    }
}

impl From<&PathBuf> for OfficeInput {
    fn from(path: &PathBuf) -> Self {
        OfficeInput::Path(path.clone())
    }
}

impl From<&str> for OfficeInput {
    fn from(path: &str) -> Self {
        OfficeInput::Path(PathBuf::from(path))
    }
}

impl From<String> for OfficeInput {
    fn from(path: String) -> Self {
        OfficeInput::Path(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for OfficeInput {
    fn from(bytes: Vec<u8>) -> Self {
        OfficeInput::Bytes(bytes)
    }
}

impl From<&[u8]> for OfficeInput {
    fn from(bytes: &[u8]) -> Self {
        OfficeInput::Bytes(bytes.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for OfficeInput {
    fn from(bytes: &[u8; N]) -> Self {
        OfficeInput::Bytes(bytes.to_vec())
    }
}

/// Check that `path` names a readable regular file.
///
/// # Errors
///
/// `FileNotFound` when nothing exists at `path`, `IsDirectory` for directories,
/// and `Io` for any other metadata failure.
pub async fn validate_file(path: &Path) -> Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Err(OfficeError::IsDirectory(path.display().to_string())),
        Ok(_) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(OfficeError::FileNotFound(path.display().to_string()))
        }
        Err(err) => Err(OfficeError::Io(err)),
    }
}

/// Read the input and detect its format.
///
/// Paths are classified by extension and fall back to content sniffing when they
/// have none; buffers are always sniffed.
///
/// # Errors
///
/// See [`validate_file`], [`mime::detect_from_path`] and [`mime::detect_from_bytes`].
pub async fn load(input: OfficeInput) -> Result<(Vec<u8>, FileType)> {
    match input {
        OfficeInput::Path(path) => {
            validate_file(&path).await?;
            let by_extension = mime::detect_from_path(&path)?;
            let bytes = tokio::fs::read(&path).await?;
            let file_type = match by_extension {
                Some(file_type) => file_type,
                None => mime::detect_from_bytes(&bytes)?,
            };
            Ok((bytes, file_type))
        }
        OfficeInput::Bytes(bytes) => {
            let file_type = mime::detect_from_bytes(&bytes)?;
            Ok((bytes, file_type))
        }
    }
}
