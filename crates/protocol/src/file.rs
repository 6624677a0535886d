//! User-selected files and their byte sources.

use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::ids::{SelectionId, SelectionIds};

/// Where a selected file's bytes come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// A file on the local filesystem, read lazily.
    Path(PathBuf),
    /// Bytes already held in memory (drag-and-drop payloads, tests).
    Memory(Bytes),
}

impl FileSource {
    /// Reads the whole source into memory.
    pub async fn read_all(&self) -> std::io::Result<Bytes> {
        match self {
            FileSource::Path(path) => tokio::fs::read(path).await.map(Bytes::from),
            FileSource::Memory(bytes) => Ok(bytes.clone()),
        }
    }

    /// Blocking variant of [`read_all`](Self::read_all) for use inside
    /// `spawn_blocking` closures.
    pub fn read_all_blocking(&self) -> std::io::Result<Bytes> {
        match self {
            FileSource::Path(path) => std::fs::read(path).map(Bytes::from),
            FileSource::Memory(bytes) => Ok(bytes.clone()),
        }
    }
}

/// A file chosen by the user. Immutable after creation.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    id: SelectionId,
    name: String,
    size: u64,
    source: FileSource,
}

impl SelectedFile {
    pub fn new(id: SelectionId, name: impl Into<String>, size: u64, source: FileSource) -> Self {
        Self {
            id,
            name: name.into(),
            size,
            source,
        }
    }

    /// Selects an in-memory payload under the given display name.
    pub fn from_bytes(ids: &SelectionIds, name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let size = bytes.len() as u64;
        Self::new(ids.next_id(), name, size, FileSource::Memory(bytes))
    }

    /// Selects a file from disk. The display name is the file name component.
    pub async fn from_path(ids: &SelectionIds, path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            ));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        Ok(Self::new(
            ids.next_id(),
            name,
            metadata.len(),
            FileSource::Path(path.to_path_buf()),
        ))
    }

    pub fn id(&self) -> SelectionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }
}
