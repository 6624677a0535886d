use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use pixdrop_protocol::FileSource;

use crate::{DEFAULT_CHUNK_SIZE, TransferError};

/// A slice of an object being transferred.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Byte offset within the object.
    pub offset: u64,
    pub data: Bytes,
    /// SHA-256 hex checksum of `data` (empty means no verification).
    pub checksum: String,
}

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

enum ReaderSource {
    File(tokio::fs::File),
    Memory(Bytes),
}

/// Reads a [`FileSource`] in fixed-size chunks with SHA-256 checksums.
pub struct ChunkReader {
    source: ReaderSource,
    chunk_size: usize,
    offset: u64,
    size: u64,
}

impl ChunkReader {
    /// Opens `source` for chunked reading.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] is used.
    pub async fn open(source: &FileSource, chunk_size: usize) -> Result<Self, TransferError> {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };

        let (source, size) = match source {
            FileSource::Path(path) => {
                let file = tokio::fs::File::open(path).await?;
                let size = file.metadata().await?.len();
                (ReaderSource::File(file), size)
            }
            FileSource::Memory(bytes) => {
                let size = bytes.len() as u64;
                (ReaderSource::Memory(bytes.clone()), size)
            }
        };

        Ok(Self {
            source,
            chunk_size,
            offset: 0,
            size,
        })
    }

    /// Reads the next chunk. Returns `None` at EOF.
    pub async fn next_chunk(&mut self) -> Result<Option<Chunk>, TransferError> {
        let remaining = self.remaining();
        if remaining == 0 {
            return Ok(None);
        }
        let read_size = remaining.min(self.chunk_size as u64) as usize;

        let data = match &mut self.source {
            ReaderSource::File(file) => {
                let mut buf = vec![0u8; read_size];
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    return Ok(None);
                }
                buf.truncate(n);
                Bytes::from(buf)
            }
            ReaderSource::Memory(bytes) => {
                let start = self.offset as usize;
                bytes.slice(start..start + read_size)
            }
        };

        let chunk = Chunk {
            offset: self.offset,
            checksum: checksum_bytes(&data),
            data,
        };
        self.offset += chunk.data.len() as u64;
        Ok(Some(chunk))
    }

    /// Current byte offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Total object size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Bytes remaining to read.
    pub fn remaining(&self) -> u64 {
        self.size.saturating_sub(self.offset)
    }
}

// ---------------------------------------------------------------------------
// ChunkWriter
// ---------------------------------------------------------------------------

/// Writes chunks of one object under a storage root.
pub struct ChunkWriter {
    path: PathBuf,
    file: tokio::fs::File,
    written: u64,
}

impl ChunkWriter {
    /// Creates (or truncates) the object `key` under `root`.
    pub async fn create(root: &Path, key: &str) -> Result<Self, TransferError> {
        // Validate before joining to prevent directory traversal.
        crate::validate_object_key(key)?;

        let path = root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::File::create(&path).await?;

        Ok(Self {
            path,
            file,
            written: 0,
        })
    }

    /// Writes a chunk at its offset, verifying the checksum if present.
    pub async fn write_chunk(&mut self, chunk: &Chunk) -> Result<(), TransferError> {
        if !chunk.checksum.is_empty() && checksum_bytes(&chunk.data) != chunk.checksum {
            return Err(TransferError::ChecksumMismatch);
        }

        self.file.seek(SeekFrom::Start(chunk.offset)).await?;
        self.file.write_all(&chunk.data).await?;
        self.written = self.written.max(chunk.offset + chunk.data.len() as u64);
        Ok(())
    }

    /// Highest byte offset written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes the object to disk and returns its path.
    pub async fn finish(mut self) -> Result<PathBuf, TransferError> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(self.path)
    }

    /// Drops the partially written object.
    pub async fn discard(self) {
        let Self { path, file, .. } = self;
        drop(file);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::debug!(path = %path.display(), error = %e, "failed to remove partial object");
        }
    }
}
