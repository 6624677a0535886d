//! Storage endpoint backed by a local directory.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use pixdrop_protocol::{SelectedFile, TargetDescriptor, TransferReceipt};

use crate::chunked::{ChunkReader, ChunkWriter};
use crate::{ProgressReporter, TransferClient, TransferError, TransferFuture};

/// Target field naming the object key under the storage root.
pub const KEY_FIELD: &str = "key";

/// Optional target field carrying the expected hex SHA-256 of the object.
pub const CHECKSUM_FIELD: &str = "sha256";

/// Writes objects under `root/<key>`, where `key` comes from the target
/// descriptor's [`KEY_FIELD`].
#[derive(Debug, Clone)]
pub struct LocalStorageTransfer {
    root: PathBuf,
    chunk_size: usize,
}

impl LocalStorageTransfer {
    /// Creates an endpoint rooted at `root`. A `chunk_size` of 0 selects
    /// [`DEFAULT_CHUNK_SIZE`](crate::DEFAULT_CHUNK_SIZE).
    pub fn new(root: impl Into<PathBuf>, chunk_size: usize) -> Self {
        Self {
            root: root.into(),
            chunk_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn copy_object(
        &self,
        target: &TargetDescriptor,
        file: &SelectedFile,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
        writer: &mut ChunkWriter,
    ) -> Result<TransferReceipt, TransferError> {
        let mut reader = ChunkReader::open(file.source(), self.chunk_size).await?;
        let mut hasher = Sha256::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                next = reader.next_chunk() => next?,
            };
            let Some(chunk) = next else {
                break;
            };

            writer.write_chunk(&chunk).await?;
            hasher.update(&chunk.data);
            progress.report(writer.written());
        }

        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }

        let checksum = hex::encode(hasher.finalize());
        if let Some(expected) = target.field(CHECKSUM_FIELD)
            && !expected.eq_ignore_ascii_case(&checksum)
        {
            return Err(TransferError::ChecksumMismatch);
        }

        // Empty objects never produce a chunk; report completion anyway.
        if writer.written() == 0 {
            progress.report(0);
        }

        Ok(TransferReceipt {
            bytes_transferred: writer.written(),
            checksum: Some(checksum),
            record: None,
        })
    }
}

impl TransferClient for LocalStorageTransfer {
    fn transfer<'a>(
        &'a self,
        target: &'a TargetDescriptor,
        file: &'a SelectedFile,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> TransferFuture<'a> {
        Box::pin(async move {
            let key = target
                .field(KEY_FIELD)
                .ok_or_else(|| TransferError::Rejected("target has no key field".into()))?;

            let mut writer = ChunkWriter::create(&self.root, key).await?;
            match self
                .copy_object(target, file, &progress, &cancel, &mut writer)
                .await
            {
                Ok(receipt) => {
                    let path = writer.finish().await?;
                    debug!(
                        item = %file.id(),
                        path = %path.display(),
                        bytes = receipt.bytes_transferred,
                        "object stored"
                    );
                    Ok(receipt)
                }
                Err(e) => {
                    writer.discard().await;
                    Err(e)
                }
            }
        })
    }
}
