//! Byte transfer to storage endpoints with chunking, progress and abort.
//!
//! The upload queue only talks to the [`TransferClient`] trait; concrete
//! endpoints (the local directory store here, an object store elsewhere)
//! plug in behind it.

mod chunked;
mod local;
mod progress;
mod validation;

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use pixdrop_protocol::{SelectedFile, TargetDescriptor, TransferReceipt};

pub use chunked::{Chunk, ChunkReader, ChunkWriter, checksum_bytes};
pub use local::{CHECKSUM_FIELD, KEY_FIELD, LocalStorageTransfer};
pub use progress::{ProgressCallback, ProgressReporter, TransferProgress, percent_of};
pub use validation::validate_object_key;

/// Default chunk size: 256 KiB.
///
/// Small enough that previews-sized images still report several progress
/// steps.
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("rejected by storage endpoint: {0}")]
    Rejected(String),

    #[error("cancelled")]
    Cancelled,
}

/// Future returned by [`TransferClient::transfer`].
pub type TransferFuture<'a> =
    Pin<Box<dyn Future<Output = Result<TransferReceipt, TransferError>> + Send + 'a>>;

/// Moves a file's bytes to the storage endpoint named by a target descriptor.
///
/// Implementations report cumulative progress through `progress` and must
/// stop promptly with [`TransferError::Cancelled`] once `cancel` fires.
pub trait TransferClient: Send + Sync {
    fn transfer<'a>(
        &'a self,
        target: &'a TargetDescriptor,
        file: &'a SelectedFile,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> TransferFuture<'a>;
}
