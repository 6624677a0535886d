//! Client-side preview generation for selected files.
//!
//! A preview is produced in two phases, decode-and-load followed by
//! resize-to-bounds, and is only ready once both have finished. Dropping
//! the returned future abandons the work; decode buffers live inside the
//! phase closures and are released whichever way they exit.

mod raster;

use std::future::Future;
use std::pin::Pin;

use pixdrop_protocol::{PreviewArtifact, PreviewBounds, SelectedFile};

pub use raster::{ImagePreviewGenerator, PreviewFormat, fit_within};

/// Errors produced while generating a preview.
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("invalid preview bounds {}x{}", .0.width, .0.height)]
    InvalidBounds(PreviewBounds),

    #[error("preview task failed: {0}")]
    Task(String),
}

/// Future returned by [`PreviewGenerator::generate`].
pub type PreviewFuture<'a> =
    Pin<Box<dyn Future<Output = Result<PreviewArtifact, PreviewError>> + Send + 'a>>;

/// Produces a bounded-size visual preview of a selected file.
///
/// Must be callable many times concurrently.
pub trait PreviewGenerator: Send + Sync {
    fn generate<'a>(&'a self, file: &'a SelectedFile, bounds: PreviewBounds) -> PreviewFuture<'a>;
}
