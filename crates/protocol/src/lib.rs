//! Shared data model for the pixdrop upload pipeline.
//!
//! Types here cross crate boundaries: selected files flow into the preview
//! generator and the upload queue, registrations and receipts come back from
//! the remote collaborators, and [`QueueEvent`]s go out to observers.

pub mod events;
pub mod file;
pub mod ids;
pub mod types;

// Re-export primary types for convenience.
pub use events::QueueEvent;
pub use file::{FileSource, SelectedFile};
pub use ids::{RecordId, SelectionId, SelectionIds};
pub use types::{
    ConfirmedRecord, PreviewArtifact, PreviewBounds, Registration, TargetDescriptor,
    TransferReceipt,
};
