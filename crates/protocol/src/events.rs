//! Lifecycle events announced to observers of the upload pipeline.

use serde::{Deserialize, Serialize};

use crate::ids::SelectionId;
use crate::types::{ConfirmedRecord, PreviewArtifact};

/// A lifecycle transition, delivered once per subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum QueueEvent {
    /// A local preview is ready to show.
    Available { preview: PreviewArtifact },
    /// The selection will never be confirmed; retract any preview.
    Unavailable { id: SelectionId, name: String },
    /// The record is saved and its bytes are stored.
    #[serde(rename_all = "camelCase")]
    Confirmed {
        record: ConfirmedRecord,
        correlation_id: SelectionId,
    },
    /// The byte transfer failed after the record was registered.
    TransferFailed {
        id: SelectionId,
        name: String,
        error: String,
    },
}

impl QueueEvent {
    /// Selection id the event refers to.
    pub fn selection_id(&self) -> SelectionId {
        match self {
            QueueEvent::Available { preview } => preview.id,
            QueueEvent::Unavailable { id, .. } | QueueEvent::TransferFailed { id, .. } => *id,
            QueueEvent::Confirmed { correlation_id, .. } => *correlation_id,
        }
    }
}
