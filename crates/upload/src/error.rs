//! Upload queue error types.

use pixdrop_protocol::SelectionId;

/// Errors returned by queue operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("selection {0} is already queued")]
    DuplicateId(SelectionId),

    #[error("selection {0} is not in the queue")]
    NotFound(SelectionId),

    #[error("selection {0} has not failed and cannot be retried")]
    NotRetryable(SelectionId),

    #[error("upload queue is shut down")]
    Closed,
}
