//! Queue configuration.

use serde::{Deserialize, Serialize};

use pixdrop_preview::PreviewFormat;
use pixdrop_protocol::PreviewBounds;

/// What the queue does after a transfer fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferFailurePolicy {
    /// Park the failed item and keep uploading the rest.
    #[default]
    Continue,
    /// Stop starting registrations and transfers until the failed item is
    /// retried or removed.
    Halt,
}

/// Upload queue settings. Every field has a default, so partial config
/// tables deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub preview_format: PreviewFormat,
    /// Register the next file while the current one transfers.
    pub prefetch_registration: bool,
    pub transfer_failure: TransferFailurePolicy,
    pub preview_bounds: PreviewBounds,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            preview_format: PreviewFormat::default(),
            prefetch_registration: true,
            transfer_failure: TransferFailurePolicy::default(),
            preview_bounds: PreviewBounds::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config: QueueConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, QueueConfig::default());
        assert!(config.prefetch_registration);
        assert_eq!(config.preview_bounds.width, 150);
        assert_eq!(config.transfer_failure, TransferFailurePolicy::Continue);
    }

    #[test]
    fn partial_object_overrides_fields() {
        let config: QueueConfig =
            serde_json::from_str(r#"{"transfer_failure":"halt","preview_format":"jpeg"}"#)
                .unwrap();
        assert_eq!(config.transfer_failure, TransferFailurePolicy::Halt);
        assert_eq!(config.preview_format, PreviewFormat::Jpeg);
        assert!(config.prefetch_registration);
    }
}
