use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{RecordId, SelectionId};

/// Maximum dimensions of a generated preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewBounds {
    pub width: u32,
    pub height: u32,
}

impl Default for PreviewBounds {
    fn default() -> Self {
        Self {
            width: 150,
            height: 150,
        }
    }
}

/// Client-side preview of a selected file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewArtifact {
    pub id: SelectionId,
    pub name: String,
    /// `data:<mime>;base64,...` URL of the bounded image.
    pub encoded_preview: String,
}

/// Where and how to send a file's bytes, as issued by the registrar.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDescriptor {
    pub url: String,
    /// Form parameters the storage endpoint expects alongside the bytes
    /// (for example a signed POST policy).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl TargetDescriptor {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Server-acknowledged record of an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedRecord {
    pub id: RecordId,
    pub client_file: String,
    pub remote_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Selection id of the preview this record supersedes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_correlation_id: Option<SelectionId>,
}

/// Successful registration: the upload target plus the record stub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub target: TargetDescriptor,
    pub record: ConfirmedRecord,
}

/// Result of a completed byte transfer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub bytes_transferred: u64,
    /// Hex SHA-256 of the transferred object, when the endpoint computed one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Refreshed record returned by the endpoint. Wins over the
    /// registration stub when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<ConfirmedRecord>,
}
