//! Read-only projection of the queue for presentation.

use serde::Serialize;

use pixdrop_protocol::SelectionId;

use crate::scheduler::{ItemStatus, QueueItem, QueueState};

/// One row of the queue as a UI shows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItemView {
    pub id: SelectionId,
    pub name: String,
    pub size: u64,
    pub bytes_transferred: u64,
    pub percent_complete: u8,
    pub status: ItemStatus,
    pub is_transferring: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&QueueItem> for QueueItemView {
    fn from(item: &QueueItem) -> Self {
        Self {
            id: item.id(),
            name: item.name().to_string(),
            size: item.size(),
            bytes_transferred: item.bytes_transferred(),
            percent_complete: item.percent_complete(),
            status: item.status(),
            is_transferring: item.is_transferring(),
            error: item.last_error().map(str::to_string),
        }
    }
}

/// Snapshot of the whole queue, in queue order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueView {
    items: Vec<QueueItemView>,
}

impl QueueView {
    /// Rebuilds the view after the queue's composition changed.
    pub fn rebuild(state: &QueueState) -> Self {
        Self {
            items: state.items().iter().map(QueueItemView::from).collect(),
        }
    }

    /// Patches a single row in place. Returns whether anything changed.
    pub fn patch(&mut self, item: &QueueItem) -> bool {
        let Some(row) = self.items.iter_mut().find(|row| row.id == item.id()) else {
            return false;
        };
        let next = QueueItemView::from(item);
        if *row == next {
            return false;
        }
        *row = next;
        true
    }

    pub fn items(&self) -> &[QueueItemView] {
        &self.items
    }

    pub fn get(&self, id: SelectionId) -> Option<&QueueItemView> {
        self.items.iter().find(|row| row.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True while any item holds the transfer slot.
    pub fn is_uploading(&self) -> bool {
        self.items.iter().any(|row| row.is_transferring)
    }
}
