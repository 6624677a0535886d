//! Consumer-side view of uploads: previews that turn into records.
//!
//! The gallery listens to the event bus and keeps one entry per logical
//! item. A confirmed record replaces its preview in place, so the entry
//! keeps its position and image while the final metadata takes over.

use serde::Serialize;

use pixdrop_protocol::{ConfirmedRecord, PreviewArtifact, QueueEvent, RecordId, SelectionId};

/// Where an entry stands.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EntryState {
    /// Local preview only; upload still in progress.
    Preview,
    /// Transfer failed; the preview stays until retried or removed.
    Failed { error: String },
    /// Server-confirmed record.
    Confirmed { record: ConfirmedRecord },
}

/// One item in the gallery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryEntry {
    /// Selection id linking a preview to its record. `None` for records
    /// loaded without one.
    pub correlation_id: Option<SelectionId>,
    pub name: String,
    /// Preview data URL, or the remote URL for records that never had a
    /// local preview.
    pub image_url: String,
    pub state: EntryState,
}

impl GalleryEntry {
    fn from_preview(preview: PreviewArtifact) -> Self {
        Self {
            correlation_id: Some(preview.id),
            name: preview.name,
            image_url: preview.encoded_preview,
            state: EntryState::Preview,
        }
    }

    fn from_record(record: ConfirmedRecord) -> Self {
        Self {
            correlation_id: record.preview_correlation_id,
            name: record.client_file.clone(),
            image_url: record.remote_url.clone(),
            state: EntryState::Confirmed { record },
        }
    }

    pub fn is_preview(&self) -> bool {
        !self.is_confirmed()
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self.state, EntryState::Confirmed { .. })
    }

    pub fn record(&self) -> Option<&ConfirmedRecord> {
        match &self.state {
            EntryState::Confirmed { record } => Some(record),
            _ => None,
        }
    }
}

/// What applying an event did to the gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryChange {
    Added(usize),
    Replaced(usize),
    Updated(usize),
    Removed(usize),
    Unchanged,
}

/// Ordered preview and record entries.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the gallery with previously confirmed records.
    pub fn from_records(records: impl IntoIterator<Item = ConfirmedRecord>) -> Self {
        Self {
            entries: records.into_iter().map(GalleryEntry::from_record).collect(),
        }
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, correlation_id: SelectionId) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.correlation_id == Some(correlation_id))
    }

    pub fn find(&self, correlation_id: SelectionId) -> Option<&GalleryEntry> {
        self.position(correlation_id).map(|i| &self.entries[i])
    }

    /// Applies one bus event.
    pub fn apply(&mut self, event: QueueEvent) -> GalleryChange {
        match event {
            QueueEvent::Available { preview } => {
                if self.position(preview.id).is_some() {
                    return GalleryChange::Unchanged;
                }
                self.entries.push(GalleryEntry::from_preview(preview));
                GalleryChange::Added(self.entries.len() - 1)
            }
            QueueEvent::Confirmed {
                record,
                correlation_id,
            } => {
                if self
                    .entries
                    .iter()
                    .any(|e| e.record().is_some_and(|r| r.id == record.id))
                {
                    return GalleryChange::Unchanged;
                }
                match self.position(correlation_id) {
                    Some(index) => {
                        let entry = &mut self.entries[index];
                        entry.correlation_id = Some(correlation_id);
                        entry.name = record.client_file.clone();
                        entry.state = EntryState::Confirmed { record };
                        GalleryChange::Replaced(index)
                    }
                    None => {
                        let mut entry = GalleryEntry::from_record(record);
                        entry.correlation_id = Some(correlation_id);
                        self.entries.push(entry);
                        GalleryChange::Added(self.entries.len() - 1)
                    }
                }
            }
            QueueEvent::Unavailable { id, .. } => match self.position(id) {
                Some(index) if self.entries[index].is_preview() => {
                    self.entries.remove(index);
                    GalleryChange::Removed(index)
                }
                _ => GalleryChange::Unchanged,
            },
            QueueEvent::TransferFailed { id, error, .. } => match self.position(id) {
                Some(index) if self.entries[index].is_preview() => {
                    self.entries[index].state = EntryState::Failed { error };
                    GalleryChange::Updated(index)
                }
                _ => GalleryChange::Unchanged,
            },
        }
    }

    /// Removes a confirmed record locally.
    pub fn remove_record(&mut self, id: &RecordId) -> Option<GalleryEntry> {
        let index = self
            .entries
            .iter()
            .position(|e| e.record().is_some_and(|r| &r.id == id))?;
        Some(self.entries.remove(index))
    }
}
