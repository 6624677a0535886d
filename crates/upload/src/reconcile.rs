//! Preview relevance tracking.
//!
//! A preview and the confirmed record for the same selection race each
//! other. The [`Reconciler`] remembers which selections have settled, so a
//! preview that resolves after its record was confirmed (or after the
//! selection was invalidated) is suppressed instead of announced.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use pixdrop_protocol::{PreviewArtifact, QueueEvent, SelectionId};

/// How a selection settled before its preview resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Confirmed,
    Invalidated,
}

/// Relevance check between previews and published lifecycle events.
#[derive(Debug, Default)]
pub struct Reconciler {
    awaiting: HashSet<SelectionId>,
    settled: HashMap<SelectionId, Settlement>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that previews were requested for these selections.
    pub fn expect_previews(&mut self, ids: impl IntoIterator<Item = SelectionId>) {
        self.awaiting.extend(ids);
    }

    /// Notes an event about to be published. Only selections still
    /// awaiting a preview are remembered.
    pub fn observe(&mut self, event: &QueueEvent) {
        let settlement = match event {
            QueueEvent::Confirmed { .. } => Settlement::Confirmed,
            QueueEvent::Unavailable { .. } => Settlement::Invalidated,
            QueueEvent::Available { .. } | QueueEvent::TransferFailed { .. } => return,
        };
        let id = event.selection_id();
        if self.awaiting.contains(&id) {
            // First settlement wins.
            self.settled.entry(id).or_insert(settlement);
        }
    }

    /// Runs the relevance check for a resolved preview. Returns the
    /// `available` event to publish, or `None` when the selection already
    /// settled.
    pub fn admit(&mut self, preview: PreviewArtifact) -> Option<QueueEvent> {
        let id = preview.id;
        self.awaiting.remove(&id);
        match self.settled.remove(&id) {
            Some(settlement) => {
                debug!(item = %id, ?settlement, "preview superseded");
                None
            }
            None => Some(QueueEvent::Available { preview }),
        }
    }

    /// Forgets a selection whose preview will never arrive.
    pub fn abandon(&mut self, id: SelectionId) {
        self.awaiting.remove(&id);
        self.settled.remove(&id);
    }

    /// Number of previews still outstanding.
    pub fn pending(&self) -> usize {
        self.awaiting.len()
    }

    pub fn settlement(&self, id: SelectionId) -> Option<Settlement> {
        self.settled.get(&id).copied()
    }
}
