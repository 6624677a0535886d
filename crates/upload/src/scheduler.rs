//! Deterministic upload scheduler.
//!
//! [`QueueState`] owns the ordered queue items and decides every status
//! transition. It performs no I/O: each operation returns the [`Effect`]s
//! the runtime must carry out (start a registration, start or abort a
//! transfer, publish an event). Collaborator results come back in through
//! the `on_*` methods.
//!
//! Per item: `Queued → Registering → Registered → Transferring → Done`,
//! with registration failure and removal taking the item out of the queue
//! and transfer failure parking it as `Failed`.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use pixdrop_protocol::{
    QueueEvent, Registration, SelectedFile, SelectionId, TargetDescriptor, TransferReceipt,
};
use pixdrop_transfer::TransferProgress;

use crate::config::{QueueConfig, TransferFailurePolicy};
use crate::error::QueueError;
use crate::natural::sort_natural_by;

/// Lifecycle status of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemStatus {
    /// Waiting for its turn to register.
    Queued,
    /// Registration request in flight.
    Registering,
    /// Registered, waiting for the transfer slot.
    Registered,
    /// Holding the transfer slot.
    Transferring,
    /// Confirmed; the item leaves the queue in the same step.
    Done,
    /// Transfer failed. Stays until retried or removed.
    Failed,
}

impl ItemStatus {
    pub fn is_transferring(self) -> bool {
        matches!(self, ItemStatus::Transferring)
    }

    /// Still moving through the pipeline.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ItemStatus::Queued
                | ItemStatus::Registering
                | ItemStatus::Registered
                | ItemStatus::Transferring
        )
    }

    /// Holds or awaits a registration without having the slot yet.
    /// Waiting on a collaborator.
    fn is_in_flight(self) -> bool {
        matches!(self, ItemStatus::Registering | ItemStatus::Transferring)
    }

    fn is_registration_pending(self) -> bool {
        matches!(self, ItemStatus::Registering | ItemStatus::Registered)
    }
}

/// Tags one transfer attempt so callbacks from an aborted or superseded
/// attempt can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferTicket {
    pub id: SelectionId,
    pub attempt: u32,
}

impl fmt::Display for TransferTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.id, self.attempt)
    }
}

/// A file travelling through the queue.
#[derive(Debug, Clone)]
pub struct QueueItem {
    file: SelectedFile,
    status: ItemStatus,
    bytes_transferred: u64,
    percent_complete: u8,
    registration: Option<Registration>,
    attempt: u32,
    last_error: Option<String>,
}

impl QueueItem {
    fn new(file: SelectedFile) -> Self {
        Self {
            file,
            status: ItemStatus::Queued,
            bytes_transferred: 0,
            percent_complete: 0,
            registration: None,
            attempt: 0,
            last_error: None,
        }
    }

    pub fn id(&self) -> SelectionId {
        self.file.id()
    }

    pub fn name(&self) -> &str {
        self.file.name()
    }

    pub fn size(&self) -> u64 {
        self.file.size()
    }

    pub fn file(&self) -> &SelectedFile {
        &self.file
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn is_transferring(&self) -> bool {
        self.status.is_transferring()
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    /// Whole percent, 0-100.
    pub fn percent_complete(&self) -> u8 {
        self.percent_complete
    }

    pub fn registration(&self) -> Option<&Registration> {
        self.registration.as_ref()
    }

    /// Number of transfer attempts started so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Error of the last failed transfer, if the item is `Failed`.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn ticket(&self) -> TransferTicket {
        TransferTicket {
            id: self.id(),
            attempt: self.attempt,
        }
    }
}

/// Work the runtime must perform on behalf of the scheduler.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Ask the registrar for a target and record stub.
    Register { id: SelectionId, name: String },
    /// Abandon an in-flight registration.
    AbortRegistration { id: SelectionId },
    /// Start moving the file's bytes. The slot is taken.
    Transfer {
        ticket: TransferTicket,
        target: TargetDescriptor,
        file: SelectedFile,
    },
    /// Cancel a running transfer.
    AbortTransfer { ticket: TransferTicket },
    /// Generate previews for a freshly enqueued batch, in this order.
    GeneratePreviews { files: Vec<SelectedFile> },
    /// Announce a lifecycle event.
    Publish(QueueEvent),
}

/// Ordered queue items plus the scheduling rules that drive them.
#[derive(Debug, Clone)]
pub struct QueueState {
    items: Vec<QueueItem>,
    prefetch_registration: bool,
    failure_policy: TransferFailurePolicy,
}

impl Default for QueueState {
    fn default() -> Self {
        Self::new(&QueueConfig::default())
    }
}

impl QueueState {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            items: Vec::new(),
            prefetch_registration: config.prefetch_registration,
            failure_policy: config.transfer_failure,
        }
    }

    /// Items in queue order.
    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn get(&self, id: SelectionId) -> Option<&QueueItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True while a transfer holds the slot.
    pub fn is_uploading(&self) -> bool {
        self.items.iter().any(QueueItem::is_transferring)
    }

    /// No item is still moving through the pipeline. Failed items do not
    /// count. While halted, items held back by the halt do not count
    /// either; only collaborator calls still in flight do.
    pub fn is_idle(&self) -> bool {
        if self.is_halted() {
            return !self.items.iter().any(|item| item.status.is_in_flight());
        }
        !self.items.iter().any(|item| item.status.is_active())
    }

    /// True when the halt policy is holding the queue on a failed item.
    pub fn is_halted(&self) -> bool {
        self.failure_policy == TransferFailurePolicy::Halt
            && self
                .items
                .iter()
                .any(|item| item.status == ItemStatus::Failed)
    }

    fn position(&self, id: SelectionId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    fn item_mut(&mut self, id: SelectionId) -> Option<&mut QueueItem> {
        self.items.iter_mut().find(|item| item.id() == id)
    }

    /// Appends a batch after the existing items.
    ///
    /// The batch is naturally sorted by name first; ordering never spans
    /// batches. A duplicate id rejects the whole batch.
    pub fn enqueue(&mut self, mut files: Vec<SelectedFile>) -> Result<Vec<Effect>, QueueError> {
        for (i, file) in files.iter().enumerate() {
            let id = file.id();
            if self.get(id).is_some() || files[..i].iter().any(|f| f.id() == id) {
                return Err(QueueError::DuplicateId(id));
            }
        }
        if files.is_empty() {
            return Ok(Vec::new());
        }

        sort_natural_by(&mut files, |f| f.name());
        info!(count = files.len(), "batch enqueued");

        self.items
            .extend(files.iter().cloned().map(QueueItem::new));
        let mut effects = vec![Effect::GeneratePreviews { files }];
        self.reevaluate(&mut effects);
        Ok(effects)
    }

    /// Registration resolved. The item waits in `Registered` until the
    /// slot is free.
    pub fn on_registration_success(
        &mut self,
        id: SelectionId,
        registration: Registration,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        let Some(item) = self.item_mut(id) else {
            debug!(item = %id, "registration resolved for removed item");
            return effects;
        };
        if item.status != ItemStatus::Registering {
            debug!(item = %id, status = ?item.status, "unexpected registration result");
            return effects;
        }

        debug!(item = %id, name = %item.name(), record = %registration.record.id, "registered");
        item.registration = Some(registration);
        item.status = ItemStatus::Registered;
        self.reevaluate(&mut effects);
        effects
    }

    /// Registration failed. The item is dropped and its preview retracted.
    pub fn on_registration_failure(&mut self, id: SelectionId, reason: &str) -> Vec<Effect> {
        let mut effects = Vec::new();
        let Some(index) = self.position(id) else {
            debug!(item = %id, "registration failed for removed item");
            return effects;
        };
        if self.items[index].status != ItemStatus::Registering {
            debug!(item = %id, "unexpected registration failure");
            return effects;
        }

        let item = self.items.remove(index);
        warn!(item = %id, name = %item.name(), error = %reason, "registration failed");
        effects.push(Effect::Publish(QueueEvent::Unavailable {
            id,
            name: item.name().to_string(),
        }));
        self.reevaluate(&mut effects);
        effects
    }

    /// Applies a progress report. Returns whether the item changed.
    ///
    /// Reports are kept monotonic, and reports for a stale ticket or a
    /// finished item are ignored, so a repeated or late 100% is harmless.
    pub fn on_transfer_progress(
        &mut self,
        ticket: TransferTicket,
        progress: TransferProgress,
    ) -> bool {
        let Some(item) = self.item_mut(ticket.id) else {
            return false;
        };
        if item.status != ItemStatus::Transferring || item.attempt != ticket.attempt {
            return false;
        }

        let bytes = item.bytes_transferred.max(progress.bytes_transferred);
        let percent = item.percent_complete.max(progress.percent.min(100));
        let changed = bytes != item.bytes_transferred || percent != item.percent_complete;
        item.bytes_transferred = bytes;
        item.percent_complete = percent;
        changed
    }

    /// Transfer finished. Publishes the confirmed record and frees the slot.
    pub fn on_transfer_complete(
        &mut self,
        ticket: TransferTicket,
        receipt: TransferReceipt,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        let Some(index) = self.current_transfer(ticket) else {
            debug!(ticket = %ticket, "stale transfer completion");
            return effects;
        };

        let mut item = self.items.remove(index);
        item.status = ItemStatus::Done;
        item.bytes_transferred = item.bytes_transferred.max(receipt.bytes_transferred);
        item.percent_complete = 100;

        let stub = item.registration.take().map(|r| r.record);
        match receipt.record.or(stub) {
            Some(mut record) => {
                record.preview_correlation_id = Some(ticket.id);
                info!(
                    item = %ticket.id,
                    name = %item.name(),
                    record = %record.id,
                    bytes = item.bytes_transferred,
                    "upload confirmed"
                );
                effects.push(Effect::Publish(QueueEvent::Confirmed {
                    record,
                    correlation_id: ticket.id,
                }));
            }
            None => {
                error!(item = %ticket.id, name = %item.name(), "transfer completed without a record");
                effects.push(Effect::Publish(QueueEvent::Unavailable {
                    id: ticket.id,
                    name: item.name().to_string(),
                }));
            }
        }
        self.reevaluate(&mut effects);
        effects
    }

    /// Transfer failed. The item is parked as `Failed` and the failure
    /// policy decides whether the queue moves on.
    pub fn on_transfer_failure(&mut self, ticket: TransferTicket, reason: &str) -> Vec<Effect> {
        let mut effects = Vec::new();
        let Some(index) = self.current_transfer(ticket) else {
            debug!(ticket = %ticket, error = %reason, "stale transfer failure");
            return effects;
        };

        let item = &mut self.items[index];
        item.status = ItemStatus::Failed;
        item.last_error = Some(reason.to_string());
        error!(
            item = %ticket.id,
            name = %item.name(),
            attempt = ticket.attempt,
            error = %reason,
            "transfer failed"
        );
        effects.push(Effect::Publish(QueueEvent::TransferFailed {
            id: ticket.id,
            name: item.name().to_string(),
            error: reason.to_string(),
        }));
        self.reevaluate(&mut effects);
        effects
    }

    /// Removes an item wherever it is in the pipeline, aborting its
    /// registration or transfer and retracting its preview.
    pub fn remove(&mut self, id: SelectionId) -> Result<Vec<Effect>, QueueError> {
        let index = self.position(id).ok_or(QueueError::NotFound(id))?;
        let item = self.items.remove(index);

        let mut effects = Vec::new();
        match item.status {
            ItemStatus::Transferring => effects.push(Effect::AbortTransfer {
                ticket: item.ticket(),
            }),
            ItemStatus::Registering => effects.push(Effect::AbortRegistration { id }),
            _ => {}
        }
        info!(item = %id, name = %item.name(), status = ?item.status, "item removed");
        effects.push(Effect::Publish(QueueEvent::Unavailable {
            id,
            name: item.name().to_string(),
        }));
        self.reevaluate(&mut effects);
        Ok(effects)
    }

    /// Puts a failed item back in line for the slot, reusing its
    /// registration.
    pub fn retry(&mut self, id: SelectionId) -> Result<Vec<Effect>, QueueError> {
        let item = self.item_mut(id).ok_or(QueueError::NotFound(id))?;
        if item.status != ItemStatus::Failed || item.registration.is_none() {
            return Err(QueueError::NotRetryable(id));
        }

        item.status = ItemStatus::Registered;
        item.bytes_transferred = 0;
        item.percent_complete = 0;
        item.last_error = None;
        info!(item = %id, name = %item.name(), "retrying transfer");

        let mut effects = Vec::new();
        self.reevaluate(&mut effects);
        Ok(effects)
    }

    fn current_transfer(&self, ticket: TransferTicket) -> Option<usize> {
        self.items.iter().position(|item| {
            item.id() == ticket.id
                && item.status == ItemStatus::Transferring
                && item.attempt == ticket.attempt
        })
    }

    /// Fills the transfer slot and the registration pipeline.
    ///
    /// Only transitions produce effects, so calling this again without a
    /// state change is a no-op.
    fn reevaluate(&mut self, effects: &mut Vec<Effect>) {
        if self.is_halted() {
            return;
        }

        if !self.is_uploading()
            && let Some(item) = self
                .items
                .iter_mut()
                .find(|item| item.status == ItemStatus::Registered)
            && let Some(registration) = &item.registration
        {
            item.status = ItemStatus::Transferring;
            item.attempt += 1;
            item.bytes_transferred = 0;
            item.percent_complete = 0;
            debug!(item = %item.id(), name = %item.name(), attempt = item.attempt, "transfer started");
            effects.push(Effect::Transfer {
                ticket: item.ticket(),
                target: registration.target.clone(),
                file: item.file.clone(),
            });
        }

        let pending = self
            .items
            .iter()
            .any(|item| item.status.is_registration_pending());
        let may_register = !self.is_uploading() || self.prefetch_registration;
        if !pending
            && may_register
            && let Some(item) = self
                .items
                .iter_mut()
                .find(|item| item.status == ItemStatus::Queued)
        {
            item.status = ItemStatus::Registering;
            debug!(item = %item.id(), name = %item.name(), "registration started");
            effects.push(Effect::Register {
                id: item.id(),
                name: item.name().to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pixdrop_protocol::{ConfirmedRecord, RecordId, SelectionIds};

    fn files(ids: &SelectionIds, names: &[&str]) -> Vec<SelectedFile> {
        names
            .iter()
            .map(|name| SelectedFile::from_bytes(ids, *name, vec![0u8; 100]))
            .collect()
    }

    fn registration(name: &str) -> Registration {
        Registration {
            target: TargetDescriptor::new("file://test").with_field("key", name),
            record: ConfirmedRecord {
                id: RecordId::new(format!("rec-{name}")),
                client_file: name.to_string(),
                remote_url: format!("https://cdn.test/{name}"),
                created_at: Utc::now(),
                metadata: serde_json::Map::new(),
                preview_correlation_id: None,
            },
        }
    }

    fn receipt() -> TransferReceipt {
        TransferReceipt {
            bytes_transferred: 100,
            checksum: None,
            record: None,
        }
    }

    fn progress(bytes: u64, percent: u8) -> TransferProgress {
        TransferProgress {
            bytes_transferred: bytes,
            percent,
        }
    }

    fn registered_ids(effects: &[Effect]) -> Vec<SelectionId> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Register { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }

    fn transfer_ticket(effects: &[Effect]) -> Option<TransferTicket> {
        effects.iter().find_map(|e| match e {
            Effect::Transfer { ticket, .. } => Some(*ticket),
            _ => None,
        })
    }

    fn published(effects: &[Effect]) -> Vec<QueueEvent> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Publish(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    fn transferring_count(state: &QueueState) -> usize {
        state.items().iter().filter(|i| i.is_transferring()).count()
    }

    fn id_of(state: &QueueState, name: &str) -> SelectionId {
        state
            .items()
            .iter()
            .find(|i| i.name() == name)
            .map(QueueItem::id)
            .unwrap()
    }

    #[test]
    fn enqueue_sorts_batch_and_requests_previews_in_order() {
        let ids = SelectionIds::new();
        let mut state = QueueState::default();
        let effects = state
            .enqueue(files(&ids, &["b2.png", "b10.png", "b1.png"]))
            .unwrap();

        let Effect::GeneratePreviews { files } = &effects[0] else {
            panic!("expected preview request first, got {effects:?}");
        };
        let names: Vec<&str> = files.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["b1.png", "b2.png", "b10.png"]);

        let queued: Vec<&str> = state.items().iter().map(QueueItem::name).collect();
        assert_eq!(queued, vec!["b1.png", "b2.png", "b10.png"]);

        // Head of the queue registers first.
        assert_eq!(registered_ids(&effects), vec![id_of(&state, "b1.png")]);
        assert_eq!(state.get(id_of(&state, "b1.png")).unwrap().status(), ItemStatus::Registering);
    }

    #[test]
    fn sorting_does_not_span_batches() {
        let ids = SelectionIds::new();
        let mut state = QueueState::default();
        state.enqueue(files(&ids, &["z1.png"])).unwrap();
        state.enqueue(files(&ids, &["a2.png", "a1.png"])).unwrap();

        let names: Vec<&str> = state.items().iter().map(QueueItem::name).collect();
        assert_eq!(names, vec!["z1.png", "a1.png", "a2.png"]);
    }

    #[test]
    fn duplicate_ids_reject_the_whole_batch() {
        let ids = SelectionIds::new();
        let mut state = QueueState::default();
        let batch = files(&ids, &["a.png"]);
        state.enqueue(batch.clone()).unwrap();

        let mut again = files(&ids, &["b.png"]);
        again.push(batch[0].clone());
        assert_eq!(
            state.enqueue(again).unwrap_err(),
            QueueError::DuplicateId(batch[0].id())
        );
        assert_eq!(state.len(), 1);

        let twice = vec![batch[0].clone(), batch[0].clone()];
        let mut fresh = QueueState::default();
        assert!(matches!(fresh.enqueue(twice), Err(QueueError::DuplicateId(_))));
        assert!(fresh.is_empty());
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let mut state = QueueState::default();
        assert!(state.enqueue(Vec::new()).unwrap().is_empty());
        assert!(state.is_idle());
    }

    #[test]
    fn registration_success_starts_transfer_when_slot_free() {
        let ids = SelectionIds::new();
        let mut state = QueueState::default();
        state.enqueue(files(&ids, &["a.png"])).unwrap();
        let a = id_of(&state, "a.png");

        let effects = state.on_registration_success(a, registration("a.png"));
        let ticket = transfer_ticket(&effects).unwrap();
        assert_eq!(ticket, TransferTicket { id: a, attempt: 1 });
        assert!(state.is_uploading());
        assert_eq!(state.get(a).unwrap().status(), ItemStatus::Transferring);
    }

    #[test]
    fn next_registration_overlaps_current_transfer() {
        let ids = SelectionIds::new();
        let mut state = QueueState::default();
        state.enqueue(files(&ids, &["a.png", "b.png", "c.png"])).unwrap();
        let (a, b, c) = (
            id_of(&state, "a.png"),
            id_of(&state, "b.png"),
            id_of(&state, "c.png"),
        );

        let effects = state.on_registration_success(a, registration("a.png"));
        assert!(transfer_ticket(&effects).is_some());
        assert_eq!(registered_ids(&effects), vec![b]);

        // b resolves while a still transfers: it waits.
        let effects = state.on_registration_success(b, registration("b.png"));
        assert!(transfer_ticket(&effects).is_none());
        assert!(registered_ids(&effects).is_empty());
        assert_eq!(state.get(b).unwrap().status(), ItemStatus::Registered);
        assert_eq!(state.get(c).unwrap().status(), ItemStatus::Queued);
        assert_eq!(transferring_count(&state), 1);

        // a finishes: b takes the slot and c starts registering.
        let effects = state.on_transfer_complete(TransferTicket { id: a, attempt: 1 }, receipt());
        assert_eq!(transfer_ticket(&effects).map(|t| t.id), Some(b));
        assert_eq!(registered_ids(&effects), vec![c]);
        assert_eq!(transferring_count(&state), 1);
        assert!(state.get(a).is_none());
    }

    #[test]
    fn without_prefetch_registration_waits_for_the_slot() {
        let ids = SelectionIds::new();
        let config = QueueConfig {
            prefetch_registration: false,
            ..QueueConfig::default()
        };
        let mut state = QueueState::new(&config);
        state.enqueue(files(&ids, &["a.png", "b.png"])).unwrap();
        let (a, b) = (id_of(&state, "a.png"), id_of(&state, "b.png"));

        let effects = state.on_registration_success(a, registration("a.png"));
        assert!(registered_ids(&effects).is_empty());
        assert_eq!(state.get(b).unwrap().status(), ItemStatus::Queued);

        let effects = state.on_transfer_complete(TransferTicket { id: a, attempt: 1 }, receipt());
        assert_eq!(registered_ids(&effects), vec![b]);
    }

    #[test]
    fn at_most_one_transfer_under_any_interleaving() {
        let ids = SelectionIds::new();
        let mut state = QueueState::default();
        state
            .enqueue(files(&ids, &["1.png", "2.png", "3.png", "4.png"]))
            .unwrap();

        let mut done = 0;
        while done < 4 {
            assert!(transferring_count(&state) <= 1);
            let registering: Vec<SelectionId> = state
                .items()
                .iter()
                .filter(|i| i.status() == ItemStatus::Registering)
                .map(QueueItem::id)
                .collect();
            for id in registering {
                let name = state.get(id).unwrap().name().to_string();
                state.on_registration_success(id, registration(&name));
                assert!(transferring_count(&state) <= 1);
            }
            let current = state
                .items()
                .iter()
                .find(|i| i.is_transferring())
                .map(QueueItem::ticket);
            if let Some(ticket) = current {
                state.on_transfer_progress(ticket, progress(50, 50));
                state.on_transfer_complete(ticket, receipt());
                done += 1;
            }
        }
        assert!(state.is_empty());
        assert!(state.is_idle());
    }

    #[test]
    fn registration_failure_removes_item_and_publishes_once() {
        let ids = SelectionIds::new();
        let mut state = QueueState::default();
        state.enqueue(files(&ids, &["a.png", "b.png"])).unwrap();
        let (a, b) = (id_of(&state, "a.png"), id_of(&state, "b.png"));

        let effects = state.on_registration_failure(a, "quota exceeded");
        assert_eq!(
            published(&effects),
            vec![QueueEvent::Unavailable {
                id: a,
                name: "a.png".into()
            }]
        );
        assert!(transfer_ticket(&effects).is_none());
        assert_eq!(registered_ids(&effects), vec![b]);
        assert!(state.get(a).is_none());

        // A duplicate failure callback does nothing.
        assert!(state.on_registration_failure(a, "quota exceeded").is_empty());
    }

    #[test]
    fn progress_is_monotonic_and_late_reports_are_ignored() {
        let ids = SelectionIds::new();
        let mut state = QueueState::default();
        state.enqueue(files(&ids, &["a.png"])).unwrap();
        let a = id_of(&state, "a.png");
        let ticket = transfer_ticket(&state.on_registration_success(a, registration("a.png"))).unwrap();

        assert!(state.on_transfer_progress(ticket, progress(40, 40)));
        assert!(!state.on_transfer_progress(ticket, progress(20, 20)));
        assert_eq!(state.get(a).unwrap().percent_complete(), 40);
        assert!(state.on_transfer_progress(ticket, progress(100, 100)));
        assert!(!state.on_transfer_progress(ticket, progress(100, 100)));

        let effects = state.on_transfer_complete(ticket, receipt());
        assert_eq!(published(&effects).len(), 1);

        // A trailing 100% and a duplicate completion are no-ops.
        assert!(!state.on_transfer_progress(ticket, progress(100, 100)));
        assert!(state.on_transfer_complete(ticket, receipt()).is_empty());
    }

    #[test]
    fn completion_publishes_confirmed_with_correlation_id() {
        let ids = SelectionIds::new();
        let mut state = QueueState::default();
        state.enqueue(files(&ids, &["a.png"])).unwrap();
        let a = id_of(&state, "a.png");
        let ticket = transfer_ticket(&state.on_registration_success(a, registration("a.png"))).unwrap();

        let effects = state.on_transfer_complete(ticket, receipt());
        let events = published(&effects);
        let [QueueEvent::Confirmed { record, correlation_id }] = events.as_slice() else {
            panic!("expected one confirmed event, got {effects:?}");
        };
        assert_eq!(*correlation_id, a);
        assert_eq!(record.preview_correlation_id, Some(a));
        assert_eq!(record.id.as_str(), "rec-a.png");
        assert!(state.is_idle());
    }

    #[test]
    fn receipt_record_wins_over_stub() {
        let ids = SelectionIds::new();
        let mut state = QueueState::default();
        state.enqueue(files(&ids, &["a.png"])).unwrap();
        let a = id_of(&state, "a.png");
        let ticket = transfer_ticket(&state.on_registration_success(a, registration("a.png"))).unwrap();

        let mut fresh = registration("a.png").record;
        fresh.remote_url = "https://cdn.test/final/a.png".into();
        let effects = state.on_transfer_complete(
            ticket,
            TransferReceipt {
                bytes_transferred: 100,
                checksum: None,
                record: Some(fresh),
            },
        );
        let events = published(&effects);
        let [QueueEvent::Confirmed { record, .. }] = events.as_slice() else {
            panic!("expected confirmed event");
        };
        assert_eq!(record.remote_url, "https://cdn.test/final/a.png");
        assert_eq!(record.preview_correlation_id, Some(a));
    }

    #[test]
    fn removing_a_transferring_item_aborts_and_frees_the_slot() {
        let ids = SelectionIds::new();
        let mut state = QueueState::default();
        state.enqueue(files(&ids, &["a.png", "b.png"])).unwrap();
        let (a, b) = (id_of(&state, "a.png"), id_of(&state, "b.png"));
        let ticket = transfer_ticket(&state.on_registration_success(a, registration("a.png"))).unwrap();
        state.on_registration_success(b, registration("b.png"));

        let effects = state.remove(a).unwrap();
        assert!(matches!(effects[0], Effect::AbortTransfer { ticket: t } if t == ticket));
        assert_eq!(
            published(&effects),
            vec![QueueEvent::Unavailable {
                id: a,
                name: "a.png".into()
            }]
        );
        assert_eq!(transfer_ticket(&effects).map(|t| t.id), Some(b));

        // Late callbacks for the aborted transfer change nothing.
        assert!(!state.on_transfer_progress(ticket, progress(100, 100)));
        assert!(state.on_transfer_complete(ticket, receipt()).is_empty());
        assert!(state.on_transfer_failure(ticket, "cancelled").is_empty());
        assert_eq!(transferring_count(&state), 1);
    }

    #[test]
    fn removing_a_registering_item_aborts_registration() {
        let ids = SelectionIds::new();
        let mut state = QueueState::default();
        state.enqueue(files(&ids, &["a.png", "b.png"])).unwrap();
        let (a, b) = (id_of(&state, "a.png"), id_of(&state, "b.png"));

        let effects = state.remove(a).unwrap();
        assert!(matches!(effects[0], Effect::AbortRegistration { id } if id == a));
        assert_eq!(registered_ids(&effects), vec![b]);

        // The aborted registration resolving late is ignored.
        assert!(state.on_registration_success(a, registration("a.png")).is_empty());
        assert!(matches!(state.remove(a), Err(QueueError::NotFound(_))));
    }

    #[test]
    fn removing_a_queued_item_only_retracts() {
        let ids = SelectionIds::new();
        let mut state = QueueState::default();
        state.enqueue(files(&ids, &["a.png", "b.png"])).unwrap();
        let b = id_of(&state, "b.png");

        let effects = state.remove(b).unwrap();
        assert_eq!(effects.len(), 1);
        assert!(matches!(effects[0], Effect::Publish(QueueEvent::Unavailable { .. })));
    }

    #[test]
    fn transfer_failure_parks_item_and_continues_by_default() {
        let ids = SelectionIds::new();
        let mut state = QueueState::default();
        state.enqueue(files(&ids, &["a.png", "b.png"])).unwrap();
        let (a, b) = (id_of(&state, "a.png"), id_of(&state, "b.png"));
        let ticket = transfer_ticket(&state.on_registration_success(a, registration("a.png"))).unwrap();
        state.on_registration_success(b, registration("b.png"));

        let effects = state.on_transfer_failure(ticket, "connection reset");
        assert_eq!(
            published(&effects),
            vec![QueueEvent::TransferFailed {
                id: a,
                name: "a.png".into(),
                error: "connection reset".into()
            }]
        );
        assert_eq!(transfer_ticket(&effects).map(|t| t.id), Some(b));

        let failed = state.get(a).unwrap();
        assert_eq!(failed.status(), ItemStatus::Failed);
        assert_eq!(failed.last_error(), Some("connection reset"));
    }

    #[test]
    fn halt_policy_blocks_until_failed_item_is_removed() {
        let ids = SelectionIds::new();
        let config = QueueConfig {
            transfer_failure: TransferFailurePolicy::Halt,
            ..QueueConfig::default()
        };
        let mut state = QueueState::new(&config);
        state.enqueue(files(&ids, &["a.png", "b.png", "c.png"])).unwrap();
        let (a, b, c) = (
            id_of(&state, "a.png"),
            id_of(&state, "b.png"),
            id_of(&state, "c.png"),
        );
        let ticket = transfer_ticket(&state.on_registration_success(a, registration("a.png"))).unwrap();

        let effects = state.on_transfer_failure(ticket, "disk full");
        assert!(state.is_halted());
        assert!(transfer_ticket(&effects).is_none());
        assert!(!state.is_idle(), "registration of b is still in flight");

        // The in-flight registration may still land, but nothing starts.
        let effects = state.on_registration_success(b, registration("b.png"));
        assert!(effects.is_empty());
        assert!(state.is_idle());
        assert_eq!(state.get(b).unwrap().status(), ItemStatus::Registered);
        assert_eq!(state.get(c).unwrap().status(), ItemStatus::Queued);

        let effects = state.remove(a).unwrap();
        assert!(!state.is_halted());
        assert_eq!(transfer_ticket(&effects).map(|t| t.id), Some(b));
        assert_eq!(registered_ids(&effects), vec![c]);
    }

    #[test]
    fn retry_reuses_registration_with_a_new_attempt() {
        let ids = SelectionIds::new();
        let mut state = QueueState::default();
        state.enqueue(files(&ids, &["a.png"])).unwrap();
        let a = id_of(&state, "a.png");
        let first = transfer_ticket(&state.on_registration_success(a, registration("a.png"))).unwrap();
        state.on_transfer_progress(first, progress(60, 60));
        state.on_transfer_failure(first, "timeout");
        assert!(state.is_idle());

        let effects = state.retry(a).unwrap();
        let second = transfer_ticket(&effects).unwrap();
        assert_eq!(second, TransferTicket { id: a, attempt: 2 });
        assert!(registered_ids(&effects).is_empty());
        assert_eq!(state.get(a).unwrap().percent_complete(), 0);
        assert_eq!(state.get(a).unwrap().last_error(), None);

        // Reports from the first attempt no longer apply.
        assert!(!state.on_transfer_progress(first, progress(90, 90)));
        assert!(state.on_transfer_complete(first, receipt()).is_empty());
        assert_eq!(published(&state.on_transfer_complete(second, receipt())).len(), 1);
    }

    #[test]
    fn only_failed_items_can_be_retried() {
        let ids = SelectionIds::new();
        let mut state = QueueState::default();
        state.enqueue(files(&ids, &["a.png"])).unwrap();
        let a = id_of(&state, "a.png");

        assert_eq!(state.retry(a).unwrap_err(), QueueError::NotRetryable(a));
        assert_eq!(
            state.retry(SelectionId::from_raw(999)).unwrap_err(),
            QueueError::NotFound(SelectionId::from_raw(999))
        );
    }

    #[test]
    fn derived_flags_follow_status() {
        assert!(ItemStatus::Transferring.is_transferring());
        assert!(!ItemStatus::Registered.is_transferring());
        assert!(ItemStatus::Queued.is_active());
        assert!(!ItemStatus::Failed.is_active());
        assert!(!ItemStatus::Done.is_active());
    }
}
