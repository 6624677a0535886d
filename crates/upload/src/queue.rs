//! Async runtime for the upload scheduler.
//!
//! [`UploadQueue`] is a handle to a single actor task. The task owns the
//! [`QueueState`], runs its effects against the collaborators, and feeds
//! their results back in as commands, one at a time. Previews, view
//! updates and lifecycle events fan out from the same task, so observers
//! always see transitions in the order the scheduler made them.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pixdrop_preview::{PreviewError, PreviewGenerator};
use pixdrop_protocol::{
    PreviewArtifact, PreviewBounds, Registration, SelectedFile, SelectionId, TargetDescriptor,
    TransferReceipt,
};
use pixdrop_transfer::{ProgressReporter, TransferClient, TransferError, TransferProgress};

use crate::bus::{EventBus, Subscription};
use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::reconcile::Reconciler;
use crate::registrar::{RegistrationError, RemoteRegistrar};
use crate::scheduler::{Effect, QueueState, TransferTicket};
use crate::view::QueueView;

/// External services the queue drives.
#[derive(Clone)]
pub struct Collaborators {
    pub registrar: Arc<dyn RemoteRegistrar>,
    pub transfer: Arc<dyn TransferClient>,
    pub preview: Arc<dyn PreviewGenerator>,
}

type Reply<T> = oneshot::Sender<Result<T, QueueError>>;

enum Command {
    Enqueue {
        files: Vec<SelectedFile>,
        reply: Reply<()>,
    },
    Remove {
        id: SelectionId,
        reply: Reply<()>,
    },
    Retry {
        id: SelectionId,
        reply: Reply<()>,
    },
    Registered {
        id: SelectionId,
        result: Result<Registration, RegistrationError>,
    },
    Progress {
        ticket: TransferTicket,
        progress: TransferProgress,
    },
    Transferred {
        ticket: TransferTicket,
        result: Result<TransferReceipt, TransferError>,
    },
    Previewed {
        id: SelectionId,
        result: Result<PreviewArtifact, PreviewError>,
    },
    PreviewsAbandoned {
        ids: Vec<SelectionId>,
    },
}

/// Previews a batch task still owes. Whatever is left when the task ends,
/// by cancellation or by a panicking generator, is reported as abandoned.
struct OwedPreviews {
    ids: VecDeque<SelectionId>,
    commands: mpsc::UnboundedSender<Command>,
}

impl OwedPreviews {
    fn settle(&mut self, id: SelectionId) {
        if self.ids.front() == Some(&id) {
            self.ids.pop_front();
        } else {
            self.ids.retain(|owed| *owed != id);
        }
    }
}

impl Drop for OwedPreviews {
    fn drop(&mut self) {
        if self.ids.is_empty() {
            return;
        }
        let ids = self.ids.drain(..).collect();
        let _ = self.commands.send(Command::PreviewsAbandoned { ids });
    }
}

/// Handle to a running upload queue.
///
/// Dropping the handle stops the queue; [`shutdown`](Self::shutdown) does
/// the same and waits for the task to finish.
pub struct UploadQueue {
    commands: mpsc::UnboundedSender<Command>,
    bus: EventBus,
    view: watch::Receiver<QueueView>,
    idle: watch::Receiver<bool>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl UploadQueue {
    /// Starts the queue task. Must be called inside a tokio runtime.
    pub fn spawn(config: QueueConfig, collaborators: Collaborators, bus: EventBus) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (view_tx, view) = watch::channel(QueueView::default());
        let (idle_tx, idle) = watch::channel(true);
        let cancel = CancellationToken::new();

        let engine = Engine {
            state: QueueState::new(&config),
            reconciler: Reconciler::new(),
            collaborators,
            bounds: config.preview_bounds,
            bus: bus.clone(),
            view_tx,
            idle_tx,
            commands: commands.clone(),
            cancel: cancel.clone(),
            registrations: HashMap::new(),
            transfers: HashMap::new(),
        };
        let task = tokio::spawn(engine.run(rx));

        Self {
            commands,
            bus,
            view,
            idle,
            cancel,
            task: Some(task),
        }
    }

    async fn request(
        &self,
        make: impl FnOnce(Reply<()>) -> Command,
    ) -> Result<(), QueueError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .map_err(|_| QueueError::Closed)?;
        rx.await.map_err(|_| QueueError::Closed)?
    }

    /// Adds a batch of files. The batch is naturally sorted by name and
    /// appended after the items already queued.
    pub async fn enqueue(&self, files: Vec<SelectedFile>) -> Result<(), QueueError> {
        self.request(|reply| Command::Enqueue { files, reply }).await
    }

    /// Cancels an item wherever it is in the pipeline.
    pub async fn remove(&self, id: SelectionId) -> Result<(), QueueError> {
        self.request(|reply| Command::Remove { id, reply }).await
    }

    /// Retries the transfer of a failed item with its existing
    /// registration.
    pub async fn retry(&self, id: SelectionId) -> Result<(), QueueError> {
        self.request(|reply| Command::Retry { id, reply }).await
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    /// Receiver that observes every view change.
    pub fn view(&self) -> watch::Receiver<QueueView> {
        self.view.clone()
    }

    /// Current view.
    pub fn snapshot(&self) -> QueueView {
        self.view.borrow().clone()
    }

    /// Waits until no item is moving through the pipeline and every
    /// requested preview has resolved.
    pub async fn wait_idle(&self) -> Result<(), QueueError> {
        let mut idle = self.idle.clone();
        idle.wait_for(|is_idle| *is_idle)
            .await
            .map(|_| ())
            .map_err(|_| QueueError::Closed)
    }

    /// Stops the queue, aborting in-flight work, and waits for the task.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "upload queue task failed");
        }
    }
}

impl Drop for UploadQueue {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Engine {
    state: QueueState,
    reconciler: Reconciler,
    collaborators: Collaborators,
    bounds: PreviewBounds,
    bus: EventBus,
    view_tx: watch::Sender<QueueView>,
    idle_tx: watch::Sender<bool>,
    commands: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
    registrations: HashMap<SelectionId, AbortHandle>,
    transfers: HashMap<SelectionId, (TransferTicket, CancellationToken)>,
}

impl Engine {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        debug!("upload queue started");
        loop {
            let command = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                command = rx.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };
            self.handle(command);
        }
        self.teardown();
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Enqueue { files, reply } => {
                let result = self.state.enqueue(files);
                let result = self.execute_result(result);
                let _ = reply.send(result);
            }
            Command::Remove { id, reply } => {
                let result = self.state.remove(id);
                let result = self.execute_result(result);
                let _ = reply.send(result);
            }
            Command::Retry { id, reply } => {
                let result = self.state.retry(id);
                let result = self.execute_result(result);
                let _ = reply.send(result);
            }
            Command::Registered { id, result } => {
                self.registrations.remove(&id);
                let effects = match result {
                    Ok(registration) => self.state.on_registration_success(id, registration),
                    Err(e) => self.state.on_registration_failure(id, &e.to_string()),
                };
                self.execute(effects);
                self.refresh();
            }
            Command::Progress { ticket, progress } => {
                if self.state.on_transfer_progress(ticket, progress)
                    && let Some(item) = self.state.get(ticket.id)
                {
                    self.view_tx.send_if_modified(|view| view.patch(item));
                }
            }
            Command::Transferred { ticket, result } => {
                if self
                    .transfers
                    .get(&ticket.id)
                    .is_some_and(|(current, _)| *current == ticket)
                {
                    self.transfers.remove(&ticket.id);
                }
                let effects = match result {
                    Ok(receipt) => self.state.on_transfer_complete(ticket, receipt),
                    Err(e) => self.state.on_transfer_failure(ticket, &e.to_string()),
                };
                self.execute(effects);
                self.refresh();
            }
            Command::Previewed { id, result } => {
                match result {
                    Ok(preview) => {
                        if let Some(event) = self.reconciler.admit(preview) {
                            self.bus.publish(event);
                        }
                    }
                    Err(e) => {
                        warn!(item = %id, error = %e, "preview generation failed");
                        self.reconciler.abandon(id);
                    }
                }
                self.refresh_idle();
            }
            Command::PreviewsAbandoned { ids } => {
                for id in ids {
                    warn!(item = %id, "preview abandoned");
                    self.reconciler.abandon(id);
                }
                self.refresh_idle();
            }
        }
    }

    /// Runs the effects of a fallible operation. The view is refreshed
    /// before the caller hears back.
    fn execute_result(&mut self, result: Result<Vec<Effect>, QueueError>) -> Result<(), QueueError> {
        let effects = result?;
        self.execute(effects);
        self.refresh();
        Ok(())
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Register { id, name } => self.start_registration(id, name),
                Effect::AbortRegistration { id } => {
                    if let Some(handle) = self.registrations.remove(&id) {
                        handle.abort();
                        debug!(item = %id, "registration aborted");
                    }
                }
                Effect::Transfer {
                    ticket,
                    target,
                    file,
                } => self.start_transfer(ticket, target, file),
                Effect::AbortTransfer { ticket } => {
                    if let Some((_, token)) = self.transfers.remove(&ticket.id) {
                        token.cancel();
                        debug!(ticket = %ticket, "transfer aborted");
                    }
                }
                Effect::GeneratePreviews { files } => self.start_previews(files),
                Effect::Publish(event) => {
                    self.reconciler.observe(&event);
                    self.bus.publish(event);
                }
            }
        }
    }

    fn start_registration(&mut self, id: SelectionId, name: String) {
        let registrar = Arc::clone(&self.collaborators.registrar);
        let commands = self.commands.clone();
        let task = tokio::spawn(async move {
            let result = registrar.register(&name).await;
            let _ = commands.send(Command::Registered { id, result });
        });
        self.registrations.insert(id, task.abort_handle());
    }

    fn start_transfer(&mut self, ticket: TransferTicket, target: TargetDescriptor, file: SelectedFile) {
        let token = self.cancel.child_token();
        let client = Arc::clone(&self.collaborators.transfer);
        let commands = self.commands.clone();
        let progress_commands = self.commands.clone();
        let reporter = ProgressReporter::new(
            file.size(),
            Arc::new(move |progress| {
                let _ = progress_commands.send(Command::Progress { ticket, progress });
            }),
        );

        let cancel = token.clone();
        tokio::spawn(async move {
            let result = client.transfer(&target, &file, reporter, cancel).await;
            let _ = commands.send(Command::Transferred { ticket, result });
        });
        self.transfers.insert(ticket.id, (ticket, token));
    }

    /// Generates a batch's previews one at a time, in batch order, yielding
    /// after each hand-over.
    fn start_previews(&mut self, files: Vec<SelectedFile>) {
        self.reconciler
            .expect_previews(files.iter().map(SelectedFile::id));

        let generator = Arc::clone(&self.collaborators.preview);
        let commands = self.commands.clone();
        let cancel = self.cancel.child_token();
        let bounds = self.bounds;
        let mut owed = OwedPreviews {
            ids: files.iter().map(SelectedFile::id).collect(),
            commands: self.commands.clone(),
        };
        tokio::spawn(async move {
            for file in files {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    result = generator.generate(&file, bounds) => result,
                };
                let id = file.id();
                owed.settle(id);
                if commands.send(Command::Previewed { id, result }).is_err() {
                    return;
                }
                tokio::task::yield_now().await;
            }
        });
    }

    fn refresh(&self) {
        let next = QueueView::rebuild(&self.state);
        self.view_tx.send_if_modified(|view| {
            if *view == next {
                return false;
            }
            *view = next;
            true
        });
        self.refresh_idle();
    }

    fn refresh_idle(&self) {
        let idle = self.state.is_idle() && self.reconciler.pending() == 0;
        self.idle_tx.send_if_modified(|current| {
            if *current == idle {
                return false;
            }
            *current = idle;
            true
        });
    }

    fn teardown(&mut self) {
        for (_, handle) in self.registrations.drain() {
            handle.abort();
        }
        for (_, (_, token)) in self.transfers.drain() {
            token.cancel();
        }
        info!(remaining = self.state.len(), "upload queue stopped");
    }
}
