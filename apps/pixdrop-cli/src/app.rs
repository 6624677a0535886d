//! Application orchestrator: wires the upload pipeline together and runs
//! one batch of files through it.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use pixdrop_preview::ImagePreviewGenerator;
use pixdrop_protocol::{QueueEvent, SelectedFile, SelectionIds};
use pixdrop_transfer::LocalStorageTransfer;
use pixdrop_upload::{Collaborators, EventBus, Gallery, GalleryChange, UploadQueue};

use crate::config::Config;
use crate::registrar::LocalRegistrar;

/// Outcome of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub selected: usize,
    pub previews: usize,
    pub confirmed: usize,
    pub failed: usize,
    pub rejected: usize,
}

impl Summary {
    fn record(&mut self, event: &QueueEvent) {
        match event {
            QueueEvent::Available { .. } => self.previews += 1,
            QueueEvent::Confirmed { .. } => self.confirmed += 1,
            QueueEvent::TransferFailed { .. } => self.failed += 1,
            QueueEvent::Unavailable { .. } => self.rejected += 1,
        }
    }

    pub fn is_success(&self) -> bool {
        self.confirmed == self.selected
    }
}

/// Uploads `files` and returns once the queue is idle or the user
/// interrupts.
pub async fn run(config: Config, files: Vec<PathBuf>) -> anyhow::Result<Summary> {
    let storage = config.storage_path();
    tokio::fs::create_dir_all(&storage).await?;

    let collaborators = Collaborators {
        registrar: Arc::new(LocalRegistrar::new(
            &storage,
            &config.public_base_url,
            &config.allowed_extensions,
        )),
        transfer: Arc::new(LocalStorageTransfer::new(&storage, config.chunk_size)),
        preview: Arc::new(ImagePreviewGenerator::new(config.queue.preview_format)),
    };

    let bus = EventBus::new();
    let mut events = bus.subscribe();
    let queue = UploadQueue::spawn(config.queue.clone(), collaborators, bus);

    let ids = SelectionIds::new();
    let mut selected = Vec::with_capacity(files.len());
    for path in &files {
        match SelectedFile::from_path(&ids, path).await {
            Ok(file) => selected.push(file),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable file"),
        }
    }

    let mut summary = Summary {
        selected: files.len(),
        ..Summary::default()
    };
    if selected.is_empty() {
        warn!("nothing to upload");
        queue.shutdown().await;
        return Ok(summary);
    }

    info!(count = selected.len(), storage = %storage.display(), "uploading");
    queue.enqueue(selected).await?;

    let mut gallery = Gallery::new();
    loop {
        tokio::select! {
            Some(event) = events.recv() => apply(&mut gallery, &mut summary, event),
            result = queue.wait_idle() => {
                result?;
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted; abandoning remaining uploads");
                break;
            }
        }
    }
    for event in events.drain() {
        apply(&mut gallery, &mut summary, event);
    }
    let unfinished = queue.snapshot().len();
    if unfinished > 0 {
        warn!(unfinished, "stopping with uploads left in the queue");
    }
    queue.shutdown().await;

    for entry in gallery.entries() {
        if let Some(record) = entry.record() {
            println!("{}\t{}", record.client_file, record.remote_url);
        }
    }
    Ok(summary)
}

fn apply(gallery: &mut Gallery, summary: &mut Summary, event: QueueEvent) {
    summary.record(&event);
    match &event {
        QueueEvent::Available { preview } => {
            debug!(item = %preview.id, name = %preview.name, "preview ready")
        }
        QueueEvent::Confirmed { record, .. } => {
            info!(name = %record.client_file, url = %record.remote_url, "uploaded")
        }
        QueueEvent::TransferFailed { name, error, .. } => {
            error!(name = %name, error = %error, "upload failed")
        }
        QueueEvent::Unavailable { name, .. } => warn!(name = %name, "file rejected"),
    }
    if let GalleryChange::Replaced(index) = gallery.apply(event) {
        debug!(index, "preview replaced by record");
    }
}
