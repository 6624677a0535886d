//! Upload queue for selected files.
//!
//! Files move through three stages: a local preview, registration of a
//! record with the remote service, and a direct byte transfer to storage.
//! Only one transfer runs at a time, while the next file may register
//! during it. Previews race the confirmed records they stand in for; the
//! [`Reconciler`] drops previews that arrive after their record, and the
//! [`Gallery`] swaps previews for records in place.
//!
//! # Layout
//!
//! - [`QueueState`]: deterministic scheduler returning [`Effect`]s
//! - [`UploadQueue`]: async actor driving the scheduler and collaborators
//! - [`EventBus`]: lifecycle announcements
//! - [`QueueView`]: presentation snapshot

pub mod bus;
pub mod config;
pub mod error;
pub mod gallery;
pub mod natural;
pub mod queue;
pub mod reconcile;
pub mod registrar;
pub mod scheduler;
pub mod view;

// Re-export primary types for convenience.
pub use bus::{EventBus, Subscription};
pub use config::{QueueConfig, TransferFailurePolicy};
pub use error::QueueError;
pub use gallery::{EntryState, Gallery, GalleryChange, GalleryEntry};
pub use natural::{natural_cmp, sort_natural_by};
pub use queue::{Collaborators, UploadQueue};
pub use reconcile::{Reconciler, Settlement};
pub use registrar::{RegistrationError, RegistrationFuture, RemoteRegistrar};
pub use scheduler::{Effect, ItemStatus, QueueItem, QueueState, TransferTicket};
pub use view::{QueueItemView, QueueView};
