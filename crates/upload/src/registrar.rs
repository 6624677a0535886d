//! Remote registration capability.

use std::future::Future;
use std::pin::Pin;

use pixdrop_protocol::Registration;

/// Errors produced by a [`RemoteRegistrar`].
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("file rejected: {0}")]
    Validation(String),

    #[error("registration rejected: {0}")]
    Rejected(String),

    #[error("registrar unavailable: {0}")]
    Unavailable(String),
}

/// Future returned by [`RemoteRegistrar::register`].
pub type RegistrationFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Registration, RegistrationError>> + Send + 'a>>;

/// Registers a record for a file name and returns upload credentials plus
/// the record stub.
///
/// The queue never retries a failed registration; implementations that
/// want retries do them internally.
pub trait RemoteRegistrar: Send + Sync {
    fn register<'a>(&'a self, file_name: &'a str) -> RegistrationFuture<'a>;
}
