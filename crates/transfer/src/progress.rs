use std::fmt;
use std::sync::Arc;

/// Snapshot of a running transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_transferred: u64,
    /// Whole percent, 0-100.
    pub percent: u8,
}

/// Callback invoked with transfer progress.
pub type ProgressCallback = Arc<dyn Fn(TransferProgress) + Send + Sync>;

/// Converts a byte count into a whole percentage of `total`.
///
/// An empty object is complete as soon as it is reported. Values past
/// `total` clamp to 100.
pub fn percent_of(bytes: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (u128::from(bytes) * 100) / u128::from(total);
    pct.min(100) as u8
}

/// Handed to a [`TransferClient`](crate::TransferClient) so it can report
/// progress without knowing who listens.
#[derive(Clone)]
pub struct ProgressReporter {
    total: u64,
    callback: ProgressCallback,
}

impl ProgressReporter {
    pub fn new(total: u64, callback: ProgressCallback) -> Self {
        Self { total, callback }
    }

    /// A reporter that discards every update.
    pub fn noop(total: u64) -> Self {
        Self::new(total, Arc::new(|_| {}))
    }

    /// Total bytes expected for the transfer.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Reports the cumulative number of bytes sent so far.
    pub fn report(&self, bytes_transferred: u64) {
        (self.callback)(TransferProgress {
            bytes_transferred,
            percent: percent_of(bytes_transferred, self.total),
        });
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}
