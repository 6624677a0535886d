//! Identifiers for selections and server-side records.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Identifier assigned to a file at selection time.
///
/// Unique within a session and stable for the whole pipeline. It doubles as
/// the correlation id linking a preview to its confirmed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionId(u64);

impl SelectionId {
    /// Wraps a raw id. Prefer [`SelectionIds::next_id`] for new selections.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SelectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session-scoped allocator for [`SelectionId`]s. Ids are never reused.
#[derive(Debug)]
pub struct SelectionIds {
    next: AtomicU64,
}

impl Default for SelectionIds {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionIds {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocates the next id.
    pub fn next_id(&self) -> SelectionId {
        SelectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Server-assigned identifier of a confirmed record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn allocator_yields_unique_increasing_ids() {
        let ids = SelectionIds::new();
        let a = ids.next_id();
        let b = ids.next_id();
        let c = ids.next_id();
        assert!(a < b && b < c);
        assert_eq!(a.get(), 1);
    }

    #[test]
    fn allocator_is_shareable_across_threads() {
        let ids = std::sync::Arc::new(SelectionIds::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = std::sync::Arc::clone(&ids);
                std::thread::spawn(move || (0..100).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 400);
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&SelectionId::from_raw(7)).unwrap();
        assert_eq!(json, "7");
        let json = serde_json::to_string(&RecordId::new("img_42")).unwrap();
        assert_eq!(json, "\"img_42\"");
    }
}
