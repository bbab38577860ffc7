// src/store.rs

use crate::bill::BillEntry;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Session-scoped owner of all bill entries.
///
/// Entries are kept in submission order. The store is the only place an
/// entry changes, and the only mutation is whole-entry replacement keyed by
/// `id`, so concurrent updates to different entries commute. Reads hand out
/// clones; nothing outside the store holds a reference into it.
///
/// The handle is cheap to clone and shares the underlying collection, which
/// is what lets each in-flight analysis task publish its own outcome.
#[derive(Clone, Default)]
pub struct BillStore {
    entries: Arc<Mutex<Vec<BillEntry>>>,
    seq: Arc<AtomicU64>,
}

impl BillStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a session-unique entry id from the file name, the
    /// submission instant (unix nanoseconds), and a monotonic sequence
    /// number. The sequence number alone guarantees uniqueness; name and
    /// time keep ids stable-looking across log lines.
    pub fn generate_id(&self, file_name: &str, submitted_at_nanos: i128) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let mut hasher = Sha256::new();
        hasher.update(file_name.as_bytes());
        hasher.update(submitted_at_nanos.to_le_bytes());
        hasher.update(seq.to_le_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Publish a new entry at the end of the collection.
    pub fn insert(&self, entry: BillEntry) {
        info!(id = %entry.id, file = %entry.file_name(), "entry published");
        self.entries.lock().unwrap().push(entry);
    }

    /// Replace the entry with the same `id`, keeping its position.
    /// Returns false (and changes nothing) if the id is unknown.
    pub fn replace(&self, entry: BillEntry) -> bool {
        let mut entries = self.entries.lock().unwrap();
        match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(slot) => {
                *slot = entry;
                true
            }
            None => false,
        }
    }

    /// Clone-out snapshot of one entry.
    pub fn get(&self, id: &str) -> Option<BillEntry> {
        self.entries.lock().unwrap().iter().find(|e| e.id == id).cloned()
    }

    /// Snapshot of all entries in submission order.
    pub fn entries(&self) -> Vec<BillEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bill::BillFile;

    fn file(name: &str) -> BillFile {
        BillFile {
            name: name.to_string(),
            media_type: "application/pdf".to_string(),
            bytes: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_id_generation_unique() {
        let store = BillStore::new();
        // Same name and timestamp still yield distinct ids via the sequence
        let a = store.generate_id("bill.pdf", 1_000);
        let b = store.generate_id("bill.pdf", 1_000);
        assert_ne!(a, b);
    }

    #[test]
    fn test_replace_keeps_order_and_ignores_unknown() {
        let store = BillStore::new();
        let first = BillEntry::new("a".to_string(), file("one.pdf"));
        let second = BillEntry::new("b".to_string(), file("two.pdf"));
        store.insert(first);
        store.insert(second.clone());

        assert!(store.replace(second.failed("boom")));
        let snapshot = store.entries();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, "a");
        assert_eq!(snapshot[1].id, "b");
        assert_eq!(snapshot[1].error.as_deref(), Some("boom"));

        let ghost = BillEntry::new("zzz".to_string(), file("ghost.pdf"));
        assert!(!store.replace(ghost));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_get_returns_clone() {
        let store = BillStore::new();
        store.insert(BillEntry::new("a".to_string(), file("one.pdf")));
        let snapshot = store.get("a").unwrap();
        assert_eq!(snapshot.file_name(), "one.pdf");
        assert!(store.get("missing").is_none());
    }
}
