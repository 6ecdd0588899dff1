//! In-process store for tests and local runs

use super::{EntityRecord, SanctionsStore};
use crate::types::StructuredIdentifier;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Thread-safe in-memory store
///
/// Can be switched unavailable to exercise the refresh failure path.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entities: RwLock<Vec<EntityRecord>>,
    identifiers: RwLock<HashMap<String, Vec<StructuredIdentifier>>>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with records
    pub fn with_records(records: Vec<EntityRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.upsert(record);
        }
        store
    }

    /// Insert or replace a record (keyed by `entry_id`)
    pub fn upsert(&self, record: EntityRecord) {
        let mut entities = self.entities.write();
        match entities.iter_mut().find(|r| r.entry_id == record.entry_id) {
            Some(existing) => *existing = record,
            None => entities.push(record),
        }
    }

    /// Remove a record and its identifiers
    pub fn remove(&self, entry_id: &str) -> bool {
        self.identifiers.write().remove(entry_id);
        let mut entities = self.entities.write();
        let before = entities.len();
        entities.retain(|r| r.entry_id != entry_id);
        entities.len() != before
    }

    /// Attach a structured identifier to an entry
    pub fn add_identifier(&self, entry_id: impl Into<String>, identifier: StructuredIdentifier) {
        self.identifiers
            .write()
            .entry(entry_id.into())
            .or_default()
            .push(identifier);
    }

    /// Simulate the store going down (or coming back)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of records held
    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    /// True when no records are held
    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Store("in-memory store marked unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SanctionsStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_active_entities(&self) -> Result<Vec<EntityRecord>> {
        self.check_available()?;
        Ok(self.entities.read().clone())
    }

    async fn structured_identifiers(&self, entry_id: &str) -> Result<Vec<StructuredIdentifier>> {
        self.check_available()?;
        Ok(self
            .identifiers
            .read()
            .get(entry_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_and_remove() {
        let store = InMemoryStore::new();
        store.upsert(EntityRecord::new("E1", "Acme", "OFAC"));
        store.upsert(EntityRecord::new("E1", "Acme Trading", "OFAC"));
        store.upsert(EntityRecord::new("E2", "Other", "EU"));
        assert_eq!(store.len(), 2);

        let records = store.list_active_entities().await.unwrap();
        assert_eq!(records[0].names, vec!["Acme Trading".to_string()]);

        assert!(store.remove("E2"));
        assert!(!store.remove("E2"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_identifiers_lookup() {
        let store = InMemoryStore::new();
        store.add_identifier("E1", StructuredIdentifier::new("BIC", "BMJIIRTH"));

        let ids = store.structured_identifiers("E1").await.unwrap();
        assert_eq!(ids.len(), 1);
        assert!(store.structured_identifiers("E9").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable() {
        let store = InMemoryStore::with_records(vec![EntityRecord::new("E1", "Acme", "OFAC")]);
        store.set_unavailable(true);
        assert!(matches!(store.list_active_entities().await, Err(Error::Store(_))));

        store.set_unavailable(false);
        assert_eq!(store.list_active_entities().await.unwrap().len(), 1);
    }
}
