//! Backing store contract
//!
//! The reference data lives outside this crate. A store only has to list the
//! active entries and look up their structured identifiers; the refresher
//! treats it as read-only and validates everything it returns.

mod csv_file;
mod memory;
mod postgres;

pub use csv_file::CsvStore;
pub use memory::InMemoryStore;
pub use postgres::PgStore;

use crate::config::StoreConfig;
use crate::types::StructuredIdentifier;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Raw, unvalidated sanctions entry as returned by a store
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EntityRecord {
    /// Unique key
    pub entry_id: String,
    /// Free-form entity type column
    pub entity_type: String,
    /// Primary names
    pub names: Vec<String>,
    /// Alternate names
    pub aliases: Vec<String>,
    /// Country code
    pub country: Option<String>,
    /// Issuing list
    pub source: String,
    /// Programme within the list
    pub list_type: Option<String>,
    /// Ingestion date
    pub added_at: Option<DateTime<Utc>>,
}

impl EntityRecord {
    /// Minimal record with one name, used by tests and seed data
    pub fn new(entry_id: impl Into<String>, name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            entry_id: entry_id.into(),
            entity_type: "organization".to_string(),
            names: vec![name.into()],
            source: source.into(),
            ..Default::default()
        }
    }

    /// Add an alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Set the country
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }
}

/// Read-only access to sanctions reference data
#[async_trait]
pub trait SanctionsStore: Send + Sync {
    /// Store name for logs
    fn name(&self) -> &str;

    /// All currently active entries
    async fn list_active_entities(&self) -> Result<Vec<EntityRecord>>;

    /// Structured identifiers of one entry
    async fn structured_identifiers(&self, entry_id: &str) -> Result<Vec<StructuredIdentifier>>;
}

/// Build the store selected in configuration
pub async fn from_config(config: &StoreConfig) -> Result<Arc<dyn SanctionsStore>> {
    let store: Arc<dyn SanctionsStore> = match config {
        StoreConfig::Memory => Arc::new(InMemoryStore::new()),
        StoreConfig::Csv {
            entities_path,
            identifiers_path,
        } => Arc::new(CsvStore::new(entities_path, identifiers_path)),
        StoreConfig::Postgres {
            url,
            max_connections,
        } => Arc::new(PgStore::connect(url, *max_connections).await?),
    };
    Ok(store)
}
