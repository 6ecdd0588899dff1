//! Consolidated list exported as CSV
//!
//! Two files:
//!
//! ```text
//! entities.csv     entry_id,entity_type,names,aliases,country,source,list_type,added_at
//! identifiers.csv  entry_id,id_type,value
//! ```
//!
//! `names` and `aliases` hold several values separated by `;`. `added_at` is
//! RFC 3339 or a plain `YYYY-MM-DD` date. Both files are re-read on every
//! `list_active_entities` call.

use super::{EntityRecord, SanctionsStore};
use crate::types::StructuredIdentifier;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct EntityRow {
    entry_id: String,
    #[serde(default)]
    entity_type: String,
    #[serde(default)]
    names: String,
    #[serde(default)]
    aliases: String,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    source: String,
    #[serde(default)]
    list_type: Option<String>,
    #[serde(default)]
    added_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdentifierRow {
    entry_id: String,
    id_type: String,
    value: String,
}

/// CSV-file backed store
#[derive(Debug)]
pub struct CsvStore {
    entities_path: PathBuf,
    identifiers_path: PathBuf,
    // Filled by `list_active_entities`, read by `structured_identifiers`
    identifiers: RwLock<HashMap<String, Vec<StructuredIdentifier>>>,
}

impl CsvStore {
    /// Create a store over the two files. Nothing is read until the first refresh.
    pub fn new(entities_path: impl AsRef<Path>, identifiers_path: impl AsRef<Path>) -> Self {
        Self {
            entities_path: entities_path.as_ref().to_path_buf(),
            identifiers_path: identifiers_path.as_ref().to_path_buf(),
            identifiers: RwLock::new(HashMap::new()),
        }
    }

    fn parse_entities(&self, bytes: &[u8]) -> Result<Vec<EntityRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let mut records = Vec::new();
        for (line, row) in reader.deserialize::<EntityRow>().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    // Header is line 1
                    warn!(line = line + 2, "Skipping unreadable sanctions row: {}", e);
                    continue;
                }
            };

            let added_at = match row.added_at.as_deref().filter(|s| !s.is_empty()) {
                Some(raw) => match parse_timestamp(raw) {
                    Some(ts) => Some(ts),
                    None => {
                        warn!(entry_id = %row.entry_id, "Skipping sanctions row with bad added_at '{}'", raw);
                        continue;
                    }
                },
                None => None,
            };

            records.push(EntityRecord {
                entry_id: row.entry_id,
                entity_type: row.entity_type,
                names: split_list(&row.names),
                aliases: split_list(&row.aliases),
                country: row.country.filter(|c| !c.is_empty()),
                source: row.source,
                list_type: row.list_type.filter(|l| !l.is_empty()),
                added_at,
            });
        }

        Ok(records)
    }

    fn parse_identifiers(bytes: &[u8]) -> HashMap<String, Vec<StructuredIdentifier>> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let mut map: HashMap<String, Vec<StructuredIdentifier>> = HashMap::new();
        for row in reader.deserialize::<IdentifierRow>() {
            match row {
                Ok(row) if !row.value.is_empty() => {
                    map.entry(row.entry_id)
                        .or_default()
                        .push(StructuredIdentifier::new(row.id_type, row.value));
                }
                Ok(row) => {
                    warn!(entry_id = %row.entry_id, "Skipping identifier row with empty value");
                }
                Err(e) => {
                    warn!("Skipping unreadable identifier row: {}", e);
                }
            }
        }
        map
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[async_trait]
impl SanctionsStore for CsvStore {
    fn name(&self) -> &str {
        "csv"
    }

    async fn list_active_entities(&self) -> Result<Vec<EntityRecord>> {
        let entity_bytes = tokio::fs::read(&self.entities_path).await.map_err(|e| {
            Error::Store(format!("reading {}: {}", self.entities_path.display(), e))
        })?;
        let identifier_bytes = tokio::fs::read(&self.identifiers_path).await.map_err(|e| {
            Error::Store(format!("reading {}: {}", self.identifiers_path.display(), e))
        })?;

        let records = self.parse_entities(&entity_bytes)?;
        let identifiers = Self::parse_identifiers(&identifier_bytes);
        debug!(
            entities = records.len(),
            identified = identifiers.len(),
            "Read consolidated list from CSV"
        );

        *self.identifiers.write() = identifiers;
        Ok(records)
    }

    async fn structured_identifiers(&self, entry_id: &str) -> Result<Vec<StructuredIdentifier>> {
        Ok(self
            .identifiers
            .read()
            .get(entry_id)
            .cloned()
            .unwrap_or_default())
    }
}
