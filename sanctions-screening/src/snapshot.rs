//! Immutable reference snapshots
//!
//! A snapshot is built in isolation from store records and published with a
//! single atomic pointer swap. Readers take one `Arc` per screening call and
//! scan it without locks; a refresh never mutates a published snapshot.

use crate::normalize::{fold_identifier, normalize_name};
use crate::store::EntityRecord;
use crate::types::{EntityType, SanctionedEntity, StructuredIdentifier};
use crate::{Error, Result};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Point-in-time view of the sanctions reference data
#[derive(Debug, Clone)]
pub struct ReferenceSnapshot {
    version: u64,
    captured_at: DateTime<Utc>,
    entities: Vec<SanctionedEntity>,
    keys: Vec<MatchKeys>,
    index: HashMap<String, usize>,
    skipped: usize,
}

/// A reference name or alias with its normalized form
#[derive(Debug, Clone)]
pub(crate) struct ReferenceName {
    pub(crate) raw: String,
    pub(crate) normalized: String,
    pub(crate) char_len: usize,
}

impl ReferenceName {
    /// `None` when the name normalizes to nothing
    pub(crate) fn new(raw: &str) -> Option<Self> {
        let normalized = normalize_name(raw);
        if normalized.is_empty() {
            return None;
        }
        Some(Self {
            raw: raw.to_string(),
            char_len: normalized.chars().count(),
            normalized,
        })
    }
}

/// Comparison keys of one entity, computed when the snapshot is built
#[derive(Debug, Clone, Default)]
pub(crate) struct MatchKeys {
    /// Names, then aliases
    pub(crate) names: Vec<ReferenceName>,
    /// (folded, published) identifier values
    pub(crate) identifiers: Vec<(String, String)>,
}

impl MatchKeys {
    pub(crate) fn for_entity(entity: &SanctionedEntity) -> Self {
        Self {
            names: entity
                .names
                .iter()
                .chain(entity.aliases.iter())
                .filter_map(|name| ReferenceName::new(name))
                .collect(),
            identifiers: entity
                .identifiers
                .iter()
                .map(|id| (fold_identifier(&id.value), id.value.clone()))
                .collect(),
        }
    }
}

impl ReferenceSnapshot {
    /// The snapshot served before the first successful refresh
    pub fn empty() -> Self {
        Self {
            version: 0,
            captured_at: Utc::now(),
            entities: Vec::new(),
            keys: Vec::new(),
            index: HashMap::new(),
            skipped: 0,
        }
    }

    /// Monotonic version, 0 for the empty startup snapshot
    pub fn version(&self) -> u64 {
        self.version
    }

    /// When the snapshot was built
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True if no entities are loaded
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Records rejected while building this snapshot
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Look up an entity
    pub fn get(&self, entry_id: &str) -> Option<&SanctionedEntity> {
        self.index.get(entry_id).map(|&i| &self.entities[i])
    }

    /// Entities in load order
    pub fn entities(&self) -> impl Iterator<Item = &SanctionedEntity> {
        self.entities.iter()
    }

    /// Entities in load order with their comparison keys
    pub(crate) fn keyed(&self) -> impl Iterator<Item = (&SanctionedEntity, &MatchKeys)> {
        self.entities.iter().zip(self.keys.iter())
    }

    /// Distinct issuing lists present
    pub fn sources(&self) -> Vec<String> {
        self.entities
            .iter()
            .map(|e| e.source.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Accumulates validated entities for a new snapshot
#[derive(Debug)]
pub struct SnapshotBuilder {
    version: u64,
    entities: Vec<SanctionedEntity>,
    keys: Vec<MatchKeys>,
    index: HashMap<String, usize>,
    skipped: usize,
}

impl SnapshotBuilder {
    /// Start a snapshot with the given version
    pub fn new(version: u64) -> Self {
        Self {
            version,
            entities: Vec::new(),
            keys: Vec::new(),
            index: HashMap::new(),
            skipped: 0,
        }
    }

    /// Validate a store record and add it.
    ///
    /// A malformed record is counted as skipped and the error returned so the
    /// caller can log it; the builder stays usable.
    pub fn add_record(
        &mut self,
        record: EntityRecord,
        identifiers: Vec<StructuredIdentifier>,
    ) -> Result<()> {
        let result = validate_record(record, identifiers).and_then(|e| self.insert(e));
        if result.is_err() {
            self.skipped += 1;
        }
        result
    }

    fn insert(&mut self, entity: SanctionedEntity) -> Result<()> {
        if self.index.contains_key(&entity.entry_id) {
            return Err(Error::malformed(&entity.entry_id, "duplicate entry id"));
        }
        self.index.insert(entity.entry_id.clone(), self.entities.len());
        self.keys.push(MatchKeys::for_entity(&entity));
        self.entities.push(entity);
        Ok(())
    }

    /// Entities accepted so far
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True if nothing was accepted yet
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Seal the snapshot
    pub fn build(self) -> ReferenceSnapshot {
        ReferenceSnapshot {
            version: self.version,
            captured_at: Utc::now(),
            entities: self.entities,
            keys: self.keys,
            index: self.index,
            skipped: self.skipped,
        }
    }
}

/// Turn a raw store record into an entity
pub fn validate_record(
    record: EntityRecord,
    identifiers: Vec<StructuredIdentifier>,
) -> Result<SanctionedEntity> {
    let entry_id = record.entry_id.trim().to_string();
    if entry_id.is_empty() {
        return Err(Error::malformed("", "missing entry id"));
    }

    let names = non_blank(record.names);
    if names.is_empty() {
        return Err(Error::malformed(&entry_id, "no names"));
    }

    let country = match record.country.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(code) if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) => {
            Some(code.to_ascii_uppercase())
        }
        Some(code) => {
            return Err(Error::malformed(
                &entry_id,
                format!("invalid country code '{}'", code),
            ))
        }
    };

    let identifiers = identifiers
        .into_iter()
        .filter(|id| !id.value.trim().is_empty())
        .collect();

    Ok(SanctionedEntity {
        entry_id,
        entity_type: EntityType::parse_lossy(&record.entity_type),
        names,
        aliases: non_blank(record.aliases),
        country,
        source: record.source.trim().to_string(),
        list_type: record.list_type,
        identifiers,
        added_at: record.added_at.unwrap_or_else(Utc::now),
    })
}

fn non_blank(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .filter(|v| !v.trim().is_empty())
        .collect()
}

/// Holder of the currently published snapshot
///
/// Cloning shares the same cell.
#[derive(Debug, Clone)]
pub struct SnapshotCell {
    current: Arc<ArcSwap<ReferenceSnapshot>>,
}

impl SnapshotCell {
    /// Cell serving the empty snapshot
    pub fn new() -> Self {
        Self::with_snapshot(ReferenceSnapshot::empty())
    }

    /// Cell serving the given snapshot
    pub fn with_snapshot(snapshot: ReferenceSnapshot) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(snapshot)),
        }
    }

    /// Current snapshot (lock-free). Hold the returned `Arc` for a whole scan.
    #[inline]
    pub fn current(&self) -> Arc<ReferenceSnapshot> {
        self.current.load_full()
    }

    /// Atomically replace the current snapshot. In-flight readers keep the old one.
    pub fn publish(&self, snapshot: ReferenceSnapshot) -> Arc<ReferenceSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.current.store(Arc::clone(&snapshot));
        snapshot
    }
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new()
    }
}
