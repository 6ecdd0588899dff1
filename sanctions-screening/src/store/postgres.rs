//! Postgres reference tables
//!
//! ```sql
//! sanctions_entries    (entry_id TEXT PRIMARY KEY, entity_type TEXT, names TEXT[],
//!                       aliases TEXT[], country TEXT, source TEXT, list_type TEXT,
//!                       added_at TIMESTAMPTZ, active BOOLEAN)
//! sanctions_identifiers(entry_id TEXT, id_type TEXT, value TEXT)
//! ```

use super::{EntityRecord, SanctionsStore};
use crate::types::StructuredIdentifier;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use tracing::{info, warn};

/// Postgres-backed store
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a new pool
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        info!("Connected sanctions store pool ({} connections)", max_connections);
        Ok(Self { pool })
    }

    fn record_from_row(row: &PgRow) -> std::result::Result<EntityRecord, sqlx::Error> {
        Ok(EntityRecord {
            entry_id: row.try_get("entry_id")?,
            entity_type: row
                .try_get::<Option<String>, _>("entity_type")?
                .unwrap_or_default(),
            names: row
                .try_get::<Option<Vec<String>>, _>("names")?
                .unwrap_or_default(),
            aliases: row
                .try_get::<Option<Vec<String>>, _>("aliases")?
                .unwrap_or_default(),
            country: row.try_get("country")?,
            source: row
                .try_get::<Option<String>, _>("source")?
                .unwrap_or_default(),
            list_type: row.try_get("list_type")?,
            added_at: row.try_get::<Option<DateTime<Utc>>, _>("added_at")?,
        })
    }
}

#[async_trait]
impl SanctionsStore for PgStore {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn list_active_entities(&self) -> Result<Vec<EntityRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT entry_id, entity_type, names, aliases, country, source, list_type, added_at
            FROM sanctions_entries
            WHERE active = TRUE
            ORDER BY entry_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            match Self::record_from_row(row) {
                Ok(record) => records.push(record),
                Err(e) => {
                    let entry_id: String = row.try_get("entry_id").unwrap_or_default();
                    warn!(entry_id = %entry_id, "Skipping undecodable sanctions row: {}", e);
                }
            }
        }

        Ok(records)
    }

    async fn structured_identifiers(&self, entry_id: &str) -> Result<Vec<StructuredIdentifier>> {
        let rows = sqlx::query(
            r#"
            SELECT id_type, value
            FROM sanctions_identifiers
            WHERE entry_id = $1
            "#,
        )
        .bind(entry_id)
        .fetch_all(&self.pool)
        .await?;

        let mut identifiers = Vec::with_capacity(rows.len());
        for row in &rows {
            identifiers.push(StructuredIdentifier {
                id_type: row.try_get("id_type")?,
                value: row.try_get("value")?,
            });
        }
        Ok(identifiers)
    }
}
