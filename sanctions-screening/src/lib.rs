//! DelTran Sanctions Screening
//!
//! Decides whether a payment's sender or receiver must be blocked, escalated
//! for manual review, or cleared, by matching both parties against a cached
//! sanctions reference list.
//!
//! # Architecture
//!
//! ```text
//! backing store ──▶ SnapshotRefresher ──▶ ReferenceSnapshot (ArcSwap)
//!                                                │
//!                      request ──▶ Screener ─────┤
//!                                    │           ▼
//!                                    │      MatchEngine (exact / substring / fuzzy)
//!                                    ▼
//!                              RiskClassifier ──▶ ScreeningResult
//! ```
//!
//! # Invariants
//!
//! - A published snapshot is never mutated; refresh swaps in a new one
//! - One screening call sees exactly one snapshot
//! - Store failures never reach `screen()`; the previous snapshot keeps serving

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod classifier;
pub mod config;
pub mod distance;
pub mod error;
pub mod matcher;
pub mod metrics;
pub mod ndjson;
pub mod normalize;
pub mod refresher;
pub mod screening;
pub mod snapshot;
pub mod store;
pub mod types;

// Re-exports
pub use classifier::{Classification, RiskClassifier};
pub use config::{Config, MatchConfig, RefreshConfig, RiskPolicy, StoreConfig};
pub use error::{Error, Result};
pub use matcher::{Candidate, MatchEngine, MatchTier};
pub use metrics::Metrics;
pub use ndjson::LineOutcome;
pub use refresher::{RefreshReport, RefreshState, SnapshotRefresher};
pub use screening::Screener;
pub use snapshot::{ReferenceSnapshot, SnapshotBuilder, SnapshotCell};
pub use store::{CsvStore, EntityRecord, InMemoryStore, PgStore, SanctionsStore};
pub use types::{
    EntityType, MatchedField, RiskLevel, SanctionedEntity, ScreeningMatch, ScreeningRequest,
    ScreeningResult, ScreeningStatus, StructuredIdentifier,
};
