//! Prometheus metrics for screening and snapshot refresh
//!
//! # Metrics
//!
//! - `screening_requests_total` - Screening calls served
//! - `screening_hits_total` - Screening calls with at least one match
//! - `screening_duration_seconds` - Histogram of screening latency
//! - `snapshot_refresh_total` - Successful snapshot publishes
//! - `snapshot_refresh_failures_total` - Failed refresh attempts
//! - `snapshot_entities` - Entities in the published snapshot
//! - `snapshot_skipped_records` - Malformed records skipped by the last refresh
//! - `snapshot_version` - Version of the published snapshot

use crate::snapshot::ReferenceSnapshot;
use crate::Result;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use std::sync::Arc;

/// Metrics collector
///
/// Collectors live in their own registry so several engines can coexist in
/// one process (and in tests).
#[derive(Clone)]
pub struct Metrics {
    /// Screening calls served
    pub requests_total: IntCounter,

    /// Screening calls with a hit
    pub hits_total: IntCounter,

    /// Screening latency
    pub screening_duration: Histogram,

    /// Successful refreshes
    pub refresh_total: IntCounter,

    /// Failed refreshes
    pub refresh_failures: IntCounter,

    /// Entities in the current snapshot
    pub snapshot_entities: IntGauge,

    /// Records skipped by the last refresh
    pub snapshot_skipped: IntGauge,

    /// Current snapshot version
    pub snapshot_version: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create and register all collectors
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let requests_total =
            IntCounter::new("screening_requests_total", "Screening calls served")?;
        registry.register(Box::new(requests_total.clone()))?;

        let hits_total = IntCounter::new(
            "screening_hits_total",
            "Screening calls with at least one match",
        )?;
        registry.register(Box::new(hits_total.clone()))?;

        let screening_duration = Histogram::with_opts(
            HistogramOpts::new("screening_duration_seconds", "Histogram of screening latency")
                .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100]),
        )?;
        registry.register(Box::new(screening_duration.clone()))?;

        let refresh_total =
            IntCounter::new("snapshot_refresh_total", "Successful snapshot publishes")?;
        registry.register(Box::new(refresh_total.clone()))?;

        let refresh_failures =
            IntCounter::new("snapshot_refresh_failures_total", "Failed refresh attempts")?;
        registry.register(Box::new(refresh_failures.clone()))?;

        let snapshot_entities =
            IntGauge::new("snapshot_entities", "Entities in the published snapshot")?;
        registry.register(Box::new(snapshot_entities.clone()))?;

        let snapshot_skipped = IntGauge::new(
            "snapshot_skipped_records",
            "Malformed records skipped by the last refresh",
        )?;
        registry.register(Box::new(snapshot_skipped.clone()))?;

        let snapshot_version =
            IntGauge::new("snapshot_version", "Version of the published snapshot")?;
        registry.register(Box::new(snapshot_version.clone()))?;

        Ok(Self {
            requests_total,
            hits_total,
            screening_duration,
            refresh_total,
            refresh_failures,
            snapshot_entities,
            snapshot_skipped,
            snapshot_version,
            registry,
        })
    }

    /// Record a screening call
    pub fn record_screening(&self, hit: bool, duration_secs: f64) {
        self.requests_total.inc();
        if hit {
            self.hits_total.inc();
        }
        self.screening_duration.observe(duration_secs);
    }

    /// Record a published snapshot
    pub fn record_publish(&self, snapshot: &ReferenceSnapshot) {
        self.refresh_total.inc();
        self.snapshot_entities.set(snapshot.len() as i64);
        self.snapshot_skipped.set(snapshot.skipped() as i64);
        self.snapshot_version.set(snapshot.version() as i64);
    }

    /// Record a failed refresh
    pub fn record_refresh_failure(&self) {
        self.refresh_failures.inc();
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("requests_total", &self.requests_total.get())
            .field("refresh_total", &self.refresh_total.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_screening(true, 0.0002);
        metrics.record_screening(false, 0.0001);
        assert_eq!(metrics.requests_total.get(), 2);
        assert_eq!(metrics.hits_total.get(), 1);

        // Independent registries do not collide
        let other = Metrics::new().unwrap();
        assert_eq!(other.requests_total.get(), 0);
    }

    #[test]
    fn test_record_publish() {
        let metrics = Metrics::new().unwrap();
        metrics.record_publish(&ReferenceSnapshot::empty());
        metrics.record_refresh_failure();
        assert_eq!(metrics.refresh_total.get(), 1);
        assert_eq!(metrics.refresh_failures.get(), 1);
        assert_eq!(metrics.snapshot_version.get(), 0);
    }
}
