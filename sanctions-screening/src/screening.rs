//! Payment screening entry point

use crate::classifier::RiskClassifier;
use crate::config::Config;
use crate::matcher::MatchEngine;
use crate::metrics::Metrics;
use crate::snapshot::{ReferenceSnapshot, SnapshotCell};
use crate::types::{ScreeningRequest, ScreeningResult};
use chrono::Utc;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Screens payments against the currently published snapshot
///
/// Cheap to share behind an `Arc`; `screen` takes `&self`, does no I/O and
/// never mutates the snapshot.
#[derive(Debug, Clone)]
pub struct Screener {
    snapshots: SnapshotCell,
    matcher: MatchEngine,
    classifier: RiskClassifier,
    high_risk_countries: HashSet<String>,
    metrics: Option<Metrics>,
}

impl Screener {
    /// Create a screener reading from `snapshots`
    pub fn new(snapshots: SnapshotCell, matcher: MatchEngine, classifier: RiskClassifier) -> Self {
        Self {
            snapshots,
            matcher,
            classifier,
            high_risk_countries: HashSet::new(),
            metrics: None,
        }
    }

    /// Create a screener with the policy from `config`
    pub fn from_config(snapshots: SnapshotCell, config: &Config) -> Self {
        Self::new(
            snapshots,
            MatchEngine::new(config.matching.clone()),
            RiskClassifier::new(config.risk.clone()),
        )
        .with_high_risk_countries(config.high_risk_countries.iter().cloned())
    }

    /// Countries whose parties always go to review when they have a hit
    pub fn with_high_risk_countries(mut self, countries: impl IntoIterator<Item = String>) -> Self {
        self.high_risk_countries = countries
            .into_iter()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .collect();
        self
    }

    /// Attach metrics
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Version of the snapshot screening currently runs against
    pub fn snapshot_version(&self) -> u64 {
        self.snapshots.current().version()
    }

    /// Entities in the current snapshot
    pub fn snapshot_len(&self) -> usize {
        self.snapshots.current().len()
    }

    /// Screen one payment
    ///
    /// Blank fields are skipped. Before the first refresh the snapshot is
    /// empty and every request comes back clear.
    pub fn screen(&self, request: &ScreeningRequest) -> ScreeningResult {
        let snapshot = self.snapshots.current();
        self.screen_against(&snapshot, request)
    }

    /// Screen several payments against one snapshot
    pub fn screen_batch(&self, requests: &[ScreeningRequest]) -> Vec<ScreeningResult> {
        let snapshot = self.snapshots.current();
        requests
            .iter()
            .map(|request| self.screen_against(&snapshot, request))
            .collect()
    }

    fn screen_against(&self, snapshot: &ReferenceSnapshot, request: &ScreeningRequest) -> ScreeningResult {
        let started = Instant::now();

        let mut matches = Vec::new();
        for (field, value) in request.fields() {
            match value {
                Some(query) if !query.trim().is_empty() => {
                    matches.extend(self.matcher.scan(field, query, snapshot));
                }
                _ => debug!(field = %field, "Field empty, not screened"),
            }
        }

        let hit = !matches.is_empty();
        let mut verdict = self.classifier.classify(&matches);

        if hit && !verdict.requires_review {
            if let Some(country) = request
                .countries()
                .map(|c| c.trim().to_uppercase())
                .find(|c| self.high_risk_countries.contains(c))
            {
                debug!(country = %country, "Hit with high-risk country party, forcing review");
                verdict.requires_review = true;
            }
        }

        let result = ScreeningResult {
            hit,
            risk_level: verdict.risk_level,
            matches,
            requires_review: verdict.requires_review,
            screened_at: Utc::now(),
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_screening(hit, started.elapsed().as_secs_f64());
        }

        if hit {
            let entries: Vec<&str> = result.matches.iter().map(|m| m.entry_id.as_str()).collect();
            if result.requires_review {
                warn!(
                    risk_level = %result.risk_level,
                    max_score = result.max_score(),
                    snapshot = snapshot.version(),
                    "Screening hit requires review: {:?}",
                    entries
                );
            } else {
                info!(
                    risk_level = %result.risk_level,
                    max_score = result.max_score(),
                    snapshot = snapshot.version(),
                    "Screening hit: {:?}",
                    entries
                );
            }
        }

        result
    }
}
