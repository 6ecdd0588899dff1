//! Background snapshot refresher
//!
//! Two states: `Idle` (serving the published snapshot) and `Refreshing`
//! (building a new one). A refresh is triggered by the timer, which fires
//! immediately on start and then every `interval`, or by
//! [`SnapshotRefresher::request_refresh`].
//!
//! ```text
//!            timer tick / request
//!   Idle ─────────────────────────▶ Refreshing
//!    ▲                                  │
//!    │   publish (atomic swap)          │ store ok
//!    ├──────────────────────────────────┤
//!    │   keep previous snapshot         │ store error
//!    └──────────────────────────────────┘
//! ```
//!
//! A store failure keeps the previous snapshot in service: stale data is
//! preferred over no data. Malformed records are skipped one by one.
//! Cancelling the loop mid-build drops the half-built snapshot unpublished.

use crate::metrics::Metrics;
use crate::snapshot::{ReferenceSnapshot, SnapshotBuilder, SnapshotCell};
use crate::store::SanctionsStore;
use crate::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Refresher state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    /// Serving the published snapshot
    Idle,
    /// Building a new snapshot
    Refreshing,
}

/// Summary of a successful refresh
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshReport {
    /// Version of the published snapshot
    pub version: u64,
    /// Entities loaded
    pub entities: usize,
    /// Malformed records skipped
    pub skipped: usize,
    /// Time spent querying and building
    pub duration: Duration,
}

/// Periodically rebuilds the reference snapshot from the backing store
pub struct SnapshotRefresher {
    store: Arc<dyn SanctionsStore>,
    cell: SnapshotCell,
    interval: Duration,
    timer_enabled: bool,
    refreshing: AtomicBool,
    // One refresh at a time
    slot: Mutex<()>,
    wake: Notify,
    published: watch::Sender<u64>,
    metrics: Option<Metrics>,
}

struct RefreshingGuard<'a>(&'a AtomicBool);

impl<'a> RefreshingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RefreshingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SnapshotRefresher {
    /// Create a refresher publishing into `cell`
    pub fn new(store: Arc<dyn SanctionsStore>, cell: SnapshotCell, interval: Duration) -> Self {
        let (published, _) = watch::channel(cell.current().version());
        Self {
            store,
            cell,
            interval,
            timer_enabled: true,
            refreshing: AtomicBool::new(false),
            slot: Mutex::new(()),
            wake: Notify::new(),
            published,
            metrics: None,
        }
    }

    /// Attach metrics
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Disable the periodic timer; only explicit requests refresh
    pub fn with_timer(mut self, enabled: bool) -> Self {
        self.timer_enabled = enabled;
        self
    }

    /// Current state
    pub fn state(&self) -> RefreshState {
        if self.refreshing.load(Ordering::SeqCst) {
            RefreshState::Refreshing
        } else {
            RefreshState::Idle
        }
    }

    /// Cell this refresher publishes into
    pub fn cell(&self) -> &SnapshotCell {
        &self.cell
    }

    /// Watch published snapshot versions
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.published.subscribe()
    }

    /// Ask the running loop for a refresh as soon as it is idle
    pub fn request_refresh(&self) {
        self.wake.notify_one();
    }

    /// Build and publish one snapshot.
    ///
    /// On error nothing is published and the previous snapshot stays current.
    pub async fn refresh_once(&self) -> Result<RefreshReport> {
        let _slot = self.slot.lock().await;
        let _state = RefreshingGuard::enter(&self.refreshing);
        let started = Instant::now();

        let version = self.cell.current().version() + 1;
        match self.build(version).await {
            Ok(snapshot) => {
                let published = self.cell.publish(snapshot);
                self.published.send_replace(published.version());
                if let Some(metrics) = &self.metrics {
                    metrics.record_publish(&published);
                }

                let report = RefreshReport {
                    version: published.version(),
                    entities: published.len(),
                    skipped: published.skipped(),
                    duration: started.elapsed(),
                };
                info!(
                    store = self.store.name(),
                    version = report.version,
                    entities = report.entities,
                    skipped = report.skipped,
                    "Published sanctions snapshot in {:?}",
                    report.duration
                );
                Ok(report)
            }
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_refresh_failure();
                }
                error!(
                    store = self.store.name(),
                    "Sanctions refresh failed, keeping snapshot v{}: {}",
                    self.cell.current().version(),
                    e
                );
                Err(e)
            }
        }
    }

    async fn build(&self, version: u64) -> Result<ReferenceSnapshot> {
        let records = self.store.list_active_entities().await?;
        debug!(records = records.len(), "Fetched active sanctions records");

        let mut builder = SnapshotBuilder::new(version);
        for record in records {
            let identifiers = self.store.structured_identifiers(&record.entry_id).await?;
            let entry_id = record.entry_id.clone();
            if let Err(e) = builder.add_record(record, identifiers) {
                warn!(entry_id = %entry_id, "Skipping sanctions record: {}", e);
            }
        }

        Ok(builder.build())
    }

    /// Run the refresh loop until `cancel` fires
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!(
            store = self.store.name(),
            "Starting sanctions refresher (interval {:?})",
            self.interval
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !self.timer_enabled {
            // Initial load still happens
            self.wake.notify_one();
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick(), if self.timer_enabled => {
                    debug!("Refresh timer fired");
                }
                _ = self.wake.notified() => {
                    debug!("Refresh requested");
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("Shutdown during refresh, abandoning unpublished snapshot");
                    break;
                }
                result = self.refresh_once() => {
                    if result.is_err() {
                        debug!("Will retry on next tick");
                    }
                }
            }
        }

        info!("Sanctions refresher stopped");
    }

    /// Spawn [`run`](Self::run) on the current runtime
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run(cancel))
    }
}

impl std::fmt::Debug for SnapshotRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotRefresher")
            .field("store", &self.store.name())
            .field("interval", &self.interval)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{EntityRecord, InMemoryStore};
    use crate::types::StructuredIdentifier;
    use tokio::time::timeout;

    fn seeded_store() -> Arc<InMemoryStore> {
        let store = InMemoryStore::with_records(vec![
            EntityRecord::new("OFAC-1", "Bank Melli Iran", "OFAC").with_country("IR"),
            EntityRecord::new("UN-1", "Korea Kwangson Banking Corp", "UN"),
            EntityRecord::new("", "Nameless Id", "UN"),
        ]);
        store.add_identifier("OFAC-1", StructuredIdentifier::new("BIC", "BMJIIRTH"));
        Arc::new(store)
    }

    fn refresher(store: Arc<InMemoryStore>) -> Arc<SnapshotRefresher> {
        Arc::new(SnapshotRefresher::new(
            store,
            SnapshotCell::new(),
            Duration::from_secs(3600),
        ))
    }

    #[tokio::test]
    async fn test_refresh_publishes_snapshot() {
        let refresher = refresher(seeded_store());
        assert_eq!(refresher.cell().current().version(), 0);

        let report = refresher.refresh_once().await.unwrap();
        assert_eq!(report.version, 1);
        assert_eq!(report.entities, 2);
        assert_eq!(report.skipped, 1);

        let snapshot = refresher.cell().current();
        assert_eq!(snapshot.version(), 1);
        assert_eq!(snapshot.get("OFAC-1").unwrap().identifiers.len(), 1);
        assert_eq!(refresher.state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let store = seeded_store();
        let refresher = refresher(Arc::clone(&store));
        refresher.refresh_once().await.unwrap();
        let before = refresher.cell().current();

        store.set_unavailable(true);
        assert!(refresher.refresh_once().await.is_err());

        let after = refresher.cell().current();
        assert_eq!(after.version(), before.version());
        assert_eq!(after.len(), 2);
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(refresher.state(), RefreshState::Idle);

        store.set_unavailable(false);
        assert_eq!(refresher.refresh_once().await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_run_loop_loads_and_stops() {
        let store = seeded_store();
        let refresher = refresher(Arc::clone(&store));
        let mut versions = refresher.subscribe();
        let cancel = CancellationToken::new();
        let handle = refresher.spawn(cancel.clone());

        timeout(Duration::from_secs(5), versions.wait_for(|v| *v >= 1))
            .await
            .expect("initial load")
            .unwrap();
        assert_eq!(refresher.cell().current().len(), 2);

        store.upsert(EntityRecord::new("EU-1", "VTB Bank", "EU"));
        refresher.request_refresh();
        timeout(Duration::from_secs(5), versions.wait_for(|v| *v >= 2))
            .await
            .expect("requested refresh")
            .unwrap();
        assert_eq!(refresher.cell().current().len(), 3);

        cancel.cancel();
        timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop stops on cancel")
            .unwrap();
    }

    #[tokio::test]
    async fn test_timer_disabled_still_loads_once() {
        let store = seeded_store();
        let refresher = Arc::new(
            SnapshotRefresher::new(store, SnapshotCell::new(), Duration::from_secs(1))
                .with_timer(false),
        );
        let mut versions = refresher.subscribe();
        let cancel = CancellationToken::new();
        let handle = refresher.spawn(cancel.clone());

        timeout(Duration::from_secs(5), versions.wait_for(|v| *v >= 1))
            .await
            .expect("initial load")
            .unwrap();

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(refresher.cell().current().version(), 1);
    }
}
