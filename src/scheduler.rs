//! Sweep scheduler — the single background worker driving all polling.
//!
//! Policy: a fixed-interval tick triggers a full sweep over a live registry
//! scan, so applications registered through the HTTP surface take effect
//! without a restart. Sweeps never overlap: the tick that fires while a sweep
//! is still running is skipped, not queued. Applications within a sweep are
//! processed strictly sequentially in registry-iteration order.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::core::errors::CheckError;
use crate::core::format;
use crate::core::types::Application;
use crate::mail::PassportProbe;
use crate::notify::NotificationSink;
use crate::registry::{parse_record, ApplicationRegistry};
use crate::scraping::StatusProbe;
use crate::tracker::ChangeTracker;

pub struct Sweeper {
    registry: Arc<dyn ApplicationRegistry>,
    status_probe: Arc<dyn StatusProbe>,
    passport_probe: Arc<dyn PassportProbe>,
    sink: Arc<dyn NotificationSink>,
    tracker: ChangeTracker,
    interval: Duration,
    attempt_timeout: Duration,
}

impl Sweeper {
    pub fn new(
        registry: Arc<dyn ApplicationRegistry>,
        status_probe: Arc<dyn StatusProbe>,
        passport_probe: Arc<dyn PassportProbe>,
        sink: Arc<dyn NotificationSink>,
        interval: Duration,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            status_probe,
            passport_probe,
            sink,
            tracker: ChangeTracker::new(),
            interval,
            attempt_timeout,
        }
    }

    /// Tick forever. Meant to be spawned once at startup; it has no
    /// synchronous caller, so every error ends at a log line here.
    pub async fn run(self: Arc<Self>) {
        info!(
            "sweep scheduler started: interval={:?} attempt_timeout={:?}",
            self.interval, self.attempt_timeout
        );
        let mut ticker = tokio::time::interval(self.interval);
        // A sweep longer than the interval must not cause a burst of
        // back-to-back sweeps afterwards.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.sweep().await;
        }
    }

    /// One pass over every registered application. A failure on one
    /// application is logged and the rest are still processed.
    pub async fn sweep(&self) {
        let records = match self.registry.scan_all().await {
            Ok(records) => records,
            Err(e) => {
                warn!("sweep aborted, registry scan failed: {}", e);
                return;
            }
        };

        debug!("sweep start: {} registered applications", records.len());
        let mut failures = 0usize;

        for (key, raw) in &records {
            let app = match parse_record(key, raw) {
                Ok(app) => app,
                Err(e) => {
                    warn!("skipping record: {}", e);
                    failures += 1;
                    continue;
                }
            };
            if !self.check_application(&app).await {
                failures += 1;
            }
        }

        info!(
            "sweep complete: {} applications, {} with failures, {} tracked",
            records.len(),
            failures,
            self.tracker.len()
        );
    }

    /// Run both poll paths for one application. Returns `false` when either
    /// path failed (for the sweep summary only — failures never propagate).
    async fn check_application(&self, app: &Application) -> bool {
        let mut clean = true;

        // Path 1: page scrape, change-gated notification.
        match self.with_deadline(self.status_probe.scrape(app)).await {
            Ok(mut snapshot) => {
                snapshot.code = 200;
                if self.tracker.update(&app.application_id, snapshot.clone()) {
                    info!(
                        "status change: application_id={} status={:?}",
                        app.application_id, snapshot.status
                    );
                    let payload = format::visa_status_payload(app, &snapshot);
                    if let Err(e) = self.sink.send(&payload).await {
                        warn!("visa-status notification failed ({}): {}", e.kind(), e);
                        clean = false;
                    }
                } else {
                    debug!("status unchanged: application_id={}", app.application_id);
                }
            }
            Err(e) => {
                warn!(
                    "visa status check failed ({}): application_id={} {}",
                    e.kind(),
                    app.application_id,
                    e
                );
                clean = false;
            }
        }

        // Path 2: mail round-trip. Runs regardless of the scrape outcome and
        // notifies on every success, not just on change — the passport
        // consumers want the reminder each sweep.
        match self.with_deadline(self.passport_probe.track(app)).await {
            Ok(mut snapshot) => {
                snapshot.code = 200;
                let payload = format::passport_status_payload(app, &snapshot);
                if let Err(e) = self.sink.send(&payload).await {
                    warn!("passport notification failed ({}): {}", e.kind(), e);
                    clean = false;
                }
            }
            Err(e) => {
                warn!(
                    "passport tracking failed ({}): application_id={} {}",
                    e.kind(),
                    app.application_id,
                    e
                );
                clean = false;
            }
        }

        clean
    }

    async fn with_deadline<T>(
        &self,
        attempt: impl Future<Output = Result<T, CheckError>>,
    ) -> Result<T, CheckError> {
        match tokio::time::timeout(self.attempt_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(CheckError::Transient(format!(
                "attempt deadline of {:?} expired",
                self.attempt_timeout
            ))),
        }
    }
}
