//! Sweep semantics against scripted probes: change gating, idempotence,
//! completeness under partial failure, and the unconditional passport path.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use visa_sentinel::core::errors::CheckError;
use visa_sentinel::core::types::{Application, NotificationPayload, StatusSnapshot};
use visa_sentinel::mail::PassportProbe;
use visa_sentinel::notify::NotificationSink;
use visa_sentinel::registry::{ApplicationRegistry, MemoryRegistry};
use visa_sentinel::scraping::StatusProbe;
use visa_sentinel::Sweeper;

fn app(id: &str) -> Application {
    Application {
        location: "BEJ".into(),
        application_id: id.into(),
        passport_number: "P123".into(),
        surname_prefix: "ZHANG".into(),
    }
}

fn snap(status: &str) -> StatusSnapshot {
    StatusSnapshot {
        status: status.into(),
        ..Default::default()
    }
}

/// Per-application scripted scrape results, consumed front to back. Once a
/// script runs dry the last step repeats.
#[derive(Default)]
struct ScriptedStatusProbe {
    scripts: Mutex<HashMap<String, VecDeque<Result<StatusSnapshot, String>>>>,
    calls: AtomicUsize,
}

impl ScriptedStatusProbe {
    fn push(&self, id: &str, step: Result<StatusSnapshot, String>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .push_back(step);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusProbe for ScriptedStatusProbe {
    async fn scrape(&self, app: &Application) -> Result<StatusSnapshot, CheckError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts
            .entry(app.application_id.clone())
            .or_default();
        let step = if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap_or(Err("unscripted".into()))
        };
        step.map_err(CheckError::Transient)
    }
}

/// Passport probe that always fails — silences path 2 in tests about path 1.
struct DownPassportProbe;

#[async_trait]
impl PassportProbe for DownPassportProbe {
    async fn track(&self, _app: &Application) -> Result<StatusSnapshot, CheckError> {
        Err(CheckError::Transport("mail server down".into()))
    }
}

/// Passport probe that always answers the same status.
struct SteadyPassportProbe;

#[async_trait]
impl PassportProbe for SteadyPassportProbe {
    async fn track(&self, _app: &Application) -> Result<StatusSnapshot, CheckError> {
        Ok(snap("护照已寄出"))
    }
}

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<NotificationPayload>>,
}

impl RecordingSink {
    fn sent(&self) -> Vec<NotificationPayload> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, payload: &NotificationPayload) -> Result<(), CheckError> {
        self.sent.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

fn sweeper(
    registry: Arc<MemoryRegistry>,
    status: Arc<ScriptedStatusProbe>,
    passport: Arc<dyn PassportProbe>,
    sink: Arc<RecordingSink>,
) -> Sweeper {
    Sweeper::new(
        registry,
        status,
        passport,
        sink,
        Duration::from_secs(60),
        Duration::from_secs(5),
    )
}

#[tokio::test]
async fn end_to_end_change_detection_scenario() {
    let registry = Arc::new(MemoryRegistry::new());
    registry.put(&app("AA001")).await.unwrap();

    let status = Arc::new(ScriptedStatusProbe::default());
    status.push("AA001", Ok(snap("In Process")));
    status.push("AA001", Ok(snap("In Process")));
    status.push("AA001", Ok(snap("Issued")));

    let sink = Arc::new(RecordingSink::default());
    let sweeper = sweeper(
        registry,
        status,
        Arc::new(DownPassportProbe),
        sink.clone(),
    );

    // Sweep 1: first observation is a change.
    sweeper.sweep().await;
    let sent = sink.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].user_name, "AA001");
    assert!(sent[0].remark.contains("AA001"));
    assert!(sent[0].remark.contains("In Process"));

    // Sweep 2: identical snapshot, no notification from the change path.
    sweeper.sweep().await;
    assert_eq!(sink.sent().len(), 1);

    // Sweep 3: new status, second notification.
    sweeper.sweep().await;
    let sent = sink.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].remark.contains("Issued"));
}

#[tokio::test]
async fn unbroken_identical_run_notifies_at_most_once() {
    let registry = Arc::new(MemoryRegistry::new());
    registry.put(&app("AA001")).await.unwrap();

    let status = Arc::new(ScriptedStatusProbe::default());
    status.push("AA001", Ok(snap("In Process")));

    let sink = Arc::new(RecordingSink::default());
    let sweeper = sweeper(
        registry,
        status,
        Arc::new(DownPassportProbe),
        sink.clone(),
    );

    for _ in 0..5 {
        sweeper.sweep().await;
    }
    assert_eq!(sink.sent().len(), 1);
}

#[tokio::test]
async fn sweep_processes_all_applications_when_one_fails() {
    let registry = Arc::new(MemoryRegistry::new());
    registry.put(&app("AA001")).await.unwrap();
    registry.put(&app("BB002")).await.unwrap();
    registry.put(&app("CC003")).await.unwrap();

    let status = Arc::new(ScriptedStatusProbe::default());
    status.push("AA001", Ok(snap("In Process")));
    status.push("BB002", Err("form field never appeared".into()));
    status.push("CC003", Ok(snap("Issued")));

    let sink = Arc::new(RecordingSink::default());
    let sweeper = sweeper(
        registry,
        status.clone(),
        Arc::new(DownPassportProbe),
        sink.clone(),
    );
    sweeper.sweep().await;

    // All three were attempted, and the two healthy ones still notified.
    assert_eq!(status.calls(), 3);
    let names: Vec<_> = sink.sent().iter().map(|p| p.user_name.clone()).collect();
    assert_eq!(names, vec!["AA001", "CC003"]);
}

#[tokio::test]
async fn malformed_registry_record_is_skipped_not_fatal() {
    let registry = Arc::new(MemoryRegistry::new());
    registry.put(&app("AA001")).await.unwrap();
    registry.put_raw("ZZ999", "{definitely not json");

    let status = Arc::new(ScriptedStatusProbe::default());
    status.push("AA001", Ok(snap("In Process")));

    let sink = Arc::new(RecordingSink::default());
    let sweeper = sweeper(
        registry,
        status.clone(),
        Arc::new(DownPassportProbe),
        sink.clone(),
    );
    sweeper.sweep().await;

    // Only the well-formed record reached the probe.
    assert_eq!(status.calls(), 1);
    assert_eq!(sink.sent().len(), 1);
}

#[tokio::test]
async fn passport_path_notifies_every_sweep_regardless_of_change() {
    let registry = Arc::new(MemoryRegistry::new());
    registry.put(&app("AA001")).await.unwrap();

    let status = Arc::new(ScriptedStatusProbe::default());
    status.push("AA001", Ok(snap("In Process")));

    let sink = Arc::new(RecordingSink::default());
    let sweeper = sweeper(
        registry,
        status,
        Arc::new(SteadyPassportProbe),
        sink.clone(),
    );

    sweeper.sweep().await;
    sweeper.sweep().await;
    sweeper.sweep().await;

    let passport_notifications: Vec<_> = sink
        .sent()
        .into_iter()
        .filter(|p| p.appt_time == "美签护照状态查询")
        .collect();
    // One per sweep, even though the passport status never changed.
    assert_eq!(passport_notifications.len(), 3);
    assert!(passport_notifications[0].remark.contains("护照已寄出"));
}

#[tokio::test]
async fn attempt_deadline_bounds_a_hung_probe() {
    struct HungProbe;

    #[async_trait]
    impl StatusProbe for HungProbe {
        async fn scrape(&self, _app: &Application) -> Result<StatusSnapshot, CheckError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
    }

    let registry = Arc::new(MemoryRegistry::new());
    registry.put(&app("AA001")).await.unwrap();

    let sink = Arc::new(RecordingSink::default());
    let sweeper = Sweeper::new(
        registry,
        Arc::new(HungProbe),
        Arc::new(DownPassportProbe),
        sink.clone(),
        Duration::from_secs(60),
        Duration::from_millis(50),
    );

    // Completes promptly instead of blocking the worker forever.
    tokio::time::timeout(Duration::from_secs(5), sweeper.sweep())
        .await
        .expect("sweep should respect the attempt deadline");
    assert!(sink.sent().is_empty());
}
