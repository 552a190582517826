//! End-to-end tests for quota-gated lookups.
//!
//! Coverage:
//! 1. Paced batch with a not-found digest in the middle
//! 2. Batch at the quota ceiling fails fast without extra requests
//! 3. Quota persistence and pruning through the file tier
//! 4. Scan results feeding the lookup queue
//! 5. Lookup CSV export

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use hashsentry::reputation::quota::{FileBackend, QuotaBackend, QuotaLimits, QuotaRecord};
use hashsentry::reputation::{
    BatchEvent, BatchState, LookupBatchRunner, LookupClient, LookupItem, LookupStatus,
    MockProvider, QuotaStore,
};
use hashsentry::scanner::{ResultTable, ScanController, ScanSource};
use hashsentry::ui::report::{export_lookups, ReportFormat};
use tempfile::tempdir;
use tokio::sync::mpsc;

const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

fn file_store(path: &Path, limits: QuotaLimits) -> Arc<QuotaStore> {
    let tiers: Vec<Box<dyn QuotaBackend>> = vec![Box::new(FileBackend::new(path))];
    Arc::new(QuotaStore::new(limits, tiers))
}

fn runner(mock: &Arc<MockProvider>, quota: &Arc<QuotaStore>, pacing: Duration) -> LookupBatchRunner {
    LookupBatchRunner::new(
        LookupClient::new(Box::new(Arc::clone(mock)), Arc::clone(quota)),
        pacing,
    )
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_paced_batch_with_not_found_in_middle() {
    let (a, b, c) = ("a".repeat(64), "b".repeat(64), "c".repeat(64));
    let mock = Arc::new(
        MockProvider::new()
            .with_report(&a, 3, 1, 60)
            .with_report(&c, 0, 0, 70),
    );
    let quota = Arc::new(QuotaStore::in_memory(QuotaLimits::default()));
    let runner = runner(&mock, &quota, Duration::from_secs(16));

    let mut items: Vec<LookupItem> = [&a, &b, &c]
        .iter()
        .map(|d| LookupItem::from_digest(d).unwrap())
        .collect();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let started = tokio::time::Instant::now();
    let summary = runner.run(&mut items, &tx).await.unwrap();
    let elapsed = started.elapsed();

    // Two gaps, none after the last item.
    assert!(elapsed >= Duration::from_secs(32));
    assert!(elapsed < Duration::from_secs(33));

    assert_eq!(summary.state, BatchState::Completed);
    assert_eq!(summary.malicious, 1);
    assert_eq!(summary.clean, 2);
    assert_eq!(summary.errors, 0);

    assert_eq!(items[0].status, LookupStatus::Malicious);
    assert_eq!(items[0].count_columns(), ["3".to_string(), "1".into(), "60".into()]);
    assert_eq!(items[1].status, LookupStatus::NotFound);
    assert_eq!(items[1].count_columns(), ["0".to_string(), "0".into(), "0".into()]);
    assert_eq!(items[1].last_scan_display(), "Not scanned");
    assert_eq!(items[2].status, LookupStatus::Clean);

    assert_eq!(mock.requested(), vec![a, b, c]);
    assert_eq!(quota.status().unwrap().daily_used, 3);

    let mut waits = 0;
    while let Ok(event) = rx.try_recv() {
        if let BatchEvent::Waiting { delay, .. } = event {
            assert_eq!(delay, Duration::from_secs(16));
            waits += 1;
        }
    }
    assert_eq!(waits, 2);
}

#[tokio::test(start_paused = true)]
async fn test_batch_at_quota_ceiling_fails_fast() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("quota.json");
    let limits = QuotaLimits {
        daily: 2,
        monthly: 100,
    };
    let quota = file_store(&path, limits);
    quota.record_usage(1).unwrap();

    let mock = Arc::new(MockProvider::new());
    let runner = runner(&mock, &quota, Duration::from_secs(16));
    let mut items: Vec<LookupItem> = ["1", "2", "3", "4"]
        .iter()
        .map(|d| LookupItem::from_digest(&d.repeat(32)).unwrap())
        .collect();
    let (tx, _rx) = mpsc::unbounded_channel();

    let started = tokio::time::Instant::now();
    let summary = runner.run(&mut items, &tx).await.unwrap();

    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(mock.calls(), 1);
    assert_eq!(items[0].status, LookupStatus::NotFound);
    for item in &items[1..] {
        assert_eq!(item.status, LookupStatus::Error);
        assert!(item.error.as_deref().unwrap().contains("quota exceeded"));
    }
    assert_eq!(summary.state, BatchState::Completed);
    assert_eq!(summary.errors, 3);

    // Usage survives a restart.
    let reopened = file_store(&path, limits);
    let status = reopened.status().unwrap();
    assert_eq!(status.daily_used, 2);
    assert!(!status.can_make_request());
}

#[test]
fn test_quota_file_is_pruned_on_update() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("quota.json");
    let today = date(2024, 6, 15);

    let mut record = QuotaRecord::empty(date(2024, 6, 2));
    record.daily.insert("2024-01-01".into(), 5);
    record.daily.insert("2024-05-20".into(), 7);
    record.daily.insert("2024-06-02".into(), 4);
    record.monthly.insert("2023-01".into(), 5);
    record.monthly.insert("2024-05".into(), 7);
    record.monthly.insert("2024-06".into(), 4);
    fs::write(&path, serde_json::to_string(&record).unwrap()).unwrap();

    let quota = file_store(&path, QuotaLimits::default());
    let status = quota.record_usage_on(1, today).unwrap();
    assert_eq!(status.daily_used, 1);
    assert_eq!(status.monthly_used, 5);

    let stored: QuotaRecord = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert!(!stored.daily.contains_key("2024-01-01"));
    assert!(!stored.monthly.contains_key("2023-01"));
    assert_eq!(stored.daily.get("2024-05-20"), Some(&7));
    assert_eq!(stored.daily.get("2024-06-02"), Some(&4));
    assert_eq!(stored.daily.get("2024-06-15"), Some(&1));
    assert_eq!(stored.monthly.get("2024-06"), Some(&5));
    assert_eq!(stored.current_day, "2024-06-15");
}

#[test]
fn test_tampered_quota_file_resets() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("quota.json");
    let today = date(2024, 6, 15);

    let mut record = QuotaRecord::empty(today);
    record.daily.insert("2024-06-15".into(), 1);
    record.monthly.insert("2024-06".into(), 400);
    fs::write(&path, serde_json::to_string(&record).unwrap()).unwrap();

    let quota = file_store(&path, QuotaLimits::default());
    let status = quota.status_on(today).unwrap();
    assert_eq!(status.daily_used, 0);
    assert_eq!(status.monthly_used, 0);

    let stored: QuotaRecord = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(stored, QuotaRecord::reset(today));
}

#[tokio::test]
async fn test_scan_results_feed_lookup_queue() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("abc.txt"), "abc").unwrap();
    fs::write(dir.path().join("other.txt"), "other").unwrap();

    let report = ScanController::default()
        .start(ScanSource::Directory(dir.path().to_path_buf()))
        .await
        .unwrap()
        .join()
        .await
        .unwrap();
    let mut table = ResultTable::new();
    table.extend(report.records);
    table.toggle(&dir.path().join("abc.txt")).unwrap();

    let items_selected = table.selected_lookup_items();
    assert_eq!(items_selected.len(), 1);
    assert_eq!(items_selected[0].digest, ABC_SHA256);
    assert_eq!(items_selected[0].filename, "abc.txt");

    let mock = Arc::new(MockProvider::new().with_report(ABC_SHA256, 12, 0, 50));
    let quota = Arc::new(QuotaStore::in_memory(QuotaLimits::default()));
    let runner = runner(&mock, &quota, Duration::ZERO);
    let mut items = items_selected;
    let (tx, _rx) = mpsc::unbounded_channel();
    let summary = runner.run(&mut items, &tx).await.unwrap();

    assert_eq!(summary.malicious, 1);
    assert_eq!(items[0].status.label(), "THREAT");
    assert_eq!(items[0].last_scan_display(), "11/14/2023");

    let out = dir.path().join("lookups.csv");
    export_lookups(&items, ReportFormat::Csv, &out).unwrap();
    let text = fs::read_to_string(&out).unwrap();
    assert_eq!(
        text.lines().nth(1).unwrap(),
        format!("THREAT,SHA256,{},12,0,50,11/14/2023,abc.txt", ABC_SHA256)
    );
}
