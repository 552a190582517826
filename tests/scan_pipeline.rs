//! End-to-end tests for the scan pipeline.
//!
//! Coverage:
//! 1. Known digests for a nested folder
//! 2. Unreadable files produce error records without stopping the run
//! 3. Files removed while paused are recorded as errors
//! 4. Pause/resume yields the same records as an uninterrupted run
//! 5. Stop keeps the records produced so far
//! 6. Progress events are monotonic and end at 100%
//! 7. CSV export of a finished run

use std::fs;
use std::path::{Path, PathBuf};

use hashsentry::core::config::ScanConfig;
use hashsentry::scanner::{ResultTable, ScanController, ScanEvent, ScanHandle, ScanSource};
use hashsentry::ui::report::{export_records, ReportFormat};
use hashsentry::{DigestKind, DigestOutcome, FileRecord, ScanState};
use tempfile::tempdir;

const ABC_MD5: &str = "900150983cd24fb0d6963f7d28e17f72";
const ABC_SHA1: &str = "a9993e364706816aba3e25717850c26c9cd0d89d";
const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

fn fast_controller() -> ScanController {
    ScanController::new(&ScanConfig {
        pause_poll_ms: 5,
        ..ScanConfig::default()
    })
}

fn populate(dir: &Path, count: usize) {
    for i in 0..count {
        fs::write(dir.join(format!("file_{:04}.dat", i)), format!("payload {}", i)).unwrap();
    }
}

/// Explicit list led by an 8 MiB file, so a control call made right after
/// `start` lands before the second file.
fn slow_first_list(dir: &Path, small: usize) -> Vec<PathBuf> {
    let large = dir.join("large.bin");
    fs::write(&large, vec![0x5a_u8; 8 << 20]).unwrap();
    populate(dir, small);
    let mut list = vec![large];
    list.extend((0..small).map(|i| dir.join(format!("file_{:04}.dat", i))));
    list
}

/// Drain events until the worker reports it is paused. Returns how many
/// files were hashed before that and the last percentage seen.
async fn drain_until_paused(handle: &mut ScanHandle) -> (usize, Option<f64>) {
    let mut hashed = 0;
    let mut percentage = None;
    while let Some(event) = handle.next_event().await {
        match event {
            ScanEvent::FileHashed(_) => hashed += 1,
            ScanEvent::Progress(progress) => percentage = Some(progress.percentage),
            ScanEvent::Paused => return (hashed, percentage),
            _ => {}
        }
    }
    panic!("scan ended without pausing");
}

fn digest_map(records: &[FileRecord]) -> Vec<(PathBuf, DigestOutcome)> {
    let mut pairs: Vec<_> = records
        .iter()
        .map(|r| (r.path.clone(), r.digests.clone()))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
}

#[tokio::test]
async fn test_known_digests_for_nested_folder() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("sub").join("abc.txt"), "abc").unwrap();
    fs::write(dir.path().join("empty"), "").unwrap();

    let controller = fast_controller();
    let handle = controller
        .start(ScanSource::Directory(dir.path().to_path_buf()))
        .await
        .unwrap();
    assert_eq!(handle.total_files(), 2);

    let report = handle.join().await.unwrap();
    assert_eq!(report.state, ScanState::Completed);
    assert_eq!(report.error_count(), 0);

    let mut table = ResultTable::new();
    table.extend(report.records);

    let expected_rel = Path::new("sub").join("abc.txt").to_string_lossy().into_owned();
    let abc = table
        .records()
        .iter()
        .find(|r| r.relative_path == expected_rel)
        .unwrap();
    let digests = abc.digests.digests().unwrap();
    assert_eq!(digests.md5, ABC_MD5);
    assert_eq!(digests.sha1, ABC_SHA1);
    assert_eq!(digests.sha256, ABC_SHA256);
    assert_eq!(abc.extension, ".txt");
    assert_eq!(abc.size_bytes, Some(3));

    let empty = table
        .records()
        .iter()
        .find(|r| r.relative_path == "empty")
        .unwrap();
    assert_eq!(empty.digests.column(DigestKind::Sha256), EMPTY_SHA256);
    assert_eq!(empty.extension, "No Extension");
    assert_eq!(table.statistics().total_bytes, 3);
}

#[cfg(unix)]
#[tokio::test]
async fn test_unreadable_file_is_recorded_as_error() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    populate(dir.path(), 2);
    let locked = dir.path().join("locked.bin");
    fs::write(&locked, "secret").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Privileged users can read it anyway.
    if fs::read(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
        return;
    }

    let controller = fast_controller();
    let report = controller
        .start(ScanSource::Directory(dir.path().to_path_buf()))
        .await
        .unwrap()
        .join()
        .await
        .unwrap();

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    assert_eq!(report.state, ScanState::Completed);
    assert_eq!(report.records.len(), 3);
    assert_eq!(report.error_count(), 1);

    let failed = report.records.iter().find(|r| r.path.ends_with("locked.bin")).unwrap();
    for kind in DigestKind::PREFERENCE {
        assert!(failed.digests.column(kind).starts_with("Error: "));
    }
}

#[tokio::test]
async fn test_files_removed_while_paused_are_errors() {
    let dir = tempdir().unwrap();
    let list = slow_first_list(dir.path(), 4);
    let removed = [list[1].clone(), list[3].clone()];

    let controller = fast_controller();
    let mut handle = controller.start(ScanSource::Files(list)).await.unwrap();
    controller.pause().unwrap();
    assert!(drain_until_paused(&mut handle).await.0 <= 1);

    for path in &removed {
        fs::remove_file(path).unwrap();
    }
    controller.resume().unwrap();
    while handle.next_event().await.is_some() {}

    let report = handle.join().await.unwrap();
    assert_eq!(report.state, ScanState::Completed);
    assert_eq!(report.records.len(), 5);
    assert_eq!(report.error_count(), 2);
    for path in &removed {
        let record = report.records.iter().find(|r| &r.path == path).unwrap();
        assert_eq!(record.size_bytes, None);
        for kind in DigestKind::PREFERENCE {
            assert!(record.digests.column(kind).starts_with("Error: "));
        }
    }
}

#[tokio::test]
async fn test_pause_resume_matches_uninterrupted_run() {
    let dir = tempdir().unwrap();
    let list = slow_first_list(dir.path(), 40);

    let controller = fast_controller();
    let baseline = controller
        .start(ScanSource::Files(list.clone()))
        .await
        .unwrap()
        .join()
        .await
        .unwrap();
    assert_eq!(baseline.state, ScanState::Completed);
    assert_eq!(baseline.records.len(), 41);

    let mut handle = controller.start(ScanSource::Files(list)).await.unwrap();
    controller.pause().unwrap();
    let (before, _) = drain_until_paused(&mut handle).await;
    assert!(before <= 1);
    assert_eq!(controller.state(), ScanState::Paused);

    controller.resume().unwrap();
    let mut saw_resumed = false;
    let mut hashed_after = 0;
    while let Some(event) = handle.next_event().await {
        match event {
            ScanEvent::Resumed => saw_resumed = true,
            ScanEvent::FileHashed(_) => hashed_after += 1,
            _ => {}
        }
    }
    let resumed = handle.join().await.unwrap();

    assert!(saw_resumed);
    assert_eq!(before + hashed_after, 41);
    assert_eq!(resumed.state, ScanState::Completed);
    assert_eq!(digest_map(&resumed.records), digest_map(&baseline.records));
}

#[tokio::test]
async fn test_stop_keeps_partial_records() {
    let dir = tempdir().unwrap();
    let list = slow_first_list(dir.path(), 40);

    let controller = fast_controller();
    let mut handle = controller.start(ScanSource::Files(list)).await.unwrap();
    controller.pause().unwrap();
    let (hashed, mut last_percentage) = drain_until_paused(&mut handle).await;
    assert!(hashed <= 1);
    controller.stop().unwrap();

    let mut finished = None;
    while let Some(event) = handle.next_event().await {
        match event {
            ScanEvent::Progress(progress) => last_percentage = Some(progress.percentage),
            ScanEvent::FileHashed(_) => panic!("file hashed after stop"),
            ScanEvent::Finished { state, processed, .. } => finished = Some((state, processed)),
            _ => {}
        }
    }

    let report = handle.join().await.unwrap();
    assert_eq!(report.state, ScanState::Stopped);
    assert_eq!(controller.state(), ScanState::Stopped);
    assert_eq!(report.records.len(), hashed);
    assert_eq!(report.total_files, 41);
    assert_eq!(finished, Some((ScanState::Stopped, hashed as u64)));
    assert!(last_percentage.unwrap_or(0.0) < 100.0);
    assert!(report.records.iter().all(|r| !r.digests.is_error()));

    // Further control calls on a finished run are rejected.
    assert!(controller.pause().is_err());
    assert!(controller.stop().is_err());
}

#[tokio::test]
async fn test_progress_is_monotonic() {
    let dir = tempdir().unwrap();
    populate(dir.path(), 25);

    let controller = fast_controller();
    let mut handle = controller
        .start(ScanSource::Directory(dir.path().to_path_buf()))
        .await
        .unwrap();

    let mut indices = Vec::new();
    let mut last_percentage = 0.0;
    let mut hashed = 0;
    let mut finished = None;
    while let Some(event) = handle.next_event().await {
        match event {
            ScanEvent::Progress(progress) => {
                assert!(progress.percentage >= last_percentage);
                assert_eq!(progress.total_count, 25);
                last_percentage = progress.percentage;
                indices.push(progress.current_index);
            }
            ScanEvent::FileHashed(_) => hashed += 1,
            ScanEvent::Finished { state, processed, .. } => finished = Some((state, processed)),
            _ => {}
        }
    }

    assert_eq!(indices, (1..=25).collect::<Vec<u64>>());
    assert_eq!(last_percentage, 100.0);
    assert_eq!(hashed, 25);
    assert_eq!(finished, Some((ScanState::Completed, 25)));
    handle.join().await.unwrap();
}

#[tokio::test]
async fn test_export_finished_run_to_csv() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    fs::write(data.join("abc.txt"), "abc").unwrap();

    let controller = fast_controller();
    let report = controller
        .start(ScanSource::Files(vec![data.join("abc.txt")]))
        .await
        .unwrap()
        .join()
        .await
        .unwrap();

    let out = dir.path().join("results.csv");
    let rows = export_records(&report.records, ReportFormat::from_path(&out), &out).unwrap();
    assert_eq!(rows, 1);

    let text = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Selected,Type,Filename,Path,Size,Extension,MD5,SHA1,SHA256");
    assert!(lines[1].starts_with("\u{2610},Files,abc.txt,"));
    assert!(lines[1].ends_with(&format!("{},{},{}", ABC_MD5, ABC_SHA1, ABC_SHA256)));
}
