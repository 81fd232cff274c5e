//! 整合測試 - 驗證掃描、計畫、進度與批次協調的整體行為
//!
//! 不依賴真實影片檔，批次測試使用內容損壞的假影片檔，
//! 驗證逐檔容錯與取消行為。

use std::fs;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use video_frame_extract::engine::{
    BatchConfig, BatchCoordinator, CancellationController, EngineEvent, HwAccelInfo,
    ImageFormat, ProgressProtocol, ProgressTracker, SamplingMode, TimeRange, VideoMetadata,
    build_plan,
};
use video_frame_extract::tools::{is_video_file, scan_video_files};

fn sample_metadata(duration: f64, fps: f64) -> VideoMetadata {
    VideoMetadata {
        path: "/v/sample.mp4".into(),
        duration_seconds: duration,
        width: 1920,
        height: 1080,
        frame_rate: fps,
        total_frames: 0,
    }
}

fn batch_config(folder: &std::path::Path) -> BatchConfig {
    BatchConfig {
        folder: folder.to_path_buf(),
        mode: SamplingMode::IntervalSeconds(5.0),
        format: ImageFormat::Png,
        jpeg_quality: 85,
        ffmpeg_threads: 1,
        protocol: ProgressProtocol::KeyValue,
        hwaccel: HwAccelInfo::default(),
    }
}

#[test]
fn test_scan_filters_and_sorts() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("b.mp4"), b"x").unwrap();
    fs::write(dir.path().join("a.MOV"), b"x").unwrap();
    fs::write(dir.path().join("notes.txt"), b"x").unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("sub/c.mkv"), b"x").unwrap();

    let files = scan_video_files(dir.path()).unwrap();
    let names: Vec<String> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();

    assert_eq!(names, vec!["a.MOV", "b.mp4", "c.mkv"]);
    assert!(files.iter().all(|p| is_video_file(p)));
}

/// 計畫與進度追蹤的端對端：100 秒影片每 10 秒取 1 幀
#[test]
fn test_plan_and_progress_end_to_end() {
    let metadata = sample_metadata(100.0, 30.0);
    let plan = build_plan(
        TimeRange::full(),
        SamplingMode::IntervalSeconds(10.0),
        &metadata,
    );
    assert_eq!(plan.expected_frame_count, 10);
    assert_eq!(plan.filter_expression, "fps=1/10");

    let mut tracker = ProgressTracker::new(
        ProgressProtocol::KeyValue,
        SamplingMode::IntervalSeconds(10.0),
        &plan,
    );
    // out_time_ms 實為微秒
    assert!(tracker.feed_line("out_time_ms=50000000"));
    assert_eq!(tracker.state().percent, 50);
    assert_eq!(tracker.state().extracted_frames, 5);

    // 進度只增不減
    assert!(!tracker.feed_line("out_time_ms=30000000"));
    assert_eq!(tracker.state().percent, 50);

    assert!(tracker.feed_line("progress=end"));
    assert_eq!(tracker.state().percent, 100);
}

/// 批次逐檔容錯：壞掉的影片檔只讓該項目失敗，批次仍跑完全部
#[test]
fn test_batch_tolerates_broken_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.mp4"), b"not a real video").unwrap();
    fs::write(dir.path().join("b.mp4"), b"also not a real video").unwrap();

    let (tx, rx) = mpsc::channel();
    let coordinator =
        BatchCoordinator::new(batch_config(dir.path()), CancellationController::new(), tx);

    let report = coordinator.run().unwrap();
    assert_eq!(report.total_files, 2);
    assert_eq!(report.results.len(), 2);
    assert!(report.results.iter().all(|r| !r.is_success()));
    assert!(report.output_root.exists());

    let events: Vec<EngineEvent> = rx.try_iter().collect();
    let item_done = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::ItemDone(_)))
        .count();
    assert_eq!(item_done, 2);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, EngineEvent::BatchProgress { done: 2, total: 2 }))
    );
    assert!(matches!(events.last(), Some(EngineEvent::Finished)));
}

/// 批次開始前就要求停止：不處理也不記錄任何項目，但仍發出 Finished
#[test]
fn test_batch_stopped_before_start_records_nothing() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.mp4"), b"not a real video").unwrap();

    let (tx, rx) = mpsc::channel();
    let controller = CancellationController::new();
    controller.request_stop();
    let coordinator = BatchCoordinator::new(batch_config(dir.path()), controller, tx);

    let report = coordinator.run().unwrap();
    assert!(report.results.is_empty());
    assert_eq!(report.total_files, 1);

    let events: Vec<EngineEvent> = rx.try_iter().collect();
    assert!(!events.iter().any(|e| matches!(e, EngineEvent::ItemDone(_))));
    assert!(matches!(events.last(), Some(EngineEvent::Finished)));
}

/// 暫停中的批次卡在第一個項目前，停止要求能把它喚醒
#[test]
fn test_paused_batch_blocks_until_stop() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.mp4"), b"not a real video").unwrap();

    let (tx, rx) = mpsc::channel();
    let controller = CancellationController::new();
    controller.pause();

    let coordinator = BatchCoordinator::new(batch_config(dir.path()), controller.clone(), tx);
    let worker = thread::spawn(move || coordinator.run());

    // 暫停期間不應處理任何項目
    thread::sleep(Duration::from_millis(200));
    assert!(
        !rx.try_iter()
            .any(|e| matches!(e, EngineEvent::ItemDone(_)))
    );

    controller.request_stop();
    let report = worker.join().unwrap().unwrap();
    assert!(report.results.is_empty());
}
