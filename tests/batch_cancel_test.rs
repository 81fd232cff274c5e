//! 批次中途停止：已完成的項目原樣保留，之後的項目不再記錄
//!
//! 以一個慢速失敗的 ffprobe 替身拉長單一項目的處理時間，
//! 讓停止要求確定落在第一個項目完成之後、批次結束之前。
//! 獨立成一個測試檔，PATH 的改動不會影響其他測試程序。

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::sync::mpsc;
use std::thread;

use video_frame_extract::engine::{
    BatchConfig, BatchCoordinator, CancellationController, EngineEvent, HwAccelInfo,
    ImageFormat, ProgressProtocol, SamplingMode,
};

#[test]
fn test_stop_after_first_item_keeps_only_completed_results() {
    let videos = tempfile::tempdir().unwrap();
    for name in ["a.mp4", "b.mp4", "c.mp4"] {
        fs::write(videos.path().join(name), b"not a real video").unwrap();
    }

    // 每次探測耗時 1 秒後失敗，停止要求會落在第二個項目探測期間
    let stub_dir = tempfile::tempdir().unwrap();
    let stub = stub_dir.path().join("ffprobe");
    fs::write(&stub, "#!/bin/sh\nsleep 1\nexit 1\n").unwrap();
    fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).unwrap();
    let path_var = format!(
        "{}:{}",
        stub_dir.path().display(),
        std::env::var("PATH").unwrap_or_default()
    );
    // 此測試檔只有這一個測試，沒有並行讀取環境變數的執行緒
    unsafe { std::env::set_var("PATH", &path_var) };

    let (tx, rx) = mpsc::channel();
    let controller = CancellationController::new();
    let coordinator = BatchCoordinator::new(
        BatchConfig {
            folder: videos.path().to_path_buf(),
            mode: SamplingMode::IntervalSeconds(5.0),
            format: ImageFormat::Png,
            jpeg_quality: 85,
            ffmpeg_threads: 1,
            protocol: ProgressProtocol::KeyValue,
            hwaccel: HwAccelInfo::default(),
        },
        controller.clone(),
        tx,
    );

    let worker = thread::spawn(move || coordinator.run());

    // 第一個項目完成就要求停止
    let mut seen = Vec::new();
    for event in rx.iter() {
        if matches!(event, EngineEvent::ItemDone(_)) {
            controller.request_stop();
        }
        let finished = matches!(event, EngineEvent::Finished);
        seen.push(event);
        if finished {
            break;
        }
    }
    let report = worker.join().unwrap().unwrap();

    // 停止前完成的項目原樣保留，其餘一律不記錄
    assert_eq!(report.total_files, 3);
    assert_eq!(report.results.len(), 1);
    assert!(!report.results[0].is_success());

    let item_done = seen
        .iter()
        .filter(|e| matches!(e, EngineEvent::ItemDone(_)))
        .count();
    assert_eq!(item_done, report.results.len());
    assert!(matches!(seen.last(), Some(EngineEvent::Finished)));
}
