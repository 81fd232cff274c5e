use anyhow::Result;
use chrono::Local;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use super::control::{Cancelled, CancellationController};
use super::events::EngineEvent;
use super::hwaccel::HwAccelInfo;
use super::job::ExtractionJob;
use super::metadata::probe;
use super::plan::{ImageFormat, SamplingMode, TimeRange, build_plan};
use super::progress::ProgressProtocol;
use super::single::SingleJobEngine;
use crate::tools::{ensure_directory_exists, format_duration, scan_video_files};

/// 一個批次項目的處理結果，加入清單後不再修改
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    pub file_name: String,
    pub size_mb: f64,
    pub duration_display: String,
    pub frame_rate_display: String,
    pub planned_frame_count: u64,
    pub outcome: JobOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Failed(String),
}

impl JobResult {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Success)
    }
}

/// 批次執行的設定；硬體加速在批次開始前偵測一次後傳入
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub folder: PathBuf,
    pub mode: SamplingMode,
    pub format: ImageFormat,
    pub jpeg_quality: u8,
    pub ffmpeg_threads: u32,
    pub protocol: ProgressProtocol,
    pub hwaccel: HwAccelInfo,
}

/// 批次結束時回傳的報告
#[derive(Debug)]
pub struct BatchReport {
    pub output_root: PathBuf,
    pub results: Vec<JobResult>,
    pub total_files: usize,
}

/// 走訪資料夾、逐檔執行擷取任務並彙整結果
///
/// 單一檔案失敗只記錄結果、不中斷批次；取消則停止整個批次，
/// 之後不再記錄任何項目。
pub struct BatchCoordinator {
    config: BatchConfig,
    controller: CancellationController,
    events: Sender<EngineEvent>,
}

impl BatchCoordinator {
    #[must_use]
    pub const fn new(
        config: BatchConfig,
        controller: CancellationController,
        events: Sender<EngineEvent>,
    ) -> Self {
        Self {
            config,
            controller,
            events,
        }
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    /// 執行整個批次；不論處理了多少項目，結束時一定發出 Finished
    pub fn run(&self) -> Result<BatchReport> {
        let output_root = self.config.folder.join(format!(
            "幀擷取_{}",
            Local::now().format("%Y%m%d_%H%M%S")
        ));
        ensure_directory_exists(&output_root)?;

        // 模式公告在第一個項目開始前發出
        self.emit(EngineEvent::Status(self.config.hwaccel.mode_notice()));
        self.emit(EngineEvent::Status(format!(
            "輸出資料夾: {}",
            output_root.display()
        )));

        let files = scan_video_files(&self.config.folder)?;
        let total = files.len();
        info!("批次開始，共 {total} 個影片檔案");

        let engine = SingleJobEngine::new(
            self.controller.clone(),
            self.events.clone(),
            self.config.protocol,
        );

        let mut results = Vec::new();
        let mut done = 0usize;

        for file in &files {
            if self.controller.checkpoint().is_err() {
                info!("批次被中止，已處理 {done}/{total}");
                break;
            }

            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            self.emit(EngineEvent::Status(format!(
                "處理中: {} ({}/{})",
                name,
                done + 1,
                total
            )));

            match self.process_item(&engine, file, &output_root) {
                Ok(result) => {
                    if let JobOutcome::Failed(reason) = &result.outcome {
                        warn!("項目失敗 {}: {reason}", file.display());
                    }
                    self.emit(EngineEvent::ItemDone(result.clone()));
                    results.push(result);
                }
                // 取消：不再記錄這個項目，也不開始後續項目
                Err(_) => break,
            }

            done += 1;
            self.emit(EngineEvent::BatchProgress { done, total });
        }

        self.emit(EngineEvent::Finished);
        Ok(BatchReport {
            output_root,
            results,
            total_files: total,
        })
    }

    /// 處理一個批次項目；只有取消會回傳 Err，
    /// 其餘失敗都轉成 Failed 的 JobResult
    fn process_item(
        &self,
        engine: &SingleJobEngine,
        source: &Path,
        output_root: &Path,
    ) -> Result<JobResult, Cancelled> {
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let size_mb = fs::metadata(source)
            .map(|m| m.len() as f64 / 1024.0 / 1024.0)
            .unwrap_or(0.0);

        // 探測失敗只影響這個項目；但停止要求優先於記錄失敗結果
        let metadata = match probe(source) {
            Ok(metadata) => metadata,
            Err(e) => {
                self.controller.checkpoint()?;
                return Ok(JobResult {
                    file_name,
                    size_mb,
                    duration_display: "讀取失敗".to_string(),
                    frame_rate_display: "-".to_string(),
                    planned_frame_count: 0,
                    outcome: JobOutcome::Failed(e.to_string()),
                });
            }
        };
        self.controller.checkpoint()?;

        let plan = build_plan(TimeRange::full(), self.config.mode, &metadata);
        let duration_display = format_duration(metadata.duration_seconds);
        let frame_rate_display = if metadata.frame_rate > 0.0 {
            format!("{:.2}", metadata.frame_rate)
        } else {
            "未知".to_string()
        };

        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        let job = ExtractionJob {
            source_path: source.to_path_buf(),
            output_directory: output_root.join(stem),
            range: TimeRange::full(),
            mode: self.config.mode,
            format: self.config.format,
            jpeg_quality: self.config.jpeg_quality,
            use_hwaccel: self.config.hwaccel.cuda_available,
            ffmpeg_threads: self.config.ffmpeg_threads,
            metadata,
        };

        let outcome = match engine.run(&job) {
            Ok(_) => JobOutcome::Success,
            Err(e) if e.is::<Cancelled>() => return Err(Cancelled),
            Err(e) => JobOutcome::Failed(e.to_string()),
        };

        Ok(JobResult {
            file_name,
            size_mb,
            duration_display,
            frame_rate_display,
            planned_frame_count: plan.expected_frame_count,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::hwaccel::HwAccelInfo;
    use std::sync::mpsc;

    fn batch_config(folder: &Path) -> BatchConfig {
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
    fn test_empty_folder_finishes_with_no_results() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel();
        let coordinator = BatchCoordinator::new(
            batch_config(dir.path()),
            CancellationController::new(),
            tx,
        );

        let report = coordinator.run().unwrap();
        assert!(report.results.is_empty());
        assert_eq!(report.total_files, 0);
        assert!(report.output_root.exists());

        let events: Vec<EngineEvent> = rx.try_iter().collect();
        assert!(matches!(events.last(), Some(EngineEvent::Finished)));
    }

    #[test]
    fn test_stopped_batch_records_no_items() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"not a real video").unwrap();
        std::fs::write(dir.path().join("b.mp4"), b"not a real video").unwrap();

        let (tx, rx) = mpsc::channel();
        let controller = CancellationController::new();
        controller.request_stop();
        let coordinator = BatchCoordinator::new(batch_config(dir.path()), controller, tx);

        let report = coordinator.run().unwrap();
        assert!(report.results.is_empty());
        assert_eq!(report.total_files, 2);

        let events: Vec<EngineEvent> = rx.try_iter().collect();
        assert!(matches!(events.last(), Some(EngineEvent::Finished)));
        assert!(!events.iter().any(|e| matches!(e, EngineEvent::ItemDone(_))));
    }
}
