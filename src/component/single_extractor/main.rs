use anyhow::{Result, bail};
use chrono::Local;
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::config::{Config, add_recent_path, save_settings};
use crate::engine::{
    CancellationController, EngineEvent, ExtractionJob, ImageFormat, SamplingMode,
    SingleJobEngine, TimeRange, VideoMetadata, check_tools_available, detect_hwaccel, probe,
};
use crate::signal::ShutdownFlag;
use crate::tools::{
    format_duration, is_video_file, validate_directory_exists, validate_file_exists,
};

/// 單一影片的互動式幀擷取
pub struct SingleExtractor {
    config: Config,
    shutdown_signal: ShutdownFlag,
}

impl SingleExtractor {
    pub const fn new(config: Config, shutdown_signal: ShutdownFlag) -> Self {
        Self {
            config,
            shutdown_signal,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        println!("{}", style("=== 單一影片幀擷取 ===").cyan().bold());
        check_tools_available()?;

        let video_path = self.prompt_video_path()?;

        println!("{}", style("讀取影片資訊中...").dim());
        // 探測一次之後整個任務重複使用
        let metadata = probe(&video_path)?;
        Self::print_info_panel(&metadata);

        let output_base = self.prompt_output_directory()?;
        let range = Self::prompt_time_range(metadata.duration_seconds)?;
        let mode = Self::prompt_sampling_mode()?;
        let (format, jpeg_quality) = self.prompt_format()?;

        let hwaccel = detect_hwaccel();
        println!("{}", style(hwaccel.mode_notice()).dim());

        let stem = video_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let output_directory = output_base.join(format!("{stem}_幀擷取_{timestamp}"));

        let job = ExtractionJob {
            source_path: video_path.clone(),
            output_directory: output_directory.clone(),
            range,
            mode,
            format,
            jpeg_quality,
            use_hwaccel: hwaccel.cuda_available,
            ffmpeg_threads: self.config.settings.ffmpeg_threads,
            metadata,
        };

        self.run_extraction(job)?;

        println!(
            "{} {}",
            style("輸出資料夾:").green(),
            output_directory.display()
        );

        add_recent_path(
            &mut self.config.settings,
            &video_path.to_string_lossy(),
        );
        save_settings(&self.config.settings)?;

        Ok(())
    }

    /// 在工作執行緒上跑引擎，主執行緒只消費事件並畫進度條
    fn run_extraction(&self, job: ExtractionJob) -> Result<()> {
        let (tx, rx) = mpsc::channel();
        let controller = CancellationController::new();
        let engine = SingleJobEngine::new(
            controller.clone(),
            tx,
            self.config.settings.progress_protocol,
        );

        let worker = thread::spawn(move || engine.execute(&job));

        let progress_bar = ProgressBar::new(100);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("#>-"),
        );
        progress_bar.set_message("準備中...");

        let mut stop_requested = false;
        loop {
            // Ctrl-C 轉成合作式停止
            if self.shutdown_signal.is_set() && !stop_requested {
                controller.request_stop();
                stop_requested = true;
                progress_bar.set_message("終止中...");
            }

            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(EngineEvent::Progress(percent)) => {
                    progress_bar.set_position(u64::from(percent));
                }
                Ok(EngineEvent::Status(message)) => {
                    info!("{message}");
                    progress_bar.set_message(message);
                }
                Ok(EngineEvent::Error(message)) => {
                    progress_bar.println(format!("{} {}", style("錯誤:").red().bold(), message));
                }
                Ok(EngineEvent::Finished) => break,
                Ok(_) => {}
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        progress_bar.finish();
        if worker.join().is_err() {
            bail!("工作執行緒異常結束");
        }
        Ok(())
    }

    fn print_info_panel(metadata: &VideoMetadata) {
        println!("{}", style("--- 影片資訊 ---").cyan());
        println!(
            "  檔案名稱: {}",
            metadata
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        );
        println!("  時長: {}", format_duration(metadata.duration_seconds));
        println!("  解析度: {} x {}", metadata.width, metadata.height);
        if metadata.frame_rate > 0.0 {
            println!("  幀率: {:.2}", metadata.frame_rate);
        } else {
            println!("  幀率: 未知");
        }
        if metadata.total_frames > 0 {
            println!("  總幀數: {}", metadata.total_frames);
        } else {
            println!("  總幀數: 未知");
        }
    }

    fn prompt_video_path(&self) -> Result<PathBuf> {
        let mut input = Input::<String>::new().with_prompt("請輸入影片檔案路徑");
        if let Some(recent) = self.config.settings.recent_paths.first() {
            input = input.default(recent.clone());
        }
        let path = PathBuf::from(input.interact_text()?.trim().to_string());

        validate_file_exists(&path)?;
        if !is_video_file(&path) {
            println!(
                "{}",
                style("注意: 副檔名不在常見影片清單中，仍嘗試處理").yellow()
            );
        }
        Ok(path)
    }

    fn prompt_output_directory(&self) -> Result<PathBuf> {
        let path: String = Input::new()
            .with_prompt("請輸入輸出資料夾路徑")
            .interact_text()?;
        let path = PathBuf::from(path.trim());
        validate_directory_exists(&path)?;
        Ok(path)
    }

    fn prompt_time_range(duration_seconds: f64) -> Result<TimeRange> {
        let start: u64 = Input::new()
            .with_prompt("起始秒數")
            .default(0)
            .interact_text()?;
        let end: u64 = Input::new()
            .with_prompt("結束秒數（0 表示至影片結尾）")
            .default(duration_seconds as u64)
            .interact_text()?;

        if end > 0 {
            if start >= end {
                bail!("起始時間必須小於結束時間");
            }
            if (end as f64) > duration_seconds {
                bail!("結束時間不能超過影片總時長");
            }
        }

        Ok(TimeRange {
            start_seconds: start as f64,
            end_seconds: end as f64,
        })
    }

    fn prompt_sampling_mode() -> Result<SamplingMode> {
        let options = ["每 N 秒取 1 幀", "每 N 幀取 1 幀"];
        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("擷取模式")
            .items(&options)
            .default(0)
            .interact()?;

        let param: u32 = Input::new()
            .with_prompt("參數 N")
            .default(1)
            .validate_with(|n: &u32| {
                if (1..=3600).contains(n) {
                    Ok(())
                } else {
                    Err("N 必須在 1 到 3600 之間")
                }
            })
            .interact_text()?;

        Ok(match selection {
            0 => SamplingMode::IntervalSeconds(f64::from(param)),
            _ => SamplingMode::FrameStep(param),
        })
    }

    fn prompt_format(&self) -> Result<(ImageFormat, u8)> {
        let formats = [ImageFormat::Png, ImageFormat::Jpeg];
        let items: Vec<String> = formats.iter().map(ToString::to_string).collect();
        let default_index = formats
            .iter()
            .position(|&f| f == self.config.settings.image_format)
            .unwrap_or(0);

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("圖片格式")
            .items(&items)
            .default(default_index)
            .interact()?;
        let format = formats[selection];

        let quality = if format == ImageFormat::Jpeg {
            Input::new()
                .with_prompt("壓縮品質 (1-100)")
                .default(self.config.settings.jpeg_quality)
                .validate_with(|q: &u8| {
                    if (1..=100).contains(q) {
                        Ok(())
                    } else {
                        Err("品質必須在 1 到 100 之間")
                    }
                })
                .interact_text()?
        } else {
            self.config.settings.jpeg_quality
        };

        Ok((format, quality))
    }
}
