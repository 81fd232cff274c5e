use anyhow::{Result, bail};
use console::{Key, Term, style};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::config::{Config, add_recent_path, save_settings};
use crate::engine::{
    BatchConfig, BatchCoordinator, BatchReport, CancellationController, EngineEvent,
    ImageFormat, JobOutcome, SamplingMode, check_tools_available, detect_hwaccel,
};
use crate::signal::ShutdownFlag;
use crate::tools::validate_directory_exists;

/// 整個資料夾的批次幀擷取
pub struct BatchExtractor {
    config: Config,
    shutdown_signal: ShutdownFlag,
}

impl BatchExtractor {
    pub const fn new(config: Config, shutdown_signal: ShutdownFlag) -> Self {
        Self {
            config,
            shutdown_signal,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        println!("{}", style("=== 批次幀擷取 ===").cyan().bold());
        check_tools_available()?;

        let folder = self.prompt_folder()?;
        let mode = Self::prompt_sampling_mode()?;
        let (format, jpeg_quality) = self.prompt_format()?;

        let batch_config = BatchConfig {
            folder: folder.clone(),
            mode,
            format,
            jpeg_quality,
            ffmpeg_threads: self.config.settings.ffmpeg_threads,
            protocol: self.config.settings.progress_protocol,
            hwaccel: detect_hwaccel(),
        };

        println!(
            "{}",
            style("操作鍵: [p] 暫停  [r] 繼續  [q] 終止").dim()
        );

        let report = self.run_batch(batch_config)?;
        Self::print_report(&report);

        add_recent_path(&mut self.config.settings, &folder.to_string_lossy());
        save_settings(&self.config.settings)?;

        Ok(())
    }

    /// 批次在工作執行緒上跑；另起一條鍵盤監聽執行緒處理暫停/繼續/終止
    fn run_batch(&self, batch_config: BatchConfig) -> Result<BatchReport> {
        let (tx, rx) = mpsc::channel();
        let controller = CancellationController::new();
        let coordinator = BatchCoordinator::new(batch_config, controller.clone(), tx);

        let worker = thread::spawn(move || coordinator.run());

        let finished = Arc::new(AtomicBool::new(false));
        let key_listener = Self::spawn_key_listener(controller.clone(), Arc::clone(&finished));

        let batch_bar = ProgressBar::new(0);
        batch_bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
                )
                .expect("Invalid progress bar template")
                .progress_chars("#>-"),
        );
        batch_bar.set_message("準備中...");

        let mut stop_requested = false;
        loop {
            if self.shutdown_signal.is_set() && !stop_requested {
                controller.request_stop();
                stop_requested = true;
                batch_bar.set_message("終止中...");
            }

            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(EngineEvent::Status(message)) => {
                    info!("{message}");
                    batch_bar.set_message(message);
                }
                Ok(EngineEvent::ItemDone(result)) => {
                    let line = match &result.outcome {
                        JobOutcome::Success => format!(
                            "{} {} (預計 {} 幀)",
                            style("完成").green(),
                            result.file_name,
                            result.planned_frame_count
                        ),
                        JobOutcome::Failed(reason) => format!(
                            "{} {}: {}",
                            style("失敗").red(),
                            result.file_name,
                            reason
                        ),
                    };
                    batch_bar.println(line);
                }
                Ok(EngineEvent::BatchProgress { done, total }) => {
                    batch_bar.set_length(total as u64);
                    batch_bar.set_position(done as u64);
                }
                Ok(EngineEvent::Error(message)) => {
                    batch_bar.println(format!("{} {}", style("錯誤:").red().bold(), message));
                }
                Ok(EngineEvent::Finished) => break,
                Ok(_) => {}
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        batch_bar.finish();
        finished.store(true, Ordering::SeqCst);
        // 鍵盤監聽會在下一次按鍵（包含 Enter）後結束
        println!("{}", style("按 Enter 返回選單...").dim());
        let _ = key_listener.join();

        match worker.join() {
            Ok(report) => report,
            Err(_) => bail!("批次工作執行緒異常結束"),
        }
    }

    fn spawn_key_listener(
        controller: CancellationController,
        finished: Arc<AtomicBool>,
    ) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            let term = Term::stdout();
            loop {
                let Ok(key) = term.read_key() else { break };
                if finished.load(Ordering::SeqCst) {
                    break;
                }
                match key {
                    Key::Char('p') => {
                        controller.pause();
                        info!("已暫停，按 r 繼續");
                    }
                    Key::Char('r') => {
                        controller.resume();
                        info!("已繼續");
                    }
                    Key::Char('q') => {
                        controller.request_stop();
                        break;
                    }
                    _ => {}
                }
            }
        })
    }

    fn print_report(report: &BatchReport) {
        let success = report.results.iter().filter(|r| r.is_success()).count();
        let failed = report.results.len() - success;

        println!();
        println!("{}", style("=== 批次結果 ===").cyan().bold());
        println!(
            "共 {} 個檔案，處理 {} 個，成功 {}，失敗 {}",
            report.total_files,
            report.results.len(),
            success,
            failed
        );
        println!("輸出資料夾: {}", report.output_root.display());

        if report.results.is_empty() {
            return;
        }

        println!(
            "{:<32} {:>10} {:>10} {:>8} {:>10}  結果",
            "檔案", "大小(MB)", "時長", "幀率", "預計幀數"
        );
        for result in &report.results {
            let outcome = match &result.outcome {
                JobOutcome::Success => style("成功").green().to_string(),
                JobOutcome::Failed(_) => style("失敗").red().to_string(),
            };
            println!(
                "{:<32} {:>10.2} {:>10} {:>8} {:>10}  {}",
                result.file_name,
                result.size_mb,
                result.duration_display,
                result.frame_rate_display,
                result.planned_frame_count,
                outcome
            );
        }
    }

    fn prompt_folder(&self) -> Result<PathBuf> {
        let mut input = Input::<String>::new().with_prompt("請輸入影片資料夾路徑");
        if let Some(recent) = self.config.settings.recent_paths.first() {
            input = input.default(recent.clone());
        }
        let path = PathBuf::from(input.interact_text()?.trim().to_string());
        validate_directory_exists(&path)?;
        Ok(path)
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
