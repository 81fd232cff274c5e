use anyhow::{Result, bail};
use log::{debug, info};
use std::sync::mpsc::Sender;

use super::command::FfmpegCommand;
use super::control::{Cancelled, CancellationController};
use super::events::EngineEvent;
use super::job::ExtractionJob;
use super::metadata::{VideoMetadata, probe};
use super::plan::build_plan;
use super::progress::{ProgressProtocol, ProgressTracker};
use super::runner::FfmpegProcess;
use crate::tools::ensure_directory_exists;

/// 單一任務的狀態機
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobState {
    Idle,
    Probing,
    Planning,
    Running,
}

/// 單一擷取任務的編排：探測 → 計畫 → 啟動子程序 → 讀進度流
pub struct SingleJobEngine {
    controller: CancellationController,
    events: Sender<EngineEvent>,
    protocol: ProgressProtocol,
}

impl SingleJobEngine {
    #[must_use]
    pub const fn new(
        controller: CancellationController,
        events: Sender<EngineEvent>,
        protocol: ProgressProtocol,
    ) -> Self {
        Self {
            controller,
            events,
            protocol,
        }
    }

    fn emit(&self, event: EngineEvent) {
        // 接收端關閉時忽略
        let _ = self.events.send(event);
    }

    fn transition(&self, from: JobState, to: JobState) -> JobState {
        debug!("任務狀態 {from:?} -> {to:?}");
        to
    }

    /// 執行一個任務並回傳最終擷取到的幀數
    ///
    /// 被停止時回傳的錯誤可 downcast 成 `Cancelled`；
    /// 終端事件由 `execute` 負責。
    pub fn run(&self, job: &ExtractionJob) -> Result<u64> {
        let mut state = JobState::Idle;
        self.controller.checkpoint()?;

        // 有效的快取中繼資料可跳過探測
        let metadata: VideoMetadata = if job.metadata.is_valid() {
            job.metadata.clone()
        } else {
            state = self.transition(state, JobState::Probing);
            probe(&job.source_path)?
        };
        self.controller.checkpoint()?;

        state = self.transition(state, JobState::Planning);
        let plan = build_plan(job.range, job.mode, &metadata);
        ensure_directory_exists(&job.output_directory)?;
        info!(
            "擷取計畫: {} → {}，濾鏡 {}，預估 {} 幀",
            job.source_path.display(),
            job.output_directory.display(),
            plan.filter_expression,
            plan.expected_frame_count
        );
        self.controller.checkpoint()?;

        let _ = self.transition(state, JobState::Running);
        self.emit(EngineEvent::Status("擷取中...".to_string()));

        let command = FfmpegCommand::new(job, &plan, self.protocol).build_command();
        let mut process =
            FfmpegProcess::start(command, self.protocol, self.controller.process_slot())?;
        let mut tracker = ProgressTracker::new(self.protocol, job.mode, &plan);

        let mut line = String::new();
        loop {
            line.clear();
            // 讀取錯誤（例如程序被終止後管線關閉）與 EOF 同樣視為串流結束
            let bytes = process.read_line(&mut line).unwrap_or(0);
            if bytes == 0 {
                break;
            }
            if tracker.feed_line(line.trim()) {
                self.emit(EngineEvent::Progress(tracker.state().percent));
            }
            // 每讀一行就檢查一次，停止/暫停以行為粒度生效
            if let Err(cancelled) = self.controller.checkpoint() {
                // 停止要求可能在子程序進插槽之前送達（當時是 no-op），
                // 這裡補一次終止，wait 才不會等到子程序自然跑完
                process.terminate();
                let _ = process.wait();
                return Err(cancelled.into());
            }
        }

        let exit = process.wait()?;
        // 串流結束也可能是被終止造成的
        self.controller.checkpoint()?;

        if !exit.status.success() {
            if exit.stderr_tail.is_empty() {
                bail!("ffmpeg 結束碼非零: {}", exit.status);
            }
            bail!("ffmpeg 執行失敗: {}", exit.stderr_tail);
        }

        tracker.force_complete();
        self.emit(EngineEvent::Progress(100));
        let frames = tracker.finalize(&job.output_directory, job.format.extension());
        info!("擷取完成: {} 幀 → {}", frames, job.output_directory.display());
        Ok(frames)
    }

    /// 執行一個任務並發出終端事件（完成 / 已中止 / 錯誤），
    /// 供單檔模式在工作執行緒上呼叫
    pub fn execute(&self, job: &ExtractionJob) {
        match self.run(job) {
            Ok(frames) => {
                self.emit(EngineEvent::Status(format!("提取完成（共 {frames} 幀）")));
                self.emit(EngineEvent::Finished);
            }
            Err(e) if e.is::<Cancelled>() => {
                self.emit(EngineEvent::Status("已終止處理".to_string()));
                self.emit(EngineEvent::Finished);
            }
            Err(e) => {
                self.emit(EngineEvent::Error(format!("提取錯誤: {e}")));
                self.emit(EngineEvent::Finished);
            }
        }
    }
}
