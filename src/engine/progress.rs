use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

use super::plan::{ExtractionPlan, SamplingMode};

/// 幀率未知時估算進度用的名目幀率
pub const FALLBACK_FRAME_RATE: f64 = 30.0;

/// 子程序回報進度的線路格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressProtocol {
    /// `-progress pipe:1`：stdout 上的機器可讀 key=value 行
    KeyValue,
    /// 擷取診斷日誌中的 `frame=<int>` 統計行
    LogScrape,
}

impl fmt::Display for ProgressProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyValue => write!(f, "progress 管線 (key=value)"),
            Self::LogScrape => write!(f, "日誌擷取 (frame=)"),
        }
    }
}

/// 單一任務內單調遞增的進度狀態
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub extracted_frames: u64,
    /// 0-100
    pub percent: u8,
}

/// 把子程序輸出流解讀成進度狀態
///
/// 單行解析失敗一律忽略，不會讓任務失敗。
pub struct ProgressTracker {
    protocol: ProgressProtocol,
    mode: SamplingMode,
    effective_duration: f64,
    expected_frames: u64,
    estimate_reliable: bool,
    state: ProgressState,
    frame_token: Regex,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(protocol: ProgressProtocol, mode: SamplingMode, plan: &ExtractionPlan) -> Self {
        Self {
            protocol,
            mode,
            effective_duration: plan.effective_duration,
            expected_frames: plan.expected_frame_count,
            estimate_reliable: plan.estimate_reliable,
            state: ProgressState::default(),
            frame_token: Regex::new(r"frame=\s*(\d+)").expect("固定的正規表達式必定合法"),
        }
    }

    #[must_use]
    pub const fn state(&self) -> ProgressState {
        self.state
    }

    /// 餵入一行子程序輸出，回傳狀態是否有變化
    pub fn feed_line(&mut self, line: &str) -> bool {
        let before = self.state;
        match self.protocol {
            ProgressProtocol::KeyValue => self.feed_key_value(line),
            ProgressProtocol::LogScrape => self.feed_log_line(line),
        }
        self.state != before
    }

    fn feed_key_value(&mut self, line: &str) {
        if let Some(raw) = line.strip_prefix("out_time_ms=") {
            // 名為 ms，實際單位是微秒
            if let (Ok(out_us), SamplingMode::IntervalSeconds(n)) = (raw.parse::<i64>(), self.mode)
            {
                if out_us < 0 {
                    return;
                }
                let out_us = out_us as u64;
                if self.effective_duration > 0.0 {
                    let percent =
                        (out_us as f64 / (self.effective_duration * 1e6) * 100.0) as u64;
                    self.set_percent(percent);
                }
                let frames = ((out_us as f64 / 1e6) / n) as u64;
                self.set_frames(frames.min(self.expected_frames));
            }
        } else if let Some(raw) = line.strip_prefix("frame=") {
            if let (Ok(frames), SamplingMode::FrameStep(_)) = (raw.trim().parse::<u64>(), self.mode)
            {
                self.set_frames(frames);
                self.set_percent(frames * 100 / self.expected_frames.max(1));
            }
        } else if line.starts_with("progress=end") {
            self.set_percent(100);
        }
    }

    fn feed_log_line(&mut self, line: &str) {
        let Some(frames) = self
            .frame_token
            .captures(line)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok())
        else {
            return;
        };
        self.set_frames(frames);

        // 預估幀數不可靠時，用名目幀率估一個近似百分比
        let denominator = if self.estimate_reliable {
            self.expected_frames as f64
        } else {
            self.effective_duration * FALLBACK_FRAME_RATE
        };
        if denominator > 0.0 {
            self.set_percent((frames as f64 / denominator * 100.0) as u64);
        }
    }

    fn set_percent(&mut self, percent: u64) {
        let percent = percent.min(100) as u8;
        // 任務內百分比只增不減
        if percent > self.state.percent {
            self.state.percent = percent;
        }
    }

    fn set_frames(&mut self, frames: u64) {
        if frames > self.state.extracted_frames {
            self.state.extracted_frames = frames;
        }
    }

    /// 串流正常結束時強制補到 100%
    pub fn force_complete(&mut self) {
        self.state.percent = 100;
    }

    /// 結束時的保底：完全沒解析到進度就直接數輸出資料夾裡的圖片
    pub fn finalize(&mut self, output_dir: &Path, extension: &str) -> u64 {
        if self.state.extracted_frames == 0 {
            match fs::read_dir(output_dir) {
                Ok(entries) => {
                    let count = entries
                        .filter_map(std::result::Result::ok)
                        .filter(|e| {
                            e.path()
                                .extension()
                                .and_then(|x| x.to_str())
                                .is_some_and(|x| x.eq_ignore_ascii_case(extension))
                        })
                        .count() as u64;
                    self.state.extracted_frames = count;
                }
                Err(e) => warn!("無法列出輸出資料夾 {}: {e}", output_dir.display()),
            }
        }
        self.state.extracted_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::metadata::VideoMetadata;
    use crate::engine::plan::{TimeRange, build_plan};
    use std::path::PathBuf;

    fn metadata(duration: f64, frame_rate: f64) -> VideoMetadata {
        VideoMetadata {
            path: PathBuf::from("/v/a.mp4"),
            duration_seconds: duration,
            width: 0,
            height: 0,
            frame_rate,
            total_frames: 0,
        }
    }

    fn interval_tracker(protocol: ProgressProtocol) -> ProgressTracker {
        let mode = SamplingMode::IntervalSeconds(10.0);
        let plan = build_plan(
            TimeRange {
                start_seconds: 0.0,
                end_seconds: 100.0,
            },
            mode,
            &metadata(100.0, 30.0),
        );
        ProgressTracker::new(protocol, mode, &plan)
    }

    fn frame_step_tracker() -> ProgressTracker {
        let mode = SamplingMode::FrameStep(5);
        let plan = build_plan(
            TimeRange {
                start_seconds: 0.0,
                end_seconds: 10.0,
            },
            mode,
            &metadata(100.0, 30.0),
        );
        ProgressTracker::new(ProgressProtocol::KeyValue, mode, &plan)
    }

    #[test]
    fn test_key_value_interval_progress() {
        let mut tracker = interval_tracker(ProgressProtocol::KeyValue);
        assert!(tracker.feed_line("out_time_ms=25000000"));
        assert_eq!(tracker.state().percent, 25);
        assert_eq!(tracker.state().extracted_frames, 2);

        assert!(tracker.feed_line("out_time_ms=100000000"));
        assert_eq!(tracker.state().percent, 100);
        assert_eq!(tracker.state().extracted_frames, 10);
    }

    #[test]
    fn test_interval_frames_capped_at_expected() {
        let mut tracker = interval_tracker(ProgressProtocol::KeyValue);
        tracker.feed_line("out_time_ms=999000000");
        assert_eq!(tracker.state().extracted_frames, 10);
        assert_eq!(tracker.state().percent, 100);
    }

    #[test]
    fn test_key_value_frame_step_progress() {
        // 期望 60 幀
        let mut tracker = frame_step_tracker();
        assert!(tracker.feed_line("frame=30"));
        assert_eq!(tracker.state().percent, 50);
        assert_eq!(tracker.state().extracted_frames, 30);

        tracker.feed_line("frame=60");
        assert_eq!(tracker.state().percent, 100);
    }

    #[test]
    fn test_progress_end_forces_hundred() {
        let mut tracker = interval_tracker(ProgressProtocol::KeyValue);
        tracker.feed_line("out_time_ms=10000000");
        assert!(tracker.state().percent < 100);
        assert!(tracker.feed_line("progress=end"));
        assert_eq!(tracker.state().percent, 100);
    }

    #[test]
    fn test_malformed_lines_ignored() {
        let mut tracker = interval_tracker(ProgressProtocol::KeyValue);
        tracker.feed_line("out_time_ms=30000000");
        let state = tracker.state();

        assert!(!tracker.feed_line("out_time_ms=abc"));
        assert!(!tracker.feed_line("out_time_ms="));
        assert!(!tracker.feed_line("frame=xyz"));
        assert!(!tracker.feed_line("speed=1.5x"));
        assert!(!tracker.feed_line(""));
        assert_eq!(tracker.state(), state);
    }

    #[test]
    fn test_percent_monotonic_non_decreasing() {
        let mut tracker = interval_tracker(ProgressProtocol::KeyValue);
        tracker.feed_line("out_time_ms=50000000");
        assert_eq!(tracker.state().percent, 50);
        // 倒退的 out_time 不能讓百分比下降
        tracker.feed_line("out_time_ms=20000000");
        assert_eq!(tracker.state().percent, 50);
    }

    #[test]
    fn test_log_scrape_stats_line() {
        let mode = SamplingMode::FrameStep(5);
        let plan = build_plan(
            TimeRange {
                start_seconds: 0.0,
                end_seconds: 10.0,
            },
            mode,
            &metadata(100.0, 30.0),
        );
        let mut tracker = ProgressTracker::new(ProgressProtocol::LogScrape, mode, &plan);

        // ffmpeg 的 stats 行在 frame= 後面會補空白
        assert!(tracker.feed_line("frame=   30 fps= 29 q=2.0 size=N/A time=00:00:01.00"));
        assert_eq!(tracker.state().extracted_frames, 30);
        assert_eq!(tracker.state().percent, 50);
    }

    #[test]
    fn test_log_scrape_fallback_rate_when_estimate_unreliable() {
        let mode = SamplingMode::FrameStep(5);
        // 幀率未知 → 預估 1 幀、不可靠 → 改用 時長 * 30 估算
        let plan = build_plan(
            TimeRange {
                start_seconds: 0.0,
                end_seconds: 10.0,
            },
            mode,
            &metadata(10.0, 0.0),
        );
        let mut tracker = ProgressTracker::new(ProgressProtocol::LogScrape, mode, &plan);

        tracker.feed_line("frame=  150 fps= 30 q=2.0");
        assert_eq!(tracker.state().percent, 50); // 150 / (10 * 30)
    }

    #[test]
    fn test_finalize_counts_files_when_no_signal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("frame_00001.png"), b"x").unwrap();
        fs::write(dir.path().join("frame_00002.png"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let mut tracker = interval_tracker(ProgressProtocol::KeyValue);
        assert_eq!(tracker.finalize(dir.path(), "png"), 2);
    }

    #[test]
    fn test_finalize_keeps_parsed_count() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("frame_00001.png"), b"x").unwrap();

        let mut tracker = interval_tracker(ProgressProtocol::KeyValue);
        tracker.feed_line("out_time_ms=80000000");
        assert_eq!(tracker.finalize(dir.path(), "png"), 8);
    }
}
