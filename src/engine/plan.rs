use serde::{Deserialize, Serialize};
use std::fmt;

use super::metadata::VideoMetadata;

/// 輸出圖片格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Png => write!(f, "PNG"),
            Self::Jpeg => write!(f, "JPG"),
        }
    }
}

/// 取樣模式：決定哪些來源幀會變成輸出圖片
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplingMode {
    /// 每 n 秒輸出 1 幀
    IntervalSeconds(f64),
    /// 每 n 個來源幀保留 1 幀
    FrameStep(u32),
}

impl fmt::Display for SamplingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IntervalSeconds(n) => write!(f, "每 {} 秒取 1 幀", format_number(*n)),
            Self::FrameStep(n) => write!(f, "每 {n} 幀取 1 幀"),
        }
    }
}

/// 擷取時間範圍，`end_seconds == 0` 表示「至影片結尾」
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl TimeRange {
    /// 整部影片（批次模式固定使用）
    #[must_use]
    pub const fn full() -> Self {
        Self {
            start_seconds: 0.0,
            end_seconds: 0.0,
        }
    }
}

/// 擷取計畫：濾鏡表達式與預估輸出幀數
///
/// 每次任務重新計算，不做持久化。
#[derive(Debug, Clone)]
pub struct ExtractionPlan {
    pub filter_expression: String,
    pub expected_frame_count: u64,
    /// FrameStep 模式在幀率未知時估不出幀數，此時預估值固定為 1 且不可靠
    pub estimate_reliable: bool,
    pub effective_duration: f64,
}

/// 依取樣模式與中繼資料計算擷取計畫
#[must_use]
pub fn build_plan(range: TimeRange, mode: SamplingMode, metadata: &VideoMetadata) -> ExtractionPlan {
    let full_duration = metadata.duration_seconds;
    let mut effective_duration = if range.end_seconds > 0.0 {
        full_duration.min(range.end_seconds) - range.start_seconds
    } else {
        full_duration - range.start_seconds
    };
    // 防禦性回退：不正常的範圍退回整部影片
    if effective_duration <= 0.0 {
        effective_duration = full_duration;
    }

    match mode {
        SamplingMode::IntervalSeconds(n) => {
            let expected = ((effective_duration / n).floor() as u64).max(1);
            ExtractionPlan {
                filter_expression: format!("fps=1/{}", format_number(n)),
                expected_frame_count: expected,
                estimate_reliable: true,
                effective_duration,
            }
        }
        SamplingMode::FrameStep(n) => {
            let filter_expression =
                format!("select='not(mod(n\\,{n}))',setpts=N/FRAME_RATE/TB");
            if metadata.frame_rate > 0.0 {
                let span = if range.end_seconds > 0.0 {
                    range.end_seconds - range.start_seconds
                } else {
                    effective_duration
                };
                let total_source_frames = (span * metadata.frame_rate) as u64;
                let expected = (total_source_frames / u64::from(n)).max(1);
                ExtractionPlan {
                    filter_expression,
                    expected_frame_count: expected,
                    estimate_reliable: true,
                    effective_duration,
                }
            } else {
                // 幀率未知時無法估算，固定回報 1（已知的估算弱點，不視為錯誤）
                ExtractionPlan {
                    filter_expression,
                    expected_frame_count: 1,
                    estimate_reliable: false,
                    effective_duration,
                }
            }
        }
    }
}

/// 將使用者的 JPEG 品質（1-100，越大越好）換算成 ffmpeg 的
/// `-q:v` 刻度（1-31，越小越好）
#[must_use]
pub fn jpeg_qscale(quality: u8) -> u32 {
    let quality = u32::from(quality.min(100));
    (31 * (100 - quality) / 100).clamp(1, 31)
}

/// 整數值不帶小數點輸出（"fps=1/5" 而不是 "fps=1/5.0"）
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as u64)
    } else {
        format!("{n}")
    }
}
