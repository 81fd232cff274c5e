use std::path::PathBuf;

use super::metadata::VideoMetadata;
use super::plan::{ImageFormat, SamplingMode, TimeRange};

/// 一次擷取任務的完整描述，建立後不再修改
///
/// 輸出資料夾由引擎建立，但不歸任務擁有。
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub source_path: PathBuf,
    pub output_directory: PathBuf,
    pub range: TimeRange,
    pub mode: SamplingMode,
    pub format: ImageFormat,
    /// 1-100，僅 JPEG 使用
    pub jpeg_quality: u8,
    pub use_hwaccel: bool,
    /// 傳給 ffmpeg 的 -threads 參數
    pub ffmpeg_threads: u32,
    /// 可能無效（duration <= 0），引擎屆時會重新探測
    pub metadata: VideoMetadata,
}

impl ExtractionJob {
    /// ffmpeg 輸出樣板，幀編號零填補至五位
    #[must_use]
    pub fn output_pattern(&self) -> PathBuf {
        self.output_directory
            .join(format!("frame_%05d.{}", self.format.extension()))
    }
}
