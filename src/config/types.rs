use serde::{Deserialize, Serialize};

use crate::engine::plan::ImageFormat;
use crate::engine::progress::ProgressProtocol;

pub const MAX_RECENT_PATHS: usize = 10;

/// 持久化在 settings.json 的使用者偏好
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub image_format: ImageFormat,
    /// 1-100，僅 JPEG 使用
    pub jpeg_quality: u8,
    /// 傳給 ffmpeg 的 -threads 值
    pub ffmpeg_threads: u32,
    pub progress_protocol: ProgressProtocol,
    pub recent_paths: Vec<String>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            image_format: ImageFormat::Png,
            jpeg_quality: 85,
            ffmpeg_threads: 4,
            progress_protocol: ProgressProtocol::KeyValue,
            recent_paths: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub settings: UserSettings,
}
