use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::command::new_tool_command;

/// 單一影片檔案的探測結果
///
/// 由 `probe` 產生後不再修改；呼叫端負責快取。
/// `duration_seconds <= 0` 視為無效，引擎會重新探測而不會拿來計算擷取計畫。
#[derive(Debug, Clone)]
pub struct VideoMetadata {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    /// 平均幀率，0 表示未知
    pub frame_rate: f64,
    /// 總幀數，0 表示未知（許多容器不解碼整條串流就無法得知）
    pub total_frames: u64,
}

impl VideoMetadata {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.duration_seconds > 0.0
    }

    /// 尚未探測過的佔位中繼資料，引擎看到時會自行重新探測
    #[must_use]
    pub fn unprobed(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            duration_seconds: 0.0,
            width: 0,
            height: 0,
            frame_rate: 0.0,
            total_frames: 0,
        }
    }
}

#[derive(Deserialize)]
struct FfprobeOutput {
    format: Option<FormatInfo>,
    streams: Option<Vec<StreamInfo>>,
}

#[derive(Deserialize)]
struct FormatInfo {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct StreamInfo {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

/// 使用 ffprobe 取得影片中繼資料
pub fn probe(path: &Path) -> Result<VideoMetadata> {
    let output = new_tool_command("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration:stream=width,height,avg_frame_rate,nb_frames",
            "-print_format",
            "json",
        ])
        .arg(path)
        .output()
        .with_context(|| format!("無法執行 ffprobe: {}", path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("ffprobe 執行失敗: {}", stderr.trim());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_probe_output(path, &stdout)
}

fn parse_probe_output(path: &Path, json: &str) -> Result<VideoMetadata> {
    let probe: FfprobeOutput = serde_json::from_str(json).context("無法解析 ffprobe 輸出")?;

    // 帶有 width 的串流才是視訊串流
    let video_stream = probe
        .streams
        .as_ref()
        .and_then(|streams| streams.iter().find(|s| s.width.is_some()))
        .ok_or_else(|| anyhow::anyhow!("找不到視訊串流: {}", path.display()))?;

    // 時長優先取 format，其次取 stream
    let duration_seconds = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .or(video_stream.duration.as_ref())
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| anyhow::anyhow!("無法取得影片時長: {}", path.display()))?;

    let frame_rate = video_stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .unwrap_or(0.0);

    let total_frames = video_stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(0);

    Ok(VideoMetadata {
        path: path.to_path_buf(),
        duration_seconds,
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        frame_rate,
        total_frames,
    })
}

/// 解析幀率字串（例如 "30/1" 或 "30000/1001"），"0/0" 視為未知
fn parse_frame_rate(rate: &str) -> Option<f64> {
    if let Some((num_str, den_str)) = rate.split_once('/') {
        let num: f64 = num_str.parse().ok()?;
        let den: f64 = den_str.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    rate.parse().ok()
}
