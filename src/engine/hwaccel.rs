use log::debug;

use super::command::new_tool_command;

/// 硬體加速偵測結果；批次開始時偵測一次，之後隨設定傳遞
#[derive(Debug, Clone, Default)]
pub struct HwAccelInfo {
    pub cuda_available: bool,
    pub gpu_names: Vec<String>,
}

impl HwAccelInfo {
    /// 任務開始前公告所選模式用的訊息
    #[must_use]
    pub fn mode_notice(&self) -> String {
        if self.cuda_available {
            if self.gpu_names.is_empty() {
                "偵測到 CUDA 硬體加速，啟用 GPU 模式".to_string()
            } else {
                format!(
                    "偵測到 NVIDIA GPU: {}，啟用 GPU 加速",
                    self.gpu_names.join(", ")
                )
            }
        } else {
            "未偵測到可用的 GPU，使用 CPU 模式".to_string()
        }
    }
}

/// 查詢 ffmpeg 支援的硬體加速器，並嘗試從 nvidia-smi 取得顯卡型號
///
/// 偵測失敗一律視為「不可用」，不會讓任務失敗。
#[must_use]
pub fn detect_hwaccel() -> HwAccelInfo {
    let cuda_available = new_tool_command("ffmpeg")
        .args(["-hide_banner", "-hwaccels"])
        .output()
        .is_ok_and(|o| {
            o.status.success() && String::from_utf8_lossy(&o.stdout).to_lowercase().contains("cuda")
        });

    let gpu_names = if cuda_available {
        query_nvidia_gpu_names()
    } else {
        Vec::new()
    };

    debug!("硬體加速偵測: cuda={cuda_available}, gpus={gpu_names:?}");
    HwAccelInfo {
        cuda_available,
        gpu_names,
    }
}

fn query_nvidia_gpu_names() -> Vec<String> {
    new_tool_command("nvidia-smi")
        .args(["--query-gpu=name", "--format=csv,noheader"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| {
            String::from_utf8_lossy(&o.stdout)
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
