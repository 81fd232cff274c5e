use anyhow::{Result, bail};
use std::process::Command;

use super::job::ExtractionJob;
use super::plan::{ExtractionPlan, ImageFormat, jpeg_qscale};
use super::progress::ProgressProtocol;

/// 建立外部工具的 Command，桌面平台上不彈出主控台視窗
#[must_use]
pub fn new_tool_command(program: &str) -> Command {
    #[allow(unused_mut)]
    let mut cmd = Command::new(program);
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    cmd
}

/// 確認 ffmpeg 與 ffprobe 都在 PATH 上，缺少時列出缺少的工具
pub fn check_tools_available() -> Result<()> {
    let mut missing = Vec::new();
    for tool in ["ffmpeg", "ffprobe"] {
        let found = new_tool_command(tool)
            .arg("-version")
            .output()
            .is_ok_and(|o| o.status.success());
        if !found {
            missing.push(tool);
        }
    }
    if !missing.is_empty() {
        bail!("缺少必要的工具: {}，請先安裝 ffmpeg", missing.join(", "));
    }
    Ok(())
}

/// 幀擷取用的 ffmpeg 命令列建構器
pub struct FfmpegCommand<'a> {
    job: &'a ExtractionJob,
    plan: &'a ExtractionPlan,
    protocol: ProgressProtocol,
}

impl<'a> FfmpegCommand<'a> {
    #[must_use]
    pub const fn new(
        job: &'a ExtractionJob,
        plan: &'a ExtractionPlan,
        protocol: ProgressProtocol,
    ) -> Self {
        Self {
            job,
            plan,
            protocol,
        }
    }

    #[must_use]
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec!["-hide_banner".to_string()];

        match self.protocol {
            // 機器可讀的 key=value 進度走 stdout，診斷輸出壓到只剩錯誤
            ProgressProtocol::KeyValue => {
                args.extend([
                    "-loglevel".to_string(),
                    "error".to_string(),
                    "-progress".to_string(),
                    "pipe:1".to_string(),
                    "-nostats".to_string(),
                ]);
            }
            // 日誌擷取模式需要 ffmpeg 預設的 stats 行（frame= ...）
            ProgressProtocol::LogScrape => {}
        }

        if self.job.use_hwaccel {
            args.extend(["-hwaccel".to_string(), "cuda".to_string()]);
        }

        args.extend(["-ss".to_string(), format_seconds(self.job.range.start_seconds)]);
        if self.job.range.end_seconds > 0.0 {
            args.extend(["-to".to_string(), format_seconds(self.job.range.end_seconds)]);
        }

        if self.job.ffmpeg_threads > 0 {
            args.extend(["-threads".to_string(), self.job.ffmpeg_threads.to_string()]);
        }

        args.extend([
            "-i".to_string(),
            self.job.source_path.to_string_lossy().to_string(),
            "-vf".to_string(),
            self.plan.filter_expression.clone(),
        ]);

        if self.job.format == ImageFormat::Jpeg {
            args.extend([
                "-q:v".to_string(),
                jpeg_qscale(self.job.jpeg_quality).to_string(),
            ]);
        }

        args.push("-y".to_string());
        args.push(self.job.output_pattern().to_string_lossy().to_string());

        args
    }

    #[must_use]
    pub fn build_command(&self) -> Command {
        let mut cmd = new_tool_command("ffmpeg");
        cmd.args(self.build_args());
        cmd
    }
}

fn format_seconds(seconds: f64) -> String {
    if seconds.fract() == 0.0 {
        format!("{}", seconds as u64)
    } else {
        format!("{seconds:.3}")
    }
}
