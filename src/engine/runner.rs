use anyhow::{Context, Result, bail};
use log::debug;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

use super::progress::ProgressProtocol;

/// stderr 尾端保留的行數，失敗時當成錯誤訊息
const STDERR_TAIL_LINES: usize = 20;

/// 同一時間最多一個活躍子程序的共用插槽
///
/// 控制執行緒的 terminate 與工作執行緒的 wait（回收）都透過
/// 同一把鎖序列化，terminate 對已結束或從未啟動的程序是 no-op。
#[derive(Clone, Default)]
pub struct ProcessSlot(Arc<Mutex<Option<Child>>>);

impl ProcessSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn put(&self, child: Child) {
        let mut guard = self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Some(child);
    }

    fn take(&self) -> Option<Child> {
        let mut guard = self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.take()
    }

    /// 終止插槽中的子程序；可重複呼叫，程序不存在時不做任何事
    pub fn terminate(&self) {
        let mut guard = self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(child) = guard.as_mut() {
            debug!("終止子程序 [{}]", child.id());
            let _ = child.kill();
        }
    }
}

/// 子程序的結束狀態與 stderr 尾端
pub struct ProcessExit {
    pub status: ExitStatus,
    pub stderr_tail: String,
}

/// 一個執行中的 ffmpeg 程序，進度流可逐行讀取
///
/// 另一條輸出流由背景執行緒持續排空，避免子程序因管線塞滿而卡住。
pub struct FfmpegProcess {
    slot: ProcessSlot,
    reader: BufReader<Box<dyn Read + Send>>,
    stderr_tail: Arc<Mutex<Vec<String>>>,
}

impl FfmpegProcess {
    /// 啟動子程序並依進度協定決定要讀哪條流
    pub fn start(
        mut command: Command,
        protocol: ProgressProtocol,
        slot: &ProcessSlot,
    ) -> Result<Self> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().context("無法啟動 ffmpeg")?;
        debug!("已啟動 ffmpeg [{}]", child.id());

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("無法取得子程序 stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow::anyhow!("無法取得子程序 stderr"))?;

        let stderr_tail = Arc::new(Mutex::new(Vec::new()));

        let reader: BufReader<Box<dyn Read + Send>> = match protocol {
            ProgressProtocol::KeyValue => {
                // 進度走 stdout；stderr 背景排空並保留尾端
                Self::drain_to_tail(Box::new(stderr), Arc::clone(&stderr_tail));
                BufReader::new(Box::new(stdout))
            }
            ProgressProtocol::LogScrape => {
                // 進度（stats 行）走 stderr；stdout 背景排空
                Self::drain_to_tail(Box::new(stdout), Arc::clone(&stderr_tail));
                BufReader::new(Box::new(stderr))
            }
        };

        slot.put(child);

        Ok(Self {
            slot: slot.clone(),
            reader,
            stderr_tail,
        })
    }

    fn drain_to_tail(stream: Box<dyn Read + Send>, tail: Arc<Mutex<Vec<String>>>) {
        thread::spawn(move || {
            let reader = BufReader::new(stream);
            for line in reader.lines().map_while(std::result::Result::ok) {
                let mut guard = tail.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                if guard.len() >= STDERR_TAIL_LINES {
                    guard.remove(0);
                }
                guard.push(line);
            }
        });
    }

    /// 讀取進度流的下一行，回傳 0 表示流已結束
    pub fn read_line(&mut self, buf: &mut String) -> std::io::Result<usize> {
        self.reader.read_line(buf)
    }

    /// 終止子程序；停止要求若早於子程序進插槽，呼叫端要再補一次
    pub fn terminate(&self) {
        self.slot.terminate();
    }

    /// 回收子程序並取回結束狀態
    ///
    /// 不論正常結束或被終止都必須呼叫，任務才算結束。
    pub fn wait(self) -> Result<ProcessExit> {
        let Some(mut child) = self.slot.take() else {
            bail!("子程序已被回收");
        };
        let status = child.wait().context("等待 ffmpeg 結束失敗")?;
        debug!("ffmpeg 已結束: {status}");

        let tail = self
            .stderr_tail
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .join("\n");

        Ok(ProcessExit {
            status,
            stderr_tail: tail,
        })
    }
}
