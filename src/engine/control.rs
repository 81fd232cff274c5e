use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use super::runner::ProcessSlot;

/// 任務被要求中止；不是錯誤，終端事件要與失敗區分開來
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "已中止處理")
    }
}

impl std::error::Error for Cancelled {}

#[derive(Debug)]
struct ControlState {
    running: bool,
    paused: bool,
}

/// 合作式的停止/暫停控制
///
/// 工作執行緒在固定的檢查點呼叫 `checkpoint`：暫停時阻塞，
/// 停止後回報 `Cancelled`。`request_stop` 另外會終止插槽中
/// 正在執行的子程序，讓阻塞中的讀取迴圈盡快看到串流結束。
#[derive(Clone)]
pub struct CancellationController {
    state: Arc<(Mutex<ControlState>, Condvar)>,
    slot: ProcessSlot,
}

impl Default for CancellationController {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationController {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new((
                Mutex::new(ControlState {
                    running: true,
                    paused: false,
                }),
                Condvar::new(),
            )),
            slot: ProcessSlot::new(),
        }
    }

    /// 目前任務共用的子程序插槽
    #[must_use]
    pub const fn process_slot(&self) -> &ProcessSlot {
        &self.slot
    }

    pub fn pause(&self) {
        let (lock, _) = &*self.state;
        let mut st = lock.lock().unwrap_or_else(PoisonError::into_inner);
        st.paused = true;
    }

    pub fn resume(&self) {
        let (lock, cvar) = &*self.state;
        let mut st = lock.lock().unwrap_or_else(PoisonError::into_inner);
        st.paused = false;
        cvar.notify_all();
    }

    /// 要求停止：喚醒暫停中的工作執行緒並終止活躍的子程序
    pub fn request_stop(&self) {
        let (lock, cvar) = &*self.state;
        {
            let mut st = lock.lock().unwrap_or_else(PoisonError::into_inner);
            st.running = false;
        }
        cvar.notify_all();
        self.slot.terminate();
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        let (lock, _) = &*self.state;
        lock.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .running
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        let (lock, _) = &*self.state;
        lock.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .paused
    }

    /// 檢查點：暫停時阻塞等待，已停止時回報 `Cancelled`
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        let (lock, cvar) = &*self.state;
        let mut st = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while st.paused && st.running {
            st = cvar.wait(st).unwrap_or_else(PoisonError::into_inner);
        }
        if st.running { Ok(()) } else { Err(Cancelled) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_checkpoint_passes_while_running() {
        let controller = CancellationController::new();
        assert!(controller.checkpoint().is_ok());
        assert!(controller.is_running());
    }

    #[test]
    fn test_stop_makes_checkpoint_fail() {
        let controller = CancellationController::new();
        controller.request_stop();
        assert_eq!(controller.checkpoint(), Err(Cancelled));
        // 重複呼叫安全
        controller.request_stop();
        assert_eq!(controller.checkpoint(), Err(Cancelled));
    }

    #[test]
    fn test_pause_blocks_until_resume() {
        let controller = CancellationController::new();
        controller.pause();

        let worker = {
            let controller = controller.clone();
            thread::spawn(move || controller.checkpoint())
        };

        // 暫停中 checkpoint 不應返回
        thread::sleep(Duration::from_millis(100));
        assert!(!worker.is_finished());

        controller.resume();
        assert_eq!(worker.join().unwrap(), Ok(()));
    }

    #[test]
    fn test_stop_wakes_paused_checkpoint() {
        let controller = CancellationController::new();
        controller.pause();

        let worker = {
            let controller = controller.clone();
            thread::spawn(move || controller.checkpoint())
        };

        thread::sleep(Duration::from_millis(50));
        controller.request_stop();
        assert_eq!(worker.join().unwrap(), Err(Cancelled));
    }

    #[test]
    fn test_cancelled_downcasts_from_anyhow() {
        let err: anyhow::Error = Cancelled.into();
        assert!(err.is::<Cancelled>());
    }
}
