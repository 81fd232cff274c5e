use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Ctrl-C 旗標的共享握把
///
/// 訊號處理器只設旗標；元件的事件迴圈輪詢 `is_set`，把停止
/// 轉交給引擎的控制器，並在返回選單前 `clear` 供下一個任務使用。
#[derive(Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[must_use]
pub fn setup_shutdown_signal() -> ShutdownFlag {
    let flag = ShutdownFlag::default();
    let handler = flag.clone();

    ctrlc::set_handler(move || {
        handler.set();
        eprintln!("\n收到中斷信號，正在終止目前任務...");
    })
    .expect("無法設定 Ctrl-C 處理器");

    flag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_shared_between_clones() {
        let flag = ShutdownFlag::default();
        let other = flag.clone();
        assert!(!flag.is_set());

        other.set();
        assert!(flag.is_set());

        flag.clear();
        assert!(!other.is_set());
    }
}
