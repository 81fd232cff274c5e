use super::batch::JobResult;

/// 引擎在工作執行緒上發出的事件，經 mpsc 通道送回呼叫端
///
/// 呼叫端永遠不直接讀引擎的共享狀態。
#[derive(Debug)]
pub enum EngineEvent {
    /// 目前任務的進度百分比（0-100，單調遞增）
    Progress(u8),
    /// 人類可讀的狀態訊息
    Status(String),
    /// 批次模式：一個項目處理完畢（成功或失敗）
    ItemDone(JobResult),
    /// 批次模式：每處理完一個項目後的整體進度
    BatchProgress { done: usize, total: usize },
    /// 終端事件：執行結束（完成、被停止都會發出）
    Finished,
    /// 終端前的錯誤訊息；之後仍會跟著 Finished
    Error(String),
}
