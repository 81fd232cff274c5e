pub mod batch;
pub mod command;
pub mod control;
pub mod events;
pub mod hwaccel;
pub mod job;
pub mod metadata;
pub mod plan;
pub mod progress;
pub mod runner;
pub mod single;

pub use batch::{BatchConfig, BatchCoordinator, BatchReport, JobOutcome, JobResult};
pub use command::{FfmpegCommand, check_tools_available, new_tool_command};
pub use control::{Cancelled, CancellationController};
pub use events::EngineEvent;
pub use hwaccel::{HwAccelInfo, detect_hwaccel};
pub use job::ExtractionJob;
pub use metadata::{VideoMetadata, probe};
pub use plan::{ExtractionPlan, ImageFormat, SamplingMode, TimeRange, build_plan, jpeg_qscale};
pub use progress::{ProgressProtocol, ProgressState, ProgressTracker};
pub use runner::{FfmpegProcess, ProcessSlot};
pub use single::SingleJobEngine;
