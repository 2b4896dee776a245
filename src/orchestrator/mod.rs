//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `grader` - 并发评分器
//! - 每道简答题一个远程请求，全部同时发出，统一等待
//! - 单选 / 判断题本地比对
//! - 结果按题目 ID 归档
//!
//! ### `poller` - 长任务轮询器
//! - 固定间隔查询远程任务状态直到完成
//! - 支持取消信号与截止时间（`cancel`）
//!
//! ### `batch_processor` / `sheet_processor` - 批量答卷评分
//! - batch_processor 管批量与并发，sheet_processor 管单份答卷
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<AnswerSheet>)
//!     ↓
//! sheet_processor (处理单份答卷)
//!     ↓
//! workflow::QuizFlow / VideoFlow
//!     ↓
//! grader / poller
//!     ↓
//! services (能力层：Grader / JobBackend)
//! ```

pub mod batch_processor;
pub mod cancel;
pub mod grader;
pub mod poller;
pub mod sheet_processor;

pub use batch_processor::App;
pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use grader::{grade_locally, FailurePolicy, FanOutGrader};
pub use poller::{JobPoller, PollOutcome, DEFAULT_POLL_INTERVAL};
pub use sheet_processor::{process_sheet, SheetStats};
