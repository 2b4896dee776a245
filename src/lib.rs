//! # Quiz Tutor
//!
//! 学习辅导后端：根据学习资料出题、批量评分、联网辅导对话、图片与视频生成
//!
//! ## 架构设计
//!
//! ### ① 数据模型（Models）
//! - `models/` - 测验、评分、长任务、对话等数据结构，以及答卷 TOML 加载
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每次只处理一个请求
//! - `Grader` / `JobBackend` / `VideoBackend` - 编排层依赖的调用接缝
//! - `LlmService` - OpenAI 兼容接口：出题、简答评分、普通对话
//! - `GenAiClient` - 原生 REST 接口：联网对话、图片、视频长任务
//!
//! ### ③ 流程层（Workflow）
//! - `QuizFlow` - 测验 + 作答 → 评分结果
//! - `VideoFlow` - 提交 → 轮询 → 下载
//! - `TutorFlow` - 按是否启用检索选择对话接口
//!
//! ### ④ 编排层（Orchestration）
//! - `FanOutGrader` - 并发评分并按题目 ID 汇总
//! - `JobPoller` - 长任务轮询，支持取消与截止时间
//! - `App` - 批量答卷评分入口

pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{AggregateResult, AsyncJobHandle, GradableItem, GradeOutcome};
pub use orchestrator::{App, CancelSignal, FanOutGrader, JobPoller, PollOutcome};
pub use services::{
    GenAiClient, Grader, GroundedChat, JobBackend, LlmService, QuizGenerator, TutorChat,
    VideoBackend,
};
pub use utils::logging as logger;
pub use workflow::{QuizFlow, TutorFlow, VideoFlow};
