//! 长任务轮询器 - 编排层
//!
//! 状态流转：`Submitted → Polling → Done | Failed`
//!
//! - 句柄提交时已完成则直接返回，不发起任何查询
//! - 未完成时每隔固定间隔查询一次，用新句柄替换旧句柄
//! - 完成但没有结果地址时返回 `MissingResult`
//! - 查询失败直接返回 `Remote` 错误，不重试
//! - 取消信号或截止时间到达时停止轮询，不视为错误

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::AsyncJobHandle;
use crate::orchestrator::cancel::CancelSignal;
use crate::services::JobBackend;

/// 默认轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// 轮询结束的方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// 任务完成，附带结果地址
    Completed(String),
    /// 收到取消信号
    Cancelled,
    /// 超过截止时间
    DeadlineExceeded,
}

/// 长任务轮询器
pub struct JobPoller<B> {
    backend: B,
    interval: Duration,
    deadline: Option<Duration>,
}

impl<B: JobBackend> JobPoller<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            interval: DEFAULT_POLL_INTERVAL,
            deadline: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// 从开始轮询算起的最长等待时间
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// 轮询直到任务完成、被取消或超时
    pub async fn poll_until_done(
        &self,
        mut handle: AsyncJobHandle,
        cancel: &CancelSignal,
    ) -> AppResult<PollOutcome> {
        let deadline = self.deadline.map(|d| Instant::now() + d);
        let mut queries = 0usize;

        while !handle.done {
            tokio::select! {
                biased;
                stop = interrupted(cancel, deadline) => {
                    info!("⏹ 任务 {} 停止轮询: {:?} (已查询 {} 次)", handle.name, stop, queries);
                    return Ok(stop);
                }
                _ = tokio::time::sleep(self.interval) => {}
            }

            handle = tokio::select! {
                biased;
                stop = interrupted(cancel, deadline) => {
                    info!("⏹ 任务 {} 停止轮询: {:?} (已查询 {} 次)", handle.name, stop, queries);
                    return Ok(stop);
                }
                refreshed = self.backend.refresh(&handle) => refreshed?,
            };
            queries += 1;
            debug!("任务 {} 第 {} 次查询: done={}", handle.name, queries, handle.done);
        }

        match handle.result_locator {
            Some(locator) if !locator.trim().is_empty() => {
                info!("✓ 任务 {} 完成 (查询 {} 次)", handle.name, queries);
                Ok(PollOutcome::Completed(locator))
            }
            _ => Err(AppError::MissingResult { job: handle.name }),
        }
    }
}

/// 等待取消信号或截止时间，先到者为准
async fn interrupted(cancel: &CancelSignal, deadline: Option<Instant>) -> PollOutcome {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => PollOutcome::Cancelled,
        _ = until(deadline) => PollOutcome::DeadlineExceeded,
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
