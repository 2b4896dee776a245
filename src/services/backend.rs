//! 远程生成服务的调用接缝
//!
//! 编排层只依赖这里的两个能力：
//! - 对单道题发起评分，返回判定或错误
//! - 给定任务句柄，返回刷新后的句柄
//!
//! 流程层另外依赖出题与对话能力，两种客户端各自实现。

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{
    AsyncJobHandle, ChatMessage, GradableItem, GroundingTools, Quiz, QuizRequest, TutorReply,
    Verdict, VideoRequest,
};

/// 单题评分能力
#[async_trait]
pub trait Grader: Send + Sync {
    async fn grade_short_answer(&self, item: &GradableItem) -> AppResult<Verdict>;
}

/// 长任务状态查询能力
#[async_trait]
pub trait JobBackend: Send + Sync {
    async fn refresh(&self, handle: &AsyncJobHandle) -> AppResult<AsyncJobHandle>;
}

/// 视频生成能力：提交、查询、下载
#[async_trait]
pub trait VideoBackend: JobBackend {
    async fn submit_video(&self, request: &VideoRequest) -> AppResult<AsyncJobHandle>;

    async fn download(&self, locator: &str) -> AppResult<Vec<u8>>;
}

/// 根据学习资料出题
#[async_trait]
pub trait QuizGenerator: Send + Sync {
    async fn generate_quiz(&self, request: &QuizRequest) -> AppResult<Quiz>;
}

/// 不带检索的辅导对话
#[async_trait]
pub trait TutorChat: Send + Sync {
    async fn chat(&self, history: &[ChatMessage], message: &str) -> AppResult<String>;
}

/// 带搜索 / 地图检索的辅导对话
#[async_trait]
pub trait GroundedChat: Send + Sync {
    async fn chat_with_grounding(
        &self,
        history: &[ChatMessage],
        message: &str,
        tools: GroundingTools,
    ) -> AppResult<TutorReply>;
}

#[async_trait]
impl<T: Grader + ?Sized> Grader for Arc<T> {
    async fn grade_short_answer(&self, item: &GradableItem) -> AppResult<Verdict> {
        (**self).grade_short_answer(item).await
    }
}

#[async_trait]
impl<T: JobBackend + ?Sized> JobBackend for Arc<T> {
    async fn refresh(&self, handle: &AsyncJobHandle) -> AppResult<AsyncJobHandle> {
        (**self).refresh(handle).await
    }
}

#[async_trait]
impl<T: VideoBackend + ?Sized> VideoBackend for Arc<T> {
    async fn submit_video(&self, request: &VideoRequest) -> AppResult<AsyncJobHandle> {
        (**self).submit_video(request).await
    }

    async fn download(&self, locator: &str) -> AppResult<Vec<u8>> {
        (**self).download(locator).await
    }
}

#[async_trait]
impl<T: QuizGenerator + ?Sized> QuizGenerator for Arc<T> {
    async fn generate_quiz(&self, request: &QuizRequest) -> AppResult<Quiz> {
        (**self).generate_quiz(request).await
    }
}

#[async_trait]
impl<T: TutorChat + ?Sized> TutorChat for Arc<T> {
    async fn chat(&self, history: &[ChatMessage], message: &str) -> AppResult<String> {
        (**self).chat(history, message).await
    }
}

#[async_trait]
impl<T: GroundedChat + ?Sized> GroundedChat for Arc<T> {
    async fn chat_with_grounding(
        &self,
        history: &[ChatMessage],
        message: &str,
        tools: GroundingTools,
    ) -> AppResult<TutorReply> {
        (**self).chat_with_grounding(history, message, tools).await
    }
}
