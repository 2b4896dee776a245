//! 辅导流程 - 流程层
//!
//! - 对话：启用搜索或地图检索时走原生接口并返回引用来源，否则走 OpenAI 兼容接口
//! - 出题：资料里有 PDF 等文档时走原生接口以附件上传，否则走 OpenAI 兼容接口

use std::sync::Arc;

use tracing::debug;

use crate::error::AppResult;
use crate::models::{ChatMessage, GroundingTools, Quiz, QuizRequest, TutorReply};
use crate::services::{GenAiClient, GroundedChat, LlmService, QuizGenerator, TutorChat};

/// 辅导流程
///
/// `P` 为 OpenAI 兼容客户端，`N` 为原生接口客户端
pub struct TutorFlow<P = LlmService, N = GenAiClient> {
    plain: Arc<P>,
    native: Arc<N>,
}

impl<P, N> TutorFlow<P, N>
where
    P: TutorChat + QuizGenerator,
    N: GroundedChat + QuizGenerator,
{
    pub fn new(plain: Arc<P>, native: Arc<N>) -> Self {
        Self { plain, native }
    }

    pub async fn ask(
        &self,
        history: &[ChatMessage],
        message: &str,
        tools: GroundingTools,
    ) -> AppResult<TutorReply> {
        if tools.any() {
            debug!("使用检索工具: search={}, maps={}", tools.search, tools.maps);
            return self.native.chat_with_grounding(history, message, tools).await;
        }

        let text = self.plain.chat(history, message).await?;
        Ok(TutorReply {
            text,
            sources: Vec::new(),
        })
    }

    pub async fn create_quiz(&self, request: &QuizRequest) -> AppResult<Quiz> {
        if request.has_documents() {
            debug!("资料含文档附件，使用原生接口出题");
            return self.native.generate_quiz(request).await;
        }
        self.plain.generate_quiz(request).await
    }
}
