//! LLM 服务 - 业务能力层
//!
//! 只负责"出题、评分、对话"能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 通过 OpenAI 兼容端点访问生成服务
//! - 出题使用推理模型，评分使用低延迟模型

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestMessageContentPartImage, ChatCompletionRequestMessageContentPartText,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{
    ChatMessage, ChatRole, GradableItem, QuestionType, Quiz, QuizRequest, Verdict,
};
use crate::services::backend::{Grader, QuizGenerator, TutorChat};
use crate::utils::json::parse_json_reply;

/// 每份测验的题型数量：单选、判断、简答
const QUIZ_LAYOUT: (usize, usize, usize) = (12, 3, 5);

/// LLM 服务
///
/// 职责：
/// - 根据学习资料生成测验
/// - 对单道简答题评分
/// - 不带联网检索的辅导对话
/// - 不出现批次、不关心并发
pub struct LlmService {
    client: Client<OpenAIConfig>,
    quiz_model: String,
    grading_model: String,
    chat_model: String,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            quiz_model: config.quiz_model.clone(),
            grading_model: config.grading_model.clone(),
            chat_model: config.chat_model.clone(),
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `model`: 模型名称
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    /// - `imgs`: 图片 URL 或 `data:` URL 列表（可选），会追加到用户消息中
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（字符串）
    pub async fn send_to_llm(
        &self,
        model: &str,
        user_message: &str,
        system_message: Option<&str>,
        imgs: Option<&[String]>,
    ) -> AppResult<String> {
        debug!("调用 LLM API，模型: {}", model);
        debug!("用户消息长度: {} 字符", user_message.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(|e| AppError::llm(model, e))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = match imgs {
            Some(img_urls) if !img_urls.is_empty() => {
                // Vision：文本 + 图片
                let mut content_parts = vec![ChatCompletionRequestUserMessageContentPart::Text(
                    ChatCompletionRequestMessageContentPartText {
                        text: user_message.to_string(),
                    },
                )];

                for url in img_urls {
                    content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                        ChatCompletionRequestMessageContentPartImage {
                            image_url: ImageUrl {
                                url: url.clone(),
                                detail: Some(ImageDetail::Auto),
                            },
                        },
                    ));
                }

                debug!("使用 Vision API，包含 {} 张图片", img_urls.len());

                ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
                    .build()
                    .map_err(|e| AppError::llm(model, e))?
            }
            _ => ChatCompletionRequestUserMessageArgs::default()
                .content(user_message)
                .build()
                .map_err(|e| AppError::llm(model, e))?,
        };

        messages.push(ChatCompletionRequestMessage::User(user_msg));

        self.complete(model, messages).await
    }

    /// 发送完整消息列表并取回第一条回复
    async fn complete(
        &self,
        model: &str,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> AppResult<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .temperature(0.3)
            .build()
            .map_err(|e| AppError::llm(model, e))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            AppError::llm(model, e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| AppError::empty_response(format!("chat/completions ({})", model)))?;

        Ok(content.trim().to_string())
    }

    /// 根据学习资料生成测验
    ///
    /// 文本文件并入提示词，图片作为 Vision 输入。PDF 等文档无法经 OpenAI 兼容接口上传，
    /// 会被跳过，需要走 `GenAiClient::generate_quiz`。
    pub async fn generate_quiz(&self, request: &QuizRequest) -> AppResult<Quiz> {
        let (user_message, system_message) = build_quiz_messages(request);

        for doc in request.documents() {
            warn!("OpenAI 兼容接口不支持 {}，已跳过", doc.mime_type);
        }

        let imgs: Vec<String> = request
            .files
            .iter()
            .filter(|f| f.is_image())
            .map(|f| f.to_data_url())
            .collect();

        let reply = self
            .send_to_llm(
                &self.quiz_model,
                &user_message,
                Some(&system_message),
                Some(imgs.as_slice()),
            )
            .await?;

        let quiz: Quiz = parse_json_reply(&reply, "generate_quiz")?;
        ensure_questions(&quiz, "generate_quiz")?;
        Ok(quiz)
    }

    /// 不带检索工具的辅导对话
    pub async fn chat(&self, history: &[ChatMessage], message: &str) -> AppResult<String> {
        let model = self.chat_model.as_str();
        let messages = chat_messages(model, history, message)?;
        self.complete(model, messages).await
    }
}

#[async_trait]
impl QuizGenerator for LlmService {
    async fn generate_quiz(&self, request: &QuizRequest) -> AppResult<Quiz> {
        LlmService::generate_quiz(self, request).await
    }
}

#[async_trait]
impl TutorChat for LlmService {
    async fn chat(&self, history: &[ChatMessage], message: &str) -> AppResult<String> {
        LlmService::chat(self, history, message).await
    }
}

#[async_trait]
impl Grader for LlmService {
    async fn grade_short_answer(&self, item: &GradableItem) -> AppResult<Verdict> {
        let user_message = build_grading_message(item);
        let reply = self
            .send_to_llm(&self.grading_model, &user_message, None, None)
            .await?;
        parse_json_reply(&reply, "grade_short_answer")
    }
}

/// 历史对话转换为 chat completions 消息，`model` 角色对应 assistant
fn chat_messages(
    model: &str,
    history: &[ChatMessage],
    message: &str,
) -> AppResult<Vec<ChatCompletionRequestMessage>> {
    let mut messages = Vec::with_capacity(history.len() + 1);

    for entry in history {
        let msg = match entry.role {
            ChatRole::User => ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(entry.text.as_str())
                    .build()
                    .map_err(|e| AppError::llm(model, e))?,
            ),
            ChatRole::Model => ChatCompletionRequestMessage::Assistant(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(entry.text.as_str())
                    .build()
                    .map_err(|e| AppError::llm(model, e))?,
            ),
        };
        messages.push(msg);
    }

    messages.push(ChatCompletionRequestMessage::User(
        ChatCompletionRequestUserMessageArgs::default()
            .content(message)
            .build()
            .map_err(|e| AppError::llm(model, e))?,
    ));

    Ok(messages)
}

/// 生成的测验至少要有一道题
pub(crate) fn ensure_questions(quiz: &Quiz, endpoint: &str) -> AppResult<()> {
    if quiz.questions.is_empty() {
        return Err(AppError::empty_response(endpoint));
    }
    debug!(
        "生成测验「{}」: 单选 {}，判断 {}，简答 {}",
        quiz.title,
        quiz.count_of(QuestionType::MultipleChoice),
        quiz.count_of(QuestionType::TrueFalse),
        quiz.count_of(QuestionType::ShortAnswer)
    );
    Ok(())
}

/// 构建出题消息，返回 (user_message, system_message)
///
/// 只合并文本资料；图片与文档由调用方作为附件发送。
pub(crate) fn build_quiz_messages(request: &QuizRequest) -> (String, String) {
    let (mc, tf, sa) = QUIZ_LAYOUT;

    let system_message = "You are an experienced teacher who writes accurate, age-appropriate study quizzes. \
                          Always answer with a single JSON object and nothing else."
        .to_string();

    let mut material = request.text.trim().to_string();
    for file in request.files.iter().filter(|f| f.is_text()) {
        if let Some(text) = file.decode_text() {
            material.push_str("\n\n");
            material.push_str(text.trim());
        }
    }

    let user_message = format!(
        r#"Create a comprehensive study quiz for a {grade} {subject} student based on the provided content and any attached files.
The quiz MUST have exactly:
- {mc} Multiple Choice Questions (type "multiple_choice", 4 options, correctAnswer is the exact option text)
- {tf} True/False Questions (type "true_false", correctAnswer is "True" or "False")
- {sa} Short Answer Questions (type "short_answer")

Return JSON:
{{"title": "a creative title", "questions": [{{"id": 1, "type": "...", "text": "...", "options": ["..."], "correctAnswer": "..."}}]}}

Content:
{material}"#,
        grade = request.grade.name(),
        subject = request.subject.name(),
    );

    (user_message, system_message)
}

fn build_grading_message(item: &GradableItem) -> String {
    format!(
        r#"Question: {}
Correct Answer Key: {}
Student Answer: {}

Grade the student answer. It doesn't match exactly, but is it conceptually correct?
Return JSON: {{ "isCorrect": boolean, "feedback": "short explanation" }}"#,
        item.prompt, item.reference_answer, item.submitted_answer
    )
}
