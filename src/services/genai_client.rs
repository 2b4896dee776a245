//! 生成服务原生 REST 客户端 - 业务能力层
//!
//! OpenAI 兼容端点不提供的能力走这里：
//! - 带 Google 搜索 / 地图检索的对话（返回引用来源）
//! - 图片生成与图片编辑
//! - 视频生成长任务的提交、状态查询与下载
//! - 带 PDF 等文档附件的出题

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, RemoteCallError};
use crate::models::{
    AsyncJobHandle, ChatMessage, ChatRole, GroundingSource, GroundingTools, InlineFile, Quiz,
    QuizRequest, TutorReply, VideoRequest,
};
use crate::services::backend::{GroundedChat, JobBackend, QuizGenerator, VideoBackend};
use crate::services::llm_service::{build_quiz_messages, ensure_questions};
use crate::utils::json::parse_json_reply;

const EMPTY_REPLY: &str = "I couldn't generate a response.";

/// 原生 REST 客户端
pub struct GenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    quiz_model: String,
    grounded_chat_model: String,
    image_model: String,
    image_edit_model: String,
    video_model: String,
}

impl GenAiClient {
    /// 创建新的客户端
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.genai_api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            quiz_model: config.quiz_model.clone(),
            grounded_chat_model: config.grounded_chat_model.clone(),
            image_model: config.image_model.clone(),
            image_edit_model: config.image_edit_model.clone(),
            video_model: config.video_model.clone(),
        }
    }

    /// 带检索工具的辅导对话
    ///
    /// # 参数
    /// - `history`: 之前的对话
    /// - `message`: 本轮用户消息
    /// - `tools`: 启用的检索工具
    pub async fn chat_with_grounding(
        &self,
        history: &[ChatMessage],
        message: &str,
        tools: GroundingTools,
    ) -> AppResult<TutorReply> {
        let body = grounded_request_body(history, message, tools);

        let endpoint = format!("models/{}:generateContent", self.grounded_chat_model);
        let response: GenerateContentResponse = self.post_json(&endpoint, &body).await?;

        let reply = tutor_reply_from(response);
        debug!("联网对话完成，引用来源 {} 条", reply.sources.len());
        Ok(reply)
    }

    /// 文生图，返回 `data:image/jpeg;base64,...`
    pub async fn generate_image(&self, prompt: &str) -> AppResult<String> {
        let body = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": {
                "sampleCount": 1,
                "aspectRatio": "1:1",
                "outputOptions": { "mimeType": "image/jpeg" }
            }
        });

        let endpoint = format!("models/{}:predict", self.image_model);
        let response: PredictResponse = self.post_json(&endpoint, &body).await?;

        let bytes = response
            .predictions
            .into_iter()
            .find_map(|p| p.bytes_base64_encoded)
            .ok_or_else(|| AppError::empty_response(endpoint.clone()))?;

        Ok(format!("data:image/jpeg;base64,{}", bytes))
    }

    /// 按提示词编辑图片，返回 `data:image/png;base64,...`
    pub async fn edit_image(&self, image: &InlineFile, prompt: &str) -> AppResult<String> {
        let body = edit_image_body(image, prompt);

        let endpoint = format!("models/{}:generateContent", self.image_edit_model);
        let response: GenerateContentResponse = self.post_json(&endpoint, &body).await?;

        edited_image_url(response).ok_or_else(|| AppError::empty_response(endpoint))
    }

    /// 根据学习资料生成测验，图片与 PDF 等文档作为 `inlineData` 附件一并上传
    pub async fn generate_quiz(&self, request: &QuizRequest) -> AppResult<Quiz> {
        let body = quiz_request_body(request);

        let endpoint = format!("models/{}:generateContent", self.quiz_model);
        let response: GenerateContentResponse = self.post_json(&endpoint, &body).await?;

        let reply = candidate_text(response).ok_or_else(|| AppError::empty_response(endpoint.clone()))?;
        let quiz: Quiz = parse_json_reply(&reply, &endpoint)?;
        ensure_questions(&quiz, &endpoint)?;
        Ok(quiz)
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    async fn post_json<T: DeserializeOwned>(&self, endpoint: &str, body: &Value) -> AppResult<T> {
        let response = self
            .http
            .post(self.url(endpoint))
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::http(endpoint, e))?;
        read_json(endpoint, response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> AppResult<T> {
        let response = self
            .http
            .get(self.url(endpoint))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| AppError::http(endpoint, e))?;
        read_json(endpoint, response).await
    }
}

#[async_trait]
impl GroundedChat for GenAiClient {
    async fn chat_with_grounding(
        &self,
        history: &[ChatMessage],
        message: &str,
        tools: GroundingTools,
    ) -> AppResult<TutorReply> {
        GenAiClient::chat_with_grounding(self, history, message, tools).await
    }
}

#[async_trait]
impl QuizGenerator for GenAiClient {
    async fn generate_quiz(&self, request: &QuizRequest) -> AppResult<Quiz> {
        GenAiClient::generate_quiz(self, request).await
    }
}

#[async_trait]
impl JobBackend for GenAiClient {
    async fn refresh(&self, handle: &AsyncJobHandle) -> AppResult<AsyncJobHandle> {
        let operation: Operation = self.get_json(&handle.name).await?;
        operation_to_handle(operation)
    }
}

#[async_trait]
impl VideoBackend for GenAiClient {
    async fn submit_video(&self, request: &VideoRequest) -> AppResult<AsyncJobHandle> {
        let body = video_request_body(request);

        let endpoint = format!("models/{}:predictLongRunning", self.video_model);
        let operation: Operation = self.post_json(&endpoint, &body).await?;

        info!("🎬 视频任务已提交: {}", operation.name);
        operation_to_handle(operation)
    }

    /// 下载生成的视频，API 密钥放在请求头里，不进入 URL 与错误信息
    async fn download(&self, locator: &str) -> AppResult<Vec<u8>> {
        let response = self
            .http
            .get(locator)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| AppError::http(locator, e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteCallError::Status {
                endpoint: locator.to_string(),
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::http(locator, e.without_url()))?;
        debug!("视频下载完成，{} 字节", bytes.len());
        Ok(bytes.to_vec())
    }
}

async fn read_json<T: DeserializeOwned>(endpoint: &str, response: reqwest::Response) -> AppResult<T> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| AppError::http(endpoint, e))?;

    if !status.is_success() {
        warn!("{} 返回 {}", endpoint, status);
        return Err(RemoteCallError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body: text,
        }
        .into());
    }

    serde_json::from_str(&text).map_err(|e| AppError::schema(endpoint, e))
}

// ========== 请求体 ==========

fn grounded_request_body(history: &[ChatMessage], message: &str, tools: GroundingTools) -> Value {
    let mut contents: Vec<Value> = history
        .iter()
        .map(|m| {
            let role = match m.role {
                ChatRole::User => "user",
                ChatRole::Model => "model",
            };
            json!({ "role": role, "parts": [{ "text": m.text }] })
        })
        .collect();
    contents.push(json!({ "role": "user", "parts": [{ "text": message }] }));

    let mut tool_list = Vec::new();
    if tools.search {
        tool_list.push(json!({ "googleSearch": {} }));
    }
    if tools.maps {
        tool_list.push(json!({ "googleMaps": {} }));
    }

    let mut body = json!({ "contents": contents });
    if !tool_list.is_empty() {
        body["tools"] = Value::Array(tool_list);
    }
    body
}

fn inline_part(file: &InlineFile) -> Value {
    json!({ "inlineData": { "mimeType": file.mime_type, "data": file.data } })
}

fn edit_image_body(image: &InlineFile, prompt: &str) -> Value {
    json!({
        "contents": [{
            "parts": [inline_part(image), { "text": prompt }]
        }],
        "generationConfig": { "responseModalities": ["IMAGE"] }
    })
}

/// 文本资料并入提示词，其余文件逐个作为附件
fn quiz_request_body(request: &QuizRequest) -> Value {
    let (user_message, system_message) = build_quiz_messages(request);

    let mut parts: Vec<Value> = request
        .files
        .iter()
        .filter(|f| !f.is_text())
        .map(inline_part)
        .collect();
    parts.push(json!({ "text": user_message }));

    json!({
        "systemInstruction": { "parts": [{ "text": system_message }] },
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": { "responseMimeType": "application/json" }
    })
}

fn video_request_body(request: &VideoRequest) -> Value {
    let mut instance = json!({ "prompt": request.prompt });
    if let Some(image) = &request.image {
        instance["image"] = json!({
            "bytesBase64Encoded": image.data,
            "mimeType": image.mime_type
        });
    }

    json!({
        "instances": [instance],
        "parameters": {
            "sampleCount": 1,
            "aspectRatio": request.aspect_ratio,
            "resolution": request.resolution
        }
    })
}

// ========== 响应结构 ==========

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<Blob>,
}

#[derive(Debug, Deserialize)]
struct Blob {
    data: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Default, Deserialize)]
struct GroundingChunk {
    web: Option<ChunkSource>,
    maps: Option<ChunkSource>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkSource {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    error: Option<OperationError>,
    response: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

fn tutor_reply_from(response: GenerateContentResponse) -> TutorReply {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return TutorReply {
            text: EMPTY_REPLY.to_string(),
            sources: Vec::new(),
        };
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    let mut sources: Vec<GroundingSource> = Vec::new();
    for chunk in candidate
        .grounding_metadata
        .map(|m| m.grounding_chunks)
        .unwrap_or_default()
    {
        let Some(src) = chunk.web.or(chunk.maps) else {
            continue;
        };
        let Some(uri) = src.uri else {
            continue;
        };
        if sources.iter().any(|s| s.uri == uri) {
            continue;
        }
        sources.push(GroundingSource {
            title: src.title.unwrap_or_else(|| uri.clone()),
            uri,
        });
    }

    TutorReply {
        text: if text.trim().is_empty() {
            EMPTY_REPLY.to_string()
        } else {
            text
        },
        sources,
    }
}

/// 编辑结果中的第一张图片，转为 `data:` URL
fn edited_image_url(response: GenerateContentResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .find_map(|p| p.inline_data.map(|b| b.data))
        .map(|data| format!("data:image/png;base64,{}", data))
}

/// 第一个候选的全部文本
fn candidate_text(response: GenerateContentResponse) -> Option<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect();
    (!text.trim().is_empty()).then_some(text)
}

/// 远程 Operation 转换为任务句柄
///
/// 任务以错误结束时直接返回 `JobFailed`。
fn operation_to_handle(operation: Operation) -> AppResult<AsyncJobHandle> {
    if let Some(err) = operation.error {
        return Err(RemoteCallError::JobFailed {
            job: operation.name,
            message: format!("[{}] {}", err.code, err.message),
        }
        .into());
    }

    if !operation.done {
        return Ok(AsyncJobHandle::pending(operation.name));
    }

    let locator = operation.response.as_ref().and_then(|r| {
        r.pointer("/generateVideoResponse/generatedSamples/0/video/uri")
            .or_else(|| r.pointer("/generatedVideos/0/video/uri"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    Ok(AsyncJobHandle::completed(operation.name, locator))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with_key(api_key: &str) -> GenAiClient {
        GenAiClient::new(&Config {
            api_key: api_key.to_string(),
            ..Config::default()
        })
    }

    #[tokio::test]
    async fn test_download_error_hides_api_key() {
        let client = client_with_key("SECRET123");

        let err = client
            .download("http://127.0.0.1:1/v.mp4?alt=media")
            .await
            .unwrap_err();

        assert!(err.is_remote());
        let mut text = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(e) = source {
            text.push_str(&e.to_string());
            source = e.source();
        }
        assert!(!text.contains("SECRET123"), "{}", text);
        assert!(!format!("{:?}", err).contains("SECRET123"));
    }

    #[test]
    fn test_grounded_request_roles_and_tools() {
        let history = vec![ChatMessage::user("Hi"), ChatMessage::model("Hello!")];
        let body = grounded_request_body(
            &history,
            "Cafes near the museum?",
            GroundingTools {
                search: true,
                maps: true,
            },
        );

        let roles: Vec<&str> = body["contents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
        assert_eq!(body["contents"][2]["parts"][0]["text"], "Cafes near the museum?");
        assert_eq!(body["tools"], json!([{ "googleSearch": {} }, { "googleMaps": {} }]));
    }

    #[test]
    fn test_grounded_request_without_tools() {
        let body = grounded_request_body(&[], "Hi", GroundingTools::default());
        assert!(body.get("tools").is_none());
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_edit_image_body() {
        let image = InlineFile::from_bytes("image/jpeg", b"abc");
        let body = edit_image_body(&image, "add a retro filter");

        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "YWJj");
        assert_eq!(parts[1]["text"], "add a retro filter");
        assert_eq!(body["generationConfig"]["responseModalities"], json!(["IMAGE"]));
    }

    #[test]
    fn test_quiz_body_attaches_documents() {
        let request = QuizRequest {
            text: "Chapter 4".to_string(),
            files: vec![
                InlineFile::from_bytes("text/plain", b"Cells divide by mitosis."),
                InlineFile::from_bytes("application/pdf", b"%PDF"),
                InlineFile::from_bytes("image/png", b"png"),
            ],
            ..QuizRequest::default()
        };

        let body = quiz_request_body(&request);

        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "application/pdf");
        assert_eq!(parts[0]["inlineData"]["data"], "JVBERg==");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        let prompt = parts[2]["text"].as_str().unwrap();
        assert!(prompt.contains("Cells divide by mitosis."));
        assert!(prompt.contains("Chapter 4"));
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert!(body["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("JSON"));
    }

    #[test]
    fn test_video_body_with_first_frame() {
        let request = VideoRequest::new("a cell dividing")
            .with_image(InlineFile::from_bytes("image/png", b"abc"));

        let body = video_request_body(&request);

        let instance = &body["instances"][0];
        assert_eq!(instance["prompt"], "a cell dividing");
        assert_eq!(instance["image"]["bytesBase64Encoded"], "YWJj");
        assert_eq!(instance["image"]["mimeType"], "image/png");
        assert_eq!(body["parameters"]["aspectRatio"], "16:9");
        assert_eq!(body["parameters"]["resolution"], "720p");

        let text_only = video_request_body(&VideoRequest::new("prompt"));
        assert!(text_only["instances"][0].get("image").is_none());
    }

    #[test]
    fn test_candidate_text() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "{\"title\": "}, {"text": "\"Cells\"}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(candidate_text(response).as_deref(), Some(r#"{"title": "Cells"}"#));
        assert!(candidate_text(GenerateContentResponse::default()).is_none());
    }

    #[test]
    fn test_pending_operation() {
        let op: Operation =
            serde_json::from_str(r#"{"name": "models/veo/operations/1"}"#).unwrap();
        let handle = operation_to_handle(op).unwrap();
        assert_eq!(handle, AsyncJobHandle::pending("models/veo/operations/1"));
    }

    #[test]
    fn test_completed_operation_locator() {
        let op: Operation = serde_json::from_str(
            r#"{
                "name": "models/veo/operations/1",
                "done": true,
                "response": {
                    "generateVideoResponse": {
                        "generatedSamples": [{ "video": { "uri": "https://host/v.mp4?alt=media" } }]
                    }
                }
            }"#,
        )
        .unwrap();
        let handle = operation_to_handle(op).unwrap();
        assert!(handle.done);
        assert_eq!(handle.result_locator.as_deref(), Some("https://host/v.mp4?alt=media"));
    }

    #[test]
    fn test_completed_operation_without_video() {
        let op: Operation = serde_json::from_str(
            r#"{"name": "op", "done": true, "response": {"generateVideoResponse": {}}}"#,
        )
        .unwrap();
        let handle = operation_to_handle(op).unwrap();
        assert!(handle.done);
        assert!(handle.result_locator.is_none());
    }

    #[test]
    fn test_failed_operation() {
        let op: Operation = serde_json::from_str(
            r#"{"name": "op", "done": true, "error": {"code": 3, "message": "unsafe prompt"}}"#,
        )
        .unwrap();
        let err = operation_to_handle(op).unwrap_err();
        assert!(matches!(
            err,
            AppError::Remote(RemoteCallError::JobFailed { .. })
        ));
    }

    #[test]
    fn test_tutor_reply_collects_sources() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{
                "candidates": [{
                    "content": { "parts": [{ "text": "Paris " }, { "text": "is the capital." }] },
                    "groundingMetadata": {
                        "groundingChunks": [
                            { "web": { "uri": "https://a.example", "title": "A" } },
                            { "web": { "uri": "https://a.example", "title": "A again" } },
                            { "maps": { "uri": "https://maps.example/p" } },
                            { "web": { "title": "no uri" } }
                        ]
                    }
                }]
            }"#,
        )
        .unwrap();

        let reply = tutor_reply_from(response);
        assert_eq!(reply.text, "Paris is the capital.");
        assert_eq!(
            reply.sources,
            vec![
                GroundingSource {
                    uri: "https://a.example".to_string(),
                    title: "A".to_string()
                },
                GroundingSource {
                    uri: "https://maps.example/p".to_string(),
                    title: "https://maps.example/p".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_tutor_reply_empty() {
        let reply = tutor_reply_from(GenerateContentResponse::default());
        assert_eq!(reply.text, EMPTY_REPLY);
        assert!(reply.sources.is_empty());
    }

    #[test]
    fn test_edited_image_url() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "done"}, {"inlineData": {"mimeType": "image/png", "data": "iVBOR"}}]}}]}"#,
        )
        .unwrap();
        assert_eq!(
            edited_image_url(response).as_deref(),
            Some("data:image/png;base64,iVBOR")
        );
    }

    #[test]
    fn test_edit_refused_without_image() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "I can't edit this image."}]}}]}"#,
        )
        .unwrap();
        assert!(edited_image_url(response).is_none());
    }
}
