use thiserror::Error;

use crate::models::grading::ItemId;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 远程生成服务调用失败
    #[error("远程调用错误: {0}")]
    Remote(#[from] RemoteCallError),

    /// 批量评分中有题目未能完成评分
    #[error("部分题目评分失败: {failed_ids:?}")]
    PartialEvaluation { failed_ids: Vec<ItemId> },

    /// 任务已完成但没有返回结果地址
    #[error("任务 {job} 已完成，但没有返回结果地址")]
    MissingResult { job: String },

    /// 返回内容不符合预期的 JSON 结构
    #[error("返回内容结构不符合预期 ({context}): {source}")]
    SchemaViolation {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// 同一批次中出现重复的题目 ID
    #[error("批次中存在重复的题目 ID: {id}")]
    DuplicateItem { id: ItemId },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 文件错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),

    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

/// 远程调用错误
#[derive(Debug, Error)]
pub enum RemoteCallError {
    /// 网络请求失败
    #[error("请求失败 ({endpoint}): {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// 服务端返回非成功状态码
    #[error("服务端返回 {status} ({endpoint}): {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// LLM 接口调用失败
    #[error("LLM API 调用失败 (模型: {model}): {source}")]
    Llm {
        model: String,
        #[source]
        source: async_openai::error::OpenAIError,
    },

    /// 返回结果为空
    #[error("返回结果为空: {endpoint}")]
    EmptyResponse { endpoint: String },

    /// 远程任务执行失败
    #[error("远程任务 {job} 执行失败: {message}")]
    JobFailed { job: String, message: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 必填配置项缺失
    #[error("缺少配置项 {key}")]
    MissingValue { key: String },

    /// 配置项取值非法
    #[error("配置项 {key} 的值 '{value}' 非法")]
    InvalidValue { key: String, value: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建网络请求失败错误
    pub fn http(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        AppError::Remote(RemoteCallError::Http {
            endpoint: endpoint.into(),
            source,
        })
    }

    /// 创建 LLM API 调用错误
    pub fn llm(model: impl Into<String>, source: async_openai::error::OpenAIError) -> Self {
        AppError::Remote(RemoteCallError::Llm {
            model: model.into(),
            source,
        })
    }

    /// 创建空结果错误
    pub fn empty_response(endpoint: impl Into<String>) -> Self {
        AppError::Remote(RemoteCallError::EmptyResponse {
            endpoint: endpoint.into(),
        })
    }

    /// 创建结构解析错误
    pub fn schema(context: impl Into<String>, source: serde_json::Error) -> Self {
        AppError::SchemaViolation {
            context: context.into(),
            source,
        }
    }

    /// 是否为远程调用类错误
    pub fn is_remote(&self) -> bool {
        matches!(self, AppError::Remote(_))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
