use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::{AppResult, ConfigError};
use crate::orchestrator::FailurePolicy;

/// 程序配置文件
///
/// API 密钥等所有取值都通过构造时注入，服务层不直接读取环境变量。
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 同时评分的答卷数量
    pub max_concurrent_sheets: usize,
    /// 答卷 TOML 文件存放目录
    pub sheet_folder: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 评分报告文件
    pub output_log_file: String,
    // --- 生成服务配置 ---
    pub api_key: String,
    /// OpenAI 兼容接口地址（出题、评分、普通对话）
    pub llm_api_base_url: String,
    /// 原生 REST 接口地址（联网对话、图片、视频）
    pub genai_api_base_url: String,
    pub quiz_model: String,
    pub grading_model: String,
    pub chat_model: String,
    pub grounded_chat_model: String,
    pub image_model: String,
    pub image_edit_model: String,
    pub video_model: String,
    // --- 轮询与评分策略 ---
    /// 长任务状态查询间隔（秒）
    pub poll_interval_secs: u64,
    /// 长任务最长等待时间（秒），不设置则只能通过取消信号停止
    pub poll_deadline_secs: Option<u64>,
    /// 单题评分失败时的处理策略
    pub failure_policy: FailurePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_sheets: 8,
            sheet_folder: "answer_sheets".to_string(),
            verbose_logging: false,
            output_log_file: "grading_report.txt".to_string(),
            api_key: String::new(),
            llm_api_base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            genai_api_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            quiz_model: "gemini-3-pro-preview".to_string(),
            grading_model: "gemini-2.5-flash-lite".to_string(),
            chat_model: "gemini-3-pro-preview".to_string(),
            grounded_chat_model: "gemini-2.5-flash".to_string(),
            image_model: "imagen-4.0-generate-001".to_string(),
            image_edit_model: "gemini-2.5-flash-image".to_string(),
            video_model: "veo-3.1-fast-generate-preview".to_string(),
            poll_interval_secs: 5,
            poll_deadline_secs: None,
            failure_policy: FailurePolicy::FailBatch,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_concurrent_sheets: std::env::var("MAX_CONCURRENT_SHEETS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_sheets),
            sheet_folder: std::env::var("SHEET_FOLDER").unwrap_or(default.sheet_folder),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            api_key: std::env::var("GENAI_API_KEY").unwrap_or(default.api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            genai_api_base_url: std::env::var("GENAI_API_BASE_URL").unwrap_or(default.genai_api_base_url),
            quiz_model: std::env::var("QUIZ_MODEL").unwrap_or(default.quiz_model),
            grading_model: std::env::var("GRADING_MODEL").unwrap_or(default.grading_model),
            chat_model: std::env::var("CHAT_MODEL").unwrap_or(default.chat_model),
            grounded_chat_model: std::env::var("GROUNDED_CHAT_MODEL").unwrap_or(default.grounded_chat_model),
            image_model: std::env::var("IMAGE_MODEL").unwrap_or(default.image_model),
            image_edit_model: std::env::var("IMAGE_EDIT_MODEL").unwrap_or(default.image_edit_model),
            video_model: std::env::var("VIDEO_MODEL").unwrap_or(default.video_model),
            poll_interval_secs: std::env::var("POLL_INTERVAL_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.poll_interval_secs),
            poll_deadline_secs: std::env::var("POLL_DEADLINE_SECS").ok().and_then(|v| v.parse().ok()).or(default.poll_deadline_secs),
            failure_policy: std::env::var("FAILURE_POLICY").ok().and_then(|v| v.parse().ok()).unwrap_or(default.failure_policy),
        }
    }

    /// 从 TOML 文件加载配置，缺省字段使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", path.display()))?;

        Ok(config)
    }

    /// 检查必填项
    pub fn validate(&self) -> AppResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingValue {
                key: "api_key".to_string(),
            }
            .into());
        }
        if self.max_concurrent_sheets == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_concurrent_sheets".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "poll_interval_secs".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_deadline(&self) -> Option<Duration> {
        self.poll_deadline_secs.map(Duration::from_secs)
    }
}
