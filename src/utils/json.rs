//! 模型 JSON 回复解析工具
//!
//! 模型经常把 JSON 包在 ```json 代码块里，或者在前后附带说明文字

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use crate::error::{AppError, AppResult};

static CODE_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").ok());

/// 从模型回复中截取 JSON 文本
///
/// # 参数
/// - `reply`: 模型原始回复
///
/// # 返回
/// 返回代码块内的内容；没有代码块时返回第一个 `{` 到最后一个 `}` 之间的内容
pub fn extract_json(reply: &str) -> &str {
    let reply = reply.trim();

    if let Some(inner) = CODE_FENCE
        .as_ref()
        .and_then(|re| re.captures(reply))
        .and_then(|caps| caps.get(1))
    {
        return inner.as_str();
    }

    match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => reply,
    }
}

/// 解析模型回复为指定结构
pub fn parse_json_reply<T: DeserializeOwned>(reply: &str, context: &str) -> AppResult<T> {
    serde_json::from_str(extract_json(reply)).map_err(|e| AppError::schema(context, e))
}
