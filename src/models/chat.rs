use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// 对话消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

/// 联网检索来源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub uri: String,
    pub title: String,
}

/// 辅导对话回复
#[derive(Debug, Clone, Default)]
pub struct TutorReply {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

/// 对话时启用的检索工具
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroundingTools {
    pub search: bool,
    pub maps: bool,
}

impl GroundingTools {
    pub fn any(self) -> bool {
        self.search || self.maps
    }
}
