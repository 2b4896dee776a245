use serde::{Deserialize, Serialize};

use super::quiz::{Quiz, UserAnswer};

/// 答卷：一份测验加上一名学生的作答
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerSheet {
    pub student: String,
    pub quiz: Quiz,
    #[serde(default)]
    pub answers: Vec<UserAnswer>,
    #[serde(skip_serializing, skip_deserializing)]
    pub file_path: Option<String>,
}

impl AnswerSheet {
    /// 日志中使用的名称
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.student, self.quiz.title)
    }
}
