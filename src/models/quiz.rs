use std::path::Path;

use serde::{Deserialize, Serialize};

use super::media::InlineFile;
use crate::error::AppResult;

/// 题型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// 单选题
    MultipleChoice,
    /// 判断题
    TrueFalse,
    /// 简答题
    ShortAnswer,
}

impl QuestionType {
    /// 是否可以直接在本地比对答案
    pub fn is_deterministic(self) -> bool {
        matches!(self, QuestionType::MultipleChoice | QuestionType::TrueFalse)
    }
}

/// 题目
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub text: String,
    /// 只有单选题才有选项
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(alias = "correct_answer")]
    pub correct_answer: String,
}

/// 测验
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub title: String,
    pub questions: Vec<Question>,
}

impl Quiz {
    /// 按题型统计题目数量
    pub fn count_of(&self, kind: QuestionType) -> usize {
        self.questions.iter().filter(|q| q.kind == kind).count()
    }
}

/// 学生作答
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAnswer {
    #[serde(alias = "question_id")]
    pub question_id: u32,
    pub answer: String,
}

/// 年级
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GradeLevel {
    #[serde(rename = "Grade 6")]
    Grade6,
    #[serde(rename = "Grade 7")]
    Grade7,
    #[serde(rename = "Grade 8")]
    Grade8,
    #[serde(rename = "Grade 9")]
    Grade9,
    #[serde(rename = "Grade 10")]
    #[default]
    Grade10,
    #[serde(rename = "Grade 11")]
    Grade11,
    #[serde(rename = "Grade 12")]
    Grade12,
}

impl GradeLevel {
    pub fn name(self) -> &'static str {
        match self {
            GradeLevel::Grade6 => "Grade 6",
            GradeLevel::Grade7 => "Grade 7",
            GradeLevel::Grade8 => "Grade 8",
            GradeLevel::Grade9 => "Grade 9",
            GradeLevel::Grade10 => "Grade 10",
            GradeLevel::Grade11 => "Grade 11",
            GradeLevel::Grade12 => "Grade 12",
        }
    }
}

/// 科目
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subject {
    #[default]
    Math,
    Physics,
    Chemistry,
    Biology,
    History,
    Geography,
    Literature,
    English,
    #[serde(rename = "Computer Science")]
    ComputerScience,
}

/// 科目名称（含常见别名）到科目的映射
static SUBJECT_NAMES: phf::Map<&'static str, Subject> = phf::phf_map! {
    "math" => Subject::Math,
    "mathematics" => Subject::Math,
    "physics" => Subject::Physics,
    "chemistry" => Subject::Chemistry,
    "biology" => Subject::Biology,
    "history" => Subject::History,
    "geography" => Subject::Geography,
    "literature" => Subject::Literature,
    "english" => Subject::English,
    "computer science" => Subject::ComputerScience,
    "cs" => Subject::ComputerScience,
};

impl Subject {
    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            Subject::Math => "Math",
            Subject::Physics => "Physics",
            Subject::Chemistry => "Chemistry",
            Subject::Biology => "Biology",
            Subject::History => "History",
            Subject::Geography => "Geography",
            Subject::Literature => "Literature",
            Subject::English => "English",
            Subject::ComputerScience => "Computer Science",
        }
    }

    /// 从名称解析科目（忽略大小写）
    pub fn from_name(s: &str) -> Option<Self> {
        SUBJECT_NAMES.get(s.trim().to_lowercase().as_str()).copied()
    }
}

/// 出题请求
#[derive(Debug, Clone, Default)]
pub struct QuizRequest {
    /// 学习资料文本
    pub text: String,
    /// 上传的学习资料文件
    pub files: Vec<InlineFile>,
    pub grade: GradeLevel,
    pub subject: Subject,
}

impl QuizRequest {
    /// 读取本地文件作为学习资料
    pub async fn attach_file(&mut self, path: &Path) -> AppResult<()> {
        self.files.push(InlineFile::from_path(path).await?);
        Ok(())
    }

    /// 既不是文本也不是图片的资料，如 PDF
    pub fn documents(&self) -> impl Iterator<Item = &InlineFile> {
        self.files.iter().filter(|f| f.is_document())
    }

    pub fn has_documents(&self) -> bool {
        self.documents().next().is_some()
    }
}
