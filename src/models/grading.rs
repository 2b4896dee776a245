//! 评分数据模型

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::quiz::QuestionType;

/// 题目 ID
pub type ItemId = u32;

/// 待评分的一道题
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradableItem {
    pub id: ItemId,
    pub kind: QuestionType,
    /// 题干
    pub prompt: String,
    pub reference_answer: String,
    /// 学生答案，未作答时为空字符串
    pub submitted_answer: String,
}

/// 远程评分返回的判定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub is_correct: bool,
    #[serde(default)]
    pub feedback: String,
}

/// 单题评分结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeOutcome {
    pub id: ItemId,
    pub correct: bool,
    pub explanation: String,
    /// 远程评分失败、按兜底策略记为未评分
    #[serde(default)]
    pub ungraded: bool,
}

impl GradeOutcome {
    pub fn from_verdict(id: ItemId, verdict: Verdict) -> Self {
        Self {
            id,
            correct: verdict.is_correct,
            explanation: verdict.feedback,
            ungraded: false,
        }
    }

    pub fn ungraded(id: ItemId, reason: impl std::fmt::Display) -> Self {
        Self {
            id,
            correct: false,
            explanation: format!("ungraded: {}", reason),
            ungraded: true,
        }
    }
}

/// 一次评分的汇总结果
///
/// `total_correct` 总是由 `outcomes` 推导，不单独维护。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateResult {
    total_correct: usize,
    outcomes: BTreeMap<ItemId, GradeOutcome>,
}

impl AggregateResult {
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = GradeOutcome>) -> Self {
        let outcomes: BTreeMap<ItemId, GradeOutcome> =
            outcomes.into_iter().map(|o| (o.id, o)).collect();
        let total_correct = outcomes.values().filter(|o| o.correct).count();
        Self {
            total_correct,
            outcomes,
        }
    }

    pub fn total_correct(&self) -> usize {
        self.total_correct
    }

    /// 结果总数
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn outcomes(&self) -> &BTreeMap<ItemId, GradeOutcome> {
        &self.outcomes
    }

    pub fn get(&self, id: ItemId) -> Option<&GradeOutcome> {
        self.outcomes.get(&id)
    }

    /// 按兜底策略记为未评分的题目
    pub fn failed_ids(&self) -> Vec<ItemId> {
        self.outcomes
            .values()
            .filter(|o| o.ungraded)
            .map(|o| o.id)
            .collect()
    }
}
