//! 测验评分流程 - 流程层
//!
//! 核心职责：把"一份测验 + 一份作答"变成一批待评分题目，交给并发评分器
//!
//! 流程顺序：
//! 1. 按题目 ID 对齐作答，未作答的题目记为空字符串
//! 2. FanOutGrader 评分
//! 3. 返回汇总结果

use std::collections::HashMap;

use tracing::info;

use crate::error::AppResult;
use crate::models::{AggregateResult, GradableItem, Quiz, UserAnswer};
use crate::orchestrator::{FailurePolicy, FanOutGrader};
use crate::services::Grader;

/// 测验评分流程
pub struct QuizFlow<G> {
    grader: FanOutGrader<G>,
}

impl<G: Grader> QuizFlow<G> {
    pub fn new(grader: G, policy: FailurePolicy) -> Self {
        Self {
            grader: FanOutGrader::new(grader).with_policy(policy),
        }
    }

    pub async fn run(&self, quiz: &Quiz, answers: &[UserAnswer]) -> AppResult<AggregateResult> {
        let items = to_gradable_items(quiz, answers);
        let answered = items
            .iter()
            .filter(|i| !i.submitted_answer.trim().is_empty())
            .count();

        info!(
            "📝 开始评分「{}」: 共 {} 题，已作答 {} 题，失败策略 {:?}",
            quiz.title,
            items.len(),
            answered,
            self.grader.policy()
        );

        self.grader.grade_batch(&items).await
    }
}

/// 题目与作答对齐
///
/// 同一题有多条作答时以最后一条为准；不属于本测验的作答忽略。
pub fn to_gradable_items(quiz: &Quiz, answers: &[UserAnswer]) -> Vec<GradableItem> {
    let by_id: HashMap<u32, &str> = answers
        .iter()
        .map(|a| (a.question_id, a.answer.as_str()))
        .collect();

    quiz.questions
        .iter()
        .map(|q| GradableItem {
            id: q.id,
            kind: q.kind,
            prompt: q.text.clone(),
            reference_answer: q.correct_answer.clone(),
            submitted_answer: by_id.get(&q.id).copied().unwrap_or_default().to_string(),
        })
        .collect()
}
