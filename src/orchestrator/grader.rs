//! 并发评分器 - 编排层
//!
//! ## 职责
//!
//! 对一批题目完成评分并汇总：
//! - 单选 / 判断：本地精确比对，不发远程请求
//! - 简答：每题一个远程评分请求，全部同时发出，统一等待
//! - 结果按题目 ID 归档，与完成顺序无关
//!
//! ## 失败策略
//!
//! 由 [`FailurePolicy`] 决定：
//! - `FailBatch`：任一题评分失败则整批失败，错误中列出所有失败的题目 ID
//! - `MarkUngraded`：失败的题目记为"未评分"（判错），其余结果照常返回
//!
//! 两种策略下，成功返回的结果总是覆盖全部提交的题目 ID。

use std::collections::HashSet;
use std::str::FromStr;

use futures::future::join_all;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::models::{AggregateResult, GradableItem, GradeOutcome, ItemId};
use crate::services::Grader;

/// 单题远程评分失败时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// 整批失败
    #[default]
    FailBatch,
    /// 记为未评分
    MarkUngraded,
}

impl FromStr for FailurePolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fail_batch" => Ok(FailurePolicy::FailBatch),
            "mark_ungraded" => Ok(FailurePolicy::MarkUngraded),
            other => Err(AppError::Config(crate::error::ConfigError::InvalidValue {
                key: "failure_policy".to_string(),
                value: other.to_string(),
            })),
        }
    }
}

/// 并发评分器
pub struct FanOutGrader<G> {
    grader: G,
    policy: FailurePolicy,
}

impl<G: Grader> FanOutGrader<G> {
    pub fn new(grader: G) -> Self {
        Self {
            grader,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// 对一批题目评分
    ///
    /// 远程请求按输入顺序发出，完成顺序不限。批次为空时返回空结果。
    pub async fn grade_batch(&self, items: &[GradableItem]) -> AppResult<AggregateResult> {
        ensure_unique_ids(items)?;

        let mut outcomes = Vec::with_capacity(items.len());
        let mut remote = Vec::new();

        for item in items {
            if item.kind.is_deterministic() {
                outcomes.push(grade_locally(item));
            } else {
                remote.push(async move { (item.id, self.grader.grade_short_answer(item).await) });
            }
        }

        debug!(
            "本地评分 {} 题，远程评分 {} 题",
            outcomes.len(),
            remote.len()
        );

        let mut failed_ids = Vec::new();
        for (id, result) in join_all(remote).await {
            match result {
                Ok(verdict) => outcomes.push(GradeOutcome::from_verdict(id, verdict)),
                Err(e) => {
                    warn!("题目 {} 评分失败: {}", id, e);
                    match self.policy {
                        FailurePolicy::FailBatch => failed_ids.push(id),
                        FailurePolicy::MarkUngraded => {
                            outcomes.push(GradeOutcome::ungraded(id, &e))
                        }
                    }
                }
            }
        }

        if !failed_ids.is_empty() {
            return Err(AppError::PartialEvaluation { failed_ids });
        }

        Ok(AggregateResult::from_outcomes(outcomes))
    }
}

/// 单选、判断题的本地评分：逐字精确比对，不做任何规范化
///
/// 未作答（空字符串）一律判错，即使参考答案也为空。
pub fn grade_locally(item: &GradableItem) -> GradeOutcome {
    let correct =
        !item.submitted_answer.is_empty() && item.submitted_answer == item.reference_answer;
    let explanation = if correct {
        "Correct!".to_string()
    } else {
        format!("Correct answer: {}", item.reference_answer)
    };
    GradeOutcome {
        id: item.id,
        correct,
        explanation,
        ungraded: false,
    }
}

fn ensure_unique_ids(items: &[GradableItem]) -> AppResult<()> {
    let mut seen: HashSet<ItemId> = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.id) {
            return Err(AppError::DuplicateItem { id: item.id });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QuestionType, Verdict};
    use async_trait::async_trait;
    use std::collections::{BTreeSet, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::oneshot;
    use tokio_test::{assert_pending, assert_ready};

    fn item(id: ItemId, kind: QuestionType, submitted: &str, reference: &str) -> GradableItem {
        GradableItem {
            id,
            kind,
            prompt: format!("question {}", id),
            reference_answer: reference.to_string(),
            submitted_answer: submitted.to_string(),
        }
    }

    /// 固定返回结果，并记录调用次数
    #[derive(Default)]
    struct StubGrader {
        verdicts: HashMap<ItemId, Verdict>,
        failing: HashSet<ItemId>,
        calls: AtomicUsize,
        seen_answers: Mutex<Vec<String>>,
    }

    impl StubGrader {
        fn answering(id: ItemId, is_correct: bool, feedback: &str) -> Self {
            let mut stub = Self::default();
            stub.verdicts.insert(
                id,
                Verdict {
                    is_correct,
                    feedback: feedback.to_string(),
                },
            );
            stub
        }
    }

    #[async_trait]
    impl Grader for StubGrader {
        async fn grade_short_answer(&self, item: &GradableItem) -> AppResult<Verdict> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_answers
                .lock()
                .unwrap()
                .push(item.submitted_answer.clone());
            if self.failing.contains(&item.id) {
                return Err(AppError::empty_response("stub"));
            }
            Ok(self.verdicts.get(&item.id).cloned().unwrap_or(Verdict {
                is_correct: false,
                feedback: "stub".to_string(),
            }))
        }
    }

    #[tokio::test]
    async fn test_mixed_batch_example() {
        let items = vec![
            item(1, QuestionType::MultipleChoice, "A", "A"),
            item(2, QuestionType::TrueFalse, "False", "True"),
            item(3, QuestionType::ShortAnswer, "It's mitosis", "cell division"),
        ];
        let grader = FanOutGrader::new(StubGrader::answering(3, true, "conceptually matches"));

        let result = grader.grade_batch(&items).await.unwrap();

        assert_eq!(result.total_correct(), 2);
        assert!(result.get(1).unwrap().correct);
        assert!(!result.get(2).unwrap().correct);
        let third = result.get(3).unwrap();
        assert!(third.correct);
        assert_eq!(third.explanation, "conceptually matches");
        assert_eq!(grader.grader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_outcome_ids_match_input_ids() {
        let items: Vec<GradableItem> = (1..=10)
            .map(|id| {
                let kind = match id % 3 {
                    0 => QuestionType::MultipleChoice,
                    1 => QuestionType::TrueFalse,
                    _ => QuestionType::ShortAnswer,
                };
                item(id, kind, "x", if id % 2 == 0 { "x" } else { "y" })
            })
            .collect();
        let grader = FanOutGrader::new(StubGrader::default());

        let result = grader.grade_batch(&items).await.unwrap();

        let input: BTreeSet<ItemId> = items.iter().map(|i| i.id).collect();
        let output: BTreeSet<ItemId> = result.outcomes().keys().copied().collect();
        assert_eq!(input, output);

        let counted = result.outcomes().values().filter(|o| o.correct).count();
        assert_eq!(result.total_correct(), counted);
    }

    #[tokio::test]
    async fn test_deterministic_items_never_call_remote() {
        let items = vec![
            item(1, QuestionType::MultipleChoice, "B", "A"),
            item(2, QuestionType::TrueFalse, "True", "True"),
        ];
        let grader = FanOutGrader::new(StubGrader::default());

        let result = grader.grade_batch(&items).await.unwrap();

        assert_eq!(grader.grader.calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.total_correct(), 1);
        assert_eq!(result.get(1).unwrap().explanation, "Correct answer: A");
    }

    #[test]
    fn test_local_grading_is_exact() {
        let padded = grade_locally(&item(1, QuestionType::TrueFalse, " True ", "True"));
        assert!(!padded.correct);
        assert_eq!(padded.explanation, "Correct answer: True");

        let cased = grade_locally(&item(2, QuestionType::MultipleChoice, "mitochondria", "Mitochondria"));
        assert!(!cased.correct);

        let exact = grade_locally(&item(3, QuestionType::MultipleChoice, "Mitochondria", "Mitochondria"));
        assert!(exact.correct);
        assert_eq!(exact.explanation, "Correct!");
    }

    #[test]
    fn test_unanswered_never_matches_empty_reference() {
        let outcome = grade_locally(&item(4, QuestionType::TrueFalse, "", ""));
        assert!(!outcome.correct);
    }

    #[test]
    fn test_policy_accessor() {
        let grader = FanOutGrader::new(StubGrader::default()).with_policy(FailurePolicy::MarkUngraded);
        assert_eq!(grader.policy(), FailurePolicy::MarkUngraded);
    }

    #[tokio::test]
    async fn test_blank_answer_is_still_graded() {
        let items = vec![item(5, QuestionType::ShortAnswer, "", "photosynthesis")];
        let grader = FanOutGrader::new(StubGrader::default());

        let result = grader.grade_batch(&items).await.unwrap();

        assert_eq!(result.total(), 1);
        assert_eq!(
            grader.grader.seen_answers.lock().unwrap().as_slice(),
            &[String::new()]
        );
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let grader = FanOutGrader::new(StubGrader::default());
        let result = grader.grade_batch(&[]).await.unwrap();
        assert_eq!(result.total(), 0);
        assert_eq!(result.total_correct(), 0);
    }

    #[tokio::test]
    async fn test_fail_batch_lists_every_failed_id() {
        let items = vec![
            item(1, QuestionType::ShortAnswer, "a", "a"),
            item(2, QuestionType::ShortAnswer, "b", "b"),
            item(3, QuestionType::ShortAnswer, "c", "c"),
            item(4, QuestionType::MultipleChoice, "A", "A"),
        ];
        let mut stub = StubGrader::default();
        stub.failing.extend([1, 3]);
        let grader = FanOutGrader::new(stub);

        let err = grader.grade_batch(&items).await.unwrap_err();

        match err {
            AppError::PartialEvaluation { failed_ids } => assert_eq!(failed_ids, vec![1, 3]),
            other => panic!("unexpected error: {other}"),
        }
        // 失败不会中断其它请求
        assert_eq!(grader.grader.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_mark_ungraded_covers_every_id() {
        let items = vec![
            item(1, QuestionType::ShortAnswer, "a", "a"),
            item(2, QuestionType::ShortAnswer, "b", "b"),
        ];
        let mut stub = StubGrader::answering(1, true, "ok");
        stub.failing.insert(2);
        let grader = FanOutGrader::new(stub).with_policy(FailurePolicy::MarkUngraded);

        let result = grader.grade_batch(&items).await.unwrap();

        assert_eq!(result.total(), 2);
        assert_eq!(result.total_correct(), 1);
        assert_eq!(result.failed_ids(), vec![2]);
        assert!(!result.get(2).unwrap().correct);
    }

    #[tokio::test]
    async fn test_duplicate_ids_rejected() {
        let items = vec![
            item(7, QuestionType::ShortAnswer, "a", "a"),
            item(7, QuestionType::TrueFalse, "True", "True"),
        ];
        let grader = FanOutGrader::new(StubGrader::default());

        let err = grader.grade_batch(&items).await.unwrap_err();

        assert!(matches!(err, AppError::DuplicateItem { id: 7 }));
        assert_eq!(grader.grader.calls.load(Ordering::SeqCst), 0);
    }

    /// 每个请求挂起，直到测试手动放行
    struct GatedGrader {
        started: AtomicUsize,
        gates: Mutex<HashMap<ItemId, oneshot::Receiver<Verdict>>>,
    }

    #[async_trait]
    impl Grader for GatedGrader {
        async fn grade_short_answer(&self, item: &GradableItem) -> AppResult<Verdict> {
            self.started.fetch_add(1, Ordering::SeqCst);
            let gate = self.gates.lock().unwrap().remove(&item.id);
            match gate {
                Some(rx) => rx.await.map_err(|e| AppError::Other(e.to_string())),
                None => Err(AppError::Other("no gate".to_string())),
            }
        }
    }

    #[test]
    fn test_all_requests_in_flight_before_first_completes() {
        let ids: Vec<ItemId> = vec![1, 2, 3, 4];
        let mut senders = HashMap::new();
        let mut gates = HashMap::new();
        for id in &ids {
            let (tx, rx) = oneshot::channel();
            senders.insert(*id, tx);
            gates.insert(*id, rx);
        }
        let gated = Arc::new(GatedGrader {
            started: AtomicUsize::new(0),
            gates: Mutex::new(gates),
        });
        let items: Vec<GradableItem> = ids
            .iter()
            .map(|id| item(*id, QuestionType::ShortAnswer, "answer", "reference"))
            .collect();

        let grader = FanOutGrader::new(gated.clone());
        let mut task = tokio_test::task::spawn(grader.grade_batch(&items));

        assert_pending!(task.poll());
        assert_eq!(gated.started.load(Ordering::SeqCst), ids.len());

        // 以与输入不同的顺序完成
        for (id, correct) in [(3, true), (1, false), (4, true)] {
            let tx = senders.remove(&id).unwrap();
            tx.send(Verdict {
                is_correct: correct,
                feedback: format!("item {}", id),
            })
            .unwrap();
            assert_pending!(task.poll());
        }
        senders
            .remove(&2)
            .unwrap()
            .send(Verdict {
                is_correct: true,
                feedback: "item 2".to_string(),
            })
            .unwrap();

        let result = assert_ready!(task.poll()).unwrap();
        assert_eq!(result.total_correct(), 3);
        for id in ids {
            assert_eq!(result.get(id).unwrap().explanation, format!("item {}", id));
        }
        assert!(!result.get(1).unwrap().correct);
    }

    #[test]
    fn test_failure_policy_from_str() {
        assert_eq!(
            "mark_ungraded".parse::<FailurePolicy>().unwrap(),
            FailurePolicy::MarkUngraded
        );
        assert!("retry".parse::<FailurePolicy>().is_err());
    }
}
