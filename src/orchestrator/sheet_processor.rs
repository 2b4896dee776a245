//! 单份答卷处理器 - 编排层
//!
//! ## 职责
//!
//! 1. **评分**：委托 `QuizFlow` 对整份答卷评分
//! 2. **明细日志**：详细模式下逐题输出结果
//! 3. **报告**：向报告文件追加一行得分
//! 4. **统计输出**：返回得分与未评分数量

use crate::config::Config;
use crate::models::{AggregateResult, AnswerSheet};
use crate::services::Grader;
use crate::utils::logging::{append_report_line, truncate_text};
use crate::workflow::QuizFlow;
use anyhow::Result;
use tracing::{info, warn};

/// 单份答卷评分统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SheetStats {
    pub correct: usize,
    pub total: usize,
    pub ungraded: usize,
}

/// 处理单份答卷
///
/// # 参数
/// - `flow`: 评分流程
/// - `sheet`: 答卷数据
/// - `sheet_index`: 答卷序号（用于日志）
/// - `config`: 配置
pub async fn process_sheet<G: Grader>(
    flow: &QuizFlow<G>,
    sheet: &AnswerSheet,
    sheet_index: usize,
    config: &Config,
) -> Result<SheetStats> {
    info!(
        "[答卷 {}] 📄 {} ({} 题)",
        sheet_index,
        sheet.display_name(),
        sheet.quiz.questions.len()
    );

    let result = flow.run(&sheet.quiz, &sheet.answers).await?;

    if config.verbose_logging {
        log_outcomes(sheet_index, &result);
    }

    let stats = SheetStats {
        correct: result.total_correct(),
        total: result.total(),
        ungraded: result.failed_ids().len(),
    };

    if stats.ungraded > 0 {
        warn!(
            "[答卷 {}] ⚠️ {} 道题未能评分: {:?}",
            sheet_index,
            stats.ungraded,
            result.failed_ids()
        );
    }

    append_report_line(&config.output_log_file, &report_line(sheet, &stats))?;

    info!(
        "[答卷 {}] ✓ 得分 {}/{}",
        sheet_index, stats.correct, stats.total
    );

    Ok(stats)
}

fn report_line(sheet: &AnswerSheet, stats: &SheetStats) -> String {
    let mut line = format!(
        "{} | {} | {}/{}",
        sheet.student, sheet.quiz.title, stats.correct, stats.total
    );
    if stats.ungraded > 0 {
        line.push_str(&format!(" | 未评分 {}", stats.ungraded));
    }
    line
}

fn log_outcomes(sheet_index: usize, result: &AggregateResult) {
    for outcome in result.outcomes().values() {
        let mark = if outcome.correct { "✓" } else { "✗" };
        info!(
            "[答卷 {}]   {} 题 {}: {}",
            sheet_index,
            mark,
            outcome.id,
            truncate_text(&outcome.explanation, 60)
        );
    }
}
