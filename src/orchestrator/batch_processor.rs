//! 批量答卷处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量答卷的评分和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：校验配置、初始化报告文件、创建 LLM 服务
//! 2. **批量加载**：扫描并加载所有待评分的答卷（`Vec<AnswerSheet>`）
//! 3. **并发控制**：使用 Semaphore 限制并发数量
//! 4. **分批处理**：每批完成后再开始下一批
//! 5. **全局统计**：汇总所有答卷的评分结果

use crate::config::Config;
use crate::models::AnswerSheet;
use crate::orchestrator::sheet_processor::{self, SheetStats};
use crate::services::LlmService;
use crate::utils::logging;
use crate::workflow::QuizFlow;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// 应用主结构
pub struct App {
    config: Config,
    llm: Arc<LlmService>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate()?;

        logging::init_log_file(&config.output_log_file)?;
        logging::log_startup(config.max_concurrent_sheets);

        let llm = Arc::new(LlmService::new(&config));

        Ok(Self { config, llm })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        let all_sheets = self.load_sheets().await?;

        if all_sheets.is_empty() {
            warn!("⚠️ 没有找到待评分的答卷，程序结束");
            return Ok(());
        }

        logging::log_sheets_loaded(all_sheets.len(), self.config.max_concurrent_sheets);

        let stats = self.process_all_sheets(all_sheets).await?;

        logging::print_final_stats(
            stats.success,
            stats.failed,
            stats.total,
            &self.config.output_log_file,
        );
        if stats.questions > 0 {
            info!(
                "🎯 总正确率: {}/{} ({:.1}%)",
                stats.correct,
                stats.questions,
                stats.correct as f64 * 100.0 / stats.questions as f64
            );
        }

        Ok(())
    }

    async fn load_sheets(&self) -> Result<Vec<AnswerSheet>> {
        info!("\n📁 正在扫描待评分的答卷...");
        crate::models::load_all_answer_sheets(&self.config.sheet_folder).await
    }

    async fn process_all_sheets(&self, all_sheets: Vec<AnswerSheet>) -> Result<ProcessingStats> {
        let batch_size = self.config.max_concurrent_sheets;
        let semaphore = Arc::new(Semaphore::new(batch_size));
        let total_sheets = all_sheets.len();
        let total_batches = total_sheets.div_ceil(batch_size);
        let mut stats = ProcessingStats {
            total: total_sheets,
            ..Default::default()
        };

        for (batch_idx, batch) in all_sheets.chunks(batch_size).enumerate() {
            let batch_start = batch_idx * batch_size;
            logging::log_batch_start(
                batch_idx + 1,
                total_batches,
                batch_start + 1,
                batch_start + batch.len(),
                total_sheets,
            );

            let batch_result = self
                .process_batch(batch, batch_start, semaphore.clone())
                .await?;

            logging::log_batch_complete(
                batch_idx + 1,
                batch_result.success,
                batch_result.success + batch_result.failed,
            );
            stats.absorb(&batch_result);
        }

        Ok(stats)
    }

    async fn process_batch(
        &self,
        batch: &[AnswerSheet],
        batch_start: usize,
        semaphore: Arc<Semaphore>,
    ) -> Result<ProcessingStats> {
        let mut handles = Vec::with_capacity(batch.len());

        for (idx, sheet) in batch.iter().enumerate() {
            let sheet_index = batch_start + idx + 1;
            let permit = semaphore.clone().acquire_owned().await?;

            let flow = QuizFlow::new(self.llm.clone(), self.config.failure_policy);
            let sheet = sheet.clone();
            let config = self.config.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                sheet_processor::process_sheet(&flow, &sheet, sheet_index, &config).await
            });
            handles.push((sheet_index, handle));
        }

        let mut result = ProcessingStats::default();
        for (sheet_index, handle) in handles {
            match handle.await {
                Ok(Ok(sheet_stats)) => result.record(&sheet_stats),
                Ok(Err(e)) => {
                    error!("[答卷 {}] ❌ 评分失败: {:#}", sheet_index, e);
                    result.failed += 1;
                }
                Err(e) => {
                    error!("[答卷 {}] 任务执行失败: {}", sheet_index, e);
                    result.failed += 1;
                }
            }
        }

        Ok(result)
    }
}

/// 处理统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ProcessingStats {
    success: usize,
    failed: usize,
    total: usize,
    correct: usize,
    questions: usize,
}

impl ProcessingStats {
    fn record(&mut self, sheet: &SheetStats) {
        self.success += 1;
        self.correct += sheet.correct;
        self.questions += sheet.total;
    }

    fn absorb(&mut self, batch: &ProcessingStats) {
        self.success += batch.success;
        self.failed += batch.failed;
        self.correct += batch.correct;
        self.questions += batch.questions;
    }
}
