use crate::error::FileError;
use crate::models::sheet::AnswerSheet;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从 TOML 文件加载答卷
pub async fn load_answer_sheet(toml_file_path: &Path) -> Result<AnswerSheet> {
    let path = toml_file_path.display().to_string();

    let content = fs::read_to_string(toml_file_path)
        .await
        .map_err(|source| FileError::ReadFailed {
            path: path.clone(),
            source,
        })?;

    let mut sheet: AnswerSheet =
        toml::from_str(&content).map_err(|source| FileError::TomlParseFailed { path, source })?;

    sheet.file_path = Some(toml_file_path.to_string_lossy().to_string());

    Ok(sheet)
}

/// 从文件夹中加载所有答卷，解析失败的文件跳过并记录警告
pub async fn load_all_answer_sheets(folder_path: &str) -> Result<Vec<AnswerSheet>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            paths.push(path);
        }
    }

    // read_dir 顺序不固定
    paths.sort();

    let mut sheets = Vec::with_capacity(paths.len());
    for path in paths {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_answer_sheet(&path).await {
            Ok(sheet) => {
                tracing::info!(
                    "成功加载 {} 道题，{} 条作答",
                    sheet.quiz.questions.len(),
                    sheet.answers.len()
                );
                sheets.push(sheet);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {:#}", path.display(), e);
            }
        }
    }

    Ok(sheets)
}
