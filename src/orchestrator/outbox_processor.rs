//! 单个草稿文件处理器 - 编排层
//!
//! 加载 → 提交 → 成功时归档，失败时原样保留（可由调用方稍后重试）
//!
//! 远程提交成功后归档失败不算提交失败；结果文件一旦写入，
//! 下次扫描发件箱时就会跳过这份草稿。

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::models::{result_file_path, DraftFile, SubmissionResult};
use crate::workflow::SubmissionOrchestrator;

/// 处理单个草稿文件
///
/// # 参数
/// - `orchestrator`: 共享的提交编排器
/// - `file`: 已加载的草稿文件
/// - `index`: 序号（仅用于日志显示）
/// - `config`: 配置（归档目录）
/// - `cancel`: 可选的取消令牌
///
/// # 返回
/// 成功时返回提交结果；失败时草稿文件保持不变
pub async fn process_draft_file(
    orchestrator: &SubmissionOrchestrator,
    file: DraftFile,
    index: usize,
    config: &Config,
    cancel: Option<&CancellationToken>,
) -> Result<SubmissionResult> {
    let file_name = file.file_name();
    info!("[草稿 {}] 📄 {}", index, file_name);

    let result = match orchestrator.submit_with_cancel(file.draft, cancel).await {
        Ok(result) => result,
        Err(e) => {
            let uploaded = if e.files_uploaded() {
                "文件已上传"
            } else {
                "文件未上传"
            };
            error!(
                "[草稿 {}] ❌ {} 提交失败（{}，保留在发件箱）: {}",
                index, file_name, uploaded, e
            );
            return Err(e).with_context(|| format!("提交失败: {}", file_name));
        }
    };

    if let Err(e) = archive(&file.path, &result, &config.sent_folder).await {
        warn!(
            "[草稿 {}] ⚠️ {} 已提交，但归档失败（请人工移走，避免重复提交）: {:#}",
            index, file_name, e
        );
        return Ok(result);
    }

    if result.is_soft_success() {
        warn!("[草稿 {}] ⚠️ {} 已提交（commit 不需要）", index, file_name);
    } else {
        info!("[草稿 {}] ✓ {} 已提交并归档", index, file_name);
    }

    Ok(result)
}

/// 把草稿移动到归档目录，并先在那里写入 `<名称>.result.json`
async fn archive(draft_path: &Path, result: &SubmissionResult, sent_folder: &str) -> Result<PathBuf> {
    let sent = PathBuf::from(sent_folder);
    tokio::fs::create_dir_all(&sent)
        .await
        .with_context(|| format!("无法创建归档目录: {}", sent.display()))?;

    let result_path = result_file_path(draft_path, sent_folder);
    let json = serde_json::to_string_pretty(result)?;
    tokio::fs::write(&result_path, json)
        .await
        .with_context(|| format!("无法写入结果文件: {}", result_path.display()))?;

    let target = sent.join(draft_path.file_name().unwrap_or_default());
    if tokio::fs::rename(draft_path, &target).await.is_err() {
        // 跨设备时 rename 失败，退回到复制 + 删除
        tokio::fs::copy(draft_path, &target)
            .await
            .with_context(|| format!("无法归档草稿: {}", draft_path.display()))?;
        tokio::fs::remove_file(draft_path).await?;
    }

    Ok(target)
}
