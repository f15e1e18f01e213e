use crate::models::document::DraftDocument;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 发件箱中的一个草稿文件
#[derive(Debug, Clone)]
pub struct DraftFile {
    pub path: PathBuf,
    pub draft: DraftDocument,
}

impl DraftFile {
    /// 文件名（用于日志和归档）
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }
}

fn is_draft_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("json") | Some("toml")
    ) && !path
        .file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.ends_with(".result.json"))
        .unwrap_or(false)
}

/// 草稿提交成功后在归档目录中的结果文件：`<sent>/<名称>.result.json`
pub fn result_file_path(draft_path: &Path, sent_folder: &str) -> PathBuf {
    let stem = draft_path
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    PathBuf::from(sent_folder).join(format!("{}.result.json", stem))
}

/// 从 JSON / TOML 文件加载草稿
pub async fn load_draft(draft_path: &Path) -> Result<DraftFile> {
    let content = fs::read_to_string(draft_path)
        .await
        .with_context(|| format!("无法读取草稿文件: {}", draft_path.display()))?;

    let draft: DraftDocument = match draft_path.extension().and_then(|s| s.to_str()) {
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("无法解析TOML草稿: {}", draft_path.display()))?,
        _ => serde_json::from_str(&content)
            .with_context(|| format!("无法解析JSON草稿: {}", draft_path.display()))?,
    };

    Ok(DraftFile {
        path: draft_path.to_path_buf(),
        draft,
    })
}

/// 加载发件箱文件夹中的所有草稿（按文件名排序）
///
/// 无法解析的文件只记录警告并跳过，留在原处等待人工处理
pub async fn load_all_drafts(folder_path: &str) -> Result<Vec<DraftFile>> {
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
        if path.is_file() && is_draft_file(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut drafts = Vec::new();
    for path in paths {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_draft(&path).await {
            Ok(file) => {
                tracing::info!(
                    "成功加载 {} ({} 个附件)",
                    file.draft.kind,
                    file.draft.attachments.len()
                );
                drafts.push(file);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {:#}", path.display(), e);
            }
        }
    }

    Ok(drafts)
}

/// 加载待提交的草稿：跳过归档目录中已有结果文件的草稿
///
/// 这些草稿已经远程提交成功，只是上次没能移走
pub async fn load_pending_drafts(folder_path: &str, sent_folder: &str) -> Result<Vec<DraftFile>> {
    let drafts = load_all_drafts(folder_path).await?;
    let (pending, submitted): (Vec<_>, Vec<_>) = drafts
        .into_iter()
        .partition(|file| !result_file_path(&file.path, sent_folder).exists());

    for file in &submitted {
        tracing::warn!(
            "⚠️ {} 已有提交结果，跳过（请人工移到归档目录）",
            file.file_name()
        );
    }

    Ok(pending)
}
