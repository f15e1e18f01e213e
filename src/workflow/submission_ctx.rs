//! 提交上下文
//!
//! 封装"我正在提交哪个项目的哪份文档"这一信息，用于日志前缀

use crate::models::DocumentType;
use std::fmt::Display;

/// 提交上下文
#[derive(Debug, Clone)]
pub struct SubmissionCtx {
    pub doc_type: DocumentType,

    /// 已解析的项目键
    pub project_key: String,

    /// 本地草稿 id（仅用于日志显示）
    pub draft_id: Option<String>,
}

impl SubmissionCtx {
    pub fn new(doc_type: DocumentType, project_key: String, draft_id: Option<String>) -> Self {
        Self {
            doc_type,
            project_key,
            draft_id,
        }
    }
}

impl Display for SubmissionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.draft_id {
            Some(id) => write!(f, "[{} {} draft#{}]", self.doc_type, self.project_key, id),
            None => write!(f, "[{} {}]", self.doc_type, self.project_key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefix() {
        let ctx = SubmissionCtx::new(
            DocumentType::DeliveryNote,
            "BA-2025-DEMO".to_string(),
            Some("d-17".to_string()),
        );
        assert_eq!(ctx.to_string(), "[Lieferschein BA-2025-DEMO draft#d-17]");

        let ctx = SubmissionCtx::new(DocumentType::PhotoNote, "p-1".to_string(), None);
        assert_eq!(ctx.to_string(), "[Fotonotiz p-1]");
    }
}
