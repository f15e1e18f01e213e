//! 附件对账服务 - 业务能力层
//!
//! 把上传阶段的结果对应回原始附件列表（保持原顺序）。
//!
//! 每个附件依次尝试：
//! 1. 名称精确匹配
//! 2. 在"本地附件"中的序号位置匹配
//! 3. 从未是本地文件的附件保留原地址（`url`，或 `uri` 中的 http(s) 地址）
//! 4. 本地附件什么都没匹配上：保留在结果中，地址为空，并报告
//!
//! 最后一步无条件执行：去掉仍带有设备本地 URI 的附件。

use crate::models::{is_local_uri, is_remote_url, AttachmentRef, UploadResult};
use tracing::{debug, warn};

/// 对账结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciled {
    /// 最终附件列表（不含任何本地 URI）
    pub attachments: Vec<AttachmentRef>,
    /// 未能对账的附件名称
    pub unresolved: Vec<String>,
    /// 因带有本地 URI 而被去掉的附件名称
    pub stripped: Vec<String>,
}

/// 附件对账服务
pub struct ReconciliationMatcher {
    storage_prefix: String,
}

impl ReconciliationMatcher {
    /// # 参数
    /// - `storage_prefix`: 文档存储路径前缀（如 `projects/BA-2025-DEMO/regie/`）
    pub fn new(storage_prefix: impl Into<String>) -> Self {
        Self {
            storage_prefix: storage_prefix.into(),
        }
    }

    /// 对账
    ///
    /// # 参数
    /// - `named`: 已命名的原始附件列表
    /// - `results`: 规范化后的上传结果
    pub fn reconcile(&self, named: &[AttachmentRef], results: &[UploadResult]) -> Reconciled {
        let mut used = vec![false; results.len()];
        let mut matched: Vec<Option<usize>> = vec![None; named.len()];

        // 1. 名称精确匹配（先于位置匹配，避免被前面的附件抢占）
        for (idx, attachment) in named.iter().enumerate() {
            if !attachment.is_local() {
                continue;
            }
            if let Some(pos) = (0..results.len())
                .find(|&i| !used[i] && results[i].name == attachment.stable_name)
            {
                used[pos] = true;
                matched[idx] = Some(pos);
            }
        }

        // 2. 位置匹配：在本地附件中的序号
        let mut ordinal = 0;
        for (idx, attachment) in named.iter().enumerate() {
            if !attachment.is_local() {
                continue;
            }
            if matched[idx].is_none() && ordinal < results.len() && !used[ordinal] {
                used[ordinal] = true;
                matched[idx] = Some(ordinal);
                debug!("附件 {} 按位置 {} 匹配", attachment.stable_name, ordinal);
            }
            ordinal += 1;
        }

        let mut reconciled = Reconciled::default();

        for (idx, attachment) in named.iter().enumerate() {
            let mut record = AttachmentRef {
                local_uri: None,
                stable_name: attachment.stable_name.clone(),
                media_type: attachment.media_type.clone(),
                resolved_url: None,
            };

            if attachment.is_local() {
                match matched[idx] {
                    Some(pos) => {
                        let result = &results[pos];
                        if !result.name.is_empty() {
                            record.stable_name = result.name.clone();
                        }
                        record.resolved_url = Some(result.url.clone());
                    }
                    None => {
                        warn!("⚠️ 附件 {} 未能与上传结果对应", attachment.stable_name);
                        reconciled.unresolved.push(attachment.stable_name.clone());
                    }
                }
            } else {
                // 3. 保留原地址；`uri` 里写的 http(s) 地址也算
                let existing = attachment.resolved_url.as_deref().or_else(|| {
                    attachment
                        .local_uri
                        .as_deref()
                        .filter(|uri| is_remote_url(uri))
                });
                match existing.map(str::trim) {
                    Some(url) if self.is_server_reference(url) || is_local_uri(url) => {
                        record.resolved_url = Some(url.to_string());
                    }
                    _ => {
                        warn!("⚠️ 附件 {} 没有可用地址", attachment.stable_name);
                        reconciled.unresolved.push(attachment.stable_name.clone());
                    }
                }
            }

            reconciled.attachments.push(record);
        }

        // 最后一步：去掉仍带有本地 URI 的附件
        reconciled.attachments.retain(|record| {
            let local = record
                .resolved_url
                .as_deref()
                .map(is_local_uri)
                .unwrap_or(false);
            if local {
                warn!("⚠️ 去掉带本地 URI 的附件: {}", record.stable_name);
                reconciled.stripped.push(record.stable_name.clone());
            }
            !local
        });

        reconciled
    }

    /// 是否服务端地址：http(s)、以 `/` 开头的服务端路径、或位于存储前缀下
    fn is_server_reference(&self, url: &str) -> bool {
        if url.is_empty() {
            return false;
        }
        is_remote_url(url)
            || url.starts_with('/')
            || (!self.storage_prefix.is_empty() && url.starts_with(&self.storage_prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn local(uri: &str, name: &str) -> AttachmentRef {
        AttachmentRef {
            local_uri: Some(uri.to_string()),
            stable_name: name.to_string(),
            ..Default::default()
        }
    }

    fn matcher() -> ReconciliationMatcher {
        ReconciliationMatcher::new("projects/BA-2025-DEMO/regie/")
    }

    #[test]
    fn test_exact_name_match_ignores_server_order() {
        let named = vec![
            local("file:///a.jpg", "a.jpg"),
            local("file:///b.jpg", "b.jpg"),
        ];
        let results = vec![
            UploadResult::new("b.jpg", "/u/b.jpg"),
            UploadResult::new("a.jpg", "/u/a.jpg"),
        ];

        let out = matcher().reconcile(&named, &results);

        assert_eq!(
            out.attachments,
            vec![
                AttachmentRef::remote("a.jpg", "/u/a.jpg"),
                AttachmentRef::remote("b.jpg", "/u/b.jpg"),
            ]
        );
        assert!(out.unresolved.is_empty());
    }

    #[test]
    fn test_positional_match_counts_only_local_attachments() {
        let named = vec![
            AttachmentRef::remote("old.jpg", "https://cdn.example.com/old.jpg"),
            local("file:///a.jpg", "a.jpg"),
            local("file:///b.jpg", "b.jpg"),
        ];
        let results = vec![
            UploadResult::new("srv_1.jpg", "/u/1.jpg"),
            UploadResult::new("srv_2.jpg", "/u/2.jpg"),
        ];

        let out = matcher().reconcile(&named, &results);

        assert_eq!(
            out.attachments,
            vec![
                AttachmentRef::remote("old.jpg", "https://cdn.example.com/old.jpg"),
                AttachmentRef::remote("srv_1.jpg", "/u/1.jpg"),
                AttachmentRef::remote("srv_2.jpg", "/u/2.jpg"),
            ]
        );
    }

    #[test]
    fn test_position_taken_by_exact_match_is_not_reused() {
        let named = vec![
            local("file:///a.jpg", "a.jpg"),
            local("file:///b.jpg", "b.jpg"),
        ];
        // 第一个位置的结果其实属于 b
        let results = vec![
            UploadResult::new("b.jpg", "/u/b.jpg"),
            UploadResult::new("other.jpg", "/u/other.jpg"),
        ];

        let out = matcher().reconcile(&named, &results);

        assert_eq!(out.attachments[1], AttachmentRef::remote("b.jpg", "/u/b.jpg"));
        assert_eq!(out.attachments[0].resolved_url, None);
        assert_eq!(out.unresolved, vec!["a.jpg".to_string()]);
    }

    #[test]
    fn test_unmatched_local_attachment_is_surfaced_with_null_url() {
        let named = vec![
            local("file:///a.jpg", "a.jpg"),
            local("file:///b.jpg", "b.jpg"),
        ];
        let results = vec![UploadResult::new("a.jpg", "/u/a.jpg")];

        let out = matcher().reconcile(&named, &results);

        assert_eq!(out.attachments.len(), 2);
        assert_eq!(out.attachments[1].stable_name, "b.jpg");
        assert_eq!(out.attachments[1].resolved_url, None);
        assert_eq!(out.attachments[1].local_uri, None);
        assert_eq!(out.unresolved, vec!["b.jpg".to_string()]);
    }

    #[test]
    fn test_carry_over_storage_prefix_and_strip_local_values() {
        let named = vec![
            AttachmentRef::remote("plan.pdf", "projects/BA-2025-DEMO/regie/plan.pdf"),
            AttachmentRef::remote("leak.jpg", "file:///sdcard/leak.jpg"),
            AttachmentRef::remote("ph.jpg", "ph://ABC/L0/001"),
        ];

        let out = matcher().reconcile(&named, &[]);

        assert_eq!(
            out.attachments,
            vec![AttachmentRef::remote(
                "plan.pdf",
                "projects/BA-2025-DEMO/regie/plan.pdf"
            )]
        );
        assert_eq!(out.stripped, vec!["leak.jpg".to_string(), "ph.jpg".to_string()]);
        assert!(out.unresolved.is_empty());
    }

    #[test]
    fn test_remote_uri_is_carried_over() {
        let named = vec![
            local("https://cdn.example.com/plan.jpg", "plan.jpg"),
            local("file:///a.jpg", "a.jpg"),
        ];
        let results = vec![UploadResult::new("srv_a.jpg", "/u/a.jpg")];

        let out = matcher().reconcile(&named, &results);

        assert_eq!(
            out.attachments,
            vec![
                AttachmentRef::remote("plan.jpg", "https://cdn.example.com/plan.jpg"),
                AttachmentRef::remote("srv_a.jpg", "/u/a.jpg"),
            ]
        );
        assert!(out.unresolved.is_empty());
    }

    #[test]
    fn test_no_local_scheme_survives() {
        let named = vec![
            local("file:///a.jpg", "a.jpg"),
            local("content://media/42", "42.jpg"),
            AttachmentRef::remote("x.jpg", "assets-library://asset/x.jpg"),
        ];
        let results = vec![UploadResult::new("a.jpg", "/u/a.jpg")];

        let out = matcher().reconcile(&named, &results);

        for record in &out.attachments {
            assert!(record.local_uri.is_none());
            assert!(!record.resolved_url.as_deref().map(is_local_uri).unwrap_or(false));
        }
    }
}
