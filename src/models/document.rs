//! 文档与提交结果数据结构

use crate::models::attachment::AttachmentRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// 文档类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// 工作报告（Regiebericht）
    #[serde(alias = "regie", alias = "regiebericht")]
    WorkReport,
    /// 送货单（Lieferschein）
    #[serde(alias = "lieferschein")]
    DeliveryNote,
    /// 照片 / 备注
    #[serde(alias = "photo", alias = "photos")]
    PhotoNote,
}

impl DocumentType {
    pub const ALL: [DocumentType; 3] = [
        DocumentType::WorkReport,
        DocumentType::DeliveryNote,
        DocumentType::PhotoNote,
    ];

    /// 显示名称
    pub fn label(self) -> &'static str {
        match self {
            DocumentType::WorkReport => "Regiebericht",
            DocumentType::DeliveryNote => "Lieferschein",
            DocumentType::PhotoNote => "Fotonotiz",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 本地草稿
///
/// 由调用方创建，提交期间由编排器独占（只修改附件名称、日期）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(alias = "type")]
    pub kind: DocumentType,

    /// 原始项目标识（业务编码、UUID 或本地 id）
    #[serde(alias = "projectCode", alias = "project")]
    pub project_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,

    #[serde(default)]
    pub payload: Map<String, JsonValue>,
}

impl DraftDocument {
    pub fn new(kind: DocumentType, project_id: impl Into<String>) -> Self {
        Self {
            id: None,
            kind,
            project_id: project_id.into(),
            date: None,
            attachments: Vec::new(),
            payload: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn with_attachment(mut self, attachment: AttachmentRef) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.payload.insert(key.into(), value);
        self
    }
}

/// 提交阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Upload,
    Submit,
    Commit,
    LegacyUpload,
    LegacyCommit,
}

impl Phase {
    /// 该阶段开始时文件是否已经上传完成
    pub fn follows_upload(self) -> bool {
        matches!(self, Phase::Submit | Phase::Commit | Phase::LegacyCommit)
    }

    pub fn is_upload(self) -> bool {
        matches!(self, Phase::Upload | Phase::LegacyUpload)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Upload => "upload",
            Phase::Submit => "submit",
            Phase::Commit => "commit",
            Phase::LegacyUpload => "legacy-upload",
            Phase::LegacyCommit => "legacy-commit",
        };
        f.write_str(label)
    }
}

/// 状态机状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionState {
    Created,
    Named,
    Uploaded,
    NoAttachments,
    Submitted,
    Committed,
    Final,
}

/// 提交所走的协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// upload → submit → commit?
    Current,
    /// upload + 直接 commit
    Legacy,
}

/// 提交确认结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitOutcome {
    Committed,
    /// 服务端没有 commit 接口，视为软成功
    NotRequired,
}

/// 各阶段完成情况
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseReport {
    /// None 表示没有需要上传的文件
    pub uploaded: Option<bool>,
    pub submitted: bool,
    /// None 表示该文档类型没有 commit 阶段
    pub committed: Option<CommitOutcome>,
}

/// 提交最终结果，交还给调用方后编排器不再持有
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub ok: bool,
    pub doc_id: Option<String>,
    pub project_key: String,
    pub attachments: Vec<AttachmentRef>,
    /// 未能对账的附件名称（resolved_url 为空）
    pub unresolved: Vec<String>,
    pub phases: PhaseReport,
    pub protocol: Protocol,
    pub trace: Vec<SubmissionState>,
}

impl SubmissionResult {
    /// commit 是否以软成功结束
    pub fn is_soft_success(&self) -> bool {
        self.phases.committed == Some(CommitOutcome::NotRequired)
    }
}
