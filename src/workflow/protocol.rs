//! 文档类型协议描述 - 流程层
//!
//! 每种文档类型的端点、阶段与要求用一张声明式的表描述，
//! 旧协议回退也在表里声明，编排器不需要为每种类型重复回退逻辑。
//!
//! 路径中的 `{project}` 在调用时替换为项目键。

use crate::models::DocumentType;

/// 旧的单阶段协议（上传 + 直接 commit）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyProtocol {
    /// 旧上传端点；None 表示只有 commit 需要回退
    pub upload: Option<&'static str>,
    /// 直接提交完整文档体的端点
    pub commit: &'static str,
}

/// 一种文档类型的协议描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolDescriptor {
    pub doc_type: DocumentType,
    pub upload: &'static str,
    pub submit: &'static str,
    pub commit: Option<&'static str>,
    pub legacy: Option<LegacyProtocol>,
    /// 提交体必须带日期（缺省为今天）
    pub requires_date: bool,
    /// 提交响应必须返回文档 id（后续审批流程需要）
    pub requires_doc_id: bool,
    /// 附件哈希命名前缀
    pub name_prefix: &'static str,
    /// 文档存储路径前缀
    pub storage_prefix: &'static str,
    /// 提交体中附件列表的字段名
    pub attachment_field: &'static str,
}

const PROJECT_PLACEHOLDER: &str = "{project}";

static DESCRIPTORS: [ProtocolDescriptor; 3] = [
    ProtocolDescriptor {
        doc_type: DocumentType::WorkReport,
        upload: "/api/projects/{project}/regie/upload",
        submit: "/api/projects/{project}/regie",
        commit: Some("/api/projects/{project}/regie/commit"),
        legacy: None,
        requires_date: true,
        requires_doc_id: true,
        name_prefix: "regie",
        storage_prefix: "projects/{project}/regie/",
        attachment_field: "attachments",
    },
    ProtocolDescriptor {
        doc_type: DocumentType::DeliveryNote,
        upload: "/api/projects/{project}/lieferscheine/upload",
        submit: "/api/projects/{project}/lieferscheine",
        commit: Some("/api/projects/{project}/lieferscheine/commit"),
        legacy: Some(LegacyProtocol {
            upload: Some("/api/lieferscheine/upload"),
            commit: "/api/lieferscheine",
        }),
        requires_date: true,
        requires_doc_id: true,
        name_prefix: "lieferschein",
        storage_prefix: "projects/{project}/lieferscheine/",
        attachment_field: "images",
    },
    ProtocolDescriptor {
        doc_type: DocumentType::PhotoNote,
        upload: "/api/projects/{project}/photos/upload",
        submit: "/api/projects/{project}/photos",
        commit: None,
        legacy: None,
        requires_date: false,
        requires_doc_id: false,
        name_prefix: "photo",
        storage_prefix: "projects/{project}/photos/",
        attachment_field: "photos",
    },
];

impl ProtocolDescriptor {
    /// 查找文档类型的协议描述
    pub fn for_type(doc_type: DocumentType) -> &'static ProtocolDescriptor {
        match doc_type {
            DocumentType::WorkReport => &DESCRIPTORS[0],
            DocumentType::DeliveryNote => &DESCRIPTORS[1],
            DocumentType::PhotoNote => &DESCRIPTORS[2],
        }
    }

    pub fn upload_path(&self, project_key: &str) -> String {
        fill(self.upload, project_key)
    }

    pub fn submit_path(&self, project_key: &str) -> String {
        fill(self.submit, project_key)
    }

    pub fn commit_path(&self, project_key: &str) -> Option<String> {
        self.commit.map(|template| fill(template, project_key))
    }

    /// 上传端点不存在时可切换的旧上传端点
    pub fn legacy_upload_path(&self, project_key: &str) -> Option<String> {
        self.legacy
            .and_then(|legacy| legacy.upload)
            .map(|template| fill(template, project_key))
    }

    pub fn legacy_commit_path(&self, project_key: &str) -> Option<String> {
        self.legacy.map(|legacy| fill(legacy.commit, project_key))
    }

    pub fn storage_prefix_for(&self, project_key: &str) -> String {
        fill(self.storage_prefix, project_key)
    }
}

fn fill(template: &str, project_key: &str) -> String {
    template.replace(PROJECT_PLACEHOLDER, project_key.trim())
}
