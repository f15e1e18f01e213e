//! 附件数据结构
//!
//! 本地 URI 只是写入方向的输入；在文档体被远程持久化之前，
//! 任何附件的解析结果都不能再带有设备本地 URI 方案。

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

/// 设备本地 URI 方案（文件 / content provider / 相册）
pub const LOCAL_URI_SCHEMES: [&str; 5] = ["file:", "content:", "ph:", "assets-library:", "photos:"];

/// 判断一个值是否带有设备本地 URI 方案
pub fn is_local_uri(value: &str) -> bool {
    let lowered = value.trim().to_ascii_lowercase();
    LOCAL_URI_SCHEMES
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
}

/// 判断一个值是否是远程 http(s) 地址
pub fn is_remote_url(value: &str) -> bool {
    let lowered = value.trim().to_ascii_lowercase();
    lowered.starts_with("http://") || lowered.starts_with("https://")
}

/// 文档附件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    /// 设备本地 URI（只作为输入）
    #[serde(default, alias = "uri", skip_serializing_if = "Option::is_none")]
    pub local_uri: Option<String>,

    /// 稳定文件名；草稿中填写的值视为显式名称
    #[serde(default, alias = "name")]
    pub stable_name: String,

    #[serde(
        default,
        alias = "type",
        alias = "mimeType",
        skip_serializing_if = "Option::is_none"
    )]
    pub media_type: Option<String>,

    /// 服务端地址或存储路径
    #[serde(default, alias = "url", skip_serializing_if = "Option::is_none")]
    pub resolved_url: Option<String>,
}

impl AttachmentRef {
    /// 创建一个只有本地 URI 的附件
    pub fn local(uri: impl Into<String>) -> Self {
        Self {
            local_uri: Some(uri.into()),
            ..Default::default()
        }
    }

    /// 创建一个已经在服务端的附件
    pub fn remote(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            stable_name: name.into(),
            resolved_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// 是否需要上传
    ///
    /// `uri` 字段里写的是 http(s) 地址时不算本地文件
    pub fn is_local(&self) -> bool {
        match self.local_uri.as_deref().map(str::trim) {
            Some(uri) if !uri.is_empty() => !is_remote_url(uri),
            _ => false,
        }
    }

    /// 提交给服务端的附件记录
    pub fn to_wire(&self) -> JsonValue {
        let mut record = json!({
            "name": self.stable_name,
            "url": self.resolved_url,
        });
        if let Some(media_type) = &self.media_type {
            record["type"] = json!(media_type);
        }
        record
    }
}

/// 上传结果（规范化后的服务端返回）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub name: String,
    pub url: String,
}

impl UploadResult {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}
