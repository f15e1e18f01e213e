//! 附件命名服务 - 业务能力层
//!
//! 只负责"给附件起一个稳定的名字"，不关心上传流程。
//! 同样的输入在任何时候、任何进程里都得到同样的名字，重试因此是幂等的。

use crate::models::AttachmentRef;
use std::collections::HashSet;

/// 文件名最大长度
const DEFAULT_MAX_LEN: usize = 96;

/// 扩展名最大长度，超过的后缀不当作扩展名
const MAX_EXTENSION_LEN: usize = 5;

/// 附件命名服务
///
/// 优先级：
/// 1. 显式给出的名字（清洗 + 截断）
/// 2. 本地 URI 的最后一段路径
/// 3. `{前缀}_{FNV-1a 哈希}.{扩展名}`
#[derive(Debug, Clone)]
pub struct AttachmentNamer {
    max_len: usize,
}

impl AttachmentNamer {
    pub fn new() -> Self {
        Self {
            max_len: DEFAULT_MAX_LEN,
        }
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            max_len: max_len.max(16),
        }
    }

    /// 为单个附件生成稳定名称
    ///
    /// # 参数
    /// - `attachment`: 附件
    /// - `prefix`: 哈希名称使用的前缀（通常是文档类型）
    pub fn stable_name(&self, attachment: &AttachmentRef, prefix: &str) -> String {
        if let Some(name) = self.sanitize(&attachment.stable_name) {
            return name;
        }

        if let Some(segment) = attachment.local_uri.as_deref().and_then(last_segment) {
            if let Some(name) = self.sanitize(segment) {
                return self.ensure_extension(name, attachment);
            }
        }

        self.hashed_name(attachment, prefix)
    }

    /// 为文档的所有附件命名（原地修改）
    ///
    /// 同一文档内重名时，后出现的附件改用哈希名称
    pub fn name_all(&self, attachments: &mut [AttachmentRef], prefix: &str) {
        let mut seen = HashSet::new();
        for attachment in attachments.iter_mut() {
            let mut name = self.stable_name(attachment, prefix);
            if seen.contains(&name) {
                name = self.hashed_name(attachment, prefix);
            }
            seen.insert(name.clone());
            attachment.stable_name = name;
        }
    }

    /// 哈希名称：`{prefix}_{hash:08x}.{ext}`
    pub fn hashed_name(&self, attachment: &AttachmentRef, prefix: &str) -> String {
        let seed = match attachment
            .local_uri
            .as_deref()
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
        {
            Some(uri) => uri.to_string(),
            None => serde_json::to_string(attachment).unwrap_or_default(),
        };

        let prefix = self.sanitize(prefix).unwrap_or_else(|| "att".to_string());
        let name = format!(
            "{}_{:08x}.{}",
            prefix,
            fnv1a_32(seed.as_bytes()),
            extension_for(attachment)
        );
        self.cap(name)
    }

    /// 清洗为安全字符集 `[A-Za-z0-9._-]`，其余字符替换为 `_`
    pub fn sanitize(&self, raw: &str) -> Option<String> {
        let mut out = String::with_capacity(raw.len());
        let mut last_underscore = false;

        for c in raw.trim().chars() {
            let mapped = if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            };
            if mapped == '_' {
                if last_underscore {
                    continue;
                }
                last_underscore = true;
            } else {
                last_underscore = false;
            }
            out.push(mapped);
        }

        let out = out.trim_matches(|c: char| c == '_' || c == '.');
        if !out.chars().any(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(self.cap(out.to_string()))
    }

    /// 截断到最大长度，尽量保留扩展名
    fn cap(&self, name: String) -> String {
        if name.len() <= self.max_len {
            return name;
        }
        match name.rsplit_once('.') {
            Some((stem, ext)) if extension_from_name(&name).is_some() => {
                let keep = self.max_len.saturating_sub(ext.len() + 1);
                format!("{}.{}", &stem[..keep.min(stem.len())], ext)
            }
            _ => name[..self.max_len].to_string(),
        }
    }

    fn ensure_extension(&self, name: String, attachment: &AttachmentRef) -> String {
        if extension_from_name(&name).is_some() {
            return name;
        }
        match attachment
            .media_type
            .as_deref()
            .and_then(extension_from_media_type)
        {
            Some(ext) => self.cap(format!("{}.{}", name, ext)),
            None => name,
        }
    }
}

impl Default for AttachmentNamer {
    fn default() -> Self {
        Self::new()
    }
}

/// 32 位 FNV-1a 哈希
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    bytes.iter().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(PRIME)
    })
}

/// URI 的最后一段路径；看起来像 URI 方案本身时返回 None
fn last_segment(uri: &str) -> Option<&str> {
    let uri = uri.trim();
    let without_query = uri.split(|c: char| c == '?' || c == '#').next().unwrap_or(uri);

    let path = match without_query.find("://") {
        Some(pos) => {
            let rest = &without_query[pos + 3..];
            // 只有 authority 没有路径
            let slash = rest.find('/')?;
            &rest[slash..]
        }
        None => without_query,
    };

    let segment = path.rsplit('/').find(|s| !s.is_empty())?;
    if segment.contains(':') {
        return None;
    }
    Some(segment)
}

fn extension_for(attachment: &AttachmentRef) -> String {
    if let Some(ext) = attachment
        .media_type
        .as_deref()
        .and_then(extension_from_media_type)
    {
        return ext;
    }

    [
        Some(attachment.stable_name.as_str()),
        attachment.local_uri.as_deref(),
    ]
    .into_iter()
    .flatten()
    .find_map(|candidate| last_segment(candidate).and_then(extension_from_name))
    .unwrap_or_else(|| "bin".to_string())
}

fn extension_from_media_type(media_type: &str) -> Option<String> {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or(media_type)
        .trim()
        .to_ascii_lowercase();

    let preferred = match essence.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/heic" => Some("heic"),
        "image/heif" => Some("heif"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "application/pdf" => Some("pdf"),
        "video/mp4" => Some("mp4"),
        "video/quicktime" => Some("mov"),
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => Some("m4a"),
        _ => None,
    };

    preferred.map(str::to_string).or_else(|| {
        mime_guess::get_mime_extensions_str(&essence)
            .and_then(|exts| exts.first())
            .map(|ext| ext.to_string())
    })
}

fn extension_from_name(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > MAX_EXTENSION_LEN {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
