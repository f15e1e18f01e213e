//! 上传结果规范化 - 业务能力层
//!
//! 服务端返回的上传结果字段名五花八门（originalname / publicUrl / storagePath ...），
//! "容忍多种服务端格式"这件事只在这里处理一次。

use crate::models::UploadResult;
use serde_json::{Map, Value as JsonValue};

/// 结果列表所在字段（按优先级）
const LIST_FIELDS: [&str; 6] = ["items", "files", "uploaded", "attachments", "results", "data"];

/// 文件名字段（按优先级）
const NAME_FIELDS: [&str; 6] = [
    "name",
    "originalname",
    "originalName",
    "filename",
    "fileName",
    "key",
];

/// 地址字段（按优先级）
const URL_FIELDS: [&str; 8] = [
    "url",
    "publicUrl",
    "public_url",
    "storagePath",
    "storage_path",
    "path",
    "location",
    "href",
];

/// 把上传响应规范化为 `UploadResult` 列表
///
/// 没有地址的条目被丢弃；没有文件名的条目使用地址的最后一段
pub fn normalize_upload_response(body: &JsonValue) -> Vec<UploadResult> {
    find_entries(body, 0)
        .map(|entries| entries.iter().filter_map(normalize_entry).collect())
        .unwrap_or_default()
}

fn find_entries(body: &JsonValue, depth: usize) -> Option<&Vec<JsonValue>> {
    match body {
        JsonValue::Array(entries) => Some(entries),
        JsonValue::Object(map) if depth < 2 => LIST_FIELDS.iter().find_map(|field| {
            map.get(*field).and_then(|value| match value {
                JsonValue::Array(entries) => Some(entries),
                JsonValue::Object(_) => find_entries(value, depth + 1),
                _ => None,
            })
        }),
        _ => None,
    }
}

fn normalize_entry(entry: &JsonValue) -> Option<UploadResult> {
    match entry {
        JsonValue::String(url) if !url.trim().is_empty() => {
            Some(UploadResult::new(name_from_url(url), url.trim()))
        }
        JsonValue::Object(map) => {
            let url = first_string(map, &URL_FIELDS)?;
            let name = first_string(map, &NAME_FIELDS).unwrap_or_else(|| name_from_url(&url));
            Some(UploadResult::new(name, url))
        }
        _ => None,
    }
}

fn first_string(map: &Map<String, JsonValue>, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| {
        map.get(*field)
            .and_then(JsonValue::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}

fn name_from_url(url: &str) -> String {
    let without_query = url.split(|c: char| c == '?' || c == '#').next().unwrap_or(url);
    without_query
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or_default()
        .to_string()
}
