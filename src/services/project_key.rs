//! 项目键解析服务 - 业务能力层
//!
//! 把不透明的项目标识转换为业务编码（`BA-YYYY-XXXX`）。
//! 业务编码只能直接从输入中提取或从项目记录中查到一次，绝不猜测。

use crate::error::{AppResult, TransportError};
use crate::infrastructure::{ApiRequest, TransportClient};
use crate::models::{Project, ProjectKey};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

use super::cache::KeyValueCache;

const CACHE_KEY_PREFIX: &str = "project-key:";

/// 项目列表服务接口
#[async_trait]
pub trait ProjectDirectory: Send + Sync {
    async fn list(&self) -> AppResult<Vec<Project>>;
}

/// 通过 HTTP 查询项目列表
pub struct HttpProjectDirectory {
    transport: Arc<TransportClient>,
    path: String,
}

impl HttpProjectDirectory {
    pub fn new(transport: Arc<TransportClient>) -> Self {
        Self {
            transport,
            path: "/api/projects".to_string(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

#[async_trait]
impl ProjectDirectory for HttpProjectDirectory {
    async fn list(&self) -> AppResult<Vec<Project>> {
        let response = self.transport.send(ApiRequest::get(&self.path)).await?;
        parse_project_list(&response.body)
            .ok_or_else(|| TransportError::server(response.status, "项目列表格式无法识别").into())
    }
}

/// 解析项目列表：`[...]`、`{items}`、`{projects}`、`{data}`
fn parse_project_list(body: &JsonValue) -> Option<Vec<Project>> {
    let list = match body {
        JsonValue::Array(items) => items,
        JsonValue::Object(map) => ["items", "projects", "data"]
            .iter()
            .find_map(|field| map.get(*field).and_then(JsonValue::as_array))?,
        _ => return None,
    };

    Some(
        list.iter()
            .filter_map(|item| serde_json::from_value::<Project>(item.clone()).ok())
            .collect(),
    )
}

fn code_pattern() -> Option<&'static Regex> {
    static CODE_RE: OnceLock<Option<Regex>> = OnceLock::new();
    CODE_RE
        .get_or_init(|| {
            Regex::new(r"(?i)(?:^|[^a-z0-9])(?:local[-_])?ba[-_](\d{4})[-_]([a-z0-9]+)").ok()
        })
        .as_ref()
}

fn uuid_pattern() -> Option<&'static Regex> {
    static UUID_RE: OnceLock<Option<Regex>> = OnceLock::new();
    UUID_RE
        .get_or_init(|| {
            Regex::new(
                r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$",
            )
            .ok()
        })
        .as_ref()
}

/// 从输入中提取业务编码（纯函数，不访问网络）
///
/// 下划线统一为连字符并转大写；`local-` 前缀变体同样识别
pub fn extract_business_code(raw: &str) -> Option<String> {
    let caps = code_pattern()?.captures(raw.trim())?;
    let year = caps.get(1)?.as_str();
    let suffix = caps.get(2)?.as_str().to_ascii_uppercase();
    Some(format!("BA-{}-{}", year, suffix))
}

/// 是否 UUID 形状
pub fn looks_like_uuid(raw: &str) -> bool {
    uuid_pattern()
        .map(|re| re.is_match(raw.trim()))
        .unwrap_or(false)
}

/// 项目键解析服务
///
/// 职责：
/// - 输入中已有业务编码时直接提取
/// - UUID 输入最多查询一次项目列表，结果写入共享缓存
/// - 都失败时原样返回（去空白），绝不编造业务编码
pub struct ProjectKeyResolver {
    directory: Arc<dyn ProjectDirectory>,
    cache: Arc<dyn KeyValueCache>,
}

impl ProjectKeyResolver {
    pub fn new(directory: Arc<dyn ProjectDirectory>, cache: Arc<dyn KeyValueCache>) -> Self {
        Self { directory, cache }
    }

    /// 解析项目键
    pub async fn resolve(&self, raw: &str) -> ProjectKey {
        let trimmed = raw.trim();

        // 1. 直接提取
        if let Some(code) = extract_business_code(trimmed) {
            return ProjectKey::Canonical(code);
        }

        // 2. UUID → 查询一次项目列表
        if looks_like_uuid(trimmed) {
            if let Some(code) = self.lookup(trimmed).await {
                return ProjectKey::Canonical(code);
            }
        }

        // 3. 原样返回
        debug!("项目标识 {} 无法解析为业务编码，使用原值", trimmed);
        ProjectKey::Opaque(trimmed.to_string())
    }

    async fn lookup(&self, uuid: &str) -> Option<String> {
        let cache_key = format!("{}{}", CACHE_KEY_PREFIX, uuid.to_ascii_lowercase());

        if let Some(cached) = self.cache.get(&cache_key).await {
            if let Some(code) = extract_business_code(&cached) {
                debug!("项目键缓存命中: {} → {}", uuid, code);
                return Some(code);
            }
        }

        let projects = match self.directory.list().await {
            Ok(projects) => projects,
            Err(e) => {
                warn!("⚠️ 查询项目列表失败，使用原始标识: {}", e);
                return None;
            }
        };

        let code = projects
            .iter()
            .find(|p| p.id.trim().eq_ignore_ascii_case(uuid))
            .and_then(|p| p.code.as_deref())
            .and_then(extract_business_code)?;

        info!("✓ 项目 {} 解析为 {}", uuid, code);
        if let Err(e) = self.cache.set(&cache_key, &code).await {
            warn!("⚠️ 写入项目键缓存失败: {}", e);
        }
        Some(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::services::cache::MemoryCache;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const UUID: &str = "3f2b6c1e-8a4d-4f7b-9c2e-1d5a7b9e0f42";

    struct CountingDirectory {
        projects: Vec<Project>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingDirectory {
        fn with_projects(projects: Vec<Project>) -> Self {
            Self {
                projects,
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                projects: Vec::new(),
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProjectDirectory for CountingDirectory {
        async fn list(&self) -> AppResult<Vec<Project>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::Transport(TransportError::Offline));
            }
            Ok(self.projects.clone())
        }
    }

    fn demo_project() -> Project {
        Project {
            id: UUID.to_string(),
            code: Some("ba_2025_demo".to_string()),
            name: Some("Neubau Halle 3".to_string()),
        }
    }

    #[test]
    fn test_extract_business_code_variants() {
        assert_eq!(extract_business_code("BA-2025-DEMO").as_deref(), Some("BA-2025-DEMO"));
        assert_eq!(extract_business_code("ba_2025_demo").as_deref(), Some("BA-2025-DEMO"));
        assert_eq!(extract_business_code("  BA-2024-0007 ").as_deref(), Some("BA-2024-0007"));
        assert_eq!(
            extract_business_code("local-BA-2025-X1").as_deref(),
            Some("BA-2025-X1")
        );
        assert_eq!(
            extract_business_code("Projekt BA-2023-AB12 (Neubau)").as_deref(),
            Some("BA-2023-AB12")
        );
        assert_eq!(extract_business_code("XBA-2025-DEMO"), None);
        assert_eq!(extract_business_code("BA-25-DEMO"), None);
        assert_eq!(extract_business_code(UUID), None);
    }

    #[test]
    fn test_uuid_shape() {
        assert!(looks_like_uuid(UUID));
        assert!(looks_like_uuid(&UUID.to_uppercase()));
        assert!(!looks_like_uuid("local-1700000000"));
    }

    #[test]
    fn test_parse_project_list_shapes() {
        let item = json!({"id": UUID, "projectCode": "BA-2025-DEMO"});
        for body in [
            json!([item.clone()]),
            json!({"items": [item.clone()]}),
            json!({"projects": [item.clone()]}),
            json!({"data": [item.clone()]}),
        ] {
            let projects = parse_project_list(&body).unwrap();
            assert_eq!(projects[0].code.as_deref(), Some("BA-2025-DEMO"));
        }
        assert!(parse_project_list(&json!({"unexpected": true})).is_none());
    }

    #[tokio::test]
    async fn test_canonical_input_makes_no_network_call() {
        let directory = Arc::new(CountingDirectory::with_projects(vec![demo_project()]));
        let resolver = ProjectKeyResolver::new(directory.clone(), Arc::new(MemoryCache::new()));

        let key = resolver.resolve("BA-2025-DEMO").await;
        assert_eq!(key, ProjectKey::Canonical("BA-2025-DEMO".to_string()));
        assert_eq!(directory.calls(), 0);
    }

    #[tokio::test]
    async fn test_uuid_lookup_round_trip() {
        let directory = Arc::new(CountingDirectory::with_projects(vec![demo_project()]));
        let resolver = ProjectKeyResolver::new(directory.clone(), Arc::new(MemoryCache::new()));

        let first = resolver.resolve(UUID).await;
        assert_eq!(first.as_str(), "BA-2025-DEMO");
        assert_eq!(directory.calls(), 1);

        let again = resolver.resolve(first.as_str()).await;
        assert_eq!(again, first);
        let cached = resolver.resolve(UUID).await;
        assert_eq!(cached, first);
        assert_eq!(directory.calls(), 1);
    }

    #[tokio::test]
    async fn test_lookup_failure_falls_through_to_trimmed_input() {
        let directory = Arc::new(CountingDirectory::failing());
        let resolver = ProjectKeyResolver::new(directory.clone(), Arc::new(MemoryCache::new()));

        let key = resolver.resolve(&format!("  {}  ", UUID)).await;
        assert_eq!(key, ProjectKey::Opaque(UUID.to_string()));
        assert_eq!(directory.calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_uuid_and_opaque_ids_are_returned_unchanged() {
        let directory = Arc::new(CountingDirectory::with_projects(vec![Project {
            id: UUID.to_string(),
            code: None,
            name: None,
        }]));
        let resolver = ProjectKeyResolver::new(directory.clone(), Arc::new(MemoryCache::new()));

        assert_eq!(resolver.resolve(UUID).await, ProjectKey::Opaque(UUID.to_string()));
        assert_eq!(
            resolver.resolve("local-1700000000").await,
            ProjectKey::Opaque("local-1700000000".to_string())
        );
        // 非 UUID 输入不查询
        assert_eq!(directory.calls(), 1);
    }
}
