//! 键值缓存 - 业务能力层
//!
//! 项目键映射的存放处。多个提交并发读写同一个键时写入的是同一个推导结果，
//! 因此竞争不会产生可观察的不一致。

use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// 键值缓存接口
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: &str) -> AppResult<()>;
}

/// 内存缓存
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .ok()
            .and_then(|map| map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        if let Ok(mut map) = self.entries.write() {
            map.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}

/// 持久化到 JSON 文件的缓存
///
/// 启动时整体读入；每次写入后整体落盘（临时文件 + rename）
pub struct JsonFileCache {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl JsonFileCache {
    /// 打开缓存文件，文件不存在时从空缓存开始
    pub async fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => HashMap::new(),
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => map,
                Err(e) => {
                    warn!("缓存文件损坏，将重新创建 {}: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(AppError::file(path.display().to_string(), e)),
        };

        debug!("已加载 {} 条缓存: {}", entries.len(), path.display());

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    async fn persist(&self, entries: &HashMap<String, String>) -> AppResult<()> {
        let content = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp_path, content)
            .await
            .map_err(|e| AppError::file(tmp_path.display().to_string(), e))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| AppError::file(self.path.display().to_string(), e))?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueCache for JsonFileCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let mut entries = self.entries.lock().await;
        if entries.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries).await
    }
}
