//! 本地媒体提供者
//!
//! 把附件的本地 URI 读成字节，供上传阶段组装 multipart

use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use std::path::PathBuf;
use url::Url;

/// 本地媒体提供者接口
#[async_trait]
pub trait MediaProvider: Send + Sync {
    async fn read(&self, uri: &str) -> AppResult<Vec<u8>>;
}

/// 文件系统媒体提供者
///
/// 支持 `file://` URI 和普通路径；相对路径基于 `root` 解析
#[derive(Debug, Clone, Default)]
pub struct FsMediaProvider {
    root: Option<PathBuf>,
}

impl FsMediaProvider {
    pub fn new() -> Self {
        Self { root: None }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// 把 URI 转换为文件路径
    ///
    /// `file:` URI 交给 `url` 解析（含 `localhost` 主机和 `%XX` 解码），
    /// 其他带方案的 URI 不支持，其余按普通路径处理
    pub fn resolve_path(&self, uri: &str) -> AppResult<PathBuf> {
        let uri = uri.trim();
        let unsupported = || AppError::UnsupportedMedia {
            uri: uri.to_string(),
        };

        let path = match Url::parse(uri) {
            Ok(url) if url.scheme() == "file" => url.to_file_path().map_err(|_| unsupported())?,
            _ if uri.contains("://") => return Err(unsupported()),
            _ => PathBuf::from(uri),
        };

        match &self.root {
            Some(root) if path.is_relative() => Ok(root.join(path)),
            _ => Ok(path),
        }
    }
}

#[async_trait]
impl MediaProvider for FsMediaProvider {
    async fn read(&self, uri: &str) -> AppResult<Vec<u8>> {
        let path = self.resolve_path(uri)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| AppError::media(uri, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_file_uri() {
        let provider = FsMediaProvider::new();
        assert_eq!(
            provider.resolve_path("file:///tmp/Foto%20A.jpg").unwrap(),
            PathBuf::from("/tmp/Foto A.jpg")
        );
        assert_eq!(
            provider.resolve_path("file://localhost/tmp/a.jpg").unwrap(),
            PathBuf::from("/tmp/a.jpg")
        );
    }

    #[test]
    fn test_relative_path_uses_root() {
        let provider = FsMediaProvider::with_root("/outbox");
        assert_eq!(
            provider.resolve_path("media/a.jpg").unwrap(),
            PathBuf::from("/outbox/media/a.jpg")
        );
    }

    #[test]
    fn test_content_uri_is_unsupported() {
        let provider = FsMediaProvider::new();
        assert!(matches!(
            provider.resolve_path("content://media/external/images/media/42"),
            Err(AppError::UnsupportedMedia { .. })
        ));
    }

    #[test]
    fn test_uppercase_scheme_and_foreign_host() {
        let provider = FsMediaProvider::new();
        assert_eq!(
            provider.resolve_path("FILE:///tmp/a.jpg").unwrap(),
            PathBuf::from("/tmp/a.jpg")
        );
        assert!(matches!(
            provider.resolve_path("file://phone.local/tmp/a.jpg"),
            Err(AppError::UnsupportedMedia { .. })
        ));
    }

    #[tokio::test]
    async fn test_non_ascii_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Müllhöhe.jpg"), b"jpeg-bytes").unwrap();
        let provider = FsMediaProvider::with_root(dir.path());

        assert_eq!(
            provider.resolve_path("Müllhöhe.jpg").unwrap(),
            dir.path().join("Müllhöhe.jpg")
        );
        assert_eq!(
            provider.read("Müllhöhe.jpg").await.unwrap(),
            b"jpeg-bytes".to_vec()
        );
        assert!(matches!(
            FsMediaProvider::new().read("Müllhöhe-fehlt.jpg").await,
            Err(AppError::Media { .. })
        ));
    }

    #[tokio::test]
    async fn test_read_file_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"jpeg-bytes").unwrap();
        let provider = FsMediaProvider::with_root(dir.path());

        assert_eq!(provider.read("a.jpg").await.unwrap(), b"jpeg-bytes".to_vec());
        assert!(matches!(
            provider.read("missing.jpg").await,
            Err(AppError::Media { .. })
        ));
    }
}
