//! 错误类型定义
//!
//! 传输层只分类一次（`TransportError`，封闭集合），其余各层原样向上传递。
//! 只有编排层（`workflow::submission_flow`）可以把 `MissingEndpoint`
//! 转换为软成功或旧协议切换。

use crate::models::Phase;
use std::fmt;
use thiserror::Error;

/// 错误种类（封闭集合，用于结构化匹配）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Offline,
    Timeout,
    BadGatewayOrWrongApiBase,
    MissingEndpoint,
    ServerError,
    ReconciliationFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Offline => "OFFLINE",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::BadGatewayOrWrongApiBase => "BAD_GATEWAY_OR_WRONG_API_BASE",
            ErrorKind::MissingEndpoint => "MISSING_ENDPOINT",
            ErrorKind::ServerError => "SERVER_ERROR",
            ErrorKind::ReconciliationFailure => "RECONCILIATION_FAILURE",
        };
        f.write_str(label)
    }
}

/// 单次 HTTP 调用的失败分类
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// 网络层失败（连接被拒、DNS 失败、连接被重置）
    #[error("网络不可用 (OFFLINE)")]
    Offline,

    /// 超过截止时间或被调用方取消
    #[error("请求超时或已取消 (TIMEOUT)")]
    Timeout,

    /// 返回了 HTML 页面：反向代理 / 隧道 / API 地址配置错误
    #[error("网关错误或 API 地址配置错误 (HTTP {status})：响应是 HTML 页面")]
    BadGatewayOrWrongApiBase { status: u16 },

    /// 接口不存在（404 / "Cannot POST"）
    #[error("接口不存在 (HTTP {status}): {path}")]
    MissingEndpoint { status: u16, path: String },

    /// 应用层错误，message 取自响应体的 error / message 字段
    #[error("服务端错误 (HTTP {status}): {message}")]
    Server { status: u16, message: String },
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Offline => ErrorKind::Offline,
            TransportError::Timeout => ErrorKind::Timeout,
            TransportError::BadGatewayOrWrongApiBase { .. } => {
                ErrorKind::BadGatewayOrWrongApiBase
            }
            TransportError::MissingEndpoint { .. } => ErrorKind::MissingEndpoint,
            TransportError::Server { .. } => ErrorKind::ServerError,
        }
    }

    pub fn is_missing_endpoint(&self) -> bool {
        matches!(self, TransportError::MissingEndpoint { .. })
    }

    /// 服务端以 2xx 接受了请求，只是响应内容不可用
    pub fn was_accepted(&self) -> bool {
        matches!(self, TransportError::Server { status, .. } if (200..300).contains(status))
    }

    /// 创建应用层错误
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        TransportError::Server {
            status,
            message: message.into(),
        }
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// TOML 解析失败
    #[error("配置文件解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// 字段取值无效
    #[error("配置项 {field} 无效: {message}")]
    Invalid { field: String, message: String },
}

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 某个提交阶段失败（带阶段信息，调用方据此判断文件是否已上传）
    #[error("{phase} 阶段失败: {source}")]
    Submission {
        phase: Phase,
        #[source]
        source: TransportError,
    },

    /// 阶段之外的传输错误（如项目列表查询）
    #[error("传输错误: {0}")]
    Transport(#[from] TransportError),

    /// 附件无法与服务端结果对应；`after` 为之前完成的上传阶段
    #[error("附件对账失败 (RECONCILIATION_FAILURE): {attachment}")]
    Reconciliation {
        attachment: String,
        after: Option<Phase>,
    },

    /// 读取本地媒体失败
    #[error("读取本地媒体失败 ({uri}): {source}")]
    Media {
        uri: String,
        #[source]
        source: std::io::Error,
    },

    /// 媒体提供者无法处理的 URI
    #[error("不支持的媒体 URI: {uri}")]
    UnsupportedMedia { uri: String },

    /// 草稿内容无效
    #[error("草稿无效: {0}")]
    Draft(String),

    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 文件操作失败
    #[error("文件操作失败 ({path}): {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON 解析失败: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML 解析失败: {0}")]
    Toml(#[from] toml::de::Error),
}

impl AppError {
    /// 错误种类（非传输类错误返回 None）
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            AppError::Submission { source, .. } => Some(source.kind()),
            AppError::Transport(e) => Some(e.kind()),
            AppError::Reconciliation { .. } => Some(ErrorKind::ReconciliationFailure),
            _ => None,
        }
    }

    /// 失败发生在哪个阶段
    pub fn phase(&self) -> Option<Phase> {
        match self {
            AppError::Submission { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// 失败前文件是否可能已经存到服务端
    ///
    /// 上传阶段返回 2xx 但结果不可用时，文件也算已上传
    pub fn files_uploaded(&self) -> bool {
        match self {
            AppError::Submission { phase, source } => {
                phase.follows_upload() || (phase.is_upload() && source.was_accepted())
            }
            AppError::Reconciliation { after, .. } => after.is_some(),
            _ => false,
        }
    }

    pub fn is_missing_endpoint(&self) -> bool {
        match self {
            AppError::Submission { source, .. } | AppError::Transport(source) => {
                source.is_missing_endpoint()
            }
            _ => false,
        }
    }

    // ========== 便捷构造函数 ==========

    /// 创建阶段失败错误
    pub fn submission(phase: Phase, source: TransportError) -> Self {
        AppError::Submission { phase, source }
    }

    /// 创建文件操作错误
    pub fn file(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File {
            path: path.into(),
            source,
        }
    }

    /// 创建媒体读取错误
    pub fn media(uri: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Media {
            uri: uri.into(),
            source,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
