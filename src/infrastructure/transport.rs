//! HTTP 传输客户端 - 基础设施层
//!
//! 持有唯一的 `reqwest::Client`，只暴露"执行一次有截止时间的 HTTP 调用"的能力。
//! 失败在这里分类一次（`TransportError`），不做任何重试。

use crate::config::Config;
use crate::error::TransportError;
use crate::services::credentials::CredentialProvider;
use crate::utils::logging::truncate_text;
use regex::Regex;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde_json::Value as JsonValue;
use std::error::Error as StdError;
use std::io::ErrorKind as IoErrorKind;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 公共路径：无论调用方如何设置，都不发送凭证
static PUBLIC_PATHS: phf::Set<&'static str> = phf::phf_set! {
    "/api/auth",
    "/auth",
    "/api/health",
    "/health",
    "/api/license",
    "/license",
};

/// 视为网络层失败的 IO 错误
const OFFLINE_IO_KINDS: [IoErrorKind; 7] = [
    IoErrorKind::ConnectionRefused,
    IoErrorKind::ConnectionReset,
    IoErrorKind::ConnectionAborted,
    IoErrorKind::NotConnected,
    IoErrorKind::AddrNotAvailable,
    IoErrorKind::BrokenPipe,
    IoErrorKind::UnexpectedEof,
];

/// 截止时间类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// JSON 调用（约 20 秒）
    Short,
    /// multipart 上传（约 60 秒）
    Long,
}

/// multipart 中的一个文件
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// multipart 请求体
#[derive(Debug, Clone, Default)]
pub struct MultipartBody {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, file: FilePart) -> Self {
        self.files.push(file);
        self
    }

    fn to_form(&self) -> Form {
        let mut form = Form::new();
        for (name, value) in &self.fields {
            form = form.text(name.clone(), value.clone());
        }
        for file in &self.files {
            let media_type = file.media_type.clone().unwrap_or_else(|| {
                mime_guess::from_path(&file.file_name)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            });
            let make_part = || Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
            let part = make_part()
                .mime_str(&media_type)
                .unwrap_or_else(|_| make_part());
            form = form.part(file.field.clone(), part);
        }
        form
    }
}

/// 请求体
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(JsonValue),
    Multipart(MultipartBody),
}

/// 一次 API 调用的描述
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
    pub deadline: Deadline,
    /// 调用方附加的请求头
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: RequestBody::Empty,
            deadline: Deadline::Short,
            headers: Vec::new(),
        }
    }

    pub fn post_json(path: impl Into<String>, body: JsonValue) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: RequestBody::Json(body),
            deadline: Deadline::Short,
            headers: Vec::new(),
        }
    }

    pub fn post_multipart(path: impl Into<String>, body: MultipartBody) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: RequestBody::Multipart(body),
            deadline: Deadline::Long,
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// 成功响应
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: JsonValue,
}

/// HTTP 传输客户端
///
/// 职责：
/// - 附加 Accept / X-App-Version / X-App-Build / Authorization 请求头
/// - 公共路径上剥离凭证
/// - 按截止时间类别设置超时，支持取消
/// - 把失败分类为 `TransportError`
pub struct TransportClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
    app_version: String,
    app_build: String,
    short_timeout: Duration,
    long_timeout: Duration,
}

impl TransportClient {
    /// 根据配置创建传输客户端
    pub fn new(config: &Config, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            credentials,
            app_version: config.app_version.clone(),
            app_build: config.app_build.clone(),
            short_timeout: Duration::from_secs(config.short_timeout_secs),
            long_timeout: Duration::from_secs(config.long_timeout_secs),
        }
    }

    /// 自定义超时（测试中使用毫秒级超时）
    pub fn with_timeouts(mut self, short: Duration, long: Duration) -> Self {
        self.short_timeout = short;
        self.long_timeout = long;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn timeout_for(&self, deadline: Deadline) -> Duration {
        match deadline {
            Deadline::Short => self.short_timeout,
            Deadline::Long => self.long_timeout,
        }
    }

    /// 执行一次 HTTP 调用
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.send_with_cancel(request, None).await
    }

    /// 执行一次 HTTP 调用，可被取消（取消视为 TIMEOUT）
    pub async fn send_with_cancel(
        &self,
        request: ApiRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<ApiResponse, TransportError> {
        let public = is_public_path(&request.path);
        let url = self.url_for(&request.path);
        let timeout = self.timeout_for(request.deadline);

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .timeout(timeout)
            .header(ACCEPT, "application/json")
            .header("X-App-Version", self.app_version.as_str())
            .header("X-App-Build", self.app_build.as_str());

        for (name, value) in &request.headers {
            if public && name.eq_ignore_ascii_case(AUTHORIZATION.as_str()) {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }

        if public {
            debug!("公共路径 {}，不附带凭证", request.path);
        } else if let Some(token) = self.credentials.get_token().await {
            builder = builder.bearer_auth(token);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Multipart(body) => builder.multipart(body.to_form()),
        };

        debug!("{} {} (超时 {:?})", request.method, url, timeout);

        let exchange = async move {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, content_type, text))
        };

        let outcome = match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        warn!("请求已取消: {} {}", request.method, request.path);
                        return Err(TransportError::Timeout);
                    }
                    result = exchange => result,
                }
            }
            None => exchange.await,
        };

        let (status, content_type, text) = outcome.map_err(|e| {
            let classified = classify_network_error(&e);
            warn!("请求失败 {} {}: {} ({})", request.method, request.path, classified, e);
            classified
        })?;

        debug!(
            "{} {} → HTTP {}: {}",
            request.method,
            request.path,
            status,
            truncate_text(&text, 200)
        );

        let body = classify_response(
            status,
            content_type.as_deref(),
            &text,
            request.method.as_str(),
            &request.path,
        )?;

        Ok(ApiResponse { status, body })
    }
}

/// 是否公共路径（精确匹配或位于其下）
pub fn is_public_path(path: &str) -> bool {
    let path = path.split(|c: char| c == '?' || c == '#').next().unwrap_or(path);
    let path = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };
    PUBLIC_PATHS.iter().any(|public| {
        path == *public
            || path
                .strip_prefix(*public)
                .map(|rest| rest.starts_with('/'))
                .unwrap_or(false)
    })
}

/// 网络错误分类（只看错误结构，不看消息文本）
pub fn classify_network_error(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout;
    }
    if err.is_builder() || err.is_redirect() {
        // URL 无法构造或重定向循环：API 地址配置错误
        return TransportError::BadGatewayOrWrongApiBase { status: 0 };
    }
    if let Some(kind) = io_error_kind(err) {
        if kind == IoErrorKind::TimedOut {
            return TransportError::Timeout;
        }
        if OFFLINE_IO_KINDS.contains(&kind) {
            return TransportError::Offline;
        }
    }
    if !err.is_connect() {
        debug!("未识别的网络错误按 OFFLINE 处理: {}", err);
    }
    TransportError::Offline
}

fn io_error_kind(err: &reqwest::Error) -> Option<IoErrorKind> {
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(current) = source {
        if let Some(io_err) = current.downcast_ref::<std::io::Error>() {
            return Some(io_err.kind());
        }
        source = current.source();
    }
    None
}

/// 响应是否是 HTML 页面
pub fn looks_like_html(content_type: Option<&str>, body: &str) -> bool {
    if content_type
        .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
        .unwrap_or(false)
    {
        return true;
    }
    let head: String = body
        .trim_start()
        .chars()
        .take(15)
        .collect::<String>()
        .to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

/// Express 默认的 "Cannot POST /path" 页面
fn is_cannot_method_body(body: &str) -> bool {
    static CANNOT_METHOD: OnceLock<Option<Regex>> = OnceLock::new();
    CANNOT_METHOD
        .get_or_init(|| Regex::new(r"(?i)\bcannot (get|post|put|patch|delete) /").ok())
        .as_ref()
        .map(|re| re.is_match(body))
        .unwrap_or(false)
}

/// 响应分类
///
/// - 2xx：HTML → BadGatewayOrWrongApiBase；空 → Null；JSON → 值；其他文本 → 字符串
/// - 404：JSON / 空 / Express 页面 → MissingEndpoint；其他 HTML → BadGatewayOrWrongApiBase
/// - 其他非 2xx：Express 页面 → MissingEndpoint；HTML → BadGatewayOrWrongApiBase；
///   否则取 error / message 字段，解析失败时取原文
pub fn classify_response(
    status: u16,
    content_type: Option<&str>,
    body: &str,
    method: &str,
    path: &str,
) -> Result<JsonValue, TransportError> {
    let html = looks_like_html(content_type, body);

    if (200..300).contains(&status) {
        if html {
            return Err(TransportError::BadGatewayOrWrongApiBase { status });
        }
        if body.trim().is_empty() {
            return Ok(JsonValue::Null);
        }
        return Ok(serde_json::from_str(body)
            .unwrap_or_else(|_| JsonValue::String(body.to_string())));
    }

    let cannot_method = is_cannot_method_body(body);
    let missing = TransportError::MissingEndpoint {
        status,
        path: format!("{} {}", method, path),
    };

    if status == 404 {
        if html && !cannot_method {
            return Err(TransportError::BadGatewayOrWrongApiBase { status });
        }
        return Err(missing);
    }
    if cannot_method {
        return Err(missing);
    }
    if html {
        return Err(TransportError::BadGatewayOrWrongApiBase { status });
    }

    Err(TransportError::server(status, error_message(status, body)))
}

/// 从错误响应体中取出消息
fn error_message(status: u16, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<JsonValue>(body) {
        for field in ["error", "message"] {
            match json.get(field) {
                Some(JsonValue::String(msg)) if !msg.trim().is_empty() => return msg.clone(),
                Some(JsonValue::Object(inner)) => {
                    if let Some(JsonValue::String(msg)) = inner.get("message") {
                        return msg.clone();
                    }
                }
                _ => {}
            }
        }
    }
    let raw = body.trim();
    if raw.is_empty() {
        format!("HTTP {}", status)
    } else {
        raw.to_string()
    }
}
