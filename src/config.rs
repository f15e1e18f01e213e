//! 程序配置
//!
//! 配置分三层：默认值 → TOML 配置文件（可选）→ 环境变量。
//! 数值类环境变量解析失败时沿用上一层的值。

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;

/// 配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "FIELD_SUBMIT_CONFIG";

/// 默认配置文件
pub const DEFAULT_CONFIG_FILE: &str = "field_submit.toml";

/// 程序配置文件
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 服务端 ---
    pub api_base_url: String,
    /// Bearer 令牌（为空时不发送 Authorization）
    pub api_token: Option<String>,
    pub app_version: String,
    pub app_build: String,
    /// JSON 调用的超时（秒）
    pub short_timeout_secs: u64,
    /// multipart 上传的超时（秒）
    pub long_timeout_secs: u64,
    // --- 发件箱 ---
    /// 待提交草稿存放目录
    pub outbox_folder: String,
    /// 提交成功后草稿归档目录
    pub sent_folder: String,
    /// 项目键缓存文件
    pub project_cache_file: String,
    /// 同时提交的草稿数量
    pub max_concurrent_submissions: usize,
    /// 附件未对账时是否仍然提交
    pub allow_partial_attachments: bool,
    // --- 日志 ---
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".to_string(),
            api_token: None,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            app_build: "dev".to_string(),
            short_timeout_secs: 20,
            long_timeout_secs: 60,
            outbox_folder: "outbox".to_string(),
            sent_folder: "outbox/sent".to_string(),
            project_cache_file: "project_keys.json".to_string(),
            max_concurrent_submissions: 4,
            allow_partial_attachments: false,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
        }
    }
}

impl Config {
    /// 加载配置：默认值 → 配置文件 → 环境变量
    ///
    /// 配置文件由 `FIELD_SUBMIT_CONFIG` 指定；未指定时读取当前目录下的
    /// `field_submit.toml`（不存在则跳过）
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var(CONFIG_PATH_ENV).ok();
        let base = match &explicit {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => Self::default(),
        };
        Ok(base.apply_overrides(|name| std::env::var(name).ok()))
    }

    /// 只使用默认值和环境变量
    pub fn from_env() -> Self {
        Self::default().apply_overrides(|name| std::env::var(name).ok())
    }

    /// 从 TOML 文件读取（缺失的字段使用默认值）
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
                path: path.display().to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// 用环境变量覆盖
    ///
    /// # 参数
    /// - `lookup`: 按变量名取值（测试中传入固定表）
    pub fn apply_overrides(self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse_or = |name: &str, current: u64| {
            lookup(name).and_then(|v| v.trim().parse().ok()).unwrap_or(current)
        };
        Self {
            api_base_url: lookup("API_BASE_URL").unwrap_or(self.api_base_url),
            api_token: lookup("API_TOKEN")
                .filter(|v| !v.trim().is_empty())
                .or(self.api_token),
            app_version: lookup("APP_VERSION").unwrap_or(self.app_version),
            app_build: lookup("APP_BUILD").unwrap_or(self.app_build),
            short_timeout_secs: parse_or("SHORT_TIMEOUT_SECS", self.short_timeout_secs),
            long_timeout_secs: parse_or("LONG_TIMEOUT_SECS", self.long_timeout_secs),
            outbox_folder: lookup("OUTBOX_FOLDER").unwrap_or(self.outbox_folder),
            sent_folder: lookup("SENT_FOLDER").unwrap_or(self.sent_folder),
            project_cache_file: lookup("PROJECT_CACHE_FILE").unwrap_or(self.project_cache_file),
            max_concurrent_submissions: lookup("MAX_CONCURRENT_SUBMISSIONS")
                .and_then(|v| v.trim().parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(self.max_concurrent_submissions),
            allow_partial_attachments: lookup("ALLOW_PARTIAL_ATTACHMENTS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(self.allow_partial_attachments),
            verbose_logging: lookup("VERBOSE_LOGGING")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(self.verbose_logging),
            output_log_file: lookup("OUTPUT_LOG_FILE").unwrap_or(self.output_log_file),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_submissions == 0 {
            return Err(ConfigError::Invalid {
                field: "max_concurrent_submissions".to_string(),
                message: "必须大于 0".to_string(),
            });
        }
        if self.short_timeout_secs == 0 || self.long_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "timeout".to_string(),
                message: "超时必须大于 0 秒".to_string(),
            });
        }
        Ok(())
    }
}
