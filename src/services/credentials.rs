//! 凭证提供者
//!
//! 只提供 token，不关心哪些路径需要凭证（由传输层决定）

use async_trait::async_trait;

/// 凭证提供者接口
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// 当前有效的 token，未登录时返回 None
    async fn get_token(&self) -> Option<String>;
}

/// 固定 token
#[derive(Debug, Clone, Default)]
pub struct StaticToken {
    token: Option<String>,
}

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn none() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn get_token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// 每次调用时从环境变量读取 token
#[derive(Debug, Clone)]
pub struct EnvToken {
    var_name: String,
}

impl EnvToken {
    pub fn new(var_name: impl Into<String>) -> Self {
        Self {
            var_name: var_name.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for EnvToken {
    async fn get_token(&self) -> Option<String> {
        std::env::var(&self.var_name)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}
