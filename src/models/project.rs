use serde::{Deserialize, Serialize};
use std::fmt;

/// 项目列表中的一项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    #[serde(alias = "_id", alias = "uuid")]
    pub id: String,

    #[serde(
        default,
        alias = "projectCode",
        alias = "businessCode",
        alias = "key"
    )]
    pub code: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
}

/// 项目键：业务编码（BA-YYYY-XXXX）或不透明的回退标识
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProjectKey {
    Canonical(String),
    Opaque(String),
}

impl ProjectKey {
    pub fn as_str(&self) -> &str {
        match self {
            ProjectKey::Canonical(code) => code,
            ProjectKey::Opaque(id) => id,
        }
    }

    pub fn is_canonical(&self) -> bool {
        matches!(self, ProjectKey::Canonical(_))
    }
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
