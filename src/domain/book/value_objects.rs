//! Book Context - Value Objects

use serde::{Deserialize, Serialize};

/// 缺省书名
pub const UNTITLED: &str = "Untitled";

/// 缺省作者
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// 书籍标题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Title(String);

impl Title {
    pub fn new(title: impl Into<String>) -> Result<Self, &'static str> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err("标题不能为空");
        }
        if title.chars().count() > 500 {
            return Err("标题长度不能超过500字符");
        }
        Ok(Self(title))
    }

    /// 无标题书籍
    pub fn untitled() -> Self {
        Self(UNTITLED.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Title {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 作者
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author(String);

impl Author {
    /// 空白作者名回退为 "Unknown Author"
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            Self::unknown()
        } else {
            Self(name)
        }
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_AUTHOR.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Author {
    fn default() -> Self {
        Self::unknown()
    }
}

impl std::fmt::Display for Author {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
