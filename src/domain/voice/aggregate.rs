//! Voice Context - Catalog Entry

use serde::{Deserialize, Serialize};

use super::{Gender, LanguageCode, VoiceId};

/// 音色目录条目
///
/// 不变量:
/// - 只读：流水线只引用，从不修改或持有所有权
/// - 每个音色固定绑定一个语言代码
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    id: VoiceId,
    language: LanguageCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gender: Option<Gender>,
}

impl Voice {
    pub fn new(id: VoiceId, language: LanguageCode) -> Self {
        Self {
            id,
            language,
            display_name: None,
            gender: None,
        }
    }

    pub fn with_display(mut self, display_name: impl Into<String>, gender: Option<Gender>) -> Self {
        self.display_name = Some(display_name.into());
        self.gender = gender;
        self
    }

    pub fn id(&self) -> &VoiceId {
        &self.id
    }

    pub fn language(&self) -> &LanguageCode {
        &self.language
    }

    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(self.id.as_str())
    }

    pub fn gender(&self) -> Option<Gender> {
        self.gender
    }
}

impl std::fmt::Display for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.display_name(), self.language)
    }
}
