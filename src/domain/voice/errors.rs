//! Voice Context - Errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("无效的音色标识: {0}")]
    InvalidId(String),

    #[error("无效的语言代码: {0}")]
    InvalidLanguage(String),
}
