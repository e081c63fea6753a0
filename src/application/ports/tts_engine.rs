//! TTS Engine Port - TTS 推理引擎抽象
//!
//! 引擎是黑盒：`(text, voice, language) -> (samples, sample_rate)`，
//! 具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::voice::{LanguageCode, VoiceId};

/// TTS 错误
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Unsupported voice/language: {voice} ({language})")]
    Unsupported { voice: String, language: String },
}

/// TTS 推理请求
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// 要合成的文本内容
    pub text: String,
    pub voice: VoiceId,
    pub language: LanguageCode,
}

/// TTS 推理输出（单声道 PCM）
#[derive(Debug, Clone)]
pub struct EngineOutput {
    /// 采样值，范围 [-1.0, 1.0]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// TTS Engine Port
///
/// 单个引擎实例不保证可并发调用，调用方负责串行化
#[async_trait]
pub trait TtsEnginePort: Send + Sync {
    /// 执行 TTS 推理
    async fn synthesize(&self, request: EngineRequest) -> Result<EngineOutput, TtsError>;

    /// 检查引擎是否可用
    async fn health_check(&self) -> bool {
        true // 默认实现
    }
}
