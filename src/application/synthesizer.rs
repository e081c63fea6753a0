//! Synthesizer Adapter - TTS 引擎调用边界
//!
//! 统一请求/响应契约并校验引擎输出。这一层不重试、无状态，
//! 重试/跳过策略由章节组装器负责。

use std::sync::Arc;

use crate::application::error::SynthesisError;
use crate::application::ports::{EngineRequest, TtsEnginePort};
use crate::domain::book::Chunk;

/// 可接受的最低采样率
pub const MIN_SAMPLE_RATE: u32 = 8_000;

/// 可接受的最高采样率
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// 单个分块的合成结果（单声道 PCM）
///
/// 只在一个章节的组装期间存在
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// 合成适配器
///
/// 包装一个引擎实例；引擎实例不可并发共享，因此每个 Synthesizer
/// 同一时间只应服务一个章节
#[derive(Clone)]
pub struct Synthesizer {
    engine: Arc<dyn TtsEnginePort>,
}

impl Synthesizer {
    pub fn new(engine: Arc<dyn TtsEnginePort>) -> Self {
        Self { engine }
    }

    /// 合成一个分块
    pub async fn synthesize(&self, chunk: &Chunk) -> Result<SynthesisResult, SynthesisError> {
        let request = EngineRequest {
            text: chunk.text.clone(),
            voice: chunk.voice.clone(),
            language: chunk.language.clone(),
        };

        let output = self
            .engine
            .synthesize(request)
            .await
            .map_err(|e| SynthesisError::from_engine(chunk.index, &e))?;

        if output.samples.is_empty() {
            return Err(SynthesisError::new(
                chunk.index,
                "engine returned an empty sample buffer",
            ));
        }

        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&output.sample_rate) {
            return Err(SynthesisError::new(
                chunk.index,
                format!("engine returned invalid sample rate {}", output.sample_rate),
            ));
        }

        if output.samples.iter().any(|s| !s.is_finite()) {
            return Err(SynthesisError::new(
                chunk.index,
                "engine returned non-finite samples",
            ));
        }

        tracing::trace!(
            chunk_index = chunk.index,
            chars = chunk.char_count(),
            samples = output.samples.len(),
            sample_rate = output.sample_rate,
            "Chunk synthesized"
        );

        Ok(SynthesisResult {
            samples: output.samples,
            sample_rate: output.sample_rate,
        })
    }

    pub async fn health_check(&self) -> bool {
        self.engine.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{EngineOutput, TtsError};
    use crate::domain::voice::{LanguageCode, VoiceId};
    use async_trait::async_trait;

    struct FixedEngine(Result<EngineOutput, ()>);

    #[async_trait]
    impl TtsEnginePort for FixedEngine {
        async fn synthesize(&self, request: EngineRequest) -> Result<EngineOutput, TtsError> {
            self.0.clone().map_err(|_| TtsError::Unsupported {
                voice: request.voice.to_string(),
                language: request.language.to_string(),
            })
        }
    }

    fn chunk(index: usize) -> Chunk {
        Chunk {
            index,
            text: "Hello.".to_string(),
            span: 0..6,
            voice: VoiceId::new("af_sky").unwrap(),
            language: LanguageCode::new("en-us").unwrap(),
        }
    }

    fn synthesizer(output: Result<EngineOutput, ()>) -> Synthesizer {
        Synthesizer::new(Arc::new(FixedEngine(output)))
    }

    #[tokio::test]
    async fn test_valid_output_passes_through() {
        let s = synthesizer(Ok(EngineOutput {
            samples: vec![0.0; 24000],
            sample_rate: 24000,
        }));
        let result = s.synthesize(&chunk(0)).await.unwrap();
        assert_eq!(result.samples.len(), 24000);
        assert_eq!(result.sample_rate, 24000);
    }

    #[tokio::test]
    async fn test_engine_rejection_carries_chunk_index() {
        let s = synthesizer(Err(()));
        let err = s.synthesize(&chunk(4)).await.unwrap_err();
        assert_eq!(err.chunk_index, 4);
        assert!(err.reason.contains("af_sky"));
    }

    #[tokio::test]
    async fn test_empty_buffer_rejected() {
        let s = synthesizer(Ok(EngineOutput {
            samples: Vec::new(),
            sample_rate: 24000,
        }));
        let err = s.synthesize(&chunk(1)).await.unwrap_err();
        assert_eq!(err.chunk_index, 1);
        assert!(err.reason.contains("empty"));
    }

    #[tokio::test]
    async fn test_invalid_sample_rate_rejected() {
        for rate in [0, 100, 1_000_000] {
            let s = synthesizer(Ok(EngineOutput {
                samples: vec![0.1; 10],
                sample_rate: rate,
            }));
            let err = s.synthesize(&chunk(2)).await.unwrap_err();
            assert!(err.reason.contains("sample rate"));
        }
    }

    #[tokio::test]
    async fn test_non_finite_samples_rejected() {
        let s = synthesizer(Ok(EngineOutput {
            samples: vec![0.1, f32::NAN],
            sample_rate: 24000,
        }));
        assert!(s.synthesize(&chunk(0)).await.is_err());
    }
}
