//! Fake TTS Client - 确定性的本地引擎
//!
//! 不调用任何外部服务：采样数与文本字符数成正比，波形只由文本决定。
//! 用于演练运行（`tts.backend = "fake"`）和测试。

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::application::ports::{EngineOutput, EngineRequest, TtsEnginePort, TtsError};

/// Fake TTS Client 配置
#[derive(Debug, Clone)]
pub struct FakeTtsClientConfig {
    /// 采样率
    pub sample_rate: u32,
    /// 每个字符对应的采样数
    pub samples_per_char: usize,
    /// 文本包含其中任一标记时返回错误
    pub fail_markers: Vec<String>,
    /// 模拟推理延迟（毫秒）
    pub latency_ms: u64,
}

impl Default for FakeTtsClientConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24000,
            samples_per_char: 1200,
            fail_markers: Vec::new(),
            latency_ms: 0,
        }
    }
}

/// Fake TTS Client
pub struct FakeTtsClient {
    config: FakeTtsClientConfig,
    calls: AtomicUsize,
}

impl FakeTtsClient {
    pub fn new(config: FakeTtsClientConfig) -> Self {
        tracing::info!(
            sample_rate = config.sample_rate,
            samples_per_char = config.samples_per_char,
            "FakeTtsClient initialized"
        );
        Self {
            config,
            calls: AtomicUsize::new(0),
        }
    }

    /// 使用默认配置创建
    pub fn with_defaults() -> Self {
        Self::new(FakeTtsClientConfig::default())
    }

    /// 已收到的合成请求数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 某段文本会产生的采样数
    pub fn expected_samples(&self, text: &str) -> usize {
        text.chars().count() * self.config.samples_per_char
    }

    fn render(&self, text: &str) -> Vec<f32> {
        let mut samples = Vec::with_capacity(self.expected_samples(text));
        for (i, c) in text.chars().enumerate() {
            // 每个字符一段固定音高的方波，幅度不超过 0.5
            let period = 8 + (c as u32 % 32) as usize;
            for n in 0..self.config.samples_per_char {
                let phase = (i * self.config.samples_per_char + n) % period;
                samples.push(if phase < period / 2 { 0.25 } else { -0.25 });
            }
        }
        samples
    }
}

#[async_trait]
impl TtsEnginePort for FakeTtsClient {
    async fn synthesize(&self, request: EngineRequest) -> Result<EngineOutput, TtsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(
            text_len = request.text.len(),
            voice = %request.voice,
            language = %request.language,
            "FakeTtsClient: rendering deterministic audio"
        );

        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        if let Some(marker) = self
            .config
            .fail_markers
            .iter()
            .find(|m| request.text.contains(m.as_str()))
        {
            return Err(TtsError::ServiceError(format!(
                "fake engine refuses text containing {:?}",
                marker
            )));
        }

        Ok(EngineOutput {
            samples: self.render(&request.text),
            sample_rate: self.config.sample_rate,
        })
    }
}
