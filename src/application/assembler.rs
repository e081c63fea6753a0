//! Chapter Assembler - 章节组装
//!
//! 按顺序逐块合成一个章节，拼接采样并原子写入章节产物。
//! 单个分块失败按 [`FailurePolicy`] 处理：插入静音继续，或放弃整章。

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::application::error::{ChapterError, SynthesisError};
use crate::application::ports::{ArtifactStoragePort, AudioCodecPort};
use crate::application::synthesizer::Synthesizer;
use crate::domain::book::{ChapterArtifact, Chunk};

/// 分块失败时的处理策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// 用固定时长的静音替换失败分块
    #[default]
    SkipWithSilence,
    /// 放弃整个章节
    AbortChapter,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::SkipWithSilence => "skip-with-silence",
            FailurePolicy::AbortChapter => "abort-chapter",
        }
    }
}

/// 组装器配置
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    pub policy: FailurePolicy,
    /// 替换失败分块的静音时长
    pub silence: Duration,
    /// 整章没有任何成功分块时使用的采样率
    pub fallback_sample_rate: u32,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            policy: FailurePolicy::SkipWithSilence,
            silence: Duration::from_millis(500),
            fallback_sample_rate: 24000,
        }
    }
}

/// 一个章节的组装结果
#[derive(Debug, Clone)]
pub struct AssemblyReport {
    pub artifact: ChapterArtifact,
    pub chunk_count: usize,
    /// 被静音替换的分块
    pub failed_chunks: Vec<SynthesisError>,
}

impl AssemblyReport {
    /// 实际合成成功的字符数
    pub fn synthesized_chars(&self, chunks: &[Chunk]) -> usize {
        chunks
            .iter()
            .filter(|c| !self.failed_chunks.iter().any(|f| f.chunk_index == c.index))
            .map(Chunk::char_count)
            .sum()
    }
}

/// 组装中的片段；静音的采样率要等整章结束才能确定
enum Segment {
    Audio(Vec<f32>),
    Silence,
}

/// 章节组装器
pub struct ChapterAssembler {
    config: AssemblerConfig,
    codec: Arc<dyn AudioCodecPort>,
    storage: Arc<dyn ArtifactStoragePort>,
}

impl ChapterAssembler {
    pub fn new(
        config: AssemblerConfig,
        codec: Arc<dyn AudioCodecPort>,
        storage: Arc<dyn ArtifactStoragePort>,
    ) -> Self {
        Self {
            config,
            codec,
            storage,
        }
    }

    /// 静音时长对应的采样数
    fn silence_samples(&self, sample_rate: u32) -> usize {
        let nanos = self.config.silence.as_nanos() * sample_rate as u128 / 1_000_000_000;
        nanos as usize
    }

    /// 组装一个章节并写入产物
    ///
    /// 分块必须来自同一章节，按序号排列
    pub async fn assemble(
        &self,
        synthesizer: &Synthesizer,
        chapter_index: usize,
        chunks: &[Chunk],
    ) -> Result<AssemblyReport, ChapterError> {
        let mut segments = Vec::with_capacity(chunks.len());
        let mut failed_chunks = Vec::new();
        let mut sample_rate: Option<u32> = None;

        for chunk in chunks {
            match synthesizer.synthesize(chunk).await {
                Ok(result) => {
                    match sample_rate {
                        None => sample_rate = Some(result.sample_rate),
                        Some(expected) if expected != result.sample_rate => {
                            return Err(ChapterError::RateMismatch {
                                chapter_index,
                                chunk_index: chunk.index,
                                expected,
                                found: result.sample_rate,
                            });
                        }
                        Some(_) => {}
                    }
                    segments.push(Segment::Audio(result.samples));
                }
                Err(e) => {
                    tracing::warn!(
                        chapter_index = chapter_index,
                        chunk_index = chunk.index,
                        policy = self.config.policy.as_str(),
                        error = %e,
                        "Chunk synthesis failed"
                    );
                    if self.config.policy == FailurePolicy::AbortChapter {
                        return Err(ChapterError::Aborted(e));
                    }
                    segments.push(Segment::Silence);
                    failed_chunks.push(e);
                }
            }
        }

        let sample_rate = sample_rate.unwrap_or(self.config.fallback_sample_rate);
        let silence_len = self.silence_samples(sample_rate);

        let total: usize = segments
            .iter()
            .map(|s| match s {
                Segment::Audio(samples) => samples.len(),
                Segment::Silence => silence_len,
            })
            .sum();
        let mut pcm = Vec::with_capacity(total);
        for segment in segments {
            match segment {
                Segment::Audio(samples) => pcm.extend_from_slice(&samples),
                Segment::Silence => pcm.resize(pcm.len() + silence_len, 0.0),
            }
        }

        let encoded = self.codec.encode(&pcm, sample_rate)?;
        let path = self.storage.write_atomic(chapter_index, &encoded).await?;
        let artifact = ChapterArtifact::new(chapter_index, path, sample_rate, pcm.len() as u64);

        tracing::debug!(
            chapter_index = chapter_index,
            chunks = chunks.len(),
            failed = failed_chunks.len(),
            samples = pcm.len(),
            sample_rate = sample_rate,
            "Chapter assembled"
        );

        Ok(AssemblyReport {
            artifact,
            chunk_count: chunks.len(),
            failed_chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{EngineOutput, EngineRequest, TtsEnginePort, TtsError};
    use crate::domain::chunker;
    use crate::domain::voice::{LanguageCode, VoiceId};
    use crate::infrastructure::adapters::codec::WavCodec;
    use crate::infrastructure::adapters::storage::FileArtifactStorage;
    use crate::infrastructure::adapters::tts::{FakeTtsClient, FakeTtsClientConfig};
    use async_trait::async_trait;
    use tempfile::tempdir;

    /// 按文本内容返回指定采样率
    struct RateByText;

    #[async_trait]
    impl TtsEnginePort for RateByText {
        async fn synthesize(&self, request: EngineRequest) -> Result<EngineOutput, TtsError> {
            let sample_rate = if request.text.contains("hi-fi") { 48000 } else { 24000 };
            Ok(EngineOutput {
                samples: vec![0.1; 100],
                sample_rate,
            })
        }
    }

    fn chunks(text: &str, max_chars: usize) -> Vec<Chunk> {
        chunker::split(
            text,
            max_chars,
            &VoiceId::new("af_sky").unwrap(),
            &LanguageCode::new("en-us").unwrap(),
        )
        .unwrap()
    }

    async fn assembler(dir: &std::path::Path, config: AssemblerConfig) -> ChapterAssembler {
        let storage = FileArtifactStorage::new(dir, "wav").await.unwrap();
        ChapterAssembler::new(config, Arc::new(WavCodec::new()), Arc::new(storage))
    }

    fn fake(fail_markers: &[&str]) -> Arc<FakeTtsClient> {
        Arc::new(FakeTtsClient::new(FakeTtsClientConfig {
            samples_per_char: 10,
            fail_markers: fail_markers.iter().map(|m| m.to_string()).collect(),
            ..Default::default()
        }))
    }

    #[tokio::test]
    async fn test_duration_is_sum_of_chunk_durations() {
        let temp_dir = tempdir().unwrap();
        let assembler = assembler(temp_dir.path(), AssemblerConfig::default()).await;
        let engine = fake(&[]);
        let chunks = chunks("First one. Second two. Third three.", 12);
        assert_eq!(chunks.len(), 3);

        let report = assembler
            .assemble(&Synthesizer::new(engine.clone()), 0, &chunks)
            .await
            .unwrap();

        let expected: usize = chunks.iter().map(|c| engine.expected_samples(&c.text)).sum();
        assert_eq!(report.artifact.sample_count, expected as u64);
        assert_eq!(
            report.artifact.duration(),
            Duration::from_nanos(expected as u64 * 1_000_000_000 / 24000)
        );
        assert!(report.failed_chunks.is_empty());

        // 产物落盘且头部与报告一致
        let bytes = std::fs::read(report.artifact.path()).unwrap();
        let info = WavCodec::new().probe(&bytes).unwrap();
        assert_eq!(info.frame_count, expected as u64);
        assert_eq!(info.sample_rate, 24000);
    }

    #[tokio::test]
    async fn test_failed_middle_chunk_becomes_silence() {
        let temp_dir = tempdir().unwrap();
        let config = AssemblerConfig {
            silence: Duration::from_millis(250),
            ..Default::default()
        };
        let assembler = assembler(temp_dir.path(), config).await;
        let engine = fake(&["BROKEN"]);
        let chunks = chunks("Alpha one. BROKEN two. Gamma three.", 12);
        assert_eq!(chunks.len(), 3);

        let report = assembler
            .assemble(&Synthesizer::new(engine.clone()), 4, &chunks)
            .await
            .unwrap();

        let dur1 = engine.expected_samples(&chunks[0].text);
        let dur3 = engine.expected_samples(&chunks[2].text);
        let silence = 24000 / 4;
        assert_eq!(report.artifact.sample_count, (dur1 + silence + dur3) as u64);
        assert_eq!(report.failed_chunks.len(), 1);
        assert_eq!(report.failed_chunks[0].chunk_index, 1);
        assert_eq!(report.chunk_count, 3);
        assert_eq!(
            report.synthesized_chars(&chunks),
            chunks[0].char_count() + chunks[2].char_count()
        );

        // 静音段确实是零值
        let decoded = WavCodec::new()
            .decode(&std::fs::read(report.artifact.path()).unwrap())
            .unwrap();
        assert!(decoded.samples[dur1..dur1 + silence].iter().all(|s| *s == 0.0));
    }

    #[tokio::test]
    async fn test_abort_policy_fails_chapter_without_artifact() {
        let temp_dir = tempdir().unwrap();
        let config = AssemblerConfig {
            policy: FailurePolicy::AbortChapter,
            ..Default::default()
        };
        let assembler = assembler(temp_dir.path(), config).await;
        let chunks = chunks("Alpha one. BROKEN two. Gamma three.", 12);

        let err = assembler
            .assemble(&Synthesizer::new(fake(&["BROKEN"])), 0, &chunks)
            .await
            .unwrap_err();

        assert!(matches!(err, ChapterError::Aborted(ref e) if e.chunk_index == 1));
        assert!(!temp_dir.path().join("chapter_0000.wav").exists());
    }

    #[tokio::test]
    async fn test_mixed_sample_rates_fail_chapter() {
        let temp_dir = tempdir().unwrap();
        let assembler = assembler(temp_dir.path(), AssemblerConfig::default()).await;
        let chunks = chunks("Plain start. Then hi-fi end.", 16);

        let err = assembler
            .assemble(&Synthesizer::new(Arc::new(RateByText)), 2, &chunks)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ChapterError::RateMismatch {
                chapter_index: 2,
                chunk_index: 1,
                expected: 24000,
                found: 48000
            }
        ));
        assert!(!temp_dir.path().join("chapter_0002.wav").exists());
    }

    #[tokio::test]
    async fn test_empty_chapter_writes_zero_duration_artifact() {
        let temp_dir = tempdir().unwrap();
        let assembler = assembler(temp_dir.path(), AssemblerConfig::default()).await;
        let engine = fake(&[]);

        let report = assembler
            .assemble(&Synthesizer::new(engine.clone()), 1, &[])
            .await
            .unwrap();

        assert_eq!(report.artifact.duration(), Duration::ZERO);
        assert_eq!(report.artifact.sample_rate, 24000);
        assert_eq!(engine.call_count(), 0);
        assert!(std::fs::metadata(report.artifact.path()).unwrap().len() > 0);
    }

    #[tokio::test]
    async fn test_all_chunks_failed_uses_fallback_rate() {
        let temp_dir = tempdir().unwrap();
        let config = AssemblerConfig {
            silence: Duration::from_millis(100),
            fallback_sample_rate: 16000,
            ..Default::default()
        };
        let assembler = assembler(temp_dir.path(), config).await;
        let chunks = chunks("BROKEN.", 100);

        let report = assembler
            .assemble(&Synthesizer::new(fake(&["BROKEN"])), 0, &chunks)
            .await
            .unwrap();

        assert_eq!(report.artifact.sample_rate, 16000);
        assert_eq!(report.artifact.sample_count, 1600);
    }

    #[test]
    fn test_policy_serde_names() {
        let policy: FailurePolicy = serde_json::from_str("\"abort-chapter\"").unwrap();
        assert_eq!(policy, FailurePolicy::AbortChapter);
        assert_eq!(
            serde_json::to_string(&FailurePolicy::SkipWithSilence).unwrap(),
            "\"skip-with-silence\""
        );
    }
}
