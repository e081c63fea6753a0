//! Book Context - Entities

use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::voice::{LanguageCode, VoiceId};

/// 章节
///
/// 不变量:
/// - index 从 0 开始，在 Book 内唯一且稳定
/// - 文本可以为空（例如标题页）
/// - 只在合成完成后挂接音频产物，其余字段不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    index: usize,
    title: String,
    text: String,
    char_count: usize,
    #[serde(skip)]
    artifact: Option<ChapterArtifact>,
}

impl Chapter {
    pub(super) fn new(index: usize, title: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let char_count = text.chars().count();
        let title = title.into();
        let title = if title.trim().is_empty() {
            format!("Chapter {}", index + 1)
        } else {
            title.trim().to_string()
        };
        Self {
            index,
            title,
            text,
            char_count,
            artifact: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn char_count(&self) -> usize {
        self.char_count
    }

    /// 是否有可朗读的内容
    pub fn is_narratable(&self) -> bool {
        !self.text.trim().is_empty()
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    pub fn artifact(&self) -> Option<&ChapterArtifact> {
        self.artifact.as_ref()
    }

    pub(super) fn set_artifact(&mut self, artifact: ChapterArtifact) {
        self.artifact = Some(artifact);
    }
}

/// 文本分块 - 一次 TTS 请求的单位
///
/// 不变量:
/// - `span` 是章节文本中的字节区间，`text` 与该区间内容完全一致
/// - 相邻分块之间只隔着空白
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 分块在章节内的序号
    pub index: usize,
    pub text: String,
    pub span: Range<usize>,
    pub voice: VoiceId,
    pub language: LanguageCode,
}

impl Chunk {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// 章节音频产物
///
/// 写入后不可变；时长由采样数和采样率推导
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterArtifact {
    pub chapter_index: usize,
    pub path: PathBuf,
    pub sample_rate: u32,
    pub sample_count: u64,
}

impl ChapterArtifact {
    pub fn new(chapter_index: usize, path: PathBuf, sample_rate: u32, sample_count: u64) -> Self {
        Self {
            chapter_index,
            path,
            sample_rate,
            sample_count,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 产物时长（纳秒精度，整数运算，保证偏移量可精确相加）
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let nanos = self.sample_count as u128 * 1_000_000_000 / self.sample_rate as u128;
        Duration::from_nanos(nanos as u64)
    }
}
