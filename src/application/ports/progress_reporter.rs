//! Progress Reporter Port - 进度事件
//!
//! 纯上报副作用，不影响流水线控制流

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 章节状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterState {
    /// 等待处理
    Pending,
    /// 正在合成
    Synthesizing,
    /// 产物已就绪
    Assembled,
    /// 已有产物，跳过合成
    Skipped,
    /// 处理失败
    Failed,
}

impl ChapterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChapterState::Pending => "pending",
            ChapterState::Synthesizing => "synthesizing",
            ChapterState::Assembled => "assembled",
            ChapterState::Skipped => "skipped",
            ChapterState::Failed => "failed",
        }
    }
}

/// 书籍级状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookState {
    Running,
    Packaging,
    Complete,
    Failed,
}

impl BookState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookState::Running => "running",
            BookState::Packaging => "packaging",
            BookState::Complete => "complete",
            BookState::Failed => "failed",
        }
    }
}

/// 章节处理完成后的进度事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub chapter_index: usize,
    pub total_chapters: usize,
    pub state: ChapterState,
    /// 已处理字符数（含跳过的章节）
    pub chars_processed: usize,
    pub total_chars: usize,
    /// 本章合成耗时
    pub chapter_elapsed: Duration,
    /// 本章吞吐（字符/秒），跳过的章节为 None
    pub chars_per_sec: Option<f64>,
    /// 本章失败的分块数
    pub failed_chunks: usize,
    /// 运行总耗时
    pub elapsed: Duration,
    /// 预计剩余时间，尚无吞吐数据时为 None
    pub estimated_remaining: Option<Duration>,
}

/// 流水线事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum PipelineEvent {
    /// 书籍级状态变更
    BookStateChanged { state: BookState },
    /// 章节进入 Pending（排队）或 Synthesizing（已分块，开始合成）
    ChapterStateChanged {
        chapter_index: usize,
        state: ChapterState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chunk_count: Option<usize>,
    },
    /// 章节处理完成（无论成功与否）
    ChapterProgress(ProgressEvent),
}

/// Progress Reporter Port
pub trait ProgressReporterPort: Send + Sync {
    fn report(&self, event: PipelineEvent);
}

/// 丢弃所有事件
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporterPort for NoopReporter {
    fn report(&self, _event: PipelineEvent) {}
}
