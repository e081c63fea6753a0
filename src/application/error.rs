//! 应用层错误定义
//!
//! 错误按粒度分层：
//! - 分块级: `SynthesisError`，由章节组装器按策略吸收
//! - 章节级: `ChapterError`，记录后继续处理其余章节
//! - 书籍级: `PipelineError`，终止本次运行，但保留所有章节产物

use thiserror::Error;

use crate::application::ports::{CodecError, PackagingError, StorageError, TtsError};
use crate::domain::book::BookError;
use crate::domain::chunker::ChunkingError;

/// 单个分块合成失败
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Synthesis failed for chunk {chunk_index}: {reason}")]
pub struct SynthesisError {
    pub reason: String,
    pub chunk_index: usize,
}

impl SynthesisError {
    pub fn new(chunk_index: usize, reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            chunk_index,
        }
    }

    pub fn from_engine(chunk_index: usize, err: &TtsError) -> Self {
        Self::new(chunk_index, err.to_string())
    }
}

/// 章节级错误
#[derive(Debug, Error)]
pub enum ChapterError {
    #[error("Chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    /// abort-chapter 策略下的分块失败
    #[error("Chapter aborted: {0}")]
    Aborted(#[from] SynthesisError),

    #[error(
        "Sample rate mismatch in chapter {chapter_index} at chunk {chunk_index}: \
         expected {expected} Hz, got {found} Hz"
    )]
    RateMismatch {
        chapter_index: usize,
        chunk_index: usize,
        expected: u32,
        found: u32,
    },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Book error: {0}")]
    Book(#[from] BookError),
}

/// 书籍级错误
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Packaging failed: {0}")]
    Packaging(#[from] PackagingError),

    #[error("All {0} chapters failed")]
    AllChaptersFailed(usize),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Book error: {0}")]
    Book(#[from] BookError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
