//! Book Context - Errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookError {
    #[error("无效的标题: {0}")]
    InvalidTitle(String),

    #[error("章节不存在: {0}")]
    ChapterNotFound(usize),

    #[error("音频产物与章节不匹配: 章节 {expected}, 产物 {found}")]
    ArtifactMismatch { expected: usize, found: usize },
}
