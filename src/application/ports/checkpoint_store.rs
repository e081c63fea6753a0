//! Checkpoint Store Port - 断点续跑
//!
//! 产物文件是否存在即为唯一的事实来源，不维护单独的账本

use async_trait::async_trait;

use super::StorageError;
use crate::domain::book::ChapterArtifact;

/// Checkpoint Store Port
#[async_trait]
pub trait CheckpointStorePort: Send + Sync {
    /// 章节是否已有完整产物（临时文件不算）
    async fn is_done(&self, chapter_index: usize) -> bool;

    /// 确认章节完成；产物必须已经原子写入到规范路径
    async fn mark_done(
        &self,
        chapter_index: usize,
        artifact: &ChapterArtifact,
    ) -> Result<(), StorageError>;

    /// 从持久化存储重新推导章节产物
    async fn artifact_for(&self, chapter_index: usize)
        -> Result<Option<ChapterArtifact>, StorageError>;
}
