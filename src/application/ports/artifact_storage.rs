//! Artifact Storage Port - 出站端口
//!
//! 章节音频产物的文件存储。写入必须是原子的：先写临时文件，成功后再 rename。

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Corrupt artifact {path}: {reason}")]
    Corrupt { path: String, reason: String },
}

/// Artifact Storage Port
#[async_trait]
pub trait ArtifactStoragePort: Send + Sync {
    /// 工作目录
    fn work_dir(&self) -> &Path;

    /// 章节产物的最终路径（由章节序号确定）
    fn artifact_path(&self, chapter_index: usize) -> PathBuf;

    /// 原子写入章节产物，返回最终路径
    async fn write_atomic(&self, chapter_index: usize, data: &[u8]) -> Result<PathBuf, StorageError>;

    /// 清理中断运行留下的临时文件，返回删除数量
    async fn cleanup_partial(&self) -> Result<u64, StorageError>;
}
