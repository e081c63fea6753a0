//! Filesystem Checkpoint Store
//!
//! 实现 CheckpointStorePort：规范命名且非空的产物文件就是"已完成"的唯一依据。
//! 每次查询都直接读文件系统，不缓存任何状态。

use async_trait::async_trait;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncReadExt;

use crate::application::ports::{
    ArtifactStoragePort, AudioCodecPort, CheckpointStorePort, StorageError,
};
use crate::domain::book::ChapterArtifact;

/// 读取头部时的最大字节数
const HEADER_PROBE_BYTES: u64 = 4096;

/// 文件系统断点存储
pub struct FsCheckpointStore {
    storage: Arc<dyn ArtifactStoragePort>,
    codec: Arc<dyn AudioCodecPort>,
}

impl FsCheckpointStore {
    pub fn new(storage: Arc<dyn ArtifactStoragePort>, codec: Arc<dyn AudioCodecPort>) -> Self {
        Self { storage, codec }
    }
}

#[async_trait]
impl CheckpointStorePort for FsCheckpointStore {
    async fn is_done(&self, chapter_index: usize) -> bool {
        let path = self.storage.artifact_path(chapter_index);
        match fs::metadata(&path).await {
            Ok(metadata) => metadata.is_file() && metadata.len() > 0,
            Err(_) => false,
        }
    }

    async fn mark_done(
        &self,
        chapter_index: usize,
        artifact: &ChapterArtifact,
    ) -> Result<(), StorageError> {
        let expected = self.storage.artifact_path(chapter_index);
        if artifact.chapter_index != chapter_index || artifact.path != expected {
            return Err(StorageError::Corrupt {
                path: artifact.path.display().to_string(),
                reason: format!(
                    "artifact does not belong to chapter {} (expected {})",
                    chapter_index,
                    expected.display()
                ),
            });
        }

        if !self.is_done(chapter_index).await {
            return Err(StorageError::FileNotFound(expected.display().to_string()));
        }

        tracing::debug!(
            chapter_index = chapter_index,
            path = %expected.display(),
            "Checkpoint recorded"
        );
        Ok(())
    }

    async fn artifact_for(
        &self,
        chapter_index: usize,
    ) -> Result<Option<ChapterArtifact>, StorageError> {
        if !self.is_done(chapter_index).await {
            return Ok(None);
        }

        let path = self.storage.artifact_path(chapter_index);
        let file = fs::File::open(&path)
            .await
            .map_err(|e| StorageError::IoError(e.to_string()))?;
        let file_len = file
            .metadata()
            .await
            .map_err(|e| StorageError::IoError(e.to_string()))?
            .len();

        let mut head = Vec::with_capacity(HEADER_PROBE_BYTES as usize);
        file.take(HEADER_PROBE_BYTES)
            .read_to_end(&mut head)
            .await
            .map_err(|e| StorageError::IoError(e.to_string()))?;

        let corrupt = |reason: String| StorageError::Corrupt {
            path: path.display().to_string(),
            reason,
        };

        let info = self.codec.probe(&head).map_err(|e| corrupt(e.to_string()))?;
        if info.expected_len() > file_len {
            return Err(corrupt(format!(
                "truncated: header declares {} bytes, file has {}",
                info.expected_len(),
                file_len
            )));
        }
        if info.channels != 1 {
            return Err(corrupt(format!("expected mono, found {} channels", info.channels)));
        }

        Ok(Some(ChapterArtifact::new(
            chapter_index,
            path,
            info.sample_rate,
            info.frame_count,
        )))
    }
}
