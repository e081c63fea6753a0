//! File Storage - 文件系统章节产物存储
//!
//! 实现 ArtifactStoragePort trait
//!
//! 目录布局：
//! - `chapter_0000.wav` ... 完整产物，按章节序号命名
//! - `.chapter_0000.wav.<uuid>.partial` 写入中的临时文件

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::application::ports::{ArtifactStoragePort, StorageError};

/// 产物文件名前缀
const ARTIFACT_PREFIX: &str = "chapter_";

/// 临时文件后缀
const PARTIAL_SUFFIX: &str = ".partial";

fn io_err(e: std::io::Error) -> StorageError {
    StorageError::IoError(e.to_string())
}

/// 文件系统产物存储
pub struct FileArtifactStorage {
    /// 工作目录
    base_dir: PathBuf,
    /// 产物扩展名
    extension: &'static str,
}

impl FileArtifactStorage {
    /// 创建新的文件存储
    pub async fn new(
        base_dir: impl AsRef<Path>,
        extension: &'static str,
    ) -> Result<Self, StorageError> {
        // 确保目录存在
        fs::create_dir_all(base_dir.as_ref()).await.map_err(io_err)?;

        // 产物路径必须是绝对路径：concat 列表按列表所在目录解析相对路径
        let base_dir = std::path::absolute(base_dir.as_ref()).map_err(io_err)?;

        Ok(Self {
            base_dir,
            extension,
        })
    }

    /// 产物文件名
    pub fn artifact_file_name(&self, chapter_index: usize) -> String {
        format!("{}{:04}.{}", ARTIFACT_PREFIX, chapter_index, self.extension)
    }

    fn partial_path(&self, chapter_index: usize) -> PathBuf {
        self.base_dir.join(format!(
            ".{}.{}{}",
            self.artifact_file_name(chapter_index),
            Uuid::new_v4().simple(),
            PARTIAL_SUFFIX
        ))
    }

    async fn write_partial(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
        let mut file = fs::File::create(path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactStoragePort for FileArtifactStorage {
    fn work_dir(&self) -> &Path {
        &self.base_dir
    }

    fn artifact_path(&self, chapter_index: usize) -> PathBuf {
        self.base_dir.join(self.artifact_file_name(chapter_index))
    }

    async fn write_atomic(&self, chapter_index: usize, data: &[u8]) -> Result<PathBuf, StorageError> {
        let partial = self.partial_path(chapter_index);
        let final_path = self.artifact_path(chapter_index);

        if let Err(e) = self.write_partial(&partial, data).await {
            let _ = fs::remove_file(&partial).await;
            return Err(io_err(e));
        }

        // 同目录 rename 是原子的：读者要么看不到文件，要么看到完整文件
        if let Err(e) = fs::rename(&partial, &final_path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(io_err(e));
        }

        tracing::debug!(
            chapter_index = chapter_index,
            path = %final_path.display(),
            size = data.len(),
            "Artifact written"
        );

        Ok(final_path)
    }

    async fn cleanup_partial(&self) -> Result<u64, StorageError> {
        let mut removed = 0u64;
        let mut entries = fs::read_dir(&self.base_dir).await.map_err(io_err)?;

        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') && name.ends_with(PARTIAL_SUFFIX) {
                fs::remove_file(entry.path()).await.map_err(io_err)?;
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(
                dir = %self.base_dir.display(),
                removed = removed,
                "Removed partial artifacts from an interrupted run"
            );
        }

        Ok(removed)
    }
}
