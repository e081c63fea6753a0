//! Packager - 封装章节产物
//!
//! 根据章节产物时长计算起始偏移，再交给外部封装工具生成带章节标记的容器。
//! 无论成功与否都不删除章节产物。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::{MuxJob, MuxTrack, MuxerPort, PackagingError};
use crate::domain::book::{Book, ChapterArtifact};

/// 章节起始偏移：offset[0] = 0，offset[i] = offset[i-1] + duration[i-1]
pub fn compute_offsets(artifacts: &[ChapterArtifact]) -> Vec<Duration> {
    artifacts
        .iter()
        .scan(Duration::ZERO, |start, artifact| {
            let offset = *start;
            *start += artifact.duration();
            Some(offset)
        })
        .collect()
}

/// 从书名生成安全的文件名主干
pub fn output_stem(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim_matches('_');
    if stem.is_empty() {
        "audiobook".to_string()
    } else {
        stem.to_string()
    }
}

/// 封装器
pub struct Packager {
    muxer: Arc<dyn MuxerPort>,
    output_dir: PathBuf,
    extension: &'static str,
}

impl Packager {
    pub fn new(muxer: Arc<dyn MuxerPort>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            muxer,
            output_dir: output_dir.into(),
            extension: "m4b",
        }
    }

    /// 最终容器路径
    pub fn output_path(&self, book: &Book) -> PathBuf {
        self.output_dir.join(format!(
            "{}.{}",
            output_stem(book.title().as_str()),
            self.extension
        ))
    }

    /// 构建封装任务；产物必须按书籍顺序排列
    pub fn build_job(&self, book: &Book, artifacts: &[ChapterArtifact]) -> MuxJob {
        let offsets = compute_offsets(artifacts);
        let tracks = artifacts
            .iter()
            .zip(offsets)
            .map(|(artifact, start)| MuxTrack {
                path: artifact.path.clone(),
                title: book
                    .chapter(artifact.chapter_index)
                    .map(|c| c.title().to_string())
                    .unwrap_or_else(|| format!("Chapter {}", artifact.chapter_index + 1)),
                start,
                duration: artifact.duration(),
            })
            .collect();

        MuxJob {
            tracks,
            title: book.title().to_string(),
            author: book.author().to_string(),
            cover: book.cover().map(Path::to_path_buf),
            output: self.output_path(book),
        }
    }

    /// 封装整本书
    pub async fn package(
        &self,
        book: &Book,
        artifacts: &[ChapterArtifact],
    ) -> Result<PathBuf, PackagingError> {
        if artifacts.is_empty() {
            return Err(PackagingError::NoArtifacts);
        }

        if !self.muxer.is_available().await {
            return Err(PackagingError::ToolUnavailable(
                "muxing tool did not respond to version probe".to_string(),
            ));
        }

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| PackagingError::IoError(e.to_string()))?;

        let job = self.build_job(book, artifacts);
        let total = job
            .tracks
            .last()
            .map(MuxTrack::end)
            .unwrap_or(Duration::ZERO);

        tracing::info!(
            chapters = job.tracks.len(),
            total_secs = total.as_secs(),
            output = %job.output.display(),
            "Packaging audiobook"
        );

        let path = self.muxer.mux(&job).await?;

        tracing::info!(output = %path.display(), "Audiobook packaged");
        Ok(path)
    }
}
