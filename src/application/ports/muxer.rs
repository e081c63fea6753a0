//! Muxer Port - 容器封装工具抽象
//!
//! 接收有序的章节音频和章节时间信息，输出一个带章节标记的容器文件

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// 封装错误
#[derive(Debug, Error)]
pub enum PackagingError {
    #[error("Muxing tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("Muxing tool exited with status {status:?}: {stderr}")]
    ToolFailed { status: Option<i32>, stderr: String },

    #[error("IO error: {0}")]
    IoError(String),

    #[error("No chapter artifacts to package")]
    NoArtifacts,
}

/// 单条章节轨道
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxTrack {
    pub path: PathBuf,
    pub title: String,
    /// 在容器中的起始偏移
    pub start: Duration,
    pub duration: Duration,
}

impl MuxTrack {
    pub fn end(&self) -> Duration {
        self.start + self.duration
    }
}

/// 一次封装任务
#[derive(Debug, Clone)]
pub struct MuxJob {
    /// 按书籍顺序排列
    pub tracks: Vec<MuxTrack>,
    pub title: String,
    pub author: String,
    pub cover: Option<PathBuf>,
    pub output: PathBuf,
}

/// Muxer Port
#[async_trait]
pub trait MuxerPort: Send + Sync {
    /// 检查封装工具是否可用
    async fn is_available(&self) -> bool;

    /// 执行封装，返回最终容器路径
    async fn mux(&self, job: &MuxJob) -> Result<PathBuf, PackagingError>;
}
