//! Narrator - 电子书转章节化有声书
//!
//! 架构设计: DDD + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Book Context: 书籍、章节、分块、章节音频产物
//! - Voice Context: 音色目录条目
//! - Chunker: 章节文本分块
//!
//! 应用层 (application/):
//! - Ports: 端口定义（TtsEngine, AudioCodec, ArtifactStorage, CheckpointStore, Muxer, ProgressReporter）
//! - 流水线: Synthesizer → ChapterAssembler → Packager，由 PipelineOrchestrator 驱动
//!
//! 基础设施层 (infrastructure/):
//! - Adapters: TTS Client, WAV Codec, 文件存储与断点, FFmpeg Muxer, 书籍清单
//! - Events: 进度事件发布

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
