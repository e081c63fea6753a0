//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（TtsEngine、ArtifactStorage、CheckpointStore、Muxer 等）
//! - synthesizer / assembler / packager / orchestrator: 合成流水线的各个阶段
//! - progress: 吞吐与剩余时间统计
//! - error: 应用层错误定义

pub mod assembler;
pub mod error;
pub mod orchestrator;
pub mod packager;
pub mod ports;
pub mod progress;
pub mod synthesizer;

pub use assembler::{AssemblerConfig, AssemblyReport, ChapterAssembler, FailurePolicy};
pub use error::{ChapterError, PipelineError, SynthesisError};
pub use orchestrator::{ChapterOutcome, OrchestratorConfig, PipelineOrchestrator, PipelineReport};
pub use packager::{compute_offsets, Packager};
pub use progress::{format_duration, ProgressTracker};
pub use synthesizer::{SynthesisResult, Synthesizer};
