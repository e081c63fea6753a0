//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod artifact_storage;
mod audio_codec;
mod checkpoint_store;
mod muxer;
mod progress_reporter;
mod tts_engine;

pub use artifact_storage::{ArtifactStoragePort, StorageError};
pub use audio_codec::{AudioCodecPort, AudioInfo, CodecError, DecodedAudio};
pub use checkpoint_store::CheckpointStorePort;
pub use muxer::{MuxJob, MuxTrack, MuxerPort, PackagingError};
pub use progress_reporter::{
    BookState, ChapterState, NoopReporter, PipelineEvent, ProgressEvent, ProgressReporterPort,
};
pub use tts_engine::{EngineOutput, EngineRequest, TtsEnginePort, TtsError};
