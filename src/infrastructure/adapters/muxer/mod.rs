//! Muxer Adapter - 容器封装工具

mod ffmpeg_muxer;

pub use ffmpeg_muxer::{concat_list, escape_metadata, ffmetadata, FfmpegMuxer, FfmpegMuxerConfig};
