//! Codec Adapter - 章节音频编解码

mod wav_codec;

pub use wav_codec::{WavCodec, WAV_HEADER_LEN};
