//! Audio Codec Port - 章节音频编解码抽象
//!
//! 章节产物统一为 16 位单声道 PCM WAV

use thiserror::Error;

/// 编解码错误
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// 音频信息（只读头部，不解码）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// 每声道采样数（按头部声明计算）
    pub frame_count: u64,
    /// 音频数据在文件中的起始偏移
    pub data_offset: u64,
    /// 头部声明的音频数据字节数
    pub data_len: u64,
}

impl AudioInfo {
    /// 文件完整时应有的最小字节数
    pub fn expected_len(&self) -> u64 {
        self.data_offset + self.data_len
    }
}

/// 解码后的单声道 PCM
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Audio Codec Port
pub trait AudioCodecPort: Send + Sync {
    /// 把单声道 f32 采样编码为容器字节
    fn encode(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, CodecError>;

    /// 解码为单声道 f32 采样（多声道会被混缩）
    fn decode(&self, data: &[u8]) -> Result<DecodedAudio, CodecError>;

    /// 读取头部信息（只需要文件开头的若干字节）
    fn probe(&self, data: &[u8]) -> Result<AudioInfo, CodecError>;

    /// 产物文件扩展名
    fn extension(&self) -> &'static str;
}
