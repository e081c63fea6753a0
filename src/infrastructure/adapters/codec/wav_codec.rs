//! WAV Codec - 基于 symphonia 的 WAV 编解码
//!
//! 支持：
//! - WAV 头部解析（计算采样数/时长，不解码）
//! - WAV → 单声道 f32 PCM（多声道混缩）
//! - 单声道 f32 PCM → 16 位 PCM WAV

use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::application::ports::{AudioCodecPort, AudioInfo, CodecError, DecodedAudio};

/// 标准 PCM WAV 头长度
pub const WAV_HEADER_LEN: usize = 44;

const BITS_PER_SAMPLE: u16 = 16;

/// WAV 编解码器
#[derive(Debug, Default, Clone, Copy)]
pub struct WavCodec;

impl WavCodec {
    pub fn new() -> Self {
        Self
    }

    /// 解析 WAV 文件头
    fn parse_wav_header(&self, data: &[u8]) -> Result<WavHeader, CodecError> {
        if data.len() < 12 {
            return Err(CodecError::InvalidInput("WAV data too short".to_string()));
        }

        // 验证 RIFF 头
        if &data[0..4] != b"RIFF" {
            return Err(CodecError::InvalidInput(
                "Invalid WAV: missing RIFF header".to_string(),
            ));
        }

        // 验证 WAVE 标识
        if &data[8..12] != b"WAVE" {
            return Err(CodecError::InvalidInput(
                "Invalid WAV: missing WAVE identifier".to_string(),
            ));
        }

        let mut pos = 12;
        let mut fmt_chunk: Option<FmtChunk> = None;
        let mut data_chunk: Option<(usize, usize)> = None;

        while pos + 8 <= data.len() {
            let chunk_id = &data[pos..pos + 4];
            let chunk_size =
                u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]])
                    as usize;

            match chunk_id {
                b"fmt " => {
                    if chunk_size < 16 || pos + 8 + 16 > data.len() {
                        return Err(CodecError::InvalidInput(
                            "Invalid fmt chunk size".to_string(),
                        ));
                    }
                    let fmt_data = &data[pos + 8..pos + 8 + 16];
                    fmt_chunk = Some(FmtChunk {
                        num_channels: u16::from_le_bytes([fmt_data[2], fmt_data[3]]),
                        sample_rate: u32::from_le_bytes([
                            fmt_data[4],
                            fmt_data[5],
                            fmt_data[6],
                            fmt_data[7],
                        ]),
                        bits_per_sample: u16::from_le_bytes([fmt_data[14], fmt_data[15]]),
                    });
                }
                b"data" => {
                    data_chunk = Some((pos + 8, chunk_size));
                    break;
                }
                _ => {}
            }

            pos += 8 + chunk_size;
            // 对齐到偶数字节
            if chunk_size % 2 != 0 {
                pos += 1;
            }
        }

        let fmt = fmt_chunk.ok_or_else(|| {
            CodecError::InvalidInput("Invalid WAV: missing fmt chunk".to_string())
        })?;

        let (data_start, data_size) = data_chunk.ok_or_else(|| {
            CodecError::InvalidInput("Invalid WAV: missing data chunk".to_string())
        })?;

        Ok(WavHeader {
            fmt,
            data_start,
            data_size,
        })
    }
}

#[derive(Debug)]
struct WavHeader {
    fmt: FmtChunk,
    data_start: usize,
    /// 头部声明的 data chunk 大小（可能大于实际可用字节）
    data_size: usize,
}

#[derive(Debug)]
struct FmtChunk {
    num_channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
}

impl AudioCodecPort for WavCodec {
    /// 将单声道 f32 样本编码为 16 位 PCM WAV
    fn encode(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, CodecError> {
        if sample_rate == 0 {
            return Err(CodecError::EncodingError(
                "Sample rate cannot be 0".to_string(),
            ));
        }

        let num_channels: u16 = 1;
        let bytes_per_sample = (BITS_PER_SAMPLE / 8) as u32;
        let byte_rate = sample_rate * num_channels as u32 * bytes_per_sample;
        let block_align = num_channels * (BITS_PER_SAMPLE / 8);

        let data_size = samples.len() as u64 * bytes_per_sample as u64;
        if data_size + 36 > u32::MAX as u64 {
            return Err(CodecError::EncodingError(format!(
                "Audio too long for WAV: {} samples",
                samples.len()
            )));
        }
        let data_size = data_size as u32;
        let file_size = 36 + data_size;

        let mut wav = Vec::with_capacity(WAV_HEADER_LEN + data_size as usize);

        // RIFF header
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&file_size.to_le_bytes());
        wav.extend_from_slice(b"WAVE");

        // fmt chunk
        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&16u32.to_le_bytes()); // chunk size
        wav.extend_from_slice(&1u16.to_le_bytes()); // PCM format
        wav.extend_from_slice(&num_channels.to_le_bytes());
        wav.extend_from_slice(&sample_rate.to_le_bytes());
        wav.extend_from_slice(&byte_rate.to_le_bytes());
        wav.extend_from_slice(&block_align.to_le_bytes());
        wav.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

        // data chunk
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_size.to_le_bytes());

        for &sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            wav.extend_from_slice(&((clamped * 32767.0) as i16).to_le_bytes());
        }

        Ok(wav)
    }

    /// 使用 symphonia 解码 WAV 获取单声道 PCM 数据
    fn decode(&self, data: &[u8]) -> Result<DecodedAudio, CodecError> {
        let cursor = Cursor::new(data.to_vec());
        let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

        let mut hint = Hint::new();
        hint.with_extension("wav");

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| CodecError::DecodingError(format!("Probe failed: {}", e)))?;

        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| CodecError::DecodingError("No audio track found".to_string()))?;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| CodecError::DecodingError("Unknown sample rate".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| CodecError::DecodingError(format!("Decoder creation failed: {}", e)))?;

        let track_id = track.id;
        let mut samples: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(symphonia::core::errors::Error::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    return Err(CodecError::DecodingError(format!(
                        "Packet read error: {}",
                        e
                    )));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!("Decode error (skipping packet): {}", e);
                    continue;
                }
            };

            let spec = *decoded.spec();
            let num_frames = decoded.frames();
            let channels = spec.channels.count().max(1);
            let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            let interleaved = &sample_buf.samples()[..num_frames * channels];

            if channels == 1 {
                samples.extend_from_slice(interleaved);
            } else {
                // 混缩为单声道
                samples.extend(
                    interleaved
                        .chunks_exact(channels)
                        .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                );
            }
        }

        Ok(DecodedAudio {
            samples,
            sample_rate,
        })
    }

    fn probe(&self, data: &[u8]) -> Result<AudioInfo, CodecError> {
        let header = self.parse_wav_header(data)?;

        if header.fmt.sample_rate == 0 {
            return Err(CodecError::InvalidInput(
                "Invalid WAV: zero sample rate".to_string(),
            ));
        }

        let bytes_per_frame =
            (header.fmt.bits_per_sample as usize / 8) * header.fmt.num_channels as usize;
        if bytes_per_frame == 0 {
            return Err(CodecError::InvalidInput(
                "Invalid WAV: zero frame size".to_string(),
            ));
        }

        Ok(AudioInfo {
            sample_rate: header.fmt.sample_rate,
            channels: header.fmt.num_channels,
            bits_per_sample: header.fmt.bits_per_sample,
            frame_count: (header.data_size / bytes_per_frame) as u64,
            data_offset: header.data_start as u64,
            data_len: header.data_size as u64,
        })
    }

    fn extension(&self) -> &'static str {
        "wav"
    }
}
