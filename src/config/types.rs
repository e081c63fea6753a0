//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::application::assembler::{AssemblerConfig, FailurePolicy};
use crate::domain::chunker::DEFAULT_MAX_CHARS;
use crate::domain::voice::{Gender, LanguageCode, Voice, VoiceError, VoiceId};

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// TTS 引擎配置
    #[serde(default)]
    pub tts: TtsConfig,

    /// 分块配置
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// 章节组装配置
    #[serde(default)]
    pub assembly: AssemblyConfig,

    /// 存储配置
    #[serde(default)]
    pub storage: StorageConfig,

    /// 封装配置
    #[serde(default)]
    pub package: PackageConfig,

    /// 朗读配置
    #[serde(default)]
    pub narration: NarrationConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// TTS 引擎类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsBackend {
    /// 外部 HTTP 服务
    #[default]
    Http,
    /// 本地确定性引擎（演练用）
    Fake,
}

/// TTS 引擎配置
#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    #[serde(default)]
    pub backend: TtsBackend,

    /// TTS 服务基础 URL
    #[serde(default = "default_tts_url")]
    pub url: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_tts_timeout")]
    pub timeout_secs: u64,

    /// 引擎实例数，1 表示顺序处理章节
    #[serde(default = "default_instances")]
    pub instances: usize,

    /// 音色 ID
    #[serde(default = "default_voice")]
    pub voice: String,

    /// 语言代码
    #[serde(default = "default_language")]
    pub language: String,

    /// 音色显示名称
    #[serde(default)]
    pub voice_name: Option<String>,

    #[serde(default)]
    pub voice_gender: Option<Gender>,
}

fn default_tts_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_tts_timeout() -> u64 {
    120
}

fn default_instances() -> usize {
    1
}

fn default_voice() -> String {
    "af_sky".to_string()
}

fn default_language() -> String {
    "en-us".to_string()
}

impl TtsConfig {
    /// 构建音色目录条目
    pub fn to_voice(&self) -> Result<Voice, VoiceError> {
        let voice = Voice::new(
            VoiceId::new(self.voice.as_str())?,
            LanguageCode::new(self.language.as_str())?,
        );
        Ok(match &self.voice_name {
            Some(name) => voice.with_display(name.as_str(), self.voice_gender),
            None => voice,
        })
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            backend: TtsBackend::default(),
            url: default_tts_url(),
            timeout_secs: default_tts_timeout(),
            instances: default_instances(),
            voice: default_voice(),
            language: default_language(),
            voice_name: None,
            voice_gender: None,
        }
    }
}

/// 分块配置
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkingConfig {
    /// 单块最大字符数
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_CHARS
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

/// 章节组装配置
#[derive(Debug, Clone, Deserialize)]
pub struct AssemblyConfig {
    /// 可选: skip-with-silence, abort-chapter
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// 替换失败分块的静音时长（毫秒）
    #[serde(default = "default_silence_ms")]
    pub silence_ms: u64,

    /// 整章都失败时静音使用的采样率
    #[serde(default = "default_fallback_sample_rate")]
    pub fallback_sample_rate: u32,
}

fn default_silence_ms() -> u64 {
    500
}

fn default_fallback_sample_rate() -> u32 {
    24000
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            silence_ms: default_silence_ms(),
            fallback_sample_rate: default_fallback_sample_rate(),
        }
    }
}

impl AssemblyConfig {
    pub fn to_assembler_config(&self) -> AssemblerConfig {
        AssemblerConfig {
            policy: self.failure_policy,
            silence: Duration::from_millis(self.silence_ms),
            fallback_sample_rate: self.fallback_sample_rate,
        }
    }
}

/// 存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 章节产物目录（同时是断点记录）
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// 最终容器输出目录
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("data/work")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/output")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            output_dir: default_output_dir(),
        }
    }
}

/// 封装配置
#[derive(Debug, Clone, Deserialize)]
pub struct PackageConfig {
    /// 是否在合成完成后封装 M4B
    #[serde(default = "default_package_enabled")]
    pub enabled: bool,

    /// ffmpeg 可执行文件
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// AAC 码率
    #[serde(default = "default_bitrate")]
    pub bitrate: String,
}

fn default_package_enabled() -> bool {
    true
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_bitrate() -> String {
    "64k".to_string() // 语音足够
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            enabled: default_package_enabled(),
            ffmpeg_path: default_ffmpeg_path(),
            bitrate: default_bitrate(),
        }
    }
}

/// 朗读配置
#[derive(Debug, Clone, Deserialize)]
pub struct NarrationConfig {
    /// 第一个可朗读章节前读出 "书名 by 作者"
    #[serde(default = "default_intro")]
    pub intro: bool,
}

fn default_intro() -> bool {
    true
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            intro: default_intro(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
