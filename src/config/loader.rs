//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（narrator.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, TtsBackend};
use crate::application::synthesizer::{MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["narrator", "narrator.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `NARRATOR_`，层级分隔符 `__`）
/// 2. 配置文件（narrator.toml 或 narrator.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `NARRATOR_TTS__URL=http://tts-server:8000`
/// - `NARRATOR_TTS__INSTANCES=2`
/// - `NARRATOR_ASSEMBLY__FAILURE_POLICY=abort-chapter`
/// - `NARRATOR_STORAGE__WORK_DIR=/data/work`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("tts.backend", "http")?
        .set_default("tts.url", "http://localhost:8000")?
        .set_default("tts.timeout_secs", 120)?
        .set_default("tts.instances", 1)?
        .set_default("tts.voice", "af_sky")?
        .set_default("tts.language", "en-us")?
        .set_default("chunking.max_chars", 400)?
        .set_default("assembly.failure_policy", "skip-with-silence")?
        .set_default("assembly.silence_ms", 500)?
        .set_default("assembly.fallback_sample_rate", 24000)?
        .set_default("storage.work_dir", "data/work")?
        .set_default("storage.output_dir", "data/output")?
        .set_default("package.enabled", true)?
        .set_default("package.ffmpeg_path", "ffmpeg")?
        .set_default("package.bitrate", "64k")?
        .set_default("narration.intro", true)?
        .set_default("log.level", "info")?;

    // 2. 配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 例如: NARRATOR_TTS__URL=http://tts-server:8000
    // 注意: 环境变量名会被转换为小写
    builder = builder.add_source(
        Environment::with_prefix("NARRATOR")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

    if config.tts.backend == TtsBackend::Http && config.tts.url.trim().is_empty() {
        return invalid("TTS URL cannot be empty".to_string());
    }

    if config.tts.timeout_secs == 0 {
        return invalid("TTS timeout cannot be 0".to_string());
    }

    if config.tts.instances == 0 {
        return invalid("TTS instances must be at least 1".to_string());
    }

    if let Err(e) = config.tts.to_voice() {
        return invalid(format!("Invalid voice: {}", e));
    }

    if config.chunking.max_chars == 0 {
        return invalid("Chunk limit cannot be 0".to_string());
    }

    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&config.assembly.fallback_sample_rate) {
        return invalid(format!(
            "Fallback sample rate must be within {}..={} Hz",
            MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
        ));
    }

    if config.package.enabled && config.package.bitrate.trim().is_empty() {
        return invalid("Bitrate cannot be empty when packaging is enabled".to_string());
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Narrator Configuration ===");
    tracing::info!("TTS Backend: {:?}", config.tts.backend);
    if config.tts.backend == TtsBackend::Http {
        tracing::info!("TTS URL: {}", config.tts.url);
        tracing::info!("TTS Timeout: {}s", config.tts.timeout_secs);
    }
    tracing::info!("TTS Instances: {}", config.tts.instances);
    tracing::info!("Voice: {} ({})", config.tts.voice, config.tts.language);
    tracing::info!("Chunk Limit: {} chars", config.chunking.max_chars);
    tracing::info!(
        "Failure Policy: {} (silence {}ms)",
        config.assembly.failure_policy.as_str(),
        config.assembly.silence_ms
    );
    tracing::info!("Work Directory: {:?}", config.storage.work_dir);
    tracing::info!("Output Directory: {:?}", config.storage.output_dir);
    tracing::info!("Packaging Enabled: {}", config.package.enabled);
    if config.package.enabled {
        tracing::info!("FFmpeg: {:?} @ {}", config.package.ffmpeg_path, config.package.bitrate);
    }
    tracing::info!("Intro: {}", config.narration.intro);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("==============================");
}
