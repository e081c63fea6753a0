//! Narrator - 电子书转章节化有声书
//!
//! 用法: `narrator <book.json>`
//!
//! 书籍清单由外部文档解析器生成，配置见 narrator.toml / NARRATOR_* 环境变量

use std::path::PathBuf;
use std::sync::Arc;

use narrator::application::packager::output_stem;
use narrator::application::ports::{AudioCodecPort, TtsEnginePort};
use narrator::application::{
    ChapterAssembler, OrchestratorConfig, Packager, PipelineOrchestrator, Synthesizer,
};
use narrator::config::{load_config, print_config, TtsBackend};
use narrator::infrastructure::adapters::{
    load_manifest, FakeTtsClient, FakeTtsClientConfig, FfmpegMuxer, FfmpegMuxerConfig,
    FileArtifactStorage, FsCheckpointStore, HttpTtsClient, HttpTtsClientConfig, WavCodec,
};
use narrator::infrastructure::events::EventPublisher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!("{},narrator={}", config.log.level, config.log.level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();

    let manifest_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("Usage: narrator <book.json>"))?;

    tracing::info!("Narrator - 电子书转有声书");
    print_config(&config);

    let mut book = load_manifest(&manifest_path).await?;

    // 每本书独立的工作目录，产物文件即断点记录
    let work_dir = config
        .storage
        .work_dir
        .join(output_stem(book.title().as_str()));
    let codec = Arc::new(WavCodec::new());
    let storage = Arc::new(FileArtifactStorage::new(&work_dir, codec.extension()).await?);
    let checkpoints = Arc::new(FsCheckpointStore::new(storage.clone(), codec.clone()));

    // 创建 TTS 引擎，每个实例独立
    let mut synthesizers = Vec::with_capacity(config.tts.instances);
    for _ in 0..config.tts.instances {
        let engine: Arc<dyn TtsEnginePort> = match config.tts.backend {
            TtsBackend::Http => {
                let tts_config = HttpTtsClientConfig::new(config.tts.url.clone())
                    .with_timeout(config.tts.timeout_secs);
                Arc::new(HttpTtsClient::new(tts_config, codec.clone())?)
            }
            TtsBackend::Fake => Arc::new(FakeTtsClient::new(FakeTtsClientConfig::default())),
        };
        synthesizers.push(Synthesizer::new(engine));
    }

    if let Some(first) = synthesizers.first() {
        if !first.health_check().await {
            tracing::warn!(url = %config.tts.url, "TTS engine health check failed");
        }
    }

    let assembler = ChapterAssembler::new(
        config.assembly.to_assembler_config(),
        codec.clone(),
        storage.clone(),
    );

    let orchestrator_config = OrchestratorConfig {
        max_chars: config.chunking.max_chars,
        voice: config.tts.to_voice()?,
        intro: config.narration.intro,
    };

    // 进度事件
    let publisher = EventPublisher::new().arc();
    tokio::spawn(EventPublisher::log_events(publisher.subscribe()));

    let mut orchestrator = PipelineOrchestrator::new(
        orchestrator_config,
        synthesizers,
        assembler,
        checkpoints,
        storage.clone(),
    )
    .with_reporter(publisher.clone());

    if config.package.enabled {
        let muxer = FfmpegMuxer::new(FfmpegMuxerConfig {
            ffmpeg_path: config.package.ffmpeg_path.clone(),
            bitrate: config.package.bitrate.clone(),
        });
        orchestrator =
            orchestrator.with_packager(Packager::new(Arc::new(muxer), &config.storage.output_dir));
    }

    match orchestrator.run(&mut book).await {
        Ok(report) => {
            match &report.container {
                Some(path) => tracing::info!(output = %path.display(), "Audiobook ready"),
                None => tracing::info!(work_dir = %work_dir.display(), "Chapter audio ready"),
            }
            if !report.failed_chapters().is_empty() {
                tracing::warn!(
                    failed = report.failed_chapters().len(),
                    "Some chapters failed; run again to retry them"
                );
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                work_dir = %work_dir.display(),
                "Synthesis failed, chapter artifacts kept"
            );
            Err(e.into())
        }
    }
}
