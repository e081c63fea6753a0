//! Pipeline Orchestrator - 整本书的合成流程
//!
//! 流程：
//! 1. 清理中断运行留下的临时文件
//! 2. 按书籍顺序检查断点，已有产物的章节直接跳过
//! 3. 其余章节：分块 → 逐块合成 → 组装写盘 → 记录断点
//! 4. 全部章节处理完后封装容器
//!
//! 单个章节失败不会中断其余章节；只有全部章节失败或封装失败才算整书失败。
//! 配置多个引擎实例时，章节在引擎池上并行处理，但分块顺序和封装顺序不变。

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};

use crate::application::assembler::ChapterAssembler;
use crate::application::error::{ChapterError, PipelineError, SynthesisError};
use crate::application::packager::{compute_offsets, Packager};
use crate::application::ports::{
    ArtifactStoragePort, BookState, ChapterState, CheckpointStorePort, NoopReporter,
    PipelineEvent, ProgressEvent, ProgressReporterPort,
};
use crate::application::progress::{chars_per_sec, format_duration, ProgressTracker};
use crate::application::synthesizer::Synthesizer;
use crate::domain::book::{Book, ChapterArtifact};
use crate::domain::chunker;
use crate::domain::voice::Voice;

/// 编排器配置
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// 单块最大字符数
    pub max_chars: usize,
    /// 所有分块使用同一音色
    pub voice: Voice,
    /// 是否在第一个可朗读章节前加开场白
    pub intro: bool,
}

/// 单个章节的最终结果
#[derive(Debug, Clone)]
pub struct ChapterOutcome {
    pub index: usize,
    pub title: String,
    pub state: ChapterState,
    pub failed_chunks: usize,
    pub duration: Duration,
    pub error: Option<String>,
}

/// 一次运行的汇总
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub state: BookState,
    /// 按书籍顺序
    pub chapters: Vec<ChapterOutcome>,
    /// 已封装章节的起始偏移
    pub offsets: Vec<Duration>,
    pub container: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl PipelineReport {
    pub fn failed_chapters(&self) -> Vec<&ChapterOutcome> {
        self.chapters
            .iter()
            .filter(|c| c.state == ChapterState::Failed)
            .collect()
    }

    pub fn count(&self, state: ChapterState) -> usize {
        self.chapters.iter().filter(|c| c.state == state).count()
    }

    pub fn failed_chunk_count(&self) -> usize {
        self.chapters.iter().map(|c| c.failed_chunks).sum()
    }
}

/// 待合成的章节
struct ChapterJob {
    index: usize,
    /// 原文字符数（用于进度）
    chars: usize,
    /// 实际朗读文本（可能带开场白）
    narration: String,
}

/// 一个章节的处理结果
struct ChapterRun {
    index: usize,
    state: ChapterState,
    artifact: Option<ChapterArtifact>,
    chars: usize,
    synthesized_chars: usize,
    failed_chunks: Vec<SynthesisError>,
    elapsed: Duration,
    error: Option<String>,
}

impl ChapterRun {
    fn failed(job: &ChapterJob, elapsed: Duration, error: String) -> Self {
        Self {
            index: job.index,
            state: ChapterState::Failed,
            artifact: None,
            chars: job.chars,
            synthesized_chars: 0,
            failed_chunks: Vec::new(),
            elapsed,
            error: Some(error),
        }
    }
}

/// 章节任务共享的依赖（并行模式下跨任务共享）
struct ChapterContext {
    config: OrchestratorConfig,
    assembler: Arc<ChapterAssembler>,
    checkpoints: Arc<dyn CheckpointStorePort>,
    reporter: Arc<dyn ProgressReporterPort>,
}

impl ChapterContext {
    /// 合成一个章节并记录断点
    async fn run_chapter(&self, synthesizer: &Synthesizer, job: ChapterJob) -> ChapterRun {
        let started = Instant::now();

        let chunks = match chunker::split(
            &job.narration,
            self.config.max_chars,
            self.config.voice.id(),
            self.config.voice.language(),
        ) {
            Ok(chunks) => chunks,
            Err(e) => {
                let e = ChapterError::from(e);
                return ChapterRun::failed(&job, started.elapsed(), e.to_string());
            }
        };

        self.reporter.report(PipelineEvent::ChapterStateChanged {
            chapter_index: job.index,
            state: ChapterState::Synthesizing,
            chunk_count: Some(chunks.len()),
        });
        tracing::debug!(
            chapter_index = job.index,
            chunks = chunks.len(),
            "Synthesizing chapter"
        );

        let report = match self.assembler.assemble(synthesizer, job.index, &chunks).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(chapter_index = job.index, error = %e, "Chapter failed");
                return ChapterRun::failed(&job, started.elapsed(), e.to_string());
            }
        };

        if let Err(e) = self.checkpoints.mark_done(job.index, &report.artifact).await {
            let e = ChapterError::from(e);
            tracing::error!(chapter_index = job.index, error = %e, "Chapter failed");
            return ChapterRun::failed(&job, started.elapsed(), e.to_string());
        }

        ChapterRun {
            index: job.index,
            state: ChapterState::Assembled,
            synthesized_chars: report.synthesized_chars(&chunks),
            artifact: Some(report.artifact),
            chars: job.chars,
            failed_chunks: report.failed_chunks,
            elapsed: started.elapsed(),
            error: None,
        }
    }
}

/// 借出的引擎，drop 时放回池中
struct EngineSlot {
    synthesizer: Synthesizer,
    pool: mpsc::Sender<Synthesizer>,
}

impl Drop for EngineSlot {
    fn drop(&mut self) {
        // 池容量等于引擎数，归还不会满
        if self.pool.try_send(self.synthesizer.clone()).is_err() {
            tracing::warn!("Engine pool closed, engine not returned");
        }
    }
}

/// 流水线编排器
pub struct PipelineOrchestrator {
    context: Arc<ChapterContext>,
    synthesizers: Vec<Synthesizer>,
    storage: Arc<dyn ArtifactStoragePort>,
    packager: Option<Packager>,
}

impl PipelineOrchestrator {
    /// `synthesizers` 每项对应一个独立引擎实例；多于一个时启用章节并行
    pub fn new(
        config: OrchestratorConfig,
        synthesizers: Vec<Synthesizer>,
        assembler: ChapterAssembler,
        checkpoints: Arc<dyn CheckpointStorePort>,
        storage: Arc<dyn ArtifactStoragePort>,
    ) -> Self {
        Self {
            context: Arc::new(ChapterContext {
                config,
                assembler: Arc::new(assembler),
                checkpoints,
                reporter: Arc::new(NoopReporter),
            }),
            synthesizers,
            storage,
            packager: None,
        }
    }

    pub fn with_packager(mut self, packager: Packager) -> Self {
        self.packager = Some(packager);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporterPort>) -> Self {
        self.context = Arc::new(ChapterContext {
            config: self.context.config.clone(),
            assembler: self.context.assembler.clone(),
            checkpoints: self.context.checkpoints.clone(),
            reporter,
        });
        self
    }

    fn set_state(&self, state: BookState) {
        tracing::info!(state = state.as_str(), "Book state changed");
        self.context
            .reporter
            .report(PipelineEvent::BookStateChanged { state });
    }

    /// 处理整本书
    pub async fn run(&self, book: &mut Book) -> Result<PipelineReport, PipelineError> {
        if self.synthesizers.is_empty() {
            return Err(PipelineError::internal("no synthesis engine configured"));
        }

        let started_at = Utc::now();
        self.storage.cleanup_partial().await?;
        self.set_state(BookState::Running);

        tracing::info!(
            title = %book.title(),
            author = %book.author(),
            chapters = book.chapter_count(),
            total_chars = book.total_chars(),
            total_words = book.total_words(),
            voice = %self.context.config.voice,
            engines = self.synthesizers.len(),
            "Starting audiobook synthesis"
        );

        let mut tracker = ProgressTracker::new(book.total_chars());
        let mut runs: Vec<Option<ChapterRun>> = (0..book.chapter_count()).map(|_| None).collect();
        let mut pending = Vec::new();

        // 断点检查：已有产物的章节不再合成
        for chapter in book.chapters() {
            let index = chapter.index();
            match self.resume(index).await {
                Some(artifact) => {
                    tracing::info!(chapter_index = index, "Artifact exists, skipping chapter");
                    let run = ChapterRun {
                        index,
                        state: ChapterState::Skipped,
                        artifact: Some(artifact),
                        chars: chapter.char_count(),
                        synthesized_chars: 0,
                        failed_chunks: Vec::new(),
                        elapsed: Duration::ZERO,
                        error: None,
                    };
                    tracker.record_skipped(run.chars);
                    self.emit_progress(&run, book.chapter_count(), &tracker);
                    runs[index] = Some(run);
                }
                None => {
                    self.context.reporter.report(PipelineEvent::ChapterStateChanged {
                        chapter_index: index,
                        state: ChapterState::Pending,
                        chunk_count: None,
                    });
                    pending.push(ChapterJob {
                        index,
                        chars: chapter.char_count(),
                        narration: book
                            .narration_text(index, self.context.config.intro)?
                            .into_owned(),
                    });
                }
            }
        }

        if !pending.is_empty() {
            tracker.start_synthesis();
        }

        let total = book.chapter_count();
        if self.synthesizers.len() == 1 || pending.len() <= 1 {
            let synthesizer = &self.synthesizers[0];
            for job in pending {
                let run = self.context.run_chapter(synthesizer, job).await;
                tracker.record_synthesized(run.chars);
                self.emit_progress(&run, total, &tracker);
                let index = run.index;
                runs[index] = Some(run);
            }
        } else {
            let mut results = self.run_pool(pending);
            while let Some(run) = results.recv().await {
                tracker.record_synthesized(run.chars);
                self.emit_progress(&run, total, &tracker);
                let index = run.index;
                runs[index] = Some(run);
            }
        }

        let mut outcomes = Vec::with_capacity(total);
        for (index, run) in runs.into_iter().enumerate() {
            let chapter_title = book
                .chapter(index)
                .map(|c| c.title().to_string())
                .unwrap_or_default();
            let run = match run {
                Some(run) => run,
                None => {
                    let job = ChapterJob {
                        index,
                        chars: 0,
                        narration: String::new(),
                    };
                    ChapterRun::failed(&job, Duration::ZERO, "chapter task did not finish".to_string())
                }
            };

            let duration = run
                .artifact
                .as_ref()
                .map(ChapterArtifact::duration)
                .unwrap_or(Duration::ZERO);
            if let Some(artifact) = run.artifact {
                book.attach_artifact(artifact)?;
            }
            outcomes.push(ChapterOutcome {
                index,
                title: chapter_title,
                state: run.state,
                failed_chunks: run.failed_chunks.len(),
                duration,
                error: run.error,
            });
        }

        let mut report = PipelineReport {
            state: BookState::Running,
            chapters: outcomes,
            offsets: Vec::new(),
            container: None,
            started_at,
            elapsed: tracker.elapsed(),
        };

        if total > 0 && report.count(ChapterState::Failed) == total {
            self.set_state(BookState::Failed);
            log_summary(&report);
            return Err(PipelineError::AllChaptersFailed(total));
        }

        let artifacts: Vec<ChapterArtifact> = book.artifacts().into_iter().cloned().collect();
        report.offsets = compute_offsets(&artifacts);

        match &self.packager {
            Some(packager) if !artifacts.is_empty() => {
                self.set_state(BookState::Packaging);
                match packager.package(book, &artifacts).await {
                    Ok(path) => report.container = Some(path),
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            work_dir = %self.storage.work_dir().display(),
                            "Packaging failed, chapter artifacts kept"
                        );
                        self.set_state(BookState::Failed);
                        log_summary(&report);
                        return Err(e.into());
                    }
                }
            }
            Some(_) => tracing::warn!("Book has no chapters, nothing to package"),
            None => tracing::info!("Packaging disabled"),
        }

        report.state = BookState::Complete;
        report.elapsed = tracker.elapsed();
        self.set_state(BookState::Complete);
        log_summary(&report);
        Ok(report)
    }

    /// 查询断点；产物损坏时视为未完成并重新合成
    async fn resume(&self, index: usize) -> Option<ChapterArtifact> {
        match self.context.checkpoints.artifact_for(index).await {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::warn!(
                    chapter_index = index,
                    error = %e,
                    "Existing artifact is unusable, synthesizing again"
                );
                None
            }
        }
    }

    /// 在引擎池上并行处理章节，按完成顺序返回结果
    fn run_pool(&self, jobs: Vec<ChapterJob>) -> mpsc::Receiver<ChapterRun> {
        let (slot_tx, slot_rx) = mpsc::channel(self.synthesizers.len());
        for synthesizer in &self.synthesizers {
            // 容量等于引擎数，不会阻塞
            let _ = slot_tx.try_send(synthesizer.clone());
        }
        let slot_rx = Arc::new(Mutex::new(slot_rx));
        let (result_tx, result_rx) = mpsc::channel(jobs.len().max(1));

        for job in jobs {
            let context = self.context.clone();
            let slot_tx = slot_tx.clone();
            let slot_rx = slot_rx.clone();
            let result_tx = result_tx.clone();

            tokio::spawn(async move {
                // 取一个空闲引擎，任务结束（包括 panic）时归还
                let synthesizer = slot_rx.lock().await.recv().await;
                let run = match synthesizer {
                    Some(synthesizer) => {
                        let slot = EngineSlot {
                            synthesizer,
                            pool: slot_tx,
                        };
                        context.run_chapter(&slot.synthesizer, job).await
                    }
                    None => ChapterRun::failed(&job, Duration::ZERO, "engine pool closed".to_string()),
                };
                let _ = result_tx.send(run).await;
            });
        }

        result_rx
    }

    fn emit_progress(&self, run: &ChapterRun, total_chapters: usize, tracker: &ProgressTracker) {
        let event = ProgressEvent {
            chapter_index: run.index,
            total_chapters,
            state: run.state,
            chars_processed: tracker.processed_chars(),
            total_chars: tracker.total_chars(),
            chapter_elapsed: run.elapsed,
            chars_per_sec: match run.state {
                ChapterState::Assembled => chars_per_sec(run.synthesized_chars, run.elapsed),
                _ => None,
            },
            failed_chunks: run.failed_chunks.len(),
            elapsed: tracker.elapsed(),
            estimated_remaining: tracker.estimated_remaining(),
        };

        tracing::info!(
            chapter_index = run.index,
            total_chapters = total_chapters,
            state = run.state.as_str(),
            chars_processed = event.chars_processed,
            total_chars = event.total_chars,
            chars_per_sec = ?event.chars_per_sec.map(|r| r.round()),
            failed_chunks = event.failed_chunks,
            elapsed = %format_duration(event.elapsed),
            eta = %event
                .estimated_remaining
                .map(format_duration)
                .unwrap_or_else(|| "unknown".to_string()),
            "Chapter finished"
        );

        self.context
            .reporter
            .report(PipelineEvent::ChapterProgress(event));
    }
}

fn log_summary(report: &PipelineReport) {
    for chapter in report.failed_chapters() {
        tracing::error!(
            chapter_index = chapter.index,
            title = %chapter.title,
            error = chapter.error.as_deref().unwrap_or("unknown"),
            "Chapter not synthesized"
        );
    }

    tracing::info!(
        state = report.state.as_str(),
        assembled = report.count(ChapterState::Assembled),
        skipped = report.count(ChapterState::Skipped),
        failed = report.count(ChapterState::Failed),
        failed_chunks = report.failed_chunk_count(),
        container = ?report.container,
        started_at = %report.started_at.to_rfc3339(),
        elapsed = %format_duration(report.elapsed),
        "Run summary"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::assembler::{AssemblerConfig, FailurePolicy};
    use crate::application::ports::{
        EngineOutput, EngineRequest, MuxJob, MuxerPort, PackagingError, TtsEnginePort, TtsError,
    };
    use crate::domain::book::{Author, Title};
    use crate::domain::voice::{LanguageCode, VoiceId};
    use crate::infrastructure::adapters::codec::WavCodec;
    use crate::infrastructure::adapters::storage::{FileArtifactStorage, FsCheckpointStore};
    use crate::infrastructure::adapters::tts::{FakeTtsClient, FakeTtsClientConfig};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex as StdMutex;
    use tempfile::tempdir;

    struct StubMuxer {
        fail: bool,
        jobs: StdMutex<Vec<MuxJob>>,
    }

    #[async_trait]
    impl MuxerPort for StubMuxer {
        async fn is_available(&self) -> bool {
            true
        }

        async fn mux(&self, job: &MuxJob) -> Result<PathBuf, PackagingError> {
            self.jobs.lock().unwrap().push(job.clone());
            if self.fail {
                return Err(PackagingError::ToolFailed {
                    status: Some(1),
                    stderr: "invalid data".to_string(),
                });
            }
            Ok(job.output.clone())
        }
    }

    #[derive(Default)]
    struct CollectingReporter(StdMutex<Vec<PipelineEvent>>);

    impl ProgressReporterPort for CollectingReporter {
        fn report(&self, event: PipelineEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn fake(fail_markers: &[&str]) -> Arc<FakeTtsClient> {
        Arc::new(FakeTtsClient::new(FakeTtsClientConfig {
            samples_per_char: 10,
            fail_markers: fail_markers.iter().map(|m| m.to_string()).collect(),
            ..Default::default()
        }))
    }

    /// 遇到 "boom" 时 panic 的引擎
    struct PanickingEngine(FakeTtsClient);

    #[async_trait]
    impl TtsEnginePort for PanickingEngine {
        async fn synthesize(&self, request: EngineRequest) -> Result<EngineOutput, TtsError> {
            if request.text.contains("boom") {
                panic!("engine crashed on {:?}", request.text);
            }
            self.0.synthesize(request).await
        }
    }

    fn book(chapters: &[(&str, &str)]) -> Book {
        Book::new(
            Title::new("Test Book").unwrap(),
            Author::new("Jane Doe"),
            chapters.iter().copied(),
        )
    }

    struct Harness {
        orchestrator: PipelineOrchestrator,
        muxer: Arc<StubMuxer>,
    }

    async fn harness(
        dir: &Path,
        engines: Vec<Arc<FakeTtsClient>>,
        policy: FailurePolicy,
        mux_fails: bool,
    ) -> Harness {
        let synthesizers = engines.into_iter().map(|e| Synthesizer::new(e)).collect();
        harness_with(dir, synthesizers, policy, mux_fails).await
    }

    async fn harness_with(
        dir: &Path,
        synthesizers: Vec<Synthesizer>,
        policy: FailurePolicy,
        mux_fails: bool,
    ) -> Harness {
        let codec = Arc::new(WavCodec::new());
        let storage = Arc::new(FileArtifactStorage::new(dir.join("work"), "wav").await.unwrap());
        let checkpoints = Arc::new(FsCheckpointStore::new(storage.clone(), codec.clone()));
        let assembler = ChapterAssembler::new(
            AssemblerConfig {
                policy,
                ..Default::default()
            },
            codec,
            storage.clone(),
        );
        let muxer = Arc::new(StubMuxer {
            fail: mux_fails,
            jobs: StdMutex::new(Vec::new()),
        });
        let config = OrchestratorConfig {
            max_chars: 100,
            voice: Voice::new(
                VoiceId::new("af_sky").unwrap(),
                LanguageCode::new("en-us").unwrap(),
            ),
            intro: false,
        };
        let orchestrator =
            PipelineOrchestrator::new(config, synthesizers, assembler, checkpoints, storage)
                .with_packager(Packager::new(muxer.clone(), dir.join("out")));
        Harness {
            orchestrator,
            muxer,
        }
    }

    #[tokio::test]
    async fn test_two_chapters_with_empty_one() {
        let temp_dir = tempdir().unwrap();
        let engine = fake(&[]);
        let h = harness(temp_dir.path(), vec![engine.clone()], FailurePolicy::default(), false).await;
        let mut book = book(&[("One", "Hello world."), ("Two", "")]);

        let report = h.orchestrator.run(&mut book).await.unwrap();

        assert_eq!(engine.call_count(), 1);
        assert_eq!(report.state, BookState::Complete);
        let dur1 = Duration::from_nanos(120 * 1_000_000_000 / 24000);
        assert_eq!(report.chapters[0].duration, dur1);
        assert_eq!(report.chapters[1].duration, Duration::ZERO);
        assert_eq!(report.offsets, vec![Duration::ZERO, dur1]);
        assert_eq!(
            report.container,
            Some(temp_dir.path().join("out").join("Test_Book.m4b"))
        );

        let jobs = h.muxer.jobs.lock().unwrap();
        assert_eq!(jobs[0].tracks.len(), 2);
        assert_eq!(jobs[0].tracks[1].start, dur1);
    }

    #[tokio::test]
    async fn test_second_run_skips_done_chapters() {
        let temp_dir = tempdir().unwrap();
        let engine = fake(&[]);
        let h = harness(temp_dir.path(), vec![engine.clone()], FailurePolicy::default(), false).await;
        let chapters = [("A", "First chapter text."), ("B", "Second one. It has two sentences.")];

        let first = h.orchestrator.run(&mut book(&chapters)).await.unwrap();
        let calls = engine.call_count();
        let bytes: Vec<Vec<u8>> = (0..2)
            .map(|i| std::fs::read(temp_dir.path().join(format!("work/chapter_{:04}.wav", i))).unwrap())
            .collect();

        let second = h.orchestrator.run(&mut book(&chapters)).await.unwrap();

        assert_eq!(engine.call_count(), calls);
        assert_eq!(second.offsets, first.offsets);
        assert_eq!(second.count(ChapterState::Skipped), 2);
        for (i, expected) in bytes.iter().enumerate() {
            let actual =
                std::fs::read(temp_dir.path().join(format!("work/chapter_{:04}.wav", i))).unwrap();
            assert_eq!(&actual, expected);
        }
    }

    #[tokio::test]
    async fn test_resume_matches_uninterrupted_run() {
        let chapters = [("A", "Alpha text."), ("B", "Beta text."), ("C", "Gamma text.")];

        // 第一次运行在 Beta 章节失败
        let interrupted = tempdir().unwrap();
        let h = harness(interrupted.path(), vec![fake(&["Beta"])], FailurePolicy::AbortChapter, false).await;
        let report = h.orchestrator.run(&mut book(&chapters)).await.unwrap();
        assert_eq!(report.failed_chapters().len(), 1);
        assert_eq!(report.failed_chapters()[0].index, 1);
        assert_eq!(report.offsets.len(), 2);

        // 恢复运行只合成缺失的章节
        let engine = fake(&[]);
        let h = harness(interrupted.path(), vec![engine.clone()], FailurePolicy::AbortChapter, false).await;
        let resumed = h.orchestrator.run(&mut book(&chapters)).await.unwrap();
        assert_eq!(engine.call_count(), 1);
        assert_eq!(resumed.count(ChapterState::Skipped), 2);
        assert_eq!(resumed.count(ChapterState::Assembled), 1);

        let clean = tempdir().unwrap();
        let h = harness(clean.path(), vec![fake(&[])], FailurePolicy::AbortChapter, false).await;
        let full = h.orchestrator.run(&mut book(&chapters)).await.unwrap();

        assert_eq!(resumed.offsets, full.offsets);
        for i in 0..3 {
            let name = format!("work/chapter_{:04}.wav", i);
            assert_eq!(
                std::fs::read(interrupted.path().join(&name)).unwrap(),
                std::fs::read(clean.path().join(&name)).unwrap()
            );
        }
    }

    #[tokio::test]
    async fn test_failed_chunk_keeps_chapter_assembled() {
        let temp_dir = tempdir().unwrap();
        let h = harness(temp_dir.path(), vec![fake(&["BROKEN"])], FailurePolicy::SkipWithSilence, false).await;
        let text = format!("{} BROKEN here. {}", "a".repeat(60) + ".", "b".repeat(60) + ".");

        let report = h.orchestrator.run(&mut book(&[("Only", text.as_str())])).await.unwrap();

        assert_eq!(report.chapters[0].state, ChapterState::Assembled);
        assert_eq!(report.failed_chunk_count(), 1);
    }

    #[tokio::test]
    async fn test_all_chapters_failed() {
        let temp_dir = tempdir().unwrap();
        let h = harness(temp_dir.path(), vec![fake(&["x"])], FailurePolicy::AbortChapter, false).await;

        let err = h
            .orchestrator
            .run(&mut book(&[("A", "x marks."), ("B", "x again.")]))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::AllChaptersFailed(2)));
        assert!(h.muxer.jobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_packaging_failure_keeps_artifacts() {
        let temp_dir = tempdir().unwrap();
        let h = harness(temp_dir.path(), vec![fake(&[])], FailurePolicy::default(), true).await;

        let err = h
            .orchestrator
            .run(&mut book(&[("A", "Some words."), ("B", "More words.")]))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Packaging(_)));
        assert!(temp_dir.path().join("work/chapter_0000.wav").exists());
        assert!(temp_dir.path().join("work/chapter_0001.wav").exists());
    }

    #[tokio::test]
    async fn test_engine_pool_preserves_order() {
        let chapters: Vec<(String, String)> = (0..6)
            .map(|i| (format!("Ch {}", i), format!("Chapter {} says {}.", i, "word ".repeat(i + 1))))
            .collect();
        let chapters: Vec<(&str, &str)> = chapters
            .iter()
            .map(|(t, s)| (t.as_str(), s.as_str()))
            .collect();

        let sequential = tempdir().unwrap();
        let h = harness(sequential.path(), vec![fake(&[])], FailurePolicy::default(), false).await;
        let expected = h.orchestrator.run(&mut book(&chapters)).await.unwrap();

        let pooled = tempdir().unwrap();
        let engines = vec![fake(&[]), fake(&[]), fake(&[])];
        let h = harness(pooled.path(), engines.clone(), FailurePolicy::default(), false).await;
        let report = h.orchestrator.run(&mut book(&chapters)).await.unwrap();

        assert_eq!(report.offsets, expected.offsets);
        assert_eq!(engines.iter().map(|e| e.call_count()).sum::<usize>(), 6);
        let jobs = h.muxer.jobs.lock().unwrap();
        let titles: Vec<&str> = jobs[0].tracks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Ch 0", "Ch 1", "Ch 2", "Ch 3", "Ch 4", "Ch 5"]);
    }

    #[tokio::test]
    async fn test_events_follow_state_machine() {
        let temp_dir = tempdir().unwrap();
        let reporter = Arc::new(CollectingReporter::default());
        let h = harness(temp_dir.path(), vec![fake(&[])], FailurePolicy::default(), false).await;
        let orchestrator = h.orchestrator.with_reporter(reporter.clone());

        orchestrator
            .run(&mut book(&[("A", "One."), ("B", "Two.")]))
            .await
            .unwrap();

        let events = reporter.0.lock().unwrap();
        let states: Vec<BookState> = events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::BookStateChanged { state } => Some(*state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![BookState::Running, BookState::Packaging, BookState::Complete]
        );

        let progress: Vec<&ProgressEvent> = events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::ChapterProgress(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(progress.len(), 2);
        assert_eq!(progress[1].chars_processed, 8);
        assert_eq!(progress[1].total_chars, 8);
        assert_eq!(progress[1].estimated_remaining.map(|d| d.as_secs()), Some(0));

        // 每个章节依次经过 Pending → Synthesizing → Assembled
        for index in 0..2 {
            let chapter_states: Vec<ChapterState> = events
                .iter()
                .filter_map(|e| match e {
                    PipelineEvent::ChapterStateChanged {
                        chapter_index,
                        state,
                        ..
                    } if *chapter_index == index => Some(*state),
                    PipelineEvent::ChapterProgress(p) if p.chapter_index == index => Some(p.state),
                    _ => None,
                })
                .collect();
            assert_eq!(
                chapter_states,
                vec![
                    ChapterState::Pending,
                    ChapterState::Synthesizing,
                    ChapterState::Assembled
                ]
            );
        }
        assert!(events.contains(&PipelineEvent::ChapterStateChanged {
            chapter_index: 0,
            state: ChapterState::Synthesizing,
            chunk_count: Some(1),
        }));
    }

    #[tokio::test]
    async fn test_skipped_chapter_is_never_pending() {
        let temp_dir = tempdir().unwrap();
        let chapters = [("A", "One."), ("B", "Two.")];
        let h = harness(temp_dir.path(), vec![fake(&[])], FailurePolicy::default(), false).await;
        h.orchestrator.run(&mut book(&chapters)).await.unwrap();

        let reporter = Arc::new(CollectingReporter::default());
        let h = harness(temp_dir.path(), vec![fake(&[])], FailurePolicy::default(), false).await;
        let orchestrator = h.orchestrator.with_reporter(reporter.clone());
        orchestrator.run(&mut book(&chapters)).await.unwrap();

        let events = reporter.0.lock().unwrap();
        assert!(!events
            .iter()
            .any(|e| matches!(e, PipelineEvent::ChapterStateChanged { .. })));
    }

    #[tokio::test]
    async fn test_reporter_replaced_while_context_shared() {
        let temp_dir = tempdir().unwrap();
        let reporter = Arc::new(CollectingReporter::default());
        let h = harness(temp_dir.path(), vec![fake(&[])], FailurePolicy::default(), false).await;

        let _shared = h.orchestrator.context.clone();
        let orchestrator = h.orchestrator.with_reporter(reporter.clone());
        orchestrator.run(&mut book(&[("A", "One.")])).await.unwrap();

        assert!(!reporter.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_engine_pool_survives_panicking_chapters() {
        let temp_dir = tempdir().unwrap();
        let synthesizers = (0..2)
            .map(|_| {
                Synthesizer::new(Arc::new(PanickingEngine(FakeTtsClient::new(
                    FakeTtsClientConfig {
                        samples_per_char: 10,
                        ..Default::default()
                    },
                ))))
            })
            .collect();
        let h = harness_with(temp_dir.path(), synthesizers, FailurePolicy::default(), false).await;
        let mut book = book(&[
            ("A", "boom one."),
            ("B", "boom two."),
            ("C", "Fine three."),
            ("D", "Fine four."),
        ]);

        // 两个引擎都在 panic 的任务里用过，之后的章节仍能拿到引擎
        let report = tokio::time::timeout(Duration::from_secs(10), h.orchestrator.run(&mut book))
            .await
            .expect("engine pool deadlocked")
            .unwrap();

        let states: Vec<ChapterState> = report.chapters.iter().map(|c| c.state).collect();
        assert_eq!(
            states,
            vec![
                ChapterState::Failed,
                ChapterState::Failed,
                ChapterState::Assembled,
                ChapterState::Assembled
            ]
        );
        assert_eq!(report.state, BookState::Complete);
    }

    #[tokio::test]
    async fn test_intro_prefixes_first_narratable_chapter() {
        let temp_dir = tempdir().unwrap();
        let engine = fake(&[]);
        let mut h = harness(temp_dir.path(), vec![engine.clone()], FailurePolicy::default(), false).await;
        Arc::get_mut(&mut h.orchestrator.context).unwrap().config.intro = true;

        let report = h
            .orchestrator
            .run(&mut book(&[("Cover", ""), ("One", "Hi.")]))
            .await
            .unwrap();

        // 开场白和正文合在一个分块里
        let expected = engine.expected_samples("Test Book by Jane Doe.\n\nHi.");
        assert_eq!(
            report.chapters[1].duration,
            Duration::from_nanos(expected as u64 * 1_000_000_000 / 24000)
        );
    }
}
