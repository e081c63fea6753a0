//! FFmpeg Muxer - 通过 ffmpeg 子进程生成 M4B
//!
//! 一次调用完成：
//! - concat demuxer 按顺序拼接章节 WAV
//! - FFMETADATA1 文件提供书名、作者和章节表（毫秒时间基）
//! - AAC 编码，封面作为 attached_pic
//!
//! 先写入临时文件，成功后 rename 为最终路径；章节 WAV 从不删除。

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::fs;
use tokio::process::Command;

use crate::application::ports::{MuxJob, MuxTrack, MuxerPort, PackagingError};

/// FFmpeg Muxer 配置
#[derive(Debug, Clone)]
pub struct FfmpegMuxerConfig {
    /// ffmpeg 可执行文件
    pub ffmpeg_path: PathBuf,
    /// AAC 码率，例如 "64k"
    pub bitrate: String,
}

impl Default for FfmpegMuxerConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            bitrate: "64k".to_string(),
        }
    }
}

/// FFmpeg Muxer
pub struct FfmpegMuxer {
    config: FfmpegMuxerConfig,
}

/// 一次封装用到的临时文件
struct ScratchFiles {
    concat_list: PathBuf,
    metadata: PathBuf,
    output: PathBuf,
}

impl ScratchFiles {
    fn for_output(output: &Path) -> Self {
        let dir = output.parent().unwrap_or_else(|| Path::new("."));
        let name = output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audiobook.m4b".to_string());
        Self {
            concat_list: dir.join(format!(".{}.concat.txt", name)),
            metadata: dir.join(format!(".{}.ffmetadata.txt", name)),
            output: dir.join(format!(".{}.partial", name)),
        }
    }

    async fn remove(&self) {
        for path in [&self.concat_list, &self.metadata, &self.output] {
            let _ = fs::remove_file(path).await;
        }
    }
}

/// 相对路径按当前目录补全
fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// concat demuxer 的单引号转义
fn quote_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', "'\\''")
}

/// FFMETADATA 值转义：`=`、`;`、`#`、`\` 和换行前加反斜杠
pub fn escape_metadata(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '=' | ';' | '#' | '\\' | '\n') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// 生成 concat 列表
///
/// ffmpeg 按列表文件所在目录解析相对条目，因此条目一律写成绝对路径
pub fn concat_list(tracks: &[MuxTrack]) -> String {
    tracks
        .iter()
        .map(|t| format!("file '{}'\n", quote_concat_path(&absolute_path(&t.path))))
        .collect()
}

/// 生成 FFMETADATA1 文件内容；零时长章节不进入章节表
pub fn ffmetadata(job: &MuxJob) -> String {
    let mut out = String::from(";FFMETADATA1\n");
    out.push_str(&format!("title={}\n", escape_metadata(&job.title)));
    out.push_str(&format!("artist={}\n", escape_metadata(&job.author)));
    out.push_str(&format!("album={}\n", escape_metadata(&job.title)));
    out.push_str("genre=Audiobook\n");

    for track in job.tracks.iter().filter(|t| !t.duration.is_zero()) {
        out.push_str("\n[CHAPTER]\nTIMEBASE=1/1000\n");
        out.push_str(&format!("START={}\n", track.start.as_millis()));
        out.push_str(&format!("END={}\n", track.end().as_millis()));
        out.push_str(&format!("title={}\n", escape_metadata(&track.title)));
    }
    out
}

impl FfmpegMuxer {
    pub fn new(config: FfmpegMuxerConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(FfmpegMuxerConfig::default())
    }

    fn build_args(
        &self,
        concat_list: &Path,
        metadata: &Path,
        cover: Option<&Path>,
        output: &Path,
    ) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "concat".into(),
            "-safe".into(),
            "0".into(),
            "-i".into(),
            concat_list.to_string_lossy().into_owned(),
            "-i".into(),
            metadata.to_string_lossy().into_owned(),
        ];
        if let Some(cover) = cover {
            args.push("-i".into());
            args.push(cover.to_string_lossy().into_owned());
        }

        args.extend(
            ["-map", "0:a", "-map_metadata", "1", "-map_chapters", "1"]
                .iter()
                .map(|s| s.to_string()),
        );
        if cover.is_some() {
            args.extend(
                ["-map", "2:v", "-c:v", "copy", "-disposition:v:0", "attached_pic"]
                    .iter()
                    .map(|s| s.to_string()),
            );
        }

        args.extend(["-c:a".to_string(), "aac".to_string()]);
        args.extend(["-b:a".to_string(), self.config.bitrate.clone()]);
        args.extend(["-f".to_string(), "mp4".to_string()]);
        args.push(output.to_string_lossy().into_owned());
        args
    }

    async fn write_scratch(&self, job: &MuxJob, scratch: &ScratchFiles) -> Result<(), PackagingError> {
        let io = |e: std::io::Error| PackagingError::IoError(e.to_string());
        fs::write(&scratch.concat_list, concat_list(&job.tracks))
            .await
            .map_err(io)?;
        fs::write(&scratch.metadata, ffmetadata(job))
            .await
            .map_err(io)?;
        Ok(())
    }

    async fn run_ffmpeg(&self, args: &[String]) -> Result<(), PackagingError> {
        tracing::debug!(
            ffmpeg = %self.config.ffmpeg_path.display(),
            args = ?args,
            "Running ffmpeg"
        );

        let output = Command::new(&self.config.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => PackagingError::ToolUnavailable(format!(
                    "{} not found",
                    self.config.ffmpeg_path.display()
                )),
                _ => PackagingError::IoError(e.to_string()),
            })?;

        if !output.status.success() {
            return Err(PackagingError::ToolFailed {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MuxerPort for FfmpegMuxer {
    async fn is_available(&self) -> bool {
        let status = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        matches!(status, Ok(s) if s.success())
    }

    async fn mux(&self, job: &MuxJob) -> Result<PathBuf, PackagingError> {
        if job.tracks.is_empty() {
            return Err(PackagingError::NoArtifacts);
        }

        let scratch = ScratchFiles::for_output(&job.output);
        let result = async {
            self.write_scratch(job, &scratch).await?;
            let cover = job.cover.as_deref().map(absolute_path);
            let args = self.build_args(
                &scratch.concat_list,
                &scratch.metadata,
                cover.as_deref(),
                &scratch.output,
            );
            self.run_ffmpeg(&args).await?;
            fs::rename(&scratch.output, &job.output)
                .await
                .map_err(|e| PackagingError::IoError(e.to_string()))
        }
        .await;

        scratch.remove().await;
        result?;

        tracing::info!(
            output = %job.output.display(),
            chapters = job.tracks.len(),
            "ffmpeg muxing completed"
        );
        Ok(job.output.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn job(output: PathBuf) -> MuxJob {
        MuxJob {
            tracks: vec![
                MuxTrack {
                    path: PathBuf::from("/work/chapter_0000.wav"),
                    title: "Prologue".to_string(),
                    start: Duration::ZERO,
                    duration: Duration::from_millis(1500),
                },
                MuxTrack {
                    path: PathBuf::from("/work/chapter_0001.wav"),
                    title: "Blank".to_string(),
                    start: Duration::from_millis(1500),
                    duration: Duration::ZERO,
                },
                MuxTrack {
                    path: PathBuf::from("/work/it's/chapter_0002.wav"),
                    title: "One; Two = Three".to_string(),
                    start: Duration::from_millis(1500),
                    duration: Duration::from_millis(2250),
                },
            ],
            title: "A Book".to_string(),
            author: "Some Author".to_string(),
            cover: None,
            output,
        }
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let list = concat_list(&job(PathBuf::from("out.m4b")).tracks);
        let lines: Vec<&str> = list.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "file '/work/chapter_0000.wav'");
        assert_eq!(lines[2], "file '/work/it'\\''s/chapter_0002.wav'");
    }

    #[test]
    fn test_relative_artifacts_resolve_outside_list_dir() {
        // 产物在 data/work，列表写在 data/output
        let output = PathBuf::from("data/output/Book.m4b");
        let mut job = job(output.clone());
        job.tracks[0].path = PathBuf::from("data/work/Book/chapter_0000.wav");

        let list_dir = ScratchFiles::for_output(&output)
            .concat_list
            .parent()
            .unwrap()
            .to_path_buf();
        assert_eq!(list_dir, PathBuf::from("data/output"));

        let list = concat_list(&job.tracks);
        let entry = list
            .lines()
            .next()
            .unwrap()
            .strip_prefix("file '")
            .unwrap()
            .strip_suffix('\'')
            .unwrap();
        let entry = Path::new(entry);

        assert!(entry.is_absolute());
        let expected = std::env::current_dir()
            .unwrap()
            .join("data/work/Book/chapter_0000.wav");
        assert_eq!(list_dir.join(entry), expected);
    }

    #[test]
    fn test_ffmetadata_chapters() {
        let meta = ffmetadata(&job(PathBuf::from("out.m4b")));

        assert!(meta.starts_with(";FFMETADATA1\n"));
        assert!(meta.contains("title=A Book\n"));
        assert!(meta.contains("artist=Some Author\n"));
        // 零时长章节被省略
        assert_eq!(meta.matches("[CHAPTER]").count(), 2);
        assert!(meta.contains("START=0\nEND=1500\ntitle=Prologue\n"));
        assert!(meta.contains("START=1500\nEND=3750\ntitle=One\\; Two \\= Three\n"));
    }

    #[test]
    fn test_build_args_with_cover() {
        let muxer = FfmpegMuxer::with_defaults();
        let args = muxer.build_args(
            Path::new("list.txt"),
            Path::new("meta.txt"),
            Some(Path::new("cover.jpg")),
            Path::new("out.partial"),
        );

        let joined = args.join(" ");
        assert!(joined.contains("-f concat -safe 0 -i list.txt -i meta.txt -i cover.jpg"));
        assert!(joined.contains("-map_chapters 1"));
        assert!(joined.contains("-disposition:v:0 attached_pic"));
        assert!(joined.contains("-c:a aac -b:a 64k"));
        assert_eq!(args.last().map(String::as_str), Some("out.partial"));
    }

    #[test]
    fn test_build_args_without_cover() {
        let args = FfmpegMuxer::with_defaults().build_args(
            Path::new("list.txt"),
            Path::new("meta.txt"),
            None,
            Path::new("out.partial"),
        );
        assert!(!args.iter().any(|a| a == "attached_pic"));
        assert!(!args.iter().any(|a| a == "2:v"));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let temp_dir = tempdir().unwrap();
        let muxer = FfmpegMuxer::new(FfmpegMuxerConfig {
            ffmpeg_path: PathBuf::from("/nonexistent/bin/ffmpeg"),
            ..Default::default()
        });

        assert!(!muxer.is_available().await);

        let output = temp_dir.path().join("book.m4b");
        let err = muxer.mux(&job(output.clone())).await.unwrap_err();
        assert!(matches!(err, PackagingError::ToolUnavailable(_)));

        // 临时文件已清理，没有生成输出
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }
}
