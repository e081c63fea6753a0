//! JSON Book Source - 书籍清单加载
//!
//! 文档解析器的输出约定为 JSON 清单：
//!
//! ```json
//! {
//!   "title": "Dune",
//!   "author": "Frank Herbert",
//!   "cover": "cover.jpg",
//!   "chapters": [{ "title": "Prologue", "text": "..." }]
//! }
//! ```
//!
//! 封面的相对路径按清单所在目录解析。

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::book::{Author, Book, Title};

/// 清单加载错误
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read manifest {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Invalid manifest: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
struct BookManifest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    cover: Option<PathBuf>,
    chapters: Vec<ChapterManifest>,
}

#[derive(Debug, Deserialize)]
struct ChapterManifest {
    #[serde(default)]
    title: String,
    #[serde(default)]
    text: String,
}

/// 从 JSON 字符串构建书籍
pub fn parse_manifest(json: &str, base_dir: Option<&Path>) -> Result<Book, SourceError> {
    let manifest: BookManifest =
        serde_json::from_str(json).map_err(|e| SourceError::Parse(e.to_string()))?;

    let title = match manifest.title.as_deref().map(Title::new) {
        Some(Ok(title)) => title,
        Some(Err(reason)) => {
            tracing::warn!(reason = reason, "Invalid book title, using fallback");
            Title::untitled()
        }
        None => Title::untitled(),
    };
    let author = manifest
        .author
        .map(Author::new)
        .unwrap_or_else(Author::unknown);

    let chapters = manifest.chapters.into_iter().map(|c| (c.title, c.text));
    let mut book = Book::new(title, author, chapters);

    if let Some(cover) = manifest.cover {
        let cover = match base_dir {
            Some(dir) if cover.is_relative() => dir.join(cover),
            _ => cover,
        };
        book = book.with_cover(cover);
    }

    Ok(book)
}

/// 读取清单文件
pub async fn load_manifest(path: impl AsRef<Path>) -> Result<Book, SourceError> {
    let path = path.as_ref();
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SourceError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    let book = parse_manifest(&json, path.parent())?;

    if let Some(cover) = book.cover() {
        if !cover.exists() {
            tracing::warn!(cover = %cover.display(), "Cover image not found");
        }
    }

    tracing::debug!(
        path = %path.display(),
        chapters = book.chapter_count(),
        "Book manifest loaded"
    );
    Ok(book)
}
