//! Book Context - Aggregate Root

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

use super::{Author, BookError, Chapter, ChapterArtifact, Title};

/// Book 聚合根
///
/// 不变量:
/// - 章节顺序与源文档一致且不可变
/// - 章节只属于一个 Book
/// - 章节唯一允许的修改是挂接音频产物
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    title: Title,
    author: Author,
    cover: Option<PathBuf>,
    chapters: Vec<Chapter>,
}

impl Book {
    /// 按源文档顺序创建书籍，章节 index 依次为 0..n
    pub fn new<I, T, S>(title: Title, author: Author, chapters: I) -> Self
    where
        I: IntoIterator<Item = (T, S)>,
        T: Into<String>,
        S: Into<String>,
    {
        let chapters = chapters
            .into_iter()
            .enumerate()
            .map(|(index, (title, text))| Chapter::new(index, title, text))
            .collect();

        Self {
            title,
            author,
            cover: None,
            chapters,
        }
    }

    pub fn with_cover(mut self, cover: impl Into<PathBuf>) -> Self {
        self.cover = Some(cover.into());
        self
    }

    // Getters
    pub fn title(&self) -> &Title {
        &self.title
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn cover(&self) -> Option<&Path> {
        self.cover.as_deref()
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    pub fn chapter(&self, index: usize) -> Option<&Chapter> {
        self.chapters.get(index)
    }

    pub fn total_chars(&self) -> usize {
        self.chapters.iter().map(Chapter::char_count).sum()
    }

    pub fn total_words(&self) -> usize {
        self.chapters.iter().map(Chapter::word_count).sum()
    }

    /// 开场白，例如 "Dune by Frank Herbert"
    pub fn intro(&self) -> String {
        format!("{} by {}", self.title, self.author)
    }

    /// 第一个有可朗读内容的章节
    pub fn first_narratable(&self) -> Option<usize> {
        self.chapters
            .iter()
            .find(|c| c.is_narratable())
            .map(Chapter::index)
    }

    /// 章节的朗读文本
    ///
    /// 启用开场白时，第一个可朗读章节前会加上 "书名 by 作者."
    pub fn narration_text(&self, index: usize, with_intro: bool) -> Result<Cow<'_, str>, BookError> {
        let chapter = self.chapter(index).ok_or(BookError::ChapterNotFound(index))?;
        if with_intro && self.first_narratable() == Some(index) {
            return Ok(Cow::Owned(format!("{}.\n\n{}", self.intro(), chapter.text())));
        }
        Ok(Cow::Borrowed(chapter.text()))
    }

    /// 挂接章节音频产物
    pub fn attach_artifact(&mut self, artifact: ChapterArtifact) -> Result<(), BookError> {
        let index = artifact.chapter_index;
        let chapter = self
            .chapters
            .get_mut(index)
            .ok_or(BookError::ChapterNotFound(index))?;
        if chapter.index() != index {
            return Err(BookError::ArtifactMismatch {
                expected: chapter.index(),
                found: index,
            });
        }
        chapter.set_artifact(artifact);
        Ok(())
    }

    /// 已挂接产物的章节（按书籍顺序）
    pub fn artifacts(&self) -> Vec<&ChapterArtifact> {
        self.chapters.iter().filter_map(Chapter::artifact).collect()
    }
}
