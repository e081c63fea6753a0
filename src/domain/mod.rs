//! Domain Layer - 领域层
//!
//! 包含两个限界上下文:
//! - Book Context: 书籍、章节、分块与章节音频产物
//! - Voice Context: 音色目录条目

pub mod book;
pub mod voice;

// 共享的文本分块器
pub mod chunker;

pub use chunker::{split, ChunkingError};
