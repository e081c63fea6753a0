//! Book Context - 有声书限界上下文
//!
//! 职责:
//! - 书籍聚合（章节顺序即朗读顺序，也是容器轨道顺序）
//! - 章节、文本分块、章节音频产物

mod aggregate;
mod entities;
mod errors;
mod value_objects;

pub use aggregate::Book;
pub use entities::{Chapter, ChapterArtifact, Chunk};
pub use errors::BookError;
pub use value_objects::{Author, Title};
