//! Source Adapter - 书籍输入

mod json_book_source;

pub use json_book_source::{load_manifest, parse_manifest, SourceError};
