//! Storage Adapter - 章节产物与断点存储

mod checkpoint_store;
mod file_storage;

pub use checkpoint_store::FsCheckpointStore;
pub use file_storage::FileArtifactStorage;
