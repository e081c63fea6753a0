//! Voice Context - 音色限界上下文
//!
//! 职责:
//! - 音色标识与语言代码
//! - 只读的音色目录条目（由外部配置提供）

mod aggregate;
mod errors;
mod value_objects;

pub use aggregate::Voice;
pub use errors::VoiceError;
pub use value_objects::{Gender, LanguageCode, VoiceId};
