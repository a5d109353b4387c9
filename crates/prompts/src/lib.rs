//! Prompt Library: loads per-center prompt templates from disk and serves
//! them through a read-mostly, mtime-invalidated cache.

mod error;
mod library;

pub use error::Error;
pub use library::PromptLibrary;
