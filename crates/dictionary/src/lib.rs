//! ICD-O-3 dictionary index: the Code Dictionary Index component.
//!
//! Loads a single CSV export once at startup and serves ranked lookups
//! against it for the lifetime of the process, the read-mostly cache
//! pattern used throughout the pipeline's config and prompt layers.

mod error;
mod index;
mod normalize;

pub use error::Error;
pub use index::DictionaryIndex;
