//! Shared data model and small filesystem helpers used by every other
//! `annot-*` crate, mirroring the teacher's `context` crate: types cross
//! crate boundaries here, behavior does not.

mod atomic;
pub mod model;

pub use atomic::{AtomicWriteError, write_json_atomic};
pub use model::*;
