//! Job Runtime: isolates each pipeline job in its own OS process group,
//! tracks status in a WAL-mode SQLite store, and exposes cancellation
//! through a `CancellationToken` per job.

mod error;
mod process;
mod results_store;
mod runtime;
mod shapes;
mod status_store;

pub use error::Error;
pub use process::JobProcess;
pub use results_store::ResultsStore;
pub use runtime::JobRuntime;
pub use shapes::JobShape;
pub use status_store::StatusStore;
