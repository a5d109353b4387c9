//! Export Engine: writes annotation results as label or coded CSV.

mod error;
mod kernel;
mod resolver;
mod writer;

pub use error::Error;
pub use kernel::{FieldKind, Row, build_rows, infer_field_kind, strip_template_prefix};
pub use resolver::{CodeEntry, CodeResolver, Resolved, core_variable_to_category};
pub use writer::{write_coded_csv, write_label_csv};
