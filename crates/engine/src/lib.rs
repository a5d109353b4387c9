//! Annotation Engine: per-field prompt rendering, bounded-concurrency LLM
//! invocation, evidence grounding, post-processing, and evaluation.

mod codes;
mod engine;
mod error;
mod evaluate;
mod postprocess;
mod span;

pub use codes::{is_coded_field, resolve_code};
pub use engine::{AnnotationEngine, RawAnnotation};
pub use error::Error;
pub use evaluate::{FieldType, MatchType, PlaceholderOutcome, classify_placeholder, evaluate_field, extract_template_placeholders, infer_field_type, is_no_annotation_indicator, merge_dates_from_template_and_extracted};
pub use postprocess::{STANDARD_ABSENCE_INDICATOR, normalize_absence_indicator, normalize_annotation_output};
pub use span::find_evidence;
