use annot_core::UnifiedICDO3Code;
use annot_dictionary::DictionaryIndex;

/// Fields whose extracted value is looked up against the ICD-O-3
/// dictionary once annotation completes.
const CODED_FIELDS: &[&str] = &["histology", "morphology", "topography", "histologySubgroup", "subsite"];

/// Whether `field` is one of the handful of fields the export pipeline
/// needs coded, rather than free text.
pub fn is_coded_field(field: &str) -> bool {
    CODED_FIELDS.contains(&field)
}

/// Looks up a dictionary code for an annotated value, called only for
/// fields [`is_coded_field`] accepts. Returns `None` rather than erroring
/// when nothing ranks above the dictionary's own floor, since an
/// unresolved code is a normal annotation outcome, not a failure.
pub fn resolve_code(dictionary: &DictionaryIndex, morphology: Option<&str>, topography: Option<&str>, free_text: &str) -> Option<UnifiedICDO3Code> {
    dictionary.resolve(morphology, topography, Some(free_text)).into_iter().next()
}
