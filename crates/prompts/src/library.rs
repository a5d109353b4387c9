use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use annot_core::{PromptTemplate, Template};

use crate::error::Error;

struct CenterCache {
    mtime: SystemTime,
    templates: Vec<PromptTemplate>,
}

/// Loads and caches prompt templates from a directory tree laid out as
/// `<root>/<CENTER>/prompts.json` — one file per center, reloading a
/// center's templates only when its file's mtime has advanced, the same
/// read-mostly cache convention used by the config layer's provider lists.
pub struct PromptLibrary {
    root: PathBuf,
    cache: HashMap<String, CenterCache>,
}

/// One entry in a center's `prompts.json`: either a bare template string or
/// a template paired with an entity mapping and/or export metadata.
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
enum PromptEntry {
    Raw(String),
    Full {
        template: String,
        #[serde(default)]
        entity_mapping: Option<HashMap<String, String>>,
        #[serde(default)]
        core_variable: Option<String>,
        #[serde(default)]
        value_code_mappings: Option<HashMap<String, String>>,
    },
}

impl PromptLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), cache: HashMap::new() }
    }

    fn file(&self, center: &str) -> PathBuf {
        self.root.join(center).join("prompts.json")
    }

    /// Forces a rescan of every center directory, discarding the cache,
    /// iterating centers in sorted order as `load()` does.
    pub fn reload_all(&mut self) -> Result<(), Error> {
        self.cache.clear();
        if !self.root.exists() {
            return Ok(());
        }
        let mut centers: Vec<String> = read_dir(&self.root)?
            .into_iter()
            .filter(|entry| entry.path().is_dir())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        centers.sort();
        for center in centers {
            self.reload_center(&center)?;
        }
        Ok(())
    }

    /// Reloads one center's `prompts.json` if its mtime has advanced since
    /// the last load, mirroring `reload_if_changed`.
    pub fn ensure_fresh(&mut self, center: &str) -> Result<(), Error> {
        let path = self.file(center);
        if !path.exists() {
            return Err(Error::UnknownCenter(center.to_string()));
        }
        let mtime = path.metadata().map_err(|source| Error::Io { path: path.display().to_string(), source })?.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        let stale = self.cache.get(center).is_none_or(|cached| cached.mtime < mtime);
        if stale {
            self.reload_center(center)?;
        }
        Ok(())
    }

    fn reload_center(&mut self, center: &str) -> Result<(), Error> {
        let path = self.file(center);
        let mtime = path.metadata().map_err(|source| Error::Io { path: path.display().to_string(), source })?.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        let contents = std::fs::read_to_string(&path).map_err(|source| Error::Io { path: path.display().to_string(), source })?;
        let entries: HashMap<String, PromptEntry> = serde_json::from_str(&contents).map_err(|source| Error::Parse { path: path.display().to_string(), source })?;

        let center_lower = center.to_lowercase();
        let mut templates = Vec::with_capacity(entries.len());
        for (bare_key, entry) in entries {
            let (report_type, field) = split_bare_key(&bare_key)?;
            let (template, core_variable, value_code_mappings) = match entry {
                PromptEntry::Raw(body) => (Template::Raw(adapt_template(&body)), None, None),
                PromptEntry::Full { template, entity_mapping, core_variable, value_code_mappings } => {
                    let template = match entity_mapping {
                        Some(entries) => Template::WithMapping { template: adapt_template(&template), mapping: annot_core::EntityMapping { entries } },
                        None => Template::Raw(adapt_template(&template)),
                    };
                    (template, core_variable, value_code_mappings)
                }
            };
            templates.push(PromptTemplate { name: format!("{bare_key}-{center_lower}"), report_type, field, center: center.to_string(), template, core_variable, value_code_mappings });
        }

        self.cache.insert(center.to_string(), CenterCache { mtime, templates });
        Ok(())
    }

    /// All templates currently cached for `center`.
    pub fn templates_for_center(&mut self, center: &str) -> Result<&[PromptTemplate], Error> {
        self.ensure_fresh(center)?;
        Ok(&self.cache.get(center).expect("ensure_fresh populates the cache").templates)
    }

    /// Distinct `(report_type, field)` pairs available for a center, the
    /// classification list used to drive the UI's field picker.
    pub fn classification_list(&mut self, center: &str) -> Result<Vec<(String, String)>, Error> {
        Ok(self.templates_for_center(center)?.iter().map(|t| (t.report_type.clone(), t.field.clone())).collect())
    }

    pub fn find(&mut self, center: &str, report_type: &str, field: &str) -> Result<PromptTemplate, Error> {
        self.templates_for_center(center)?
            .iter()
            .find(|t| t.report_type == report_type && t.field == field)
            .cloned()
            .ok_or_else(|| Error::NotFound { center: center.to_string(), report_type: report_type.to_string(), field: field.to_string() })
    }

    /// Upserts one prompt in its center's `prompts.json`, keyed by its bare
    /// `<report_type>/<field>`, and invalidates the center's cache.
    pub fn upsert(&mut self, template: &PromptTemplate) -> Result<(), Error> {
        let dir = self.root.join(&template.center);
        std::fs::create_dir_all(&dir).map_err(|source| Error::Io { path: dir.display().to_string(), source })?;

        let path = self.file(&template.center);
        let mut entries = read_prompt_file(&path)?;
        let bare_key = format!("{}/{}", template.report_type, template.field);
        let entry = if template.core_variable.is_none() && template.value_code_mappings.is_none() {
            match &template.template {
                Template::Raw(body) => PromptEntry::Raw(body.clone()),
                Template::WithMapping { template, mapping } => {
                    PromptEntry::Full { template: template.clone(), entity_mapping: Some(mapping.entries.clone()), core_variable: None, value_code_mappings: None }
                }
            }
        } else {
            let entity_mapping = match &template.template {
                Template::WithMapping { mapping, .. } => Some(mapping.entries.clone()),
                Template::Raw(_) => None,
            };
            PromptEntry::Full { template: template.template.body().to_string(), entity_mapping, core_variable: template.core_variable.clone(), value_code_mappings: template.value_code_mappings.clone() }
        };
        entries.insert(bare_key, entry);

        write_prompt_file(&path, &entries)?;
        self.cache.remove(&template.center);
        Ok(())
    }

    pub fn delete(&mut self, center: &str, report_type: &str, field: &str) -> Result<(), Error> {
        let path = self.file(center);
        let mut entries = read_prompt_file(&path)?;
        let bare_key = format!("{report_type}/{field}");
        if entries.remove(&bare_key).is_none() {
            return Err(Error::NotFound { center: center.to_string(), report_type: report_type.to_string(), field: field.to_string() });
        }
        write_prompt_file(&path, &entries)?;
        self.cache.remove(center);
        Ok(())
    }
}

fn split_bare_key(bare_key: &str) -> Result<(String, String), Error> {
    bare_key
        .split_once('/')
        .map(|(report_type, field)| (report_type.to_string(), field.to_string()))
        .ok_or_else(|| Error::MalformedKey(bare_key.to_string()))
}

fn read_prompt_file(path: &Path) -> Result<HashMap<String, PromptEntry>, Error> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let contents = std::fs::read_to_string(path).map_err(|source| Error::Io { path: path.display().to_string(), source })?;
    serde_json::from_str(&contents).map_err(|source| Error::Parse { path: path.display().to_string(), source })
}

fn write_prompt_file(path: &Path, entries: &HashMap<String, PromptEntry>) -> Result<(), Error> {
    let body = serde_json::to_string_pretty(entries).expect("PromptEntry map serializes");
    std::fs::write(path, body).map_err(|source| Error::Io { path: path.display().to_string(), source })
}

/// Rewrites a template's raw tokens into the engine's `{note}`/`{fewshots}`
/// placeholders and drops the static-sample markers the source prompts
/// carry, mirroring `load()`'s token-rewriting pass.
fn adapt_template(raw: &str) -> String {
    raw.replace("{{note_original_text}}", "{note}")
        .replace("{few_shot_examples}", "{fewshots}")
        .replace("{static_samples}", "")
        .replace("{{annotation}}", "")
}

fn read_dir(path: &Path) -> Result<Vec<std::fs::DirEntry>, Error> {
    std::fs::read_dir(path)
        .map_err(|source| Error::Io { path: path.display().to_string(), source })?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| Error::Io { path: path.display().to_string(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_then_find_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = PromptLibrary::new(dir.path());

        let template = PromptTemplate {
            name: "pathology/histology-centera".to_string(),
            report_type: "pathology".to_string(),
            field: "histology".to_string(),
            center: "centerA".to_string(),
            template: Template::Raw("Extract histology from {{note_original_text}}".to_string()),
            core_variable: None,
            value_code_mappings: None,
        };
        library.upsert(&template).unwrap();

        let found = library.find("centerA", "pathology", "histology").unwrap();
        assert_eq!(found.template, Template::Raw("Extract histology from {note}".to_string()));
    }

    #[test]
    fn cache_invalidates_after_upsert() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = PromptLibrary::new(dir.path());

        let mut template = PromptTemplate {
            name: "pathology/histology-centera".to_string(),
            report_type: "pathology".to_string(),
            field: "histology".to_string(),
            center: "centerA".to_string(),
            template: Template::Raw("v1".to_string()),
            core_variable: None,
            value_code_mappings: None,
        };
        library.upsert(&template).unwrap();
        assert_eq!(library.find("centerA", "pathology", "histology").unwrap().template, Template::Raw("v1".to_string()));

        template.template = Template::Raw("v2".to_string());
        library.upsert(&template).unwrap();
        assert_eq!(library.find("centerA", "pathology", "histology").unwrap().template, Template::Raw("v2".to_string()));
    }

    #[test]
    fn storage_layout_is_one_file_per_center() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = PromptLibrary::new(dir.path());
        library.upsert(&PromptTemplate {
            name: "pathology/histology-centera".to_string(),
            report_type: "pathology".to_string(),
            field: "histology".to_string(),
            center: "centerA".to_string(),
            template: Template::Raw("v1".to_string()),
            core_variable: None,
            value_code_mappings: None,
        }).unwrap();
        library.upsert(&PromptTemplate {
            name: "pathology/grade-centera".to_string(),
            report_type: "pathology".to_string(),
            field: "grade".to_string(),
            center: "centerA".to_string(),
            template: Template::Raw("v2".to_string()),
            core_variable: None,
            value_code_mappings: None,
        }).unwrap();

        assert!(dir.path().join("centerA").join("prompts.json").is_file());
        assert_eq!(library.templates_for_center("centerA").unwrap().len(), 2);
    }

    #[test]
    fn names_are_suffixed_with_lowercased_center_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = PromptLibrary::new(dir.path());
        library.upsert(&PromptTemplate {
            name: "ignored".to_string(),
            report_type: "pathology".to_string(),
            field: "histology".to_string(),
            center: "INT".to_string(),
            template: Template::Raw("v1".to_string()),
            core_variable: None,
            value_code_mappings: None,
        }).unwrap();

        let found = library.find("INT", "pathology", "histology").unwrap();
        assert_eq!(found.name, "pathology/histology-int");
    }
}
