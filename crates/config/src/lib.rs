//! Configuration loading for the annotation pipeline orchestrator.
//!
//! Mirrors the teacher's split of a `Config::load` that deserializes TOML
//! followed by a `Config::validate` pass: this crate does the same, plus an
//! environment-variable override step that runs between the two.

mod error;

use std::path::Path;

pub use error::Error;

/// Top-level configuration, one TOML file deserialized into this struct.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub paths: PathsConfig,
    pub jobs: JobsConfig,
}

/// HTTP server bind settings and CORS origins.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub listen_address: String,
    pub cors_origins: Vec<String>,
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "127.0.0.1:8000".to_string(),
            cors_origins: Vec::new(),
            log_filter: "info".to_string(),
        }
    }
}

/// LLM backend connection settings.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model_name: String,
    pub timeout_secs: u64,
    pub concurrency: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8001".to_string(),
            model_name: "default".to_string(),
            timeout_secs: 120,
            concurrency: 8,
        }
    }
}

/// Filesystem locations the pipeline reads from and writes to.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub prompts_dir: String,
    pub fewshot_file: String,
    pub dictionary_csv: String,
    pub sessions_dir: String,
    pub jobs_db: String,
    pub results_db: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            prompts_dir: "./data/prompts".to_string(),
            fewshot_file: "./data/fewshot.json".to_string(),
            dictionary_csv: "./data/icdo3.csv".to_string(),
            sessions_dir: "./data/sessions".to_string(),
            jobs_db: "./data/jobs.sqlite".to_string(),
            results_db: "./data/results.sqlite".to_string(),
        }
    }
}

/// Job runtime settings: the external command used for the linking/QC
/// stages that are out of scope for this crate, and the polling interval.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobsConfig {
    pub etl_host: String,
    pub poll_interval_ms: u64,
    pub graceful_shutdown_ms: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            etl_host: "http://localhost:9000".to_string(),
            poll_interval_ms: 200,
            graceful_shutdown_ms: 5000,
        }
    }
}

impl Config {
    /// Reads and parses `path`, then applies environment variable
    /// overrides and validates the result.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        let contents = std::fs::read_to_string(path).map_err(Error::ConfigOpen)?;
        let mut config: Config = toml::from_str(&contents).map_err(Error::ConfigParse)?;

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    /// Cross-field sanity checks that can't be expressed in `serde`
    /// deserialization alone.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.llm.concurrency == 0 {
            anyhow::bail!("llm.concurrency must be at least 1");
        }
        if self.llm.endpoint.is_empty() {
            anyhow::bail!("llm.endpoint must not be empty");
        }
        Ok(())
    }
}

fn apply_env_overrides(config: &mut Config) -> Result<(), Error> {
    if let Ok(raw) = std::env::var("VLLM_CONCURRENCY") {
        config.llm.concurrency = raw.parse().map_err(|_| Error::EnvVar {
            name: "VLLM_CONCURRENCY",
            reason: format!("expected a positive integer, got {raw:?}"),
        })?;
    }
    if let Ok(raw) = std::env::var("CORS_ORIGINS") {
        config.server.cors_origins = raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect();
    }
    if let Ok(raw) = std::env::var("NLP_BACKEND_URL") {
        config.llm.endpoint = raw;
    }
    if let Ok(raw) = std::env::var("ETL_HOST") {
        config.jobs.etl_host = raw;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
    }

    #[test]
    fn loads_toml_and_applies_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotator.toml");
        std::fs::write(&path, "[llm]\nconcurrency = 4\n").unwrap();

        // SAFETY: single-threaded test, restored before returning.
        unsafe { std::env::set_var("VLLM_CONCURRENCY", "16") };
        let config = Config::load(&path).unwrap();
        unsafe { std::env::remove_var("VLLM_CONCURRENCY") };

        assert_eq!(config.llm.concurrency, 16);
    }

    #[test]
    fn rejects_zero_concurrency() {
        let mut config = Config::default();
        config.llm.concurrency = 0;
        assert!(config.validate().is_err());
    }
}
