use std::collections::HashMap;
use std::time::Duration;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::Error;
use crate::metrics::parse_prometheus_metrics;
use crate::structured::extract_json;

/// Connection settings for a single OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub endpoint: String,
    pub model_name: String,
    pub timeout: Duration,
}

/// Whether the backend is reachable and, if so, what it reports.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BackendStatus {
    pub available: bool,
    pub models: Vec<String>,
}

/// A client for a single OpenAI-compatible LLM backend (the vLLM server in
/// production). Reduced from the teacher's multi-provider gateway to the
/// one protocol this pipeline needs; `reset` lets the caller swap
/// `LlmClientConfig` without rebuilding the underlying `reqwest::Client`.
pub struct LlmClient {
    http: reqwest::Client,
    config: LlmClientConfig,
}

impl LlmClient {
    pub fn new(config: LlmClientConfig) -> Self {
        let http = reqwest::Client::builder().timeout(config.timeout).build().expect("reqwest client builds with static config");
        Self { http, config }
    }

    /// Replaces the backend configuration in place, used when an operator
    /// points the pipeline at a different model server without restarting.
    pub fn reset(&mut self, config: LlmClientConfig) {
        self.http = reqwest::Client::builder().timeout(config.timeout).build().expect("reqwest client builds with static config");
        self.config = config;
    }

    /// GET `/v1/models` with a 5 second timeout, mirroring
    /// `EnhancedVLLMClient.is_available`.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/v1/models", self.config.endpoint);
        self.http
            .get(url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map(|resp| resp.status().is_success())
            .unwrap_or(false)
    }

    pub async fn status(&self) -> BackendStatus {
        let url = format!("{}/v1/models", self.config.endpoint);
        match self.http.get(url).timeout(Duration::from_secs(5)).send().await {
            Ok(resp) if resp.status().is_success() => {
                let models = resp
                    .json::<serde_json::Value>()
                    .await
                    .ok()
                    .and_then(|body| body["data"].as_array().cloned())
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|m| m["id"].as_str().map(str::to_string))
                    .collect();
                BackendStatus { available: true, models }
            }
            _ => BackendStatus { available: false, models: Vec::new() },
        }
    }

    /// GET `/metrics` and parse the Prometheus text exposition format,
    /// mirroring `EnhancedVLLMClient.get_metrics`.
    pub async fn metrics(&self) -> Result<HashMap<String, f64>, Error> {
        let url = format!("{}/metrics", self.config.endpoint);
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Status(resp.status()));
        }
        Ok(parse_prometheus_metrics(&resp.text().await?))
    }

    /// Plain text completion: send `prompt`, return the model's raw text.
    pub async fn generate(&self, prompt: &str) -> Result<String, Error> {
        let url = format!("{}/v1/completions", self.config.endpoint);
        let body = json!({
            "model": self.config.model_name,
            "prompt": prompt,
            "max_tokens": 1024,
            "temperature": 0.0,
        });
        let resp = self.http.post(url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Status(resp.status()));
        }
        let parsed: serde_json::Value = resp.json().await?;
        parsed["choices"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or(Error::Unstructured { target: "completion text" })
    }

    /// Requests a value of type `T`. First tries schema-constrained
    /// generation (`guided_json`, supported by vLLM's OpenAI-compatible
    /// endpoint); if that request fails, or the response can't be parsed as
    /// `T`, falls back to plain generation followed by the heuristic
    /// JSON-extraction cascade in [`crate::structured`] — the path that
    /// actually runs in production, since constrained generation was never
    /// reliably available in the original system.
    pub async fn generate_structured<T>(&self, prompt: &str, required_keys: &[&str]) -> Result<T, Error>
    where
        T: DeserializeOwned + JsonSchema,
    {
        if let Ok(value) = self.generate_constrained::<T>(prompt).await {
            return Ok(value);
        }

        let raw = self.generate(prompt).await?;
        let extracted = extract_json(&raw, required_keys).ok_or(Error::Unstructured { target: std::any::type_name::<T>() })?;
        serde_json::from_value(extracted).map_err(Error::InvalidJson)
    }

    async fn generate_constrained<T>(&self, prompt: &str) -> Result<T, Error>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let schema = schemars::schema_for!(T);
        let url = format!("{}/v1/completions", self.config.endpoint);
        let body = json!({
            "model": self.config.model_name,
            "prompt": prompt,
            "max_tokens": 1024,
            "temperature": 0.0,
            "guided_json": schema,
        });
        let resp = self.http.post(url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Status(resp.status()));
        }
        let parsed: serde_json::Value = resp.json().await?;
        let text = parsed["choices"][0]["text"].as_str().ok_or(Error::Unstructured { target: "completion text" })?;
        serde_json::from_str(text).map_err(Error::InvalidJson)
    }
}
