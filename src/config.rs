use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

const DEFAULT_SEARCH_LIMIT: usize = 50;
const DEFAULT_SPEECH_TIMEOUT_MS: u64 = 5000;
const DEFAULT_DEBOUNCE_MS: u64 = 300;
const DEFAULT_AI_TIMEOUT_MS: u64 = 5000;
const DEFAULT_SEMANTIC_THRESHOLD: f64 = 0.3;
const DEFAULT_SEMANTIC_LIMIT: usize = 20;
const DEFAULT_ENRICH_DELAY_MS: u64 = 500;
const DEFAULT_CHAT_MODEL: &str = "gpt-4";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Resolved settings. Built once at startup and passed by reference to every
/// entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// `None` means local-only mode: no query interpretation, no embeddings.
    pub api_key: Option<String>,
    pub default_search_limit: usize,
    pub speech_recognition_timeout: Duration,
    pub debounce_delay: Duration,
    pub ai_timeout: Duration,
    pub semantic_threshold: f64,
    pub semantic_limit: usize,
    pub enrichment_delay: Duration,
    pub enrichment_retries: u32,
    pub chat_model: String,
    pub embedding_model: String,
    pub api_base: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            default_search_limit: DEFAULT_SEARCH_LIMIT,
            speech_recognition_timeout: Duration::from_millis(DEFAULT_SPEECH_TIMEOUT_MS),
            debounce_delay: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            ai_timeout: Duration::from_millis(DEFAULT_AI_TIMEOUT_MS),
            semantic_threshold: DEFAULT_SEMANTIC_THRESHOLD,
            semantic_limit: DEFAULT_SEMANTIC_LIMIT,
            enrichment_delay: Duration::from_millis(DEFAULT_ENRICH_DELAY_MS),
            enrichment_retries: 0,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

/// On-disk settings object. Keys follow the names the browser front end uses.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SettingsFile {
    pub api_key: Option<String>,
    pub default_search_limit: Option<usize>,
    pub speech_recognition_timeout: Option<u64>,
    pub debounce_delay: Option<u64>,
    pub ai_timeout: Option<u64>,
    pub semantic_threshold: Option<f64>,
    pub semantic_limit: Option<usize>,
    pub enrichment_delay: Option<u64>,
    pub enrichment_retries: Option<u32>,
    pub chat_model: Option<String>,
    pub embedding_model: Option<String>,
    pub api_base: Option<String>,
}

impl Settings {
    /// Defaults, then the optional settings file, then environment variables.
    pub fn load(settings_path: Option<&Path>) -> Result<Self> {
        let mut settings = Self::default();
        if let Some(path) = settings_path {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read settings file {}", path.display()))?;
            let file: SettingsFile = serde_json::from_str(&crate::store::strip_trailing_commas(&raw))
                .with_context(|| format!("failed to parse settings file {}", path.display()))?;
            settings.apply_file(file);
        }
        settings.apply_env();
        Ok(settings)
    }

    pub fn apply_file(&mut self, file: SettingsFile) {
        if let Some(key) = file.api_key {
            self.api_key = non_blank(key);
        }
        if let Some(limit) = file.default_search_limit {
            self.default_search_limit = limit;
        }
        if let Some(ms) = file.speech_recognition_timeout {
            self.speech_recognition_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = file.debounce_delay {
            self.debounce_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = file.ai_timeout {
            self.ai_timeout = Duration::from_millis(ms);
        }
        if let Some(threshold) = file.semantic_threshold {
            self.semantic_threshold = threshold;
        }
        if let Some(limit) = file.semantic_limit {
            self.semantic_limit = limit;
        }
        if let Some(ms) = file.enrichment_delay {
            self.enrichment_delay = Duration::from_millis(ms);
        }
        if let Some(retries) = file.enrichment_retries {
            self.enrichment_retries = retries;
        }
        if let Some(model) = file.chat_model {
            self.chat_model = model;
        }
        if let Some(model) = file.embedding_model {
            self.embedding_model = model;
        }
        if let Some(base) = file.api_base {
            self.api_base = base;
        }
    }

    fn apply_env(&mut self) {
        if let Ok(key) = env::var("OPENAI_API_KEY") {
            self.api_key = non_blank(key);
        }
        if let Some(limit) = env_parse("ORGMAP_SEARCH_LIMIT") {
            self.default_search_limit = limit;
        }
        if let Some(ms) = env_parse("ORGMAP_DEBOUNCE_MS") {
            self.debounce_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse("ORGMAP_AI_TIMEOUT_MS") {
            self.ai_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse("ORGMAP_ENRICH_DELAY_MS") {
            self.enrichment_delay = Duration::from_millis(ms);
        }
        if let Some(retries) = env_parse("ORGMAP_ENRICH_RETRIES") {
            self.enrichment_retries = retries;
        }
        if let Ok(base) = env::var("ORGMAP_API_BASE") {
            self.api_base = base;
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Settings as the settings-file object, with the key masked.
    pub fn redacted(&self) -> SettingsFile {
        SettingsFile {
            api_key: self.api_key.as_ref().map(|_| "***".to_string()),
            default_search_limit: Some(self.default_search_limit),
            speech_recognition_timeout: Some(self.speech_recognition_timeout.as_millis() as u64),
            debounce_delay: Some(self.debounce_delay.as_millis() as u64),
            ai_timeout: Some(self.ai_timeout.as_millis() as u64),
            semantic_threshold: Some(self.semantic_threshold),
            semantic_limit: Some(self.semantic_limit),
            enrichment_delay: Some(self.enrichment_delay.as_millis() as u64),
            enrichment_retries: Some(self.enrichment_retries),
            chat_model: Some(self.chat_model.clone()),
            embedding_model: Some(self.embedding_model.clone()),
            api_base: Some(self.api_base.clone()),
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
