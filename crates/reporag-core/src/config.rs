//! Layered configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`, `config.<env>.toml`
//! and `APP_*` env vars (`__` separates nested keys, e.g. `APP_HYDE__API_KEY`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub embedding: EmbeddingSettings,
    pub index: IndexSettings,
    pub hyde: HydeSettings,
    pub retrieval: RetrievalSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_dir: Option<String>,
    pub dim: usize,
    pub max_len: usize,
    pub use_fake: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model_dir: None, dim: 384, max_len: 256, use_fake: false }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    #[default]
    Memory,
    Lance,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexSettings {
    pub backend: IndexBackend,
    /// Local directory or remote `db://` URI; required for the lance backend.
    pub uri: Option<String>,
    pub api_key: Option<String>,
    pub table: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Memory,
            uri: None,
            api_key: None,
            table: "repo_docs".to_string(),
        }
    }
}

impl IndexSettings {
    pub fn is_remote(&self) -> bool {
        self.uri.as_deref().is_some_and(|u| u.starts_with("db://"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HydeSettings {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Queries must be strictly longer than this (in chars) to be augmented.
    pub min_query_chars: usize,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for HydeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.groq.com/openai".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_key: None,
            min_query_chars: 20,
            max_tokens: 150,
            temperature: 0.3,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalSettings {
    pub default_top_k: usize,
    pub context_top_k: usize,
    /// Upper bound for the synthetic score given to an appended parent document.
    pub parent_score: f32,
    pub files_top_k: usize,
    pub files_fallback_top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            context_top_k: 3,
            parent_score: 0.5,
            files_top_k: 1,
            files_fallback_top_k: 2,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.embedding.dim == 0 {
            return Err(Error::InvalidConfig("embedding.dim must be > 0".into()));
        }
        if self.embedding.max_len == 0 {
            return Err(Error::InvalidConfig("embedding.max_len must be > 0".into()));
        }
        if self.index.backend == IndexBackend::Lance {
            if self.index.uri.as_deref().unwrap_or_default().is_empty() {
                return Err(Error::InvalidConfig(
                    "index.uri is required for the lance backend".into(),
                ));
            }
            if self.index.is_remote() && self.index.api_key.is_none() {
                return Err(Error::InvalidConfig(
                    "index.api_key is required for a remote index".into(),
                ));
            }
        }
        if self.index.table.is_empty() {
            return Err(Error::InvalidConfig("index.table must not be empty".into()));
        }
        let r = &self.retrieval;
        if r.default_top_k == 0
            || r.context_top_k == 0
            || r.files_top_k == 0
            || r.files_fallback_top_k == 0
        {
            return Err(Error::InvalidConfig("retrieval top-k values must be > 0".into()));
        }
        if !r.parent_score.is_finite() {
            return Err(Error::InvalidConfig("retrieval.parent_score must be finite".into()));
        }
        if self.hyde.timeout_secs == 0 {
            return Err(Error::InvalidConfig("hyde.timeout_secs must be > 0".into()));
        }
        Ok(())
    }

    /// Whether the fake embedder is requested by settings or `APP_USE_FAKE_EMBEDDINGS`.
    pub fn use_fake_embeddings(&self) -> bool {
        self.embedding.use_fake
            || env::var("APP_USE_FAKE_EMBEDDINGS")
                .ok()
                .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(&env_name)
    }

    pub fn load_for_env(env_name: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        let config = Self { figment };
        config.settings()?;
        tracing::debug!(env = env_name, "configuration loaded");
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    /// Extract and validate the typed settings, expanding path-like values.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(format!("Failed to parse settings: {e}")))?;
        settings.embedding.model_dir =
            settings.embedding.model_dir.map(|p| expand_path(p).to_string_lossy().into_owned());
        if let Some(uri) = settings.index.uri.take() {
            let uri = if uri.contains("://") {
                uri
            } else {
                expand_path(uri).to_string_lossy().into_owned()
            };
            settings.index.uri = Some(uri);
        }
        settings.validate()?;
        Ok(settings)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a `PathBuf` without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
