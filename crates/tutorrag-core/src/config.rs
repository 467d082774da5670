//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys). Provides helpers to expand
//! `~` and `${VAR}` and to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::data_processor::ChunkingConfig;
use crate::error::{Error, Result};

const SETTINGS_KEY: &str = "rag";

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Self::defaults().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    /// Wraps an already-assembled figment; defaults are merged underneath it.
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment: Self::defaults().merge(figment) }
    }

    fn defaults() -> Figment {
        Figment::from(Serialized::default(SETTINGS_KEY, RagSettings::default()))
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> Result<RagSettings> {
        self.figment
            .extract_inner(SETTINGS_KEY)
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }
}

/// Typed view of the `[rag]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub paths: PathSettings,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingSettings,
    pub reranker: RerankerSettings,
    pub sparse: SparseSettings,
    pub dense: DenseSettings,
    pub retrieval: RetrievalSettings,
}

impl RagSettings {
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_chars == 0 {
            return Err(Error::InvalidConfig("chunking.max_chars must be > 0".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.retrieval.alpha) {
            return Err(Error::InvalidConfig(format!("retrieval.alpha must be within [0, 1], got {}", self.retrieval.alpha)));
        }
        if self.dense.max_partitions == 0 {
            return Err(Error::InvalidConfig("dense.max_partitions must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub docs_dir: String,
    pub cache_dir: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self { docs_dir: "docs".to_string(), cache_dir: "rag_cache".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Directory holding `config.json`, `tokenizer.json` and the weights.
    pub model_dir: Option<String>,
    pub batch_size: usize,
    pub max_len: usize,
    /// Run embedding batches on the rayon pool.
    pub parallel: bool,
    pub use_fake: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model_dir: None, batch_size: 32, max_len: 256, parallel: false, use_fake: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerSettings {
    pub enabled: bool,
    pub model_dir: Option<String>,
    pub max_len: usize,
}

impl Default for RerankerSettings {
    fn default() -> Self {
        Self { enabled: true, model_dir: None, max_len: 512 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SparseSettings {
    pub enabled: bool,
}

impl Default for SparseSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenseSettings {
    /// Corpora smaller than this get an exact index.
    pub exact_threshold: usize,
    pub max_partitions: usize,
    pub nprobes: usize,
}

impl Default for DenseSettings {
    fn default() -> Self {
        Self { exact_threshold: 10_000, max_partitions: 100, nprobes: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub k: usize,
    pub alpha: f32,
    pub use_reranking: bool,
    pub include_scores: bool,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { k: 5, alpha: 0.7, use_reranking: true, include_scores: true }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
