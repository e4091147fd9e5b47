//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `LEXDB_*` env
//! vars (nested keys separated by `__`, e.g. `LEXDB_RETRIEVER__TOP_N_MATCHES`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const ENV_PREFIX: &str = "LEXDB_";

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => tracing::debug!(env = %env_name, "no environment-specific config file"),
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| ConfigError::Extract { key: key.to_string(), source: Box::new(e) })
    }

    /// Typed view of the whole configuration; missing keys take their defaults.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        self.figment
            .extract()
            .map_err(|e| ConfigError::Extract { key: "<root>".to_string(), source: Box::new(e) })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub retriever: RetrieverSettings,
    pub tokens: TokenSettings,
    pub ingest: IngestSettings,
}

impl Settings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.store.merge_threshold < 2 {
            return Err(ConfigError::Invalid("store.merge_threshold must be at least 2".to_string()));
        }
        if self.ingest.max_chunk_tokens == 0 {
            return Err(ConfigError::Invalid("ingest.max_chunk_tokens must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Index directory; a temporary directory is used when absent.
    pub path: Option<String>,
    pub merge_threshold: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { path: None, merge_threshold: 16 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrieverSettings {
    pub only_matches: bool,
    #[serde(deserialize_with = "clamp_non_negative")]
    pub top_n_matches: usize,
    #[serde(deserialize_with = "clamp_non_negative")]
    pub max_tokens: usize,
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self { only_matches: true, top_n_matches: 10, max_tokens: usize::MAX }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenSettings {
    /// Hugging Face `tokenizer.json`; the word-ratio estimate is used when absent.
    pub tokenizer_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub data_dir: Option<String>,
    pub max_chunk_tokens: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self { data_dir: None, max_chunk_tokens: 500 }
    }
}

/// Negative counts coming from files or env vars mean "none" rather than an error.
fn clamp_non_negative<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = i64::deserialize(deserializer)?;
    Ok(usize::try_from(value.max(0)).unwrap_or(usize::MAX))
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

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
