use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::reduce::EmptyQueryPolicy;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
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

    /// Wraps an explicit figment, bypassing file and environment discovery.
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))
    }
}

/// Typed view over the merged configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub index: IndexSettings,
    pub search: SearchSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// Root of the JSON document source; one subdirectory per partition.
    pub documents_dir: String,
    /// Directory mirroring exported index chunks.
    pub index_dir: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { documents_dir: "data/documents".to_string(), index_dir: "data/indexes".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Documents fetched per source round trip.
    pub batch_size: usize,
    /// Records per exported `store.<n>` chunk.
    pub export_chunk_size: usize,
    /// Partition ids to index. Empty means every partition.
    pub enabled_partitions: Vec<String>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self { batch_size: 5, export_chunk_size: 500, enabled_partitions: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Upper bound on ids returned by a single sub-query.
    pub max_hits: usize,
    pub empty_query: EmptyQueryPolicy,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { max_hits: 10_000, empty_query: EmptyQueryPolicy::MatchAll }
    }
}

impl Settings {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.index.batch_size == 0 {
            anyhow::bail!("index.batch_size must be greater than zero");
        }
        if self.index.export_chunk_size == 0 {
            anyhow::bail!("index.export_chunk_size must be greater than zero");
        }
        if self.search.max_hits == 0 {
            anyhow::bail!("search.max_hits must be greater than zero");
        }
        Ok(())
    }

    pub fn documents_dir(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.data.documents_dir)
    }

    pub fn index_dir(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.data.index_dir)
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

/// Resolve a possibly relative path against a given base directory after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() {
        p
    } else {
        base.join(p)
    }
}
