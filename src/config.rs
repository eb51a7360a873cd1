use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LibraryConfig {
    #[serde(default = "default_library_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: default_library_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_library_root() -> PathBuf {
    PathBuf::from("./documents")
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.txt".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Chunking strategy: `fixed`, `paragraph`, or `argument`.
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Target chunk size in words.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Overlap between adjacent chunks in words.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_strategy() -> String {
    "paragraph".to_string()
}
fn default_chunk_size() -> usize {
    300
}
fn default_chunk_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// Ordered provider chain; the first is preferred, the last is the
    /// guaranteed-success fallback by convention (`mock`).
    #[serde(default = "default_providers")]
    pub providers: Vec<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Approximate per-text token budget before truncation.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Number of (identity, text) → vector entries kept in the cache.
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            model: None,
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            cache_size: default_cache_size(),
            ollama_url: default_ollama_url(),
        }
    }
}

fn default_providers() -> Vec<String> {
    vec!["mock".to_string()]
}
fn default_dims() -> usize {
    384
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_tokens() -> usize {
    8192
}
fn default_cache_size() -> usize {
    4096
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Chunks embedded and persisted per batch.
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            embed_batch_size: default_embed_batch_size(),
        }
    }
}

fn default_embed_batch_size() -> usize {
    100
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be < chunking.chunk_size");
    }
    match config.chunking.strategy.as_str() {
        "fixed" | "paragraph" | "argument" => {}
        other => anyhow::bail!(
            "Unknown chunking strategy: '{}'. Must be fixed, paragraph, or argument.",
            other
        ),
    }

    if config.embedding.providers.is_empty() {
        anyhow::bail!("embedding.providers must list at least one provider");
    }
    for provider in &config.embedding.providers {
        match provider.as_str() {
            "openai" | "ollama" | "mock" => {}
            other => anyhow::bail!(
                "Unknown embedding provider: '{}'. Must be openai, ollama, or mock.",
                other
            ),
        }
        if (provider == "openai" || provider == "ollama") && config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider '{}' is listed",
                provider
            );
        }
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    if config.pipeline.embed_batch_size == 0 {
        anyhow::bail!("pipeline.embed_batch_size must be > 0");
    }

    Ok(())
}
