//! Run configuration
//!
//! Loaded from an optional YAML file and overlaid with `ESSAY__SECTION__KEY`
//! environment variables (a `.env` file is honoured). Every field has a default,
//! so an empty file, or no file at all, yields a runnable configuration.

use crate::types::{AppError, AppResult};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
const ENV_PREFIX: &str = "ESSAY";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub essay: EssayConfig,
    #[serde(default)]
    pub citation: CitationConfig,
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub checkpoints: CheckpointConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-attempt wall-clock timeout, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Attempts per call before the model is declared unavailable
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Attempts per structured call before the output is declared malformed
    #[serde(default = "default_max_parse_attempts")]
    pub max_parse_attempts: u32,
    /// First backoff delay in milliseconds; doubles per retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Check `/api/tags` before starting the pipeline
    #[serde(default = "default_true")]
    pub preflight: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkingConfig {
    /// Approximate chunk size in tokens
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Approximate overlap with the preceding chunk, in tokens
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "default_chunks_per_batch")]
    pub chunks_per_batch: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EssayConfig {
    /// Target essay length in words, spread across outline sections
    #[serde(default = "default_target_length")]
    pub target_length: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CitationConfig {
    /// Approximate token budget for the literature catalogue in each citation prompt
    #[serde(default = "default_catalogue_tokens")]
    pub catalogue_tokens: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_max_revision_cycles")]
    pub max_revision_cycles: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackingConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Optional log file, written in addition to stderr
    #[serde(default)]
    pub file: Option<String>,
}

fn default_model() -> String {
    "llama3.1:8b-instruct-q4_K_M".to_string()
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_parse_attempts() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    100
}

fn default_chunks_per_batch() -> usize {
    4
}

fn default_target_length() -> u32 {
    5000
}

fn default_catalogue_tokens() -> usize {
    3000
}

fn default_threshold() -> f64 {
    0.7
}

fn default_max_revision_cycles() -> u32 {
    2
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            max_parse_attempts: default_max_parse_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            preflight: true,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            chunks_per_batch: default_chunks_per_batch(),
        }
    }
}

impl Default for EssayConfig {
    fn default() -> Self {
        Self {
            target_length: default_target_length(),
        }
    }
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            catalogue_tokens: default_catalogue_tokens(),
        }
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            max_revision_cycles: default_max_revision_cycles(),
        }
    }
}

impl OllamaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Config {
    /// Load configuration from `path` (or `config.yaml` when present) plus the environment.
    ///
    /// An explicitly named file must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let (file, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Path::new(DEFAULT_CONFIG_FILE).to_path_buf(), false),
        };

        if required && !file.exists() {
            return Err(AppError::Input(format!(
                "Config file not found: {}",
                file.display()
            )));
        }

        let settings = ::config::Config::builder()
            .add_source(::config::File::from(file.as_path()).required(required))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Input(format!("Failed to read config: {}", e)))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| AppError::Input(format!("Invalid config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> AppResult<()> {
        let review = &self.review;
        if !(0.0..=1.0).contains(&review.threshold) {
            return Err(AppError::Input(format!(
                "review.threshold must be within [0, 1], got {}",
                review.threshold
            )));
        }

        let chunking = &self.chunking;
        if chunking.chunk_size == 0 {
            return Err(AppError::Input("chunking.chunk_size must be positive".to_string()));
        }
        if chunking.chunk_overlap >= chunking.chunk_size {
            return Err(AppError::Input(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                chunking.chunk_overlap, chunking.chunk_size
            )));
        }

        if self.research.chunks_per_batch == 0 {
            return Err(AppError::Input(
                "research.chunks_per_batch must be positive".to_string(),
            ));
        }
        if self.citation.catalogue_tokens == 0 {
            return Err(AppError::Input(
                "citation.catalogue_tokens must be positive".to_string(),
            ));
        }
        if self.essay.target_length == 0 {
            return Err(AppError::Input("essay.target_length must be positive".to_string()));
        }
        if self.ollama.max_retries == 0 || self.ollama.max_parse_attempts == 0 {
            return Err(AppError::Input(
                "ollama.max_retries and ollama.max_parse_attempts must be at least 1".to_string(),
            ));
        }
        if self.ollama.timeout_secs == 0 {
            return Err(AppError::Input("ollama.timeout_secs must be positive".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.review.threshold, 0.7);
        assert_eq!(config.review.max_revision_cycles, 2);
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert!(!config.tracking.enabled);
        assert_eq!(config.citation.catalogue_tokens, 3000);
    }

    #[test]
    fn test_load_yaml_file() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(
            file,
            "ollama:\n  model: mistral:7b\n  timeout_secs: 30\nreview:\n  threshold: 0.8\n  max_revision_cycles: 1\nchunking:\n  chunk_size: 500\n  chunk_overlap: 50\ntracking:\n  enabled: true"
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.ollama.model, "mistral:7b");
        assert_eq!(config.ollama.timeout(), Duration::from_secs(30));
        assert_eq!(config.ollama.base_url, "http://localhost:11434");
        assert_eq!(config.review.threshold, 0.8);
        assert_eq!(config.review.max_revision_cycles, 1);
        assert_eq!(config.chunking.chunk_size, 500);
        assert!(config.tracking.enabled);
    }

    #[test]
    fn test_missing_explicit_file_is_input_error() {
        let err = Config::load(Some(Path::new("/nonexistent/essay-config.yaml"))).unwrap_err();
        assert!(matches!(err, AppError::Input(_)));
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut config = Config::default();
        config.review.threshold = 1.5;
        assert!(matches!(config.validate(), Err(AppError::Input(_))));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let mut config = Config::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(matches!(config.validate(), Err(AppError::Input(_))));
    }

    #[test]
    fn test_zero_catalogue_budget_rejected() {
        let mut config = Config::default();
        config.citation.catalogue_tokens = 0;
        assert!(matches!(config.validate(), Err(AppError::Input(_))));
    }
}
