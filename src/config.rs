use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Connection and sampling settings for the fine-tuned model endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    /// OpenAI-compatible API base serving the adapted model
    pub api_endpoint: String,
    /// Environment variable name containing the API key, if the endpoint needs one
    #[serde(default)]
    pub env_var_api_key: Option<String>,
    /// Model name as known by the endpoint
    pub model: String,
    /// Sampling temperature for generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum number of new tokens per generation
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u16,
    /// Nucleus sampling threshold
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Rate limit for API requests per second (0 disables limiting)
    #[serde(default)]
    pub rate_limit_rps: f64,
}

/// Settings for the `evaluate` command
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EvaluationSettings {
    /// Prepared dataset directory, or a single .jsonl/.json file
    pub dataset_path: PathBuf,
    /// Split read from a prepared dataset directory
    pub split: String,
    /// Evaluate only the first N samples (all when unset)
    pub num_samples: Option<usize>,
    pub output_dir: PathBuf,
    pub filename_prefix: String,
    /// Number of random predictions printed after the summary
    pub preview_samples: usize,
    /// Compute corpus BLEU
    pub bleu: bool,
    /// Compute ROUGE-1/2/L
    pub rouge: bool,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("data/processed_dataset"),
            split: "test".to_string(),
            num_samples: Some(100),
            output_dir: PathBuf::from("./evaluation_results"),
            filename_prefix: "model_evaluation".to_string(),
            preview_samples: 5,
            bleu: true,
            rouge: true,
        }
    }
}

impl EvaluationSettings {
    /// Apply the command-line sample limit: `all` lifts it, `num_samples` replaces it,
    /// neither keeps the run file's value
    pub fn override_sample_limit(&mut self, num_samples: Option<usize>, all: bool) {
        if all {
            self.num_samples = None;
        } else if num_samples.is_some() {
            self.num_samples = num_samples;
        }
    }
}

/// Settings for the `prepare` command
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PrepareSettings {
    /// JSON array of instruction/input/output objects
    pub raw_data_path: PathBuf,
    /// Directory receiving train.jsonl and test.jsonl
    pub output_path: PathBuf,
    /// Fraction of rows held out for the test split
    pub test_size: f64,
    /// Shuffle seed
    pub seed: u64,
}

impl Default for PrepareSettings {
    fn default() -> Self {
        Self {
            raw_data_path: PathBuf::from("data/raw_data.json"),
            output_path: PathBuf::from("data/processed_dataset"),
            test_size: 0.1,
            seed: 42,
        }
    }
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u16 {
    256
}

fn default_top_p() -> f32 {
    0.9
}

/// Root configuration of a run file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub model: ModelConfig,
    #[serde(default)]
    pub evaluation: EvaluationSettings,
    #[serde(default)]
    pub prepare: PrepareSettings,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }
}
