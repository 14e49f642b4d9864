use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One raw training example as found in the raw data file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawExample {
    pub instruction: String,
    #[serde(default)]
    pub input: String,
    pub output: String,
}

/// One evaluation unit read from the dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Position of the sample in the source dataset
    pub id: usize,
    pub instruction: String,
    /// May be empty
    pub input: String,
    pub expected_output: String,
}

/// Result of evaluating a single sample against the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub sample_id: usize,
    pub instruction: String,
    pub input: String,
    pub expected_output: String,
    /// Text produced by the model for the rendered prompt
    pub predicted_output: String,
    /// Perplexity of the full rendered text (lower = more confident)
    pub perplexity: f64,
}

/// Aggregate metrics over every record of a run.
///
/// Similarity scores are `None` when the scorer was not available; they
/// serialize as `null` and are never coerced to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub avg_perplexity: f64,
    pub std_perplexity: f64,
    pub min_perplexity: f64,
    pub max_perplexity: f64,
    /// Mean word count of predicted outputs
    pub avg_pred_length: f64,
    /// Mean word count of expected outputs
    pub avg_expected_length: f64,
    /// Corpus BLEU on a 0-100 scale
    pub bleu_score: Option<f64>,
    pub rouge1: Option<f64>,
    pub rouge2: Option<f64>,
    #[serde(rename = "rougeL")]
    pub rouge_l: Option<f64>,
}

/// Paths of the three artifacts persisted for a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub records_path: PathBuf,
    pub metrics_path: PathBuf,
    pub report_path: PathBuf,
}
