use crate::client::{CompletionClient, GenerationClient, GenerationParams, PerplexityScorer};
use crate::config::Config;
use crate::dataset;
use crate::evaluation::SampleEvaluator;
use crate::metrics::MetricsAggregator;
use crate::models::{EvaluationRecord, MetricsSummary, Report};
use crate::output::{self, OutputFormat};
use crate::report::ReportWriter;
use crate::similarity::{CorpusBleu, CorpusScorer, PairScorer, RougeScorer};
use anyhow::{Context, Result};

/// Everything produced by one evaluation run
#[derive(Debug)]
pub struct RunOutcome {
    pub records: Vec<EvaluationRecord>,
    pub metrics: MetricsSummary,
    pub report: Report,
}

/// Main runner that orchestrates the evaluation process
pub struct Runner {
    config: Config,
    output_format: OutputFormat,
}

impl Runner {
    /// Create a new runner with the given configuration
    pub fn new(config: Config, output_format: OutputFormat) -> Self {
        Self {
            config,
            output_format,
        }
    }

    /// Run the evaluation against the configured model endpoint
    pub async fn run(&self) -> Result<RunOutcome> {
        let client = CompletionClient::new(&self.config.model).context("Failed to create model client")?;
        self.run_with(&client, &client).await
    }

    /// Run the evaluation with the given model collaborators
    pub async fn run_with<G, P>(&self, generator: &G, scorer: &P) -> Result<RunOutcome>
    where
        G: GenerationClient,
        P: PerplexityScorer,
    {
        let settings = &self.config.evaluation;

        let samples = dataset::load_samples(&settings.dataset_path, &settings.split)?;
        let params = GenerationParams::from(&self.config.model);
        let evaluator = SampleEvaluator::new(generator, scorer, params);

        tracing::info!("Starting evaluation...");
        let records = evaluator.evaluate(&samples, settings.num_samples).await?;

        tracing::info!("Calculating metrics...");
        let metrics = self.calculate_metrics(&records)?;

        tracing::info!("Saving results...");
        let report = ReportWriter::new(&settings.output_dir, &settings.filename_prefix).write(&records, &metrics)?;

        output::print_run_summary(
            &metrics,
            &records,
            &report,
            self.output_format,
            settings.preview_samples,
            &mut rand::thread_rng(),
        );

        Ok(RunOutcome {
            records,
            metrics,
            report,
        })
    }

    /// Aggregate with the similarity scorers enabled in the run file
    fn calculate_metrics(&self, records: &[EvaluationRecord]) -> Result<MetricsSummary> {
        let settings = &self.config.evaluation;
        let bleu = settings.bleu.then_some(&CorpusBleu as &dyn CorpusScorer);
        let rouge = settings.rouge.then_some(&RougeScorer as &dyn PairScorer);

        Ok(MetricsAggregator::new(bleu, rouge).aggregate(records)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EvaluationSettings, ModelConfig, PrepareSettings};
    use crate::error::EvalError;
    use crate::evaluation::tests::{ConstantScorer, EchoInputGenerator};
    use serde_json::json;
    use std::path::Path;
    use tempfile::tempdir;

    fn create_test_config(dataset_path: &Path, output_dir: &Path) -> Config {
        Config {
            model: ModelConfig {
                api_endpoint: "http://localhost:8000/v1".to_string(),
                env_var_api_key: None,
                model: "llama-2-7b-lora".to_string(),
                temperature: 0.7,
                max_tokens: 256,
                top_p: 0.9,
                rate_limit_rps: 0.0,
            },
            evaluation: EvaluationSettings {
                dataset_path: dataset_path.to_path_buf(),
                num_samples: None,
                output_dir: output_dir.to_path_buf(),
                preview_samples: 1,
                bleu: false,
                rouge: false,
                ..EvaluationSettings::default()
            },
            prepare: PrepareSettings::default(),
        }
    }

    fn write_two_sample_dataset(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("eval.jsonl");
        let content = format!(
            "{}\n{}\n",
            json!({ "instruction": "Summarize", "input": "Text A", "output": "Short A" }),
            json!({ "instruction": "Translate", "input": "Hello", "output": "Bonjour" })
        );
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_run_two_sample_scenario() {
        let temp_dir = tempdir().unwrap();
        let dataset_path = write_two_sample_dataset(temp_dir.path());
        let output_dir = temp_dir.path().join("results");
        let runner = Runner::new(create_test_config(&dataset_path, &output_dir), OutputFormat::Plain);

        let outcome = runner
            .run_with(&EchoInputGenerator, &ConstantScorer(5.0))
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert!(outcome.records.iter().all(|r| r.perplexity == 5.0));
        assert_eq!(outcome.records[0].predicted_output, "Text A");
        assert_eq!(outcome.metrics.avg_perplexity, 5.0);
        assert_eq!(outcome.metrics.min_perplexity, 5.0);
        assert_eq!(outcome.metrics.max_perplexity, 5.0);
        assert!(outcome.metrics.bleu_score.is_none());

        let metrics_json = std::fs::read_to_string(&outcome.report.metrics_path).unwrap();
        assert!(metrics_json.contains("\"bleu_score\": null"));
        assert!(outcome.report.records_path.starts_with(&output_dir));
        assert!(outcome.report.report_path.exists());
    }

    #[tokio::test]
    async fn test_run_with_similarity_scorers_enabled() {
        let temp_dir = tempdir().unwrap();
        let dataset_path = write_two_sample_dataset(temp_dir.path());
        let mut config = create_test_config(&dataset_path, &temp_dir.path().join("results"));
        config.evaluation.bleu = true;
        config.evaluation.rouge = true;
        config.evaluation.num_samples = Some(1);

        let outcome = Runner::new(config, OutputFormat::Json)
            .run_with(&EchoInputGenerator, &ConstantScorer(2.0))
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert!(outcome.metrics.bleu_score.is_some());
        assert!(outcome.metrics.rouge1.is_some());
        assert!(outcome.metrics.rouge_l.is_some());
    }

    #[tokio::test]
    async fn test_run_missing_dataset_fails_before_evaluation() {
        let temp_dir = tempdir().unwrap();
        let output_dir = temp_dir.path().join("results");
        let runner = Runner::new(
            create_test_config(&temp_dir.path().join("missing.jsonl"), &output_dir),
            OutputFormat::Plain,
        );

        let err = runner
            .run_with(&EchoInputGenerator, &ConstantScorer(1.0))
            .await
            .unwrap_err();

        assert!(matches!(err.downcast_ref::<EvalError>(), Some(EvalError::DatasetAccess { .. })));
        assert!(!output_dir.exists());
    }

    #[tokio::test]
    async fn test_run_empty_dataset_fails_aggregation() {
        let temp_dir = tempdir().unwrap();
        let dataset_path = temp_dir.path().join("empty.jsonl");
        std::fs::write(&dataset_path, "").unwrap();
        let runner = Runner::new(
            create_test_config(&dataset_path, &temp_dir.path().join("results")),
            OutputFormat::Plain,
        );

        let err = runner
            .run_with(&EchoInputGenerator, &ConstantScorer(1.0))
            .await
            .unwrap_err();

        assert!(matches!(err.downcast_ref::<EvalError>(), Some(EvalError::EmptyInput)));
    }
}
