use crate::models::{EvaluationRecord, MetricsSummary, Report};
use clap::ValueEnum;
use rand::Rng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    Plain,
    Json,
}

/// Machine-readable summary printed in JSON mode
#[derive(Debug, Serialize)]
struct JsonSummary<'a> {
    metrics: &'a MetricsSummary,
    artifacts: &'a Report,
}

/// Print the outcome of a run in the specified format.
///
/// JSON mode prints a single document and nothing else, so stdout stays parseable.
pub fn print_run_summary<R: Rng>(
    metrics: &MetricsSummary,
    records: &[EvaluationRecord],
    report: &Report,
    format: OutputFormat,
    preview_count: usize,
    rng: &mut R,
) {
    match format {
        OutputFormat::Plain => print_plain(metrics, records, report, preview_count, rng),
        OutputFormat::Json => print_json(metrics, report),
    }
}

fn print_plain<R: Rng>(
    metrics: &MetricsSummary,
    records: &[EvaluationRecord],
    report: &Report,
    preview_count: usize,
    rng: &mut R,
) {
    print!("{}", format_summary_plain(metrics));
    if preview_count > 0 {
        print!("{}", format_sample_predictions(records, preview_count, rng));
    }
    print!("{}", format_artifact_paths(report));
}

fn print_json(metrics: &MetricsSummary, report: &Report) {
    match format_summary_json(metrics, report) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing metrics to JSON: {}", e),
    }
}

fn format_summary_json(metrics: &MetricsSummary, report: &Report) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonSummary {
        metrics,
        artifacts: report,
    })
}

fn format_artifact_paths(report: &Report) -> String {
    format!(
        "Results saved to: {}\nMetrics saved to: {}\nReport saved to: {}\n",
        report.records_path.display(),
        report.metrics_path.display(),
        report.report_path.display()
    )
}

fn format_summary_plain(metrics: &MetricsSummary) -> String {
    let rule = "=".repeat(80);
    let mut lines = vec![
        String::new(),
        rule.clone(),
        "EVALUATION METRICS SUMMARY".to_string(),
        rule.clone(),
        String::new(),
        "Perplexity:".to_string(),
        format!("  Average: {:.4}", metrics.avg_perplexity),
        format!("  Std Dev: {:.4}", metrics.std_perplexity),
        format!("  Min: {:.4}", metrics.min_perplexity),
        format!("  Max: {:.4}", metrics.max_perplexity),
        String::new(),
        "Response Length:".to_string(),
        format!("  Avg Predicted: {:.2} words", metrics.avg_pred_length),
        format!("  Avg Expected: {:.2} words", metrics.avg_expected_length),
    ];

    if let Some(bleu) = metrics.bleu_score {
        lines.push(String::new());
        lines.push(format!("BLEU Score: {:.4}", bleu));
    }

    if let (Some(rouge1), Some(rouge2), Some(rouge_l)) = (metrics.rouge1, metrics.rouge2, metrics.rouge_l) {
        lines.push(String::new());
        lines.push("ROUGE Scores:".to_string());
        lines.push(format!("  ROUGE-1: {:.4}", rouge1));
        lines.push(format!("  ROUGE-2: {:.4}", rouge2));
        lines.push(format!("  ROUGE-L: {:.4}", rouge_l));
    }

    lines.push(rule);
    lines.push(String::new());
    lines.join("\n")
}

fn format_sample_predictions<R: Rng>(records: &[EvaluationRecord], count: usize, rng: &mut R) -> String {
    let shown = count.min(records.len());
    let rule = "=".repeat(80);
    let mut out = format!(
        "\n{rule}\nSAMPLE PREDICTIONS (showing {shown} samples)\n{rule}\n"
    );

    // Sampled without replacement
    for (i, idx) in index::sample(rng, records.len(), shown).into_iter().enumerate() {
        let record = &records[idx];
        out.push_str(&format!("\n--- Sample {} (ID: {}) ---\n", i + 1, record.sample_id));
        out.push_str(&format!("\nInstruction: {}\n", record.instruction));
        out.push_str(&format!("\nInput: {}\n", record.input));
        out.push_str(&format!("\nExpected Output:\n{}\n", record.expected_output));
        out.push_str(&format!("\nPredicted Output:\n{}\n", record.predicted_output));
        out.push_str(&format!("\nPerplexity: {:.2}\n", record.perplexity));
        out.push_str(&"-".repeat(80));
        out.push('\n');
    }

    out
}
