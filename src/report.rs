use crate::error::EvalError;
use crate::models::{EvaluationRecord, MetricsSummary, Report};
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Byte-order mark so spreadsheet tools open the CSV as UTF-8
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Number of records reproduced in full in the narrative report
const PREVIEW_RECORDS: usize = 5;

const RULE_WIDTH: usize = 80;

/// Persists the artifacts of one evaluation run
pub struct ReportWriter {
    output_dir: PathBuf,
    filename_prefix: String,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>, filename_prefix: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            filename_prefix: filename_prefix.into(),
        }
    }

    /// Write the records CSV, the metrics JSON and the narrative report
    pub fn write(&self, records: &[EvaluationRecord], metrics: &MetricsSummary) -> Result<Report, EvalError> {
        self.write_at(records, metrics, Local::now())
    }

    fn write_at(
        &self,
        records: &[EvaluationRecord],
        metrics: &MetricsSummary,
        generated_at: DateTime<Local>,
    ) -> Result<Report, EvalError> {
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| EvalError::persistence(&self.output_dir, e))?;

        let timestamp = generated_at.format("%Y%m%d_%H%M%S").to_string();
        let report = Report {
            records_path: self.artifact_path("results", &timestamp, "csv"),
            metrics_path: self.artifact_path("metrics", &timestamp, "json"),
            report_path: self.artifact_path("report", &timestamp, "txt"),
        };

        write_records_csv(&report.records_path, records)?;
        tracing::debug!("Results saved to: {}", report.records_path.display());

        write_metrics_json(&report.metrics_path, metrics)?;
        tracing::debug!("Metrics saved to: {}", report.metrics_path.display());

        let narrative = render_narrative(records, metrics, &generated_at);
        std::fs::write(&report.report_path, narrative)
            .map_err(|e| EvalError::persistence(&report.report_path, e))?;
        tracing::debug!("Report saved to: {}", report.report_path.display());

        Ok(report)
    }

    fn artifact_path(&self, kind: &str, timestamp: &str, extension: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}_{}.{}", self.filename_prefix, kind, timestamp, extension))
    }
}

fn write_records_csv(path: &Path, records: &[EvaluationRecord]) -> Result<(), EvalError> {
    let mut file = std::fs::File::create(path).map_err(|e| EvalError::persistence(path, e))?;
    file.write_all(UTF8_BOM).map_err(|e| EvalError::persistence(path, e))?;

    let mut writer = csv::Writer::from_writer(file);
    for record in records {
        writer.serialize(record).map_err(|e| EvalError::persistence(path, e))?;
    }
    writer.flush().map_err(|e| EvalError::persistence(path, e))
}

fn write_metrics_json(path: &Path, metrics: &MetricsSummary) -> Result<(), EvalError> {
    let json = serde_json::to_string_pretty(metrics).map_err(|e| EvalError::persistence(path, e))?;
    std::fs::write(path, json).map_err(|e| EvalError::persistence(path, e))
}

fn format_optional(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{:.4}", value),
        None => "n/a".to_string(),
    }
}

fn render_narrative(
    records: &[EvaluationRecord],
    metrics: &MetricsSummary,
    generated_at: &DateTime<Local>,
) -> String {
    let heavy_rule = "=".repeat(RULE_WIDTH);
    let light_rule = "-".repeat(RULE_WIDTH);
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "{heavy_rule}");
    let _ = writeln!(out, "MODEL EVALUATION REPORT");
    let _ = writeln!(out, "{heavy_rule}\n");
    let _ = writeln!(out, "Evaluation Date: {}", generated_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "Number of Samples: {}\n", records.len());

    let _ = writeln!(out, "METRICS:");
    let _ = writeln!(out, "{light_rule}");
    let numeric = [
        ("avg_perplexity", metrics.avg_perplexity),
        ("std_perplexity", metrics.std_perplexity),
        ("min_perplexity", metrics.min_perplexity),
        ("max_perplexity", metrics.max_perplexity),
        ("avg_pred_length", metrics.avg_pred_length),
        ("avg_expected_length", metrics.avg_expected_length),
    ];
    for (name, value) in numeric {
        let _ = writeln!(out, "{name}: {value:.4}");
    }
    let optional = [
        ("bleu_score", metrics.bleu_score),
        ("rouge1", metrics.rouge1),
        ("rouge2", metrics.rouge2),
        ("rougeL", metrics.rouge_l),
    ];
    for (name, value) in optional {
        let _ = writeln!(out, "{name}: {}", format_optional(value));
    }

    let _ = writeln!(out, "\n{heavy_rule}");
    let _ = writeln!(out, "SAMPLE PREDICTIONS");
    let _ = writeln!(out, "{heavy_rule}\n");

    for (i, record) in records.iter().take(PREVIEW_RECORDS).enumerate() {
        let _ = writeln!(out, "\n--- Sample {} ---", i + 1);
        let _ = writeln!(out, "Instruction: {}", record.instruction);
        let _ = writeln!(out, "Input: {}", record.input);
        let _ = writeln!(out, "Expected: {}", record.expected_output);
        let _ = writeln!(out, "Predicted: {}", record.predicted_output);
        let _ = writeln!(out, "Perplexity: {:.2}", record.perplexity);
        let _ = writeln!(out, "{light_rule}");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn create_test_records(count: usize) -> Vec<EvaluationRecord> {
        (0..count)
            .map(|i| EvaluationRecord {
                sample_id: i,
                instruction: format!("แปลประโยค {i}"),
                input: format!("Input, with \"quotes\" {i}"),
                expected_output: format!("Expected {i}"),
                predicted_output: format!("Predicted\nline two {i}"),
                perplexity: 5.0 + i as f64,
            })
            .collect()
    }

    fn create_test_metrics() -> MetricsSummary {
        MetricsSummary {
            avg_perplexity: 5.123456,
            std_perplexity: 0.5,
            min_perplexity: 5.0,
            max_perplexity: 6.0,
            avg_pred_length: 3.0,
            avg_expected_length: 2.0,
            bleu_score: None,
            rouge1: Some(0.0),
            rouge2: None,
            rouge_l: None,
        }
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_write_uses_shared_timestamp() {
        let temp_dir = tempdir().unwrap();
        let writer = ReportWriter::new(temp_dir.path().join("nested/out"), "model_evaluation");

        let report = writer
            .write_at(&create_test_records(2), &create_test_metrics(), fixed_time())
            .unwrap();

        let file_name = |path: &PathBuf| path.file_name().unwrap().to_str().unwrap().to_string();
        assert_eq!(file_name(&report.records_path), "model_evaluation_results_20240309_140507.csv");
        assert_eq!(file_name(&report.metrics_path), "model_evaluation_metrics_20240309_140507.json");
        assert_eq!(file_name(&report.report_path), "model_evaluation_report_20240309_140507.txt");
        assert!(report.records_path.exists());
        assert!(report.metrics_path.exists());
        assert!(report.report_path.exists());
    }

    #[test]
    fn test_records_csv_round_trips_text() {
        let temp_dir = tempdir().unwrap();
        let records = create_test_records(3);
        let report = ReportWriter::new(temp_dir.path(), "run")
            .write(&records, &create_test_metrics())
            .unwrap();

        let bytes = std::fs::read(&report.records_path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));

        let mut reader = csv::Reader::from_reader(&bytes[UTF8_BOM.len()..]);
        let headers = reader.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["sample_id", "instruction", "input", "expected_output", "predicted_output", "perplexity"]
        );

        let read_back: Vec<EvaluationRecord> = reader
            .deserialize::<EvaluationRecord>()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(read_back, records);
    }

    #[test]
    fn test_metrics_json_marks_absent_scores_as_null() {
        let temp_dir = tempdir().unwrap();
        let report = ReportWriter::new(temp_dir.path(), "run")
            .write(&create_test_records(1), &create_test_metrics())
            .unwrap();

        let content = std::fs::read_to_string(&report.metrics_path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert!(json["bleu_score"].is_null());
        assert!(json["rouge2"].is_null());
        assert!(json["rougeL"].is_null());
        assert_eq!(json["rouge1"], serde_json::json!(0.0));
        assert_eq!(json["avg_perplexity"], serde_json::json!(5.123456));
        assert!(json.as_object().unwrap().contains_key("bleu_score"));
    }

    #[test]
    fn test_narrative_content() {
        let records = create_test_records(7);
        let narrative = render_narrative(&records, &create_test_metrics(), &fixed_time());

        assert!(narrative.contains("MODEL EVALUATION REPORT"));
        assert!(narrative.contains("Evaluation Date: 2024-03-09 14:05:07"));
        assert!(narrative.contains("Number of Samples: 7"));
        assert!(narrative.contains("avg_perplexity: 5.1235"));
        assert!(narrative.contains("bleu_score: n/a"));
        assert!(narrative.contains("rouge1: 0.0000"));
        assert!(narrative.contains("--- Sample 5 ---"));
        assert!(!narrative.contains("--- Sample 6 ---"));
        assert!(narrative.contains("Instruction: แปลประโยค 4"));
        assert!(narrative.contains("Perplexity: 9.00"));
    }

    #[test]
    fn test_write_fails_when_output_dir_is_a_file() {
        let temp_dir = tempdir().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let result = ReportWriter::new(&blocker, "run").write(&create_test_records(1), &create_test_metrics());
        assert!(matches!(result, Err(EvalError::Persistence { .. })));
    }
}
