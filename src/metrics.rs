use crate::error::EvalError;
use crate::models::{EvaluationRecord, MetricsSummary};
use crate::similarity::{CorpusScorer, PairScorer};

/// Reduces evaluation records into a [`MetricsSummary`].
///
/// Similarity scorers are optional; when one is missing its fields stay `None`.
#[derive(Default)]
pub struct MetricsAggregator<'a> {
    bleu: Option<&'a dyn CorpusScorer>,
    rouge: Option<&'a dyn PairScorer>,
}

impl<'a> MetricsAggregator<'a> {
    pub fn new(bleu: Option<&'a dyn CorpusScorer>, rouge: Option<&'a dyn PairScorer>) -> Self {
        Self { bleu, rouge }
    }

    /// Compute summary statistics over all records
    pub fn aggregate(&self, records: &[EvaluationRecord]) -> Result<MetricsSummary, EvalError> {
        if records.is_empty() {
            return Err(EvalError::EmptyInput);
        }

        let perplexities: Vec<f64> = records.iter().map(|r| r.perplexity).collect();
        let pred_lengths: Vec<f64> = records.iter().map(|r| word_count(&r.predicted_output)).collect();
        let expected_lengths: Vec<f64> = records.iter().map(|r| word_count(&r.expected_output)).collect();

        let bleu_score = self.calculate_bleu(records);
        let (rouge1, rouge2, rouge_l) = match self.calculate_rouge(records) {
            Some((r1, r2, rl)) => (Some(r1), Some(r2), Some(rl)),
            None => (None, None, None),
        };

        Ok(MetricsSummary {
            avg_perplexity: calculate_mean(&perplexities),
            std_perplexity: calculate_std(&perplexities),
            min_perplexity: perplexities.iter().copied().fold(f64::INFINITY, f64::min),
            max_perplexity: perplexities.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            avg_pred_length: calculate_mean(&pred_lengths),
            avg_expected_length: calculate_mean(&expected_lengths),
            bleu_score,
            rouge1,
            rouge2,
            rouge_l,
        })
    }

    /// Corpus BLEU over all predictions at once
    fn calculate_bleu(&self, records: &[EvaluationRecord]) -> Option<f64> {
        let Some(scorer) = self.bleu else {
            tracing::warn!("BLEU scorer not available; skipping BLEU score calculation");
            return None;
        };

        let predictions: Vec<&str> = records.iter().map(|r| r.predicted_output.as_str()).collect();
        let references: Vec<&str> = records.iter().map(|r| r.expected_output.as_str()).collect();
        Some(scorer.corpus_score(&predictions, &references))
    }

    /// Mean ROUGE-1, ROUGE-2 and ROUGE-L F-measures over records
    fn calculate_rouge(&self, records: &[EvaluationRecord]) -> Option<(f64, f64, f64)> {
        let Some(scorer) = self.rouge else {
            tracing::warn!("ROUGE scorer not available; skipping ROUGE score calculation");
            return None;
        };

        let mut rouge1 = Vec::with_capacity(records.len());
        let mut rouge2 = Vec::with_capacity(records.len());
        let mut rouge_l = Vec::with_capacity(records.len());
        for record in records {
            let scores = scorer.pair_score(&record.expected_output, &record.predicted_output);
            rouge1.push(scores.rouge1);
            rouge2.push(scores.rouge2);
            rouge_l.push(scores.rouge_l);
        }

        Some((
            calculate_mean(&rouge1),
            calculate_mean(&rouge2),
            calculate_mean(&rouge_l),
        ))
    }
}

fn word_count(text: &str) -> f64 {
    text.split_whitespace().count() as f64
}

/// Callers guarantee a non-empty slice
fn calculate_mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
fn calculate_std(values: &[f64]) -> f64 {
    let mean = calculate_mean(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
