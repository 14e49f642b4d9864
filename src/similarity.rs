//! Text-overlap scorers used as optional metric capabilities.
//!
//! `CorpusBleu` follows the usual corpus BLEU definition (4-gram clipped
//! precision, brevity penalty, exponential smoothing, 0-100 scale) over
//! `13a`-style tokens. HTML entity unescaping is not performed.
//! `RougeScorer` reports ROUGE-1, ROUGE-2 and ROUGE-L F-measures on
//! lowercased alphanumeric tokens, Porter-stemmed when longer than three
//! letters. Unlike some reference implementations it keeps non-ASCII letters.

use crate::stem::porter_stem;
use std::collections::HashMap;

const MAX_NGRAM_ORDER: usize = 4;

/// Scores a whole corpus of predictions against references in one pass
pub trait CorpusScorer {
    fn corpus_score(&self, predictions: &[&str], references: &[&str]) -> f64;
}

/// Scores one prediction against one reference
pub trait PairScorer {
    fn pair_score(&self, reference: &str, prediction: &str) -> RougeScores;
}

/// F-measures for a single prediction/reference pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RougeScores {
    pub rouge1: f64,
    pub rouge2: f64,
    pub rouge_l: f64,
}

/// Corpus-level BLEU
#[derive(Debug, Clone, Copy, Default)]
pub struct CorpusBleu;

/// ROUGE-1, ROUGE-2 and ROUGE-L
#[derive(Debug, Clone, Copy, Default)]
pub struct RougeScorer;

/// Mimics the `13a` tokenizer: ASCII punctuation becomes its own token,
/// except apostrophes, `.`/`,` between two digits and `-` not preceded by a digit
fn bleu_tokenize(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut spaced = String::with_capacity(text.len() * 2);
    for (i, &ch) in chars.iter().enumerate() {
        let prev_digit = i > 0 && chars[i - 1].is_ascii_digit();
        let next_digit = chars.get(i + 1).is_some_and(|c| c.is_ascii_digit());
        let split = match ch {
            '.' | ',' => !(prev_digit && next_digit),
            '-' => prev_digit,
            '\'' => false,
            _ => ch.is_ascii_punctuation(),
        };
        if split {
            spaced.push(' ');
            spaced.push(ch);
            spaced.push(' ');
        } else {
            spaced.push(ch);
        }
    }
    spaced.split_whitespace().map(str::to_string).collect()
}

/// Lowercase alphanumeric runs; ASCII words longer than three letters are stemmed
fn rouge_tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| {
            if token.len() > 3 {
                porter_stem(token)
            } else {
                token.to_string()
            }
        })
        .collect()
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if n == 0 || tokens.len() < n {
        return counts;
    }
    for window in tokens.windows(n) {
        *counts.entry(window).or_insert(0) += 1;
    }
    counts
}

/// Clipped overlap between two n-gram multisets
fn overlap(candidate: &HashMap<&[String], usize>, reference: &HashMap<&[String], usize>) -> usize {
    candidate
        .iter()
        .map(|(ngram, &count)| count.min(reference.get(ngram).copied().unwrap_or(0)))
        .sum()
}

impl CorpusScorer for CorpusBleu {
    fn corpus_score(&self, predictions: &[&str], references: &[&str]) -> f64 {
        let mut correct = [0usize; MAX_NGRAM_ORDER];
        let mut total = [0usize; MAX_NGRAM_ORDER];
        let mut sys_len = 0usize;
        let mut ref_len = 0usize;

        for (prediction, reference) in predictions.iter().zip(references) {
            let hyp = bleu_tokenize(prediction);
            let refs = bleu_tokenize(reference);
            sys_len += hyp.len();
            ref_len += refs.len();

            for n in 1..=MAX_NGRAM_ORDER {
                let hyp_counts = ngram_counts(&hyp, n);
                let ref_counts = ngram_counts(&refs, n);
                correct[n - 1] += overlap(&hyp_counts, &ref_counts);
                total[n - 1] += hyp.len().saturating_sub(n - 1);
            }
        }

        if sys_len == 0 {
            return 0.0;
        }

        let mut smooth = 1.0;
        let mut log_precision_sum = 0.0;
        for n in 0..MAX_NGRAM_ORDER {
            if total[n] == 0 {
                return 0.0;
            }
            let precision = if correct[n] == 0 {
                smooth *= 2.0;
                1.0 / (smooth * total[n] as f64)
            } else {
                correct[n] as f64 / total[n] as f64
            };
            log_precision_sum += precision.ln();
        }

        let brevity_penalty = if sys_len < ref_len {
            (1.0 - ref_len as f64 / sys_len as f64).exp()
        } else {
            1.0
        };

        100.0 * brevity_penalty * (log_precision_sum / MAX_NGRAM_ORDER as f64).exp()
    }
}

fn f_measure(matches: usize, candidate_len: usize, reference_len: usize) -> f64 {
    if matches == 0 || candidate_len == 0 || reference_len == 0 {
        return 0.0;
    }
    let precision = matches as f64 / candidate_len as f64;
    let recall = matches as f64 / reference_len as f64;
    2.0 * precision * recall / (precision + recall)
}

fn rouge_n(reference: &[String], prediction: &[String], n: usize) -> f64 {
    let ref_counts = ngram_counts(reference, n);
    let pred_counts = ngram_counts(prediction, n);
    let matches = overlap(&pred_counts, &ref_counts);
    f_measure(
        matches,
        pred_counts.values().sum(),
        ref_counts.values().sum(),
    )
}

fn lcs_len(a: &[String], b: &[String]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for token_a in a {
        for (j, token_b) in b.iter().enumerate() {
            curr[j + 1] = if token_a == token_b {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

impl PairScorer for RougeScorer {
    fn pair_score(&self, reference: &str, prediction: &str) -> RougeScores {
        let reference = rouge_tokenize(reference);
        let prediction = rouge_tokenize(prediction);

        RougeScores {
            rouge1: rouge_n(&reference, &prediction, 1),
            rouge2: rouge_n(&reference, &prediction, 2),
            rouge_l: f_measure(
                lcs_len(&reference, &prediction),
                prediction.len(),
                reference.len(),
            ),
        }
    }
}
