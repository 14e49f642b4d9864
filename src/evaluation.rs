use crate::client::{GenerationClient, GenerationParams, PerplexityScorer};
use crate::error::{ClientError, EvalError};
use crate::models::{EvaluationRecord, Sample};
use crate::prompt;

/// Runs every sample through the model, one at a time and in source order
pub struct SampleEvaluator<'a, G, P> {
    generator: &'a G,
    scorer: &'a P,
    params: GenerationParams,
}

impl<'a, G, P> SampleEvaluator<'a, G, P>
where
    G: GenerationClient,
    P: PerplexityScorer,
{
    /// Create an evaluator over the given collaborators
    pub fn new(generator: &'a G, scorer: &'a P, params: GenerationParams) -> Self {
        Self {
            generator,
            scorer,
            params,
        }
    }

    /// Evaluate the first `limit` samples (all when `None`).
    ///
    /// The first failing sample aborts the run; no partial record is kept.
    pub async fn evaluate(
        &self,
        samples: &[Sample],
        limit: Option<usize>,
    ) -> Result<Vec<EvaluationRecord>, EvalError> {
        let count = limit.map_or(samples.len(), |limit| limit.min(samples.len()));
        let mut records = Vec::with_capacity(count);

        tracing::info!("Evaluating on {} samples", count);

        for (index, sample) in samples[..count].iter().enumerate() {
            tracing::info!("Processing sample {}/{}", index + 1, count);
            records.push(self.evaluate_sample(sample).await?);
        }

        Ok(records)
    }

    async fn evaluate_sample(&self, sample: &Sample) -> Result<EvaluationRecord, EvalError> {
        let generation_prompt = prompt::render_generation_prompt(&sample.instruction, &sample.input);

        tracing::debug!(sample_id = sample.id, "Generating response");
        let generated = self
            .generator
            .generate(&generation_prompt, &self.params)
            .await
            .map_err(|source| EvalError::Generation {
                sample_id: sample.id,
                source,
            })?;
        let predicted_output = prompt::extract_response(&generated);

        tracing::debug!(sample_id = sample.id, "Scoring perplexity");
        let full_text = prompt::render(&sample.instruction, &sample.input, &sample.expected_output);
        let perplexity = self
            .scorer
            .score(&full_text)
            .await
            .map_err(|source| EvalError::Scoring {
                sample_id: sample.id,
                source,
            })?;
        if !perplexity.is_finite() || perplexity < 0.0 {
            return Err(EvalError::Scoring {
                sample_id: sample.id,
                source: ClientError::MalformedResponse(format!("invalid perplexity {perplexity}")),
            });
        }

        Ok(EvaluationRecord {
            sample_id: sample.id,
            instruction: sample.instruction.clone(),
            input: sample.input.clone(),
            expected_output: sample.expected_output.clone(),
            predicted_output,
            perplexity,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Answers with the prompt's input section
    pub(crate) struct EchoInputGenerator;

    impl GenerationClient for EchoInputGenerator {
        async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String, ClientError> {
            Ok(prompt::parse(prompt).input)
        }
    }

    pub(crate) struct ConstantScorer(pub f64);

    impl PerplexityScorer for ConstantScorer {
        async fn score(&self, _text: &str) -> Result<f64, ClientError> {
            Ok(self.0)
        }
    }

    /// Fails on the n-th call (0-based) and records every text it sees
    struct FailingScorer {
        fail_at: usize,
        seen: Mutex<Vec<String>>,
    }

    impl PerplexityScorer for FailingScorer {
        async fn score(&self, text: &str) -> Result<f64, ClientError> {
            let mut seen = self.seen.lock().unwrap();
            seen.push(text.to_string());
            if seen.len() > self.fail_at {
                return Err(ClientError::MalformedResponse("Mock scoring failure".to_string()));
            }
            Ok(1.0)
        }
    }

    struct FailingGenerator;

    impl GenerationClient for FailingGenerator {
        async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String, ClientError> {
            Err(ClientError::MalformedResponse("Mock generate failure".to_string()))
        }
    }

    /// Returns an echoed prompt followed by the continuation
    struct EchoingPromptGenerator;

    impl GenerationClient for EchoingPromptGenerator {
        async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String, ClientError> {
            Ok(format!("{prompt} generated text \n"))
        }
    }

    pub(crate) fn params() -> GenerationParams {
        GenerationParams {
            max_tokens: 256,
            temperature: 0.7,
            top_p: 0.9,
        }
    }

    pub(crate) fn sample(id: usize, instruction: &str, input: &str, output: &str) -> Sample {
        Sample {
            id,
            instruction: instruction.to_string(),
            input: input.to_string(),
            expected_output: output.to_string(),
        }
    }

    fn numbered_samples(count: usize) -> Vec<Sample> {
        (0..count)
            .map(|i| sample(i, &format!("Instruction {i}"), &format!("Input {i}"), &format!("Output {i}")))
            .collect()
    }

    #[tokio::test]
    async fn test_evaluate_two_samples_with_stubs() {
        let samples = vec![
            sample(0, "Summarize", "Text A", "Short A"),
            sample(1, "Translate", "Hello", "Bonjour"),
        ];
        let scorer = ConstantScorer(5.0);
        let evaluator = SampleEvaluator::new(&EchoInputGenerator, &scorer, params());

        let records = evaluator.evaluate(&samples, None).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].predicted_output, "Text A");
        assert_eq!(records[1].predicted_output, "Hello");
        assert_eq!(records[1].expected_output, "Bonjour");
        assert!(records.iter().all(|r| r.perplexity == 5.0));
    }

    #[tokio::test]
    async fn test_evaluate_preserves_order() {
        let samples = numbered_samples(7);
        let scorer = ConstantScorer(1.0);
        let evaluator = SampleEvaluator::new(&EchoInputGenerator, &scorer, params());

        let records = evaluator.evaluate(&samples, None).await.unwrap();

        let ids: Vec<usize> = records.iter().map(|r| r.sample_id).collect();
        assert_eq!(ids, (0..7).collect::<Vec<_>>());
        for record in &records {
            assert_eq!(record.input, format!("Input {}", record.sample_id));
        }
    }

    #[tokio::test]
    async fn test_evaluate_truncates_to_limit() {
        let samples = numbered_samples(10);
        let scorer = ConstantScorer(1.0);
        let evaluator = SampleEvaluator::new(&EchoInputGenerator, &scorer, params());

        let records = evaluator.evaluate(&samples, Some(3)).await.unwrap();

        let ids: Vec<usize> = records.iter().map(|r| r.sample_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_evaluate_limit_larger_than_dataset() {
        let samples = numbered_samples(2);
        let scorer = ConstantScorer(1.0);
        let evaluator = SampleEvaluator::new(&EchoInputGenerator, &scorer, params());

        let records = evaluator.evaluate(&samples, Some(50)).await.unwrap();
        assert_eq!(records.len(), 2);

        let records = evaluator.evaluate(&samples, Some(0)).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_evaluate_scores_full_rendered_text() {
        let samples = vec![sample(0, "Translate", "Hello", "Bonjour")];
        let scorer = FailingScorer {
            fail_at: usize::MAX,
            seen: Mutex::new(Vec::new()),
        };
        let evaluator = SampleEvaluator::new(&EchoInputGenerator, &scorer, params());

        evaluator.evaluate(&samples, None).await.unwrap();

        let seen = scorer.seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[prompt::render("Translate", "Hello", "Bonjour")]);
    }

    #[tokio::test]
    async fn test_evaluate_strips_echoed_prompt() {
        let samples = vec![sample(0, "Describe", "A cat", "Furry")];
        let scorer = ConstantScorer(1.0);
        let evaluator = SampleEvaluator::new(&EchoingPromptGenerator, &scorer, params());

        let records = evaluator.evaluate(&samples, None).await.unwrap();
        assert_eq!(records[0].predicted_output, "generated text");
    }

    #[tokio::test]
    async fn test_evaluate_generation_failure_aborts_run() {
        let samples = numbered_samples(3);
        let scorer = ConstantScorer(1.0);
        let evaluator = SampleEvaluator::new(&FailingGenerator, &scorer, params());

        let err = evaluator.evaluate(&samples, None).await.unwrap_err();
        assert!(matches!(err, EvalError::Generation { sample_id: 0, .. }));
        assert!(err.to_string().contains("sample 0"));
    }

    #[tokio::test]
    async fn test_evaluate_scoring_failure_names_sample() {
        let samples = numbered_samples(4);
        let scorer = FailingScorer {
            fail_at: 2,
            seen: Mutex::new(Vec::new()),
        };
        let evaluator = SampleEvaluator::new(&EchoInputGenerator, &scorer, params());

        let err = evaluator.evaluate(&samples, None).await.unwrap_err();
        assert!(matches!(err, EvalError::Scoring { sample_id: 2, .. }));
        // Nothing after the failing sample is attempted
        assert_eq!(scorer.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_evaluate_rejects_invalid_perplexity() {
        let samples = numbered_samples(2);

        for bad in [f64::NAN, -1.0, f64::INFINITY] {
            let scorer = ConstantScorer(bad);
            let evaluator = SampleEvaluator::new(&EchoInputGenerator, &scorer, params());

            let err = evaluator.evaluate(&samples, None).await.unwrap_err();
            assert!(matches!(
                err,
                EvalError::Scoring {
                    sample_id: 0,
                    source: ClientError::MalformedResponse(_)
                }
            ));
        }
    }

    #[tokio::test]
    async fn test_evaluate_accepts_zero_perplexity() {
        let samples = numbered_samples(1);
        let scorer = ConstantScorer(0.0);
        let evaluator = SampleEvaluator::new(&EchoInputGenerator, &scorer, params());

        let records = evaluator.evaluate(&samples, None).await.unwrap();
        assert_eq!(records[0].perplexity, 0.0);
    }
}
