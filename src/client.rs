use crate::config::ModelConfig;
use crate::error::ClientError;
use async_openai::{Client, config::OpenAIConfig, types::CreateCompletionRequestArgs};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

/// New tokens requested when echoing a text for scoring; they are excluded from the score
const ECHO_MAX_TOKENS: usize = 1;

/// Sampling parameters for a single generation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u16,
    pub temperature: f32,
    pub top_p: f32,
}

impl From<&ModelConfig> for GenerationParams {
    fn from(config: &ModelConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        }
    }
}

/// Produces a sampled continuation for a rendered prompt
#[allow(async_fn_in_trait)]
pub trait GenerationClient {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, ClientError>;
}

/// Scores how confident the model is on a full text (lower is more confident)
#[allow(async_fn_in_trait)]
pub trait PerplexityScorer {
    async fn score(&self, text: &str) -> Result<f64, ClientError>;
}

/// Client for an OpenAI-compatible completions endpoint serving the adapted model
pub struct CompletionClient {
    client: Client<OpenAIConfig>,
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    rate_limit_rps: f64,
    /// Last request time, shared by generation and scoring
    last_request: Mutex<Option<Instant>>,
}

#[derive(Debug, Serialize)]
struct EchoRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: usize,
    temperature: f32,
    echo: bool,
    logprobs: u32,
}

#[derive(Debug, Deserialize)]
struct EchoResponse {
    choices: Vec<EchoChoice>,
}

#[derive(Debug, Deserialize)]
struct EchoChoice {
    logprobs: Option<EchoLogprobs>,
}

#[derive(Debug, Deserialize)]
struct EchoLogprobs {
    #[serde(default)]
    token_logprobs: Vec<Option<f64>>,
    #[serde(default)]
    text_offset: Vec<usize>,
}

impl CompletionClient {
    /// Create a client from the model section of the run file
    pub fn new(config: &ModelConfig) -> Result<Self, ClientError> {
        let api_key = match &config.env_var_api_key {
            Some(var) => Some(std::env::var(var).map_err(|_| ClientError::MissingApiKey(var.clone()))?),
            None => None,
        };

        let mut openai_config = OpenAIConfig::new().with_api_base(&config.api_endpoint);
        if let Some(key) = &api_key {
            openai_config = openai_config.with_api_key(key);
        }

        Ok(Self {
            client: Client::with_config(openai_config),
            http: reqwest::Client::new(),
            api_base: config.api_endpoint.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            rate_limit_rps: config.rate_limit_rps,
            last_request: Mutex::new(None),
        })
    }

    /// Enforce rate limiting for API requests
    async fn enforce_rate_limit(last_request: &Mutex<Option<Instant>>, rate_limit_rps: f64) {
        if rate_limit_rps <= 0.0 {
            return;
        }

        let min_interval = Duration::from_secs_f64(1.0 / rate_limit_rps);
        let mut last_request = last_request.lock().await;

        if let Some(last_time) = *last_request {
            let elapsed = last_time.elapsed();
            if elapsed < min_interval {
                sleep(min_interval - elapsed).await;
            }
        }

        *last_request = Some(Instant::now());
    }

    async fn request_echo_logprobs(&self, text: &str) -> Result<EchoLogprobs, ClientError> {
        let body = EchoRequest {
            model: &self.model,
            prompt: text,
            max_tokens: ECHO_MAX_TOKENS,
            temperature: 0.0,
            echo: true,
            logprobs: 0,
        };

        let mut request = self
            .http
            .post(format!("{}/completions", self.api_base))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response: EchoResponse = request.send().await?.error_for_status()?.json().await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.logprobs)
            .ok_or_else(|| ClientError::MalformedResponse("no logprobs in echo response".to_string()))
    }
}

impl GenerationClient for CompletionClient {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, ClientError> {
        Self::enforce_rate_limit(&self.last_request, self.rate_limit_rps).await;

        let request = CreateCompletionRequestArgs::default()
            .model(&self.model)
            .prompt(prompt)
            .max_tokens(params.max_tokens)
            .temperature(params.temperature)
            .top_p(params.top_p)
            .build()?;

        let response = self.client.completions().create(request).await?;

        match response.choices.into_iter().next() {
            Some(choice) => Ok(choice.text),
            None => Err(ClientError::MalformedResponse(
                "completion response has no choices".to_string(),
            )),
        }
    }
}

impl PerplexityScorer for CompletionClient {
    async fn score(&self, text: &str) -> Result<f64, ClientError> {
        Self::enforce_rate_limit(&self.last_request, self.rate_limit_rps).await;

        let logprobs = self.request_echo_logprobs(text).await?;
        perplexity_from_logprobs(&logprobs.token_logprobs, &logprobs.text_offset, text.chars().count())
            .ok_or_else(|| ClientError::MalformedResponse("no scored prompt tokens".to_string()))
    }
}

/// Exponential of the mean negative log-likelihood over the prompt's tokens.
///
/// Tokens at or beyond `prompt_chars` are generated, not echoed, and are
/// skipped. Without offsets the trailing generated tokens are dropped by count.
fn perplexity_from_logprobs(
    token_logprobs: &[Option<f64>],
    text_offset: &[usize],
    prompt_chars: usize,
) -> Option<f64> {
    let prompt_logprobs: Vec<f64> = if text_offset.len() == token_logprobs.len() {
        token_logprobs
            .iter()
            .zip(text_offset)
            .filter(|&(_, &offset)| offset < prompt_chars)
            .filter_map(|(logprob, _)| *logprob)
            .collect()
    } else {
        let echoed = token_logprobs.len().saturating_sub(ECHO_MAX_TOKENS);
        token_logprobs[..echoed].iter().filter_map(|logprob| *logprob).collect()
    };

    if prompt_logprobs.is_empty() {
        return None;
    }

    let mean_nll = -prompt_logprobs.iter().sum::<f64>() / prompt_logprobs.len() as f64;
    Some(mean_nll.exp())
}
