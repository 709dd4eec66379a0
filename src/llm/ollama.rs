//! Streaming generator backed by an Ollama server (`/api/generate`).

use crate::config::LlmConfig;
use crate::error::{BuddyError, Result};
use crate::llm::generator::{BoundedTokens, GenerationLimits, GenerationOutcome, ResponseGenerator};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions<'a>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions<'a> {
    num_predict: usize,
    stop: &'a [String],
    temperature: f32,
}

/// One NDJSON line of a streamed response.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct OllamaGenerator {
    client: Client,
    url: String,
    model: String,
    temperature: f32,
}

impl OllamaGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BuddyError::Generation {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            url: format!("{}/api/generate", config.url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn request_body<'a>(&'a self, prompt: &'a str, limits: &'a GenerationLimits) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.model,
            prompt,
            stream: true,
            options: GenerateOptions {
                num_predict: limits.token_limit,
                stop: &limits.stop_phrases,
                temperature: self.temperature,
            },
        }
    }
}

impl ResponseGenerator for OllamaGenerator {
    fn generate(
        &mut self,
        prompt: &str,
        limits: &GenerationLimits,
        on_token: &mut dyn FnMut(&str),
    ) -> Result<GenerationOutcome> {
        let response = self
            .client
            .post(&self.url)
            .json(&self.request_body(prompt, limits))
            .send()
            .map_err(|e| BuddyError::Generation {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(BuddyError::Generation {
                message: format!("{}: {}", status, body.trim()),
            });
        }

        let mut bounded = BoundedTokens::new(limits);
        read_stream(BufReader::new(response), &mut bounded, on_token)?;
        let outcome = bounded.finish(on_token);
        tracing::debug!(
            model = %self.model,
            tokens = outcome.tokens,
            finish = ?outcome.finish,
            "generation finished"
        );
        Ok(outcome)
    }
}

/// Forward `response` fields of an NDJSON stream until `done` or a limit.
fn read_stream<R: BufRead>(
    reader: R,
    bounded: &mut BoundedTokens<'_>,
    on_token: &mut dyn FnMut(&str),
) -> Result<()> {
    for line in reader.lines() {
        let line = line.map_err(|e| BuddyError::Generation {
            message: format!("stream read failed: {}", e),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let chunk: GenerateChunk = serde_json::from_str(&line).map_err(|e| BuddyError::Generation {
            message: format!("invalid stream chunk: {}", e),
        })?;
        if let Some(error) = chunk.error {
            return Err(BuddyError::Generation { message: error });
        }
        if !chunk.response.is_empty() && !bounded.accept(&chunk.response, on_token) {
            break;
        }
        if chunk.done {
            break;
        }
    }
    Ok(())
}
