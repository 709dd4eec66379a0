//! Response generator contract and the bounds every generator honours.

use crate::config::LlmConfig;
use crate::error::{BuddyError, Result};
use std::sync::{Arc, Mutex};

/// Hard caps on one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationLimits {
    pub token_limit: usize,
    pub stop_phrases: Vec<String>,
}

impl From<&LlmConfig> for GenerationLimits {
    fn from(config: &LlmConfig) -> Self {
        Self {
            token_limit: config.completion_token_limit,
            stop_phrases: config
                .stop_phrases
                .iter()
                .filter(|p| !p.is_empty())
                .cloned()
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The model ended the response itself.
    Completed,
    TokenLimit,
    StopPhrase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutcome {
    /// Text forwarded to the callback.
    pub text: String,
    pub tokens: usize,
    pub finish: FinishReason,
}

/// Streams response tokens for a prompt.
///
/// `on_token` is called synchronously, once per token, in generation order.
/// Hitting a limit ends the stream normally.
pub trait ResponseGenerator: Send {
    fn generate(
        &mut self,
        prompt: &str,
        limits: &GenerationLimits,
        on_token: &mut dyn FnMut(&str),
    ) -> Result<GenerationOutcome>;
}

impl<T: ResponseGenerator + ?Sized> ResponseGenerator for Box<T> {
    fn generate(
        &mut self,
        prompt: &str,
        limits: &GenerationLimits,
        on_token: &mut dyn FnMut(&str),
    ) -> Result<GenerationOutcome> {
        (**self).generate(prompt, limits, on_token)
    }
}

/// Single-exchange prompt: no history is carried between calls.
pub fn build_prompt(system_prompt: &str, transcript: &str) -> String {
    format!("{}\n\nUser: {}\nBuddy:", system_prompt, transcript.trim())
}

/// Applies [`GenerationLimits`] to a raw token stream.
///
/// A stop phrase ends the stream and only the text before it is forwarded.
/// A tail that could still grow into a stop phrase is held back until the
/// next token rules the match out or the stream finishes, so no part of a
/// phrase split across tokens reaches the callback.
#[derive(Debug)]
pub struct BoundedTokens<'a> {
    limits: &'a GenerationLimits,
    text: String,
    held: String,
    tokens: usize,
    finish: Option<FinishReason>,
}

impl<'a> BoundedTokens<'a> {
    pub fn new(limits: &'a GenerationLimits) -> Self {
        let finish = (limits.token_limit == 0).then_some(FinishReason::TokenLimit);
        Self {
            limits,
            text: String::new(),
            held: String::new(),
            tokens: 0,
            finish,
        }
    }

    /// Offer the next raw token. Returns `false` once the stream must end.
    pub fn accept(&mut self, token: &str, on_token: &mut dyn FnMut(&str)) -> bool {
        if self.finish.is_some() {
            return false;
        }
        self.tokens += 1;

        let combined = format!("{}{}", std::mem::take(&mut self.held), token);
        let stop_at = self
            .limits
            .stop_phrases
            .iter()
            .filter(|p| !p.is_empty())
            .filter_map(|p| combined.find(p.as_str()))
            .min();
        if let Some(at) = stop_at {
            self.forward(&combined[..at], on_token);
            self.finish = Some(FinishReason::StopPhrase);
            return false;
        }

        let split = self.partial_stop_start(&combined);
        self.forward(&combined[..split], on_token);
        self.held = combined[split..].to_string();

        if self.tokens >= self.limits.token_limit {
            self.release(on_token);
            self.finish = Some(FinishReason::TokenLimit);
            return false;
        }
        true
    }

    /// End the stream, forwarding any held tail that never became a stop phrase.
    pub fn finish(mut self, on_token: &mut dyn FnMut(&str)) -> GenerationOutcome {
        self.release(on_token);
        GenerationOutcome {
            text: self.text,
            tokens: self.tokens,
            finish: self.finish.unwrap_or(FinishReason::Completed),
        }
    }

    fn release(&mut self, on_token: &mut dyn FnMut(&str)) {
        let held = std::mem::take(&mut self.held);
        self.forward(&held, on_token);
    }

    fn forward(&mut self, text: &str, on_token: &mut dyn FnMut(&str)) {
        if text.is_empty() {
            return;
        }
        self.text.push_str(text);
        on_token(text);
    }

    /// Start of the longest suffix of `text` that is a proper prefix of a
    /// stop phrase, or `text.len()` when there is none.
    fn partial_stop_start(&self, text: &str) -> usize {
        text.char_indices()
            .map(|(i, _)| i)
            .find(|&i| {
                let tail = &text[i..];
                self.limits
                    .stop_phrases
                    .iter()
                    .any(|p| p.len() > tail.len() && p.starts_with(tail))
            })
            .unwrap_or(text.len())
    }
}

/// Generator that replays scripted tokens and records prompts.
#[derive(Debug, Clone, Default)]
pub struct MockGenerator {
    tokens: Vec<String>,
    fail: bool,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockGenerator {
    pub fn new(tokens: &[&str]) -> Self {
        Self {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Fail after streaming the scripted tokens.
    pub fn with_failure(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Prompts received so far, shared across clones.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl ResponseGenerator for MockGenerator {
    fn generate(
        &mut self,
        prompt: &str,
        limits: &GenerationLimits,
        on_token: &mut dyn FnMut(&str),
    ) -> Result<GenerationOutcome> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let mut bounded = BoundedTokens::new(limits);
        for token in &self.tokens {
            if !bounded.accept(token, on_token) {
                break;
            }
        }
        if self.fail {
            return Err(BuddyError::Generation {
                message: "scripted failure".to_string(),
            });
        }
        Ok(bounded.finish(on_token))
    }
}
