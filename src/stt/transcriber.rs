use crate::error::{BuddyError, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Timing of one recognized word or segment.
#[derive(Debug, Clone, PartialEq)]
pub struct WordTiming {
    pub text: String,
    pub start: Duration,
    pub end: Duration,
}

/// Text recognized in an utterance plus its timings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transcript {
    pub text: String,
    pub word_timings: Vec<WordTiming>,
}

impl Transcript {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            word_timings: Vec::new(),
        }
    }

    /// True when no words were recognized.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Lowercase, strip punctuation, collapse whitespace.
///
/// Phrase matching on transcripts compares normalized text on word boundaries.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Trait for speech-to-text transcription.
///
/// This trait allows swapping implementations (real Whisper vs mock).
pub trait Transcriber: Send + Sync {
    /// Transcribe 16-bit PCM mono audio at the pipeline sample rate.
    fn transcribe(&self, audio: &[i16]) -> Result<Transcript>;

    /// Get the name of the loaded model
    fn model_name(&self) -> &str;
}

/// Implement Transcriber for Arc<T> so the wake gate and the conversation
/// loop can share one loaded model.
impl<T: Transcriber + ?Sized> Transcriber for Arc<T> {
    fn transcribe(&self, audio: &[i16]) -> Result<Transcript> {
        (**self).transcribe(audio)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Mock transcriber for testing
///
/// Scripted responses are returned in order; once they run out every call
/// returns the default response.
#[derive(Debug, Clone)]
pub struct MockTranscriber {
    model_name: String,
    response: String,
    scripted: Arc<Mutex<VecDeque<String>>>,
    calls: Arc<Mutex<Vec<usize>>>,
    should_fail: bool,
}

impl MockTranscriber {
    /// Create a new mock transcriber with default settings
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            response: "mock transcription".to_string(),
            scripted: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            should_fail: false,
        }
    }

    /// Configure the mock to return a specific response
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Responses returned, one per call, before the default response.
    pub fn with_responses(self, responses: &[&str]) -> Self {
        if let Ok(mut scripted) = self.scripted.lock() {
            scripted.extend(responses.iter().map(|s| s.to_string()));
        }
        self
    }

    /// Configure the mock to fail on transcribe
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Sample counts of every audio buffer transcribed so far.
    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(&self, audio: &[i16]) -> Result<Transcript> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(audio.len());
        }
        if self.should_fail {
            return Err(BuddyError::Transcription {
                message: "mock transcription failure".to_string(),
            });
        }
        let text = self
            .scripted
            .lock()
            .ok()
            .and_then(|mut scripted| scripted.pop_front())
            .unwrap_or_else(|| self.response.clone());
        Ok(Transcript::new(text))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
