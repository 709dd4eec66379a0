//! Phrase-grammar intent engine.
//!
//! Buffers chunks until speech is followed by an endpoint silence, transcribes
//! the buffer, then matches the transcript against ordered phrase rules and
//! fills slots from a vocabulary.

use crate::audio::vad::calculate_rms;
use crate::config::{IntentConfig, IntentRule};
use crate::intent::inference::{Inference, Slots};
use crate::intent::matcher::IntentEngine;
use crate::stt::transcriber::{Transcriber, Transcript, normalize};
use std::collections::BTreeMap;

const NUMBER_WORDS: &[(&str, u32)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("fifteen", 15),
    ("twenty", 20),
    ("thirty", 30),
    ("forty", 40),
    ("forty five", 45),
    ("sixty", 60),
    ("a", 1),
    ("an", 1),
];

const DURATION_UNITS: &[&str] = &[
    "second", "seconds", "minute", "minutes", "hour", "hours",
];

/// Rules and vocabulary, normalized once.
#[derive(Debug, Clone)]
pub struct Grammar {
    rules: Vec<IntentRule>,
    vocabulary: BTreeMap<String, Vec<String>>,
}

impl Grammar {
    pub fn new(rules: Vec<IntentRule>, vocabulary: BTreeMap<String, Vec<String>>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| IntentRule {
                phrases: rule.phrases.iter().map(|p| normalize(p)).collect(),
                ..rule
            })
            .collect();
        let vocabulary = vocabulary
            .into_iter()
            .map(|(slot, values)| (slot, values.iter().map(|v| normalize(v)).collect()))
            .collect();
        Self { rules, vocabulary }
    }

    pub fn from_config(config: &IntentConfig) -> Self {
        Self::new(config.rules.clone(), config.vocabulary.clone())
    }

    /// Match a transcript. The first rule with a phrase in the text wins.
    pub fn interpret(&self, transcript: &str) -> Inference {
        let text = normalize(transcript);
        if text.is_empty() {
            return Inference::not_understood();
        }
        let padded = format!(" {} ", text);

        let Some(rule) = self.rules.iter().find(|rule| {
            rule.phrases
                .iter()
                .any(|phrase| !phrase.is_empty() && padded.contains(&format!(" {} ", phrase)))
        }) else {
            return Inference::not_understood();
        };

        let mut slots = Slots::new();
        for slot in &rule.slots {
            let value = if slot == "duration" {
                find_duration(&text)
            } else {
                self.vocabulary
                    .get(slot)
                    .and_then(|values| last_match(&padded, values))
            };
            if let Some(value) = value {
                slots.insert(slot.clone(), value);
            }
        }
        Inference::understood(rule.intent.clone(), slots)
    }
}

/// Vocabulary value occurring last in the text; longer values win ties.
fn last_match(padded: &str, values: &[String]) -> Option<String> {
    values
        .iter()
        .filter(|value| !value.is_empty())
        .filter_map(|value| {
            padded
                .rfind(&format!(" {} ", value))
                .map(|position| (position + value.len(), value))
        })
        .max_by_key(|(end, value)| (*end, value.len()))
        .map(|(_, value)| value.clone())
}

/// `"<number> <unit>"` as spoken, e.g. "five minutes" or "10 seconds".
fn find_duration(text: &str) -> Option<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    for (index, word) in words.iter().enumerate() {
        if !DURATION_UNITS.contains(word) || index == 0 {
            continue;
        }
        if index >= 2 {
            let pair = format!("{} {}", words[index - 2], words[index - 1]);
            if NUMBER_WORDS.iter().any(|(name, _)| *name == pair) {
                return Some(format!("{} {}", pair, word));
            }
        }
        let number = words[index - 1];
        if number.parse::<u32>().is_ok() || NUMBER_WORDS.iter().any(|(name, _)| *name == number) {
            return Some(format!("{} {}", number, word));
        }
    }
    None
}

/// Endpointing settings in samples.
#[derive(Debug, Clone, Copy)]
pub struct Endpointing {
    pub frame_length: usize,
    pub energy_threshold: f32,
    pub endpoint_silence_samples: usize,
}

impl Endpointing {
    pub fn from_config(config: &IntentConfig, energy_threshold: f32, sample_rate: u32) -> Self {
        Self {
            frame_length: config.frame_length,
            energy_threshold,
            endpoint_silence_samples: (config.endpoint_silence_ms * u64::from(sample_rate) / 1000)
                as usize,
        }
    }
}

/// Intent engine built on a transcriber and a [`Grammar`].
pub struct GrammarIntentEngine<T: Transcriber> {
    transcriber: T,
    grammar: Grammar,
    endpointing: Endpointing,
    buffer: Vec<i16>,
    heard_speech: bool,
    silence_samples: usize,
    inference: Inference,
    transcript: Option<Transcript>,
}

impl<T: Transcriber> GrammarIntentEngine<T> {
    pub fn new(transcriber: T, grammar: Grammar, endpointing: Endpointing) -> Self {
        Self {
            transcriber,
            grammar,
            endpointing,
            buffer: Vec::new(),
            heard_speech: false,
            silence_samples: 0,
            inference: Inference::NotFinalized,
            transcript: None,
        }
    }

    fn finalize(&mut self) {
        let audio = std::mem::take(&mut self.buffer);
        self.heard_speech = false;
        self.silence_samples = 0;
        self.inference = match self.transcriber.transcribe(&audio) {
            Ok(transcript) => {
                let inference = self.grammar.interpret(&transcript.text);
                tracing::debug!(transcript = %transcript.text, ?inference, "grammar match");
                self.transcript = Some(transcript);
                inference
            }
            Err(e) => {
                tracing::warn!(error = %e, "intent transcription failed");
                Inference::not_understood()
            }
        };
    }
}

impl<T: Transcriber> IntentEngine for GrammarIntentEngine<T> {
    fn frame_length(&self) -> usize {
        self.endpointing.frame_length
    }

    fn process(&mut self, chunk: &[i16]) -> bool {
        self.buffer.extend_from_slice(chunk);
        if calculate_rms(chunk) > self.endpointing.energy_threshold {
            self.heard_speech = true;
            self.silence_samples = 0;
        } else if self.heard_speech {
            self.silence_samples += chunk.len();
        }

        if self.heard_speech && self.silence_samples >= self.endpointing.endpoint_silence_samples {
            self.finalize();
            return true;
        }
        false
    }

    fn get_inference(&mut self) -> Inference {
        std::mem::take(&mut self.inference)
    }

    fn take_transcript(&mut self) -> Option<Transcript> {
        self.transcript.take()
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.heard_speech = false;
        self.silence_samples = 0;
        self.inference = Inference::NotFinalized;
        self.transcript = None;
    }
}
