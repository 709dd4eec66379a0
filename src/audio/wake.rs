//! Wake phrase detection.
//!
//! The gate sees every frame while the assistant is idle and reports the frame
//! on which the wake phrase completes.

use crate::audio::frame::Frame;
use crate::audio::vad::calculate_rms;
use crate::config::WakeConfig;
use crate::stt::transcriber::{Transcriber, normalize};
use std::collections::HashSet;

/// Per-frame wake phrase trigger.
pub trait WakeWordGate: Send {
    /// Returns `true` on the frame that completes a wake phrase.
    fn process(&mut self, frame: &Frame) -> bool;

    /// Forget any partially collected audio.
    fn reset(&mut self) {}
}

impl<T: WakeWordGate + ?Sized> WakeWordGate for Box<T> {
    fn process(&mut self, frame: &Frame) -> bool {
        (**self).process(frame)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Segment limits for [`TranscribingWakeGate`], in samples.
#[derive(Debug, Clone)]
pub struct WakeGateConfig {
    pub phrases: Vec<String>,
    pub energy_threshold: f32,
    pub min_speech_samples: usize,
    pub trailing_silence_samples: usize,
    pub max_segment_samples: usize,
}

impl WakeGateConfig {
    pub fn from_config(config: &WakeConfig, sample_rate: u32) -> Self {
        let samples = |ms: u64| (ms * u64::from(sample_rate) / 1000) as usize;
        Self {
            phrases: config.phrases.clone(),
            energy_threshold: config.energy_threshold,
            min_speech_samples: samples(config.min_speech_ms),
            trailing_silence_samples: samples(config.trailing_silence_ms),
            max_segment_samples: samples(config.max_segment_ms),
        }
    }
}

/// Energy-gated segments checked for the wake phrase by a transcriber.
///
/// A segment opens on the first frame above the energy threshold and closes
/// after enough trailing silence or at the maximum segment length. Closed
/// segments with enough voiced audio are transcribed.
pub struct TranscribingWakeGate<T: Transcriber> {
    transcriber: T,
    config: WakeGateConfig,
    phrases: Vec<String>,
    segment: Vec<i16>,
    voiced_samples: usize,
    silence_samples: usize,
}

impl<T: Transcriber> TranscribingWakeGate<T> {
    pub fn new(transcriber: T, config: WakeGateConfig) -> Self {
        let phrases: Vec<String> = config
            .phrases
            .iter()
            .map(|p| normalize(p))
            .filter(|p| !p.is_empty())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        tracing::debug!(?phrases, "wake gate initialized");
        Self {
            transcriber,
            config,
            phrases,
            segment: Vec::new(),
            voiced_samples: 0,
            silence_samples: 0,
        }
    }

    /// True while a candidate segment is open.
    pub fn is_collecting(&self) -> bool {
        !self.segment.is_empty()
    }

    /// Check a transcript for any configured wake phrase.
    pub fn matches(&self, transcript: &str) -> bool {
        let padded = format!(" {} ", normalize(transcript));
        self.phrases
            .iter()
            .any(|phrase| padded.contains(&format!(" {} ", phrase)))
    }

    fn close_segment(&mut self) -> bool {
        let segment = std::mem::take(&mut self.segment);
        let voiced = self.voiced_samples;
        self.voiced_samples = 0;
        self.silence_samples = 0;

        if voiced < self.config.min_speech_samples {
            tracing::trace!(voiced, "wake segment too short");
            return false;
        }

        match self.transcriber.transcribe(&segment) {
            Ok(transcript) => {
                let triggered = self.matches(&transcript.text);
                if triggered {
                    tracing::info!(transcript = %transcript.text, "wake phrase detected");
                } else {
                    tracing::debug!(transcript = %transcript.text, "no wake phrase");
                }
                triggered
            }
            Err(e) => {
                tracing::warn!(error = %e, "wake segment transcription failed");
                false
            }
        }
    }
}

impl<T: Transcriber> WakeWordGate for TranscribingWakeGate<T> {
    fn process(&mut self, frame: &Frame) -> bool {
        let voiced = calculate_rms(frame.samples()) > self.config.energy_threshold;

        if self.segment.is_empty() {
            if !voiced {
                return false;
            }
            tracing::trace!("wake candidate opened");
        }

        self.segment.extend_from_slice(frame.samples());
        if voiced {
            self.voiced_samples += frame.len();
            self.silence_samples = 0;
        } else {
            self.silence_samples += frame.len();
        }

        if self.silence_samples >= self.config.trailing_silence_samples
            || self.segment.len() >= self.config.max_segment_samples
        {
            return self.close_segment();
        }
        false
    }

    fn reset(&mut self) {
        self.segment.clear();
        self.voiced_samples = 0;
        self.silence_samples = 0;
    }
}

/// Gate that triggers on chosen frame indices.
#[derive(Debug, Clone, Default)]
pub struct ScriptedWakeGate {
    triggers: HashSet<usize>,
    frames_seen: usize,
}

impl ScriptedWakeGate {
    /// Trigger on the given zero-based frame indices (counted across calls).
    pub fn triggering_at(indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            triggers: indices.into_iter().collect(),
            frames_seen: 0,
        }
    }

    pub fn frames_seen(&self) -> usize {
        self.frames_seen
    }
}

impl WakeWordGate for ScriptedWakeGate {
    fn process(&mut self, _frame: &Frame) -> bool {
        let index = self.frames_seen;
        self.frames_seen += 1;
        self.triggers.contains(&index)
    }
}
