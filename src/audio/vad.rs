//! Voice Activity Detection (VAD).
//!
//! Per-frame speech/non-speech classification. The utterance capture loop owns
//! the timing logic; classifiers here only look at one frame at a time.

use crate::defaults;
use std::collections::VecDeque;

/// Classifies a single frame as speech or not.
pub trait VoiceActivityClassifier: Send {
    /// Frame length this classifier accepts.
    fn frame_length(&self) -> usize;

    /// Returns `true` if the frame contains speech.
    fn process(&mut self, frame: &[i16]) -> bool;
}

impl<T: VoiceActivityClassifier + ?Sized> VoiceActivityClassifier for Box<T> {
    fn frame_length(&self) -> usize {
        (**self).frame_length()
    }

    fn process(&mut self, frame: &[i16]) -> bool {
        (**self).process(frame)
    }
}

/// RMS threshold classifier.
#[derive(Debug, Clone)]
pub struct RmsVoiceActivity {
    threshold: f32,
    frame_length: usize,
    rejected: u64,
}

impl RmsVoiceActivity {
    pub fn new(threshold: f32, frame_length: usize) -> Self {
        Self {
            threshold,
            frame_length,
            rejected: 0,
        }
    }

    /// Number of frames rejected for having the wrong length.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

impl Default for RmsVoiceActivity {
    fn default() -> Self {
        Self::new(defaults::VAD_THRESHOLD, defaults::FRAME_LENGTH)
    }
}

impl VoiceActivityClassifier for RmsVoiceActivity {
    fn frame_length(&self) -> usize {
        self.frame_length
    }

    fn process(&mut self, frame: &[i16]) -> bool {
        if frame.len() != self.frame_length {
            self.rejected += 1;
            tracing::warn!(
                expected = self.frame_length,
                got = frame.len(),
                "VAD rejected frame of wrong length"
            );
            return false;
        }
        calculate_rms(frame) > self.threshold
    }
}

/// Classifier that replays a fixed verdict sequence, then a fallback.
#[derive(Debug, Clone)]
pub struct ScriptedVad {
    frame_length: usize,
    verdicts: VecDeque<bool>,
    fallback: bool,
    calls: usize,
}

impl ScriptedVad {
    pub fn new(frame_length: usize, verdicts: impl IntoIterator<Item = bool>) -> Self {
        Self {
            frame_length,
            verdicts: verdicts.into_iter().collect(),
            fallback: false,
            calls: 0,
        }
    }

    /// Verdict returned once the script runs out.
    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl VoiceActivityClassifier for ScriptedVad {
    fn frame_length(&self) -> usize {
        self.frame_length
    }

    fn process(&mut self, _frame: &[i16]) -> bool {
        self.calls += 1;
        self.verdicts.pop_front().unwrap_or(self.fallback)
    }
}

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// # Returns
/// Normalized RMS value (0.0 to 1.0), where:
/// - 0.0 represents silence
/// - ~0.707 represents a full-scale sine wave
/// - 1.0 represents maximum amplitude
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_silence_is_zero() {
        assert_eq!(calculate_rms(&[0i16; 1000]), 0.0);
    }

    #[test]
    fn test_rms_max_amplitude() {
        let rms = calculate_rms(&[i16::MAX; 1000]);
        assert!((rms - 1.0).abs() < 0.001, "RMS should be ~1.0, got {}", rms);
    }

    #[test]
    fn test_rms_mixed_positive_negative() {
        let mut mixed = vec![1000i16; 500];
        mixed.extend(vec![-1000i16; 500]);
        let rms = calculate_rms(&mixed);
        // ±1000 / 32767 ≈ 0.0305
        assert!(rms > 0.025 && rms < 0.035, "got {}", rms);
    }

    #[test]
    fn test_rms_vad_classifies_speech_and_silence() {
        let mut vad = RmsVoiceActivity::new(0.02, 512);
        assert!(vad.process(&[3000i16; 512]));
        assert!(!vad.process(&[0i16; 512]));
        assert!(!vad.process(&[100i16; 512]));
    }

    #[test]
    fn test_rms_vad_rejects_wrong_length() {
        let mut vad = RmsVoiceActivity::new(0.02, 512);
        assert!(!vad.process(&[3000i16; 400]));
        assert_eq!(vad.rejected(), 1);
    }

    #[test]
    fn test_scripted_vad_replays_then_falls_back() {
        let mut vad = ScriptedVad::new(4, [true, false]).with_fallback(true);
        assert!(vad.process(&[0; 4]));
        assert!(!vad.process(&[0; 4]));
        assert!(vad.process(&[0; 4]));
        assert_eq!(vad.calls(), 3);
    }

    #[test]
    fn test_boxed_classifier_delegates() {
        let mut vad: Box<dyn VoiceActivityClassifier> = Box::new(RmsVoiceActivity::default());
        assert_eq!(vad.frame_length(), defaults::FRAME_LENGTH);
        assert!(!vad.process(&[0i16; defaults::FRAME_LENGTH]));
    }
}
