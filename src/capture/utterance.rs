//! Voice-activity-gated utterance capture.

use crate::audio::clock::Clock;
use crate::audio::frame::{Frame, FrameSource};
use crate::audio::vad::VoiceActivityClassifier;
use crate::config::CaptureConfig;
use crate::error::Result;
use std::time::Duration;

/// Frames captured after a wake trigger, in arrival order.
///
/// Sealed once capture ends; the next stage takes it by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    frames: Vec<Frame>,
    sample_rate: u32,
}

impl Utterance {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            frames: Vec::new(),
            sample_rate,
        }
    }

    pub fn from_frames(frames: Vec<Frame>, sample_rate: u32) -> Self {
        Self {
            frames,
            sample_rate,
        }
    }

    fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.iter().all(Frame::is_empty)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// All samples, concatenated.
    pub fn samples(&self) -> Vec<i16> {
        let total = self.frames.iter().map(Frame::len).sum();
        let mut samples = Vec::with_capacity(total);
        for frame in &self.frames {
            samples.extend_from_slice(frame.samples());
        }
        samples
    }

    pub fn duration(&self) -> Duration {
        self.frames
            .iter()
            .map(|frame| frame.duration(self.sample_rate))
            .sum()
    }
}

/// Timing limits for one capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureLimits {
    /// Silence after onset that ends the utterance.
    pub silence_threshold: Duration,
    /// Hard cap on the whole capture.
    pub max_listen_time: Duration,
    /// Continuous speech needed before silence starts to count.
    pub onset_delay: Duration,
}

impl From<&CaptureConfig> for CaptureLimits {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            silence_threshold: Duration::from_millis(config.silence_threshold_ms),
            max_listen_time: Duration::from_millis(config.max_listen_ms),
            onset_delay: Duration::from_millis(config.speech_onset_ms),
        }
    }
}

impl Default for CaptureLimits {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

/// Why a capture stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEnd {
    /// Trailing silence after speech onset reached the threshold.
    Silence,
    /// `max_listen_time` elapsed.
    MaxListen,
    /// The frame source ran dry.
    StreamEnded,
}

/// Result of [`capture_utterance`].
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub utterance: Utterance,
    pub end: CaptureEnd,
    /// Whether speech onset was ever reached.
    pub speech_started: bool,
}

/// Classify a frame, re-chunking it when its length differs from what the
/// classifier accepts. A frame is speech if any full chunk is.
fn classify<V: VoiceActivityClassifier + ?Sized>(vad: &mut V, frame: &Frame) -> bool {
    let expected = vad.frame_length();
    if expected == 0 || frame.len() == expected {
        return vad.process(frame.samples());
    }
    let mut speech = false;
    for chunk in frame.samples().chunks_exact(expected) {
        speech |= vad.process(chunk);
    }
    speech
}

/// Capture one utterance.
///
/// Every frame read is kept, speech or not. Capture ends on trailing silence
/// after onset, on `max_listen_time` (measured with `clock`), or when the
/// source is exhausted; none of these is an error. Only a failing frame
/// source returns `Err`.
pub fn capture_utterance<S, V, C>(
    source: &mut S,
    vad: &mut V,
    clock: &C,
    limits: &CaptureLimits,
) -> Result<CaptureOutcome>
where
    S: FrameSource + ?Sized,
    V: VoiceActivityClassifier + ?Sized,
    C: Clock + ?Sized,
{
    let sample_rate = source.sample_rate();
    let mut utterance = Utterance::new(sample_rate);
    let mut speaking = false;
    let mut speech_started = false;
    let mut speech_duration = Duration::ZERO;
    let mut silence_duration = Duration::ZERO;
    let start = clock.now();

    let end = loop {
        let Some(frame) = source.read()? else {
            break CaptureEnd::StreamEnded;
        };
        let frame_duration = frame.duration(sample_rate);
        let is_speech = classify(vad, &frame);
        utterance.push(frame);

        if is_speech {
            if !speaking {
                tracing::debug!("speech detected");
                speaking = true;
                speech_duration = Duration::ZERO;
            }
            speech_duration += frame_duration;
            if speech_duration >= limits.onset_delay {
                speech_started = true;
            }
            silence_duration = Duration::ZERO;
        } else {
            speaking = false;
            if speech_started {
                silence_duration += frame_duration;
                tracing::trace!(silence_ms = silence_duration.as_millis() as u64, "silence");
                if silence_duration >= limits.silence_threshold {
                    break CaptureEnd::Silence;
                }
            }
        }

        if clock.now().duration_since(start) >= limits.max_listen_time {
            tracing::debug!("max listen time reached");
            break CaptureEnd::MaxListen;
        }
    };

    tracing::debug!(
        frames = utterance.frame_count(),
        reason = ?end,
        speech_started,
        "utterance captured"
    );

    Ok(CaptureOutcome {
        utterance,
        end,
        speech_started,
    })
}
