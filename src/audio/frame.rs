//! Fixed-length PCM frames and the sources that produce them.

use crate::audio::clock::MockClock;
use crate::error::{BuddyError, Result};
use std::collections::VecDeque;
use std::time::Duration;

/// A fixed-length block of 16-bit mono samples.
///
/// Immutable once read from a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    samples: Vec<i16>,
}

impl Frame {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    /// A frame of `length` identical samples.
    pub fn filled(length: usize, value: i16) -> Self {
        Self::new(vec![value; length])
    }

    pub fn silence(length: usize) -> Self {
        Self::filled(length, 0)
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback duration of this frame at `sample_rate`.
    pub fn duration(&self, sample_rate: u32) -> Duration {
        if sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.samples.len() as u64 * 1_000_000_000 / u64::from(sample_rate))
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }
}

impl From<Vec<i16>> for Frame {
    fn from(samples: Vec<i16>) -> Self {
        Self::new(samples)
    }
}

/// Blocking source of fixed-length frames.
pub trait FrameSource: Send {
    /// Samples per frame. Every frame returned by `read` has exactly this length.
    fn frame_length(&self) -> usize;

    fn sample_rate(&self) -> u32;

    /// Blocks until the next full frame is available.
    ///
    /// Returns `Ok(None)` once a finite source is exhausted.
    fn read(&mut self) -> Result<Option<Frame>>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn frame_length(&self) -> usize {
        (**self).frame_length()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        (**self).read()
    }
}

/// Re-chunks arbitrary sample blocks into frames of one fixed length.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    frame_length: usize,
    pending: Vec<i16>,
}

impl FrameAssembler {
    pub fn new(frame_length: usize) -> Self {
        Self {
            frame_length: frame_length.max(1),
            pending: Vec::with_capacity(frame_length * 2),
        }
    }

    /// Append samples and return every frame they complete, in order.
    pub fn push(&mut self, samples: &[i16]) -> Vec<Frame> {
        self.pending.extend_from_slice(samples);
        let complete = self.pending.len() / self.frame_length * self.frame_length;
        if complete == 0 {
            return Vec::new();
        }
        let frames = self.pending[..complete]
            .chunks_exact(self.frame_length)
            .map(|chunk| Frame::new(chunk.to_vec()))
            .collect();
        self.pending.drain(..complete);
        frames
    }

    /// Samples waiting for a full frame.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Zero-pad the leftover samples into a final frame, if any.
    pub fn finish_padded(&mut self) -> Option<Frame> {
        if self.pending.is_empty() {
            return None;
        }
        let mut samples = std::mem::take(&mut self.pending);
        samples.resize(self.frame_length, 0);
        Some(Frame::new(samples))
    }
}

/// Scripted frame source for tests.
///
/// When given a [`MockClock`], each successful read advances it by one frame
/// duration so time-bounded code sees audio time pass.
#[derive(Debug, Clone)]
pub struct MockFrameSource {
    frame_length: usize,
    sample_rate: u32,
    frames: VecDeque<Frame>,
    clock: Option<MockClock>,
    fail_after: Option<usize>,
    reads: usize,
}

impl MockFrameSource {
    pub fn new(frame_length: usize, sample_rate: u32) -> Self {
        Self {
            frame_length,
            sample_rate,
            frames: VecDeque::new(),
            clock: None,
            fail_after: None,
            reads: 0,
        }
    }

    /// Queue frames; each is padded or truncated to the frame length.
    pub fn with_frames(mut self, frames: impl IntoIterator<Item = Frame>) -> Self {
        for frame in frames {
            let mut samples = frame.into_samples();
            samples.resize(self.frame_length, 0);
            self.frames.push_back(Frame::new(samples));
        }
        self
    }

    /// Queue `count` frames of constant amplitude.
    pub fn with_constant(self, count: usize, amplitude: i16) -> Self {
        let length = self.frame_length;
        self.with_frames((0..count).map(|_| Frame::filled(length, amplitude)))
    }

    pub fn with_clock(mut self, clock: MockClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Fail every read after `reads` successful ones.
    pub fn with_failure_after(mut self, reads: usize) -> Self {
        self.fail_after = Some(reads);
        self
    }

    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl FrameSource for MockFrameSource {
    fn frame_length(&self) -> usize {
        self.frame_length
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        if self.fail_after.is_some_and(|limit| self.reads >= limit) {
            return Err(BuddyError::AudioCapture {
                message: "Mock frame source failure".to_string(),
            });
        }
        let Some(frame) = self.frames.pop_front() else {
            return Ok(None);
        };
        self.reads += 1;
        if let Some(clock) = &self.clock {
            clock.advance(frame.duration(self.sample_rate));
        }
        Ok(Some(frame))
    }
}
