//! WAV file frame source for replaying recorded sessions.

use crate::audio::frame::{Frame, FrameAssembler, FrameSource};
use crate::error::{BuddyError, Result};
use std::collections::VecDeque;
use std::io::Read;
use std::path::Path;

/// Frame source backed by a decoded WAV file.
///
/// Any sample rate and channel count is accepted; audio is mixed to mono and
/// resampled to the pipeline rate. The trailing partial frame is zero-padded.
pub struct WavFrameSource {
    frames: VecDeque<Frame>,
    frame_length: usize,
    sample_rate: u32,
}

impl WavFrameSource {
    /// Decode from any reader.
    pub fn from_reader<R: Read>(reader: R, frame_length: usize, sample_rate: u32) -> Result<Self> {
        let mut wav_reader = hound::WavReader::new(reader).map_err(|e| BuddyError::AudioCapture {
            message: format!("Failed to parse WAV file: {}", e),
        })?;

        let spec = wav_reader.spec();
        let raw_samples: Vec<i16> = match spec.sample_format {
            hound::SampleFormat::Int => wav_reader
                .samples::<i16>()
                .collect::<std::result::Result<Vec<_>, _>>(),
            hound::SampleFormat::Float => wav_reader
                .samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
                .collect::<std::result::Result<Vec<_>, _>>(),
        }
        .map_err(|e| BuddyError::AudioCapture {
            message: format!("Failed to read WAV samples: {}", e),
        })?;

        let mono = mix_to_mono(&raw_samples, spec.channels as usize);
        let samples = resample(&mono, spec.sample_rate, sample_rate);

        let mut assembler = FrameAssembler::new(frame_length);
        let mut frames: VecDeque<Frame> = assembler.push(&samples).into();
        if let Some(last) = assembler.finish_padded() {
            frames.push_back(last);
        }

        tracing::debug!(
            source_rate = spec.sample_rate,
            channels = spec.channels,
            frames = frames.len(),
            "WAV decoded"
        );

        Ok(Self {
            frames,
            frame_length,
            sample_rate,
        })
    }

    /// Decode a file on disk.
    pub fn open(path: &Path, frame_length: usize, sample_rate: u32) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| BuddyError::AudioCapture {
            message: format!("Failed to open {}: {}", path.display(), e),
        })?;
        Self::from_reader(std::io::BufReader::new(file), frame_length, sample_rate)
    }

    /// Frames not yet read.
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for WavFrameSource {
    fn frame_length(&self) -> usize {
        self.frame_length
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.pop_front())
    }
}

/// Average interleaved channels into one.
pub fn mix_to_mono(samples: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Simple linear interpolation resampling.
pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}
