//! Microphone capture using CPAL (Cross-Platform Audio Library).

use crate::audio::frame::{Frame, FrameAssembler, FrameSource};
use crate::audio::wav::{mix_to_mono, resample};
use crate::defaults;
use crate::error::{BuddyError, Result};
use crate::sys::with_suppressed_stderr;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Frames buffered between the audio callback and the conversation loop.
const FRAME_QUEUE_DEPTH: usize = 256;

/// Input device as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDevice {
    pub name: String,
    /// Matches one of the microphone name hints.
    pub preferred: bool,
}

fn is_monitor(name: &str) -> bool {
    name.to_lowercase().contains(defaults::MONITOR_DEVICE_MARKER)
}

fn matches_hint(name: &str, hints: &[String]) -> bool {
    let lower = name.to_lowercase();
    hints.iter().any(|hint| lower.contains(&hint.to_lowercase()))
}

/// Pick a microphone from device names.
///
/// Order: exact configured name, first non-monitor device matching a hint,
/// first non-monitor device. `None` means "use the host default".
pub fn choose_device<'a>(
    names: &'a [String],
    configured: Option<&str>,
    hints: &[String],
) -> Result<Option<&'a str>> {
    if let Some(wanted) = configured {
        return names
            .iter()
            .find(|name| name.as_str() == wanted)
            .map(|name| Some(name.as_str()))
            .ok_or_else(|| BuddyError::AudioDeviceNotFound {
                device: wanted.to_string(),
            });
    }

    let candidates = || names.iter().filter(|name| !is_monitor(name));
    Ok(candidates()
        .find(|name| matches_hint(name, hints))
        .or_else(|| candidates().next())
        .map(String::as_str))
}

/// List capture devices, skipping loopback monitors.
pub fn list_devices(hints: &[String]) -> Result<Vec<InputDevice>> {
    let names = input_device_names()?;
    Ok(names
        .into_iter()
        .filter(|name| !is_monitor(name))
        .map(|name| InputDevice {
            preferred: matches_hint(&name, hints),
            name,
        })
        .collect())
}

fn input_device_names() -> Result<Vec<String>> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| BuddyError::AudioCapture {
                message: format!("Failed to enumerate input devices: {}", e),
            })?;
        Ok(devices.filter_map(|device| device.name().ok()).collect())
    })
}

fn open_device(configured: Option<&str>, hints: &[String]) -> Result<cpal::Device> {
    let names = input_device_names()?;
    let chosen = choose_device(&names, configured, hints)?.map(str::to_string);

    with_suppressed_stderr(|| {
        let host = cpal::default_host();
        if let Some(wanted) = chosen.as_deref()
            && let Ok(mut devices) = host.input_devices()
            && let Some(device) = devices.find(|d| d.name().is_ok_and(|n| n == wanted))
        {
            return Ok(device);
        }
        host.default_input_device()
            .ok_or_else(|| BuddyError::AudioDeviceNotFound {
                device: "default".to_string(),
            })
    })
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is created, paused and dropped only by the owning
/// `CpalFrameSource`, which is used from one thread at a time.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Callback-side state: re-chunks device buffers into frames and hands them
/// to the reader.
struct FrameSink {
    assembler: FrameAssembler,
    tx: Sender<Frame>,
    callbacks: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

impl FrameSink {
    fn accept(&mut self, mono: &[i16]) {
        self.callbacks.fetch_add(1, Ordering::Relaxed);
        for frame in self.assembler.push(mono) {
            if self.tx.try_send(frame).is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Live microphone as a blocking frame source.
///
/// Captures 16-bit mono at the pipeline rate when the device supports it,
/// otherwise at the device's native format with software conversion.
/// The stream is stopped when the source is dropped.
pub struct CpalFrameSource {
    device_name: String,
    stream: Option<SendableStream>,
    rx: Receiver<Frame>,
    frame_length: usize,
    sample_rate: u32,
    dropped: Arc<AtomicU64>,
    reported_drops: u64,
}

impl CpalFrameSource {
    /// Open the microphone and start streaming.
    ///
    /// # Errors
    /// `AudioDeviceNotFound` if no usable device exists, `AudioCapture` if
    /// the stream cannot be built or started.
    pub fn open(
        configured: Option<&str>,
        hints: &[String],
        frame_length: usize,
        sample_rate: u32,
    ) -> Result<Self> {
        let device = open_device(configured, hints)?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        let (tx, rx) = crossbeam_channel::bounded(FRAME_QUEUE_DEPTH);
        let callbacks = Arc::new(AtomicU64::new(0));
        let dropped = Arc::new(AtomicU64::new(0));

        let sink = || FrameSink {
            assembler: FrameAssembler::new(frame_length),
            tx: tx.clone(),
            callbacks: Arc::clone(&callbacks),
            dropped: Arc::clone(&dropped),
        };

        let stream = match build_preferred_stream(&device, sample_rate, sink) {
            Some(stream) => {
                play(&stream)?;
                // Some PipeWire-ALSA setups accept the config but never call back.
                std::thread::sleep(Duration::from_millis(200));
                if callbacks.load(Ordering::Relaxed) == 0 {
                    drop(stream);
                    while rx.try_recv().is_ok() {}
                    let native = build_native_stream(&device, sample_rate, sink())?;
                    play(&native)?;
                    native
                } else {
                    stream
                }
            }
            None => {
                let native = build_native_stream(&device, sample_rate, sink())?;
                play(&native)?;
                native
            }
        };

        tracing::info!(device = %device_name, frame_length, sample_rate, "microphone opened");

        Ok(Self {
            device_name,
            stream: Some(SendableStream(stream)),
            rx,
            frame_length,
            sample_rate,
            dropped,
            reported_drops: 0,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

fn play(stream: &cpal::Stream) -> Result<()> {
    stream.play().map_err(|e| BuddyError::AudioCapture {
        message: format!("Failed to start audio stream: {}", e),
    })
}

fn stream_error(err: cpal::StreamError) {
    tracing::error!(error = %err, "audio stream error");
}

/// Try i16 then f32 at the pipeline rate, mono.
fn build_preferred_stream(
    device: &cpal::Device,
    sample_rate: u32,
    sink: impl Fn() -> FrameSink,
) -> Option<cpal::Stream> {
    let config = cpal::StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let mut i16_sink = sink();
    if let Ok(stream) = device.build_input_stream(
        &config,
        move |data: &[i16], _: &cpal::InputCallbackInfo| i16_sink.accept(data),
        stream_error,
        None,
    ) {
        return Some(stream);
    }

    let mut f32_sink = sink();
    device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let converted: Vec<i16> = data.iter().map(|&s| f32_to_i16(s)).collect();
                f32_sink.accept(&converted);
            },
            stream_error,
            None,
        )
        .ok()
}

/// Capture at the device's default config and convert in software.
fn build_native_stream(
    device: &cpal::Device,
    target_rate: u32,
    mut sink: FrameSink,
) -> Result<cpal::Stream> {
    let default_config = device
        .default_input_config()
        .map_err(|e| BuddyError::AudioCapture {
            message: format!("Failed to query default input config: {}", e),
        })?;
    let native_rate = default_config.sample_rate().0;
    let channels = default_config.channels() as usize;
    let stream_config: cpal::StreamConfig = default_config.clone().into();

    tracing::info!(
        channels,
        native_rate,
        format = ?default_config.sample_format(),
        "using native audio format, converting in software"
    );

    let result = match default_config.sample_format() {
        cpal::SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let mono = mix_to_mono(data, channels);
                sink.accept(&resample(&mono, native_rate, target_rate));
            },
            stream_error,
            None,
        ),
        cpal::SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let samples: Vec<i16> = data.iter().map(|&s| f32_to_i16(s)).collect();
                let mono = mix_to_mono(&samples, channels);
                sink.accept(&resample(&mono, native_rate, target_rate));
            },
            stream_error,
            None,
        ),
        format => {
            return Err(BuddyError::AudioCapture {
                message: format!(
                    "Unsupported native sample format: {:?}. Try another device with --device.",
                    format
                ),
            });
        }
    };

    result.map_err(|e| BuddyError::AudioCapture {
        message: format!("Failed to build native stream: {}", e),
    })
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

impl FrameSource for CpalFrameSource {
    fn frame_length(&self) -> usize {
        self.frame_length
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        let frame = self.rx.recv().map_err(|_| BuddyError::AudioCapture {
            message: "Audio stream closed".to_string(),
        })?;

        let dropped = self.dropped.load(Ordering::Relaxed);
        if dropped > self.reported_drops {
            tracing::warn!(
                dropped = dropped - self.reported_drops,
                "microphone frames dropped, conversation loop fell behind"
            );
            self.reported_drops = dropped;
        }
        Ok(Some(frame))
    }
}

impl Drop for CpalFrameSource {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.0.pause() {
                tracing::warn!(error = %e, "failed to pause microphone stream");
            }
            tracing::debug!(device = %self.device_name, "microphone released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn hints() -> Vec<String> {
        names(defaults::MIC_NAME_HINTS)
    }

    #[test]
    fn test_choose_device_prefers_hint_match() {
        let devices = names(&["default", "Built-in Mic", "USB PnP Sound Device"]);
        let chosen = choose_device(&devices, None, &hints()).unwrap();
        assert_eq!(chosen, Some("USB PnP Sound Device"));
    }

    #[test]
    fn test_choose_device_skips_monitors() {
        let devices = names(&["Monitor of USB Audio", "Built-in Mic"]);
        let chosen = choose_device(&devices, None, &hints()).unwrap();
        assert_eq!(chosen, Some("Built-in Mic"));
    }

    #[test]
    fn test_choose_device_exact_configured_name() {
        let devices = names(&["USB PnP Sound Device", "PCM2902 Audio Codec"]);
        let chosen = choose_device(&devices, Some("PCM2902 Audio Codec"), &hints()).unwrap();
        assert_eq!(chosen, Some("PCM2902 Audio Codec"));
    }

    #[test]
    fn test_choose_device_missing_configured_name() {
        let devices = names(&["Built-in Mic"]);
        let result = choose_device(&devices, Some("PCM2902"), &hints());
        assert!(matches!(
            result,
            Err(BuddyError::AudioDeviceNotFound { device }) if device == "PCM2902"
        ));
    }

    #[test]
    fn test_choose_device_falls_back_to_host_default() {
        let devices = names(&["Monitor of Speakers"]);
        assert_eq!(choose_device(&devices, None, &hints()).unwrap(), None);
    }

    #[test]
    fn test_f32_conversion_clamps() {
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(0.0), 0);
    }

    #[test]
    fn test_frame_sink_counts_drops_when_full() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let dropped = Arc::new(AtomicU64::new(0));
        let mut sink = FrameSink {
            assembler: FrameAssembler::new(2),
            tx,
            callbacks: Arc::new(AtomicU64::new(0)),
            dropped: Arc::clone(&dropped),
        };
        sink.accept(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(rx.len(), 1);
        assert_eq!(dropped.load(Ordering::Relaxed), 2);
    }
}
