//! Whisper-based speech-to-text transcription.
//!
//! Requires the `whisper` feature (and cmake to build whisper.cpp). Without it,
//! construction fails so a missing recognizer aborts startup.

use crate::config::SttConfig;
use crate::error::{BuddyError, Result};
#[cfg(feature = "whisper")]
use crate::stt::transcriber::WordTiming;
use crate::stt::transcriber::{Transcriber, Transcript};
use std::path::PathBuf;

#[cfg(feature = "whisper")]
use std::sync::{Mutex, Once};
#[cfg(feature = "whisper")]
use std::time::Duration;
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Configuration for Whisper transcriber.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    pub model_path: PathBuf,
    /// Language code (e.g., "en")
    pub language: String,
    /// Number of threads for inference (None = whisper.cpp default)
    pub threads: Option<usize>,
}

impl From<&SttConfig> for WhisperConfig {
    fn from(config: &SttConfig) -> Self {
        Self {
            model_path: config.model_path.clone(),
            language: config.language.clone(),
            threads: config.threads,
        }
    }
}

fn model_name_of(config: &WhisperConfig) -> String {
    config
        .model_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// Convert i16 samples to f32 in [-1.0, 1.0].
pub fn convert_audio(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&sample| sample as f32 / 32768.0)
        .collect()
}

/// whisper.cpp transcriber.
#[cfg(feature = "whisper")]
pub struct WhisperTranscriber {
    context: Mutex<WhisperContext>,
    config: WhisperConfig,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperTranscriber")
            .field("config", &self.config)
            .field("model_name", &self.model_name)
            .finish_non_exhaustive()
    }
}

/// Placeholder when built without the `whisper` feature.
#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperTranscriber {
    model_name: String,
}

#[cfg(feature = "whisper")]
impl WhisperTranscriber {
    /// Load the model.
    ///
    /// # Errors
    /// `TranscriptionModelNotFound` if the file is missing, `Transcription` if
    /// whisper.cpp rejects it.
    pub fn new(config: WhisperConfig) -> Result<Self> {
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        if !config.model_path.exists() {
            return Err(BuddyError::TranscriptionModelNotFound {
                path: config.model_path.display().to_string(),
            });
        }

        let model_name = model_name_of(&config);
        let path = config
            .model_path
            .to_str()
            .ok_or_else(|| BuddyError::Transcription {
                message: "Invalid UTF-8 in model path".to_string(),
            })?;
        let context = WhisperContext::new_with_params(path, WhisperContextParameters::default())
            .map_err(|e| BuddyError::Transcription {
                message: format!("Failed to load Whisper model: {}", e),
            })?;

        tracing::info!(model = %model_name, "Whisper model loaded");

        Ok(Self {
            context: Mutex::new(context),
            config,
            model_name,
        })
    }
}

#[cfg(not(feature = "whisper"))]
impl WhisperTranscriber {
    pub fn new(config: WhisperConfig) -> Result<Self> {
        if !config.model_path.exists() {
            return Err(BuddyError::TranscriptionModelNotFound {
                path: config.model_path.display().to_string(),
            });
        }
        Err(BuddyError::Transcription {
            message: format!(
                "Cannot load {}: this binary was built without speech recognition.\n\
                 To fix: cargo build --release --features whisper",
                model_name_of(&config)
            ),
        })
    }
}

#[cfg(feature = "whisper")]
fn centiseconds(value: i64) -> Duration {
    Duration::from_millis(value.max(0) as u64 * 10)
}

#[cfg(feature = "whisper")]
impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, audio: &[i16]) -> Result<Transcript> {
        let audio_f32 = convert_audio(audio);

        let context = self.context.lock().map_err(|e| BuddyError::Transcription {
            message: format!("Failed to acquire context lock: {}", e),
        })?;

        let mut state = context
            .create_state()
            .map_err(|e| BuddyError::Transcription {
                message: format!("Failed to create Whisper state: {}", e),
            })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(Some(&self.config.language));
        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, &audio_f32)
            .map_err(|e| BuddyError::Transcription {
                message: format!("Whisper inference failed: {}", e),
            })?;

        let mut text = String::new();
        let mut word_timings = Vec::new();
        for segment in state.as_iter() {
            let segment_text = segment.to_string();
            if !segment_text.trim().is_empty() {
                word_timings.push(WordTiming {
                    text: segment_text.trim().to_string(),
                    start: centiseconds(segment.start_timestamp()),
                    end: centiseconds(segment.end_timestamp()),
                });
            }
            text.push_str(&segment_text);
        }

        Ok(Transcript {
            text: text.trim().to_string(),
            word_timings,
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(not(feature = "whisper"))]
impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, _audio: &[i16]) -> Result<Transcript> {
        Err(BuddyError::Transcription {
            message: "Whisper feature not enabled".to_string(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
