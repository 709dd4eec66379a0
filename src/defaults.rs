//! Default configuration constants for buddy.
//!
//! Shared by the configuration types and the built-in capability providers so
//! that a missing config file still yields a working assistant.

/// Default audio sample rate in Hz.
///
/// Every classifier in the pipeline (wake gate, VAD, intent engine, whisper)
/// expects 16kHz mono PCM.
pub const SAMPLE_RATE: u32 = 16000;

/// Samples per microphone frame (32ms at 16kHz).
pub const FRAME_LENGTH: usize = 512;

/// Samples per intent-engine chunk.
pub const INTENT_FRAME_LENGTH: usize = 512;

/// Name fragments of USB microphones preferred over the system default.
pub const MIC_NAME_HINTS: &[&str] = &["PCM2902", "USB", "Audio Codec"];

/// Devices containing this fragment are loopbacks, never microphones.
pub const MONITOR_DEVICE_MARKER: &str = "monitor";

/// Silence after speech onset that ends an utterance.
pub const SILENCE_THRESHOLD_MS: u64 = 400;

/// Hard cap on a single utterance capture.
pub const MAX_LISTEN_MS: u64 = 10_000;

/// Continuous speech required before trailing silence starts to count.
pub const SPEECH_ONSET_MS: u64 = 300;

/// RMS level (0.0 to 1.0) above which a frame counts as speech.
pub const VAD_THRESHOLD: f32 = 0.02;

/// Wake phrase matched by the transcribing wake gate.
pub const WAKE_PHRASE: &str = "hey buddy";

/// RMS level that opens a wake-phrase candidate segment.
pub const WAKE_ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum voiced audio in a wake candidate segment.
pub const WAKE_MIN_SPEECH_MS: u64 = 300;

/// Silence that closes a wake candidate segment.
pub const WAKE_TRAILING_SILENCE_MS: u64 = 500;

/// Longest wake candidate segment kept for transcription.
pub const WAKE_MAX_SEGMENT_MS: u64 = 3000;

/// Trailing silence after which the grammar intent engine endpoints.
pub const INTENT_ENDPOINT_SILENCE_MS: u64 = 300;

/// Default Ollama endpoint.
pub const LLM_URL: &str = "http://127.0.0.1:11434";

/// Default generation model.
pub const LLM_MODEL: &str = "phi";

/// Fixed system instruction for free-form responses.
pub const SYSTEM_PROMPT: &str = "You are Buddy, an offline home assistant. Be brief and helpful.";

/// Maximum number of tokens generated per response.
pub const COMPLETION_TOKEN_LIMIT: usize = 50;

/// Phrases that end generation.
pub const STOP_PHRASES: &[&str] = &["\n"];

/// Request timeout for the language model.
pub const LLM_TIMEOUT_SECS: u64 = 60;

/// Default Whisper model file.
pub const WHISPER_MODEL_PATH: &str = "models/ggml-base.en.bin";

/// Default transcription language.
pub const LANGUAGE: &str = "en";

/// Piper voice model.
pub const PIPER_MODEL: &str = "voices/en_GB-alan-medium.onnx";

/// Piper voice configuration.
pub const PIPER_CONFIG: &str = "voices/en_GB-alan-medium.onnx.json";

/// Raw PCM rate produced by the Piper voice.
pub const PLAYBACK_RATE: u32 = 22050;

/// Robot sensor gateway.
pub const SENSOR_URL: &str = "http://127.0.0.1:8080";

/// Timeout for a single sensor request.
pub const SENSOR_TIMEOUT_SECS: u64 = 5;

/// Room reported when the utterance names none.
pub const DEFAULT_ROOM: &str = "inside";

/// sysfs PWM chip driving the RGB LED.
pub const LED_PWM_CHIP: u32 = 0;

/// PWM period (800us, 1.25kHz).
pub const LED_PERIOD_NS: u64 = 800_000;

/// Per-channel brightness compensation (the green die is much brighter).
pub const LED_BRIGHTNESS_RED: f32 = 1.0;
pub const LED_BRIGHTNESS_GREEN: f32 = 0.40;
pub const LED_BRIGHTNESS_BLUE: f32 = 1.0;

/// External renderer for the face display.
pub const DISPLAY_COMMAND: &str = "buddy-face";

/// Wake-word cooldown window.
pub const COOLDOWN_SECS: u64 = 300;
