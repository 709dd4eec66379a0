use crate::defaults;
use crate::error::{BuddyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub wake: WakeConfig,
    pub capture: CaptureConfig,
    pub intent: IntentConfig,
    pub stt: SttConfig,
    pub llm: LlmConfig,
    pub speech: SpeechConfig,
    pub sensors: SensorConfig,
    pub led: LedConfig,
    pub display: DisplayConfig,
    pub conversation: ConversationConfig,
}

/// Microphone configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Exact device name; overrides the hint search when set.
    pub device: Option<String>,
    pub mic_name_hints: Vec<String>,
    pub sample_rate: u32,
    pub frame_length: usize,
}

/// Wake phrase detection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WakeConfig {
    pub phrases: Vec<String>,
    pub energy_threshold: f32,
    pub min_speech_ms: u64,
    pub trailing_silence_ms: u64,
    pub max_segment_ms: u64,
}

/// Utterance capture limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    pub silence_threshold_ms: u64,
    pub max_listen_ms: u64,
    pub speech_onset_ms: u64,
    pub vad_threshold: f32,
}

/// One phrase-grammar rule for the built-in intent engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntentRule {
    pub intent: String,
    pub phrases: Vec<String>,
    #[serde(default)]
    pub slots: Vec<String>,
}

/// Intent engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IntentConfig {
    pub frame_length: usize,
    pub endpoint_silence_ms: u64,
    pub rules: Vec<IntentRule>,
    /// Slot name → accepted values
    pub vocabulary: BTreeMap<String, Vec<String>>,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    pub model_path: PathBuf,
    pub language: String,
    pub threads: Option<usize>,
}

/// Language model configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub url: String,
    pub model: String,
    pub system_prompt: String,
    pub completion_token_limit: usize,
    pub stop_phrases: Vec<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

/// Speech output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeechConfig {
    pub piper_binary: String,
    pub piper_model: PathBuf,
    pub piper_config: PathBuf,
    pub player_binary: String,
    pub playback_rate: u32,
}

/// Robot sensor gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SensorConfig {
    pub url: String,
    pub timeout_secs: u64,
}

/// Per-channel LED brightness compensation (0.0 to 1.0)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LedBrightness {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

/// RGB LED on sysfs PWM channels
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LedConfig {
    pub pwm_chip: u32,
    pub red_channel: u32,
    pub green_channel: u32,
    pub blue_channel: u32,
    pub period_ns: u64,
    pub brightness: LedBrightness,
}

/// Face display renderer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    pub command: String,
    pub args: Vec<String>,
}

/// Conversation window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConversationConfig {
    pub cooldown_secs: u64,
    /// Keep listening for follow-ups until the cooldown expires.
    pub continuous_mode: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            mic_name_hints: defaults::MIC_NAME_HINTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            sample_rate: defaults::SAMPLE_RATE,
            frame_length: defaults::FRAME_LENGTH,
        }
    }
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            phrases: vec![defaults::WAKE_PHRASE.to_string()],
            energy_threshold: defaults::WAKE_ENERGY_THRESHOLD,
            min_speech_ms: defaults::WAKE_MIN_SPEECH_MS,
            trailing_silence_ms: defaults::WAKE_TRAILING_SILENCE_MS,
            max_segment_ms: defaults::WAKE_MAX_SEGMENT_MS,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            silence_threshold_ms: defaults::SILENCE_THRESHOLD_MS,
            max_listen_ms: defaults::MAX_LISTEN_MS,
            speech_onset_ms: defaults::SPEECH_ONSET_MS,
            vad_threshold: defaults::VAD_THRESHOLD,
        }
    }
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            frame_length: defaults::INTENT_FRAME_LENGTH,
            endpoint_silence_ms: defaults::INTENT_ENDPOINT_SILENCE_MS,
            rules: default_intent_rules(),
            vocabulary: default_vocabulary(),
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(defaults::WHISPER_MODEL_PATH),
            language: defaults::LANGUAGE.to_string(),
            threads: None,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: defaults::LLM_URL.to_string(),
            model: defaults::LLM_MODEL.to_string(),
            system_prompt: defaults::SYSTEM_PROMPT.to_string(),
            completion_token_limit: defaults::COMPLETION_TOKEN_LIMIT,
            stop_phrases: defaults::STOP_PHRASES.iter().map(|s| s.to_string()).collect(),
            temperature: 0.0,
            timeout_secs: defaults::LLM_TIMEOUT_SECS,
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            piper_binary: "piper".to_string(),
            piper_model: PathBuf::from(defaults::PIPER_MODEL),
            piper_config: PathBuf::from(defaults::PIPER_CONFIG),
            player_binary: "aplay".to_string(),
            playback_rate: defaults::PLAYBACK_RATE,
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            url: defaults::SENSOR_URL.to_string(),
            timeout_secs: defaults::SENSOR_TIMEOUT_SECS,
        }
    }
}

impl Default for LedBrightness {
    fn default() -> Self {
        Self {
            red: defaults::LED_BRIGHTNESS_RED,
            green: defaults::LED_BRIGHTNESS_GREEN,
            blue: defaults::LED_BRIGHTNESS_BLUE,
        }
    }
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            pwm_chip: defaults::LED_PWM_CHIP,
            red_channel: 0,
            green_channel: 1,
            blue_channel: 2,
            period_ns: defaults::LED_PERIOD_NS,
            brightness: LedBrightness::default(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            command: defaults::DISPLAY_COMMAND.to_string(),
            args: Vec::new(),
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: defaults::COOLDOWN_SECS,
            continuous_mode: false,
        }
    }
}

fn rule(intent: &str, phrases: &[&str], slots: &[&str]) -> IntentRule {
    IntentRule {
        intent: intent.to_string(),
        phrases: phrases.iter().map(|s| s.to_string()).collect(),
        slots: slots.iter().map(|s| s.to_string()).collect(),
    }
}

/// Home-assistant grammar. Order matters: the first matching rule wins.
pub fn default_intent_rules() -> Vec<IntentRule> {
    vec![
        rule(
            "showTemperature",
            &["temperature", "how warm", "how cold", "how hot"],
            &["room"],
        ),
        rule("showHumidity", &["humidity", "how humid"], &["room"]),
        rule(
            "showLightIntensity",
            &["light intensity", "light level", "how bright"],
            &["room"],
        ),
        rule(
            "changeFace",
            &["face", "expression", "look happy", "look sad", "look angry"],
            &["expression"],
        ),
        rule(
            "changeLeds",
            &["led", "leds", "colour", "color", "lights to", "light to"],
            &["shade", "colour"],
        ),
        rule(
            "turnLight",
            &["turn on", "turn off", "switch on", "switch off"],
            &["state", "room"],
        ),
        rule("setTimer", &["timer"], &["duration"]),
    ]
}

fn words(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Slot vocabulary matching the default grammar.
pub fn default_vocabulary() -> BTreeMap<String, Vec<String>> {
    let mut vocabulary = BTreeMap::new();
    vocabulary.insert(
        "room".to_string(),
        words(&[
            "living room",
            "kitchen",
            "bedroom",
            "bathroom",
            "office",
            "garden",
            "outside",
            "inside",
        ]),
    );
    vocabulary.insert("shade".to_string(), words(&["light", "dark"]));
    vocabulary.insert(
        "colour".to_string(),
        words(&[
            "red", "white", "pink", "purple", "orange", "yellow", "green", "blue",
        ]),
    );
    vocabulary.insert("expression".to_string(), words(&["happy", "angry", "sad"]));
    vocabulary.insert("state".to_string(), words(&["on", "off"]));
    vocabulary
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BuddyError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                BuddyError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only a missing file falls back to defaults; invalid TOML is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(BuddyError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - BUDDY_DEVICE → audio.device
    /// - BUDDY_WHISPER_MODEL → stt.model_path
    /// - BUDDY_OLLAMA_URL → llm.url
    /// - BUDDY_OLLAMA_MODEL → llm.model
    /// - BUDDY_SENSOR_URL → sensors.url
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(device) = non_empty_env("BUDDY_DEVICE") {
            self.audio.device = Some(device);
        }
        if let Some(model) = non_empty_env("BUDDY_WHISPER_MODEL") {
            self.stt.model_path = PathBuf::from(model);
        }
        if let Some(url) = non_empty_env("BUDDY_OLLAMA_URL") {
            self.llm.url = url;
        }
        if let Some(model) = non_empty_env("BUDDY_OLLAMA_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = non_empty_env("BUDDY_SENSOR_URL") {
            self.sensors.url = url;
        }
        self
    }

    /// Reject values that would make the pipeline misbehave at runtime.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: &str) -> BuddyError {
            BuddyError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            }
        }

        if self.audio.sample_rate == 0 {
            return Err(invalid("audio.sample_rate", "must be positive"));
        }
        if self.audio.frame_length == 0 {
            return Err(invalid("audio.frame_length", "must be positive"));
        }
        if self.intent.frame_length == 0 {
            return Err(invalid("intent.frame_length", "must be positive"));
        }
        if self.capture.max_listen_ms == 0 {
            return Err(invalid("capture.max_listen_ms", "must be positive"));
        }
        if self.capture.silence_threshold_ms == 0 {
            return Err(invalid("capture.silence_threshold_ms", "must be positive"));
        }
        if self.wake.phrases.iter().all(|p| p.trim().is_empty()) {
            return Err(invalid("wake.phrases", "at least one wake phrase is required"));
        }
        if self.llm.completion_token_limit == 0 {
            return Err(invalid("llm.completion_token_limit", "must be positive"));
        }
        for (key, value) in [
            ("led.brightness.red", self.led.brightness.red),
            ("led.brightness.green", self.led.brightness.green),
            ("led.brightness.blue", self.led.brightness.blue),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(key, "must be between 0.0 and 1.0"));
            }
        }
        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| BuddyError::Other(e.to_string()))
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/buddy/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("buddy")
            .join("config.toml")
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}
