//! Error types for buddy.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuddyError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Transcription errors
    #[error("Transcription model not found at {path}")]
    TranscriptionModelNotFound { path: String },

    #[error("Transcription failed: {message}")]
    Transcription { message: String },

    // Generation errors
    #[error("Response generation failed: {message}")]
    Generation { message: String },

    // Speech output errors
    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String },

    // Device (LED, display) errors
    #[error("Device {device} failed: {message}")]
    Device { device: String, message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, BuddyError>;

/// Failure reading a remote sensor.
///
/// `NotFound` is distinguished so callers can list the sensors that do exist.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    #[error("sensor {name} not found")]
    NotFound { name: String },

    #[error("{message}")]
    Unavailable { message: String },

    #[error("{message}")]
    Malformed { message: String },
}

impl SensorError {
    /// Short class name used in spoken error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFound",
            Self::Unavailable { .. } => "Unavailable",
            Self::Malformed { .. } => "Malformed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_invalid_value_display() {
        let error = BuddyError::ConfigInvalidValue {
            key: "audio.frame_length".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for audio.frame_length: must be positive"
        );
    }

    #[test]
    fn test_audio_device_not_found_display() {
        let error = BuddyError::AudioDeviceNotFound {
            device: "PCM2902".to_string(),
        };
        assert_eq!(error.to_string(), "Audio device not found: PCM2902");
    }

    #[test]
    fn test_transcription_model_not_found_display() {
        let error = BuddyError::TranscriptionModelNotFound {
            path: "/models/ggml-base.en.bin".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Transcription model not found at /models/ggml-base.en.bin"
        );
    }

    #[test]
    fn test_generation_display() {
        let error = BuddyError::Generation {
            message: "connection refused".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Response generation failed: connection refused"
        );
    }

    #[test]
    fn test_device_display() {
        let error = BuddyError::Device {
            device: "led".to_string(),
            message: "pwm0 not exported".to_string(),
        };
        assert_eq!(error.to_string(), "Device led failed: pwm0 not exported");
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: BuddyError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: BuddyError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: BuddyError = io_error.into();

        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_sensor_error_kind_and_display() {
        let error = SensorError::Unavailable {
            message: "connection refused".to_string(),
        };
        assert_eq!(error.kind(), "Unavailable");
        assert_eq!(error.to_string(), "connection refused");

        let error = SensorError::NotFound {
            name: "DHT22".to_string(),
        };
        assert_eq!(error.kind(), "NotFound");
        assert_eq!(error.to_string(), "sensor DHT22 not found");
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<BuddyError>();
        assert_sync::<BuddyError>();
    }
}
