//! External device capabilities: remote sensors, the RGB LED and the face display.

pub mod display;
pub mod led;
pub mod sensor;

pub use display::CommandDisplay;
pub use led::PwmLed;
pub use sensor::HttpSensorClient;

use crate::error::{BuddyError, Result, SensorError};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// One reported sensor value.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadingValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for ReadingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{}", value),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<f64> for ReadingValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ReadingValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Reading key → value.
pub type SensorReadings = BTreeMap<String, ReadingValue>;

/// Remote sensors addressed by component name.
pub trait SensorCapability: Send {
    fn read(&self, name: &str) -> std::result::Result<SensorReadings, SensorError>;

    /// Names of the sensors currently reachable.
    fn available_names(&self) -> std::result::Result<Vec<String>, SensorError>;
}

/// RGB LED.
pub trait LedCapability: Send {
    fn set(&mut self, r: u8, g: u8, b: u8) -> Result<()>;
}

/// Face expressions the display can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceExpression {
    Happy,
    Angry,
    Sad,
}

impl FaceExpression {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Angry => "angry",
            Self::Sad => "sad",
        }
    }
}

impl fmt::Display for FaceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaceExpression {
    type Err = BuddyError;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "happy" => Ok(Self::Happy),
            "angry" => Ok(Self::Angry),
            "sad" => Ok(Self::Sad),
            other => Err(BuddyError::Other(format!("unknown expression: {}", other))),
        }
    }
}

/// Face display.
pub trait DisplayCapability: Send {
    /// Render an expression. Returns `false` if the display could not.
    fn show(&mut self, expression: FaceExpression) -> bool;
}

/// In-memory sensors for tests.
#[derive(Debug, Clone, Default)]
pub struct MockSensors {
    sensors: BTreeMap<String, SensorReadings>,
    failures: BTreeMap<String, SensorError>,
    reads: Arc<Mutex<Vec<String>>>,
}

impl MockSensors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reading(mut self, sensor: &str, key: &str, value: impl Into<ReadingValue>) -> Self {
        self.sensors
            .entry(sensor.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
        self
    }

    /// A sensor that exists but reports nothing.
    pub fn with_empty(mut self, sensor: &str) -> Self {
        self.sensors.entry(sensor.to_string()).or_default();
        self
    }

    pub fn with_failure(mut self, sensor: &str, error: SensorError) -> Self {
        self.failures.insert(sensor.to_string(), error);
        self
    }

    /// Sensor names read so far, shared across clones.
    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl SensorCapability for MockSensors {
    fn read(&self, name: &str) -> std::result::Result<SensorReadings, SensorError> {
        if let Ok(mut reads) = self.reads.lock() {
            reads.push(name.to_string());
        }
        if let Some(error) = self.failures.get(name) {
            return Err(error.clone());
        }
        self.sensors
            .get(name)
            .cloned()
            .ok_or_else(|| SensorError::NotFound {
                name: name.to_string(),
            })
    }

    fn available_names(&self) -> std::result::Result<Vec<String>, SensorError> {
        Ok(self.sensors.keys().cloned().collect())
    }
}

/// LED that records every colour it is set to.
#[derive(Debug, Clone, Default)]
pub struct RecordingLed {
    calls: Arc<Mutex<Vec<(u8, u8, u8)>>>,
}

impl RecordingLed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(u8, u8, u8)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl LedCapability for RecordingLed {
    fn set(&mut self, r: u8, g: u8, b: u8) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((r, g, b));
        }
        Ok(())
    }
}

/// Display that records every expression shown.
#[derive(Debug, Clone, Default)]
pub struct RecordingDisplay {
    shown: Arc<Mutex<Vec<FaceExpression>>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> Vec<FaceExpression> {
        self.shown.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl DisplayCapability for RecordingDisplay {
    fn show(&mut self, expression: FaceExpression) -> bool {
        if let Ok(mut shown) = self.shown.lock() {
            shown.push(expression);
        }
        true
    }
}
