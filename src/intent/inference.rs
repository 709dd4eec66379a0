//! Intent engine results and the closed set of intents the dispatcher acts on.

use std::collections::BTreeMap;

/// Slot name → spoken value.
pub type Slots = BTreeMap<String, String>;

/// Output of an intent engine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Inference {
    /// The engine needs more audio.
    #[default]
    NotFinalized,
    /// The engine has decided. `intent` is `None` when the utterance was not
    /// understood.
    Finalized {
        intent: Option<String>,
        slots: Slots,
    },
}

impl Inference {
    pub fn understood(intent: impl Into<String>, slots: Slots) -> Self {
        Self::Finalized {
            intent: Some(intent.into()),
            slots,
        }
    }

    pub fn not_understood() -> Self {
        Self::Finalized {
            intent: None,
            slots: Slots::new(),
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self, Self::Finalized { .. })
    }

    /// Intent name and slots, if finalized with a non-empty intent.
    pub fn intent(&self) -> Option<(&str, &Slots)> {
        match self {
            Self::Finalized {
                intent: Some(name),
                slots,
            } if !name.trim().is_empty() => Some((name.as_str(), slots)),
            _ => None,
        }
    }
}

/// Sensor-backed query intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorQuery {
    Temperature,
    Humidity,
    LightIntensity,
}

impl SensorQuery {
    pub const ALL: [SensorQuery; 3] = [Self::Temperature, Self::Humidity, Self::LightIntensity];

    pub fn intent_name(self) -> &'static str {
        match self {
            Self::Temperature => "showTemperature",
            Self::Humidity => "showHumidity",
            Self::LightIntensity => "showLightIntensity",
        }
    }

    /// External sensor component that answers this query.
    pub fn sensor_name(self) -> &'static str {
        match self {
            Self::Temperature | Self::Humidity => "DHT22",
            Self::LightIntensity => "VEML7700",
        }
    }

    /// Key of the value in the sensor's readings.
    pub fn reading_key(self) -> &'static str {
        match self {
            Self::Temperature => "temperature_celsius",
            Self::Humidity => "humidity_percent",
            Self::LightIntensity => "lux",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::Temperature => "°C",
            Self::Humidity => "%",
            Self::LightIntensity => "lux",
        }
    }

    fn from_intent_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|q| q.intent_name() == name)
    }
}

/// A finalized intent with its slots resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    SensorQuery {
        query: SensorQuery,
        room: Option<String>,
    },
    ChangeLeds {
        shade: Option<String>,
        colour: Option<String>,
    },
    ChangeFace {
        expression: Option<String>,
    },
    TurnLight {
        state: Option<String>,
        room: Option<String>,
    },
    SetTimer {
        duration: Option<String>,
    },
    Other {
        name: String,
    },
}

impl Intent {
    /// Resolve an engine intent name and its slots.
    pub fn parse(name: &str, slots: &Slots) -> Self {
        let slot = |key: &str| slots.get(key).cloned();
        if let Some(query) = SensorQuery::from_intent_name(name) {
            return Self::SensorQuery {
                query,
                room: slot("room"),
            };
        }
        match name {
            "changeLeds" => Self::ChangeLeds {
                shade: slot("shade"),
                colour: slot("colour"),
            },
            "changeFace" => Self::ChangeFace {
                expression: slot("expression"),
            },
            "turnLight" => Self::TurnLight {
                state: slot("state"),
                room: slot("room"),
            },
            "setTimer" => Self::SetTimer {
                duration: slot("duration"),
            },
            other => Self::Other {
                name: other.to_string(),
            },
        }
    }

    /// Engine-facing intent name.
    pub fn name(&self) -> &str {
        match self {
            Self::SensorQuery { query, .. } => query.intent_name(),
            Self::ChangeLeds { .. } => "changeLeds",
            Self::ChangeFace { .. } => "changeFace",
            Self::TurnLight { .. } => "turnLight",
            Self::SetTimer { .. } => "setTimer",
            Self::Other { name } => name,
        }
    }
}
