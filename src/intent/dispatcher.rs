//! Maps finalized intents to device actions and spoken replies.

use crate::defaults::DEFAULT_ROOM;
use crate::devices::{
    DisplayCapability, FaceExpression, LedCapability, ReadingValue, SensorCapability,
    SensorReadings,
};
use crate::error::SensorError;
use crate::intent::inference::{Intent, SensorQuery, Slots};
use crate::intent::palette::{Colour, Rgb, Shade};
use crate::speech::Speaker;

const MISSING_SLOT: &str = "unknown";

/// What a dispatch did, for logging and tests.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Spoke(String),
    LedSet(Rgb),
    FaceShown(FaceExpression),
    /// Nothing to do (unknown colour or expression, or a device refused).
    Ignored,
}

/// Owns the device capabilities and a handle to the speech queue.
///
/// Every branch converts its failures into a spoken or logged outcome;
/// nothing escapes `dispatch`.
pub struct IntentActionDispatcher {
    sensors: Box<dyn SensorCapability>,
    led: Box<dyn LedCapability>,
    display: Box<dyn DisplayCapability>,
    speaker: Box<dyn Speaker>,
}

impl IntentActionDispatcher {
    pub fn new(
        sensors: Box<dyn SensorCapability>,
        led: Box<dyn LedCapability>,
        display: Box<dyn DisplayCapability>,
        speaker: Box<dyn Speaker>,
    ) -> Self {
        Self {
            sensors,
            led,
            display,
            speaker,
        }
    }

    pub fn dispatch(&mut self, intent: &str, slots: &Slots) -> DispatchOutcome {
        let parsed = Intent::parse(intent, slots);
        tracing::info!(intent = parsed.name(), ?slots, "dispatching intent");

        match parsed {
            Intent::SensorQuery { query, room } => {
                let text = self.sensor_reply(query, room.as_deref().unwrap_or(DEFAULT_ROOM));
                self.say(text)
            }
            Intent::ChangeLeds { shade, colour } => {
                self.change_leds(shade.as_deref(), colour.as_deref())
            }
            Intent::ChangeFace { expression } => self.change_face(expression.as_deref()),
            Intent::TurnLight { state, room } => self.say(format!(
                "Turning {} light in {}",
                state.as_deref().unwrap_or(MISSING_SLOT),
                room.as_deref().unwrap_or(MISSING_SLOT)
            )),
            Intent::SetTimer { duration } => self.say(format!(
                "Setting timer for {}",
                duration.as_deref().unwrap_or(MISSING_SLOT)
            )),
            Intent::Other { name } => self.say(format!("Understood: {}", name)),
        }
    }

    fn say(&self, text: String) -> DispatchOutcome {
        self.speaker.speak(text.clone());
        DispatchOutcome::Spoke(text)
    }

    fn sensor_reply(&self, query: SensorQuery, room: &str) -> String {
        let intent = query.intent_name();
        let sensor = query.sensor_name();
        match self.sensors.read(sensor) {
            Ok(readings) => format_reading(query, room, &readings),
            Err(SensorError::NotFound { name }) => {
                let available = match self.sensors.available_names() {
                    Ok(names) if !names.is_empty() => names.join(", "),
                    Ok(_) => "none".to_string(),
                    Err(e) => {
                        tracing::warn!(error = %e, "cannot list sensors");
                        "none".to_string()
                    }
                };
                tracing::warn!(intent, sensor = %name, "sensor not found");
                format!("Sensor '{}' not found. Available sensors: {}", name, available)
            }
            Err(e) => {
                tracing::warn!(intent, sensor, error = %e, "sensor read failed");
                format!("Error reading {}: {}: {}", sensor, e.kind(), e)
            }
        }
    }

    fn change_leds(&mut self, shade: Option<&str>, colour: Option<&str>) -> DispatchOutcome {
        let Some(raw) = colour.map(str::trim).filter(|c| !c.is_empty()) else {
            tracing::info!("LED intent without a colour");
            return DispatchOutcome::Ignored;
        };
        let (Some(shade), Some(colour)) = (Shade::from_spoken(shade), Colour::from_spoken(raw))
        else {
            tracing::info!(colour = raw, ?shade, "unknown LED colour");
            return DispatchOutcome::Ignored;
        };
        let rgb = colour.rgb(shade);
        match self.led.set(rgb.r, rgb.g, rgb.b) {
            Ok(()) => {
                tracing::info!(?shade, ?colour, ?rgb, "LED colour changed");
                DispatchOutcome::LedSet(rgb)
            }
            Err(e) => {
                tracing::warn!(?shade, ?colour, error = %e, "LED update failed");
                DispatchOutcome::Ignored
            }
        }
    }

    fn change_face(&mut self, expression: Option<&str>) -> DispatchOutcome {
        let Some(raw) = expression.map(str::trim).filter(|e| !e.is_empty()) else {
            tracing::info!("face intent without an expression");
            return DispatchOutcome::Ignored;
        };
        let expression = match raw.parse::<FaceExpression>() {
            Ok(expression) => expression,
            Err(_) => {
                tracing::info!(expression = raw, "unknown face expression");
                return DispatchOutcome::Ignored;
            }
        };
        if self.display.show(expression) {
            DispatchOutcome::FaceShown(expression)
        } else {
            tracing::warn!(%expression, "display did not show expression");
            DispatchOutcome::Ignored
        }
    }
}

fn format_reading(query: SensorQuery, room: &str, readings: &SensorReadings) -> String {
    let intent = query.intent_name();
    match readings.get(query.reading_key()) {
        Some(ReadingValue::Number(value)) => {
            format!("{} in {}: {:.1} {}", intent, room, value, query.unit())
        }
        Some(value) => format!("{} in {}: {} {}", intent, room, value, query.unit()),
        None => {
            tracing::warn!(intent, key = query.reading_key(), "reading missing");
            format!("No data for {} in {}", intent, room)
        }
    }
}
