//! Robot sensor gateway client.
//!
//! `GET {base}/sensors` lists sensor names; `GET {base}/sensors/{name}/readings`
//! returns a JSON object of readings.

use crate::config::SensorConfig;
use crate::devices::{ReadingValue, SensorCapability, SensorReadings};
use crate::error::{BuddyError, Result, SensorError};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;

/// Blocking HTTP client for the sensor gateway.
#[derive(Debug, Clone)]
pub struct HttpSensorClient {
    client: Client,
    base_url: String,
}

impl HttpSensorClient {
    pub fn new(config: &SensorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BuddyError::Device {
                device: "sensors".to_string(),
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn readings_url(&self, name: &str) -> String {
        format!("{}/sensors/{}/readings", self.base_url, name)
    }

    fn list_url(&self) -> String {
        format!("{}/sensors", self.base_url)
    }

    fn get_json(&self, url: &str, name: Option<&str>) -> std::result::Result<Value, SensorError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| SensorError::Unavailable {
                message: e.to_string(),
            })?;

        if response.status() == StatusCode::NOT_FOUND
            && let Some(name) = name
        {
            return Err(SensorError::NotFound {
                name: name.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(SensorError::Unavailable {
                message: format!("gateway returned {}", response.status()),
            });
        }
        response.json::<Value>().map_err(|e| SensorError::Malformed {
            message: e.to_string(),
        })
    }
}

/// Convert a JSON object into readings.
pub fn readings_from_json(value: Value) -> std::result::Result<SensorReadings, SensorError> {
    let Value::Object(map) = value else {
        return Err(SensorError::Malformed {
            message: "readings are not a JSON object".to_string(),
        });
    };
    Ok(map
        .into_iter()
        .map(|(key, value)| {
            let reading = match value {
                Value::Number(n) => n
                    .as_f64()
                    .map(ReadingValue::Number)
                    .unwrap_or_else(|| ReadingValue::Text(n.to_string())),
                Value::String(s) => ReadingValue::Text(s),
                other => ReadingValue::Text(other.to_string()),
            };
            (key, reading)
        })
        .collect())
}

/// Accepts `["a", "b"]` or `[{"name": "a"}, ...]`.
pub fn names_from_json(value: Value) -> std::result::Result<Vec<String>, SensorError> {
    let Value::Array(items) = value else {
        return Err(SensorError::Malformed {
            message: "sensor list is not a JSON array".to_string(),
        });
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(name),
            Value::Object(mut map) => match map.remove("name") {
                Some(Value::String(name)) => Some(name),
                _ => None,
            },
            _ => None,
        })
        .collect())
}

impl SensorCapability for HttpSensorClient {
    fn read(&self, name: &str) -> std::result::Result<SensorReadings, SensorError> {
        let value = self.get_json(&self.readings_url(name), Some(name))?;
        let readings = readings_from_json(value)?;
        tracing::debug!(sensor = name, readings = readings.len(), "sensor read");
        Ok(readings)
    }

    fn available_names(&self) -> std::result::Result<Vec<String>, SensorError> {
        names_from_json(self.get_json(&self.list_url(), None)?)
    }
}
