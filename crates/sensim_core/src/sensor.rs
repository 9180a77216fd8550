//! Sensor definitions.
//!
//! A [`Sensor`] can only be obtained through validation, either
//! [`Sensor::new`] or deserializing a [`SensorRecord`], so every sensor that
//! reaches the runtime has a non-empty range and a non-zero frequency.

use crate::quality::{self, Quality};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Microseconds in one second; a sensor's cadence is this divided by its frequency.
pub const SEC_IN_MICROS: u64 = 1_000_000;

/// Longest accepted `Type` or `EncoderType` name, in bytes.
pub const MAX_NAME_LEN: usize = 31;

/// Reasons a sensor record is rejected at load time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    #[error("sensor {id}: Frequency must be a positive number of readings per second")]
    ZeroFrequency { id: u16 },
    #[error("sensor {id}: MinValue ({min}) must be below MaxValue ({max})")]
    EmptyRange { id: u16, min: i32, max: i32 },
    #[error("sensor {id}: {field} must not be empty")]
    EmptyName { id: u16, field: &'static str },
    #[error("sensor {id}: {field} is {len} bytes, limit is {limit}", limit = MAX_NAME_LEN)]
    NameTooLong {
        id: u16,
        field: &'static str,
        len: usize,
    },
    #[error("sensor {id}: {field} must be plain ASCII text")]
    NonAsciiName { id: u16, field: &'static str },
    #[error("sensor {id}: {field} must be a single line of text")]
    MultilineName { id: u16, field: &'static str },
}

/// One sensor entry exactly as it appears in the sensor file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorRecord {
    #[serde(rename = "ID")]
    pub id: u16,
    #[serde(rename = "Type")]
    pub sensor_type: String,
    #[serde(rename = "MinValue")]
    pub min_value: i32,
    #[serde(rename = "MaxValue")]
    pub max_value: i32,
    #[serde(rename = "EncoderType")]
    pub encoder_type: String,
    #[serde(rename = "Frequency")]
    pub frequency: u32,
}

/// A validated sensor definition. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SensorRecord", into = "SensorRecord")]
pub struct Sensor {
    id: u16,
    sensor_type: String,
    min_value: i32,
    max_value: i32,
    encoder_type: String,
    frequency: u32,
}

impl Sensor {
    pub fn new(
        id: u16,
        sensor_type: impl Into<String>,
        min_value: i32,
        max_value: i32,
        encoder_type: impl Into<String>,
        frequency: u32,
    ) -> Result<Self, SensorError> {
        SensorRecord {
            id,
            sensor_type: sensor_type.into(),
            min_value,
            max_value,
            encoder_type: encoder_type.into(),
            frequency,
        }
        .try_into()
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn sensor_type(&self) -> &str {
        &self.sensor_type
    }

    pub fn min_value(&self) -> i32 {
        self.min_value
    }

    pub fn max_value(&self) -> i32 {
        self.max_value
    }

    /// Encoder name from the definition. Carried through but not used by the `$FIX` format.
    pub fn encoder_type(&self) -> &str {
        &self.encoder_type
    }

    /// Readings per second.
    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    /// Pause between two broadcast cycles: one second divided by the
    /// frequency, truncated to whole microseconds.
    pub fn sleep_interval(&self) -> Duration {
        Duration::from_micros(SEC_IN_MICROS / u64::from(self.frequency))
    }

    /// TCP port this sensor listens on for a given base port, or `None` if
    /// `base_port + id` does not fit in a port number.
    pub fn port(&self, base_port: u16) -> Option<u16> {
        base_port.checked_add(self.id)
    }

    /// Quality band of `value` on this sensor's range.
    pub fn classify(&self, value: i32) -> Quality {
        quality::classify(self.min_value, self.max_value, value)
    }
}

fn check_name(id: u16, field: &'static str, name: &str) -> Result<(), SensorError> {
    if name.is_empty() {
        return Err(SensorError::EmptyName { id, field });
    }
    if name.len() > MAX_NAME_LEN {
        return Err(SensorError::NameTooLong {
            id,
            field,
            len: name.len(),
        });
    }
    if !name.is_ascii() {
        return Err(SensorError::NonAsciiName { id, field });
    }
    if name.contains(['\n', '\r']) {
        return Err(SensorError::MultilineName { id, field });
    }
    Ok(())
}

impl TryFrom<SensorRecord> for Sensor {
    type Error = SensorError;

    fn try_from(record: SensorRecord) -> Result<Self, Self::Error> {
        let id = record.id;
        if record.frequency == 0 {
            return Err(SensorError::ZeroFrequency { id });
        }
        if record.min_value >= record.max_value {
            return Err(SensorError::EmptyRange {
                id,
                min: record.min_value,
                max: record.max_value,
            });
        }
        check_name(id, "Type", &record.sensor_type)?;
        check_name(id, "EncoderType", &record.encoder_type)?;

        Ok(Self {
            id,
            sensor_type: record.sensor_type,
            min_value: record.min_value,
            max_value: record.max_value,
            encoder_type: record.encoder_type,
            frequency: record.frequency,
        })
    }
}

impl From<Sensor> for SensorRecord {
    fn from(sensor: Sensor) -> Self {
        Self {
            id: sensor.id,
            sensor_type: sensor.sensor_type,
            min_value: sensor.min_value,
            max_value: sensor.max_value,
            encoder_type: sensor.encoder_type,
            frequency: sensor.frequency,
        }
    }
}
