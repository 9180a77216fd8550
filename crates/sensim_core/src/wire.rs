//! `$FIX` line codec.
//!
//! One reading per line: `$FIX, <id>, <type>, <value>, <quality>*`, ASCII,
//! `", "` between fields, `*` as the terminator and no newline. There is no
//! length prefix, checksum or escaping.

use crate::quality::Quality;
use crate::sensor::Sensor;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const FIX_PREFIX: &str = "$FIX";
pub const FIELD_SEPARATOR: &str = ", ";
pub const FIX_TERMINATOR: char = '*';

/// A single reading as sent to receivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixMessage {
    pub sensor_id: u16,
    pub sensor_type: String,
    pub value: i32,
    pub quality: Quality,
}

impl FixMessage {
    /// Message for `value` read from `sensor`, classified on the sensor's range.
    pub fn for_reading(sensor: &Sensor, value: i32) -> Self {
        Self {
            sensor_id: sensor.id(),
            sensor_type: sensor.sensor_type().to_string(),
            value,
            quality: sensor.classify(value),
        }
    }

    /// Wire bytes of the message.
    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for FixMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}{sep}{}{}",
            FIX_PREFIX,
            self.sensor_id,
            self.sensor_type,
            self.value,
            self.quality,
            FIX_TERMINATOR,
            sep = FIELD_SEPARATOR
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("line does not start with \"$FIX, \"")]
    MissingPrefix,
    #[error("line does not end with '*'")]
    MissingTerminator,
    #[error("line has too few fields")]
    MissingField,
    #[error("invalid sensor id {0:?}")]
    InvalidId(String),
    #[error("invalid reading value {0:?}")]
    InvalidValue(String),
    #[error(transparent)]
    UnknownQuality(#[from] crate::quality::UnknownQuality),
}

impl FromStr for FixMessage {
    type Err = WireError;

    /// Parses one line. The sensor type is whatever sits between the ID and
    /// the last two fields, so it may itself contain separators.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let body = line
            .strip_suffix(FIX_TERMINATOR)
            .ok_or(WireError::MissingTerminator)?;
        let body = body
            .strip_prefix(FIX_PREFIX)
            .and_then(|rest| rest.strip_prefix(FIELD_SEPARATOR))
            .ok_or(WireError::MissingPrefix)?;

        let (id, rest) = body
            .split_once(FIELD_SEPARATOR)
            .ok_or(WireError::MissingField)?;
        let (rest, quality) = rest
            .rsplit_once(FIELD_SEPARATOR)
            .ok_or(WireError::MissingField)?;
        let (sensor_type, value) = rest
            .rsplit_once(FIELD_SEPARATOR)
            .ok_or(WireError::MissingField)?;

        Ok(Self {
            sensor_id: id
                .parse()
                .map_err(|_| WireError::InvalidId(id.to_string()))?,
            sensor_type: sensor_type.to_string(),
            value: value
                .parse()
                .map_err(|_| WireError::InvalidValue(value.to_string()))?,
            quality: quality.parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_sensor() -> Sensor {
        Sensor::new(1, "Temp", 0, 100, "FIX", 10).unwrap()
    }

    #[test]
    fn test_alarm_reading_line() {
        let message = FixMessage::for_reading(&temp_sensor(), 5);
        assert_eq!(message.quality, Quality::Alarm);
        assert_eq!(message.to_string(), "$FIX, 1, Temp, 5, Alarm*");
    }

    #[test]
    fn test_normal_reading_line() {
        let message = FixMessage::for_reading(&temp_sensor(), 50);
        assert_eq!(message.to_string(), "$FIX, 1, Temp, 50, Normal*");
        assert_eq!(message.encode(), b"$FIX, 1, Temp, 50, Normal*".to_vec());
    }

    #[test]
    fn test_negative_values_and_warning() {
        let sensor = Sensor::new(12, "Depth", -200, -100, "FIX", 1).unwrap();
        let message = FixMessage::for_reading(&sensor, -120);
        assert_eq!(message.to_string(), "$FIX, 12, Depth, -120, Warning*");
    }

    #[test]
    fn test_parse_line() {
        let message: FixMessage = "$FIX, 7, Flow, 33, Normal*".parse().unwrap();
        assert_eq!(
            message,
            FixMessage {
                sensor_id: 7,
                sensor_type: "Flow".to_string(),
                value: 33,
                quality: Quality::Normal,
            }
        );
    }

    #[test]
    fn test_encoded_lines_parse_back() {
        let sensor = Sensor::new(7, "Flow Rate", -50, 50, "FIX", 1).unwrap();
        for value in [-50, -41, 0, 49] {
            let message = FixMessage::for_reading(&sensor, value);
            let line = String::from_utf8(message.encode()).unwrap();

            assert!(line.starts_with(FIX_PREFIX));
            assert!(line.ends_with(FIX_TERMINATOR));
            assert_eq!(line.parse::<FixMessage>(), Ok(message));
        }
    }

    #[test]
    fn test_parse_type_containing_separator() {
        let message: FixMessage = "$FIX, 2, Temp, Inlet, -4, Alarm*".parse().unwrap();
        assert_eq!(message.sensor_type, "Temp, Inlet");
        assert_eq!(message.value, -4);
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        assert_eq!(
            "$FIX, 1, Temp, 5, Alarm".parse::<FixMessage>(),
            Err(WireError::MissingTerminator)
        );
        assert_eq!(
            "FIX, 1, Temp, 5, Alarm*".parse::<FixMessage>(),
            Err(WireError::MissingPrefix)
        );
        assert_eq!(
            "$FIX, 1, Alarm*".parse::<FixMessage>(),
            Err(WireError::MissingField)
        );
        assert_eq!(
            "$FIX, x, Temp, 5, Alarm*".parse::<FixMessage>(),
            Err(WireError::InvalidId("x".to_string()))
        );
        assert!(matches!(
            "$FIX, 1, Temp, 5, Fine*".parse::<FixMessage>(),
            Err(WireError::UnknownQuality(_))
        ));
    }
}
