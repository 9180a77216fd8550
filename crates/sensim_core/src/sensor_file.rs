//! The JSON sensor file: `{"Sensors": [ { "ID": .., "Type": .., ... }, ... ]}`.

use crate::sensor::Sensor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File read when no other path is given.
pub const DEFAULT_SENSOR_FILE: &str = "sensorConfig.json";

#[derive(Debug, Error)]
pub enum SensorFileError {
    #[error("cannot read sensor file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed sensor file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("sensor ID {0} is defined more than once")]
    DuplicateId(u16),
    #[error("sensor file defines no sensors")]
    Empty,
}

/// Parsed and validated contents of a sensor file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorFile {
    #[serde(rename = "Sensors")]
    pub sensors: Vec<Sensor>,
}

impl SensorFile {
    /// Parse a sensor document. Every record is validated, IDs must be
    /// unique and at least one sensor must be present.
    pub fn from_json(json: &str) -> Result<Self, SensorFileError> {
        let file: SensorFile = serde_json::from_str(json)?;
        if file.sensors.is_empty() {
            return Err(SensorFileError::Empty);
        }

        let mut seen = HashSet::with_capacity(file.sensors.len());
        for sensor in &file.sensors {
            if !seen.insert(sensor.id()) {
                return Err(SensorFileError::DuplicateId(sensor.id()));
            }
        }

        Ok(file)
    }

    pub fn load(path: &Path) -> Result<Self, SensorFileError> {
        let content = fs::read_to_string(path).map_err(|source| SensorFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn into_sensors(self) -> Vec<Sensor> {
        self.sensors
    }
}
