//! Core of the sensor fleet simulator.
//!
//! Everything here is pure and I/O-free apart from reading the sensor file:
//! the validated [`Sensor`] definition, the [`Quality`] banding policy, the
//! seeded [`ReadingGenerator`] and the `$FIX` line codec ([`FixMessage`]).
//! The tokio side (registries, acceptors, broadcasters) lives in `sensim_daemon`.

pub mod generator;
pub mod quality;
pub mod sensor;
pub mod sensor_file;
pub mod wire;

pub use generator::{time_seed, ReadingGenerator};
pub use quality::{classify, percent_in_range, Quality};
pub use sensor::{Sensor, SensorError, SensorRecord};
pub use sensor_file::{SensorFile, SensorFileError, DEFAULT_SENSOR_FILE};
pub use wire::{FixMessage, WireError};
