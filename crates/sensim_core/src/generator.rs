//! Pseudo-random reading source.
//!
//! The process draws one seed at startup ([`time_seed`]). Each sensor gets
//! its own ChaCha stream of that seed, selected by the sensor ID, so sensors
//! never contend on a shared generator and a fixed seed replays the whole fleet.

use crate::sensor::Sensor;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seed derived from the wall clock, for runs that did not pin one.
pub fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default()
}

/// Generates readings uniformly over a sensor's `[min, max)` range.
#[derive(Debug, Clone)]
pub struct ReadingGenerator {
    rng: ChaCha20Rng,
}

impl ReadingGenerator {
    /// Generator on stream 0 of `seed`.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Generator for one sensor: the process seed, on the stream named by the sensor ID.
    pub fn for_sensor(process_seed: u64, sensor: &Sensor) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(process_seed);
        rng.set_stream(u64::from(sensor.id()));
        Self { rng }
    }

    /// Next reading in `[sensor.min_value(), sensor.max_value())`.
    pub fn next_value(&mut self, sensor: &Sensor) -> i32 {
        self.rng.gen_range(sensor.min_value()..sensor.max_value())
    }
}
