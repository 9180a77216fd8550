//! Quality banding of a reading relative to its sensor's range.
//!
//! The band boundaries and the truncating integer division are part of the
//! wire contract: downstream consumers key alarms off the label, so a reading
//! must land in exactly the same band it always has.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// At or below this percentage of the range a reading is an alarm.
pub const ALARM_LOW_PERCENT: i64 = 10;
/// At or above this percentage of the range a reading is an alarm.
pub const ALARM_HIGH_PERCENT: i64 = 90;
/// At or below this percentage (and above the alarm band) a reading is a warning.
pub const WARNING_LOW_PERCENT: i64 = 25;
/// At or above this percentage (and below the alarm band) a reading is a warning.
pub const WARNING_HIGH_PERCENT: i64 = 75;

/// Severity band of a single reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    Normal,
    Warning,
    Alarm,
}

impl Quality {
    /// Label used on the wire.
    pub fn label(self) -> &'static str {
        match self {
            Quality::Normal => "Normal",
            Quality::Warning => "Warning",
            Quality::Alarm => "Alarm",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a label is not one of `Normal`, `Warning`, `Alarm`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown quality label {0:?}")]
pub struct UnknownQuality(pub String);

impl FromStr for Quality {
    type Err = UnknownQuality;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Normal" => Ok(Quality::Normal),
            "Warning" => Ok(Quality::Warning),
            "Alarm" => Ok(Quality::Alarm),
            other => Err(UnknownQuality(other.to_string())),
        }
    }
}

/// Position of `value` on `[min, max]` as a whole percentage.
///
/// Computed as `100 * (value - min) / (max - min)` in 64-bit arithmetic with
/// division truncating toward zero. Values outside the range give results
/// below 0 or above 100.
///
/// # Panics
///
/// Panics if `max == min`. Callers holding a [`crate::Sensor`] never hit this,
/// as a sensor's range is validated non-empty on construction.
pub fn percent_in_range(min: i32, max: i32, value: i32) -> i64 {
    debug_assert!(max > min, "classify requires max > min");
    let range = i64::from(max) - i64::from(min);
    let offset = i64::from(value) - i64::from(min);
    (100 * offset) / range
}

/// Classify `value` against the range `[min, max]`. First matching band wins.
pub fn classify(min: i32, max: i32, value: i32) -> Quality {
    let percent = percent_in_range(min, max, value);

    if percent <= ALARM_LOW_PERCENT || percent >= ALARM_HIGH_PERCENT {
        Quality::Alarm
    } else if percent <= WARNING_LOW_PERCENT || percent >= WARNING_HIGH_PERCENT {
        Quality::Warning
    } else {
        Quality::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries_on_percent_scale() {
        let expected = [
            (0, Quality::Alarm),
            (10, Quality::Alarm),
            (11, Quality::Warning),
            (25, Quality::Warning),
            (26, Quality::Normal),
            (50, Quality::Normal),
            (74, Quality::Normal),
            (75, Quality::Warning),
            (89, Quality::Warning),
            (90, Quality::Alarm),
            (99, Quality::Alarm),
        ];

        for (value, quality) in expected {
            assert_eq!(classify(0, 100, value), quality, "value {value}");
        }
    }

    #[test]
    fn test_truncating_division() {
        // 109/1000 -> 10.9% truncates to 10 and stays in the alarm band
        assert_eq!(percent_in_range(0, 1000, 109), 10);
        assert_eq!(classify(0, 1000, 109), Quality::Alarm);
        assert_eq!(classify(0, 1000, 110), Quality::Warning);

        // 899/1000 -> 89.9% truncates to 89: warning, not alarm
        assert_eq!(classify(0, 1000, 899), Quality::Warning);
        assert_eq!(classify(0, 1000, 900), Quality::Alarm);

        // Truncation goes toward zero for negative offsets, not toward -inf
        assert_eq!(percent_in_range(0, 300, -1), 0);
        assert_eq!(percent_in_range(0, 300, -4), -1);
    }

    #[test]
    fn test_out_of_range_values_are_alarms() {
        assert_eq!(classify(0, 100, -50), Quality::Alarm);
        assert_eq!(classify(0, 100, 150), Quality::Alarm);
        assert_eq!(classify(-40, 60, -100), Quality::Alarm);
    }

    #[test]
    fn test_offset_ranges() {
        // [-50, 50]: 0 sits at 50%
        assert_eq!(classify(-50, 50, 0), Quality::Normal);
        assert_eq!(classify(-50, 50, -30), Quality::Warning); // 20%
        assert_eq!(classify(-50, 50, -41), Quality::Alarm); // 9%
        assert_eq!(classify(-50, 50, 40), Quality::Alarm); // 90%
    }

    #[test]
    fn test_extreme_range_does_not_overflow() {
        assert_eq!(classify(i32::MIN, i32::MAX, 0), Quality::Normal);
        assert_eq!(classify(i32::MIN, i32::MAX, i32::MAX), Quality::Alarm);
        assert_eq!(classify(i32::MIN, i32::MAX, i32::MIN), Quality::Alarm);
    }

    #[test]
    fn test_label_round_trip() {
        for quality in [Quality::Normal, Quality::Warning, Quality::Alarm] {
            assert_eq!(quality.label().parse::<Quality>(), Ok(quality));
        }
        assert!("alarm".parse::<Quality>().is_err());
    }
}
