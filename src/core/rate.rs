//! Named rate multipliers converting logical delay units into ticks.
//!
//! Every rate is defined against the 600 ms base tick. Conversion happens once,
//! when a job is built or its delay is changed, never on every tick.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Length of one heartbeat tick.
pub const TICK_PERIOD: Duration = Duration::from_millis(600);

const TICK_MS: u64 = 600;

/// A named factor converting a logical delay unit into ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rate {
    /// One unit is one tick.
    #[default]
    Default,
    /// One unit is two ticks (1.2 s), the usual "about a second".
    ApproxSecond,
    /// One unit is exactly 1000 ms, rounded to the nearest tick.
    ExactSecond,
    /// One unit is 60 s, i.e. 100 ticks.
    ExactMinute,
    /// One unit is 3600 s, i.e. 6,000 ticks.
    ExactHour,
    /// One unit is 86,400 s, i.e. 144,000 ticks.
    ExactDay,
}

impl Rate {
    /// Milliseconds represented by one unit of this rate.
    #[must_use]
    pub const fn unit_millis(self) -> u64 {
        match self {
            Self::Default => TICK_MS,
            Self::ApproxSecond => 2 * TICK_MS,
            Self::ExactSecond => 1_000,
            Self::ExactMinute => 60_000,
            Self::ExactHour => 3_600_000,
            Self::ExactDay => 86_400_000,
        }
    }

    /// Ticks per unit as a float, for diagnostics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn multiplier(self) -> f64 {
        self.unit_millis() as f64 / TICK_MS as f64
    }

    /// Convert `units` of this rate to a tick count, rounded to the nearest
    /// tick and never below 1.
    #[must_use]
    pub const fn ticks(self, units: u64) -> u64 {
        let millis = units.saturating_mul(self.unit_millis());
        let ticks = millis.saturating_add(TICK_MS / 2) / TICK_MS;
        if ticks == 0 {
            1
        } else {
            ticks
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_multipliers() {
        assert_eq!(Rate::Default.ticks(1), 1);
        assert_eq!(Rate::ApproxSecond.ticks(1), 2);
        assert_eq!(Rate::ExactMinute.ticks(1), 100);
        assert_eq!(Rate::ExactHour.ticks(1), 6_000);
        assert_eq!(Rate::ExactDay.ticks(1), 144_000);
    }

    #[test]
    fn test_exact_second_rounds_to_nearest_tick() {
        assert_eq!(Rate::ExactSecond.ticks(1), 2);
        assert_eq!(Rate::ExactSecond.ticks(3), 5);
        assert_eq!(Rate::ExactSecond.ticks(6), 10);
    }

    #[test]
    fn test_floor_at_one_tick() {
        assert_eq!(Rate::Default.ticks(0), 1);
        assert_eq!(Rate::ExactMinute.ticks(0), 1);
    }

    #[test]
    fn test_scales_with_units() {
        assert_eq!(Rate::Default.ticks(5), 5);
        assert_eq!(Rate::ApproxSecond.ticks(5), 10);
        assert_eq!(Rate::ExactMinute.ticks(3), 300);
    }

    #[test]
    fn test_multiplier() {
        assert!((Rate::Default.multiplier() - 1.0).abs() < f64::EPSILON);
        assert!((Rate::ExactMinute.multiplier() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rate_serde_names() {
        let json = serde_json::to_string(&Rate::ExactMinute).unwrap();
        assert_eq!(json, "\"exact_minute\"");
        let rate: Rate = serde_json::from_str("\"approx_second\"").unwrap();
        assert_eq!(rate, Rate::ApproxSecond);
    }
}
