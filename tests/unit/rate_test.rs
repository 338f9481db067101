//! Tests for the rate multiplier table

use tick_engine::core::{Rate, TICK_PERIOD};

#[test]
fn test_base_tick() {
    assert_eq!(TICK_PERIOD.as_millis(), 600);
    assert_eq!(Rate::default(), Rate::Default);
}

#[test]
fn test_exact_second_rounds_to_nearest_tick() {
    // 1000 ms is 1.67 ticks
    assert_eq!(Rate::ExactSecond.ticks(1), 2);
    // 3000 ms is exactly 5 ticks
    assert_eq!(Rate::ExactSecond.ticks(3), 5);
    // 10000 ms is 16.67 ticks
    assert_eq!(Rate::ExactSecond.ticks(10), 17);
}

#[test]
fn test_never_below_one_tick() {
    for rate in [
        Rate::Default,
        Rate::ApproxSecond,
        Rate::ExactSecond,
        Rate::ExactMinute,
        Rate::ExactHour,
        Rate::ExactDay,
    ] {
        assert_eq!(rate.ticks(0), 1, "{rate:?}");
    }
}

#[test]
fn test_rate_serde_names() {
    let rate: Rate = serde_json::from_str("\"exact_minute\"").unwrap();
    assert_eq!(rate, Rate::ExactMinute);
    assert_eq!(serde_json::to_string(&Rate::ApproxSecond).unwrap(), "\"approx_second\"");
}
