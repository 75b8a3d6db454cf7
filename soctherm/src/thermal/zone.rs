//! Thermal zone classification.

use strum::Display;

/// Hotspot temperature at which the silicon is no longer safe, in milli-°C.
/// Fixed by the die, not by configuration.
pub const FATAL_THRESHOLD: i64 = 125_000;

/// Escalating thermal severity of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Zone {
    Safe,
    Monitor,
    Alert,
    Panic,
    Fatal,
}

/// CPU-domain zone boundaries, all in hotspot milli-°C.
#[derive(Debug, Clone, Copy)]
pub struct ZoneThresholds {
    pub monitoring: i64,
    pub alert: i64,
    pub panic: i64,
    pub hysteresis: i64,
}

/// Classify a hotspot temperature.
///
/// Each boundary carries a hysteresis band below it: a reading inside the
/// band resolves to the lower zone's successor, so a temperature hovering at
/// a boundary cannot chatter between zones. Pure function of its inputs;
/// repeating a reading yields the same zone.
pub fn classify(hotspot: i64, t: &ZoneThresholds) -> Zone {
    if hotspot >= FATAL_THRESHOLD {
        Zone::Fatal
    } else if hotspot >= t.panic {
        Zone::Panic
    } else if hotspot < t.panic - t.hysteresis {
        if hotspot >= t.alert {
            Zone::Alert
        } else if hotspot < t.alert - t.hysteresis {
            if hotspot >= t.monitoring {
                Zone::Monitor
            } else {
                Zone::Safe
            }
        } else {
            // alert - hysteresis <= hotspot < alert
            Zone::Monitor
        }
    } else {
        // panic - hysteresis <= hotspot < panic
        Zone::Alert
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    const THRESHOLDS: ZoneThresholds = ZoneThresholds {
        monitoring: 60_000,
        alert: 80_000,
        panic: 100_000,
        hysteresis: 2_000,
    };

    #[test_case(0, Zone::Safe; "cold")]
    #[test_case(59_999, Zone::Safe; "just below monitoring")]
    #[test_case(60_000, Zone::Monitor; "monitoring boundary")]
    #[test_case(77_999, Zone::Monitor; "below alert band")]
    #[test_case(78_000, Zone::Monitor; "inside alert hysteresis band")]
    #[test_case(79_999, Zone::Monitor; "top of alert hysteresis band")]
    #[test_case(80_000, Zone::Alert; "alert boundary")]
    #[test_case(97_999, Zone::Alert; "below panic band")]
    #[test_case(98_000, Zone::Alert; "inside panic hysteresis band")]
    #[test_case(99_999, Zone::Alert; "top of panic hysteresis band")]
    #[test_case(100_000, Zone::Panic; "panic boundary")]
    #[test_case(124_999, Zone::Panic; "just below fatal")]
    #[test_case(125_000, Zone::Fatal; "fatal boundary")]
    #[test_case(200_000, Zone::Fatal; "far past fatal")]
    fn should_classify_hotspot_temperature(hotspot: i64, expected: Zone) {
        assert_eq!(classify(hotspot, &THRESHOLDS), expected);
    }

    #[test]
    fn should_be_idempotent_for_a_repeated_reading() {
        for hotspot in [55_000, 61_000, 78_500, 85_000, 98_500, 101_000] {
            let first = classify(hotspot, &THRESHOLDS);
            assert_eq!(classify(hotspot, &THRESHOLDS), first);
        }
    }
}
