//! The on/off schedule for the `blink` binary.

use embedded_hal::digital::PinState;
use std::time::Duration;

pub const HIGH_HOLD: Duration = Duration::from_secs(5);
pub const LOW_HOLD: Duration = Duration::from_secs(1);

/// One half of the blink cycle: what to print, where to drive the line,
/// and how long to hold it there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    pub label: &'static str,
    pub level: PinState,
    pub hold: Duration,
}

const ON: Phase = Phase {
    label: "on...",
    level: PinState::High,
    hold: HIGH_HOLD,
};

const OFF: Phase = Phase {
    label: "off...",
    level: PinState::Low,
    hold: LOW_HOLD,
};

/// The endless schedule, starting with the "on" phase.
pub fn phases() -> impl Iterator<Item = Phase> {
    [ON, OFF].into_iter().cycle()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_strictly_alternate_starting_with_on() {
        let labels: Vec<_> = phases().take(6).map(|p| p.label).collect();
        assert_eq!(labels, ["on...", "off...", "on...", "off...", "on...", "off..."]);
    }

    #[test]
    fn levels_match_labels() {
        for phase in phases().take(4) {
            match phase.label {
                "on..." => assert_eq!(phase.level, PinState::High),
                "off..." => assert_eq!(phase.level, PinState::Low),
                other => panic!("unexpected label {other:?}"),
            }
        }
    }

    #[test]
    fn high_phase_holds_longer_than_low() {
        let mut schedule = phases();
        assert_eq!(schedule.next().unwrap().hold, Duration::from_secs(5));
        assert_eq!(schedule.next().unwrap().hold, Duration::from_secs(1));
    }
}
