//! Configured race duration
//!
//! The server reports the race length as a single coded byte covering both
//! lap-based and time-based races.

use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceLength {
    Laps(u32),
    Hours(u32),
}

/// Decodes the server's race length code
///
/// Returns `None` for codes outside the documented ranges.
pub fn decode_race_length(code: u8) -> Option<RaceLength> {
    let n = code as u32;
    match n {
        0..=99 => Some(RaceLength::Laps(n)),
        100..=190 => Some(RaceLength::Laps((n - 100) * 10 + 100)),
        191..=238 => Some(RaceLength::Hours(n - 190)),
        _ => None,
    }
}

/// Race duration; at most one of the two fields is set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RaceState {
    pub race_laps: Option<u32>,
    pub race_hours: Option<u32>,
}

impl RaceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a session-state race length code, returning true on change
    pub fn update(&mut self, code: u8) -> bool {
        match decode_race_length(code) {
            Some(RaceLength::Laps(laps)) if self.race_laps != Some(laps) => {
                self.race_laps = Some(laps);
                self.race_hours = None;
                debug!("Updated race duration to {} laps", laps);
                true
            }
            Some(RaceLength::Hours(hours)) if self.race_hours != Some(hours) => {
                self.race_laps = None;
                self.race_hours = Some(hours);
                debug!("Updated race duration to {} hours", hours);
                true
            }
            _ => false,
        }
    }

    /// Laps left for a player in a lap-based race
    ///
    /// Zero laps means practice, which has no end to count towards.
    pub fn laps_remaining(&self, laps_done: u16) -> Option<u32> {
        match self.race_laps {
            Some(laps) if laps > 0 => Some(laps.saturating_sub(laps_done as u32)),
            _ => None,
        }
    }

    /// True when the player is within the last `window` laps of the race
    pub fn in_final_laps(&self, laps_done: u16, window: u32) -> bool {
        self.laps_remaining(laps_done)
            .map(|remaining| remaining <= window)
            .unwrap_or(false)
    }

    pub fn reset(&mut self) {
        self.race_laps = None;
        self.race_hours = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_range_boundaries() {
        assert_eq!(decode_race_length(0), Some(RaceLength::Laps(0)));
        assert_eq!(decode_race_length(99), Some(RaceLength::Laps(99)));
        assert_eq!(decode_race_length(100), Some(RaceLength::Laps(100)));
        assert_eq!(decode_race_length(101), Some(RaceLength::Laps(110)));
        assert_eq!(decode_race_length(190), Some(RaceLength::Laps(1000)));
        assert_eq!(decode_race_length(191), Some(RaceLength::Hours(1)));
        assert_eq!(decode_race_length(238), Some(RaceLength::Hours(48)));
        assert_eq!(decode_race_length(239), None);
        assert_eq!(decode_race_length(255), None);
    }

    #[test]
    fn test_update_switches_units() {
        let mut state = RaceState::new();

        assert!(state.update(10));
        assert_eq!(state.race_laps, Some(10));
        assert_eq!(state.race_hours, None);

        assert!(state.update(192));
        assert_eq!(state.race_laps, None);
        assert_eq!(state.race_hours, Some(2));
    }

    #[test]
    fn test_update_unchanged_value() {
        let mut state = RaceState::new();
        assert!(state.update(10));
        assert!(!state.update(10));
        assert_eq!(state.race_laps, Some(10));
    }

    #[test]
    fn test_invalid_code_keeps_state() {
        let mut state = RaceState::new();
        state.update(25);

        assert!(!state.update(239));
        assert_eq!(state.race_laps, Some(25));
        assert_eq!(state.race_hours, None);
    }

    #[test]
    fn test_final_laps_window() {
        let mut state = RaceState::new();
        state.update(10);

        assert_eq!(state.laps_remaining(9), Some(1));
        assert!(state.in_final_laps(9, 2));
        assert!(state.in_final_laps(8, 2));
        assert!(!state.in_final_laps(7, 2));
    }

    #[test]
    fn test_final_laps_not_applicable() {
        let mut state = RaceState::new();
        assert!(!state.in_final_laps(0, 2));

        state.update(0);
        assert!(!state.in_final_laps(0, 2));

        state.update(195);
        assert_eq!(state.laps_remaining(3), None);
        assert!(!state.in_final_laps(3, 2));
    }
}
