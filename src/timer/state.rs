#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Countdown,
    Expired,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerState {
    pub remaining_seconds: u32,
    pub phase: Phase,
    pub override_active: bool,
}

impl TimerState {
    pub fn new(duration_secs: u32) -> Self {
        Self {
            remaining_seconds: duration_secs,
            phase: Phase::Countdown,
            override_active: false,
        }
    }

    /// Whether the overlay should currently accept input.
    pub fn interactive(&self) -> bool {
        self.override_active || self.phase == Phase::Expired
    }

    pub fn display(&self) -> String {
        format_mmss(self.remaining_seconds)
    }
}

/// Render seconds as zero-padded `MM:SS`.
pub fn format_mmss(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_mmss(125), "02:05");
        assert_eq!(format_mmss(0), "00:00");
        assert_eq!(format_mmss(300), "05:00");
        assert_eq!(format_mmss(59), "00:59");
    }

    #[test]
    fn override_or_expiry_makes_overlay_interactive() {
        let mut state = TimerState::new(10);
        assert!(!state.interactive());
        state.override_active = true;
        assert!(state.interactive());
        state.override_active = false;
        state.phase = Phase::Expired;
        assert!(state.interactive());
    }
}
