use crate::poller::PollOutcome;
use crate::status::{self, BatteryReading, IconBucket};

/// Which parts of the tray need redrawing after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderChange {
    pub icon: bool,
    pub tooltip: bool,
}

impl RenderChange {
    pub fn is_empty(&self) -> bool {
        !self.icon && !self.tooltip
    }
}

/// What the tray currently shows. Owned by the event loop.
pub struct TrayState {
    pub reading: BatteryReading,
    pub bucket: IconBucket,
    pub tooltip: String,
    /// Number of poll outcomes applied this session.
    pub polls: u64,
}

impl TrayState {
    /// Starts in the unavailable state, which is also what the tray is
    /// built with before the first poll lands.
    pub fn new() -> Self {
        let reading = BatteryReading::Unavailable;
        Self {
            reading,
            bucket: status::bucket_for(&reading),
            tooltip: status::tooltip_for(&reading),
            polls: 0,
        }
    }

    pub fn apply(&mut self, outcome: PollOutcome) -> RenderChange {
        self.polls += 1;
        let change = RenderChange {
            icon: outcome.bucket != self.bucket,
            tooltip: outcome.tooltip != self.tooltip,
        };
        self.reading = outcome.reading;
        self.bucket = outcome.bucket;
        self.tooltip = outcome.tooltip;
        change
    }

    /// Text for the disabled status line at the top of the menu.
    pub fn status_text(&self) -> String {
        self.tooltip.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::RawStatus;

    fn outcome(text: &str) -> PollOutcome {
        PollOutcome::from_raw(&RawStatus::Output(text.into()))
    }

    #[test]
    fn test_initial_state_is_unavailable() {
        let state = TrayState::new();
        assert_eq!(state.reading, BatteryReading::Unavailable);
        assert_eq!(state.bucket, IconBucket::Unavailable);
        assert!(state.tooltip.contains("Is the mouse turned on?"));
        assert_eq!(state.polls, 0);
    }

    #[test]
    fn test_unavailable_first_poll_changes_nothing() {
        let mut state = TrayState::new();
        assert!(state.apply(outcome("")).is_empty());
        assert_eq!(state.polls, 1);
    }

    #[test]
    fn test_apply_reports_changes() {
        let mut state = TrayState::new();

        let change = state.apply(outcome("Discharging [||||] 60%"));
        assert_eq!(change, RenderChange { icon: true, tooltip: true });
        assert_eq!(state.bucket, IconBucket::Mid50);

        // Same bucket, new percent.
        let change = state.apply(outcome("Discharging [||||] 59%"));
        assert_eq!(change, RenderChange { icon: false, tooltip: true });

        // Identical reading.
        assert!(state.apply(outcome("Discharging [||||] 59%")).is_empty());

        // Plugged in: only the word changes.
        let change = state.apply(outcome("Charging [||||] 59%"));
        assert_eq!(change, RenderChange { icon: false, tooltip: true });
        assert_eq!(state.status_text(), "\u{1F5B1}\u{FE0F} Charging: 59%");

        // Mouse switched off.
        let change = state.apply(outcome(""));
        assert_eq!(change, RenderChange { icon: true, tooltip: true });
        assert_eq!(state.bucket, IconBucket::Unavailable);
        assert_eq!(state.polls, 5);
    }
}
