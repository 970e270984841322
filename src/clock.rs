use std::time::{Duration, Instant};

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Fixed-interval tick source polled from the UI loop.
///
/// The clock never spawns anything; the loop calls [`TickClock::poll`] on every
/// frame and receives the number of whole intervals that elapsed since the
/// previous tick. Late frames therefore catch up instead of losing seconds.
#[derive(Debug, Clone)]
pub struct TickClock {
    interval: Duration,
    next_tick: Option<Instant>,
}

impl TickClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            next_tick: None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.next_tick = Some(now + self.interval);
    }

    pub fn stop(&mut self) {
        self.next_tick = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Number of ticks due at `now`. Zero when stopped.
    pub fn poll(&mut self, now: Instant) -> u32 {
        let Some(mut next) = self.next_tick else {
            return 0;
        };
        let mut due = 0;
        while next <= now {
            due += 1;
            next += self.interval;
        }
        self.next_tick = Some(next);
        due
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_tick
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new(TICK_INTERVAL)
    }
}
