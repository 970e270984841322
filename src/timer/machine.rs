use super::state::{Phase, TimerState};
use crate::alarm::{AlarmSession, AlarmSubsystem, AudioEngine};
use crate::clock::TickClock;
use crate::listener::{OverrideEvent, OverrideHook};
use crate::overlay::{clamp_opacity, OverlayVisualState, OverlayWindowController, WindowStyleApi};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not counting down any more; nothing happened.
    Ignored,
    Decremented(u32),
    Expired,
}

/// Result of one UI loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PumpOutcome {
    /// Something visible changed.
    pub changed: bool,
    /// When the loop must run again even without input.
    pub next_wake: Option<Instant>,
}

pub struct TimerMachine<S: WindowStyleApi, E: AudioEngine, H: OverrideHook> {
    state: TimerState,
    default_opacity: f32,
    clock: TickClock,
    overlay: OverlayWindowController<S>,
    alarm: AlarmSubsystem<E>,
    listener: H,
}

impl<S: WindowStyleApi, E: AudioEngine, H: OverrideHook> TimerMachine<S, E, H> {
    /// Builds an idle machine. The window is left untouched until
    /// [`TimerMachine::start`], so [`TimerMachine::visual`] reports a plain
    /// opaque window before that.
    pub fn new(
        duration_secs: u32,
        default_opacity: f32,
        window: S,
        alarm: AlarmSubsystem<E>,
        listener: H,
    ) -> Self {
        Self {
            state: TimerState::new(duration_secs),
            default_opacity: clamp_opacity(default_opacity),
            clock: TickClock::default(),
            overlay: OverlayWindowController::new(window),
            alarm,
            listener,
        }
    }

    /// Start the clock and the override listener and switch the overlay to
    /// its click-through countdown look.
    pub fn start(&mut self, now: Instant) {
        if self.state.phase != Phase::Countdown || self.clock.is_running() {
            return;
        }
        self.clock.start(now);
        if let Err(e) = self.listener.start() {
            tracing::warn!("override key unavailable: {e}");
        }
        self.apply_visual();
        tracing::info!(
            seconds = self.state.remaining_seconds,
            "countdown started"
        );
    }

    /// Hand over the real window once the UI toolkit created it. A started
    /// machine re-applies its visuals to the new window.
    pub fn attach_window(&mut self, window: S) {
        self.overlay.replace_api(window);
        if self.clock.is_running() || self.state.phase == Phase::Expired {
            self.apply_visual();
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Window state as last accepted by the OS. Follows the phase once the
    /// machine has been started.
    pub fn visual(&self) -> OverlayVisualState {
        self.overlay.visual()
    }

    pub fn default_opacity(&self) -> f32 {
        self.default_opacity
    }

    pub fn display(&self) -> String {
        self.state.display()
    }

    pub fn action_label(&self) -> &'static str {
        match self.state.phase {
            Phase::Countdown => "Cancel",
            Phase::Expired | Phase::Closed => "Close",
        }
    }

    pub fn window(&self) -> &S {
        self.overlay.api()
    }

    pub fn alarm(&self) -> &AlarmSubsystem<E> {
        &self.alarm
    }

    pub fn alarm_session(&self) -> Option<AlarmSession> {
        self.alarm.session()
    }

    pub fn listener(&self) -> &H {
        &self.listener
    }

    pub fn clock_running(&self) -> bool {
        self.clock.is_running()
    }

    /// One second elapsed. Expires the timer when the countdown reaches zero.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if self.state.phase != Phase::Countdown {
            return TickOutcome::Ignored;
        }
        self.state.remaining_seconds = self.state.remaining_seconds.saturating_sub(1);
        if self.state.remaining_seconds == 0 {
            self.on_expire(now);
            TickOutcome::Expired
        } else {
            TickOutcome::Decremented(self.state.remaining_seconds)
        }
    }

    pub fn on_expire(&mut self, now: Instant) {
        if self.state.phase != Phase::Countdown {
            return;
        }
        self.clock.stop();
        self.state.remaining_seconds = 0;
        self.state.phase = Phase::Expired;
        self.state.override_active = false;
        self.listener.mark_expired();
        self.apply_visual();
        self.alarm.start_session(now);
        tracing::info!("timer expired");
    }

    pub fn on_override_press(&mut self) {
        if self.state.phase != Phase::Countdown || self.state.override_active {
            return;
        }
        self.state.override_active = true;
        self.apply_visual();
        tracing::debug!("override engaged");
    }

    /// Ignored once expired: the alarm look is never demoted.
    pub fn on_override_release(&mut self) {
        if self.state.phase != Phase::Countdown || !self.state.override_active {
            return;
        }
        self.state.override_active = false;
        self.apply_visual();
        tracing::debug!("override released");
    }

    /// Stop everything and enter `Closed`. Repeated calls do nothing.
    pub fn cancel(&mut self) {
        if self.state.phase == Phase::Closed {
            return;
        }
        let from = self.state.phase;
        self.clock.stop();
        self.alarm.cancel();
        self.overlay.set_flash_color(None);
        self.listener.stop();
        self.state.phase = Phase::Closed;
        tracing::info!(?from, "timer closed");
    }

    /// Drain override events, apply due ticks and advance the flash cycle.
    pub fn pump(&mut self, now: Instant) -> PumpOutcome {
        if self.state.phase == Phase::Closed {
            return PumpOutcome::default();
        }
        let mut changed = false;

        for event in self.listener.drain_events() {
            match event {
                OverrideEvent::Pressed => self.on_override_press(),
                OverrideEvent::Released => self.on_override_release(),
            }
            changed = true;
        }

        for _ in 0..self.clock.poll(now) {
            changed = true;
            if self.tick(now) == TickOutcome::Expired {
                break;
            }
        }

        if self.alarm.poll_flash(now) {
            self.overlay.set_flash_color(self.alarm.flash_color_index());
            changed = true;
        }

        let next_wake = match (self.clock.next_deadline(), self.alarm.next_flash_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        PumpOutcome { changed, next_wake }
    }

    fn apply_visual(&mut self) {
        let (click_through, opacity) = match self.state.phase {
            Phase::Closed => return,
            _ if self.state.interactive() => (false, 1.0),
            _ => (true, self.default_opacity),
        };
        self.overlay.set_click_through(click_through);
        self.overlay.set_opacity(opacity);
    }
}

impl<S: WindowStyleApi, E: AudioEngine, H: OverrideHook> Drop for TimerMachine<S, E, H> {
    fn drop(&mut self) {
        self.cancel();
    }
}
