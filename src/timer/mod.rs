//! Countdown state machine coordinating the overlay window, the alarm and
//! the global override listener.
//!
//! ```text
//!  Countdown ──tick reaches 0──► Expired ──cancel──► Closed
//!      │                                               ▲
//!      └──────────────────cancel───────────────────────┘
//! ```
//!
//! Every mutator runs on the UI loop. Override key events arrive from the
//! listener thread through a queue and are applied in [`TimerMachine::pump`].

mod machine;
mod state;

pub use machine::{PumpOutcome, TickOutcome, TimerMachine};
pub use state::{format_mmss, Phase, TimerState};

pub const DEFAULT_DURATION_SECS: u32 = 300;
pub const DEFAULT_OPACITY: f32 = 0.2;
