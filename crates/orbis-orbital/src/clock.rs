//! Simulation time: the dilated game clock the simulation is driven with, and
//! the fixed-rate schedule that turns real elapsed time into ticks.
//!
//! Simulation time is measured in minutes and never goes backwards.

use serde::{Deserialize, Serialize};

use crate::geometry::SECONDS_PER_MINUTE;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default server tick rate in Hz.
pub const SERVER_TICK_RATE: u32 = 60;

/// Duration of a single server tick in seconds.
pub const TICK_DURATION_SECS: f64 = 1.0 / SERVER_TICK_RATE as f64;

/// Most real time (seconds) one schedule update may turn into ticks.
pub const MAX_CATCH_UP_SECS: f64 = 4.0;

/// Largest clock step (minutes) taken while fast-forwarding.
pub const FAST_FORWARD_STEP_MINUTES: f64 = 10.0;

// ---------------------------------------------------------------------------
// TimeDilation
// ---------------------------------------------------------------------------

/// How many game seconds pass per real second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeDilation {
    /// 1 s = 1 s.
    #[default]
    Normal,
    /// 1 s = 1 min.
    Level1,
    /// 1 s = 20 min.
    Level2,
    /// 1 s = 2 h.
    Level3,
}

impl TimeDilation {
    /// Game seconds per real second.
    pub fn factor(self) -> f64 {
        match self {
            Self::Normal => 1.0,
            Self::Level1 => 60.0,
            Self::Level2 => 1200.0,
            Self::Level3 => 7200.0,
        }
    }
}

// ---------------------------------------------------------------------------
// GameClock
// ---------------------------------------------------------------------------

/// Monotonic simulation clock with time dilation and fast-forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameClock {
    current_time: f64,
    dilation: TimeDilation,
}

impl GameClock {
    /// Creates a clock at `start_time` minutes.
    pub fn new(start_time: f64) -> Self {
        Self {
            current_time: start_time.max(0.0),
            dilation: TimeDilation::Normal,
        }
    }

    /// Current simulation time in minutes.
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Current dilation.
    pub fn dilation(&self) -> TimeDilation {
        self.dilation
    }

    /// Changes the dilation.
    pub fn set_dilation(&mut self, dilation: TimeDilation) {
        if dilation != self.dilation {
            tracing::info!(?dilation, "Time dilation changed");
        }
        self.dilation = dilation;
    }

    /// Advances by `real_dt_secs` of real time, scaled by the dilation.
    /// Returns the new simulation time.
    pub fn advance(&mut self, real_dt_secs: f64) -> f64 {
        if real_dt_secs > 0.0 && real_dt_secs.is_finite() {
            self.current_time += real_dt_secs * self.dilation.factor() / SECONDS_PER_MINUTE;
        }
        self.current_time
    }

    /// Jumps straight to `time` minutes. Never moves backwards.
    pub fn fast_forward_to(&mut self, time: f64) -> f64 {
        if time.is_finite() && time > self.current_time {
            tracing::debug!(from = self.current_time, to = time, "Fast-forwarding clock");
            self.current_time = time;
        }
        self.current_time
    }
}

impl Default for GameClock {
    fn default() -> Self {
        Self::new(0.0)
    }
}

// ---------------------------------------------------------------------------
// ServerTickSchedule
// ---------------------------------------------------------------------------

/// Turns real elapsed time into a whole number of simulation ticks at a fixed
/// rate, carrying the remainder over to the next update.
///
/// A stalled host never makes the server replay an unbounded backlog: at most
/// [`MAX_CATCH_UP_SECS`] worth of ticks are due per update, the rest is
/// dropped.
#[derive(Debug, Clone)]
pub struct ServerTickSchedule {
    tick_rate: u32,
    tick_duration_secs: f64,
    pending_secs: f64,
    total_ticks: u64,
}

impl ServerTickSchedule {
    /// Schedule at [`SERVER_TICK_RATE`].
    pub fn new() -> Self {
        Self::with_tick_rate(SERVER_TICK_RATE)
    }

    /// Schedule at `hz` ticks per second (at least one).
    pub fn with_tick_rate(hz: u32) -> Self {
        let tick_rate = hz.max(1);
        Self {
            tick_rate,
            tick_duration_secs: 1.0 / f64::from(tick_rate),
            pending_secs: 0.0,
            total_ticks: 0,
        }
    }

    /// Adds `real_dt_secs` of wall time and returns how many ticks are due.
    /// Negative or non-finite durations are ignored.
    pub fn accumulate(&mut self, real_dt_secs: f64) -> u32 {
        if !(real_dt_secs.is_finite() && real_dt_secs > 0.0) {
            return 0;
        }

        self.pending_secs += real_dt_secs;
        if self.pending_secs > MAX_CATCH_UP_SECS {
            tracing::warn!(
                behind_secs = self.pending_secs,
                "Simulation fell behind, dropping backlog"
            );
            self.pending_secs = MAX_CATCH_UP_SECS;
        }

        let mut due = 0u32;
        while self.pending_secs >= self.tick_duration_secs {
            self.pending_secs -= self.tick_duration_secs;
            due += 1;
        }
        self.total_ticks += u64::from(due);
        due
    }

    /// Ticks between two events running at `rate_hz`, never less than one.
    /// Rates above the tick rate run every tick.
    pub fn interval_ticks(&self, rate_hz: u32) -> u64 {
        let rate_hz = rate_hz.clamp(1, self.tick_rate);
        u64::from(self.tick_rate / rate_hz)
    }

    /// Whether the latest tick falls on an `interval`-tick boundary.
    pub fn is_due(&self, interval: u64) -> bool {
        self.total_ticks % interval.max(1) == 0
    }

    /// Ticks per second.
    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    /// Ticks produced so far.
    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// Real seconds per tick.
    pub fn tick_duration_secs(&self) -> f64 {
        self.tick_duration_secs
    }
}

impl Default for ServerTickSchedule {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
