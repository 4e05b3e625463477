//! Stall watchdog for long-running mux processes.
//!
//! Pure state machine driven by two signals: growth of the output file and
//! arrival of stderr telemetry. Each counted stall shrinks the window the
//! process has to show progress; three stalls means the process is wedged
//! and gets killed.

use std::time::{Duration, Instant};

const STALL_WINDOW_SHRINK: Duration = Duration::from_secs(5);
const MAX_STALLS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Healthy,
    /// A stall was just counted; the caller should log it.
    StallWarning(u32),
    /// Too many stalls; kill the process.
    Abort { stalled_for: f64 },
}

pub struct Watchdog {
    budget: Duration,
    floor: Duration,
    telemetry_idle: Duration,
    stalls: u32,
    last_size: u64,
    /// Last time we saw the output file grow (or start of run).
    last_growth: Instant,
    /// Last growth not reset by stall accounting, for reporting.
    last_real_growth: Instant,
    last_telemetry: Instant,
}

impl Watchdog {
    pub fn new(budget: Duration, floor: Duration, telemetry_idle: Duration, now: Instant) -> Self {
        Self {
            budget,
            floor,
            telemetry_idle,
            stalls: 0,
            last_size: 0,
            last_growth: now,
            last_real_growth: now,
            last_telemetry: now,
        }
    }

    /// Record the current size of the output file.
    pub fn record_output_size(&mut self, size: u64, now: Instant) {
        if size > self.last_size {
            self.last_size = size;
            self.last_growth = now;
            self.last_real_growth = now;
            // Growth clears the strike count.
            self.stalls = 0;
        }
    }

    /// Record that the process produced stderr output.
    pub fn record_telemetry(&mut self, now: Instant) {
        self.last_telemetry = now;
    }

    /// Current allowance before the next stall is counted. Shrinks with
    /// each stall, but never below the floor.
    pub fn window(&self) -> Duration {
        let shrink = STALL_WINDOW_SHRINK * self.stalls;
        let shrunk = self.budget.saturating_sub(shrink).max(self.floor);
        shrunk.min(self.budget)
    }

    /// Evaluate the process at `now`.
    ///
    /// A stall requires both signals to be quiet: no file growth for the
    /// current window AND no stderr output for the telemetry idle limit.
    /// A chatty-but-unproductive process is left to the overall deadline.
    pub fn check(&mut self, now: Instant) -> Verdict {
        let growth_gap = now.duration_since(self.last_growth);
        let telemetry_gap = now.duration_since(self.last_telemetry);

        if growth_gap <= self.window() || telemetry_gap <= self.telemetry_idle {
            return Verdict::Healthy;
        }

        self.stalls += 1;
        if self.stalls >= MAX_STALLS {
            Verdict::Abort {
                stalled_for: now.duration_since(self.last_real_growth).as_secs_f64(),
            }
        } else {
            // Counting a stall restarts the (now smaller) window.
            self.last_growth = now;
            Verdict::StallWarning(self.stalls)
        }
    }
}
