use std::time::Duration;

use tokio::time::Instant;

/// What a timer tick observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSignal {
    Idle,
    /// Remaining time crossed the warning threshold (fires once per threshold crossing)
    Warning { remaining_secs: u64 },
    /// Remaining time reached zero
    Expired,
}

/// Countdown state for an active call.
///
/// The deadline only moves forward, and at most once.
#[derive(Debug, Clone)]
pub struct TimerState {
    deadline: Instant,
    extension_used: bool,
    warning_sent: bool,
    expired_fired: bool,
}

impl TimerState {
    pub fn start(now: Instant, base: Duration) -> Self {
        Self {
            deadline: now + base,
            extension_used: false,
            warning_sent: false,
            expired_fired: false,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn extension_used(&self) -> bool {
        self.extension_used
    }

    pub fn warning_sent(&self) -> bool {
        self.warning_sent
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }

    /// Remaining whole seconds, rounded up.
    pub fn remaining_secs(&self, now: Instant) -> u64 {
        let ms = self.remaining(now).as_millis() as u64;
        ms.div_ceil(1000)
    }

    /// Push the deadline forward once. Returns false if already extended.
    pub fn extend(&mut self, by: Duration) -> bool {
        if self.extension_used {
            return false;
        }
        self.deadline += by;
        self.extension_used = true;
        // Allow a fresh warning (and expiry) against the new deadline
        self.warning_sent = false;
        self.expired_fired = false;
        true
    }

    /// Evaluate the countdown at `now`.
    pub fn poll(&mut self, now: Instant, warning_threshold: Duration) -> TimerSignal {
        let remaining = self.remaining(now);

        if remaining.is_zero() {
            if self.expired_fired {
                return TimerSignal::Idle;
            }
            self.expired_fired = true;
            return TimerSignal::Expired;
        }

        if !self.warning_sent && remaining <= warning_threshold {
            self.warning_sent = true;
            return TimerSignal::Warning {
                remaining_secs: self.remaining_secs(now),
            };
        }

        TimerSignal::Idle
    }
}
