//! Client-side cache of the server's login lockout.
//!
//! The server is the authority; this state only mirrors its last answer so
//! the login form can render a countdown and short-circuit submissions.

use serde::Serialize;

pub const MAX_LOGIN_ATTEMPTS: u8 = 3;
pub const DEFAULT_LOCKOUT_SECONDS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LockoutPhase {
    Unlocked,
    Locked { remaining_seconds: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to count down.
    Idle,
    Counting(u64),
    Unlocked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutState {
    phase: LockoutPhase,
    remaining_attempts: u8,
    max_attempts: u8,
}

/// Render-ready view of [`LockoutState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockoutSnapshot {
    pub is_locked: bool,
    pub remaining_attempts: u8,
    pub lockout_seconds_remaining: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countdown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts_warning: Option<String>,
}

impl Default for LockoutState {
    fn default() -> Self {
        Self::new(MAX_LOGIN_ATTEMPTS)
    }
}

impl LockoutState {
    pub fn new(max_attempts: u8) -> Self {
        let max_attempts = max_attempts.max(1);
        Self {
            phase: LockoutPhase::Unlocked,
            remaining_attempts: max_attempts,
            max_attempts,
        }
    }

    pub fn phase(&self) -> LockoutPhase {
        self.phase
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.phase, LockoutPhase::Locked { .. })
    }

    pub fn lockout_seconds_remaining(&self) -> u64 {
        match self.phase {
            LockoutPhase::Locked { remaining_seconds } => remaining_seconds,
            LockoutPhase::Unlocked => 0,
        }
    }

    pub fn remaining_attempts(&self) -> u8 {
        self.remaining_attempts
    }

    pub fn max_attempts(&self) -> u8 {
        self.max_attempts
    }

    pub fn record_success(&mut self) {
        self.phase = LockoutPhase::Unlocked;
        self.remaining_attempts = self.max_attempts;
    }

    /// Applies a 401 from the login endpoint. An unparsed count leaves the
    /// counter untouched.
    pub fn record_invalid_credentials(&mut self, attempts_remaining: Option<u32>) {
        if let Some(attempts) = attempts_remaining {
            let capped = attempts.min(u32::from(self.max_attempts));
            self.remaining_attempts = u8::try_from(capped).unwrap_or(self.max_attempts);
        }
    }

    /// Applies a 429. Returns whether the state is now locked; a zero
    /// duration means the server already lets the user retry.
    pub fn record_rate_limited(&mut self, lockout_seconds: u64) -> bool {
        if lockout_seconds == 0 {
            self.phase = LockoutPhase::Unlocked;
            return false;
        }
        self.phase = LockoutPhase::Locked {
            remaining_seconds: lockout_seconds,
        };
        true
    }

    pub fn tick(&mut self) -> TickOutcome {
        match self.phase {
            LockoutPhase::Unlocked => TickOutcome::Idle,
            LockoutPhase::Locked { remaining_seconds } if remaining_seconds > 1 => {
                let next = remaining_seconds - 1;
                self.phase = LockoutPhase::Locked {
                    remaining_seconds: next,
                };
                TickOutcome::Counting(next)
            }
            LockoutPhase::Locked { .. } => {
                self.phase = LockoutPhase::Unlocked;
                TickOutcome::Unlocked
            }
        }
    }

    /// Count to show next to the password field once a failure has been seen.
    pub fn attempts_warning(&self) -> Option<u8> {
        (self.remaining_attempts < self.max_attempts).then_some(self.remaining_attempts)
    }

    pub fn snapshot(&self) -> LockoutSnapshot {
        let seconds = self.lockout_seconds_remaining();
        LockoutSnapshot {
            is_locked: self.is_locked(),
            remaining_attempts: self.remaining_attempts,
            lockout_seconds_remaining: seconds,
            countdown: self.is_locked().then(|| format_countdown(seconds)),
            attempts_warning: self.attempts_warning().map(|count| {
                let noun = if count == 1 { "attempt" } else { "attempts" };
                format!("{count} {noun} remaining")
            }),
        }
    }
}

pub fn format_countdown(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

pub fn locked_message(remaining_seconds: &u64) -> String {
    format!(
        "Too many failed login attempts. Try again in {}",
        format_countdown(*remaining_seconds)
    )
}
