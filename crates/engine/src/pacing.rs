//! Adaptive pacing between remote calls.
//!
//! Each call waits `base_delay × 2^n` (capped at `max_delay`), where `n` is
//! the number of calls made since the last cooldown. After `cooldown_after`
//! calls a longer cooldown is inserted and the streak restarts. A rate-limit
//! report from the service also restarts the streak, after its own cooldown.
//!
//! Cooldowns are shared: they move a single resume point that every later
//! call waits for, whichever slot it runs in.

use convoquery_config::SchedulerConfig;
use std::time::Duration;
use tokio::time::Instant;

/// Largest exponent applied to the base delay.
const MAX_DOUBLINGS: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub cooldown_after: u32,
    pub cooldown: Duration,
    pub rate_limit_cooldown: Duration,
}

impl PacingPolicy {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
            cooldown_after: config.cooldown_after.max(1),
            cooldown: config.cooldown(),
            rate_limit_cooldown: config.rate_limit_cooldown(),
        }
    }

    /// Delay before the call that follows `streak` earlier calls.
    pub fn delay_for(&self, streak: u32) -> Duration {
        let factor = 1u32 << streak.min(MAX_DOUBLINGS);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

/// What to wait before the next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingStep {
    /// Time left on the current cooldown, if one is running
    pub cooldown: Option<Duration>,
    /// Regular per-call delay
    pub delay: Duration,
}

impl PacingStep {
    pub fn total(&self) -> Duration {
        self.cooldown.unwrap_or_default() + self.delay
    }
}

/// Consecutive-call counter and shared resume point for one run.
#[derive(Debug, Clone)]
pub struct Pacer {
    policy: PacingPolicy,
    consecutive: u32,
    resume_at: Option<Instant>,
}

impl Pacer {
    pub fn new(policy: PacingPolicy) -> Self {
        Self {
            policy,
            consecutive: 0,
            resume_at: None,
        }
    }

    /// Reserve the next call and return how long to wait before making it.
    pub fn next_call(&mut self, now: Instant) -> PacingStep {
        if self.consecutive >= self.policy.cooldown_after {
            self.consecutive = 0;
            self.hold_until(now + self.policy.cooldown);
        }

        let delay = self.policy.delay_for(self.consecutive);
        self.consecutive += 1;
        PacingStep {
            cooldown: self.hold_remaining(now),
            delay,
        }
    }

    /// The service reported a rate limit: restart the streak and hold every
    /// call for the rate-limit cooldown, starting now.
    pub fn rate_limited(&mut self, now: Instant) -> Duration {
        self.consecutive = 0;
        self.hold_until(now + self.policy.rate_limit_cooldown);
        self.policy.rate_limit_cooldown
    }

    /// Time left before calls may resume, if a cooldown is running.
    pub fn hold_remaining(&self, now: Instant) -> Option<Duration> {
        self.resume_at
            .map(|at| at.saturating_duration_since(now))
            .filter(|left| !left.is_zero())
    }

    /// Calls made since the last cooldown or rate limit.
    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    fn hold_until(&mut self, at: Instant) {
        self.resume_at = Some(self.resume_at.map_or(at, |current| current.max(at)));
    }
}
