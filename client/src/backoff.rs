//! Reconnect delay policy with exponential backoff.
//!
//! Reconnection never gives up, so unlike a bounded retry helper the
//! backoff here is open-ended: the delay grows by a multiplier up to a cap
//! and resets to the initial value on the next successful open.

use std::time::Duration;

/// Reconnect policy configuration.
///
/// # Default Values
///
/// - `initial_delay`: 1 second
/// - `multiplier`: 1.5 (delay grows by half each failure)
/// - `max_delay`: 5 seconds
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    pub initial_delay: Duration,
    /// Growth factor applied after each failed attempt.
    pub multiplier: f64,
    /// Cap on the reconnect delay.
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 1.5,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub fn builder() -> ReconnectPolicyBuilder {
        ReconnectPolicyBuilder {
            policy: Self::default(),
        }
    }
}

/// Builder for [`ReconnectPolicy`].
#[derive(Debug, Clone)]
pub struct ReconnectPolicyBuilder {
    policy: ReconnectPolicy,
}

impl ReconnectPolicyBuilder {
    /// Set the delay before the first reconnect attempt.
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    /// Set the growth factor.
    #[must_use]
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.policy.multiplier = multiplier;
        self
    }

    /// Set the delay cap.
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    /// Build the [`ReconnectPolicy`].
    #[must_use]
    pub fn build(self) -> ReconnectPolicy {
        self.policy
    }
}

/// Stateful backoff over a [`ReconnectPolicy`].
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    current: Duration,
}

impl Backoff {
    /// Start a backoff sequence at the policy's initial delay.
    #[must_use]
    pub fn new(policy: ReconnectPolicy) -> Self {
        let current = policy.initial_delay;
        Self { policy, current }
    }

    /// The delay to wait before the next attempt; grows for the one after.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let grown = self.current.as_secs_f64() * self.policy.multiplier;
        self.current = Duration::from_secs_f64(grown).min(self.policy.max_delay);
        delay
    }

    /// Reset to the initial delay after a successful open.
    pub fn reset(&mut self) {
        self.current = self.policy.initial_delay;
    }
}
