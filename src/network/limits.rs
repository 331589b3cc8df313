//! Input Rate Gating
//!
//! Every inbound event passes `check_limit` before the engine acts on it.
//! The default gate counts events per player and event name in one-second
//! windows.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::game::player::PlayerId;

/// Violations from rate limiting
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitViolation {
    /// Budget for this event exhausted in the current window
    #[error("Rate limit exceeded for {event}: {count} in window (max {max})")]
    Exceeded {
        /// Event name
        event: String,
        /// Events seen in the window, including this one
        count: u32,
        /// Budget
        max: u32,
    },
}

/// Admission check applied to every inbound event.
pub trait InputGate: Send {
    /// Allow or refuse one event from `player`.
    fn check_limit(
        &mut self,
        player: PlayerId,
        event: &str,
        now: Instant,
    ) -> Result<(), RateLimitViolation>;

    /// Drop any state kept for a disconnected player.
    fn forget(&mut self, player: PlayerId);
}

/// Per-event budgets.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Window length
    pub window: Duration,
    /// Budget for events without an explicit entry
    pub default_budget: u32,
    /// Event name → budget
    pub budgets: HashMap<String, u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let budgets = [
            // Clients resend held keys every frame
            ("movement", 120),
            ("checkpoint", 10),
            ("shopPurchase", 10),
            ("closeShop", 5),
            ("selectMode", 5),
            ("leaveMode", 5),
            ("proposeRestart", 2),
            ("proposeReturnToMode", 2),
            ("voteRestart", 5),
            ("voteReturnToMode", 5),
            ("ping", 10),
        ]
        .into_iter()
        .map(|(event, budget)| (event.to_string(), budget))
        .collect();

        Self {
            window: Duration::from_secs(1),
            default_budget: 20,
            budgets,
        }
    }
}

impl RateLimitConfig {
    /// Budget for an event name.
    pub fn budget(&self, event: &str) -> u32 {
        self.budgets.get(event).copied().unwrap_or(self.default_budget)
    }
}

#[derive(Debug)]
struct EventWindow {
    count: u32,
    started_at: Instant,
}

impl EventWindow {
    fn check_and_increment(&mut self, max: u32, window: Duration, now: Instant) -> Result<(), u32> {
        if now.saturating_duration_since(self.started_at) >= window {
            self.started_at = now;
            self.count = 0;
        }

        self.count += 1;
        if self.count > max {
            Err(self.count)
        } else {
            Ok(())
        }
    }
}

/// Fixed-window counter per (player, event).
#[derive(Debug, Default)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: HashMap<(PlayerId, String), EventWindow>,
}

impl RateLimiter {
    /// Limiter with the given budgets.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: HashMap::new(),
        }
    }

    /// Number of tracked (player, event) windows.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

impl InputGate for RateLimiter {
    fn check_limit(
        &mut self,
        player: PlayerId,
        event: &str,
        now: Instant,
    ) -> Result<(), RateLimitViolation> {
        let max = self.config.budget(event);
        let window = self.config.window;
        let entry = self
            .windows
            .entry((player, event.to_string()))
            .or_insert(EventWindow { count: 0, started_at: now });

        entry
            .check_and_increment(max, window, now)
            .map_err(|count| RateLimitViolation::Exceeded {
                event: event.to_string(),
                count,
                max,
            })
    }

    fn forget(&mut self, player: PlayerId) {
        self.windows.retain(|(id, _), _| *id != player);
    }
}

/// Gate that admits everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unlimited;

impl InputGate for Unlimited {
    fn check_limit(&mut self, _: PlayerId, _: &str, _: Instant) -> Result<(), RateLimitViolation> {
        Ok(())
    }

    fn forget(&mut self, _: PlayerId) {}
}
