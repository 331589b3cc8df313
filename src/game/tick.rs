//! Tick Scheduler
//!
//! Advances every live session once per tick, in session-id order. A fault
//! or panic in one session discards that session only; the rest of the
//! tick carries on.

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{error, warn};
#[cfg(feature = "debug-tracing")]
use tracing::debug;

use crate::game::events::Emitted;
use crate::game::mode::SessionKind;
use crate::game::player::PlayerId;
use crate::game::registry::SessionRegistry;
use crate::game::session::{LevelCompletion, RunSummary, SessionId, Teardown};

/// Output of one session for one tick.
#[derive(Clone, Debug)]
pub struct SessionTick {
    /// Session id
    pub session_id: SessionId,
    /// Mode id
    pub mode_id: String,
    /// Lobby or solo
    pub kind: SessionKind,
    /// Players in the session when the tick ran
    pub players: Vec<PlayerId>,
    /// Addressed events
    pub events: Vec<Emitted>,
    /// Level completed this tick
    pub completed: Option<LevelCompletion>,
    /// Run results, if the run ended
    pub finished: Option<RunSummary>,
    /// Set when the session was removed this tick
    pub teardown: Option<Teardown>,
}

/// A session discarded because its state was corrupt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FaultedSession {
    /// Session id
    pub session_id: SessionId,
    /// Players to send back to mode selection
    pub players: Vec<PlayerId>,
    /// What went wrong
    pub reason: String,
}

/// Result of one scheduler tick.
#[derive(Clone, Debug, Default)]
pub struct TickReport {
    /// Tick number
    pub tick: u64,
    /// Per-session output, in processing order
    pub sessions: Vec<SessionTick>,
    /// Sessions discarded this tick
    pub faulted: Vec<FaultedSession>,
}

/// Fixed-rate driver over the registry.
#[derive(Debug)]
pub struct TickScheduler {
    tick_rate: u32,
    tick: u64,
}

impl TickScheduler {
    /// Scheduler running at `tick_rate` Hz (at least 1).
    pub fn new(tick_rate: u32) -> Self {
        Self {
            tick_rate: tick_rate.max(1),
            tick: 0,
        }
    }

    /// Ticks per second.
    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    /// Interval between ticks.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tick_rate as u64)
    }

    /// Ticks run so far.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Advance every session once.
    pub fn tick(&mut self, registry: &mut SessionRegistry, now: Instant) -> TickReport {
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..Default::default()
        };

        for id in registry.ids() {
            let Some(session) = registry.get_mut(&id) else {
                continue;
            };
            let players = session.player_ids();
            let mode_id = session.mode().id.clone();
            let kind = session.mode().kind;

            let result = panic::catch_unwind(AssertUnwindSafe(|| session.tick(now)));

            let reason = match result {
                Ok(Ok(out)) => {
                    #[cfg(feature = "debug-tracing")]
                    debug!(
                        tick = self.tick,
                        session = %id.short(),
                        events = out.events.len(),
                        "Session ticked"
                    );

                    if out.teardown.is_some() {
                        registry.delete(&id);
                    }
                    report.sessions.push(SessionTick {
                        session_id: id,
                        mode_id,
                        kind,
                        players,
                        events: out.events,
                        completed: out.completed,
                        finished: out.finished,
                        teardown: out.teardown,
                    });
                    continue;
                }
                Ok(Err(fault)) => fault.to_string(),
                Err(payload) => panic_message(payload.as_ref()),
            };

            error!(
                tick = self.tick,
                session = %id.short(),
                players = players.len(),
                %reason,
                "Session faulted, discarding"
            );
            registry.delete(&id);
            report.faulted.push(FaultedSession {
                session_id: id,
                players,
                reason,
            });
        }

        if report.faulted.len() > 1 {
            warn!(
                tick = self.tick,
                count = report.faulted.len(),
                "Multiple sessions faulted in one tick"
            );
        }

        report
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new(crate::TICK_RATE)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panic: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panic: {}", msg)
    } else {
        "panic".to_string()
    }
}

// =============================================================================
// TESTS
// =============================================================================
