//! Session Events
//!
//! Everything a session produces for the outside world. Sessions never
//! talk to sockets; they return addressed events and the engine turns them
//! into protocol messages.

use std::time::Duration;
use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::game::player::{PlayerId, PlayerSnapshot};
use crate::game::shop::ShopItem;
use crate::game::vote::{VoteKind, VoteOutcome};

/// Coarse phase name for snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PhaseKind {
    /// Countdown or pause between levels
    Transitioning,
    /// Level running
    Playing,
    /// Shop window open
    ShopOpen,
    /// Run over
    Finished,
}

/// Why a shop closed without a player closing it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShopCloseReason {
    /// Deadline passed
    Timeout,
    /// Every remaining player was ready
    AllReady,
}

/// Why players were sent back to mode selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReturnReason {
    /// Return-to-mode vote passed
    VotePassed,
    /// Session state was corrupt and discarded
    SessionFault,
}

/// Event payloads.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// New maze for the current level
    MapData {
        /// Width in cells
        width: usize,
        /// Height in cells
        height: usize,
        /// Row-major cells, 1 = wall
        cells: Vec<u8>,
        /// Goal position
        goal: Vec2,
    },

    /// Level counter changed
    LevelUpdate {
        /// Current level
        level: u32,
        /// Player who completed the previous level
        collector: Option<PlayerId>,
        /// Currency awarded to the collector
        reward: u32,
        /// Time taken on the previous level
        split: Option<Duration>,
    },

    /// Periodic state snapshot
    State {
        /// Current level
        level: u32,
        /// Current phase
        phase: PhaseKind,
        /// Time left in a countdown or shop
        phase_remaining: Option<Duration>,
        /// Goal position
        goal: Vec2,
        /// Players in join order
        players: Vec<PlayerSnapshot>,
    },

    /// Shop opened
    ShopOpened {
        /// Level that was just completed
        level: u32,
        /// Time until the shop closes
        remaining: Duration,
        /// Items for sale
        items: &'static [ShopItem],
    },

    /// Shop closed by players
    ShopClosed,

    /// Shop closed on its own
    ShopClosedAutomatically {
        /// Why
        reason: ShopCloseReason,
    },

    /// Purchase accepted
    PurchaseSucceeded {
        /// Item id
        item_id: &'static str,
        /// Balance after purchase
        balance: u32,
        /// Stack count after purchase
        stacks: u32,
    },

    /// Vote round opened
    VoteStarted {
        /// Kind
        kind: VoteKind,
        /// Proposer
        initiator: PlayerId,
        /// Round length
        timeout: Duration,
    },

    /// Vote round resolved
    VoteFinished {
        /// Kind
        kind: VoteKind,
        /// Result
        outcome: VoteOutcome,
        /// Yes votes
        yes: usize,
        /// Eligible players
        eligible: usize,
    },

    /// Run complete
    GameFinished {
        /// Last level completed
        final_level: u32,
        /// Run duration
        total_time: Option<Duration>,
        /// Per-level times
        splits: Option<Vec<Duration>>,
    },

    /// Players must pick a mode again
    ReturnToModeSelect {
        /// Why
        reason: ReturnReason,
    },
}

/// Who receives an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Audience {
    /// Every player in the session
    Session,
    /// A single player
    Player(PlayerId),
}

/// An addressed event.
#[derive(Clone, Debug, PartialEq)]
pub struct Emitted {
    /// Recipients
    pub to: Audience,
    /// Payload
    pub event: SessionEvent,
}

impl Emitted {
    /// Broadcast to the session.
    pub fn all(event: SessionEvent) -> Self {
        Self { to: Audience::Session, event }
    }

    /// Send to one player.
    pub fn player(id: PlayerId, event: SessionEvent) -> Self {
        Self { to: Audience::Player(id), event }
    }

    /// Is this addressed to `id` (directly or by broadcast)?
    pub fn reaches(&self, id: PlayerId) -> bool {
        match self.to {
            Audience::Session => true,
            Audience::Player(target) => target == id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audience() {
        let a = PlayerId::new([1; 16]);
        let b = PlayerId::new([2; 16]);

        assert!(Emitted::all(SessionEvent::ShopClosed).reaches(a));
        let direct = Emitted::player(a, SessionEvent::ShopClosed);
        assert!(direct.reaches(a));
        assert!(!direct.reaches(b));
    }
}
