//! Vote Rounds
//!
//! Lobby consensus for restarting the run or returning everyone to mode
//! selection. A round is evaluated after every ballot and once per tick
//! against its deadline. Only players currently in the session count.

use std::collections::BTreeMap;
use std::time::Instant;
use serde::{Serialize, Deserialize};

use crate::game::error::GameError;
use crate::game::mode::{Threshold, VoteSettings};
use crate::game::player::PlayerId;

/// What a round decides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VoteKind {
    /// Restart the session at level 1
    Restart,
    /// Send everyone back to mode selection
    ReturnToMode,
}

/// How a round ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VoteOutcome {
    /// Threshold reached
    Passed,
    /// Threshold can no longer be reached
    Failed,
    /// Deadline passed without reaching the threshold
    TimedOut,
}

impl VoteOutcome {
    /// Did the round pass?
    #[inline]
    pub fn passed(self) -> bool {
        self == VoteOutcome::Passed
    }
}

/// A finished round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoteResolution {
    /// Round kind
    pub kind: VoteKind,
    /// Result
    pub outcome: VoteOutcome,
    /// Affirmative votes from eligible players
    pub yes: usize,
    /// Eligible players at resolution
    pub eligible: usize,
}

#[derive(Clone, Debug)]
enum RoundState {
    Idle,
    Active {
        kind: VoteKind,
        initiator: PlayerId,
        votes: BTreeMap<PlayerId, bool>,
        started_at: Instant,
    },
}

/// Vote sub-state owned by a session.
#[derive(Clone, Debug)]
pub struct VoteRound {
    settings: VoteSettings,
    state: RoundState,
}

impl VoteRound {
    /// Idle round using a mode's voting parameters.
    pub fn new(settings: VoteSettings) -> Self {
        Self {
            settings,
            state: RoundState::Idle,
        }
    }

    /// Is a round running?
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self.state, RoundState::Active { .. })
    }

    /// Kind of the running round.
    pub fn kind(&self) -> Option<VoteKind> {
        match &self.state {
            RoundState::Active { kind, .. } => Some(*kind),
            RoundState::Idle => None,
        }
    }

    /// Player who proposed the running round.
    pub fn initiator(&self) -> Option<PlayerId> {
        match &self.state {
            RoundState::Active { initiator, .. } => Some(*initiator),
            RoundState::Idle => None,
        }
    }

    /// Deadline of the running round.
    pub fn deadline(&self) -> Option<Instant> {
        match &self.state {
            RoundState::Active { started_at, .. } => Some(*started_at + self.settings.timeout()),
            RoundState::Idle => None,
        }
    }

    /// Threshold a kind of round needs.
    pub fn threshold(&self, kind: VoteKind) -> Threshold {
        match kind {
            VoteKind::Restart => self.settings.restart,
            VoteKind::ReturnToMode => self.settings.return_to_mode,
        }
    }

    /// Open a round with an empty ballot box.
    pub fn start(
        &mut self,
        kind: VoteKind,
        initiator: PlayerId,
        now: Instant,
    ) -> Result<(), GameError> {
        if !self.settings.enabled || self.is_active() {
            return Err(GameError::InvalidVote);
        }
        self.state = RoundState::Active {
            kind,
            initiator,
            votes: BTreeMap::new(),
            started_at: now,
        };
        Ok(())
    }

    /// Record a ballot (later ballots overwrite earlier ones) and evaluate.
    ///
    /// Rejected when no round of `kind` is running or the voter is not
    /// eligible.
    pub fn submit(
        &mut self,
        kind: VoteKind,
        player: PlayerId,
        choice: bool,
        eligible: &[PlayerId],
        now: Instant,
    ) -> Result<Option<VoteResolution>, GameError> {
        if !eligible.contains(&player) {
            return Err(GameError::InvalidVote);
        }
        match &mut self.state {
            RoundState::Active { kind: active, votes, .. } if *active == kind => {
                votes.insert(player, choice);
            }
            _ => return Err(GameError::InvalidVote),
        }
        Ok(self.evaluate(eligible, now))
    }

    /// Resolve the round if it passed, became unwinnable or timed out.
    ///
    /// A resolved round returns to idle.
    pub fn evaluate(&mut self, eligible: &[PlayerId], now: Instant) -> Option<VoteResolution> {
        let deadline = self.deadline()?;
        let RoundState::Active { kind, votes, .. } = &self.state else {
            return None;
        };
        let kind = *kind;
        let threshold = self.threshold(kind);

        let (yes, voted) = eligible
            .iter()
            .filter_map(|p| votes.get(p))
            .fold((0usize, 0usize), |(yes, voted), &choice| {
                (yes + choice as usize, voted + 1)
            });
        let undecided = eligible.len() - voted;

        let outcome = if threshold.is_met(yes, eligible.len()) {
            VoteOutcome::Passed
        } else if now >= deadline {
            VoteOutcome::TimedOut
        } else if !threshold.is_met(yes + undecided, eligible.len()) {
            VoteOutcome::Failed
        } else {
            return None;
        };

        self.state = RoundState::Idle;
        Some(VoteResolution {
            kind,
            outcome,
            yes,
            eligible: eligible.len(),
        })
    }

    /// Drop any running round.
    pub fn cancel(&mut self) {
        self.state = RoundState::Idle;
    }
}

// =============================================================================
// TESTS
// =============================================================================
