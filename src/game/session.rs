//! Session State Machine
//!
//! One running game: a shared lobby or a solo run. A session owns its maze,
//! goal, players (in join order), phase and the shop/vote sub-states.
//!
//! ```text
//!   Transitioning ──▶ Playing ──goal──▶ ShopOpen ──▶ Transitioning ──▶ ...
//!                        │                                 ▲
//!                        └──goal (no shop)─────────────────┘
//!                        └──goal past last level──▶ Finished
//! ```
//!
//! Commands and ticks both return a [`SessionOutput`]; nothing here does IO.

use std::time::{Duration, Instant};
use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;
use crate::game::error::{CommandError, GameError, SessionFault};
use crate::game::events::{
    Emitted, PhaseKind, ReturnReason, SessionEvent, ShopCloseReason,
};
use crate::game::maze::{self, MazeGrid};
use crate::game::mode::{ModeConfig, SessionKind};
use crate::game::player::{MoveInput, Player, PlayerId, MAX_PICKUP_RADIUS};
use crate::game::shop::{ShopWindow, CATALOG};
use crate::game::vote::{VoteKind, VoteResolution, VoteRound};

// =============================================================================
// SESSION ID
// =============================================================================

/// Unique session identifier (UUID as bytes). Orders sessions in the
/// registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub [u8; 16]);

impl SessionId {
    /// Fresh random id.
    pub fn generate() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// First four bytes as hex, for logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

// =============================================================================
// PHASE
// =============================================================================

/// Session phase. Deadlines are checked once per tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Countdown before a level
    Transitioning {
        /// When play starts
        ends_at: Instant,
    },
    /// Level running
    Playing {
        /// When the level timer started
        started_at: Instant,
    },
    /// Shop window open
    ShopOpen {
        /// Shop deadline
        closes_at: Instant,
    },
    /// Run over; nothing mutates any more
    Finished,
}

impl Phase {
    /// Coarse name for snapshots.
    pub fn kind(&self) -> PhaseKind {
        match self {
            Phase::Transitioning { .. } => PhaseKind::Transitioning,
            Phase::Playing { .. } => PhaseKind::Playing,
            Phase::ShopOpen { .. } => PhaseKind::ShopOpen,
            Phase::Finished => PhaseKind::Finished,
        }
    }

    /// Time left before a deadline-driven phase ends.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        match self {
            Phase::Transitioning { ends_at } => Some(ends_at.saturating_duration_since(now)),
            Phase::ShopOpen { closes_at } => Some(closes_at.saturating_duration_since(now)),
            _ => None,
        }
    }
}

// =============================================================================
// COMMANDS & OUTPUT
// =============================================================================

/// Checkpoint ability actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckpointAction {
    /// Save position
    Set,
    /// Return to saved position
    Teleport,
    /// Dash forward
    Dash,
}

/// A player action routed to the player's session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionCommand {
    /// Replace held movement keys
    Move(MoveInput),
    /// Use checkpoint or dash
    Checkpoint(CheckpointAction),
    /// Buy a shop item
    Purchase(String),
    /// Leave (or vote to leave) the shop
    CloseShop,
    /// Open a vote round
    Propose(VoteKind),
    /// Cast a ballot
    Vote {
        /// Round kind
        kind: VoteKind,
        /// Yes or no
        choice: bool,
    },
}

impl SessionCommand {
    /// Action name for rejections and logs.
    pub fn name(&self) -> &'static str {
        match self {
            SessionCommand::Move(_) => "movement",
            SessionCommand::Checkpoint(_) => "checkpoint",
            SessionCommand::Purchase(_) => "shopPurchase",
            SessionCommand::CloseShop => "closeShop",
            SessionCommand::Propose(VoteKind::Restart) => "proposeRestart",
            SessionCommand::Propose(VoteKind::ReturnToMode) => "proposeReturnToMode",
            SessionCommand::Vote { kind: VoteKind::Restart, .. } => "voteRestart",
            SessionCommand::Vote { kind: VoteKind::ReturnToMode, .. } => "voteReturnToMode",
        }
    }
}

/// Why a session must be removed from the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Teardown {
    /// Last level completed
    Finished,
    /// Players voted to return to mode selection
    Returned,
}

/// A level completed this tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelCompletion {
    /// Level completed
    pub level: u32,
    /// Player who reached the goal
    pub collector: PlayerId,
    /// Collector's skin
    pub skin: String,
}

/// Results of a finished run, handed to storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    /// Session id
    pub session_id: SessionId,
    /// Mode id
    pub mode_id: String,
    /// Lobby or solo
    pub kind: SessionKind,
    /// Players present at the end
    pub players: Vec<PlayerId>,
    /// Last level completed
    pub final_level: u32,
    /// From first level start to finish
    pub total_time: Duration,
    /// Time per level
    pub splits: Vec<Duration>,
}

/// Everything a command or tick produced.
#[derive(Clone, Debug, Default)]
pub struct SessionOutput {
    /// Addressed events
    pub events: Vec<Emitted>,
    /// Level completed, if any
    pub completed: Option<LevelCompletion>,
    /// Run results, if the run ended
    pub finished: Option<RunSummary>,
    /// Removal request, if the session ended
    pub teardown: Option<Teardown>,
}

impl SessionOutput {
    fn push(&mut self, emitted: Emitted) {
        self.events.push(emitted);
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// A running game.
#[derive(Clone, Debug)]
pub struct Session {
    id: SessionId,
    mode: ModeConfig,
    rng: DeterministicRng,
    maze: Option<MazeGrid>,
    goal: Vec2,
    level: u32,
    players: Vec<Player>,
    phase: Phase,
    run_started_at: Option<Instant>,
    splits: Vec<Duration>,
    shop: ShopWindow,
    vote: VoteRound,
    next_goal_move: Option<Instant>,
    last_step: Option<Instant>,
}

impl Session {
    /// Create a session at level 1 with a fresh maze.
    ///
    /// Starts in the mode's countdown, or directly in play when the
    /// countdown is zero.
    pub fn new(id: SessionId, mode: ModeConfig, now: Instant) -> Result<Self, SessionFault> {
        let shop = ShopWindow::new(mode.shop.clone(), mode.shop_duration());
        let vote = VoteRound::new(mode.voting.clone());
        let countdown = mode.countdown();

        let mut session = Self {
            id,
            rng: DeterministicRng::for_session(&id.0),
            mode,
            maze: None,
            goal: Vec2::ZERO,
            level: 1,
            players: Vec::new(),
            phase: Phase::Transitioning { ends_at: now },
            run_started_at: None,
            splits: Vec::new(),
            shop,
            vote,
            next_goal_move: None,
            last_step: None,
        };
        session.build_level()?;
        session.enter_countdown(now, countdown);

        debug!(
            session = %session.id.short(),
            mode = %session.mode.id,
            "Session created"
        );
        Ok(session)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Session id.
    #[inline]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Mode descriptor.
    pub fn mode(&self) -> &ModeConfig {
        &self.mode
    }

    /// Current level.
    #[inline]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Current phase.
    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Goal position.
    pub fn goal(&self) -> Vec2 {
        self.goal
    }

    /// Current maze.
    pub fn maze(&self) -> Option<&MazeGrid> {
        self.maze.as_ref()
    }

    /// Players in join order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Look up a player.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Ids of present players, in join order.
    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id).collect()
    }

    /// Completed level times.
    pub fn splits(&self) -> &[Duration] {
        &self.splits
    }

    /// Shop sub-state.
    pub fn shop(&self) -> &ShopWindow {
        &self.shop
    }

    /// Vote sub-state.
    pub fn vote(&self) -> &VoteRound {
        &self.vote
    }

    /// Is this a solo run?
    #[inline]
    pub fn is_solo(&self) -> bool {
        self.mode.is_solo()
    }

    /// No players left?
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// At the mode's player cap?
    pub fn is_full(&self) -> bool {
        self.players.len() >= self.mode.max_players
    }

    /// Run over?
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    // -------------------------------------------------------------------------
    // Membership
    // -------------------------------------------------------------------------

    /// Add a player on a safe spawn.
    ///
    /// Returns the events the newcomer needs to catch up (maze, level and
    /// an open shop).
    pub fn add_player(
        &mut self,
        id: PlayerId,
        skin: &str,
        now: Instant,
    ) -> Result<Vec<Emitted>, CommandError> {
        if self.is_full() || self.is_finished() {
            return Err(GameError::SessionFull.into());
        }

        let grid = self.maze.as_ref().ok_or(SessionFault::MissingMap)?;
        let spawn = maze::safe_spawn_position(grid, Some(self.goal), MAX_PICKUP_RADIUS, &mut self.rng)
            .ok_or(SessionFault::NoEmptyCell)?;

        self.players.push(Player::new(
            id,
            skin,
            spawn,
            self.mode.starting_currency,
            self.mode.starting_abilities.clone(),
        ));

        let mut events = vec![
            Emitted::player(id, self.map_data()?),
            Emitted::player(id, SessionEvent::LevelUpdate {
                level: self.level,
                collector: None,
                reward: 0,
                split: None,
            }),
        ];
        if let (Phase::ShopOpen { .. }, Some(level)) = (self.phase, self.shop.opened_at_level()) {
            events.push(Emitted::player(id, SessionEvent::ShopOpened {
                level,
                remaining: self.shop.time_remaining(now),
                items: &CATALOG,
            }));
        }

        info!(
            session = %self.id.short(),
            player = %id.short(),
            players = self.players.len(),
            "Player joined session"
        );
        Ok(events)
    }

    /// Remove a player. Open votes and the shop re-evaluate against the
    /// players who remain.
    pub fn remove_player(&mut self, id: PlayerId, now: Instant) -> Result<SessionOutput, SessionFault> {
        let mut out = SessionOutput::default();
        let before = self.players.len();
        self.players.retain(|p| p.id != id);
        if self.players.len() == before || self.is_finished() {
            return Ok(out);
        }

        info!(
            session = %self.id.short(),
            player = %id.short(),
            players = self.players.len(),
            "Player left session"
        );

        if self.players.is_empty() {
            self.vote.cancel();
            return Ok(out);
        }

        if self.vote.is_active() {
            let eligible = self.player_ids();
            if let Some(resolution) = self.vote.evaluate(&eligible, now) {
                self.apply_vote(resolution, now, &mut out)?;
                if out.teardown.is_some() {
                    return Ok(out);
                }
            }
        }

        if matches!(self.phase, Phase::ShopOpen { .. }) && self.players.iter().all(|p| p.shop_ready) {
            self.finish_shop(now, SessionEvent::ShopClosedAutomatically {
                reason: ShopCloseReason::AllReady,
            }, &mut out);
        }

        Ok(out)
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Apply a player command.
    pub fn handle(
        &mut self,
        player_id: PlayerId,
        command: SessionCommand,
        now: Instant,
    ) -> Result<SessionOutput, CommandError> {
        let mut out = SessionOutput::default();
        if self.is_finished() {
            return Ok(out);
        }
        let idx = self
            .players
            .iter()
            .position(|p| p.id == player_id)
            .ok_or(GameError::NotInSession)?;

        match command {
            SessionCommand::Move(input) => {
                self.players[idx].set_input(input);
            }

            SessionCommand::Checkpoint(action) => {
                let grid = self.maze.as_ref().ok_or(SessionFault::MissingMap)?;
                let player = &mut self.players[idx];
                match action {
                    CheckpointAction::Set => player.set_checkpoint()?,
                    CheckpointAction::Teleport => player.teleport_to_checkpoint()?,
                    CheckpointAction::Dash => player.dash(grid, now)?,
                };
            }

            SessionCommand::Purchase(item_id) => {
                if !matches!(self.phase, Phase::ShopOpen { .. }) {
                    return Err(GameError::ShopClosed.into());
                }
                let bought = self.shop.buy_item(&mut self.players[idx], &item_id, now)?;
                info!(
                    session = %self.id.short(),
                    player = %player_id.short(),
                    item = bought.item.id,
                    balance = bought.balance,
                    "Purchase"
                );
                out.push(Emitted::player(player_id, SessionEvent::PurchaseSucceeded {
                    item_id: bought.item.id,
                    balance: bought.balance,
                    stacks: bought.stacks,
                }));
            }

            SessionCommand::CloseShop => {
                if !matches!(self.phase, Phase::ShopOpen { .. }) {
                    return Err(GameError::ShopClosed.into());
                }
                self.players[idx].shop_ready = true;
                if self.is_solo() || self.players.iter().all(|p| p.shop_ready) {
                    self.finish_shop(now, SessionEvent::ShopClosed, &mut out);
                }
            }

            SessionCommand::Propose(kind) => {
                if self.is_solo() {
                    return Err(GameError::InvalidVote.into());
                }
                self.vote.start(kind, player_id, now)?;
                info!(
                    session = %self.id.short(),
                    player = %player_id.short(),
                    ?kind,
                    "Vote started"
                );
                out.push(Emitted::all(SessionEvent::VoteStarted {
                    kind,
                    initiator: player_id,
                    timeout: self.mode.voting.timeout(),
                }));
            }

            SessionCommand::Vote { kind, choice } => {
                if self.is_solo() {
                    return Err(GameError::InvalidVote.into());
                }
                let eligible = self.player_ids();
                if let Some(resolution) = self.vote.submit(kind, player_id, choice, &eligible, now)? {
                    self.apply_vote(resolution, now, &mut out)?;
                }
            }
        }

        Ok(out)
    }

    // -------------------------------------------------------------------------
    // Tick
    // -------------------------------------------------------------------------

    /// Advance one tick: vote deadline, phase deadlines, movement, goal
    /// collision, then a snapshot for every player.
    ///
    /// A finished session is left untouched.
    pub fn tick(&mut self, now: Instant) -> Result<SessionOutput, SessionFault> {
        let mut out = SessionOutput::default();
        if self.is_finished() {
            return Ok(out);
        }

        if self.vote.is_active() {
            let eligible = self.player_ids();
            if let Some(resolution) = self.vote.evaluate(&eligible, now) {
                self.apply_vote(resolution, now, &mut out)?;
                if out.teardown.is_some() {
                    return Ok(out);
                }
            }
        }

        let phase = self.phase;
        match phase {
            Phase::Transitioning { ends_at } if now >= ends_at => self.begin_level(now),
            Phase::ShopOpen { .. } if !self.shop.should_block_collisions(now) => {
                self.finish_shop(now, SessionEvent::ShopClosedAutomatically {
                    reason: ShopCloseReason::Timeout,
                }, &mut out);
            }
            _ => {}
        }

        let phase = self.phase;
        if let Phase::Playing { started_at } = phase {
            let dt = self
                .last_step
                .map(|last| now.saturating_duration_since(last))
                .unwrap_or_default();
            self.last_step = Some(now);

            self.step_players(dt)?;
            self.relocate_goal_if_due(now)?;

            if !self.shop.should_block_collisions(now) {
                if let Some(idx) = self.find_collector() {
                    self.complete_level(idx, started_at, now, &mut out)?;
                }
            }
        }

        if !self.is_finished() {
            out.push(Emitted::all(self.snapshot(now)));
        }
        Ok(out)
    }

    /// Current state for every player.
    pub fn snapshot(&self, now: Instant) -> SessionEvent {
        SessionEvent::State {
            level: self.level,
            phase: self.phase.kind(),
            phase_remaining: self.phase.remaining(now),
            goal: self.goal,
            players: self.players.iter().map(Player::snapshot).collect(),
        }
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn map_data(&self) -> Result<SessionEvent, SessionFault> {
        let grid = self.maze.as_ref().ok_or(SessionFault::MissingMap)?;
        Ok(SessionEvent::MapData {
            width: grid.width(),
            height: grid.height(),
            cells: grid.to_bytes(),
            goal: self.goal,
        })
    }

    /// Generate the current level's maze, place the goal and respawn
    /// everyone away from it.
    fn build_level(&mut self) -> Result<(), SessionFault> {
        let size = self.mode.maze_size_for(self.level);
        self.maze = Some(maze::generate(size, size, &mut self.rng));

        let grid = self.maze.as_ref().ok_or(SessionFault::MissingMap)?;
        self.goal = maze::random_empty_position(grid, &mut self.rng)
            .ok_or(SessionFault::NoEmptyCell)?;

        for player in &mut self.players {
            let spawn = maze::safe_spawn_position(grid, Some(self.goal), MAX_PICKUP_RADIUS, &mut self.rng)
                .ok_or(SessionFault::NoEmptyCell)?;
            player.respawn(spawn);
        }

        self.next_goal_move = None;
        Ok(())
    }

    fn enter_countdown(&mut self, now: Instant, wait: Duration) {
        if wait.is_zero() {
            self.begin_level(now);
        } else {
            self.phase = Phase::Transitioning { ends_at: now + wait };
        }
    }

    fn begin_level(&mut self, now: Instant) {
        self.phase = Phase::Playing { started_at: now };
        self.run_started_at.get_or_insert(now);
        self.next_goal_move = self.mode.goal_relocate().map(|period| now + period);
        self.last_step = Some(now);
    }

    fn step_players(&mut self, dt: Duration) -> Result<(), SessionFault> {
        let grid = self.maze.as_ref().ok_or(SessionFault::MissingMap)?;
        for player in &mut self.players {
            player.step(grid, dt);
        }
        Ok(())
    }

    fn relocate_goal_if_due(&mut self, now: Instant) -> Result<(), SessionFault> {
        let (Some(due), Some(period)) = (self.next_goal_move, self.mode.goal_relocate()) else {
            return Ok(());
        };
        if now < due {
            return Ok(());
        }

        let grid = self.maze.as_ref().ok_or(SessionFault::MissingMap)?;
        self.goal = maze::safe_spawn_position(grid, Some(self.goal), MAX_PICKUP_RADIUS, &mut self.rng)
            .ok_or(SessionFault::NoEmptyCell)?;
        self.next_goal_move = Some(now + period);
        Ok(())
    }

    /// First player in join order within pickup range.
    fn find_collector(&self) -> Option<usize> {
        self.players
            .iter()
            .position(|p| p.position.distance(self.goal) < p.pickup_radius())
    }

    fn complete_level(
        &mut self,
        idx: usize,
        started_at: Instant,
        now: Instant,
        out: &mut SessionOutput,
    ) -> Result<(), SessionFault> {
        let completed = self.level;
        let reward = self.mode.currency_for(completed);
        let split = now.saturating_duration_since(started_at);

        let collector = &mut self.players[idx];
        collector.currency = collector.currency.saturating_add(reward);
        let collector_id = collector.id;
        out.completed = Some(LevelCompletion {
            level: completed,
            collector: collector_id,
            skin: collector.skin.clone(),
        });

        self.splits.push(split);
        self.level += 1;

        info!(
            session = %self.id.short(),
            player = %collector_id.short(),
            level = completed,
            split_ms = split.as_millis() as u64,
            reward,
            "Level completed"
        );

        if self.mode.is_past_final(self.level) {
            self.finish(now, out);
            return Ok(());
        }

        self.build_level()?;
        out.push(Emitted::all(SessionEvent::LevelUpdate {
            level: self.level,
            collector: Some(collector_id),
            reward,
            split: Some(split),
        }));
        out.push(Emitted::all(self.map_data()?));

        if self.shop.open(completed, now) {
            for player in &mut self.players {
                player.shop_ready = false;
            }
            let remaining = self.shop.time_remaining(now);
            self.phase = Phase::ShopOpen { closes_at: now + remaining };
            out.push(Emitted::all(SessionEvent::ShopOpened {
                level: completed,
                remaining,
                items: &CATALOG,
            }));
        } else {
            self.enter_countdown(now, self.mode.transition());
        }

        Ok(())
    }

    fn finish_shop(&mut self, now: Instant, event: SessionEvent, out: &mut SessionOutput) {
        self.shop.close();
        for player in &mut self.players {
            player.shop_ready = false;
        }
        out.push(Emitted::all(event));
        self.enter_countdown(now, self.mode.transition());
    }

    fn finish(&mut self, now: Instant, out: &mut SessionOutput) {
        self.phase = Phase::Finished;
        self.vote.cancel();
        self.shop.close();

        let final_level = self.level - 1;
        let total_time = self
            .run_started_at
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default();

        info!(
            session = %self.id.short(),
            final_level,
            total_ms = total_time.as_millis() as u64,
            "Run finished"
        );

        out.push(Emitted::all(SessionEvent::GameFinished {
            final_level,
            total_time: Some(total_time),
            splits: self.is_solo().then(|| self.splits.clone()),
        }));
        out.finished = Some(RunSummary {
            session_id: self.id,
            mode_id: self.mode.id.clone(),
            kind: self.mode.kind,
            players: self.player_ids(),
            final_level,
            total_time,
            splits: self.splits.clone(),
        });
        out.teardown = Some(Teardown::Finished);
    }

    fn apply_vote(
        &mut self,
        resolution: VoteResolution,
        now: Instant,
        out: &mut SessionOutput,
    ) -> Result<(), SessionFault> {
        info!(
            session = %self.id.short(),
            kind = ?resolution.kind,
            outcome = ?resolution.outcome,
            yes = resolution.yes,
            eligible = resolution.eligible,
            "Vote resolved"
        );
        out.push(Emitted::all(SessionEvent::VoteFinished {
            kind: resolution.kind,
            outcome: resolution.outcome,
            yes: resolution.yes,
            eligible: resolution.eligible,
        }));

        if !resolution.outcome.passed() {
            return Ok(());
        }

        match resolution.kind {
            VoteKind::Restart => self.restart(now, out),
            VoteKind::ReturnToMode => {
                self.phase = Phase::Finished;
                self.shop.close();
                out.push(Emitted::all(SessionEvent::ReturnToModeSelect {
                    reason: ReturnReason::VotePassed,
                }));
                out.teardown = Some(Teardown::Returned);
                Ok(())
            }
        }
    }

    /// Back to level 1 with starting wallets and a fresh maze.
    fn restart(&mut self, now: Instant, out: &mut SessionOutput) -> Result<(), SessionFault> {
        self.level = 1;
        self.splits.clear();
        self.run_started_at = None;
        self.shop.close();
        for player in &mut self.players {
            player.reset_progress(self.mode.starting_currency, &self.mode.starting_abilities);
        }
        self.build_level()?;

        out.push(Emitted::all(SessionEvent::LevelUpdate {
            level: self.level,
            collector: None,
            reward: 0,
            split: None,
        }));
        out.push(Emitted::all(self.map_data()?));
        self.enter_countdown(now, self.mode.countdown());
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    #[cfg(test)]
    pub(crate) fn drop_maze(&mut self) {
        self.maze = None;
    }
}

// =============================================================================
// TESTS
// =============================================================================
