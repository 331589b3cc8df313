//! Engine Task
//!
//! The single owner of all session state. Connection tasks feed it
//! [`Command`]s; a fixed-rate interval drives the tick. Every command and
//! every tick runs to completion before the next one starts, so no session
//! state is ever locked.
//!
//! Outbound messages go through `try_send`: a slow client loses messages,
//! it never stalls the engine.

use std::collections::BTreeMap;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::game::error::{CommandError, GameError};
use crate::game::events::{Audience, Emitted, ReturnReason};
use crate::game::mode::{CustomModeConfig, ModeCatalog, SessionKind};
use crate::game::player::PlayerId;
use crate::game::registry::{Departure, SessionRegistry};
use crate::game::session::{SessionCommand, SessionId, SessionOutput};
use crate::game::tick::TickScheduler;
use crate::network::limits::InputGate;
use crate::network::protocol::{ClientMessage, ErrorCode, ServerMessage};
use crate::storage::{PersistenceHandle, RunRecord};

/// Skin used when a client does not pick one.
pub const DEFAULT_SKIN: &str = "default";

/// Input to the engine task.
#[derive(Debug)]
pub enum Command {
    /// A connection opened.
    Connect {
        /// Assigned player id
        player: PlayerId,
        /// Outbound queue for this connection
        tx: mpsc::Sender<ServerMessage>,
    },
    /// A connection closed.
    Disconnect {
        /// Player id
        player: PlayerId,
    },
    /// A decoded client message.
    Client {
        /// Sender
        player: PlayerId,
        /// Message
        message: ClientMessage,
    },
}

/// Engine construction parameters.
pub struct EngineConfig {
    /// Available modes
    pub catalog: ModeCatalog,
    /// Ticks per second
    pub tick_rate: u32,
    /// Version string for `welcome`
    pub version: String,
    /// Inbound event gate
    pub gate: Box<dyn InputGate>,
    /// Store queue
    pub persistence: PersistenceHandle,
    /// High score loaded at startup
    pub high_score: Option<(u32, String)>,
}

struct Connection {
    tx: mpsc::Sender<ServerMessage>,
}

/// Session engine.
pub struct Engine {
    registry: SessionRegistry,
    scheduler: TickScheduler,
    catalog: ModeCatalog,
    connections: BTreeMap<PlayerId, Connection>,
    gate: Box<dyn InputGate>,
    persistence: PersistenceHandle,
    high_score: Option<(u32, String)>,
    version: String,
}

impl Engine {
    /// Create an engine.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            registry: SessionRegistry::new(),
            scheduler: TickScheduler::new(config.tick_rate),
            catalog: config.catalog,
            connections: BTreeMap::new(),
            gate: config.gate,
            persistence: config.persistence,
            high_score: config.high_score,
            version: config.version,
        }
    }

    /// Live sessions.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Open connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Best lobby level seen by this process.
    pub fn high_score(&self) -> Option<(u32, &str)> {
        self.high_score.as_ref().map(|(score, skin)| (*score, skin.as_str()))
    }

    /// Drive the engine until every command sender is dropped.
    #[instrument(skip_all)]
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let mut ticker = interval(self.scheduler.tick_duration());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(tick_rate = self.scheduler.tick_rate(), "Engine started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command, Instant::now()),
                    None => break,
                },
                _ = ticker.tick() => self.run_tick(Instant::now()),
            }
        }

        info!(
            ticks = self.scheduler.current_tick(),
            sessions = self.registry.len(),
            "Engine stopped"
        );
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Apply one command.
    pub fn handle_command(&mut self, command: Command, now: Instant) {
        match command {
            Command::Connect { player, tx } => self.connect(player, tx),
            Command::Disconnect { player } => self.disconnect(player, now),
            Command::Client { player, message } => self.handle_client(player, message, now),
        }
    }

    fn connect(&mut self, player: PlayerId, tx: mpsc::Sender<ServerMessage>) {
        self.connections.insert(player, Connection { tx });
        debug!(player = %player.short(), connections = self.connections.len(), "Player connected");

        self.send(player, ServerMessage::Welcome {
            player_id: player.to_uuid_string(),
            version: self.version.clone(),
            modes: self.catalog.ids().map(str::to_string).collect(),
            tick_rate: self.scheduler.tick_rate(),
        });
        if let Some((score, skin)) = &self.high_score {
            self.send(player, ServerMessage::HighScore { score: *score, skin: skin.clone() });
        }
    }

    fn disconnect(&mut self, player: PlayerId, now: Instant) {
        if let Some(departure) = self.registry.leave(&player, now) {
            self.after_departure(departure);
        }
        self.gate.forget(player);
        self.connections.remove(&player);
        debug!(player = %player.short(), connections = self.connections.len(), "Player disconnected");
    }

    fn handle_client(&mut self, player: PlayerId, message: ClientMessage, now: Instant) {
        if !self.connections.contains_key(&player) {
            return;
        }
        let event = message.event_name();
        if let Err(violation) = self.gate.check_limit(player, event, now) {
            debug!(player = %player.short(), %violation, "Event dropped");
            self.send(player, ServerMessage::error(ErrorCode::RateLimited, violation.to_string()));
            return;
        }

        match message {
            ClientMessage::SelectMode { mode, custom_config, skin } => {
                self.select_mode(player, &mode, custom_config.as_ref(), skin, now);
            }
            ClientMessage::LeaveMode => {
                if let Some(departure) = self.registry.leave(&player, now) {
                    self.after_departure(departure);
                }
            }
            ClientMessage::Ping { timestamp } => {
                self.send(player, ServerMessage::Pong {
                    timestamp,
                    server_time: chrono::Utc::now().timestamp_millis(),
                });
            }
            other => {
                if let Some(command) = other.session_command() {
                    self.session_command(player, command, now);
                }
            }
        }
    }

    fn select_mode(
        &mut self,
        player: PlayerId,
        mode_id: &str,
        custom: Option<&CustomModeConfig>,
        skin: Option<String>,
        now: Instant,
    ) {
        let mode = match self.catalog.resolve(mode_id, custom) {
            Ok(mode) => mode,
            Err(err) => {
                self.send(player, ServerMessage::rejected("selectMode", &err));
                return;
            }
        };

        if let Some(departure) = self.registry.leave(&player, now) {
            self.after_departure(departure);
        }

        let skin = skin.unwrap_or_else(|| DEFAULT_SKIN.to_string());
        match self.registry.join(player, &skin, mode, now) {
            Ok((session_id, events)) => {
                if let Some(session) = self.registry.get(&session_id) {
                    let mode = session.mode();
                    self.send(player, ServerMessage::ModeSelected {
                        mode: mode.id.clone(),
                        session_id: session_id.to_uuid_string(),
                        solo: mode.is_solo(),
                        max_levels: mode.max_levels,
                    });
                }
                self.deliver(&[player], &events);
                info!(
                    player = %player.short(),
                    session = %session_id.short(),
                    mode = mode_id,
                    "Mode selected"
                );
            }
            Err(CommandError::Rejected(err)) => {
                self.send(player, ServerMessage::rejected("selectMode", &err));
            }
            Err(CommandError::Fault(fault)) => {
                error!(player = %player.short(), %fault, "Join failed");
                self.send(player, ServerMessage::ReturnToModeSelect {
                    reason: ReturnReason::SessionFault,
                });
            }
        }
    }

    fn session_command(&mut self, player: PlayerId, command: SessionCommand, now: Instant) {
        let action = command.name();
        let item_id = match &command {
            SessionCommand::Purchase(id) => Some(id.clone()),
            _ => None,
        };

        let result = match self.registry.session_of(&player) {
            Some(session_id) => match self.registry.get_mut(&session_id) {
                Some(session) => session
                    .handle(player, command, now)
                    .map(|out| (session_id, session.mode().kind, out)),
                None => Err(GameError::NotInSession.into()),
            },
            None => Err(GameError::NotInSession.into()),
        };

        match result {
            Ok((session_id, kind, out)) => self.apply_output(session_id, kind, out),
            Err(CommandError::Rejected(err)) => {
                debug!(player = %player.short(), action, %err, "Action rejected");
                let message = match item_id {
                    Some(item_id) => ServerMessage::ShopPurchaseFailed {
                        item_id,
                        code: ErrorCode::from(&err),
                        message: err.to_string(),
                    },
                    None => ServerMessage::rejected(action, &err),
                };
                self.send(player, message);
            }
            Err(CommandError::Fault(fault)) => {
                if let Some(session_id) = self.registry.session_of(&player) {
                    self.discard_session(session_id, &fault.to_string());
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Tick
    // -------------------------------------------------------------------------

    /// Advance every session once and route the results.
    pub fn run_tick(&mut self, now: Instant) {
        let report = self.scheduler.tick(&mut self.registry, now);

        for tick in report.sessions {
            self.deliver(&tick.players, &tick.events);
            if let (SessionKind::Lobby, Some(completed)) = (tick.kind, &tick.completed) {
                self.offer_high_score(completed.level, &completed.skin);
            }
            if let Some(summary) = &tick.finished {
                for player in &summary.players {
                    self.persistence.save_run(RunRecord::from_summary(summary, *player));
                }
                info!(
                    session = %tick.session_id.short(),
                    mode = %tick.mode_id,
                    final_level = summary.final_level,
                    "Run finished"
                );
            }
        }

        for faulted in report.faulted {
            for player in &faulted.players {
                self.send(*player, ServerMessage::ReturnToModeSelect {
                    reason: ReturnReason::SessionFault,
                });
            }
        }
    }

    // -------------------------------------------------------------------------
    // Routing
    // -------------------------------------------------------------------------

    /// Route output of a command applied outside the tick.
    fn apply_output(&mut self, session_id: SessionId, kind: SessionKind, out: SessionOutput) {
        let players = self
            .registry
            .get(&session_id)
            .map(|s| s.player_ids())
            .unwrap_or_default();
        self.deliver(&players, &out.events);

        if let (SessionKind::Lobby, Some(completed)) = (kind, &out.completed) {
            self.offer_high_score(completed.level, &completed.skin);
        }
        if let Some(summary) = &out.finished {
            for player in &summary.players {
                self.persistence.save_run(RunRecord::from_summary(summary, *player));
            }
        }
        if let Some(teardown) = out.teardown {
            info!(session = %session_id.short(), ?teardown, "Session torn down");
            self.registry.delete(&session_id);
        }
    }

    fn after_departure(&mut self, departure: Departure) {
        let Departure { session_id, output, deleted } = departure;
        if deleted {
            debug!(session = %session_id.short(), "Solo session removed");
        }
        match output {
            Ok(out) => {
                let kind = self
                    .registry
                    .get(&session_id)
                    .map(|s| s.mode().kind)
                    .unwrap_or(SessionKind::Solo);
                self.apply_output(session_id, kind, out);
            }
            Err(fault) => self.discard_session(session_id, &fault.to_string()),
        }
    }

    fn discard_session(&mut self, session_id: SessionId, reason: &str) {
        let Some(session) = self.registry.delete(&session_id) else {
            return;
        };
        error!(session = %session_id.short(), %reason, "Session faulted, discarding");
        for player in session.player_ids() {
            self.send(player, ServerMessage::ReturnToModeSelect {
                reason: ReturnReason::SessionFault,
            });
        }
    }

    fn offer_high_score(&mut self, level: u32, skin: &str) {
        if self.high_score.as_ref().is_some_and(|(best, _)| *best >= level) {
            return;
        }
        info!(score = level, %skin, "New high score");
        self.high_score = Some((level, skin.to_string()));
        self.persistence.update_high_score(level, skin);

        let players: Vec<PlayerId> = self.connections.keys().copied().collect();
        for player in players {
            self.send(player, ServerMessage::HighScore { score: level, skin: skin.to_string() });
        }
    }

    fn deliver(&self, players: &[PlayerId], events: &[Emitted]) {
        for emitted in events {
            let message = ServerMessage::from_event(&emitted.event);
            match emitted.to {
                Audience::Session => {
                    for player in players {
                        self.send(*player, message.clone());
                    }
                }
                Audience::Player(player) => self.send(player, message),
            }
        }
    }

    fn send(&self, player: PlayerId, message: ServerMessage) {
        let Some(connection) = self.connections.get(&player) else {
            return;
        };
        match connection.tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(player = %player.short(), "Outbound queue full, dropping message");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(player = %player.short(), "Outbound queue closed");
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::mode::{ModeConfig, ShopSchedule, MODE_SPEEDRUN};
    use crate::game::session::tests::{pid, put_on_goal, test_mode};
    use crate::network::limits::{RateLimiter, Unlimited};
    use crate::storage::PersistJob;

    fn engine_with(
        modes: Vec<ModeConfig>,
        gate: Box<dyn InputGate>,
    ) -> (Engine, mpsc::UnboundedReceiver<PersistJob>) {
        let (persistence, jobs) = PersistenceHandle::channel();
        let engine = Engine::new(EngineConfig {
            catalog: ModeCatalog::from_modes(modes),
            tick_rate: 60,
            version: "test".to_string(),
            gate,
            persistence,
            high_score: None,
        });
        (engine, jobs)
    }

    fn connect(engine: &mut Engine, player: PlayerId) -> mpsc::Receiver<ServerMessage> {
        let (tx, rx) = mpsc::channel(256);
        engine.handle_command(Command::Connect { player, tx }, Instant::now());
        rx
    }

    fn client(engine: &mut Engine, player: PlayerId, message: ClientMessage, now: Instant) {
        engine.handle_command(Command::Client { player, message }, now);
    }

    fn select(mode: &str) -> ClientMessage {
        ClientMessage::SelectMode { mode: mode.to_string(), custom_config: None, skin: None }
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    fn lobby_mode() -> ModeConfig {
        test_mode(SessionKind::Lobby, None, ShopSchedule::never())
    }

    fn solo_mode(levels: u32) -> ModeConfig {
        test_mode(SessionKind::Solo, Some(levels), ShopSchedule::never())
    }

    #[test]
    fn test_welcome_on_connect() {
        let (mut engine, _jobs) = engine_with(vec![lobby_mode()], Box::new(Unlimited));
        let mut rx = connect(&mut engine, pid(1));

        let messages = drain(&mut rx);
        match &messages[0] {
            ServerMessage::Welcome { modes, tick_rate, .. } => {
                assert_eq!(modes, &vec!["test".to_string()]);
                assert_eq!(*tick_rate, 60);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(engine.connection_count(), 1);
    }

    #[test]
    fn test_select_mode_sends_map() {
        let (mut engine, _jobs) = engine_with(vec![lobby_mode()], Box::new(Unlimited));
        let mut rx = connect(&mut engine, pid(1));
        drain(&mut rx);

        client(&mut engine, pid(1), select("test"), Instant::now());
        let messages = drain(&mut rx);
        assert!(matches!(messages[0], ServerMessage::ModeSelected { solo: false, .. }));
        assert!(messages.iter().any(|m| matches!(m, ServerMessage::MapData { .. })));
        assert!(messages.iter().any(|m| matches!(m, ServerMessage::LevelUpdate { level: 1, .. })));
        assert_eq!(engine.registry().player_count(), 1);
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let (mut engine, _jobs) = engine_with(vec![lobby_mode()], Box::new(Unlimited));
        let mut rx = connect(&mut engine, pid(1));
        drain(&mut rx);

        client(&mut engine, pid(1), select(MODE_SPEEDRUN), Instant::now());
        let messages = drain(&mut rx);
        assert!(matches!(
            messages.as_slice(),
            [ServerMessage::ActionRejected { code: ErrorCode::InvalidMode, .. }]
        ));
        assert!(engine.registry().is_empty());
    }

    #[test]
    fn test_lobby_players_share_session() {
        let (mut engine, _jobs) = engine_with(vec![lobby_mode()], Box::new(Unlimited));
        let mut rx1 = connect(&mut engine, pid(1));
        let mut rx2 = connect(&mut engine, pid(2));
        let now = Instant::now();

        client(&mut engine, pid(1), select("test"), now);
        client(&mut engine, pid(2), select("test"), now);
        assert_eq!(engine.registry().len(), 1);
        drain(&mut rx1);
        drain(&mut rx2);

        engine.run_tick(now);
        for rx in [&mut rx1, &mut rx2] {
            let messages = drain(rx);
            match messages.last() {
                Some(ServerMessage::State { players, .. }) => assert_eq!(players.len(), 2),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_purchase_outside_session_fails() {
        let (mut engine, _jobs) = engine_with(vec![lobby_mode()], Box::new(Unlimited));
        let mut rx = connect(&mut engine, pid(1));
        drain(&mut rx);

        client(
            &mut engine,
            pid(1),
            ClientMessage::ShopPurchase { item_id: "speed".into() },
            Instant::now(),
        );
        let messages = drain(&mut rx);
        match messages.as_slice() {
            [ServerMessage::ShopPurchaseFailed { item_id, code, .. }] => {
                assert_eq!(item_id, "speed");
                assert_eq!(*code, ErrorCode::NotInSession);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_purchase_while_playing_reports_shop_closed() {
        let (mut engine, _jobs) = engine_with(vec![lobby_mode()], Box::new(Unlimited));
        let mut rx = connect(&mut engine, pid(1));
        let now = Instant::now();
        client(&mut engine, pid(1), select("test"), now);
        drain(&mut rx);

        client(&mut engine, pid(1), ClientMessage::ShopPurchase { item_id: "speed".into() }, now);
        let messages = drain(&mut rx);
        assert!(matches!(
            messages.as_slice(),
            [ServerMessage::ShopPurchaseFailed { code: ErrorCode::ShopClosed, .. }]
        ));
    }

    #[test]
    fn test_rate_limited_events_dropped() {
        let (mut engine, _jobs) = engine_with(vec![lobby_mode()], Box::new(RateLimiter::default()));
        let mut rx = connect(&mut engine, pid(1));
        drain(&mut rx);
        let now = Instant::now();

        for _ in 0..3 {
            client(&mut engine, pid(1), ClientMessage::ProposeRestart, now);
        }
        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 3);
        assert!(matches!(messages[0], ServerMessage::ActionRejected { code: ErrorCode::NotInSession, .. }));
        assert!(matches!(
            &messages[2],
            ServerMessage::Error(err) if err.code == ErrorCode::RateLimited
        ));
    }

    #[test]
    fn test_ping_pong() {
        let (mut engine, _jobs) = engine_with(vec![lobby_mode()], Box::new(Unlimited));
        let mut rx = connect(&mut engine, pid(1));
        drain(&mut rx);

        client(&mut engine, pid(1), ClientMessage::Ping { timestamp: 99 }, Instant::now());
        assert!(matches!(drain(&mut rx).as_slice(), [ServerMessage::Pong { timestamp: 99, .. }]));
    }

    #[test]
    fn test_disconnect_removes_solo_session() {
        let (mut engine, _jobs) = engine_with(vec![solo_mode(3)], Box::new(Unlimited));
        let _rx = connect(&mut engine, pid(1));
        let now = Instant::now();
        client(&mut engine, pid(1), select("test"), now);
        assert_eq!(engine.registry().len(), 1);

        engine.handle_command(Command::Disconnect { player: pid(1) }, now);
        assert!(engine.registry().is_empty());
        assert_eq!(engine.connection_count(), 0);
    }

    #[test]
    fn test_lobby_persists_after_last_player_leaves() {
        let (mut engine, _jobs) = engine_with(vec![lobby_mode()], Box::new(Unlimited));
        let _rx = connect(&mut engine, pid(1));
        let now = Instant::now();
        client(&mut engine, pid(1), select("test"), now);
        client(&mut engine, pid(1), ClientMessage::LeaveMode, now);

        assert_eq!(engine.registry().len(), 1);
        assert_eq!(engine.registry().player_count(), 0);
    }

    #[test]
    fn test_solo_run_persisted_on_finish() {
        let (mut engine, mut jobs) = engine_with(vec![solo_mode(1)], Box::new(Unlimited));
        let mut rx = connect(&mut engine, pid(1));
        let now = Instant::now();
        client(&mut engine, pid(1), select("test"), now);
        drain(&mut rx);

        let session_id = engine.registry.session_of(&pid(1)).unwrap();
        put_on_goal(engine.registry.get_mut(&session_id).unwrap(), pid(1));
        engine.run_tick(now);

        assert!(engine.registry().is_empty());
        let messages = drain(&mut rx);
        assert!(messages.iter().any(|m| matches!(m, ServerMessage::GameFinished { final_level: 1, .. })));

        match jobs.try_recv() {
            Ok(PersistJob::SaveRun(record)) => {
                assert_eq!(record.final_level, 1);
                assert_eq!(record.player_id, pid(1).to_uuid_string());
            }
            other => panic!("unexpected {:?}", other),
        }
        // Solo completions never count toward the lobby high score
        assert!(jobs.try_recv().is_err());
    }

    #[test]
    fn test_lobby_completion_offers_high_score() {
        let (mut engine, mut jobs) = engine_with(vec![lobby_mode()], Box::new(Unlimited));
        let mut rx1 = connect(&mut engine, pid(1));
        let mut rx2 = connect(&mut engine, pid(2));
        let now = Instant::now();
        client(
            &mut engine,
            pid(1),
            ClientMessage::SelectMode { mode: "test".into(), custom_config: None, skin: Some("neon".into()) },
            now,
        );
        drain(&mut rx1);
        drain(&mut rx2);

        let session_id = engine.registry.session_of(&pid(1)).unwrap();
        put_on_goal(engine.registry.get_mut(&session_id).unwrap(), pid(1));
        engine.run_tick(now);

        assert_eq!(engine.high_score(), Some((1, "neon")));
        assert_eq!(
            jobs.try_recv().unwrap(),
            PersistJob::UpdateHighScore { score: 1, skin: "neon".into() }
        );
        // Broadcast to every connection, in a session or not
        assert!(drain(&mut rx2)
            .iter()
            .any(|m| matches!(m, ServerMessage::HighScore { score: 1, .. })));
        assert!(drain(&mut rx1)
            .iter()
            .any(|m| matches!(m, ServerMessage::LevelUpdate { level: 2, .. })));
    }

    #[test]
    fn test_faulted_session_returns_players() {
        let (mut engine, _jobs) = engine_with(vec![lobby_mode()], Box::new(Unlimited));
        let mut rx = connect(&mut engine, pid(1));
        let now = Instant::now();
        client(&mut engine, pid(1), select("test"), now);
        drain(&mut rx);

        let session_id = engine.registry.session_of(&pid(1)).unwrap();
        engine.registry.get_mut(&session_id).unwrap().drop_maze();
        engine.run_tick(now);

        assert!(engine.registry().is_empty());
        assert!(drain(&mut rx).contains(&ServerMessage::ReturnToModeSelect {
            reason: ReturnReason::SessionFault,
        }));
    }

    #[tokio::test]
    async fn test_run_loop_processes_commands() {
        let (engine, _jobs) = engine_with(vec![lobby_mode()], Box::new(Unlimited));
        let (commands, rx) = mpsc::channel(16);
        let task = tokio::spawn(engine.run(rx));

        let (tx, mut out) = mpsc::channel(16);
        commands.send(Command::Connect { player: pid(1), tx }).await.unwrap();
        commands
            .send(Command::Client { player: pid(1), message: ClientMessage::Ping { timestamp: 5 } })
            .await
            .unwrap();

        assert!(matches!(out.recv().await, Some(ServerMessage::Welcome { .. })));
        assert!(matches!(out.recv().await, Some(ServerMessage::Pong { timestamp: 5, .. })));

        drop(commands);
        task.await.unwrap();
    }
}
