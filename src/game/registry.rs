//! Session Registry
//!
//! Owns every live session plus the player → session index. Only the engine
//! task holds a registry, so there is no locking; the backing maps are never
//! handed out.

use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

use crate::game::error::{CommandError, SessionFault};
use crate::game::events::Emitted;
use crate::game::mode::ModeConfig;
use crate::game::player::PlayerId;
use crate::game::session::{Session, SessionId, SessionOutput};

/// Result of removing a player from their session.
#[derive(Debug)]
pub struct Departure {
    /// Session the player left
    pub session_id: SessionId,
    /// Events for the players who remain
    pub output: Result<SessionOutput, SessionFault>,
    /// Whether the session was deleted
    pub deleted: bool,
}

/// All live sessions, iterated in id order.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<SessionId, Session>,
    player_sessions: BTreeMap<PlayerId, SessionId>,
}

impl SessionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for `mode`.
    pub fn create(&mut self, mode: ModeConfig, now: Instant) -> Result<SessionId, SessionFault> {
        let id = SessionId::generate();
        let session = Session::new(id, mode, now)?;
        self.sessions.insert(id, session);
        Ok(id)
    }

    /// Look up a session.
    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Look up a session mutably.
    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// Remove a session and forget its players.
    pub fn delete(&mut self, id: &SessionId) -> Option<Session> {
        let session = self.sessions.remove(id)?;
        self.player_sessions.retain(|_, sid| sid != id);
        info!(
            session = %id.short(),
            mode = %session.mode().id,
            "Session removed"
        );
        Some(session)
    }

    /// Visit every session of a mode, in id order.
    pub fn for_each_by_mode(&self, mode_id: &str, f: impl FnMut(&Session)) {
        self.sessions
            .values()
            .filter(|s| s.mode().id == mode_id)
            .for_each(f);
    }

    /// Session ids in processing order.
    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// No live sessions?
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of players in any session.
    pub fn player_count(&self) -> usize {
        self.player_sessions.len()
    }

    /// Session a player is in.
    pub fn session_of(&self, player: &PlayerId) -> Option<SessionId> {
        self.player_sessions.get(player).copied()
    }

    /// Lobby of `mode_id` with room for another player.
    pub fn find_open_lobby(&self, mode_id: &str) -> Option<SessionId> {
        self.sessions
            .values()
            .find(|s| !s.is_solo() && s.mode().id == mode_id && !s.is_full() && !s.is_finished())
            .map(Session::id)
    }

    /// Put a player into a session for `mode`.
    ///
    /// Solo modes always get a fresh session. Lobby modes reuse the first
    /// lobby with room, or create one.
    pub fn join(
        &mut self,
        player: PlayerId,
        skin: &str,
        mode: ModeConfig,
        now: Instant,
    ) -> Result<(SessionId, Vec<Emitted>), CommandError> {
        let existing = if mode.is_solo() {
            None
        } else {
            self.find_open_lobby(&mode.id)
        };
        let created = existing.is_none();
        let session_id = match existing {
            Some(id) => id,
            None => self.create(mode, now)?,
        };

        let joined = match self.sessions.get_mut(&session_id) {
            Some(session) => session.add_player(player, skin, now),
            None => Err(SessionFault::MissingMap.into()),
        };

        match joined {
            Ok(events) => {
                self.player_sessions.insert(player, session_id);
                Ok((session_id, events))
            }
            Err(err) => {
                if created {
                    self.sessions.remove(&session_id);
                }
                Err(err)
            }
        }
    }

    /// Take a player out of their session.
    ///
    /// Solo sessions are deleted with their player. Lobby sessions persist
    /// even when empty.
    pub fn leave(&mut self, player: &PlayerId, now: Instant) -> Option<Departure> {
        let session_id = self.player_sessions.remove(player)?;
        let session = self.sessions.get_mut(&session_id)?;
        let output = session.remove_player(*player, now);

        let deleted = session.is_solo();
        if deleted {
            self.delete(&session_id);
        }
        Some(Departure { session_id, output, deleted })
    }
}

// =============================================================================
// TESTS
// =============================================================================
