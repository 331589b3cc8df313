//! Network Protocol
//!
//! JSON messages exchanged over the WebSocket, tagged by `"type"` with
//! camelCase names.

use serde::{Serialize, Deserialize};

use crate::game::error::GameError;
use crate::game::events::{PhaseKind, ReturnReason, SessionEvent, ShopCloseReason};
use crate::game::maze::TILE_SIZE;
use crate::game::mode::CustomModeConfig;
use crate::game::player::{MoveInput, PlayerSnapshot};
use crate::game::session::{CheckpointAction, SessionCommand};
use crate::game::vote::{VoteKind, VoteOutcome};
use crate::storage::millis;

// =============================================================================
// CLIENT → SERVER
// =============================================================================

/// Messages from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Join a mode.
    #[serde(rename_all = "camelCase")]
    SelectMode {
        /// Mode id
        mode: String,
        /// Parameters for the custom mode
        #[serde(default)]
        custom_config: Option<CustomModeConfig>,
        /// Cosmetic skin
        #[serde(default)]
        skin: Option<String>,
    },

    /// Held movement keys.
    Movement(MoveInput),

    /// Checkpoint or dash.
    Checkpoint {
        /// Which action
        action: CheckpointAction,
    },

    /// Buy an item.
    #[serde(rename_all = "camelCase")]
    ShopPurchase {
        /// Item id
        item_id: String,
    },

    /// Leave the shop (solo) or mark ready (lobby).
    CloseShop,

    /// Propose restarting at level 1.
    ProposeRestart,

    /// Ballot for a restart round.
    VoteRestart {
        /// Yes or no
        vote: bool,
    },

    /// Propose returning to mode selection.
    ProposeReturnToMode,

    /// Ballot for a return-to-mode round.
    VoteReturnToMode {
        /// Yes or no
        vote: bool,
    },

    /// Leave the current session.
    LeaveMode,

    /// Latency probe.
    Ping {
        /// Client timestamp, echoed back
        timestamp: u64,
    },
}

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Event name used for rate limiting.
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientMessage::SelectMode { .. } => "selectMode",
            ClientMessage::Movement(_) => "movement",
            ClientMessage::Checkpoint { .. } => "checkpoint",
            ClientMessage::ShopPurchase { .. } => "shopPurchase",
            ClientMessage::CloseShop => "closeShop",
            ClientMessage::ProposeRestart => "proposeRestart",
            ClientMessage::VoteRestart { .. } => "voteRestart",
            ClientMessage::ProposeReturnToMode => "proposeReturnToMode",
            ClientMessage::VoteReturnToMode { .. } => "voteReturnToMode",
            ClientMessage::LeaveMode => "leaveMode",
            ClientMessage::Ping { .. } => "ping",
        }
    }

    /// The in-session command this message carries, if any.
    pub fn session_command(&self) -> Option<SessionCommand> {
        let command = match self {
            ClientMessage::Movement(input) => SessionCommand::Move(*input),
            ClientMessage::Checkpoint { action } => SessionCommand::Checkpoint(*action),
            ClientMessage::ShopPurchase { item_id } => SessionCommand::Purchase(item_id.clone()),
            ClientMessage::CloseShop => SessionCommand::CloseShop,
            ClientMessage::ProposeRestart => SessionCommand::Propose(VoteKind::Restart),
            ClientMessage::VoteRestart { vote } => SessionCommand::Vote {
                kind: VoteKind::Restart,
                choice: *vote,
            },
            ClientMessage::ProposeReturnToMode => SessionCommand::Propose(VoteKind::ReturnToMode),
            ClientMessage::VoteReturnToMode { vote } => SessionCommand::Vote {
                kind: VoteKind::ReturnToMode,
                choice: *vote,
            },
            ClientMessage::SelectMode { .. }
            | ClientMessage::LeaveMode
            | ClientMessage::Ping { .. } => return None,
        };
        Some(command)
    }
}

// =============================================================================
// SERVER → CLIENT
// =============================================================================

/// Shop item as sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopItemInfo {
    /// Item id
    pub id: String,
    /// Display name
    pub name: String,
    /// Price
    pub price: u32,
    /// Can be bought repeatedly
    pub stackable: bool,
}

/// Messages from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Sent once after the connection opens.
    #[serde(rename_all = "camelCase")]
    Welcome {
        /// Assigned player UUID
        player_id: String,
        /// Server version
        version: String,
        /// Available mode ids
        modes: Vec<String>,
        /// Ticks per second
        tick_rate: u32,
    },

    /// Joined a session.
    #[serde(rename_all = "camelCase")]
    ModeSelected {
        /// Mode id
        mode: String,
        /// Session UUID
        session_id: String,
        /// Solo run or shared lobby
        solo: bool,
        /// Last level, if finite
        max_levels: Option<u32>,
    },

    /// Maze for the current level.
    #[serde(rename_all = "camelCase")]
    MapData {
        /// Width in cells
        width: usize,
        /// Height in cells
        height: usize,
        /// Row-major cells, 1 = wall
        cells: Vec<u8>,
        /// Goal [x, y] in pixels
        goal: [f32; 2],
        /// Pixels per cell
        tile_size: f32,
    },

    /// Level counter changed.
    #[serde(rename_all = "camelCase")]
    LevelUpdate {
        /// Current level
        level: u32,
        /// Who completed the previous level
        #[serde(skip_serializing_if = "Option::is_none", default)]
        collector: Option<String>,
        /// Currency awarded
        reward: u32,
        /// Previous level time
        #[serde(skip_serializing_if = "Option::is_none", default)]
        split_ms: Option<u64>,
    },

    /// Periodic snapshot.
    #[serde(rename_all = "camelCase")]
    State {
        /// Current level
        level: u32,
        /// Current phase
        phase: PhaseKind,
        /// Time left in a countdown or shop
        #[serde(skip_serializing_if = "Option::is_none", default)]
        phase_remaining_ms: Option<u64>,
        /// Goal [x, y]
        goal: [f32; 2],
        /// Players in join order
        players: Vec<PlayerSnapshot>,
    },

    /// Shop opened.
    #[serde(rename_all = "camelCase")]
    ShopOpen {
        /// Level just completed
        level: u32,
        /// Time until it closes
        remaining_ms: u64,
        /// Items for sale
        items: Vec<ShopItemInfo>,
    },

    /// Shop closed by players.
    ShopClosed,

    /// Shop closed on its own.
    ShopClosedAutomatically {
        /// Why
        reason: ShopCloseReason,
    },

    /// Purchase accepted.
    #[serde(rename_all = "camelCase")]
    ShopPurchaseSuccess {
        /// Item id
        item_id: String,
        /// Balance after purchase
        balance: u32,
        /// Stack count
        stacks: u32,
    },

    /// Purchase refused.
    #[serde(rename_all = "camelCase")]
    ShopPurchaseFailed {
        /// Item id
        item_id: String,
        /// Reason code
        code: ErrorCode,
        /// Human-readable reason
        message: String,
    },

    /// Restart vote opened.
    #[serde(rename_all = "camelCase")]
    RestartVoteStarted {
        /// Proposer UUID
        initiator: String,
        /// Round length
        timeout_ms: u64,
    },

    /// Restart vote resolved.
    #[serde(rename_all = "camelCase")]
    RestartVoteFinished {
        /// Result
        outcome: VoteOutcome,
        /// Yes votes
        yes: usize,
        /// Eligible players
        eligible: usize,
    },

    /// Return-to-mode vote opened.
    #[serde(rename_all = "camelCase")]
    ReturnVoteStarted {
        /// Proposer UUID
        initiator: String,
        /// Round length
        timeout_ms: u64,
    },

    /// Return-to-mode vote resolved.
    #[serde(rename_all = "camelCase")]
    ReturnVoteFinished {
        /// Result
        outcome: VoteOutcome,
        /// Yes votes
        yes: usize,
        /// Eligible players
        eligible: usize,
    },

    /// Run complete.
    #[serde(rename_all = "camelCase")]
    GameFinished {
        /// Last level completed
        final_level: u32,
        /// Run duration
        #[serde(skip_serializing_if = "Option::is_none", default)]
        total_time_ms: Option<u64>,
        /// Per-level times
        #[serde(skip_serializing_if = "Option::is_none", default)]
        splits_ms: Option<Vec<u64>>,
    },

    /// Pick a mode again.
    ReturnToModeSelect {
        /// Why
        reason: ReturnReason,
    },

    /// A player action was refused.
    ActionRejected {
        /// Action name
        action: String,
        /// Reason code
        code: ErrorCode,
        /// Human-readable reason
        message: String,
    },

    /// Best lobby level on this server.
    HighScore {
        /// Level
        score: u32,
        /// Skin of the record holder
        skin: String,
    },

    /// Reply to ping.
    #[serde(rename_all = "camelCase")]
    Pong {
        /// Echoed client timestamp
        timestamp: u64,
        /// Server time, Unix milliseconds
        server_time: i64,
    },

    /// Protocol-level error.
    Error(ServerError),
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Build an error message.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error(ServerError {
            code,
            message: message.into(),
        })
    }

    /// Rejection of a player action.
    pub fn rejected(action: &str, err: &GameError) -> Self {
        ServerMessage::ActionRejected {
            action: action.to_string(),
            code: ErrorCode::from(err),
            message: err.to_string(),
        }
    }

    /// Wire form of a session event.
    pub fn from_event(event: &SessionEvent) -> Self {
        match event {
            SessionEvent::MapData { width, height, cells, goal } => ServerMessage::MapData {
                width: *width,
                height: *height,
                cells: cells.clone(),
                goal: goal.rounded(),
                tile_size: TILE_SIZE,
            },
            SessionEvent::LevelUpdate { level, collector, reward, split } => ServerMessage::LevelUpdate {
                level: *level,
                collector: collector.map(|id| id.to_uuid_string()),
                reward: *reward,
                split_ms: split.map(millis),
            },
            SessionEvent::State { level, phase, phase_remaining, goal, players } => ServerMessage::State {
                level: *level,
                phase: *phase,
                phase_remaining_ms: phase_remaining.map(millis),
                goal: goal.rounded(),
                players: players.clone(),
            },
            SessionEvent::ShopOpened { level, remaining, items } => ServerMessage::ShopOpen {
                level: *level,
                remaining_ms: millis(*remaining),
                items: items
                    .iter()
                    .map(|item| ShopItemInfo {
                        id: item.id.to_string(),
                        name: item.name.to_string(),
                        price: item.price,
                        stackable: item.stackable,
                    })
                    .collect(),
            },
            SessionEvent::ShopClosed => ServerMessage::ShopClosed,
            SessionEvent::ShopClosedAutomatically { reason } => {
                ServerMessage::ShopClosedAutomatically { reason: *reason }
            }
            SessionEvent::PurchaseSucceeded { item_id, balance, stacks } => {
                ServerMessage::ShopPurchaseSuccess {
                    item_id: item_id.to_string(),
                    balance: *balance,
                    stacks: *stacks,
                }
            }
            SessionEvent::VoteStarted { kind, initiator, timeout } => {
                let initiator = initiator.to_uuid_string();
                let timeout_ms = millis(*timeout);
                match kind {
                    VoteKind::Restart => ServerMessage::RestartVoteStarted { initiator, timeout_ms },
                    VoteKind::ReturnToMode => ServerMessage::ReturnVoteStarted { initiator, timeout_ms },
                }
            }
            SessionEvent::VoteFinished { kind, outcome, yes, eligible } => match kind {
                VoteKind::Restart => ServerMessage::RestartVoteFinished {
                    outcome: *outcome,
                    yes: *yes,
                    eligible: *eligible,
                },
                VoteKind::ReturnToMode => ServerMessage::ReturnVoteFinished {
                    outcome: *outcome,
                    yes: *yes,
                    eligible: *eligible,
                },
            },
            SessionEvent::GameFinished { final_level, total_time, splits } => {
                ServerMessage::GameFinished {
                    final_level: *final_level,
                    total_time_ms: total_time.map(millis),
                    splits_ms: splits
                        .as_ref()
                        .map(|s| s.iter().copied().map(millis).collect()),
                }
            }
            SessionEvent::ReturnToModeSelect { reason } => {
                ServerMessage::ReturnToModeSelect { reason: *reason }
            }
        }
    }
}

/// Error details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Message could not be parsed.
    InvalidMessage,
    /// Too many messages.
    RateLimited,
    /// Server at connection limit.
    ServerFull,
    /// Unknown mode.
    InvalidMode,
    /// Not enough currency.
    InsufficientFunds,
    /// Item already owned.
    AlreadyOwned,
    /// Ability not purchased.
    FeatureNotUnlocked,
    /// No checkpoint to teleport to.
    NoCheckpoint,
    /// Ability recharging.
    AbilityCooldown,
    /// Vote not allowed.
    InvalidVote,
    /// Shop not open.
    ShopClosed,
    /// Unknown shop item.
    UnknownItem,
    /// Not in a session.
    NotInSession,
    /// Session full.
    SessionFull,
    /// Maze size out of range.
    GenerationBound,
    /// Internal server error.
    InternalError,
}

impl From<&GameError> for ErrorCode {
    fn from(err: &GameError) -> Self {
        match err {
            GameError::InvalidMode(_) => ErrorCode::InvalidMode,
            GameError::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            GameError::AlreadyOwned => ErrorCode::AlreadyOwned,
            GameError::FeatureNotUnlocked(_) => ErrorCode::FeatureNotUnlocked,
            GameError::NoCheckpoint => ErrorCode::NoCheckpoint,
            GameError::AbilityCooldown => ErrorCode::AbilityCooldown,
            GameError::InvalidVote => ErrorCode::InvalidVote,
            GameError::ShopClosed => ErrorCode::ShopClosed,
            GameError::UnknownItem(_) => ErrorCode::UnknownItem,
            GameError::NotInSession => ErrorCode::NotInSession,
            GameError::SessionFull => ErrorCode::SessionFull,
            GameError::GenerationBound { .. } => ErrorCode::GenerationBound,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::core::vec2::Vec2;
    use crate::game::player::PlayerId;

    #[test]
    fn test_parse_select_mode() {
        let msg = ClientMessage::from_json(
            r#"{"type":"selectMode","mode":"custom","customConfig":{"mazeSize":31},"skin":"neon"}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::SelectMode { mode, custom_config, skin } => {
                assert_eq!(mode, "custom");
                assert_eq!(custom_config.unwrap().maze_size, Some(31));
                assert_eq!(skin.as_deref(), Some("neon"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let bare = ClientMessage::from_json(r#"{"type":"selectMode","mode":"classic"}"#).unwrap();
        assert_eq!(
            bare,
            ClientMessage::SelectMode { mode: "classic".into(), custom_config: None, skin: None }
        );
    }

    #[test]
    fn test_parse_gameplay_messages() {
        let movement = ClientMessage::from_json(
            r#"{"type":"movement","left":true,"right":false,"up":false,"down":true}"#,
        )
        .unwrap();
        assert_eq!(
            movement.session_command(),
            Some(SessionCommand::Move(MoveInput { left: true, right: false, up: false, down: true }))
        );

        let dash = ClientMessage::from_json(r#"{"type":"checkpoint","action":"dash"}"#).unwrap();
        assert_eq!(dash.session_command(), Some(SessionCommand::Checkpoint(CheckpointAction::Dash)));

        let buy = ClientMessage::from_json(r#"{"type":"shopPurchase","itemId":"magnet"}"#).unwrap();
        assert_eq!(buy.session_command(), Some(SessionCommand::Purchase("magnet".into())));
        assert_eq!(buy.event_name(), "shopPurchase");

        let vote = ClientMessage::from_json(r#"{"type":"voteReturnToMode","vote":false}"#).unwrap();
        assert_eq!(
            vote.session_command(),
            Some(SessionCommand::Vote { kind: VoteKind::ReturnToMode, choice: false })
        );

        let ping = ClientMessage::from_json(r#"{"type":"ping","timestamp":42}"#).unwrap();
        assert_eq!(ping.session_command(), None);
    }

    #[test]
    fn test_reject_unknown_type() {
        assert!(ClientMessage::from_json(r#"{"type":"teleportAnywhere"}"#).is_err());
        assert!(ClientMessage::from_json(r#"{"type":"movement","left":"yes"}"#).is_err());
    }

    #[test]
    fn test_game_finished_shape() {
        let msg = ServerMessage::from_event(&SessionEvent::GameFinished {
            final_level: 10,
            total_time: Some(Duration::from_millis(12_345)),
            splits: Some(vec![Duration::from_millis(1_000); 10]),
        });
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "gameFinished");
        assert_eq!(json["finalLevel"], 10);
        assert_eq!(json["totalTimeMs"], 12_345);
        assert_eq!(json["splitsMs"].as_array().unwrap().len(), 10);

        let lobby = ServerMessage::from_event(&SessionEvent::GameFinished {
            final_level: 5,
            total_time: None,
            splits: None,
        });
        let json: serde_json::Value = serde_json::from_str(&lobby.to_json().unwrap()).unwrap();
        assert!(json.get("splitsMs").is_none());
    }

    #[test]
    fn test_state_shape() {
        let msg = ServerMessage::from_event(&SessionEvent::State {
            level: 3,
            phase: PhaseKind::ShopOpen,
            phase_remaining: Some(Duration::from_millis(1_500)),
            goal: Vec2::new(60.4, 99.6),
            players: Vec::new(),
        });
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "state");
        assert_eq!(json["phase"], "shopOpen");
        assert_eq!(json["phaseRemainingMs"], 1_500);
        assert_eq!(json["goal"][0], 60.0);
        assert_eq!(json["goal"][1], 100.0);
    }

    #[test]
    fn test_vote_events_split_by_kind() {
        let started = ServerMessage::from_event(&SessionEvent::VoteStarted {
            kind: VoteKind::Restart,
            initiator: PlayerId::new([1; 16]),
            timeout: Duration::from_secs(30),
        });
        assert!(matches!(started, ServerMessage::RestartVoteStarted { timeout_ms: 30_000, .. }));

        let finished = ServerMessage::from_event(&SessionEvent::VoteFinished {
            kind: VoteKind::ReturnToMode,
            outcome: VoteOutcome::Passed,
            yes: 3,
            eligible: 3,
        });
        assert!(matches!(finished, ServerMessage::ReturnVoteFinished { .. }));
    }

    #[test]
    fn test_rejection_codes() {
        let msg = ServerMessage::rejected("shopPurchase", &GameError::AlreadyOwned);
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "actionRejected");
        assert_eq!(json["code"], "already_owned");
    }

    #[test]
    fn test_server_message_roundtrip() {
        let msg = ServerMessage::Pong { timestamp: 7, server_time: 1_700_000_000_000 };
        let parsed = ServerMessage::from_json(&msg.to_json().unwrap()).unwrap();
        assert_eq!(parsed, msg);
    }
}
