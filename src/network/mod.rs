//! Network Layer
//!
//! WebSocket transport, the JSON protocol and the engine task that owns
//! all session state. Game rules live in `game/`.

pub mod engine;
pub mod limits;
pub mod protocol;
pub mod server;

pub use engine::{Command, Engine, EngineConfig};
pub use limits::{InputGate, RateLimitConfig, RateLimiter};
pub use protocol::{ClientMessage, ErrorCode, ServerMessage};
pub use server::{GameServer, GameServerError};
