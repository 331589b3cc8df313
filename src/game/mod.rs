//! Game Logic Module
//!
//! Everything that runs inside the engine task. No IO happens here.
//!
//! ## Module Structure
//!
//! - `maze`: Perfect-maze generation and spawn queries
//! - `mode`: Per-mode parameters and curve evaluation
//! - `player`: Player state, movement and abilities
//! - `shop`: Shop window and purchase transaction
//! - `vote`: Restart / return-to-mode consensus
//! - `session`: Per-session state machine
//! - `registry`: Owner of all live sessions
//! - `tick`: Fixed-rate driver with per-session fault containment
//! - `events`: Addressed events produced by sessions
//! - `error`: Rejections and faults

pub mod error;
pub mod events;
pub mod maze;
pub mod mode;
pub mod player;
pub mod registry;
pub mod session;
pub mod shop;
pub mod tick;
pub mod vote;

// Re-export key types
pub use error::{CommandError, GameError, SessionFault};
pub use events::{Audience, Emitted, PhaseKind, SessionEvent};
pub use maze::{MazeGrid, TILE_SIZE};
pub use mode::{CustomModeConfig, ModeCatalog, ModeConfig, SessionKind};
pub use player::{Ability, MoveInput, Player, PlayerId};
pub use registry::SessionRegistry;
pub use session::{CheckpointAction, Phase, Session, SessionCommand, SessionId};
pub use tick::{TickReport, TickScheduler};
pub use vote::{VoteKind, VoteOutcome};
