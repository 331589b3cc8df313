//! # Maze Rush Server
//!
//! Authoritative real-time session engine for Maze Rush, a multiplayer
//! maze-racing game.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     MAZE RUSH SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Primitives                                │
//! │  ├── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │  └── vec2.rs     - Pixel-space 2D vector                     │
//! │                                                              │
//! │  game/           - Game rules (no IO)                        │
//! │  ├── maze.rs     - Perfect-maze generation                   │
//! │  ├── mode.rs     - Mode descriptors and curves               │
//! │  ├── player.rs   - Movement and abilities                    │
//! │  ├── shop.rs     - Shop window and purchases                 │
//! │  ├── vote.rs     - Restart / return votes                    │
//! │  ├── session.rs  - Per-session state machine                 │
//! │  ├── registry.rs - Live sessions                             │
//! │  └── tick.rs     - Fixed-rate driver                         │
//! │                                                              │
//! │  network/        - Transport                                 │
//! │  ├── engine.rs   - Task owning all session state             │
//! │  ├── server.rs   - WebSocket server                          │
//! │  ├── protocol.rs - JSON message types                        │
//! │  └── limits.rs   - Input rate gating                         │
//! │                                                              │
//! │  storage/        - Fire-and-forget run persistence           │
//! │  config.rs       - Environment configuration                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! One engine task owns every session. Connection tasks send it commands
//! over a channel; a fixed-rate interval drives the tick. Commands and
//! ticks never interleave, so game state carries no locks. Storage calls
//! leave the engine through a channel and never block it.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod network;
pub mod storage;

// Re-export commonly used types
pub use config::ServerConfig;
pub use core::rng::DeterministicRng;
pub use core::vec2::Vec2;
pub use game::mode::{ModeCatalog, ModeConfig};
pub use game::player::PlayerId;
pub use game::registry::SessionRegistry;
pub use game::session::{Session, SessionId};
pub use game::tick::TickScheduler;
pub use network::{Engine, EngineConfig, GameServer};
pub use storage::{MemoryRunStore, PersistenceHandle, RunStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Session tick rate (Hz)
pub const TICK_RATE: u32 = 60;
