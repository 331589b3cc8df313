//! Core primitives.
//!
//! Small, dependency-light building blocks shared by the game layer:
//! seeded randomness for maze generation and a float 2D vector for
//! pixel-space positions.

pub mod rng;
pub mod vec2;

// Re-export core types
pub use rng::{DeterministicRng, derive_session_seed};
pub use vec2::Vec2;
