//! Player State
//!
//! Position, wallet, abilities and per-level transient state (trail,
//! checkpoint). Movement is integrated here against the session's maze.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};
use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::game::error::GameError;
use crate::game::maze::{MazeGrid, TILE_SIZE};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Base movement speed in pixels per second.
pub const BASE_SPEED: f32 = 180.0;

/// Speed bonus per Speed stack (fraction of base speed).
pub const SPEED_BONUS_PER_STACK: f32 = 0.15;

/// Player collision radius against walls.
pub const PLAYER_RADIUS: f32 = TILE_SIZE * 0.3;

/// Goal pickup radius without Magnet.
pub const PICKUP_RADIUS: f32 = TILE_SIZE * 0.6;

/// Extra pickup radius per Magnet stack.
pub const MAGNET_BONUS_PER_STACK: f32 = TILE_SIZE * 0.25;

/// Pickup radius ceiling. Below one tile, so the goal is only collected
/// from its own cell or an open neighbour, never through a wall.
pub const MAX_PICKUP_RADIUS: f32 = TILE_SIZE * 0.9;

/// Trail points kept per player.
pub const TRAIL_CAPACITY: usize = 64;

/// Minimum spacing between recorded trail points.
const TRAIL_SPACING: f32 = TILE_SIZE / 4.0;

/// Maximum dash distance.
pub const DASH_DISTANCE: f32 = TILE_SIZE * 3.0;

/// Dash probe increment.
const DASH_STEP: f32 = 4.0;

/// Time between dashes.
pub const DASH_COOLDOWN: Duration = Duration::from_secs(3);

/// Longest frame a single movement step integrates.
const MAX_STEP_SECS: f32 = 0.1;

/// Longest distance moved between wall checks.
const MAX_SUBSTEP: f32 = PLAYER_RADIUS;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Unique player identifier (UUID as bytes).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub [u8; 16]);

impl PlayerId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Fresh random id.
    pub fn generate() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s)
            .ok()
            .map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// First four bytes as hex, for logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

// =============================================================================
// ABILITIES
// =============================================================================

/// Purchasable abilities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Ability {
    /// Set and teleport to a checkpoint
    Checkpoint,
    /// Short burst along the facing direction
    Dash,
    /// +15% movement speed per stack
    Speed,
    /// Larger goal pickup radius per stack
    Magnet,
}

impl Ability {
    /// Wire id.
    pub fn id(self) -> &'static str {
        match self {
            Ability::Checkpoint => "checkpoint",
            Ability::Dash => "dash",
            Ability::Speed => "speed",
            Ability::Magnet => "magnet",
        }
    }

    /// Parse a wire id.
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "checkpoint" => Some(Ability::Checkpoint),
            "dash" => Some(Ability::Dash),
            "speed" => Some(Ability::Speed),
            "magnet" => Some(Ability::Magnet),
            _ => None,
        }
    }
}

// =============================================================================
// INPUT & DIRECTION
// =============================================================================

/// Held movement keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveInput {
    /// Left held
    pub left: bool,
    /// Right held
    pub right: bool,
    /// Up held
    pub up: bool,
    /// Down held
    pub down: bool,
}

impl MoveInput {
    /// Unit movement direction (opposing keys cancel).
    pub fn vector(&self) -> Vec2 {
        let x = (self.right as i8 - self.left as i8) as f32;
        let y = (self.down as i8 - self.up as i8) as f32;
        Vec2::new(x, y).normalize()
    }

    /// Any key held?
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.vector().is_zero()
    }
}

/// Last facing direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    /// Facing up
    Up,
    /// Facing down
    #[default]
    Down,
    /// Facing left
    Left,
    /// Facing right
    Right,
}

impl Direction {
    /// Unit vector for this direction.
    pub fn vector(self) -> Vec2 {
        match self {
            Direction::Up => -Vec2::DOWN,
            Direction::Down => Vec2::DOWN,
            Direction::Left => -Vec2::RIGHT,
            Direction::Right => Vec2::RIGHT,
        }
    }

    /// Direction implied by held keys, horizontal first.
    pub fn from_input(input: &MoveInput) -> Option<Self> {
        let v = input.vector();
        if v.x > 0.0 {
            Some(Direction::Right)
        } else if v.x < 0.0 {
            Some(Direction::Left)
        } else if v.y > 0.0 {
            Some(Direction::Down)
        } else if v.y < 0.0 {
            Some(Direction::Up)
        } else {
            None
        }
    }
}

// =============================================================================
// TRAIL
// =============================================================================

/// Bounded trail of recent positions. Oldest points drop first.
#[derive(Clone, Debug, PartialEq)]
pub struct Trail {
    points: VecDeque<Vec2>,
    capacity: usize,
}

impl Trail {
    /// Empty trail holding at most `capacity` points.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a position if it is far enough from the last one.
    pub fn record(&mut self, pos: Vec2) {
        if let Some(last) = self.points.back() {
            if last.distance_squared(pos) < TRAIL_SPACING * TRAIL_SPACING {
                return;
            }
        }
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(pos);
    }

    /// Forget every point.
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// No points recorded?
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &Vec2> {
        self.points.iter()
    }
}

impl Default for Trail {
    fn default() -> Self {
        Self::with_capacity(TRAIL_CAPACITY)
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// A player inside a session.
#[derive(Clone, Debug)]
pub struct Player {
    /// Player id
    pub id: PlayerId,
    /// Cosmetic skin id
    pub skin: String,
    /// Position in pixels
    pub position: Vec2,
    /// Currency balance
    pub currency: u32,
    /// Owned abilities (1 for unlocks, stack count for stackables)
    pub abilities: BTreeMap<Ability, u32>,
    /// Last facing direction
    pub direction: Direction,
    /// Recent positions
    pub trail: Trail,
    /// Saved checkpoint for this level
    pub checkpoint: Option<Vec2>,
    /// Currently held keys
    pub input: MoveInput,
    /// Earliest next dash
    pub dash_ready_at: Option<Instant>,
    /// Marked ready to leave the shop
    pub shop_ready: bool,
}

impl Player {
    /// Create a player at `position` with a starting wallet.
    pub fn new(
        id: PlayerId,
        skin: impl Into<String>,
        position: Vec2,
        currency: u32,
        abilities: BTreeMap<Ability, u32>,
    ) -> Self {
        Self {
            id,
            skin: skin.into(),
            position,
            currency,
            abilities,
            direction: Direction::default(),
            trail: Trail::default(),
            checkpoint: None,
            input: MoveInput::default(),
            dash_ready_at: None,
            shop_ready: false,
        }
    }

    /// Stack count of an ability (0 if not owned).
    #[inline]
    pub fn stacks(&self, ability: Ability) -> u32 {
        self.abilities.get(&ability).copied().unwrap_or(0)
    }

    /// Is the ability owned?
    #[inline]
    pub fn has(&self, ability: Ability) -> bool {
        self.stacks(ability) > 0
    }

    /// Movement speed in pixels per second.
    pub fn speed(&self) -> f32 {
        BASE_SPEED * (1.0 + SPEED_BONUS_PER_STACK * self.stacks(Ability::Speed) as f32)
    }

    /// Goal pickup radius, capped at `MAX_PICKUP_RADIUS`.
    pub fn pickup_radius(&self) -> f32 {
        let bonus = MAGNET_BONUS_PER_STACK * self.stacks(Ability::Magnet) as f32;
        (PICKUP_RADIUS + bonus).min(MAX_PICKUP_RADIUS)
    }

    /// Replace held keys and update the facing direction.
    pub fn set_input(&mut self, input: MoveInput) {
        if let Some(dir) = Direction::from_input(&input) {
            self.direction = dir;
        }
        self.input = input;
    }

    /// Integrate held input for `dt` against the maze walls.
    ///
    /// Axes are resolved separately so the player slides along walls. Long
    /// moves are split into substeps of at most `MAX_SUBSTEP` so no speed
    /// carries the player across a wall tile. Returns true if the position
    /// changed.
    pub fn step(&mut self, grid: &MazeGrid, dt: Duration) -> bool {
        let dir = self.input.vector();
        if dir.is_zero() {
            return false;
        }

        let travel = self.speed() * dt.as_secs_f32().min(MAX_STEP_SECS);
        let substeps = (travel / MAX_SUBSTEP).ceil().max(1.0) as u32;
        let delta = dir.scale(travel / substeps as f32);
        let start = self.position;

        for _ in 0..substeps {
            let along_x = Vec2::new(self.position.x + delta.x, self.position.y);
            if grid.is_circle_clear(along_x, PLAYER_RADIUS) {
                self.position = along_x;
            }
            let along_y = Vec2::new(self.position.x, self.position.y + delta.y);
            if grid.is_circle_clear(along_y, PLAYER_RADIUS) {
                self.position = along_y;
            }
        }

        let moved = self.position != start;
        if moved {
            self.trail.record(self.position);
        }
        moved
    }

    /// Save the current position as this level's checkpoint.
    pub fn set_checkpoint(&mut self) -> Result<Vec2, GameError> {
        if !self.has(Ability::Checkpoint) {
            return Err(GameError::FeatureNotUnlocked(Ability::Checkpoint.id()));
        }
        self.checkpoint = Some(self.position);
        Ok(self.position)
    }

    /// Jump back to the saved checkpoint.
    pub fn teleport_to_checkpoint(&mut self) -> Result<Vec2, GameError> {
        if !self.has(Ability::Checkpoint) {
            return Err(GameError::FeatureNotUnlocked(Ability::Checkpoint.id()));
        }
        let target = self.checkpoint.ok_or(GameError::NoCheckpoint)?;
        self.position = target;
        self.trail.record(target);
        Ok(target)
    }

    /// Burst forward along the facing direction until a wall or
    /// `DASH_DISTANCE`.
    pub fn dash(&mut self, grid: &MazeGrid, now: Instant) -> Result<Vec2, GameError> {
        if !self.has(Ability::Dash) {
            return Err(GameError::FeatureNotUnlocked(Ability::Dash.id()));
        }
        if self.dash_ready_at.is_some_and(|ready| now < ready) {
            return Err(GameError::AbilityCooldown);
        }

        let dir = self.direction.vector();
        let mut travelled = 0.0;
        while travelled + DASH_STEP <= DASH_DISTANCE {
            let next = self.position.add(dir.scale(DASH_STEP));
            if !grid.is_circle_clear(next, PLAYER_RADIUS) {
                break;
            }
            self.position = next;
            travelled += DASH_STEP;
        }

        self.trail.record(self.position);
        self.dash_ready_at = Some(now + DASH_COOLDOWN);
        Ok(self.position)
    }

    /// Move to a fresh spawn and clear per-level state.
    pub fn respawn(&mut self, position: Vec2) {
        self.position = position;
        self.trail.clear();
        self.checkpoint = None;
        self.dash_ready_at = None;
    }

    /// Reset wallet and abilities to a mode's starting values.
    pub fn reset_progress(&mut self, currency: u32, abilities: &BTreeMap<Ability, u32>) {
        self.currency = currency;
        self.abilities = abilities.clone();
        self.shop_ready = false;
    }

    /// Wire snapshot.
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id.to_uuid_string(),
            skin: self.skin.clone(),
            position: self.position.rounded(),
            direction: self.direction,
            currency: self.currency,
            abilities: self.abilities.clone(),
            trail: self.trail.iter().map(|p| p.rounded()).collect(),
            checkpoint: self.checkpoint.map(Vec2::rounded),
        }
    }
}

/// Per-player part of a `state` message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    /// Player UUID
    pub id: String,
    /// Skin id
    pub skin: String,
    /// [x, y] in pixels
    pub position: [f32; 2],
    /// Facing direction
    pub direction: Direction,
    /// Currency balance
    pub currency: u32,
    /// Owned abilities
    pub abilities: BTreeMap<Ability, u32>,
    /// Trail points, oldest first
    pub trail: Vec<[f32; 2]>,
    /// Checkpoint, if set
    pub checkpoint: Option<[f32; 2]>,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor() -> MazeGrid {
        MazeGrid::from_rows(&[
            "#######",
            "#.....#",
            "#######",
        ])
    }

    fn player_at(x: usize, y: usize) -> Player {
        Player::new(
            PlayerId::new([1; 16]),
            "default",
            MazeGrid::cell_center(x, y),
            0,
            BTreeMap::new(),
        )
    }

    #[test]
    fn test_player_id_roundtrip() {
        let id = PlayerId::generate();
        let parsed = PlayerId::from_uuid_str(&id.to_uuid_string()).unwrap();
        assert_eq!(id, parsed);
        assert_eq!(id.short().len(), 8);
    }

    #[test]
    fn test_ability_ids() {
        for ability in [Ability::Checkpoint, Ability::Dash, Ability::Speed, Ability::Magnet] {
            assert_eq!(Ability::from_id(ability.id()), Some(ability));
        }
        assert_eq!(Ability::from_id("laser"), None);
    }

    #[test]
    fn test_input_vector() {
        let input = MoveInput { left: true, right: true, up: false, down: false };
        assert!(input.is_idle());

        let input = MoveInput { right: true, down: true, ..Default::default() };
        assert!((input.vector().length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_step_moves_along_corridor() {
        let grid = corridor();
        let mut player = player_at(1, 1);
        player.set_input(MoveInput { right: true, ..Default::default() });

        let start = player.position;
        assert!(player.step(&grid, Duration::from_millis(100)));
        assert!(player.position.x > start.x);
        assert_eq!(player.position.y, start.y);
        assert_eq!(player.direction, Direction::Right);
    }

    #[test]
    fn test_step_blocked_by_wall() {
        let grid = corridor();
        let mut player = player_at(1, 1);
        player.set_input(MoveInput { up: true, ..Default::default() });

        let start = player.position;
        assert!(!player.step(&grid, Duration::from_millis(100)));
        assert_eq!(player.position, start);
    }

    #[test]
    fn test_step_never_enters_wall() {
        let grid = corridor();
        let mut player = player_at(1, 1);
        player.set_input(MoveInput { right: true, down: true, ..Default::default() });
        for _ in 0..200 {
            player.step(&grid, Duration::from_millis(16));
            assert!(grid.is_circle_clear(player.position, PLAYER_RADIUS));
        }
    }

    #[test]
    fn test_speed_and_magnet_stacks() {
        let mut player = player_at(1, 1);
        assert_eq!(player.speed(), BASE_SPEED);
        player.abilities.insert(Ability::Speed, 2);
        assert!((player.speed() - BASE_SPEED * 1.3).abs() < 1e-3);

        player.abilities.insert(Ability::Magnet, 1);
        assert_eq!(player.pickup_radius(), PICKUP_RADIUS + MAGNET_BONUS_PER_STACK);
    }

    #[test]
    fn test_magnet_radius_capped_below_tile() {
        let mut player = player_at(1, 1);
        for stacks in [2, 5, 100] {
            player.abilities.insert(Ability::Magnet, stacks);
            assert_eq!(player.pickup_radius(), MAX_PICKUP_RADIUS);
        }
        assert!(MAX_PICKUP_RADIUS < TILE_SIZE);
    }

    #[test]
    fn test_fast_step_does_not_cross_wall() {
        let grid = MazeGrid::from_rows(&[
            "#######",
            "#.#...#",
            "#######",
        ]);
        let mut player = player_at(1, 1);
        player.abilities.insert(Ability::Speed, 50);
        player.set_input(MoveInput { right: true, ..Default::default() });

        // One step covers more than three tiles at this speed
        assert!(player.speed() * MAX_STEP_SECS > TILE_SIZE * 3.0);
        for _ in 0..10 {
            player.step(&grid, Duration::from_secs(1));
            assert_eq!(grid.cell_at(player.position), Some((1, 1)));
            assert!(grid.is_circle_clear(player.position, PLAYER_RADIUS));
        }
    }

    #[test]
    fn test_checkpoint_requires_unlock() {
        let mut player = player_at(1, 1);
        assert_eq!(
            player.set_checkpoint(),
            Err(GameError::FeatureNotUnlocked("checkpoint"))
        );
        assert!(player.checkpoint.is_none());
    }

    #[test]
    fn test_checkpoint_set_and_teleport() {
        let mut player = player_at(1, 1);
        player.abilities.insert(Ability::Checkpoint, 1);

        assert_eq!(player.teleport_to_checkpoint(), Err(GameError::NoCheckpoint));

        let saved = player.set_checkpoint().unwrap();
        player.position = MazeGrid::cell_center(4, 1);
        assert_eq!(player.teleport_to_checkpoint().unwrap(), saved);
        assert_eq!(player.position, saved);
    }

    #[test]
    fn test_dash_stops_at_wall_and_cools_down() {
        let grid = corridor();
        let mut player = player_at(4, 1);
        player.abilities.insert(Ability::Dash, 1);
        player.direction = Direction::Right;

        let now = Instant::now();
        let end = player.dash(&grid, now).unwrap();
        assert!(end.x > MazeGrid::cell_center(4, 1).x);
        assert!(grid.is_circle_clear(end, PLAYER_RADIUS));

        assert_eq!(player.dash(&grid, now), Err(GameError::AbilityCooldown));
        assert!(player.dash(&grid, now + DASH_COOLDOWN).is_ok());
    }

    #[test]
    fn test_dash_requires_unlock() {
        let grid = corridor();
        let mut player = player_at(1, 1);
        let start = player.position;
        assert_eq!(
            player.dash(&grid, Instant::now()),
            Err(GameError::FeatureNotUnlocked("dash"))
        );
        assert_eq!(player.position, start);
    }

    #[test]
    fn test_respawn_clears_level_state() {
        let mut player = player_at(1, 1);
        player.checkpoint = Some(Vec2::new(1.0, 1.0));
        player.trail.record(Vec2::new(100.0, 100.0));

        player.respawn(MazeGrid::cell_center(3, 1));
        assert!(player.checkpoint.is_none());
        assert!(player.trail.is_empty());
        assert_eq!(player.position, MazeGrid::cell_center(3, 1));
    }

    #[test]
    fn test_trail_is_bounded() {
        let mut trail = Trail::with_capacity(4);
        for i in 0..10 {
            trail.record(Vec2::new(i as f32 * TILE_SIZE, 0.0));
        }
        assert_eq!(trail.len(), 4);
        assert_eq!(trail.iter().next(), Some(&Vec2::new(6.0 * TILE_SIZE, 0.0)));
    }

    #[test]
    fn test_trail_skips_close_points() {
        let mut trail = Trail::default();
        trail.record(Vec2::new(0.0, 0.0));
        trail.record(Vec2::new(1.0, 0.0));
        assert_eq!(trail.len(), 1);
    }
}
