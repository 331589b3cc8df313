//! Mode Configuration
//!
//! Per-mode parameters as plain data. Level-dependent values (maze size,
//! currency reward) are piecewise-linear curves read by one evaluator, so a
//! mode descriptor can be serialized, logged and cloned into each session.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use serde::{Serialize, Deserialize};
use tracing::warn;

use crate::game::error::GameError;
use crate::game::maze::{MIN_MAZE_DIMENSION, MAX_MAZE_DIMENSION};
use crate::game::player::Ability;

// =============================================================================
// CURVES
// =============================================================================

/// One control point of a [`Curve`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    /// Level this point applies to
    pub level: u32,
    /// Value at that level
    pub value: f32,
}

/// Piecewise-linear function of the level.
///
/// Below the first point the first value holds. Between points values are
/// interpolated. Past the last point the value grows by `tail_slope` per
/// level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    points: Vec<CurvePoint>,
    tail_slope: f32,
}

impl Curve {
    /// Build a curve. Points are sorted by level.
    pub fn new(points: &[(u32, f32)], tail_slope: f32) -> Self {
        let mut points: Vec<CurvePoint> = points
            .iter()
            .map(|&(level, value)| CurvePoint { level, value })
            .collect();
        points.sort_by_key(|p| p.level);
        Self { points, tail_slope }
    }

    /// Same value at every level.
    pub fn constant(value: f32) -> Self {
        Self::new(&[(1, value)], 0.0)
    }

    /// `base` at level 1, growing by `per_level` afterwards.
    pub fn linear(base: f32, per_level: f32) -> Self {
        Self::new(&[(1, base)], per_level)
    }

    /// Evaluate at `level`.
    pub fn evaluate(&self, level: u32) -> f32 {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return 0.0;
        };

        if level <= first.level {
            return first.value;
        }
        if level >= last.level {
            return last.value + self.tail_slope * (level - last.level) as f32;
        }

        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if level <= b.level {
                let span = (b.level - a.level) as f32;
                if span == 0.0 {
                    return b.value;
                }
                let t = (level - a.level) as f32 / span;
                return a.value + (b.value - a.value) * t;
            }
        }

        last.value
    }
}

// =============================================================================
// SHOP SCHEDULE
// =============================================================================

/// Which completed levels open a shop.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopSchedule {
    /// Open after every N-th level
    pub every: Option<u32>,
    /// Open after these specific levels
    pub levels: BTreeSet<u32>,
}

impl ShopSchedule {
    /// No shops.
    pub fn never() -> Self {
        Self::default()
    }

    /// Shop after every `n` levels.
    pub fn every(n: u32) -> Self {
        Self { every: Some(n), levels: BTreeSet::new() }
    }

    /// Shop after the listed levels.
    pub fn at(levels: &[u32]) -> Self {
        Self { every: None, levels: levels.iter().copied().collect() }
    }

    /// Does completing `level` open a shop?
    pub fn contains(&self, level: u32) -> bool {
        self.levels.contains(&level)
            || self.every.is_some_and(|n| n > 0 && level > 0 && level % n == 0)
    }
}

// =============================================================================
// VOTING
// =============================================================================

/// Affirmative votes a round needs to pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    /// Every eligible player votes yes
    Unanimous,
    /// Strictly more than half of the eligible players vote yes
    Majority,
}

impl Threshold {
    /// Is the threshold met with `yes` affirmative votes out of `eligible`?
    pub fn is_met(self, yes: usize, eligible: usize) -> bool {
        if eligible == 0 {
            return false;
        }
        match self {
            Threshold::Unanimous => yes >= eligible,
            Threshold::Majority => yes * 2 > eligible,
        }
    }
}

/// Voting parameters of a mode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSettings {
    /// Whether vote rounds may start at all
    pub enabled: bool,
    /// Round deadline in milliseconds
    pub timeout_ms: u64,
    /// Threshold for restart votes
    pub restart: Threshold,
    /// Threshold for return-to-mode votes
    pub return_to_mode: Threshold,
}

impl VoteSettings {
    /// Voting turned off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            timeout_ms: 0,
            restart: Threshold::Majority,
            return_to_mode: Threshold::Unanimous,
        }
    }

    /// Round deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for VoteSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 30_000,
            restart: Threshold::Majority,
            return_to_mode: Threshold::Unanimous,
        }
    }
}

// =============================================================================
// MODE CONFIG
// =============================================================================

/// Shared lobby or single-player run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Many players share one session per mode
    Lobby,
    /// One session per connection
    Solo,
}

/// Immutable mode descriptor. Each session owns its own clone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModeConfig {
    /// Mode id
    pub id: String,
    /// Lobby or solo
    pub kind: SessionKind,
    /// Player cap (1 for solo)
    pub max_players: usize,
    /// Last level, or None for endless
    pub max_levels: Option<u32>,
    /// Maze dimension per level
    pub maze_size: Curve,
    /// Currency awarded for completing a level
    pub currency: Curve,
    /// Levels after which a shop opens
    pub shop: ShopSchedule,
    /// Shop window length
    pub shop_duration_ms: u64,
    /// Pause between levels
    pub transition_ms: u64,
    /// Countdown before level 1
    pub countdown_ms: u64,
    /// Goal moves to a new cell this often while playing
    pub goal_relocate_ms: Option<u64>,
    /// Currency each player starts with
    pub starting_currency: u32,
    /// Abilities each player starts with
    pub starting_abilities: BTreeMap<Ability, u32>,
    /// Voting parameters
    pub voting: VoteSettings,
}

impl ModeConfig {
    /// Is this a solo mode?
    #[inline]
    pub fn is_solo(&self) -> bool {
        self.kind == SessionKind::Solo
    }

    /// Maze dimension for `level`, clamped to the safe range.
    pub fn maze_size_for(&self, level: u32) -> usize {
        let raw = self.maze_size.evaluate(level).round().max(0.0) as usize;
        clamp_maze_dimension(raw)
    }

    /// Currency for completing `level`.
    pub fn currency_for(&self, level: u32) -> u32 {
        self.currency.evaluate(level).round().max(0.0) as u32
    }

    /// Does completing `level` open a shop?
    pub fn opens_shop_after(&self, level: u32) -> bool {
        self.shop.contains(level)
    }

    /// Is `level` past the last level?
    pub fn is_past_final(&self, level: u32) -> bool {
        self.max_levels.is_some_and(|max| level > max)
    }

    /// Shop window length.
    pub fn shop_duration(&self) -> Duration {
        Duration::from_millis(self.shop_duration_ms)
    }

    /// Pause between levels.
    pub fn transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    /// Countdown before level 1.
    pub fn countdown(&self) -> Duration {
        Duration::from_millis(self.countdown_ms)
    }

    /// Goal relocation period.
    pub fn goal_relocate(&self) -> Option<Duration> {
        self.goal_relocate_ms.map(Duration::from_millis)
    }
}

/// Clamp a maze dimension to `MIN_MAZE_DIMENSION..=MAX_MAZE_DIMENSION`,
/// logging a warning when the request was out of range.
pub fn clamp_maze_dimension(requested: usize) -> usize {
    let clamped = requested.clamp(MIN_MAZE_DIMENSION, MAX_MAZE_DIMENSION);
    if clamped != requested {
        let err = GameError::GenerationBound {
            requested,
            min: MIN_MAZE_DIMENSION,
            max: MAX_MAZE_DIMENSION,
        };
        warn!("{}, using {}", err, clamped);
    }
    clamped
}

// =============================================================================
// CUSTOM MODES
// =============================================================================

/// Player-supplied parameters for the `custom` mode.
///
/// Every field is optional and clamped on resolution.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomModeConfig {
    /// Maze dimension at level 1
    pub maze_size: Option<usize>,
    /// Maze growth per level
    pub growth: Option<u32>,
    /// Number of levels
    pub levels: Option<u32>,
    /// Starting currency
    pub starting_currency: Option<u32>,
    /// Shop after every N levels
    pub shop_every: Option<u32>,
}

const CUSTOM_MAX_LEVELS: u32 = 100;
const CUSTOM_MAX_GROWTH: u32 = 10;
const CUSTOM_MAX_CURRENCY: u32 = 1_000;

impl CustomModeConfig {
    fn apply(&self, base: &ModeConfig) -> ModeConfig {
        let mut mode = base.clone();

        let size = clamp_maze_dimension(self.maze_size.unwrap_or(11));
        let growth = self.growth.unwrap_or(2).min(CUSTOM_MAX_GROWTH);
        mode.maze_size = Curve::linear(size as f32, growth as f32);

        if let Some(levels) = self.levels {
            mode.max_levels = Some(levels.clamp(1, CUSTOM_MAX_LEVELS));
        }
        if let Some(currency) = self.starting_currency {
            mode.starting_currency = currency.min(CUSTOM_MAX_CURRENCY);
        }
        mode.shop = match self.shop_every {
            Some(0) | None => ShopSchedule::never(),
            Some(n) => ShopSchedule::every(n),
        };

        mode
    }
}

// =============================================================================
// CATALOG
// =============================================================================

/// Mode id of the shared endless lobby.
pub const MODE_CLASSIC: &str = "classic";
/// Mode id of the shared short race.
pub const MODE_RACE: &str = "race";
/// Mode id of the solo ten-level speedrun.
pub const MODE_SPEEDRUN: &str = "speedrun";
/// Mode id of the solo player-configured run.
pub const MODE_CUSTOM: &str = "custom";

/// All modes known to the server, loaded once at startup.
#[derive(Clone, Debug)]
pub struct ModeCatalog {
    modes: BTreeMap<String, ModeConfig>,
}

impl ModeCatalog {
    /// Catalog of built-in modes.
    pub fn builtin() -> Self {
        let modes = [classic(), race(), speedrun(), custom()]
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect();
        Self { modes }
    }

    /// Catalog from explicit descriptors.
    pub fn from_modes(modes: impl IntoIterator<Item = ModeConfig>) -> Self {
        Self {
            modes: modes.into_iter().map(|m| (m.id.clone(), m)).collect(),
        }
    }

    /// Look up a mode.
    pub fn get(&self, id: &str) -> Option<&ModeConfig> {
        self.modes.get(id)
    }

    /// Mode ids in stable order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.modes.keys().map(String::as_str)
    }

    /// Resolve a mode id into a per-session copy, applying custom
    /// parameters for the custom mode.
    pub fn resolve(
        &self,
        id: &str,
        custom: Option<&CustomModeConfig>,
    ) -> Result<ModeConfig, GameError> {
        let base = self
            .modes
            .get(id)
            .ok_or_else(|| GameError::InvalidMode(id.to_string()))?;

        if id == MODE_CUSTOM {
            Ok(custom.cloned().unwrap_or_default().apply(base))
        } else {
            Ok(base.clone())
        }
    }
}

impl Default for ModeCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn classic() -> ModeConfig {
    ModeConfig {
        id: MODE_CLASSIC.to_string(),
        kind: SessionKind::Lobby,
        max_players: 8,
        max_levels: None,
        maze_size: Curve::new(&[(1, 11.0), (20, 49.0)], 1.0),
        currency: Curve::new(&[(1, 1.0), (10, 3.0), (30, 6.0)], 0.1),
        shop: ShopSchedule::every(5),
        shop_duration_ms: 15_000,
        transition_ms: 2_000,
        countdown_ms: 3_000,
        goal_relocate_ms: None,
        starting_currency: 0,
        starting_abilities: BTreeMap::new(),
        voting: VoteSettings::default(),
    }
}

fn race() -> ModeConfig {
    ModeConfig {
        id: MODE_RACE.to_string(),
        kind: SessionKind::Lobby,
        max_players: 4,
        max_levels: Some(5),
        maze_size: Curve::linear(15.0, 4.0),
        currency: Curve::constant(2.0),
        shop: ShopSchedule::never(),
        shop_duration_ms: 0,
        transition_ms: 2_000,
        countdown_ms: 3_000,
        goal_relocate_ms: Some(12_000),
        starting_currency: 0,
        starting_abilities: [(Ability::Dash, 1)].into_iter().collect(),
        voting: VoteSettings::default(),
    }
}

fn speedrun() -> ModeConfig {
    ModeConfig {
        id: MODE_SPEEDRUN.to_string(),
        kind: SessionKind::Solo,
        max_players: 1,
        max_levels: Some(10),
        maze_size: Curve::linear(9.0, 2.0),
        currency: Curve::constant(1.0),
        shop: ShopSchedule::never(),
        shop_duration_ms: 0,
        transition_ms: 0,
        countdown_ms: 3_000,
        goal_relocate_ms: None,
        starting_currency: 0,
        starting_abilities: [(Ability::Checkpoint, 1)].into_iter().collect(),
        voting: VoteSettings::disabled(),
    }
}

fn custom() -> ModeConfig {
    ModeConfig {
        id: MODE_CUSTOM.to_string(),
        kind: SessionKind::Solo,
        max_players: 1,
        max_levels: Some(10),
        maze_size: Curve::linear(11.0, 2.0),
        currency: Curve::new(&[(1, 1.0), (10, 4.0)], 0.25),
        shop: ShopSchedule::never(),
        shop_duration_ms: 20_000,
        transition_ms: 1_000,
        countdown_ms: 3_000,
        goal_relocate_ms: None,
        starting_currency: 0,
        starting_abilities: BTreeMap::new(),
        voting: VoteSettings::disabled(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_interpolates() {
        let curve = Curve::new(&[(1, 10.0), (11, 30.0)], 0.5);
        assert_eq!(curve.evaluate(0), 10.0);
        assert_eq!(curve.evaluate(1), 10.0);
        assert_eq!(curve.evaluate(6), 20.0);
        assert_eq!(curve.evaluate(11), 30.0);
        assert_eq!(curve.evaluate(15), 32.0);
    }

    #[test]
    fn test_curve_sorts_points() {
        let curve = Curve::new(&[(10, 5.0), (1, 1.0)], 0.0);
        assert_eq!(curve.evaluate(1), 1.0);
        assert_eq!(curve.evaluate(20), 5.0);
    }

    #[test]
    fn test_curve_empty_is_zero() {
        let curve = Curve::new(&[], 3.0);
        assert_eq!(curve.evaluate(7), 0.0);
    }

    #[test]
    fn test_shop_schedule() {
        let fixed = ShopSchedule::at(&[5, 10]);
        assert!(fixed.contains(5));
        assert!(!fixed.contains(6));
        assert!(fixed.contains(10));

        let every = ShopSchedule::every(3);
        assert!(every.contains(3));
        assert!(every.contains(9));
        assert!(!every.contains(4));
        assert!(!every.contains(0));

        assert!(!ShopSchedule::never().contains(5));
    }

    #[test]
    fn test_thresholds() {
        assert!(!Threshold::Unanimous.is_met(2, 3));
        assert!(Threshold::Unanimous.is_met(3, 3));
        assert!(!Threshold::Majority.is_met(1, 2));
        assert!(Threshold::Majority.is_met(2, 3));
        assert!(!Threshold::Majority.is_met(0, 0));
    }

    #[test]
    fn test_maze_size_is_clamped() {
        let mut mode = classic();
        mode.maze_size = Curve::constant(1.0);
        assert_eq!(mode.maze_size_for(1), MIN_MAZE_DIMENSION);

        mode.maze_size = Curve::constant(10_000.0);
        assert_eq!(mode.maze_size_for(1), MAX_MAZE_DIMENSION);
        // Odd rounding in the generator must not push past the bound
        let built = crate::game::maze::normalize_dimension(mode.maze_size_for(1));
        assert!(built <= 200);
    }

    #[test]
    fn test_currency_never_negative() {
        let mut mode = classic();
        mode.currency = Curve::linear(1.0, -1.0);
        assert_eq!(mode.currency_for(1), 1);
        assert_eq!(mode.currency_for(50), 0);
    }

    #[test]
    fn test_resolve_unknown_mode() {
        let catalog = ModeCatalog::builtin();
        assert_eq!(
            catalog.resolve("nope", None),
            Err(GameError::InvalidMode("nope".into()))
        );
    }

    #[test]
    fn test_resolve_custom_clamps() {
        let catalog = ModeCatalog::builtin();
        let custom = CustomModeConfig {
            maze_size: Some(500),
            growth: Some(99),
            levels: Some(0),
            starting_currency: Some(5_000),
            shop_every: Some(2),
        };
        let mode = catalog.resolve(MODE_CUSTOM, Some(&custom)).unwrap();

        assert!(mode.is_solo());
        assert_eq!(mode.maze_size_for(1), MAX_MAZE_DIMENSION);
        assert_eq!(mode.max_levels, Some(1));
        assert_eq!(mode.starting_currency, CUSTOM_MAX_CURRENCY);
        assert!(mode.opens_shop_after(2));
    }

    #[test]
    fn test_resolve_returns_independent_copy() {
        let catalog = ModeCatalog::builtin();
        let mut copy = catalog.resolve(MODE_CLASSIC, None).unwrap();
        copy.max_players = 1;
        assert_eq!(catalog.get(MODE_CLASSIC).unwrap().max_players, 8);
    }

    #[test]
    fn test_final_level() {
        let mode = speedrun();
        assert!(!mode.is_past_final(10));
        assert!(mode.is_past_final(11));
        assert!(!classic().is_past_final(u32::MAX));
    }

    #[test]
    fn test_custom_config_json() {
        let custom: CustomModeConfig =
            serde_json::from_str(r#"{"mazeSize":21,"shopEvery":3}"#).unwrap();
        assert_eq!(custom.maze_size, Some(21));
        assert_eq!(custom.shop_every, Some(3));
        assert_eq!(custom.levels, None);
    }
}
