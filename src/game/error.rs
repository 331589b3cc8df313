//! Game Errors
//!
//! Rejections raised by player actions, and faults that discard a session.

/// A rejected player action.
///
/// Rejections never mutate state and are only reported to the client that
/// caused them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// Unknown mode id
    #[error("Unknown mode: {0}")]
    InvalidMode(String),

    /// Balance below item price
    #[error("Insufficient funds: need {price}, have {balance}")]
    InsufficientFunds {
        /// Item price
        price: u32,
        /// Current balance
        balance: u32,
    },

    /// Non-stackable item bought twice
    #[error("Already owned")]
    AlreadyOwned,

    /// Ability used before purchase
    #[error("Feature not unlocked: {0}")]
    FeatureNotUnlocked(&'static str),

    /// Teleport requested with no checkpoint set
    #[error("No checkpoint set")]
    NoCheckpoint,

    /// Dash still recharging
    #[error("Ability on cooldown")]
    AbilityCooldown,

    /// Vote from a solo player, outside a round, or while one is running
    #[error("Invalid vote")]
    InvalidVote,

    /// Purchase outside an open shop
    #[error("Shop is closed")]
    ShopClosed,

    /// Unknown shop item id
    #[error("Unknown item: {0}")]
    UnknownItem(String),

    /// Player is not in any session
    #[error("Not in a session")]
    NotInSession,

    /// Lobby at max players
    #[error("Session is full")]
    SessionFull,

    /// Requested maze size outside the safe range (clamped, not fatal)
    #[error("Maze size {requested} outside {min}..={max}")]
    GenerationBound {
        /// Requested dimension
        requested: usize,
        /// Lower bound
        min: usize,
        /// Upper bound
        max: usize,
    },
}

/// Corrupt session state. The session is discarded and its players sent
/// back to mode selection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionFault {
    /// Session has no maze after generation
    #[error("Session has no maze")]
    MissingMap,

    /// Maze has no empty cell for the goal or a spawn
    #[error("Maze has no empty cell")]
    NoEmptyCell,
}

/// Failure of a command applied to a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Action refused; report to the sender only
    #[error(transparent)]
    Rejected(#[from] GameError),

    /// Session corrupt; discard it
    #[error(transparent)]
    Fault(#[from] SessionFault),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = GameError::InsufficientFunds { price: 5, balance: 3 };
        assert_eq!(err.to_string(), "Insufficient funds: need 5, have 3");
        assert_eq!(GameError::InvalidMode("x".into()).to_string(), "Unknown mode: x");
    }
}
