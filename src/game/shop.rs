//! Shop Window
//!
//! Timed phase between levels where collisions are suspended and players
//! spend currency on abilities. Expiry is checked lazily by the tick.

use std::time::{Duration, Instant};
use serde::Serialize;

use crate::game::error::GameError;
use crate::game::mode::ShopSchedule;
use crate::game::player::{Ability, Player};

// =============================================================================
// CATALOG
// =============================================================================

/// A purchasable item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopItem {
    /// Wire id
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// Price in currency
    pub price: u32,
    /// Ability granted
    pub ability: Ability,
    /// Can be bought repeatedly
    pub stackable: bool,
}

/// Everything the shop sells.
pub const CATALOG: [ShopItem; 4] = [
    ShopItem {
        id: "checkpoint",
        name: "Checkpoint",
        price: 5,
        ability: Ability::Checkpoint,
        stackable: false,
    },
    ShopItem {
        id: "dash",
        name: "Dash",
        price: 8,
        ability: Ability::Dash,
        stackable: false,
    },
    ShopItem {
        id: "speed",
        name: "Speed Boost",
        price: 4,
        ability: Ability::Speed,
        stackable: true,
    },
    ShopItem {
        id: "magnet",
        name: "Goal Magnet",
        price: 6,
        ability: Ability::Magnet,
        stackable: true,
    },
];

/// Look up an item by wire id.
pub fn find_item(id: &str) -> Result<&'static ShopItem, GameError> {
    CATALOG
        .iter()
        .find(|item| item.id == id)
        .ok_or_else(|| GameError::UnknownItem(id.to_string()))
}

/// Outcome of a successful purchase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Purchase {
    /// Item bought
    pub item: &'static ShopItem,
    /// Balance after the debit
    pub balance: u32,
    /// Stack count after the purchase
    pub stacks: u32,
}

/// Check-then-debit purchase. On any error the player is untouched.
pub fn purchase(player: &mut Player, item: &'static ShopItem) -> Result<Purchase, GameError> {
    if player.currency < item.price {
        return Err(GameError::InsufficientFunds {
            price: item.price,
            balance: player.currency,
        });
    }
    if !item.stackable && player.has(item.ability) {
        return Err(GameError::AlreadyOwned);
    }

    player.currency -= item.price;
    let stacks = player.abilities.entry(item.ability).or_insert(0);
    *stacks += 1;

    Ok(Purchase {
        item,
        balance: player.currency,
        stacks: *stacks,
    })
}

// =============================================================================
// SHOP WINDOW
// =============================================================================

/// Shop sub-state owned by a session.
#[derive(Clone, Debug)]
pub struct ShopWindow {
    schedule: ShopSchedule,
    duration: Duration,
    active: bool,
    opened_at_level: Option<u32>,
    closes_at: Option<Instant>,
}

impl ShopWindow {
    /// Closed window using a mode's schedule and duration.
    pub fn new(schedule: ShopSchedule, duration: Duration) -> Self {
        Self {
            schedule,
            duration,
            active: false,
            opened_at_level: None,
            closes_at: None,
        }
    }

    /// Open after `completed_level` if the schedule lists it.
    ///
    /// Returns false (and stays closed) otherwise.
    pub fn open(&mut self, completed_level: u32, now: Instant) -> bool {
        if !self.schedule.contains(completed_level) {
            return false;
        }
        self.active = true;
        self.opened_at_level = Some(completed_level);
        self.closes_at = Some(now + self.duration);
        true
    }

    /// Are collisions suspended?
    ///
    /// True strictly before the deadline. At or after it the window closes
    /// itself and this returns false.
    pub fn should_block_collisions(&mut self, now: Instant) -> bool {
        if !self.active {
            return false;
        }
        match self.closes_at {
            Some(deadline) if now < deadline => true,
            _ => {
                self.close();
                false
            }
        }
    }

    /// Has the deadline passed while the window is still marked active?
    pub fn is_expired(&self, now: Instant) -> bool {
        self.active && self.closes_at.is_some_and(|deadline| now >= deadline)
    }

    /// Close immediately.
    pub fn close(&mut self) {
        self.active = false;
        self.closes_at = None;
    }

    /// Is the window active (ignoring the deadline)?
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Level whose completion opened the window.
    pub fn opened_at_level(&self) -> Option<u32> {
        self.opened_at_level
    }

    /// Deadline of the open window.
    pub fn closes_at(&self) -> Option<Instant> {
        self.closes_at
    }

    /// Time until the deadline (zero when closed or expired).
    pub fn time_remaining(&self, now: Instant) -> Duration {
        match (self.active, self.closes_at) {
            (true, Some(deadline)) => deadline.saturating_duration_since(now),
            _ => Duration::ZERO,
        }
    }

    /// Buy an item while the window is open.
    pub fn buy_item(
        &self,
        player: &mut Player,
        item_id: &str,
        now: Instant,
    ) -> Result<Purchase, GameError> {
        if !self.active || self.is_expired(now) {
            return Err(GameError::ShopClosed);
        }
        let item = find_item(item_id)?;
        purchase(player, item)
    }
}

// =============================================================================
// TESTS
// =============================================================================
