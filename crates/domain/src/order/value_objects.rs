//! Value objects for the order domain.

use serde::{Deserialize, Serialize};

/// Money amount in integer minor units.
///
/// Prices and order amounts are whole numbers in the source services, so all
/// arithmetic is exact and overflow is reported instead of wrapping.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Largest amount every order backend can store in a signed 64-bit column.
    pub const MAX: Money = Money(i64::MAX as u64);

    /// Creates a new amount from minor units.
    pub const fn from_units(units: u64) -> Self {
        Self(units)
    }

    /// Returns the amount in minor units.
    pub const fn units(&self) -> u64 {
        self.0
    }

    /// Multiplies by a quantity, returning None when the result exceeds
    /// [`Money::MAX`].
    pub fn checked_multiply(&self, quantity: u64) -> Option<Money> {
        self.0
            .checked_mul(quantity)
            .map(Money)
            .filter(|amount| *amount <= Money::MAX)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
