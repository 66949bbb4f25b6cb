//! Position — signed holding in a contract for one account.

use super::contract::Contract;
use serde::{Deserialize, Serialize};

/// Account used when the caller does not name one.
pub const DEFAULT_ACCOUNT: &str = "DEFAULT";

/// Signed holding (positive long, negative short) with its average fill
/// price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub account: String,
    pub contract: Contract,
    pub position: f64,
    pub ave_fill_price: f64,
}

impl Position {
    pub fn new(account: impl Into<String>, contract: Contract) -> Self {
        Position {
            account: account.into(),
            contract,
            position: 0.0,
            ave_fill_price: 0.0,
        }
    }

    /// Fold a fill into the position.
    ///
    /// The average fill price is recombined as a quantity-weighted blend of
    /// the old position and the fill. A fill that brings the position to
    /// exactly zero resets the average to 0.0; a fill that crosses through
    /// zero in one step keeps the blended value.
    pub fn apply_fill(&mut self, n_shares: f64, fill_price: f64) {
        let new_position = self.position + n_shares;
        if new_position == 0.0 {
            self.ave_fill_price = 0.0;
        } else {
            self.ave_fill_price =
                (self.position * self.ave_fill_price + n_shares * fill_price) / new_position;
        }
        self.position = new_position;
    }
}
