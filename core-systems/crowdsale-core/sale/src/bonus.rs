//! Bonus budget.
//!
//! The budget is a fixed share (`bps`) of every token issued through the
//! sale paths. It is recomputed from the cumulative issuance on each accrual,
//! so rounding never drifts across calls. `minted` counts what the bonus agent
//! (or the finalization sweep) has already taken out.

use serde::{Deserialize, Serialize};

use crate::error::SaleError;
use crate::math::mul_div_floor;
use crate::types::{Balance, BPS_DENOM};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusPool {
    bps: u16,
    budget: Balance,
    minted: Balance,
}

impl BonusPool {
    pub fn new(bps: u16) -> Result<Self, SaleError> {
        if u128::from(bps) > BPS_DENOM {
            return Err(SaleError::InvalidConfig("bonus_bps must be <= 10000".into()));
        }
        Ok(Self { bps, budget: 0, minted: 0 })
    }

    pub fn bps(&self) -> u16 {
        self.bps
    }

    /// Total accrued so far.
    pub fn budget(&self) -> Balance {
        self.budget
    }

    /// Total consumed by bonus mints and the final sweep.
    pub fn minted(&self) -> Balance {
        self.minted
    }

    pub fn available(&self) -> Balance {
        self.budget.saturating_sub(self.minted)
    }

    /// Budget owed on `issued` sale tokens.
    pub fn budget_for(&self, issued: Balance) -> Result<Balance, SaleError> {
        mul_div_floor(issued, u128::from(self.bps), BPS_DENOM).ok_or(SaleError::MathOverflow)
    }

    pub fn ensure_available(&self, tokens: Balance) -> Result<(), SaleError> {
        let available = self.available();
        if tokens > available {
            return Err(SaleError::InsufficientBonusBudget { requested: tokens, available });
        }
        Ok(())
    }

    pub(crate) fn set_budget(&mut self, budget: Balance) {
        debug_assert!(budget >= self.budget, "bonus budget only grows");
        self.budget = budget;
    }

    /// Caller has checked `ensure_available(tokens)`.
    pub(crate) fn record_mint(&mut self, tokens: Balance) {
        self.minted += tokens;
    }

    /// Consume everything left, returning the amount swept.
    pub(crate) fn sweep(&mut self) -> Balance {
        let rest = self.available();
        self.minted = self.budget;
        rest
    }
}
