//! Mintable token ledger with a transfer lock.
//!
//! Balances and allowances live in ordered maps so snapshots serialize
//! deterministically. Until `finish_minting` is called, only lock-exempt
//! senders may move tokens; afterwards no more tokens can be created.
//! The exemption follows the bonus agent role and is never persisted.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::SaleError;
use crate::types::{Address, Balance};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLedger {
    balances: BTreeMap<Address, Balance>,
    allowances: BTreeMap<Address, BTreeMap<Address, Balance>>,
    total_supply: Balance,
    minting_finished: bool,
    #[serde(skip)]
    exempt: BTreeSet<Address>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty ledger whose transfer lock does not apply to `who`.
    pub fn with_exempt(who: Address) -> Self {
        let mut ledger = Self::default();
        ledger.exempt.insert(who);
        ledger
    }

    pub fn balance_of(&self, holder: &Address) -> Balance {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Balance {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_supply(&self) -> Balance {
        self.total_supply
    }

    pub fn minting_finished(&self) -> bool {
        self.minting_finished
    }

    pub fn is_exempt(&self, who: &Address) -> bool {
        self.exempt.contains(who)
    }

    /// Holders with a non-zero balance, in address order.
    pub fn holders(&self) -> impl Iterator<Item = (&Address, &Balance)> {
        self.balances.iter()
    }

    /// Everything `mint` checks, without mutating.
    pub fn ensure_mintable(&self, to: &Address, amount: Balance) -> Result<(), SaleError> {
        if self.minting_finished {
            return Err(SaleError::AlreadyFinished);
        }
        if to.is_zero() {
            return Err(SaleError::ZeroAddress);
        }
        self.total_supply.checked_add(amount).ok_or(SaleError::MathOverflow)?;
        Ok(())
    }

    pub fn mint(&mut self, to: Address, amount: Balance) -> Result<(), SaleError> {
        self.ensure_mintable(&to, amount)?;
        if amount == 0 {
            return Ok(());
        }
        self.total_supply += amount;
        // Every balance is bounded by the total supply checked above.
        *self.balances.entry(to).or_insert(0) += amount;
        Ok(())
    }

    /// One-way switch: stops minting and unlocks transfers.
    pub fn finish_minting(&mut self) -> Result<(), SaleError> {
        if self.minting_finished {
            return Err(SaleError::AlreadyFinished);
        }
        self.minting_finished = true;
        Ok(())
    }

    /// Make `who` the only lock-exempt sender.
    pub(crate) fn reset_exemption(&mut self, who: Address) {
        self.exempt.clear();
        self.exempt.insert(who);
    }

    /// Move the lock exemption from `previous` to `current`.
    pub(crate) fn move_exemption(&mut self, previous: &Address, current: Address) {
        self.exempt.remove(previous);
        self.exempt.insert(current);
    }

    fn ensure_unlocked(&self, from: &Address) -> Result<(), SaleError> {
        if self.minting_finished || self.exempt.contains(from) {
            Ok(())
        } else {
            Err(SaleError::TransferLocked)
        }
    }

    fn ensure_transfer(&self, from: &Address, to: &Address, amount: Balance) -> Result<(), SaleError> {
        self.ensure_unlocked(from)?;
        if to.is_zero() {
            return Err(SaleError::ZeroAddress);
        }
        let available = self.balance_of(from);
        if amount > available {
            return Err(SaleError::InsufficientBalance { needed: amount, available });
        }
        Ok(())
    }

    fn apply_transfer(&mut self, from: Address, to: Address, amount: Balance) {
        if amount == 0 || from == to {
            return;
        }
        let drained = match self.balances.get_mut(&from) {
            Some(bal) => {
                *bal -= amount;
                *bal == 0
            }
            None => false,
        };
        if drained {
            self.balances.remove(&from);
        }
        *self.balances.entry(to).or_insert(0) += amount;
    }

    pub fn transfer(&mut self, from: Address, to: Address, amount: Balance) -> Result<(), SaleError> {
        self.ensure_transfer(&from, &to, amount)?;
        self.apply_transfer(from, to, amount);
        Ok(())
    }

    /// Overwrites any previous allowance. Approvals are not locked.
    pub fn approve(&mut self, owner: Address, spender: Address, amount: Balance) -> Result<(), SaleError> {
        if spender.is_zero() {
            return Err(SaleError::ZeroAddress);
        }
        let per_owner = self.allowances.entry(owner).or_default();
        if amount == 0 {
            per_owner.remove(&spender);
            if per_owner.is_empty() {
                self.allowances.remove(&owner);
            }
        } else {
            per_owner.insert(spender, amount);
        }
        Ok(())
    }

    /// Spend `spender`'s allowance over `from`. The lock applies to `from`.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Balance,
    ) -> Result<(), SaleError> {
        let allowed = self.allowance(&from, &spender);
        if amount > allowed {
            return Err(SaleError::InsufficientAllowance { needed: amount, available: allowed });
        }
        self.ensure_transfer(&from, &to, amount)?;
        self.apply_transfer(from, to, amount);
        self.approve(from, spender, allowed - amount)
    }
}
