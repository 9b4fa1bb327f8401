//! In-memory funds backend with a settable clock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use tiered_crowdsale::{Address, BackendError, Balance, Payment, SaleBackend, Timestamp};

#[derive(Debug, Default)]
pub struct MemoryBank {
    now: AtomicU64,
    balances: RwLock<HashMap<Address, Balance>>,
}

impl MemoryBank {
    pub fn new(now: Timestamp) -> Self {
        Self { now: AtomicU64::new(now), balances: RwLock::new(HashMap::new()) }
    }

    pub fn set_now(&self, t: Timestamp) {
        self.now.store(t, Ordering::SeqCst);
    }

    /// Credit `who` out of thin air.
    pub fn fund(&self, who: Address, amount: Balance) -> Result<(), BackendError> {
        let mut m = self.balances.write();
        let bal = m.entry(who).or_default();
        *bal = bal.checked_add(amount).ok_or_else(|| BackendError::Other("balance overflow".into()))?;
        Ok(())
    }

    pub fn balance(&self, who: &Address) -> Balance {
        self.balances.read().get(who).copied().unwrap_or(0)
    }
}

impl SaleBackend for MemoryBank {
    fn now_unix(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }

    fn settle(&self, payer: Address, attached: Balance, payouts: &[Payment]) -> Result<(), BackendError> {
        let paid_out = payouts
            .iter()
            .try_fold(0u128, |acc, p| acc.checked_add(p.amount()))
            .ok_or_else(|| BackendError::Other("payout overflow".into()))?;
        if paid_out > attached {
            return Err(BackendError::Other(format!("payouts {paid_out} exceed attached {attached}")));
        }

        // Checks above, mutations below, all under one write guard.
        let mut m = self.balances.write();
        let available = m.get(&payer).copied().unwrap_or(0);
        if available < attached {
            return Err(BackendError::Insufficient { needed: attached, available });
        }
        *m.entry(payer).or_default() -= attached;
        for p in payouts {
            let to = match p {
                Payment::Forward { to, .. } | Payment::Refund { to, .. } => *to,
            };
            *m.entry(to).or_default() += p.amount();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(x: u8) -> Address {
        Address([x; 20])
    }

    #[test]
    fn settle_moves_attached_funds() {
        let bank = MemoryBank::new(5);
        bank.fund(addr(1), 100).unwrap();
        bank.settle(
            addr(1),
            60,
            &[Payment::Forward { to: addr(2), amount: 50 }, Payment::Refund { to: addr(1), amount: 10 }],
        )
        .unwrap();
        assert_eq!(bank.balance(&addr(1)), 50);
        assert_eq!(bank.balance(&addr(2)), 50);
        assert_eq!(bank.now_unix(), 5);
    }

    #[test]
    fn settle_is_all_or_nothing() {
        let bank = MemoryBank::new(0);
        bank.fund(addr(1), 10).unwrap();
        assert_eq!(
            bank.settle(addr(1), 20, &[Payment::Forward { to: addr(2), amount: 20 }]),
            Err(BackendError::Insufficient { needed: 20, available: 10 })
        );
        assert!(bank.settle(addr(1), 5, &[Payment::Forward { to: addr(2), amount: 6 }]).is_err());
        assert_eq!(bank.balance(&addr(1)), 10);
        assert_eq!(bank.balance(&addr(2)), 0);
    }
}
