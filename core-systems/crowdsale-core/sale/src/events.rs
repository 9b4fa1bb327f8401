//! Typed, append-only event log.

use serde::{Deserialize, Serialize};

use crate::types::{Address, Balance, Timestamp};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleEvent {
    /// Token movement. `from == None` is a mint.
    Transfer { from: Option<Address>, to: Address, amount: Balance },
    Approval { owner: Address, spender: Address, amount: Balance },
    /// Tokens issued against currency. `accepted` is 0 for manual mints.
    Purchase { payer: Address, beneficiary: Address, accepted: Balance, tokens: Balance },
    OddAmountRefunded { to: Address, amount: Balance },
    BonusMinted { beneficiary: Address, amount: Balance },
    BonusAgentChanged { previous: Address, current: Address },
    StartTimeChanged { previous: Timestamp, start: Timestamp, end: Timestamp },
    Finalized { swept_bonus: Balance, total_supply: Balance },
}

/// Log entry with its position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub seq: u64,
    pub event: SaleEvent,
}

#[derive(Clone, Debug, Default)]
pub struct EventLog {
    records: Vec<Record>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_seq(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn append(&mut self, event: SaleEvent) -> u64 {
        let seq = self.next_seq();
        self.records.push(Record { seq, event });
        seq
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Records with `seq >= from`.
    pub fn since(&self, from: u64) -> &[Record] {
        let start = usize::try_from(from).unwrap_or(usize::MAX).min(self.records.len());
        &self.records[start..]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop everything after the first `len` records. Only used to undo an
    /// uncommitted call.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }
}
