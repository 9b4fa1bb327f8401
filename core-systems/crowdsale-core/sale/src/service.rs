//! Host boundary around the engine.
//!
//! - Calls are serialized through one mutex, in submission order
//! - The clock and currency movements come from a pluggable `SaleBackend`
//! - A call whose settlement fails is rolled back completely
//! - Committed events are published on a tokio broadcast channel

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::engine::{Crowdsale, Payment, Receipt, SaleSnapshot};
use crate::error::{BackendError, SaleError};
use crate::events::{Record, SaleEvent};
use crate::phase::Phase;
use crate::pricing::Quote;
use crate::types::{Address, Balance, Timestamp};

/// Default depth of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1_024;

/// Clock and funds provided by the host.
pub trait SaleBackend: Send + Sync + 'static {
    fn now_unix(&self) -> Timestamp;

    /// Collect `attached` from `payer` and execute `payouts`, all or nothing.
    fn settle(&self, payer: Address, attached: Balance, payouts: &[Payment]) -> Result<(), BackendError>;
}

pub struct SaleService<B: SaleBackend> {
    backend: Arc<B>,
    sale: Mutex<Crowdsale>,
    events_tx: broadcast::Sender<Record>,
}

impl<B: SaleBackend> SaleService<B> {
    pub fn new(backend: Arc<B>, sale: Crowdsale) -> Self {
        Self::with_capacity(backend, sale, DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(backend: Arc<B>, sale: Crowdsale, event_capacity: usize) -> Self {
        let (events_tx, _) = broadcast::channel(event_capacity.max(1));
        Self { backend, sale: Mutex::new(sale), events_tx }
    }

    /// Stream of committed events. Slow receivers may observe `Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Record> {
        self.events_tx.subscribe()
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Run `f` against the engine under the lock. Any error rolls the engine
    /// back to where it was before the call.
    fn execute<T, F>(&self, op: &'static str, caller: Address, f: F) -> Result<T, SaleError>
    where
        F: FnOnce(&mut Crowdsale, Timestamp, &B) -> Result<T, SaleError>,
    {
        let mut sale = self.sale.lock();
        let now = self.backend.now_unix();
        let cp = sale.checkpoint();
        let from = sale.next_event_seq();

        match f(&mut *sale, now, self.backend.as_ref()) {
            Ok(out) => {
                // Published under the lock so subscribers see commit order.
                for record in sale.events_since(from) {
                    let _ = self.events_tx.send(record.clone());
                }
                Ok(out)
            }
            Err(err) => {
                sale.rollback(cp);
                if matches!(err, SaleError::Backend(_)) {
                    warn!(op, %caller, error = %err, "settlement failed, call rolled back");
                } else {
                    warn!(op, %caller, error = %err, "call rejected");
                }
                Err(err)
            }
        }
    }

    pub fn contribute(&self, payer: Address, beneficiary: Address, amount: Balance) -> Result<Receipt, SaleError> {
        let receipt = self.execute("contribute", payer, |sale, now, backend| {
            let receipt = sale.contribute(payer, beneficiary, amount, now)?;
            backend.settle(payer, amount, &receipt.effects)?;
            Ok(receipt)
        })?;
        info!(
            %payer,
            %beneficiary,
            tokens = %receipt.tokens,
            accepted = %receipt.accepted,
            refund = %receipt.refund,
            "purchase accepted"
        );
        Ok(receipt)
    }

    pub fn manual_mint(&self, caller: Address, beneficiary: Address, tokens: Balance) -> Result<Receipt, SaleError> {
        let receipt = self.execute("manual_mint", caller, |sale, now, _| {
            sale.manual_mint(caller, beneficiary, tokens, now)
        })?;
        info!(%beneficiary, tokens = %receipt.tokens, booked = %receipt.booked, "manual mint");
        Ok(receipt)
    }

    pub fn bonus_mint(&self, caller: Address, beneficiary: Address, tokens: Balance) -> Result<Vec<SaleEvent>, SaleError> {
        let events = self.execute("bonus_mint", caller, |sale, _, _| sale.bonus_mint(caller, beneficiary, tokens))?;
        info!(%beneficiary, tokens = %tokens, "bonus minted");
        Ok(events)
    }

    pub fn set_bonus_agent(&self, caller: Address, agent: Address) -> Result<Vec<SaleEvent>, SaleError> {
        let events = self.execute("set_bonus_agent", caller, |sale, _, _| sale.set_bonus_agent(caller, agent))?;
        info!(%agent, "bonus agent changed");
        Ok(events)
    }

    pub fn set_start_time(&self, caller: Address, start: Timestamp) -> Result<Vec<SaleEvent>, SaleError> {
        let events = self.execute("set_start_time", caller, |sale, now, _| sale.set_start_time(caller, start, now))?;
        info!(start, "start time changed");
        Ok(events)
    }

    pub fn finish_crowdsale(&self, caller: Address) -> Result<Vec<SaleEvent>, SaleError> {
        let events = self.execute("finish_crowdsale", caller, |sale, now, _| sale.finish_crowdsale(caller, now))?;
        if let Some(SaleEvent::Finalized { swept_bonus, total_supply }) = events.last() {
            info!(swept_bonus = %swept_bonus, total_supply = %total_supply, "crowdsale finalized");
        }
        Ok(events)
    }

    pub fn transfer(&self, from: Address, to: Address, amount: Balance) -> Result<Vec<SaleEvent>, SaleError> {
        self.execute("transfer", from, |sale, _, _| sale.transfer(from, to, amount))
    }

    pub fn approve(&self, owner: Address, spender: Address, amount: Balance) -> Result<Vec<SaleEvent>, SaleError> {
        self.execute("approve", owner, |sale, _, _| sale.approve(owner, spender, amount))
    }

    pub fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Balance,
    ) -> Result<Vec<SaleEvent>, SaleError> {
        self.execute("transfer_from", spender, |sale, _, _| sale.transfer_from(spender, from, to, amount))
    }

    // ---------- queries ----------

    /// Read-only access to the engine.
    pub fn read<R>(&self, f: impl FnOnce(&Crowdsale) -> R) -> R {
        let sale = self.sale.lock();
        f(&sale)
    }

    pub fn now(&self) -> Timestamp {
        self.backend.now_unix()
    }

    pub fn phase(&self) -> Phase {
        let now = self.now();
        self.read(|s| s.phase(now))
    }

    pub fn is_running(&self) -> bool {
        self.phase() == Phase::Running
    }

    /// Price `amount` at the current raise.
    pub fn quote(&self, amount: Balance) -> Result<Quote, SaleError> {
        let quote = self.read(|s| s.price(amount, s.total_raised()))?;
        debug!(amount = %amount, tokens = %quote.tokens, refund = %quote.refund, "quote");
        Ok(quote)
    }

    pub fn snapshot(&self) -> SaleSnapshot {
        self.read(Crowdsale::snapshot)
    }
}
