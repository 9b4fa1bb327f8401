//! Crowdsale engine.
//!
//! `Crowdsale` owns the whole sale: configuration, window, roles, token
//! ledger, bonus pool and event log. Every mutating call takes the
//! authenticated caller and, where time matters, the host clock value.
//! Calls validate first and commit last, so an `Err` leaves the engine
//! exactly as it was. Currency never moves here: calls return the payments
//! the host has to execute.

use serde::{Deserialize, Serialize};

use crate::access::{Role, Roles};
use crate::bonus::BonusPool;
use crate::config::SaleConfig;
use crate::error::SaleError;
use crate::events::{EventLog, Record, SaleEvent};
use crate::ledger::TokenLedger;
use crate::phase::{Action, Phase, SaleWindow};
use crate::pricing::{Quote, TierTable};
use crate::types::{Address, Balance, Timestamp};

/// Mutable counters of the sale.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleState {
    /// Currency raised, including the booked equivalent of manual mints.
    pub total_raised: Balance,
    /// Part of `total_raised` booked by manual mints; never forwarded.
    pub manual_raised: Balance,
    /// Tokens issued through `contribute` and `manual_mint`.
    pub sale_tokens: Balance,
    pub bonus: BonusPool,
}

/// Currency movement the host must perform for an accepted call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payment {
    /// Accepted contribution, to the treasury.
    Forward { to: Address, amount: Balance },
    /// Unpriced remainder above the hard cap, back to the payer.
    Refund { to: Address, amount: Balance },
}

impl Payment {
    pub fn amount(&self) -> Balance {
        match self {
            Payment::Forward { amount, .. } | Payment::Refund { amount, .. } => *amount,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tokens: Balance,
    /// Currency priced and forwarded.
    pub accepted: Balance,
    pub refund: Balance,
    /// Currency equivalent booked without payment (manual mints only).
    pub booked: Balance,
    /// Forward first, then refund.
    pub effects: Vec<Payment>,
    pub events: Vec<SaleEvent>,
}

/// Persistent image of everything that changes after construction.
/// The tier table and role administrator come from the configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleSnapshot {
    pub window: SaleWindow,
    pub bonus_agent: Address,
    pub state: SaleState,
    pub ledger: TokenLedger,
}

/// In-memory undo point; see [`Crowdsale::rollback`].
#[derive(Clone, Debug)]
pub struct Checkpoint {
    window: SaleWindow,
    roles: Roles,
    state: SaleState,
    ledger: TokenLedger,
    log_len: usize,
}

#[derive(Clone, Debug)]
pub struct Crowdsale {
    config: SaleConfig,
    table: TierTable,
    window: SaleWindow,
    roles: Roles,
    state: SaleState,
    ledger: TokenLedger,
    log: EventLog,
    hard_cap_in_tokens: Balance,
}

/// Full sale plus the bonus it would accrue.
fn hard_cap(table: &TierTable, bonus: &BonusPool) -> Result<Balance, SaleError> {
    let cap = table.cap_in_tokens();
    cap.checked_add(bonus.budget_for(cap)?).ok_or(SaleError::MathOverflow)
}

impl Crowdsale {
    pub fn new(config: SaleConfig) -> Result<Self, SaleError> {
        let table = config.validate()?;
        let window = SaleWindow::new(config.start_time, config.end_time)?;
        let roles = Roles::new(config.administrator, config.bonus_agent)?;
        let state = SaleState { bonus: BonusPool::new(config.bonus_bps)?, ..SaleState::default() };
        let ledger = TokenLedger::with_exempt(config.bonus_agent);
        let hard_cap_in_tokens = hard_cap(&table, &state.bonus)?;
        Ok(Self { config, table, window, roles, state, ledger, log: EventLog::new(), hard_cap_in_tokens })
    }

    /// Rebuild an engine from `config` and a stored snapshot. The event log
    /// starts empty and the transfer-lock exemption is given to the stored
    /// bonus agent.
    pub fn restore(config: SaleConfig, snapshot: SaleSnapshot) -> Result<Self, SaleError> {
        let table = config.validate()?;
        let configured = SaleWindow::new(config.start_time, config.end_time)?;
        if snapshot.window.duration() != configured.duration()
            || snapshot.window.start < configured.start
        {
            return Err(SaleError::InvalidConfig("snapshot window does not match configuration".into()));
        }
        if snapshot.state.bonus.bps() != config.bonus_bps {
            return Err(SaleError::InvalidConfig("snapshot bonus ratio does not match configuration".into()));
        }
        let held = snapshot
            .ledger
            .holders()
            .try_fold(0u128, |acc, (_, b)| acc.checked_add(*b))
            .ok_or(SaleError::MathOverflow)?;
        if held != snapshot.ledger.total_supply() {
            return Err(SaleError::InvalidConfig("snapshot balances do not sum to total supply".into()));
        }
        if snapshot.state.total_raised > table.cap_in_currency()
            || snapshot.state.manual_raised > snapshot.state.total_raised
        {
            return Err(SaleError::InvalidConfig("snapshot counters are out of range".into()));
        }
        let bonus = &snapshot.state.bonus;
        if bonus.budget() != bonus.budget_for(snapshot.state.sale_tokens)? || bonus.minted() > bonus.budget() {
            return Err(SaleError::InvalidConfig("snapshot bonus budget does not match sale issuance".into()));
        }
        let issued = snapshot.state.sale_tokens.checked_add(bonus.minted()).ok_or(SaleError::MathOverflow)?;
        if issued != snapshot.ledger.total_supply() {
            return Err(SaleError::InvalidConfig("snapshot total supply does not match issuance".into()));
        }
        let roles = Roles::new(config.administrator, snapshot.bonus_agent)?;
        let hard_cap_in_tokens = hard_cap(&table, bonus)?;
        let mut ledger = snapshot.ledger;
        ledger.reset_exemption(snapshot.bonus_agent);
        Ok(Self {
            config,
            table,
            window: snapshot.window,
            roles,
            state: snapshot.state,
            ledger,
            log: EventLog::new(),
            hard_cap_in_tokens,
        })
    }

    pub fn snapshot(&self) -> SaleSnapshot {
        SaleSnapshot {
            window: self.window,
            bonus_agent: self.roles.bonus_agent(),
            state: self.state.clone(),
            ledger: self.ledger.clone(),
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            window: self.window,
            roles: self.roles.clone(),
            state: self.state.clone(),
            ledger: self.ledger.clone(),
            log_len: self.log.len(),
        }
    }

    /// Undo everything done since `cp` was taken, including logged events.
    pub fn rollback(&mut self, cp: Checkpoint) {
        self.window = cp.window;
        self.roles = cp.roles;
        self.state = cp.state;
        self.ledger = cp.ledger;
        self.log.truncate(cp.log_len);
    }

    fn record(&mut self, events: &[SaleEvent]) {
        for ev in events {
            self.log.append(ev.clone());
        }
    }

    /// Budget and issuance after adding `tokens` to the sale total.
    fn accrue(&self, tokens: Balance) -> Result<(Balance, Balance), SaleError> {
        let sale_tokens = self.state.sale_tokens.checked_add(tokens).ok_or(SaleError::MathOverflow)?;
        let budget = self.state.bonus.budget_for(sale_tokens)?;
        Ok((sale_tokens, budget))
    }

    // ---------- sale operations ----------

    /// Buy tokens for `beneficiary` with `amount` of currency paid by `payer`.
    pub fn contribute(
        &mut self,
        payer: Address,
        beneficiary: Address,
        amount: Balance,
        now: Timestamp,
    ) -> Result<Receipt, SaleError> {
        self.phase(now).require(Action::Contribute)?;
        if amount < self.config.minimum_contribution {
            return Err(SaleError::MinimumNotMet { amount, minimum: self.config.minimum_contribution });
        }
        let quote = self.table.price(amount, self.state.total_raised)?;
        let total_raised =
            self.state.total_raised.checked_add(quote.accepted).ok_or(SaleError::MathOverflow)?;
        let (sale_tokens, budget) = self.accrue(quote.tokens)?;
        self.ledger.ensure_mintable(&beneficiary, quote.tokens)?;

        self.ledger.mint(beneficiary, quote.tokens)?;
        self.state.total_raised = total_raised;
        self.state.sale_tokens = sale_tokens;
        self.state.bonus.set_budget(budget);

        let mut effects = Vec::with_capacity(2);
        let mut events = Vec::with_capacity(3);
        if quote.tokens > 0 {
            events.push(SaleEvent::Transfer { from: None, to: beneficiary, amount: quote.tokens });
        }
        events.push(SaleEvent::Purchase {
            payer,
            beneficiary,
            accepted: quote.accepted,
            tokens: quote.tokens,
        });
        if quote.accepted > 0 {
            effects.push(Payment::Forward { to: self.config.treasury, amount: quote.accepted });
        }
        if quote.refund > 0 {
            effects.push(Payment::Refund { to: payer, amount: quote.refund });
            events.push(SaleEvent::OddAmountRefunded { to: payer, amount: quote.refund });
        }
        self.record(&events);

        Ok(Receipt {
            tokens: quote.tokens,
            accepted: quote.accepted,
            refund: quote.refund,
            booked: 0,
            effects,
            events,
        })
    }

    /// Issue `tokens` off-chain-paid tokens. Their currency equivalent is
    /// booked against the cap but nothing is forwarded.
    pub fn manual_mint(
        &mut self,
        caller: Address,
        beneficiary: Address,
        tokens: Balance,
        now: Timestamp,
    ) -> Result<Receipt, SaleError> {
        self.roles.require(Role::Administrator, caller)?;
        self.phase(now).require(Action::ManualMint)?;
        if tokens == 0 {
            return Err(SaleError::ZeroAmount);
        }
        let cost = self.table.cost(tokens, self.state.total_raised)?;
        if cost.unfilled > 0 {
            return Err(SaleError::CapExceeded { requested: tokens, remaining: tokens - cost.unfilled });
        }
        let total_raised =
            self.state.total_raised.checked_add(cost.currency).ok_or(SaleError::MathOverflow)?;
        let (sale_tokens, budget) = self.accrue(tokens)?;
        self.ledger.ensure_mintable(&beneficiary, tokens)?;

        self.ledger.mint(beneficiary, tokens)?;
        self.state.total_raised = total_raised;
        self.state.manual_raised += cost.currency;
        self.state.sale_tokens = sale_tokens;
        self.state.bonus.set_budget(budget);

        let events = vec![
            SaleEvent::Transfer { from: None, to: beneficiary, amount: tokens },
            SaleEvent::Purchase { payer: caller, beneficiary, accepted: 0, tokens },
        ];
        self.record(&events);

        Ok(Receipt { tokens, booked: cost.currency, events, ..Receipt::default() })
    }

    /// Mint from the accrued bonus budget. Allowed in every phase.
    pub fn bonus_mint(
        &mut self,
        caller: Address,
        beneficiary: Address,
        tokens: Balance,
    ) -> Result<Vec<SaleEvent>, SaleError> {
        self.roles.require(Role::BonusAgent, caller)?;
        if tokens == 0 {
            return Err(SaleError::ZeroAmount);
        }
        self.state.bonus.ensure_available(tokens)?;
        self.ledger.ensure_mintable(&beneficiary, tokens)?;

        self.ledger.mint(beneficiary, tokens)?;
        self.state.bonus.record_mint(tokens);

        let events = vec![
            SaleEvent::Transfer { from: None, to: beneficiary, amount: tokens },
            SaleEvent::BonusMinted { beneficiary, amount: tokens },
        ];
        self.record(&events);
        Ok(events)
    }

    /// Replace the bonus agent. The transfer-lock exemption moves with the role.
    pub fn set_bonus_agent(&mut self, caller: Address, agent: Address) -> Result<Vec<SaleEvent>, SaleError> {
        self.roles.require(Role::Administrator, caller)?;
        if agent.is_zero() {
            return Err(SaleError::ZeroAddress);
        }
        let previous = self.roles.replace_bonus_agent(agent);
        self.ledger.move_exemption(&previous, agent);

        let events = vec![SaleEvent::BonusAgentChanged { previous, current: agent }];
        self.record(&events);
        Ok(events)
    }

    /// Postpone the opening. Only before the window opens; the end moves by
    /// the same amount.
    pub fn set_start_time(
        &mut self,
        caller: Address,
        start: Timestamp,
        now: Timestamp,
    ) -> Result<Vec<SaleEvent>, SaleError> {
        self.roles.require(Role::Administrator, caller)?;
        self.phase(now).require(Action::SetStartTime)?;
        if start <= now {
            return Err(SaleError::InvalidStartTime("start must be in the future"));
        }
        if start < self.window.start {
            return Err(SaleError::InvalidStartTime("start cannot be moved earlier"));
        }
        if let Some(max) = self.config.max_start_delay {
            if start - self.config.start_time > max {
                return Err(SaleError::InvalidStartTime("start exceeds the allowed delay"));
            }
        }
        let window = self.window.shifted_to(start)?;
        let previous = std::mem::replace(&mut self.window, window);

        let events = vec![SaleEvent::StartTimeChanged {
            previous: previous.start,
            start: window.start,
            end: window.end,
        }];
        self.record(&events);
        Ok(events)
    }

    /// Sweep the unminted bonus to the treasury, stop minting and unlock
    /// transfers. Terminal.
    pub fn finish_crowdsale(&mut self, caller: Address, now: Timestamp) -> Result<Vec<SaleEvent>, SaleError> {
        self.roles.require(Role::Administrator, caller)?;
        if self.ledger.minting_finished() {
            return Err(SaleError::AlreadyFinished);
        }
        if now < self.window.end && self.state.total_raised < self.table.cap_in_currency() {
            return Err(SaleError::NotReady);
        }
        let treasury = self.config.treasury;
        let swept = self.state.bonus.available();
        self.ledger.ensure_mintable(&treasury, swept)?;

        self.ledger.mint(treasury, swept)?;
        self.state.bonus.sweep();
        self.ledger.finish_minting()?;

        let mut events = Vec::with_capacity(2);
        if swept > 0 {
            events.push(SaleEvent::Transfer { from: None, to: treasury, amount: swept });
        }
        events.push(SaleEvent::Finalized { swept_bonus: swept, total_supply: self.ledger.total_supply() });
        self.record(&events);
        Ok(events)
    }

    // ---------- token operations ----------

    pub fn transfer(&mut self, from: Address, to: Address, amount: Balance) -> Result<Vec<SaleEvent>, SaleError> {
        self.ledger.transfer(from, to, amount)?;
        let events = vec![SaleEvent::Transfer { from: Some(from), to, amount }];
        self.record(&events);
        Ok(events)
    }

    pub fn approve(&mut self, owner: Address, spender: Address, amount: Balance) -> Result<Vec<SaleEvent>, SaleError> {
        self.ledger.approve(owner, spender, amount)?;
        let events = vec![SaleEvent::Approval { owner, spender, amount }];
        self.record(&events);
        Ok(events)
    }

    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Balance,
    ) -> Result<Vec<SaleEvent>, SaleError> {
        self.ledger.transfer_from(spender, from, to, amount)?;
        let events = vec![SaleEvent::Transfer { from: Some(from), to, amount }];
        self.record(&events);
        Ok(events)
    }

    // ---------- queries ----------

    pub fn phase(&self, now: Timestamp) -> Phase {
        Phase::derive(
            &self.window,
            now,
            self.ledger.minting_finished(),
            self.state.total_raised,
            self.table.cap_in_currency(),
        )
    }

    pub fn is_running(&self, now: Timestamp) -> bool {
        self.phase(now) == Phase::Running
    }

    pub fn config(&self) -> &SaleConfig {
        &self.config
    }

    pub fn tiers(&self) -> &TierTable {
        &self.table
    }

    pub fn state(&self) -> &SaleState {
        &self.state
    }

    pub fn total_raised(&self) -> Balance {
        self.state.total_raised
    }

    /// Currency actually forwarded to the treasury so far.
    pub fn forwarded(&self) -> Balance {
        self.state.total_raised - self.state.manual_raised
    }

    pub fn cap_in_currency(&self) -> Balance {
        self.table.cap_in_currency()
    }

    pub fn cap_in_tokens(&self) -> Balance {
        self.table.cap_in_tokens()
    }

    /// Maximum total supply: the full sale plus the bonus accrued on it.
    pub fn hard_cap_in_tokens(&self) -> Balance {
        self.hard_cap_in_tokens
    }

    pub fn bonus_available(&self) -> Balance {
        self.state.bonus.available()
    }

    /// Bonus accrued so far, minted or not.
    pub fn bonus_total_supply(&self) -> Balance {
        self.state.bonus.budget()
    }

    pub fn minting_finished(&self) -> bool {
        self.ledger.minting_finished()
    }

    pub fn balance_of(&self, holder: &Address) -> Balance {
        self.ledger.balance_of(holder)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Balance {
        self.ledger.allowance(owner, spender)
    }

    pub fn total_supply(&self) -> Balance {
        self.ledger.total_supply()
    }

    /// Quote without touching state.
    pub fn price(&self, amount: Balance, raised: Balance) -> Result<Quote, SaleError> {
        self.table.price(amount, raised)
    }

    pub fn window(&self) -> SaleWindow {
        self.window
    }

    pub fn administrator(&self) -> Address {
        self.roles.administrator()
    }

    pub fn bonus_agent(&self) -> Address {
        self.roles.bonus_agent()
    }

    pub fn treasury(&self) -> Address {
        self.config.treasury
    }

    pub fn events(&self) -> &[Record] {
        self.log.records()
    }

    pub fn events_since(&self, seq: u64) -> &[Record] {
        self.log.since(seq)
    }

    pub fn next_event_seq(&self) -> u64 {
        self.log.next_seq()
    }
}
