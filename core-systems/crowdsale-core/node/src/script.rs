//! JSON-lines call scripts.
//!
//! One call per line, executed strictly in order against a `SaleService`
//! backed by a `MemoryBank`. A line may set `now` to move the bank clock
//! before the call. Rejected calls are reported, not fatal; only unreadable
//! lines abort the run.
//!
//! ```text
//! {"op":"fund","account":"0x0a..","amount":"100"}
//! {"op":"contribute","now":1700000100,"caller":"0x0a..","amount":"10"}
//! {"op":"finish","now":1713392000,"caller":"0x01.."}
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use tiered_crowdsale::{
    format_units, parse_units, Address, AmountError, Balance, Crowdsale, Phase, Receipt, SaleConfig, SaleError,
    SaleEvent, SaleService, Timestamp,
};

use crate::bank::MemoryBank;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("line {line}: {source}")]
    Parse { line: usize, source: serde_json::Error },
    #[error("line {line}: {source}")]
    Amount { line: usize, source: AmountError },
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Fund { account: Address, amount: String },
    Contribute { caller: Address, beneficiary: Option<Address>, amount: String },
    ManualMint { caller: Address, beneficiary: Address, tokens: String },
    BonusMint { caller: Address, beneficiary: Address, tokens: String },
    SetBonusAgent { caller: Address, agent: Address },
    SetStartTime { caller: Address, start: Timestamp },
    Finish { caller: Address },
    Transfer { caller: Address, to: Address, amount: String },
    Approve { caller: Address, spender: Address, amount: String },
    TransferFrom { caller: Address, from: Address, to: Address, amount: String },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Fund { .. } => "fund",
            Command::Contribute { .. } => "contribute",
            Command::ManualMint { .. } => "manual_mint",
            Command::BonusMint { .. } => "bonus_mint",
            Command::SetBonusAgent { .. } => "set_bonus_agent",
            Command::SetStartTime { .. } => "set_start_time",
            Command::Finish { .. } => "finish",
            Command::Transfer { .. } => "transfer",
            Command::Approve { .. } => "approve",
            Command::TransferFrom { .. } => "transfer_from",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub now: Option<Timestamp>,
    #[serde(flatten)]
    pub command: Command,
}

/// Result of one line.
#[derive(Clone, Debug, Serialize)]
pub struct Outcome {
    pub line: usize,
    pub op: &'static str,
    pub now: Timestamp,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SaleEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// End-of-run totals, amounts in whole units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub phase: Phase,
    pub total_raised: String,
    pub forwarded: String,
    pub manual_raised: String,
    pub total_supply: String,
    pub bonus_total_supply: String,
    pub bonus_available: String,
    pub minting_finished: bool,
    pub treasury_currency: String,
    pub treasury_tokens: String,
}

/// Parse a whole script. Blank lines and lines starting with `#` are skipped.
pub fn parse(text: &str) -> Result<Vec<(usize, Step)>, ScriptError> {
    text.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
        .map(|(line, l)| {
            serde_json::from_str::<Step>(l)
                .map(|step| (line, step))
                .map_err(|source| ScriptError::Parse { line, source })
        })
        .collect()
}

pub struct Runner {
    bank: Arc<MemoryBank>,
    service: SaleService<MemoryBank>,
}

enum Done {
    Receipt(Receipt),
    Events(Vec<SaleEvent>),
}

impl Runner {
    /// Fresh sale with the bank clock at the configured start.
    pub fn new(config: SaleConfig) -> Result<Self, SaleError> {
        let bank = Arc::new(MemoryBank::new(config.start_time));
        let sale = Crowdsale::new(config)?;
        Ok(Self { service: SaleService::new(bank.clone(), sale), bank })
    }

    pub fn bank(&self) -> &MemoryBank {
        &self.bank
    }

    pub fn service(&self) -> &SaleService<MemoryBank> {
        &self.service
    }

    pub fn run(&self, text: &str) -> Result<Vec<Outcome>, ScriptError> {
        parse(text)?.iter().map(|(line, step)| self.execute(*line, step)).collect()
    }

    pub fn execute(&self, line: usize, step: &Step) -> Result<Outcome, ScriptError> {
        if let Some(now) = step.now {
            self.bank.set_now(now);
        }
        let units = |s: &str| parse_units(s).map_err(|source| ScriptError::Amount { line, source });
        let svc = &self.service;

        let result: Result<Done, String> = match &step.command {
            Command::Fund { account, amount } => {
                let amount = units(amount.as_str())?;
                self.bank.fund(*account, amount).map(|_| Done::Events(vec![])).map_err(|e| e.to_string())
            }
            Command::Contribute { caller, beneficiary, amount } => {
                let amount = units(amount.as_str())?;
                svc.contribute(*caller, beneficiary.unwrap_or(*caller), amount).map(Done::Receipt).map_err(err)
            }
            Command::ManualMint { caller, beneficiary, tokens } => {
                let tokens = units(tokens.as_str())?;
                svc.manual_mint(*caller, *beneficiary, tokens).map(Done::Receipt).map_err(err)
            }
            Command::BonusMint { caller, beneficiary, tokens } => {
                let tokens = units(tokens.as_str())?;
                svc.bonus_mint(*caller, *beneficiary, tokens).map(Done::Events).map_err(err)
            }
            Command::SetBonusAgent { caller, agent } => {
                svc.set_bonus_agent(*caller, *agent).map(Done::Events).map_err(err)
            }
            Command::SetStartTime { caller, start } => {
                svc.set_start_time(*caller, *start).map(Done::Events).map_err(err)
            }
            Command::Finish { caller } => svc.finish_crowdsale(*caller).map(Done::Events).map_err(err),
            Command::Transfer { caller, to, amount } => {
                let amount = units(amount.as_str())?;
                svc.transfer(*caller, *to, amount).map(Done::Events).map_err(err)
            }
            Command::Approve { caller, spender, amount } => {
                let amount = units(amount.as_str())?;
                svc.approve(*caller, *spender, amount).map(Done::Events).map_err(err)
            }
            Command::TransferFrom { caller, from, to, amount } => {
                let amount = units(amount.as_str())?;
                svc.transfer_from(*caller, *from, *to, amount).map(Done::Events).map_err(err)
            }
        };

        let op = step.command.name();
        let now = svc.now();
        debug!(line, op, ok = result.is_ok(), "script step");
        Ok(match result {
            Ok(Done::Receipt(r)) => Outcome {
                line,
                op,
                now,
                ok: true,
                receipt: Some(r),
                events: vec![],
                error: None,
            },
            Ok(Done::Events(events)) => Outcome { line, op, now, ok: true, receipt: None, events, error: None },
            Err(e) => Outcome { line, op, now, ok: false, receipt: None, events: vec![], error: Some(e) },
        })
    }

    pub fn summary(&self) -> Summary {
        let now = self.service.now();
        self.service.read(|s| Summary {
            phase: s.phase(now),
            total_raised: format_units(s.total_raised()),
            forwarded: format_units(s.forwarded()),
            manual_raised: format_units(s.state().manual_raised),
            total_supply: format_units(s.total_supply()),
            bonus_total_supply: format_units(s.bonus_total_supply()),
            bonus_available: format_units(s.bonus_available()),
            minting_finished: s.minting_finished(),
            treasury_currency: format_units(self.bank.balance(&s.treasury())),
            treasury_tokens: format_units(s.balance_of(&s.treasury())),
        })
    }

    pub fn balance_of(&self, who: &Address) -> Balance {
        self.service.read(|s| s.balance_of(who))
    }
}

fn err(e: SaleError) -> String {
    e.to_string()
}
