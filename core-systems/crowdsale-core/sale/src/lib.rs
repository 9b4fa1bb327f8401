//! Tiered crowdsale engine
//! Features:
//! - Tiered pricing: currency converted to tokens band by band, odd amounts above the hard cap refunded
//! - Derived phases (Pending -> Running -> Ended -> Finalized) with an explicit action table
//! - Bonus budget accrued as a share of sale issuance, minted by a bonus agent, swept on finalization
//! - Mintable token ledger, transfers locked until finalization, ERC20-style allowances
//! - Typed append-only event log, snapshot/restore for persistence
//! - Host boundary: parking_lot mutex, pluggable funds backend with rollback, tokio::broadcast events
//!
//! Notes:
//! - Amounts are u128 smallest units with 18 decimals; products are widened to 256 bits.
//! - The engine never reads a clock or moves currency; callers pass `now` and execute returned payments.

#![forbid(unsafe_code)]

pub mod access;
pub mod bonus;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
mod math;
pub mod phase;
pub mod pricing;
pub mod service;
pub mod types;

pub use access::{Role, Roles};
pub use bonus::BonusPool;
pub use config::{SaleConfig, DEFAULT_BONUS_BPS, DEFAULT_MINIMUM_CONTRIBUTION, REFERENCE_DURATION_SECS};
pub use engine::{Checkpoint, Crowdsale, Payment, Receipt, SaleSnapshot, SaleState};
pub use error::{BackendError, SaleError};
pub use events::{EventLog, Record, SaleEvent};
pub use ledger::TokenLedger;
pub use phase::{Action, Phase, SaleWindow};
pub use pricing::{reference_tiers, Cost, PricingTier, Quote, TierTable};
pub use service::{SaleBackend, SaleService, DEFAULT_EVENT_CAPACITY};
pub use types::{format_units, parse_units, Address, AddressError, AmountError, Balance, Timestamp, DECIMALS, UNIT};
