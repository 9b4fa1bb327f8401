//! Error taxonomy of the sale engine and its host boundary.

use thiserror::Error;

use crate::access::Role;
use crate::phase::{Action, Phase};
use crate::types::Balance;

/// Failures reported by the host's funds backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("insufficient funds: need {needed}, have {available}")]
    Insufficient { needed: Balance, available: Balance },
    #[error("backend failure: {0}")]
    Other(String),
}

/// Every rejected call maps to exactly one of these; state is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SaleError {
    #[error("{action:?} is not permitted while the sale is {phase:?}")]
    Phase { action: Action, phase: Phase },
    #[error("contribution {amount} is below the minimum {minimum}")]
    MinimumNotMet { amount: Balance, minimum: Balance },
    #[error("caller lacks the {required:?} role")]
    Unauthorized { required: Role },
    #[error("crowdsale already finished")]
    AlreadyFinished,
    #[error("crowdsale cannot be finished before the end time or the hard cap")]
    NotReady,
    #[error("bonus budget exhausted: requested {requested}, available {available}")]
    InsufficientBonusBudget { requested: Balance, available: Balance },
    #[error("token transfers are locked until the crowdsale is finished")]
    TransferLocked,
    #[error("insufficient token balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Balance, available: Balance },
    #[error("insufficient allowance: need {needed}, have {available}")]
    InsufficientAllowance { needed: Balance, available: Balance },
    #[error("issuance cap exceeded: requested {requested} tokens, remaining {remaining}")]
    CapExceeded { requested: Balance, remaining: Balance },
    #[error("amount must be > 0")]
    ZeroAmount,
    #[error("zero address is not a valid account")]
    ZeroAddress,
    #[error("invalid start time: {0}")]
    InvalidStartTime(&'static str),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("arithmetic overflow")]
    MathOverflow,
    #[error("backend: {0}")]
    Backend(#[from] BackendError),
}
