//! Primitives shared by every sale component: addresses, amounts and time.

use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Amount in smallest units (currency wei or token units).
pub type Balance = u128;

/// Seconds since the Unix epoch, supplied by the host clock.
pub type Timestamp = u64;

/// Decimal places of both the contribution currency and the issued token.
pub const DECIMALS: u32 = 18;

/// One whole unit (`10^DECIMALS`) in smallest units.
pub const UNIT: Balance = 1_000_000_000_000_000_000;

/// Basis points denominator (100% == 10_000 bps).
pub const BPS_DENOM: u128 = 10_000;

// ---------- Address ----------

/// 20-byte account identity as authenticated by the host.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The all-zero address; never a valid role holder or beneficiary.
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Address parsing failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address must be 20 bytes of hex, got {0} bytes")]
    Length(usize),
    #[error("invalid hex: {0}")]
    Hex(String),
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(body).map_err(|e| AddressError::Hex(e.to_string()))?;
        let raw: [u8; 20] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressError::Length(bytes.len()))?;
        Ok(Address(raw))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

// ---------- Decimal amounts ----------

/// Failure to read a human decimal amount such as `"4411.76"`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("empty amount")]
    Empty,
    #[error("invalid digit in amount `{0}`")]
    InvalidDigit(String),
    #[error("more than 18 fractional digits in `{0}`")]
    TooPrecise(String),
    #[error("amount `{0}` does not fit in 128 bits")]
    Overflow(String),
}

/// Parse a decimal string in whole units into smallest units (18 decimals).
pub fn parse_units(s: &str) -> Result<Balance, AmountError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(AmountError::Empty);
    }
    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err(AmountError::Empty);
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return Err(AmountError::InvalidDigit(s.to_string()));
    }
    if frac.len() > DECIMALS as usize {
        return Err(AmountError::TooPrecise(s.to_string()));
    }

    let overflow = || AmountError::Overflow(s.to_string());
    let whole_units: Balance = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| overflow())? };
    let frac_units: Balance = if frac.is_empty() {
        0
    } else {
        let scale = 10u128.pow(DECIMALS - frac.len() as u32);
        frac.parse::<Balance>().map_err(|_| overflow())? * scale
    };
    whole_units
        .checked_mul(UNIT)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(overflow)
}

/// Render smallest units as a decimal string without trailing zeros.
pub fn format_units(amount: Balance) -> String {
    let whole = amount / UNIT;
    let frac = amount % UNIT;
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{:018}", frac);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}
