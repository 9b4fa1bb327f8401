//! Fixed-point helpers. Products are widened to 256 bits so `a * b` never
//! overflows before the division.

use primitive_types::U256;

use crate::types::Balance;

fn narrow(x: U256) -> Option<Balance> {
    if x > U256::from(u128::MAX) {
        None
    } else {
        Some(x.low_u128())
    }
}

/// floor(a * b / d). `None` if `d == 0` or the quotient exceeds 128 bits.
pub(crate) fn mul_div_floor(a: Balance, b: Balance, d: Balance) -> Option<Balance> {
    if d == 0 {
        return None;
    }
    narrow(U256::from(a) * U256::from(b) / U256::from(d))
}

/// ceil(a * b / d). `None` if `d == 0` or the quotient exceeds 128 bits.
pub(crate) fn mul_div_ceil(a: Balance, b: Balance, d: Balance) -> Option<Balance> {
    if d == 0 {
        return None;
    }
    let d = U256::from(d);
    let (q, r) = (U256::from(a) * U256::from(b)).div_mod(d);
    let q = if r.is_zero() { q } else { q + U256::one() };
    narrow(q)
}
