//! Tiered pricing.
//!
//! A tier is a band of cumulative currency raised, sold at a fixed rate
//! (currency smallest-units per one whole token). Tiers are ordered by
//! strictly increasing threshold with non-decreasing rates, so every
//! additional unit of currency buys at most as many tokens as the previous
//! one. The last threshold is the hard cap.
//!
//! `price` and `cost` are pure: they never look at or touch sale state.

use serde::{Deserialize, Serialize};

use crate::error::SaleError;
use crate::math::{mul_div_ceil, mul_div_floor};
use crate::types::{Balance, UNIT};

/// One price band.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTier {
    /// Cumulative currency raised at which this tier is exhausted.
    pub threshold: Balance,
    /// Currency smallest-units per whole token.
    pub rate: Balance,
}

/// Result of pricing a contribution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub tokens: Balance,
    pub accepted: Balance,
    pub refund: Balance,
}

/// Result of pricing a fixed token amount against the curve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cost {
    /// Currency the filled part of the request consumes.
    pub currency: Balance,
    /// Tokens that did not fit below the hard cap.
    pub unfilled: Balance,
}

/// Validated, immutable tier table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TierTable {
    tiers: Vec<PricingTier>,
    cap_in_tokens: Balance,
}

impl TierTable {
    pub fn new(tiers: Vec<PricingTier>) -> Result<Self, SaleError> {
        if tiers.is_empty() {
            return Err(SaleError::InvalidConfig("tier table is empty".into()));
        }
        let mut prev: Option<PricingTier> = None;
        for t in &tiers {
            if t.rate == 0 {
                return Err(SaleError::InvalidConfig("tier rate must be > 0".into()));
            }
            if t.threshold == 0 {
                return Err(SaleError::InvalidConfig("tier threshold must be > 0".into()));
            }
            if let Some(p) = prev {
                if t.threshold <= p.threshold {
                    return Err(SaleError::InvalidConfig(
                        "tier thresholds must be strictly increasing".into(),
                    ));
                }
                if t.rate < p.rate {
                    return Err(SaleError::InvalidConfig("tier rates must be non-decreasing".into()));
                }
            }
            prev = Some(*t);
        }

        let mut table = Self { tiers, cap_in_tokens: 0 };
        // The full-cap quote bounds every other quote, so checking it once
        // keeps later pricing free of overflow.
        let full = table.price(table.cap_in_currency(), 0)?;
        table.cap_in_tokens = full.tokens;
        Ok(table)
    }

    pub fn tiers(&self) -> &[PricingTier] {
        &self.tiers
    }

    /// Final threshold: the most currency the sale will ever accept.
    pub fn cap_in_currency(&self) -> Balance {
        self.tiers.last().map(|t| t.threshold).unwrap_or(0)
    }

    /// Tokens issued when every tier is filled completely.
    pub fn cap_in_tokens(&self) -> Balance {
        self.cap_in_tokens
    }

    /// Index of the tier whose band contains `raised`, `None` once capped.
    pub fn tier_index(&self, raised: Balance) -> Option<usize> {
        self.tiers.iter().position(|t| raised < t.threshold)
    }

    /// Convert `amount` of currency into tokens, given `raised` already sold.
    ///
    /// Fills the current tier, spills into the next ones and returns whatever
    /// is left above the hard cap as `refund`. `accepted + refund == amount`.
    pub fn price(&self, amount: Balance, raised: Balance) -> Result<Quote, SaleError> {
        let mut left = amount;
        let mut cursor = raised;
        let mut tokens: Balance = 0;

        for tier in self.tiers.iter().skip_while(move |t| t.threshold <= raised) {
            if left == 0 {
                break;
            }
            let capacity = tier.threshold - cursor;
            let fill = left.min(capacity);
            let bought = mul_div_floor(fill, UNIT, tier.rate).ok_or(SaleError::MathOverflow)?;
            tokens = tokens.checked_add(bought).ok_or(SaleError::MathOverflow)?;
            left -= fill;
            cursor += fill;
        }

        Ok(Quote { tokens, accepted: amount - left, refund: left })
    }

    /// Inverse of `price`: currency needed to issue `tokens` starting at `raised`.
    /// Each tier's share is rounded up so the curve is never undercharged.
    pub fn cost(&self, tokens: Balance, raised: Balance) -> Result<Cost, SaleError> {
        let mut need = tokens;
        let mut cursor = raised;
        let mut currency: Balance = 0;

        for tier in self.tiers.iter().skip_while(move |t| t.threshold <= raised) {
            if need == 0 {
                break;
            }
            let capacity = tier.threshold - cursor;
            let available = mul_div_floor(capacity, UNIT, tier.rate).ok_or(SaleError::MathOverflow)?;
            let spent = if need <= available {
                let c = mul_div_ceil(need, tier.rate, UNIT).ok_or(SaleError::MathOverflow)?;
                need = 0;
                c.min(capacity)
            } else {
                need -= available;
                capacity
            };
            currency = currency.checked_add(spent).ok_or(SaleError::MathOverflow)?;
            cursor += spent;
        }

        Ok(Cost { currency, unfilled: need })
    }
}

/// Four bands ending at 442 / 1324 / 3000 / 4411.76 currency units, priced at
/// 0.0007 / 0.0008 / 0.0009 / 0.001 per token.
pub const REFERENCE_TIERS: [PricingTier; 4] = [
    PricingTier { threshold: 442 * UNIT, rate: 7 * UNIT / 10_000 },
    PricingTier { threshold: 1_324 * UNIT, rate: 8 * UNIT / 10_000 },
    PricingTier { threshold: 3_000 * UNIT, rate: 9 * UNIT / 10_000 },
    PricingTier { threshold: 441_176 * UNIT / 100, rate: UNIT / 1_000 },
];

pub fn reference_tiers() -> Vec<PricingTier> {
    REFERENCE_TIERS.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_units;
    use proptest::prelude::*;

    fn table() -> TierTable {
        TierTable::new(reference_tiers()).unwrap()
    }

    fn whole(n: u128) -> Balance {
        n * UNIT
    }

    /// Two-decimal rendering, the precision observers compare at.
    fn cents(x: Balance) -> u128 {
        x / (UNIT / 100)
    }

    #[test]
    fn reference_example_quotes() {
        let t = table();
        let q = t.price(whole(10), 0).unwrap();
        assert_eq!(cents(q.tokens), 1_428_571); // 14285.71
        assert_eq!(q.refund, 0);

        assert_eq!(cents(t.price(whole(10), whole(442)).unwrap().tokens), 1_250_000);
        assert_eq!(cents(t.price(whole(10), whole(1324)).unwrap().tokens), 1_111_111);
        assert_eq!(cents(t.price(whole(10), whole(3000)).unwrap().tokens), 1_000_000);

        let past_cap = t.price(whole(10), whole(4413)).unwrap();
        assert_eq!(past_cap.tokens, 0);
        assert_eq!(past_cap.refund, whole(10));
    }

    #[test]
    fn oversized_contribution_buys_the_cap_and_refunds_the_rest() {
        let t = table();
        let q = t.price(whole(5000), 0).unwrap();
        assert_eq!(q.tokens, t.cap_in_tokens());
        assert_eq!(q.accepted, t.cap_in_currency());
        assert_eq!(q.refund, parse_units("588.24").unwrap());
    }

    #[test]
    fn exact_tier_capacity_has_no_spill() {
        let t = table();
        let q = t.price(whole(442), 0).unwrap();
        assert_eq!(q.tokens, mul_div_floor(whole(442), UNIT, parse_units("0.0007").unwrap()).unwrap());
        assert_eq!(q.refund, 0);

        // One more smallest unit is priced at the next tier's rate.
        let crossed = t.price(whole(442) + 1, 0).unwrap();
        let second = mul_div_floor(1, UNIT, parse_units("0.0008").unwrap()).unwrap();
        assert_eq!(crossed.tokens, q.tokens + second);
        assert_eq!(crossed.refund, 0);
    }

    #[test]
    fn crossing_blends_rates() {
        let t = table();
        // 2 units left in tier 0, 8 units in tier 1.
        let q = t.price(whole(10), whole(440)).unwrap();
        let expected = mul_div_floor(whole(2), UNIT, parse_units("0.0007").unwrap()).unwrap()
            + mul_div_floor(whole(8), UNIT, parse_units("0.0008").unwrap()).unwrap();
        assert_eq!(q.tokens, expected);
    }

    #[test]
    fn reference_constants_match_decimal_notation() {
        let decimal: Vec<(Balance, Balance)> =
            [("442", "0.0007"), ("1324", "0.0008"), ("3000", "0.0009"), ("4411.76", "0.001")]
                .iter()
                .map(|(t, r)| (parse_units(t).unwrap(), parse_units(r).unwrap()))
                .collect();
        let consts: Vec<(Balance, Balance)> = reference_tiers().iter().map(|t| (t.threshold, t.rate)).collect();
        assert_eq!(consts, decimal);
    }

    #[test]
    fn walk_from_mid_tier_spans_three_bands() {
        let t = table();
        // 24 units left in tier 1, all 1676 of tier 2, 100 into tier 3.
        let q = t.price(whole(1800), whole(1300)).unwrap();
        let expected = mul_div_floor(whole(24), UNIT, parse_units("0.0008").unwrap()).unwrap()
            + mul_div_floor(whole(1676), UNIT, parse_units("0.0009").unwrap()).unwrap()
            + mul_div_floor(whole(100), UNIT, parse_units("0.001").unwrap()).unwrap();
        assert_eq!(q.tokens, expected);
        assert_eq!(q.refund, 0);

        let c = t.cost(q.tokens, whole(1300)).unwrap();
        assert_eq!(c.unfilled, 0);
        assert!(whole(1800) - c.currency <= 3);
    }

    #[test]
    fn cap_reached_yields_full_refund() {
        let t = table();
        let q = t.price(whole(3), t.cap_in_currency()).unwrap();
        assert_eq!(q, Quote { tokens: 0, accepted: 0, refund: whole(3) });
        assert_eq!(t.tier_index(t.cap_in_currency()), None);
        assert_eq!(t.tier_index(0), Some(0));
        assert_eq!(t.tier_index(whole(442)), Some(1));
    }

    #[test]
    fn cost_inverts_price() {
        let t = table();
        let q = t.price(whole(10), whole(100)).unwrap();
        let c = t.cost(q.tokens, whole(100)).unwrap();
        assert_eq!(c.unfilled, 0);
        // Rounded up per tier, never more than one smallest unit per tier touched.
        assert!(c.currency <= whole(10));
        assert!(whole(10) - c.currency <= 1);

        let over = t.cost(t.cap_in_tokens() + 5, 0).unwrap();
        assert_eq!(over.unfilled, 5);
        assert_eq!(over.currency, t.cap_in_currency());
    }

    #[test]
    fn rejects_malformed_tables() {
        let bad_order = vec![
            PricingTier { threshold: whole(10), rate: 1 },
            PricingTier { threshold: whole(5), rate: 2 },
        ];
        assert!(matches!(TierTable::new(bad_order), Err(SaleError::InvalidConfig(_))));

        let cheaper_later = vec![
            PricingTier { threshold: whole(10), rate: 5 },
            PricingTier { threshold: whole(20), rate: 4 },
        ];
        assert!(matches!(TierTable::new(cheaper_later), Err(SaleError::InvalidConfig(_))));

        assert!(matches!(TierTable::new(vec![]), Err(SaleError::InvalidConfig(_))));
        assert!(matches!(
            TierTable::new(vec![PricingTier { threshold: whole(1), rate: 0 }]),
            Err(SaleError::InvalidConfig(_))
        ));
        // A cap whose token yield cannot be represented is refused up front.
        assert!(matches!(
            TierTable::new(vec![PricingTier { threshold: u128::MAX, rate: 1 }]),
            Err(SaleError::MathOverflow)
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            .. ProptestConfig::default()
        })]

        #[test]
        fn value_is_conserved(amount in 0u128..whole(6000), raised in 0u128..whole(4500)) {
            let q = table().price(amount, raised).unwrap();
            prop_assert_eq!(q.accepted + q.refund, amount);
        }

        #[test]
        fn more_currency_never_buys_fewer_tokens(
            a in 0u128..whole(6000),
            extra in 0u128..whole(100),
            raised in 0u128..whole(4500),
        ) {
            let t = table();
            let small = t.price(a, raised).unwrap();
            let large = t.price(a + extra, raised).unwrap();
            prop_assert!(large.tokens >= small.tokens);
            prop_assert!(large.refund >= small.refund);
        }

        #[test]
        fn later_buyers_never_get_a_better_rate(
            amount in 1u128..whole(50),
            raised in 0u128..whole(4300),
            later in 0u128..whole(100),
        ) {
            let t = table();
            let early = t.price(amount, raised).unwrap();
            let late = t.price(amount, raised + later).unwrap();
            prop_assert!(late.tokens <= early.tokens);
        }
    }
}
