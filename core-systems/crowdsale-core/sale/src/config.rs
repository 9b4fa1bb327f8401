//! Sale configuration.

use serde::{Deserialize, Serialize};

use crate::error::SaleError;
use crate::pricing::{reference_tiers, PricingTier, TierTable};
use crate::types::{Address, Balance, Timestamp, BPS_DENOM, UNIT};

/// Default bonus share of sale issuance: 20 %.
pub const DEFAULT_BONUS_BPS: u16 = 2_000;

/// Default minimum contribution: 0.01 currency units.
pub const DEFAULT_MINIMUM_CONTRIBUTION: Balance = UNIT / 100;

/// Length of the reference sale window.
pub const REFERENCE_DURATION_SECS: u64 = 155 * 24 * 60 * 60;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleConfig {
    pub administrator: Address,
    pub treasury: Address,
    pub bonus_agent: Address,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub minimum_contribution: Balance,
    #[serde(default = "default_bonus_bps")]
    pub bonus_bps: u16,
    /// Upper bound on how far past `start_time` the start may be pushed.
    #[serde(default)]
    pub max_start_delay: Option<u64>,
    pub tiers: Vec<PricingTier>,
}

fn default_bonus_bps() -> u16 {
    DEFAULT_BONUS_BPS
}

impl SaleConfig {
    /// The four-tier reference sale opening at `start_time` for 155 days.
    pub fn reference(
        administrator: Address,
        treasury: Address,
        bonus_agent: Address,
        start_time: Timestamp,
    ) -> Self {
        Self {
            administrator,
            treasury,
            bonus_agent,
            start_time,
            end_time: start_time.saturating_add(REFERENCE_DURATION_SECS),
            minimum_contribution: DEFAULT_MINIMUM_CONTRIBUTION,
            bonus_bps: DEFAULT_BONUS_BPS,
            max_start_delay: None,
            tiers: reference_tiers(),
        }
    }

    /// Check everything the engine relies on and build the tier table.
    pub fn validate(&self) -> Result<TierTable, SaleError> {
        if self.administrator.is_zero() || self.treasury.is_zero() || self.bonus_agent.is_zero() {
            return Err(SaleError::ZeroAddress);
        }
        if self.end_time <= self.start_time {
            return Err(SaleError::InvalidConfig("end_time must be after start_time".into()));
        }
        if u128::from(self.bonus_bps) > BPS_DENOM {
            return Err(SaleError::InvalidConfig("bonus_bps must be <= 10000".into()));
        }
        let table = TierTable::new(self.tiers.clone())?;
        if self.minimum_contribution > table.cap_in_currency() {
            return Err(SaleError::InvalidConfig(
                "minimum_contribution exceeds the hard cap".into(),
            ));
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(x: u8) -> Address {
        Address([x; 20])
    }

    #[test]
    fn reference_config_is_valid() {
        let cfg = SaleConfig::reference(addr(1), addr(2), addr(3), 1_000);
        let table = cfg.validate().unwrap();
        assert_eq!(table.tiers().len(), 4);
        assert_eq!(cfg.end_time - cfg.start_time, REFERENCE_DURATION_SECS);
        assert_eq!(cfg.minimum_contribution, UNIT / 100);
    }

    #[test]
    fn rejects_bad_configs() {
        let base = SaleConfig::reference(addr(1), addr(2), addr(3), 1_000);

        let mut c = base.clone();
        c.treasury = Address::ZERO;
        assert_eq!(c.validate(), Err(SaleError::ZeroAddress));

        let mut c = base.clone();
        c.end_time = c.start_time;
        assert!(matches!(c.validate(), Err(SaleError::InvalidConfig(_))));

        let mut c = base.clone();
        c.bonus_bps = 10_001;
        assert!(matches!(c.validate(), Err(SaleError::InvalidConfig(_))));

        let mut c = base;
        c.tiers.clear();
        assert!(matches!(c.validate(), Err(SaleError::InvalidConfig(_))));
    }

    #[test]
    fn bonus_ratio_defaults_when_absent() {
        let json = r#"{
            "administrator": "0x0101010101010101010101010101010101010101",
            "treasury": "0x0202020202020202020202020202020202020202",
            "bonus_agent": "0x0303030303030303030303030303030303030303",
            "start_time": 10,
            "end_time": 20,
            "minimum_contribution": 1,
            "tiers": [{ "threshold": 100, "rate": 1 }]
        }"#;
        let cfg: SaleConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.bonus_bps, DEFAULT_BONUS_BPS);
        assert_eq!(cfg.max_start_delay, None);
        assert!(cfg.validate().is_ok());
    }
}
