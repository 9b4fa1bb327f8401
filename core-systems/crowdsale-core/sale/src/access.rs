//! Roles. The host authenticates callers; the engine only compares the
//! authenticated address against the role holders kept here.

use serde::{Deserialize, Serialize};

use crate::error::SaleError;
use crate::types::Address;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Fixed at construction: reschedules, appoints the bonus agent, finalizes, mints manually.
    Administrator,
    /// May only mint against the accrued bonus budget.
    BonusAgent,
}

/// Current role holders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roles {
    administrator: Address,
    bonus_agent: Address,
}

impl Roles {
    pub fn new(administrator: Address, bonus_agent: Address) -> Result<Self, SaleError> {
        if administrator.is_zero() || bonus_agent.is_zero() {
            return Err(SaleError::ZeroAddress);
        }
        Ok(Self { administrator, bonus_agent })
    }

    pub fn administrator(&self) -> Address {
        self.administrator
    }

    pub fn bonus_agent(&self) -> Address {
        self.bonus_agent
    }

    pub fn holds(&self, role: Role, who: Address) -> bool {
        match role {
            Role::Administrator => self.administrator == who,
            Role::BonusAgent => self.bonus_agent == who,
        }
    }

    pub fn require(&self, role: Role, who: Address) -> Result<(), SaleError> {
        if self.holds(role, who) {
            Ok(())
        } else {
            Err(SaleError::Unauthorized { required: role })
        }
    }

    /// Swap the bonus agent, returning the previous holder.
    pub(crate) fn replace_bonus_agent(&mut self, agent: Address) -> Address {
        std::mem::replace(&mut self.bonus_agent, agent)
    }
}
