//! Sale window and phase.
//!
//! The phase is never stored. It is recomputed from the window, the clock
//! value supplied with the call, the amount raised and the finished flag,
//! so it cannot go stale. Which actions each phase admits is a fixed table
//! (`Phase::allows`).

use serde::{Deserialize, Serialize};

use crate::error::SaleError;
use crate::types::{Balance, Timestamp};

/// Lifecycle position of the sale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Window not yet open.
    Pending,
    /// Accepting contributions.
    Running,
    /// Window closed or hard cap reached; waiting for finalization.
    Ended,
    /// Minting finished, transfers unlocked. Terminal.
    Finalized,
}

/// State-changing operations gated by phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Contribute,
    ManualMint,
    BonusMint,
    SetBonusAgent,
    SetStartTime,
    Finalize,
    Transfer,
}

impl Phase {
    /// Derive the phase for `now`.
    pub fn derive(
        window: &SaleWindow,
        now: Timestamp,
        minting_finished: bool,
        raised: Balance,
        cap: Balance,
    ) -> Phase {
        if minting_finished {
            Phase::Finalized
        } else if now < window.start {
            Phase::Pending
        } else if now >= window.end || raised >= cap {
            Phase::Ended
        } else {
            Phase::Running
        }
    }

    /// Action table. Transfers outside `Finalized` are only possible for
    /// lock-exempt senders, which the token ledger checks separately.
    pub const fn allows(self, action: Action) -> bool {
        use Action::*;
        match self {
            Phase::Pending => matches!(action, BonusMint | SetBonusAgent | SetStartTime),
            Phase::Running => matches!(action, Contribute | ManualMint | BonusMint | SetBonusAgent),
            Phase::Ended => matches!(action, BonusMint | SetBonusAgent | Finalize),
            Phase::Finalized => matches!(action, BonusMint | SetBonusAgent | Transfer),
        }
    }

    /// `Ok(self)` if the table admits `action`, otherwise a phase error.
    pub fn require(self, action: Action) -> Result<Phase, SaleError> {
        if self.allows(action) {
            Ok(self)
        } else {
            Err(SaleError::Phase { action, phase: self })
        }
    }
}

/// Half-open contribution window `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl SaleWindow {
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self, SaleError> {
        if end <= start {
            return Err(SaleError::InvalidConfig("end_time must be after start_time".into()));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, now: Timestamp) -> bool {
        now >= self.start && now < self.end
    }

    pub fn duration(&self) -> u64 {
        self.end - self.start
    }

    /// Same length, opening at `start`.
    pub fn shifted_to(&self, start: Timestamp) -> Result<Self, SaleError> {
        let end = start.checked_add(self.duration()).ok_or(SaleError::MathOverflow)?;
        Ok(Self { start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAP: Balance = 1_000;

    fn window() -> SaleWindow {
        SaleWindow::new(100, 200).unwrap()
    }

    #[test]
    fn derives_every_phase() {
        let w = window();
        assert_eq!(Phase::derive(&w, 99, false, 0, CAP), Phase::Pending);
        assert_eq!(Phase::derive(&w, 100, false, 0, CAP), Phase::Running);
        assert_eq!(Phase::derive(&w, 199, false, CAP - 1, CAP), Phase::Running);
        assert_eq!(Phase::derive(&w, 150, false, CAP, CAP), Phase::Ended);
        assert_eq!(Phase::derive(&w, 200, false, 0, CAP), Phase::Ended);
        assert_eq!(Phase::derive(&w, 50, true, 0, CAP), Phase::Finalized);
        assert_eq!(Phase::derive(&w, 150, true, 0, CAP), Phase::Finalized);
    }

    #[test]
    fn table_gates_actions() {
        assert!(Phase::Running.allows(Action::Contribute));
        assert!(!Phase::Pending.allows(Action::Contribute));
        assert!(!Phase::Ended.allows(Action::ManualMint));
        assert!(Phase::Pending.allows(Action::SetStartTime));
        assert!(!Phase::Running.allows(Action::SetStartTime));
        assert!(Phase::Ended.allows(Action::Finalize));
        assert!(!Phase::Finalized.allows(Action::Finalize));
        assert!(Phase::Finalized.allows(Action::Transfer));
        assert!(!Phase::Ended.allows(Action::Transfer));
        for p in [Phase::Pending, Phase::Running, Phase::Ended, Phase::Finalized] {
            assert!(p.allows(Action::BonusMint));
            assert!(p.allows(Action::SetBonusAgent));
        }
        assert_eq!(
            Phase::Ended.require(Action::Contribute),
            Err(SaleError::Phase { action: Action::Contribute, phase: Phase::Ended })
        );
    }

    #[test]
    fn window_shift_keeps_duration() {
        let w = window();
        assert!(w.contains(100) && !w.contains(200));
        let moved = w.shifted_to(150).unwrap();
        assert_eq!(moved, SaleWindow { start: 150, end: 250 });
        assert!(matches!(SaleWindow::new(5, 5), Err(SaleError::InvalidConfig(_))));
        assert!(matches!(w.shifted_to(u64::MAX), Err(SaleError::MathOverflow)));
    }
}
