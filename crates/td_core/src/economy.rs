//! Currency ledger.
//!
//! The balance is a single non-negative integer. Every change goes through
//! [`Ledger::apply`], which either fully succeeds or leaves the ledger
//! untouched. All calculations use integer math for deterministic simulation.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

/// The player's currency balance and lifetime totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Ledger {
    balance: u64,
    earned: u64,
    spent: u64,
}

impl Ledger {
    /// Create a ledger holding `balance`.
    #[must_use]
    pub const fn new(balance: u64) -> Self {
        Self {
            balance,
            earned: 0,
            spent: 0,
        }
    }

    /// Current balance.
    #[must_use]
    pub const fn balance(&self) -> u64 {
        self.balance
    }

    /// Total credited since creation.
    #[must_use]
    pub const fn earned(&self) -> u64 {
        self.earned
    }

    /// Total debited since creation.
    #[must_use]
    pub const fn spent(&self) -> u64 {
        self.spent
    }

    /// Check if the balance covers `cost`.
    #[must_use]
    pub const fn can_afford(&self, cost: u64) -> bool {
        self.balance >= cost
    }

    /// Credit a positive amount or debit a negative one.
    ///
    /// A debit that would take the balance below zero fails with
    /// [`GameError::InsufficientFunds`] and changes nothing.
    pub fn apply(&mut self, amount: i64) -> Result<u64> {
        let magnitude = amount.unsigned_abs();
        if amount >= 0 {
            self.balance = self.balance.saturating_add(magnitude);
            self.earned = self.earned.saturating_add(magnitude);
        } else {
            if magnitude > self.balance {
                return Err(GameError::InsufficientFunds {
                    required: magnitude,
                    available: self.balance,
                });
            }
            self.balance -= magnitude;
            self.spent = self.spent.saturating_add(magnitude);
        }
        Ok(self.balance)
    }

    /// Credit `amount`.
    pub fn deposit(&mut self, amount: u64) -> u64 {
        self.balance = self.balance.saturating_add(amount);
        self.earned = self.earned.saturating_add(amount);
        self.balance
    }

    /// Debit `cost` if affordable.
    pub fn spend(&mut self, cost: u64) -> Result<u64> {
        if !self.can_afford(cost) {
            return Err(GameError::InsufficientFunds {
                required: cost,
                available: self.balance,
            });
        }
        self.balance -= cost;
        self.spent = self.spent.saturating_add(cost);
        Ok(self.balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_credit_and_debit() {
        let mut ledger = Ledger::new(2000);
        assert_eq!(ledger.apply(500).unwrap(), 2500);
        assert_eq!(ledger.apply(-800).unwrap(), 1700);
        assert_eq!(ledger.earned(), 500);
        assert_eq!(ledger.spent(), 800);
    }

    #[test]
    fn test_overdraft_rejected_without_mutation() {
        let mut ledger = Ledger::new(100);
        let err = ledger.apply(-101).unwrap_err();
        assert!(matches!(
            err,
            GameError::InsufficientFunds {
                required: 101,
                available: 100
            }
        ));
        assert_eq!(ledger, Ledger::new(100));
    }

    #[test]
    fn test_exact_balance_can_be_spent() {
        let mut ledger = Ledger::new(800);
        assert!(ledger.can_afford(800));
        assert_eq!(ledger.spend(800).unwrap(), 0);
        assert!(!ledger.can_afford(1));
        assert!(ledger.spend(1).is_err());
    }

    #[test]
    fn test_deposit() {
        let mut ledger = Ledger::default();
        assert_eq!(ledger.deposit(30), 30);
        assert_eq!(ledger.earned(), 30);
    }

    #[test]
    fn test_min_debit_does_not_overflow() {
        let mut ledger = Ledger::new(5);
        assert!(ledger.apply(i64::MIN).is_err());
        assert_eq!(ledger.balance(), 5);
    }
}
