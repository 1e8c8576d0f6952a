//! Shared funding pools
//!
//! A [`FundingAccount`] is a single balance behind an `RwLock`. The
//! balance check and the debit happen inside one write section, so two
//! concurrent creations can never both pass a check the balance only
//! covers once.

use crate::error::{DispatchError, DispatchResult};
use aegis_types::{Amount, FundingPool};
use serde::{Deserialize, Serialize};
use std::sync::{RwLock, RwLockWriteGuard};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingSnapshot {
    pub balance: Amount,
    pub total_debited: Amount,
    pub total_credited: Amount,
}

/// One funding pool: the response treasury or the parametric vault balance
pub struct FundingAccount {
    pool: FundingPool,
    state: RwLock<FundingSnapshot>,
}

impl FundingAccount {
    pub fn new(pool: FundingPool, initial: Amount) -> Self {
        Self {
            pool,
            state: RwLock::new(FundingSnapshot {
                balance: initial,
                ..FundingSnapshot::default()
            }),
        }
    }

    pub fn pool(&self) -> FundingPool {
        self.pool
    }

    pub fn balance(&self) -> Amount {
        self.snapshot().balance
    }

    pub fn snapshot(&self) -> FundingSnapshot {
        *self
            .state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Debit `amount` if the balance covers it; returns the new balance
    pub fn try_debit(&self, amount: Amount) -> DispatchResult<Amount> {
        let mut state = self.write();
        let remaining =
            state
                .balance
                .checked_sub(amount)
                .ok_or(DispatchError::InsufficientFunds {
                    pool: self.pool,
                    required: amount,
                    available: state.balance,
                })?;
        state.balance = remaining;
        state.total_debited = state.total_debited.saturating_add(amount);
        debug!(pool = ?self.pool, %amount, balance = %remaining, "Funds debited");
        Ok(remaining)
    }

    pub fn credit(&self, amount: Amount) -> Amount {
        let mut state = self.write();
        state.balance = state.balance.saturating_add(amount);
        state.total_credited = state.total_credited.saturating_add(amount);
        state.balance
    }

    fn write(&self) -> RwLockWriteGuard<'_, FundingSnapshot> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn debit_refuses_overdraft_without_side_effects() {
        let treasury = FundingAccount::new(FundingPool::Treasury, Amount::new(3_000_000));
        assert_eq!(
            treasury.try_debit(Amount::new(2_000_000)).unwrap(),
            Amount::new(1_000_000)
        );

        let err = treasury.try_debit(Amount::new(2_000_000)).unwrap_err();
        assert_eq!(
            err,
            DispatchError::InsufficientFunds {
                pool: FundingPool::Treasury,
                required: Amount::new(2_000_000),
                available: Amount::new(1_000_000),
            }
        );
        assert_eq!(treasury.balance(), Amount::new(1_000_000));
        assert_eq!(treasury.snapshot().total_debited, Amount::new(2_000_000));
    }

    #[test]
    fn concurrent_debits_never_overdraw() {
        let treasury = Arc::new(FundingAccount::new(FundingPool::Treasury, Amount::new(10)));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let treasury = treasury.clone();
                std::thread::spawn(move || treasury.try_debit(Amount::new(3)).is_ok())
            })
            .collect();
        let succeeded = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(succeeded, 3);
        assert_eq!(treasury.balance(), Amount::new(1));
    }
}
