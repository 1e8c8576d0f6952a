//! Validator stake balances and reputation
//!
//! Each account tracks a free `balance` and the `locked` amount currently
//! staked on undecided events. Locking moves funds from balance to locked;
//! settlement releases the lock and either pays out `stake * multiplier`
//! (agreement) or burns it (disagreement); eviction refunds it.
//!
//! Every mutation touches a single DashMap entry under its shard lock, so
//! check-and-debit is atomic per validator.

use crate::error::{ConsensusError, ConsensusResult};
use aegis_types::ValidatorId;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

const REPUTATION_GAIN: f64 = 0.1;
const REPUTATION_LOSS: f64 = 0.2;

/// One validator's stake account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeAccount {
    pub validator_id: ValidatorId,
    pub initial_stake: f64,
    /// Free balance available for new stakes
    pub balance: f64,
    /// Staked on events that have not settled yet
    pub locked: f64,
    pub reputation: f64,
    pub agreements: u64,
    pub disagreements: u64,
}

impl StakeAccount {
    fn new(validator_id: ValidatorId, initial_stake: f64) -> Self {
        Self {
            validator_id,
            initial_stake,
            balance: initial_stake,
            locked: 0.0,
            reputation: 0.0,
            agreements: 0,
            disagreements: 0,
        }
    }

    /// Balance plus outstanding stakes
    pub fn holdings(&self) -> f64 {
        self.balance + self.locked
    }

    /// Share of settled events on the winning side
    pub fn accuracy(&self) -> Option<f64> {
        let settled = self.agreements + self.disagreements;
        (settled > 0).then(|| self.agreements as f64 / settled as f64)
    }
}

/// Concurrent ledger of validator stake accounts
pub struct StakeLedger {
    accounts: DashMap<ValidatorId, StakeAccount>,
    /// Largest share of the free balance a single stake may take
    max_balance_fraction: f64,
}

impl StakeLedger {
    pub fn new() -> Self {
        Self::with_max_fraction(0.5)
    }

    pub fn with_max_fraction(max_balance_fraction: f64) -> Self {
        Self {
            accounts: DashMap::new(),
            max_balance_fraction: max_balance_fraction.clamp(0.0, 1.0),
        }
    }

    pub fn open(&self, validator_id: ValidatorId, initial_stake: f64) -> ConsensusResult<()> {
        if self.accounts.contains_key(&validator_id) {
            return Err(ConsensusError::DuplicateValidator(validator_id));
        }
        self.accounts.insert(
            validator_id.clone(),
            StakeAccount::new(validator_id, initial_stake.max(0.0)),
        );
        Ok(())
    }

    pub fn account(&self, validator_id: &ValidatorId) -> ConsensusResult<StakeAccount> {
        self.accounts
            .get(validator_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ConsensusError::UnknownValidator(validator_id.clone()))
    }

    /// All accounts ordered by validator id
    pub fn accounts(&self) -> Vec<StakeAccount> {
        let mut accounts: Vec<StakeAccount> =
            self.accounts.iter().map(|entry| entry.value().clone()).collect();
        accounts.sort_by(|a, b| a.validator_id.cmp(&b.validator_id));
        accounts
    }

    /// Lock up to `requested` for a new stake and return the amount locked.
    ///
    /// The stake is capped at `balance * max_balance_fraction`, so the
    /// balance can never go negative.
    pub fn lock_stake(&self, validator_id: &ValidatorId, requested: f64) -> ConsensusResult<f64> {
        let mut account = self
            .accounts
            .get_mut(validator_id)
            .ok_or_else(|| ConsensusError::UnknownValidator(validator_id.clone()))?;

        let cap = account.balance * self.max_balance_fraction;
        let stake = requested.max(0.0).min(cap);
        account.balance -= stake;
        account.locked += stake;

        debug!(
            validator_id = %validator_id,
            stake,
            balance = account.balance,
            "Stake locked"
        );
        Ok(stake)
    }

    /// Release a stake after a decision.
    ///
    /// Agreement credits `stake * reward_multiplier` and raises reputation;
    /// disagreement forfeits the stake and lowers reputation (floored at 0).
    pub fn settle(
        &self,
        validator_id: &ValidatorId,
        stake: f64,
        agreed: bool,
        reward_multiplier: f64,
    ) -> ConsensusResult<f64> {
        let mut account = self
            .accounts
            .get_mut(validator_id)
            .ok_or_else(|| ConsensusError::UnknownValidator(validator_id.clone()))?;

        account.locked = (account.locked - stake).max(0.0);
        let credited = if agreed {
            let payout = stake * reward_multiplier;
            account.balance += payout;
            account.reputation += REPUTATION_GAIN;
            account.agreements += 1;
            payout
        } else {
            account.reputation = (account.reputation - REPUTATION_LOSS).max(0.0);
            account.disagreements += 1;
            0.0
        };
        Ok(credited)
    }

    /// Return a stake untouched (no reward, no penalty)
    pub fn refund(&self, validator_id: &ValidatorId, stake: f64) -> ConsensusResult<()> {
        if !stake.is_finite() {
            return Err(ConsensusError::InvalidStake(stake));
        }
        let mut account = self
            .accounts
            .get_mut(validator_id)
            .ok_or_else(|| ConsensusError::UnknownValidator(validator_id.clone()))?;

        let released = stake.min(account.locked).max(0.0);
        account.locked -= released;
        account.balance += released;
        Ok(())
    }

    /// Sum of balances and outstanding stakes across all accounts
    pub fn total_holdings(&self) -> f64 {
        self.accounts.iter().map(|entry| entry.holdings()).sum()
    }
}

impl Default for StakeLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> (StakeLedger, ValidatorId) {
        let ledger = StakeLedger::new();
        let id = ValidatorId::new("earthquake_validator");
        ledger.open(id.clone(), 10_000.0).unwrap();
        (ledger, id)
    }

    #[test]
    fn lock_is_capped_at_half_the_balance() {
        let (ledger, id) = ledger();
        assert_eq!(ledger.lock_stake(&id, 8_000.0).unwrap(), 5_000.0);
        assert_eq!(ledger.lock_stake(&id, 8_000.0).unwrap(), 2_500.0);

        let account = ledger.account(&id).unwrap();
        assert_eq!(account.balance, 2_500.0);
        assert_eq!(account.locked, 7_500.0);
        assert_eq!(account.holdings(), 10_000.0);
    }

    #[test]
    fn agreement_pays_reward_and_reputation() {
        let (ledger, id) = ledger();
        let stake = ledger.lock_stake(&id, 1_000.0).unwrap();
        let credited = ledger.settle(&id, stake, true, 1.2).unwrap();

        let account = ledger.account(&id).unwrap();
        assert_eq!(credited, 1_200.0);
        assert_eq!(account.balance, 10_200.0);
        assert_eq!(account.locked, 0.0);
        assert!((account.reputation - 0.1).abs() < 1e-12);
        assert_eq!(account.accuracy(), Some(1.0));
    }

    #[test]
    fn disagreement_forfeits_stake_and_floors_reputation() {
        let (ledger, id) = ledger();
        let stake = ledger.lock_stake(&id, 1_000.0).unwrap();
        ledger.settle(&id, stake, false, 1.2).unwrap();

        let account = ledger.account(&id).unwrap();
        assert_eq!(account.balance, 9_000.0);
        assert_eq!(account.locked, 0.0);
        assert_eq!(account.reputation, 0.0);
        assert_eq!(account.disagreements, 1);
    }

    #[test]
    fn refund_restores_balance() {
        let (ledger, id) = ledger();
        let stake = ledger.lock_stake(&id, 1_000.0).unwrap();
        ledger.refund(&id, stake).unwrap();

        let account = ledger.account(&id).unwrap();
        assert_eq!(account.balance, 10_000.0);
        assert_eq!(account.locked, 0.0);
    }

    #[test]
    fn non_finite_refund_releases_nothing() {
        let (ledger, id) = ledger();
        ledger.lock_stake(&id, 4_000.0).unwrap();

        for stake in [f64::NAN, f64::INFINITY] {
            assert!(matches!(
                ledger.refund(&id, stake),
                Err(ConsensusError::InvalidStake(_))
            ));
        }
        let account = ledger.account(&id).unwrap();
        assert_eq!(account.balance, 6_000.0);
        assert_eq!(account.locked, 4_000.0);
    }

    #[test]
    fn unknown_and_duplicate_validators_are_errors() {
        let (ledger, id) = ledger();
        assert!(matches!(
            ledger.open(id, 1.0),
            Err(ConsensusError::DuplicateValidator(_))
        ));
        assert!(matches!(
            ledger.lock_stake(&ValidatorId::new("ghost"), 1.0),
            Err(ConsensusError::UnknownValidator(_))
        ));
    }
}
