//! Parametric insurance vault
//!
//! Policies are scanned in table order and the first match pays out. The
//! vault keeps at most one payout per event; the balance check, the debit
//! and the payout record happen under one lock.

use crate::error::{DispatchError, DispatchResult};
use aegis_types::{
    AlertLevel, Amount, ConsensusDecision, EventId, FundingPool, PayoutRecord, PolicyId,
    RawSignal, ResponseId, SignalKind,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard};
use tracing::{info, warn};

/// One row of the policy table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametricPolicy {
    pub id: PolicyId,
    pub kind: SignalKind,
    #[serde(default)]
    pub min_magnitude: Option<f64>,
    #[serde(default)]
    pub min_severity: Option<AlertLevel>,
    /// Minimum consensus confidence
    pub min_confidence: f64,
    pub payout: Amount,
}

impl ParametricPolicy {
    pub fn matches(&self, signal: &RawSignal, decision: &ConsensusDecision) -> bool {
        signal.kind == self.kind
            && decision.confidence >= self.min_confidence
            && self.min_magnitude.map_or(true, |m| signal.magnitude >= m)
            && self.min_severity.map_or(true, |s| signal.severity() >= s)
    }
}

/// The built-in table: earthquake emergency, critical flood, major fire
pub fn default_policies() -> Vec<ParametricPolicy> {
    vec![
        ParametricPolicy {
            id: PolicyId::new("earthquake_emergency"),
            kind: SignalKind::Seismic,
            min_magnitude: Some(6.0),
            min_severity: None,
            min_confidence: 0.8,
            payout: Amount::new(2_000_000),
        },
        ParametricPolicy {
            id: PolicyId::new("flood_critical"),
            kind: SignalKind::Flood,
            min_magnitude: None,
            min_severity: Some(AlertLevel::Critical),
            min_confidence: 0.75,
            payout: Amount::new(1_500_000),
        },
        ParametricPolicy {
            id: PolicyId::new("fire_major"),
            kind: SignalKind::Fire,
            min_magnitude: None,
            min_severity: Some(AlertLevel::High),
            min_confidence: 0.8,
            payout: Amount::new(1_200_000),
        },
    ]
}

/// Outcome of evaluating the vault for one accepted decision
#[derive(Debug, Clone, PartialEq)]
pub enum PayoutOutcome {
    Paid(PayoutRecord),
    NoMatchingPolicy,
    /// This event already received its payout
    AlreadyPaid(PayoutRecord),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultStatus {
    pub balance: Amount,
    pub total_payouts: Amount,
    pub payout_count: usize,
    pub active_policies: usize,
}

#[derive(Default)]
struct VaultState {
    balance: Amount,
    payouts: BTreeMap<EventId, PayoutRecord>,
}

pub struct ParametricVault {
    policies: Vec<ParametricPolicy>,
    state: RwLock<VaultState>,
}

impl ParametricVault {
    pub fn new(balance: Amount, policies: Vec<ParametricPolicy>) -> Self {
        Self {
            policies,
            state: RwLock::new(VaultState {
                balance,
                payouts: BTreeMap::new(),
            }),
        }
    }

    pub fn with_default_policies(balance: Amount) -> Self {
        Self::new(balance, default_policies())
    }

    pub fn policies(&self) -> &[ParametricPolicy] {
        &self.policies
    }

    /// First policy matching this accepted decision, if any
    pub fn find_policy(
        &self,
        signal: &RawSignal,
        decision: &ConsensusDecision,
    ) -> Option<&ParametricPolicy> {
        if !decision.decision {
            return None;
        }
        self.policies.iter().find(|p| p.matches(signal, decision))
    }

    /// Pay out the first matching policy for an accepted decision.
    ///
    /// Fails with `InsufficientFunds` (pool `Vault`) when the balance does
    /// not cover the payout; nothing is debited in that case.
    pub fn execute(
        &self,
        signal: &RawSignal,
        decision: &ConsensusDecision,
    ) -> DispatchResult<PayoutOutcome> {
        let Some(policy) = self.find_policy(signal, decision) else {
            return Ok(PayoutOutcome::NoMatchingPolicy);
        };

        let mut state = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(existing) = state.payouts.get(&decision.event_id) {
            return Ok(PayoutOutcome::AlreadyPaid(existing.clone()));
        }

        let Some(remaining) = state.balance.checked_sub(policy.payout) else {
            warn!(
                event_id = %decision.event_id,
                policy_id = %policy.id,
                required = %policy.payout,
                available = %state.balance,
                "Insufficient vault balance for parametric payout"
            );
            return Err(DispatchError::InsufficientFunds {
                pool: FundingPool::Vault,
                required: policy.payout,
                available: state.balance,
            });
        };

        let payout = PayoutRecord {
            event_id: decision.event_id.clone(),
            policy_id: policy.id.clone(),
            amount: policy.payout,
            executed_at: Utc::now(),
            recipient: ResponseId::for_event(&decision.event_id),
        };
        state.balance = remaining;
        state.payouts.insert(decision.event_id.clone(), payout.clone());

        info!(
            event_id = %payout.event_id,
            policy_id = %payout.policy_id,
            amount = %payout.amount,
            balance = %remaining,
            "Parametric payout executed"
        );
        Ok(PayoutOutcome::Paid(payout))
    }

    pub fn balance(&self) -> Amount {
        self.read().balance
    }

    /// Payout history ordered by execution time
    pub fn payouts(&self) -> Vec<PayoutRecord> {
        let mut all: Vec<PayoutRecord> = self.read().payouts.values().cloned().collect();
        all.sort_by(|a, b| a.executed_at.cmp(&b.executed_at));
        all
    }

    pub fn status(&self) -> VaultStatus {
        let state = self.read();
        VaultStatus {
            balance: state.balance,
            total_payouts: state
                .payouts
                .values()
                .fold(Amount::zero(), |acc, p| acc.saturating_add(p.amount)),
            payout_count: state.payouts.len(),
            active_policies: self.policies.len(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, VaultState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_types::GeoPoint;

    fn signal(kind: SignalKind, magnitude: f64) -> RawSignal {
        RawSignal::new(
            EventId::new("evt_1"),
            kind,
            GeoPoint::new(-6.84, 107.05),
            magnitude,
            Utc::now(),
            "test",
        )
    }

    fn decision(accept: bool, confidence: f64) -> ConsensusDecision {
        ConsensusDecision {
            event_id: EventId::new("evt_1"),
            decision: accept,
            confidence,
            positive_ratio: 1.0,
            yes_weight: 1.0,
            no_weight: 0.0,
            participant_count: 3,
            participants: Vec::new(),
            decided_at: Utc::now(),
        }
    }

    #[test]
    fn strong_quake_triggers_earthquake_policy_once() {
        let vault = ParametricVault::with_default_policies(Amount::new(10_000_000));
        let quake = signal(SignalKind::Seismic, 6.2);

        let PayoutOutcome::Paid(payout) = vault.execute(&quake, &decision(true, 0.85)).unwrap() else {
            panic!("expected payout");
        };
        assert_eq!(payout.policy_id.as_str(), "earthquake_emergency");
        assert_eq!(payout.recipient.as_str(), "dao_evt_1");
        assert_eq!(vault.balance(), Amount::new(8_000_000));

        assert!(matches!(
            vault.execute(&quake, &decision(true, 0.85)).unwrap(),
            PayoutOutcome::AlreadyPaid(_)
        ));
        assert_eq!(vault.status().payout_count, 1);
    }

    #[test]
    fn unmatched_or_rejected_decisions_pay_nothing() {
        let vault = ParametricVault::with_default_policies(Amount::new(10_000_000));
        let cases = [
            (signal(SignalKind::Seismic, 5.5), decision(true, 0.9)),
            (signal(SignalKind::Seismic, 6.5), decision(true, 0.79)),
            (signal(SignalKind::Seismic, 6.5), decision(false, 0.9)),
            (signal(SignalKind::Flood, 3.0), decision(true, 0.9)),
            (signal(SignalKind::Social, 500.0), decision(true, 0.9)),
        ];
        for (signal, decision) in cases {
            assert_eq!(
                vault.execute(&signal, &decision).unwrap(),
                PayoutOutcome::NoMatchingPolicy
            );
        }
        assert_eq!(vault.balance(), Amount::new(10_000_000));
    }

    #[test]
    fn critical_flood_pays_at_lower_confidence() {
        let vault = ParametricVault::with_default_policies(Amount::new(10_000_000));
        let outcome = vault
            .execute(&signal(SignalKind::Flood, 4.0), &decision(true, 0.76))
            .unwrap();
        assert!(matches!(outcome, PayoutOutcome::Paid(ref p) if p.amount == Amount::new(1_500_000)));
    }

    #[test]
    fn insufficient_vault_balance_is_an_error() {
        let vault = ParametricVault::with_default_policies(Amount::new(1_000_000));
        let err = vault
            .execute(&signal(SignalKind::Fire, 95.0), &decision(true, 0.9))
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::InsufficientFunds {
                pool: FundingPool::Vault,
                ..
            }
        ));
        assert!(vault.payouts().is_empty());
    }
}
