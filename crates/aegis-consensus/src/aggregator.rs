//! Consensus aggregator: quorum, weighted decision, settlement, eviction

use crate::error::{ConsensusError, ConsensusResult};
use crate::ledger::StakeLedger;
use crate::store::{
    Admission, Admitted, CommitOutcome, ConsensusStore, EventSnapshot, EventState, RecordOutcome,
};
use aegis_bridge::LifecycleBus;
use aegis_types::{ConsensusDecision, EventId, LifecycleEvent, RawSignal, ValidationScore};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, trace, warn};

/// Decision policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsensusPolicy {
    /// Distinct scores needed before deciding
    pub quorum: usize,
    /// Inclusive acceptance threshold on the positive ratio
    pub threshold: f64,
    /// Payout multiplier on the stake of agreeing validators
    pub reward_multiplier: f64,
    /// How long an event may stay collecting before eviction
    pub pending_ttl: Duration,
}

impl Default for ConsensusPolicy {
    fn default() -> Self {
        Self {
            quorum: 3,
            threshold: 0.7,
            reward_multiplier: 1.2,
            pending_ttl: Duration::from_secs(900),
        }
    }
}

/// Result of submitting one score
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Recorded, still collecting
    Pending { scores: usize },
    /// This score completed quorum and its caller committed the decision
    Decided(ConsensusDecision),
    /// Event already closed; score kept for audit and its stake refunded
    Late,
}

/// Aggregator counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsensusStats {
    pub events: usize,
    pub pending: usize,
    pub decided: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub evicted: usize,
    pub late_scores: usize,
}

/// Compute the weighted decision over a set of scores.
///
/// Pure function of the score set: sums run in validator-id order, so the
/// arrival order of scores cannot change the floating-point result.
pub fn compute_decision(
    event_id: &EventId,
    scores: &[ValidationScore],
    threshold: f64,
) -> ConsensusDecision {
    let mut ordered: Vec<&ValidationScore> = scores.iter().collect();
    ordered.sort_by(|a, b| a.validator_id.cmp(&b.validator_id));

    let mut yes_weight = 0.0;
    let mut no_weight = 0.0;
    let mut weighted_confidence = 0.0;
    for score in &ordered {
        let weight = score.weight();
        if score.prediction {
            yes_weight += weight;
        } else {
            no_weight += weight;
        }
        weighted_confidence += score.confidence * weight;
    }

    let total_weight = yes_weight + no_weight;
    let (positive_ratio, confidence, decision) = if total_weight > 0.0 {
        let ratio = yes_weight / total_weight;
        (ratio, weighted_confidence / total_weight, ratio >= threshold)
    } else {
        (0.0, 0.0, false)
    };

    ConsensusDecision {
        event_id: event_id.clone(),
        decision,
        confidence,
        positive_ratio,
        yes_weight,
        no_weight,
        participant_count: ordered.len(),
        participants: ordered.iter().map(|s| s.validator_id.clone()).collect(),
        decided_at: Utc::now(),
    }
}

/// Collects scores per event and fires one decision per event.
pub struct Aggregator {
    store: Arc<dyn ConsensusStore>,
    ledger: Arc<StakeLedger>,
    policy: ConsensusPolicy,
    lifecycle: Option<LifecycleBus>,
}

impl Aggregator {
    pub fn new(
        store: Arc<dyn ConsensusStore>,
        ledger: Arc<StakeLedger>,
        policy: ConsensusPolicy,
    ) -> Self {
        Self {
            store,
            ledger,
            policy,
            lifecycle: None,
        }
    }

    pub fn with_lifecycle(mut self, lifecycle: LifecycleBus) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn policy(&self) -> ConsensusPolicy {
        self.policy
    }

    pub fn store(&self) -> Arc<dyn ConsensusStore> {
        self.store.clone()
    }

    /// Admit a signal. Only `Admission::New` should be fanned out to validators.
    #[instrument(skip(self, signal), fields(event_id = %signal.event_id))]
    pub fn admit(&self, signal: &RawSignal) -> Admission {
        let Admitted {
            admission,
            first_report,
        } = self.store.admit(signal);
        match admission {
            Admission::New => {
                info!(kind = %signal.kind, source = %signal.source, "New event collecting");
                self.publish(LifecycleEvent::SignalIngested {
                    event_id: signal.event_id.clone(),
                    kind: signal.kind,
                    source: signal.source.clone(),
                });
            }
            other if first_report => {
                debug!(source = %signal.source, admission = ?other, "Signal corroborates known event");
                self.publish(LifecycleEvent::SignalCorroborated {
                    event_id: signal.event_id.clone(),
                    source: signal.source.clone(),
                });
            }
            other => {
                trace!(source = %signal.source, admission = ?other, "Repeat report from known source");
            }
        }
        admission
    }

    /// Submit one validator score.
    ///
    /// The caller whose score completes quorum and wins the commit settles
    /// stakes and receives [`Submission::Decided`]; everyone else sees
    /// `Pending` or `Late`. Rejected and late scores get their stake back.
    #[instrument(skip(self, score), fields(event_id = %score.event_id, validator_id = %score.validator_id))]
    pub fn submit(&self, score: ValidationScore) -> ConsensusResult<Submission> {
        let validator_id = score.validator_id.clone();
        let stake = score.stake;

        if !(0.0..=1.0).contains(&score.confidence) || !score.stake.is_finite() || score.stake < 0.0 {
            self.refund(&validator_id, stake);
            return Err(ConsensusError::InvalidScore(format!(
                "confidence {} / stake {} out of range",
                score.confidence, score.stake
            )));
        }

        let outcome = match self.store.record_score(score, self.policy.quorum) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.refund(&validator_id, stake);
                return Err(e);
            }
        };

        match outcome {
            RecordOutcome::Pending { scores } => {
                debug!(scores, quorum = self.policy.quorum, "Score recorded");
                Ok(Submission::Pending { scores })
            }
            RecordOutcome::Late { state } => {
                debug!(?state, "Late score recorded for audit");
                self.refund(&validator_id, stake);
                Ok(Submission::Late)
            }
            RecordOutcome::QuorumReached { scores } => {
                let event_id = scores
                    .first()
                    .map(|s| s.event_id.clone())
                    .ok_or_else(|| ConsensusError::InvalidScore("empty quorum".to_string()))?;
                let decision = compute_decision(&event_id, &scores, self.policy.threshold);

                match self.store.try_commit_decision(decision.clone()) {
                    CommitOutcome::Committed { stragglers } => {
                        self.settle(&decision, &scores);
                        for straggler in &stragglers {
                            self.refund(&straggler.validator_id, straggler.stake);
                        }
                        info!(
                            decision = decision.decision,
                            confidence = decision.confidence,
                            positive_ratio = decision.positive_ratio,
                            participants = decision.participant_count,
                            "Consensus reached"
                        );
                        self.publish(LifecycleEvent::DecisionReached {
                            event_id: decision.event_id.clone(),
                            decision: decision.decision,
                            confidence: decision.confidence,
                            positive_ratio: decision.positive_ratio,
                            participant_count: decision.participant_count,
                        });
                        Ok(Submission::Decided(decision))
                    }
                    // The winner refunds scores it did not include, ours among them.
                    CommitOutcome::AlreadyClosed => Ok(Submission::Late),
                }
            }
        }
    }

    /// Submit a batch of scores; returns the decision if one of them fired it
    pub fn submit_all(&self, scores: Vec<ValidationScore>) -> Option<ConsensusDecision> {
        let mut fired = None;
        for score in scores {
            match self.submit(score) {
                Ok(Submission::Decided(decision)) => fired = Some(decision),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Score rejected"),
            }
        }
        fired
    }

    /// Evict events that have been collecting longer than the TTL and refund
    /// their stakes. Returns the evicted ids.
    pub fn sweep_expired(&self) -> Vec<EventId> {
        let ttl = chrono::Duration::from_std(self.policy.pending_ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(900));
        self.sweep_before(Utc::now() - ttl)
    }

    pub fn sweep_before(&self, cutoff: chrono::DateTime<Utc>) -> Vec<EventId> {
        let evicted = self.store.evict_expired(cutoff);
        let mut ids = Vec::with_capacity(evicted.len());

        for event in evicted {
            let refunded: f64 = event.scores.iter().map(|s| s.stake).sum();
            for score in &event.scores {
                self.refund(&score.validator_id, score.stake);
            }
            warn!(
                event_id = %event.event_id,
                scores = event.scores.len(),
                refunded_stake = refunded,
                "Event evicted before reaching quorum"
            );
            self.publish(LifecycleEvent::EventEvicted {
                event_id: event.event_id.clone(),
                scores: event.scores.len(),
                refunded_stake: refunded,
            });
            ids.push(event.event_id);
        }
        ids
    }

    pub fn event(&self, event_id: &EventId) -> Option<EventSnapshot> {
        self.store.snapshot(event_id)
    }

    pub fn decision(&self, event_id: &EventId) -> Option<ConsensusDecision> {
        self.store.decision(event_id)
    }

    pub fn stats(&self) -> ConsensusStats {
        let mut stats = ConsensusStats::default();
        for event in self.store.snapshots() {
            stats.events += 1;
            stats.late_scores += event.late_scores.len();
            match event.state {
                EventState::Collecting => stats.pending += 1,
                EventState::Evicted => stats.evicted += 1,
                EventState::Decided => {
                    stats.decided += 1;
                    if event.decision.as_ref().is_some_and(|d| d.decision) {
                        stats.accepted += 1;
                    } else {
                        stats.rejected += 1;
                    }
                }
            }
        }
        stats
    }

    fn settle(&self, decision: &ConsensusDecision, scores: &[ValidationScore]) {
        for score in scores {
            let agreed = score.prediction == decision.decision;
            match self.ledger.settle(
                &score.validator_id,
                score.stake,
                agreed,
                self.policy.reward_multiplier,
            ) {
                Ok(credited) => debug!(
                    validator_id = %score.validator_id,
                    agreed,
                    stake = score.stake,
                    credited,
                    "Stake settled"
                ),
                Err(e) => warn!(validator_id = %score.validator_id, error = %e, "Settlement skipped"),
            }
        }
    }

    fn refund(&self, validator_id: &aegis_types::ValidatorId, stake: f64) {
        if let Err(e) = self.ledger.refund(validator_id, stake) {
            warn!(validator_id = %validator_id, error = %e, "Refund skipped");
        }
    }

    fn publish(&self, event: LifecycleEvent) {
        if let Some(lifecycle) = &self.lifecycle {
            lifecycle.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryConsensusStore;
    use aegis_types::{GeoPoint, SignalKind, ValidatorId};

    fn score(validator: &str, prediction: bool, confidence: f64, stake: f64) -> ValidationScore {
        ValidationScore::new(
            ValidatorId::new(validator),
            EventId::new("evt_1"),
            prediction,
            confidence,
            stake,
        )
    }

    fn signal() -> RawSignal {
        RawSignal::new(
            EventId::new("evt_1"),
            SignalKind::Seismic,
            GeoPoint::new(-6.84, 107.05),
            6.2,
            Utc::now(),
            "bmkg_autogempa",
        )
    }

    /// Aggregator over a ledger whose accounts already hold the given stakes locked
    fn aggregator(stakes: &[(&str, f64)]) -> (Aggregator, Arc<StakeLedger>) {
        let ledger = Arc::new(StakeLedger::with_max_fraction(1.0));
        for (id, stake) in stakes {
            let id = ValidatorId::new(*id);
            ledger.open(id.clone(), *stake).unwrap();
            ledger.lock_stake(&id, *stake).unwrap();
        }
        let aggregator = Aggregator::new(
            Arc::new(InMemoryConsensusStore::new()),
            ledger.clone(),
            ConsensusPolicy::default(),
        );
        (aggregator, ledger)
    }

    #[test]
    fn weighted_decision_formula() {
        let scores = vec![
            score("a", true, 0.9, 1000.0),
            score("b", true, 0.85, 800.0),
            score("c", false, 0.6, 500.0),
        ];
        let decision = compute_decision(&EventId::new("evt_1"), &scores, 0.7);

        assert!(decision.decision);
        assert!((decision.yes_weight - 1580.0).abs() < 1e-9);
        assert!((decision.no_weight - 300.0).abs() < 1e-9);
        assert!((decision.positive_ratio - 1580.0 / 1880.0).abs() < 1e-12);
        assert!((decision.confidence - 1568.0 / 1880.0).abs() < 1e-12);
        assert_eq!(decision.participant_count, 3);
    }

    #[test]
    fn threshold_is_inclusive() {
        let scores = vec![
            score("a", true, 1.0, 400.0),
            score("b", true, 1.0, 300.0),
            score("c", false, 1.0, 300.0),
        ];
        let at = compute_decision(&EventId::new("evt_1"), &scores, 0.7);
        assert_eq!(at.positive_ratio, 0.7);
        assert!(at.decision);

        let just_above = f64::from_bits(0.7f64.to_bits() + 1);
        let below = compute_decision(&EventId::new("evt_1"), &scores, just_above);
        assert!(!below.decision);
    }

    #[test]
    fn zero_weight_rejects_with_zero_confidence() {
        let scores = vec![
            score("a", true, 0.0, 100.0),
            score("b", true, 0.9, 0.0),
            score("c", false, 0.0, 0.0),
        ];
        let decision = compute_decision(&EventId::new("evt_1"), &scores, 0.7);
        assert!(!decision.decision);
        assert_eq!(decision.confidence, 0.0);
        assert_eq!(decision.positive_ratio, 0.0);
        assert!(decision.confidence.is_finite());
    }

    #[test]
    fn quorum_fires_exactly_once_and_settles() {
        let (aggregator, ledger) = aggregator(&[("a", 1000.0), ("b", 800.0), ("c", 500.0), ("d", 100.0)]);
        assert_eq!(aggregator.admit(&signal()), Admission::New);

        assert_eq!(
            aggregator.submit(score("a", true, 0.9, 1000.0)).unwrap(),
            Submission::Pending { scores: 1 }
        );
        assert_eq!(
            aggregator.submit(score("b", true, 0.85, 800.0)).unwrap(),
            Submission::Pending { scores: 2 }
        );
        let decided = aggregator.submit(score("c", false, 0.6, 500.0)).unwrap();
        assert!(matches!(decided, Submission::Decided(ref d) if d.decision));

        // Fourth score is late: audited and refunded, no second decision.
        assert_eq!(
            aggregator.submit(score("d", true, 0.9, 100.0)).unwrap(),
            Submission::Late
        );

        let a = ledger.account(&ValidatorId::new("a")).unwrap();
        let c = ledger.account(&ValidatorId::new("c")).unwrap();
        let d = ledger.account(&ValidatorId::new("d")).unwrap();
        assert!((a.balance - 1200.0).abs() < 1e-9);
        assert_eq!(c.balance, 0.0);
        assert_eq!(c.locked, 0.0);
        assert_eq!(d.balance, 100.0);

        let snapshot = aggregator.event(&EventId::new("evt_1")).unwrap();
        assert_eq!(snapshot.state, EventState::Decided);
        assert_eq!(snapshot.late_scores.len(), 1);
        assert_eq!(aggregator.stats().accepted, 1);
    }

    #[test]
    fn duplicate_score_is_refunded() {
        let (aggregator, ledger) = aggregator(&[("a", 1000.0)]);
        aggregator.admit(&signal());
        aggregator.submit(score("a", true, 0.9, 500.0)).unwrap();

        let err = aggregator.submit(score("a", true, 0.9, 500.0)).unwrap_err();
        assert!(matches!(err, ConsensusError::DuplicateScore { .. }));
        let a = ledger.account(&ValidatorId::new("a")).unwrap();
        assert_eq!(a.balance, 500.0);
        assert_eq!(a.locked, 500.0);
    }

    #[test]
    fn nan_stake_score_leaves_locked_stake_alone() {
        let (aggregator, ledger) = aggregator(&[("a", 4000.0)]);
        aggregator.admit(&signal());

        let err = aggregator.submit(score("a", true, 0.9, f64::NAN)).unwrap_err();
        assert!(matches!(err, ConsensusError::InvalidScore(_)));
        let a = ledger.account(&ValidatorId::new("a")).unwrap();
        assert_eq!(a.balance, 0.0);
        assert_eq!(a.locked, 4000.0);
    }

    #[test]
    fn repeat_polls_publish_corroboration_once_per_source() {
        let (aggregator, _) = aggregator(&[]);
        let bus = LifecycleBus::new(64);
        let mut rx = bus.subscribe();
        let aggregator = aggregator.with_lifecycle(bus);

        for _ in 0..10 {
            aggregator.admit(&signal());
        }
        let mut other = signal();
        other.source = "usgs_earthquakes".to_string();
        aggregator.admit(&other);
        aggregator.admit(&other);

        let mut corroborations = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            if let LifecycleEvent::SignalCorroborated { source, .. } = envelope.event {
                corroborations.push(source);
            }
        }
        assert_eq!(corroborations, vec!["usgs_earthquakes"]);

        let snapshot = aggregator.event(&EventId::new("evt_1")).unwrap();
        assert_eq!(snapshot.sources["bmkg_autogempa"], 10);
        assert_eq!(snapshot.sources["usgs_earthquakes"], 2);
    }

    #[test]
    fn sweep_evicts_and_refunds() {
        let (aggregator, ledger) = aggregator(&[("a", 1000.0), ("b", 800.0)]);
        let bus = LifecycleBus::new(16);
        let mut rx = bus.subscribe();
        let aggregator = aggregator.with_lifecycle(bus);

        aggregator.admit(&signal());
        aggregator.submit(score("a", true, 0.9, 1000.0)).unwrap();
        aggregator.submit(score("b", false, 0.8, 800.0)).unwrap();

        let evicted = aggregator.sweep_before(Utc::now() + chrono::Duration::seconds(1));
        assert_eq!(evicted, vec![EventId::new("evt_1")]);
        assert_eq!(ledger.account(&ValidatorId::new("a")).unwrap().balance, 1000.0);
        assert_eq!(ledger.account(&ValidatorId::new("b")).unwrap().balance, 800.0);

        // Repeat signal and late score never reopen an evicted event.
        assert_eq!(aggregator.admit(&signal()), Admission::Evicted);
        assert_eq!(aggregator.stats().evicted, 1);

        let mut saw_eviction = false;
        while let Ok(envelope) = rx.try_recv() {
            if let LifecycleEvent::EventEvicted { refunded_stake, .. } = envelope.event {
                assert_eq!(refunded_stake, 1800.0);
                saw_eviction = true;
            }
        }
        assert!(saw_eviction);
    }

    #[test]
    fn fresh_events_survive_the_sweep() {
        let (aggregator, _) = aggregator(&[]);
        aggregator.admit(&signal());
        assert!(aggregator.sweep_expired().is_empty());
        assert_eq!(aggregator.stats().pending, 1);
    }
}
