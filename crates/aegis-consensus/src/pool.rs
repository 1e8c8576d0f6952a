//! Validator pool: static routing plus concurrent scoring

use crate::error::{ConsensusError, ConsensusResult};
use crate::ledger::StakeLedger;
use crate::validator::Validator;
use aegis_types::{RawSignal, SignalKind, ValidationScore, ValidatorId};
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Stake sizing parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StakePolicy {
    /// Share of the initial stake used as the base stake
    pub base_fraction: f64,
}

impl Default for StakePolicy {
    fn default() -> Self {
        Self { base_fraction: 0.1 }
    }
}

impl StakePolicy {
    /// `initial * base_fraction * source_confidence * severity / 5`,
    /// before the ledger's balance cap is applied
    pub fn requested_stake(&self, initial_stake: f64, signal: &RawSignal) -> f64 {
        let base = initial_stake * self.base_fraction;
        let severity = f64::from(signal.severity().value()) / 5.0;
        base * signal.source_confidence * severity
    }
}

/// The set of validators and the kind -> validators routing table.
pub struct ValidatorPool {
    validators: BTreeMap<ValidatorId, Arc<dyn Validator>>,
    routes: HashMap<SignalKind, Vec<ValidatorId>>,
    ledger: Arc<StakeLedger>,
    stake_policy: StakePolicy,
}

impl ValidatorPool {
    /// Build the pool, open a ledger account per validator and resolve routing.
    pub fn new(
        ledger: Arc<StakeLedger>,
        validators: Vec<(Arc<dyn Validator>, f64)>,
    ) -> ConsensusResult<Self> {
        let mut by_id = BTreeMap::new();
        for (validator, initial_stake) in validators {
            let id = validator.id().clone();
            if by_id.contains_key(&id) {
                return Err(ConsensusError::DuplicateValidator(id));
            }
            ledger.open(id.clone(), initial_stake)?;
            by_id.insert(id, validator);
        }

        let routes = SignalKind::ALL
            .iter()
            .map(|kind| {
                let routed: Vec<ValidatorId> = by_id
                    .iter()
                    .filter(|(_, v)| v.handles(*kind))
                    .map(|(id, _)| id.clone())
                    .collect();
                (*kind, routed)
            })
            .collect();

        Ok(Self {
            validators: by_id,
            routes,
            ledger,
            stake_policy: StakePolicy::default(),
        })
    }

    pub fn with_stake_policy(mut self, stake_policy: StakePolicy) -> Self {
        self.stake_policy = stake_policy;
        self
    }

    pub fn ledger(&self) -> Arc<StakeLedger> {
        self.ledger.clone()
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn routed(&self, kind: SignalKind) -> &[ValidatorId] {
        self.routes.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn routing_table(&self) -> BTreeMap<SignalKind, Vec<ValidatorId>> {
        self.routes
            .iter()
            .map(|(kind, ids)| (*kind, ids.clone()))
            .collect()
    }

    /// Run every routed validator concurrently and collect their scores.
    ///
    /// Validators that error abstain. Each returned score's stake has
    /// already been locked in the ledger.
    #[instrument(skip(self, signal), fields(event_id = %signal.event_id, kind = %signal.kind))]
    pub async fn score(&self, signal: &RawSignal) -> Vec<ValidationScore> {
        let tasks = self
            .routed(signal.kind)
            .iter()
            .filter_map(|id| self.validators.get(id))
            .map(|validator| self.score_one(validator.as_ref(), signal));

        join_all(tasks).await.into_iter().flatten().collect()
    }

    async fn score_one(
        &self,
        validator: &dyn Validator,
        signal: &RawSignal,
    ) -> Option<ValidationScore> {
        let validator_id = validator.id().clone();

        let assessment = match validator.assess(signal).await {
            Ok(assessment) => assessment,
            Err(e) => {
                warn!(validator_id = %validator_id, error = %e, "Validator abstained");
                return None;
            }
        };

        let account = match self.ledger.account(&validator_id) {
            Ok(account) => account,
            Err(e) => {
                warn!(validator_id = %validator_id, error = %e, "No stake account, abstaining");
                return None;
            }
        };
        let requested = self
            .stake_policy
            .requested_stake(account.initial_stake, signal);
        let stake = match self.ledger.lock_stake(&validator_id, requested) {
            Ok(stake) => stake,
            Err(e) => {
                warn!(validator_id = %validator_id, error = %e, "Stake lock failed, abstaining");
                return None;
            }
        };

        debug!(
            validator_id = %validator_id,
            prediction = assessment.prediction,
            confidence = assessment.confidence,
            stake,
            "Validator scored event"
        );

        Some(
            ValidationScore::new(
                validator_id,
                signal.event_id.clone(),
                assessment.prediction,
                assessment.confidence,
                stake,
            )
            .with_reasoning(assessment.reasoning),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::{Assessment, HeuristicValidator, Specialization};
    use aegis_types::{EventId, GeoPoint};
    use async_trait::async_trait;
    use chrono::Utc;

    struct Broken(ValidatorId);

    #[async_trait]
    impl Validator for Broken {
        fn id(&self) -> &ValidatorId {
            &self.0
        }

        fn handles(&self, _kind: SignalKind) -> bool {
            true
        }

        async fn assess(&self, _signal: &RawSignal) -> ConsensusResult<Assessment> {
            Err(ConsensusError::ValidatorFailed {
                validator_id: self.0.clone(),
                reason: "model offline".to_string(),
            })
        }
    }

    fn heuristic(id: &str, spec: Specialization) -> Arc<dyn Validator> {
        Arc::new(HeuristicValidator::new(ValidatorId::new(id), spec))
    }

    fn quake() -> RawSignal {
        RawSignal::new(
            EventId::new("evt_quake"),
            SignalKind::Seismic,
            GeoPoint::new(-6.84, 107.05),
            6.2,
            Utc::now(),
            "bmkg_autogempa",
        )
        .with_source_confidence(0.95)
    }

    fn default_pool() -> ValidatorPool {
        ValidatorPool::new(
            Arc::new(StakeLedger::new()),
            vec![
                (heuristic("earthquake_validator", Specialization::EarthquakeSpecialist), 10_000.0),
                (heuristic("multimodal_validator", Specialization::MultiModal), 8_000.0),
                (heuristic("social_validator", Specialization::SocialSignal), 5_000.0),
                (heuristic("general_validator", Specialization::General), 6_000.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn routing_table_is_resolved_at_construction() {
        let pool = default_pool();
        assert_eq!(
            pool.routed(SignalKind::Seismic),
            &[
                ValidatorId::new("earthquake_validator"),
                ValidatorId::new("multimodal_validator"),
                ValidatorId::new("social_validator"),
            ]
        );
        assert_eq!(pool.routed(SignalKind::Flood).len(), 3);
        assert!(!pool
            .routed(SignalKind::Flood)
            .contains(&ValidatorId::new("earthquake_validator")));
    }

    #[tokio::test]
    async fn scores_lock_sized_stakes() {
        let pool = default_pool();
        let scores = pool.score(&quake()).await;
        assert_eq!(scores.len(), 3);

        // Critical (4/5) quake from a 0.95 source: 10% * 0.95 * 0.8 of initial
        let eq = scores
            .iter()
            .find(|s| s.validator_id.as_str() == "earthquake_validator")
            .unwrap();
        assert!((eq.stake - 760.0).abs() < 1e-9);
        assert!(eq.prediction);

        let account = pool.ledger().account(&eq.validator_id).unwrap();
        assert!((account.balance - 9_240.0).abs() < 1e-9);
        assert!((account.locked - 760.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn failing_validator_abstains() {
        let ledger = Arc::new(StakeLedger::new());
        let pool = ValidatorPool::new(
            ledger.clone(),
            vec![
                (heuristic("earthquake_validator", Specialization::EarthquakeSpecialist), 10_000.0),
                (Arc::new(Broken(ValidatorId::new("broken_validator"))), 1_000.0),
            ],
        )
        .unwrap();

        let scores = pool.score(&quake()).await;
        assert_eq!(scores.len(), 1);
        let broken = ledger.account(&ValidatorId::new("broken_validator")).unwrap();
        assert_eq!(broken.locked, 0.0);
    }

    #[test]
    fn duplicate_validator_ids_are_rejected() {
        let result = ValidatorPool::new(
            Arc::new(StakeLedger::new()),
            vec![
                (heuristic("v", Specialization::General), 1.0),
                (heuristic("v", Specialization::MultiModal), 1.0),
            ],
        );
        assert!(matches!(result, Err(ConsensusError::DuplicateValidator(_))));
    }
}
