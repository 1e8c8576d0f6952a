//! Action dispatcher: turns an accepted decision into a funded response

use crate::capabilities::{LogisticsRequest, Notification};
use crate::consumers::{COMMUNICATIONS, DISPATCHER, LOGISTICS, TOPIC_NOTIFY, TOPIC_PLAN};
use crate::error::DispatchError;
use crate::registry::ResponseRegistry;
use crate::treasury::FundingAccount;
use crate::vault::{ParametricVault, PayoutOutcome};
use aegis_bridge::{Bridge, LifecycleBus};
use aegis_types::{
    Amount, ComponentId, ConsensusDecision, EventId, LifecycleEvent, PayoutRecord, RawSignal,
    ResponseId, ResponseRecord,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchPolicy {
    /// Minimum consensus confidence for creating a response record
    pub min_accept_confidence: f64,
    /// Treasury allocation for each new response
    pub response_allocation: Amount,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            min_accept_confidence: 0.8,
            response_allocation: Amount::new(2_000_000),
        }
    }
}

/// Why no response was created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    Rejected,
    LowConfidence { confidence: f64, minimum: f64 },
    InsufficientFunds { required: Amount, available: Amount },
}

/// What the dispatcher did for one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub event_id: EventId,
    pub response_id: Option<ResponseId>,
    pub skipped: Option<SkipReason>,
    pub payout: Option<PayoutRecord>,
}

pub struct Dispatcher {
    treasury: Arc<FundingAccount>,
    registry: Arc<ResponseRegistry>,
    vault: Arc<ParametricVault>,
    bridge: Arc<Bridge>,
    policy: DispatchPolicy,
    lifecycle: Option<LifecycleBus>,
    dispatched: DashMap<EventId, Option<DispatchOutcome>>,
}

impl Dispatcher {
    pub fn new(
        treasury: Arc<FundingAccount>,
        registry: Arc<ResponseRegistry>,
        vault: Arc<ParametricVault>,
        bridge: Arc<Bridge>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            treasury,
            registry,
            vault,
            bridge,
            policy,
            lifecycle: None,
            dispatched: DashMap::new(),
        }
    }

    pub fn with_lifecycle(mut self, lifecycle: LifecycleBus) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn treasury(&self) -> Arc<FundingAccount> {
        self.treasury.clone()
    }

    pub fn registry(&self) -> Arc<ResponseRegistry> {
        self.registry.clone()
    }

    pub fn vault(&self) -> Arc<ParametricVault> {
        self.vault.clone()
    }

    pub fn bridge(&self) -> Arc<Bridge> {
        self.bridge.clone()
    }

    /// Outcome recorded for an event, if it was dispatched and finished
    pub fn outcome(&self, event_id: &EventId) -> Option<DispatchOutcome> {
        self.dispatched.get(event_id).and_then(|o| o.value().clone())
    }

    /// Act on a committed decision.
    ///
    /// Idempotent per event id: a second call returns `None` without side
    /// effects. Failures downstream of the decision are logged and
    /// reported in the outcome, never propagated.
    #[instrument(skip(self, decision, signal), fields(event_id = %decision.event_id))]
    pub async fn dispatch(
        &self,
        decision: &ConsensusDecision,
        signal: &RawSignal,
    ) -> Option<DispatchOutcome> {
        if self
            .dispatched
            .insert(decision.event_id.clone(), None)
            .is_some()
        {
            warn!("Decision already dispatched, ignoring");
            return None;
        }

        let mut outcome = DispatchOutcome {
            event_id: decision.event_id.clone(),
            response_id: None,
            skipped: None,
            payout: None,
        };

        if !decision.decision {
            info!(confidence = decision.confidence, "Event rejected, nothing to dispatch");
            outcome.skipped = Some(SkipReason::Rejected);
            return Some(self.finish(outcome));
        }

        let created = if decision.confidence >= self.policy.min_accept_confidence {
            self.create_response(decision, signal, &mut outcome)
        } else {
            info!(
                confidence = decision.confidence,
                minimum = self.policy.min_accept_confidence,
                "Accepted below response confidence, no record created"
            );
            outcome.skipped = Some(SkipReason::LowConfidence {
                confidence: decision.confidence,
                minimum: self.policy.min_accept_confidence,
            });
            None
        };

        outcome.payout = self.execute_payout(decision, signal);

        if let Some(record) = created {
            self.fan_out(&record).await;
        }
        Some(self.finish(outcome))
    }

    fn create_response(
        &self,
        decision: &ConsensusDecision,
        signal: &RawSignal,
        outcome: &mut DispatchOutcome,
    ) -> Option<ResponseRecord> {
        let allocation = self.policy.response_allocation;
        if let Err(e) = self.treasury.try_debit(allocation) {
            if let DispatchError::InsufficientFunds {
                pool,
                required,
                available,
            } = e
            {
                error!(%required, %available, "Insufficient treasury funds, response not created");
                self.publish(LifecycleEvent::FundingFailed {
                    event_id: decision.event_id.clone(),
                    pool,
                    required,
                    available,
                });
                outcome.skipped = Some(SkipReason::InsufficientFunds {
                    required,
                    available,
                });
            }
            return None;
        }

        let record = ResponseRecord::new(
            decision.event_id.clone(),
            signal.kind,
            signal.location,
            signal.severity(),
            allocation,
        );
        match self.registry.insert(record.clone()) {
            Ok(response_id) => {
                info!(
                    response_id = %response_id,
                    allocation = %allocation,
                    treasury = %self.treasury.balance(),
                    "Response created"
                );
                self.publish(LifecycleEvent::ResponseCreated {
                    event_id: decision.event_id.clone(),
                    response_id: response_id.clone(),
                    allocation,
                });
                outcome.response_id = Some(response_id);
                Some(record)
            }
            Err(e) => {
                // Keep the treasury whole if the id was somehow taken.
                self.treasury.credit(allocation);
                error!(error = %e, "Response record rejected");
                None
            }
        }
    }

    fn execute_payout(
        &self,
        decision: &ConsensusDecision,
        signal: &RawSignal,
    ) -> Option<PayoutRecord> {
        match self.vault.execute(signal, decision) {
            Ok(PayoutOutcome::Paid(payout)) => {
                self.publish(LifecycleEvent::PayoutExecuted {
                    event_id: payout.event_id.clone(),
                    policy_id: payout.policy_id.clone(),
                    amount: payout.amount,
                });
                if let Err(e) = self.registry.credit_payout(&payout.recipient, payout.amount) {
                    warn!(recipient = %payout.recipient, error = %e, "Payout recipient unavailable, held in history");
                }
                Some(payout)
            }
            Ok(PayoutOutcome::AlreadyPaid(payout)) => Some(payout),
            Ok(PayoutOutcome::NoMatchingPolicy) => None,
            Err(DispatchError::InsufficientFunds {
                pool,
                required,
                available,
            }) => {
                self.publish(LifecycleEvent::FundingFailed {
                    event_id: decision.event_id.clone(),
                    pool,
                    required,
                    available,
                });
                None
            }
            Err(e) => {
                error!(error = %e, "Parametric payout failed");
                None
            }
        }
    }

    async fn fan_out(&self, record: &ResponseRecord) {
        // Re-read so a payout credited just now shows in the alert.
        let treasury_balance = self
            .registry
            .get(&record.response_id)
            .map_or(record.treasury_balance, |r| r.treasury_balance);

        let notification = Notification {
            response_id: record.response_id.clone(),
            event_id: record.event_id.clone(),
            kind: record.kind,
            location: record.location,
            severity: record.severity,
            treasury_balance,
        };
        let request = LogisticsRequest::for_response(
            record.response_id.clone(),
            record.event_id.clone(),
            record.kind,
            record.location,
            record.severity,
        );

        self.send(COMMUNICATIONS, TOPIC_NOTIFY, serde_json::to_value(notification))
            .await;
        self.send(LOGISTICS, TOPIC_PLAN, serde_json::to_value(request))
            .await;
    }

    async fn send(&self, to: &str, topic: &str, payload: serde_json::Result<serde_json::Value>) {
        match payload {
            Ok(payload) => {
                // Exhaustion is dead-lettered by the bridge; nothing to undo here.
                self.bridge
                    .send(ComponentId::new(DISPATCHER), ComponentId::new(to), topic, payload)
                    .await;
            }
            Err(e) => error!(to, topic, error = %e, "Could not encode message"),
        }
    }

    fn finish(&self, outcome: DispatchOutcome) -> DispatchOutcome {
        self.dispatched
            .insert(outcome.event_id.clone(), Some(outcome.clone()));
        outcome
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
    use crate::recognition::RecognitionLedger;
    use aegis_bridge::{InMemoryTransport, RetryPolicy};
    use aegis_types::{FundingPool, GeoPoint, ResponseStatus, SignalKind};
    use chrono::Utc;

    struct Fixture {
        dispatcher: Dispatcher,
        transport: Arc<InMemoryTransport>,
        lifecycle: LifecycleBus,
    }

    fn fixture(treasury: u64, vault: u64) -> Fixture {
        let transport = Arc::new(InMemoryTransport::default());
        let lifecycle = LifecycleBus::new(64);
        let bridge = Bridge::new(transport.clone(), RetryPolicy::default())
            .with_lifecycle(lifecycle.clone());
        let dispatcher = Dispatcher::new(
            Arc::new(FundingAccount::new(FundingPool::Treasury, Amount::new(treasury))),
            Arc::new(ResponseRegistry::new(Arc::new(RecognitionLedger::new()))),
            Arc::new(ParametricVault::with_default_policies(Amount::new(vault))),
            Arc::new(bridge),
            DispatchPolicy::default(),
        )
        .with_lifecycle(lifecycle.clone());
        Fixture {
            dispatcher,
            transport,
            lifecycle,
        }
    }

    fn quake() -> RawSignal {
        RawSignal::new(
            EventId::new("evt_1"),
            SignalKind::Seismic,
            GeoPoint::new(-6.84, 107.05),
            6.2,
            Utc::now(),
            "bmkg_autogempa",
        )
    }

    fn decision(accept: bool, confidence: f64) -> ConsensusDecision {
        ConsensusDecision {
            event_id: EventId::new("evt_1"),
            decision: accept,
            confidence,
            positive_ratio: if accept { 0.9 } else { 0.2 },
            yes_weight: 0.0,
            no_weight: 0.0,
            participant_count: 3,
            participants: Vec::new(),
            decided_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn accepted_quake_creates_funded_response() {
        let f = fixture(10_000_000, 10_000_000);
        let mut comms = f.transport.register(ComponentId::new(COMMUNICATIONS));
        let mut logistics = f.transport.register(ComponentId::new(LOGISTICS));

        let outcome = f.dispatcher.dispatch(&decision(true, 0.85), &quake()).await.unwrap();
        let response_id = outcome.response_id.unwrap();
        assert_eq!(response_id.as_str(), "dao_evt_1");
        assert_eq!(outcome.payout.unwrap().amount, Amount::new(2_000_000));

        let record = f.dispatcher.registry().get(&response_id).unwrap();
        assert_eq!(record.status, ResponseStatus::Funded);
        assert_eq!(record.treasury_balance, Amount::new(4_000_000));
        assert_eq!(f.dispatcher.treasury().balance(), Amount::new(8_000_000));

        let notify = comms.try_recv().unwrap();
        assert_eq!(notify.topic, TOPIC_NOTIFY);
        assert_eq!(notify.payload["treasury_balance"], 4_000_000);
        let plan = logistics.try_recv().unwrap();
        assert_eq!(plan.payload["evacuation_needed"], true);
    }

    #[tokio::test]
    async fn dispatch_is_idempotent() {
        let f = fixture(10_000_000, 10_000_000);
        assert!(f.dispatcher.dispatch(&decision(true, 0.85), &quake()).await.is_some());
        assert!(f.dispatcher.dispatch(&decision(true, 0.85), &quake()).await.is_none());
        assert_eq!(f.dispatcher.registry().len(), 1);
        assert_eq!(f.dispatcher.treasury().balance(), Amount::new(8_000_000));
    }

    #[tokio::test]
    async fn rejected_and_low_confidence_create_nothing() {
        let f = fixture(10_000_000, 10_000_000);
        let rejected = f.dispatcher.dispatch(&decision(false, 0.9), &quake()).await.unwrap();
        assert_eq!(rejected.skipped, Some(SkipReason::Rejected));
        assert!(rejected.payout.is_none());

        let f = fixture(10_000_000, 10_000_000);
        let low = f.dispatcher.dispatch(&decision(true, 0.79), &quake()).await.unwrap();
        assert!(matches!(low.skipped, Some(SkipReason::LowConfidence { .. })));
        assert!(f.dispatcher.registry().is_empty());
        assert_eq!(f.dispatcher.treasury().balance(), Amount::new(10_000_000));
    }

    #[tokio::test(start_paused = true)]
    async fn insufficient_treasury_publishes_funding_failed() {
        let f = fixture(1_000_000, 10_000_000);
        let mut rx = f.lifecycle.subscribe();

        let outcome = f.dispatcher.dispatch(&decision(true, 0.85), &quake()).await.unwrap();
        assert!(outcome.response_id.is_none());
        assert!(matches!(outcome.skipped, Some(SkipReason::InsufficientFunds { .. })));
        assert!(f.dispatcher.registry().is_empty());

        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first.event,
            LifecycleEvent::FundingFailed {
                pool: FundingPool::Treasury,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_consumers_do_not_fail_dispatch() {
        // Nobody registered the communications or logistics mailboxes.
        let f = fixture(10_000_000, 10_000_000);
        let outcome = f.dispatcher.dispatch(&decision(true, 0.85), &quake()).await.unwrap();
        assert!(outcome.response_id.is_some());
        assert_eq!(f.dispatcher.bridge().dead_letters().len(), 2);
    }
}
