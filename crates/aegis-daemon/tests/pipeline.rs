//! Full pipeline runs over the default validator pool

use aegis_consensus::Admission;
use aegis_daemon::{AegisConfig, DaemonError, Pipeline};
use aegis_dispatch::SkipReason;
use aegis_types::{
    Amount, EventId, GeoPoint, LifecycleEvent, RawSignal, ResponseId, ResponseStatus, SignalKind,
    ValidationScore, ValidatorId,
};
use chrono::Utc;
use std::sync::Arc;

fn quake(event_id: &str) -> RawSignal {
    RawSignal::new(
        EventId::new(event_id),
        SignalKind::Seismic,
        GeoPoint::new(-6.8, 107.1),
        6.2,
        Utc::now(),
        "bmkg_autogempa",
    )
    .with_source_confidence(0.95)
}

fn pipeline() -> Arc<Pipeline> {
    Pipeline::with_adapters(&AegisConfig::push_only(), Vec::new()).unwrap()
}

#[tokio::test]
async fn three_validator_quake_creates_funded_response() {
    let pipeline = pipeline();
    pipeline.start();
    let mut lifecycle = pipeline.lifecycle().subscribe();

    let signal = quake("evt_cianjur");
    let aggregator = pipeline.aggregator();
    let ledger = pipeline.ledger();
    assert!(aggregator.admit(&signal).starts_round());

    let votes = [
        ("earthquake_validator", true, 0.9, 1000.0),
        ("multimodal_validator", true, 0.85, 800.0),
        ("social_validator", false, 0.6, 500.0),
    ];
    let scores = votes
        .iter()
        .map(|(id, prediction, confidence, stake)| {
            let id = ValidatorId::new(*id);
            let locked = ledger.lock_stake(&id, *stake).unwrap();
            assert_eq!(locked, *stake);
            ValidationScore::new(id, signal.event_id.clone(), *prediction, *confidence, locked)
        })
        .collect();

    let decision = aggregator.submit_all(scores).expect("quorum reached");
    assert!(decision.decision);
    assert!((decision.positive_ratio - 1580.0 / 1880.0).abs() < 1e-12);

    let outcome = pipeline
        .dispatcher()
        .dispatch(&decision, &signal)
        .await
        .expect("first dispatch");
    let response_id = outcome.response_id.expect("response created");
    assert_eq!(response_id, ResponseId::for_event(&signal.event_id));
    assert_eq!(
        outcome.payout.unwrap().policy_id.as_str(),
        "earthquake_emergency"
    );

    let record = pipeline.dispatcher().registry().get(&response_id).unwrap();
    assert_eq!(record.status, ResponseStatus::Funded);
    assert_eq!(record.treasury_balance, Amount::new(4_000_000));

    let accounts = ledger.accounts();
    let by_id = |id: &str| {
        accounts
            .iter()
            .find(|a| a.validator_id.as_str() == id)
            .unwrap()
            .clone()
    };
    assert!((by_id("earthquake_validator").balance - 10_200.0).abs() < 1e-6);
    assert!((by_id("multimodal_validator").balance - 8_160.0).abs() < 1e-6);
    assert!((by_id("social_validator").balance - 4_500.0).abs() < 1e-6);
    assert_eq!(by_id("social_validator").disagreements, 1);

    let status = pipeline.status();
    assert_eq!(status.consensus.accepted, 1);
    assert_eq!(status.treasury.balance, Amount::new(8_000_000));
    assert_eq!(status.vault.payout_count, 1);
    assert_eq!(status.responses, 1);

    let mut seen = Vec::new();
    while let Ok(envelope) = lifecycle.try_recv() {
        seen.push(envelope.event);
    }
    assert!(seen
        .iter()
        .any(|e| matches!(e, LifecycleEvent::DecisionReached { .. })));
    assert!(seen
        .iter()
        .any(|e| matches!(e, LifecycleEvent::ResponseCreated { .. })));

    pipeline.shutdown();
}

#[tokio::test]
async fn heuristic_pool_accepts_quake_below_dispatch_confidence() {
    let pipeline = pipeline();

    let handled = pipeline.handle(quake("evt_garut")).await.unwrap();
    assert_eq!(handled.admission, Admission::New);

    // Specialist and multi-modal confirm, the social analyser denies a
    // non-social signal; weighted confidence lands near 0.75.
    let outcome = handled.outcome.expect("decision dispatched");
    assert!(outcome.response_id.is_none());
    assert!(matches!(
        outcome.skipped,
        Some(SkipReason::LowConfidence { .. })
    ));

    let decision = pipeline
        .aggregator()
        .decision(&EventId::new("evt_garut"))
        .unwrap();
    assert!(decision.decision);
    assert_eq!(decision.participant_count, 3);

    let again = pipeline.handle(quake("evt_garut")).await.unwrap();
    assert_eq!(again.admission, Admission::AlreadyDecided);
    assert!(again.outcome.is_none());
    assert_eq!(pipeline.status().signals_received, 2);
}

#[tokio::test]
async fn invalid_signal_is_rejected_before_admission() {
    let pipeline = pipeline();

    let mut signal = quake("evt_bad");
    signal.location = GeoPoint::new(120.0, 107.1);

    assert!(pipeline.handle(signal).await.is_err());
    assert_eq!(pipeline.status().consensus.events, 0);
    assert_eq!(pipeline.status().signals_received, 0);
}

#[test]
fn pool_below_quorum_fails_to_build() {
    let mut config = AegisConfig::push_only();
    config.validators.retain(|v| v.id != "social_validator");

    // Seismic now reaches only the specialist and the multi-modal detector.
    let err = Pipeline::with_adapters(&config, Vec::new()).err().unwrap();
    assert!(matches!(err, DaemonError::Config(_)));
}

#[test]
fn zero_quorum_is_rejected_before_any_decision() {
    let mut config = AegisConfig::push_only();
    config.consensus.quorum = 0;

    let err = Pipeline::with_adapters(&config, Vec::new()).err().unwrap();
    assert!(matches!(err, DaemonError::Config(_)));

    let mut config = AegisConfig::push_only();
    config.consensus.threshold = 1.2;
    assert!(Pipeline::with_adapters(&config, Vec::new()).is_err());
}
