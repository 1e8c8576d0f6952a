//! Pipeline wiring: oracle -> validator pool -> aggregator -> dispatcher
//!
//! One `Pipeline` owns every component and the background tasks that drive
//! them. Signals enter through [`Pipeline::ingest`] (oracle and push
//! endpoint alike); only the first signal of an event fans out to the
//! validators.

use crate::config::AegisConfig;
use crate::error::{DaemonError, DaemonResult};
use aegis_bridge::{Bridge, InMemoryTransport, LifecycleBus, RetryPolicy};
use aegis_consensus::{
    Admission, Aggregator, ConsensusPolicy, ConsensusStats, HeuristicValidator,
    InMemoryConsensusStore, StakeAccount, StakeLedger, StakePolicy, Validator, ValidatorPool,
};
use aegis_dispatch::{
    run_communications, run_logistics, DispatchOutcome, DispatchPolicy, Dispatcher,
    FundingAccount, FundingSnapshot, LogNotifier, LogPlanner, ParametricVault,
    RecognitionLedger, ResponseRegistry, VaultStatus, COMMUNICATIONS, LOGISTICS,
};
use aegis_oracle::{
    AnomalyThresholds, DedupPolicy, HttpFeed, OracleNetwork, OracleStatus, SourceAdapter,
};
use aegis_types::{
    Amount, ComponentId, EventId, FundingPool, RawSignal, SignalKind, SignalResult, ValidatorId,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Result of handling one signal to completion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Handled {
    pub event_id: EventId,
    pub admission: Admission,
    /// Present when this signal started the round and it reached a decision
    pub outcome: Option<DispatchOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub signals_received: u64,
    pub consensus: ConsensusStats,
    pub validators: Vec<StakeAccount>,
    pub treasury: FundingSnapshot,
    pub vault: VaultStatus,
    pub responses: usize,
    pub dead_letters: usize,
    pub oracle: Option<OracleStatus>,
}

pub struct Pipeline {
    config: AegisConfig,
    dedup: DedupPolicy,
    lifecycle: LifecycleBus,
    transport: Arc<InMemoryTransport>,
    ledger: Arc<StakeLedger>,
    pool: Arc<ValidatorPool>,
    aggregator: Arc<Aggregator>,
    dispatcher: Arc<Dispatcher>,
    oracle: Option<Arc<OracleNetwork>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    signals_received: AtomicU64,
}

impl Pipeline {
    /// Build every component from configuration; oracle sources use HTTP feeds
    pub fn build(config: &AegisConfig) -> DaemonResult<Arc<Self>> {
        let adapters = if config.oracle.enabled {
            http_adapters(config)?
        } else {
            Vec::new()
        };
        Self::with_adapters(config, adapters)
    }

    /// Build with an explicit set of source adapters
    pub fn with_adapters(
        config: &AegisConfig,
        adapters: Vec<SourceAdapter>,
    ) -> DaemonResult<Arc<Self>> {
        config.validate()?;
        let lifecycle = LifecycleBus::new(config.bridge.lifecycle_capacity);
        let transport = Arc::new(InMemoryTransport::new(config.bridge.mailbox_capacity));

        let ledger = Arc::new(StakeLedger::with_max_fraction(
            config.consensus.max_stake_fraction,
        ));
        let validators: Vec<(Arc<dyn Validator>, f64)> = config
            .validators
            .iter()
            .map(|v| {
                let mut validator =
                    HeuristicValidator::new(ValidatorId::new(v.id.clone()), v.specialization);
                if v.noise > 0.0 {
                    validator = validator.with_noise(v.noise, v.seed);
                }
                (Arc::new(validator) as Arc<dyn Validator>, v.initial_stake)
            })
            .collect();
        let pool = ValidatorPool::new(ledger.clone(), validators)?.with_stake_policy(StakePolicy {
            base_fraction: config.consensus.base_stake_fraction,
        });
        for kind in SignalKind::ALL {
            let routed = pool.routed(kind).len();
            if routed < config.consensus.quorum {
                return Err(DaemonError::Config(format!(
                    "{kind} signals reach {routed} validators, quorum is {}",
                    config.consensus.quorum
                )));
            }
        }

        let aggregator = Aggregator::new(
            Arc::new(InMemoryConsensusStore::new()),
            ledger.clone(),
            ConsensusPolicy {
                quorum: config.consensus.quorum,
                threshold: config.consensus.threshold,
                reward_multiplier: config.consensus.reward_multiplier,
                pending_ttl: Duration::from_secs(config.consensus.pending_ttl_secs),
            },
        )
        .with_lifecycle(lifecycle.clone());

        let bridge = Bridge::new(
            transport.clone(),
            RetryPolicy {
                max_attempts: config.bridge.max_attempts,
                delay: Duration::from_millis(config.bridge.retry_delay_ms),
            },
        )
        .with_lifecycle(lifecycle.clone());
        let registry = ResponseRegistry::new(Arc::new(RecognitionLedger::new()))
            .with_lifecycle(lifecycle.clone());
        let dispatcher = Dispatcher::new(
            Arc::new(FundingAccount::new(
                FundingPool::Treasury,
                Amount::new(config.dispatch.treasury_balance),
            )),
            Arc::new(registry),
            Arc::new(ParametricVault::with_default_policies(Amount::new(
                config.dispatch.vault_balance,
            ))),
            Arc::new(bridge),
            DispatchPolicy {
                min_accept_confidence: config.dispatch.min_accept_confidence,
                response_allocation: Amount::new(config.dispatch.response_allocation),
            },
        )
        .with_lifecycle(lifecycle.clone());

        let oracle = (!adapters.is_empty()).then(|| Arc::new(OracleNetwork::new(adapters)));

        Ok(Arc::new(Self {
            config: config.clone(),
            dedup: DedupPolicy::new(config.oracle.cell_degrees, config.oracle.time_bucket_secs),
            lifecycle,
            transport,
            ledger,
            pool: Arc::new(pool),
            aggregator: Arc::new(aggregator),
            dispatcher: Arc::new(dispatcher),
            oracle,
            tasks: Mutex::new(Vec::new()),
            signals_received: AtomicU64::new(0),
        }))
    }

    /// Spawn mailbox consumers, the eviction sweep and the oracle forwarder
    pub fn start(self: &Arc<Self>) {
        let mut tasks = Vec::new();

        let comms = self.transport.register(ComponentId::new(COMMUNICATIONS));
        tasks.push(tokio::spawn(run_communications(comms, Arc::new(LogNotifier))));
        let logistics = self.transport.register(ComponentId::new(LOGISTICS));
        tasks.push(tokio::spawn(run_logistics(logistics, Arc::new(LogPlanner))));

        let sweep_every = Duration::from_secs(self.config.consensus.sweep_interval_secs.max(1));
        let aggregator = self.aggregator.clone();
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = aggregator.sweep_expired();
                if !evicted.is_empty() {
                    info!(evicted = evicted.len(), "Expired events evicted");
                }
            }
        }));

        if let Some(oracle) = &self.oracle {
            let (tx, mut rx) = mpsc::channel::<RawSignal>(self.config.bridge.mailbox_capacity.max(1));
            oracle.start(tx);
            let pipeline = self.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(signal) = rx.recv().await {
                    if let Err(e) = pipeline.ingest(signal) {
                        warn!(error = %e, "Oracle signal rejected");
                    }
                }
            }));
        }

        info!(
            validators = self.pool.len(),
            sources = self.oracle.as_ref().map_or(0, |o| o.adapters().len()),
            "Pipeline started"
        );
        self.lock_tasks().extend(tasks);
    }

    /// Abort background tasks and stop polling
    pub fn shutdown(&self) {
        if let Some(oracle) = &self.oracle {
            oracle.stop();
        }
        for task in self.lock_tasks().drain(..) {
            task.abort();
        }
        info!("Pipeline stopped");
    }

    /// Admit a signal and, if it opens a new event, process it in the background
    pub fn ingest(self: &Arc<Self>, signal: RawSignal) -> SignalResult<Admission> {
        let admission = self.admit(&signal)?;
        if admission.starts_round() {
            let pipeline = self.clone();
            tokio::spawn(async move {
                pipeline.process(&signal).await;
            });
        }
        Ok(admission)
    }

    /// Admit and process a signal inline, returning once dispatch is done
    pub async fn handle(&self, signal: RawSignal) -> SignalResult<Handled> {
        let admission = self.admit(&signal)?;
        let outcome = if admission.starts_round() {
            self.process(&signal).await
        } else {
            None
        };
        Ok(Handled {
            event_id: signal.event_id,
            admission,
            outcome,
        })
    }

    fn admit(&self, signal: &RawSignal) -> SignalResult<Admission> {
        signal.validate()?;
        self.signals_received.fetch_add(1, Ordering::Relaxed);
        Ok(self.aggregator.admit(signal))
    }

    /// Score a newly admitted signal, submit the scores and dispatch the decision
    #[instrument(skip(self, signal), fields(event_id = %signal.event_id, kind = %signal.kind))]
    async fn process(&self, signal: &RawSignal) -> Option<DispatchOutcome> {
        let scores = self.pool.score(signal).await;
        debug!(scores = scores.len(), "Validators scored signal");

        let decision = self.aggregator.submit_all(scores)?;
        self.dispatcher.dispatch(&decision, signal).await
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            signals_received: self.signals_received.load(Ordering::Relaxed),
            consensus: self.aggregator.stats(),
            validators: self.ledger.accounts(),
            treasury: self.dispatcher.treasury().snapshot(),
            vault: self.dispatcher.vault().status(),
            responses: self.dispatcher.registry().len(),
            dead_letters: self.dispatcher.bridge().dead_letters().len(),
            oracle: self.oracle.as_ref().map(|o| o.status()),
        }
    }

    pub fn dedup(&self) -> &DedupPolicy {
        &self.dedup
    }

    pub fn lifecycle(&self) -> &LifecycleBus {
        &self.lifecycle
    }

    pub fn aggregator(&self) -> Arc<Aggregator> {
        self.aggregator.clone()
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    pub fn ledger(&self) -> Arc<StakeLedger> {
        self.ledger.clone()
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// HTTP-fed adapters for every enabled configured source
fn http_adapters(config: &AegisConfig) -> DaemonResult<Vec<SourceAdapter>> {
    let timeout = Duration::from_secs(config.oracle.request_timeout_secs);
    let dedup = DedupPolicy::new(config.oracle.cell_degrees, config.oracle.time_bucket_secs);
    let anomaly: AnomalyThresholds = config.oracle.anomaly;

    config
        .oracle
        .sources
        .iter()
        .filter(|s| s.enabled)
        .map(|source| {
            let feed = HttpFeed::new(source.url.clone(), timeout)
                .map_err(|e| DaemonError::Config(format!("source {}: {e}", source.name)))?;
            Ok(SourceAdapter::new(
                source.name.clone(),
                source.format,
                Arc::new(feed),
                Duration::from_secs(source.interval_secs.max(1)),
            )
            .with_dedup(dedup)
            .with_anomaly(anomaly)
            .with_region(config.oracle.region))
        })
        .collect()
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        for task in self.lock_tasks().drain(..) {
            task.abort();
        }
    }
}
