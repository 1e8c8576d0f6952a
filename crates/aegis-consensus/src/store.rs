//! Score store with a one-shot decision guard
//!
//! The store is the single source of truth for per-event consensus state.
//! All transitions on one event happen under that event's entry lock:
//!
//! ```text
//! COLLECTING --try_commit_decision--> DECIDED
//!      |
//!      +--------evict_expired-------> EVICTED
//! ```
//!
//! Both terminal states are remembered, so late scores and repeat signals
//! for a closed event never reopen it.

use crate::error::{ConsensusError, ConsensusResult};
use aegis_types::{ConsensusDecision, EventId, RawSignal, SignalKind, ValidationScore};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Consensus state of one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventState {
    Collecting,
    Decided,
    Evicted,
}

/// Result of admitting a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Admission {
    /// First signal for this event: fan out to validators
    New,
    /// Event already collecting; recorded as corroboration only
    Corroborated,
    /// Event already decided; recorded as corroboration only
    AlreadyDecided,
    /// Event was evicted; never reopened
    Evicted,
}

impl Admission {
    pub fn starts_round(&self) -> bool {
        matches!(self, Admission::New)
    }
}

/// What `admit` did with one signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admitted {
    pub admission: Admission,
    /// True the first time this source reports the event
    pub first_report: bool,
}

/// Result of recording one score
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Stored; quorum not reached yet
    Pending { scores: usize },
    /// Stored and quorum reached; carries the scores to decide over
    QuorumReached { scores: Vec<ValidationScore> },
    /// Event already closed; kept for audit only
    Late { state: EventState },
}

/// Result of the one-shot commit
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// This caller won the commit. `stragglers` are scores that landed
    /// after the decision's snapshot and are not part of it.
    Committed { stragglers: Vec<ValidationScore> },
    /// Another caller committed first, or the event was evicted
    AlreadyClosed,
}

/// An evicted event and the scores whose stakes must be returned
#[derive(Debug, Clone, PartialEq)]
pub struct EvictedEvent {
    pub event_id: EventId,
    pub scores: Vec<ValidationScore>,
}

/// Read-only view of one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub event_id: EventId,
    pub kind: SignalKind,
    pub state: EventState,
    pub signal: RawSignal,
    /// Reports per source, first one included. Repeat polls only bump a count.
    pub sources: BTreeMap<String, u64>,
    pub scores: Vec<ValidationScore>,
    /// Scores that arrived after the event closed
    pub late_scores: Vec<ValidationScore>,
    pub decision: Option<ConsensusDecision>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Storage boundary for consensus state.
///
/// Implementations must make `record_score`, `try_commit_decision` and
/// `evict_expired` atomic per event.
pub trait ConsensusStore: Send + Sync {
    /// Open a new event or record corroboration for a known one
    fn admit(&self, signal: &RawSignal) -> Admitted;

    /// Append a score; rejects a second score from the same validator
    fn record_score(&self, score: ValidationScore, quorum: usize)
        -> ConsensusResult<RecordOutcome>;

    /// Scores currently accepted for an event, in arrival order
    fn scores(&self, event_id: &EventId) -> Vec<ValidationScore>;

    /// Transition COLLECTING -> DECIDED exactly once
    fn try_commit_decision(&self, decision: ConsensusDecision) -> CommitOutcome;

    fn decision(&self, event_id: &EventId) -> Option<ConsensusDecision>;

    /// Evict events collecting since before `cutoff`
    fn evict_expired(&self, cutoff: DateTime<Utc>) -> Vec<EvictedEvent>;

    fn snapshot(&self, event_id: &EventId) -> Option<EventSnapshot>;

    fn snapshots(&self) -> Vec<EventSnapshot>;
}

/// In-process store backed by a `DashMap`
#[derive(Default)]
pub struct InMemoryConsensusStore {
    events: DashMap<EventId, EventSnapshot>,
}

impl InMemoryConsensusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConsensusStore for InMemoryConsensusStore {
    fn admit(&self, signal: &RawSignal) -> Admitted {
        match self.events.entry(signal.event_id.clone()) {
            Entry::Occupied(mut entry) => {
                let event = entry.get_mut();
                let reports = event.sources.entry(signal.source.clone()).or_insert(0);
                *reports += 1;
                let admission = match event.state {
                    EventState::Collecting => Admission::Corroborated,
                    EventState::Decided => Admission::AlreadyDecided,
                    EventState::Evicted => Admission::Evicted,
                };
                Admitted {
                    admission,
                    first_report: *reports == 1,
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(EventSnapshot {
                    event_id: signal.event_id.clone(),
                    kind: signal.kind,
                    state: EventState::Collecting,
                    signal: signal.clone(),
                    sources: BTreeMap::from([(signal.source.clone(), 1)]),
                    scores: Vec::new(),
                    late_scores: Vec::new(),
                    decision: None,
                    opened_at: Utc::now(),
                    closed_at: None,
                });
                Admitted {
                    admission: Admission::New,
                    first_report: true,
                }
            }
        }
    }

    fn record_score(
        &self,
        score: ValidationScore,
        quorum: usize,
    ) -> ConsensusResult<RecordOutcome> {
        let mut event = self
            .events
            .get_mut(&score.event_id)
            .ok_or_else(|| ConsensusError::UnknownEvent(score.event_id.clone()))?;

        let duplicate = event
            .scores
            .iter()
            .chain(event.late_scores.iter())
            .any(|s| s.validator_id == score.validator_id);
        if duplicate {
            return Err(ConsensusError::DuplicateScore {
                validator_id: score.validator_id,
                event_id: score.event_id,
            });
        }

        if event.state != EventState::Collecting {
            let state = event.state;
            event.late_scores.push(score);
            return Ok(RecordOutcome::Late { state });
        }

        event.scores.push(score);
        let count = event.scores.len();
        if count >= quorum {
            Ok(RecordOutcome::QuorumReached {
                scores: event.scores.clone(),
            })
        } else {
            Ok(RecordOutcome::Pending { scores: count })
        }
    }

    fn scores(&self, event_id: &EventId) -> Vec<ValidationScore> {
        self.events
            .get(event_id)
            .map(|event| event.scores.clone())
            .unwrap_or_default()
    }

    fn try_commit_decision(&self, decision: ConsensusDecision) -> CommitOutcome {
        let Some(mut event) = self.events.get_mut(&decision.event_id) else {
            return CommitOutcome::AlreadyClosed;
        };
        if event.state != EventState::Collecting {
            return CommitOutcome::AlreadyClosed;
        }

        let (kept, stragglers): (Vec<_>, Vec<_>) = std::mem::take(&mut event.scores)
            .into_iter()
            .partition(|s| decision.participants.contains(&s.validator_id));
        event.scores = kept;
        event.late_scores.extend(stragglers.iter().cloned());
        event.state = EventState::Decided;
        event.closed_at = Some(decision.decided_at);
        event.decision = Some(decision);

        CommitOutcome::Committed { stragglers }
    }

    fn decision(&self, event_id: &EventId) -> Option<ConsensusDecision> {
        self.events
            .get(event_id)
            .and_then(|event| event.decision.clone())
    }

    fn evict_expired(&self, cutoff: DateTime<Utc>) -> Vec<EvictedEvent> {
        let mut evicted = Vec::new();
        for mut event in self.events.iter_mut() {
            if event.state == EventState::Collecting && event.opened_at < cutoff {
                event.state = EventState::Evicted;
                event.closed_at = Some(Utc::now());
                evicted.push(EvictedEvent {
                    event_id: event.event_id.clone(),
                    scores: event.scores.clone(),
                });
            }
        }
        evicted
    }

    fn snapshot(&self, event_id: &EventId) -> Option<EventSnapshot> {
        self.events.get(event_id).map(|event| event.clone())
    }

    fn snapshots(&self) -> Vec<EventSnapshot> {
        let mut all: Vec<EventSnapshot> = self.events.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.opened_at.cmp(&b.opened_at));
        all
    }
}
