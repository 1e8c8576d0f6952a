//! Response registry: one record per confirmed event
//!
//! ```text
//! ACTIVE --payout credited--> FUNDED
//!   |                           |
//!   +----treasury disbursed-----+--> COMPLETED
//!   |                           |         |
//!   +------completion recorded--+---------+--> ARCHIVED
//! ```

use crate::error::{DispatchError, DispatchResult};
use crate::recognition::{Award, CompletionReport, RecognitionLedger};
use aegis_bridge::LifecycleBus;
use aegis_types::{
    Amount, LifecycleEvent, MissionOutcome, Participant, ParticipantId, ParticipantRole, ResponseId,
    ResponseRecord, ResponseStatus,
};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Result of recording a completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archival {
    pub response_id: ResponseId,
    pub outcome: MissionOutcome,
    pub awards: Vec<Award>,
}

pub struct ResponseRegistry {
    records: DashMap<ResponseId, ResponseRecord>,
    recognition: Arc<RecognitionLedger>,
    lifecycle: Option<LifecycleBus>,
}

impl ResponseRegistry {
    pub fn new(recognition: Arc<RecognitionLedger>) -> Self {
        Self {
            records: DashMap::new(),
            recognition,
            lifecycle: None,
        }
    }

    pub fn with_lifecycle(mut self, lifecycle: LifecycleBus) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn recognition(&self) -> Arc<RecognitionLedger> {
        self.recognition.clone()
    }

    /// Insert a freshly funded record; at most one per response id
    pub fn insert(&self, record: ResponseRecord) -> DispatchResult<ResponseId> {
        match self.records.entry(record.response_id.clone()) {
            Entry::Occupied(entry) => Err(DispatchError::DuplicateResponse(entry.key().clone())),
            Entry::Vacant(entry) => {
                let id = record.response_id.clone();
                entry.insert(record);
                Ok(id)
            }
        }
    }

    pub fn get(&self, response_id: &ResponseId) -> Option<ResponseRecord> {
        self.records.get(response_id).map(|r| r.value().clone())
    }

    pub fn contains(&self, response_id: &ResponseId) -> bool {
        self.records.contains_key(response_id)
    }

    /// All records, newest first
    pub fn list(&self) -> Vec<ResponseRecord> {
        let mut all: Vec<ResponseRecord> = self.records.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Credit a parametric payout; the record becomes `Funded`
    pub fn credit_payout(&self, response_id: &ResponseId, amount: Amount) -> DispatchResult<()> {
        let mut record = self.open_record(response_id)?;
        record.treasury_balance = record.treasury_balance.saturating_add(amount);
        record.total_funding = record.total_funding.saturating_add(amount);
        record.status = ResponseStatus::Funded;
        Ok(())
    }

    /// Add a participant, optionally donating into the response treasury
    pub fn join(
        &self,
        response_id: &ResponseId,
        participant_id: ParticipantId,
        role: ParticipantRole,
        contribution: Amount,
    ) -> DispatchResult<Participant> {
        let mut record = self.open_record(response_id)?;
        if record.participants.contains_key(&participant_id) {
            return Err(DispatchError::DuplicateParticipant {
                response_id: response_id.clone(),
                participant_id,
            });
        }

        let mut participant = Participant::new(participant_id.clone(), role);
        participant.contributed = contribution;
        record.treasury_balance = record.treasury_balance.saturating_add(contribution);
        record.total_funding = record.total_funding.saturating_add(contribution);
        // Fresh donations reopen a drained treasury.
        if record.status == ResponseStatus::Completed && !contribution.is_zero() {
            record.status = ResponseStatus::Active;
        }
        record.participants.insert(participant_id, participant.clone());

        info!(
            response_id = %response_id,
            participant_id = %participant.id,
            role = ?participant.role,
            contribution = %contribution,
            "Participant joined response"
        );
        Ok(participant)
    }

    /// Pay `amount` from the response treasury to a participant.
    ///
    /// A disbursement that empties the treasury completes the response.
    pub fn disburse(
        &self,
        response_id: &ResponseId,
        participant_id: &ParticipantId,
        amount: Amount,
    ) -> DispatchResult<ResponseRecord> {
        if amount.is_zero() {
            return Err(DispatchError::InvalidAmount(
                "disbursement must be positive".to_string(),
            ));
        }
        let mut record = self.open_record(response_id)?;
        if record.status == ResponseStatus::Completed {
            return Err(DispatchError::ResponseClosed {
                response_id: response_id.clone(),
                status: record.status,
            });
        }
        if !record.participants.contains_key(participant_id) {
            return Err(DispatchError::UnknownParticipant {
                response_id: response_id.clone(),
                participant_id: participant_id.clone(),
            });
        }

        let available = record.treasury_balance;
        let remaining = available.checked_sub(amount).ok_or_else(|| {
            DispatchError::InvalidAmount(format!(
                "disbursement {amount} exceeds treasury {available}"
            ))
        })?;
        record.treasury_balance = remaining;
        if let Some(participant) = record.participants.get_mut(participant_id) {
            participant.received = participant.received.saturating_add(amount);
        }
        if remaining.is_zero() {
            record.status = ResponseStatus::Completed;
            info!(response_id = %response_id, "Response treasury fully disbursed");
        }
        Ok(record.clone())
    }

    /// Record mission completion, archive the record and award recognition
    pub fn complete(
        &self,
        response_id: &ResponseId,
        completion: &CompletionReport,
    ) -> DispatchResult<Archival> {
        let snapshot = {
            let mut record = self.open_record(response_id)?;
            record.status = ResponseStatus::Archived;
            record.archived_at = Some(Utc::now());
            record.outcome = Some(completion.outcome);
            record.clone()
        };

        let awards = self.recognition.award(&snapshot, completion);
        info!(
            response_id = %response_id,
            outcome = ?completion.outcome,
            awards = awards.len(),
            "Response archived"
        );
        if let Some(lifecycle) = &self.lifecycle {
            lifecycle.publish(LifecycleEvent::ResponseArchived {
                response_id: response_id.clone(),
                outcome: completion.outcome,
                badges_awarded: awards.len(),
            });
        }
        Ok(Archival {
            response_id: response_id.clone(),
            outcome: completion.outcome,
            awards,
        })
    }

    /// Lock a record that still accepts changes
    fn open_record(
        &self,
        response_id: &ResponseId,
    ) -> DispatchResult<RefMut<'_, ResponseId, ResponseRecord>> {
        let record = self
            .records
            .get_mut(response_id)
            .ok_or_else(|| DispatchError::UnknownResponse(response_id.clone()))?;
        if record.is_archived() {
            return Err(DispatchError::ResponseClosed {
                response_id: response_id.clone(),
                status: record.status,
            });
        }
        Ok(record)
    }
}
