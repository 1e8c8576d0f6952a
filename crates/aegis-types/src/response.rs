//! Response records ("Event DAOs") and parametric payouts
//!
//! A response record holds the funded treasury for one confirmed event,
//! its participants and their contributions. It is a data structure; the
//! dispatch crate owns all mutation.

use crate::ids::{EventId, ParticipantId, PolicyId, ResponseId};
use crate::signal::{AlertLevel, GeoPoint, SignalKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Monetary amount in whole currency units
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(pub u64);

impl Amount {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// Lifecycle of a response record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// Created with its initial allocation
    #[default]
    Active,
    /// Received a parametric payout on top of the allocation
    Funded,
    /// Treasury fully disbursed
    Completed,
    /// Completion recorded; read-only from here on
    Archived,
}

/// Role a participant plays in a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Volunteer,
    Ngo,
    Donor,
    Validator,
    Coordinator,
}

/// A participant and its contribution metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub role: ParticipantRole,
    /// Funds donated into the response treasury
    pub contributed: Amount,
    /// Funds disbursed to this participant from the response treasury
    pub received: Amount,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    pub fn new(id: ParticipantId, role: ParticipantRole) -> Self {
        Self {
            id,
            role,
            contributed: Amount::zero(),
            received: Amount::zero(),
            joined_at: Utc::now(),
        }
    }
}

/// How a response mission ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionOutcome {
    Success,
    Partial,
    Failed,
}

/// The funded response artifact created for a confirmed event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub response_id: ResponseId,
    pub event_id: EventId,
    pub kind: SignalKind,
    pub location: GeoPoint,
    pub severity: AlertLevel,
    /// Remaining funds
    pub treasury_balance: Amount,
    /// Total ever credited (allocation plus payouts)
    pub total_funding: Amount,
    pub status: ResponseStatus,
    pub participants: BTreeMap<ParticipantId, Participant>,
    pub created_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
    pub outcome: Option<MissionOutcome>,
}

impl ResponseRecord {
    pub fn new(
        event_id: EventId,
        kind: SignalKind,
        location: GeoPoint,
        severity: AlertLevel,
        allocation: Amount,
    ) -> Self {
        Self {
            response_id: ResponseId::for_event(&event_id),
            event_id,
            kind,
            location,
            severity,
            treasury_balance: allocation,
            total_funding: allocation,
            status: ResponseStatus::Active,
            participants: BTreeMap::new(),
            created_at: Utc::now(),
            archived_at: None,
            outcome: None,
        }
    }

    pub fn is_archived(&self) -> bool {
        self.status == ResponseStatus::Archived
    }
}

/// A parametric payout released from the insurance vault
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutRecord {
    pub event_id: EventId,
    pub policy_id: PolicyId,
    pub amount: Amount,
    pub executed_at: DateTime<Utc>,
    pub recipient: ResponseId,
}
