//! Participant recognition awarded when a response is archived

use aegis_types::{
    EventId, MissionOutcome, ParticipantId, ParticipantRole, ResponseId, ResponseRecord,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// Non-transferable recognition badges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    /// Took part in a successful response
    MissionComplete,
    /// Arrived within four hours of the alert
    FirstResponder,
    /// Donation in the top percentile of the response
    TopDonor,
    /// Validator with at least 95% accuracy
    ValidatorHero,
}

impl Badge {
    pub fn reputation_boost(&self) -> u64 {
        match self {
            Badge::MissionComplete => 25,
            Badge::FirstResponder => 50,
            Badge::TopDonor => 100,
            Badge::ValidatorHero => 75,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Badge::MissionComplete => "Mission Accomplished",
            Badge::FirstResponder => "First Responder",
            Badge::TopDonor => "Guardian Angel",
            Badge::ValidatorHero => "Oracle Validator",
        }
    }
}

/// What one participant reported at completion time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantReport {
    pub participant_id: ParticipantId,
    /// Hours between the alert and arrival on site
    #[serde(default)]
    pub arrival_hours: Option<f64>,
    #[serde(default)]
    pub donation_percentile: Option<f64>,
    /// Validation accuracy in [0, 1], for validator participants
    #[serde(default)]
    pub accuracy: Option<f64>,
}

/// Completion report recorded against a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionReport {
    pub outcome: MissionOutcome,
    #[serde(default)]
    pub reports: Vec<ParticipantReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Award {
    pub participant_id: ParticipantId,
    pub badge: Badge,
    pub response_id: ResponseId,
    pub event_id: EventId,
    pub awarded_at: DateTime<Utc>,
}

/// Accumulated reputation of one participant across responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationEntry {
    pub participant_id: ParticipantId,
    pub score: u64,
    pub awards: Vec<Award>,
}

/// Badges a participant qualifies for
pub fn eligible_badges(
    role: &ParticipantRole,
    outcome: MissionOutcome,
    report: Option<&ParticipantReport>,
) -> Vec<Badge> {
    let mut badges = Vec::new();
    if outcome == MissionOutcome::Success {
        badges.push(Badge::MissionComplete);
    }
    let Some(report) = report else {
        return badges;
    };
    if report.arrival_hours.is_some_and(|h| h <= 4.0) {
        badges.push(Badge::FirstResponder);
    }
    if report.donation_percentile.is_some_and(|p| p >= 99.0) {
        badges.push(Badge::TopDonor);
    }
    if *role == ParticipantRole::Validator && report.accuracy.is_some_and(|a| a >= 0.95) {
        badges.push(Badge::ValidatorHero);
    }
    badges
}

#[derive(Default)]
pub struct RecognitionLedger {
    entries: DashMap<ParticipantId, ReputationEntry>,
}

impl RecognitionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Award badges to every participant of `record` and accumulate their
    /// reputation. Reports for ids that never joined are ignored.
    pub fn award(&self, record: &ResponseRecord, completion: &CompletionReport) -> Vec<Award> {
        let reports: HashMap<&ParticipantId, &ParticipantReport> = completion
            .reports
            .iter()
            .map(|r| (&r.participant_id, r))
            .collect();
        for id in reports.keys() {
            if !record.participants.contains_key(*id) {
                warn!(response_id = %record.response_id, participant_id = %id, "Report for non-participant ignored");
            }
        }

        let now = Utc::now();
        let mut awards = Vec::new();
        for (id, participant) in &record.participants {
            let badges = eligible_badges(
                &participant.role,
                completion.outcome,
                reports.get(id).copied(),
            );
            if badges.is_empty() {
                continue;
            }

            let mut entry = self
                .entries
                .entry(id.clone())
                .or_insert_with(|| ReputationEntry {
                    participant_id: id.clone(),
                    score: 0,
                    awards: Vec::new(),
                });
            for badge in badges {
                let award = Award {
                    participant_id: id.clone(),
                    badge,
                    response_id: record.response_id.clone(),
                    event_id: record.event_id.clone(),
                    awarded_at: now,
                };
                entry.score += badge.reputation_boost();
                entry.awards.push(award.clone());
                awards.push(award);
            }
        }

        info!(
            response_id = %record.response_id,
            awards = awards.len(),
            "Recognition awarded"
        );
        awards
    }

    pub fn reputation(&self, participant_id: &ParticipantId) -> Option<ReputationEntry> {
        self.entries.get(participant_id).map(|e| e.value().clone())
    }

    /// All entries, highest score first
    pub fn leaderboard(&self) -> Vec<ReputationEntry> {
        let mut all: Vec<ReputationEntry> = self.entries.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.participant_id.cmp(&b.participant_id))
        });
        all
    }
}
