//! Validator opinions and the aggregated consensus outcome

use crate::ids::{EventId, ValidatorId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One validator's opinion on one event.
///
/// Created once per (validator, event) pair and immutable after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationScore {
    pub validator_id: ValidatorId,
    pub event_id: EventId,
    /// `true` confirms the event, `false` calls it a false alarm
    pub prediction: bool,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Balance committed behind this prediction
    pub stake: f64,
    pub reasoning: String,
    pub scored_at: DateTime<Utc>,
}

impl ValidationScore {
    pub fn new(
        validator_id: ValidatorId,
        event_id: EventId,
        prediction: bool,
        confidence: f64,
        stake: f64,
    ) -> Self {
        Self {
            validator_id,
            event_id,
            prediction,
            confidence,
            stake,
            reasoning: String::new(),
            scored_at: Utc::now(),
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    /// Voting weight: stake scaled by confidence
    pub fn weight(&self) -> f64 {
        self.stake * self.confidence
    }
}

/// Aggregated outcome for one event. Terminal once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusDecision {
    pub event_id: EventId,
    /// `true` = accept (event confirmed)
    pub decision: bool,
    /// Stake-and-confidence weighted average confidence
    pub confidence: f64,
    /// `yes_weight / (yes_weight + no_weight)`, 0 when both are zero
    pub positive_ratio: f64,
    pub yes_weight: f64,
    pub no_weight: f64,
    pub participant_count: usize,
    /// Validators whose scores formed this decision
    pub participants: Vec<ValidatorId>,
    pub decided_at: DateTime<Utc>,
}

impl ConsensusDecision {
    pub fn is_accept(&self) -> bool {
        self.decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_is_stake_times_confidence() {
        let score = ValidationScore::new(
            ValidatorId::new("v1"),
            EventId::new("evt"),
            true,
            0.9,
            1000.0,
        );
        assert!((score.weight() - 900.0).abs() < 1e-9);
    }
}
