//! Per-kind anomaly predicates
//!
//! An observation that fails its kind's predicate is routine activity and is
//! dropped before it becomes a signal.

use crate::sources::Observation;
use aegis_types::SignalKind;
use serde::{Deserialize, Serialize};

/// Thresholds for the per-kind anomaly predicates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyThresholds {
    /// Minimum Richter magnitude
    pub seismic_floor: f64,
    /// Minimum flood state (1-4)
    pub flood_min_state: f64,
    /// Minimum fire detection confidence (0-100)
    pub fire_min_confidence: f64,
    /// Post count above which a social report is anomalous without a spike
    pub social_post_threshold: f64,
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            seismic_floor: 4.0,
            flood_min_state: 2.0,
            fire_min_confidence: 80.0,
            social_post_threshold: 100.0,
        }
    }
}

impl AnomalyThresholds {
    pub fn is_anomalous(&self, observation: &Observation) -> bool {
        match observation.kind {
            SignalKind::Seismic => observation.magnitude >= self.seismic_floor,
            SignalKind::Flood => observation.magnitude >= self.flood_min_state,
            SignalKind::Fire => observation.magnitude >= self.fire_min_confidence,
            SignalKind::Social => {
                let spike = observation
                    .metadata
                    .get("sentiment_spike")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false);
                spike || observation.magnitude > self.social_post_threshold
            }
        }
    }
}
