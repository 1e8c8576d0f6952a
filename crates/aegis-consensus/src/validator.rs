//! Validators: independent scoring units
//!
//! A validator only forms an opinion (`prediction`, `confidence`,
//! `reasoning`). Stake sizing and balance bookkeeping belong to the pool.

use crate::error::{ConsensusError, ConsensusResult};
use aegis_types::{AlertLevel, RawSignal, SignalKind, ValidatorId};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

/// A validator's opinion on one signal
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub prediction: bool,
    pub confidence: f64,
    pub reasoning: String,
}

/// Scoring unit. Errors count as abstention.
#[async_trait]
pub trait Validator: Send + Sync {
    fn id(&self) -> &ValidatorId;

    /// Routing predicate, evaluated once when the pool is built
    fn handles(&self, kind: SignalKind) -> bool;

    async fn assess(&self, signal: &RawSignal) -> ConsensusResult<Assessment>;
}

/// Built-in heuristics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialization {
    /// Seismic only: trusts the source, confirms from high severity up
    EarthquakeSpecialist,
    /// Every kind: confirms when the source is reliable
    MultiModal,
    /// Every kind, but only social evidence earns a confirmation
    SocialSignal,
    /// Every kind except seismic: conservative default model
    General,
}

impl Specialization {
    pub fn handles(&self, kind: SignalKind) -> bool {
        match self {
            Specialization::EarthquakeSpecialist => kind == SignalKind::Seismic,
            Specialization::MultiModal | Specialization::SocialSignal => true,
            Specialization::General => kind != SignalKind::Seismic,
        }
    }

    /// Deterministic part of the assessment
    pub fn assess(&self, signal: &RawSignal) -> Assessment {
        let source_conf = signal.source_confidence;
        match self {
            Specialization::EarthquakeSpecialist => Assessment {
                prediction: signal.severity() >= AlertLevel::High,
                confidence: 0.9 * source_conf,
                reasoning: format!(
                    "Earthquake specialist: magnitude {:.1} rated {}",
                    signal.magnitude,
                    signal.severity()
                ),
            },
            Specialization::MultiModal => Assessment {
                prediction: source_conf > 0.7,
                confidence: 0.75 * source_conf,
                reasoning: format!("Multi-modal analysis of {} report", signal.source),
            },
            Specialization::SocialSignal if signal.kind == SignalKind::Social => Assessment {
                prediction: source_conf > 0.5,
                confidence: 0.6 * source_conf,
                reasoning: "Social media sentiment and keyword analysis".to_string(),
            },
            Specialization::SocialSignal => Assessment {
                prediction: false,
                confidence: 0.3,
                reasoning: "No social media signals available".to_string(),
            },
            Specialization::General => Assessment {
                prediction: source_conf > 0.6,
                confidence: 0.5 * source_conf,
                reasoning: "General validation model".to_string(),
            },
        }
    }
}

impl fmt::Display for Specialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Specialization::EarthquakeSpecialist => "earthquake_specialist",
            Specialization::MultiModal => "multi_modal",
            Specialization::SocialSignal => "social_signal",
            Specialization::General => "general",
        };
        f.write_str(name)
    }
}

/// Validator driven by a [`Specialization`] with optional confidence noise
pub struct HeuristicValidator {
    id: ValidatorId,
    specialization: Specialization,
    /// Half-width of the uniform noise added to confidence
    noise: f64,
    rng: Mutex<StdRng>,
}

impl HeuristicValidator {
    pub fn new(id: ValidatorId, specialization: Specialization) -> Self {
        Self {
            id,
            specialization,
            noise: 0.0,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Add `±noise` uniform jitter to confidence, seeded for reproducibility
    pub fn with_noise(mut self, noise: f64, seed: Option<u64>) -> Self {
        self.noise = noise.abs();
        self.rng = Mutex::new(match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        });
        self
    }

    pub fn specialization(&self) -> Specialization {
        self.specialization
    }

    fn jitter(&self) -> f64 {
        if self.noise == 0.0 {
            return 0.0;
        }
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(-self.noise..=self.noise),
            Err(_) => 0.0,
        }
    }
}

#[async_trait]
impl Validator for HeuristicValidator {
    fn id(&self) -> &ValidatorId {
        &self.id
    }

    fn handles(&self, kind: SignalKind) -> bool {
        self.specialization.handles(kind)
    }

    async fn assess(&self, signal: &RawSignal) -> ConsensusResult<Assessment> {
        if !self.handles(signal.kind) {
            return Err(ConsensusError::NotRouted {
                validator_id: self.id.clone(),
                kind: signal.kind,
            });
        }

        let mut assessment = self.specialization.assess(signal);
        assessment.confidence = (assessment.confidence + self.jitter()).clamp(0.0, 1.0);
        Ok(assessment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_types::{EventId, GeoPoint};
    use chrono::Utc;

    fn signal(kind: SignalKind, magnitude: f64, source_conf: f64) -> RawSignal {
        RawSignal::new(
            EventId::new("evt_test"),
            kind,
            GeoPoint::new(-6.8, 107.1),
            magnitude,
            Utc::now(),
            "test",
        )
        .with_source_confidence(source_conf)
    }

    #[test]
    fn routing_covers_every_kind_with_three_validators() {
        let all = [
            Specialization::EarthquakeSpecialist,
            Specialization::MultiModal,
            Specialization::SocialSignal,
            Specialization::General,
        ];
        for kind in SignalKind::ALL {
            let routed = all.iter().filter(|s| s.handles(kind)).count();
            assert_eq!(routed, 3, "{kind} must reach quorum");
        }
    }

    #[test]
    fn earthquake_specialist_confirms_from_high_severity() {
        let spec = Specialization::EarthquakeSpecialist;
        let strong = spec.assess(&signal(SignalKind::Seismic, 6.2, 0.95));
        assert!(strong.prediction);
        assert!((strong.confidence - 0.855).abs() < 1e-9);

        let weak = spec.assess(&signal(SignalKind::Seismic, 4.5, 0.95));
        assert!(!weak.prediction);
    }

    #[test]
    fn social_analyzer_denies_non_social_evidence() {
        let spec = Specialization::SocialSignal;
        let seismic = spec.assess(&signal(SignalKind::Seismic, 6.2, 0.95));
        assert!(!seismic.prediction);
        assert_eq!(seismic.confidence, 0.3);

        let social = spec.assess(&signal(SignalKind::Social, 150.0, 0.8));
        assert!(social.prediction);
        assert!((social.confidence - 0.48).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unrouted_kind_is_an_error() {
        let validator =
            HeuristicValidator::new(ValidatorId::new("earthquake_validator"), Specialization::EarthquakeSpecialist);
        let err = validator
            .assess(&signal(SignalKind::Flood, 3.0, 0.85))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsensusError::NotRouted { .. }));
    }

    #[tokio::test]
    async fn seeded_noise_is_reproducible_and_clamped() {
        let make = || {
            HeuristicValidator::new(ValidatorId::new("multimodal_validator"), Specialization::MultiModal)
                .with_noise(0.1, Some(7))
        };
        let a = make();
        let b = make();
        let s = signal(SignalKind::Fire, 95.0, 1.0);
        for _ in 0..5 {
            let x = a.assess(&s).await.unwrap().confidence;
            let y = b.assess(&s).await.unwrap().confidence;
            assert_eq!(x, y);
            assert!((0.65..=0.85).contains(&x));
        }
    }
}
