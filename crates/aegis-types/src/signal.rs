//! Raw observations emitted by source adapters

use crate::errors::{SignalError, SignalResult};
use crate::ids::EventId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of signal categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Seismic,
    Flood,
    Fire,
    Social,
}

impl SignalKind {
    pub const ALL: [SignalKind; 4] = [
        SignalKind::Seismic,
        SignalKind::Flood,
        SignalKind::Fire,
        SignalKind::Social,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Seismic => "seismic",
            SignalKind::Flood => "flood",
            SignalKind::Fire => "fire",
            SignalKind::Social => "social",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalKind {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "seismic" | "earthquake" => Ok(SignalKind::Seismic),
            "flood" => Ok(SignalKind::Flood),
            "fire" | "wildfire" => Ok(SignalKind::Fire),
            "social" | "social_media" => Ok(SignalKind::Social),
            other => Err(SignalError::UnknownKind(other.to_string())),
        }
    }
}

/// Alert level on a 1..=5 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
    Emergency = 5,
}

impl AlertLevel {
    pub fn value(&self) -> u8 {
        *self as u8
    }

    /// Map a kind-specific intensity onto the shared alert scale.
    ///
    /// Seismic uses Richter magnitude, fire uses detection confidence
    /// (0-100), flood uses the reported flood state (1-4). Social signals
    /// carry no physical intensity and always rate medium.
    pub fn from_intensity(kind: SignalKind, magnitude: f64) -> Self {
        match kind {
            SignalKind::Seismic => {
                if magnitude >= 7.0 {
                    AlertLevel::Emergency
                } else if magnitude >= 6.0 {
                    AlertLevel::Critical
                } else if magnitude >= 5.0 {
                    AlertLevel::High
                } else if magnitude >= 4.0 {
                    AlertLevel::Medium
                } else {
                    AlertLevel::Low
                }
            }
            SignalKind::Fire => {
                if magnitude >= 90.0 {
                    AlertLevel::Critical
                } else if magnitude >= 70.0 {
                    AlertLevel::High
                } else if magnitude >= 50.0 {
                    AlertLevel::Medium
                } else {
                    AlertLevel::Low
                }
            }
            SignalKind::Flood => {
                if magnitude >= 4.0 {
                    AlertLevel::Critical
                } else if magnitude >= 3.0 {
                    AlertLevel::High
                } else if magnitude >= 2.0 {
                    AlertLevel::Medium
                } else {
                    AlertLevel::Low
                }
            }
            SignalKind::Social => AlertLevel::Medium,
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AlertLevel::Low => "low",
            AlertLevel::Medium => "medium",
            AlertLevel::High => "high",
            AlertLevel::Critical => "critical",
            AlertLevel::Emergency => "emergency",
        };
        f.write_str(label)
    }
}

/// WGS84 coordinate pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn validate(&self) -> SignalResult<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(SignalError::InvalidLatitude(self.latitude));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(SignalError::InvalidLongitude(self.longitude));
        }
        Ok(())
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.latitude, self.longitude)
    }
}

/// One un-validated observation of a physical event.
///
/// Created by an adapter (or the push endpoint) and never mutated after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSignal {
    /// Content-derived id shared by all signals describing the same event
    pub event_id: EventId,
    /// Signal category
    pub kind: SignalKind,
    /// Where the event happened
    pub location: GeoPoint,
    /// Kind-specific intensity
    #[serde(alias = "magnitude_or_severity")]
    pub magnitude: f64,
    /// When the physical event happened (not ingestion time)
    pub observed_at: DateTime<Utc>,
    /// Provenance tag
    pub source: String,
    /// Reliability of the source in [0, 1]
    pub source_confidence: f64,
    /// Details kept from the native payload
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl RawSignal {
    pub fn new(
        event_id: EventId,
        kind: SignalKind,
        location: GeoPoint,
        magnitude: f64,
        observed_at: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            event_id,
            kind,
            location,
            magnitude,
            observed_at,
            source: source.into(),
            source_confidence: 0.5,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_source_confidence(mut self, confidence: f64) -> Self {
        self.source_confidence = confidence;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Alert level derived from kind and magnitude
    pub fn severity(&self) -> AlertLevel {
        AlertLevel::from_intensity(self.kind, self.magnitude)
    }

    /// Structural validation applied at every ingress point
    pub fn validate(&self) -> SignalResult<()> {
        self.location.validate()?;
        if !self.magnitude.is_finite() || self.magnitude < 0.0 {
            return Err(SignalError::InvalidMagnitude(self.magnitude));
        }
        if !(0.0..=1.0).contains(&self.source_confidence) {
            return Err(SignalError::InvalidConfidence(self.source_confidence));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seismic(magnitude: f64) -> RawSignal {
        RawSignal::new(
            EventId::new("evt_test"),
            SignalKind::Seismic,
            GeoPoint::new(-6.8, 107.1),
            magnitude,
            Utc::now(),
            "bmkg_autogempa",
        )
        .with_source_confidence(0.95)
    }

    #[test]
    fn seismic_severity_bands() {
        assert_eq!(seismic(3.9).severity(), AlertLevel::Low);
        assert_eq!(seismic(4.0).severity(), AlertLevel::Medium);
        assert_eq!(seismic(5.5).severity(), AlertLevel::High);
        assert_eq!(seismic(6.2).severity(), AlertLevel::Critical);
        assert_eq!(seismic(7.0).severity(), AlertLevel::Emergency);
    }

    #[test]
    fn fire_and_flood_severity_bands() {
        assert_eq!(AlertLevel::from_intensity(SignalKind::Fire, 95.0), AlertLevel::Critical);
        assert_eq!(AlertLevel::from_intensity(SignalKind::Fire, 40.0), AlertLevel::Low);
        assert_eq!(AlertLevel::from_intensity(SignalKind::Flood, 4.0), AlertLevel::Critical);
        assert_eq!(AlertLevel::from_intensity(SignalKind::Flood, 2.0), AlertLevel::Medium);
        assert_eq!(AlertLevel::from_intensity(SignalKind::Social, 500.0), AlertLevel::Medium);
    }

    #[test]
    fn kind_parses_aliases() {
        assert_eq!("earthquake".parse::<SignalKind>().unwrap(), SignalKind::Seismic);
        assert_eq!("FLOOD".parse::<SignalKind>().unwrap(), SignalKind::Flood);
        assert!(matches!(
            "tornado".parse::<SignalKind>(),
            Err(SignalError::UnknownKind(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_coordinates_and_confidence() {
        let mut signal = seismic(6.2);
        assert!(signal.validate().is_ok());

        signal.location = GeoPoint::new(91.0, 0.0);
        assert_eq!(signal.validate(), Err(SignalError::InvalidLatitude(91.0)));

        let signal = seismic(6.2).with_source_confidence(1.5);
        assert_eq!(signal.validate(), Err(SignalError::InvalidConfidence(1.5)));
    }

    #[test]
    fn accepts_magnitude_or_severity_alias() {
        let json = serde_json::json!({
            "event_id": "evt_alias",
            "kind": "flood",
            "location": { "latitude": -6.2, "longitude": 106.8 },
            "magnitude_or_severity": 3.0,
            "observed_at": "2024-01-01T00:00:00Z",
            "source": "petabencana",
            "source_confidence": 0.85
        });
        let signal: RawSignal = serde_json::from_value(json).unwrap();
        assert_eq!(signal.magnitude, 3.0);
        assert_eq!(signal.severity(), AlertLevel::High);
    }
}
