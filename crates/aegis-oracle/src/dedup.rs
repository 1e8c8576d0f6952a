//! Content-derived event ids
//!
//! Two signals describe the same physical event when they share kind,
//! spatial cell and time bucket. The id is a hash of exactly those three
//! things, so any source reporting the same event lands on the same id.

use aegis_types::{EventId, GeoPoint, SignalKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Grid used to bucket signals into events
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DedupPolicy {
    /// Spatial cell edge in degrees
    pub cell_degrees: f64,
    /// Time bucket width in seconds
    pub time_bucket_secs: i64,
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self {
            cell_degrees: 0.1,
            time_bucket_secs: 600,
        }
    }
}

impl DedupPolicy {
    pub fn new(cell_degrees: f64, time_bucket_secs: i64) -> Self {
        Self {
            cell_degrees,
            time_bucket_secs,
        }
    }

    /// Derive the event id for a (kind, location, time) triple.
    pub fn event_id(
        &self,
        kind: SignalKind,
        location: &GeoPoint,
        observed_at: DateTime<Utc>,
    ) -> EventId {
        let cell = if self.cell_degrees > 0.0 {
            self.cell_degrees
        } else {
            0.1
        };
        let bucket = self.time_bucket_secs.max(1);

        let lat_cell = (location.latitude / cell).floor() as i64;
        let lon_cell = (location.longitude / cell).floor() as i64;
        let time_cell = observed_at.timestamp().div_euclid(bucket);

        let mut hasher = blake3::Hasher::new();
        hasher.update(b"aegis-event-v1:");
        hasher.update(kind.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(&lat_cell.to_le_bytes());
        hasher.update(b"|");
        hasher.update(&lon_cell.to_le_bytes());
        hasher.update(b"|");
        hasher.update(&time_cell.to_le_bytes());

        let hex = hasher.finalize().to_hex();
        EventId::new(format!("evt_{}", &hex.as_str()[..12]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    #[test]
    fn same_cell_and_bucket_share_an_id() {
        let policy = DedupPolicy::default();
        // BMKG and USGS report the same quake with slightly different fixes
        let bmkg = policy.event_id(SignalKind::Seismic, &GeoPoint::new(-6.81, 107.14), at(1_700_000_100));
        let usgs = policy.event_id(SignalKind::Seismic, &GeoPoint::new(-6.83, 107.17), at(1_700_000_390));
        assert_eq!(bmkg, usgs);
        assert!(bmkg.as_str().starts_with("evt_"));
        assert_eq!(bmkg.as_str().len(), 16);
    }

    #[test]
    fn kind_cell_and_bucket_each_split_ids() {
        let policy = DedupPolicy::default();
        let here = GeoPoint::new(-6.81, 107.14);
        let base = policy.event_id(SignalKind::Seismic, &here, at(1_700_000_100));

        assert_ne!(base, policy.event_id(SignalKind::Flood, &here, at(1_700_000_100)));
        assert_ne!(
            base,
            policy.event_id(SignalKind::Seismic, &GeoPoint::new(-6.95, 107.14), at(1_700_000_100))
        );
        assert_ne!(base, policy.event_id(SignalKind::Seismic, &here, at(1_700_000_700)));
    }

    #[test]
    fn negative_coordinates_floor_not_truncate() {
        let policy = DedupPolicy::default();
        let t = at(1_700_000_000);
        // -0.05 and 0.05 straddle zero and must not collapse into one cell
        assert_ne!(
            policy.event_id(SignalKind::Fire, &GeoPoint::new(-0.05, 100.0), t),
            policy.event_id(SignalKind::Fire, &GeoPoint::new(0.05, 100.0), t)
        );
    }
}
