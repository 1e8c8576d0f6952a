use aegis_types::GeoPoint;
use serde::{Deserialize, Serialize};

/// Inclusive lat/lon bounding box used to keep only in-region reports
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Indonesian archipelago
    pub fn indonesia() -> Self {
        Self {
            min_lat: -11.0,
            max_lat: 6.0,
            min_lon: 95.0,
            max_lon: 141.0,
        }
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.latitude)
            && (self.min_lon..=self.max_lon).contains(&point.longitude)
    }
}

/// `true` when no region is configured or the point lies inside it
pub fn in_region(region: Option<&BoundingBox>, point: &GeoPoint) -> bool {
    region.map_or(true, |bbox| bbox.contains(point))
}
