//! USGS earthquake GeoJSON summary feed

use super::{Observation, ParseContext};
use crate::error::ParseResult;
use crate::region::in_region;
use aegis_types::{GeoPoint, SignalKind};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

const USGS_CONFIDENCE: f64 = 0.9;

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    id: Option<String>,
    properties: Properties,
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Properties {
    mag: Option<f64>,
    /// Milliseconds since the epoch
    time: Option<i64>,
    place: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    /// `[longitude, latitude, depth_km]`
    coordinates: Vec<f64>,
}

pub(super) fn parse(body: &str, ctx: &ParseContext) -> ParseResult<Option<Observation>> {
    let collection: FeatureCollection = serde_json::from_str(body)?;

    let strongest = collection
        .features
        .into_iter()
        .filter_map(|feature| {
            let magnitude = feature.properties.mag?;
            let coords = &feature.geometry.as_ref()?.coordinates;
            if coords.len() < 2 {
                return None;
            }
            let location = GeoPoint::new(coords[1], coords[0]);
            let depth = coords.get(2).copied();
            in_region(ctx.region.as_ref(), &location).then_some((feature, magnitude, location, depth))
        })
        .max_by(|a, b| a.1.total_cmp(&b.1));

    let Some((feature, magnitude, location, depth)) = strongest else {
        return Ok(None);
    };

    let observed_at = feature
        .properties
        .time
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or(ctx.fetched_at);

    Ok(Some(Observation {
        kind: SignalKind::Seismic,
        location,
        magnitude,
        observed_at,
        source_confidence: USGS_CONFIDENCE,
        metadata: json!({
            "usgs_id": feature.id,
            "place": feature.properties.place,
            "depth_km": depth,
        }),
    }))
}
