//! PetaBencana flood states

use super::{Observation, ParseContext};
use crate::error::ParseResult;
use crate::region::in_region;
use aegis_types::{GeoPoint, SignalKind};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

const PETABENCANA_CONFIDENCE: f64 = 0.85;

#[derive(Debug, Deserialize)]
struct FloodStatesResponse {
    result: Option<FeatureCollection>,
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Option<Point>,
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct Point {
    /// `[longitude, latitude]`
    coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct Properties {
    area_id: Option<String>,
    area_name: Option<String>,
    /// Flood state 1 (unknown depth) .. 4 (above 150 cm)
    state: Option<u8>,
    last_updated: Option<String>,
}

pub(super) fn parse(body: &str, ctx: &ParseContext) -> ParseResult<Option<Observation>> {
    let response: FloodStatesResponse = serde_json::from_str(body)?;
    let Some(result) = response.result else {
        return Ok(None);
    };

    let deepest = result
        .features
        .into_iter()
        .filter_map(|feature| {
            let state = feature.properties.state?;
            let coords = &feature.geometry.as_ref()?.coordinates;
            if coords.len() < 2 {
                return None;
            }
            let location = GeoPoint::new(coords[1], coords[0]);
            in_region(ctx.region.as_ref(), &location).then_some((feature, state, location))
        })
        .max_by_key(|(_, state, _)| *state);

    let Some((feature, state, location)) = deepest else {
        return Ok(None);
    };

    let observed_at = feature
        .properties
        .last_updated
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(ctx.fetched_at);

    Ok(Some(Observation {
        kind: SignalKind::Flood,
        location,
        magnitude: f64::from(state),
        observed_at,
        source_confidence: PETABENCANA_CONFIDENCE,
        metadata: json!({
            "area_id": feature.properties.area_id,
            "area_name": feature.properties.area_name,
            "state": state,
        }),
    }))
}
