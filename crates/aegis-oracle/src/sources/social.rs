//! Social media monitor JSON

use super::{Observation, ParseContext};
use crate::error::{ParseError, ParseResult};
use crate::region::in_region;
use aegis_types::{GeoPoint, SignalKind};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct SocialReport {
    platform: Option<String>,
    #[serde(default)]
    post_count: u64,
    #[serde(default)]
    sentiment_spike: bool,
    #[serde(default)]
    keywords_detected: Vec<String>,
    estimated_location: Option<EstimatedLocation>,
    ai_confidence: Option<f64>,
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct EstimatedLocation {
    #[serde(alias = "latitude")]
    lat: f64,
    #[serde(alias = "longitude")]
    lon: f64,
}

pub(super) fn parse(body: &str, ctx: &ParseContext) -> ParseResult<Option<Observation>> {
    let report: SocialReport = serde_json::from_str(body)?;
    let estimated = report
        .estimated_location
        .ok_or(ParseError::MissingField("estimated_location"))?;
    let location = GeoPoint::new(estimated.lat, estimated.lon);

    if !in_region(ctx.region.as_ref(), &location) {
        return Ok(None);
    }

    Ok(Some(Observation {
        kind: SignalKind::Social,
        location,
        magnitude: report.post_count as f64,
        observed_at: report.timestamp.unwrap_or(ctx.fetched_at),
        source_confidence: report.ai_confidence.unwrap_or(0.5).clamp(0.0, 1.0),
        metadata: json!({
            "platform": report.platform,
            "post_count": report.post_count,
            "sentiment_spike": report.sentiment_spike,
            "keywords": report.keywords_detected,
        }),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_monitor_report() {
        let body = r#"{
            "platform": "twitter",
            "keywords_detected": ["gempa", "banjir"],
            "sentiment_spike": true,
            "post_count": 150,
            "estimated_location": { "lat": -6.2, "lon": 106.8 },
            "ai_confidence": 0.72,
            "timestamp": "2024-03-01T10:00:00Z"
        }"#;

        let obs = parse(body, &ParseContext::new(None)).unwrap().unwrap();
        assert_eq!(obs.kind, SignalKind::Social);
        assert_eq!(obs.magnitude, 150.0);
        assert_eq!(obs.source_confidence, 0.72);
        assert_eq!(obs.metadata["sentiment_spike"], true);
        assert_eq!(obs.metadata["keywords"][0], "gempa");
    }

    #[test]
    fn report_without_location_is_an_error() {
        let body = r#"{"platform": "twitter", "post_count": 400}"#;
        assert!(matches!(
            parse(body, &ParseContext::new(None)),
            Err(ParseError::MissingField("estimated_location"))
        ));
    }
}
