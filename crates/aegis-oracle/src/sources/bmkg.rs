//! BMKG `autogempa.json`: the latest felt earthquake, all values as strings

use super::{Observation, ParseContext};
use crate::error::{ParseError, ParseResult};
use crate::region::in_region;
use aegis_types::{GeoPoint, SignalKind};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

const BMKG_CONFIDENCE: f64 = 0.95;

#[derive(Debug, Deserialize)]
struct AutogempaResponse {
    #[serde(rename = "Infogempa")]
    info: Option<Infogempa>,
}

#[derive(Debug, Deserialize)]
struct Infogempa {
    gempa: Option<Gempa>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Gempa {
    date_time: Option<String>,
    coordinates: Option<String>,
    lintang: Option<String>,
    bujur: Option<String>,
    magnitude: Option<String>,
    kedalaman: Option<String>,
    wilayah: Option<String>,
    potensi: Option<String>,
}

pub(super) fn parse(body: &str, ctx: &ParseContext) -> ParseResult<Option<Observation>> {
    let response: AutogempaResponse = serde_json::from_str(body)?;
    let Some(gempa) = response.info.and_then(|info| info.gempa) else {
        return Ok(None);
    };

    let magnitude_raw = gempa.magnitude.as_deref().ok_or(ParseError::MissingField("Magnitude"))?;
    let magnitude = parse_number("Magnitude", magnitude_raw)?;
    let location = location(&gempa)?;

    if !in_region(ctx.region.as_ref(), &location) {
        return Ok(None);
    }

    let observed_at = gempa
        .date_time
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(ctx.fetched_at);

    Ok(Some(Observation {
        kind: SignalKind::Seismic,
        location,
        magnitude,
        observed_at,
        source_confidence: BMKG_CONFIDENCE,
        metadata: json!({
            "depth": gempa.kedalaman,
            "region": gempa.wilayah,
            "potential": gempa.potensi,
        }),
    }))
}

fn location(gempa: &Gempa) -> ParseResult<GeoPoint> {
    if let Some(coordinates) = gempa.coordinates.as_deref() {
        let mut parts = coordinates.split(',');
        if let (Some(lat), Some(lon), None) = (parts.next(), parts.next(), parts.next()) {
            return Ok(GeoPoint::new(
                parse_number("Coordinates", lat)?,
                parse_number("Coordinates", lon)?,
            ));
        }
        return Err(ParseError::InvalidValue {
            field: "Coordinates",
            value: coordinates.to_string(),
        });
    }

    let lintang = gempa.lintang.as_deref().ok_or(ParseError::MissingField("Lintang"))?;
    let bujur = gempa.bujur.as_deref().ok_or(ParseError::MissingField("Bujur"))?;
    Ok(GeoPoint::new(
        hemisphere_degrees("Lintang", lintang, "LS", "LU")?,
        hemisphere_degrees("Bujur", bujur, "BB", "BT")?,
    ))
}

/// Parse `"6.81 LS"` style values; the `negative` suffix flips the sign.
fn hemisphere_degrees(
    field: &'static str,
    raw: &str,
    negative: &str,
    positive: &str,
) -> ParseResult<f64> {
    let trimmed = raw.trim();
    let (number, sign) = if let Some(rest) = trimmed.strip_suffix(negative) {
        (rest, -1.0)
    } else if let Some(rest) = trimmed.strip_suffix(positive) {
        (rest, 1.0)
    } else {
        (trimmed, 1.0)
    };
    Ok(sign * parse_number(field, number)?.abs())
}

fn parse_number(field: &'static str, raw: &str) -> ParseResult<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ParseError::InvalidValue {
            field,
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::BoundingBox;

    const SAMPLE: &str = r#"{
        "Infogempa": {
            "gempa": {
                "Tanggal": "21 Nov 2022",
                "Jam": "13:21:10 WIB",
                "DateTime": "2022-11-21T06:21:10+00:00",
                "Coordinates": "-6.84,107.05",
                "Lintang": "6.84 LS",
                "Bujur": "107.05 BT",
                "Magnitude": "5.6",
                "Kedalaman": "10 km",
                "Wilayah": "10 km BaratDaya KAB-CIANJUR-JABAR",
                "Potensi": "Tidak berpotensi tsunami"
            }
        }
    }"#;

    #[test]
    fn parses_autogempa_payload() {
        let ctx = ParseContext::new(Some(BoundingBox::indonesia()));
        let obs = parse(SAMPLE, &ctx).unwrap().expect("in-region quake");

        assert_eq!(obs.kind, SignalKind::Seismic);
        assert_eq!(obs.magnitude, 5.6);
        assert_eq!(obs.location, GeoPoint::new(-6.84, 107.05));
        assert_eq!(obs.observed_at.to_rfc3339(), "2022-11-21T06:21:10+00:00");
        assert_eq!(obs.source_confidence, 0.95);
        assert_eq!(obs.metadata["depth"], "10 km");
    }

    #[test]
    fn falls_back_to_hemisphere_fields() {
        let body = r#"{"Infogempa":{"gempa":{"Lintang":"3.20 LU","Bujur":"126.10 BT","Magnitude":"4.1"}}}"#;
        let ctx = ParseContext::new(None);
        let obs = parse(body, &ctx).unwrap().unwrap();
        assert_eq!(obs.location, GeoPoint::new(3.20, 126.10));
        assert_eq!(obs.observed_at, ctx.fetched_at);
    }

    #[test]
    fn missing_magnitude_is_an_error() {
        let body = r#"{"Infogempa":{"gempa":{"Coordinates":"-6.8,107.1"}}}"#;
        let err = parse(body, &ParseContext::new(None)).unwrap_err();
        assert!(matches!(err, ParseError::MissingField("Magnitude")));
    }

    #[test]
    fn empty_payload_is_no_signal() {
        assert!(parse("{}", &ParseContext::new(None)).unwrap().is_none());
    }
}
