//! NASA FIRMS active-fire CSV
//!
//! Columns are located by header name, so MODIS and VIIRS exports both work.
//! VIIRS reports confidence as `l`/`n`/`h`; those map to 30/60/90.

use super::{Observation, ParseContext};
use crate::error::{ParseError, ParseResult};
use crate::region::in_region;
use aegis_types::{GeoPoint, SignalKind};
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use serde_json::json;

struct Columns {
    latitude: usize,
    longitude: usize,
    confidence: usize,
    acq_date: Option<usize>,
    acq_time: Option<usize>,
    frp: Option<usize>,
    brightness: Option<usize>,
}

impl Columns {
    fn from_header(header: &str) -> ParseResult<Self> {
        let names: Vec<&str> = header.split(',').map(str::trim).collect();
        let find = |name: &str| names.iter().position(|n| *n == name);

        Ok(Self {
            latitude: find("latitude").ok_or(ParseError::MissingField("latitude"))?,
            longitude: find("longitude").ok_or(ParseError::MissingField("longitude"))?,
            confidence: find("confidence").ok_or(ParseError::MissingField("confidence"))?,
            acq_date: find("acq_date"),
            acq_time: find("acq_time"),
            frp: find("frp"),
            brightness: find("bright_ti4").or_else(|| find("brightness")),
        })
    }
}

struct Detection {
    location: GeoPoint,
    confidence: f64,
    row: Vec<String>,
}

pub(super) fn parse(body: &str, ctx: &ParseContext) -> ParseResult<Option<Observation>> {
    let mut lines = body.lines().filter(|line| !line.trim().is_empty());
    let Some(header) = lines.next() else {
        return Ok(None);
    };
    let columns = Columns::from_header(header)?;

    let mut best: Option<Detection> = None;
    for (index, line) in lines.enumerate() {
        let row: Vec<String> = line.split(',').map(|cell| cell.trim().to_string()).collect();
        let row_no = index + 1;

        let location = GeoPoint::new(
            number("latitude", cell(&row, columns.latitude, row_no)?)?,
            number("longitude", cell(&row, columns.longitude, row_no)?)?,
        );
        if !in_region(ctx.region.as_ref(), &location) {
            continue;
        }
        let confidence = detection_confidence(cell(&row, columns.confidence, row_no)?)?;

        if best.as_ref().map_or(true, |b| confidence > b.confidence) {
            best = Some(Detection {
                location,
                confidence,
                row,
            });
        }
    }

    let Some(detection) = best else {
        return Ok(None);
    };

    let field = |i: Option<usize>| i.and_then(|i| detection.row.get(i)).map(String::as_str);
    let observed_at = acquisition_time(field(columns.acq_date), field(columns.acq_time))
        .unwrap_or(ctx.fetched_at);
    let frp = field(columns.frp).and_then(|v| v.parse::<f64>().ok());
    let brightness = field(columns.brightness).and_then(|v| v.parse::<f64>().ok());

    Ok(Some(Observation {
        kind: SignalKind::Fire,
        location: detection.location,
        magnitude: detection.confidence,
        observed_at,
        source_confidence: detection.confidence / 100.0,
        metadata: json!({
            "frp": frp,
            "brightness": brightness,
        }),
    }))
}

fn cell(row: &[String], index: usize, row_no: usize) -> ParseResult<&str> {
    row.get(index)
        .map(String::as_str)
        .ok_or_else(|| ParseError::Csv(format!("row {row_no} is too short")))
}

fn detection_confidence(raw: &str) -> ParseResult<f64> {
    match raw.to_ascii_lowercase().as_str() {
        "h" | "high" => Ok(90.0),
        "n" | "nominal" => Ok(60.0),
        "l" | "low" => Ok(30.0),
        other => number("confidence", other).map(|c| c.clamp(0.0, 100.0)),
    }
}

/// `acq_date` is `YYYY-MM-DD`, `acq_time` is `HHMM` in UTC
fn acquisition_time(date: Option<&str>, time: Option<&str>) -> Option<chrono::DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date?, "%Y-%m-%d").ok()?;
    let time = time
        .and_then(|t| NaiveTime::parse_from_str(&format!("{t:0>4}"), "%H%M").ok())
        .or_else(|| NaiveTime::from_hms_opt(0, 0, 0))?;
    Utc.from_local_datetime(&date.and_time(time)).single()
}

fn number(field: &'static str, raw: &str) -> ParseResult<f64> {
    raw.parse::<f64>().map_err(|_| ParseError::InvalidValue {
        field,
        value: raw.to_string(),
    })
}
