//! Native source formats
//!
//! Each parser reduces one native payload to at most one [`Observation`]:
//! the most significant in-region record it contains. Payloads with no
//! usable record parse to `None`; malformed payloads are a [`ParseError`].
//!
//! [`ParseError`]: crate::error::ParseError

mod bmkg;
mod firms;
mod petabencana;
mod social;
mod usgs;

use crate::error::ParseResult;
use crate::region::BoundingBox;
use aegis_types::{EventId, GeoPoint, RawSignal, SignalKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported native payload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// BMKG `autogempa.json`
    BmkgAutogempa,
    /// USGS earthquake GeoJSON summary feed
    UsgsGeojson,
    /// PetaBencana flood states
    Petabencana,
    /// NASA FIRMS active-fire CSV
    FirmsCsv,
    /// Social media monitor JSON
    SocialMonitor,
}

impl SourceFormat {
    /// Signal kind produced by this format
    pub fn kind(&self) -> SignalKind {
        match self {
            SourceFormat::BmkgAutogempa | SourceFormat::UsgsGeojson => SignalKind::Seismic,
            SourceFormat::Petabencana => SignalKind::Flood,
            SourceFormat::FirmsCsv => SignalKind::Fire,
            SourceFormat::SocialMonitor => SignalKind::Social,
        }
    }

    pub fn parse(&self, body: &str, ctx: &ParseContext) -> ParseResult<Option<Observation>> {
        match self {
            SourceFormat::BmkgAutogempa => bmkg::parse(body, ctx),
            SourceFormat::UsgsGeojson => usgs::parse(body, ctx),
            SourceFormat::Petabencana => petabencana::parse(body, ctx),
            SourceFormat::FirmsCsv => firms::parse(body, ctx),
            SourceFormat::SocialMonitor => social::parse(body, ctx),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceFormat::BmkgAutogempa => "bmkg_autogempa",
            SourceFormat::UsgsGeojson => "usgs_geojson",
            SourceFormat::Petabencana => "petabencana",
            SourceFormat::FirmsCsv => "firms_csv",
            SourceFormat::SocialMonitor => "social_monitor",
        };
        f.write_str(name)
    }
}

/// Inputs shared by all parsers
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// Only records inside this box are considered
    pub region: Option<BoundingBox>,
    /// Fallback event time when the payload carries none
    pub fetched_at: DateTime<Utc>,
}

impl ParseContext {
    pub fn new(region: Option<BoundingBox>) -> Self {
        Self {
            region,
            fetched_at: Utc::now(),
        }
    }
}

/// A parsed record before it receives its event id
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub kind: SignalKind,
    pub location: GeoPoint,
    pub magnitude: f64,
    pub observed_at: DateTime<Utc>,
    pub source_confidence: f64,
    pub metadata: serde_json::Value,
}

impl Observation {
    pub fn into_signal(self, event_id: EventId, source: impl Into<String>) -> RawSignal {
        RawSignal::new(
            event_id,
            self.kind,
            self.location,
            self.magnitude,
            self.observed_at,
            source,
        )
        .with_source_confidence(self.source_confidence.clamp(0.0, 1.0))
        .with_metadata(self.metadata)
    }
}
