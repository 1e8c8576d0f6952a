//! One polled source

use crate::anomaly::AnomalyThresholds;
use crate::dedup::DedupPolicy;
use crate::feed::SignalFeed;
use crate::region::BoundingBox;
use crate::sources::{ParseContext, SourceFormat};
use aegis_types::RawSignal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Poll counters for one source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceStats {
    pub polls: u64,
    pub signals: u64,
    /// Payloads that parsed but failed the anomaly predicate
    pub suppressed: u64,
    pub errors: u64,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Adapter binding a feed to a format parser, anomaly predicate and dedup key.
pub struct SourceAdapter {
    name: String,
    format: SourceFormat,
    feed: Arc<dyn SignalFeed>,
    interval: Duration,
    dedup: DedupPolicy,
    anomaly: AnomalyThresholds,
    region: Option<BoundingBox>,
    stats: RwLock<SourceStats>,
}

impl SourceAdapter {
    pub fn new(
        name: impl Into<String>,
        format: SourceFormat,
        feed: Arc<dyn SignalFeed>,
        interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            format,
            feed,
            interval,
            dedup: DedupPolicy::default(),
            anomaly: AnomalyThresholds::default(),
            region: None,
            stats: RwLock::new(SourceStats::default()),
        }
    }

    pub fn with_dedup(mut self, dedup: DedupPolicy) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn with_anomaly(mut self, anomaly: AnomalyThresholds) -> Self {
        self.anomaly = anomaly;
        self
    }

    pub fn with_region(mut self, region: Option<BoundingBox>) -> Self {
        self.region = region;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stats(&self) -> SourceStats {
        self.stats
            .read()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }

    /// Run one fetch-parse-filter cycle.
    ///
    /// Any failure is logged and yields `None`; nothing is retried.
    #[instrument(skip(self), fields(source = %self.name))]
    pub async fn poll(&self) -> Option<RawSignal> {
        let body = match self.feed.fetch().await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Fetch failed");
                self.record(|stats| {
                    stats.errors += 1;
                    stats.last_error = Some(e.to_string());
                });
                return None;
            }
        };

        let ctx = ParseContext::new(self.region);
        let observation = match self.format.parse(&body, &ctx) {
            Ok(Some(observation)) => observation,
            Ok(None) => {
                debug!("No usable record in payload");
                self.record(|_| {});
                return None;
            }
            Err(e) => {
                warn!(error = %e, format = %self.format, "Parse failed");
                self.record(|stats| {
                    stats.errors += 1;
                    stats.last_error = Some(e.to_string());
                });
                return None;
            }
        };

        if !self.anomaly.is_anomalous(&observation) {
            debug!(magnitude = observation.magnitude, "Below anomaly threshold");
            self.record(|stats| stats.suppressed += 1);
            return None;
        }

        let event_id = self
            .dedup
            .event_id(observation.kind, &observation.location, observation.observed_at);
        let signal = observation.into_signal(event_id, self.name.clone());

        if let Err(e) = signal.validate() {
            warn!(error = %e, "Parsed signal failed validation");
            self.record(|stats| {
                stats.errors += 1;
                stats.last_error = Some(e.to_string());
            });
            return None;
        }

        info!(
            event_id = %signal.event_id,
            kind = %signal.kind,
            magnitude = signal.magnitude,
            "Anomaly detected"
        );
        self.record(|stats| stats.signals += 1);
        Some(signal)
    }

    fn record(&self, update: impl FnOnce(&mut SourceStats)) {
        if let Ok(mut stats) = self.stats.write() {
            stats.polls += 1;
            stats.last_poll_at = Some(Utc::now());
            update(&mut stats);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedError;
    use crate::feed::StaticFeed;
    use aegis_types::SignalKind;

    const QUAKE: &str = r#"{"Infogempa":{"gempa":{"DateTime":"2024-01-01T00:00:00+00:00","Coordinates":"-6.84,107.05","Magnitude":"6.2"}}}"#;
    const TREMOR: &str = r#"{"Infogempa":{"gempa":{"DateTime":"2024-01-01T00:00:00+00:00","Coordinates":"-6.84,107.05","Magnitude":"3.1"}}}"#;

    fn adapter(feed: StaticFeed) -> SourceAdapter {
        SourceAdapter::new(
            "bmkg_autogempa",
            SourceFormat::BmkgAutogempa,
            Arc::new(feed),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn anomalous_payload_becomes_signal() {
        let adapter = adapter(StaticFeed::repeating(QUAKE));
        let signal = adapter.poll().await.expect("M6.2 is anomalous");

        assert_eq!(signal.kind, SignalKind::Seismic);
        assert_eq!(signal.source, "bmkg_autogempa");
        assert_eq!(signal.source_confidence, 0.95);
        assert_eq!(
            signal.event_id,
            DedupPolicy::default().event_id(SignalKind::Seismic, &signal.location, signal.observed_at)
        );
        assert_eq!(adapter.stats().signals, 1);
    }

    #[tokio::test]
    async fn routine_payload_is_suppressed() {
        let adapter = adapter(StaticFeed::repeating(TREMOR));
        assert!(adapter.poll().await.is_none());
        assert_eq!(adapter.stats().suppressed, 1);
    }

    #[tokio::test]
    async fn fetch_and_parse_errors_are_no_signal() {
        let adapter = adapter(StaticFeed::scripted([
            Err(FeedError::Status { status: 502 }),
            Ok("not json".to_string()),
        ]));

        assert!(adapter.poll().await.is_none());
        assert!(adapter.poll().await.is_none());

        let stats = adapter.stats();
        assert_eq!(stats.polls, 2);
        assert_eq!(stats.errors, 2);
        assert!(stats.last_error.unwrap().contains("Invalid JSON"));
    }
}
