//! Aegis oracle: turns external hazard feeds into [`RawSignal`]s.
//!
//! Each configured source is polled on its own interval by a
//! [`SourceAdapter`]. An adapter fetches the native payload through a
//! [`SignalFeed`], parses it with the source's format parser, drops it when
//! the kind's anomaly predicate is false and stamps the content-derived
//! event id from the [`DedupPolicy`].
//!
//! Fetch and parse failures are logged and count as "no signal this cycle".
//! Adapters never de-duplicate; the consensus aggregator owns that.
//!
//! [`RawSignal`]: aegis_types::RawSignal

#![deny(unsafe_code)]

pub mod adapter;
pub mod anomaly;
pub mod dedup;
pub mod error;
pub mod feed;
pub mod network;
pub mod region;
pub mod sources;

pub use adapter::{SourceAdapter, SourceStats};
pub use anomaly::AnomalyThresholds;
pub use dedup::DedupPolicy;
pub use error::{FeedError, FeedResult, ParseError, ParseResult};
pub use feed::{HttpFeed, SignalFeed, StaticFeed};
pub use network::{OracleNetwork, OracleStatus};
pub use region::BoundingBox;
pub use sources::{Observation, SourceFormat};
