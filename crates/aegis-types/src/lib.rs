//! # aegis-types
//!
//! Shared domain model for the Aegis disaster-response pipeline:
//!
//! - **Signals**: `RawSignal` observations emitted by source adapters, the
//!   closed `SignalKind` enum and the derived `AlertLevel`
//! - **Scores**: one `ValidationScore` per (validator, event) pair and the
//!   terminal `ConsensusDecision`
//! - **Responses**: the funded `ResponseRecord` ("Event DAO") and the
//!   parametric `PayoutRecord`
//! - **Lifecycle**: `LifecycleEvent`s pushed to passive subscribers
//!
//! Everything here is plain data. Execution lives in the consensus,
//! dispatch and oracle crates.

pub mod errors;
pub mod ids;
pub mod lifecycle;
pub mod response;
pub mod score;
pub mod signal;

pub use errors::{SignalError, SignalResult};
pub use ids::{ComponentId, EventId, ParticipantId, PolicyId, ResponseId, ValidatorId};
pub use lifecycle::{FundingPool, LifecycleEnvelope, LifecycleEvent};
pub use response::{
    Amount, MissionOutcome, Participant, ParticipantRole, PayoutRecord, ResponseRecord,
    ResponseStatus,
};
pub use score::{ConsensusDecision, ValidationScore};
pub use signal::{AlertLevel, GeoPoint, RawSignal, SignalKind};
