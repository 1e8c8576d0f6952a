//! # aegis-consensus
//!
//! Weighted-stake consensus over validator scores.
//!
//! ```text
//! RawSignal ──admit──▶ ConsensusStore ◀──submit── ValidationScore
//!     │                                               ▲
//!     └──────────▶ ValidatorPool::score ──────────────┘
//!                        │
//!                   StakeLedger (lock / settle / refund)
//! ```
//!
//! - [`ValidatorPool`] routes a signal to the validators that handle its
//!   kind, runs them concurrently and locks a stake for each score.
//! - [`Aggregator`] stores scores per event and fires exactly one
//!   [`ConsensusDecision`](aegis_types::ConsensusDecision) once quorum is
//!   reached, settling stakes against it.
//! - Events that never reach quorum are evicted after a TTL and their
//!   stakes refunded.

#![deny(unsafe_code)]

pub mod aggregator;
pub mod error;
pub mod ledger;
pub mod pool;
pub mod store;
pub mod validator;

pub use aggregator::{compute_decision, Aggregator, ConsensusPolicy, ConsensusStats, Submission};
pub use error::{ConsensusError, ConsensusResult};
pub use ledger::{StakeAccount, StakeLedger};
pub use pool::{StakePolicy, ValidatorPool};
pub use store::{
    Admission, Admitted, CommitOutcome, ConsensusStore, EventSnapshot, EventState, EvictedEvent,
    InMemoryConsensusStore, RecordOutcome,
};
pub use validator::{Assessment, HeuristicValidator, Specialization, Validator};
