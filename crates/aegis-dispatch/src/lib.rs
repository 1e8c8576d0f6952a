//! # aegis-dispatch
//!
//! Everything downstream of a committed consensus decision:
//!
//! - [`Dispatcher`]: creates one funded [`ResponseRecord`] per accepted
//!   event, runs the parametric payout and fans out `notify` / `plan`
//!   messages over the bridge
//! - [`FundingAccount`]: the shared response treasury
//! - [`ParametricVault`]: policy table and payout history
//! - [`ResponseRegistry`]: participants, disbursements, completion
//! - [`RecognitionLedger`]: badges and reputation awarded at completion
//!
//! [`ResponseRecord`]: aegis_types::ResponseRecord

#![deny(unsafe_code)]

pub mod capabilities;
pub mod consumers;
pub mod dispatcher;
pub mod error;
pub mod recognition;
pub mod registry;
pub mod treasury;
pub mod vault;

pub use capabilities::{
    LogNotifier, LogPlanner, LogisticsPlan, LogisticsPlanner, LogisticsRequest, Notification,
    Notifier,
};
pub use consumers::{run_communications, run_logistics, COMMUNICATIONS, DISPATCHER, LOGISTICS};
pub use dispatcher::{DispatchOutcome, DispatchPolicy, Dispatcher, SkipReason};
pub use error::{DispatchError, DispatchResult};
pub use recognition::{
    Award, Badge, CompletionReport, ParticipantReport, RecognitionLedger, ReputationEntry,
};
pub use registry::{Archival, ResponseRegistry};
pub use treasury::{FundingAccount, FundingSnapshot};
pub use vault::{default_policies, ParametricPolicy, ParametricVault, PayoutOutcome, VaultStatus};
