//! Aegis Daemon library
//!
//! This module provides the core components for the aegis daemon:
//! - Layered configuration
//! - Pipeline wiring and background tasks
//! - REST API handlers
//! - Server lifecycle management

#![deny(unsafe_code)]

pub mod api;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod server;

pub use config::AegisConfig;
pub use error::{ApiError, DaemonError};
pub use pipeline::{Handled, Pipeline, PipelineStatus};
pub use server::Server;
