#![forbid(unsafe_code)]

//! `mimic-hostd` — hosted deployment orchestrator library.
//!
//! Launches one independent bot session per configured identity on a
//! shared tokio runtime, persists per-bot behavioral settings through a
//! pluggable [`store::ConfigStore`], and tracks each hosted instance's
//! liveness via heartbeat/expiration lifecycle records.

pub mod chat;
pub mod config;
pub mod errors;
pub mod markov;
pub mod models;
pub mod orchestrator;
pub mod persistence;
pub mod secrets;
pub mod store;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
