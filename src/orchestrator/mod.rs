//! Session orchestration modules.
//!
//! Covers identity discovery and session launch, the per-session run
//! loop, human-timing simulation, and the lifecycle watchdog.

pub mod launcher;
pub mod session;
pub mod timing;
pub mod watchdog;
