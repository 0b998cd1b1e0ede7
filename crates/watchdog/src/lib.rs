//! `pm-watchdog`: periodic node health checks.
//!
//! A [`Watchdog`] owns one single-flight cycle: list every node, probe them
//! through a bounded pool of [`Prober`] calls and write each result back
//! through the [`pm_store::NodeRegistry`] as soon as it arrives.

pub mod prober;
pub mod scheduler;

pub use prober::{HttpProber, ProbeFailure, ProbeResult, Prober};
pub use scheduler::{CycleOutcome, CycleReport, Watchdog, WatchdogSettings};
