//! Data-center digital twin: per-unit power/thermal simulation with online
//! anomaly detection, forecasting and settings optimization.

pub mod analytics;
pub mod anomaly;
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod forecast;
pub mod history;
pub mod io;
pub mod optimizer;
/// Scenario catalog and per-tick plan selection.
pub mod scenario;
/// Simulation stages and the tick orchestrator.
pub mod sim;
pub mod sink;
