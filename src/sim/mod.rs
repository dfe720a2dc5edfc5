//! Per-tick simulation stages and the orchestrator that runs them.

/// Datacenter-wide reduction of unit results.
pub mod aggregate;
/// Rack payload for the live bridge.
pub mod bridge;
/// Fixed-interval tick timer.
pub mod clock;
pub mod engine;
/// Operator overrides.
pub mod overrides;
/// Closed-form power/thermal model.
pub mod physics;
pub mod variation;
