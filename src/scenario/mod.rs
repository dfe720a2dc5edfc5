//! Scenario catalog and per-tick scenario selection.

/// Random per-unit scenario selection.
pub mod plan;
/// Catalog loading and indexed lookup.
pub mod store;

pub use plan::{CombinationPlan, PlanGenerator};
pub use store::{CatalogError, ScenarioRecord, ScenarioStore, UnitState};
