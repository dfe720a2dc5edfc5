//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dc_twin::config::TwinConfig;
use dc_twin::optimizer::SettingsOptimizer;
use dc_twin::scenario::ScenarioStore;
use dc_twin::sim::engine::Twin;

/// Four servers with one to three recorded states each; inlet 19-23 °C.
pub const CATALOG_JSON: &str = r#"[
  {"meta_data": {"entityId": "server-01", "rack": "A"},
   "payload": {"server_workload_percent": 45.0, "inlet_temp_c": 21.0, "ambient_temp_c": 23.0}},
  {"meta_data": {"entityId": "server-01", "rack": "A"},
   "payload": {"server_workload_percent": 62.0, "inlet_temp_c": 22.0, "ambient_temp_c": 24.5}},
  {"meta_data": {"entityId": "server-02", "rack": "A"},
   "payload": {"server_workload_percent": 30.0, "inlet_temp_c": 19.0, "ambient_temp_c": 21.0}},
  {"meta_data": {"entityId": "server-03", "rack": "B"},
   "payload": {"server_workload_percent": 75.0, "inlet_temp_c": 23.0, "ambient_temp_c": 26.0}},
  {"meta_data": {"entityId": "server-03", "rack": "B"},
   "payload": {"server_workload_percent": 55.0, "inlet_temp_c": 20.0, "ambient_temp_c": 22.0}},
  {"meta_data": {"entityId": "server-03", "rack": "B"},
   "payload": {"server_workload_percent": 88.0, "inlet_temp_c": 21.5, "ambient_temp_c": 27.0}},
  {"meta_data": {"entityId": "server-04", "rack": "C"},
   "payload": {"server_workload_percent": 50.0, "inlet_temp_c": 20.5, "ambient_temp_c": 23.5}}
]"#;

/// The fixture catalog as a store.
pub fn store() -> ScenarioStore {
    ScenarioStore::from_json_str(CATALOG_JSON).expect("fixture catalog parses")
}

/// Writes the fixture catalog into `dir` and returns its path.
pub fn write_catalog(dir: &Path) -> PathBuf {
    let path = dir.join("catalog.json");
    std::fs::write(&path, CATALOG_JSON).expect("write catalog");
    path
}

/// Baseline config pinned to a fixed start hour.
pub fn config() -> TwinConfig {
    let mut cfg = TwinConfig::baseline();
    cfg.simulation.start_hour = Some(10);
    cfg
}

/// Twin over the fixture catalog without optimizer models.
pub fn twin(cfg: &TwinConfig, seed: u64) -> Twin {
    Twin::new(store(), Arc::new(SettingsOptimizer::unavailable()), cfg, seed)
}
