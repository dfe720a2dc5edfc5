//! Per-rack payload mirrored to the live visualization client.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::physics::UnitResult;

/// Outlet-temperature thresholds for rack health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeThresholds {
    /// Outlet above this is `Warning` (°C).
    pub warning_c: f64,
    /// Outlet above this is `Critical` (°C).
    pub critical_c: f64,
}

impl Default for BridgeThresholds {
    fn default() -> Self {
        Self {
            warning_c: 35.5,
            critical_c: 37.0,
        }
    }
}

/// Rack health as shown by the bridge client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RackHealth {
    Normal,
    Warning,
    Critical,
}

impl RackHealth {
    /// Classifies an outlet temperature. Both thresholds are exclusive.
    pub fn classify(outlet_c: f64, thresholds: &BridgeThresholds) -> Self {
        if outlet_c > thresholds.critical_c {
            RackHealth::Critical
        } else if outlet_c > thresholds.warning_c {
            RackHealth::Warning
        } else {
            RackHealth::Normal
        }
    }
}

impl fmt::Display for RackHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RackHealth::Normal => "Normal",
            RackHealth::Warning => "Warning",
            RackHealth::Critical => "Critical",
        };
        f.write_str(s)
    }
}

/// One rack as received by the bridge client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RackStatus {
    pub id: String,
    pub index: usize,
    /// Outlet temperature (°C).
    pub temperature: f64,
    /// Server electrical draw (W).
    pub energy_usage: f64,
    pub status: RackHealth,
}

/// Builds the rack list from per-unit physics results, one rack per unit.
pub fn rack_statuses(results: &[UnitResult], thresholds: &BridgeThresholds) -> Vec<RackStatus> {
    results
        .iter()
        .enumerate()
        .map(|(index, r)| RackStatus {
            id: format!("Rack_{index}"),
            index,
            temperature: r.outlet_temp_c,
            energy_usage: r.server_power_w,
            status: RackHealth::classify(r.outlet_temp_c, thresholds),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::physics::CoolingStrategy;

    fn result(outlet_c: f64, server_power_w: f64) -> UnitResult {
        UnitResult {
            actual_inlet_temp_c: 22.0,
            outlet_temp_c: outlet_c,
            temp_deviation_c: 0.0,
            cooling_strategy: CoolingStrategy::Stable,
            server_power_w,
            cooling_power_w: 0.0,
            pue: 0.0,
            compute_output: 0.0,
        }
    }

    #[test]
    fn thresholds_are_exclusive() {
        let t = BridgeThresholds::default();
        assert_eq!(RackHealth::classify(35.5, &t), RackHealth::Normal);
        assert_eq!(RackHealth::classify(35.6, &t), RackHealth::Warning);
        assert_eq!(RackHealth::classify(37.0, &t), RackHealth::Warning);
        assert_eq!(RackHealth::classify(37.01, &t), RackHealth::Critical);
    }

    #[test]
    fn racks_are_numbered_in_order() {
        let results = [result(30.0, 250.0), result(36.0, 320.0), result(40.0, 410.0)];
        let racks = rack_statuses(&results, &BridgeThresholds::default());
        assert_eq!(racks.len(), 3);
        assert_eq!(racks[0].id, "Rack_0");
        assert_eq!(racks[2].id, "Rack_2");
        assert_eq!(racks[1].status, RackHealth::Warning);
        assert_eq!(racks[2].status, RackHealth::Critical);
        assert_eq!(racks[2].temperature, 40.0);
    }

    #[test]
    fn energy_usage_is_server_power() {
        let results = [result(30.0, 212.5), result(33.0, 388.0)];
        let racks = rack_statuses(&results, &BridgeThresholds::default());
        for (rack, r) in racks.iter().zip(&results) {
            assert_eq!(rack.energy_usage, r.server_power_w);
        }
    }

    #[test]
    fn serializes_status_as_plain_name() {
        let racks = rack_statuses(&[result(36.0, 300.0)], &BridgeThresholds::default());
        let json = serde_json::to_value(&racks[0]).expect("serialize rack");
        assert_eq!(json["status"], "Warning");
        assert_eq!(json["id"], "Rack_0");
    }
}
