//! Operator overrides applied to a varied batch before physics.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::scenario::UnitState;

/// One independently switchable override.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Override {
    pub enabled: bool,
    pub value: f64,
}

impl Override {
    /// An enabled override pinned to `value`.
    pub fn set(value: f64) -> Self {
        Self {
            enabled: true,
            value,
        }
    }

    /// The override value when enabled.
    pub fn active(&self) -> Option<f64> {
        self.enabled.then_some(self.value)
    }
}

/// Workload, inlet and ambient overrides, read fresh every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Overrides {
    /// Workload percent for every unit, jittered per unit.
    pub workload: Override,
    /// Target inlet temperature (°C) for every unit.
    pub inlet: Override,
    /// Ambient temperature (°C) for every unit.
    pub ambient: Override,
    /// Half-width of the uniform per-unit workload jitter (percentage points).
    pub workload_jitter: f64,
}

impl Default for Overrides {
    fn default() -> Self {
        Self {
            workload: Override::default(),
            inlet: Override::default(),
            ambient: Override::default(),
            workload_jitter: 2.0,
        }
    }
}

impl Overrides {
    /// True when at least one override is enabled.
    pub fn any_active(&self) -> bool {
        self.workload.enabled || self.inlet.enabled || self.ambient.enabled
    }

    /// Overwrites the enabled fields of every unit in `batch`.
    ///
    /// The workload override gets its own jitter draw per unit and is then
    /// clamped to `[0, 100]`.
    pub fn apply<R: Rng + ?Sized>(&self, batch: &mut [UnitState], rng: &mut R) {
        for unit in batch.iter_mut() {
            if let Some(w) = self.workload.active() {
                let jitter = if self.workload_jitter > 0.0 {
                    rng.random_range(-self.workload_jitter..=self.workload_jitter)
                } else {
                    0.0
                };
                unit.workload_percent = (w + jitter).clamp(0.0, 100.0);
            }
            if let Some(t) = self.inlet.active() {
                unit.inlet_temp_c = t;
            }
            if let Some(t) = self.ambient.active() {
                unit.ambient_temp_c = t;
            }
        }
    }
}
