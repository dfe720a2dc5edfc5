//! Pre-recorded per-unit state catalog, grouped by unit identity.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::info;

use super::plan::CombinationPlan;

const DEFAULT_INLET_TEMP_C: f64 = 22.0;
const DEFAULT_AMBIENT_TEMP_C: f64 = 25.0;

/// Operating state of one unit for one tick.
///
/// Field names on the wire follow the catalog schema (`server_workload_percent`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitState {
    /// Server workload in percent (0-100).
    #[serde(
        rename = "server_workload_percent",
        default,
        deserialize_with = "null_as_default"
    )]
    pub workload_percent: f64,
    /// Requested (target) inlet air temperature in °C.
    #[serde(default = "default_inlet", deserialize_with = "null_as_inlet")]
    pub inlet_temp_c: f64,
    /// Outside ambient temperature in °C.
    #[serde(default = "default_ambient", deserialize_with = "null_as_ambient")]
    pub ambient_temp_c: f64,
}

fn default_inlet() -> f64 {
    DEFAULT_INLET_TEMP_C
}

fn default_ambient() -> f64 {
    DEFAULT_AMBIENT_TEMP_C
}

// Explicit nulls in a payload fall back the same way absent fields do.
fn null_as_default<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(d)?.unwrap_or_default())
}

fn null_as_inlet<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(d)?.unwrap_or(DEFAULT_INLET_TEMP_C))
}

fn null_as_ambient<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(d)?.unwrap_or(DEFAULT_AMBIENT_TEMP_C))
}

impl Default for UnitState {
    fn default() -> Self {
        Self {
            workload_percent: 0.0,
            inlet_temp_c: DEFAULT_INLET_TEMP_C,
            ambient_temp_c: DEFAULT_AMBIENT_TEMP_C,
        }
    }
}

/// One immutable catalog entry belonging to a single unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioRecord {
    /// Identity of the owning unit.
    pub unit_id: String,
    /// Baseline operating state.
    pub payload: UnitState,
    /// Remaining metadata keys, kept opaque.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct RawRecord {
    meta_data: RawMeta,
    #[serde(default)]
    payload: UnitState,
}

#[derive(Deserialize)]
struct RawMeta {
    #[serde(rename = "entityId")]
    entity_id: String,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl From<RawRecord> for ScenarioRecord {
    fn from(raw: RawRecord) -> Self {
        Self {
            unit_id: raw.meta_data.entity_id,
            payload: raw.payload,
            metadata: raw.meta_data.extra,
        }
    }
}

/// Failure to load the scenario catalog. Always fatal for the simulator.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file does not exist.
    #[error("scenario catalog \"{}\" not found", .path.display())]
    NotFound { path: PathBuf },
    /// The catalog exists but could not be read.
    #[error("cannot read scenario catalog \"{}\": {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    /// The catalog is not a valid record list.
    #[error("malformed scenario catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Catalog of scenario records grouped by unit, with units in sorted order.
#[derive(Debug, Clone, Default)]
pub struct ScenarioStore {
    scenarios: BTreeMap<String, Vec<ScenarioRecord>>,
}

impl ScenarioStore {
    /// Loads and groups a JSON catalog from disk.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] when the file is absent, or another
    /// variant when it cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                CatalogError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                CatalogError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        let store = Self::from_json_str(&raw)?;
        info!(
            path = %path.display(),
            units = store.unit_count(),
            "scenario catalog loaded"
        );
        Ok(store)
    }

    /// Parses a catalog from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Parse`] when the text is not a record array.
    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let records: Vec<RawRecord> = serde_json::from_str(raw)?;
        Ok(Self::from_records(records.into_iter().map(ScenarioRecord::from)))
    }

    /// Groups records by unit, preserving catalog order within each unit.
    pub fn from_records(records: impl IntoIterator<Item = ScenarioRecord>) -> Self {
        let mut scenarios: BTreeMap<String, Vec<ScenarioRecord>> = BTreeMap::new();
        for record in records {
            scenarios
                .entry(record.unit_id.clone())
                .or_default()
                .push(record);
        }
        Self { scenarios }
    }

    /// Builds a store from pre-grouped records. Groups may be empty.
    pub fn from_groups(scenarios: BTreeMap<String, Vec<ScenarioRecord>>) -> Self {
        Self { scenarios }
    }

    /// Number of known units (including units with no records).
    pub fn unit_count(&self) -> usize {
        self.scenarios.len()
    }

    /// Unit identities in sorted order.
    pub fn unit_ids(&self) -> impl Iterator<Item = &str> {
        self.scenarios.keys().map(String::as_str)
    }

    /// Per-unit record counts, in unit order.
    pub fn record_counts(&self) -> Vec<usize> {
        self.scenarios.values().map(Vec::len).collect()
    }

    /// Returns `true` when the catalog holds no records at all.
    pub fn is_empty(&self) -> bool {
        self.scenarios.values().all(Vec::is_empty)
    }

    /// Maps a combination plan onto one record per unit.
    ///
    /// Plan value `v` for a unit with `n` records selects record
    /// `(v - 1) mod n`, so every plan value is valid. Units without records
    /// are skipped; units beyond the end of the plan use value 1.
    pub fn resolve(&self, plan: &CombinationPlan) -> Vec<&ScenarioRecord> {
        self.scenarios
            .values()
            .enumerate()
            .filter_map(|(i, records)| {
                let value = plan.get(i).unwrap_or(1);
                effective_index(value, records.len()).map(|idx| &records[idx])
            })
            .collect()
    }
}

/// Zero-based record index selected by a one-based plan value, or `None`
/// when the unit has no records.
pub fn effective_index(plan_value: i64, available: usize) -> Option<usize> {
    if available == 0 {
        return None;
    }
    let n = available as i128;
    Some((i128::from(plan_value) - 1).rem_euclid(n) as usize)
}
