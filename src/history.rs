//! Bounded rolling history of aggregated metrics shared by the online learners.

use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;

use crate::sim::aggregate::AggregatedMetrics;

/// Scalar series tracked by the learners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    AveragePue,
    MaxOutletTemp,
    TotalPower,
    TotalDailyCost,
    TotalComputeOutput,
}

/// Features fed to the outlier model, in column order.
pub const ANOMALY_FEATURES: [Metric; 4] = [
    Metric::AveragePue,
    Metric::MaxOutletTemp,
    Metric::TotalPower,
    Metric::TotalComputeOutput,
];

/// Series forecast every tick.
pub const FORECAST_METRICS: [Metric; 4] = [
    Metric::AveragePue,
    Metric::MaxOutletTemp,
    Metric::TotalPower,
    Metric::TotalDailyCost,
];

impl Metric {
    /// Canonical short name used as the forecast key.
    pub fn name(self) -> &'static str {
        match self {
            Metric::AveragePue => "pue",
            Metric::MaxOutletTemp => "temp",
            Metric::TotalPower => "power",
            Metric::TotalDailyCost => "cost",
            Metric::TotalComputeOutput => "compute",
        }
    }

    /// Reads this metric from a snapshot. Power is facility kW.
    pub fn value(self, m: &AggregatedMetrics) -> f64 {
        match self {
            Metric::AveragePue => m.average_pue,
            Metric::MaxOutletTemp => m.max_outlet_temp_c,
            Metric::TotalPower => m.total_power_kw(),
            Metric::TotalDailyCost => m.total_daily_cost_usd,
            Metric::TotalComputeOutput => m.total_compute_output,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-capacity window; pushing onto a full window evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    entries: VecDeque<AggregatedMetrics>,
    capacity: usize,
}

impl HistoryWindow {
    /// Creates an empty window. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a snapshot, evicting from the front when full.
    pub fn push(&mut self, metrics: AggregatedMetrics) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(metrics);
    }

    /// Most recent snapshot.
    pub fn latest(&self) -> Option<&AggregatedMetrics> {
        self.entries.back()
    }

    /// Oldest-first iterator.
    pub fn iter(&self) -> impl Iterator<Item = &AggregatedMetrics> {
        self.entries.iter()
    }

    /// One metric as an oldest-first series.
    pub fn series(&self, metric: Metric) -> Vec<f64> {
        self.entries.iter().map(|m| metric.value(m)).collect()
    }

    /// Row-major feature matrix, one row per snapshot.
    pub fn features(&self, metrics: &[Metric]) -> Vec<Vec<f64>> {
        self.entries
            .iter()
            .map(|m| metrics.iter().map(|metric| metric.value(m)).collect())
            .collect()
    }
}
