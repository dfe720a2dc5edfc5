//! API response and query types.

use serde::{Deserialize, Serialize};

use crate::forecast::Forecasts;
use crate::optimizer::{Profile, Suggestion};
use crate::sim::aggregate::AggregatedMetrics;

/// Dashboard view of the latest tick.
#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub tick: u64,
    pub hour: u8,
    pub metrics: AggregatedMetrics,
    /// Empty while the rolling window is below its minimum.
    pub forecasts: Forecasts,
    pub anomaly: bool,
    pub anomaly_alert: bool,
    /// Ambient the optimizer would be queried at (°C).
    pub current_ambient_c: f64,
}

/// Optional parameters for `/suggest`.
#[derive(Debug, Default, Deserialize)]
pub struct SuggestQuery {
    /// `greedy`, `sustainable` or `balanced`.
    pub profile: Option<String>,
    /// Candidate count; server default when absent.
    pub samples: Option<usize>,
}

/// Optimizer answer. `suggestion.status` separates `not_ready`,
/// `no_candidate` and `found`.
#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub profile: Profile,
    pub ambient_c: f64,
    pub samples: usize,
    pub suggestion: Suggestion,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggestion_status_is_tagged() {
        let body = SuggestResponse {
            profile: Profile::Greedy,
            ambient_c: 31.0,
            samples: 10,
            suggestion: Suggestion::Found {
                inlet_c: 24,
                workload_percent: 97,
                reward: 9700.0,
            },
        };
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["profile"], "greedy");
        assert_eq!(json["suggestion"]["status"], "found");
        assert_eq!(json["suggestion"]["workload_percent"], 97);

        let not_ready = serde_json::to_value(Suggestion::NotReady).expect("serialize");
        assert_eq!(not_ready["status"], "not_ready");
    }
}
