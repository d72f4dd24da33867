use crate::tracker::PriorityTracker;
use serde::{Deserialize, Serialize};

/// Weight of the priority vehicle's average speed in the composite value.
const PRIORITY_WEIGHT: f64 = 0.6;

/// Weight of general traffic's average speed in the composite value.
const OVERALL_WEIGHT: f64 = 0.4;

/// The scalar summary of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    /// Length of the observation window in s. Negative if the stream
    /// ended before the window opened.
    #[serde(rename = "ambTime")]
    pub window_duration: f64,
    /// The priority vehicle's speed sum divided by the window duration.
    #[serde(rename = "ambAvgSpeed")]
    pub priority_avg_speed: f64,
    /// Distance travelled by the priority vehicle within the window.
    pub route_length: f64,
    /// Mean speed over all in-window observations of all vehicles.
    #[serde(rename = "allAvgSpeed")]
    pub overall_avg_speed: f64,
    /// The weighted, normalized combination of both average speeds.
    pub value: f64,
}

impl ScoreRecord {
    /// The score as `(attribute, value)` pairs, in the order they are written out.
    pub fn attributes(&self) -> [(&'static str, f64); 5] {
        [
            ("ambTime", self.window_duration),
            ("ambAvgSpeed", self.priority_avg_speed),
            ("routeLength", self.route_length),
            ("allAvgSpeed", self.overall_avg_speed),
            ("value", self.value),
        ]
    }
}

/// Derives the score of a run from its final accumulator states.
///
/// # Parameters
/// * `tracker` - The priority vehicle tracker
/// * `overall_speed_sum` - Sum of in-window speeds of all vehicles
/// * `overall_count` - Number of in-window observations of all vehicles
/// * `last_time` - Time of the last consumed timestep, in s
/// * `speed_normalizer` - Reference speed the averages are divided by
pub fn compose(
    tracker: &PriorityTracker,
    overall_speed_sum: f64,
    overall_count: u64,
    last_time: f64,
    speed_normalizer: f64,
) -> ScoreRecord {
    let duration = last_time - tracker.window_start();

    // Normalized by elapsed time, not by sample count
    let priority_avg_speed = if duration > 0.0 {
        tracker.speed_sum() / duration
    } else {
        0.0
    };

    let overall_avg_speed = if overall_count > 0 {
        overall_speed_sum / overall_count as f64
    } else {
        0.0
    };

    let value = priority_avg_speed * PRIORITY_WEIGHT / speed_normalizer
        + overall_avg_speed * OVERALL_WEIGHT / speed_normalizer;

    ScoreRecord {
        window_duration: duration,
        priority_avg_speed,
        route_length: tracker.route_length(),
        overall_avg_speed,
        value,
    }
}

/// Formats a value the way score attributes are written:
/// shortest round-trip form, keeping `.0` on whole numbers.
pub fn format_decimal(value: f64) -> String {
    format!("{:?}", value)
}
