use crate::math::{distance, Point2d};
use crate::telemetry::VehicleObservation;

/// Follows the priority vehicle through the observation window,
/// accumulating the length of its route and its speed samples.
#[derive(Clone, Debug)]
pub struct PriorityTracker {
    /// The ID of the tracked vehicle.
    tracked_id: String,
    /// Observations at or before this time in s are ignored.
    window_start: f64,
    /// The last in-window position, if there has been one.
    last_position: Option<Point2d>,
    /// Total Euclidean distance between consecutive in-window positions.
    route_length: f64,
    /// Sum of in-window speed samples in m/s.
    speed_sum: f64,
    /// Number of in-window speed samples.
    speed_samples: u64,
}

impl PriorityTracker {
    /// Creates a tracker for the vehicle `tracked_id`.
    pub fn new(tracked_id: impl Into<String>, window_start: f64) -> Self {
        Self {
            tracked_id: tracked_id.into(),
            window_start,
            last_position: None,
            route_length: 0.0,
            speed_sum: 0.0,
            speed_samples: 0,
        }
    }

    /// The ID of the tracked vehicle.
    pub fn tracked_id(&self) -> &str {
        &self.tracked_id
    }

    /// Whether `id` refers to the tracked vehicle.
    pub fn is_tracked(&self, id: &str) -> bool {
        self.tracked_id == id
    }

    /// The time at which the observation window opens.
    pub fn window_start(&self) -> f64 {
        self.window_start
    }

    /// The last in-window position of the vehicle.
    pub fn last_position(&self) -> Option<Point2d> {
        self.last_position
    }

    /// The distance travelled within the window.
    pub fn route_length(&self) -> f64 {
        self.route_length
    }

    /// The sum of in-window speed samples.
    pub fn speed_sum(&self) -> f64 {
        self.speed_sum
    }

    /// The number of in-window speed samples.
    pub fn speed_samples(&self) -> u64 {
        self.speed_samples
    }

    /// Whether the vehicle has been seen since the window opened.
    pub fn has_entered(&self) -> bool {
        self.last_position.is_some()
    }

    /// Updates the tracker with an observation of the tracked vehicle made at `time`.
    ///
    /// The first in-window observation only seeds the position; every later one
    /// adds its distance from the previous position to the route length.
    pub fn observe(&mut self, time: f64, obs: &VehicleObservation) {
        debug_assert!(self.is_tracked(&obs.id));
        if time <= self.window_start {
            return;
        }
        self.speed_sum += obs.speed;
        self.speed_samples += 1;

        let pos = obs.position();
        if let Some(prev) = self.last_position {
            self.route_length += distance(prev, pos);
        }
        self.last_position = Some(pos);
    }
}

#[cfg(test)]
mod test {
    use super::PriorityTracker;
    use crate::telemetry::VehicleObservation;
    use assert_approx_eq::assert_approx_eq;

    fn amb(x: f64, y: f64, speed: f64) -> VehicleObservation {
        VehicleObservation::new("Amb", x, y, speed)
    }

    #[test]
    fn first_sample_seeds_position() {
        let mut tracker = PriorityTracker::new("Amb", 100.0);
        tracker.observe(101.0, &amb(0.0, 0.0, 5.0));
        assert_eq!(tracker.route_length(), 0.0);
        tracker.observe(102.0, &amb(3.0, 4.0, 7.0));
        assert_approx_eq!(tracker.route_length(), 5.0);
        assert_approx_eq!(tracker.speed_sum(), 12.0);
        assert_eq!(tracker.speed_samples(), 2);
    }

    #[test]
    fn origin_is_a_real_position() {
        // A vehicle that starts far away and then sits on the origin still travels.
        let mut tracker = PriorityTracker::new("Amb", 0.0);
        tracker.observe(1.0, &amb(6.0, 8.0, 1.0));
        tracker.observe(2.0, &amb(0.0, 0.0, 1.0));
        tracker.observe(3.0, &amb(0.0, 2.0, 1.0));
        assert_approx_eq!(tracker.route_length(), 12.0);
    }

    #[test]
    fn pre_window_samples_are_ignored() {
        let mut tracker = PriorityTracker::new("Amb", 100.0);
        tracker.observe(50.0, &amb(500.0, 500.0, 9.0));
        tracker.observe(100.0, &amb(400.0, 400.0, 9.0));
        assert!(!tracker.has_entered());
        assert_eq!(tracker.speed_samples(), 0);

        // The first in-window sample must not measure from a pre-window position
        tracker.observe(100.5, &amb(0.0, 0.0, 2.0));
        assert_eq!(tracker.route_length(), 0.0);
        assert_eq!(tracker.speed_samples(), 1);
    }

    #[test]
    fn route_length_is_monotonic() {
        let mut tracker = PriorityTracker::new("Amb", 0.0);
        let path = [(0.0, 0.0), (1.0, 0.0), (1.0, 0.0), (0.0, 0.0), (-2.0, 3.0)];
        let mut prev = 0.0;
        for (i, (x, y)) in path.into_iter().enumerate() {
            tracker.observe(1.0 + i as f64, &amb(x, y, 0.0));
            assert!(tracker.route_length() >= prev);
            prev = tracker.route_length();
        }
        assert_approx_eq!(prev, 2.0 + 13f64.sqrt());
    }
}
