//! The telemetry data model, and adapters over streams of it.

use crate::error::Result;
use crate::math::Point2d;
use serde::{Deserialize, Serialize};

/// One vehicle's reported state at a timestep.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehicleObservation {
    /// The vehicle ID, unique among vehicles present at the same time.
    pub id: String,
    /// The x coordinate on the map plane.
    pub x: f64,
    /// The y coordinate on the map plane.
    pub y: f64,
    /// The instantaneous speed in m/s.
    pub speed: f64,
}

impl VehicleObservation {
    pub fn new(id: impl Into<String>, x: f64, y: f64, speed: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            speed,
        }
    }

    /// The observed position as a point.
    pub fn position(&self) -> Point2d {
        Point2d::new(self.x, self.y)
    }
}

/// All observations made at one simulated instant.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimestepRecord {
    /// The simulation time in s.
    pub time: f64,
    /// The vehicles present at this time, in no particular order.
    pub observations: Vec<VehicleObservation>,
}

impl TimestepRecord {
    pub fn new(time: f64, observations: Vec<VehicleObservation>) -> Self {
        Self { time, observations }
    }

    /// Whether the vehicle `id` appears in this timestep.
    pub fn contains(&self, id: &str) -> bool {
        self.observations.iter().any(|obs| obs.id == id)
    }
}

/// Wraps a telemetry stream so that it ends once the tracked vehicle has arrived.
///
/// The vehicle counts as arrived at the first in-window timestep it is missing from,
/// after having been present in an earlier in-window timestep. That timestep is
/// still yielded; nothing after it is.
pub struct ArrivalCutoff<I> {
    inner: I,
    tracked_id: String,
    window_start: f64,
    seen: bool,
    arrived: bool,
}

impl<I> ArrivalCutoff<I>
where
    I: Iterator<Item = Result<TimestepRecord>>,
{
    pub fn new(inner: I, tracked_id: impl Into<String>, window_start: f64) -> Self {
        Self {
            inner,
            tracked_id: tracked_id.into(),
            window_start,
            seen: false,
            arrived: false,
        }
    }

    /// Whether the tracked vehicle has been detected as arrived.
    pub fn arrived(&self) -> bool {
        self.arrived
    }
}

impl<I> Iterator for ArrivalCutoff<I>
where
    I: Iterator<Item = Result<TimestepRecord>>,
{
    type Item = Result<TimestepRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.arrived {
            return None;
        }
        let record = match self.inner.next()? {
            Ok(record) => record,
            Err(err) => return Some(Err(err)),
        };
        if record.time > self.window_start {
            let present = record.contains(&self.tracked_id);
            if present {
                self.seen = true;
            } else if self.seen {
                log::info!(
                    "{} arrived by t={}, ending stream",
                    self.tracked_id,
                    record.time
                );
                self.arrived = true;
            }
        }
        Some(Ok(record))
    }
}
