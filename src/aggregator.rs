use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::grid::{GridBounds, GridSnapshot, SpatialGrid};
use crate::score::{compose, ScoreRecord};
use crate::telemetry::TimestepRecord;
use crate::tracker::PriorityTracker;

/// Consumes a time-ordered telemetry stream in a single pass, feeding
/// the spatial grid, the priority vehicle tracker and the overall speed totals.
#[derive(Clone, Debug)]
pub struct Aggregator {
    /// The speed and visit grid, fed every observation.
    grid: SpatialGrid,
    /// The priority vehicle tracker.
    tracker: PriorityTracker,
    /// Sum of in-window speeds of all vehicles.
    overall_speed_sum: f64,
    /// Number of in-window observations of all vehicles.
    overall_count: u64,
    /// The time of the most recent timestep, if any has been consumed.
    last_time: Option<f64>,
    /// Reference speed for the composite value.
    speed_normalizer: f64,
    /// The number of timesteps consumed.
    records: u64,
    /// The number of observations consumed.
    observations: u64,
}

/// The final results of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub score: ScoreRecord,
    pub grid: GridSnapshot,
    /// The number of timesteps consumed.
    pub records: u64,
    /// The number of vehicle observations consumed.
    pub observations: u64,
    /// The number of observations that fell outside the grid.
    pub dropped_observations: u64,
}

impl Aggregator {
    /// Creates an aggregator from a validated configuration.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            grid: SpatialGrid::new(config.bounds()),
            tracker: PriorityTracker::new(config.tracked_vehicle_id.clone(), config.window_start),
            overall_speed_sum: 0.0,
            overall_count: 0,
            last_time: None,
            speed_normalizer: config.speed_normalizer,
            records: 0,
            observations: 0,
        })
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn tracker(&self) -> &PriorityTracker {
        &self.tracker
    }

    pub fn bounds(&self) -> GridBounds {
        self.grid.bounds()
    }

    /// The time of the latest consumed timestep, or 0 if there has been none.
    pub fn last_time(&self) -> f64 {
        self.last_time.unwrap_or(0.0)
    }

    /// Whether timesteps were consumed but none of them reached the window.
    pub fn ended_before_window(&self) -> bool {
        self.records > 0 && self.last_time() <= self.tracker.window_start()
    }

    /// Adds one timestep to the running totals.
    ///
    /// Fails without modifying any state if `record` has a non-finite time
    /// or is earlier than the previously consumed timestep.
    pub fn push(&mut self, record: &TimestepRecord) -> Result<()> {
        if !record.time.is_finite() {
            return Err(Error::NonFiniteTime(record.time));
        }
        if let Some(last_time) = self.last_time {
            if record.time < last_time {
                return Err(Error::StreamOrdering {
                    time: record.time,
                    last_time,
                });
            }
        }
        self.last_time = Some(record.time);
        self.records += 1;

        let in_window = record.time > self.tracker.window_start();
        for obs in &record.observations {
            self.observations += 1;
            self.grid.record(obs.x, obs.y, obs.speed);
            if in_window {
                self.overall_speed_sum += obs.speed;
                self.overall_count += 1;
            }
            if self.tracker.is_tracked(&obs.id) {
                self.tracker.observe(record.time, obs);
            }
        }
        Ok(())
    }

    /// Consumes every record of an infallible stream.
    pub fn consume<I>(&mut self, stream: I) -> Result<()>
    where
        I: IntoIterator<Item = TimestepRecord>,
    {
        for record in stream {
            self.push(&record)?;
        }
        Ok(())
    }

    /// Consumes every record of a stream whose source can fail, such as a file reader.
    /// Stops at the first error from either the source or the ordering check.
    pub fn try_consume<I>(&mut self, stream: I) -> Result<()>
    where
        I: IntoIterator<Item = Result<TimestepRecord>>,
    {
        for record in stream {
            self.push(&record?)?;
        }
        Ok(())
    }

    /// Computes the score and normalized grid from the current totals.
    ///
    /// Does not modify the aggregator, so calling it twice without consuming
    /// anything in between gives identical results.
    pub fn finalize(&self) -> RunSummary {
        let last_time = self.last_time();
        if self.ended_before_window() {
            log::warn!(
                "Stream ended at t={} before the window opened at t={}",
                last_time,
                self.tracker.window_start()
            );
        }
        let score = compose(
            &self.tracker,
            self.overall_speed_sum,
            self.overall_count,
            last_time,
            self.speed_normalizer,
        );

        // The grid is normalized by total elapsed time, not by the window
        let grid = match self.grid.finalize(last_time) {
            Ok(grid) => grid,
            Err(err) => {
                if self.records > 0 {
                    log::warn!("{}; writing an empty grid", err);
                }
                GridSnapshot::zeroed(self.grid.bounds())
            }
        };

        if self.grid.dropped() > 0 {
            log::debug!(
                "Dropped {} of {} observations outside the grid",
                self.grid.dropped(),
                self.observations
            );
        }

        RunSummary {
            score,
            grid,
            records: self.records,
            observations: self.observations,
            dropped_observations: self.grid.dropped(),
        }
    }
}
