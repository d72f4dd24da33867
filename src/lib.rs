//! Aggregates per-timestep vehicle telemetry from a traffic microsimulation
//! into a speed/visit-density grid and a score for a priority vehicle.

pub use aggregator::{Aggregator, RunSummary};
pub use cgmath;
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use fcd::FcdReader;
pub use grid::{CellAccumulator, GridArray, GridBounds, GridSnapshot, SpatialGrid};
pub use score::{compose, ScoreRecord};
pub use telemetry::{ArrivalCutoff, TimestepRecord, VehicleObservation};
pub use tracker::PriorityTracker;
pub use util::Interval;

mod aggregator;
mod config;
mod error;
pub mod fcd;
mod grid;
pub mod math;
pub mod output;
mod score;
mod telemetry;
mod tracker;
mod util;
