use crate::error::{Error, Result};
use crate::grid::GridBounds;
use crate::util::Interval;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The largest grid a configuration may describe, in cells.
pub const MAX_GRID_CELLS: usize = 1 << 28;

/// Parameters of a single scoring pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Lower x bound of the grid, inclusive.
    pub x_min: f64,
    /// Upper x bound of the grid, exclusive.
    pub x_max: f64,
    /// Lower y bound of the grid, inclusive.
    pub y_min: f64,
    /// Upper y bound of the grid, exclusive.
    pub y_max: f64,
    /// The side length of a grid cell, in map units.
    pub cell_size: f64,
    /// Simulation time in s after which telemetry counts towards the score.
    pub window_start: f64,
    /// The ID of the priority vehicle.
    pub tracked_vehicle_id: String,
    /// Reference speed in m/s used to normalize the composite value.
    pub speed_normalizer: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            x_min: 0.0,
            x_max: 2800.0,
            y_min: 0.0,
            y_max: 2900.0,
            cell_size: 10.0,
            window_start: 100.0,
            tracked_vehicle_id: "Amb".to_string(),
            speed_normalizer: 30.0,
        }
    }
}

impl EngineConfig {
    /// Reads a configuration from a JSON file. Missing fields take their default values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|err| Error::config(format!("{}: {}", path.display(), err)))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration describes a usable grid and score.
    pub fn validate(&self) -> Result<()> {
        if !Interval::new(self.x_min, self.x_max).is_valid() {
            return Err(Error::config(format!(
                "empty x extent [{}, {})",
                self.x_min, self.x_max
            )));
        }
        if !Interval::new(self.y_min, self.y_max).is_valid() {
            return Err(Error::config(format!(
                "empty y extent [{}, {})",
                self.y_min, self.y_max
            )));
        }
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(Error::config(format!(
                "cell size must be positive, got {}",
                self.cell_size
            )));
        }
        match self.bounds().cell_count() {
            Some(cells) if cells <= MAX_GRID_CELLS => {}
            _ => {
                return Err(Error::config(format!(
                    "cell size {} gives more than {} cells",
                    self.cell_size, MAX_GRID_CELLS
                )))
            }
        }
        if !self.window_start.is_finite() {
            return Err(Error::config("window start must be finite"));
        }
        if !(self.speed_normalizer.is_finite() && self.speed_normalizer > 0.0) {
            return Err(Error::config(format!(
                "speed normalizer must be positive, got {}",
                self.speed_normalizer
            )));
        }
        if self.tracked_vehicle_id.is_empty() {
            return Err(Error::config("tracked vehicle ID is empty"));
        }
        Ok(())
    }

    /// The spatial extent and resolution of the grid.
    pub fn bounds(&self) -> GridBounds {
        GridBounds {
            x: Interval::new(self.x_min, self.x_max),
            y: Interval::new(self.y_min, self.y_max),
            cell_size: self.cell_size,
        }
    }
}

#[cfg(test)]
mod test {
    use super::EngineConfig;
    use crate::Error;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        let bounds = config.bounds();
        assert_eq!(bounds.width(), 280);
        assert_eq!(bounds.height(), 290);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "cell_size": 5.0, "tracked_vehicle_id": "ems0" }"#).unwrap();
        assert_eq!(config.cell_size, 5.0);
        assert_eq!(config.tracked_vehicle_id, "ems0");
        assert_eq!(config.x_max, 2800.0);
        assert_eq!(config.window_start, 100.0);
    }

    #[test]
    fn rejects_bad_values() {
        let bad = [
            EngineConfig {
                cell_size: 0.0,
                ..Default::default()
            },
            EngineConfig {
                x_max: -1.0,
                ..Default::default()
            },
            EngineConfig {
                y_min: f64::NAN,
                ..Default::default()
            },
            EngineConfig {
                cell_size: 1e-300,
                ..Default::default()
            },
            EngineConfig {
                cell_size: 0.01,
                ..Default::default()
            },
            EngineConfig {
                x_min: -1e300,
                x_max: 1e300,
                ..Default::default()
            },
            EngineConfig {
                speed_normalizer: 0.0,
                ..Default::default()
            },
            EngineConfig {
                tracked_vehicle_id: String::new(),
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        }
    }
}
