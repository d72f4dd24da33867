use crate::error::{Error, Result};
use crate::util::Interval;
use itertools::iproduct;
use serde::{Deserialize, Serialize};

/// The extent and resolution of a [SpatialGrid].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridBounds {
    /// The covered x range, `[x_min, x_max)`.
    pub x: Interval,
    /// The covered y range, `[y_min, y_max)`.
    pub y: Interval,
    /// The side length of a cell.
    pub cell_size: f64,
}

impl GridBounds {
    /// The number of cells along the x axis.
    pub fn width(&self) -> usize {
        self.x.buckets(self.cell_size)
    }

    /// The number of cells along the y axis.
    pub fn height(&self) -> usize {
        self.y.buckets(self.cell_size)
    }

    /// The total number of cells, or `None` if it does not fit in a `usize`.
    pub fn cell_count(&self) -> Option<usize> {
        self.width().checked_mul(self.height())
    }

    /// Maps map-plane coordinates to a `(cell_x, cell_y)` index,
    /// or `None` if the point lies outside the grid.
    pub fn cell(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let cx = self.x.bucket(x, self.cell_size)?;
        let cy = self.y.bucket(y, self.cell_size)?;
        Some((cx, cy))
    }
}

/// Running totals for the observations that fell into one cell.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CellAccumulator {
    /// The sum of all observed speeds in m/s.
    pub speed_sum: f64,
    /// The number of observations.
    pub visits: u64,
}

impl CellAccumulator {
    fn add(&mut self, speed: f64) {
        self.speed_sum += speed;
        self.visits += 1;
    }
}

/// A fixed-resolution 2D bucketing of vehicle observations.
#[derive(Clone, Debug)]
pub struct SpatialGrid {
    bounds: GridBounds,
    width: usize,
    height: usize,
    /// Cells stored x-major, i.e. `cells[cx * height + cy]`.
    cells: Vec<CellAccumulator>,
    /// Observations dropped for lying outside the grid.
    dropped: u64,
}

impl SpatialGrid {
    /// Creates a zero-filled grid covering `bounds`.
    ///
    /// `bounds` should come from a validated [EngineConfig](crate::EngineConfig);
    /// panics if the cell count overflows.
    pub fn new(bounds: GridBounds) -> Self {
        let width = bounds.width();
        let height = bounds.height();
        Self {
            bounds,
            width,
            height,
            cells: vec![CellAccumulator::default(); bounds.cell_count().expect("grid too large")],
            dropped: 0,
        }
    }

    pub fn bounds(&self) -> GridBounds {
        self.bounds
    }

    /// The grid dimensions as `(width, height)` in cells.
    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// The number of observations dropped for lying outside the grid.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Gets the accumulator of a cell, or `None` if the index is out of range.
    pub fn cell(&self, cx: usize, cy: usize) -> Option<&CellAccumulator> {
        if cx < self.width && cy < self.height {
            self.cells.get(cx * self.height + cy)
        } else {
            None
        }
    }

    /// Adds one observation to the cell containing `(x, y)`.
    /// Observations outside the grid leave every cell untouched.
    pub fn record(&mut self, x: f64, y: f64, speed: f64) {
        match self.bounds.cell(x, y) {
            Some((cx, cy)) => self.cells[cx * self.height + cy].add(speed),
            None => self.dropped += 1,
        }
    }

    /// Normalizes every cell by the elapsed simulated time, producing the
    /// average speed and average visit rate maps.
    ///
    /// # Parameters
    /// * `total_duration` - The elapsed simulation time in s; must be positive.
    pub fn finalize(&self, total_duration: f64) -> Result<GridSnapshot> {
        if !(total_duration > 0.0) {
            return Err(Error::NonPositiveDuration(total_duration));
        }
        let speed = self
            .cells
            .iter()
            .map(|cell| cell.speed_sum / total_duration)
            .collect();
        let visits = self
            .cells
            .iter()
            .map(|cell| cell.visits as f64 / total_duration)
            .collect();
        Ok(GridSnapshot {
            average_speed: GridArray::from_values(self.bounds, speed),
            average_visit_rate: GridArray::from_values(self.bounds, visits),
        })
    }
}

/// A dense array of per-cell values shaped `[width][height]`,
/// together with the bounds needed to map indices back to coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridArray {
    pub bounds: GridBounds,
    pub width: usize,
    pub height: usize,
    /// Values stored x-major.
    pub values: Vec<f64>,
}

impl GridArray {
    fn from_values(bounds: GridBounds, values: Vec<f64>) -> Self {
        let (width, height) = (bounds.width(), bounds.height());
        debug_assert_eq!(values.len(), width * height);
        Self {
            bounds,
            width,
            height,
            values,
        }
    }

    /// Creates an all-zero array covering `bounds`.
    pub fn zeroed(bounds: GridBounds) -> Self {
        let len = bounds.cell_count().expect("grid too large");
        Self::from_values(bounds, vec![0.0; len])
    }

    /// Gets the value of a cell.
    pub fn get(&self, cx: usize, cy: usize) -> Option<f64> {
        if cx < self.width && cy < self.height {
            self.values.get(cx * self.height + cy).copied()
        } else {
            None
        }
    }

    /// Returns an iterator over the columns of the array, one slice of `height` values per x index.
    pub fn columns(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks(self.height.max(1))
    }

    /// Returns an iterator over `(cell_x, cell_y, value)` for every cell.
    pub fn iter_cells(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        iproduct!(0..self.width, 0..self.height)
            .zip(self.values.iter())
            .map(|((cx, cy), value)| (cx, cy, *value))
    }
}

/// The normalized output maps of a grid.
#[derive(Clone, Debug, PartialEq)]
pub struct GridSnapshot {
    /// Per-cell speed sum divided by elapsed time.
    pub average_speed: GridArray,
    /// Per-cell visit count divided by elapsed time.
    pub average_visit_rate: GridArray,
}

impl GridSnapshot {
    /// An all-zero snapshot, used when there is no elapsed time to normalize by.
    pub fn zeroed(bounds: GridBounds) -> Self {
        Self {
            average_speed: GridArray::zeroed(bounds),
            average_visit_rate: GridArray::zeroed(bounds),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{GridBounds, SpatialGrid};
    use crate::util::Interval;
    use crate::Error;
    use assert_approx_eq::assert_approx_eq;

    fn bounds(x_max: f64, y_max: f64, cell_size: f64) -> GridBounds {
        GridBounds {
            x: Interval::new(0.0, x_max),
            y: Interval::new(0.0, y_max),
            cell_size,
        }
    }

    #[test]
    fn single_cell_averages() {
        let mut grid = SpatialGrid::new(bounds(10.0, 10.0, 10.0));
        grid.record(1.0, 1.0, 10.0);
        grid.record(1.0, 1.0, 20.0);
        grid.record(20.0, 20.0, 99.0);

        assert_eq!(grid.dims(), (1, 1));
        assert_eq!(grid.dropped(), 1);

        let snapshot = grid.finalize(2.0).unwrap();
        assert_approx_eq!(snapshot.average_speed.get(0, 0).unwrap(), 15.0);
        assert_approx_eq!(snapshot.average_visit_rate.get(0, 0).unwrap(), 1.0);
    }

    #[test]
    fn out_of_bounds_leaves_cells_untouched() {
        let mut grid = SpatialGrid::new(bounds(30.0, 20.0, 10.0));
        for (x, y) in [
            (-0.1, 5.0),
            (5.0, -0.1),
            (30.0, 5.0),
            (5.0, 20.0),
            (f64::NAN, 5.0),
            (f64::INFINITY, 5.0),
            (1e300, -1e300),
        ] {
            grid.record(x, y, 13.0);
        }
        assert_eq!(grid.dropped(), 7);
        for cx in 0..3 {
            for cy in 0..2 {
                let cell = grid.cell(cx, cy).unwrap();
                assert_eq!(cell.visits, 0);
                assert_eq!(cell.speed_sum, 0.0);
            }
        }
    }

    #[test]
    fn cells_are_x_major() {
        let mut grid = SpatialGrid::new(bounds(30.0, 20.0, 10.0));
        grid.record(25.0, 5.0, 4.0);
        grid.record(5.0, 15.0, 8.0);
        grid.record(5.0, 15.0, 0.0);

        assert_eq!(grid.cell(2, 0).unwrap().visits, 1);
        assert_eq!(grid.cell(0, 1).unwrap().visits, 2);
        assert!(grid.cell(3, 0).is_none());

        let snapshot = grid.finalize(4.0).unwrap();
        let columns: Vec<&[f64]> = snapshot.average_speed.columns().collect();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[2], &[1.0, 0.0]);
        assert_eq!(columns[0], &[0.0, 2.0]);
        assert_approx_eq!(snapshot.average_visit_rate.get(0, 1).unwrap(), 0.5);

        let visited: Vec<_> = snapshot
            .average_visit_rate
            .iter_cells()
            .filter(|(_, _, v)| *v > 0.0)
            .map(|(cx, cy, _)| (cx, cy))
            .collect();
        assert_eq!(visited, vec![(0, 1), (2, 0)]);
    }

    #[test]
    fn visit_counts_never_decrease() {
        let mut grid = SpatialGrid::new(bounds(20.0, 20.0, 10.0));
        let mut prev = 0;
        for i in 0..50 {
            grid.record(15.0, 3.0, i as f64);
            grid.record(-1.0, 3.0, i as f64);
            let visits = grid.cell(1, 0).unwrap().visits;
            assert!(visits >= prev);
            prev = visits;
        }
        assert_eq!(prev, 50);
    }

    #[test]
    fn cell_count_detects_overflow() {
        assert_eq!(bounds(30.0, 20.0, 10.0).cell_count(), Some(6));
        assert_eq!(bounds(2800.0, 2900.0, 1e-300).cell_count(), None);
    }

    #[test]
    fn finalize_rejects_non_positive_duration() {
        let grid = SpatialGrid::new(bounds(10.0, 10.0, 10.0));
        assert!(matches!(
            grid.finalize(0.0),
            Err(Error::NonPositiveDuration(_))
        ));
        assert!(matches!(
            grid.finalize(-3.0),
            Err(Error::NonPositiveDuration(_))
        ));
    }
}
