//! Hit-count occupancy grid for path planning

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SlamError};
use crate::util::Point;

/// Grid cell index (x, y)
pub type Cell = (usize, usize);

/// Extent and resolution of the planning grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub min_corner: [f64; 2],
    pub max_corner: [f64; 2],
    /// Cells along x and y
    pub num_cells: [usize; 2],
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            min_corner: [-1000.0, -1000.0],
            max_corner: [1000.0, 1000.0],
            num_cells: [500, 500],
        }
    }
}

/// A 2D grid of scan hit counts.
///
/// Counts only go up until [`HitGrid::clear`]; any cell with a count is
/// treated as blocked.
#[derive(Debug, Clone)]
pub struct HitGrid {
    min_corner: Point,
    max_corner: Point,
    num_cells_x: usize,
    num_cells_y: usize,
    cell_size: Vector2<f64>,
    /// Row-major hit counts, `y * num_cells_x + x`
    hits: Vec<u32>,
    /// Bumped on every change to the counts
    revision: u64,
}

impl HitGrid {
    /// Create an empty grid spanning `min_corner..max_corner`
    pub fn new(min_corner: Point, max_corner: Point, num_cells_x: usize, num_cells_y: usize) -> Result<Self> {
        if num_cells_x == 0 || num_cells_y == 0 {
            return Err(SlamError::InvalidConfig("grid needs at least one cell per axis".into()));
        }
        let extent = max_corner - min_corner;
        if !(extent.x > 0.0 && extent.y > 0.0) {
            return Err(SlamError::InvalidConfig(format!(
                "grid max corner ({}, {}) must lie above and right of min corner ({}, {})",
                max_corner.x, max_corner.y, min_corner.x, min_corner.y
            )));
        }
        Ok(Self {
            min_corner,
            max_corner,
            num_cells_x,
            num_cells_y,
            cell_size: Vector2::new(extent.x / num_cells_x as f64, extent.y / num_cells_y as f64),
            hits: vec![0; num_cells_x * num_cells_y],
            revision: 0,
        })
    }

    pub fn from_config(config: &GridConfig) -> Result<Self> {
        Self::new(
            Point::from(config.min_corner),
            Point::from(config.max_corner),
            config.num_cells[0],
            config.num_cells[1],
        )
    }

    pub fn num_cells(&self) -> (usize, usize) {
        (self.num_cells_x, self.num_cells_y)
    }

    pub fn cell_size(&self) -> Vector2<f64> {
        self.cell_size
    }

    /// Get the world bounds of the grid
    pub fn world_bounds(&self) -> (Point, Point) {
        (self.min_corner, self.max_corner)
    }

    /// Counter that changes whenever the hit counts change
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Check if a cell index is within bounds
    pub fn is_valid(&self, cell: Cell) -> bool {
        cell.0 < self.num_cells_x && cell.1 < self.num_cells_y
    }

    /// Cell containing a world point, or None outside the grid
    pub fn cell_of(&self, p: &Point) -> Option<Cell> {
        let rel = p - self.min_corner;
        let gx = (rel.x / self.cell_size.x).floor();
        let gy = (rel.y / self.cell_size.y).floor();
        if gx < 0.0 || gy < 0.0 || !gx.is_finite() || !gy.is_finite() {
            return None;
        }
        let cell = (gx as usize, gy as usize);
        self.is_valid(cell).then_some(cell)
    }

    /// World coordinates of the cell center
    pub fn center_of(&self, cell: Cell) -> Point {
        Point::new(
            self.min_corner.x + (cell.0 as f64 + 0.5) * self.cell_size.x,
            self.min_corner.y + (cell.1 as f64 + 0.5) * self.cell_size.y,
        )
    }

    /// Hit count of a cell (0 outside the grid)
    pub fn hits(&self, cell: Cell) -> u32 {
        if self.is_valid(cell) {
            self.hits[cell.1 * self.num_cells_x + cell.0]
        } else {
            0
        }
    }

    /// Check if a cell is free (valid and never hit)
    pub fn is_free(&self, cell: Cell) -> bool {
        self.is_valid(cell) && self.hits(cell) == 0
    }

    /// Record a scan return at `p`, inflated by `agent_radius`.
    ///
    /// Every cell whose center is within `agent_radius` of the hit cell's center
    /// is incremented. Returns false when `p` is outside the grid.
    pub fn add_hit(&mut self, p: &Point, agent_radius: f64) -> bool {
        let Some(hit) = self.cell_of(p) else {
            return false;
        };
        let radius = agent_radius.max(0.0);
        let rx = (radius / self.cell_size.x).ceil() as usize;
        let ry = (radius / self.cell_size.y).ceil() as usize;
        let center = self.center_of(hit);

        let x_range = hit.0.saturating_sub(rx)..=(hit.0 + rx).min(self.num_cells_x - 1);
        for x in x_range {
            let y_range = hit.1.saturating_sub(ry)..=(hit.1 + ry).min(self.num_cells_y - 1);
            for y in y_range {
                if (self.center_of((x, y)) - center).norm() <= radius {
                    let idx = y * self.num_cells_x + x;
                    self.hits[idx] = self.hits[idx].saturating_add(1);
                }
            }
        }
        self.revision += 1;
        true
    }

    /// Cells with at least one hit, with their counts
    pub fn occupied_cells(&self) -> impl Iterator<Item = (Cell, u32)> + '_ {
        self.hits
            .iter()
            .enumerate()
            .filter(|(_, &h)| h > 0)
            .map(|(i, &h)| ((i % self.num_cells_x, i / self.num_cells_x), h))
    }

    /// Reset every count to zero
    pub fn clear(&mut self) {
        self.hits.iter_mut().for_each(|h| *h = 0);
        self.revision += 1;
    }
}
