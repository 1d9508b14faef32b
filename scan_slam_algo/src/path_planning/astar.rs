//! A* path planning over the hit grid

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use log::{trace, warn};

use super::grid::{Cell, HitGrid};
use crate::error::{Result, SlamError};
use crate::util::Point;

/// Result of A* path planning
#[derive(Debug, Clone, PartialEq)]
pub struct AStarResult {
    /// Cells from start to goal
    pub cells: Vec<Cell>,
    /// Cell centers in world coordinates (from start to goal)
    pub path: Vec<Point>,
    /// Whether a path was found
    pub success: bool,
    /// Number of iterations (nodes expanded)
    pub iterations: usize,
}

impl AStarResult {
    /// Polyline length of the path
    pub fn length(&self) -> f64 {
        self.path.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
    }
}

/// A* path planner
pub struct AStarPlanner<'a> {
    grid: &'a HitGrid,
}

/// Node for A* search
#[derive(Clone)]
struct Node {
    cell: Cell,
    g: f64, // Cost from start
    h: f64, // Heuristic to goal
    seq: u64,
}

impl Node {
    fn f(&self) -> f64 {
        self.g + self.h
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Node {}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap; equal f goes to the earlier push
        other
            .f()
            .partial_cmp(&self.f())
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// 8-directional movement
const DIRECTIONS: [(isize, isize); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

impl<'a> AStarPlanner<'a> {
    /// Create a new A* planner for the given grid
    pub fn new(grid: &'a HitGrid) -> Self {
        Self { grid }
    }

    /// Plan a path between world positions.
    ///
    /// Fails only if either position lies outside the grid; an unreachable
    /// goal is reported through [`AStarResult::success`].
    pub fn plan(&self, start: &Point, goal: &Point) -> Result<AStarResult> {
        let start_cell = self.grid.cell_of(start).ok_or(SlamError::OutsideGrid {
            x: start.x,
            y: start.y,
        })?;
        let goal_cell = self.grid.cell_of(goal).ok_or(SlamError::OutsideGrid {
            x: goal.x,
            y: goal.y,
        })?;
        Ok(self.plan_cells(start_cell, goal_cell))
    }

    /// Plan a path between two valid cells.
    ///
    /// The start cell is always expanded, even when it carries hits. If the
    /// goal cannot be reached the result holds only the start cell.
    pub fn plan_cells(&self, start: Cell, goal: Cell) -> AStarResult {
        let mut open_set = BinaryHeap::new();
        let mut closed_set = HashSet::new();
        let mut came_from: HashMap<Cell, Cell> = HashMap::new();
        let mut g_scores: HashMap<Cell, f64> = HashMap::new();
        let mut iterations = 0usize;
        let mut seq = 0u64;

        g_scores.insert(start, 0.0);
        open_set.push(Node {
            cell: start,
            g: 0.0,
            h: self.heuristic(start, goal),
            seq,
        });

        while let Some(current) = open_set.pop() {
            if !closed_set.insert(current.cell) {
                continue;
            }
            iterations += 1;

            if current.cell == goal {
                let cells = self.reconstruct_path(&came_from, start, goal);
                trace!("A* reached {:?} after {} expansions", goal, iterations);
                return AStarResult {
                    path: cells.iter().map(|&c| self.grid.center_of(c)).collect(),
                    cells,
                    success: true,
                    iterations,
                };
            }

            for (dx, dy) in DIRECTIONS {
                let (Some(nx), Some(ny)) = (
                    current.cell.0.checked_add_signed(dx),
                    current.cell.1.checked_add_signed(dy),
                ) else {
                    continue;
                };
                let neighbor = (nx, ny);
                if !self.grid.is_free(neighbor) || closed_set.contains(&neighbor) {
                    continue;
                }

                let tentative_g = current.g + self.heuristic(current.cell, neighbor);
                let known_g = g_scores.get(&neighbor).copied().unwrap_or(f64::INFINITY);
                if tentative_g < known_g {
                    came_from.insert(neighbor, current.cell);
                    g_scores.insert(neighbor, tentative_g);
                    seq += 1;
                    open_set.push(Node {
                        cell: neighbor,
                        g: tentative_g,
                        h: self.heuristic(neighbor, goal),
                        seq,
                    });
                }
            }
        }

        warn!(
            "no path from {:?} to {:?} after {} expansions",
            start, goal, iterations
        );
        AStarResult {
            cells: vec![start],
            path: vec![self.grid.center_of(start)],
            success: false,
            iterations,
        }
    }

    /// Euclidean distance between cell centers
    fn heuristic(&self, a: Cell, b: Cell) -> f64 {
        (self.grid.center_of(a) - self.grid.center_of(b)).norm()
    }

    fn reconstruct_path(&self, came_from: &HashMap<Cell, Cell>, start: Cell, goal: Cell) -> Vec<Cell> {
        let mut path = vec![goal];
        let mut current = goal;
        while current != start {
            match came_from.get(&current) {
                Some(&parent) => {
                    path.push(parent);
                    current = parent;
                }
                None => break,
            }
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_grid(n: usize) -> HitGrid {
        HitGrid::new(Point::new(0.0, 0.0), Point::new(n as f64, n as f64), n, n).unwrap()
    }

    fn block(grid: &mut HitGrid, x: usize, y: usize) {
        grid.add_hit(&grid.center_of((x, y)), 0.0);
    }

    #[test]
    fn test_simple_path_is_optimal() {
        let grid = unit_grid(10);
        let result = AStarPlanner::new(&grid).plan_cells((0, 0), (9, 9));
        assert!(result.success);
        assert_eq!(result.cells.len(), 10);
        assert_eq!(result.cells.first(), Some(&(0, 0)));
        assert_eq!(result.cells.last(), Some(&(9, 9)));
        assert_relative_eq!(result.length(), 9.0 * std::f64::consts::SQRT_2, epsilon = 1e-9);
    }

    #[test]
    fn test_straight_path_length() {
        let grid = unit_grid(10);
        let result = AStarPlanner::new(&grid)
            .plan(&Point::new(0.5, 4.5), &Point::new(9.5, 4.5))
            .unwrap();
        assert!(result.success);
        assert_relative_eq!(result.length(), 9.0, epsilon = 1e-9);
    }

    #[test]
    fn test_path_with_obstacles() {
        let mut grid = unit_grid(10);
        // Wall with a gap at y = 5
        for y in (0..10).filter(|&y| y != 5) {
            block(&mut grid, 5, y);
        }
        let result = AStarPlanner::new(&grid).plan_cells((1, 1), (8, 1));
        assert!(result.success);
        assert!(result.cells.contains(&(5, 5)));
        assert!(result.cells.iter().all(|&c| grid.is_free(c)));
    }

    #[test]
    fn test_blocked_bottleneck_returns_start_only() {
        let mut grid = unit_grid(10);
        for y in 0..10 {
            block(&mut grid, 5, y);
        }
        let result = AStarPlanner::new(&grid).plan_cells((1, 1), (8, 1));
        assert!(!result.success);
        assert_eq!(result.cells, vec![(1, 1)]);
        assert_eq!(result.path, vec![Point::new(1.5, 1.5)]);
        assert!(result.iterations > 0);
    }

    #[test]
    fn test_occupied_start_is_still_expanded() {
        let mut grid = unit_grid(5);
        block(&mut grid, 0, 0);
        let result = AStarPlanner::new(&grid).plan_cells((0, 0), (4, 0));
        assert!(result.success);
        assert_eq!(result.cells.first(), Some(&(0, 0)));
    }

    #[test]
    fn test_outside_grid_is_an_error() {
        let grid = unit_grid(5);
        let err = AStarPlanner::new(&grid)
            .plan(&Point::new(-1.0, 0.0), &Point::new(1.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, SlamError::OutsideGrid { .. }));
    }
}
