//! Re-planning when new hits land on the current path

use log::debug;

use super::astar::{AStarPlanner, AStarResult};
use super::grid::HitGrid;
use crate::error::Result;
use crate::util::Point;

/// Keeps a plan to a fixed goal and re-plans when the grid obstructs it.
///
/// A failed plan is retried only after the grid has changed.
#[derive(Debug, Clone)]
pub struct ReactivePlanner {
    goal: Point,
    plan: Option<AStarResult>,
    /// Grid revision the current plan was computed against
    planned_at: u64,
    replans: usize,
}

impl ReactivePlanner {
    pub fn new(goal: Point) -> Self {
        Self {
            goal,
            plan: None,
            planned_at: 0,
            replans: 0,
        }
    }

    pub fn goal(&self) -> Point {
        self.goal
    }

    pub fn plan(&self) -> Option<&AStarResult> {
        self.plan.as_ref()
    }

    /// Number of plans computed so far, the first one included
    pub fn replans(&self) -> usize {
        self.replans
    }

    /// True if any cell of the current plan from `from_index` on has hits.
    ///
    /// A missing plan counts as blocked.
    pub fn is_blocked(&self, grid: &HitGrid, from_index: usize) -> bool {
        match &self.plan {
            None => true,
            Some(plan) => plan.cells.iter().skip(from_index).any(|&c| grid.hits(c) > 0),
        }
    }

    fn needs_plan(&self, grid: &HitGrid, progress: usize) -> bool {
        match &self.plan {
            None => true,
            Some(plan) if !plan.success => grid.revision() != self.planned_at,
            // The cell the plan starts from is where the robot was; never an obstruction.
            Some(_) => self.is_blocked(grid, progress.max(1)),
        }
    }

    /// Re-plan from `position` if the path past waypoint `progress` is obstructed.
    ///
    /// Returns true when a new plan was computed.
    pub fn update(&mut self, grid: &HitGrid, position: &Point, progress: usize) -> Result<bool> {
        if !self.needs_plan(grid, progress) {
            return Ok(false);
        }
        let plan = AStarPlanner::new(grid).plan(position, &self.goal)?;
        debug!(
            "plan #{}: {} waypoints, success={}, {} expansions",
            self.replans + 1,
            plan.path.len(),
            plan.success,
            plan.iterations
        );
        self.plan = Some(plan);
        self.planned_at = grid.revision();
        self.replans += 1;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_grid(n: usize) -> HitGrid {
        HitGrid::new(Point::new(0.0, 0.0), Point::new(n as f64, n as f64), n, n).unwrap()
    }

    #[test]
    fn test_first_update_plans() {
        let grid = unit_grid(10);
        let mut planner = ReactivePlanner::new(Point::new(9.5, 0.5));
        assert!(planner.is_blocked(&grid, 0));
        assert!(planner.update(&grid, &Point::new(0.5, 0.5), 0).unwrap());
        assert!(planner.plan().unwrap().success);
        assert!(!planner.update(&grid, &Point::new(0.5, 0.5), 0).unwrap());
        assert_eq!(planner.replans(), 1);
    }

    #[test]
    fn test_hit_on_path_triggers_replan() {
        let mut grid = unit_grid(10);
        let mut planner = ReactivePlanner::new(Point::new(9.5, 0.5));
        planner.update(&grid, &Point::new(0.5, 0.5), 0).unwrap();

        // A hit on the robot's own cell is not an obstruction.
        grid.add_hit(&Point::new(0.5, 0.5), 0.0);
        assert!(planner.is_blocked(&grid, 0));
        assert!(!planner.update(&grid, &Point::new(0.5, 0.5), 0).unwrap());

        grid.add_hit(&Point::new(5.5, 0.5), 0.0);
        assert!(planner.is_blocked(&grid, 1));
        assert!(planner.update(&grid, &Point::new(1.5, 0.5), 1).unwrap());
        let plan = planner.plan().unwrap();
        assert!(plan.success);
        assert!(!plan.cells.contains(&(5, 0)));
        assert_eq!(planner.replans(), 2);
    }

    #[test]
    fn test_failed_plan_waits_for_new_hits() {
        let mut grid = unit_grid(10);
        for y in 0..10 {
            grid.add_hit(&Point::new(5.5, y as f64 + 0.5), 0.0);
        }
        let mut planner = ReactivePlanner::new(Point::new(9.5, 0.5));
        assert!(planner.update(&grid, &Point::new(0.5, 0.5), 0).unwrap());
        assert!(!planner.plan().unwrap().success);
        assert!(!planner.update(&grid, &Point::new(0.5, 0.5), 0).unwrap());

        grid.add_hit(&Point::new(2.5, 2.5), 0.0);
        assert!(planner.update(&grid, &Point::new(0.5, 0.5), 0).unwrap());
        assert_eq!(planner.replans(), 2);
    }

    #[test]
    fn test_position_outside_grid_is_an_error() {
        let grid = unit_grid(10);
        let mut planner = ReactivePlanner::new(Point::new(9.5, 0.5));
        assert!(planner.update(&grid, &Point::new(-5.0, 0.5), 0).is_err());
    }
}
