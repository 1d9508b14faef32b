//! Wall scenes loaded from `.scn` files.
//!
//! The first line holds the robot's initial `x y theta length`; every further
//! non-empty line is a wall `x1 y1 x2 y2`. Coordinates are re-centred on the
//! walls' bounding box and scaled.

use std::path::Path;

use log::debug;
use nalgebra::Matrix2;
use scan_slam_algo::util::{try_inverse2, Point, Pose};

use crate::error::{Result, SimError};

/// Default scene unit to world unit factor
pub const DEFAULT_SCENE_SCALE: f64 = 100.0;

/// Determinant below which a ray counts as parallel to a wall
const PARALLEL_LIMIT: f64 = 1e-9;

/// A straight wall segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wall {
    pub p1: Point,
    pub p2: Point,
}

impl Wall {
    pub fn new(p1: Point, p2: Point) -> Self {
        Self { p1, p2 }
    }

    /// Distance along the ray `origin + t * direction` to this wall.
    ///
    /// Solves `[-d, p2 - p1] * (t, s) = origin - p1`; `None` when the ray is
    /// parallel, misses the segment or the hit is not in front of the origin.
    pub fn ray_distance(&self, origin: &Point, direction: &Point) -> Option<f64> {
        let d = direction.try_normalize(f64::EPSILON)?;
        let edge = self.p2 - self.p1;
        let a = Matrix2::new(-d.x, edge.x, -d.y, edge.y);
        if a.determinant().abs() < PARALLEL_LIMIT {
            return None;
        }
        let ts = try_inverse2(&a)? * (origin - self.p1);
        let (t, s) = (ts[0], ts[1]);
        (t > 0.0 && (0.0..=1.0).contains(&s)).then_some(t)
    }

    /// Shortest distance from `p` to any point of the segment.
    pub fn distance_to(&self, p: &Point) -> f64 {
        let edge = self.p2 - self.p1;
        let length = edge.norm();
        if length < f64::EPSILON {
            return (p - self.p1).norm();
        }
        let along = (p - self.p1).dot(&edge) / length;
        if along < 0.0 {
            (p - self.p1).norm()
        } else if along > length {
            (p - self.p2).norm()
        } else {
            (p - self.p1 - edge * (along / length)).norm()
        }
    }
}

/// Walls plus the robot's starting pose and size, in world units.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub walls: Vec<Wall>,
    pub initial_pose: Pose,
    pub robot_length: f64,
}

impl Scene {
    pub fn load(path: &Path, scale: f64) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| SimError::SceneIo {
            path: path.to_path_buf(),
            source,
        })?;
        let scene = Self::parse(&contents, scale)?;
        debug!(
            "loaded {} walls from {}, robot length {:.1}",
            scene.walls.len(),
            path.display(),
            scene.robot_length
        );
        Ok(scene)
    }

    pub fn parse(contents: &str, scale: f64) -> Result<Self> {
        let mut lines = contents
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty());

        let (pose_line, pose_text) = lines.next().ok_or(SimError::EmptyScene)?;
        let [x, y, theta, length] = parse_numbers(pose_line, pose_text)?;

        let raw_walls = lines
            .map(|(n, text)| parse_numbers(n, text))
            .collect::<Result<Vec<[f64; 4]>>>()?;
        if raw_walls.is_empty() {
            return Err(SimError::EmptyScene);
        }

        let (mut min, mut max) = (
            Point::repeat(f64::INFINITY),
            Point::repeat(f64::NEG_INFINITY),
        );
        for [x1, y1, x2, y2] in &raw_walls {
            min = min.inf(&Point::new(x1.min(*x2), y1.min(*y2)));
            max = max.sup(&Point::new(x1.max(*x2), y1.max(*y2)));
        }
        let center = (min + max) * 0.5;
        let to_world = |x: f64, y: f64| (Point::new(x, y) - center) * scale;

        Ok(Self {
            walls: raw_walls
                .iter()
                .map(|&[x1, y1, x2, y2]| Wall::new(to_world(x1, y1), to_world(x2, y2)))
                .collect(),
            initial_pose: {
                let p = to_world(x, y);
                Pose::new(p.x, p.y, theta)
            },
            robot_length: length * scale,
        })
    }

    /// Half the robot length
    pub fn robot_radius(&self) -> f64 {
        0.5 * self.robot_length
    }

    /// Distinct wall endpoints: the places a perfect extractor reports landmarks
    pub fn corners(&self) -> Vec<Point> {
        let mut corners: Vec<Point> = Vec::new();
        for p in self.walls.iter().flat_map(|w| [w.p1, w.p2]) {
            if corners.iter().all(|c| (c - p).norm() > 1e-9) {
                corners.push(p);
            }
        }
        corners
    }

    /// Nearest wall hit along a ray, if any
    pub fn cast_ray(&self, origin: &Point, direction: &Point) -> Option<f64> {
        self.walls
            .iter()
            .filter_map(|w| w.ray_distance(origin, direction))
            .min_by(f64::total_cmp)
    }

    /// Distance from `p` to the closest wall
    pub fn clearance(&self, p: &Point) -> f64 {
        self.walls
            .iter()
            .map(|w| w.distance_to(p))
            .fold(f64::INFINITY, f64::min)
    }
}

fn parse_numbers(line: usize, text: &str) -> Result<[f64; 4]> {
    let values = text
        .split_whitespace()
        .map(|token| {
            token.parse::<f64>().map_err(|e| SimError::SceneParse {
                line,
                message: format!("{token:?}: {e}"),
            })
        })
        .collect::<Result<Vec<f64>>>()?;
    values.try_into().map_err(|v: Vec<f64>| SimError::SceneParse {
        line,
        message: format!("expected 4 numbers, found {}", v.len()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const BOX: &str = "0.5 0.5 0.0 0.1\n\
                       0 0 4 0\n\
                       4 0 4 2\n\
                       \n\
                       4 2 0 2\n\
                       0 2 0 0\n";

    #[test]
    fn test_parse_centres_and_scales() {
        let scene = Scene::parse(BOX, 100.0).unwrap();
        assert_eq!(scene.walls.len(), 4);
        // Bounding box centre (2, 1) moves to the origin.
        assert_relative_eq!(scene.walls[0].p1, Point::new(-200.0, -100.0));
        assert_relative_eq!(scene.walls[1].p2, Point::new(200.0, 100.0));
        assert_relative_eq!(scene.initial_pose, Pose::new(-150.0, -50.0, 0.0));
        assert_relative_eq!(scene.robot_length, 10.0);
        assert_relative_eq!(scene.robot_radius(), 5.0);
    }

    #[test]
    fn test_corners_are_deduplicated() {
        let scene = Scene::parse(BOX, 100.0).unwrap();
        let corners = scene.corners();
        assert_eq!(corners.len(), 4);
        assert!(corners.contains(&Point::new(200.0, -100.0)));
        assert!(corners.contains(&Point::new(-200.0, 100.0)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Scene::parse("", 1.0), Err(SimError::EmptyScene)));
        assert!(matches!(Scene::parse("0 0 0 1\n", 1.0), Err(SimError::EmptyScene)));
        assert!(matches!(
            Scene::parse("0 0 0 1\n0 0 1\n", 1.0),
            Err(SimError::SceneParse { line: 2, .. })
        ));
        assert!(matches!(
            Scene::parse("0 0 zero 1\n0 0 1 1\n", 1.0),
            Err(SimError::SceneParse { line: 1, .. })
        ));
        assert!(matches!(
            Scene::load(Path::new("/nonexistent.scn"), 1.0),
            Err(SimError::SceneIo { .. })
        ));
    }

    #[test]
    fn test_ray_distance() {
        let wall = Wall::new(Point::new(10.0, -5.0), Point::new(10.0, 5.0));
        let origin = Point::zeros();
        assert_relative_eq!(wall.ray_distance(&origin, &Point::new(1.0, 0.0)).unwrap(), 10.0);
        assert_relative_eq!(
            wall.ray_distance(&origin, &Point::new(4.0, 1.0)).unwrap(),
            (106.25f64).sqrt(),
            epsilon = 1e-9
        );
        // Behind, past the end, parallel
        assert!(wall.ray_distance(&origin, &Point::new(-1.0, 0.0)).is_none());
        assert!(wall.ray_distance(&origin, &Point::new(1.0, 1.0)).is_none());
        assert!(wall.ray_distance(&origin, &Point::new(0.0, 1.0)).is_none());
    }

    #[test]
    fn test_distance_to_segment() {
        let wall = Wall::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        assert_relative_eq!(wall.distance_to(&Point::new(5.0, 3.0)), 3.0);
        assert_relative_eq!(wall.distance_to(&Point::new(-3.0, 4.0)), 5.0);
        assert_relative_eq!(wall.distance_to(&Point::new(13.0, -4.0)), 5.0);
    }

    #[test]
    fn test_cast_ray_takes_nearest_wall() {
        let scene = Scene::parse(BOX, 100.0).unwrap();
        let hit = scene.cast_ray(&Point::zeros(), &Point::new(1.0, 0.0)).unwrap();
        assert_relative_eq!(hit, 200.0, epsilon = 1e-9);
        assert_relative_eq!(scene.clearance(&Point::new(0.0, 90.0)), 10.0, epsilon = 1e-9);
    }
}
