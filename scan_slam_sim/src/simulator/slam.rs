//! Online EKF-SLAM session: truth world, estimator, map and planner in one loop.

use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::{debug, info, trace};
use scan_slam_algo::extraction::{Extraction, LineFeatureExtractor, RawScan};
use scan_slam_algo::path_planning::{HitGrid, PathFollower, ReactivePlanner};
use scan_slam_algo::slam::{
    augment_update, propagate, to_relative_measurement, AugmentReport, EkfSlamState,
    RelativeMeasurement,
};
use scan_slam_algo::util::{normalize_angle, CovarianceEllipse, Point, Pose};
use serde::{Deserialize, Serialize};

use super::common::{ErrorTracker, TrackSample, TrajectoryHistory, DEFAULT_HISTORY_LEN};
use super::world::World;
use super::Simulate;
use crate::config::SimConfig;
use crate::error::Result;
use crate::robot::laser_origin;
use crate::scene::Scene;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// World position to drive to; without one the robot runs open loop
    pub goal: Option<[f64; 2]>,
    /// `(v, w)` commanded when there is no goal
    pub open_loop_control: [f64; 2],
    /// Length of the trajectory and error histories
    pub history_len: usize,
    /// Step log entries kept; the oldest are dropped first
    pub max_log_entries: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            goal: None,
            open_loop_control: [4.0, 0.15],
            history_len: DEFAULT_HISTORY_LEN,
            max_log_entries: 5000,
        }
    }
}

/// Log entry for one processed sweep
#[derive(Debug, Clone, PartialEq)]
pub struct StepLog {
    pub tick: u64,
    pub true_pose: Pose,
    pub est_pose: Pose,
    pub pos_error: f64,
    pub heading_error: f64,
    pub lines: usize,
    pub observed: usize,
    pub report: AugmentReport,
    pub n_landmarks_in_state: usize,
    /// 2σ ellipse of the estimated position
    pub position_ellipse: CovarianceEllipse,
}

/// End-of-run figures for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub label: String,
    pub ticks: u64,
    pub crashed: bool,
    pub landmarks: usize,
    pub final_error: f64,
    pub rms_error: f64,
    pub dr_error: f64,
    /// `(success, plans computed)` when driving to a goal
    pub plan: Option<(bool, usize)>,
    /// Reached the goal along a successful plan
    pub arrived: bool,
    /// 2σ ellipse of the final position estimate
    pub position_ellipse: CovarianceEllipse,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ticks, {} landmarks, pose error {:.2} (rms {:.2}, dead reckoning {:.2}, 2σ {:.2}x{:.2})",
            self.label,
            self.ticks,
            self.landmarks,
            self.final_error,
            self.rms_error,
            self.dr_error,
            self.position_ellipse.semi_major,
            self.position_ellipse.semi_minor
        )?;
        if let Some((success, plans)) = self.plan {
            let status = if self.arrived {
                "arrived"
            } else if success {
                "en route"
            } else {
                "could not be reached"
            };
            write!(f, ", goal {status} after {plans} plan(s)")?;
        }
        if self.crashed {
            write!(f, ", CRASHED")?;
        }
        Ok(())
    }
}

/// EKF-SLAM running against a simulated robot
pub struct SlamSession {
    label: String,
    config: SimConfig,
    world: World,
    extractor: LineFeatureExtractor,
    state: EkfSlamState,
    grid: HitGrid,
    planner: Option<ReactivePlanner>,
    follower: PathFollower,
    /// Pose from integrating the executed control without corrections
    dr_pose: Pose,
    history: TrajectoryHistory,
    errors: ErrorTracker,
    last_extraction: Extraction,
    logs: VecDeque<StepLog>,
}

impl SlamSession {
    pub fn new(scene: Scene, config: SimConfig) -> Result<Self> {
        let slam = &config.slam;
        let extractor = LineFeatureExtractor::new(slam.extraction.clone(), slam.laser.clone());
        let grid = HitGrid::from_config(&slam.grid)?;
        let world = World::new(
            scene,
            config.robot.clone(),
            slam.laser.clone(),
            config.laser_noise.clone(),
            &config.world,
        );
        let initial = world.scene().initial_pose;

        let mut session = Self {
            label: slam.extraction.kind.label().to_string(),
            state: EkfSlamState::with_pose(&initial, &slam.ekf.initial_pose_variance),
            planner: config.session.goal.map(|g| ReactivePlanner::new(Point::from(g))),
            follower: PathFollower::new(slam.follower.clone()),
            dr_pose: initial,
            history: TrajectoryHistory::new(config.session.history_len),
            errors: ErrorTracker::new(config.session.history_len),
            last_extraction: Extraction::default(),
            logs: VecDeque::new(),
            extractor,
            grid,
            world,
            config,
        };
        session.history.restart_at(initial);
        Ok(session)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn state(&self) -> &EkfSlamState {
        &self.state
    }

    pub fn grid(&self) -> &HitGrid {
        &self.grid
    }

    pub fn planner(&self) -> Option<&ReactivePlanner> {
        self.planner.as_ref()
    }

    pub fn follower(&self) -> &PathFollower {
        &self.follower
    }

    pub fn dead_reckoning(&self) -> Pose {
        self.dr_pose
    }

    pub fn history(&self) -> &TrajectoryHistory {
        &self.history
    }

    pub fn errors(&self) -> &ErrorTracker {
        &self.errors
    }

    pub fn last_extraction(&self) -> &Extraction {
        &self.last_extraction
    }

    pub fn logs(&self) -> &VecDeque<StepLog> {
        &self.logs
    }

    /// The follower has arrived at the end of a plan that actually reaches the goal.
    ///
    /// A failed plan ends at the start cell, which does not count.
    pub fn goal_reached(&self) -> bool {
        self.planner
            .as_ref()
            .and_then(|p| p.plan())
            .is_some_and(|plan| plan.success)
            && self.follower.is_finished()
    }

    /// 2σ uncertainty ellipse of the estimated position
    pub fn position_ellipse(&self) -> CovarianceEllipse {
        let (pose, cov) = self.state.current_pose_estimate();
        let position_cov = cov.fixed_view::<2, 2>(0, 0).into_owned();
        CovarianceEllipse::new(Point::new(pose.x, pose.y), &position_cov, 2.0)
    }

    /// Project a sweep from the estimated laser pose, grow the map and run
    /// the augment-update step on the extracted landmarks.
    fn process_scan(&mut self, scan: &RawScan) -> Result<()> {
        let (pose, _) = self.state.current_pose_estimate();
        let geometry = self.extractor.geometry();
        let radius = self.world.robot().radius();
        let origin = laser_origin(&pose, radius);
        let points = scan.project(geometry, &origin, pose.z);
        for p in &points {
            self.grid.add_hit(p, radius);
        }

        let extraction = self.extractor.extract(&points, &scan.distances)?;
        let covariance = self.config.slam.ekf.measurement_noise_cov();
        let measurements: Vec<RelativeMeasurement> = extraction
            .landmarks
            .iter()
            .map(|l| RelativeMeasurement::new(to_relative_measurement(l, &pose), covariance))
            .collect();
        let report = augment_update(&mut self.state, &self.config.slam.ekf, &measurements)?;
        trace!(
            "[{}] tick {}: {} lines, {} landmarks, {:?}",
            self.label,
            scan.timestamp,
            extraction.lines.len(),
            measurements.len(),
            report
        );
        if report.pruned > 0 {
            debug!(
                "[{}] pruned {} landmarks, {} remain",
                self.label,
                report.pruned,
                self.state.n_landmarks()
            );
        }

        self.log_step(scan.timestamp, &extraction, report);
        self.last_extraction = extraction;
        Ok(())
    }

    /// Re-plan if needed and hand the follower's command to the robot.
    fn plan_and_follow(&mut self) -> Result<()> {
        if self.world.crashed() {
            return Ok(());
        }
        let (pose, _) = self.state.current_pose_estimate();
        let control = match &mut self.planner {
            Some(planner) => {
                let position = Point::new(pose.x, pose.y);
                if planner.update(&self.grid, &position, self.follower.waypoint_index())? {
                    if let Some(plan) = planner.plan() {
                        self.follower.set_path(plan.path.clone());
                    }
                }
                self.follower.command(&pose)
            }
            None => {
                let [v, w] = self.config.session.open_loop_control;
                (v, w)
            }
        };
        self.world.robot_mut().apply_control(control);
        Ok(())
    }

    fn log_step(&mut self, tick: u64, extraction: &Extraction, report: AugmentReport) {
        let true_pose = self.world.robot().pose();
        let est_pose = self.state.robot_pose();
        let position_ellipse = self.position_ellipse();
        self.logs.push_back(StepLog {
            tick,
            true_pose,
            est_pose,
            pos_error: ErrorTracker::position_error(&true_pose, &est_pose),
            heading_error: ErrorTracker::heading_error(&true_pose, &est_pose),
            lines: extraction.lines.len(),
            observed: extraction.landmarks.len(),
            report,
            n_landmarks_in_state: self.state.n_landmarks(),
            position_ellipse,
        });
        while self.logs.len() > self.config.session.max_log_entries.max(1) {
            self.logs.pop_front();
        }
    }

    pub fn summary(&self) -> SessionSummary {
        let truth = self.world.robot().pose();
        let estimate = self.state.robot_pose();
        SessionSummary {
            label: self.label.clone(),
            ticks: self.world.ticks(),
            crashed: self.world.crashed(),
            landmarks: self.state.n_landmarks(),
            final_error: ErrorTracker::position_error(&truth, &estimate),
            rms_error: self.errors.rms_est_error().unwrap_or(0.0),
            dr_error: ErrorTracker::position_error(&truth, &self.dr_pose),
            plan: self
                .planner
                .as_ref()
                .map(|p| (p.plan().is_some_and(|plan| plan.success), p.replans())),
            arrived: self.goal_reached(),
            position_ellipse: self.position_ellipse(),
        }
    }

    /// Write the step log as CSV
    pub fn save_logs(&self, path: &Path) -> Result<()> {
        let mut file = BufWriter::new(File::create(path)?);
        writeln!(
            file,
            "tick,true_x,true_y,true_theta,est_x,est_y,est_theta,pos_error,heading_error,\
             lines,observed,matched,augmented,ambiguous,singular,pruned,n_landmarks,sigma_major,sigma_minor"
        )?;
        for log in &self.logs {
            writeln!(
                file,
                "{},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{},{},{},{},{},{},{},{},{:.4},{:.4}",
                log.tick,
                log.true_pose.x,
                log.true_pose.y,
                log.true_pose.z,
                log.est_pose.x,
                log.est_pose.y,
                log.est_pose.z,
                log.pos_error,
                log.heading_error,
                log.lines,
                log.observed,
                log.report.matched,
                log.report.augmented,
                log.report.ambiguous,
                log.report.singular,
                log.report.pruned,
                log.n_landmarks_in_state,
                log.position_ellipse.semi_major,
                log.position_ellipse.semi_minor
            )?;
        }
        file.flush()?;
        info!("[{}] wrote {} log rows to {}", self.label, self.logs.len(), path.display());
        Ok(())
    }
}

impl Simulate for SlamSession {
    fn label(&self) -> &str {
        &self.label
    }

    fn step(&mut self, dt: f64) -> Result<()> {
        // 1. Move the true robot, maybe sweep
        let scan = self.world.tick(dt);

        // 2. Propagate the estimate and dead reckoning with the executed control
        let (v, w) = self.world.robot().current_control();
        propagate(&mut self.state, &self.config.slam.ekf, v, w, dt);
        self.dr_pose = self.config.slam.ekf.integrator.step(&self.dr_pose, v, w, dt);
        self.dr_pose.z = normalize_angle(self.dr_pose.z);

        // 3. Map and update on new sweeps
        if let Some(scan) = scan {
            self.process_scan(&scan)?;
        }

        // 4. Plan and command the robot
        self.plan_and_follow()?;

        // 5. History
        let truth = self.world.robot().pose();
        let estimate = self.state.robot_pose();
        self.history.record(TrackSample {
            truth,
            estimate,
            dead_reckoning: self.dr_pose,
        });
        self.errors.track_poses(&truth, &estimate, &self.dr_pose);
        Ok(())
    }

    /// True once the robot crashed or reached its goal
    fn is_finished(&self) -> bool {
        self.world.crashed() || self.goal_reached()
    }

    fn reset_state(&mut self) {
        self.world.reset();
        let initial = self.world.scene().initial_pose;
        self.state = EkfSlamState::with_pose(&initial, &self.config.slam.ekf.initial_pose_variance);
        self.grid.clear();
        self.planner = self
            .config
            .session
            .goal
            .map(|g| ReactivePlanner::new(Point::from(g)));
        self.follower = PathFollower::new(self.config.slam.follower.clone());
        self.dr_pose = initial;
        self.history.restart_at(initial);
        self.errors.clear();
        self.last_extraction = Extraction::default();
        self.logs.clear();
    }
}
