//! EKF-SLAM (Extended Kalman Filter Simultaneous Localization and Mapping)
//!
//! This module implements EKF-SLAM with point landmarks observed as
//! robot-frame relative positions.
//!
//! ## State Vector Structure
//! - Dimension: 3 + 2n (robot pose + n landmarks)
//! - Robot pose: [x, y, θ] (position and orientation)
//! - Landmarks: [m1_x, m1_y, m2_x, m2_y, ...] (2D positions)
//!
//! ## Per-tick cycle
//! - [`propagate`] moves the pose under (v, ω) and touches only the pose rows
//!   and columns of Σ
//! - [`augment_update`] associates each measurement by Mahalanobis distance,
//!   runs a Joseph-form update on matches, appends clearly new landmarks, and
//!   every few calls prunes landmarks that were rarely seen again
//!
//! The state only ever grows or shrinks through these two calls.

use log::{debug, trace};
use nalgebra::{DMatrix, DVector, Matrix2, Matrix2x3, Matrix3, Vector2};
use serde::{Deserialize, Serialize};

use super::motion::{motion_jacobians, MotionIntegrator};
use crate::error::{Result, SlamError};
use crate::util::{
    block, normalize_angle, rotation, select_rows, select_square, set_block, symmetrize,
    try_inverse2, Point, Pose,
};

/// EKF-SLAM configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EkfSlamConfig {
    /// Pose integration scheme
    pub integrator: MotionIntegrator,
    /// Variances of the (v, ω) control noise
    pub process_noise: [f64; 2],
    /// Variances of the relative-position measurement noise (robot x, robot y)
    pub measurement_noise: [f64; 2],
    /// Mahalanobis distance at or below which a measurement re-observes a landmark
    pub update_threshold: f64,
    /// Mahalanobis distance above which a measurement becomes a new landmark
    pub augment_threshold: f64,
    /// Prune every this many augment-update calls (0 disables pruning)
    pub clean_every_n_augment_updates: u64,
    /// Landmarks with this many hits or fewer are pruned
    pub clean_threshold: u32,
    /// Initial pose variances (x, y, θ)
    pub initial_pose_variance: [f64; 3],
}

impl Default for EkfSlamConfig {
    fn default() -> Self {
        Self {
            integrator: MotionIntegrator::RungeKutta4,
            process_noise: [0.01, 0.01],
            measurement_noise: [1.0, 1.0],
            update_threshold: 20.0,
            augment_threshold: 200.0,
            clean_every_n_augment_updates: 25,
            clean_threshold: 3,
            initial_pose_variance: [0.0, 0.0, 0.0],
        }
    }
}

impl EkfSlamConfig {
    pub fn process_noise_cov(&self) -> Matrix2<f64> {
        Matrix2::new(self.process_noise[0], 0.0, 0.0, self.process_noise[1])
    }

    pub fn measurement_noise_cov(&self) -> Matrix2<f64> {
        Matrix2::new(self.measurement_noise[0], 0.0, 0.0, self.measurement_noise[1])
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.update_threshold > 0.0) || !(self.augment_threshold >= self.update_threshold) {
            return Err(SlamError::InvalidConfig(format!(
                "need 0 < update_threshold ({}) <= augment_threshold ({})",
                self.update_threshold, self.augment_threshold
            )));
        }
        let mut variances = self
            .process_noise
            .iter()
            .chain(&self.measurement_noise)
            .chain(&self.initial_pose_variance);
        if variances.any(|v| !(*v >= 0.0)) {
            return Err(SlamError::InvalidConfig("noise variances must be non-negative".into()));
        }
        Ok(())
    }
}

/// One robot-frame observation of a landmark and its noise covariance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeMeasurement {
    pub offset: Point,
    pub covariance: Matrix2<f64>,
}

impl RelativeMeasurement {
    pub fn new(offset: Point, covariance: Matrix2<f64>) -> Self {
        Self { offset, covariance }
    }
}

/// Express a world-frame point relative to the robot at `pose`.
pub fn to_relative_measurement(world: &Point, pose: &Pose) -> Point {
    rotation(pose[2]).transpose() * (world - Point::new(pose[0], pose[1]))
}

/// Outcome of gating one measurement against the tracked landmarks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Association {
    /// Re-observation of the given landmark
    Match { landmark: usize, distance: f64 },
    /// Too far from everything tracked (or nothing tracked yet)
    New { distance: Option<f64> },
    /// Between the two gates; ignored
    Ambiguous { landmark: usize, distance: f64 },
}

/// Mean and 2×2 covariance of one tracked landmark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkEstimate {
    pub mean: Point,
    pub covariance: Matrix2<f64>,
    pub hits: u32,
}

/// Counts from one [`augment_update`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AugmentReport {
    pub matched: usize,
    pub augmented: usize,
    pub ambiguous: usize,
    /// Landmark comparisons skipped for a singular innovation covariance
    pub singular: usize,
    pub pruned: usize,
}

/// EKF-SLAM state containing the mean and covariance of the state estimate
#[derive(Debug, Clone)]
pub struct EkfSlamState {
    /// State mean [x, y, θ, m1_x, m1_y, m2_x, m2_y, ...]
    mu: DVector<f64>,
    /// State covariance matrix (3+2n × 3+2n)
    sigma: DMatrix<f64>,
    /// Successful associations per landmark, parallel to the landmark rows
    hits: Vec<u32>,
    /// Number of augment-update calls so far
    augment_updates: u64,
}

impl Default for EkfSlamState {
    fn default() -> Self {
        Self::new()
    }
}

impl EkfSlamState {
    /// Create a new EKF-SLAM state with initial robot pose at origin
    pub fn new() -> Self {
        Self::with_pose(&Pose::zeros(), &[0.0; 3])
    }

    /// Create a new EKF-SLAM state with the given pose and pose variances
    pub fn with_pose(pose: &Pose, variance: &[f64; 3]) -> Self {
        let mu = DVector::from_column_slice(pose.as_slice());
        let sigma = DMatrix::from_diagonal(&DVector::from_column_slice(variance));
        Self {
            mu,
            sigma,
            hits: Vec::new(),
            augment_updates: 0,
        }
    }

    /// Assemble a state from raw parts, checking the size invariants.
    pub fn from_parts(mu: DVector<f64>, sigma: DMatrix<f64>, hits: Vec<u32>) -> Result<Self> {
        let state = Self {
            mu,
            sigma,
            hits,
            augment_updates: 0,
        };
        state.check_consistency()?;
        Ok(state)
    }

    /// Verify `len == 3 + 2·landmarks` and that Σ matches the state.
    pub fn check_consistency(&self) -> Result<()> {
        let state_len = self.mu.len();
        if state_len != 3 + 2 * self.hits.len() {
            return Err(SlamError::StateSizeMismatch {
                state_len,
                landmarks: self.hits.len(),
            });
        }
        if self.sigma.nrows() != state_len || self.sigma.ncols() != state_len {
            return Err(SlamError::CovarianceShape {
                rows: self.sigma.nrows(),
                cols: self.sigma.ncols(),
                state_len,
            });
        }
        Ok(())
    }

    pub fn mean(&self) -> &DVector<f64> {
        &self.mu
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.sigma
    }

    pub fn hits(&self) -> &[u32] {
        &self.hits
    }

    pub fn n_landmarks(&self) -> usize {
        self.hits.len()
    }

    pub fn augment_updates(&self) -> u64 {
        self.augment_updates
    }

    /// Get the robot pose [x, y, θ]
    pub fn robot_pose(&self) -> Pose {
        Pose::new(self.mu[0], self.mu[1], self.mu[2])
    }

    /// Get the 3x3 robot pose covariance
    pub fn robot_covariance(&self) -> Matrix3<f64> {
        block::<3, 3>(&self.sigma, 0, 0)
    }

    /// Pose mean and covariance.
    pub fn current_pose_estimate(&self) -> (Pose, Matrix3<f64>) {
        (self.robot_pose(), self.robot_covariance())
    }

    /// Get landmark position by index
    pub fn landmark(&self, idx: usize) -> Option<Point> {
        (idx < self.n_landmarks()).then(|| {
            let base = 3 + 2 * idx;
            Point::new(self.mu[base], self.mu[base + 1])
        })
    }

    /// Get the 2x2 covariance block for a specific landmark
    pub fn landmark_covariance(&self, idx: usize) -> Option<Matrix2<f64>> {
        (idx < self.n_landmarks()).then(|| {
            let base = 3 + 2 * idx;
            block::<2, 2>(&self.sigma, base, base)
        })
    }

    /// All landmarks in state order.
    pub fn landmark_estimates(&self) -> Vec<LandmarkEstimate> {
        (0..self.n_landmarks())
            .map(|i| {
                let base = 3 + 2 * i;
                LandmarkEstimate {
                    mean: Point::new(self.mu[base], self.mu[base + 1]),
                    covariance: block::<2, 2>(&self.sigma, base, base),
                    hits: self.hits[i],
                }
            })
            .collect()
    }

    /// Owned copy for readers outside the estimator.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }
}

/// Jacobians of h = Cᵀ(θ)(l − p) with respect to the pose (H_R) and the landmark (H_L).
fn measurement_jacobians(theta: f64, offset: &Point) -> (Matrix2x3<f64>, Matrix2<f64>) {
    let (s, c) = theta.sin_cos();
    let (dx, dy) = (offset.x, offset.y);
    #[rustfmt::skip]
    let h_r = Matrix2x3::new(
        -c, -s, -s * dx + c * dy,
        s, -c, -c * dx - s * dy,
    );
    #[rustfmt::skip]
    let h_l = Matrix2::new(
        c, s,
        -s, c,
    );
    (h_r, h_l)
}

/// Innovation of one measurement against one landmark.
struct Innovation {
    residual: Vector2<f64>,
    s_inv: Matrix2<f64>,
    h_r: Matrix2x3<f64>,
    h_l: Matrix2<f64>,
    distance: f64,
}

/// `None` when the innovation covariance is singular.
fn innovation(state: &EkfSlamState, idx: usize, z: &RelativeMeasurement) -> Option<Innovation> {
    let pose = state.robot_pose();
    let base = 3 + 2 * idx;
    let landmark = Point::new(state.mu[base], state.mu[base + 1]);
    let offset = landmark - Point::new(pose[0], pose[1]);
    let (h_r, h_l) = measurement_jacobians(pose[2], &offset);

    // H only has non-zero columns at the pose and at this landmark.
    let sigma_rr = block::<3, 3>(&state.sigma, 0, 0);
    let sigma_rl = block::<3, 2>(&state.sigma, 0, base);
    let sigma_ll = block::<2, 2>(&state.sigma, base, base);
    let cross = h_r * sigma_rl * h_l.transpose();
    let s = h_r * sigma_rr * h_r.transpose()
        + cross
        + cross.transpose()
        + h_l * sigma_ll * h_l.transpose()
        + z.covariance;
    let s_inv = try_inverse2(&s)?;

    let residual = z.offset - h_l * offset;
    let distance = (residual.transpose() * s_inv * residual)[(0, 0)];
    distance.is_finite().then_some(Innovation {
        residual,
        s_inv,
        h_r,
        h_l,
        distance,
    })
}

/// Closest landmark by Mahalanobis distance; the first in state order wins ties.
///
/// Also returns how many landmarks were skipped for a singular S.
fn nearest_landmark(state: &EkfSlamState, z: &RelativeMeasurement) -> (Option<(usize, Innovation)>, usize) {
    let mut best: Option<(usize, Innovation)> = None;
    let mut singular = 0;
    for idx in 0..state.n_landmarks() {
        let Some(candidate) = innovation(state, idx, z) else {
            trace!("singular innovation covariance for landmark {idx}, skipping");
            singular += 1;
            continue;
        };
        if best
            .as_ref()
            .map_or(true, |(_, b)| candidate.distance < b.distance)
        {
            best = Some((idx, candidate));
        }
    }
    (best, singular)
}

fn classify(config: &EkfSlamConfig, best: Option<(usize, f64)>) -> Association {
    match best {
        None => Association::New { distance: None },
        Some((landmark, distance)) if distance <= config.update_threshold => {
            Association::Match { landmark, distance }
        }
        Some((_, distance)) if distance > config.augment_threshold => Association::New {
            distance: Some(distance),
        },
        Some((landmark, distance)) => Association::Ambiguous { landmark, distance },
    }
}

/// Gate a measurement against the current state without changing it.
pub fn associate(state: &EkfSlamState, config: &EkfSlamConfig, z: &RelativeMeasurement) -> Association {
    classify(
        config,
        nearest_landmark(state, z)
            .0
            .map(|(idx, inn)| (idx, inn.distance)),
    )
}

/// EKF-SLAM propagation step: move the pose under control (v, w) for `dt`.
///
/// Only the pose block and the pose/landmark cross blocks of Σ change.
pub fn propagate(state: &mut EkfSlamState, config: &EkfSlamConfig, v: f64, w: f64, dt: f64) {
    let pose = state.robot_pose();
    let mut new_pose = config.integrator.step(&pose, v, w, dt);
    new_pose[2] = normalize_angle(new_pose[2]);
    state.mu.fixed_rows_mut::<3>(0).copy_from(&new_pose);

    let (a, n) = motion_jacobians(pose[2], v, dt);
    let sigma_rr = block::<3, 3>(&state.sigma, 0, 0);
    let mut new_rr = a * sigma_rr * a.transpose() + n * config.process_noise_cov() * n.transpose();
    new_rr = (new_rr + new_rr.transpose()) * 0.5;
    set_block(&mut state.sigma, 0, 0, &new_rr);

    for i in 0..state.n_landmarks() {
        let col = 3 + 2 * i;
        let cross = a * block::<3, 2>(&state.sigma, 0, col);
        set_block(&mut state.sigma, 0, col, &cross);
        set_block(&mut state.sigma, col, 0, &cross.transpose());
    }
}

/// Joseph-form EKF update against landmark `idx`.
fn update_landmark(state: &mut EkfSlamState, idx: usize, inn: &Innovation, noise: &Matrix2<f64>) {
    let n = state.mu.len();
    let col = 3 + 2 * idx;

    let mut h = DMatrix::<f64>::zeros(2, n);
    h.fixed_view_mut::<2, 3>(0, 0).copy_from(&inn.h_r);
    h.fixed_view_mut::<2, 2>(0, col).copy_from(&inn.h_l);
    let s_inv = DMatrix::from_column_slice(2, 2, inn.s_inv.as_slice());
    let r = DMatrix::from_column_slice(2, 2, noise.as_slice());

    let k = &state.sigma * h.transpose() * s_inv;
    state.mu += &k * DVector::from_column_slice(inn.residual.as_slice());
    state.mu[2] = normalize_angle(state.mu[2]);

    let i_kh = DMatrix::<f64>::identity(n, n) - &k * &h;
    state.sigma = &i_kh * &state.sigma * i_kh.transpose() + &k * r * k.transpose();
    symmetrize(&mut state.sigma);
    state.hits[idx] += 1;
}

/// Append landmarks observed at `measurements` from the current pose, resizing once.
fn augment(state: &mut EkfSlamState, measurements: &[RelativeMeasurement]) {
    if measurements.is_empty() {
        return;
    }
    let old_n = state.mu.len();
    let n = old_n + 2 * measurements.len();

    let mut mu = DVector::<f64>::zeros(n);
    mu.rows_mut(0, old_n).copy_from(&state.mu);
    let mut sigma = DMatrix::<f64>::zeros(n, n);
    sigma.view_mut((0, 0), (old_n, old_n)).copy_from(&state.sigma);

    let pose = state.robot_pose();
    let position = Point::new(pose[0], pose[1]);
    let sigma_rr = block::<3, 3>(&state.sigma, 0, 0);

    for (k, z) in measurements.iter().enumerate() {
        let col = old_n + 2 * k;
        let landmark = position + rotation(pose[2]) * z.offset;
        let (h_r, h_l) = measurement_jacobians(pose[2], &(landmark - position));
        // H_L is a rotation, so its inverse is its transpose.
        let h_l_inv = h_l.transpose();
        let g_r = -(h_l_inv * h_r);

        mu[col] = landmark.x;
        mu[col + 1] = landmark.y;

        let mut cov = h_l_inv * (h_r * sigma_rr * h_r.transpose() + z.covariance) * h_l_inv.transpose();
        cov = (cov + cov.transpose()) * 0.5;
        set_block(&mut sigma, col, col, &cov);

        // Correlation with the pose, older landmarks and landmarks added above.
        let g_r = DMatrix::from_column_slice(2, 3, g_r.as_slice());
        let cross = g_r * sigma.view((0, 0), (3, col));
        sigma.view_mut((col, 0), (2, col)).copy_from(&cross);
        sigma.view_mut((0, col), (col, 2)).copy_from(&cross.transpose());

        state.hits.push(1);
    }
    state.mu = mu;
    state.sigma = sigma;
}

/// Drop landmarks with `hits <= threshold`, keeping everything else untouched.
///
/// Returns the number of landmarks removed.
pub fn prune(state: &mut EkfSlamState, threshold: u32) -> usize {
    let survivors: Vec<usize> = (0..state.n_landmarks())
        .filter(|&i| state.hits[i] > threshold)
        .collect();
    let removed = state.n_landmarks() - survivors.len();
    if removed == 0 {
        return 0;
    }
    let keep: Vec<usize> = (0..3)
        .chain(survivors.iter().flat_map(|&i| [3 + 2 * i, 4 + 2 * i]))
        .collect();
    state.mu = select_rows(&state.mu, &keep);
    state.sigma = select_square(&state.sigma, &keep);
    state.hits = survivors.iter().map(|&i| state.hits[i]).collect();
    removed
}

/// EKF-SLAM measurement step for one scan worth of relative landmark positions.
///
/// Matches are applied immediately in measurement order; new landmarks are
/// appended after all matches. Every `clean_every_n_augment_updates` calls the
/// map is pruned.
pub fn augment_update(
    state: &mut EkfSlamState,
    config: &EkfSlamConfig,
    measurements: &[RelativeMeasurement],
) -> Result<AugmentReport> {
    state.check_consistency()?;
    let mut report = AugmentReport::default();
    let mut new_landmarks = Vec::new();

    for z in measurements {
        let (best, singular) = nearest_landmark(state, z);
        report.singular += singular;
        match classify(config, best.as_ref().map(|(idx, inn)| (*idx, inn.distance))) {
            Association::Match { landmark, .. } => {
                if let Some((_, inn)) = best {
                    update_landmark(state, landmark, &inn, &z.covariance);
                    report.matched += 1;
                }
            }
            Association::New { .. } => new_landmarks.push(*z),
            Association::Ambiguous { .. } => report.ambiguous += 1,
        }
    }

    augment(state, &new_landmarks);
    report.augmented = new_landmarks.len();
    state.check_consistency()?;

    state.augment_updates += 1;
    let every = config.clean_every_n_augment_updates;
    if every > 0 && state.augment_updates % every == 0 {
        report.pruned = prune(state, config.clean_threshold);
        state.check_consistency()?;
    }

    debug!(
        "augment update #{}: {} matched, {} new, {} ambiguous, {} singular, {} pruned, {} landmarks",
        state.augment_updates,
        report.matched,
        report.augmented,
        report.ambiguous,
        report.singular,
        report.pruned,
        state.n_landmarks()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{is_symmetric, FRAC_PI_2};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Random state with `n_landmarks` landmarks on a ring and an SPD covariance.
    fn random_state(rng: &mut StdRng, n_landmarks: usize) -> EkfSlamState {
        let n = 3 + 2 * n_landmarks;
        let mut mu = DVector::zeros(n);
        mu[0] = rng.gen_range(-50.0..50.0);
        mu[1] = rng.gen_range(-50.0..50.0);
        mu[2] = rng.gen_range(-3.0..3.0);
        for i in 0..n_landmarks {
            let angle = i as f64 * 0.7;
            let radius = 200.0 + 40.0 * (i % 7) as f64;
            mu[3 + 2 * i] = radius * angle.cos();
            mu[4 + 2 * i] = radius * angle.sin();
        }
        let a = DMatrix::from_fn(n, n, |_, _| rng.gen_range(-1.0..1.0));
        let sigma = &a * a.transpose() / n as f64 + DMatrix::identity(n, n) * 0.1;
        EkfSlamState::from_parts(mu, sigma, vec![10; n_landmarks]).unwrap()
    }

    fn measurement(offset: Point) -> RelativeMeasurement {
        RelativeMeasurement::new(offset, Matrix2::identity())
    }

    #[test]
    fn test_default_noise_matches_standard_deviations() {
        // σ_N = 0.1 on (v, ω) and σ_M = 1 on each measurement axis
        let config = EkfSlamConfig::default();
        assert_relative_eq!(config.process_noise_cov(), Matrix2::identity() * 0.01, epsilon = 1e-15);
        assert_relative_eq!(config.measurement_noise_cov(), Matrix2::identity());
    }

    #[test]
    fn test_propagate_straight_line() {
        let mut state = EkfSlamState::new();
        let config = EkfSlamConfig::default();
        for _ in 0..10 {
            propagate(&mut state, &config, 4.0, 0.0, 0.1);
        }
        assert_relative_eq!(state.robot_pose(), Pose::new(4.0, 0.0, 0.0), epsilon = 1e-9);
        let cov = state.robot_covariance();
        assert!(cov[(0, 0)] > 0.0);
        assert!(cov[(1, 1)] > 0.0);
        assert!(cov[(2, 2)] > 0.0);
    }

    #[test]
    fn test_propagate_leaves_landmark_blocks_alone() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut state = random_state(&mut rng, 4);
        let before = state.covariance().view((3, 3), (8, 8)).into_owned();
        propagate(&mut state, &EkfSlamConfig::default(), 4.0, 0.15, 0.1);
        let after = state.covariance().view((3, 3), (8, 8)).into_owned();
        assert_eq!(before, after);
    }

    #[test]
    fn test_covariance_stays_symmetric() {
        let config = EkfSlamConfig::default();
        for (seed, n_landmarks) in [0usize, 1, 5, 50].into_iter().enumerate() {
            let mut rng = StdRng::seed_from_u64(seed as u64 + 100);
            let mut state = random_state(&mut rng, n_landmarks);

            for _ in 0..5 {
                propagate(&mut state, &config, 4.0, 0.15, 0.1);
                assert!(is_symmetric(state.covariance(), 1e-4), "propagate, {n_landmarks} landmarks");

                let pose = state.robot_pose();
                let mut measurements: Vec<_> = state
                    .landmark_estimates()
                    .iter()
                    .take(3)
                    .map(|lm| {
                        let jitter = Point::new(rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5));
                        measurement(to_relative_measurement(&(lm.mean + jitter), &pose))
                    })
                    .collect();
                measurements.push(measurement(Point::new(
                    rng.gen_range(1000.0..2000.0),
                    rng.gen_range(1000.0..2000.0),
                )));
                augment_update(&mut state, &config, &measurements).unwrap();
                assert!(is_symmetric(state.covariance(), 1e-4), "update, {n_landmarks} landmarks");
            }
        }
    }

    #[test]
    fn test_state_size_invariant_across_cycles() {
        let config = EkfSlamConfig {
            clean_every_n_augment_updates: 3,
            ..Default::default()
        };
        let mut state = EkfSlamState::new();
        for tick in 0..12 {
            assert_eq!(state.mean().len(), 3 + 2 * state.hits().len());
            propagate(&mut state, &config, 4.0, 0.15, 0.1);
            let far = Point::new(300.0 * (tick + 1) as f64, 0.0);
            augment_update(&mut state, &config, &[measurement(far)]).unwrap();
            assert_eq!(state.mean().len(), 3 + 2 * state.hits().len());
            assert_eq!(state.covariance().nrows(), state.mean().len());
        }
    }

    #[test]
    fn test_new_landmark_mean() {
        let mut state = EkfSlamState::with_pose(&Pose::new(10.0, 5.0, FRAC_PI_2), &[0.0; 3]);
        let config = EkfSlamConfig::default();
        let report = augment_update(&mut state, &config, &[measurement(Point::new(3.0, 0.0))]).unwrap();
        assert_eq!(report.augmented, 1);
        assert_eq!(state.hits(), &[1]);
        assert_relative_eq!(state.landmark(0).unwrap(), Point::new(10.0, 8.0), epsilon = 1e-9);
        // Zero pose uncertainty leaves only the rotated measurement noise.
        assert_relative_eq!(state.landmark_covariance(0).unwrap(), Matrix2::identity(), epsilon = 1e-9);
    }

    #[test]
    fn test_reobservation_tightens_landmark() {
        let config = EkfSlamConfig::default();
        let mut state = EkfSlamState::new();
        let z = measurement(Point::new(100.0, 20.0));
        augment_update(&mut state, &config, &[z]).unwrap();
        let before = state.landmark_covariance(0).unwrap();

        let report = augment_update(&mut state, &config, &[z]).unwrap();
        assert_eq!(report.matched, 1);
        assert_eq!(state.n_landmarks(), 1);
        assert_eq!(state.hits(), &[2]);
        let after = state.landmark_covariance(0).unwrap();
        assert!(after.trace() < before.trace());
    }

    #[test]
    fn test_mahalanobis_reassociation() {
        let mu = DVector::from_vec(vec![0.0, 0.0, 0.0, 100.0, 0.0]);
        let sigma = DMatrix::from_diagonal(&DVector::from_vec(vec![0.0, 0.0, 0.0, 1.0, 1.0]));
        let state = EkfSlamState::from_parts(mu, sigma, vec![1]).unwrap();
        let config = EkfSlamConfig::default();
        let pose = state.robot_pose();

        let near = measurement(to_relative_measurement(&Point::new(100.5, 0.2), &pose));
        match associate(&state, &config, &near) {
            Association::Match { landmark, distance } => {
                assert_eq!(landmark, 0);
                assert!(distance <= config.update_threshold);
                assert_relative_eq!(distance, 0.145, epsilon = 1e-9);
            }
            other => panic!("expected a match, got {other:?}"),
        }

        let far = measurement(to_relative_measurement(&Point::new(500.0, 500.0), &pose));
        match associate(&state, &config, &far) {
            Association::New { distance: Some(d) } => assert!(d > config.augment_threshold),
            other => panic!("expected a new landmark, got {other:?}"),
        }
    }

    #[test]
    fn test_dead_zone_is_ignored() {
        let mu = DVector::from_vec(vec![0.0, 0.0, 0.0, 100.0, 0.0]);
        let sigma = DMatrix::from_diagonal(&DVector::from_vec(vec![0.0, 0.0, 0.0, 1.0, 1.0]));
        let mut state = EkfSlamState::from_parts(mu, sigma, vec![1]).unwrap();
        let config = EkfSlamConfig::default();
        // d = 10² / 2 = 50, between the gates
        let report = augment_update(&mut state, &config, &[measurement(Point::new(110.0, 0.0))]).unwrap();
        assert_eq!(report.ambiguous, 1);
        assert_eq!(state.n_landmarks(), 1);
        assert_eq!(state.hits(), &[1]);
    }

    #[test]
    fn test_tie_goes_to_first_landmark() {
        let mu = DVector::from_vec(vec![0.0, 0.0, 0.0, 100.0, 1.0, 100.0, -1.0]);
        let mut sigma = DMatrix::zeros(7, 7);
        for i in 3..7 {
            sigma[(i, i)] = 1.0;
        }
        let state = EkfSlamState::from_parts(mu, sigma, vec![1, 1]).unwrap();
        let z = measurement(Point::new(100.0, 0.0));
        assert!(matches!(
            associate(&state, &EkfSlamConfig::default(), &z),
            Association::Match { landmark: 0, .. }
        ));
    }

    #[test]
    fn test_singular_innovation_is_not_a_match() {
        let mu = DVector::from_vec(vec![0.0, 0.0, 0.0, 100.0, 0.0]);
        let state = EkfSlamState::from_parts(mu, DMatrix::zeros(5, 5), vec![4]).unwrap();
        let z = RelativeMeasurement::new(Point::new(100.0, 0.0), Matrix2::zeros());
        assert_eq!(
            associate(&state, &EkfSlamConfig::default(), &z),
            Association::New { distance: None }
        );

        let mut updated = state.clone();
        let report = augment_update(&mut updated, &EkfSlamConfig::default(), &[z]).unwrap();
        assert_eq!(report.singular, 1);
        assert_eq!(report.augmented, 1);
        assert_eq!(updated.n_landmarks(), 2);
    }

    #[test]
    fn test_prune_is_pure_filtering() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut state = random_state(&mut rng, 4);
        state.hits = vec![5, 1, 7, 3];
        let before = state.clone();

        let removed = prune(&mut state, 3);
        assert_eq!(removed, 2);
        assert_eq!(state.hits(), &[5, 7]);
        assert!(state.hits().iter().all(|&h| h > 3));

        // Survivors 0 and 2 keep their values, cross terms included.
        let old = [3usize, 4, 7, 8];
        let new = [3usize, 4, 5, 6];
        for r in 0..3 {
            assert_eq!(state.mean()[r], before.mean()[r]);
        }
        for (&nr, &or) in new.iter().zip(&old) {
            assert_eq!(state.mean()[nr], before.mean()[or]);
            for c in 0..3 {
                assert_eq!(state.covariance()[(nr, c)], before.covariance()[(or, c)]);
            }
            for (&nc, &oc) in new.iter().zip(&old) {
                assert_eq!(state.covariance()[(nr, nc)], before.covariance()[(or, oc)]);
            }
        }
    }

    #[test]
    fn test_periodic_cleaning_cadence() {
        let config = EkfSlamConfig::default();
        let mut state = EkfSlamState::new();
        augment_update(&mut state, &config, &[measurement(Point::new(50.0, 50.0))]).unwrap();
        assert_eq!(state.n_landmarks(), 1);
        for _ in 1..24 {
            augment_update(&mut state, &config, &[]).unwrap();
        }
        assert_eq!(state.n_landmarks(), 1);
        let report = augment_update(&mut state, &config, &[]).unwrap();
        assert_eq!(state.augment_updates(), 25);
        assert_eq!(report.pruned, 1);
        assert_eq!(state.n_landmarks(), 0);
    }

    #[test]
    fn test_inconsistent_parts_are_rejected() {
        let err = EkfSlamState::from_parts(DVector::zeros(5), DMatrix::zeros(5, 5), vec![]).unwrap_err();
        assert!(matches!(err, SlamError::StateSizeMismatch { state_len: 5, landmarks: 0 }));
        let err = EkfSlamState::from_parts(DVector::zeros(3), DMatrix::zeros(4, 4), vec![]).unwrap_err();
        assert!(matches!(err, SlamError::CovarianceShape { .. }));
    }

    #[test]
    fn test_relative_measurement_roundtrip() {
        let pose = Pose::new(3.0, -2.0, 0.8);
        let world = Point::new(40.0, 25.0);
        let z = to_relative_measurement(&world, &pose);
        let back = Point::new(pose[0], pose[1]) + rotation(pose[2]) * z;
        assert_relative_eq!(back, world, epsilon = 1e-9);
    }
}
