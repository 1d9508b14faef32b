//! Error tracking for position estimation accuracy.

use std::collections::VecDeque;

use scan_slam_algo::util::{normalize_angle, Pose};

use super::history::DEFAULT_HISTORY_LEN;

/// Tracks estimation and dead-reckoning errors against the true pose.
#[derive(Debug, Clone)]
pub struct ErrorTracker {
    est_errors: VecDeque<f64>,
    dr_errors: VecDeque<f64>,
    max_len: usize,
    /// Running sums over every tracked step, not just the buffered window
    est_sq_sum: f64,
    worst_est: f64,
    tracked: usize,
}

impl ErrorTracker {
    pub fn new(max_len: usize) -> Self {
        Self {
            est_errors: VecDeque::with_capacity(max_len),
            dr_errors: VecDeque::with_capacity(max_len),
            max_len: max_len.max(1),
            est_sq_sum: 0.0,
            worst_est: 0.0,
            tracked: 0,
        }
    }

    pub fn with_default_len() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }

    /// Euclidean distance between the positions of two poses.
    pub fn position_error(a: &Pose, b: &Pose) -> f64 {
        ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
    }

    /// Absolute wrapped heading difference.
    pub fn heading_error(a: &Pose, b: &Pose) -> f64 {
        normalize_angle(a.z - b.z).abs()
    }

    /// Track errors for this timestep.
    pub fn track(&mut self, est_err: f64, dr_err: f64) {
        self.est_errors.push_back(est_err);
        self.dr_errors.push_back(dr_err);
        self.est_sq_sum += est_err * est_err;
        self.worst_est = self.worst_est.max(est_err);
        self.tracked += 1;

        if self.est_errors.len() > self.max_len {
            self.est_errors.pop_front();
            self.dr_errors.pop_front();
        }
    }

    /// Track the position errors of the estimate and dead reckoning.
    pub fn track_poses(&mut self, truth: &Pose, estimate: &Pose, dead_reckoning: &Pose) {
        let est_err = Self::position_error(truth, estimate);
        let dr_err = Self::position_error(truth, dead_reckoning);
        self.track(est_err, dr_err);
    }

    pub fn get_est_errors(&self) -> impl Iterator<Item = &f64> {
        self.est_errors.iter()
    }

    pub fn get_dr_errors(&self) -> impl Iterator<Item = &f64> {
        self.dr_errors.iter()
    }

    pub fn current_est_error(&self) -> Option<f64> {
        self.est_errors.back().copied()
    }

    pub fn current_dr_error(&self) -> Option<f64> {
        self.dr_errors.back().copied()
    }

    /// Root mean square estimation error over every tracked step
    pub fn rms_est_error(&self) -> Option<f64> {
        (self.tracked > 0).then(|| (self.est_sq_sum / self.tracked as f64).sqrt())
    }

    pub fn worst_est_error(&self) -> f64 {
        self.worst_est
    }

    pub fn len(&self) -> usize {
        self.est_errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.est_errors.is_empty()
    }

    pub fn clear(&mut self) {
        self.est_errors.clear();
        self.dr_errors.clear();
        self.est_sq_sum = 0.0;
        self.worst_est = 0.0;
        self.tracked = 0;
    }
}

impl Default for ErrorTracker {
    fn default() -> Self {
        Self::with_default_len()
    }
}
