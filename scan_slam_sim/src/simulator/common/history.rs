//! Bounded trajectory record of truth, estimate and dead reckoning.

use std::collections::VecDeque;

use scan_slam_algo::util::Pose;

/// Default maximum history length
pub const DEFAULT_HISTORY_LEN: usize = 1000;

/// The three poses recorded on one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSample {
    pub truth: Pose,
    pub estimate: Pose,
    pub dead_reckoning: Pose,
}

impl TrackSample {
    /// All three tracks at the same pose
    pub fn at(pose: Pose) -> Self {
        Self {
            truth: pose,
            estimate: pose,
            dead_reckoning: pose,
        }
    }
}

/// Ring buffer of [`TrackSample`]s; the oldest sample drops out once full.
#[derive(Debug, Clone)]
pub struct TrajectoryHistory {
    samples: VecDeque<TrackSample>,
    capacity: usize,
    /// Samples recorded since the last reset, including evicted ones
    recorded: usize,
}

impl TrajectoryHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            recorded: 0,
        }
    }

    pub fn record(&mut self, sample: TrackSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.recorded += 1;
    }

    pub fn samples(&self) -> impl Iterator<Item = &TrackSample> {
        self.samples.iter()
    }

    pub fn truth(&self) -> impl Iterator<Item = &Pose> {
        self.samples.iter().map(|s| &s.truth)
    }

    pub fn estimate(&self) -> impl Iterator<Item = &Pose> {
        self.samples.iter().map(|s| &s.estimate)
    }

    pub fn dead_reckoning(&self) -> impl Iterator<Item = &Pose> {
        self.samples.iter().map(|s| &s.dead_reckoning)
    }

    pub fn latest(&self) -> Option<&TrackSample> {
        self.samples.back()
    }

    pub fn recorded(&self) -> usize {
        self.recorded
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drop everything and seed all three tracks with `start`.
    ///
    /// The seed sample does not count as recorded.
    pub fn restart_at(&mut self, start: Pose) {
        self.samples.clear();
        self.samples.push_back(TrackSample::at(start));
        self.recorded = 0;
    }
}

impl Default for TrajectoryHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}
