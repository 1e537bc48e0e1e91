//! Temporal stabilizers
//!
//! Raw tracker keypoints jitter frame to frame; each landmark gets a scalar
//! predictive filter per axis. State is created lazily on the first valid
//! frame and discarded the moment the hand is lost, so a reacquired hand
//! starts from the raw measurement instead of stale extrapolation.

pub mod region;

pub use region::RegionStabilizer;

use crate::config::StabilizerConfig;
use crate::geometry::Landmark;

/// Scalar Kalman-style estimator for one coordinate axis
#[derive(Clone, Copy, Debug)]
struct AxisFilter {
    estimate: f32,
    variance: f32,
}

impl AxisFilter {
    fn new(initial: f32) -> Self {
        Self {
            estimate: initial,
            variance: 1.0,
        }
    }

    /// Fold in one measurement, weighting by relative noise magnitudes
    fn update(&mut self, measurement: f32, cfg: &StabilizerConfig) -> f32 {
        self.variance += cfg.process_noise;
        let gain = self.variance / (self.variance + cfg.measurement_noise);
        self.estimate += gain * (measurement - self.estimate);
        self.variance *= 1.0 - gain;
        self.estimate
    }
}

/// Per-landmark filter bank
#[derive(Clone, Copy, Debug)]
struct LandmarkFilter {
    x: AxisFilter,
    y: AxisFilter,
    z: AxisFilter,
}

impl LandmarkFilter {
    fn new(lm: &Landmark) -> Self {
        Self {
            x: AxisFilter::new(lm.x),
            y: AxisFilter::new(lm.y),
            z: AxisFilter::new(lm.z),
        }
    }
}

/// Smooths noisy per-frame skeletal keypoints
///
/// Owned exclusively by the pipeline tick loop; no locking.
pub struct LandmarkStabilizer {
    config: StabilizerConfig,
    /// One filter bank per input slot, sized on first valid frame
    filters: Vec<LandmarkFilter>,
}

impl LandmarkStabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        Self {
            config,
            filters: Vec::new(),
        }
    }

    /// Filter one frame of keypoints
    ///
    /// `None` means the tracker lost the hand; all state is discarded and
    /// `None` is passed through. A frame whose landmark count differs from
    /// the tracked set is treated as a new track and starts from raw.
    pub fn stabilize(&mut self, landmarks: Option<&[Landmark]>) -> Option<Vec<Landmark>> {
        let landmarks = match landmarks {
            Some(l) if !l.is_empty() => l,
            _ => {
                self.reset();
                return None;
            }
        };

        if self.filters.len() != landmarks.len() {
            // Track shape changed (hand count, tracker restart): start fresh
            // so the first output equals the raw measurement.
            self.filters = landmarks.iter().map(LandmarkFilter::new).collect();
            return Some(landmarks.to_vec());
        }

        let smoothing = self.config.smoothing_factor.clamp(0.0, 1.0);
        let out = landmarks
            .iter()
            .zip(self.filters.iter_mut())
            .map(|(lm, filter)| {
                let fx = filter.x.update(lm.x, &self.config);
                let fy = filter.y.update(lm.y, &self.config);
                let fz = filter.z.update(lm.z, &self.config);
                Landmark {
                    id: lm.id,
                    x: lm.x + (fx - lm.x) * smoothing,
                    y: lm.y + (fy - lm.y) * smoothing,
                    z: lm.z + (fz - lm.z) * smoothing,
                }
            })
            .collect();

        Some(out)
    }

    /// Discard all per-landmark state
    pub fn reset(&mut self) {
        self.filters.clear();
    }

    /// Whether any landmark state is currently tracked
    pub fn is_tracking(&self) -> bool {
        !self.filters.is_empty()
    }
}
