//! Region and mask temporal smoothing
//!
//! Per-frame detections are computed independently, so region boundaries and
//! counts flicker. This stabilizer blends each new region against its match
//! in the previous stabilized set and tolerates a couple of frames of missed
//! detection before collapsing to empty. Sustained hand loss resets
//! immediately; stale regions are never carried indefinitely.

use crate::config::RegionStabilizerConfig;
use crate::geometry::{NailRegion, Point};

/// Smooths the region list and mask across frames
pub struct RegionStabilizer {
    config: RegionStabilizerConfig,
    previous: Vec<NailRegion>,
    mask: Vec<f32>,
    mask_width: u32,
    mask_height: u32,
    missed_frames: u32,
}

impl RegionStabilizer {
    pub fn new(config: RegionStabilizerConfig) -> Self {
        Self {
            config,
            previous: Vec::new(),
            mask: Vec::new(),
            mask_width: 0,
            mask_height: 0,
            missed_frames: 0,
        }
    }

    /// Blend a new detection against temporal memory
    ///
    /// Returns the stabilized region list and mask for this frame.
    pub fn stabilize(
        &mut self,
        raw_regions: &[NailRegion],
        raw_mask: &[f32],
        mask_width: u32,
        mask_height: u32,
    ) -> (Vec<NailRegion>, Vec<f32>) {
        let regions = if raw_regions.is_empty() {
            self.carry_forward()
        } else {
            self.missed_frames = 0;
            self.blend_regions(raw_regions, mask_width, mask_height)
        };
        self.previous = regions.clone();

        let mask = self.blend_mask(raw_mask, mask_width, mask_height);
        (regions, mask)
    }

    /// Tolerate a transient missed detection by decaying the previous set
    fn carry_forward(&mut self) -> Vec<NailRegion> {
        if self.previous.is_empty() {
            return Vec::new();
        }
        self.missed_frames += 1;
        if self.missed_frames > self.config.max_missed_frames {
            log::debug!(
                "region track lost after {} missed frames",
                self.missed_frames
            );
            return Vec::new();
        }
        self.previous
            .iter()
            .cloned()
            .map(|mut r| {
                r.confidence *= self.config.missed_decay;
                r
            })
            .collect()
    }

    fn blend_regions(
        &self,
        raw_regions: &[NailRegion],
        mask_width: u32,
        mask_height: u32,
    ) -> Vec<NailRegion> {
        let diagonal =
            ((mask_width as f32).powi(2) + (mask_height as f32).powi(2)).sqrt();
        let match_radius = self.config.match_radius * diagonal.max(1.0);

        raw_regions
            .iter()
            .map(|raw| match self.find_match(raw.center, match_radius) {
                Some(prev) => self.blend_one(raw, prev),
                None => raw.clone(),
            })
            .collect()
    }

    /// Nearest previous region within the match radius
    fn find_match(&self, center: Point, radius: f32) -> Option<&NailRegion> {
        self.previous
            .iter()
            .map(|p| {
                let dx = p.center.x - center.x;
                let dy = p.center.y - center.y;
                (p, (dx * dx + dy * dy).sqrt())
            })
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(p, _)| p)
    }

    /// Confidence-weighted blend of one region against its predecessor
    fn blend_one(&self, raw: &NailRegion, prev: &NailRegion) -> NailRegion {
        let prev_weight = self.config.smoothing * prev.confidence;
        let total = prev_weight + raw.confidence;
        let t = if total > f32::EPSILON {
            prev_weight / total
        } else {
            0.0
        };

        let lerp = |a: f32, b: f32| a + (b - a) * t;
        let lerp_point = |a: Point, b: Point| Point::new(lerp(a.x, b.x), lerp(a.y, b.y));

        let mut out = raw.clone();
        out.center = lerp_point(raw.center, prev.center);
        out.bounding_box.x = lerp(raw.bounding_box.x, prev.bounding_box.x);
        out.bounding_box.y = lerp(raw.bounding_box.y, prev.bounding_box.y);
        out.bounding_box.width = lerp(raw.bounding_box.width, prev.bounding_box.width);
        out.bounding_box.height = lerp(raw.bounding_box.height, prev.bounding_box.height);
        out.landmarks.tip = lerp_point(raw.landmarks.tip, prev.landmarks.tip);
        out.landmarks.dip = lerp_point(raw.landmarks.dip, prev.landmarks.dip);
        out.landmarks.pip = lerp_point(raw.landmarks.pip, prev.landmarks.pip);
        out.landmarks.mcp = lerp_point(raw.landmarks.mcp, prev.landmarks.mcp);
        out.rotation = lerp(raw.rotation, prev.rotation);
        out.confidence = lerp(raw.confidence, prev.confidence).clamp(0.0, 1.0);
        out
    }

    /// Exponential moving average over the mask when dimensions are stable
    fn blend_mask(&mut self, raw_mask: &[f32], width: u32, height: u32) -> Vec<f32> {
        let dims_match = self.mask_width == width
            && self.mask_height == height
            && self.mask.len() == raw_mask.len();

        if dims_match && !self.mask.is_empty() {
            let alpha = self.config.mask_blend.clamp(0.0, 1.0);
            for (prev, &new) in self.mask.iter_mut().zip(raw_mask) {
                *prev = alpha * new + (1.0 - alpha) * *prev;
            }
        } else {
            self.mask = raw_mask.to_vec();
            self.mask_width = width;
            self.mask_height = height;
        }
        self.mask.clone()
    }

    /// Drop all temporal memory; called on hand loss
    pub fn reset(&mut self) {
        self.previous.clear();
        self.mask.clear();
        self.mask_width = 0;
        self.mask_height = 0;
        self.missed_frames = 0;
    }

    /// The most recent stabilized regions
    pub fn regions(&self) -> &[NailRegion] {
        &self.previous
    }
}
