//! Connected-component labeling and region extraction
//!
//! Raster-scan labeling over the post-processed mask with a disjoint-set
//! (union-find, path compression) carrying the merges; the resulting label
//! partition is identical to merging eagerly, the smaller label always
//! surviving. Surviving labels become `NailRegion`s ordered left to right.

use crate::config::PipelineConfig;
use crate::geometry::{
    BoundingBox, FingerName, Landmark, NailLandmarks, NailRegion, Point, FINGERTIP_IDS,
    LANDMARKS_PER_HAND, MAX_NAIL_REGIONS,
};

/// Label assignment for one mask
#[derive(Clone, Debug)]
pub struct LabelMap {
    /// Per-pixel label; 0 is background, regions are 1..=count
    pub labels: Vec<u32>,
    pub width: u32,
    pub height: u32,
    /// Number of distinct components
    pub count: u32,
}

fn find(parent: &mut [u32], mut label: u32) -> u32 {
    while parent[label as usize] != label {
        // Path compression: point at the grandparent as we walk up.
        parent[label as usize] = parent[parent[label as usize] as usize];
        label = parent[label as usize];
    }
    label
}

/// Label 4-connected components of pixels with value >= `threshold`
///
/// Scan order is left-to-right, top-to-bottom; when left and top neighbors
/// carry different labels the smaller label wins the merge.
pub fn label_components(mask: &[f32], width: u32, height: u32, threshold: f32) -> LabelMap {
    let w = width as usize;
    let h = height as usize;
    assert_eq!(mask.len(), w * h, "mask length must match dimensions");

    let mut labels = vec![0u32; w * h];
    // parent[0] is a background sentinel, provisional labels start at 1.
    let mut parent: Vec<u32> = vec![0];

    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            if mask[idx] < threshold {
                continue;
            }

            let left = if x > 0 { labels[idx - 1] } else { 0 };
            let top = if y > 0 { labels[idx - w] } else { 0 };

            labels[idx] = match (left, top) {
                (0, 0) => {
                    let fresh = parent.len() as u32;
                    parent.push(fresh);
                    fresh
                }
                (l, 0) => find(&mut parent, l),
                (0, t) => find(&mut parent, t),
                (l, t) => {
                    let rl = find(&mut parent, l);
                    let rt = find(&mut parent, t);
                    let (lo, hi) = if rl <= rt { (rl, rt) } else { (rt, rl) };
                    parent[hi as usize] = lo;
                    lo
                }
            };
        }
    }

    // Resolve to roots and compact to 1..=count in first-encounter order.
    let mut remap = vec![0u32; parent.len()];
    let mut count = 0u32;
    for label in labels.iter_mut() {
        if *label == 0 {
            continue;
        }
        let root = find(&mut parent, *label);
        if remap[root as usize] == 0 {
            count += 1;
            remap[root as usize] = count;
        }
        *label = remap[root as usize];
    }

    LabelMap {
        labels,
        width,
        height,
        count,
    }
}

/// Accumulated statistics for one label
#[derive(Clone, Copy, Debug)]
pub struct LabelStats {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    pub sum_x: f64,
    pub sum_y: f64,
    pub count: u32,
    pub sum_confidence: f32,
}

impl LabelStats {
    fn new() -> Self {
        Self {
            min_x: u32::MAX,
            min_y: u32::MAX,
            max_x: 0,
            max_y: 0,
            sum_x: 0.0,
            sum_y: 0.0,
            count: 0,
            sum_confidence: 0.0,
        }
    }

    /// Centroid x in mask space
    pub fn mean_x(&self) -> f32 {
        (self.sum_x / self.count.max(1) as f64) as f32
    }

    /// Centroid y in mask space
    pub fn mean_y(&self) -> f32 {
        (self.sum_y / self.count.max(1) as f64) as f32
    }
}

/// One pass over the label map collecting bbox, centroid and confidence sums
pub fn accumulate_stats(label_map: &LabelMap, mask: &[f32]) -> Vec<LabelStats> {
    let mut stats = vec![LabelStats::new(); label_map.count as usize];
    let w = label_map.width as usize;

    for (idx, &label) in label_map.labels.iter().enumerate() {
        if label == 0 {
            continue;
        }
        let x = (idx % w) as u32;
        let y = (idx / w) as u32;
        let s = &mut stats[(label - 1) as usize];
        s.min_x = s.min_x.min(x);
        s.min_y = s.min_y.min(y);
        s.max_x = s.max_x.max(x);
        s.max_y = s.max_y.max(y);
        s.sum_x += x as f64;
        s.sum_y += y as f64;
        s.count += 1;
        s.sum_confidence += mask[idx];
    }

    stats
}

/// Extract ordered nail regions from a post-processed mask
///
/// Labels below the minimum-area fraction are discarded as noise specks;
/// survivors are sorted ascending by centroid x (left-to-right finger order)
/// and capped at ten. Geometry is scaled from mask space into source space.
pub fn extract_regions(
    mask: &[f32],
    mask_width: u32,
    mask_height: u32,
    src_width: u32,
    src_height: u32,
    landmarks: Option<&[Landmark]>,
    config: &PipelineConfig,
) -> Vec<NailRegion> {
    let label_map = label_components(mask, mask_width, mask_height, config.region_threshold);
    let stats = accumulate_stats(&label_map, mask);

    let min_area = config.min_area_fraction * (mask_width * mask_height) as f32;
    let mut survivors: Vec<&LabelStats> = stats
        .iter()
        .filter(|s| s.count > 0 && (s.count as f32) >= min_area)
        .collect();

    survivors.sort_by(|a, b| a.mean_x().total_cmp(&b.mean_x()));
    survivors.truncate(MAX_NAIL_REGIONS);

    let scale_x = src_width as f32 / mask_width as f32;
    let scale_y = src_height as f32 / mask_height as f32;

    survivors
        .into_iter()
        .enumerate()
        .map(|(i, s)| to_region(i, s, scale_x, scale_y, src_width, src_height, landmarks))
        .collect()
}

fn to_region(
    index: usize,
    stats: &LabelStats,
    scale_x: f32,
    scale_y: f32,
    src_width: u32,
    src_height: u32,
    landmarks: Option<&[Landmark]>,
) -> NailRegion {
    let src_w = src_width as f32;
    let src_h = src_height as f32;

    let mut bb = BoundingBox {
        x: stats.min_x as f32 * scale_x,
        y: stats.min_y as f32 * scale_y,
        width: (stats.max_x - stats.min_x + 1) as f32 * scale_x,
        height: (stats.max_y - stats.min_y + 1) as f32 * scale_y,
    };
    // Scale correction can land a hair outside the source bounds.
    bb.x = bb.x.clamp(0.0, src_w);
    bb.y = bb.y.clamp(0.0, src_h);
    bb.width = bb.width.min(src_w - bb.x);
    bb.height = bb.height.min(src_h - bb.y);

    let center = Point::new(
        (stats.mean_x() * scale_x).clamp(0.0, src_w),
        (stats.mean_y() * scale_y).clamp(0.0, src_h),
    );

    let landmarks_out = NailLandmarks {
        tip: Point::new(center.x, bb.y),
        dip: Point::new(center.x, center.y - bb.height * 0.15),
        pip: Point::new(center.x, center.y + bb.height * 0.15),
        mcp: Point::new(center.x, bb.y + bb.height),
    };

    let rotation = landmarks
        .map(|l| rotation_from_landmarks(center, l, src_w, src_h))
        .unwrap_or(0.0);

    NailRegion {
        finger_id: index as u8,
        finger_name: FingerName::from_index(index),
        center,
        bounding_box: bb,
        landmarks: landmarks_out,
        rotation,
        confidence: (stats.sum_confidence / stats.count.max(1) as f32).clamp(0.0, 1.0),
    }
}

/// Orientation from the nearest fingertip's dip-to-tip direction
///
/// Angle is measured from the upward vertical; 0 when the finger points
/// straight up. Falls back to 0 when no fingertip lies near the region.
fn rotation_from_landmarks(center: Point, landmarks: &[Landmark], src_w: f32, src_h: f32) -> f32 {
    let radius = 0.15 * src_w.max(src_h);
    let mut best: Option<(f32, f32)> = None;

    let chunk = if landmarks.len() % LANDMARKS_PER_HAND == 0 {
        LANDMARKS_PER_HAND
    } else {
        landmarks.len().max(1)
    };

    for hand in landmarks.chunks(chunk) {
        for &tip_id in &FINGERTIP_IDS {
            let tip = hand.iter().find(|l| l.id == tip_id as u32);
            let dip = hand.iter().find(|l| l.id == (tip_id - 1) as u32);
            let (Some(tip), Some(dip)) = (tip, dip) else {
                continue;
            };

            let tx = tip.x * src_w;
            let ty = tip.y * src_h;
            let dist = ((tx - center.x).powi(2) + (ty - center.y).powi(2)).sqrt();
            if dist > radius {
                continue;
            }
            if best.map(|(d, _)| dist < d).unwrap_or(true) {
                let dx = (tip.x - dip.x) * src_w;
                let dy = (tip.y - dip.y) * src_h;
                best = Some((dist, dx.atan2(-dy)));
            }
        }
    }

    best.map(|(_, rot)| rot).unwrap_or(0.0)
}
