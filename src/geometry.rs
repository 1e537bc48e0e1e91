//! Shared geometry and detection result types
//!
//! Landmarks follow the 21-point hand skeleton convention used by MediaPipe
//! style trackers. Nail regions are the per-finger output of segmentation,
//! expressed in source-frame coordinates.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Number of landmarks per tracked hand
pub const LANDMARKS_PER_HAND: usize = 21;

/// Maximum nail regions per frame (two hands x five fingers)
pub const MAX_NAIL_REGIONS: usize = 10;

/// Fingertip landmark ids (thumb through pinky)
pub const FINGERTIP_IDS: [u8; 5] = [4, 8, 12, 16, 20];

/// Landmark ids spanning the palm (wrist plus the four finger MCPs)
pub const PALM_IDS: [u8; 5] = [0, 5, 9, 13, 17];

/// A single hand keypoint from the external tracker
///
/// Coordinates are normalized to [0, 1] in frame space; `z` is the tracker's
/// model-space depth.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Landmark {
    /// Landmark id (0..20 within a hand)
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    /// Create a new landmark
    pub fn new(id: u32, x: f32, y: f32, z: f32) -> Self {
        Self { id, x, y, z }
    }

    /// Planar distance to another landmark
    pub fn distance_to(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Compute the palm center as the mean of the wrist and finger MCPs
///
/// Returns `None` when the slice does not carry all palm landmarks.
pub fn palm_center(landmarks: &[Landmark]) -> Option<Point> {
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    for id in PALM_IDS {
        let lm = landmarks.iter().find(|l| l.id == id as u32)?;
        sum_x += lm.x;
        sum_y += lm.y;
    }
    Some(Point {
        x: sum_x / PALM_IDS.len() as f32,
        y: sum_y / PALM_IDS.len() as f32,
    })
}

/// A 2D point in source-frame pixel coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box in source-frame pixel coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Center of the box
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width * 0.5,
            y: self.y + self.height * 0.5,
        }
    }

    /// Whether the box lies entirely within `[0, width) x [0, height)`
    pub fn within(&self, width: f32, height: f32) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.x + self.width <= width
            && self.y + self.height <= height
    }
}

/// Finger identity for a nail region
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FingerName {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl FingerName {
    /// Map a left-to-right finger index (0..9) onto a name
    pub fn from_index(index: usize) -> Self {
        match index % 5 {
            0 => FingerName::Thumb,
            1 => FingerName::Index,
            2 => FingerName::Middle,
            3 => FingerName::Ring,
            _ => FingerName::Pinky,
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            FingerName::Thumb => "thumb",
            FingerName::Index => "index",
            FingerName::Middle => "middle",
            FingerName::Ring => "ring",
            FingerName::Pinky => "pinky",
        }
    }
}

impl std::fmt::Display for FingerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Synthetic per-nail joint points derived from region geometry
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NailLandmarks {
    /// Top-center of the nail
    pub tip: Point,
    pub dip: Point,
    pub pip: Point,
    /// Bottom-center of the nail
    pub mcp: Point,
}

/// One detected fingernail for a single frame
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NailRegion {
    /// Left-to-right finger index, 0..9
    pub finger_id: u8,
    pub finger_name: FingerName,
    /// Region centroid in source-frame coordinates
    pub center: Point,
    pub bounding_box: BoundingBox,
    pub landmarks: NailLandmarks,
    /// Orientation in radians, measured from the upward vertical
    pub rotation: f32,
    /// Mean mask value over this region's labeled pixels, in [0, 1]
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finger_name_from_index() {
        assert_eq!(FingerName::from_index(0), FingerName::Thumb);
        assert_eq!(FingerName::from_index(4), FingerName::Pinky);
        assert_eq!(FingerName::from_index(5), FingerName::Thumb);
        assert_eq!(FingerName::from_index(9), FingerName::Pinky);
    }

    #[test]
    fn test_bounding_box_center_and_bounds() {
        let bb = BoundingBox {
            x: 4.0,
            y: 4.0,
            width: 3.0,
            height: 3.0,
        };
        assert_eq!(bb.center(), Point::new(5.5, 5.5));
        assert!(bb.within(10.0, 10.0));
        assert!(!bb.within(6.0, 10.0));
    }

    #[test]
    fn test_palm_center() {
        let landmarks: Vec<Landmark> = PALM_IDS
            .iter()
            .map(|&id| Landmark::new(id as u32, 0.5, 0.6, 0.0))
            .collect();
        let center = palm_center(&landmarks).unwrap();
        assert!((center.x - 0.5).abs() < 1e-6);
        assert!((center.y - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_palm_center_missing_landmark() {
        let landmarks = [Landmark::new(0, 0.5, 0.5, 0.0)];
        assert!(palm_center(&landmarks).is_none());
    }

    #[test]
    fn test_landmark_distance() {
        let a = Landmark::new(0, 0.0, 0.0, 0.0);
        let b = Landmark::new(1, 3.0, 4.0, 0.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-6);
    }
}
