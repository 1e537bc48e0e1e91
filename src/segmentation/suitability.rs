//! Landmark suitability gate
//!
//! Inference is the expensive step, so frames whose hand geometry cannot
//! yield usable nails are rejected up front: no hand, a truncated landmark
//! set, a hand too far away, or a palm plane so rotated the nails are
//! likely occluded.

use crate::config::SuitabilityConfig;
use crate::error::UnsuitableReason;
use crate::geometry::{Landmark, LANDMARKS_PER_HAND};

/// Check whether the stabilized landmark set is usable for segmentation
///
/// Returns the first failing reason; `Ok(())` means inference may proceed.
pub fn check_suitability(
    landmarks: Option<&[Landmark]>,
    config: &SuitabilityConfig,
) -> Result<(), UnsuitableReason> {
    let landmarks = match landmarks {
        Some(l) if !l.is_empty() => l,
        _ => return Err(UnsuitableReason::NoHand),
    };

    if landmarks.len() % LANDMARKS_PER_HAND != 0 {
        return Err(UnsuitableReason::IncompleteLandmarks);
    }

    for hand in landmarks.chunks(LANDMARKS_PER_HAND) {
        check_hand(hand, config)?;
    }
    Ok(())
}

fn check_hand(hand: &[Landmark], config: &SuitabilityConfig) -> Result<(), UnsuitableReason> {
    if span(hand) < config.min_hand_span {
        return Err(UnsuitableReason::HandTooSmall);
    }
    if palm_ratio(hand) < config.min_palm_ratio {
        return Err(UnsuitableReason::HandTooRotated);
    }
    Ok(())
}

/// Diagonal of the landmark cloud's bounding box, in normalized units
fn span(hand: &[Landmark]) -> f32 {
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for lm in hand {
        min_x = min_x.min(lm.x);
        min_y = min_y.min(lm.y);
        max_x = max_x.max(lm.x);
        max_y = max_y.max(lm.y);
    }
    ((max_x - min_x).powi(2) + (max_y - min_y).powi(2)).sqrt()
}

/// Area of the wrist / index-MCP / pinky-MCP triangle over squared palm
/// length
///
/// The ratio collapses toward zero as the palm plane turns edge-on to the
/// camera, regardless of how large the hand is in frame.
fn palm_ratio(hand: &[Landmark]) -> f32 {
    let wrist = hand.iter().find(|l| l.id == 0);
    let index_mcp = hand.iter().find(|l| l.id == 5);
    let middle_mcp = hand.iter().find(|l| l.id == 9);
    let pinky_mcp = hand.iter().find(|l| l.id == 17);
    let (Some(w), Some(i), Some(m), Some(p)) = (wrist, index_mcp, middle_mcp, pinky_mcp) else {
        return 0.0;
    };

    let area = 0.5
        * ((i.x - w.x) * (p.y - w.y) - (p.x - w.x) * (i.y - w.y)).abs();
    let palm_len_sq = (m.x - w.x).powi(2) + (m.y - w.y).powi(2);
    if palm_len_sq <= f32::EPSILON {
        return 0.0;
    }
    area / palm_len_sq
}

#[cfg(test)]
mod tests {
    use super::*;

    /// An open, camera-facing hand spanning a healthy part of the frame
    fn open_hand() -> Vec<Landmark> {
        (0..LANDMARKS_PER_HAND as u32)
            .map(|id| {
                // Wrist at bottom center, MCPs fanned above it, fingers up.
                let (x, y) = match id {
                    0 => (0.5, 0.85),
                    5 => (0.35, 0.55),
                    9 => (0.45, 0.52),
                    13 => (0.55, 0.52),
                    17 => (0.65, 0.55),
                    _ => (0.3 + 0.02 * id as f32, 0.3),
                };
                Landmark::new(id, x, y, 0.0)
            })
            .collect()
    }

    #[test]
    fn test_open_hand_is_suitable() {
        let cfg = SuitabilityConfig::default();
        assert!(check_suitability(Some(&open_hand()), &cfg).is_ok());
    }

    #[test]
    fn test_no_hand() {
        let cfg = SuitabilityConfig::default();
        assert_eq!(
            check_suitability(None, &cfg),
            Err(UnsuitableReason::NoHand)
        );
        assert_eq!(
            check_suitability(Some(&[]), &cfg),
            Err(UnsuitableReason::NoHand)
        );
    }

    #[test]
    fn test_incomplete_landmarks() {
        let cfg = SuitabilityConfig::default();
        let partial = open_hand()[..10].to_vec();
        assert_eq!(
            check_suitability(Some(&partial), &cfg),
            Err(UnsuitableReason::IncompleteLandmarks)
        );
    }

    #[test]
    fn test_tiny_hand_rejected() {
        let cfg = SuitabilityConfig::default();
        let tiny: Vec<Landmark> = open_hand()
            .into_iter()
            .map(|mut l| {
                l.x = 0.5 + (l.x - 0.5) * 0.05;
                l.y = 0.5 + (l.y - 0.5) * 0.05;
                l
            })
            .collect();
        assert_eq!(
            check_suitability(Some(&tiny), &cfg),
            Err(UnsuitableReason::HandTooSmall)
        );
    }

    #[test]
    fn test_edge_on_palm_rejected() {
        let cfg = SuitabilityConfig::default();
        // Squash horizontally: palm landmarks collapse onto a vertical line,
        // as when the hand is seen edge-on.
        let edge_on: Vec<Landmark> = open_hand()
            .into_iter()
            .map(|mut l| {
                l.x = 0.5 + (l.x - 0.5) * 0.02;
                l
            })
            .collect();
        assert_eq!(
            check_suitability(Some(&edge_on), &cfg),
            Err(UnsuitableReason::HandTooRotated)
        );
    }
}
