//! Fresnel rim glow map
//!
//! Mask edges are found by central-difference gradient magnitude; strong
//! edges seed a radius-limited linear-falloff glow over the foreground side.
//! Overlapping glows combine by max so adjacent edges never double-brighten.

/// Gradient magnitude above which a pixel counts as an edge
const EDGE_THRESHOLD: f32 = 0.05;

/// Glow spread radius in pixels
const GLOW_RADIUS: i32 = 4;

/// Mask floor below which a pixel is outside the nail
const MASK_FLOOR: f32 = 0.05;

/// Edge strength gain before the falloff
const EDGE_GAIN: f32 = 3.0;

/// Fill `out` with the rim glow map for `mask`
///
/// `out` is resized and zeroed.
pub fn fresnel_map(mask: &[f32], width: u32, height: u32, out: &mut Vec<f32>) {
    let w = width as usize;
    let h = height as usize;
    out.clear();
    out.resize(w * h, 0.0);
    if w < 3 || h < 3 {
        return;
    }

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let idx = y * w + x;
            if mask[idx] <= MASK_FLOOR {
                continue;
            }

            let gx = (mask[idx + 1] - mask[idx - 1]) * 0.5;
            let gy = (mask[idx + w] - mask[idx - w]) * 0.5;
            let magnitude = (gx * gx + gy * gy).sqrt();
            if magnitude <= EDGE_THRESHOLD {
                continue;
            }

            let strength = (magnitude * EDGE_GAIN).min(1.0);
            spread_glow(mask, out, w, h, x, y, strength);
        }
    }
}

/// Linear-falloff glow around an edge pixel, max-combined onto `out`
fn spread_glow(
    mask: &[f32],
    out: &mut [f32],
    w: usize,
    h: usize,
    x: usize,
    y: usize,
    strength: f32,
) {
    let radius = GLOW_RADIUS as f32;
    for dy in -GLOW_RADIUS..=GLOW_RADIUS {
        for dx in -GLOW_RADIUS..=GLOW_RADIUS {
            let tx = x as i32 + dx;
            let ty = y as i32 + dy;
            if tx < 0 || ty < 0 || tx >= w as i32 || ty >= h as i32 {
                continue;
            }
            let dist = ((dx * dx + dy * dy) as f32).sqrt();
            if dist > radius {
                continue;
            }
            let target = ty as usize * w + tx as usize;
            // Glow only falls on the foreground side of the edge.
            if mask[target] <= MASK_FLOOR {
                continue;
            }
            let value = strength * (1.0 - dist / radius);
            if value > out[target] {
                out[target] = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disc_mask(w: usize, h: usize, cx: f32, cy: f32, r: f32) -> Vec<f32> {
        let mut mask = vec![0.0; w * h];
        for y in 0..h {
            for x in 0..w {
                let d = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
                if d <= r {
                    mask[y * w + x] = 1.0;
                }
            }
        }
        mask
    }

    #[test]
    fn test_flat_mask_has_no_glow() {
        let mask = vec![1.0; 16 * 16];
        let mut out = Vec::new();
        fresnel_map(&mask, 16, 16, &mut out);
        // Interior is gradient-free; only the implicit border could matter
        // and border pixels are never sampled.
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_glow_hugs_the_edge() {
        let mask = disc_mask(32, 32, 16.0, 16.0, 10.0);
        let mut out = Vec::new();
        fresnel_map(&mask, 32, 32, &mut out);

        // Near the rim (inside): glow present.
        let rim_idx = 16 * 32 + (16 + 9);
        assert!(out[rim_idx] > 0.0);
        // Deep interior: out of glow range.
        let center_idx = 16 * 32 + 16;
        assert_eq!(out[center_idx], 0.0);
        // Outside the disc: glow never leaks out.
        let outside_idx = 16 * 32 + (16 + 14);
        assert_eq!(out[outside_idx], 0.0);
    }

    #[test]
    fn test_values_bounded() {
        let mask = disc_mask(24, 24, 12.0, 12.0, 8.0);
        let mut out = Vec::new();
        fresnel_map(&mask, 24, 24, &mut out);
        assert!(out.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_overlapping_edges_take_max_not_sum() {
        // A 3-wide strip: both long edges glow into the same pixels. If the
        // contributions summed, interior values would exceed the strength of
        // a single edge (capped at 1.0 by construction here).
        let mut mask = vec![0.0; 16 * 16];
        for y in 2..14 {
            for x in 6..9 {
                mask[y * 16 + x] = 1.0;
            }
        }
        let mut out = Vec::new();
        fresnel_map(&mask, 16, 16, &mut out);
        assert!(out.iter().all(|&v| v <= 1.0));
    }

    #[test]
    fn test_tiny_mask_is_noop() {
        let mask = vec![1.0; 4];
        let mut out = Vec::new();
        fresnel_map(&mask, 2, 2, &mut out);
        assert_eq!(out, vec![0.0; 4]);
    }
}
