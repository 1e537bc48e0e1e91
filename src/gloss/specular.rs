//! Specular highlight map
//!
//! The highlight is a horizontal Gaussian band whose center drifts with a
//! parabolic curvature term, so it appears to wrap the nail's cylindrical
//! surface, attenuated vertically by a Gaussian around the configured
//! highlight position.

/// Foreground threshold for the per-row scan
const FOREGROUND: f32 = 0.3;

/// Vertical Gaussian sigma in normalized y
const VERTICAL_SIGMA: f32 = 0.22;

/// Fill `out` with the specular map for `mask`
///
/// `out` is resized and zeroed; rows without foreground pixels stay empty.
pub fn specular_map(
    mask: &[f32],
    width: u32,
    height: u32,
    specular_width: f32,
    specular_position: f32,
    out: &mut Vec<f32>,
) {
    let w = width as usize;
    let h = height as usize;
    out.clear();
    out.resize(w * h, 0.0);

    for y in 0..h {
        let row = &mask[y * w..(y + 1) * w];
        let Some(row_min) = row.iter().position(|&v| v > FOREGROUND) else {
            continue;
        };
        let row_max = row.iter().rposition(|&v| v > FOREGROUND).unwrap_or(row_min);
        let row_width = (row_max - row_min) as f32;

        let norm_y = y as f32 / h as f32;
        let dy = norm_y - specular_position;

        // Highlight center sits at 40% of the row span, bent by curvature.
        let center = row_min as f32 + 0.4 * row_width + dy * dy * row_width * 0.3 * 0.5;

        let sigma = (row_width * 0.5 * specular_width).max(1.0);
        let vertical = (-(dy * dy) / (2.0 * VERTICAL_SIGMA * VERTICAL_SIGMA)).exp();

        for x in row_min..=row_max {
            let dx = x as f32 - center;
            let horizontal = (-(dx * dx) / (2.0 * sigma * sigma)).exp();
            out[y * w + x] = horizontal * vertical;
        }
    }
}
