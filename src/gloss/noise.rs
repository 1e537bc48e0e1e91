//! Layered texture noise
//!
//! A coarse random grid is upsampled with smoothstep-eased bilinear
//! interpolation into a low-frequency field, then blended 70/30 with
//! independent per-pixel jitter. The buffer is tied to the canvas
//! dimensions and cached between frames.

use rand::Rng;

/// Coarse grid cell size in pixels
const CELL_SIZE: u32 = 8;

/// Low-frequency vs per-pixel jitter blend
const LOW_FREQ_WEIGHT: f32 = 0.7;

fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

/// Cached width x height noise field with values in [0, 1]
#[derive(Clone, Debug)]
pub struct NoiseBuffer {
    values: Vec<f32>,
    width: u32,
    height: u32,
}

impl NoiseBuffer {
    /// Generate a fresh field for the given canvas dimensions
    pub fn generate<R: Rng>(width: u32, height: u32, rng: &mut R) -> Self {
        let grid_w = (width / CELL_SIZE + 2) as usize;
        let grid_h = (height / CELL_SIZE + 2) as usize;
        let grid: Vec<f32> = (0..grid_w * grid_h).map(|_| rng.random::<f32>()).collect();

        let mut values = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let gx = (x / CELL_SIZE) as usize;
                let gy = (y / CELL_SIZE) as usize;
                let tx = smoothstep((x % CELL_SIZE) as f32 / CELL_SIZE as f32);
                let ty = smoothstep((y % CELL_SIZE) as f32 / CELL_SIZE as f32);

                let i00 = grid[gy * grid_w + gx];
                let i10 = grid[gy * grid_w + gx + 1];
                let i01 = grid[(gy + 1) * grid_w + gx];
                let i11 = grid[(gy + 1) * grid_w + gx + 1];

                let top = i00 + (i10 - i00) * tx;
                let bottom = i01 + (i11 - i01) * tx;
                let low = top + (bottom - top) * ty;

                let high = rng.random::<f32>();
                values.push(LOW_FREQ_WEIGHT * low + (1.0 - LOW_FREQ_WEIGHT) * high);
            }
        }

        Self {
            values,
            width,
            height,
        }
    }

    /// Whether this buffer was generated for the given dimensions
    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    /// The noise field, row-major
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Noise value recentered to [-1, 1] for signed application
    pub fn signed(&self, idx: usize) -> f32 {
        self.values[idx] * 2.0 - 1.0
    }
}
