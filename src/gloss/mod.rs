//! Gloss compositor
//!
//! Computes the specular, fresnel and noise maps for a stabilized mask and
//! blends them into the host's RGBA overlay buffer. Runs on the tick loop
//! every rendered frame; all channel math is clamped so extreme option
//! values can never overflow or go non-finite.

pub mod fresnel;
pub mod noise;
pub mod options;
pub mod specular;

pub use options::{Finish, RenderOptions, ResolvedOptions};

use noise::NoiseBuffer;

/// Mask floor below which a pixel receives no gloss
const MASK_FLOOR: f32 = 0.05;

/// Specular contribution at full intensity, in channel units
const SPECULAR_GAIN: f32 = 255.0;

/// Fresnel contribution for red/green at full intensity
const FRESNEL_GAIN_RG: f32 = 170.0;

/// Fresnel contribution for blue; slightly heavier for a cool rim tint
const FRESNEL_GAIN_B: f32 = 220.0;

/// Signed noise amplitude at full texture_noise, in channel units
const NOISE_GAIN: f32 = 40.0;

/// Jelly lightening fraction at full transparency
const JELLY_GAIN: f32 = 0.35;

/// BT.709 luma weights for scene brightness estimation
const LUMA_WEIGHTS: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Composites procedural gloss onto an overlay buffer
pub struct GlossCompositor {
    options: RenderOptions,
    noise: Option<NoiseBuffer>,
    specular: Vec<f32>,
    fresnel: Vec<f32>,
    rng: rand::rngs::ThreadRng,
}

impl GlossCompositor {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            noise: None,
            specular: Vec::new(),
            fresnel: Vec::new(),
            rng: rand::rng(),
        }
    }

    /// Switch the finish preset
    ///
    /// Leaves the cached noise buffer alone: only an explicit texture-noise
    /// update or a canvas resize regenerates it.
    pub fn set_finish(&mut self, finish: Finish) {
        self.options.finish = finish;
    }

    /// Explicitly override the texture noise amount
    ///
    /// This invalidates the cached noise buffer.
    pub fn set_texture_noise(&mut self, value: f32) {
        self.options.texture_noise = Some(value);
        self.noise = None;
    }

    /// Feed back the estimated scene brightness
    pub fn set_scene_brightness(&mut self, value: f32) {
        self.options.scene_brightness = Some(value);
    }

    /// Replace the full option set
    ///
    /// The noise buffer is regenerated only when the explicit texture-noise
    /// override actually changed.
    pub fn set_options(&mut self, options: RenderOptions) {
        if options.texture_noise != self.options.texture_noise {
            self.noise = None;
        }
        self.options = options;
    }

    /// Current options
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Drop the cached noise buffer
    pub fn invalidate_noise(&mut self) {
        self.noise = None;
    }

    /// Clear all cached per-frame state
    pub fn reset(&mut self) {
        self.noise = None;
        self.specular.clear();
        self.fresnel.clear();
    }

    /// Blend gloss into `overlay` wherever `mask` is foreground
    ///
    /// `overlay` is tightly-packed RGBA at the mask's dimensions. Size
    /// mismatches are programmer errors and fail loudly.
    pub fn apply(&mut self, overlay: &mut [u8], mask: &[f32], width: u32, height: u32) {
        let pixels = width as usize * height as usize;
        assert_eq!(mask.len(), pixels, "mask size must match dimensions");
        assert_eq!(overlay.len(), pixels * 4, "overlay must be RGBA at mask size");

        let opts = self.options.resolve();

        if let Some(n) = &self.noise {
            if !n.matches(width, height) {
                self.noise = None;
            }
        }
        let rng = &mut self.rng;
        let noise = self.noise.get_or_insert_with(|| {
            log::debug!("regenerating {}x{} noise buffer", width, height);
            NoiseBuffer::generate(width, height, rng)
        });

        specular::specular_map(
            mask,
            width,
            height,
            opts.specular_width,
            opts.specular_position,
            &mut self.specular,
        );
        fresnel::fresnel_map(mask, width, height, &mut self.fresnel);

        let brightness = opts.brightness_scale();

        for idx in 0..pixels {
            let m = mask[idx];
            if m <= MASK_FLOOR {
                continue;
            }
            let base = idx * 4;

            let spec = self.specular[idx] * opts.specular_intensity * brightness * m;
            let fres = self.fresnel[idx] * opts.fresnel_intensity * brightness * m;
            let grain = noise.signed(idx) * opts.texture_noise * m * NOISE_GAIN;

            for c in 0..3 {
                let fresnel_gain = if c == 2 { FRESNEL_GAIN_B } else { FRESNEL_GAIN_RG };
                let mut v = overlay[base + c] as f32
                    + spec * SPECULAR_GAIN
                    + fres * fresnel_gain
                    + grain;
                if opts.jelly_transparency > 0.0 {
                    v += (255.0 - v) * opts.jelly_transparency * JELLY_GAIN * m;
                }
                overlay[base + c] = v.round().clamp(0.0, 255.0) as u8;
            }

            let alpha = (m * 255.0).round().clamp(0.0, 255.0) as u8;
            overlay[base + 3] = overlay[base + 3].max(alpha);
        }
    }

    /// Sparse-sampled perceptual scene brightness of an RGBA frame
    ///
    /// Samples every `stride`-th pixel; returns mean BT.709 luma in [0, 1].
    pub fn estimate_scene_brightness(rgba: &[u8], stride: usize) -> f32 {
        let stride = stride.max(1);
        let pixels = rgba.len() / 4;
        let mut sum = 0.0f64;
        let mut count = 0u32;
        for idx in (0..pixels).step_by(stride) {
            let base = idx * 4;
            let luma = LUMA_WEIGHTS[0] * rgba[base] as f32
                + LUMA_WEIGHTS[1] * rgba[base + 1] as f32
                + LUMA_WEIGHTS[2] * rgba[base + 2] as f32;
            sum += (luma / 255.0) as f64;
            count += 1;
        }
        if count == 0 {
            0.5
        } else {
            (sum / count as f64) as f32
        }
    }
}

impl Default for GlossCompositor {
    fn default() -> Self {
        Self::new(RenderOptions::default())
    }
}
