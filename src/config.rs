//! Pipeline configuration
//!
//! All tunable thresholds and model parameters live here so the host can
//! load them from JSON alongside its own settings. Defaults match the
//! shipped model and tuning.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::GlossError;

/// Segmentation model configuration
///
/// The model path and tensor shapes are configuration, not hard-coded; any
/// ONNX model with a `[1,3,H,W]` input and `[1,1,h,w]` probability output
/// can be dropped in.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Path to the ONNX segmentation model
    pub path: PathBuf,
    /// Model input width (square models use the same value twice)
    pub input_width: u32,
    /// Model input height
    pub input_height: u32,
    /// Output mask width
    pub mask_width: u32,
    /// Output mask height
    pub mask_height: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/nail_segmentation.onnx"),
            input_width: 256,
            input_height: 256,
            mask_width: 256,
            mask_height: 256,
        }
    }
}

/// Landmark filter tuning
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct StabilizerConfig {
    /// How quickly the filter's uncertainty grows between frames
    pub process_noise: f32,
    /// How noisy individual tracker measurements are assumed to be
    pub measurement_noise: f32,
    /// Blend between raw measurement (0) and filtered estimate (1)
    pub smoothing_factor: f32,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            process_noise: 0.004,
            measurement_noise: 0.05,
            smoothing_factor: 0.85,
        }
    }
}

/// Region/mask temporal smoothing tuning
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RegionStabilizerConfig {
    /// Weight of the previous stabilized set when blending centers/boxes
    pub smoothing: f32,
    /// Frames a transient missed detection may persist before regions clear
    pub max_missed_frames: u32,
    /// Confidence decay applied to carried-forward regions per missed frame
    pub missed_decay: f32,
    /// EMA weight of the newest mask
    pub mask_blend: f32,
    /// Max center distance (fraction of mask diagonal) to match regions
    pub match_radius: f32,
}

impl Default for RegionStabilizerConfig {
    fn default() -> Self {
        Self {
            smoothing: 0.6,
            max_missed_frames: 2,
            missed_decay: 0.75,
            mask_blend: 0.55,
            match_radius: 0.08,
        }
    }
}

/// Suitability gate tuning
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SuitabilityConfig {
    /// Minimum normalized landmark-cloud diagonal for a usable hand
    pub min_hand_span: f32,
    /// Minimum palm-triangle area over squared palm length; below this the
    /// palm plane is close to edge-on
    pub min_palm_ratio: f32,
}

impl Default for SuitabilityConfig {
    fn default() -> Self {
        Self {
            min_hand_span: 0.12,
            min_palm_ratio: 0.04,
        }
    }
}

/// Top-level pipeline configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Soft-threshold knee for mask post-processing
    pub confidence_threshold: f32,
    /// Foreground threshold for region extraction
    pub region_threshold: f32,
    /// Labels smaller than this fraction of the mask are noise specks
    pub min_area_fraction: f32,
    /// Minimum interval between composited frames, in milliseconds
    pub render_interval_ms: u64,
    pub model: ModelConfig,
    pub stabilizer: StabilizerConfig,
    pub region_stabilizer: RegionStabilizerConfig,
    pub suitability: SuitabilityConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            region_threshold: 0.3,
            min_area_fraction: 0.001,
            render_interval_ms: 100,
            model: ModelConfig::default(),
            stabilizer: StabilizerConfig::default(),
            region_stabilizer: RegionStabilizerConfig::default(),
            suitability: SuitabilityConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, GlossError> {
        serde_json::from_str(json).map_err(|e| GlossError::InvalidInput(format!("config: {}", e)))
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self, GlossError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| GlossError::InvalidInput(format!("config {:?}: {}", path, e)))?;
        Self::from_json(&contents)
    }

    /// Confidence threshold clamped away from the degenerate endpoints
    ///
    /// The soft-threshold formula divides by `1 - t` and `0.3 * t`.
    pub fn clamped_confidence_threshold(&self) -> f32 {
        self.confidence_threshold.clamp(0.05, 0.95)
    }
}
