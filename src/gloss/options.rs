//! Finish presets and render options
//!
//! A finish names a bundle of default parameter values; explicit per-field
//! overrides always win over the preset.

use serde::{Deserialize, Serialize};

/// Named nail finish
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Finish {
    #[default]
    Glossy,
    Matte,
    Shimmer,
    Chrome,
    Velvet,
}

impl Finish {
    /// Default parameter values for this finish
    pub fn defaults(&self) -> ResolvedOptions {
        match self {
            Finish::Glossy => ResolvedOptions {
                specular_intensity: 0.9,
                specular_width: 0.35,
                specular_position: 0.3,
                fresnel_intensity: 0.5,
                texture_noise: 0.05,
                scene_brightness: 0.5,
                jelly_transparency: 0.0,
            },
            Finish::Matte => ResolvedOptions {
                specular_intensity: 0.15,
                specular_width: 0.7,
                specular_position: 0.35,
                fresnel_intensity: 0.15,
                texture_noise: 0.35,
                scene_brightness: 0.5,
                jelly_transparency: 0.0,
            },
            Finish::Shimmer => ResolvedOptions {
                specular_intensity: 0.7,
                specular_width: 0.5,
                specular_position: 0.3,
                fresnel_intensity: 0.6,
                texture_noise: 0.8,
                scene_brightness: 0.5,
                jelly_transparency: 0.0,
            },
            Finish::Chrome => ResolvedOptions {
                specular_intensity: 1.0,
                specular_width: 0.2,
                specular_position: 0.28,
                fresnel_intensity: 0.9,
                texture_noise: 0.02,
                scene_brightness: 0.5,
                jelly_transparency: 0.0,
            },
            Finish::Velvet => ResolvedOptions {
                specular_intensity: 0.3,
                specular_width: 0.8,
                specular_position: 0.4,
                fresnel_intensity: 0.7,
                texture_noise: 0.5,
                scene_brightness: 0.5,
                jelly_transparency: 0.0,
            },
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Finish::Glossy => "Glossy",
            Finish::Matte => "Matte",
            Finish::Shimmer => "Shimmer",
            Finish::Chrome => "Chrome",
            Finish::Velvet => "Velvet",
        }
    }

    /// All available finishes
    pub fn all() -> &'static [Finish] {
        &[
            Finish::Glossy,
            Finish::Matte,
            Finish::Shimmer,
            Finish::Chrome,
            Finish::Velvet,
        ]
    }
}

impl std::fmt::Display for Finish {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Fully resolved render parameters, all in [0, 1]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedOptions {
    pub specular_intensity: f32,
    pub specular_width: f32,
    /// Vertical highlight position in normalized y
    pub specular_position: f32,
    pub fresnel_intensity: f32,
    pub texture_noise: f32,
    /// Re-centers effect intensity; 0.5 is neutral
    pub scene_brightness: f32,
    pub jelly_transparency: f32,
}

impl ResolvedOptions {
    /// Intensity multiplier derived from scene brightness
    pub fn brightness_scale(&self) -> f32 {
        0.5 + self.scene_brightness
    }
}

/// Render options: a finish preset plus optional per-field overrides
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    pub finish: Finish,
    pub specular_intensity: Option<f32>,
    pub specular_width: Option<f32>,
    pub specular_position: Option<f32>,
    pub fresnel_intensity: Option<f32>,
    pub texture_noise: Option<f32>,
    pub scene_brightness: Option<f32>,
    pub jelly_transparency: Option<f32>,
}

impl RenderOptions {
    /// Options for a finish with no overrides
    pub fn with_finish(finish: Finish) -> Self {
        Self {
            finish,
            ..Default::default()
        }
    }

    /// Apply overrides on top of the preset defaults
    pub fn resolve(&self) -> ResolvedOptions {
        let clamp = |v: f32| v.clamp(0.0, 1.0);
        let base = self.finish.defaults();
        ResolvedOptions {
            specular_intensity: clamp(
                self.specular_intensity.unwrap_or(base.specular_intensity),
            ),
            specular_width: clamp(self.specular_width.unwrap_or(base.specular_width)),
            specular_position: clamp(self.specular_position.unwrap_or(base.specular_position)),
            fresnel_intensity: clamp(self.fresnel_intensity.unwrap_or(base.fresnel_intensity)),
            texture_noise: clamp(self.texture_noise.unwrap_or(base.texture_noise)),
            scene_brightness: clamp(self.scene_brightness.unwrap_or(base.scene_brightness)),
            jelly_transparency: clamp(
                self.jelly_transparency.unwrap_or(base.jelly_transparency),
            ),
        }
    }
}
