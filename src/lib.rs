//! Nail Gloss - real-time nail segmentation and gloss overlay
//!
//! Turns a per-frame neural segmentation output into stable, per-finger nail
//! regions and composites a procedural gloss/specular overlay onto them.
//! Landmarks come from an external hand tracker; inference runs through a
//! swappable ONNX Runtime backend on a background thread so a slow model
//! never blocks the render cadence.

pub mod config;
pub mod error;
pub mod geometry;
pub mod gloss;
pub mod ml;
pub mod pipeline;
pub mod segmentation;
pub mod source;
pub mod stabilizer;

pub use config::PipelineConfig;
pub use error::GlossError;
pub use geometry::{Landmark, NailRegion};
pub use gloss::{Finish, RenderOptions};
pub use ml::InferenceBackend;
pub use pipeline::GlossPipeline;
pub use segmentation::SegmentationResult;
