//! Error taxonomy for the detection and compositing pipeline
//!
//! Detection-stage errors degrade to "no regions this frame" at the pipeline
//! level; only `ModelUnavailable` is fatal until the host re-initializes.

use thiserror::Error;

/// Why a frame's landmark geometry was rejected before inference
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnsuitableReason {
    /// No hand landmarks this frame
    NoHand,
    /// Fewer than the expected 21 landmarks per hand
    IncompleteLandmarks,
    /// Hand too small in frame to segment reliably
    HandTooSmall,
    /// Palm plane close to edge-on, nails likely occluded
    HandTooRotated,
}

impl std::fmt::Display for UnsuitableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnsuitableReason::NoHand => "no hand detected",
            UnsuitableReason::IncompleteLandmarks => "incomplete landmark set",
            UnsuitableReason::HandTooSmall => "hand too small in frame",
            UnsuitableReason::HandTooRotated => "hand too rotated",
        };
        write!(f, "{}", s)
    }
}

/// Pipeline error type
#[derive(Debug, Error)]
pub enum GlossError {
    /// Recoverable: retried automatically next frame, no inference performed
    #[error("hand not suitable for detection: {0}")]
    HandUnsuitable(UnsuitableReason),

    /// Malformed frame or tensor shape; caller must fix upstream
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Inference collaborator failed for one frame; no automatic retry
    #[error("inference failed: {0}")]
    InferenceFailure(String),

    /// Backend failed to initialize; fatal until re-initialized by the host
    #[error("segmentation model unavailable")]
    ModelUnavailable,
}

impl GlossError {
    /// Whether the next frame can simply retry without host intervention
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, GlossError::ModelUnavailable)
    }
}
