//! Frame pipeline
//!
//! One tick per host frame: stabilize landmarks, submit the frame for
//! asynchronous detection, fold in whatever detection last completed, and
//! composite the gloss overlay at a throttled cadence decoupled from both
//! the display refresh and the inference rate. All stabilizer state is owned
//! exclusively by this struct; dropping the pipeline stops and joins the
//! inference worker and clears every cache.

use std::time::Instant;

use crate::config::PipelineConfig;
use crate::error::GlossError;
use crate::geometry::{Landmark, NailRegion};
use crate::gloss::{GlossCompositor, RenderOptions};
use crate::ml::{BackendStatus, DetectJob, InferenceBackend, InferenceHandle};
use crate::segmentation::SegmentationResult;
use crate::source::{FrameSource, RgbaFrame};
use crate::stabilizer::{LandmarkStabilizer, RegionStabilizer};

/// Sparse sampling stride for scene brightness estimation
const BRIGHTNESS_SAMPLE_STRIDE: usize = 16;

/// What one tick accomplished
#[derive(Clone, Copy, Debug, Default)]
pub struct TickOutcome {
    /// A new overlay was composited this tick
    pub rendered: bool,
    /// A completed detection was folded in this tick
    pub detection_updated: bool,
    /// Current stabilized region count
    pub region_count: usize,
}

/// The real-time nail gloss pipeline
pub struct GlossPipeline {
    config: PipelineConfig,
    landmark_stabilizer: LandmarkStabilizer,
    region_stabilizer: RegionStabilizer,
    compositor: GlossCompositor,
    inference: InferenceHandle,
    /// Most recently completed, stabilized detection
    latest: Option<SegmentationResult>,
    overlay: Vec<u8>,
    scratch: Vec<u8>,
    frame_counter: u64,
    last_render: Option<Instant>,
}

impl GlossPipeline {
    /// Create a pipeline backed by the configured ONNX Runtime model
    pub fn new(config: PipelineConfig, options: RenderOptions) -> Result<Self, GlossError> {
        let inference = InferenceHandle::with_ort(config.clone())?;
        Ok(Self::assemble(config, options, inference))
    }

    /// Create a pipeline with a custom inference backend factory
    pub fn with_backend<F>(
        config: PipelineConfig,
        options: RenderOptions,
        factory: F,
    ) -> Result<Self, GlossError>
    where
        F: FnOnce() -> Result<Box<dyn InferenceBackend>, GlossError> + Send + 'static,
    {
        let inference = InferenceHandle::spawn(config.clone(), factory)?;
        Ok(Self::assemble(config, options, inference))
    }

    fn assemble(
        config: PipelineConfig,
        options: RenderOptions,
        inference: InferenceHandle,
    ) -> Self {
        Self {
            landmark_stabilizer: LandmarkStabilizer::new(config.stabilizer),
            region_stabilizer: RegionStabilizer::new(config.region_stabilizer),
            compositor: GlossCompositor::new(options),
            inference,
            latest: None,
            overlay: Vec::new(),
            scratch: Vec::new(),
            frame_counter: 0,
            last_render: None,
            config,
        }
    }

    /// Advance the pipeline by one host frame
    ///
    /// Never blocks on inference: the frame is handed to the worker and the
    /// most recently completed result drives compositing. Detection errors
    /// degrade to an empty region set; only a dead backend is fatal.
    pub fn tick(
        &mut self,
        source: &dyn FrameSource,
        landmarks: Option<&[Landmark]>,
    ) -> Result<TickOutcome, GlossError> {
        if self.inference.status() == BackendStatus::Failed {
            return Err(GlossError::ModelUnavailable);
        }

        let width = source.width();
        let height = source.height();
        if width == 0 || height == 0 {
            return Err(GlossError::InvalidInput(format!(
                "frame dimensions {}x{}",
                width, height
            )));
        }
        source.fill_rgba(&mut self.scratch);
        self.frame_counter += 1;

        let stabilized = self.landmark_stabilizer.stabilize(landmarks);
        match &stabilized {
            Some(stabilized) => {
                if let Some(frame) = RgbaFrame::new(self.scratch.clone(), width, height) {
                    self.inference.submit(DetectJob {
                        frame,
                        landmarks: Some(stabilized.clone()),
                        frame_number: self.frame_counter,
                    });
                } else {
                    return Err(GlossError::InvalidInput(
                        "frame source produced a short buffer".into(),
                    ));
                }
            }
            None => {
                // Hand lost: temporal memory resets immediately, stale
                // regions are never carried forward.
                self.region_stabilizer.reset();
                self.latest = None;
            }
        }

        let detection_updated = if stabilized.is_some() {
            self.fold_completed()
        } else {
            // Results completed for frames before the hand vanished are
            // stale; drop them instead of resurrecting the track.
            let _ = self.inference.take_completed();
            false
        };
        let rendered = self.render_if_due();

        Ok(TickOutcome {
            rendered,
            detection_updated,
            region_count: self
                .latest
                .as_ref()
                .map(|r| r.nail_regions.len())
                .unwrap_or(0),
        })
    }

    /// Fold the most recently completed detection into temporal state
    fn fold_completed(&mut self) -> bool {
        let Some(completed) = self.inference.take_completed() else {
            return false;
        };

        match completed.result {
            Ok(raw) => {
                let (regions, mask) = self.region_stabilizer.stabilize(
                    &raw.nail_regions,
                    &raw.mask,
                    raw.width,
                    raw.height,
                );
                self.latest = Some(SegmentationResult {
                    mask,
                    nail_regions: regions,
                    ..raw
                });
                true
            }
            Err(GlossError::HandUnsuitable(reason)) => {
                log::debug!("frame {}: {}", completed.frame_number, reason);
                self.note_missed_detection();
                true
            }
            Err(e) => {
                log::warn!("frame {}: {}", completed.frame_number, e);
                self.note_missed_detection();
                true
            }
        }
    }

    /// Treat a failed or skipped detection as one missed frame
    ///
    /// Regions ride out the configured miss tolerance and the mask decays
    /// toward empty instead of freezing.
    fn note_missed_detection(&mut self) {
        let Some(latest) = self.latest.as_ref() else {
            return;
        };
        let width = latest.width;
        let height = latest.height;
        let zero = vec![0.0f32; (width * height) as usize];
        let (regions, mask) = self.region_stabilizer.stabilize(&[], &zero, width, height);
        if let Some(latest) = self.latest.as_mut() {
            latest.nail_regions = regions;
            latest.mask = mask;
        }
    }

    /// Composite the overlay when the render cadence allows it
    fn render_if_due(&mut self) -> bool {
        let now = Instant::now();
        let due = self
            .last_render
            .map(|t| now.duration_since(t).as_millis() as u64 >= self.config.render_interval_ms)
            .unwrap_or(true);
        if !due {
            return false;
        }
        self.last_render = Some(now);

        let Some(latest) = self.latest.as_ref() else {
            // No detection to draw; leave a transparent overlay behind.
            self.overlay.iter_mut().for_each(|v| *v = 0);
            return false;
        };
        if latest.mask.is_empty() {
            self.overlay.iter_mut().for_each(|v| *v = 0);
            return false;
        }

        let pixels = latest.width as usize * latest.height as usize;
        self.overlay.clear();
        self.overlay.resize(pixels * 4, 0);

        let brightness =
            GlossCompositor::estimate_scene_brightness(&self.scratch, BRIGHTNESS_SAMPLE_STRIDE);
        self.compositor.set_scene_brightness(brightness);
        self.compositor
            .apply(&mut self.overlay, &latest.mask, latest.width, latest.height);
        true
    }

    /// The composited overlay at mask resolution, if one exists
    pub fn overlay(&self) -> Option<(&[u8], u32, u32)> {
        let latest = self.latest.as_ref()?;
        if self.overlay.is_empty() {
            return None;
        }
        Some((&self.overlay, latest.width, latest.height))
    }

    /// Current stabilized nail regions
    pub fn regions(&self) -> &[NailRegion] {
        self.latest
            .as_ref()
            .map(|r| r.nail_regions.as_slice())
            .unwrap_or(&[])
    }

    /// Most recent stabilized detection
    pub fn latest_result(&self) -> Option<&SegmentationResult> {
        self.latest.as_ref()
    }

    /// Compositor access for finish/option changes
    pub fn compositor_mut(&mut self) -> &mut GlossCompositor {
        &mut self.compositor
    }

    /// Backend status for host UIs
    pub fn inference_status(&self) -> BackendStatus {
        self.inference.status()
    }

    /// Whether the segmentation model is loaded and processing
    pub fn is_ready(&self) -> bool {
        self.inference.is_ready()
    }

    /// Frames dropped because inference was still busy
    pub fn dropped_frames(&self) -> u64 {
        self.inference.dropped_frames()
    }

    /// Clear all temporal state without touching the inference backend
    pub fn reset(&mut self) {
        self.landmark_stabilizer.reset();
        self.region_stabilizer.reset();
        self.compositor.reset();
        self.latest = None;
        self.overlay.clear();
        self.last_render = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::LANDMARKS_PER_HAND;
    use crate::ml::MaskOutput;
    use ndarray::Array4;
    use std::time::Duration;

    /// Backend producing one centered square nail
    struct SquareBackend {
        size: u32,
    }

    impl InferenceBackend for SquareBackend {
        fn infer(&mut self, _input: Array4<f32>) -> Result<MaskOutput, GlossError> {
            let s = self.size;
            let mut mask = vec![0.0f32; (s * s) as usize];
            for y in s / 4..3 * s / 4 {
                for x in s / 4..3 * s / 4 {
                    mask[(y * s + x) as usize] = 0.9;
                }
            }
            Ok(MaskOutput {
                mask,
                width: s,
                height: s,
                elapsed_ms: 0.5,
            })
        }
    }

    fn open_hand() -> Vec<Landmark> {
        (0..LANDMARKS_PER_HAND as u32)
            .map(|id| {
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

    fn test_pipeline(render_interval_ms: u64) -> GlossPipeline {
        let config = PipelineConfig {
            render_interval_ms,
            ..Default::default()
        };
        GlossPipeline::with_backend(config, RenderOptions::default(), || {
            Ok(Box::new(SquareBackend { size: 16 }) as Box<dyn InferenceBackend>)
        })
        .unwrap()
    }

    fn frame() -> RgbaFrame {
        RgbaFrame::new(vec![120u8; 32 * 32 * 4], 32, 32).unwrap()
    }

    fn tick_until_detection(pipeline: &mut GlossPipeline, hand: &[Landmark]) -> TickOutcome {
        let source = frame();
        for _ in 0..200 {
            let outcome = pipeline.tick(&source, Some(hand)).unwrap();
            if outcome.detection_updated && outcome.region_count > 0 {
                return outcome;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("no detection arrived");
    }

    #[test]
    fn test_detection_flows_to_regions_and_overlay() {
        let mut pipeline = test_pipeline(0);
        let hand = open_hand();
        let outcome = tick_until_detection(&mut pipeline, &hand);
        assert!(outcome.region_count >= 1);
        assert!(pipeline.regions().len() <= 10);

        // Overlay exists at mask resolution after a rendered tick.
        let source = frame();
        pipeline.tick(&source, Some(&hand)).unwrap();
        let (overlay, w, h) = pipeline.overlay().expect("overlay after render");
        assert_eq!((w, h), (16, 16));
        assert_eq!(overlay.len(), 16 * 16 * 4);
        assert!(overlay.iter().any(|&v| v > 0), "gloss must be visible");
    }

    #[test]
    fn test_render_throttle() {
        let mut pipeline = test_pipeline(10_000);
        let hand = open_hand();
        let source = frame();

        // First tick consumes the render slot; the second lands inside the
        // interval and must not composite.
        pipeline.tick(&source, Some(&hand)).unwrap();
        let second = pipeline.tick(&source, Some(&hand)).unwrap();
        assert!(!second.rendered);
    }

    #[test]
    fn test_hand_loss_clears_regions_immediately() {
        let mut pipeline = test_pipeline(0);
        let hand = open_hand();
        tick_until_detection(&mut pipeline, &hand);
        assert!(!pipeline.regions().is_empty());

        let source = frame();
        let outcome = pipeline.tick(&source, None).unwrap();
        assert_eq!(outcome.region_count, 0);
        assert!(pipeline.regions().is_empty());
        assert!(pipeline.latest_result().is_none());
    }

    #[test]
    fn test_zero_dimension_frame_rejected() {
        let mut pipeline = test_pipeline(0);
        let bad = RgbaFrame {
            data: Vec::new(),
            width: 0,
            height: 32,
        };
        let err = pipeline.tick(&bad, Some(&open_hand())).unwrap_err();
        assert!(matches!(err, GlossError::InvalidInput(_)));
    }

    #[test]
    fn test_failed_backend_is_fatal() {
        let mut pipeline = GlossPipeline::with_backend(
            PipelineConfig::default(),
            RenderOptions::default(),
            || Err(GlossError::ModelUnavailable),
        )
        .unwrap();

        // Wait for the worker to report failure.
        for _ in 0..200 {
            if pipeline.inference_status() == BackendStatus::Failed {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        let err = pipeline.tick(&frame(), Some(&open_hand())).unwrap_err();
        assert!(matches!(err, GlossError::ModelUnavailable));
    }

    #[test]
    fn test_reset_clears_temporal_state() {
        let mut pipeline = test_pipeline(0);
        let hand = open_hand();
        tick_until_detection(&mut pipeline, &hand);
        pipeline.reset();
        assert!(pipeline.regions().is_empty());
        assert!(pipeline.overlay().is_none());
    }

    #[test]
    fn test_unsuitable_frames_degrade_gracefully() {
        let mut pipeline = test_pipeline(0);
        let hand = open_hand();
        tick_until_detection(&mut pipeline, &hand);

        // A closed/rotated hand keeps landmarks but fails the gate; regions
        // survive the miss tolerance instead of vanishing instantly.
        let edge_on: Vec<Landmark> = hand
            .iter()
            .map(|l| Landmark::new(l.id, 0.5 + (l.x - 0.5) * 0.02, l.y, l.z))
            .collect();

        let source = frame();
        let mut saw_regions_during_miss = false;
        for _ in 0..20 {
            let outcome = pipeline.tick(&source, Some(&edge_on)).unwrap();
            if outcome.detection_updated && outcome.region_count > 0 {
                saw_regions_during_miss = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(saw_regions_during_miss);
    }
}
