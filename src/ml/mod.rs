//! ML inference module
//!
//! Wraps the segmentation model behind a swappable backend trait and runs
//! detection on a dedicated thread. The tick loop submits frames without
//! blocking and reads the most recently completed result; a slow or
//! in-flight inference never stalls compositing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use ndarray::Array4;
use parking_lot::Mutex;

use crate::config::{ModelConfig, PipelineConfig};
use crate::error::GlossError;
use crate::geometry::Landmark;
use crate::segmentation::{SegmentationEngine, SegmentationResult};
use crate::source::RgbaFrame;

/// Probability mask produced by an inference collaborator
#[derive(Clone, Debug)]
pub struct MaskOutput {
    /// Row-major probabilities in [0, 1]
    pub mask: Vec<f32>,
    pub width: u32,
    pub height: u32,
    /// Wall-clock inference time
    pub elapsed_ms: f32,
}

/// An injectable inference collaborator
///
/// Accepts a planar `[1,3,H,W]` float tensor and returns a probability
/// mask. Implementations must be swappable; the shipped one wraps ONNX
/// Runtime, tests substitute synthetic masks.
pub trait InferenceBackend: Send {
    fn infer(&mut self, input: Array4<f32>) -> Result<MaskOutput, GlossError>;
}

/// ONNX Runtime backend
pub struct OrtBackend {
    session: ort::session::Session,
    mask_width: u32,
    mask_height: u32,
}

impl OrtBackend {
    /// Initialize ONNX Runtime and load the configured model
    pub fn load(model: &ModelConfig) -> Result<Self, GlossError> {
        if !model.path.exists() {
            log::warn!("segmentation model not found: {:?}", model.path);
            return Err(GlossError::ModelUnavailable);
        }

        // `commit()` registers the global ONNX Runtime environment and is
        // infallible in this ort version (it returns `false` only when an
        // environment was already configured, which is benign); model-load
        // failures are surfaced below.
        let _ = ort::init().with_name("NailGloss").commit();

        let session = ort::session::Session::builder()
            .and_then(|b| Ok(b.with_intra_threads(2)?))
            .and_then(|mut b| b.commit_from_file(&model.path))
            .map_err(|e| {
                log::error!("failed to load segmentation model: {}", e);
                GlossError::ModelUnavailable
            })?;

        log::info!("loaded segmentation model from {:?}", model.path);

        Ok(Self {
            session,
            mask_width: model.mask_width,
            mask_height: model.mask_height,
        })
    }
}

impl InferenceBackend for OrtBackend {
    fn infer(&mut self, input: Array4<f32>) -> Result<MaskOutput, GlossError> {
        let start = Instant::now();

        let tensor = ort::value::Tensor::from_array(input)
            .map_err(|e| GlossError::InferenceFailure(format!("input tensor: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| GlossError::InferenceFailure(e.to_string()))?;

        let output = outputs
            .iter()
            .next()
            .ok_or_else(|| GlossError::InferenceFailure("no output from model".into()))?;

        let (_shape, data) = output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| GlossError::InferenceFailure(format!("output tensor: {}", e)))?;

        let mask: Vec<f32> = data.iter().map(|&v| v.clamp(0.0, 1.0)).collect();

        Ok(MaskOutput {
            mask,
            width: self.mask_width,
            height: self.mask_height,
            elapsed_ms: start.elapsed().as_secs_f32() * 1000.0,
        })
    }
}

/// Backend lifecycle, shared between the handle and its worker
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendStatus {
    /// Worker is still loading the model
    Initializing,
    /// Model loaded, frames are being processed
    Ready,
    /// Model failed to load; fatal until the host re-initializes
    Failed,
}

/// One frame submitted for detection
pub struct DetectJob {
    pub frame: RgbaFrame,
    pub landmarks: Option<Vec<Landmark>>,
    pub frame_number: u64,
}

/// A finished detection, successful or not
pub struct CompletedDetection {
    pub frame_number: u64,
    pub result: Result<SegmentationResult, GlossError>,
}

/// Handle to the inference worker thread
///
/// This is an explicit resource owned by the pipeline, not a global: the
/// worker initializes the backend exactly once and every observer of the
/// handle shares the same status slot, so concurrent interest in an
/// in-flight initialization simply joins it.
pub struct InferenceHandle {
    latest: Arc<Mutex<Option<CompletedDetection>>>,
    status: Arc<Mutex<BackendStatus>>,
    job_sender: Option<Sender<DetectJob>>,
    thread_handle: Option<std::thread::JoinHandle<()>>,
    submitted: AtomicU64,
    dropped: AtomicU64,
}

impl InferenceHandle {
    /// Spawn the worker with a backend factory
    ///
    /// The factory runs on the worker thread so model loading never blocks
    /// the caller.
    pub fn spawn<F>(config: PipelineConfig, factory: F) -> Result<Self, GlossError>
    where
        F: FnOnce() -> Result<Box<dyn InferenceBackend>, GlossError> + Send + 'static,
    {
        let latest: Arc<Mutex<Option<CompletedDetection>>> = Arc::new(Mutex::new(None));
        let status = Arc::new(Mutex::new(BackendStatus::Initializing));

        let (job_sender, job_receiver) = crossbeam_channel::bounded::<DetectJob>(2);

        let latest_clone = latest.clone();
        let status_clone = status.clone();

        let thread_handle = std::thread::Builder::new()
            .name("nail-inference".to_string())
            .spawn(move || {
                Self::worker(config, factory, job_receiver, latest_clone, status_clone);
            })
            .map_err(|e| GlossError::InferenceFailure(format!("spawn worker: {}", e)))?;

        Ok(Self {
            latest,
            status,
            job_sender: Some(job_sender),
            thread_handle: Some(thread_handle),
            submitted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        })
    }

    /// Spawn with the ONNX Runtime backend from the pipeline configuration
    pub fn with_ort(config: PipelineConfig) -> Result<Self, GlossError> {
        let model = config.model.clone();
        Self::spawn(config, move || {
            OrtBackend::load(&model).map(|b| Box::new(b) as Box<dyn InferenceBackend>)
        })
    }

    /// Worker thread main loop
    fn worker<F>(
        config: PipelineConfig,
        factory: F,
        job_receiver: Receiver<DetectJob>,
        latest: Arc<Mutex<Option<CompletedDetection>>>,
        status: Arc<Mutex<BackendStatus>>,
    ) where
        F: FnOnce() -> Result<Box<dyn InferenceBackend>, GlossError>,
    {
        log::info!("inference worker started");

        let backend = match factory() {
            Ok(b) => {
                *status.lock() = BackendStatus::Ready;
                b
            }
            Err(e) => {
                log::error!("inference backend failed to initialize: {}", e);
                *status.lock() = BackendStatus::Failed;
                return;
            }
        };

        let mut engine = SegmentationEngine::new(config, backend);

        while let Ok(job) = job_receiver.recv() {
            let result = engine.detect(&job.frame, job.landmarks.as_deref());
            if let Err(ref e) = result {
                match e {
                    GlossError::HandUnsuitable(reason) => {
                        log::debug!("frame {} skipped: {}", job.frame_number, reason)
                    }
                    _ => log::warn!("frame {} failed: {}", job.frame_number, e),
                }
            }
            *latest.lock() = Some(CompletedDetection {
                frame_number: job.frame_number,
                result,
            });
        }

        log::info!("inference worker stopped");
    }

    /// Submit a frame without blocking
    ///
    /// When the worker is behind, the frame is dropped; the next tick will
    /// submit a fresher one.
    pub fn submit(&self, job: DetectJob) {
        if let Some(ref sender) = self.job_sender {
            self.submitted.fetch_add(1, Ordering::Relaxed);
            if sender.try_send(job).is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Take the most recently completed detection, if any arrived
    pub fn take_completed(&self) -> Option<CompletedDetection> {
        self.latest.lock().take()
    }

    /// Current backend status
    pub fn status(&self) -> BackendStatus {
        *self.status.lock()
    }

    /// Whether the model is loaded and processing
    pub fn is_ready(&self) -> bool {
        self.status() == BackendStatus::Ready
    }

    /// Frames submitted since creation
    pub fn submitted_frames(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Frames dropped because the worker was busy
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop the worker thread
    pub fn stop(&mut self) {
        // Drop the sender to signal the thread to stop.
        self.job_sender = None;
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for InferenceHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
