//! Public facade: owns the mailboxes, the flags and the two worker threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use gcap_models::{CaptureEvent, GuidanceResult, MotionState};
use gcap_vision::MotionEstimator;
use image::RgbImage;
use tracing::{debug, info, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::config::PipelineConfig;
use crate::controller::GuidanceController;
use crate::error::{PipelineError, PipelineResult};
use crate::mailbox::Mailbox;
use crate::metrics::record_frame_ingested;
use crate::worker::{run_guidance_worker, run_motion_worker};

/// Receives every guidance verdict; `None` while processing is inactive.
pub type GuidanceCallback = Arc<dyn Fn(Option<GuidanceResult>) + Send + Sync>;

/// Receives each capture trigger.
pub type CaptureCallback = Arc<dyn Fn(&CaptureEvent) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Callbacks {
    guidance: RwLock<Option<GuidanceCallback>>,
    capture: RwLock<Option<CaptureCallback>>,
}

impl Callbacks {
    pub(crate) fn guidance(&self) -> Option<GuidanceCallback> {
        self.guidance.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn capture(&self) -> Option<CaptureCallback> {
        self.capture.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// State shared between the facade and both workers.
pub(crate) struct Shared {
    pub(crate) frames: Arc<Mailbox<Arc<RgbImage>>>,
    pub(crate) motion: Mailbox<MotionState>,
    pub(crate) processing_active: AtomicBool,
    pub(crate) callbacks: Callbacks,
}

/// Cloneable read handle on the latest submitted frame.
///
/// Safe to move into the capture callback: it does not keep the pipeline
/// alive.
#[derive(Clone)]
pub struct FrameSource {
    frames: Arc<Mailbox<Arc<RgbImage>>>,
}

impl FrameSource {
    /// Shared reference to the most recent frame, without copying pixels.
    pub fn latest_shared(&self) -> Option<Arc<RgbImage>> {
        self.frames.latest()
    }

    /// Independent copy of the most recent frame.
    pub fn latest(&self) -> Option<RgbImage> {
        self.latest_shared().map(|frame| frame.as_ref().clone())
    }
}

/// Real-time motion guidance with an auto-capture trigger.
///
/// Frames are submitted with [`process_frame`](Self::process_frame) from the
/// camera thread. A motion worker estimates smoothed motion from the newest
/// frame, and a guidance worker turns each estimate into a verdict and,
/// when the scene has been steady long enough, a capture event.
pub struct GuidancePipeline {
    config: PipelineConfig,
    clock: Arc<dyn Clock>,
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl GuidancePipeline {
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        Self::with_clock(config, Arc::new(MonotonicClock))
    }

    /// Create a pipeline whose capture timers read `clock`.
    pub fn with_clock(config: PipelineConfig, clock: Arc<dyn Clock>) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            shared: Arc::new(Shared {
                frames: Arc::new(Mailbox::new()),
                motion: Mailbox::new(),
                processing_active: AtomicBool::new(false),
                callbacks: Callbacks::default(),
            }),
            workers: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        })
    }

    /// Spawn the motion and guidance workers.
    pub fn start(&self) -> PipelineResult<()> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(PipelineError::Stopped);
        }
        if self.started.load(Ordering::Acquire) {
            warn!("Guidance pipeline already running");
            return Ok(());
        }

        // Built before claiming the start so a failure leaves the pipeline startable.
        let estimator = MotionEstimator::new(self.config.motion.clone())?;
        let controller = GuidanceController::new(self.config.guidance.clone());

        if self.started.swap(true, Ordering::AcqRel) {
            warn!("Guidance pipeline already running");
            return Ok(());
        }

        let motion = {
            let shared = Arc::clone(&self.shared);
            thread::Builder::new()
                .name("gcap-motion".to_string())
                .spawn(move || run_motion_worker(shared, estimator))
                .map_err(PipelineError::ThreadSpawn)?
        };
        self.lock_workers().push(motion);

        let guidance = {
            let shared = Arc::clone(&self.shared);
            let clock = Arc::clone(&self.clock);
            thread::Builder::new()
                .name("gcap-guidance".to_string())
                .spawn(move || run_guidance_worker(shared, controller, clock))
        };
        match guidance {
            Ok(handle) => self.lock_workers().push(handle),
            Err(e) => {
                self.stop();
                return Err(PipelineError::ThreadSpawn(e));
            }
        }

        info!(
            target_width = self.config.motion.target_width,
            lk_every_n = self.config.motion.lk_every_n,
            auto_capture = self.config.guidance.auto_capture_enabled,
            "Guidance pipeline started"
        );
        Ok(())
    }

    /// Stop both workers and wait for them to exit. Idempotent.
    ///
    /// When called from inside a callback the calling worker is not joined;
    /// it exits as soon as the callback returns.
    pub fn stop(&self) {
        let first = !self.stopped.swap(true, Ordering::AcqRel);
        self.shared.frames.close();
        self.shared.motion.close();

        let handles: Vec<JoinHandle<()>> = self.lock_workers().drain(..).collect();
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                warn!(worker = %name, "Worker thread panicked");
            }
        }
        if first {
            info!("Guidance pipeline stopped");
        }
    }

    /// Submit a camera frame. Never blocks on processing; an unprocessed
    /// earlier frame is replaced.
    pub fn process_frame(&self, frame: &RgbImage) {
        self.submit(Arc::new(frame.clone()));
    }

    /// Submit an already shared frame without copying its pixels.
    pub fn submit(&self, frame: Arc<RgbImage>) {
        if self.shared.frames.post(frame) {
            record_frame_ingested();
        }
    }

    /// Toggle scanning. While inactive no guidance is shown and capture
    /// never fires.
    pub fn set_processing_active(&self, active: bool) {
        let previous = self.shared.processing_active.swap(active, Ordering::AcqRel);
        if previous == active {
            return;
        }
        debug!(active, "Processing state changed");
        if !active {
            // Let the guidance worker clear the display without waiting for a frame.
            self.shared.motion.repost();
        }
    }

    pub fn is_processing_active(&self) -> bool {
        self.shared.processing_active.load(Ordering::Acquire)
    }

    /// Copy of the most recently submitted frame.
    pub fn get_latest_frame(&self) -> Option<RgbImage> {
        self.frame_source().latest()
    }

    pub fn frame_source(&self) -> FrameSource {
        FrameSource {
            frames: Arc::clone(&self.shared.frames),
        }
    }

    /// Most recent motion snapshot published by the motion worker.
    pub fn latest_motion(&self) -> Option<MotionState> {
        self.shared.motion.latest()
    }

    /// Register (or replace) the guidance callback.
    pub fn on_guidance_updated<F>(&self, callback: F)
    where
        F: Fn(Option<GuidanceResult>) + Send + Sync + 'static,
    {
        *self
            .shared
            .callbacks
            .guidance
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
    }

    /// Register (or replace) the capture callback.
    pub fn on_capture_triggered<F>(&self, callback: F)
    where
        F: Fn(&CaptureEvent) + Send + Sync + 'static,
    {
        *self
            .shared
            .callbacks
            .capture
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
    }

    /// True between a successful `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire) && !self.stopped.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn lock_workers(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for GuidancePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = PipelineConfig::default();
        config.motion.confirm_count = 0;
        assert!(GuidancePipeline::new(config).is_err());
    }

    #[test]
    fn test_latest_frame_before_start() {
        let pipeline = GuidancePipeline::new(PipelineConfig::default()).unwrap();
        assert!(pipeline.get_latest_frame().is_none());

        let frame = RgbImage::from_pixel(8, 4, Rgb([1, 2, 3]));
        pipeline.process_frame(&frame);
        assert_eq!(pipeline.get_latest_frame(), Some(frame.clone()));
        assert_eq!(pipeline.frame_source().latest(), Some(frame));
    }

    #[test]
    fn test_processing_flag_toggles() {
        let pipeline = GuidancePipeline::new(PipelineConfig::default()).unwrap();
        assert!(!pipeline.is_processing_active());
        pipeline.set_processing_active(true);
        assert!(pipeline.is_processing_active());
        pipeline.set_processing_active(false);
        assert!(!pipeline.is_processing_active());
    }

    #[test]
    fn test_stop_without_start_is_terminal() {
        let pipeline = GuidancePipeline::new(PipelineConfig::default()).unwrap();
        pipeline.stop();
        pipeline.stop();
        assert!(matches!(pipeline.start(), Err(PipelineError::Stopped)));
        assert!(!pipeline.is_running());
    }

    #[test]
    fn test_failed_start_leaves_pipeline_startable() {
        let mut pipeline = GuidancePipeline::new(PipelineConfig::default()).unwrap();
        // Skip construction-time validation so building the estimator fails.
        pipeline.config.motion.lk_every_n = 0;

        assert!(matches!(pipeline.start(), Err(PipelineError::Vision(_))));
        assert!(!pipeline.is_running());
        assert!(pipeline.lock_workers().is_empty());
        // The failure did not mark the pipeline as started.
        assert!(matches!(pipeline.start(), Err(PipelineError::Vision(_))));
        assert!(!pipeline.started.load(Ordering::Acquire));
    }

    #[test]
    fn test_frames_after_stop_are_dropped() {
        let pipeline = GuidancePipeline::new(PipelineConfig::default()).unwrap();
        let first = RgbImage::from_pixel(4, 4, Rgb([9, 9, 9]));
        pipeline.process_frame(&first);
        pipeline.stop();
        pipeline.process_frame(&RgbImage::new(4, 4));
        assert_eq!(pipeline.get_latest_frame(), Some(first));
    }
}
