//! Motion and guidance worker loops.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use gcap_vision::MotionEstimator;
use tracing::{debug, error, info};

use crate::clock::Clock;
use crate::controller::GuidanceController;
use crate::metrics::{
    record_callback_panic, record_capture, record_guidance_cycle, record_motion_cycle,
};
use crate::pipeline::Shared;

/// Consume frames until the frame mailbox closes.
pub(crate) fn run_motion_worker(shared: Arc<Shared>, mut estimator: MotionEstimator) {
    info!("Motion worker started");
    let mut was_active = shared.processing_active.load(Ordering::Acquire);

    while let Some((generation, frame)) = shared.frames.recv() {
        let active = shared.processing_active.load(Ordering::Acquire);
        // Both edges: pause drops the scanning estimate, resume drops
        // whatever was estimated while paused.
        if active != was_active {
            debug!(active, "Processing toggled, resetting motion estimate");
            estimator.reset();
        }
        was_active = active;

        let started = Instant::now();
        let state = estimator.process(&frame);
        record_motion_cycle(started.elapsed().as_secs_f64());
        debug!(
            generation,
            mu = state.mu,
            sigma = state.sigma,
            speed_warning = state.speed_warning,
            stability_warning = state.stability_warning,
            "Motion updated"
        );
        if !shared.motion.post(state) {
            break;
        }
    }

    info!(cycles = estimator.iteration(), "Motion worker stopped");
}

/// Consume motion snapshots until the motion mailbox closes.
pub(crate) fn run_guidance_worker(
    shared: Arc<Shared>,
    mut controller: GuidanceController,
    clock: Arc<dyn Clock>,
) {
    info!("Guidance worker started");

    while let Some((_, motion)) = shared.motion.recv() {
        let active = shared.processing_active.load(Ordering::Acquire);
        let outcome = controller.evaluate(motion, active, clock.now());
        record_guidance_cycle(active);

        if let Some(event) = outcome.capture {
            info!(
                sequence = event.sequence,
                mu = event.motion.mu,
                sigma = event.motion.sigma,
                "Capture triggered"
            );
            record_capture();
            if let Some(callback) = shared.callbacks.capture() {
                invoke_guarded("capture", || callback(&event));
            }
        }

        if let Some(callback) = shared.callbacks.guidance() {
            let result = outcome.result;
            invoke_guarded("guidance", move || callback(result));
        }
    }

    info!(captures = controller.captures(), "Guidance worker stopped");
}

/// Run a consumer callback, logging instead of unwinding through the worker.
fn invoke_guarded(name: &'static str, f: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        error!(callback = name, panic = %message, "Callback panicked");
        record_callback_panic(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_invoke_guarded_runs_callback() {
        let calls = AtomicUsize::new(0);
        invoke_guarded("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invoke_guarded_absorbs_panics() {
        let calls = AtomicUsize::new(0);
        invoke_guarded("test", || panic!("boom"));
        invoke_guarded("test", || panic!("{}", String::from("formatted boom")));
        invoke_guarded("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
