//! Prometheus metrics for the guidance pipeline.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder. Returns a handle that renders metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // Ingest
    pub const FRAMES_INGESTED_TOTAL: &str = "gcap_frames_ingested_total";

    // Motion worker
    pub const MOTION_CYCLE_DURATION_SECONDS: &str = "gcap_motion_cycle_duration_seconds";

    // Guidance worker
    pub const GUIDANCE_CYCLES_TOTAL: &str = "gcap_guidance_cycles_total";
    pub const CAPTURES_TOTAL: &str = "gcap_captures_total";
    pub const CALLBACK_PANICS_TOTAL: &str = "gcap_callback_panics_total";
}

/// Record a frame accepted by the frame mailbox.
pub fn record_frame_ingested() {
    counter!(names::FRAMES_INGESTED_TOTAL).increment(1);
}

/// Record the wall time of one motion estimation cycle.
pub fn record_motion_cycle(duration_secs: f64) {
    histogram!(names::MOTION_CYCLE_DURATION_SECONDS).record(duration_secs);
}

/// Record one guidance evaluation.
pub fn record_guidance_cycle(active: bool) {
    let labels = [("active", active.to_string())];
    counter!(names::GUIDANCE_CYCLES_TOTAL, &labels).increment(1);
}

/// Record a fired capture trigger.
pub fn record_capture() {
    counter!(names::CAPTURES_TOTAL).increment(1);
}

/// Record a panic caught while invoking a consumer callback.
pub fn record_callback_panic(callback: &'static str) {
    counter!(names::CALLBACK_PANICS_TOTAL, "callback" => callback).increment(1);
}
