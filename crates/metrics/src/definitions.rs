//! Metric name and label definitions.
//!
//! All metric names recorded by botwire crates live here so the exported
//! surface is documented in one place.

/// Middleware pipeline metrics
pub mod pipeline {
    /// Total number of pipeline runs, labelled by lifecycle point
    pub const RUNS_TOTAL: &str = "botwire_pipeline_runs_total";
    /// Runs that stopped because a middleware did not continue
    pub const HALTS_TOTAL: &str = "botwire_pipeline_halts_total";
    /// Middleware invocations that returned an error
    pub const MIDDLEWARE_ERRORS_TOTAL: &str = "botwire_pipeline_middleware_errors_total";
}

/// Event Hub telemetry forwarding metrics
pub mod telemetry {
    /// Posts that received a 2xx response
    pub const POSTS_SENT_TOTAL: &str = "botwire_telemetry_posts_sent_total";
    /// Posts that failed (transport error or non-2xx status)
    pub const POSTS_FAILED_TOTAL: &str = "botwire_telemetry_posts_failed_total";
    /// Events skipped because the in-flight limit was reached
    pub const POSTS_DROPPED_TOTAL: &str = "botwire_telemetry_posts_dropped_total";
    /// Duration of a telemetry post in seconds
    pub const POST_DURATION_SECONDS: &str = "botwire_telemetry_post_duration_seconds";
}

/// Direct Line payload reshaping metrics
pub mod directline {
    /// Outbound messages whose keyboard attachment moved to `sourceEvent`
    pub const CHOICES_RELOCATED_TOTAL: &str = "botwire_directline_choices_relocated_total";
}

/// Common label keys
pub mod labels {
    pub const POINT: &str = "point";
    pub const MIDDLEWARE: &str = "middleware";
    pub const STATUS: &str = "status";
    pub const ERROR_TYPE: &str = "error_type";
}

/// Standard histogram buckets
pub mod buckets {
    use once_cell::sync::Lazy;

    /// Outbound HTTP duration buckets (in seconds), 5ms to 60s
    pub static HTTP_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]
    });
}
