//! Metric definitions and export for botwire.
//!
//! Crates record through the `metrics` facade using the names defined here.
//! Without an installed recorder every call is a no-op. With the `prometheus`
//! feature, [`init_metrics`] installs an in-process Prometheus recorder whose
//! text rendering is available from the returned [`MetricsHandle`].
//!
//! ```rust,ignore
//! use botwire_metrics::{counter, telemetry};
//!
//! counter!(telemetry::POSTS_SENT_TOTAL).increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
