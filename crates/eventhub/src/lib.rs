//! Azure Event Hub telemetry forwarding.
//!
//! [`EventHubForwarder`] is a receive-side middleware that posts every inbound
//! message activity to `https://{namespace}.{domain}/{hub}/publishers/{publisher}/messages`,
//! authorised with a shared access signature from [`SasSigner`]. Posts are
//! fire-and-forget: the pipeline continues as soon as one is dispatched.

pub mod error;
pub mod forwarder;
pub mod sas;

pub use {
    error::{Error, Result},
    forwarder::{EventHubForwarder, TELEMETRY_CONTENT_TYPE, TelemetryRequest},
    sas::{SasSigner, SignedToken, TOKEN_TTL, encode_uri_component},
};
