//! Shared activity model, channel identification, the middleware contract,
//! and error definitions used across all botwire crates.

pub mod activity;
pub mod channel;
pub mod error;
pub mod middleware;

pub use {
    activity::{Activity, ActivityKind, Address, Attachment, SourceEvent},
    channel::ChannelType,
    error::{Error, Result},
    middleware::{Dispatch, LifecyclePoint, Middleware, MiddlewareRegistry, Next},
};
