//! Middleware wiring for the configured deployment.

use std::sync::Arc;

use {
    botwire_common::MiddlewareRegistry,
    botwire_config::BotwireConfig,
    botwire_directline::DirectLinePrompts,
    botwire_eventhub::EventHubForwarder,
    tracing::info,
};

pub struct Pipeline {
    pub registry: MiddlewareRegistry,
    /// Kept so pending telemetry posts can be drained before exit.
    pub forwarder: Arc<EventHubForwarder>,
}

/// Register the forwarder on receive and, unless disabled, the Direct Line
/// prompt fix on send.
pub fn build_pipeline(config: &BotwireConfig) -> Pipeline {
    let mut registry = MiddlewareRegistry::new();

    let forwarder = Arc::new(EventHubForwarder::from_config(&config.eventhub));
    registry.register(forwarder.clone());

    if config.directline.enabled {
        registry.register(Arc::new(DirectLinePrompts::new()));
    } else {
        info!("direct line prompt relocation disabled by config");
    }

    Pipeline {
        registry,
        forwarder,
    }
}
