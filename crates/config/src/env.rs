//! Environment variable overrides.
//!
//! Deployments configure Event Hub forwarding through `EVENTHUB_*` variables.
//! Set, non-empty variables win over values from the config file.

use {secrecy::Secret, tracing::debug};

use crate::schema::BotwireConfig;

pub const NAMESPACE_VAR: &str = "EVENTHUB_NAMESPACE";
pub const HUB_NAME_VAR: &str = "EVENTHUB_HUBNAME";
pub const PUBLISHER_VAR: &str = "EVENTHUB_PUBLISHER";
/// Misspelled publisher variable still found in older deployments.
pub const LEGACY_PUBLISHER_VAR: &str = "EVENTHUNB_PUBLISHER";
pub const KEY_NAME_VAR: &str = "EVENTHUB_KEYNAME";
pub const KEY_VAR: &str = "EVENTHUB_KEY";
pub const SERVICE_DOMAIN_VAR: &str = "EVENTHUB_SERVICE_DOMAIN";

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: BotwireConfig) -> BotwireConfig {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

/// Apply overrides using a custom lookup, so tests never touch the real
/// environment.
pub fn apply_env_overrides_with(
    mut config: BotwireConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> BotwireConfig {
    let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let eventhub = &mut config.eventhub;

    if let Some(v) = get(NAMESPACE_VAR) {
        debug!(var = NAMESPACE_VAR, "config override from environment");
        eventhub.namespace = Some(v);
    }
    if let Some(v) = get(HUB_NAME_VAR) {
        debug!(var = HUB_NAME_VAR, "config override from environment");
        eventhub.hub_name = Some(v);
    }
    if let Some(v) = get(PUBLISHER_VAR).or_else(|| get(LEGACY_PUBLISHER_VAR)) {
        debug!(var = PUBLISHER_VAR, "config override from environment");
        eventhub.publisher = Some(v);
    }
    if let Some(v) = get(KEY_NAME_VAR) {
        debug!(var = KEY_NAME_VAR, "config override from environment");
        eventhub.key_name = Some(v);
    }
    if let Some(v) = get(KEY_VAR) {
        debug!(var = KEY_VAR, "config override from environment");
        eventhub.key = Some(Secret::new(v));
    }
    if let Some(v) = get(SERVICE_DOMAIN_VAR) {
        debug!(var = SERVICE_DOMAIN_VAR, "config override from environment");
        eventhub.service_domain = v;
    }

    config
}
