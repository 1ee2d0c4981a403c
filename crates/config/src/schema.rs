//! Config schema types.

use std::collections::BTreeMap;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Host suffix of the public Azure Service Bus cloud.
pub const DEFAULT_SERVICE_DOMAIN: &str = "servicebus.windows.net";

/// Upper bound on concurrently pending telemetry posts.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotwireConfig {
    pub eventhub: EventHubConfig,
    pub directline: DirectLineConfig,
    pub metrics: MetricsConfig,
}

/// Event Hub telemetry forwarding.
///
/// Forwarding is active only when `namespace`, `hub_name`, `publisher`,
/// `key_name` and `key` are all set.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventHubConfig {
    /// Service Bus namespace, e.g. `yothub-ns`.
    pub namespace: Option<String>,

    /// Event Hub name inside the namespace.
    pub hub_name: Option<String>,

    /// Publisher id the events are posted under.
    pub publisher: Option<String>,

    /// Shared access policy name, e.g. `send`.
    pub key_name: Option<String>,

    /// Shared access policy key.
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub key: Option<Secret<String>>,

    /// Host suffix appended to the namespace.
    pub service_domain: String,

    /// Replaces `https://{namespace}.{service_domain}` as the POST target.
    /// The signed resource URI is unaffected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Maximum number of telemetry posts pending at once.
    pub max_in_flight: usize,
}

impl EventHubConfig {
    /// Names of the required settings that are absent or empty.
    pub fn missing(&self) -> Vec<&'static str> {
        let key = self.key.as_ref().map(|k| k.expose_secret().as_str());
        [
            ("namespace", self.namespace.as_deref()),
            ("hub_name", self.hub_name.as_deref()),
            ("publisher", self.publisher.as_deref()),
            ("key_name", self.key_name.as_deref()),
            ("key", key),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none_or(str::is_empty))
        .map(|(name, _)| name)
        .collect()
    }
}

impl std::fmt::Debug for EventHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHubConfig")
            .field("namespace", &self.namespace)
            .field("hub_name", &self.hub_name)
            .field("publisher", &self.publisher)
            .field("key_name", &self.key_name)
            .field("key", &self.key.as_ref().map(|_| "[REDACTED]"))
            .field("service_domain", &self.service_domain)
            .field("endpoint", &self.endpoint)
            .field("max_in_flight", &self.max_in_flight)
            .finish()
    }
}

impl Default for EventHubConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            hub_name: None,
            publisher: None,
            key_name: None,
            key: None,
            service_domain: DEFAULT_SERVICE_DOMAIN.into(),
            endpoint: None,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

/// Direct Line payload fixes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectLineConfig {
    /// Relocate prompt keyboards into `sourceEvent.choices`. Defaults to true.
    pub enabled: bool,
}

impl Default for DirectLineConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Metrics collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Labels added to every exported metric.
    pub labels: BTreeMap<String, String>,
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> EventHubConfig {
        EventHubConfig {
            namespace: Some("yothub-ns".into()),
            hub_name: Some("yot".into()),
            publisher: Some("bot".into()),
            key_name: Some("send".into()),
            key: Some(Secret::new("c2VjcmV0".into())),
            ..Default::default()
        }
    }

    #[test]
    fn defaults() {
        let cfg = BotwireConfig::default();
        assert_eq!(cfg.eventhub.service_domain, DEFAULT_SERVICE_DOMAIN);
        assert_eq!(cfg.eventhub.max_in_flight, DEFAULT_MAX_IN_FLIGHT);
        assert!(cfg.directline.enabled);
        assert!(!cfg.metrics.enabled);
        assert_eq!(cfg.eventhub.missing().len(), 5);
    }

    #[test]
    fn complete_config_has_nothing_missing() {
        assert!(complete().missing().is_empty());
    }

    #[test]
    fn empty_values_count_as_missing() {
        let mut cfg = complete();
        cfg.publisher = Some(String::new());
        cfg.key = Some(Secret::new(String::new()));
        assert_eq!(cfg.missing(), vec!["publisher", "key"]);
    }

    #[test]
    fn debug_redacts_key() {
        let rendered = format!("{:?}", complete());
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("c2VjcmV0"));
    }

    #[test]
    fn deserializes_partial_toml() {
        let cfg: BotwireConfig = toml::from_str(
            r#"
[eventhub]
namespace = "yothub-ns"
key = "k"
max_in_flight = 8

[directline]
enabled = false
"#,
        )
        .unwrap();
        assert_eq!(cfg.eventhub.namespace.as_deref(), Some("yothub-ns"));
        assert_eq!(cfg.eventhub.key.unwrap().expose_secret(), "k");
        assert_eq!(cfg.eventhub.max_in_flight, 8);
        assert_eq!(cfg.eventhub.service_domain, DEFAULT_SERVICE_DOMAIN);
        assert!(!cfg.directline.enabled);
    }
}
