use std::{
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};

use {
    anyhow::Result,
    async_trait::async_trait,
    botwire_common::{Activity, LifecyclePoint, Middleware, Next},
    botwire_config::{EventHubConfig, env},
    reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE},
    tokio::sync::Semaphore,
    tokio_util::task::TaskTracker,
    tracing::{debug, error, info, warn},
};

#[cfg(feature = "metrics")]
use botwire_metrics::{counter, histogram, labels, telemetry as telemetry_metrics};

use crate::{error::Error, sas::SasSigner};

/// `Content-Type` of every telemetry post.
pub const TELEMETRY_CONTENT_TYPE: &str = "application/atom+xml;type=entry;charset=utf-8";

/// A fully prepared telemetry post.
#[derive(Debug, Clone)]
pub struct TelemetryRequest {
    pub url: String,
    pub authorization: String,
    pub body: Vec<u8>,
}

struct Target {
    signer: SasSigner,
    resource_uri: String,
    post_url: String,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
}

impl Target {
    fn from_config(config: &EventHubConfig) -> crate::Result<Self> {
        let missing = config.missing();
        let (Some(namespace), Some(hub), Some(publisher), Some(key_name), Some(key)) = (
            config.namespace.as_deref(),
            config.hub_name.as_deref(),
            config.publisher.as_deref(),
            config.key_name.as_deref(),
            config.key.clone(),
        ) else {
            return Err(Error::MissingSettings { names: missing });
        };
        if !missing.is_empty() {
            return Err(Error::MissingSettings { names: missing });
        }

        let signer = SasSigner::new(key_name, key)?;
        let path = format!("{hub}/publishers/{publisher}/messages");
        let resource_uri = format!("https://{namespace}.{}/{path}", config.service_domain);
        let post_url = match config.endpoint.as_deref() {
            Some(base) => format!("{}/{path}", base.trim_end_matches('/')),
            None => resource_uri.clone(),
        };
        let max_in_flight = config.max_in_flight.max(1);

        Ok(Self {
            signer,
            resource_uri,
            post_url,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        })
    }

    fn request(&self, activity: &Activity, now: SystemTime) -> crate::Result<TelemetryRequest> {
        Ok(TelemetryRequest {
            url: self.post_url.clone(),
            authorization: self.signer.sign(&self.resource_uri, now).value,
            body: activity.to_json_vec()?,
        })
    }
}

/// Posts inbound message activities to an Azure Event Hub.
///
/// Whether the forwarder is active is decided once, in
/// [`EventHubForwarder::from_config`]. An inert forwarder never touches the
/// network. Posts run on background tasks; their outcome is only logged and
/// never reaches the pipeline.
pub struct EventHubForwarder {
    target: Option<Target>,
    client: reqwest::Client,
    tracker: TaskTracker,
}

impl EventHubForwarder {
    pub fn from_config(config: &EventHubConfig) -> Self {
        let target = match Target::from_config(config) {
            Ok(target) => {
                info!(
                    uri = %target.resource_uri,
                    max_in_flight = target.max_in_flight,
                    "event hub forwarding enabled"
                );
                Some(target)
            },
            Err(Error::MissingSettings { names }) => {
                let vars = missing_env_vars(&names);
                if names.contains(&"namespace") {
                    warn!(
                        var = env::NAMESPACE_VAR,
                        missing = %vars.join(", "),
                        "event hub forwarding disabled"
                    );
                } else {
                    warn!(missing = %vars.join(", "), "event hub forwarding disabled");
                }
                None
            },
            Err(e) => {
                warn!(reason = %e, "event hub forwarding disabled");
                None
            },
        };
        Self {
            target,
            client: reqwest::Client::new(),
            tracker: TaskTracker::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Canonical resource URI events are published to, when enabled.
    pub fn publisher_uri(&self) -> Option<&str> {
        self.target.as_ref().map(|t| t.resource_uri.as_str())
    }

    /// Number of posts not yet completed.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Build the post for `activity` signed at `now`.
    ///
    /// `None` when the forwarder is inert or the activity is not a message.
    pub fn telemetry_request(
        &self,
        activity: &Activity,
        now: SystemTime,
    ) -> crate::Result<Option<TelemetryRequest>> {
        match &self.target {
            Some(target) if activity.is_message() => target.request(activity, now).map(Some),
            _ => Ok(None),
        }
    }

    /// Dispatch a post for `activity` without waiting for it.
    ///
    /// Returns true when a post was started. Must be called from within a
    /// Tokio runtime.
    pub fn forward(&self, activity: &Activity) -> bool {
        let Some(target) = &self.target else {
            return false;
        };
        if !activity.is_message() {
            return false;
        }
        if self.tracker.is_closed() {
            debug!("forwarder shut down, telemetry event skipped");
            return false;
        }

        let request = match target.request(activity, SystemTime::now()) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "failed to prepare telemetry post");
                return false;
            },
        };

        let Ok(permit) = Arc::clone(&target.permits).try_acquire_owned() else {
            warn!(
                max_in_flight = target.max_in_flight,
                "too many telemetry posts in flight, event dropped"
            );
            #[cfg(feature = "metrics")]
            counter!(telemetry_metrics::POSTS_DROPPED_TOTAL).increment(1);
            return false;
        };

        let client = self.client.clone();
        self.tracker.spawn(async move {
            post(&client, request).await;
            drop(permit);
        });
        true
    }

    /// Stop accepting events and wait up to `grace` for pending posts.
    ///
    /// Returns false when posts were still pending at the deadline; they are
    /// abandoned, not cancelled.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending == 0 {
            return true;
        }
        debug!(pending, "waiting for telemetry posts");
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            return true;
        }
        warn!(
            pending = self.tracker.len(),
            grace_ms = grace.as_millis() as u64,
            "abandoning pending telemetry posts"
        );
        false
    }
}

/// Environment variables that set the named [`EventHubConfig`] fields.
fn missing_env_vars(names: &[&str]) -> Vec<&'static str> {
    names
        .iter()
        .filter_map(|name| match *name {
            "namespace" => Some(env::NAMESPACE_VAR),
            "hub_name" => Some(env::HUB_NAME_VAR),
            "publisher" => Some(env::PUBLISHER_VAR),
            "key_name" => Some(env::KEY_NAME_VAR),
            "key" => Some(env::KEY_VAR),
            _ => None,
        })
        .collect()
}

async fn post(client: &reqwest::Client, request: TelemetryRequest) {
    let started = Instant::now();
    let length = request.body.len();
    let result = client
        .post(&request.url)
        .header(AUTHORIZATION, request.authorization)
        .header(CONTENT_LENGTH, length)
        .header(CONTENT_TYPE, TELEMETRY_CONTENT_TYPE)
        .body(request.body)
        .send()
        .await;

    match result {
        Ok(resp) => {
            let status = resp.status();
            info!(status = status.as_u16(), url = %request.url, "telemetry post completed");
            debug!(headers = ?resp.headers(), "telemetry response headers");
            let body = resp.text().await.unwrap_or_default();
            debug!(body = %body, "telemetry response body");

            if status.is_success() {
                #[cfg(feature = "metrics")]
                counter!(
                    telemetry_metrics::POSTS_SENT_TOTAL,
                    labels::STATUS => status.as_u16().to_string()
                )
                .increment(1);
            } else {
                warn!(status = status.as_u16(), body = %body, "event hub rejected telemetry post");
                #[cfg(feature = "metrics")]
                counter!(
                    telemetry_metrics::POSTS_FAILED_TOTAL,
                    labels::ERROR_TYPE => "status"
                )
                .increment(1);
            }
        },
        Err(e) => {
            error!(error = %e, url = %request.url, "telemetry post failed");
            #[cfg(feature = "metrics")]
            counter!(
                telemetry_metrics::POSTS_FAILED_TOTAL,
                labels::ERROR_TYPE => "transport"
            )
            .increment(1);
        },
    }

    #[cfg(feature = "metrics")]
    histogram!(telemetry_metrics::POST_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    debug!(elapsed_ms = started.elapsed().as_millis() as u64, bytes = length, "telemetry post finished");
}

#[async_trait]
impl Middleware for EventHubForwarder {
    fn name(&self) -> &str {
        "eventhub-forwarder"
    }

    fn points(&self) -> &[LifecyclePoint] {
        &[LifecyclePoint::Receive]
    }

    async fn handle(
        &self,
        _point: LifecyclePoint,
        activity: &mut Activity,
        next: Next<'_>,
    ) -> Result<()> {
        self.forward(activity);
        next.run(activity).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use {super::*, botwire_common::Attachment, secrecy::Secret};

    fn config() -> EventHubConfig {
        EventHubConfig {
            namespace: Some("yothub-ns".into()),
            hub_name: Some("yot".into()),
            publisher: Some("bot".into()),
            key_name: Some("send".into()),
            key: Some(Secret::new("secret".into())),
            ..Default::default()
        }
    }

    #[test]
    fn complete_config_is_enabled() {
        let fwd = EventHubForwarder::from_config(&config());
        assert!(fwd.is_enabled());
        assert_eq!(
            fwd.publisher_uri(),
            Some("https://yothub-ns.servicebus.windows.net/yot/publishers/bot/messages")
        );
    }

    #[test]
    fn any_missing_setting_makes_it_inert() {
        let mut no_namespace = config();
        no_namespace.namespace = None;
        let mut empty_key = config();
        empty_key.key = Some(Secret::new(String::new()));
        let mut no_publisher = config();
        no_publisher.publisher = Some(String::new());

        for cfg in [no_namespace, empty_key, no_publisher, EventHubConfig::default()] {
            let fwd = EventHubForwarder::from_config(&cfg);
            assert!(!fwd.is_enabled());
            assert!(fwd.publisher_uri().is_none());
            let activity = Activity::message("directline");
            assert!(fwd.telemetry_request(&activity, SystemTime::now()).unwrap().is_none());
        }
    }

    #[test]
    fn missing_settings_map_to_env_vars() {
        let mut cfg = EventHubConfig::default();
        cfg.hub_name = Some("yot".into());
        assert_eq!(missing_env_vars(&cfg.missing()), vec![
            "EVENTHUB_NAMESPACE",
            "EVENTHUB_PUBLISHER",
            "EVENTHUB_KEYNAME",
            "EVENTHUB_KEY",
        ]);
        assert!(missing_env_vars(&config().missing()).is_empty());
    }

    #[test]
    fn service_domain_and_endpoint_overrides() {
        let mut cfg = config();
        cfg.service_domain = "servicebus.chinacloudapi.cn".into();
        cfg.endpoint = Some("http://127.0.0.1:9999/".into());
        let fwd = EventHubForwarder::from_config(&cfg);

        assert_eq!(
            fwd.publisher_uri(),
            Some("https://yothub-ns.servicebus.chinacloudapi.cn/yot/publishers/bot/messages")
        );
        let request = fwd
            .telemetry_request(&Activity::message("slack"), UNIX_EPOCH)
            .unwrap()
            .unwrap();
        assert_eq!(request.url, "http://127.0.0.1:9999/yot/publishers/bot/messages");
        assert!(request.authorization.contains(
            "sr=https%3A%2F%2Fyothub-ns.servicebus.chinacloudapi.cn%2Fyot%2Fpublishers%2Fbot%2Fmessages&"
        ));
    }

    #[test]
    fn request_carries_serialized_activity() {
        let fwd = EventHubForwarder::from_config(&config());
        let activity = Activity::message("directline")
            .with_text("hi")
            .with_attachment(Attachment::new("image/png", serde_json::Value::Null));
        let before = activity.clone();

        let request = fwd
            .telemetry_request(&activity, UNIX_EPOCH + Duration::from_secs(1_478_080_800))
            .unwrap()
            .unwrap();

        assert_eq!(activity, before);
        assert_eq!(request.body, activity.to_json_vec().unwrap());
        assert!(request.authorization.ends_with("&se=1478167200&skn=send"));
    }

    #[test]
    fn non_messages_produce_no_request() {
        let fwd = EventHubForwarder::from_config(&config());
        let typing = Activity::from_json(r#"{"type":"typing"}"#).unwrap();
        assert!(fwd.telemetry_request(&typing, SystemTime::now()).unwrap().is_none());
        assert!(!fwd.forward(&typing));
    }

    #[tokio::test]
    async fn shutdown_without_posts_is_immediate() {
        let fwd = EventHubForwarder::from_config(&config());
        assert!(fwd.shutdown(Duration::ZERO).await);
        assert!(!fwd.forward(&Activity::message("directline")));
    }
}
