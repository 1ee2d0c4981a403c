//! CLI commands that run an activity through the pipeline.

use std::{io::Read, time::Duration};

use {
    anyhow::{Context, bail},
    botwire_common::{Activity, Dispatch, LifecyclePoint},
    botwire_config::BotwireConfig,
    tracing::{debug, warn},
};

use crate::pipeline::{Pipeline, build_pipeline};

/// Run `input` (a path, or `-` for stdin) through the pipeline at `point`
/// and print the resulting activity. Pending telemetry posts get up to
/// `grace` to finish.
pub async fn handle_activity(
    config: &BotwireConfig,
    point: LifecyclePoint,
    input: &str,
    grace: Duration,
) -> anyhow::Result<()> {
    let raw = read_input(input)?;
    let pipeline = build_pipeline(config);

    let result = process(&pipeline, point, &raw).await;
    if !pipeline.forwarder.shutdown(grace).await {
        warn!("exited with telemetry posts still pending");
    }

    let activity = result?;
    println!("{}", serde_json::to_string_pretty(&activity)?);
    Ok(())
}

/// Parse `raw` and run it through `pipeline` at `point`.
pub async fn process(
    pipeline: &Pipeline,
    point: LifecyclePoint,
    raw: &str,
) -> anyhow::Result<Activity> {
    let mut activity = Activity::from_json(raw).context("invalid activity")?;
    debug!(point = %point, kind = %activity.kind, channel = ?activity.channel_id(), "processing activity");

    match pipeline.registry.run(point, &mut activity).await? {
        Dispatch::Completed => Ok(activity),
        Dispatch::Halted { by } => bail!("activity halted by middleware '{by}'"),
    }
}

fn read_input(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read activity from stdin")?;
        return Ok(raw);
    }
    std::fs::read_to_string(input).with_context(|| format!("failed to read {input}"))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn reads_activity_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.json");
        std::fs::write(&path, r#"{"type":"message"}"#).unwrap();
        assert_eq!(
            read_input(path.to_str().unwrap()).unwrap(),
            r#"{"type":"message"}"#
        );
        assert!(read_input(dir.path().join("nope.json").to_str().unwrap()).is_err());
    }

    #[tokio::test]
    async fn send_relocates_directline_keyboard() {
        let pipeline = build_pipeline(&BotwireConfig::default());
        let raw = json!({
            "type": "message",
            "address": { "channelId": "directline" },
            "attachments": [
                { "contentType": "application/vnd.microsoft.keyboard", "content": { "buttons": [] } }
            ]
        })
        .to_string();

        let activity = process(&pipeline, LifecyclePoint::Send, &raw).await.unwrap();
        let wire = serde_json::to_value(&activity).unwrap();
        assert_eq!(wire["attachments"], json!([]));
        assert_eq!(
            wire["sourceEvent"]["choices"]["contentType"],
            "application/vnd.microsoft.keyboard"
        );
    }

    #[tokio::test]
    async fn receive_passes_activity_through() {
        let pipeline = build_pipeline(&BotwireConfig::default());
        let raw = r#"{"type":"message","text":"hi","address":{"channelId":"slack"}}"#;
        let activity = process(&pipeline, LifecyclePoint::Receive, raw).await.unwrap();
        assert_eq!(activity.text.as_deref(), Some("hi"));
        assert!(pipeline.forwarder.shutdown(Duration::ZERO).await);
    }

    #[tokio::test]
    async fn rejects_invalid_activity() {
        let pipeline = build_pipeline(&BotwireConfig::default());
        let err = process(&pipeline, LifecyclePoint::Send, r#"{"text":"no type"}"#)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid activity"));
    }
}
