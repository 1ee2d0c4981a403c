//! Conversational activity model.
//!
//! Mirrors the Bot Framework message shape closely enough to round-trip it:
//! fields the pipeline acts on are typed, everything else is carried in
//! flattened `extra` maps and serialized back untouched.

use std::fmt;

use {
    serde::{Deserialize, Deserializer, Serialize},
    serde_json::{Map, Value},
};

use crate::error::{Error, Result};

/// Kind of a conversational activity (`type` on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityKind {
    Message,
    Other(String),
}

impl ActivityKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Message => "message",
            Self::Other(kind) => kind,
        }
    }
}

impl From<String> for ActivityKind {
    fn from(value: String) -> Self {
        if value == "message" {
            Self::Message
        } else {
            Self::Other(value)
        }
    }
}

impl From<ActivityKind> for String {
    fn from(kind: ActivityKind) -> Self {
        match kind {
            ActivityKind::Message => "message".into(),
            ActivityKind::Other(kind) => kind,
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user, bot, or conversation reference inside an [`Address`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Routing information of an activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Transport identifier, e.g. `directline` or `facebook`.
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<AddressRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<AddressRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<AddressRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A rich attachment. Identity is its position in the owning activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub content: Value,
    /// `name`, `contentUrl`, `thumbnailUrl` and anything else.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Attachment {
    pub fn new(content_type: impl Into<String>, content: Value) -> Self {
        Self {
            content_type: content_type.into(),
            content,
            extra: Map::new(),
        }
    }
}

/// Channel-specific side-channel data (`sourceEvent` on the wire).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceEvent {
    /// Prompt choices relocated out of the public attachment list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Attachment>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A conversational event flowing through the middleware pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_event: Option<SourceEvent>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<Attachment>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Attachment>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Activity {
    /// An empty message activity addressed through `channel_id`.
    pub fn message(channel_id: impl Into<String>) -> Self {
        Self {
            kind: ActivityKind::Message,
            address: Some(Address {
                channel_id: channel_id.into(),
                ..Default::default()
            }),
            text: None,
            attachments: Vec::new(),
            source_event: None,
            extra: Map::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Parse an activity from its JSON representation.
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::invalid_activity("expected a JSON object"));
        }
        if value.get("type").and_then(Value::as_str).is_none() {
            return Err(Error::invalid_activity("missing string field `type`"));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Serialize to the JSON bytes sent over the wire.
    pub fn to_json_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn is_message(&self) -> bool {
        self.kind == ActivityKind::Message
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.address.as_ref().map(|a| a.channel_id.as_str())
    }

    /// Envelope for side-channel data, created on first use.
    pub fn source_event_mut(&mut self) -> &mut SourceEvent {
        self.source_event.get_or_insert_with(SourceEvent::default)
    }
}
