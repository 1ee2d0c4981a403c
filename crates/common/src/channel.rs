use std::fmt;

use crate::activity::Activity;

/// Transport an activity is delivered through.
///
/// Identifiers match the `channelId` values emitted by the Bot Framework
/// connector. Anything unrecognised is kept verbatim in [`ChannelType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelType {
    DirectLine,
    WebChat,
    Emulator,
    Facebook,
    Skype,
    Slack,
    Telegram,
    Kik,
    Email,
    Sms,
    GroupMe,
    MsTeams,
    Other(String),
}

impl ChannelType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::DirectLine => "directline",
            Self::WebChat => "webchat",
            Self::Emulator => "emulator",
            Self::Facebook => "facebook",
            Self::Skype => "skype",
            Self::Slack => "slack",
            Self::Telegram => "telegram",
            Self::Kik => "kik",
            Self::Email => "email",
            Self::Sms => "sms",
            Self::GroupMe => "groupme",
            Self::MsTeams => "msteams",
            Self::Other(id) => id,
        }
    }

    /// Parse a `channelId`. Matching is exact.
    pub fn from_id(id: &str) -> Self {
        match id {
            "directline" => Self::DirectLine,
            "webchat" => Self::WebChat,
            "emulator" => Self::Emulator,
            "facebook" => Self::Facebook,
            "skype" => Self::Skype,
            "slack" => Self::Slack,
            "telegram" => Self::Telegram,
            "kik" => Self::Kik,
            "email" => Self::Email,
            "sms" => Self::Sms,
            "groupme" => Self::GroupMe,
            "msteams" => Self::MsTeams,
            other => Self::Other(other.to_string()),
        }
    }

    /// Transport of `activity`, or `None` when it carries no address.
    pub fn of(activity: &Activity) -> Option<Self> {
        activity.channel_id().map(Self::from_id)
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
