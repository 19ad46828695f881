use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What triggered a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
    Reply,
    Repost,
    Mention,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::Follow => "follow",
            Self::Reply => "reply",
            Self::Repost => "repost",
            Self::Mention => "mention",
        }
    }

    /// Human-readable message stored alongside the notification.
    pub fn message(&self, sender_username: &str) -> String {
        match self {
            Self::Like => format!("{} liked your post", sender_username),
            Self::Comment => format!("{} commented on your post", sender_username),
            Self::Follow => format!("{} started following you", sender_username),
            Self::Reply => format!("{} replied to your comment", sender_username),
            Self::Repost => format!("{} reposted your post", sender_username),
            Self::Mention => format!("{} mentioned you in a comment", sender_username),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownNotificationKind(pub String);

impl fmt::Display for UnknownNotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown notification kind '{}'", self.0)
    }
}

impl std::error::Error for UnknownNotificationKind {}

impl FromStr for NotificationKind {
    type Err = UnknownNotificationKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Self::Like),
            "comment" => Ok(Self::Comment),
            "follow" => Ok(Self::Follow),
            "reply" => Ok(Self::Reply),
            "repost" => Ok(Self::Repost),
            "mention" => Ok(Self::Mention),
            other => Err(UnknownNotificationKind(other.to_string())),
        }
    }
}

/// Feed selector passed as `?type=`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    #[default]
    Following,
    Trending,
}

impl FeedMode {
    /// Anything other than `trending` selects the following feed.
    pub fn from_query(value: &str) -> Self {
        match value {
            "trending" => Self::Trending,
            _ => Self::Following,
        }
    }
}
