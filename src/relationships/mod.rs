/// Relationship edges (likes, subscriptions) and their toggle semantics

mod toggle;

pub use toggle::{RelationshipToggle, ToggleOutcome};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Kinds of entity an edge can point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Video,
    Comment,
    Tweet,
    /// A channel is an identity
    Channel,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Video => "video",
            TargetKind::Comment => "comment",
            TargetKind::Tweet => "tweet",
            TargetKind::Channel => "channel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    VideoLike,
    CommentLike,
    TweetLike,
    Subscription,
}

impl EdgeKind {
    pub fn target_kind(&self) -> TargetKind {
        match self {
            EdgeKind::VideoLike => TargetKind::Video,
            EdgeKind::CommentLike => TargetKind::Comment,
            EdgeKind::TweetLike => TargetKind::Tweet,
            EdgeKind::Subscription => TargetKind::Channel,
        }
    }

    /// Discriminator stored in the `kind` column
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::VideoLike => "video_like",
            EdgeKind::CommentLike => "comment_like",
            EdgeKind::TweetLike => "tweet_like",
            EdgeKind::Subscription => "subscription",
        }
    }
}

/// Identity of an edge: at most one edge exists per key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeKey {
    pub actor_id: Uuid,
    pub target_id: Uuid,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    #[serde(flatten)]
    pub key: EdgeKey,
    pub created_at: DateTime<Utc>,
}

impl Edge {
    pub fn new(key: EdgeKey) -> Self {
        Self {
            key,
            created_at: Utc::now(),
        }
    }
}
