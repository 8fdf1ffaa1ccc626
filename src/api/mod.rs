pub mod client;
pub mod sse;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub use client::MastodonClient;

/// Audience scope of a status
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Unlisted,
    Private,
    Direct,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Unlisted => write!(f, "unlisted"),
            Visibility::Private => write!(f, "private"),
            Visibility::Direct => write!(f, "direct"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Account {
    pub id: String,
    /// `user` for local accounts, `user@host` for remote ones
    pub acct: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    /// Profile page URL
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Mention {
    pub id: String,
    pub acct: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MediaAttachment {
    pub id: String,
    #[serde(rename = "type", default)]
    pub media_type: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A published post
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Status {
    pub id: String,
    pub account: Account,
    /// HTML body
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub mentions: Vec<Mention>,
    #[serde(default)]
    pub media_attachments: Vec<MediaAttachment>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub in_reply_to_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub account: Account,
    #[serde(default)]
    pub status: Option<Status>,
}

/// Body of `POST /api/v1/statuses`
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct NewStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to_id: Option<String>,
    pub visibility: Visibility,
}

/// An event pushed on the user stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A status appeared on the home timeline
    Update(Status),
    /// Someone interacted with the account (mention, reply, favourite, ...)
    Notification(Notification),
    /// A status was deleted
    Delete(String),
    /// The server reported a failure; the connection should be dropped
    Error(String),
    /// Any other event kind, kept by name only
    Other(String),
    /// Keep-alive comment; carries no payload
    Heartbeat,
}

/// The calls the adapter makes against the social network.
#[async_trait]
pub trait Network: Send + Sync {
    /// Fetch the account the access token belongs to
    async fn verify_credentials(&self) -> Result<Account>;

    /// Open the user stream. The stream ends when the server closes it.
    async fn stream_user(&self) -> Result<BoxStream<'static, Result<StreamEvent>>>;

    /// Publish a status and return it as created by the server
    async fn post_status(&self, status: &NewStatus) -> Result<Status>;
}
