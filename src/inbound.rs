use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::api::{Account, Status};
use crate::config::AllowList;
use crate::platform::{Attachment, BusMessage, Content, Room, User};
use crate::text::html2text;

/// Reply sent to accounts outside the allow-list
pub const NOT_ALLOWED_TEXT: &str =
    "このbotは許可リストが設定されています。あなたのアカウントは許可リストに含まれていません。";

pub const ROOM_ID: &str = "mastodon";

/// Stream channel a status arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Home timeline activity
    Update,
    /// Mention or reply addressed to the bot
    Notification,
}

/// The bot's own account, in every form it can appear in a post body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub acct: String,
    pub url: String,
    /// `@user@host`
    pub full_acct: String,
}

impl Identity {
    pub fn new(account: &Account, host: &str) -> Self {
        Self {
            acct: account.acct.clone(),
            url: account.url.clone(),
            full_acct: format!("@{}@{}", account.acct, host),
        }
    }

    /// Remove every reference to the bot from `text`
    fn strip_from(&self, text: &str) -> String {
        let mut text = text.to_string();
        for pattern in [self.url.clone(), self.full_acct.clone(), format!("@{}", self.acct)] {
            if !pattern.is_empty() {
                text = text.replace(&pattern, "");
            }
        }
        text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    OwnPost,
    /// A mention seen on the timeline; it is handled when the notification arrives
    AwaitNotification,
    NotAllowed,
}

/// What to do with one received status
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Skip(SkipReason),
    /// Forward to the bus
    Deliver(BusMessage),
    /// Answer the author directly with a refusal
    Reject(BusMessage),
}

fn room() -> Room {
    Room {
        id: ROOM_ID.to_string(),
        name: ROOM_ID.to_string(),
        description: ROOM_ID.to_string(),
    }
}

fn bus_message(
    status: &Status,
    text: String,
    attachments: Vec<Attachment>,
    is_reply: bool,
) -> Result<BusMessage> {
    let raw = serde_json::to_value(status).context("Failed to encode status payload")?;
    Ok(BusMessage {
        user: User {
            id: status.account.acct.clone(),
            name: status.account.display_name.clone(),
        },
        room: room(),
        message: Content {
            id: status.id.clone(),
            text: text.trim().to_string(),
            attachments,
        },
        is_reply,
        raw: Some(raw),
    })
}

/// Decide whether and how a received status reaches the bus.
pub fn normalize(
    identity: &Identity,
    allow_list: &AllowList,
    kind: EventKind,
    status: &Status,
) -> Result<Inbound> {
    if status.account.acct == identity.acct {
        debug!("own message, skipped");
        return Ok(Inbound::Skip(SkipReason::OwnPost));
    }

    let mut text = html2text(&status.content);
    if !status.mentions.is_empty() {
        text = identity.strip_from(&text);
    }
    let is_reply = status.mentions.iter().any(|m| m.acct == identity.acct);

    if kind == EventKind::Update && is_reply {
        debug!("status {} will be processed as a notification", status.id);
        return Ok(Inbound::Skip(SkipReason::AwaitNotification));
    }

    debug!("text: {}", text.trim());

    if !allow_list.permits(&status.account.acct) {
        info!("deny: {}", status.account.acct);
        if !is_reply {
            return Ok(Inbound::Skip(SkipReason::NotAllowed));
        }
        let rejection = bus_message(status, NOT_ALLOWED_TEXT.to_string(), Vec::new(), true)?;
        return Ok(Inbound::Reject(rejection));
    }
    if !allow_list.is_empty() {
        debug!("allow: {}", status.account.acct);
    }

    let attachments = status
        .media_attachments
        .iter()
        .map(|m| Attachment {
            url: m.url.clone(),
            description: m.description.clone().unwrap_or_default(),
        })
        .collect();

    Ok(Inbound::Deliver(bus_message(status, text, attachments, is_reply)?))
}
