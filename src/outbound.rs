use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::api::{NewStatus, Network, Status, Visibility};
use crate::platform::BusMessage;
use crate::text::split;

/// Maximum code points per posted chunk, excluding the reply prefix
pub const CHUNK_SIZE: usize = 400;

/// Used when the incoming status gives no narrower audience
pub const DEFAULT_VISIBILITY: Visibility = Visibility::Unlisted;

#[derive(Deserialize)]
struct RawVisibility {
    #[serde(default)]
    visibility: Option<Visibility>,
}

/// Posts bus messages to the network, split and threaded.
pub struct Relay {
    network: Arc<dyn Network>,
    post_timeout: Duration,
}

impl Relay {
    pub fn new(network: Arc<dyn Network>, post_timeout: Duration) -> Self {
        Self {
            network,
            post_timeout,
        }
    }

    /// Audience for the reply chain: the original status's visibility unless
    /// it was public, in which case the default.
    pub fn visibility(msg: &BusMessage) -> Visibility {
        let Some(raw) = &msg.raw else {
            return DEFAULT_VISIBILITY;
        };
        match RawVisibility::deserialize(raw) {
            Ok(RawVisibility {
                visibility: Some(v),
            }) if v != Visibility::Public => v,
            Ok(_) => DEFAULT_VISIBILITY,
            Err(e) => {
                warn!("Failed to decode raw payload visibility: {}", e);
                DEFAULT_VISIBILITY
            }
        }
    }

    /// Post `msg`, one status per chunk, each replying to the previous one.
    ///
    /// Stops at the first failed chunk; chunks already posted stay up.
    pub async fn send(&self, msg: &BusMessage) -> Result<Vec<Status>> {
        let (prefix, mut in_reply_to_id) = if msg.is_reply {
            let root = Some(msg.message.id.clone()).filter(|id| !id.is_empty());
            (format!("@{} ", msg.user.id), root)
        } else {
            (String::new(), None)
        };
        let visibility = Self::visibility(msg);

        let chunks: Vec<String> = split(&msg.message.text, CHUNK_SIZE)
            .into_iter()
            .filter(|c| !c.is_empty())
            .collect();
        if chunks.is_empty() {
            debug!("Nothing to post for message {}", msg.message.id);
            return Ok(Vec::new());
        }

        let total = chunks.len();
        let mut posted = Vec::with_capacity(total);
        for (i, chunk) in chunks.into_iter().enumerate() {
            let new_status = NewStatus {
                status: format!("{}{}", prefix, chunk),
                in_reply_to_id: in_reply_to_id.clone(),
                visibility,
            };

            let status = tokio::time::timeout(self.post_timeout, self.network.post_status(&new_status))
                .await
                .map_err(|_| {
                    anyhow::anyhow!(
                        "Timed out after {:?} posting chunk {}/{}",
                        self.post_timeout,
                        i + 1,
                        total
                    )
                })?
                .with_context(|| format!("Failed to post chunk {}/{}", i + 1, total))?;

            in_reply_to_id = Some(status.id.clone());
            posted.push(status);
        }

        info!(
            "Posted {} status(es) for {} ({})",
            posted.len(),
            msg.user.id,
            visibility
        );
        Ok(posted)
    }

    /// Relay a message handed over by the bus as loose JSON.
    ///
    /// Values that do not decode are logged and dropped.
    pub async fn send_value(&self, value: serde_json::Value) -> Result<Vec<Status>> {
        let msg = match BusMessage::from_value(value) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Dropping bus message: {:#}", e);
                return Ok(Vec::new());
            }
        };
        self.send(&msg).await
    }
}
