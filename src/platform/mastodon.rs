use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::{Network, Status};
use crate::config::{AllowList, Config};
use crate::inbound::{normalize, EventKind, Identity, Inbound};
use crate::outbound::Relay;
use crate::platform::BusMessage;
use crate::supervisor::{EventHandler, Supervisor};

/// Everything the Mastodon side of the bot needs, built once at startup
pub struct Adapter {
    identity: Identity,
    allow_list: AllowList,
    relay: Arc<Relay>,
    inbound: mpsc::Sender<BusMessage>,
}

impl Adapter {
    pub fn new(
        identity: Identity,
        allow_list: AllowList,
        relay: Arc<Relay>,
        inbound: mpsc::Sender<BusMessage>,
    ) -> Self {
        Self {
            identity,
            allow_list,
            relay,
            inbound,
        }
    }

    /// Resolve the bot's own account and start streaming.
    ///
    /// Received messages are pushed to `inbound`. The returned handle belongs
    /// to the stream supervisor, which runs until the process exits.
    pub async fn boot(
        config: &Config,
        network: Arc<dyn Network>,
        inbound: mpsc::Sender<BusMessage>,
    ) -> Result<(Arc<Self>, JoinHandle<()>)> {
        for acct in config.allow_list.iter() {
            info!("allow list: {}", acct);
        }

        let account = network
            .verify_credentials()
            .await
            .context("account fetch error")?;
        let host = config.host()?;
        let identity = Identity::new(&account, &host);
        info!("Signed in as {}", identity.full_acct);

        let relay = Arc::new(Relay::new(network.clone(), config.post_timeout));
        let adapter = Arc::new(Self::new(
            identity,
            config.allow_list.clone(),
            relay,
            inbound,
        ));

        let supervisor = Supervisor::new(network, adapter.clone()).spawn();
        Ok((adapter, supervisor))
    }

    #[cfg(test)]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Post `msg` on its own task so a slow post never holds up the caller.
    pub fn send(&self, msg: BusMessage) -> JoinHandle<()> {
        let relay = self.relay.clone();
        tokio::spawn(async move {
            if let Err(e) = relay.send(&msg).await {
                error!("Failed to relay message to {}: {:#}", msg.user.id, e);
            }
        })
    }

    /// Like [`Adapter::send`], for a message still in its JSON form.
    pub fn send_value(&self, value: serde_json::Value) -> JoinHandle<()> {
        let relay = self.relay.clone();
        tokio::spawn(async move {
            if let Err(e) = relay.send_value(value).await {
                error!("Failed to relay message: {:#}", e);
            }
        })
    }
}

#[async_trait]
impl EventHandler for Adapter {
    async fn handle(&self, kind: EventKind, status: Status) {
        match normalize(&self.identity, &self.allow_list, kind, &status) {
            Ok(Inbound::Deliver(msg)) => {
                if self.inbound.send(msg).await.is_err() {
                    warn!("Bus receiver dropped, status {} lost", status.id);
                }
            }
            Ok(Inbound::Reject(msg)) => {
                self.send(msg);
            }
            Ok(Inbound::Skip(reason)) => debug!("Skipped status {}: {:?}", status.id, reason),
            Err(e) => warn!("Dropping status {}: {:#}", status.id, e),
        }
    }
}
