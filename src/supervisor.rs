use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::{Network, Status, StreamEvent};
use crate::inbound::EventKind;

/// Wait between a lost stream and the next connection attempt
pub const RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// Longest silence tolerated on an open stream. The server sends heartbeats
/// well inside this window, so hitting it means the connection is gone.
pub const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Receives the statuses the supervisor pulls off the stream, in arrival order
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, kind: EventKind, status: Status);
}

/// Keeps the user stream open for the lifetime of the process.
pub struct Supervisor {
    network: Arc<dyn Network>,
    handler: Arc<dyn EventHandler>,
    retry_delay: Duration,
    idle_timeout: Duration,
}

impl Supervisor {
    pub fn new(network: Arc<dyn Network>, handler: Arc<dyn EventHandler>) -> Self {
        Self {
            network,
            handler,
            retry_delay: RECONNECT_DELAY,
            idle_timeout: STREAM_IDLE_TIMEOUT,
        }
    }

    #[cfg(test)]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Connect, consume, reconnect. Never returns.
    pub async fn run(self) {
        loop {
            match self.network.stream_user().await {
                Ok(events) => {
                    info!("start streaming loop");
                    self.consume(events).await;
                    info!("exits streaming loop");
                }
                Err(e) => error!("Failed to open user stream: {:#}", e),
            }

            info!("Reconnecting in {}s", self.retry_delay.as_secs());
            tokio::time::sleep(self.retry_delay).await;
        }
    }

    async fn consume(&self, mut events: BoxStream<'static, anyhow::Result<StreamEvent>>) {
        loop {
            let event = match tokio::time::timeout(self.idle_timeout, events.next()).await {
                Err(_) => {
                    warn!("No data on user stream for {}s", self.idle_timeout.as_secs());
                    return;
                }
                Ok(None) => return,
                Ok(Some(Err(e))) => {
                    warn!("Stream error: {:#}", e);
                    return;
                }
                Ok(Some(Ok(event))) => event,
            };

            match event {
                StreamEvent::Update(status) => {
                    debug!("onUpdateEvent: {}", status.id);
                    self.handler.handle(EventKind::Update, status).await;
                }
                StreamEvent::Notification(notification) => match notification.status {
                    Some(status) => {
                        debug!("onNotificationEvent: {}", notification.id);
                        self.handler.handle(EventKind::Notification, status).await;
                    }
                    None => debug!(
                        "Ignoring {} notification without status",
                        notification.notification_type
                    ),
                },
                StreamEvent::Delete(id) => debug!("Ignoring delete of {}", id),
                StreamEvent::Other(kind) => debug!("Ignoring {} event", kind),
                StreamEvent::Heartbeat => {}
                StreamEvent::Error(message) => {
                    warn!("Stream error event: {}", message);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{account, status, FakeNetwork};
    use crate::api::Notification;
    use std::collections::VecDeque;
    use std::sync::atomic::Ordering;
    use tokio::sync::mpsc;

    struct Recorder {
        tx: mpsc::UnboundedSender<(EventKind, String)>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&self, kind: EventKind, status: Status) {
            self.tx.send((kind, status.id)).ok();
        }
    }

    fn notification(id: &str, status: Option<Status>) -> StreamEvent {
        StreamEvent::Notification(Notification {
            id: id.to_string(),
            notification_type: if status.is_some() { "mention" } else { "follow" }.to_string(),
            account: account("alice"),
            status,
        })
    }

    #[tokio::test]
    async fn test_dispatches_in_order_and_reconnects() {
        let sessions = VecDeque::from(vec![
            None,
            Some(vec![
                Ok(StreamEvent::Update(status("a", "alice", "a"))),
                Ok(notification("n1", Some(status("b", "alice", "b")))),
                Ok(notification("n2", None)),
                Ok(StreamEvent::Delete("zzz".to_string())),
                Ok(StreamEvent::Other("filters_changed".to_string())),
                Ok(StreamEvent::Error("gone".to_string())),
                Ok(StreamEvent::Update(status("never", "alice", "x"))),
            ]),
            Some(vec![
                Ok(StreamEvent::Update(status("c", "alice", "c"))),
                Err(anyhow::anyhow!("connection reset")),
                Ok(StreamEvent::Update(status("never", "alice", "x"))),
            ]),
            Some(vec![Ok(StreamEvent::Update(status("d", "alice", "d")))]),
        ]);
        let network = Arc::new(FakeNetwork {
            sessions: std::sync::Mutex::new(sessions),
            ..Default::default()
        });
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = Supervisor::new(network.clone(), Arc::new(Recorder { tx }))
            .with_retry_delay(Duration::from_millis(5))
            .spawn();

        let mut seen = Vec::new();
        for _ in 0..4 {
            let item = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            seen.push(item);
        }
        handle.abort();

        assert_eq!(
            seen,
            vec![
                (EventKind::Update, "a".to_string()),
                (EventKind::Notification, "b".to_string()),
                (EventKind::Update, "c".to_string()),
                (EventKind::Update, "d".to_string()),
            ]
        );
        assert!(network.connects.load(Ordering::SeqCst) >= 4);
    }

    #[test]
    fn test_reconnect_delay_is_ten_seconds() {
        assert_eq!(RECONNECT_DELAY, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_stream_is_dropped_and_reopened() {
        // No scripted sessions: every connection opens but never yields.
        let network = Arc::new(FakeNetwork::default());
        let (tx, _rx) = mpsc::unbounded_channel();

        let handle = Supervisor::new(network.clone(), Arc::new(Recorder { tx })).spawn();

        tokio::time::sleep(STREAM_IDLE_TIMEOUT - Duration::from_secs(1)).await;
        assert_eq!(network.connects.load(Ordering::SeqCst), 1);

        // idle limit, reconnect delay, then a second idle limit and delay
        let cycle = STREAM_IDLE_TIMEOUT + RECONNECT_DELAY;
        tokio::time::sleep(Duration::from_secs(2) + RECONNECT_DELAY + cycle).await;
        handle.abort();

        assert_eq!(network.connects.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeats_keep_stream_open() {
        let heartbeats: Vec<anyhow::Result<StreamEvent>> =
            (0..5).map(|_| Ok(StreamEvent::Heartbeat)).collect();
        let events = futures::stream::iter(heartbeats)
            .then(|event| async move {
                tokio::time::sleep(STREAM_IDLE_TIMEOUT / 2).await;
                event
            })
            .chain(futures::stream::iter(vec![Ok(StreamEvent::Update(status(
                "late", "alice", "x",
            )))]))
            .boxed();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let supervisor =
            Supervisor::new(Arc::new(FakeNetwork::default()), Arc::new(Recorder { tx }));
        supervisor.consume(events).await;

        assert_eq!(rx.try_recv().unwrap(), (EventKind::Update, "late".to_string()));
    }
}
