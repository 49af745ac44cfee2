//! Persistent push channel to the remote peer
//!
//! A WebSocket connection carrying realtime remote-change, conflict and
//! progress notifications. The channel owns its reconnect loop: capped
//! exponential backoff, then it stays down until [`PushChannel::reconnect`]
//! is called explicitly.

use std::sync::Mutex;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::backoff::{Backoff, BackoffPolicy};
use crate::errors::Result;
use crate::messages::PushMessage;

const EVENT_CHANNEL_CAPACITY: usize = 64;
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Connected,
    Disconnected,
    /// Backoff cap reached; only an explicit reconnect restarts the loop.
    Exhausted,
}

#[derive(Debug, Clone)]
pub enum ChannelEvent {
    State(ChannelState),
    Message(PushMessage),
}

#[derive(Debug, Clone)]
pub struct PushChannelConfig {
    pub url: String,
    pub token: Option<String>,
    pub backoff: BackoffPolicy,
}

pub struct PushChannel {
    config: PushChannelConfig,
    events: broadcast::Sender<ChannelEvent>,
    task: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl PushChannel {
    pub fn new(config: PushChannelConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            events,
            task: Mutex::new(None),
            shutdown_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }

    /// Start the connection loop. Idempotent while a loop is running.
    pub fn connect(&self) -> Result<()> {
        let mut task = self.task.lock().expect("task lock poisoned");
        if task.as_ref().map(|t| !t.is_finished()).unwrap_or(false) {
            return Ok(());
        }

        let config = self.config.clone();
        let events = self.events.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        *task = Some(tokio::spawn(run_loop(config, events, shutdown_rx)));
        Ok(())
    }

    /// Restart the connection loop with a fresh backoff budget.
    pub fn reconnect(&self) -> Result<()> {
        {
            let mut task = self.task.lock().expect("task lock poisoned");
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
        self.connect()
    }

    /// Stop the channel. Pending callbacks are dropped with the task.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.task.lock().expect("task lock poisoned").take() {
            handle.abort();
        }
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn channel_url(config: &PushChannelConfig) -> String {
    match &config.token {
        Some(token) => format!("{}?token={}", config.url, token),
        None => config.url.clone(),
    }
}

async fn run_loop(
    config: PushChannelConfig,
    events: broadcast::Sender<ChannelEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut backoff = Backoff::new(config.backoff.clone());
    let url = channel_url(&config);

    loop {
        let _ = events.send(ChannelEvent::State(ChannelState::Connecting));

        match connect_async(url.as_str()).await {
            Ok((mut ws, _)) => {
                info!("Push channel connected");
                let _ = events.send(ChannelEvent::State(ChannelState::Connected));
                backoff.reset();

                let mut keepalive = tokio::time::interval(KEEPALIVE_INTERVAL);
                keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                // The first tick fires immediately; consume it.
                keepalive.tick().await;

                loop {
                    tokio::select! {
                        incoming = ws.next() => match incoming {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<PushMessage>(&text) {
                                    Ok(PushMessage::Ping) => {
                                        let pong = serde_json::to_string(&PushMessage::Pong)
                                            .unwrap_or_default();
                                        if ws.send(Message::Text(pong)).await.is_err() {
                                            break;
                                        }
                                    }
                                    Ok(PushMessage::Pong) => {}
                                    Ok(msg) => {
                                        let _ = events.send(ChannelEvent::Message(msg));
                                    }
                                    Err(e) => {
                                        warn!("Unparseable push message: {}", e);
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if ws.send(Message::Pong(data)).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!("Push channel read error: {}", e);
                                break;
                            }
                        },
                        _ = keepalive.tick() => {
                            let ping = serde_json::to_string(&PushMessage::Ping)
                                .unwrap_or_default();
                            if ws.send(Message::Text(ping)).await.is_err() {
                                break;
                            }
                        },
                        _ = shutdown.changed() => {
                            let _ = ws.close(None).await;
                            return;
                        }
                    }
                }

                let _ = events.send(ChannelEvent::State(ChannelState::Disconnected));
            }
            Err(e) => {
                warn!("Push channel connect failed: {}", e);
                let _ = events.send(ChannelEvent::State(ChannelState::Disconnected));
            }
        }

        match backoff.next_delay() {
            Some(delay) => {
                debug!("Push channel retrying in {:?}", delay);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.changed() => return,
                }
            }
            None => {
                warn!(
                    "Push channel gave up after {} attempts; explicit reconnect required",
                    backoff.attempts()
                );
                let _ = events.send(ChannelEvent::State(ChannelState::Exhausted));
                return;
            }
        }
    }
}

impl std::fmt::Debug for PushChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushChannel")
            .field("url", &self.config.url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_lands_in_query_string() {
        let config = PushChannelConfig {
            url: "ws://example.com/api/sync/events".to_string(),
            token: Some("t0k3n".to_string()),
            backoff: BackoffPolicy::default(),
        };
        assert_eq!(
            channel_url(&config),
            "ws://example.com/api/sync/events?token=t0k3n"
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_ends_exhausted() {
        let config = PushChannelConfig {
            // Nothing listens on port 1; connection attempts fail fast.
            url: "ws://127.0.0.1:1/events".to_string(),
            token: None,
            backoff: BackoffPolicy {
                base: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                max_attempts: 2,
                jitter: false,
                ..Default::default()
            },
        };
        let channel = PushChannel::new(config);
        let mut rx = channel.subscribe();
        channel.connect().unwrap();

        let mut saw_exhausted = false;
        while let Ok(event) =
            tokio::time::timeout(Duration::from_secs(30), rx.recv()).await
        {
            if let Ok(ChannelEvent::State(ChannelState::Exhausted)) = event {
                saw_exhausted = true;
                break;
            }
            if event.is_err() {
                break;
            }
        }
        assert!(saw_exhausted);
    }
}
