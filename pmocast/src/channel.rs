//! Persistent, auto-reconnecting command channel to one cast target.
//!
//! Commands are correlated with responses by sequence number. Commands issued
//! while the connection is down are buffered and replayed, in issue order and
//! with their original sequence numbers, once the connection is back.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::errors::{CastError, Result};
use crate::events::{PushEventBus, SubscriptionId};
use crate::protocol::{ClientMessage, Command, PushEvent, ServerMessage};
use crate::transport::{Connection, Transport};

/// Delay before reconnecting after the connection closed.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(500);

struct PendingRequest {
    command: &'static str,
    reply: oneshot::Sender<Result<Value>>,
}

type PendingMap = Arc<Mutex<HashMap<u64, PendingRequest>>>;
type Subscription = (SubscriptionId, UnboundedReceiver<PushEvent>);

pub struct CommandChannel {
    url: Url,
    seq: AtomicU64,
    pending: PendingMap,
    outgoing: UnboundedSender<String>,
    bus: PushEventBus,
    /// Registered before the connection task starts; handed to the first
    /// `subscribe` call with every push received since `open`.
    first_subscription: Mutex<Option<Subscription>>,
    cancel: CancellationToken,
}

impl CommandChannel {
    /// Opens a channel to `url` and starts connecting in the background.
    ///
    /// Pushes that arrive before the first [`subscribe`](Self::subscribe)
    /// are kept for that first subscriber.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(url: Url, transport: Arc<dyn Transport>, reconnect_delay: Duration) -> Self {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let bus = PushEventBus::new();
        let first_subscription = bus.subscribe();
        let cancel = CancellationToken::new();
        let (outgoing, rx) = unbounded_channel();

        let task = ConnectionTask {
            url: url.clone(),
            transport,
            rx,
            outbox: VecDeque::new(),
            pending: pending.clone(),
            bus: bus.clone(),
            cancel: cancel.clone(),
            reconnect_delay,
        };
        tokio::spawn(task.run());

        Self {
            url,
            seq: AtomicU64::new(1),
            pending,
            outgoing,
            bus,
            first_subscription: Mutex::new(Some(first_subscription)),
            cancel,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Sends `command` and waits for the matching response.
    ///
    /// There is no timeout: a command issued while disconnected stays pending
    /// until it is answered or the channel is disposed.
    pub async fn request<T: DeserializeOwned>(&self, command: Command) -> Result<T> {
        if self.is_disposed() {
            return Err(CastError::Disposed);
        }

        let name = command.name();
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let text = serde_json::to_string(&ClientMessage::new(seq, command))?;

        let (reply, response) = oneshot::channel();
        self.pending
            .lock()
            .expect("CommandChannel pending mutex poisoned")
            .insert(seq, PendingRequest { command: name, reply });

        // dispose() may have drained the pending map before the insert above.
        if self.is_disposed() || self.outgoing.send(text).is_err() {
            self.forget(seq);
            return Err(CastError::Disposed);
        }
        debug!(url = %self.url, seq, command = name, "TX command queued");

        let data = response.await.map_err(|_| CastError::Disposed)??;
        serde_json::from_value(data)
            .map_err(|e| CastError::protocol_violation(name, format!("bad response data: {e}")))
    }

    pub fn subscribe(&self) -> Subscription {
        let first = self
            .first_subscription
            .lock()
            .expect("CommandChannel subscription mutex poisoned")
            .take();
        first.unwrap_or_else(|| self.bus.subscribe())
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn is_disposed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stops the connection task, drops all subscribers and rejects every
    /// pending request with [`CastError::Disposed`]. Idempotent.
    pub fn dispose(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        self.bus.close();
        self.first_subscription
            .lock()
            .expect("CommandChannel subscription mutex poisoned")
            .take();

        let drained: Vec<PendingRequest> = self
            .pending
            .lock()
            .expect("CommandChannel pending mutex poisoned")
            .drain()
            .map(|(_, request)| request)
            .collect();
        for request in drained {
            let _ = request.reply.send(Err(CastError::Disposed));
        }
        info!(url = %self.url, "command channel disposed");
    }

    fn forget(&self, seq: u64) {
        self.pending
            .lock()
            .expect("CommandChannel pending mutex poisoned")
            .remove(&seq);
    }
}

impl Drop for CommandChannel {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Builds the command endpoint of a cast target: `<base>/ws?<params>` with
/// `http`/`https` mapped to `ws`/`wss`.
pub fn command_url(base: &Url, params: &[(String, String)]) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    let mut url = base
        .join("ws")
        .map_err(|e| CastError::InvalidUrl(format!("{base}: {e}")))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(CastError::InvalidUrl(format!(
                "{base}: unsupported scheme {other}"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| CastError::InvalidUrl(base.to_string()))?;

    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    Ok(url)
}

struct ConnectionTask {
    url: Url,
    transport: Arc<dyn Transport>,
    rx: UnboundedReceiver<String>,
    /// Serialized commands not yet written to a live connection.
    outbox: VecDeque<String>,
    pending: PendingMap,
    bus: PushEventBus,
    cancel: CancellationToken,
    reconnect_delay: Duration,
}

impl ConnectionTask {
    async fn run(mut self) {
        loop {
            let connected = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.transport.connect(&self.url) => result,
            };

            match connected {
                Ok(mut connection) => {
                    info!(url = %self.url, "connected to cast target");
                    self.serve(connection.as_mut()).await;
                    connection.close().await;
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    warn!(url = %self.url, buffered = self.outbox.len(), "connection to cast target lost");
                }
                Err(e) => {
                    debug!(url = %self.url, error = %e, "cast target unreachable");
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
        debug!(url = %self.url, "connection task stopped");
    }

    /// Runs one connection until it closes or the channel is disposed.
    async fn serve(&mut self, connection: &mut dyn Connection) {
        while let Ok(text) = self.rx.try_recv() {
            self.outbox.push_back(text);
        }
        while let Some(text) = self.outbox.pop_front() {
            if let Err(e) = connection.send(text.clone()).await {
                warn!(url = %self.url, error = %e, "failed to flush buffered command");
                self.outbox.push_front(text);
                return;
            }
        }

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                Some(text) = self.rx.recv() => {
                    if let Err(e) = connection.send(text.clone()).await {
                        warn!(url = %self.url, error = %e, "failed to send command");
                        self.outbox.push_front(text);
                        return;
                    }
                }
                incoming = connection.recv() => match incoming {
                    Some(Ok(text)) => self.dispatch(&text),
                    Some(Err(e)) => {
                        warn!(url = %self.url, error = %e, "receive failed");
                        return;
                    }
                    None => return,
                },
            }
        }
    }

    fn dispatch(&self, text: &str) {
        let message = match serde_json::from_str::<ServerMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(url = %self.url, error = %e, "ignoring malformed message from cast target");
                return;
            }
        };

        match message {
            ServerMessage::Playback(event) => self.bus.broadcast(PushEvent::Playback(event)),
            ServerMessage::Queue(queue) => self.bus.broadcast(PushEvent::Queue(queue)),
            ServerMessage::Options(options) => self.bus.broadcast(PushEvent::Options(options)),
            ServerMessage::Response(response) => {
                let request = self
                    .pending
                    .lock()
                    .expect("CommandChannel pending mutex poisoned")
                    .remove(&response.seq);
                let Some(request) = request else {
                    debug!(url = %self.url, seq = response.seq, kind = %response.kind, "dropping response to unknown command");
                    return;
                };

                debug!(url = %self.url, seq = response.seq, kind = %response.kind, "RX response");
                let result = if response.is_error() {
                    Err(CastError::remote(request.command, response.error_message()))
                } else if response.kind != request.command {
                    Err(CastError::protocol_violation(
                        request.command,
                        format!("unexpected response kind {}", response.kind),
                    ))
                } else {
                    Ok(response.data)
                };
                let _ = request.reply.send(result);
            }
        }
    }
}
