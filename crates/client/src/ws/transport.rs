//! One authenticated WebSocket connection per mounted chat view.
//!
//! Outbound frames are `{"event": name, "data": payload, "ack": n?}`; the
//! backend replies to acked requests with `{"ack": n, "data": ...}` and
//! pushes events as `{"event": name, "data": ...}`. Connection loss degrades
//! to a `Disconnected` state the owner can watch; reconnection policy is the
//! caller's business, not this adapter's.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aula_shared::constants::{
    JOIN_ACK_TIMEOUT_MS, REQUEST_ACK_TIMEOUT_MS, TOKEN_RETRY_INTERVAL_MS, TOKEN_RETRY_WINDOW_MS,
};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::models::{ChatSummary, ParticipantRef};

use super::events::{
    decode_push, ChatSummaryWire, ClientEvent, CreateAck, JoinAck, ListFilter, SendAck,
    ServerEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Connected,
    Disconnected,
}

#[derive(Debug)]
pub enum TransportError {
    /// No bearer token could be resolved inside the retry window.
    NoToken,
    Connect(String),
    /// The connection closed under the request.
    Closed,
    AckTimeout,
    /// A join is already in flight on this adapter.
    JoinInFlight,
    /// The backend acked with a failure payload.
    Rejected(String),
    Decode(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::NoToken => write!(f, "no auth token resolved"),
            TransportError::Connect(e) => write!(f, "connect failed: {}", e),
            TransportError::Closed => write!(f, "connection closed"),
            TransportError::AckTimeout => write!(f, "ack timed out"),
            TransportError::JoinInFlight => write!(f, "join already in flight"),
            TransportError::Rejected(msg) => write!(f, "rejected by backend: {}", msg),
            TransportError::Decode(e) => write!(f, "undecodable ack payload: {}", e),
        }
    }
}

impl std::error::Error for TransportError {}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

pub struct Transport {
    out_tx: mpsc::UnboundedSender<WsMessage>,
    pending: PendingMap,
    next_ack: AtomicU64,
    joining: AtomicBool,
    state_rx: watch::Receiver<ConnState>,
}

impl Transport {
    /// Resolve a token (retrying inside the bounded window, since it may not
    /// be available at mount time), then open the connection with it.
    pub async fn connect<F>(
        ws_url: &str,
        resolve_token: F,
    ) -> Result<(Transport, mpsc::UnboundedReceiver<ServerEvent>), TransportError>
    where
        F: Fn() -> Option<String>,
    {
        let deadline =
            tokio::time::Instant::now() + Duration::from_millis(TOKEN_RETRY_WINDOW_MS);
        let token = loop {
            if let Some(t) = resolve_token().filter(|t| !t.is_empty()) {
                break t;
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(TransportError::NoToken);
            }
            tokio::time::sleep(Duration::from_millis(TOKEN_RETRY_INTERVAL_MS)).await;
        };

        let mut url =
            url::Url::parse(ws_url).map_err(|e| TransportError::Connect(e.to_string()))?;
        url.query_pairs_mut().append_pair("token", &token);
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<WsMessage>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<ServerEvent>();
        let (state_tx, state_rx) = watch::channel(ConnState::Connected);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        // Forward queued frames onto the socket.
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if sink.send(msg).await.is_err() {
                    break;
                }
            }
        });

        // Route incoming frames: ack replies to their waiters, pushes to the
        // event stream.
        let pending_reader = Arc::clone(&pending);
        tokio::spawn(async move {
            while let Some(Ok(msg)) = source.next().await {
                match msg {
                    WsMessage::Text(text) => {
                        route_frame(text.as_str(), &pending_reader, &event_tx).await;
                    }
                    WsMessage::Close(_) => break,
                    _ => {}
                }
            }
            let _ = state_tx.send(ConnState::Disconnected);
            // Waiters on a dead connection get a Closed error, not a hang.
            pending_reader.lock().await.clear();
        });

        Ok((
            Transport {
                out_tx,
                pending,
                next_ack: AtomicU64::new(0),
                joining: AtomicBool::new(false),
                state_rx,
            },
            event_rx,
        ))
    }

    pub fn state(&self) -> watch::Receiver<ConnState> {
        self.state_rx.clone()
    }

    pub fn is_connected(&self) -> bool {
        *self.state_rx.borrow() == ConnState::Connected
    }

    async fn request(
        &self,
        event: ClientEvent,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        let ack = self.next_ack.fetch_add(1, Ordering::SeqCst) + 1;
        let mut frame =
            serde_json::to_value(&event).map_err(|e| TransportError::Decode(e.to_string()))?;
        let Some(obj) = frame.as_object_mut() else {
            return Err(TransportError::Decode("frame is not an object".into()));
        };
        obj.insert("ack".into(), Value::from(ack));

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(ack, tx);

        let text = frame.to_string();
        if self.out_tx.send(WsMessage::Text(text.into())).is_err() {
            self.pending.lock().await.remove(&ack);
            return Err(TransportError::Closed);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&ack);
                Err(TransportError::AckTimeout)
            }
        }
    }

    fn emit(&self, event: &ClientEvent) {
        match serde_json::to_string(event) {
            Ok(text) => {
                let _ = self.out_tx.send(WsMessage::Text(text.into()));
            }
            Err(e) => tracing::warn!("unserializable event: {}", e),
        }
    }

    /// Join a conversation and fetch its participant set and recent history.
    /// Idempotent server-side; overlapping calls on one adapter are refused.
    pub async fn join(&self, chat_id: &str) -> Result<JoinAck, TransportError> {
        if self.joining.swap(true, Ordering::SeqCst) {
            return Err(TransportError::JoinInFlight);
        }
        let result = self
            .request(
                ClientEvent::Join {
                    chat_id: chat_id.to_string(),
                },
                Duration::from_millis(JOIN_ACK_TIMEOUT_MS),
            )
            .await;
        self.joining.store(false, Ordering::SeqCst);

        let value = result?;
        if value.get("success").and_then(Value::as_bool) == Some(false) {
            return Err(TransportError::Rejected(reject_reason(&value)));
        }
        serde_json::from_value(value).map_err(|e| TransportError::Decode(e.to_string()))
    }

    pub async fn send_message(
        &self,
        chat_id: &str,
        sender_participant_id: &str,
        content: &str,
        session_tag: &str,
    ) -> Result<SendAck, TransportError> {
        let value = self
            .request(
                ClientEvent::SendMessage {
                    chat_id: chat_id.to_string(),
                    sender_participant_id: sender_participant_id.to_string(),
                    content: content.to_string(),
                    client_session: session_tag.to_string(),
                },
                Duration::from_millis(REQUEST_ACK_TIMEOUT_MS),
            )
            .await?;
        serde_json::from_value(value).map_err(|e| TransportError::Decode(e.to_string()))
    }

    /// Best-effort; no ack, no error surface.
    pub fn send_typing(
        &self,
        chat_id: &str,
        on: bool,
        sender_participant_id: Option<&str>,
        session_tag: &str,
    ) {
        self.emit(&ClientEvent::Typing {
            chat_id: chat_id.to_string(),
            on,
            sender_participant_id: sender_participant_id.map(str::to_string),
            client_session: session_tag.to_string(),
        });
    }

    pub fn read_all(&self, chat_id: &str, reader_participant_id: Option<&str>) {
        self.emit(&ClientEvent::ReadAll {
            chat_id: chat_id.to_string(),
            reader_participant_id: reader_participant_id.map(str::to_string),
        });
    }

    pub async fn list_chats(
        &self,
        filter: &ListFilter,
    ) -> Result<Vec<ChatSummary>, TransportError> {
        let value = self
            .request(
                ClientEvent::ListChats {
                    participant_type: filter.participant_kind,
                    external_id: filter.external_id.clone(),
                    include_participants: filter.include_participants,
                },
                Duration::from_millis(REQUEST_ACK_TIMEOUT_MS),
            )
            .await?;

        let list = if value.is_array() {
            value
        } else {
            value
                .get("chats")
                .or_else(|| value.get("data"))
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new()))
        };
        let wires: Vec<ChatSummaryWire> =
            serde_json::from_value(list).map_err(|e| TransportError::Decode(e.to_string()))?;
        Ok(wires.into_iter().map(ChatSummaryWire::into_summary).collect())
    }

    /// Create a conversation. Backend versions register the handler under two
    /// different event names, so the legacy one is tried when the current one
    /// goes unanswered.
    pub async fn create_chat(
        &self,
        participants: &[ParticipantRef],
    ) -> Result<CreateAck, TransportError> {
        let current = self
            .request(
                ClientEvent::CreateChat {
                    participants: participants.to_vec(),
                },
                Duration::from_millis(REQUEST_ACK_TIMEOUT_MS),
            )
            .await;
        let value = match current {
            Ok(v) => v,
            Err(TransportError::AckTimeout) | Err(TransportError::Rejected(_)) => {
                self.request(
                    ClientEvent::CreateChatLegacy {
                        participants: participants.to_vec(),
                    },
                    Duration::from_millis(REQUEST_ACK_TIMEOUT_MS),
                )
                .await?
            }
            Err(e) => return Err(e),
        };
        if value.get("success").and_then(Value::as_bool) == Some(false) {
            return Err(TransportError::Rejected(reject_reason(&value)));
        }
        serde_json::from_value(value).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

async fn route_frame(
    text: &str,
    pending: &PendingMap,
    events: &mpsc::UnboundedSender<ServerEvent>,
) {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!("unparseable frame: {}", e);
            return;
        }
    };

    if value.get("event").is_none() {
        if let Some(ack) = value.get("ack").and_then(Value::as_u64) {
            if let Some(tx) = pending.lock().await.remove(&ack) {
                let data = value.get("data").cloned().unwrap_or(Value::Null);
                let _ = tx.send(data);
            }
        }
        return;
    }

    if let Some(name) = value.get("event").and_then(Value::as_str) {
        let data = value.get("data").cloned().unwrap_or(Value::Null);
        if let Some(ev) = decode_push(name, data) {
            let _ = events.send(ev);
        }
    }
}

fn reject_reason(value: &Value) -> String {
    value
        .get("error")
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("unspecified")
        .to_string()
}
