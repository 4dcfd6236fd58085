use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::CreateAck;

/// A message payload as the backend actually sends it: field names vary by
/// backend version and event shape, and any of them may be missing. This is
/// the only type allowed to model that mess; everything downstream works on
/// canonical `Message`/`Attachment` values.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawMessage {
    #[serde(alias = "id_mensaje", alias = "messageId", alias = "_id", default)]
    pub id: Option<String>,
    #[serde(alias = "contenido", alias = "mensaje", alias = "texto", default)]
    pub content: Option<String>,
    #[serde(
        alias = "id_miembro_emisor",
        alias = "emisor",
        alias = "emitterId",
        alias = "senderId",
        default
    )]
    pub emitter_id: Option<String>,
    #[serde(alias = "tipo_miembro", alias = "participantType", default)]
    pub participant_type: Option<String>,
    #[serde(alias = "client_session", alias = "clientSession", default)]
    pub client_session: Option<String>,
    #[serde(
        alias = "fecha",
        alias = "createdAt",
        alias = "created_at",
        alias = "timestamp",
        default
    )]
    pub at: Option<Value>,
    #[serde(alias = "id_chat", alias = "chatId", default)]
    pub chat_id: Option<String>,
    /// Everything else, kept for the attachment normalizer.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl RawMessage {
    /// Timestamp as an RFC3339 string, when one can be made out of the wire
    /// value (string passthrough, or integer epoch millis/seconds).
    pub fn at_string(&self) -> Option<String> {
        match self.at.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => {
                let n = n.as_i64()?;
                let dt = if n > 10_000_000_000 {
                    DateTime::<Utc>::from_timestamp_millis(n)?
                } else {
                    DateTime::<Utc>::from_timestamp(n, 0)?
                };
                Some(dt.to_rfc3339())
            }
            _ => None,
        }
    }

    pub fn parsed_at(&self) -> Option<DateTime<Utc>> {
        let s = self.at_string()?;
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    /// The untyped remainder as a JSON value, for attachment probing.
    pub fn extra_value(&self) -> Value {
        Value::Object(self.extra.clone())
    }
}

#[derive(Debug, Deserialize)]
struct ReadWire {
    #[serde(alias = "id_chat", alias = "chatId", default)]
    chat_id: Option<String>,
    #[serde(
        alias = "id_miembro",
        alias = "readerParticipantId",
        alias = "participantId",
        default
    )]
    reader_participant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TypingWire {
    #[serde(alias = "id_chat", alias = "chatId", default)]
    chat_id: Option<String>,
    #[serde(alias = "escribiendo", alias = "active", default = "default_on")]
    on: bool,
    #[serde(alias = "client_session", alias = "clientSession", default)]
    client_session: Option<String>,
    #[serde(
        alias = "id_miembro_emisor",
        alias = "senderParticipantId",
        default
    )]
    sender_participant_id: Option<String>,
}

fn default_on() -> bool {
    true
}

// ── Server → Client Events ──

#[derive(Debug)]
pub enum ServerEvent {
    NewMessage(RawMessage),
    MessageRead {
        chat_id: Option<String>,
        reader_participant_id: Option<String>,
    },
    Typing {
        chat_id: Option<String>,
        on: bool,
        client_session: Option<String>,
        sender_participant_id: Option<String>,
    },
    ChatCreated(CreateAck),
    /// Any event whose name suggests a file/attachment arrival. Deployments
    /// differ on the exact event name, so these are matched by name pattern
    /// and carry the raw payload for the normalizer.
    FileActivity(Value),
}

fn file_event_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new("(?i)file|upload|attachment|archivo|adjunto").expect("static pattern")
    })
}

/// Decode one pushed event into a typed variant. Returns `None` for event
/// names this client does not consume.
pub fn decode_push(event_name: &str, data: Value) -> Option<ServerEvent> {
    match event_name {
        "chat.message" | "message.new" | "nuevo_mensaje" => {
            match serde_json::from_value::<RawMessage>(data) {
                Ok(raw) => Some(ServerEvent::NewMessage(raw)),
                Err(e) => {
                    tracing::warn!("undecodable message push: {}", e);
                    None
                }
            }
        }
        "chat.read" | "message.read" | "mensajes_leidos" => {
            let wire: ReadWire = serde_json::from_value(data).unwrap_or(ReadWire {
                chat_id: None,
                reader_participant_id: None,
            });
            Some(ServerEvent::MessageRead {
                chat_id: wire.chat_id,
                reader_participant_id: wire.reader_participant_id,
            })
        }
        "chat.typing" | "typing" | "escribiendo" => {
            let wire: TypingWire = serde_json::from_value(data).ok()?;
            Some(ServerEvent::Typing {
                chat_id: wire.chat_id,
                on: wire.on,
                client_session: wire.client_session,
                sender_participant_id: wire.sender_participant_id,
            })
        }
        "chat.created" | "chat_creado" => match serde_json::from_value::<CreateAck>(data) {
            Ok(ack) => Some(ServerEvent::ChatCreated(ack)),
            Err(e) => {
                tracing::warn!("undecodable chat-created push: {}", e);
                None
            }
        },
        other if file_event_pattern().is_match(other) => Some(ServerEvent::FileActivity(data)),
        _ => None,
    }
}
