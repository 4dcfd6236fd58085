mod server_event;

pub use server_event::{decode_push, RawMessage, ServerEvent};

use serde::{Deserialize, Serialize};

use crate::models::{ChatSummary, Participant, ParticipantKind, ParticipantRef};

// ── Client → Server Events ──

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "chat.join")]
    Join {
        #[serde(rename = "chatId")]
        chat_id: String,
    },
    #[serde(rename = "chat.message")]
    SendMessage {
        #[serde(rename = "chatId")]
        chat_id: String,
        #[serde(rename = "senderParticipantId")]
        sender_participant_id: String,
        content: String,
        #[serde(rename = "clientSession")]
        client_session: String,
    },
    #[serde(rename = "chat.typing")]
    Typing {
        #[serde(rename = "chatId")]
        chat_id: String,
        on: bool,
        #[serde(rename = "senderParticipantId", skip_serializing_if = "Option::is_none")]
        sender_participant_id: Option<String>,
        #[serde(rename = "clientSession")]
        client_session: String,
    },
    #[serde(rename = "chat.list")]
    ListChats {
        #[serde(rename = "participantType", skip_serializing_if = "Option::is_none")]
        participant_type: Option<ParticipantKind>,
        #[serde(rename = "externalId", skip_serializing_if = "Option::is_none")]
        external_id: Option<String>,
        #[serde(rename = "includeParticipants")]
        include_participants: bool,
    },
    #[serde(rename = "chat.create")]
    CreateChat { participants: Vec<ParticipantRef> },
    /// Older backend versions register the create handler under this name.
    #[serde(rename = "create_chat")]
    CreateChatLegacy { participants: Vec<ParticipantRef> },
    #[serde(rename = "chat.read")]
    ReadAll {
        #[serde(rename = "chatId")]
        chat_id: String,
        #[serde(rename = "readerParticipantId", skip_serializing_if = "Option::is_none")]
        reader_participant_id: Option<String>,
    },
}

impl ClientEvent {
    /// Whether this event expects an ack reply.
    pub fn wants_ack(&self) -> bool {
        !matches!(self, ClientEvent::Typing { .. } | ClientEvent::ReadAll { .. })
    }
}

/// Filter for `chat.list`.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub participant_kind: Option<ParticipantKind>,
    pub external_id: Option<String>,
    pub include_participants: bool,
}

// ── Ack payload shapes ──
//
// Backend versions disagree on field naming (Spanish vs camelCase English),
// so every response shape carries aliases.

#[derive(Debug, Clone, Deserialize)]
pub struct WireParticipant {
    #[serde(alias = "id_miembro", alias = "participantId", alias = "id")]
    pub participant_id: String,
    #[serde(alias = "tipo", alias = "tipo_miembro", alias = "type", default)]
    pub kind: Option<String>,
    #[serde(alias = "id_externo", alias = "externalId", default)]
    pub external_id: Option<String>,
}

impl WireParticipant {
    pub fn into_participant(self) -> Participant {
        Participant {
            kind: self
                .kind
                .as_deref()
                .and_then(ParticipantKind::parse)
                .unwrap_or(ParticipantKind::Equipo),
            external_id: self.external_id.unwrap_or_default(),
            participant_id: self.participant_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JoinAck {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(alias = "id_chat", alias = "chatId")]
    pub chat_id: String,
    #[serde(alias = "id_miembro", alias = "myParticipantId", default)]
    pub my_participant_id: Option<String>,
    #[serde(alias = "miembros", alias = "participantes", default)]
    pub participants: Vec<WireParticipant>,
    #[serde(alias = "mensajes", default)]
    pub messages: Vec<RawMessage>,
}

#[derive(Debug, Deserialize)]
pub struct SendAck {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(alias = "id_mensaje", alias = "messageId", default)]
    pub message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAck {
    #[serde(alias = "id_chat", alias = "chatId")]
    pub chat_id: String,
    #[serde(alias = "miembros", alias = "participantes", default)]
    pub participants: Vec<WireParticipant>,
}

#[derive(Debug, Deserialize)]
pub struct ChatSummaryWire {
    #[serde(alias = "id_chat", alias = "chatId", alias = "id")]
    pub chat_id: String,
    #[serde(alias = "miembros", alias = "participantes", default)]
    pub participants: Option<Vec<WireParticipant>>,
    #[serde(
        alias = "ultima_actividad",
        alias = "lastActivity",
        alias = "updatedAt",
        default
    )]
    pub last_activity: Option<String>,
}

impl ChatSummaryWire {
    pub fn into_summary(self) -> ChatSummary {
        ChatSummary {
            chat_id: self.chat_id,
            participants: self
                .participants
                .map(|ps| ps.into_iter().map(WireParticipant::into_participant).collect()),
            last_activity: self.last_activity,
        }
    }
}

fn default_true() -> bool {
    true
}
