use serde::{Deserialize, Serialize};

use super::SenderRole;

/// Wire-level participant type. The backend models every conversation as one
/// "cliente" (the student) plus "equipo" members (coach/support side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantKind {
    Cliente,
    Equipo,
    Admin,
}

impl ParticipantKind {
    pub fn parse(raw: &str) -> Option<ParticipantKind> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cliente" | "client" | "student" => Some(ParticipantKind::Cliente),
            "equipo" | "team" | "coach" | "support" => Some(ParticipantKind::Equipo),
            "admin" => Some(ParticipantKind::Admin),
            _ => None,
        }
    }

    pub fn role(&self) -> SenderRole {
        match self {
            ParticipantKind::Cliente => SenderRole::Student,
            ParticipantKind::Equipo => SenderRole::Coach,
            ParticipantKind::Admin => SenderRole::Admin,
        }
    }
}

impl SenderRole {
    pub fn kind(&self) -> ParticipantKind {
        match self {
            SenderRole::Student => ParticipantKind::Cliente,
            SenderRole::Coach => ParticipantKind::Equipo,
            SenderRole::Admin => ParticipantKind::Admin,
        }
    }
}

/// A desired participant: what the client asks the backend to match or create.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantRef {
    #[serde(rename = "type")]
    pub kind: ParticipantKind,
    #[serde(rename = "externalId", alias = "id_externo")]
    pub external_id: String,
}

/// A resolved participant inside a joined conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub kind: ParticipantKind,
    pub external_id: String,
    pub participant_id: String,
}

impl Participant {
    pub fn to_ref(&self) -> ParticipantRef {
        ParticipantRef {
            kind: self.kind,
            external_id: self.external_id.clone(),
        }
    }
}

/// Client-side partition of conversations by coach category. Purely a local
/// filter; the backend is unaware of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelTag {
    Support,
    Vsl,
}

/// Sidebar summary of one conversation. `participants` is `None` when the
/// backend omitted them and a join-probe would be needed to learn them.
#[derive(Debug, Clone)]
pub struct ChatSummary {
    pub chat_id: String,
    pub participants: Option<Vec<Participant>>,
    pub last_activity: Option<String>,
}

/// Who the local user is within the chat system.
#[derive(Debug, Clone)]
pub struct LocalIdentity {
    pub role: SenderRole,
    pub external_id: String,
    /// Opaque per-tab tag attached to outgoing sends for self-echo matching.
    pub session_tag: String,
}

impl LocalIdentity {
    pub fn new(role: SenderRole, external_id: impl Into<String>) -> LocalIdentity {
        LocalIdentity {
            role,
            external_id: external_id.into(),
            session_tag: nanoid::nanoid!(),
        }
    }
}
