use serde::{Deserialize, Serialize};

/// Conversational role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    Student,
    Coach,
    Admin,
}

impl SenderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderRole::Student => "student",
            SenderRole::Coach => "coach",
            SenderRole::Admin => "admin",
        }
    }

    /// The role on the opposite side of a two-party conversation.
    pub fn counterpart(&self) -> SenderRole {
        match self {
            SenderRole::Student => SenderRole::Coach,
            SenderRole::Coach | SenderRole::Admin => SenderRole::Student,
        }
    }
}

/// Delivery state of a message in the local list.
///
/// `Pending` is the optimistic in-flight state. `Failed` is entered when a
/// send never receives an ack within the stall window; there is no automatic
/// retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Pending,
    Delivered,
    Failed,
}

/// Which attribution rule classified a message. Recorded on the message so
/// reconciliation can tell a high-confidence classification from a guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributionRule {
    /// Payload carried a participant id matching (or explicitly differing
    /// from) the locally-resolved one.
    EmitterId,
    /// Payload carried an explicit participant-type field.
    ParticipantType,
    /// Matched a locally queued unconfirmed send by text and time window.
    OutboxMatch,
    /// Matched a recently uploaded file by count, size, and mime category.
    UploadShape,
    /// Session tag matched, corroborated by recent outbox/upload activity.
    SessionTag,
    /// Realtime push with no trustworthy signal: assumed the other party.
    RealtimeDefault,
    /// No signal at all: assumed the other party.
    FallbackOther,
    /// Attachment-only message in a strict two-party chat with no other
    /// signal: assumed the other party.
    AttachmentOnlyOther,
    /// Authored locally; never flows through the rule list.
    LocalSend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl AttributionRule {
    pub fn confidence(&self) -> Confidence {
        match self {
            AttributionRule::EmitterId => Confidence::High,
            AttributionRule::LocalSend => Confidence::High,
            AttributionRule::ParticipantType
            | AttributionRule::OutboxMatch
            | AttributionRule::UploadShape
            | AttributionRule::SessionTag => Confidence::Medium,
            AttributionRule::RealtimeDefault
            | AttributionRule::FallbackOther
            | AttributionRule::AttachmentOnlyOther => Confidence::Low,
        }
    }
}

/// Attachment payload: either inline base64 data or a resolvable URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentContent {
    Inline(String),
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub created_at: Option<String>,
    pub content: AttachmentContent,
}

/// Coarse media class used for upload-shape matching. Filenames are never
/// compared (servers rename uploads).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeCategory {
    Image,
    Audio,
    Video,
    Document,
    Other,
}

impl MimeCategory {
    pub fn of(mime: &str) -> MimeCategory {
        let mime = mime.to_ascii_lowercase();
        if mime.starts_with("image/") {
            MimeCategory::Image
        } else if mime.starts_with("audio/") {
            MimeCategory::Audio
        } else if mime.starts_with("video/") {
            MimeCategory::Video
        } else if mime.starts_with("text/")
            || mime.contains("pdf")
            || mime.contains("msword")
            || mime.contains("officedocument")
            || mime.contains("spreadsheet")
        {
            MimeCategory::Document
        } else {
            MimeCategory::Other
        }
    }
}

/// A single entry in the rendered conversation.
///
/// `id` is either server-assigned or a temporary client id replaced on
/// confirmation. Each id appears at most once in a message list; merges never
/// duplicate.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub room: String,
    pub sender: SenderRole,
    pub text: String,
    pub attachments: Vec<Attachment>,
    pub at: String,
    pub delivery: Delivery,
    pub read: bool,
    /// Tab/session that authored the message; used only for self-echo
    /// matching, never as a durable identity.
    pub client_session_tag: Option<String>,
    pub attribution: AttributionRule,
}

impl Message {
    pub fn is_delivered(&self) -> bool {
        self.delivery == Delivery::Delivered
    }
}
