//! Per-room session state: join-or-create lifecycle, channel switching, and
//! the single ingest path that join history, poll re-syncs, and realtime
//! pushes all flow through.

use std::collections::HashSet;
use std::time::Instant;

use aula_shared::validation;
use chrono::{DateTime, Duration, Utc};

use crate::files::PendingFile;
use crate::models::{
    Attachment, AttachmentContent, AttributionRule, ChannelTag, ChatSummary, Delivery,
    LocalIdentity, Message, Participant, ParticipantKind, ParticipantRef,
};
use crate::ws::events::{CreateAck, JoinAck, RawMessage, SendAck, WireParticipant};
use crate::ws::normalize;

use super::attribution::{attribute, AttributionContext, LocalSignals, Side};
use super::outbox::{Outbox, OutboxEntry};
use super::poller::PollGate;
use super::uploads::{RecentUploads, UploadShape};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Resolving,
    Creating,
    Joined,
}

/// What the owner should do next after a resolution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveAction {
    Join(String),
    Create(Vec<ParticipantRef>),
    /// No match and creation is not permitted for this role; the chat will be
    /// created lazily at the first send.
    Wait,
}

/// Everything the transport needs to put a text send on the wire.
#[derive(Debug, Clone)]
pub struct SendPlan {
    pub client_id: String,
    pub chat_id: Option<String>,
    /// Set when no chat exists yet and one must be created before sending.
    pub needs_create: Option<Vec<ParticipantRef>>,
    pub content: String,
    pub sender_participant_id: Option<String>,
    pub session_tag: String,
}

#[derive(Debug, Clone)]
pub struct FileSendPlan {
    pub client_id: String,
    pub chat_id: Option<String>,
    pub needs_create: Option<Vec<ParticipantRef>>,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct IngestOutcome {
    /// A message was appended (as opposed to merged into an existing one).
    pub appended: bool,
    pub side: Side,
}

pub struct SessionController {
    identity: LocalIdentity,
    room: String,
    channel: ChannelTag,
    desired: Vec<ParticipantRef>,
    phase: SessionPhase,
    chat_id: Option<String>,
    my_participant_id: Option<String>,
    participants: Vec<Participant>,
    messages: Vec<Message>,
    /// Ids this client invented for id-less pushes; a later server copy of
    /// the same content may upgrade them to the real id.
    synthetic_ids: HashSet<String>,
    outbox: Outbox,
    uploads: RecentUploads,
    poll_gate: PollGate,
    peer_typing_until: Option<DateTime<Utc>>,
}

impl SessionController {
    pub fn new(
        identity: LocalIdentity,
        room: impl Into<String>,
        channel: ChannelTag,
        desired: Vec<ParticipantRef>,
    ) -> SessionController {
        let poll_gate = PollGate::for_role(identity.role);
        SessionController {
            identity,
            room: room.into(),
            channel,
            desired,
            phase: SessionPhase::Idle,
            chat_id: None,
            my_participant_id: None,
            participants: Vec::new(),
            messages: Vec::new(),
            synthetic_ids: HashSet::new(),
            outbox: Outbox::new(),
            uploads: RecentUploads::new(),
            poll_gate,
            peer_typing_until: None,
        }
    }

    // ── Accessors ──

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    pub fn my_participant_id(&self) -> Option<&str> {
        self.my_participant_id.as_deref()
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn channel(&self) -> ChannelTag {
        self.channel
    }

    pub fn session_tag(&self) -> &str {
        &self.identity.session_tag
    }

    pub fn can_create(&self) -> bool {
        self.identity.role != crate::models::SenderRole::Student
    }

    /// Exactly one cliente and one equipo participant.
    fn is_two_party(&self) -> bool {
        self.participants.len() == 2
            && self
                .participants
                .iter()
                .filter(|p| p.kind == ParticipantKind::Cliente)
                .count()
                == 1
            && self
                .participants
                .iter()
                .filter(|p| p.kind == ParticipantKind::Equipo)
                .count()
                == 1
    }

    // ── Lifecycle ──

    pub fn begin_resolve(&mut self) {
        self.phase = SessionPhase::Resolving;
    }

    /// Pick the conversation matching the desired participant set. An exact
    /// set match always beats a subset match; the subset fallback tolerates
    /// chats that have accrued extra participants server-side.
    pub fn resolve(&mut self, summaries: &[ChatSummary]) -> ResolveAction {
        self.phase = SessionPhase::Resolving;
        let desired = self.desired_set();

        let exact = summaries.iter().find(|s| {
            s.participants
                .as_deref()
                .map(|ps| participant_set(ps) == desired)
                .unwrap_or(false)
        });
        let found = exact.or_else(|| {
            summaries.iter().find(|s| {
                s.participants
                    .as_deref()
                    .map(|ps| desired.is_subset(&participant_set(ps)))
                    .unwrap_or(false)
            })
        });

        if let Some(summary) = found {
            return ResolveAction::Join(summary.chat_id.clone());
        }
        if self.can_create() {
            self.phase = SessionPhase::Creating;
            ResolveAction::Create(self.desired.clone())
        } else {
            // Students never create threads from navigation alone.
            ResolveAction::Wait
        }
    }

    pub fn apply_join(&mut self, ack: JoinAck, now: DateTime<Utc>) {
        self.chat_id = Some(ack.chat_id);
        self.participants = ack
            .participants
            .into_iter()
            .map(WireParticipant::into_participant)
            .collect();
        self.my_participant_id = ack
            .my_participant_id
            .filter(|s| !s.is_empty())
            .or_else(|| self.find_own_participant_id());

        // History replaces everything except in-flight optimistic sends,
        // which survive to be reconciled against the history itself.
        self.messages.retain(|m| m.delivery == Delivery::Pending);
        self.synthetic_ids.clear();
        for raw in ack.messages {
            self.ingest(raw, AttributionContext::Join, now);
        }
        self.phase = SessionPhase::Joined;
    }

    /// Periodic re-sync: same join response shape, but merged into the
    /// existing list instead of replacing it, and attributed under the poll
    /// context.
    pub fn apply_resync(&mut self, ack: JoinAck, now: DateTime<Utc>) {
        if self.chat_id.as_deref() != Some(ack.chat_id.as_str()) {
            return;
        }
        if !ack.participants.is_empty() {
            self.participants = ack
                .participants
                .into_iter()
                .map(WireParticipant::into_participant)
                .collect();
        }
        if self.my_participant_id.is_none() {
            self.my_participant_id = ack
                .my_participant_id
                .filter(|s| !s.is_empty())
                .or_else(|| self.find_own_participant_id());
        }
        for raw in ack.messages {
            self.ingest(raw, AttributionContext::Poll, now);
        }
    }

    pub fn apply_created(&mut self, ack: CreateAck) {
        self.chat_id = Some(ack.chat_id);
        self.participants = ack
            .participants
            .into_iter()
            .map(WireParticipant::into_participant)
            .collect();
        self.my_participant_id = self.find_own_participant_id();
        self.phase = SessionPhase::Joined;
    }

    fn find_own_participant_id(&self) -> Option<String> {
        let kind = self.identity.role.kind();
        self.participants
            .iter()
            .find(|p| p.kind == kind && p.external_id == self.identity.external_id)
            .map(|p| p.participant_id.clone())
    }

    /// Change the desired counterpart (e.g. a different coach). Loaded
    /// messages are kept until the new resolution completes so the view never
    /// flashes empty.
    pub fn switch_participants(&mut self, desired: Vec<ParticipantRef>) {
        self.desired = desired;
        self.chat_id = None;
        self.my_participant_id = None;
        self.participants.clear();
        self.phase = SessionPhase::Idle;
    }

    pub fn switch_channel(&mut self, channel: ChannelTag, desired: Vec<ParticipantRef>) {
        self.channel = channel;
        self.switch_participants(desired);
    }

    /// Explicit deletion: wipes local message state and returns to Idle.
    pub fn delete(&mut self) {
        self.messages.clear();
        self.synthetic_ids.clear();
        self.outbox = Outbox::new();
        self.chat_id = None;
        self.my_participant_id = None;
        self.participants.clear();
        self.phase = SessionPhase::Idle;
    }

    fn desired_set(&self) -> HashSet<(ParticipantKind, String)> {
        self.desired
            .iter()
            .map(|r| (r.kind, r.external_id.clone()))
            .collect()
    }

    // ── Sending ──

    pub fn prepare_text_send(
        &mut self,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<SendPlan, String> {
        validation::validate_message_content(text)?;

        let client_id = uuid::Uuid::new_v4().to_string();
        let needs_create = if self.chat_id.is_none() {
            self.phase = SessionPhase::Creating;
            Some(self.desired.clone())
        } else {
            None
        };

        self.messages.push(Message {
            id: client_id.clone(),
            room: self.room.clone(),
            sender: self.identity.role,
            text: text.to_string(),
            attachments: Vec::new(),
            at: now.to_rfc3339(),
            delivery: Delivery::Pending,
            read: false,
            client_session_tag: Some(self.identity.session_tag.clone()),
            attribution: AttributionRule::LocalSend,
        });
        self.outbox.enqueue(OutboxEntry {
            client_id: client_id.clone(),
            text: text.to_string(),
            shape: None,
            session_tag: self.identity.session_tag.clone(),
            sent_at: now,
            resolved_participant_id: self.my_participant_id.clone(),
            acked: false,
            failed: false,
        });

        Ok(SendPlan {
            client_id,
            chat_id: self.chat_id.clone(),
            needs_create,
            content: text.to_string(),
            sender_participant_id: self.my_participant_id.clone(),
            session_tag: self.identity.session_tag.clone(),
        })
    }

    /// Queue an attachment-only message for files that already passed the
    /// size check. The optimistic attachments stand in until a realtime or
    /// poll reconciliation confirms the upload.
    pub fn prepare_file_send(
        &mut self,
        files: &[PendingFile],
        now: DateTime<Utc>,
    ) -> Result<FileSendPlan, String> {
        if files.is_empty() {
            return Err("No files to send".into());
        }

        let client_id = uuid::Uuid::new_v4().to_string();
        let attachments: Vec<Attachment> = files
            .iter()
            .enumerate()
            .map(|(i, f)| Attachment {
                id: format!("{}:{}", client_id, i),
                name: f.name.clone(),
                mime_type: f.mime.clone(),
                size_bytes: f.bytes.len() as u64,
                created_at: Some(now.to_rfc3339()),
                content: AttachmentContent::Inline(f.to_base64()),
            })
            .collect();
        let shape = UploadShape::of_attachments(&attachments);

        if let Some(shape) = shape {
            self.uploads.record(shape, now);
        }
        self.outbox.enqueue(OutboxEntry {
            client_id: client_id.clone(),
            text: String::new(),
            shape,
            session_tag: self.identity.session_tag.clone(),
            sent_at: now,
            resolved_participant_id: self.my_participant_id.clone(),
            acked: false,
            failed: false,
        });

        let needs_create = if self.chat_id.is_none() {
            self.phase = SessionPhase::Creating;
            Some(self.desired.clone())
        } else {
            None
        };
        let names = files.iter().map(|f| f.name.clone()).collect();

        self.messages.push(Message {
            id: client_id.clone(),
            room: self.room.clone(),
            sender: self.identity.role,
            text: String::new(),
            attachments,
            at: now.to_rfc3339(),
            delivery: Delivery::Pending,
            read: false,
            client_session_tag: Some(self.identity.session_tag.clone()),
            attribution: AttributionRule::LocalSend,
        });

        Ok(FileSendPlan {
            client_id,
            chat_id: self.chat_id.clone(),
            needs_create,
            names,
        })
    }

    pub fn confirm_send_ack(&mut self, client_id: &str, ack: &SendAck) {
        if !ack.success {
            self.outbox.remove(client_id);
            if let Some(m) = self.messages.iter_mut().find(|m| m.id == client_id) {
                m.delivery = Delivery::Failed;
            }
            return;
        }

        if let Some(server_id) = ack.message_id.as_deref().filter(|s| !s.is_empty()) {
            // A realtime echo may have landed before the ack.
            if self.messages.iter().any(|m| m.id == server_id) {
                self.messages.retain(|m| m.id != client_id);
                self.outbox.remove(client_id);
                return;
            }
            if let Some(m) = self.messages.iter_mut().find(|m| m.id == client_id) {
                m.id = server_id.to_string();
                m.delivery = Delivery::Delivered;
            }
        } else if let Some(m) = self.messages.iter_mut().find(|m| m.id == client_id) {
            m.delivery = Delivery::Delivered;
        }
        // Keep the outbox entry so the echo can still be claimed by session
        // tag; it ages out on its own.
        self.outbox.mark_acked(client_id);
    }

    /// Flip sends that never got an ack to a visible failed state.
    pub fn mark_stalled(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let stalled = self.outbox.stalled(now);
        for client_id in &stalled {
            if let Some(m) = self.messages.iter_mut().find(|m| &m.id == client_id) {
                if m.delivery == Delivery::Pending {
                    m.delivery = Delivery::Failed;
                }
            }
        }
        self.outbox.prune(now);
        self.uploads.prune(now);
        stalled
    }

    // ── Ingest: the one reconciliation path ──

    /// Fold one raw server message into the list. Join history, poll
    /// re-syncs, and realtime pushes all come through here; only the
    /// attribution context differs.
    pub fn ingest(
        &mut self,
        raw: RawMessage,
        ctx: AttributionContext,
        now: DateTime<Utc>,
    ) -> IngestOutcome {
        let extra = raw.extra_value();
        let attachments = normalize::normalize(&extra);
        let shape = attachments.as_deref().and_then(UploadShape::of_attachments);

        // Reconcile before attribution: a server copy of one of our own
        // optimistic sends is claimed outright. The session-tag path works in
        // every context; the text+shape window is only trusted outside
        // realtime, and never for a message carrying someone else's tag.
        let tag_is_mine =
            raw.client_session.as_deref() == Some(self.identity.session_tag.as_str());
        let claimed = if tag_is_mine {
            self.outbox.take_reconcile(
                raw.client_session.as_deref(),
                raw.text(),
                shape.as_ref(),
                raw.parsed_at(),
                now,
            )
        } else if raw.client_session.is_none() && ctx != AttributionContext::Realtime {
            self.outbox
                .take_reconcile(None, raw.text(), shape.as_ref(), raw.parsed_at(), now)
        } else {
            None
        };
        if let Some(entry) = claimed {
            // Only the explicit emitter id may override what we already
            // decided locally about the sender.
            let emitter_verdict = match (
                raw.emitter_id.as_deref().filter(|s| !s.is_empty()),
                self.my_participant_id.as_deref(),
            ) {
                (Some(emitter), Some(mine)) => Some(emitter == mine),
                _ => None,
            };
            self.merge_confirmed(&entry.client_id, &raw, attachments, emitter_verdict);
            return IngestOutcome {
                appended: false,
                side: if emitter_verdict == Some(false) {
                    Side::Theirs
                } else {
                    Side::Mine
                },
            };
        }

        let attribution = {
            let signals = LocalSignals {
                my_participant_id: self.my_participant_id.as_deref(),
                my_role: self.identity.role,
                session_tag: &self.identity.session_tag,
                outbox: &self.outbox,
                uploads: &self.uploads,
                two_party: self.is_two_party(),
                now,
            };
            attribute(&raw, attachments.as_deref(), ctx, &signals)
        };

        // Dedupe against what is already rendered.
        if let Some(idx) = self.find_existing(&raw, attribution.role, attachments.as_deref()) {
            // A server copy may finally name a message we rendered under an
            // invented or client id.
            if let Some(sid) = raw.id.as_deref().filter(|s| !s.is_empty()) {
                if self.messages[idx].id != sid {
                    self.synthetic_ids.remove(&self.messages[idx].id);
                    self.messages[idx].id = sid.to_string();
                }
            }
            let existing = &mut self.messages[idx];
            if existing.delivery == Delivery::Pending {
                existing.delivery = Delivery::Delivered;
            }
            // Only the explicit-id rule may correct the sender, and never
            // with less confidence than what we already decided.
            if attribution.rule == AttributionRule::EmitterId
                && attribution.rule.confidence() >= existing.attribution.confidence()
            {
                existing.sender = attribution.role;
                existing.attribution = attribution.rule;
            }
            return IngestOutcome {
                appended: false,
                side: attribution.side,
            };
        }

        // Nothing to render at all: ignore rather than show an empty bubble.
        let has_attachments = attachments.as_deref().map(|a| !a.is_empty()).unwrap_or(false);
        if raw.text().is_empty() && !has_attachments {
            return IngestOutcome {
                appended: false,
                side: attribution.side,
            };
        }

        let id = match raw.id.clone().filter(|s| !s.is_empty()) {
            Some(id) => id,
            None => {
                let invented = uuid::Uuid::new_v4().to_string();
                self.synthetic_ids.insert(invented.clone());
                invented
            }
        };
        self.messages.push(Message {
            id,
            room: self.room.clone(),
            sender: attribution.role,
            text: raw.text().to_string(),
            attachments: attachments.unwrap_or_default(),
            at: raw.at_string().unwrap_or_else(|| now.to_rfc3339()),
            delivery: Delivery::Delivered,
            read: false,
            client_session_tag: raw.client_session.clone(),
            attribution: attribution.rule,
        });
        IngestOutcome {
            appended: true,
            side: attribution.side,
        }
    }

    /// Replace the optimistic entry with the confirmed one: server id wins,
    /// local timestamp and sender stay (no visual reordering), unless the
    /// explicit emitter id says otherwise; that is the one signal allowed to
    /// overrule the local classification.
    fn merge_confirmed(
        &mut self,
        client_id: &str,
        raw: &RawMessage,
        attachments: Option<Vec<Attachment>>,
        emitter_verdict: Option<bool>,
    ) {
        let server_id = raw.id.clone().filter(|s| !s.is_empty());

        // The confirmed copy may already be in the list under its server id
        // (ack landed first); drop the optimistic duplicate then.
        if let Some(ref sid) = server_id {
            if self.messages.iter().any(|m| &m.id == sid)
                && self.messages.iter().any(|m| m.id == client_id)
            {
                self.messages.retain(|m| m.id != client_id);
                return;
            }
        }

        let counterpart = self.identity.role.counterpart();
        let Some(m) = self.messages.iter_mut().find(|m| {
            m.id == client_id || server_id.as_deref() == Some(m.id.as_str())
        }) else {
            return;
        };
        if let Some(sid) = server_id {
            m.id = sid;
        }
        m.delivery = Delivery::Delivered;
        // The server's attachment records (URLs) supersede the inline
        // placeholders that stood in while the upload was in flight.
        if let Some(atts) = attachments.filter(|a| !a.is_empty()) {
            m.attachments = atts;
        }
        match emitter_verdict {
            Some(true) => m.attribution = AttributionRule::EmitterId,
            Some(false) => {
                m.sender = counterpart;
                m.attribution = AttributionRule::EmitterId;
            }
            None => {}
        }
    }

    fn find_existing(
        &self,
        raw: &RawMessage,
        role: crate::models::SenderRole,
        attachments: Option<&[Attachment]>,
    ) -> Option<usize> {
        let raw_id = raw.id.as_deref().filter(|s| !s.is_empty());
        if let Some(id) = raw_id {
            if let Some(idx) = self.messages.iter().position(|m| m.id == id) {
                return Some(idx);
            }
        }
        // Content identity covers the id mismatch cases: a poll re-delivery
        // of an id-less realtime push, or a server-id copy of a message we
        // rendered under an invented/client id. Two distinct messages that
        // both carry server ids never collapse here.
        let text = raw.text();
        let at = raw.parsed_at();
        let shape = attachments.and_then(UploadShape::of_attachments);
        self.messages.iter().position(|m| {
            if raw_id.is_some()
                && !self.synthetic_ids.contains(&m.id)
                && m.delivery != Delivery::Pending
            {
                return false;
            }
            if m.sender != role || m.text != text {
                return false;
            }
            let same_shape = shape == UploadShape::of_attachments(&m.attachments);
            if !same_shape {
                return false;
            }
            match (at, DateTime::parse_from_rfc3339(&m.at)) {
                (Some(a), Ok(b)) => {
                    (a - b.with_timezone(&chrono::Utc)).abs() <= Duration::seconds(2)
                }
                _ => !text.is_empty(),
            }
        })
    }

    // ── Receipts, typing, polling ──

    /// The other side read everything: flip own delivered messages to read.
    pub fn on_read_all(&mut self) {
        for m in &mut self.messages {
            if m.sender == self.identity.role && m.delivery == Delivery::Delivered {
                m.read = true;
            }
        }
    }

    pub fn note_peer_typing(&mut self, on: bool, now: DateTime<Utc>) {
        self.peer_typing_until = if on {
            Some(now + Duration::milliseconds(aula_shared::constants::PEER_TYPING_TTL_MS as i64))
        } else {
            None
        };
    }

    pub fn peer_typing(&self, now: DateTime<Utc>) -> bool {
        self.peer_typing_until.map(|t| now < t).unwrap_or(false)
    }

    pub fn on_realtime_observed(&mut self, now: Instant) {
        self.poll_gate.note_realtime(now);
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        self.poll_gate.interval()
    }

    pub fn should_poll(&self, now: Instant) -> bool {
        self.phase == SessionPhase::Joined && self.poll_gate.should_poll(now)
    }

    pub fn note_polled(&mut self, now: Instant) {
        self.poll_gate.note_polled(now);
    }
}

fn participant_set(participants: &[Participant]) -> HashSet<(ParticipantKind, String)> {
    participants
        .iter()
        .map(|p| (p.kind, p.external_id.clone()))
        .collect()
}
