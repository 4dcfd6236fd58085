//! Sender attribution: decide which conversational side a message belongs to.
//!
//! The backend does not put a trustworthy author id on every event shape, and
//! optimistic local sends must reconcile with their server echo without
//! flipping sides. Classification runs an ordered list of pure rules; the
//! first rule to return a value wins, and the winning rule is recorded on the
//! message so later merges can rank classifications by confidence.
//!
//! The explicit emitter id is the only fully trusted signal. Realtime pushes
//! are treated conservatively: a backend may echo a session tag that belongs
//! to the receiving side, so in realtime context the weaker heuristics are
//! not consulted at all and an unattributed message is assumed to come from
//! the other party. The heuristic bundle (outbox, upload shape, session tag)
//! only applies when reconciling history and polls, where misattributing a
//! known local send is the greater risk.

use chrono::{DateTime, Utc};

use crate::models::{Attachment, AttributionRule, ParticipantKind, SenderRole};
use crate::ws::events::RawMessage;

use super::outbox::Outbox;
use super::uploads::{RecentUploads, UploadShape};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Mine,
    Theirs,
}

/// Where the message being classified came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributionContext {
    /// Live push over the socket.
    Realtime,
    /// Initial history from a join response.
    Join,
    /// Periodic re-sync.
    Poll,
    /// Local composition.
    User,
}

impl AttributionContext {
    fn is_realtime(&self) -> bool {
        matches!(self, AttributionContext::Realtime)
    }
}

/// Local context the rules read. All borrowed; the rules never mutate.
pub struct LocalSignals<'a> {
    pub my_participant_id: Option<&'a str>,
    pub my_role: SenderRole,
    pub session_tag: &'a str,
    pub outbox: &'a Outbox,
    pub uploads: &'a RecentUploads,
    /// Exactly one cliente and one equipo participant.
    pub two_party: bool,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribution {
    pub side: Side,
    pub role: SenderRole,
    pub rule: AttributionRule,
}

impl Attribution {
    fn mine(local: &LocalSignals, rule: AttributionRule) -> Attribution {
        Attribution {
            side: Side::Mine,
            role: local.my_role,
            rule,
        }
    }

    fn theirs(local: &LocalSignals, rule: AttributionRule) -> Attribution {
        Attribution {
            side: Side::Theirs,
            role: local.my_role.counterpart(),
            rule,
        }
    }
}

type Rule = fn(
    &RawMessage,
    Option<&[Attachment]>,
    AttributionContext,
    &LocalSignals,
) -> Option<Attribution>;

/// Priority-ordered; evaluation stops at the first rule that returns a value.
/// `rule_fallback` always returns one.
const RULES: &[Rule] = &[
    rule_emitter_id,
    rule_realtime,
    rule_outbox,
    rule_upload_shape,
    rule_session_tag,
    rule_participant_type,
    rule_fallback,
];

pub fn attribute(
    msg: &RawMessage,
    attachments: Option<&[Attachment]>,
    ctx: AttributionContext,
    local: &LocalSignals,
) -> Attribution {
    for rule in RULES {
        if let Some(att) = rule(msg, attachments, ctx, local) {
            return att;
        }
    }
    unreachable!("fallback rule always classifies")
}

/// (1) Explicit emitter id. Trusted in every context, in both directions.
fn rule_emitter_id(
    msg: &RawMessage,
    _attachments: Option<&[Attachment]>,
    _ctx: AttributionContext,
    local: &LocalSignals,
) -> Option<Attribution> {
    let emitter = msg.emitter_id.as_deref().filter(|s| !s.is_empty())?;
    let mine = local.my_participant_id?;
    if emitter == mine {
        Some(Attribution::mine(local, AttributionRule::EmitterId))
    } else {
        Some(Attribution {
            side: Side::Theirs,
            role: typed_role(msg).unwrap_or(local.my_role.counterpart()),
            rule: AttributionRule::EmitterId,
        })
    }
}

/// (2) Realtime context: accept an explicit participant-type field, otherwise
/// assume the other party. The session-tag and upload heuristics are
/// deliberately not consulted here.
fn rule_realtime(
    msg: &RawMessage,
    _attachments: Option<&[Attachment]>,
    ctx: AttributionContext,
    local: &LocalSignals,
) -> Option<Attribution> {
    if !ctx.is_realtime() {
        return None;
    }
    if let Some(role) = typed_role(msg) {
        return Some(Attribution {
            side: side_of(role, local.my_role),
            role,
            rule: AttributionRule::ParticipantType,
        });
    }
    Some(Attribution::theirs(local, AttributionRule::RealtimeDefault))
}

/// A message carrying some other tab's session tag declared itself foreign;
/// the self-heuristics must not claim it.
fn foreign_tag(msg: &RawMessage, local: &LocalSignals) -> bool {
    matches!(msg.client_session.as_deref(), Some(tag) if !tag.is_empty() && tag != local.session_tag)
}

/// (3a) A queued unconfirmed send with the same text inside the time window.
fn rule_outbox(
    msg: &RawMessage,
    _attachments: Option<&[Attachment]>,
    _ctx: AttributionContext,
    local: &LocalSignals,
) -> Option<Attribution> {
    if foreign_tag(msg, local) {
        return None;
    }
    let text = msg.text();
    if text.is_empty() {
        return None;
    }
    if local.outbox.matches_text(text, msg.parsed_at(), local.now) {
        Some(Attribution::mine(local, AttributionRule::OutboxMatch))
    } else {
        None
    }
}

/// (3b) Attachment shape matches a recent local upload.
fn rule_upload_shape(
    msg: &RawMessage,
    attachments: Option<&[Attachment]>,
    _ctx: AttributionContext,
    local: &LocalSignals,
) -> Option<Attribution> {
    if foreign_tag(msg, local) {
        return None;
    }
    let shape = UploadShape::of_attachments(attachments?)?;
    if local.uploads.matches(&shape, local.now) {
        Some(Attribution::mine(local, AttributionRule::UploadShape))
    } else {
        None
    }
}

/// (3c) Session tag, only when corroborated by recent outbox or upload
/// activity. A bare tag match is not trusted: backends have been seen echoing
/// the receiver's own tag on foreign messages.
fn rule_session_tag(
    msg: &RawMessage,
    _attachments: Option<&[Attachment]>,
    _ctx: AttributionContext,
    local: &LocalSignals,
) -> Option<Attribution> {
    let tag = msg.client_session.as_deref().filter(|s| !s.is_empty())?;
    if tag != local.session_tag {
        return None;
    }
    if local.outbox.has_activity_within(local.now) || local.uploads.has_activity_within(local.now)
    {
        Some(Attribution::mine(local, AttributionRule::SessionTag))
    } else {
        None
    }
}

/// (3d) Explicit participant-type field.
fn rule_participant_type(
    msg: &RawMessage,
    _attachments: Option<&[Attachment]>,
    _ctx: AttributionContext,
    local: &LocalSignals,
) -> Option<Attribution> {
    let role = typed_role(msg)?;
    Some(Attribution {
        side: side_of(role, local.my_role),
        role,
        rule: AttributionRule::ParticipantType,
    })
}

/// (3e) No signal left: the other party. An attachment-only message in a
/// strict two-party chat is tagged separately so downstream can tell the
/// cases apart, but lands on the same side.
fn rule_fallback(
    msg: &RawMessage,
    attachments: Option<&[Attachment]>,
    _ctx: AttributionContext,
    local: &LocalSignals,
) -> Option<Attribution> {
    let attachment_only =
        msg.text().is_empty() && attachments.map(|a| !a.is_empty()).unwrap_or(false);
    if attachment_only && local.two_party {
        Some(Attribution::theirs(
            local,
            AttributionRule::AttachmentOnlyOther,
        ))
    } else {
        Some(Attribution::theirs(local, AttributionRule::FallbackOther))
    }
}

fn typed_role(msg: &RawMessage) -> Option<SenderRole> {
    msg.participant_type
        .as_deref()
        .and_then(ParticipantKind::parse)
        .map(|k| k.role())
}

fn side_of(role: SenderRole, my_role: SenderRole) -> Side {
    if role == my_role {
        Side::Mine
    } else {
        Side::Theirs
    }
}
