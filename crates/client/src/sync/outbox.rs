use aula_shared::constants::{OUTBOX_MATCH_WINDOW_SECS, SEND_STALL_TIMEOUT_SECS};
use chrono::{DateTime, Duration, Utc};

use super::uploads::UploadShape;

/// A locally-sent, not-yet-confirmed message.
#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub client_id: String,
    pub text: String,
    pub shape: Option<UploadShape>,
    pub session_tag: String,
    pub sent_at: DateTime<Utc>,
    pub resolved_participant_id: Option<String>,
    /// The send ack arrived; the entry stays queued only so the eventual
    /// echo can still be claimed by session tag instead of duplicating.
    pub acked: bool,
    pub failed: bool,
}

/// Index of in-flight optimistic sends, keyed by client id and session tag.
/// Entries age out of matching after [`OUTBOX_MATCH_WINDOW_SECS`]; a server
/// echo arriving later renders as a separate delivered-unknown entry.
#[derive(Debug, Default)]
pub struct Outbox {
    entries: Vec<OutboxEntry>,
}

fn within_window(sent_at: DateTime<Utc>, reference: DateTime<Utc>) -> bool {
    let delta = reference.signed_duration_since(sent_at);
    delta.abs() <= Duration::seconds(OUTBOX_MATCH_WINDOW_SECS)
}

impl Outbox {
    pub fn new() -> Outbox {
        Outbox::default()
    }

    pub fn enqueue(&mut self, entry: OutboxEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read-only probe used by attribution: does some queued send match this
    /// text within the window around `msg_at` (or `now` when the message has
    /// no usable timestamp)?
    pub fn matches_text(
        &self,
        text: &str,
        msg_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        let reference = msg_at.unwrap_or(now);
        self.entries
            .iter()
            .any(|e| !e.failed && e.text == text && within_window(e.sent_at, reference))
    }

    /// Any unconfirmed send inside the matching window. Used to corroborate a
    /// session-tag signal, which is never trusted alone.
    pub fn has_activity_within(&self, now: DateTime<Utc>) -> bool {
        self.entries
            .iter()
            .any(|e| within_window(e.sent_at, now))
    }

    /// Claim the entry a server message confirms, strongest signal first:
    /// session-tag equality, then identical text + attachment shape inside
    /// the window.
    pub fn take_reconcile(
        &mut self,
        session_tag: Option<&str>,
        text: &str,
        shape: Option<&UploadShape>,
        msg_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<OutboxEntry> {
        // The tag is per-tab, not per-message, so it still needs text (and
        // shape, when both sides have one) to pick the right entry.
        if let Some(tag) = session_tag {
            let shape_ok = |e: &OutboxEntry| match (e.shape.as_ref(), shape) {
                (None, None) => true,
                (Some(a), Some(b)) => a.matches(b),
                _ => false,
            };
            let pos = self
                .entries
                .iter()
                .position(|e| e.session_tag == tag && e.text == text && shape_ok(e))
                .or_else(|| {
                    self.entries
                        .iter()
                        .position(|e| e.session_tag == tag && e.text == text)
                });
            if let Some(pos) = pos {
                return Some(self.entries.remove(pos));
            }
        }

        let reference = msg_at.unwrap_or(now);
        let pos = self.entries.iter().position(|e| {
            if e.failed || !within_window(e.sent_at, reference) {
                return false;
            }
            if e.text != text {
                return false;
            }
            match (e.shape.as_ref(), shape) {
                (None, None) => true,
                (Some(a), Some(b)) => a.matches(b),
                _ => false,
            }
        })?;
        Some(self.entries.remove(pos))
    }

    /// Remove an entry, e.g. when its send ack reported failure.
    pub fn remove(&mut self, client_id: &str) -> Option<OutboxEntry> {
        let pos = self.entries.iter().position(|e| e.client_id == client_id)?;
        Some(self.entries.remove(pos))
    }

    /// Record that the send ack arrived for an entry.
    pub fn mark_acked(&mut self, client_id: &str) {
        if let Some(e) = self.entries.iter_mut().find(|e| e.client_id == client_id) {
            e.acked = true;
        }
    }

    /// Entries past the stall timeout with no ack. Each is reported once and
    /// marked failed; there is no automatic retry.
    pub fn stalled(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let timeout = Duration::seconds(SEND_STALL_TIMEOUT_SECS);
        let mut out = Vec::new();
        for entry in &mut self.entries {
            if !entry.acked
                && !entry.failed
                && now.signed_duration_since(entry.sent_at) >= timeout
            {
                entry.failed = true;
                out.push(entry.client_id.clone());
            }
        }
        out
    }

    /// Drop entries too old to ever match again.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let horizon = Duration::seconds(SEND_STALL_TIMEOUT_SECS.max(OUTBOX_MATCH_WINDOW_SECS) * 2);
        self.entries
            .retain(|e| now.signed_duration_since(e.sent_at) < horizon);
    }
}
