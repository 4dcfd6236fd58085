use std::collections::HashMap;
use std::time::Instant;

use aula_shared::constants::{LIST_ENRICH_LIMIT, LIST_ENRICH_THROTTLE_SECS};

use crate::models::ChatSummary;

use super::attribution::Side;

/// What a refresh round should do: publish the summaries that are complete,
/// and join-probe the ones still missing their participant sets. Planning is
/// pure; the owner executes the probes.
#[derive(Debug)]
pub struct RefreshPlan {
    pub publish: Vec<ChatSummary>,
    pub probe: Vec<String>,
}

/// Sidebar conversation list plus unread counters.
///
/// Enrichment is bounded: at most the [`LIST_ENRICH_LIMIT`] most recently
/// active incomplete conversations per round, and at most one round per
/// [`LIST_ENRICH_THROTTLE_SECS`] per instance, so a large account cannot turn
/// one list refresh into a probe storm.
#[derive(Debug, Default)]
pub struct Roster {
    summaries: Vec<ChatSummary>,
    unread: HashMap<String, u32>,
    last_enrichment: Option<Instant>,
}

impl Roster {
    pub fn new() -> Roster {
        Roster::default()
    }

    pub fn plan_refresh(&mut self, incoming: Vec<ChatSummary>, now: Instant) -> RefreshPlan {
        let all_complete = incoming.iter().all(|s| s.participants.is_some());

        let probe = if all_complete {
            Vec::new()
        } else {
            let throttled = self
                .last_enrichment
                .map(|t| now.duration_since(t).as_secs() < LIST_ENRICH_THROTTLE_SECS)
                .unwrap_or(false);
            if throttled {
                Vec::new()
            } else {
                self.last_enrichment = Some(now);
                let mut incomplete: Vec<&ChatSummary> = incoming
                    .iter()
                    .filter(|s| s.participants.is_none())
                    .collect();
                // RFC3339 strings order lexicographically; missing activity sinks.
                incomplete.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
                incomplete
                    .iter()
                    .take(LIST_ENRICH_LIMIT)
                    .map(|s| s.chat_id.clone())
                    .collect()
            }
        };

        let publish = incoming
            .iter()
            .filter(|s| s.participants.is_some())
            .cloned()
            .collect();
        self.summaries = incoming;

        RefreshPlan { publish, probe }
    }

    /// Attach the participant set learned by a join-probe.
    pub fn apply_probe(
        &mut self,
        chat_id: &str,
        participants: Vec<crate::models::Participant>,
    ) {
        if let Some(s) = self.summaries.iter_mut().find(|s| s.chat_id == chat_id) {
            s.participants = Some(participants);
        }
    }

    pub fn summaries(&self) -> &[ChatSummary] {
        &self.summaries
    }

    /// Count an incoming message. Bumps only messages attributed to the other
    /// party in a chat that is not currently open; returns the new count when
    /// a bump happened.
    pub fn note_incoming(
        &mut self,
        chat_id: &str,
        side: Side,
        open_chat: Option<&str>,
    ) -> Option<u32> {
        if side == Side::Mine {
            return None;
        }
        if open_chat == Some(chat_id) {
            return None;
        }
        let count = self.unread.entry(chat_id.to_string()).or_insert(0);
        *count += 1;
        Some(*count)
    }

    /// Opening a chat or receiving a read-all zeroes its counter.
    pub fn clear_unread(&mut self, chat_id: &str) {
        self.unread.remove(chat_id);
    }

    pub fn unread(&self, chat_id: &str) -> u32 {
        self.unread.get(chat_id).copied().unwrap_or(0)
    }

    /// Seed counters from the persisted store at startup.
    pub fn seed_unread(&mut self, counts: impl IntoIterator<Item = (String, u32)>) {
        for (chat_id, count) in counts {
            if count > 0 {
                self.unread.insert(chat_id, count);
            }
        }
    }
}
