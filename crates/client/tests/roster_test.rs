use std::time::{Duration, Instant};

use aula_client::models::{ChatSummary, Participant, ParticipantKind};
use aula_client::sync::attribution::Side;
use aula_client::sync::roster::Roster;

fn summary(chat_id: &str, complete: bool, last_activity: Option<&str>) -> ChatSummary {
    ChatSummary {
        chat_id: chat_id.into(),
        participants: complete.then(|| {
            vec![Participant {
                kind: ParticipantKind::Cliente,
                external_id: format!("ext-{}", chat_id),
                participant_id: format!("p-{}", chat_id),
            }]
        }),
        last_activity: last_activity.map(str::to_string),
    }
}

#[test]
fn complete_lists_publish_without_probes() {
    let mut roster = Roster::new();
    let plan = roster.plan_refresh(
        vec![summary("a", true, None), summary("b", true, None)],
        Instant::now(),
    );
    assert_eq!(plan.publish.len(), 2);
    assert!(plan.probe.is_empty());
}

#[test]
fn probes_only_most_recent_ten() {
    let mut roster = Roster::new();
    let mut incoming = Vec::new();
    for i in 0..15 {
        incoming.push(summary(
            &format!("chat-{:02}", i),
            false,
            Some(&format!("2026-08-01T00:00:{:02}Z", i)),
        ));
    }
    let plan = roster.plan_refresh(incoming, Instant::now());
    assert_eq!(plan.probe.len(), 10);
    // Most recently active first.
    assert_eq!(plan.probe[0], "chat-14");
    assert!(!plan.probe.contains(&"chat-00".to_string()));
}

#[test]
fn enrichment_is_throttled_per_instance() {
    let mut roster = Roster::new();
    let t0 = Instant::now();
    let plan = roster.plan_refresh(vec![summary("a", false, None)], t0);
    assert_eq!(plan.probe.len(), 1);

    // A refresh right after plans no probes.
    let plan = roster.plan_refresh(vec![summary("a", false, None)], t0 + Duration::from_secs(5));
    assert!(plan.probe.is_empty());

    // After the throttle window it may enrich again.
    let plan = roster.plan_refresh(vec![summary("a", false, None)], t0 + Duration::from_secs(25));
    assert_eq!(plan.probe.len(), 1);
}

#[test]
fn probe_result_completes_summary() {
    let mut roster = Roster::new();
    roster.plan_refresh(vec![summary("a", false, None)], Instant::now());
    roster.apply_probe(
        "a",
        vec![Participant {
            kind: ParticipantKind::Equipo,
            external_id: "coach-1".into(),
            participant_id: "p-1".into(),
        }],
    );
    assert!(roster.summaries()[0].participants.is_some());
}

#[test]
fn unread_bumps_only_for_other_party_in_closed_chats() {
    let mut roster = Roster::new();

    assert_eq!(roster.note_incoming("a", Side::Theirs, Some("open-chat")), Some(1));
    assert_eq!(roster.note_incoming("a", Side::Theirs, Some("open-chat")), Some(2));

    // Own messages never count.
    assert_eq!(roster.note_incoming("a", Side::Mine, Some("open-chat")), None);

    // The open chat never counts.
    assert_eq!(roster.note_incoming("open-chat", Side::Theirs, Some("open-chat")), None);

    assert_eq!(roster.unread("a"), 2);
    roster.clear_unread("a");
    assert_eq!(roster.unread("a"), 0);
}

#[test]
fn seeded_counters_survive_refresh() {
    let mut roster = Roster::new();
    roster.seed_unread([("a".to_string(), 3u32)]);
    roster.plan_refresh(vec![summary("a", true, None)], Instant::now());
    assert_eq!(roster.unread("a"), 3);
}
