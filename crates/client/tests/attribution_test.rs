mod common;

use chrono::{Duration, Utc};
use serde_json::json;

use aula_client::models::{
    Attachment, AttachmentContent, AttributionRule, MimeCategory, SenderRole,
};
use aula_client::sync::attribution::{
    attribute, Attribution, AttributionContext, LocalSignals, Side,
};
use aula_client::sync::outbox::{Outbox, OutboxEntry};
use aula_client::sync::uploads::{RecentUploads, UploadShape};

fn signals<'a>(outbox: &'a Outbox, uploads: &'a RecentUploads) -> LocalSignals<'a> {
    LocalSignals {
        my_participant_id: Some("p-stu"),
        my_role: SenderRole::Student,
        session_tag: "s1",
        outbox,
        uploads,
        two_party: true,
        now: Utc::now(),
    }
}

fn text_entry(text: &str) -> OutboxEntry {
    OutboxEntry {
        client_id: "c-1".into(),
        text: text.into(),
        shape: None,
        session_tag: "s1".into(),
        sent_at: Utc::now(),
        resolved_participant_id: Some("p-stu".into()),
        acked: false,
        failed: false,
    }
}

fn png_attachment(name: &str, size: u64) -> Attachment {
    Attachment {
        id: format!("att-{}", name),
        name: name.into(),
        mime_type: "image/png".into(),
        size_bytes: size,
        created_at: None,
        content: AttachmentContent::Url(format!("https://files.test/{}", name)),
    }
}

#[test]
fn emitter_id_match_is_mine_in_any_context() {
    let outbox = Outbox::new();
    let uploads = RecentUploads::new();
    let local = signals(&outbox, &uploads);
    let msg = common::raw(json!({"content": "hola", "emitterId": "p-stu"}));

    for ctx in [
        AttributionContext::Realtime,
        AttributionContext::Join,
        AttributionContext::Poll,
    ] {
        let att = attribute(&msg, None, ctx, &local);
        assert_eq!(att.side, Side::Mine);
        assert_eq!(att.rule, AttributionRule::EmitterId);
    }
}

#[test]
fn emitter_id_mismatch_is_theirs() {
    let outbox = Outbox::new();
    let uploads = RecentUploads::new();
    let local = signals(&outbox, &uploads);
    let msg = common::raw(json!({"content": "hola", "id_miembro_emisor": "p-coach"}));

    let att = attribute(&msg, None, AttributionContext::Join, &local);
    assert_eq!(att.side, Side::Theirs);
    assert_eq!(att.rule, AttributionRule::EmitterId);
    assert_eq!(att.role, SenderRole::Coach);
}

#[test]
fn realtime_without_signals_assumes_other() {
    // Even a matching session tag must not flip a realtime push to "mine":
    // some backends echo the receiver's own tag on foreign messages.
    let mut outbox = Outbox::new();
    outbox.enqueue(text_entry("hola"));
    let uploads = RecentUploads::new();
    let local = signals(&outbox, &uploads);
    let msg = common::raw(json!({"content": "hola", "client_session": "s1"}));

    let att = attribute(&msg, None, AttributionContext::Realtime, &local);
    assert_eq!(att.side, Side::Theirs);
    assert_eq!(att.rule, AttributionRule::RealtimeDefault);
}

#[test]
fn realtime_trusts_participant_type() {
    let outbox = Outbox::new();
    let uploads = RecentUploads::new();
    let local = signals(&outbox, &uploads);

    let mine = common::raw(json!({"content": "hola", "tipo_miembro": "cliente"}));
    let att = attribute(&mine, None, AttributionContext::Realtime, &local);
    assert_eq!(att.side, Side::Mine);
    assert_eq!(att.rule, AttributionRule::ParticipantType);

    let theirs = common::raw(json!({"content": "hola", "tipo_miembro": "equipo"}));
    let att = attribute(&theirs, None, AttributionContext::Realtime, &local);
    assert_eq!(att.side, Side::Theirs);
    assert_eq!(att.role, SenderRole::Coach);
}

#[test]
fn outbox_text_match_claims_history_message() {
    let mut outbox = Outbox::new();
    outbox.enqueue(text_entry("hola"));
    let uploads = RecentUploads::new();
    let local = signals(&outbox, &uploads);
    let msg = common::raw(json!({"content": "hola"}));

    let att = attribute(&msg, None, AttributionContext::Join, &local);
    assert_eq!(att.side, Side::Mine);
    assert_eq!(att.rule, AttributionRule::OutboxMatch);
}

#[test]
fn outbox_match_respects_time_window() {
    let mut outbox = Outbox::new();
    let mut entry = text_entry("hola");
    entry.sent_at = Utc::now() - Duration::seconds(60);
    outbox.enqueue(entry);
    let uploads = RecentUploads::new();
    let local = signals(&outbox, &uploads);
    let msg = common::raw(json!({"content": "hola"}));

    let att = attribute(&msg, None, AttributionContext::Poll, &local);
    assert_eq!(att.side, Side::Theirs);
}

#[test]
fn outbox_match_ignores_messages_from_other_sessions() {
    let mut outbox = Outbox::new();
    outbox.enqueue(text_entry("Ok"));
    let uploads = RecentUploads::new();
    let local = signals(&outbox, &uploads);
    // Same text, but the payload carries another tab's tag.
    let msg = common::raw(json!({"content": "Ok", "client_session": "c2"}));

    let att = attribute(&msg, None, AttributionContext::Poll, &local);
    assert_eq!(att.side, Side::Theirs);
}

#[test]
fn upload_shape_matches_by_size_and_mime_not_filename() {
    let outbox = Outbox::new();
    let mut uploads = RecentUploads::new();
    let local_file = png_attachment("photo.png", 2048);
    uploads.record(
        UploadShape::of_attachments(std::slice::from_ref(&local_file)).unwrap(),
        Utc::now(),
    );
    let local = signals(&outbox, &uploads);

    // Server renamed the file; shape still matches.
    let renamed = [png_attachment("srv-9431.png", 2048)];
    let msg = common::raw(json!({}));
    let att = attribute(&msg, Some(&renamed), AttributionContext::Poll, &local);
    assert_eq!(att.side, Side::Mine);
    assert_eq!(att.rule, AttributionRule::UploadShape);

    // Same name, very different size: not ours.
    let different = [png_attachment("photo.png", 900_000)];
    let att = attribute(&msg, Some(&different), AttributionContext::Poll, &local);
    assert_ne!(att.rule, AttributionRule::UploadShape);
}

#[test]
fn upload_shape_distinguishes_mime_category() {
    let outbox = Outbox::new();
    let mut uploads = RecentUploads::new();
    uploads.record(
        UploadShape {
            count: 1,
            total_bytes: 2048,
            category: MimeCategory::Audio,
        },
        Utc::now(),
    );
    let local = signals(&outbox, &uploads);

    let image = [png_attachment("voice.png", 2048)];
    let msg = common::raw(json!({}));
    let att = attribute(&msg, Some(&image), AttributionContext::Poll, &local);
    assert_ne!(att.rule, AttributionRule::UploadShape);
}

#[test]
fn bare_session_tag_is_not_trusted() {
    let outbox = Outbox::new();
    let uploads = RecentUploads::new();
    let local = signals(&outbox, &uploads);
    let msg = common::raw(json!({"content": "algo", "client_session": "s1"}));

    let att = attribute(&msg, None, AttributionContext::Poll, &local);
    assert_eq!(att.side, Side::Theirs);
}

#[test]
fn session_tag_with_recent_activity_is_mine() {
    let mut outbox = Outbox::new();
    outbox.enqueue(text_entry("otra cosa"));
    let uploads = RecentUploads::new();
    let local = signals(&outbox, &uploads);
    // Text doesn't match the queued send, but the tag does and the outbox is
    // demonstrably active.
    let msg = common::raw(json!({"content": "algo", "client_session": "s1"}));

    let att = attribute(&msg, None, AttributionContext::Poll, &local);
    assert_eq!(att.side, Side::Mine);
    assert_eq!(att.rule, AttributionRule::SessionTag);
}

#[test]
fn attachment_only_two_party_falls_to_other() {
    let outbox = Outbox::new();
    let uploads = RecentUploads::new();
    let local = signals(&outbox, &uploads);
    let atts = [png_attachment("doc.png", 5_000)];
    let msg = common::raw(json!({}));

    let att = attribute(&msg, Some(&atts), AttributionContext::Join, &local);
    assert_eq!(att.side, Side::Theirs);
    assert_eq!(att.rule, AttributionRule::AttachmentOnlyOther);
}

#[test]
fn rule_confidence_ranks_explicit_id_above_guesses() {
    use aula_client::models::Confidence;

    assert_eq!(AttributionRule::EmitterId.confidence(), Confidence::High);
    assert_eq!(AttributionRule::LocalSend.confidence(), Confidence::High);
    assert_eq!(AttributionRule::OutboxMatch.confidence(), Confidence::Medium);
    assert_eq!(AttributionRule::RealtimeDefault.confidence(), Confidence::Low);
    assert!(AttributionRule::EmitterId.confidence() > AttributionRule::FallbackOther.confidence());
}

#[test]
fn participant_type_used_when_heuristics_fail() {
    let outbox = Outbox::new();
    let uploads = RecentUploads::new();
    let local = signals(&outbox, &uploads);
    let msg = common::raw(json!({"content": "hola", "participantType": "equipo"}));

    let att: Attribution = attribute(&msg, None, AttributionContext::Join, &local);
    assert_eq!(att.side, Side::Theirs);
    assert_eq!(att.rule, AttributionRule::ParticipantType);
}
