use serde_json::json;

use aula_client::models::ParticipantKind;
use aula_client::ws::events::{decode_push, ClientEvent, RawMessage, ServerEvent};

#[test]
fn client_events_serialize_to_named_frames() {
    let event = ClientEvent::SendMessage {
        chat_id: "chat-1".into(),
        sender_participant_id: "p-1".into(),
        content: "Hola".into(),
        client_session: "s1".into(),
    };
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["event"], "chat.message");
    assert_eq!(value["data"]["chatId"], "chat-1");
    assert_eq!(value["data"]["clientSession"], "s1");
}

#[test]
fn typing_and_read_do_not_expect_acks() {
    let typing = ClientEvent::Typing {
        chat_id: "c".into(),
        on: true,
        sender_participant_id: None,
        client_session: "s1".into(),
    };
    let join = ClientEvent::Join {
        chat_id: "c".into(),
    };
    assert!(!typing.wants_ack());
    assert!(join.wants_ack());
}

#[test]
fn raw_message_accepts_spanish_and_english_fields() {
    let spanish: RawMessage = serde_json::from_value(json!({
        "id_mensaje": "1",
        "contenido": "hola",
        "id_miembro_emisor": "p-9",
        "tipo_miembro": "cliente",
        "client_session": "s1",
        "fecha": "2026-08-01T10:00:00Z"
    }))
    .unwrap();
    assert_eq!(spanish.id.as_deref(), Some("1"));
    assert_eq!(spanish.text(), "hola");
    assert_eq!(spanish.emitter_id.as_deref(), Some("p-9"));
    assert!(spanish.parsed_at().is_some());

    let english: RawMessage = serde_json::from_value(json!({
        "messageId": "2",
        "content": "hello",
        "emitterId": "p-3",
        "participantType": "equipo",
        "clientSession": "s2",
        "createdAt": "2026-08-01T10:00:00Z"
    }))
    .unwrap();
    assert_eq!(english.id.as_deref(), Some("2"));
    assert_eq!(english.emitter_id.as_deref(), Some("p-3"));
    assert_eq!(
        english.participant_type.as_deref().and_then(ParticipantKind::parse),
        Some(ParticipantKind::Equipo)
    );
}

#[test]
fn numeric_timestamps_become_rfc3339() {
    let millis: RawMessage =
        serde_json::from_value(json!({"content": "x", "timestamp": 1754035200000i64})).unwrap();
    assert!(millis.at_string().unwrap().starts_with("2025-08-01T"));

    let seconds: RawMessage =
        serde_json::from_value(json!({"content": "x", "timestamp": 1754035200i64})).unwrap();
    assert_eq!(millis.at_string(), seconds.at_string());
}

#[test]
fn known_pushes_decode_to_typed_events() {
    let msg = decode_push("chat.message", json!({"content": "hola"}));
    assert!(matches!(msg, Some(ServerEvent::NewMessage(_))));

    let read = decode_push("mensajes_leidos", json!({"chatId": "c1"}));
    assert!(matches!(
        read,
        Some(ServerEvent::MessageRead { chat_id: Some(ref c), .. }) if c.as_str() == "c1"
    ));

    let typing = decode_push("escribiendo", json!({"id_chat": "c1", "escribiendo": false}));
    assert!(matches!(typing, Some(ServerEvent::Typing { on: false, .. })));

    let created = decode_push("chat_creado", json!({"id_chat": "c9", "participantes": []}));
    assert!(matches!(created, Some(ServerEvent::ChatCreated(_))));
}

#[test]
fn file_flavored_event_names_match_heuristically() {
    for name in [
        "chat.file",
        "fileUploaded",
        "upload.done",
        "nuevo_archivo",
        "adjunto_recibido",
        "ATTACHMENT_READY",
    ] {
        let ev = decode_push(name, json!({"filename": "a.png"}));
        assert!(
            matches!(ev, Some(ServerEvent::FileActivity(_))),
            "{} should be treated as file activity",
            name
        );
    }
    assert!(decode_push("presence.update", json!({})).is_none());
}
