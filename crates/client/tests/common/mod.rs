#![allow(dead_code)]

use chrono::Utc;
use serde_json::Value;

use aula_client::models::{ChannelTag, LocalIdentity, ParticipantKind, ParticipantRef, SenderRole};
use aula_client::sync::session::SessionController;
use aula_client::ws::events::{JoinAck, RawMessage};

pub fn raw(value: Value) -> RawMessage {
    serde_json::from_value(value).expect("raw message should decode")
}

pub fn join_ack(value: Value) -> JoinAck {
    serde_json::from_value(value).expect("join ack should decode")
}

pub fn student_identity() -> LocalIdentity {
    LocalIdentity {
        role: SenderRole::Student,
        external_id: "stu-1".into(),
        session_tag: "s1".into(),
    }
}

pub fn coach_identity() -> LocalIdentity {
    LocalIdentity {
        role: SenderRole::Coach,
        external_id: "coach-1".into(),
        session_tag: "c1".into(),
    }
}

pub fn desired_pair() -> Vec<ParticipantRef> {
    vec![
        ParticipantRef {
            kind: ParticipantKind::Cliente,
            external_id: "stu-1".into(),
        },
        ParticipantRef {
            kind: ParticipantKind::Equipo,
            external_id: "coach-1".into(),
        },
    ]
}

pub fn two_party_join_ack() -> JoinAck {
    join_ack(serde_json::json!({
        "chatId": "chat-1",
        "myParticipantId": "p-stu",
        "participants": [
            {"id": "p-stu", "tipo": "cliente", "externalId": "stu-1"},
            {"id": "p-coach", "tipo": "equipo", "externalId": "coach-1"}
        ],
        "messages": []
    }))
}

/// A student session already joined to the canonical two-party chat.
pub fn joined_student_session() -> SessionController {
    let mut session = SessionController::new(
        student_identity(),
        "stu-1",
        ChannelTag::Support,
        desired_pair(),
    );
    session.apply_join(two_party_join_ack(), Utc::now());
    session
}
