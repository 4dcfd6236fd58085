use std::env;
use std::time::Instant;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};

use aula_client::config::Config;
use aula_client::db;
use aula_client::ClientState;
use aula_client::models::{
    ChannelTag, Delivery, LocalIdentity, Message, ParticipantKind, ParticipantRef, SenderRole,
};
use aula_client::sync::attribution::{AttributionContext, Side};
use aula_client::sync::roster::Roster;
use aula_client::sync::session::{ResolveAction, SessionController};
use aula_client::ws::events::{ListFilter, RawMessage, ServerEvent};
use aula_client::ws::transport::Transport;

fn print_message(m: &Message) {
    let marker = match m.delivery {
        Delivery::Pending => "…",
        Delivery::Delivered => {
            if m.read {
                "✓✓"
            } else {
                "✓"
            }
        }
        Delivery::Failed => "✗",
    };
    let files = if m.attachments.is_empty() {
        String::new()
    } else {
        format!(" [{} file(s)]", m.attachments.len())
    };
    println!("[{}] {} {}: {}{}", m.at, marker, m.sender.as_str(), m.text, files);
}

#[tokio::main]
async fn main() {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aula_client=info".into()),
        )
        .init();

    let config = Config::from_env();

    let mut args = env::args().skip(1);
    let room = args.next().unwrap_or_else(|| {
        eprintln!("usage: aula-client <room-code> [student|coach]");
        std::process::exit(2);
    });
    let room = room.to_lowercase();
    if let Err(e) = aula_shared::validation::validate_room_code(&room) {
        eprintln!("{}", e);
        std::process::exit(2);
    }
    let role = match args.next().as_deref() {
        Some("coach") | Some("support") => SenderRole::Coach,
        _ => SenderRole::Student,
    };

    let pool = db::init_pool(&config.database_path)
        .await
        .expect("Failed to initialize database");
    let state = ClientState {
        db: pool,
        config: config.clone(),
    };

    let external_id = env::var("AULA_EXTERNAL_ID").unwrap_or_else(|_| room.clone());
    let identity = LocalIdentity::new(role, external_id.clone());

    let student_id = env::var("AULA_STUDENT_ID").unwrap_or_else(|_| room.clone());
    let coach_id = env::var("AULA_COACH_ID").unwrap_or_else(|_| "support".into());
    let desired = vec![
        ParticipantRef {
            kind: ParticipantKind::Cliente,
            external_id: student_id,
        },
        ParticipantRef {
            kind: ParticipantKind::Equipo,
            external_id: coach_id,
        },
    ];

    let (transport, mut events) =
        match Transport::connect(&config.ws_url, || env::var("AULA_TOKEN").ok()).await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!("disconnected: {}", e);
                std::process::exit(1);
            }
        };
    tracing::info!("connected to {}", config.ws_url);

    let filter = ListFilter {
        participant_kind: Some(role.kind()),
        external_id: Some(external_id.clone()),
        include_participants: true,
    };
    let summaries = transport.list_chats(&filter).await.unwrap_or_default();

    // Sidebar: enrich what the list left incomplete, show unread badges.
    let mut roster = Roster::new();
    if let Ok(counts) = db::all_unread(&state.db, role.as_str()).await {
        roster.seed_unread(counts.into_iter().map(|(id, n)| (id, n as u32)));
    }
    let plan = roster.plan_refresh(summaries.clone(), Instant::now());
    for chat_id in &plan.probe {
        if let Ok(ack) = transport.join(chat_id).await {
            let participants = ack
                .participants
                .into_iter()
                .map(|p| p.into_participant())
                .collect();
            roster.apply_probe(chat_id, participants);
        }
    }
    for summary in roster.summaries() {
        let unread = roster.unread(&summary.chat_id);
        let badge = if unread > 0 {
            format!(" ({} unread)", unread)
        } else {
            String::new()
        };
        println!("- {}{}", summary.chat_id, badge);
    }

    let mut session = SessionController::new(identity, room.clone(), ChannelTag::Support, desired);
    session.begin_resolve();
    match session.resolve(&summaries) {
        ResolveAction::Join(chat_id) => match transport.join(&chat_id).await {
            Ok(ack) => session.apply_join(ack, Utc::now()),
            Err(e) => tracing::warn!("join failed: {}", e),
        },
        ResolveAction::Create(participants) => match transport.create_chat(&participants).await {
            Ok(ack) => session.apply_created(ack),
            Err(e) => tracing::warn!("create failed: {}", e),
        },
        ResolveAction::Wait => {
            tracing::info!("no existing conversation; it will be created on first send");
        }
    }
    if let Some(chat_id) = session.chat_id() {
        let _ = db::clear_unread(&state.db, chat_id, role.as_str()).await;
        let _ = db::set_last_read(&state.db, chat_id, role.as_str(), &Utc::now().to_rfc3339()).await;
        transport.read_all(chat_id, session.my_participant_id());
    }
    for m in session.messages() {
        print_message(m);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut poll = tokio::time::interval(session.poll_interval());

    loop {
        tokio::select! {
            ev = events.recv() => {
                let Some(ev) = ev else {
                    tracing::warn!("disconnected");
                    break;
                };
                session.on_realtime_observed(Instant::now());
                match ev {
                    ServerEvent::NewMessage(raw) => {
                        let chat_id = raw.chat_id.clone();
                        let outcome = session.ingest(raw, AttributionContext::Realtime, Utc::now());
                        if outcome.appended {
                            if let Some(m) = session.messages().last() {
                                print_message(m);
                            }
                        }
                        // Messages for other rooms only move their badge.
                        if outcome.side == Side::Theirs {
                            if let Some(chat_id) = chat_id {
                                if Some(chat_id.as_str()) != session.chat_id() {
                                    let _ = db::bump_unread(&state.db, &chat_id, role.as_str()).await;
                                }
                            }
                        }
                    }
                    ServerEvent::MessageRead { .. } => session.on_read_all(),
                    ServerEvent::Typing { on, .. } => {
                        session.note_peer_typing(on, Utc::now());
                        if on {
                            tracing::debug!("peer is typing");
                        }
                    }
                    ServerEvent::ChatCreated(ack) => {
                        if session.chat_id().is_none() {
                            session.apply_created(ack);
                        }
                    }
                    ServerEvent::FileActivity(value) => {
                        if let Ok(raw) = serde_json::from_value::<RawMessage>(value) {
                            let outcome = session.ingest(raw, AttributionContext::Realtime, Utc::now());
                            if outcome.appended {
                                if let Some(m) = session.messages().last() {
                                    print_message(m);
                                }
                            }
                        }
                    }
                }
            }
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                if text == "/quit" {
                    break;
                }
                let plan = match session.prepare_text_send(text, Utc::now()) {
                    Ok(plan) => plan,
                    Err(e) => {
                        eprintln!("{}", e);
                        continue;
                    }
                };
                if let Some(participants) = plan.needs_create.as_ref() {
                    match transport.create_chat(participants).await {
                        Ok(ack) => session.apply_created(ack),
                        Err(e) => {
                            tracing::error!("create failed: {}", e);
                            continue;
                        }
                    }
                }
                let Some(chat_id) = session.chat_id().map(str::to_string) else {
                    continue;
                };
                let sender = session
                    .my_participant_id()
                    .unwrap_or_default()
                    .to_string();
                match transport
                    .send_message(&chat_id, &sender, &plan.content, &plan.session_tag)
                    .await
                {
                    Ok(ack) => session.confirm_send_ack(&plan.client_id, &ack),
                    Err(e) => tracing::warn!("send failed: {}", e),
                }
            }
            _ = poll.tick() => {
                for client_id in session.mark_stalled(Utc::now()) {
                    tracing::warn!("send {} never acked; marked failed", client_id);
                }
                if session.should_poll(Instant::now()) {
                    if let Some(chat_id) = session.chat_id().map(str::to_string) {
                        if let Ok(ack) = transport.join(&chat_id).await {
                            session.apply_resync(ack, Utc::now());
                        }
                        session.note_polled(Instant::now());
                    }
                }
            }
        }
    }
}
