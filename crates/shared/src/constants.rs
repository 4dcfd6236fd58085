pub const APP_NAME: &str = "Aula";

// Limits
pub const MAX_MESSAGE_LENGTH: usize = 4000;
pub const MAX_ROOM_CODE_LENGTH: usize = 64;
pub const MAX_UPLOAD_BYTES: u64 = 52_428_800; // 50 MB per file
pub const MAX_OVERSIZE_NAMES_SHOWN: usize = 3;

pub const MESSAGE_PAGE_SIZE: i64 = 50;

// Token resolution at connect time
pub const TOKEN_RETRY_WINDOW_MS: u64 = 4_000;
pub const TOKEN_RETRY_INTERVAL_MS: u64 = 250;

// Request/ack timeouts
pub const JOIN_ACK_TIMEOUT_MS: u64 = 3_000;
pub const REQUEST_ACK_TIMEOUT_MS: u64 = 5_000;

// Reconciliation windows
pub const OUTBOX_MATCH_WINDOW_SECS: i64 = 12;
pub const SEND_STALL_TIMEOUT_SECS: i64 = 20;
pub const RECENT_UPLOAD_WINDOW_SECS: i64 = 45;
pub const UPLOAD_SIZE_TOLERANCE_BYTES: u64 = 4_096;

// Typing indicator
pub const TYPING_DEBOUNCE_MS: u64 = 400;
pub const TYPING_IDLE_MS: u64 = 1_600;

// Poll scheduling
pub const REALTIME_SUPPRESS_MS: u64 = 1_500;
pub const POLL_INTERVAL_SUPPORT_MS: u64 = 1_800;
pub const POLL_INTERVAL_STUDENT_MS: u64 = 4_000;
pub const PEER_TYPING_TTL_MS: u64 = 4_000;

// Conversation list enrichment
pub const LIST_ENRICH_LIMIT: usize = 10;
pub const LIST_ENRICH_THROTTLE_SECS: u64 = 20;
