use std::time::{Duration, Instant};

use aula_shared::constants::{
    POLL_INTERVAL_STUDENT_MS, POLL_INTERVAL_SUPPORT_MS, REALTIME_SUPPRESS_MS,
};

use crate::models::SenderRole;

/// Decides when the periodic reconciliation poll may run. A poll tick is
/// skipped whenever a realtime event was observed inside the suppress window,
/// so polling never races a live push for the same messages.
#[derive(Debug)]
pub struct PollGate {
    interval: Duration,
    last_realtime: Option<Instant>,
    last_poll: Option<Instant>,
}

impl PollGate {
    pub fn for_role(role: SenderRole) -> PollGate {
        let ms = match role {
            SenderRole::Coach | SenderRole::Admin => POLL_INTERVAL_SUPPORT_MS,
            SenderRole::Student => POLL_INTERVAL_STUDENT_MS,
        };
        PollGate {
            interval: Duration::from_millis(ms),
            last_realtime: None,
            last_poll: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn note_realtime(&mut self, now: Instant) {
        self.last_realtime = Some(now);
    }

    pub fn should_poll(&self, now: Instant) -> bool {
        if let Some(rt) = self.last_realtime {
            if now.duration_since(rt) < Duration::from_millis(REALTIME_SUPPRESS_MS) {
                return false;
            }
        }
        match self.last_poll {
            None => true,
            Some(prev) => now.duration_since(prev) >= self.interval,
        }
    }

    pub fn note_polled(&mut self, now: Instant) {
        self.last_poll = Some(now);
    }
}
