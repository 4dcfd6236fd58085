use std::time::{Duration, Instant};

use aula_shared::constants::{TYPING_DEBOUNCE_MS, TYPING_IDLE_MS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    Start,
    Stop,
}

/// Debounces outgoing typing indicators: at most one start per debounce
/// interval while the user types, and an automatic stop after ~1.6 s of
/// inactivity. Best-effort; the signals it emits need no ack.
#[derive(Debug, Default)]
pub struct TypingGate {
    last_emit: Option<Instant>,
    last_keystroke: Option<Instant>,
    active: bool,
}

impl TypingGate {
    pub fn new() -> TypingGate {
        TypingGate::default()
    }

    /// Call on every keystroke; returns a signal when one should be emitted.
    pub fn on_keystroke(&mut self, now: Instant) -> Option<TypingSignal> {
        self.last_keystroke = Some(now);
        let debounce = Duration::from_millis(TYPING_DEBOUNCE_MS);
        let due = match self.last_emit {
            None => true,
            Some(prev) => now.duration_since(prev) >= debounce,
        };
        if !self.active || due {
            self.active = true;
            self.last_emit = Some(now);
            return Some(TypingSignal::Start);
        }
        None
    }

    /// Call periodically; returns `Stop` once after the idle window lapses.
    pub fn tick(&mut self, now: Instant) -> Option<TypingSignal> {
        if !self.active {
            return None;
        }
        let idle = Duration::from_millis(TYPING_IDLE_MS);
        let last = self.last_keystroke?;
        if now.duration_since(last) >= idle {
            self.active = false;
            self.last_emit = None;
            return Some(TypingSignal::Stop);
        }
        None
    }

    /// Clear immediately, e.g. when the composed message is sent.
    pub fn reset(&mut self) -> Option<TypingSignal> {
        if self.active {
            self.active = false;
            self.last_emit = None;
            Some(TypingSignal::Stop)
        } else {
            None
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}
