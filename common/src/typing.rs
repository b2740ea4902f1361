use std::time::Duration;

use tokio::time::Instant;

use crate::config::{TYPING_EMIT_INTERVAL, TYPING_TTL};

/// Whether the sender should broadcast now, given the current composer input
/// and the time (ms) of the previous broadcast.
///
/// Empty (or whitespace-only) input goes out immediately as "stopped typing";
/// non-empty input is throttled to one broadcast per interval.
pub fn should_emit(current_input: &str, last_emit_at: i64, now: i64) -> bool {
    should_emit_every(current_input, last_emit_at, now, TYPING_EMIT_INTERVAL)
}

pub fn should_emit_every(current_input: &str, last_emit_at: i64, now: i64, interval: Duration) -> bool {
    current_input.trim().is_empty() || now - last_emit_at > interval.as_millis() as i64
}

/// Sender-side throttle state.
#[derive(Debug, Clone)]
pub struct TypingEmitter {
    interval: Duration,
    last_emit_at: i64,
    last_sent: Option<bool>,
}

impl TypingEmitter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit_at: 0,
            last_sent: None,
        }
    }

    /// Feeds one input change; returns the flag to broadcast, if any.
    ///
    /// A "stopped" signal is not repeated while the partner was already told
    /// we stopped (or never heard we started).
    pub fn observe(&mut self, current_input: &str, now: i64) -> Option<bool> {
        let typing = !current_input.trim().is_empty();
        if !typing && self.last_sent != Some(true) {
            return None;
        }
        if !should_emit_every(current_input, self.last_emit_at, now, self.interval) {
            return None;
        }
        self.last_emit_at = now;
        self.last_sent = Some(typing);
        Some(typing)
    }
}

impl Default for TypingEmitter {
    fn default() -> Self {
        Self::new(TYPING_EMIT_INTERVAL)
    }
}

/// Receiver-side indicator with a dead-man deadline.
///
/// Every "typing" signal reschedules the deadline and bumps the generation; a
/// timer that fires for an older generation is a no-op.
#[derive(Debug, Clone)]
pub struct TypingIndicator {
    ttl: Duration,
    active_until: Option<Instant>,
    generation: u64,
}

impl TypingIndicator {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            active_until: None,
            generation: 0,
        }
    }

    /// Applies a received signal and returns the generation of the timer it
    /// (re)scheduled or cancelled.
    pub fn on_signal(&mut self, is_typing: bool, now: Instant) -> u64 {
        self.generation += 1;
        self.active_until = is_typing.then(|| now + self.ttl);
        self.generation
    }

    /// Timer callback. Clears the indicator only if no newer signal arrived.
    pub fn expire(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.active_until.is_none() {
            return false;
        }
        self.active_until = None;
        true
    }

    pub fn is_active(&self, now: Instant) -> bool {
        self.active_until.is_some_and(|until| now < until)
    }
}

impl Default for TypingIndicator {
    fn default() -> Self {
        Self::new(TYPING_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_780_000_000_000;

    #[test]
    fn empty_input_always_emits() {
        assert!(should_emit("", T0, T0 + 1));
        assert!(should_emit("   ", T0, T0));
    }

    #[test]
    fn non_empty_input_is_throttled() {
        assert!(!should_emit("he", T0, T0 + 650));
        assert!(should_emit("hel", T0, T0 + 651));
    }

    #[test]
    fn keystroke_burst_emits_twice() {
        let mut emitter = TypingEmitter::default();
        let emitted: Vec<bool> = [("h", T0), ("he", T0 + 80), ("", T0 + 200)]
            .into_iter()
            .filter_map(|(input, now)| emitter.observe(input, now))
            .collect();
        assert_eq!(emitted, vec![true, false]);
    }

    #[test]
    fn stop_is_not_repeated() {
        let mut emitter = TypingEmitter::default();
        assert_eq!(emitter.observe("", T0), None);
        assert_eq!(emitter.observe("a", T0 + 10), Some(true));
        assert_eq!(emitter.observe("", T0 + 20), Some(false));
        assert_eq!(emitter.observe("", T0 + 30), None);
    }

    #[test]
    fn long_typing_refreshes_after_interval() {
        let mut emitter = TypingEmitter::default();
        assert_eq!(emitter.observe("a", T0), Some(true));
        assert_eq!(emitter.observe("ab", T0 + 400), None);
        assert_eq!(emitter.observe("abc", T0 + 700), Some(true));
    }

    #[test]
    fn indicator_expires_after_ttl() {
        let start = Instant::now();
        let mut indicator = TypingIndicator::default();
        indicator.on_signal(true, start);
        assert!(indicator.is_active(start + Duration::from_millis(2400)));
        assert!(!indicator.is_active(start + Duration::from_millis(2500)));
    }

    #[test]
    fn refresh_invalidates_older_timer() {
        let start = Instant::now();
        let mut indicator = TypingIndicator::default();
        let first = indicator.on_signal(true, start);
        let second = indicator.on_signal(true, start + Duration::from_millis(2000));
        assert!(!indicator.expire(first));
        assert!(indicator.is_active(start + Duration::from_millis(4000)));
        assert!(indicator.expire(second));
        assert!(!indicator.is_active(start + Duration::from_millis(4000)));
    }

    #[test]
    fn stop_signal_cancels() {
        let start = Instant::now();
        let mut indicator = TypingIndicator::default();
        let generation = indicator.on_signal(true, start);
        indicator.on_signal(false, start);
        assert!(!indicator.is_active(start));
        assert!(!indicator.expire(generation));
    }
}
