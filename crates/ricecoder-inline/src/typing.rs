//! Typing speed measurement
//!
//! Buffer changes are grouped into typing sessions separated by pauses. The
//! average time between keystrokes over recent sessions drives the adaptive
//! fetch debounce.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::trace;

use crate::buffer::ContentChangeEvent;

/// A pause longer than this ends the current session
pub const MAX_SESSION_GAP_MS: i64 = 3_000;
/// Sessions shorter than this are discarded
pub const MIN_SESSION_DURATION_MS: i64 = 1_000;
/// Number of finalized sessions kept
pub const SESSION_HISTORY_LIMIT: usize = 50;
/// Sessions that ended within this window count as recent
pub const TYPING_SPEED_WINDOW_MS: i64 = 300_000;
/// Character count from which the average is considered reliable
pub const MIN_CHARS_FOR_RELIABLE_SPEED: usize = 20;

/// Source of wall-clock milliseconds
pub trait Clock {
    fn now_ms(&self) -> i64;
}

/// Wall clock backed by `chrono`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually advanced clock for deterministic tests and replays
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<i64>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: Cell::new(start_ms),
        }
    }

    pub fn advance(&self, ms: i64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: i64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.get()
    }
}

/// A run of edits without long pauses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingSession {
    pub start_time: i64,
    pub end_time: i64,
    pub character_count: usize,
}

impl TypingSession {
    pub fn duration(&self) -> i64 {
        self.end_time - self.start_time
    }

    fn is_significant(&self) -> bool {
        self.duration() >= MIN_SESSION_DURATION_MS && self.character_count > 0
    }
}

/// Average interval between keystrokes, with the number of characters it
/// was computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypingInterval {
    pub average_interval_ms: u64,
    pub character_count: usize,
}

impl TypingInterval {
    /// Whether enough characters were observed for the average to be used
    pub fn is_reliable(&self) -> bool {
        self.character_count >= MIN_CHARS_FOR_RELIABLE_SPEED
    }
}

/// Tracks typing sessions and computes the average keystroke interval
pub struct TypingIntervalTracker {
    clock: Rc<dyn Clock>,
    sessions: VecDeque<TypingSession>,
    current: Option<TypingSession>,
    last_change_time: i64,
    cached: RefCell<Option<TypingInterval>>,
    cache_invalidated: Cell<bool>,
}

impl std::fmt::Debug for TypingIntervalTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypingIntervalTracker")
            .field("sessions", &self.sessions.len())
            .field("current", &self.current)
            .finish()
    }
}

impl TypingIntervalTracker {
    pub fn new() -> Self {
        Self::with_clock(Rc::new(SystemClock))
    }

    pub fn with_clock(clock: Rc<dyn Clock>) -> Self {
        Self {
            clock,
            sessions: VecDeque::new(),
            current: None,
            last_change_time: 0,
            cached: RefCell::new(None),
            cache_invalidated: Cell::new(true),
        }
    }

    /// Records a buffer change
    pub fn handle_content_change(&mut self, event: &ContentChangeEvent) {
        if event.is_empty() {
            return;
        }
        let now = self.clock.now_ms();
        let characters = if event.reason.is_user_typing() {
            event
                .changes
                .iter()
                .map(|c| c.text.chars().count().max(c.range_length))
                .sum()
        } else {
            1
        };

        match self.current.as_mut() {
            Some(session) if now - self.last_change_time <= MAX_SESSION_GAP_MS => {
                session.end_time = now;
                session.character_count += characters;
            }
            _ => {
                self.finalize_current_session();
                self.current = Some(TypingSession {
                    start_time: now,
                    end_time: now,
                    character_count: characters,
                });
            }
        }
        self.last_change_time = now;
        self.cache_invalidated.set(true);
    }

    /// Average keystroke interval over recent sessions
    pub fn typing_interval(&self) -> TypingInterval {
        if self.cache_invalidated.get() || self.cached.borrow().is_none() {
            let interval = self.calculate();
            *self.cached.borrow_mut() = Some(interval);
            self.cache_invalidated.set(false);
            return interval;
        }
        self.cached.borrow().unwrap_or_default()
    }

    /// Finalized sessions, oldest first
    pub fn sessions(&self) -> impl Iterator<Item = &TypingSession> {
        self.sessions.iter()
    }

    pub fn current_session(&self) -> Option<&TypingSession> {
        self.current.as_ref()
    }

    /// Drops every session, including the open one
    pub fn reset(&mut self) {
        self.sessions.clear();
        self.current = None;
        self.last_change_time = 0;
        self.cache_invalidated.set(true);
    }

    /// Finalizes the open session
    pub fn dispose(&mut self) {
        self.finalize_current_session();
        self.cache_invalidated.set(true);
    }

    fn finalize_current_session(&mut self) {
        let Some(session) = self.current.take() else {
            return;
        };
        if !session.is_significant() {
            trace!(duration = session.duration(), "discarding short typing session");
            return;
        }
        trace!(
            duration = session.duration(),
            characters = session.character_count,
            "typing session finalized"
        );
        self.sessions.push_back(session);
        if self.sessions.len() > SESSION_HISTORY_LIMIT {
            self.sessions.pop_front();
        }
    }

    fn calculate(&self) -> TypingInterval {
        let mut sessions: Vec<TypingSession> = self.sessions.iter().copied().collect();
        if let Some(current) = self.current.filter(TypingSession::is_significant) {
            sessions.push(current);
        }
        if sessions.is_empty() {
            return TypingInterval::default();
        }

        // Most recent first
        sessions.sort_by(|a, b| b.end_time.cmp(&a.end_time));
        let cutoff = self.clock.now_ms() - TYPING_SPEED_WINDOW_MS;
        let split = sessions
            .iter()
            .position(|s| s.end_time <= cutoff)
            .unwrap_or(sessions.len());
        let mut older = sessions.split_off(split);
        let mut selected = sessions;

        let mut total_chars: usize = selected.iter().map(|s| s.character_count).sum();
        // Oldest excluded sessions are pulled in first.
        older.reverse();
        for session in older {
            if total_chars >= MIN_CHARS_FOR_RELIABLE_SPEED {
                break;
            }
            total_chars += session.character_count;
            selected.push(session);
        }

        let total_time: i64 = selected.iter().map(TypingSession::duration).sum();
        if total_time == 0 || total_chars <= 1 {
            return TypingInterval {
                average_interval_ms: 0,
                character_count: total_chars,
            };
        }
        let intervals = total_chars.saturating_sub(1).max(1) as f64;
        TypingInterval {
            average_interval_ms: (total_time as f64 / intervals).round() as u64,
            character_count: total_chars,
        }
    }
}

impl Default for TypingIntervalTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{ChangeReason, ContentChange, EditSource};
    use crate::types::Range;

    fn change(text: &str, source: EditSource) -> ContentChangeEvent {
        ContentChangeEvent {
            changes: vec![ContentChange {
                range: Range::new(1, 1, 1, 1),
                range_offset: 0,
                range_length: 0,
                text: text.to_string(),
            }],
            version_id: 2,
            alternative_version_id: 2,
            reason: ChangeReason::new(source),
        }
    }

    fn tracker() -> (Rc<ManualClock>, TypingIntervalTracker) {
        let clock = Rc::new(ManualClock::new(1_000_000));
        let tracker = TypingIntervalTracker::with_clock(clock.clone());
        (clock, tracker)
    }

    #[test]
    fn test_no_sessions_reports_zero() {
        let (_, tracker) = tracker();
        assert_eq!(tracker.typing_interval(), TypingInterval::default());
    }

    #[test]
    fn test_steady_typing_average() {
        let (clock, mut tracker) = tracker();
        for _ in 0..30 {
            tracker.handle_content_change(&change("a", EditSource::Typing));
            clock.advance(100);
        }
        let interval = tracker.typing_interval();
        assert_eq!(interval.character_count, 30);
        assert_eq!(interval.average_interval_ms, 100);
        assert!(interval.is_reliable());
    }

    #[test]
    fn test_programmatic_change_counts_one() {
        let (clock, mut tracker) = tracker();
        tracker.handle_content_change(&change("a", EditSource::Typing));
        clock.advance(1_500);
        tracker.handle_content_change(&change(
            "a very long pasted block",
            EditSource::Paste,
        ));
        assert_eq!(tracker.current_session().unwrap().character_count, 2);
    }

    #[test]
    fn test_pause_splits_sessions() {
        let (clock, mut tracker) = tracker();
        for _ in 0..15 {
            tracker.handle_content_change(&change("a", EditSource::Typing));
            clock.advance(100);
        }
        clock.advance(5_000);
        for _ in 0..15 {
            tracker.handle_content_change(&change("a", EditSource::Typing));
            clock.advance(100);
        }
        tracker.dispose();
        assert_eq!(tracker.sessions().count(), 2);
    }

    #[test]
    fn test_short_sessions_are_discarded() {
        let (clock, mut tracker) = tracker();
        tracker.handle_content_change(&change("ab", EditSource::Typing));
        clock.advance(200);
        tracker.handle_content_change(&change("c", EditSource::Typing));
        tracker.dispose();
        assert_eq!(tracker.sessions().count(), 0);
    }

    #[test]
    fn test_cache_is_invalidated_by_changes() {
        let (clock, mut tracker) = tracker();
        for _ in 0..12 {
            tracker.handle_content_change(&change("a", EditSource::Typing));
            clock.advance(100);
        }
        let first = tracker.typing_interval();
        assert_eq!(first, tracker.typing_interval());
        tracker.handle_content_change(&change("abc", EditSource::Typing));
        assert_ne!(first, tracker.typing_interval());
    }

    #[test]
    fn test_old_sessions_fill_unreliable_window() {
        let (clock, mut tracker) = tracker();
        // An old session of 25 characters, 200ms apart.
        for _ in 0..25 {
            tracker.handle_content_change(&change("a", EditSource::Typing));
            clock.advance(200);
        }
        clock.advance(TYPING_SPEED_WINDOW_MS + 10_000);
        // A recent session of 11 characters, 100ms apart.
        for _ in 0..11 {
            tracker.handle_content_change(&change("a", EditSource::Typing));
            clock.advance(100);
        }
        let interval = tracker.typing_interval();
        assert_eq!(interval.character_count, 36);
        // (4800 + 1000) / 35
        assert_eq!(interval.average_interval_ms, 166);
    }

    #[test]
    fn test_reset_clears_history() {
        let (clock, mut tracker) = tracker();
        for _ in 0..15 {
            tracker.handle_content_change(&change("a", EditSource::Typing));
            clock.advance(100);
        }
        tracker.reset();
        assert_eq!(tracker.typing_interval().character_count, 0);
        assert!(tracker.current_session().is_none());
    }
}
