// Per-user tracked state for flood, repeat and strike accounting.
//
// All timestamps are i64 milliseconds since the Unix epoch, supplied by the
// caller, so tests drive these with a hand-rolled clock. Maps are created
// lazily on first observation and shrink only through `prune_idle_before`.

use dashmap::DashMap;

/// Per-user sliding window of message timestamps, used for flood detection.
#[derive(Default)]
pub struct SlidingWindowTracker {
    windows: DashMap<u64, Vec<i64>>,
}

impl SlidingWindowTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one message and return how many of the user's messages fall
    /// inside the flood window (including this one).
    ///
    /// Timestamps older than `max(flood_window_ms, repeat_window_ms)` are
    /// dropped first, so nothing beyond that horizon survives an observation.
    pub fn observe(
        &self,
        user_id: u64,
        now_ms: i64,
        flood_window_ms: i64,
        repeat_window_ms: i64,
    ) -> u32 {
        let horizon = flood_window_ms.max(repeat_window_ms);
        let mut entry = self.windows.entry(user_id).or_default();
        entry.retain(|ts| now_ms - ts <= horizon);
        entry.push(now_ms);
        entry.iter().filter(|ts| now_ms - **ts <= flood_window_ms).count() as u32
    }

    pub fn prune_idle_before(&self, stale_before_ms: i64) {
        self.windows
            .retain(|_, window| window.last().is_some_and(|ts| *ts >= stale_before_ms));
    }

    #[cfg(test)]
    fn tracked_users(&self) -> usize {
        self.windows.len()
    }
}

#[derive(Debug, Clone, Default)]
struct RepeatState {
    normalized_text: String,
    last_at_ms: i64,
    consecutive_repeats: u32,
}

/// Per-user last-normalized-text plus consecutive-repeat counter.
#[derive(Default)]
pub struct RepeatTracker {
    states: DashMap<u64, RepeatState>,
}

impl RepeatTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one normalized message and return the consecutive-repeat count.
    ///
    /// The counter advances only when the text is non-empty, matches the
    /// previous text, and arrives within the repeat window; anything else
    /// resets it to 0. The stored state is overwritten either way.
    pub fn observe(
        &self,
        user_id: u64,
        normalized_text: &str,
        now_ms: i64,
        repeat_window_ms: i64,
    ) -> u32 {
        let mut entry = self.states.entry(user_id).or_default();
        let repeats = if !normalized_text.is_empty()
            && !entry.normalized_text.is_empty()
            && normalized_text == entry.normalized_text
            && now_ms - entry.last_at_ms <= repeat_window_ms
        {
            entry.consecutive_repeats + 1
        } else {
            0
        };
        *entry = RepeatState {
            normalized_text: normalized_text.to_string(),
            last_at_ms: now_ms,
            consecutive_repeats: repeats,
        };
        repeats
    }

    pub fn prune_idle_before(&self, stale_before_ms: i64) {
        self.states.retain(|_, state| state.last_at_ms >= stale_before_ms);
    }

    #[cfg(test)]
    fn tracked_users(&self) -> usize {
        self.states.len()
    }
}

#[derive(Debug, Clone, Default)]
struct StrikeState {
    count: u32,
    last_at_ms: i64,
}

/// Per-user decaying violation counter driving escalation to timeout.
#[derive(Default)]
pub struct StrikeLedger {
    strikes: DashMap<u64, StrikeState>,
}

impl StrikeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one violation and return the post-increment strike count.
    ///
    /// The first violation after `decay_ms` of inactivity resets the count
    /// to 1, not 0 - the violation that broke the quiet spell still counts.
    pub fn record_violation(&self, user_id: u64, now_ms: i64, decay_ms: i64) -> u32 {
        let mut entry = self.strikes.entry(user_id).or_default();
        let count = if entry.count > 0 && now_ms - entry.last_at_ms <= decay_ms {
            entry.count + 1
        } else {
            1
        };
        *entry = StrikeState {
            count,
            last_at_ms: now_ms,
        };
        count
    }

    pub fn prune_idle_before(&self, stale_before_ms: i64) {
        self.strikes.retain(|_, state| state.last_at_ms >= stale_before_ms);
    }

    #[cfg(test)]
    fn tracked_users(&self) -> usize {
        self.strikes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLOOD_MS: i64 = 8_000;
    const REPEAT_MS: i64 = 30_000;

    #[test]
    fn flood_count_includes_only_the_flood_window() {
        let tracker = SlidingWindowTracker::new();
        let user = 1;

        assert_eq!(tracker.observe(user, 0, FLOOD_MS, REPEAT_MS), 1);
        assert_eq!(tracker.observe(user, 1_000, FLOOD_MS, REPEAT_MS), 2);
        // 9s later the first two are outside the flood window but inside the
        // repeat horizon, so they stay stored yet don't count.
        assert_eq!(tracker.observe(user, 10_000, FLOOD_MS, REPEAT_MS), 1);
    }

    #[test]
    fn timestamps_beyond_the_horizon_are_dropped() {
        let tracker = SlidingWindowTracker::new();
        let user = 1;

        tracker.observe(user, 0, FLOOD_MS, REPEAT_MS);
        tracker.observe(user, 40_000, FLOOD_MS, REPEAT_MS);

        let stored = tracker.windows.get(&user).unwrap().clone();
        assert_eq!(stored, vec![40_000]);
    }

    #[test]
    fn repeats_increment_within_window_and_reset_on_change() {
        let tracker = RepeatTracker::new();
        let user = 1;

        assert_eq!(tracker.observe(user, "hello there", 0, REPEAT_MS), 0);
        assert_eq!(tracker.observe(user, "hello there", 1_000, REPEAT_MS), 1);
        assert_eq!(tracker.observe(user, "hello there", 2_000, REPEAT_MS), 2);
        assert_eq!(tracker.observe(user, "something else", 3_000, REPEAT_MS), 0);
    }

    #[test]
    fn repeat_streak_breaks_when_the_gap_exceeds_the_window() {
        let tracker = RepeatTracker::new();
        let user = 1;

        tracker.observe(user, "again", 0, REPEAT_MS);
        assert_eq!(tracker.observe(user, "again", REPEAT_MS, REPEAT_MS), 1);
        assert_eq!(tracker.observe(user, "again", 2 * REPEAT_MS + 1, REPEAT_MS), 0);
    }

    #[test]
    fn empty_normalized_text_never_extends_a_streak() {
        let tracker = RepeatTracker::new();
        let user = 1;

        assert_eq!(tracker.observe(user, "", 0, REPEAT_MS), 0);
        assert_eq!(tracker.observe(user, "", 1_000, REPEAT_MS), 0);
        // A real message after empties starts fresh too.
        assert_eq!(tracker.observe(user, "hi", 2_000, REPEAT_MS), 0);
    }

    #[test]
    fn strikes_increment_then_reset_to_one_after_decay() {
        let ledger = StrikeLedger::new();
        let user = 1;
        let decay = 600_000;

        assert_eq!(ledger.record_violation(user, 0, decay), 1);
        assert_eq!(ledger.record_violation(user, 1_000, decay), 2);
        assert_eq!(ledger.record_violation(user, 2_000, decay), 3);
        // Quiet for longer than the decay period: back to 1, not 0.
        assert_eq!(ledger.record_violation(user, 2_000 + decay + 1, decay), 1);
    }

    #[test]
    fn prune_drops_idle_users_only() {
        let window = SlidingWindowTracker::new();
        let repeats = RepeatTracker::new();
        let strikes = StrikeLedger::new();

        window.observe(1, 0, FLOOD_MS, REPEAT_MS);
        window.observe(2, 100_000, FLOOD_MS, REPEAT_MS);
        repeats.observe(1, "x", 0, REPEAT_MS);
        repeats.observe(2, "x", 100_000, REPEAT_MS);
        strikes.record_violation(1, 0, 600_000);
        strikes.record_violation(2, 100_000, 600_000);

        window.prune_idle_before(50_000);
        repeats.prune_idle_before(50_000);
        strikes.prune_idle_before(50_000);

        assert_eq!(window.tracked_users(), 1);
        assert_eq!(repeats.tracked_users(), 1);
        assert_eq!(strikes.tracked_users(), 1);
    }
}
