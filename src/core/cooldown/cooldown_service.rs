// Generic per-key cooldown arbitration.
//
// One map, one question: how long until this key may fire again?
// Used by the roll command (per-user and per-channel keys) and by the
// per-rule-family warning throttles in the automod engine.

use dashmap::DashMap;

/// Per-key last-fire-timestamp map.
#[derive(Default)]
pub struct CooldownTracker {
    last_fire: DashMap<u64, i64>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Milliseconds until `key` may fire again. Returns 0 when the key has
    /// never fired or the cooldown is disabled (`cooldown_ms <= 0`).
    pub fn remaining_ms(&self, key: u64, cooldown_ms: i64, now_ms: i64) -> i64 {
        if cooldown_ms <= 0 {
            return 0;
        }
        let last = self.last_fire.get(&key).map(|v| *v).unwrap_or(0);
        (last + cooldown_ms - now_ms).max(0)
    }

    /// Stamp `key` as having fired at `now_ms`.
    pub fn record(&self, key: u64, now_ms: i64) {
        self.last_fire.insert(key, now_ms);
    }

    pub fn prune_idle_before(&self, stale_before_ms: i64) {
        self.last_fire.retain(|_, last| *last >= stale_before_ms);
    }

    #[cfg(test)]
    pub fn tracked_keys(&self) -> usize {
        self.last_fire.len()
    }
}

/// Whether a rate-limited command may run right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandGate {
    Ready,
    CoolingDown { retry_after_secs: i64 },
}

/// Dual-key cooldown for a rate-limited command: the per-user and the
/// per-channel cooldown must both be clear, and both keys are stamped
/// before the command executes.
pub struct CommandCooldowns {
    per_user: CooldownTracker,
    per_channel: CooldownTracker,
    user_cooldown_ms: i64,
    channel_cooldown_ms: i64,
}

impl CommandCooldowns {
    pub fn new(user_cooldown_ms: i64, channel_cooldown_ms: i64) -> Self {
        Self {
            per_user: CooldownTracker::new(),
            per_channel: CooldownTracker::new(),
            user_cooldown_ms,
            channel_cooldown_ms,
        }
    }

    pub fn try_acquire(&self, user_id: u64, channel_id: u64, now_ms: i64) -> CommandGate {
        let user_remaining = self
            .per_user
            .remaining_ms(user_id, self.user_cooldown_ms, now_ms);
        let channel_remaining =
            self.per_channel
                .remaining_ms(channel_id, self.channel_cooldown_ms, now_ms);
        let remaining = user_remaining.max(channel_remaining);

        if remaining > 0 {
            return CommandGate::CoolingDown {
                retry_after_secs: seconds_to_retry(remaining),
            };
        }

        self.per_user.record(user_id, now_ms);
        self.per_channel.record(channel_id, now_ms);
        CommandGate::Ready
    }

    /// Drop keys idle for ten times the governing cooldown (60s floor), the
    /// same staleness policy the engine sweep applies to its own maps.
    pub fn prune(&self, now_ms: i64) {
        let user_horizon = self.user_cooldown_ms.max(60_000) * 10;
        let channel_horizon = self.channel_cooldown_ms.max(60_000) * 10;
        self.per_user.prune_idle_before(now_ms - user_horizon);
        self.per_channel.prune_idle_before(now_ms - channel_horizon);
    }
}

/// Whole seconds to report in a "try again in Ns" rejection.
pub fn seconds_to_retry(remaining_ms: i64) -> i64 {
    (remaining_ms + 999) / 1000
}
