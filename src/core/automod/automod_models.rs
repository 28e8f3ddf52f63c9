// Auto-moderation domain models - data structures for the abuse-mitigation engine.
//
// These are pure domain types with no Discord dependencies.
// The Discord layer converts gateway events into these and back.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Longest timeout Discord accepts: 28 days, expressed in minutes.
const MAX_TIMEOUT_MINUTES: u32 = 28 * 24 * 60;

/// Immutable moderation configuration snapshot.
///
/// Loaded as one typed value with defaults applied at the load boundary,
/// then swapped wholesale on each refresh - rules never see partial reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationSettings {
    /// Delete messages containing community invite links
    pub invite_auto_delete: bool,
    /// Post a channel warning after an invite deletion
    pub invite_warn: bool,
    /// Auto-delete the invite warning after this many seconds (clamped to 0-120)
    pub invite_warn_delete_seconds: u32,

    /// Delete links posted by accounts younger than the minimum age
    pub low_trust_filter_enabled: bool,
    /// Minimum account age in days before links are allowed
    pub low_trust_min_account_age_days: u32,
    /// DM the author when a low-trust link is removed
    pub low_trust_warn_dm: bool,

    /// Master switch for flood/repeat detection
    pub spam_enabled: bool,
    /// Flood window in seconds
    pub flood_window_seconds: u32,
    /// Messages allowed inside the flood window (strictly more triggers)
    pub flood_max_messages: u32,
    /// Repeat window in seconds
    pub repeat_window_seconds: u32,
    /// Consecutive repeats that trigger the repeat rule
    pub repeat_max_repeats: u32,
    /// Post a channel warning after a spam deletion
    pub spam_warn_enabled: bool,
    /// Auto-delete the spam warning after this many seconds (clamped to 0-120)
    pub spam_warn_delete_seconds: u32,
    /// Escalate to a timeout on repeated strikes
    pub spam_timeout_enabled: bool,
    /// Timeout length in minutes (clamped to 1-40320)
    pub spam_timeout_minutes: u32,
    /// Strikes reset to 1 after this many minutes without a violation
    pub strike_decay_minutes: u32,

    /// Channels exempt from the flood/repeat rule
    pub ignored_channel_ids: HashSet<u64>,
    /// Roles exempt from the flood/repeat rule
    pub bypass_role_ids: HashSet<u64>,
}

impl Default for ModerationSettings {
    fn default() -> Self {
        Self {
            invite_auto_delete: true,
            invite_warn: true,
            invite_warn_delete_seconds: 12,
            low_trust_filter_enabled: true,
            low_trust_min_account_age_days: 7,
            low_trust_warn_dm: true,
            spam_enabled: true,
            flood_window_seconds: 8,
            flood_max_messages: 5,
            repeat_window_seconds: 30,
            repeat_max_repeats: 3,
            spam_warn_enabled: true,
            spam_warn_delete_seconds: 12,
            spam_timeout_enabled: true,
            spam_timeout_minutes: 10,
            strike_decay_minutes: 10,
            ignored_channel_ids: HashSet::new(),
            bypass_role_ids: HashSet::new(),
        }
    }
}

impl ModerationSettings {
    pub fn flood_window_ms(&self) -> i64 {
        i64::from(self.flood_window_seconds.max(1)) * 1000
    }

    pub fn repeat_window_ms(&self) -> i64 {
        i64::from(self.repeat_window_seconds.max(1)) * 1000
    }

    pub fn flood_max(&self) -> u32 {
        self.flood_max_messages.max(1)
    }

    pub fn repeat_max(&self) -> u32 {
        self.repeat_max_repeats.max(1)
    }

    pub fn min_account_age_ms(&self) -> i64 {
        i64::from(self.low_trust_min_account_age_days) * 86_400_000
    }

    pub fn strike_decay_ms(&self) -> i64 {
        i64::from(self.strike_decay_minutes.max(1)) * 60_000
    }

    /// Timeout length with the platform bounds applied.
    pub fn timeout_minutes(&self) -> u32 {
        self.spam_timeout_minutes.clamp(1, MAX_TIMEOUT_MINUTES)
    }

    pub fn invite_warn_delete_delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.invite_warn_delete_seconds.min(120)))
    }

    pub fn spam_warn_delete_delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.spam_warn_delete_seconds.min(120)))
    }
}

/// One inbound chat message, reduced to the fields the rules need.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub author_id: u64,
    pub author_is_bot: bool,
    /// Account creation time, ms since the Unix epoch
    pub author_created_at_ms: i64,
    pub author_has_mod_permission: bool,
    pub author_role_ids: Vec<u64>,
    pub guild_id: u64,
    pub channel_id: u64,
    pub message_id: u64,
    pub text: String,
    /// Arrival time, ms since the Unix epoch. The engine treats this as "now".
    pub timestamp_ms: i64,
}

/// Which spam sub-rule fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpamReason {
    Flood,
    Repeat,
}

impl std::fmt::Display for SpamReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpamReason::Flood => write!(f, "message flood"),
            SpamReason::Repeat => write!(f, "repeated messages"),
        }
    }
}

/// What the pipeline did with one message.
///
/// Returned so the event adapter and tests can observe the outcome
/// without scraping logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// No rule matched, or a skip condition applied
    Allowed,
    /// Invite link removed
    InviteDeleted { warned: bool },
    /// Invite rule matched but the delete call failed; later rules not evaluated
    InviteDeleteFailed,
    /// Link from a low-trust account removed
    LowTrustDeleted { dm_attempted: bool },
    /// Low-trust rule matched but the delete call failed
    LowTrustDeleteFailed,
    /// Flood/repeat rule fired
    SpamEnforced {
        reason: SpamReason,
        flood_count: u32,
        repeats: u32,
        strikes: u32,
        deleted: bool,
        warned: bool,
        timed_out: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_reference_deployment() {
        let s = ModerationSettings::default();
        assert!(s.invite_auto_delete);
        assert_eq!(s.flood_max_messages, 5);
        assert_eq!(s.flood_window_seconds, 8);
        assert_eq!(s.repeat_max_repeats, 3);
        assert_eq!(s.spam_timeout_minutes, 10);
        assert!(s.ignored_channel_ids.is_empty());
    }

    #[test]
    fn timeout_minutes_are_clamped_to_platform_bounds() {
        let mut s = ModerationSettings::default();
        s.spam_timeout_minutes = 0;
        assert_eq!(s.timeout_minutes(), 1);
        s.spam_timeout_minutes = 1_000_000;
        assert_eq!(s.timeout_minutes(), 28 * 24 * 60);
    }

    #[test]
    fn warn_delete_delay_is_clamped_to_two_minutes() {
        let mut s = ModerationSettings::default();
        s.invite_warn_delete_seconds = 999;
        assert_eq!(s.invite_warn_delete_delay(), Duration::from_secs(120));
        s.invite_warn_delete_seconds = 0;
        assert_eq!(s.invite_warn_delete_delay(), Duration::ZERO);
    }

    #[test]
    fn settings_deserialize_with_missing_fields_as_defaults() {
        // Older settings rows may predate newer fields; they must load cleanly.
        let s: ModerationSettings = serde_json::from_str(r#"{"flood_max_messages": 9}"#).unwrap();
        assert_eq!(s.flood_max_messages, 9);
        assert_eq!(s.repeat_max_repeats, 3);
        assert!(s.spam_enabled);
    }
}
