// Auto-moderation pipeline - core rule evaluation and enforcement driving.
//
// Rules run in fixed priority order and short-circuit on the first match:
// skip conditions, invite links, low-trust links, flood/repeat spam.
// State decisions are made from synchronous map reads/writes before any
// platform call is awaited; enforcement is best-effort and failures are
// logged, never propagated.
//
// NO Discord dependencies here - just pure domain logic behind the
// EnforcementActions port.

use super::automod_models::{Disposition, InboundMessage, ModerationSettings, SpamReason};
use super::normalize::{contains_invite_link, contains_url, normalize_for_repeat};
use super::trackers::{RepeatTracker, SlidingWindowTracker, StrikeLedger};
use crate::core::cooldown::CooldownTracker;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

// Warning throttle windows. These are fixed per rule family and independent
// of the configurable auto-delete delay on the warning message itself.
const INVITE_WARN_THROTTLE_MS: i64 = 60_000;
const LOW_TRUST_DM_THROTTLE_MS: i64 = 60_000;
const SPAM_WARN_THROTTLE_MS: i64 = 20_000;

/// Stale-entry sweep keeps state for this multiple of the largest window.
const PRUNE_HORIZON_MULTIPLIER: i64 = 10;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum EnforcementError {
    #[error("platform call failed: {0}")]
    Platform(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

// ============================================================================
// ENFORCEMENT PORT
// ============================================================================

/// Handle to a message the sink created, for delayed deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub channel_id: u64,
    pub message_id: u64,
}

/// The platform operations the pipeline needs. Best-effort: every call can
/// fail and the pipeline only ever logs the failure.
#[async_trait]
pub trait EnforcementActions: Send + Sync {
    async fn delete_message(&self, channel_id: u64, message_id: u64)
        -> Result<(), EnforcementError>;

    async fn send_channel_message(
        &self,
        channel_id: u64,
        text: &str,
    ) -> Result<MessageRef, EnforcementError>;

    /// Schedule `message` for deletion after `delay`. Fire-and-forget; a
    /// failed delayed delete is nobody's problem.
    async fn delete_after(&self, message: MessageRef, delay: Duration);

    async fn send_direct_message(&self, user_id: u64, text: &str)
        -> Result<(), EnforcementError>;

    async fn timeout_member(
        &self,
        user_id: u64,
        minutes: u32,
        reason: &str,
    ) -> Result<(), EnforcementError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// The abuse-mitigation engine. One instance owns all tracked per-user state;
/// nothing lives in process globals, so tests construct isolated instances
/// and drive them with explicit timestamps.
pub struct AutoModService {
    guild_id: u64,
    activity: SlidingWindowTracker,
    repeats: RepeatTracker,
    strikes: StrikeLedger,
    invite_warn_throttle: CooldownTracker,
    low_trust_dm_throttle: CooldownTracker,
    spam_warn_throttle: CooldownTracker,
}

impl AutoModService {
    /// Create an engine bound to one community.
    pub fn new(guild_id: u64) -> Self {
        Self {
            guild_id,
            activity: SlidingWindowTracker::new(),
            repeats: RepeatTracker::new(),
            strikes: StrikeLedger::new(),
            invite_warn_throttle: CooldownTracker::new(),
            low_trust_dm_throttle: CooldownTracker::new(),
            spam_warn_throttle: CooldownTracker::new(),
        }
    }

    /// Evaluate one message against the rule chain and enforce the first
    /// match. `msg.timestamp_ms` is treated as "now" throughout.
    pub async fn handle_message<A: EnforcementActions>(
        &self,
        msg: &InboundMessage,
        settings: &ModerationSettings,
        actions: &A,
    ) -> Disposition {
        // Skip conditions. Malformed messages fail open: moderation must
        // never silently eat unrelated chat traffic on a bug.
        if msg.author_is_bot || msg.guild_id != self.guild_id {
            return Disposition::Allowed;
        }
        if msg.author_id == 0 || msg.channel_id == 0 || msg.message_id == 0 {
            tracing::debug!(
                event = "automod_malformed_message",
                author_id = msg.author_id,
                channel_id = msg.channel_id,
                "skipping malformed message"
            );
            return Disposition::Allowed;
        }
        if msg.text.is_empty() || msg.author_has_mod_permission {
            return Disposition::Allowed;
        }

        let now = msg.timestamp_ms;

        if settings.invite_auto_delete && contains_invite_link(&msg.text) {
            return self.enforce_invite(msg, settings, actions, now).await;
        }

        if settings.low_trust_filter_enabled
            && contains_url(&msg.text)
            && now - msg.author_created_at_ms < settings.min_account_age_ms()
        {
            return self.enforce_low_trust(msg, settings, actions, now).await;
        }

        if settings.spam_enabled
            && !settings.ignored_channel_ids.contains(&msg.channel_id)
            && !msg
                .author_role_ids
                .iter()
                .any(|role| settings.bypass_role_ids.contains(role))
        {
            return self.check_spam(msg, settings, actions, now).await;
        }

        Disposition::Allowed
    }

    async fn enforce_invite<A: EnforcementActions>(
        &self,
        msg: &InboundMessage,
        settings: &ModerationSettings,
        actions: &A,
        now: i64,
    ) -> Disposition {
        if let Err(e) = actions.delete_message(msg.channel_id, msg.message_id).await {
            tracing::error!(
                event = "automod_invite_delete_failed",
                user_id = msg.author_id,
                channel_id = msg.channel_id,
                message_id = msg.message_id,
                error = %e,
                "failed to delete invite message"
            );
            // The message may already be gone; don't run later rules on it.
            return Disposition::InviteDeleteFailed;
        }

        tracing::info!(
            event = "automod_invite_deleted",
            user_id = msg.author_id,
            channel_id = msg.channel_id,
            message_id = msg.message_id,
            "deleted invite link"
        );

        let mut warned = false;
        if settings.invite_warn
            && self
                .invite_warn_throttle
                .remaining_ms(msg.author_id, INVITE_WARN_THROTTLE_MS, now)
                == 0
        {
            self.invite_warn_throttle.record(msg.author_id, now);
            let text = format!(
                "⚠️ <@{}> invite links aren't allowed here. \
                 If you think this was a mistake, message a moderator.",
                msg.author_id
            );
            match actions.send_channel_message(msg.channel_id, &text).await {
                Ok(warn) => {
                    warned = true;
                    let delay = settings.invite_warn_delete_delay();
                    if !delay.is_zero() {
                        actions.delete_after(warn, delay).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        event = "automod_invite_warn_failed",
                        user_id = msg.author_id,
                        channel_id = msg.channel_id,
                        error = %e,
                        "failed to post invite warning"
                    );
                }
            }
        }

        Disposition::InviteDeleted { warned }
    }

    async fn enforce_low_trust<A: EnforcementActions>(
        &self,
        msg: &InboundMessage,
        settings: &ModerationSettings,
        actions: &A,
        now: i64,
    ) -> Disposition {
        if let Err(e) = actions.delete_message(msg.channel_id, msg.message_id).await {
            tracing::error!(
                event = "automod_lowtrust_link_delete_failed",
                user_id = msg.author_id,
                channel_id = msg.channel_id,
                message_id = msg.message_id,
                error = %e,
                "failed to delete low-trust link message"
            );
            return Disposition::LowTrustDeleteFailed;
        }

        tracing::info!(
            event = "automod_lowtrust_link_deleted",
            user_id = msg.author_id,
            channel_id = msg.channel_id,
            message_id = msg.message_id,
            min_account_age_days = settings.low_trust_min_account_age_days,
            "deleted link from low-trust account"
        );

        let mut dm_attempted = false;
        if settings.low_trust_warn_dm
            && self
                .low_trust_dm_throttle
                .remaining_ms(msg.author_id, LOW_TRUST_DM_THROTTLE_MS, now)
                == 0
        {
            self.low_trust_dm_throttle.record(msg.author_id, now);
            dm_attempted = true;
            let text = format!(
                "Your message was removed because new accounts can't post links yet. \
                 Please wait until your account is at least **{} day(s)** old, \
                 or message a moderator if you think this was a mistake.",
                settings.low_trust_min_account_age_days
            );
            if let Err(e) = actions.send_direct_message(msg.author_id, &text).await {
                // DMs are routinely closed; degrade to a warning.
                tracing::warn!(
                    event = "automod_lowtrust_dm_failed",
                    user_id = msg.author_id,
                    error = %e,
                    "failed to DM low-trust author"
                );
            }
        }

        Disposition::LowTrustDeleted { dm_attempted }
    }

    async fn check_spam<A: EnforcementActions>(
        &self,
        msg: &InboundMessage,
        settings: &ModerationSettings,
        actions: &A,
        now: i64,
    ) -> Disposition {
        let flood_window_ms = settings.flood_window_ms();
        let repeat_window_ms = settings.repeat_window_ms();

        // Both trackers observe every eligible message, triggered or not,
        // so their state stays accurate for future messages.
        let flood_count =
            self.activity
                .observe(msg.author_id, now, flood_window_ms, repeat_window_ms);
        let flood_triggered = flood_count > settings.flood_max();

        let normalized = normalize_for_repeat(&msg.text);
        let repeats = self
            .repeats
            .observe(msg.author_id, &normalized, now, repeat_window_ms);
        let repeat_triggered = repeats >= settings.repeat_max();

        if !flood_triggered && !repeat_triggered {
            return Disposition::Allowed;
        }

        let reason = if flood_triggered {
            SpamReason::Flood
        } else {
            SpamReason::Repeat
        };

        let mut deleted = true;
        if let Err(e) = actions.delete_message(msg.channel_id, msg.message_id).await {
            deleted = false;
            tracing::error!(
                event = "automod_spam_delete_failed",
                user_id = msg.author_id,
                channel_id = msg.channel_id,
                message_id = msg.message_id,
                flood_triggered,
                repeat_triggered,
                error = %e,
                "failed to delete spam message"
            );
        }

        tracing::info!(
            event = "automod_spam_deleted",
            user_id = msg.author_id,
            channel_id = msg.channel_id,
            message_id = msg.message_id,
            reason = %reason,
            flood_count,
            repeats,
            "spam rule matched"
        );

        let strikes =
            self.strikes
                .record_violation(msg.author_id, now, settings.strike_decay_ms());

        let mut warned = false;
        if settings.spam_warn_enabled
            && self
                .spam_warn_throttle
                .remaining_ms(msg.author_id, SPAM_WARN_THROTTLE_MS, now)
                == 0
        {
            self.spam_warn_throttle.record(msg.author_id, now);
            let text = format!(
                "⚠️ <@{}> please slow down - spam ({}) isn't allowed. \
                 Continued spam may result in a timeout.",
                msg.author_id, reason
            );
            match actions.send_channel_message(msg.channel_id, &text).await {
                Ok(warn) => {
                    warned = true;
                    let delay = settings.spam_warn_delete_delay();
                    if !delay.is_zero() {
                        actions.delete_after(warn, delay).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        event = "automod_spam_warn_failed",
                        user_id = msg.author_id,
                        channel_id = msg.channel_id,
                        error = %e,
                        "failed to post spam warning"
                    );
                }
            }
        }

        // The first strike per decay period is warn-only; escalation begins
        // on the second.
        let mut timed_out = false;
        if settings.spam_timeout_enabled && settings.spam_timeout_minutes > 0 && strikes >= 2 {
            let minutes = settings.timeout_minutes();
            let timeout_reason = format!("Auto-mod: spam ({})", reason);
            match actions
                .timeout_member(msg.author_id, minutes, &timeout_reason)
                .await
            {
                Ok(()) => {
                    timed_out = true;
                    tracing::info!(
                        event = "automod_spam_timeout",
                        user_id = msg.author_id,
                        channel_id = msg.channel_id,
                        minutes,
                        strikes,
                        reason = %reason,
                        "timed out member for spam"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        event = "automod_spam_timeout_failed",
                        user_id = msg.author_id,
                        channel_id = msg.channel_id,
                        minutes,
                        strikes,
                        error = %e,
                        "failed to time out member"
                    );
                }
            }
        }

        Disposition::SpamEnforced {
            reason,
            flood_count,
            repeats,
            strikes,
            deleted,
            warned,
            timed_out,
        }
    }

    /// Drop per-user state idle for longer than a generous multiple of the
    /// largest configured window. One sweep, one staleness policy, applied
    /// to every map so none of them drifts to its own horizon.
    pub fn prune(&self, settings: &ModerationSettings, now_ms: i64) {
        let horizon = PRUNE_HORIZON_MULTIPLIER
            * settings
                .flood_window_ms()
                .max(settings.repeat_window_ms())
                .max(settings.strike_decay_ms())
                .max(60_000);
        let stale_before = now_ms - horizon;

        self.activity.prune_idle_before(stale_before);
        self.repeats.prune_idle_before(stale_before);
        self.strikes.prune_idle_before(stale_before);
        self.invite_warn_throttle.prune_idle_before(stale_before);
        self.low_trust_dm_throttle.prune_idle_before(stale_before);
        self.spam_warn_throttle.prune_idle_before(stale_before);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    const GUILD: u64 = 900;
    const CHANNEL: u64 = 10;
    const DAY_MS: i64 = 86_400_000;

    /// Records every platform call; optionally fails deletes.
    #[derive(Default)]
    struct MockActions {
        fail_delete: AtomicBool,
        fail_dm: AtomicBool,
        deleted: Mutex<Vec<u64>>,
        channel_messages: Mutex<Vec<String>>,
        scheduled_deletes: Mutex<Vec<(MessageRef, Duration)>>,
        dms: Mutex<Vec<(u64, String)>>,
        timeouts: Mutex<Vec<(u64, u32)>>,
    }

    #[async_trait]
    impl EnforcementActions for MockActions {
        async fn delete_message(
            &self,
            _channel_id: u64,
            message_id: u64,
        ) -> Result<(), EnforcementError> {
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(EnforcementError::Platform("missing permissions".into()));
            }
            self.deleted.lock().unwrap().push(message_id);
            Ok(())
        }

        async fn send_channel_message(
            &self,
            channel_id: u64,
            text: &str,
        ) -> Result<MessageRef, EnforcementError> {
            let mut sent = self.channel_messages.lock().unwrap();
            sent.push(text.to_string());
            Ok(MessageRef {
                channel_id,
                message_id: 9_000 + sent.len() as u64,
            })
        }

        async fn delete_after(&self, message: MessageRef, delay: Duration) {
            self.scheduled_deletes.lock().unwrap().push((message, delay));
        }

        async fn send_direct_message(
            &self,
            user_id: u64,
            text: &str,
        ) -> Result<(), EnforcementError> {
            if self.fail_dm.load(Ordering::SeqCst) {
                return Err(EnforcementError::Platform("DMs closed".into()));
            }
            self.dms.lock().unwrap().push((user_id, text.to_string()));
            Ok(())
        }

        async fn timeout_member(
            &self,
            user_id: u64,
            minutes: u32,
            _reason: &str,
        ) -> Result<(), EnforcementError> {
            self.timeouts.lock().unwrap().push((user_id, minutes));
            Ok(())
        }
    }

    fn message(author_id: u64, text: &str, at_ms: i64) -> InboundMessage {
        InboundMessage {
            author_id,
            author_is_bot: false,
            // Well-aged account by default.
            author_created_at_ms: at_ms - 400 * DAY_MS,
            author_has_mod_permission: false,
            author_role_ids: Vec::new(),
            guild_id: GUILD,
            channel_id: CHANNEL,
            message_id: 1_000 + at_ms as u64,
            text: text.to_string(),
            timestamp_ms: at_ms,
        }
    }

    fn service() -> AutoModService {
        AutoModService::new(GUILD)
    }

    #[tokio::test]
    async fn flood_triggers_strictly_above_the_configured_max() {
        let service = service();
        let settings = ModerationSettings::default();
        let actions = MockActions::default();

        // flood_max_messages = 5: the 5th message in the window must pass.
        for i in 0..5 {
            let msg = message(1, &format!("message {}", i), i * 500);
            let result = service.handle_message(&msg, &settings, &actions).await;
            assert_eq!(result, Disposition::Allowed, "message {} should pass", i);
        }

        let msg = message(1, "message five", 2_600);
        match service.handle_message(&msg, &settings, &actions).await {
            Disposition::SpamEnforced {
                reason,
                flood_count,
                strikes,
                deleted,
                ..
            } => {
                assert_eq!(reason, SpamReason::Flood);
                assert_eq!(flood_count, 6);
                assert_eq!(strikes, 1);
                assert!(deleted);
            }
            other => panic!("expected flood enforcement, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn third_identical_message_triggers_repeat_rule() {
        let service = service();
        let mut settings = ModerationSettings::default();
        settings.repeat_max_repeats = 2;
        let actions = MockActions::default();

        let first = service
            .handle_message(&message(1, "hello there", 0), &settings, &actions)
            .await;
        assert_eq!(first, Disposition::Allowed);

        let second = service
            .handle_message(&message(1, "hello there", 1_000), &settings, &actions)
            .await;
        assert_eq!(second, Disposition::Allowed);

        let third = service
            .handle_message(&message(1, "hello there", 2_000), &settings, &actions)
            .await;
        match third {
            Disposition::SpamEnforced {
                reason,
                repeats,
                strikes,
                deleted,
                timed_out,
                ..
            } => {
                assert_eq!(reason, SpamReason::Repeat);
                assert_eq!(repeats, 2);
                assert_eq!(strikes, 1);
                assert!(deleted);
                assert!(!timed_out, "first strike is warn-only");
            }
            other => panic!("expected repeat enforcement, got {:?}", other),
        }
        assert!(actions.timeouts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn timeout_starts_on_the_second_strike() {
        let service = service();
        let mut settings = ModerationSettings::default();
        settings.repeat_max_repeats = 1;
        let actions = MockActions::default();

        service
            .handle_message(&message(1, "spam spam", 0), &settings, &actions)
            .await;
        let first = service
            .handle_message(&message(1, "spam spam", 1_000), &settings, &actions)
            .await;
        assert!(matches!(
            first,
            Disposition::SpamEnforced {
                strikes: 1,
                timed_out: false,
                ..
            }
        ));

        let second = service
            .handle_message(&message(1, "spam spam", 2_000), &settings, &actions)
            .await;
        assert!(matches!(
            second,
            Disposition::SpamEnforced {
                strikes: 2,
                timed_out: true,
                ..
            }
        ));
        assert_eq!(*actions.timeouts.lock().unwrap(), vec![(1, 10)]);
    }

    #[tokio::test]
    async fn strikes_reset_to_one_after_decay() {
        let service = service();
        let mut settings = ModerationSettings::default();
        settings.repeat_max_repeats = 1;
        let actions = MockActions::default();

        service
            .handle_message(&message(1, "again again", 0), &settings, &actions)
            .await;
        service
            .handle_message(&message(1, "again again", 1_000), &settings, &actions)
            .await;
        let second = service
            .handle_message(&message(1, "again again", 2_000), &settings, &actions)
            .await;
        assert!(matches!(
            second,
            Disposition::SpamEnforced { strikes: 2, .. }
        ));

        // Quiet past the decay period, then a fresh violation: back to 1.
        let later = 2_000 + settings.strike_decay_ms() + 60_000;
        service
            .handle_message(&message(1, "again again", later), &settings, &actions)
            .await;
        let next = service
            .handle_message(&message(1, "again again", later + 1_000), &settings, &actions)
            .await;
        assert!(matches!(
            next,
            Disposition::SpamEnforced {
                strikes: 1,
                timed_out: false,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn moderator_invite_is_untouched() {
        let service = service();
        let settings = ModerationSettings::default();
        let actions = MockActions::default();

        let mut msg = message(1, "join https://discord.gg/abc", 0);
        msg.author_has_mod_permission = true;

        let result = service.handle_message(&msg, &settings, &actions).await;
        assert_eq!(result, Disposition::Allowed);
        assert!(actions.deleted.lock().unwrap().is_empty());
        assert!(actions.channel_messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invite_is_deleted_and_warned_with_scheduled_cleanup() {
        let service = service();
        let settings = ModerationSettings::default();
        let actions = MockActions::default();

        let msg = message(1, "discord.gg/abc123", 0);
        let result = service.handle_message(&msg, &settings, &actions).await;

        assert_eq!(result, Disposition::InviteDeleted { warned: true });
        assert_eq!(actions.deleted.lock().unwrap().len(), 1);
        let warns = actions.channel_messages.lock().unwrap();
        assert_eq!(warns.len(), 1);
        assert!(warns[0].contains("<@1>"));
        let scheduled = actions.scheduled_deletes.lock().unwrap();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].1, Duration::from_secs(12));
    }

    #[tokio::test]
    async fn invite_warning_is_throttled_per_user() {
        let service = service();
        let settings = ModerationSettings::default();
        let actions = MockActions::default();

        let first = service
            .handle_message(&message(1, "discord.gg/abc", 0), &settings, &actions)
            .await;
        let second = service
            .handle_message(&message(1, "discord.gg/abc", 5_000), &settings, &actions)
            .await;

        assert_eq!(first, Disposition::InviteDeleted { warned: true });
        assert_eq!(second, Disposition::InviteDeleted { warned: false });
        assert_eq!(actions.channel_messages.lock().unwrap().len(), 1);
        assert_eq!(actions.deleted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn invite_delete_failure_stops_the_pipeline() {
        let service = service();
        let settings = ModerationSettings::default();
        let actions = MockActions::default();
        actions.fail_delete.store(true, Ordering::SeqCst);

        let result = service
            .handle_message(&message(1, "discord.gg/abc", 0), &settings, &actions)
            .await;

        assert_eq!(result, Disposition::InviteDeleteFailed);
        assert!(actions.channel_messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn low_trust_link_is_deleted_with_dm_and_no_channel_warning() {
        let service = service();
        let settings = ModerationSettings::default();
        let actions = MockActions::default();

        // Account two days old, minimum is seven.
        let mut msg = message(1, "look https://example.com/deal", 0);
        msg.author_created_at_ms = msg.timestamp_ms - 2 * DAY_MS;

        let result = service.handle_message(&msg, &settings, &actions).await;

        assert_eq!(result, Disposition::LowTrustDeleted { dm_attempted: true });
        assert_eq!(actions.deleted.lock().unwrap().len(), 1);
        assert_eq!(actions.dms.lock().unwrap().len(), 1);
        assert!(actions.channel_messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn low_trust_dm_failure_is_not_fatal() {
        let service = service();
        let settings = ModerationSettings::default();
        let actions = MockActions::default();
        actions.fail_dm.store(true, Ordering::SeqCst);

        let mut msg = message(1, "https://example.com", 0);
        msg.author_created_at_ms = msg.timestamp_ms - DAY_MS;

        let result = service.handle_message(&msg, &settings, &actions).await;
        assert_eq!(result, Disposition::LowTrustDeleted { dm_attempted: true });
        assert_eq!(actions.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn aged_account_links_fall_through_to_spam_rule() {
        let service = service();
        let settings = ModerationSettings::default();
        let actions = MockActions::default();

        let result = service
            .handle_message(&message(1, "https://example.com", 0), &settings, &actions)
            .await;
        assert_eq!(result, Disposition::Allowed);
        assert!(actions.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bypass_role_user_is_never_tracked() {
        let service = service();
        let mut settings = ModerationSettings::default();
        settings.bypass_role_ids.insert(777);
        let actions = MockActions::default();

        for i in 0..10 {
            let mut msg = message(1, &format!("m{}", i), i * 100);
            msg.author_role_ids = vec![5, 777];
            let result = service.handle_message(&msg, &settings, &actions).await;
            assert_eq!(result, Disposition::Allowed);
        }
        assert!(actions.deleted.lock().unwrap().is_empty());
        assert!(actions.timeouts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ignored_channel_is_exempt_from_flood() {
        let service = service();
        let mut settings = ModerationSettings::default();
        settings.ignored_channel_ids.insert(CHANNEL);
        let actions = MockActions::default();

        for i in 0..10 {
            let result = service
                .handle_message(&message(1, &format!("m{}", i), i * 100), &settings, &actions)
                .await;
            assert_eq!(result, Disposition::Allowed);
        }
        assert!(actions.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn spam_warning_is_throttled_within_its_window() {
        let service = service();
        let mut settings = ModerationSettings::default();
        settings.repeat_max_repeats = 1;
        settings.spam_timeout_enabled = false;
        let actions = MockActions::default();

        service
            .handle_message(&message(1, "dup dup", 0), &settings, &actions)
            .await;
        let first = service
            .handle_message(&message(1, "dup dup", 1_000), &settings, &actions)
            .await;
        let second = service
            .handle_message(&message(1, "dup dup", 2_000), &settings, &actions)
            .await;

        assert!(matches!(
            first,
            Disposition::SpamEnforced { warned: true, .. }
        ));
        assert!(matches!(
            second,
            Disposition::SpamEnforced { warned: false, .. }
        ));
        assert_eq!(actions.channel_messages.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn spam_delete_failure_does_not_stop_enforcement() {
        let service = service();
        let mut settings = ModerationSettings::default();
        settings.repeat_max_repeats = 1;
        let actions = MockActions::default();
        actions.fail_delete.store(true, Ordering::SeqCst);

        service
            .handle_message(&message(1, "dup dup", 0), &settings, &actions)
            .await;
        let result = service
            .handle_message(&message(1, "dup dup", 1_000), &settings, &actions)
            .await;

        match result {
            Disposition::SpamEnforced {
                deleted,
                strikes,
                warned,
                ..
            } => {
                assert!(!deleted);
                assert_eq!(strikes, 1);
                assert!(warned, "warning still posted after a failed delete");
            }
            other => panic!("expected spam enforcement, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_text_and_foreign_guild_are_skipped() {
        let service = service();
        let settings = ModerationSettings::default();
        let actions = MockActions::default();

        let empty = message(1, "", 0);
        assert_eq!(
            service.handle_message(&empty, &settings, &actions).await,
            Disposition::Allowed
        );

        let mut foreign = message(1, "discord.gg/abc", 0);
        foreign.guild_id = GUILD + 1;
        assert_eq!(
            service.handle_message(&foreign, &settings, &actions).await,
            Disposition::Allowed
        );
        assert!(actions.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_message_fails_open() {
        let service = service();
        let settings = ModerationSettings::default();
        let actions = MockActions::default();

        let mut msg = message(0, "discord.gg/abc", 0);
        msg.author_id = 0;
        assert_eq!(
            service.handle_message(&msg, &settings, &actions).await,
            Disposition::Allowed
        );
    }

    #[tokio::test]
    async fn prune_forgets_idle_repeat_streaks() {
        let service = service();
        let settings = ModerationSettings::default();
        let actions = MockActions::default();

        service
            .handle_message(&message(1, "hello there", 0), &settings, &actions)
            .await;
        service
            .handle_message(&message(1, "hello there", 1_000), &settings, &actions)
            .await;

        // Sweep far enough in the future that every map drops the user.
        let far = 100 * settings.strike_decay_ms();
        service.prune(&settings, far);

        let fresh = service
            .handle_message(&message(1, "hello there", far + 1_000), &settings, &actions)
            .await;
        assert_eq!(fresh, Disposition::Allowed);
    }
}
