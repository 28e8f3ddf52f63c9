// Discord-specific message handling - feeds gateway messages into the
// auto-moderation engine and carries out its enforcement calls.

use crate::core::automod::{
    EnforcementActions, EnforcementError, InboundMessage, MessageRef,
};
use crate::discord::{Data, Error};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::time::Duration;

/// Permissions that make their holder moderator-equivalent.
const MOD_PERMISSIONS: serenity::Permissions = serenity::Permissions::ADMINISTRATOR
    .union(serenity::Permissions::MANAGE_GUILD)
    .union(serenity::Permissions::MANAGE_MESSAGES)
    .union(serenity::Permissions::MODERATE_MEMBERS);

/// Run one gateway message through the engine.
pub async fn handle_message(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
) -> Result<(), Error> {
    // Only guild messages are moderated; the engine re-checks the guild id.
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };

    let inbound = InboundMessage {
        author_id: msg.author.id.get(),
        author_is_bot: msg.author.bot,
        author_created_at_ms: msg.author.created_at().unix_timestamp() * 1000,
        author_has_mod_permission: author_has_mod_permission(ctx, msg, data, guild_id),
        author_role_ids: msg
            .member
            .as_ref()
            .map(|m| m.roles.iter().map(|r| r.get()).collect())
            .unwrap_or_default(),
        guild_id: guild_id.get(),
        channel_id: msg.channel_id.get(),
        message_id: msg.id.get(),
        text: msg.content.clone(),
        timestamp_ms: chrono::Utc::now().timestamp_millis(),
    };

    let settings = data.settings.current();
    let actions = SerenityActions {
        http: Arc::clone(&ctx.http),
        guild_id,
    };

    data.automod
        .handle_message(&inbound, &settings, &actions)
        .await;

    Ok(())
}

/// Moderator check: the configured moderator role, guild ownership, or any
/// moderator-equivalent permission on one of the member's roles.
fn author_has_mod_permission(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
    guild_id: serenity::GuildId,
) -> bool {
    let roles = msg.member.as_ref().map(|m| m.roles.as_slice()).unwrap_or(&[]);

    if let Some(mod_role) = data.config.moderator_role_id {
        if roles.iter().any(|r| r.get() == mod_role) {
            return true;
        }
    }

    let Some(guild) = ctx.cache.guild(guild_id) else {
        return false;
    };
    if guild.owner_id == msg.author.id {
        return true;
    }
    roles.iter().any(|role_id| {
        guild
            .roles
            .get(role_id)
            .is_some_and(|role| role.permissions.intersects(MOD_PERMISSIONS))
    })
}

/// Enforcement sink backed by the Discord HTTP client.
pub struct SerenityActions {
    http: Arc<serenity::Http>,
    guild_id: serenity::GuildId,
}

#[async_trait]
impl EnforcementActions for SerenityActions {
    async fn delete_message(
        &self,
        channel_id: u64,
        message_id: u64,
    ) -> Result<(), EnforcementError> {
        self.http
            .delete_message(
                serenity::ChannelId::new(channel_id),
                serenity::MessageId::new(message_id),
                Some("automod"),
            )
            .await
            .map_err(|e| EnforcementError::Platform(e.to_string()))
    }

    async fn send_channel_message(
        &self,
        channel_id: u64,
        text: &str,
    ) -> Result<MessageRef, EnforcementError> {
        let message = serenity::ChannelId::new(channel_id)
            .say(&self.http, text)
            .await
            .map_err(|e| EnforcementError::Platform(e.to_string()))?;
        Ok(MessageRef {
            channel_id,
            message_id: message.id.get(),
        })
    }

    async fn delete_after(&self, message: MessageRef, delay: Duration) {
        let http = Arc::clone(&self.http);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = http
                .delete_message(
                    serenity::ChannelId::new(message.channel_id),
                    serenity::MessageId::new(message.message_id),
                    Some("automod warning cleanup"),
                )
                .await
            {
                // The warning may have been removed by hand already.
                tracing::debug!("failed to delete expired warning: {}", e);
            }
        });
    }

    async fn send_direct_message(
        &self,
        user_id: u64,
        text: &str,
    ) -> Result<(), EnforcementError> {
        let channel = serenity::UserId::new(user_id)
            .create_dm_channel(&self.http)
            .await
            .map_err(|e| EnforcementError::Platform(e.to_string()))?;
        channel
            .id
            .say(&self.http, text)
            .await
            .map_err(|e| EnforcementError::Platform(e.to_string()))?;
        Ok(())
    }

    async fn timeout_member(
        &self,
        user_id: u64,
        minutes: u32,
        reason: &str,
    ) -> Result<(), EnforcementError> {
        let until = serenity::Timestamp::from_unix_timestamp(
            chrono::Utc::now().timestamp() + i64::from(minutes) * 60,
        )
        .map_err(|e| EnforcementError::InvalidTimestamp(e.to_string()))?;

        self.guild_id
            .edit_member(
                &self.http,
                serenity::UserId::new(user_id),
                serenity::EditMember::new()
                    .disable_communication_until_datetime(until)
                    .audit_log_reason(reason),
            )
            .await
            .map(|_| ())
            .map_err(|e| EnforcementError::Platform(e.to_string()))
    }
}
