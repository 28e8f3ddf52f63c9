// Moderator utility commands: timeout management, purge, slowmode, locks.

use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

type Context<'a> = poise::Context<'a, Data, Error>;

/// Timeout a member (mods only).
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn timeout(
    ctx: Context<'_>,
    #[description = "User to timeout"] user: serenity::User,
    #[description = "Duration in minutes (1-10080)"]
    #[min = 1]
    #[max = 10080]
    minutes: u32,
    #[description = "Reason (optional)"] reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let until = serenity::Timestamp::from_unix_timestamp(
        chrono::Utc::now().timestamp() + i64::from(minutes) * 60,
    )
    .map_err(|e| Error::from(format!("invalid timeout timestamp: {}", e)))?;
    let audit_reason = reason.clone().unwrap_or_else(|| "Moderator timeout".to_string());

    guild_id
        .edit_member(
            ctx.serenity_context(),
            user.id,
            serenity::EditMember::new()
                .disable_communication_until_datetime(until)
                .audit_log_reason(&audit_reason),
        )
        .await?;

    ctx.send(
        poise::CreateReply::default()
            .content(format!("⏱️ Timed out <@{}> for {} minute(s).", user.id, minutes))
            .ephemeral(true),
    )
    .await?;

    tracing::info!(
        event = "mod_timeout",
        moderator_id = ctx.author().id.get(),
        target_id = user.id.get(),
        minutes,
        reason = reason.as_deref().unwrap_or(""),
        "timed out member"
    );
    Ok(())
}

/// Remove timeout from a member (mods only).
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn untimeout(
    ctx: Context<'_>,
    #[description = "User to untimeout"] user: serenity::User,
    #[description = "Reason (optional)"] reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    let audit_reason = reason.clone().unwrap_or_else(|| "Moderator untimeout".to_string());

    guild_id
        .edit_member(
            ctx.serenity_context(),
            user.id,
            serenity::EditMember::new()
                .enable_communication()
                .audit_log_reason(&audit_reason),
        )
        .await?;

    ctx.send(
        poise::CreateReply::default()
            .content(format!("✅ Removed timeout for <@{}>.", user.id))
            .ephemeral(true),
    )
    .await?;

    tracing::info!(
        event = "mod_untimeout",
        moderator_id = ctx.author().id.get(),
        target_id = user.id.get(),
        "removed timeout"
    );
    Ok(())
}

/// Delete recent messages in this channel (mods only).
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn purge(
    ctx: Context<'_>,
    #[description = "How many messages to delete (1-100)"]
    #[min = 1]
    #[max = 100]
    count: u8,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;

    let messages = ctx
        .channel_id()
        .messages(
            ctx.serenity_context(),
            serenity::GetMessages::new().limit(count),
        )
        .await?;
    let ids: Vec<serenity::MessageId> = messages.iter().map(|m| m.id).collect();
    let deleted = ids.len();

    ctx.serenity_context()
        .http
        .delete_messages(
            ctx.channel_id(),
            &serde_json::json!({ "messages": ids }),
            Some("Moderator purge"),
        )
        .await?;

    ctx.say(format!("🧹 Deleted {} messages.", deleted)).await?;

    tracing::info!(
        event = "mod_purge",
        moderator_id = ctx.author().id.get(),
        channel_id = ctx.channel_id().get(),
        requested = count,
        deleted,
        "purged messages"
    );
    Ok(())
}

/// Set channel slowmode (mods only).
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_CHANNELS")]
pub async fn slowmode(
    ctx: Context<'_>,
    #[description = "Slowmode seconds (0-21600)"]
    #[min = 0]
    #[max = 21600]
    seconds: u16,
) -> Result<(), Error> {
    ctx.channel_id()
        .edit(
            ctx.serenity_context(),
            serenity::EditChannel::new().rate_limit_per_user(seconds),
        )
        .await?;

    ctx.send(
        poise::CreateReply::default()
            .content(format!("🐢 Slowmode set to {}s.", seconds))
            .ephemeral(true),
    )
    .await?;

    tracing::info!(
        event = "mod_slowmode",
        moderator_id = ctx.author().id.get(),
        channel_id = ctx.channel_id().get(),
        seconds,
        "set slowmode"
    );
    Ok(())
}

/// Lock this channel for @everyone (mods only).
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_CHANNELS")]
pub async fn lock(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    // The @everyone role id equals the guild id.
    ctx.channel_id()
        .create_permission(
            ctx.serenity_context(),
            serenity::PermissionOverwrite {
                allow: serenity::Permissions::empty(),
                deny: serenity::Permissions::SEND_MESSAGES,
                kind: serenity::PermissionOverwriteType::Role(serenity::RoleId::new(
                    guild_id.get(),
                )),
            },
        )
        .await?;

    ctx.send(
        poise::CreateReply::default()
            .content("🔒 Channel locked.")
            .ephemeral(true),
    )
    .await?;

    tracing::info!(
        event = "mod_lock",
        moderator_id = ctx.author().id.get(),
        channel_id = ctx.channel_id().get(),
        "locked channel"
    );
    Ok(())
}

/// Unlock this channel for @everyone (mods only).
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_CHANNELS")]
pub async fn unlock(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    ctx.channel_id()
        .delete_permission(
            ctx.serenity_context(),
            serenity::PermissionOverwriteType::Role(serenity::RoleId::new(guild_id.get())),
        )
        .await?;

    ctx.send(
        poise::CreateReply::default()
            .content("🔓 Channel unlocked.")
            .ephemeral(true),
    )
    .await?;

    tracing::info!(
        event = "mod_unlock",
        moderator_id = ctx.author().id.get(),
        channel_id = ctx.channel_id().get(),
        "unlocked channel"
    );
    Ok(())
}
