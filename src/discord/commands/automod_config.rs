// Auto-moderation slash commands for configuration.

use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

type Context<'a> = poise::Context<'a, Data, Error>;

/// Auto-moderation configuration commands.
///
/// Inspect and adjust the moderation settings for this server.
#[poise::command(
    slash_command,
    subcommands("status", "config", "ignore_channel", "bypass_role"),
    required_permissions = "MANAGE_MESSAGES",
    guild_only
)]
pub async fn automod(_ctx: Context<'_>) -> Result<(), Error> {
    // Parent command - shows help
    Ok(())
}

/// Show current auto-moderation status and settings.
#[poise::command(slash_command, guild_only)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let settings = ctx.data().settings.current();

    let on_off = |enabled: bool| if enabled { "✅ on" } else { "❌ off" };

    let embed = serenity::CreateEmbed::new()
        .title("🛡️ Auto-Moderation Status")
        .color(if settings.spam_enabled { 0x00FF00 } else { 0xFF0000 })
        .field(
            "Invite Links",
            format!(
                "{} (warn: {}, warning auto-delete: {}s)",
                on_off(settings.invite_auto_delete),
                on_off(settings.invite_warn),
                settings.invite_warn_delete_seconds
            ),
            false,
        )
        .field(
            "Low-Trust Links",
            format!(
                "{} (min account age: {} days, DM: {})",
                on_off(settings.low_trust_filter_enabled),
                settings.low_trust_min_account_age_days,
                on_off(settings.low_trust_warn_dm)
            ),
            false,
        )
        .field(
            "Flood",
            format!(
                "{} messages / {} seconds",
                settings.flood_max_messages, settings.flood_window_seconds
            ),
            true,
        )
        .field(
            "Repeats",
            format!(
                "{} repeats / {} seconds",
                settings.repeat_max_repeats, settings.repeat_window_seconds
            ),
            true,
        )
        .field(
            "Escalation",
            format!(
                "spam: {}, warn: {}, timeout: {} ({} min), strike decay: {} min",
                on_off(settings.spam_enabled),
                on_off(settings.spam_warn_enabled),
                on_off(settings.spam_timeout_enabled),
                settings.spam_timeout_minutes,
                settings.strike_decay_minutes
            ),
            false,
        )
        .field(
            "Exemptions",
            format!(
                "{} ignored channel(s), {} bypass role(s)",
                settings.ignored_channel_ids.len(),
                settings.bypass_role_ids.len()
            ),
            false,
        );

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Update auto-moderation settings.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
#[allow(clippy::too_many_arguments)]
pub async fn config(
    ctx: Context<'_>,
    #[description = "Delete invite links"] invite_auto_delete: Option<bool>,
    #[description = "Warn after an invite deletion"] invite_warn: Option<bool>,
    #[description = "Invite warning auto-delete seconds (0-120)"] invite_warn_delete_seconds: Option<u32>,
    #[description = "Filter links from new accounts"] low_trust_filter: Option<bool>,
    #[description = "Minimum account age in days"] min_account_age_days: Option<u32>,
    #[description = "DM authors of removed low-trust links"] low_trust_dm: Option<bool>,
    #[description = "Enable flood/repeat detection"] spam_enabled: Option<bool>,
    #[description = "Flood window in seconds"] flood_window_seconds: Option<u32>,
    #[description = "Max messages inside the flood window"] flood_max_messages: Option<u32>,
    #[description = "Repeat window in seconds"] repeat_window_seconds: Option<u32>,
    #[description = "Repeats that trigger enforcement"] repeat_max_repeats: Option<u32>,
    #[description = "Warn after a spam deletion"] spam_warn: Option<bool>,
    #[description = "Spam warning auto-delete seconds (0-120)"] spam_warn_delete_seconds: Option<u32>,
    #[description = "Escalate repeated strikes to a timeout"] spam_timeout: Option<bool>,
    #[description = "Timeout length in minutes"] spam_timeout_minutes: Option<u32>,
    #[description = "Minutes of quiet before strikes decay"] strike_decay_minutes: Option<u32>,
) -> Result<(), Error> {
    let updated = ctx
        .data()
        .settings
        .update(|s| {
            if let Some(v) = invite_auto_delete {
                s.invite_auto_delete = v;
            }
            if let Some(v) = invite_warn {
                s.invite_warn = v;
            }
            if let Some(v) = invite_warn_delete_seconds {
                s.invite_warn_delete_seconds = v;
            }
            if let Some(v) = low_trust_filter {
                s.low_trust_filter_enabled = v;
            }
            if let Some(v) = min_account_age_days {
                s.low_trust_min_account_age_days = v;
            }
            if let Some(v) = low_trust_dm {
                s.low_trust_warn_dm = v;
            }
            if let Some(v) = spam_enabled {
                s.spam_enabled = v;
            }
            if let Some(v) = flood_window_seconds {
                s.flood_window_seconds = v;
            }
            if let Some(v) = flood_max_messages {
                s.flood_max_messages = v;
            }
            if let Some(v) = repeat_window_seconds {
                s.repeat_window_seconds = v;
            }
            if let Some(v) = repeat_max_repeats {
                s.repeat_max_repeats = v;
            }
            if let Some(v) = spam_warn {
                s.spam_warn_enabled = v;
            }
            if let Some(v) = spam_warn_delete_seconds {
                s.spam_warn_delete_seconds = v;
            }
            if let Some(v) = spam_timeout {
                s.spam_timeout_enabled = v;
            }
            if let Some(v) = spam_timeout_minutes {
                s.spam_timeout_minutes = v;
            }
            if let Some(v) = strike_decay_minutes {
                s.strike_decay_minutes = v;
            }
        })
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    ctx.say(format!(
        "✅ Auto-moderation configuration updated!\n\
         • Invites: delete {}, warn {}\n\
         • Low-trust links: {} ({} days)\n\
         • Flood: {} msgs / {} sec; repeats: {} / {} sec\n\
         • Timeout: {} ({} min), strike decay {} min",
        updated.invite_auto_delete,
        updated.invite_warn,
        updated.low_trust_filter_enabled,
        updated.low_trust_min_account_age_days,
        updated.flood_max_messages,
        updated.flood_window_seconds,
        updated.repeat_max_repeats,
        updated.repeat_window_seconds,
        updated.spam_timeout_enabled,
        updated.spam_timeout_minutes,
        updated.strike_decay_minutes
    ))
    .await?;

    Ok(())
}

/// Exempt a channel from the flood/repeat rule, or re-include it.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn ignore_channel(
    ctx: Context<'_>,
    #[description = "Channel to exempt"] channel: serenity::GuildChannel,
    #[description = "Remove the exemption instead"] remove: Option<bool>,
) -> Result<(), Error> {
    let channel_id = channel.id.get();
    let removing = remove.unwrap_or(false);

    ctx.data()
        .settings
        .update(|s| {
            if removing {
                s.ignored_channel_ids.remove(&channel_id);
            } else {
                s.ignored_channel_ids.insert(channel_id);
            }
        })
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    let verb = if removing { "re-included in" } else { "exempted from" };
    ctx.say(format!("✅ <#{}> {} spam detection.", channel_id, verb))
        .await?;
    Ok(())
}

/// Exempt a role from the flood/repeat rule, or re-include it.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn bypass_role(
    ctx: Context<'_>,
    #[description = "Role to exempt"] role: serenity::Role,
    #[description = "Remove the exemption instead"] remove: Option<bool>,
) -> Result<(), Error> {
    let role_id = role.id.get();
    let removing = remove.unwrap_or(false);

    ctx.data()
        .settings
        .update(|s| {
            if removing {
                s.bypass_role_ids.remove(&role_id);
            } else {
                s.bypass_role_ids.insert(role_id);
            }
        })
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    let verb = if removing { "re-included in" } else { "exempted from" };
    ctx.say(format!("✅ <@&{}> {} spam detection.", role_id, verb))
        .await?;
    Ok(())
}
