// This is the entry point of the Discord bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (databases)
// - `discord/` = Discord-specific adapters (commands, events)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands and event handlers

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::automod::AutoModService;
use crate::core::cooldown::CommandCooldowns;
use crate::core::settings::SettingsService;
use crate::discord::{automod as automod_events, BotConfig, Data, Error};
use crate::infra::settings::SqliteSettingsStore;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

const SETTINGS_REFRESH_SECS: u64 = 30;
const PRUNE_SWEEP_SECS: u64 = 60;

const DEFAULT_ROLL_USER_COOLDOWN_MS: i64 = 3_000;
const DEFAULT_ROLL_CHANNEL_COOLDOWN_MS: i64 = 1_000;

/// Event handler for non-command Discord events.
/// This is where inbound messages are fed into the auto-moderation engine.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    if let serenity::FullEvent::Message { new_message } = event {
        if let Err(e) = automod_events::handle_message(ctx, new_message, data).await {
            tracing::error!("Error handling message for automod: {}", e);
        }
    }

    Ok(())
}

fn env_ms(name: &str, default: i64) -> i64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let token = std::env::var("DISCORD_TOKEN").expect(
        "Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.",
    );
    let guild_id: u64 = std::env::var("DISCORD_GUILD_ID")
        .expect("Missing DISCORD_GUILD_ID environment variable!")
        .parse()
        .expect("DISCORD_GUILD_ID must be a numeric guild id");
    let moderator_role_id = std::env::var("MODERATOR_ROLE_ID")
        .ok()
        .and_then(|v| v.parse::<u64>().ok());

    let roll_user_cooldown_ms = env_ms("R_COOLDOWN_USER_MS", DEFAULT_ROLL_USER_COOLDOWN_MS);
    let roll_channel_cooldown_ms = env_ms("R_COOLDOWN_CHANNEL_MS", DEFAULT_ROLL_CHANNEL_COOLDOWN_MS);

    // Keep runtime databases in a dedicated folder so the repo root stays tidy.
    let data_dir = "data";
    std::fs::create_dir_all(data_dir).expect("Failed to create data directory for SQLite files");
    let settings_db_path = format!("{}/settings.db", data_dir);

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let settings_pool = sqlx::sqlite::SqlitePoolOptions::new()
        .connect(&format!("sqlite://{}?mode=rwc", settings_db_path))
        .await
        .expect("Failed to connect to settings DB");
    let settings_store = SqliteSettingsStore::new(settings_pool, guild_id);
    settings_store
        .migrate()
        .await
        .expect("Failed to migrate settings DB");

    let settings_service = Arc::new(SettingsService::new(settings_store));
    settings_service
        .ensure_defaults()
        .await
        .expect("Failed to seed default moderation settings");
    if let Err(e) = settings_service.refresh().await {
        tracing::warn!("Initial settings load failed, using defaults: {}", e);
    }

    let automod_service = Arc::new(AutoModService::new(guild_id));
    let roll_cooldowns = Arc::new(CommandCooldowns::new(
        roll_user_cooldown_ms,
        roll_channel_cooldown_ms,
    ));

    // Create the data structure that will be shared across all commands
    let data = Data {
        automod: Arc::clone(&automod_service),
        settings: Arc::clone(&settings_service),
        roll_cooldowns: Arc::clone(&roll_cooldowns),
        config: BotConfig {
            guild_id,
            moderator_role_id,
        },
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================
    // Configure the poise framework with our commands and settings.

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read message content
        | serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            // Register all our commands here
            commands: vec![
                discord::commands::roll::roll(),
                discord::commands::moderation::timeout(),
                discord::commands::moderation::untimeout(),
                discord::commands::moderation::purge(),
                discord::commands::moderation::slowmode(),
                discord::commands::moderation::lock(),
                discord::commands::moderation::unlock(),
                discord::commands::automod_config::automod(),
            ],
            // Event handler for messages and other events
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                println!("🤖 Bot is starting up...");

                // Single-community deployment: register commands in the
                // configured guild so updates show up immediately.
                poise::builtins::register_in_guild(
                    ctx,
                    &framework.options().commands,
                    serenity::GuildId::new(guild_id),
                )
                .await?;

                println!("✅ Commands registered!");
                println!("🚀 Bot is ready!");

                // Background settings refresh. The whole snapshot is swapped
                // each tick; in-flight evaluations keep the one they hold.
                let settings_refresh = Arc::clone(&settings_service);
                tokio::spawn(async move {
                    use std::time::Duration as StdDuration;
                    use tokio::time::sleep;

                    loop {
                        sleep(StdDuration::from_secs(SETTINGS_REFRESH_SECS)).await;
                        if let Err(e) = settings_refresh.refresh().await {
                            tracing::warn!("Settings refresh failed: {}", e);
                        }
                    }
                });

                // Background stale-entry sweep over every tracked-state map.
                let prune_automod = Arc::clone(&automod_service);
                let prune_settings = Arc::clone(&settings_service);
                let prune_cooldowns = Arc::clone(&roll_cooldowns);
                tokio::spawn(async move {
                    use std::time::Duration as StdDuration;
                    use tokio::time::sleep;

                    loop {
                        sleep(StdDuration::from_secs(PRUNE_SWEEP_SECS)).await;
                        let now = chrono::Utc::now().timestamp_millis();
                        prune_automod.prune(&prune_settings.current(), now);
                        prune_cooldowns.prune(now);
                        tracing::debug!("Pruned stale moderation state");
                    }
                });

                Ok(data)
            })
        })
        .build();

    // Create the client and start the bot
    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .expect("Error creating client");

    client.start().await.expect("Error running bot");
}
